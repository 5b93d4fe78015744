//! HTTP implementation of the platform client
//!
//! Talks to the platform's versioned REST API: post creation returns the
//! new entity reference in the `x-restli-id` response header, engagement
//! metrics come from one aggregate query per metric type, and token
//! rotation goes through the OAuth `refresh_token` grant.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use crate::config::PlatformConfig;
use crate::error::{PlatformError, Result};
use crate::platform::PlatformClient;
use crate::types::{Account, PostMetrics, RefreshedToken};

const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";
const METRIC_TYPES: [&str; 3] = ["IMPRESSION", "REACTION", "COMMENT"];

pub struct RestPlatformClient {
    http: reqwest::Client,
    api_base: String,
    oauth_base: String,
    api_version: String,
    client_id: String,
    client_secret: String,
}

impl RestPlatformClient {
    /// Build a client from configuration. Every request is bounded by the
    /// configured timeout; a timed-out call surfaces as a network error.
    pub fn from_config(config: &PlatformConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| PlatformError::Api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            oauth_base: config.oauth_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl PlatformClient for RestPlatformClient {
    async fn submit(&self, content: &str, account: &Account) -> Result<String> {
        let body = serde_json::json!({
            "author": account.external_account_id,
            "commentary": content,
            "visibility": "PUBLIC",
            "distribution": {
                "feedDistribution": "MAIN_FEED",
                "targetEntities": [],
                "thirdPartyDistributionChannels": [],
            },
            "lifecycleState": "PUBLISHED",
        });

        let response = self
            .http
            .post(format!("{}/rest/posts", self.api_base))
            .bearer_auth(&account.access_token)
            .header("LinkedIn-Version", &self.api_version)
            .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return response
                .headers()
                .get("x-restli-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
                .ok_or_else(|| {
                    PlatformError::Api("response missing x-restli-id header".to_string()).into()
                });
        }

        let payload = read_json_body(response).await;
        debug!("submit failed with HTTP {}: {}", status, payload);
        Err(classify_submit_error(status.as_u16(), &payload).into())
    }

    async fn fetch_metrics(
        &self,
        external_post_id: &str,
        account: &Account,
    ) -> Result<PostMetrics> {
        // The entity parameter is a Rest.li tuple; only the reference
        // inside it gets percent-encoded.
        let entity = format!("(share:{})", urlencoding::encode(external_post_id));
        let mut counts = [0_i64; METRIC_TYPES.len()];

        for (i, metric) in METRIC_TYPES.iter().enumerate() {
            let url = format!(
                "{}/rest/memberCreatorPostAnalytics?q=entity&aggregation=TOTAL&entity={}&queryType={}",
                self.api_base, entity, metric
            );

            let response = self
                .http
                .get(&url)
                .bearer_auth(&account.access_token)
                .header("LinkedIn-Version", &self.api_version)
                .header("X-Restli-Protocol-Version", RESTLI_PROTOCOL_VERSION)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(PlatformError::NotFound(external_post_id.to_string()).into());
            }
            if !status.is_success() {
                let payload = read_json_body(response).await;
                return Err(classify_api_error(status.as_u16(), &payload).into());
            }

            let payload = read_json_body(response).await;
            counts[i] = element_count(&payload);
        }

        Ok(PostMetrics {
            impressions: counts[0],
            reactions: counts[1],
            comments: counts[2],
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(PlatformError::Authentication(
                "client credentials are not configured".to_string(),
            )
            .into());
        }

        let response = self
            .http
            .post(format!("{}/accessToken", self.oauth_base))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let payload = read_json_body(response).await;
            return Err(classify_api_error(status.as_u16(), &payload).into());
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Api(format!("invalid token response: {}", e)))?;

        Ok(RefreshedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }

    fn name(&self) -> &str {
        "linkedin"
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

fn transport_error(e: reqwest::Error) -> crate::error::PostpilotError {
    if e.is_timeout() {
        PlatformError::Network(format!("request timed out: {}", e)).into()
    } else if e.is_connect() {
        PlatformError::Network(format!("connection failed: {}", e)).into()
    } else {
        PlatformError::Network(e.to_string()).into()
    }
}

async fn read_json_body(response: reqwest::Response) -> Value {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(Value::Null)
}

/// Classify a failed submit response. Duplicate-content rejections carry
/// `errorDetails.inputErrors[].code == "DUPLICATE_POST"` and mention the
/// already-existing share reference in the message.
fn classify_submit_error(status: u16, payload: &Value) -> PlatformError {
    let is_duplicate = payload["errorDetails"]["inputErrors"]
        .as_array()
        .map(|errors| errors.iter().any(|e| e["code"] == "DUPLICATE_POST"))
        .unwrap_or(false);

    if is_duplicate {
        let existing_ref = payload["message"].as_str().and_then(extract_share_ref);
        return PlatformError::Duplicate { existing_ref };
    }

    classify_api_error(status, payload)
}

fn classify_api_error(status: u16, payload: &Value) -> PlatformError {
    let message = payload["message"].as_str().unwrap_or("no message").to_string();
    match status {
        401 | 403 => PlatformError::Authentication(format!("HTTP {}: {}", status, message)),
        _ => PlatformError::Api(format!("HTTP {}: {}", status, message)),
    }
}

/// Pull the existing share reference out of a duplicate-content message.
fn extract_share_ref(message: &str) -> Option<String> {
    static SHARE_REF: OnceLock<Regex> = OnceLock::new();
    let re = SHARE_REF.get_or_init(|| {
        Regex::new(r"urn:li:share:\d+").expect("share reference pattern is valid")
    });
    re.find(message).map(|m| m.as_str().to_string())
}

fn element_count(payload: &Value) -> i64 {
    payload["elements"][0]["count"].as_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_share_ref() {
        let message = "Content is a duplicate of urn:li:share:7341580592901 and was not created";
        assert_eq!(
            extract_share_ref(message),
            Some("urn:li:share:7341580592901".to_string())
        );
    }

    #[test]
    fn test_extract_share_ref_absent() {
        assert_eq!(extract_share_ref("Duplicate content detected"), None);
    }

    #[test]
    fn test_classify_duplicate_with_reference() {
        let payload = serde_json::json!({
            "message": "Content is a duplicate of urn:li:share:42",
            "errorDetails": {
                "inputErrors": [
                    { "code": "DUPLICATE_POST", "description": "duplicate" }
                ]
            }
        });

        match classify_submit_error(422, &payload) {
            PlatformError::Duplicate { existing_ref } => {
                assert_eq!(existing_ref, Some("urn:li:share:42".to_string()));
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_duplicate_without_recoverable_reference() {
        let payload = serde_json::json!({
            "message": "Duplicate content",
            "errorDetails": {
                "inputErrors": [{ "code": "DUPLICATE_POST" }]
            }
        });

        match classify_submit_error(422, &payload) {
            PlatformError::Duplicate { existing_ref } => assert_eq!(existing_ref, None),
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_non_duplicate_input_error() {
        let payload = serde_json::json!({
            "message": "Commentary too long",
            "errorDetails": {
                "inputErrors": [{ "code": "CONTENT_TOO_LONG" }]
            }
        });

        assert!(matches!(
            classify_submit_error(422, &payload),
            PlatformError::Api(_)
        ));
    }

    #[test]
    fn test_classify_unauthorized() {
        let payload = serde_json::json!({ "message": "Invalid access token" });
        assert!(matches!(
            classify_submit_error(401, &payload),
            PlatformError::Authentication(_)
        ));
    }

    #[test]
    fn test_classify_opaque_server_error() {
        assert!(matches!(
            classify_submit_error(500, &Value::Null),
            PlatformError::Api(_)
        ));
    }

    #[test]
    fn test_element_count() {
        let payload = serde_json::json!({ "elements": [{ "count": 17 }] });
        assert_eq!(element_count(&payload), 17);
    }

    #[test]
    fn test_element_count_defaults_to_zero() {
        assert_eq!(element_count(&serde_json::json!({ "elements": [] })), 0);
        assert_eq!(element_count(&Value::Null), 0);
    }

    #[test]
    fn test_from_config_trims_trailing_slashes() {
        let mut config = PlatformConfig::default();
        config.api_base = "https://api.example.com/".to_string();
        config.oauth_base = "https://auth.example.com/oauth/v2/".to_string();

        let client = RestPlatformClient::from_config(&config).unwrap();
        assert_eq!(client.api_base, "https://api.example.com");
        assert_eq!(client.oauth_base, "https://auth.example.com/oauth/v2");
        assert_eq!(client.name(), "linkedin");
    }

    #[tokio::test]
    async fn test_refresh_without_client_credentials_fails_fast() {
        let client = RestPlatformClient::from_config(&PlatformConfig::default()).unwrap();
        let result = client.refresh("some-refresh-token").await;

        match result {
            Err(crate::error::PostpilotError::Platform(PlatformError::Authentication(msg))) => {
                assert!(msg.contains("not configured"));
            }
            other => panic!("expected authentication error, got {:?}", other),
        }
    }
}
