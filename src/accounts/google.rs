use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Google's ID-token introspection endpoint.
pub const TOKENINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/tokeninfo";

/// Bound on the outbound provider call so a hung provider cannot hang the
/// request.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity claims extracted from a verified provider token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

/// Provider verification failures. Network faults, bad responses and a
/// mismatched audience are distinct causes; none of them is "invalid
/// credentials".
#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("provider request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("provider returned status {0}")]
    BadStatus(u16),
    #[error("provider payload missing or malformed: {0}")]
    Malformed(&'static str),
    #[error("token audience does not match the registered client id")]
    AudienceMismatch,
}

#[async_trait]
pub trait GoogleTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError>;
}

/// Verifier that calls Google's tokeninfo endpoint over HTTPS.
pub struct HttpGoogleVerifier {
    client: reqwest::Client,
    client_id: String,
    endpoint: String,
}

impl HttpGoogleVerifier {
    pub fn new(client_id: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            client_id: client_id.to_string(),
            endpoint: TOKENINFO_URL.to_string(),
        })
    }
}

#[async_trait]
impl GoogleTokenVerifier for HttpGoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(GoogleAuthError::Network)?;

        if !response.status().is_success() {
            return Err(GoogleAuthError::BadStatus(response.status().as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|_| GoogleAuthError::Malformed("body is not JSON"))?;

        let identity = identity_from_payload(&payload, &self.client_id)?;
        debug!(email = %identity.email, "google token verified");
        Ok(identity)
    }
}

/// Checks the token audience against the registered client id and extracts
/// the identity claims. Name claims default to empty strings when absent.
pub fn identity_from_payload(
    payload: &Value,
    client_id: &str,
) -> Result<GoogleIdentity, GoogleAuthError> {
    let aud = payload
        .get("aud")
        .and_then(Value::as_str)
        .ok_or(GoogleAuthError::Malformed("aud claim"))?;
    if aud != client_id {
        return Err(GoogleAuthError::AudienceMismatch);
    }

    let email = payload
        .get("email")
        .and_then(Value::as_str)
        .ok_or(GoogleAuthError::Malformed("email claim"))?;
    let given_name = payload
        .get("given_name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let family_name = payload
        .get("family_name")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(GoogleIdentity {
        email: email.to_string(),
        given_name: given_name.to_string(),
        family_name: family_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_identity_when_audience_matches() {
        let payload = json!({
            "aud": "client-123",
            "email": "a@b.com",
            "given_name": "Ada",
            "family_name": "Lovelace",
        });
        let identity = identity_from_payload(&payload, "client-123").expect("valid payload");
        assert_eq!(
            identity,
            GoogleIdentity {
                email: "a@b.com".into(),
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
            }
        );
    }

    #[test]
    fn rejects_audience_mismatch() {
        let payload = json!({
            "aud": "someone-else",
            "email": "a@b.com",
        });
        let err = identity_from_payload(&payload, "client-123").unwrap_err();
        assert!(matches!(err, GoogleAuthError::AudienceMismatch));
    }

    #[test]
    fn rejects_payload_without_audience() {
        let payload = json!({ "email": "a@b.com" });
        let err = identity_from_payload(&payload, "client-123").unwrap_err();
        assert!(matches!(err, GoogleAuthError::Malformed(_)));
    }

    #[test]
    fn rejects_payload_without_email() {
        let payload = json!({ "aud": "client-123" });
        let err = identity_from_payload(&payload, "client-123").unwrap_err();
        assert!(matches!(err, GoogleAuthError::Malformed(_)));
    }

    #[test]
    fn name_claims_default_to_empty() {
        let payload = json!({
            "aud": "client-123",
            "email": "a@b.com",
        });
        let identity = identity_from_payload(&payload, "client-123").expect("valid payload");
        assert_eq!(identity.given_name, "");
        assert_eq!(identity.family_name, "");
    }
}
