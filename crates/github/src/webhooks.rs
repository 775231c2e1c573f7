//! Webhook payload parsing

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Event type GitHub sends when a hook is first registered
pub const PING_EVENT: &str = "ping";

/// The repository named by a delivery. Attacker-controlled.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    pub name: String,
}

/// The only part of a delivery body this service reads
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryPayload {
    pub repository: RepositoryRef,
}

#[derive(Error, Debug)]
#[error("Invalid delivery payload: {0}")]
pub struct PayloadError(#[from] serde_json::Error);

impl DeliveryPayload {
    /// Parse a delivery body. Call only after the signature checked out.
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        let payload: DeliveryPayload = serde_json::from_slice(body)?;
        debug!("Parsed delivery for repository {:?}", payload.repository.name);
        Ok(payload)
    }

    pub fn repository_name(&self) -> &str {
        &self.repository.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_push_payload() {
        let body = br#"{
            "ref": "refs/heads/main",
            "repository": {"id": 1, "name": "myrepo", "full_name": "me/myrepo"},
            "pusher": {"name": "me"}
        }"#;

        let payload = DeliveryPayload::parse(body).unwrap();
        assert_eq!(payload.repository_name(), "myrepo");
    }

    #[test]
    fn test_missing_repository_name() {
        let err = DeliveryPayload::parse(br#"{"repository":{}}"#).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_name_must_be_string() {
        assert!(DeliveryPayload::parse(br#"{"repository":{"name":42}}"#).is_err());
    }

    #[test]
    fn test_not_json() {
        assert!(DeliveryPayload::parse(b"payload=%7B%7D").is_err());
    }
}
