//! GitHub-style webhook deliveries: signature checks and payload parsing

pub mod verify;
pub mod webhooks;

pub use verify::{verify, verify_signature, Algorithm, AuthError};
pub use webhooks::{DeliveryPayload, PayloadError, RepositoryRef, PING_EVENT};
