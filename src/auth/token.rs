//! Token secrets and the credential pair persisted for a signed-in user.

pub mod credential;
pub mod secret;
