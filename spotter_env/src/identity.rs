//! Identity source for the signed-in caller.

use async_trait::async_trait;
use crate::types::Identity;

/// Resolves the identity of the current session.
///
/// Returning `None` is not an error: the engine treats a missing identity as
/// "not the author" and skips the vote.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn current_identity(&self) -> Option<Identity>;
}

/// An identity provider for signed-out callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentity;

#[async_trait]
impl IdentityProvider for AnonymousIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        None
    }
}

#[async_trait]
impl IdentityProvider for Identity {
    async fn current_identity(&self) -> Option<Identity> {
        Some(self.clone())
    }
}
