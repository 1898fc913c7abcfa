//! Switchable signed-in identity for simulated clients.

use async_trait::async_trait;
use spotter_env::{Identity, IdentityProvider, UserId};
use std::sync::{Arc, Mutex};

/// A client session whose signed-in user can change mid-run.
///
/// Clones share the same session.
#[derive(Debug, Clone, Default)]
pub struct SimIdentity {
    current: Arc<Mutex<Option<Identity>>>,
}

impl SimIdentity {
    /// Creates a session signed in as `user`.
    pub fn signed_in(user: UserId) -> Self {
        let identity = Self::default();
        identity.sign_in(user);
        identity
    }

    pub fn sign_in(&self, user: UserId) {
        *self.current.lock().unwrap() = Some(Identity { id: user });
    }

    pub fn sign_out(&self) {
        *self.current.lock().unwrap() = None;
    }

    pub fn user(&self) -> Option<UserId> {
        self.current.lock().unwrap().as_ref().map(|i| i.id.clone())
    }
}

#[async_trait]
impl IdentityProvider for SimIdentity {
    async fn current_identity(&self) -> Option<Identity> {
        self.current.lock().unwrap().clone()
    }
}
