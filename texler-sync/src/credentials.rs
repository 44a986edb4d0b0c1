//! Credential gate: supplies or withholds the bearer credential for every
//! outbound call.
//!
//! A 401 from any endpoint invalidates the gate. Observers (the engine)
//! learn about it through a `watch` channel and tear the session down.
//!
//! Each installed credential starts a new epoch; process-wide bootstrap runs
//! once per epoch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;

/// Session state as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

pub struct CredentialGate {
    token: RwLock<Option<String>>,
    /// Incremented on every installed credential
    epoch: AtomicU64,
    state_tx: watch::Sender<AuthState>,
}

impl CredentialGate {
    /// A gate without a credential.
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            token: RwLock::new(None),
            epoch: AtomicU64::new(0),
            state_tx,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let gate = Self::new();
        gate.set_token(token);
        gate
    }

    /// Install a credential and start a new epoch.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
        self.epoch.fetch_add(1, Ordering::SeqCst);
        // Wake observers even when already authenticated: a rotated
        // credential is a new epoch.
        self.state_tx.send_replace(AuthState::Authenticated);
    }

    /// The bearer credential, if one is installed.
    pub fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the credential, e.g. after a 401.
    pub fn invalidate(&self) {
        let previous = self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            log::warn!("Credential invalidated, session ended");
        }
        self.publish_unauthenticated();
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Receive session state transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn publish_unauthenticated(&self) {
        self.state_tx.send_if_modified(|current| {
            let changed = *current != AuthState::Unauthenticated;
            *current = AuthState::Unauthenticated;
            changed
        });
    }
}

impl Default for CredentialGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CredentialGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the token itself.
        f.debug_struct("CredentialGate")
            .field("authenticated", &self.is_authenticated())
            .field("epoch", &self.epoch())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_starts_empty() {
        let gate = CredentialGate::new();
        assert!(!gate.is_authenticated());
        assert_eq!(gate.bearer(), None);
        assert_eq!(gate.epoch(), 0);
    }

    #[test]
    fn test_set_token_bumps_epoch() {
        let gate = CredentialGate::with_token("abc");
        assert_eq!(gate.bearer().as_deref(), Some("abc"));
        assert_eq!(gate.epoch(), 1);

        gate.set_token("def");
        assert_eq!(gate.bearer().as_deref(), Some("def"));
        assert_eq!(gate.epoch(), 2);
    }

    #[test]
    fn test_invalidate_withholds_credential() {
        let gate = CredentialGate::with_token("abc");
        gate.invalidate();
        assert!(!gate.is_authenticated());
        assert_eq!(gate.bearer(), None);
        // Epoch only moves on new credentials.
        assert_eq!(gate.epoch(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_invalidation() {
        let gate = CredentialGate::with_token("abc");
        let mut rx = gate.subscribe();
        assert_eq!(*rx.borrow(), AuthState::Authenticated);

        gate.invalidate();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_subscribers_see_rotated_credential() {
        let gate = CredentialGate::with_token("abc");
        let mut rx = gate.subscribe();
        assert!(!rx.has_changed().unwrap());

        gate.set_token("def");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), AuthState::Authenticated);
        assert_eq!(gate.epoch(), 2);
    }

    #[tokio::test]
    async fn test_repeated_invalidation_notifies_once() {
        let gate = CredentialGate::with_token("abc");
        let mut rx = gate.subscribe();

        gate.invalidate();
        gate.invalidate();
        rx.changed().await.unwrap();
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_debug_hides_token() {
        let gate = CredentialGate::with_token("super-secret");
        let printed = format!("{gate:?}");
        assert!(!printed.contains("super-secret"));
    }
}
