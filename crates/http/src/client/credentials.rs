//! Access-token storage shared between the client and whoever owns the session

use arc_swap::ArcSwap;
use std::sync::Arc;

/// Holder of the current bearer token.
///
/// The client reads it before every attempt. The refresh coordinator writes
/// a new token on success and clears it on failure, so implementations that
/// track more than the token (a user profile, an "authenticated" flag) should
/// reset that state in [`CredentialStore::clear`] as well.
///
/// Every `clear` starts a new generation. A token obtained by a call that
/// began in an earlier generation must not be stored.
pub trait CredentialStore: Send + Sync {
    /// Current access token, if any
    fn access_token(&self) -> Option<String>;

    /// Replace the access token
    fn store_access_token(&self, token: String);

    /// Forget the access token
    fn clear(&self);

    /// Generation the store is in; advances on every [`CredentialStore::clear`]
    fn generation(&self) -> u64;

    /// Store `token` only if the store is still in `generation`.
    ///
    /// Returns whether the token was stored.
    fn store_if_current(&self, token: String, generation: u64) -> bool;
}

#[derive(Debug, Default)]
struct TokenSlot {
    generation: u64,
    token: Option<String>,
}

/// In-process token slot
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    slot: ArcSwap<TokenSlot>,
}

impl MemoryCredentials {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot that already holds a token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: ArcSwap::from_pointee(TokenSlot {
                generation: 0,
                token: Some(token.into()),
            }),
        }
    }
}

impl CredentialStore for MemoryCredentials {
    fn access_token(&self) -> Option<String> {
        self.slot.load().token.clone()
    }

    fn store_access_token(&self, token: String) {
        self.slot.rcu(|current| TokenSlot {
            generation: current.generation,
            token: Some(token.clone()),
        });
    }

    fn clear(&self) {
        self.slot.rcu(|current| TokenSlot {
            generation: current.generation.wrapping_add(1),
            token: None,
        });
    }

    fn generation(&self) -> u64 {
        self.slot.load().generation
    }

    fn store_if_current(&self, token: String, generation: u64) -> bool {
        let previous = self.slot.rcu(|current| {
            if current.generation == generation {
                Arc::new(TokenSlot {
                    generation,
                    token: Some(token.clone()),
                })
            } else {
                Arc::clone(current)
            }
        });
        previous.generation == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trip() {
        let creds = MemoryCredentials::new();
        assert!(creds.access_token().is_none());

        creds.store_access_token("tok123".into());
        assert_eq!(creds.access_token().as_deref(), Some("tok123"));

        creds.clear();
        assert!(creds.access_token().is_none());
    }

    #[test]
    fn with_token_is_populated() {
        let creds = MemoryCredentials::with_token("seed");
        assert_eq!(creds.access_token().as_deref(), Some("seed"));
    }

    #[test]
    fn clear_starts_a_new_generation() {
        let creds = MemoryCredentials::with_token("seed");
        let before = creds.generation();

        creds.store_access_token("rotated".into());
        assert_eq!(creds.generation(), before);

        creds.clear();
        assert_eq!(creds.generation(), before + 1);
    }

    #[test]
    fn store_if_current_rejects_tokens_from_a_cleared_generation() {
        let creds = MemoryCredentials::new();
        let generation = creds.generation();

        creds.clear();
        assert!(!creds.store_if_current("late".into(), generation));
        assert!(creds.access_token().is_none());

        assert!(creds.store_if_current("fresh".into(), creds.generation()));
        assert_eq!(creds.access_token().as_deref(), Some("fresh"));
    }
}
