//! Auth token accessor consumed by the sync client and the outbound queue.

use std::fmt;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

/// Read-only view of the current authentication state.
pub trait AuthProvider: Send + Sync {
    /// Current bearer token, if a user is signed in.
    fn current_token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }
}

/// Stable, non-secret key for the account behind `token`.
///
/// Queued operations carry it so they are only ever sent with the token
/// of the account that created them.
pub fn account_key(token: &str) -> String {
    hex::encode(&Sha256::digest(token.as_bytes())[..8])
}

/// Swappable in-memory session token.
#[derive(Default)]
pub struct SessionAuth {
    token: RwLock<Option<String>>,
}

impl SessionAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(crate::util::normalize_text_option(token)),
        }
    }

    /// Replace the stored token (sign in / account switch).
    pub fn set_token(&self, token: Option<String>) {
        let token = crate::util::normalize_text_option(token);
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn clear(&self) {
        self.set_token(None);
    }
}

impl AuthProvider for SessionAuth {
    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl fmt::Debug for SessionAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionAuth")
            .field(
                "token",
                &if self.is_authenticated() {
                    "[REDACTED]"
                } else {
                    "<none>"
                },
            )
            .finish()
    }
}
