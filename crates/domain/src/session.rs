//! Session identity - who is logged in on this client.

use serde::{Deserialize, Serialize};

/// The account and token of the active session.
///
/// An empty token means the session is unauthenticated. Only explicit
/// login/logout mutate it; the connection layer reads the token at connect
/// time and reuses it for every reconnect attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub account_name: String,
    pub token: String,
}

impl SessionIdentity {
    pub fn new(account_name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            token: token.into(),
        }
    }

    /// Replace the identity with a freshly authenticated account.
    pub fn login(&mut self, account_name: impl Into<String>, token: impl Into<String>) {
        self.account_name = account_name.into();
        self.token = token.into();
    }

    /// Forget the account and token.
    pub fn logout(&mut self) {
        self.account_name.clear();
        self.token.clear();
    }

    pub fn is_authenticated(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// The token, or `None` when unauthenticated.
    pub fn token(&self) -> Option<&str> {
        if self.is_authenticated() {
            Some(&self.token)
        } else {
            None
        }
    }
}
