//! Auth token lookup. Registration and credential storage live elsewhere; the
//! session layer only needs to turn a token into a username.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::config::UserEntry;
use crate::error::{Result, ServerError};

pub trait Authorizer: Send + Sync {
    /// Username owning `token`. Unknown tokens fail with `Unauthorized`.
    fn username_for(&self, token: &str) -> Result<String>;
}

/// Token table held in memory.
#[derive(Debug, Default)]
pub struct MemoryAuthorizer {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: &[UserEntry]) -> Self {
        let tokens = users
            .iter()
            .map(|u| (u.token.clone(), u.username.clone()))
            .collect();
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    pub fn insert(&self, token: impl Into<String>, username: impl Into<String>) -> Result<()> {
        self.tokens.write()?.insert(token.into(), username.into());
        Ok(())
    }
}

impl Authorizer for MemoryAuthorizer {
    fn username_for(&self, token: &str) -> Result<String> {
        self.tokens
            .read()?
            .get(token)
            .cloned()
            .ok_or(ServerError::Unauthorized)
    }
}
