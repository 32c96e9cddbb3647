//! Credential lookup for database logins
//!
//! Secrets are keyed by `(scope, principal)`: the database name and the user.

use std::collections::HashMap;

/// Source of database secrets
pub trait CredentialStore {
    /// Secret for `principal` within `scope`, if one is stored
    fn get_secret(&self, scope: &str, principal: &str) -> Option<String>;
}

/// Reads secrets from environment variables
///
/// Looks up `UCNHISTORY_PASSWORD_<SCOPE>_<PRINCIPAL>` first, then the
/// catch-all `UCNHISTORY_DB_PASSWORD`. Empty values count as absent.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    prefix: String,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::with_prefix("UCNHISTORY")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Variable name for a scoped secret
    pub fn scoped_var(&self, scope: &str, principal: &str) -> String {
        format!(
            "{}_PASSWORD_{}_{}",
            self.prefix,
            env_fragment(scope),
            env_fragment(principal)
        )
    }

    /// Variable name for the catch-all secret
    pub fn fallback_var(&self) -> String {
        format!("{}_DB_PASSWORD", self.prefix)
    }
}

fn env_fragment(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl CredentialStore for EnvCredentials {
    fn get_secret(&self, scope: &str, principal: &str) -> Option<String> {
        [self.scoped_var(scope, principal), self.fallback_var()]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
    }
}

/// In-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    secrets: HashMap<(String, String), String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: store a secret
    pub fn secret(
        mut self,
        scope: impl Into<String>,
        principal: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.secrets
            .insert((scope.into(), principal.into()), secret.into());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn get_secret(&self, scope: &str, principal: &str) -> Option<String> {
        self.secrets
            .get(&(scope.to_string(), principal.to_string()))
            .cloned()
    }
}
