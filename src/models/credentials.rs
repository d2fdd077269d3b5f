//! Login credentials and where they come from.

use std::fmt;

use crate::error::{AppError, Result};
use crate::models::CredentialsConfig;

/// Username/password pair for the login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Supplies credentials to the auth client.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

/// Reads credentials from environment variables.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    email_var: String,
    password_var: String,
}

impl EnvCredentials {
    pub fn new(config: &CredentialsConfig) -> Self {
        Self {
            email_var: config.email_env.clone(),
            password_var: config.password_env.clone(),
        }
    }

    fn read(var: &str) -> Result<String> {
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::config(format!("environment variable {var} is not set")))
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            username: Self::read(&self.email_var)?,
            password: Self::read(&self.password_var)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            username: "someone@example.com".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(shown.contains("someone@example.com"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_missing_env_var_is_config_error() {
        let provider = EnvCredentials::new(&CredentialsConfig {
            email_env: "EPD_PULL_TEST_UNSET_EMAIL".into(),
            password_env: "EPD_PULL_TEST_UNSET_PASSWORD".into(),
        });
        assert!(matches!(provider.credentials(), Err(AppError::Config(_))));
    }
}
