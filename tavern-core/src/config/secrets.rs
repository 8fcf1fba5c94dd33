//! Secrets configuration loaded from environment variables only.
//!
//! This module handles sensitive configuration like API keys that should
//! never be stored in files. All secrets are read from environment variables.

use std::env;

/// Environment variable holding the default completion credential.
pub const DEFAULT_CREDENTIAL_ENV: &str = "OPENROUTER_API_KEY";

/// Secrets loaded exclusively from environment variables.
#[derive(Clone, Default)]
pub struct Secrets {
    /// Default completion credential (env: OPENROUTER_API_KEY)
    pub default_credential: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field(
                "default_credential",
                &self.default_credential.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl Secrets {
    /// Load secrets from environment variables.
    ///
    /// This function also loads .env file if present (for development),
    /// but production should rely on actual environment variables.
    /// A missing credential is not an error: requests are still attempted
    /// and fail at the endpoint.
    pub fn from_env() -> Self {
        super::load_dotenv();
        Self::from_env_inner()
    }

    /// Internal method to load from environment without loading .env
    pub(crate) fn from_env_inner() -> Self {
        let default_credential = env::var(DEFAULT_CREDENTIAL_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());

        if default_credential.is_none() {
            tracing::debug!("{} not set; no default credential", DEFAULT_CREDENTIAL_ENV);
        }

        Self { default_credential }
    }

    pub fn has_default_credential(&self) -> bool {
        self.default_credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Use a mutex to ensure tests that modify environment variables don't run concurrently
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_secrets_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: test-scoped env mutation guarded by ENV_MUTEX.
        unsafe { env::set_var(DEFAULT_CREDENTIAL_ENV, "sk-or-test") };

        let secrets = Secrets::from_env_inner();
        assert_eq!(secrets.default_credential.as_deref(), Some("sk-or-test"));
        assert!(secrets.has_default_credential());

        // SAFETY: cleanup of the variable set above.
        unsafe { env::remove_var(DEFAULT_CREDENTIAL_ENV) };
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let _lock = ENV_MUTEX.lock().unwrap();
        // SAFETY: test-scoped env mutation guarded by ENV_MUTEX.
        unsafe { env::set_var(DEFAULT_CREDENTIAL_ENV, "   ") };

        let secrets = Secrets::from_env_inner();
        assert!(!secrets.has_default_credential());

        // SAFETY: cleanup of the variable set above.
        unsafe { env::remove_var(DEFAULT_CREDENTIAL_ENV) };
    }

    #[test]
    fn test_debug_redacts_credential() {
        let secrets = Secrets {
            default_credential: Some("sk-or-secret".to_string()),
        };
        let debug = format!("{:?}", secrets);
        assert!(!debug.contains("sk-or-secret"));
        assert!(debug.contains("redacted"));
    }
}
