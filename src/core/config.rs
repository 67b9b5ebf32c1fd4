use secrecy::{ExposeSecret, Secret};
use serde::{Serialize, Serializer};
use std::env;

/// Credentials for the radio protocol backend.
///
/// The password is held behind `secrecy` and never appears in `Debug` or
/// serialized output.
#[derive(Debug, Clone)]
pub struct PandoraCredentials {
    pub username: String,
    pub password: Secret<String>,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for PandoraCredentials {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("PandoraCredentials", 2)?;
        state.serialize_field("username", &self.username)?;
        state.serialize_field("password", "[REDACTED]")?;
        state.end()
    }
}

impl PandoraCredentials {
    #[must_use]
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password: Secret::new(password),
        }
    }

    /// Create credentials from environment variables.
    ///
    /// Expected environment variables:
    /// - `PANDORA_USERNAME`
    /// - `PANDORA_PASSWORD`
    pub fn from_env() -> Result<Self, ConfigError> {
        let username = env::var("PANDORA_USERNAME")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("PANDORA_USERNAME".to_string()))?;
        let password = env::var("PANDORA_PASSWORD")
            .map_err(|_| ConfigError::MissingEnvironmentVariable("PANDORA_PASSWORD".to_string()))?;

        Ok(Self::new(username, password))
    }

    /// Load credentials from a .env file, falling back to system environment
    /// variables when the file does not exist.
    #[cfg(feature = "env-file")]
    pub fn from_env_file(env_file_path: &str) -> Result<Self, ConfigError> {
        load_env_file(env_file_path)?;
        Self::from_env()
    }

    /// Get the password (use carefully - exposes secret)
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

/// Configuration for one external catalog provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Optional API token (e.g. a Discogs personal access token).
    pub token: Option<Secret<String>>,
    /// Override for the provider base URL, mainly for tests.
    pub base_url: Option<String>,
    /// Contact string embedded in the mandated User-Agent header.
    pub contact: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: None,
            contact: "https://github.com/createMonster/tunefuse".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Create configuration from environment variables.
    ///
    /// Expected environment variables:
    /// - `{PROVIDER}_TOKEN` (optional, e.g. `DISCOGS_TOKEN`)
    /// - `{PROVIDER}_BASE_URL` (optional)
    /// - `TUNEFUSE_CONTACT` (optional, shared contact string)
    #[must_use]
    pub fn from_env(provider_prefix: &str) -> Self {
        let prefix = provider_prefix.to_uppercase();
        let token = env::var(format!("{}_TOKEN", prefix)).ok().map(Secret::new);
        let base_url = env::var(format!("{}_BASE_URL", prefix)).ok();
        let contact = env::var("TUNEFUSE_CONTACT")
            .unwrap_or_else(|_| Self::default().contact);

        Self {
            token,
            base_url,
            contact,
        }
    }

    /// Set a custom base URL (mainly for tests).
    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the API token.
    #[must_use]
    pub fn token(mut self, token: String) -> Self {
        self.token = Some(Secret::new(token));
        self
    }

    /// Get the token (use carefully - exposes secret)
    pub fn token_value(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret().as_str())
    }

    /// Build the `appName/version (contact)` User-Agent string providers
    /// require.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!(
            "{}/{} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.contact
        )
    }
}

#[cfg(feature = "env-file")]
fn load_env_file(env_file_path: &str) -> Result<(), ConfigError> {
    match dotenv::from_path(env_file_path) {
        Ok(_) => Ok(()),
        Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
            // Missing .env file is fine - system env vars still apply
            Ok(())
        }
        Err(e) => Err(ConfigError::InvalidConfiguration(format!(
            "Failed to load .env file '{}': {}",
            env_file_path, e
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_never_serialize_password() {
        let creds = PandoraCredentials::new("listener@example.com".into(), "hunter2".into());
        let json = serde_json::to_string(&creds).unwrap();
        assert!(json.contains("listener@example.com"));
        assert!(!json.contains("hunter2"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn user_agent_carries_contact() {
        let config = ProviderConfig::default().token("abc".into());
        let ua = config.user_agent();
        assert!(ua.starts_with("tunefuse/"));
        assert!(ua.contains('('));
        assert_eq!(config.token_value(), Some("abc"));
    }
}
