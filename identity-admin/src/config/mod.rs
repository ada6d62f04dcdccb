use identity_core::config as core_config;
use identity_core::error::AppError;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

use crate::services::directory::DEFAULT_DIRECTORY_URL;
use crate::services::token_generator::MAX_CUSTOM_TOKEN_LIFETIME_MINUTES;

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub project_id: String,
    pub log_level: String,
    pub directory: DirectoryConfig,
    pub credential: CredentialConfig,
    pub token: TokenConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

/// Transport settings for the account directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryConfig {
    pub base_url: String,
    /// `host:port` of a local emulator; overrides `base_url` and the token.
    pub emulator_host: Option<String>,
    pub access_token: Secret<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    pub service_account_email: String,
    /// PKCS#8 key for local signing. Without one, custom tokens are signed
    /// remotely through the IAM credentials API.
    pub private_key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub custom_token_lifetime_minutes: i64,
    /// JSON object mapping key id to PEM public key.
    pub public_keys_path: String,
}

impl AdminConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_source(common_config, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` passes the process
    /// environment.
    pub fn from_source<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_str = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;
        let var = |key: &str, default: Option<&str>, required: bool| {
            get_env(&lookup, key, default, required)
        };

        let project_default = (!common.project_id.is_empty()).then_some(common.project_id.as_str());
        let emulator_host = lookup("FIREBASE_AUTH_EMULATOR_HOST").filter(|h| !h.is_empty());
        let token_default = emulator_host.as_ref().map(|_| "owner");

        let config = AdminConfig {
            project_id: var("IDENTITY_PROJECT_ID", project_default, is_prod && project_default.is_none())?,
            log_level: var("LOG_LEVEL", Some(common.log_level.as_str()), false)?,
            directory: DirectoryConfig {
                base_url: var("IDENTITY_DIRECTORY_URL", Some(DEFAULT_DIRECTORY_URL), is_prod)?,
                access_token: Secret::new(var(
                    "IDENTITY_ACCESS_TOKEN",
                    token_default,
                    is_prod && emulator_host.is_none(),
                )?),
                emulator_host,
                request_timeout_seconds: parse(
                    "IDENTITY_REQUEST_TIMEOUT_SECONDS",
                    var("IDENTITY_REQUEST_TIMEOUT_SECONDS", Some("30"), false)?,
                )?,
            },
            credential: CredentialConfig {
                service_account_email: var("IDENTITY_SERVICE_ACCOUNT_EMAIL", None, is_prod)?,
                private_key_path: lookup("IDENTITY_PRIVATE_KEY_PATH").filter(|p| !p.is_empty()),
            },
            token: TokenConfig {
                custom_token_lifetime_minutes: parse(
                    "IDENTITY_CUSTOM_TOKEN_LIFETIME_MINUTES",
                    var("IDENTITY_CUSTOM_TOKEN_LIFETIME_MINUTES", Some("60"), false)?,
                )?,
                public_keys_path: var("IDENTITY_PUBLIC_KEYS_PATH", None, is_prod)?,
            },
            environment,
            common,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.project_id.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "IDENTITY_PROJECT_ID must not be empty"
            )));
        }

        let lifetime = self.token.custom_token_lifetime_minutes;
        if lifetime <= 0 || lifetime > MAX_CUSTOM_TOKEN_LIFETIME_MINUTES {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "IDENTITY_CUSTOM_TOKEN_LIFETIME_MINUTES must be between 1 and {}",
                MAX_CUSTOM_TOKEN_LIFETIME_MINUTES
            )));
        }

        if self.directory.request_timeout_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "IDENTITY_REQUEST_TIMEOUT_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod && self.directory.emulator_host.is_some() {
            tracing::error!("FIREBASE_AUTH_EMULATOR_HOST is set in production; directory calls go to the emulator");
        }

        Ok(())
    }
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, required: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if required {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse<T>(key: &str, value: String) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} is not a valid number: {}", key, e))
    })
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn common(project_id: &str) -> core_config::Config {
        core_config::Config {
            project_id: project_id.to_string(),
            log_level: "info".to_string(),
        }
    }

    fn source(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn dev_defaults_fill_optional_keys() -> Result<(), AppError> {
        let config = AdminConfig::from_source(
            common("demo-project"),
            source(&[
                ("IDENTITY_ACCESS_TOKEN", "ya29.token"),
                ("IDENTITY_SERVICE_ACCOUNT_EMAIL", "sa@demo-project.iam.gserviceaccount.com"),
                ("IDENTITY_PUBLIC_KEYS_PATH", "/etc/identity/keys.json"),
            ]),
        )?;

        assert_eq!(config.environment, Environment::Dev);
        assert_eq!(config.project_id, "demo-project");
        assert_eq!(config.directory.base_url, DEFAULT_DIRECTORY_URL);
        assert_eq!(config.directory.request_timeout_seconds, 30);
        assert_eq!(config.token.custom_token_lifetime_minutes, 60);
        assert!(config.credential.private_key_path.is_none());
        Ok(())
    }

    #[test]
    fn emulator_host_supplies_access_token() -> Result<(), AppError> {
        let config = AdminConfig::from_source(
            common(""),
            source(&[
                ("ENVIRONMENT", "prod"),
                ("IDENTITY_PROJECT_ID", "demo-project"),
                ("FIREBASE_AUTH_EMULATOR_HOST", "localhost:9099"),
                ("IDENTITY_DIRECTORY_URL", DEFAULT_DIRECTORY_URL),
                ("IDENTITY_SERVICE_ACCOUNT_EMAIL", "sa@demo-project.iam.gserviceaccount.com"),
                ("IDENTITY_PUBLIC_KEYS_PATH", "/etc/identity/keys.json"),
            ]),
        )?;

        assert_eq!(config.directory.emulator_host.as_deref(), Some("localhost:9099"));
        assert_eq!(config.directory.access_token.expose_secret(), "owner");
        Ok(())
    }

    #[test]
    fn prod_requires_every_key() {
        let result = AdminConfig::from_source(
            common("demo-project"),
            source(&[("ENVIRONMENT", "prod"), ("IDENTITY_ACCESS_TOKEN", "t")]),
        );
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn lifetime_over_one_hour_is_rejected() {
        let result = AdminConfig::from_source(
            common("demo-project"),
            source(&[
                ("IDENTITY_ACCESS_TOKEN", "t"),
                ("IDENTITY_SERVICE_ACCOUNT_EMAIL", "sa@x"),
                ("IDENTITY_PUBLIC_KEYS_PATH", "keys.json"),
                ("IDENTITY_CUSTOM_TOKEN_LIFETIME_MINUTES", "61"),
            ]),
        );
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn missing_project_id_is_rejected() {
        let result = AdminConfig::from_source(
            common(""),
            source(&[
                ("IDENTITY_ACCESS_TOKEN", "t"),
                ("IDENTITY_SERVICE_ACCOUNT_EMAIL", "sa@x"),
                ("IDENTITY_PUBLIC_KEYS_PATH", "keys.json"),
            ]),
        );
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let result = AdminConfig::from_source(common("p"), source(&[("ENVIRONMENT", "staging")]));
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
