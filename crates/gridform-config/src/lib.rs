//! Provider configuration for gridform
//!
//! The configuration is written once at provider configure time and is
//! read-only afterwards. Values come from a YAML file and fall back to
//! `GRIDFORM_*` environment variables for anything the file leaves unset.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "GRIDFORM_CONFIG_PATH";
pub const ENV_CONTROLLER_URL: &str = "GRIDFORM_CONTROLLER_URL";
pub const ENV_AUTHENTICATOR: &str = "GRIDFORM_AUTHENTICATOR";
pub const ENV_USER: &str = "GRIDFORM_USER";
pub const ENV_PASSWORD: &str = "GRIDFORM_PASSWORD";
pub const ENV_APP_ID: &str = "GRIDFORM_APP_ID";
pub const ENV_APP_SECRET: &str = "GRIDFORM_APP_SECRET";
pub const ENV_OAUTH2_URL: &str = "GRIDFORM_OAUTH2_URL";
pub const ENV_JWT: &str = "GRIDFORM_JWT";
pub const ENV_ALLOW_UNVERIFIED_SSL: &str = "GRIDFORM_ALLOW_UNVERIFIED_SSL";

/// Authentication mode used against the Platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authenticator {
    #[default]
    Oauth2,
    Legacy,
    Jwt,
}

impl std::str::FromStr for Authenticator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oauth2" => Ok(Authenticator::Oauth2),
            "legacy" => Ok(Authenticator::Legacy),
            "jwt" => Ok(Authenticator::Jwt),
            other => Err(ConfigError::InvalidValue {
                field: "authenticator",
                message: format!("'{}' is not one of oauth2, legacy, jwt", other),
            }),
        }
    }
}

impl fmt::Display for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authenticator::Oauth2 => write!(f, "oauth2"),
            Authenticator::Legacy => write!(f, "legacy"),
            Authenticator::Jwt => write!(f, "jwt"),
        }
    }
}

/// Raw settings as written in the config file. Every field is optional so
/// environment fallbacks can fill the gaps.
#[derive(Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub controller_url: Option<String>,
    pub authenticator: Option<Authenticator>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub app_id: Option<String>,
    pub app_secret: Option<String>,
    pub oauth2_url: Option<String>,
    pub jwt: Option<String>,
    pub allow_unverified_ssl: Option<bool>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("controller_url", &self.controller_url)
            .field("authenticator", &self.authenticator)
            .field("user", &self.user)
            .field("app_id", &self.app_id)
            .field("oauth2_url", &self.oauth2_url)
            .field("allow_unverified_ssl", &self.allow_unverified_ssl)
            .finish_non_exhaustive()
    }
}

/// Credentials for one authenticator mode
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Legacy {
        user: String,
        password: String,
    },
    Oauth2 {
        app_id: String,
        app_secret: String,
        oauth2_url: String,
    },
    Jwt {
        token: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Legacy { user, .. } => f
                .debug_struct("Legacy")
                .field("user", user)
                .finish_non_exhaustive(),
            Credentials::Oauth2 {
                app_id, oauth2_url, ..
            } => f
                .debug_struct("Oauth2")
                .field("app_id", app_id)
                .field("oauth2_url", oauth2_url)
                .finish_non_exhaustive(),
            Credentials::Jwt { .. } => f.debug_struct("Jwt").finish_non_exhaustive(),
        }
    }
}

/// Validated provider configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Platform controller base URL, without trailing slash
    pub controller_url: String,

    pub credentials: Credentials,

    /// Skip TLS certificate verification
    pub allow_unverified_ssl: bool,
}

impl ProviderConfig {
    pub fn authenticator(&self) -> Authenticator {
        match self.credentials {
            Credentials::Legacy { .. } => Authenticator::Legacy,
            Credentials::Oauth2 { .. } => Authenticator::Oauth2,
            Credentials::Jwt { .. } => Authenticator::Jwt,
        }
    }
}

impl ProviderSettings {
    /// Read settings from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: ProviderSettings = serde_yaml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded provider settings");
        Ok(settings)
    }

    /// Fill unset fields from `GRIDFORM_*` environment variables
    pub fn with_env_fallbacks(mut self) -> Result<Self> {
        fill_from_env(&mut self.controller_url, ENV_CONTROLLER_URL);
        fill_from_env(&mut self.user, ENV_USER);
        fill_from_env(&mut self.password, ENV_PASSWORD);
        fill_from_env(&mut self.app_id, ENV_APP_ID);
        fill_from_env(&mut self.app_secret, ENV_APP_SECRET);
        fill_from_env(&mut self.oauth2_url, ENV_OAUTH2_URL);
        fill_from_env(&mut self.jwt, ENV_JWT);

        if self.authenticator.is_none() {
            if let Some(value) = env_value(ENV_AUTHENTICATOR) {
                self.authenticator = Some(value.parse()?);
            }
        }
        if self.allow_unverified_ssl.is_none() {
            if let Some(value) = env_value(ENV_ALLOW_UNVERIFIED_SSL) {
                self.allow_unverified_ssl = Some(parse_bool(&value).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        field: "allow_unverified_ssl",
                        message: format!("'{}' is not a boolean", value),
                    }
                })?);
            }
        }
        Ok(self)
    }

    /// Validate the settings for the selected authenticator
    pub fn resolve(self) -> Result<ProviderConfig> {
        let controller_url = required(self.controller_url, "controller_url", ENV_CONTROLLER_URL)?;
        let controller_url = normalize_url("controller_url", &controller_url)?;

        let credentials = match self.authenticator.unwrap_or_default() {
            Authenticator::Legacy => Credentials::Legacy {
                user: required(self.user, "user", ENV_USER)?,
                password: required(self.password, "password", ENV_PASSWORD)?,
            },
            Authenticator::Oauth2 => {
                let oauth2_url = required(self.oauth2_url, "oauth2_url", ENV_OAUTH2_URL)?;
                Credentials::Oauth2 {
                    app_id: required(self.app_id, "app_id", ENV_APP_ID)?,
                    app_secret: required(self.app_secret, "app_secret", ENV_APP_SECRET)?,
                    oauth2_url: normalize_url("oauth2_url", &oauth2_url)?,
                }
            }
            Authenticator::Jwt => Credentials::Jwt {
                token: required(self.jwt, "jwt", ENV_JWT)?,
            },
        };

        Ok(ProviderConfig {
            controller_url,
            credentials,
            allow_unverified_ssl: self.allow_unverified_ssl.unwrap_or(false),
        })
    }
}

/// Locate the provider config file
///
/// Search order:
/// 1. `GRIDFORM_CONFIG_PATH`
/// 2. current directory: `gridform.yaml`, `.gridform.yaml`
/// 3. `~/.config/gridform/config.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "GRIDFORM_CONFIG_PATH is set but file does not exist");
    }

    let current_dir = std::env::current_dir()?;
    for filename in ["gridform.yaml", ".gridform.yaml"] {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("gridform").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Load and validate the provider configuration
///
/// An explicit path must exist. Without one the config file is searched for;
/// when none is found the environment alone must supply the settings.
pub fn load(explicit: Option<&Path>) -> Result<ProviderConfig> {
    let settings = match explicit {
        Some(path) => ProviderSettings::from_file(path)?,
        None => match find_config_file() {
            Ok(path) => ProviderSettings::from_file(&path)?,
            Err(ConfigError::ConfigFileNotFound) if env_value(ENV_CONTROLLER_URL).is_some() => {
                ProviderSettings::default()
            }
            Err(e) => return Err(e),
        },
    };

    settings.with_env_fallbacks()?.resolve()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn fill_from_env(field: &mut Option<String>, env: &str) {
    let unset = field.as_deref().map(str::trim).is_none_or(str::is_empty);
    if unset {
        *field = env_value(env);
    }
}

fn required(value: Option<String>, field: &'static str, env: &'static str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingField { field, env })
}

fn normalize_url(field: &'static str, url: &str) -> Result<String> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidValue {
            field,
            message: format!("'{}' must start with http:// or https://", url),
        });
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const ALL_ENV: [&str; 10] = [
        ENV_CONFIG_PATH,
        ENV_CONTROLLER_URL,
        ENV_AUTHENTICATOR,
        ENV_USER,
        ENV_PASSWORD,
        ENV_APP_ID,
        ENV_APP_SECRET,
        ENV_OAUTH2_URL,
        ENV_JWT,
        ENV_ALLOW_UNVERIFIED_SSL,
    ];

    fn cleared() -> Vec<(&'static str, Option<&'static str>)> {
        ALL_ENV.iter().map(|k| (*k, None)).collect()
    }

    #[test]
    fn test_resolve_legacy() {
        let settings = ProviderSettings {
            controller_url: Some("https://ctrl.example.com/".to_string()),
            authenticator: Some(Authenticator::Legacy),
            user: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        };

        let config = settings.resolve().unwrap();
        assert_eq!(config.controller_url, "https://ctrl.example.com");
        assert_eq!(config.authenticator(), Authenticator::Legacy);
        assert!(!config.allow_unverified_ssl);
    }

    #[test]
    fn test_resolve_missing_credentials() {
        let settings = ProviderSettings {
            controller_url: Some("https://ctrl.example.com".to_string()),
            authenticator: Some(Authenticator::Oauth2),
            app_id: Some("app".to_string()),
            ..Default::default()
        };

        match settings.resolve() {
            Err(ConfigError::MissingField { field, .. }) => assert_eq!(field, "oauth2_url"),
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let settings = ProviderSettings {
            controller_url: Some("ctrl.example.com".to_string()),
            authenticator: Some(Authenticator::Jwt),
            jwt: Some("token".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            settings.resolve(),
            Err(ConfigError::InvalidValue {
                field: "controller_url",
                ..
            })
        ));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let credentials = Credentials::Legacy {
            user: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    #[serial]
    fn test_env_fallbacks() {
        let mut vars = cleared();
        vars.extend([
            (ENV_CONTROLLER_URL, Some("https://env.example.com")),
            (ENV_AUTHENTICATOR, Some("JWT")),
            (ENV_JWT, Some("eyJ.token")),
            (ENV_ALLOW_UNVERIFIED_SSL, Some("true")),
        ]);

        temp_env::with_vars(vars, || {
            let config = ProviderSettings::default()
                .with_env_fallbacks()
                .unwrap()
                .resolve()
                .unwrap();
            assert_eq!(config.controller_url, "https://env.example.com");
            assert_eq!(
                config.credentials,
                Credentials::Jwt {
                    token: "eyJ.token".to_string()
                }
            );
            assert!(config.allow_unverified_ssl);
        });
    }

    #[test]
    #[serial]
    fn test_file_values_win_over_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("gridform.yaml");
        fs::write(
            &path,
            "controller_url: https://file.example.com\nauthenticator: legacy\nuser: alice\n",
        )
        .unwrap();

        let mut vars = cleared();
        vars.extend([
            (ENV_CONTROLLER_URL, Some("https://env.example.com")),
            (ENV_USER, Some("bob")),
            (ENV_PASSWORD, Some("pw")),
        ]);

        temp_env::with_vars(vars, || {
            let config = load(Some(&path)).unwrap();
            assert_eq!(config.controller_url, "https://file.example.com");
            assert_eq!(
                config.credentials,
                Credentials::Legacy {
                    user: "alice".to_string(),
                    password: "pw".to_string()
                }
            );
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "controller_url: https://x").unwrap();

        temp_env::with_var(ENV_CONFIG_PATH, Some(config_path.as_os_str()), || {
            assert_eq!(find_config_file().unwrap(), config_path);
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(".gridform.yaml"), "# hidden").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(ENV_CONFIG_PATH, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".gridform.yaml"));
    }

    #[test]
    #[serial]
    fn test_load_without_file_or_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_vars(cleared(), || load(None));
        std::env::set_current_dir(original_dir).unwrap();

        // A global config may exist on the machine running the tests.
        if let Err(e) = result {
            assert!(matches!(
                e,
                ConfigError::ConfigFileNotFound | ConfigError::MissingField { .. }
            ));
        }
    }
}
