use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "provider config file not found. Looked in:\n\
        - GRIDFORM_CONFIG_PATH\n\
        - current directory: gridform.yaml, .gridform.yaml\n\
        - ~/.config/gridform/config.yaml\n\
        Alternatively set GRIDFORM_CONTROLLER_URL and the credential variables"
    )]
    ConfigFileNotFound,

    #[error("missing required setting '{field}' (or env {env})")]
    MissingField {
        field: &'static str,
        env: &'static str,
    },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
