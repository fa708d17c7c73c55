use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileRead(String, String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),

    #[error("Invalid listen address: {0}")]
    InvalidListen(String),

    #[error("Unable to parse IP from string {0}")]
    InvalidIp(String),

    #[error("Invalid format for {0}; expected KEY=VALUE")]
    InvalidKeyValue(String),
}
