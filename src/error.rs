use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Configuration value not found: {0}")]
    ConfigNotFound(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Key error: {0}")]
    Key(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;
