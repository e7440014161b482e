use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("A send is already in flight for this session")]
    Busy,
}

pub type Result<T> = std::result::Result<T, ClientError>;
