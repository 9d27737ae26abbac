use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("client error: {0}")]
    Client(#[from] clients::ClientError),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
}
