use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Device transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Device protocol error: {0}")]
    DeviceProtocol(String),
    #[error("Protocol engine error: {0}")]
    Engine(String),
    #[error("Dispatch queue error: {0}")]
    Queue(String),
}

pub type Result<T> = std::result::Result<T, ProcessorError>;
