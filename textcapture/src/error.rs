use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    #[error("OCR backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("OCR backend error: {0}")]
    BackendExecution(String),

    #[error("OCR engine not initialized")]
    NotInitialized,

    #[error("No OCR engine available: {0}")]
    NoEngineAvailable(String),

    #[error("Unsupported OCR method: {0}")]
    UnsupportedMethod(String),

    #[error("Another OCR request is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl OcrError {
    /// Whether the dispatcher may move on to the next backend after this error.
    ///
    /// Contract violations and input errors are not retried.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            OcrError::InvalidInput(_)
                | OcrError::FileNotFound(_)
                | OcrError::NotInitialized
                | OcrError::NoEngineAvailable(_)
                | OcrError::Busy
        )
    }
}

pub type Result<T> = std::result::Result<T, OcrError>;
