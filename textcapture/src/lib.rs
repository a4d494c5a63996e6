//! Image-to-text extraction with a native engine, managed fallbacks and
//! localized failure messages.

pub mod config;
pub mod error;
pub mod ocr;

pub use config::{Config, OcrConfig};
pub use error::{OcrError, Result};
pub use ocr::{DispatchOutcome, OcrDispatcher, OcrSession};
