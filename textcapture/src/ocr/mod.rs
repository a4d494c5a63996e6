//! OCR (Optical Character Recognition) Module
//!
//! Turns an image path plus a language selector into text, or into a
//! user-facing message explaining why no text came out.
//!
//! # Architecture
//!
//! The module follows a provider pattern:
//! - `OcrBackend` trait defines the engine capability
//! - `NativeBackend` runs Tesseract in-process via leptess (`native` feature)
//! - `ManagedBackend` uses the multilingual OCR service over HTTP, or the
//!   `tesseract` command-line tool when the service is absent
//! - `OcrDispatcher` picks the order, falls back and renders messages
//!
//! # Configuration
//!
//! Behavior is controlled via `OcrConfig` (see `config.rs`):
//! - `use_native`: try the in-process engine first
//! - `server_url`: base URL of the multilingual OCR service
//! - `tesseract_cmd` / `page_seg_mode`: the classical engine
//! - `display_locale`: language of user-facing messages
//! - `preprocessing`: image cleanup applied before classical recognition
//!
//! # Usage
//!
//! ```rust,ignore
//! let dispatcher = OcrDispatcher::new(config.ocr);
//! let outcome = dispatcher.extract("scan.png", "Vi");
//! println!("{}", outcome.text);
//! ```

mod api;
mod backend;
mod classical;
mod dispatcher;
mod language;
mod managed;
mod messages;
mod native;
mod preprocessing;
mod result;

pub use api::{MultilingualClient, MULTILINGUAL_LANGUAGES};
pub use backend::{
    BackendAvailability, BackendFactory, BackendKind, DefaultBackendFactory, EngineInfo,
    OcrBackend,
};
pub use classical::ClassicalEngine;
pub use dispatcher::{
    Attempt, AttemptOutcome, DispatchOutcome, DispatchState, OcrDispatcher, OcrSession, Resolution,
};
pub use language::{Language, LanguageCodes};
pub use managed::{ManagedBackend, RecognitionMethod};
pub use messages::DisplayLocale;
pub use native::{NativeBackend, NATIVE_LANGUAGES};
pub use preprocessing::{
    preprocess, preprocess_image, try_preprocess, PreprocessedImage, PreprocessingOverrides,
    PreprocessingSettings, ScratchPolicy, DEFAULT_MAX_DIMENSION, PROCESSED_SUFFIX,
};
pub use result::{
    mean_confidence, mean_positive_confidence, parse_tsv, BoundingBox, RecognitionResult, TsvWord,
};
