use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::error::Result;

use super::managed::ManagedBackend;
use super::native::{self, NativeBackend};
use super::result::RecognitionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Native,
    Managed,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Managed => write!(f, "managed"),
        }
    }
}

/// Snapshot of an engine's state, for `--info` and diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub available: bool,
    pub initialized: bool,
    pub language: Option<String>,
    pub version: Option<String>,
    pub details: BTreeMap<String, String>,
}

/// A recognition engine the dispatcher can drive.
///
/// An instance owns one engine and its language state. Adapters that need an
/// explicit `initialize` fail extraction with `NotInitialized` until it succeeds.
pub trait OcrBackend: Send {
    fn kind(&self) -> BackendKind;

    fn initialize(&mut self, language: &str) -> Result<()>;

    fn extract_text(&mut self, image_path: &Path) -> Result<String>;

    fn extract_text_with_confidence(&mut self, image_path: &Path) -> Result<RecognitionResult>;

    fn set_language(&mut self, language: &str) -> Result<()>;

    fn supported_languages(&self) -> BTreeSet<String>;

    fn info(&self) -> EngineInfo;
}

/// Whether the native engine can run in this process. Computed once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendAvailability {
    pub binding_compiled: bool,
    pub engine_initializes: bool,
    pub image_codecs: bool,
    pub reason: Option<String>,
}

static AVAILABILITY: OnceLock<BackendAvailability> = OnceLock::new();

impl BackendAvailability {
    /// Process-wide availability. The first caller's tessdata path is used for
    /// the probe; later calls read the cached value.
    pub fn get(tessdata_path: Option<&str>) -> &'static BackendAvailability {
        AVAILABILITY.get_or_init(|| {
            let availability = Self::probe(tessdata_path);
            match &availability.reason {
                None => info!("Native OCR engine available"),
                Some(reason) => warn!("Native OCR engine unavailable: {}", reason),
            }
            availability
        })
    }

    fn probe(tessdata_path: Option<&str>) -> Self {
        let binding_compiled = native::BINDING_COMPILED;
        let image_codecs = image_codecs_work();

        let (engine_initializes, engine_error) = if binding_compiled {
            match native::probe_engine(tessdata_path) {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            }
        } else {
            (false, None)
        };

        let reason = if !binding_compiled {
            Some("binding not compiled (build with the `native` feature)".to_string())
        } else if let Some(e) = engine_error {
            Some(format!("engine failed to initialize: {e}"))
        } else if !image_codecs {
            Some("image codecs unavailable".to_string())
        } else {
            None
        };

        Self {
            binding_compiled,
            engine_initializes,
            image_codecs,
            reason,
        }
    }

    pub fn native_available(&self) -> bool {
        self.binding_compiled && self.engine_initializes && self.image_codecs
    }
}

/// Round-trip a 1x1 PNG through the codecs the native path relies on.
fn image_codecs_work() -> bool {
    let mut buf = Vec::new();
    if DynamicImage::new_luma8(1, 1)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .is_err()
    {
        return false;
    }
    image::load_from_memory_with_format(&buf, ImageFormat::Png).is_ok()
}

/// Builds a fresh adapter for each dispatch attempt.
pub trait BackendFactory: Send + Sync {
    fn native_available(&self, config: &OcrConfig) -> bool;

    fn native(&self, config: &OcrConfig) -> Result<Box<dyn OcrBackend>>;

    /// Fails with `NoEngineAvailable` when no managed engine is usable.
    fn managed(&self, config: &OcrConfig, language: &str) -> Result<Box<dyn OcrBackend>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn native_available(&self, config: &OcrConfig) -> bool {
        BackendAvailability::get(config.tessdata_path.as_deref()).native_available()
    }

    fn native(&self, config: &OcrConfig) -> Result<Box<dyn OcrBackend>> {
        Ok(Box::new(NativeBackend::new(config)))
    }

    fn managed(&self, config: &OcrConfig, language: &str) -> Result<Box<dyn OcrBackend>> {
        Ok(Box::new(ManagedBackend::new(config, language)?))
    }
}
