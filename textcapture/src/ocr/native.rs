//! In-process Tesseract engine via `leptess`.
//!
//! Compiled only with the `native` feature. Without it every adapter reports the
//! engine as unavailable and the dispatcher goes straight to the managed engines.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, info};

use crate::config::OcrConfig;
use crate::error::{OcrError, Result};

use super::backend::{BackendKind, EngineInfo, OcrBackend};
use super::result::RecognitionResult;

#[cfg(feature = "native")]
use leptess::{LepTess, Variable};

#[cfg(feature = "native")]
use super::preprocessing::{preprocess_image, PreprocessingSettings};
#[cfg(feature = "native")]
use super::result::parse_tsv;

pub const BINDING_COMPILED: bool = cfg!(feature = "native");

const BINDING_VERSION: &str = "leptess 0.14";

/// Languages the native engine is built to handle (Tesseract codes).
pub const NATIVE_LANGUAGES: [&str; 9] = [
    "eng", "vie", "chi_sim", "chi_tra", "jpn", "kor", "tha", "ara", "hin",
];

/// Tesseract's fully automatic page segmentation.
#[cfg(feature = "native")]
const PSM_AUTO: &str = "3";

#[cfg(feature = "native")]
fn new_engine(tessdata_path: Option<&str>, language: &str) -> Result<LepTess> {
    let mut engine = LepTess::new(tessdata_path, language)
        .map_err(|e| OcrError::BackendExecution(format!("Failed to initialize Tesseract: {e}")))?;
    engine
        .set_variable(Variable::TesseditPagesegMode, PSM_AUTO)
        .map_err(|e| OcrError::BackendExecution(format!("Failed to set page segmentation: {e}")))?;
    Ok(engine)
}

/// Try to bring an English engine up once.
#[cfg(feature = "native")]
pub fn probe_engine(tessdata_path: Option<&str>) -> Result<()> {
    new_engine(tessdata_path, "eng").map(|_| ())
}

#[cfg(not(feature = "native"))]
pub fn probe_engine(_tessdata_path: Option<&str>) -> Result<()> {
    Err(not_compiled())
}

#[cfg(not(feature = "native"))]
fn not_compiled() -> OcrError {
    OcrError::BackendUnavailable("native OCR support was not compiled in".to_string())
}

pub struct NativeBackend {
    tessdata_path: Option<String>,
    language: Option<String>,
    #[cfg(feature = "native")]
    engine: Option<LepTess>,
}

impl NativeBackend {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            tessdata_path: config.tessdata_path.clone(),
            language: None,
            #[cfg(feature = "native")]
            engine: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        #[cfg(feature = "native")]
        {
            self.engine.is_some()
        }
        #[cfg(not(feature = "native"))]
        {
            false
        }
    }

    fn check_ready(&self, image_path: &Path) -> Result<()> {
        if !self.is_initialized() {
            return Err(OcrError::NotInitialized);
        }
        if !image_path.is_file() {
            return Err(OcrError::FileNotFound(image_path.display().to_string()));
        }
        Ok(())
    }

    #[cfg(feature = "native")]
    fn start(&mut self, language: &str) -> Result<()> {
        let engine = new_engine(self.tessdata_path.as_deref(), language)?;
        self.engine = Some(engine);
        self.language = Some(language.to_string());
        info!(language, "Native Tesseract engine initialized");
        Ok(())
    }

    #[cfg(not(feature = "native"))]
    fn start(&mut self, _language: &str) -> Result<()> {
        Err(not_compiled())
    }

    /// Load, preprocess and hand the image to the engine.
    #[cfg(feature = "native")]
    fn load(&mut self, image_path: &Path) -> Result<&mut LepTess> {
        let img = image::open(image_path)
            .map_err(|e| OcrError::ImageLoad(format!("{}: {e}", image_path.display())))?;
        let processed = preprocess_image(&img, &PreprocessingSettings::native_preset());

        let mut png = Vec::new();
        processed.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;

        let engine = self.engine.as_mut().ok_or(OcrError::NotInitialized)?;
        engine
            .set_image_from_mem(&png)
            .map_err(|e| OcrError::BackendExecution(format!("Failed to set image: {e}")))?;
        Ok(engine)
    }

    #[cfg(feature = "native")]
    fn recognize(&mut self, image_path: &Path) -> Result<RecognitionResult> {
        let engine = self.load(image_path)?;

        let text = engine
            .get_utf8_text()
            .map_err(|e| OcrError::BackendExecution(format!("Failed to extract text: {e}")))?;
        let tsv = engine
            .get_tsv_text(0)
            .map_err(|e| OcrError::BackendExecution(format!("Failed to read word data: {e}")))?;

        let words = parse_tsv(&tsv);
        let confidences: Vec<f32> = words.iter().map(|w| w.confidence / 100.0).collect();
        let confidence = (!confidences.is_empty())
            .then(|| super::result::mean_confidence(&confidences));

        Ok(RecognitionResult {
            text_parts: text.split_whitespace().map(str::to_string).collect(),
            text: text.trim().to_string(),
            confidence,
            bounding_boxes: words.iter().map(|w| w.bounds).collect(),
            confidences,
        })
    }

    #[cfg(not(feature = "native"))]
    fn recognize(&mut self, _image_path: &Path) -> Result<RecognitionResult> {
        Err(not_compiled())
    }
}

impl OcrBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    fn initialize(&mut self, language: &str) -> Result<()> {
        self.start(language)
    }

    fn extract_text(&mut self, image_path: &Path) -> Result<String> {
        self.check_ready(image_path)?;

        #[cfg(feature = "native")]
        {
            let engine = self.load(image_path)?;
            let text = engine
                .get_utf8_text()
                .map_err(|e| OcrError::BackendExecution(format!("Failed to extract text: {e}")))?;
            debug!(chars = text.len(), "Native extraction finished");
            Ok(text.trim().to_string())
        }
        #[cfg(not(feature = "native"))]
        {
            Err(not_compiled())
        }
    }

    fn extract_text_with_confidence(&mut self, image_path: &Path) -> Result<RecognitionResult> {
        self.check_ready(image_path)?;
        let result = self.recognize(image_path)?;
        debug!(confidence = ?result.confidence, "Native extraction finished");
        Ok(result)
    }

    fn set_language(&mut self, language: &str) -> Result<()> {
        info!(language, "Re-initializing native engine");
        self.start(language)
    }

    fn supported_languages(&self) -> BTreeSet<String> {
        NATIVE_LANGUAGES.iter().map(|l| l.to_string()).collect()
    }

    fn info(&self) -> EngineInfo {
        let mut details = BTreeMap::new();
        details.insert("binding_compiled".to_string(), BINDING_COMPILED.to_string());
        if let Some(path) = &self.tessdata_path {
            details.insert("tessdata_path".to_string(), path.clone());
        }

        EngineInfo {
            name: "Native Tesseract".to_string(),
            available: BINDING_COMPILED,
            initialized: self.is_initialized(),
            language: self.language.clone(),
            version: Some(BINDING_VERSION.to_string()),
            details,
        }
    }
}
