#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{GrayImage, Luma};

use textcapture::config::{Config, OcrConfig};
use textcapture::error::{OcrError, Result};
use textcapture::ocr::{
    BackendFactory, BackendKind, DisplayLocale, EngineInfo, OcrBackend, RecognitionResult,
};

/// White canvas with a few dark "text lines".
pub fn text_like_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let line = (y / 12) % 2 == 1 && y < height - 6;
        let glyph = (x / 7) % 3 != 2;
        let margin = x > 8 && x < width - 8;
        if line && glyph && margin {
            Luma([20])
        } else {
            Luma([235])
        }
    })
}

/// Write a generated image into `dir` and return its path.
pub fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    text_like_image(160, 96)
        .save(&path)
        .unwrap_or_else(|e| panic!("Failed to write fixture '{name}': {e}"));
    path
}

/// Config with no real engines and English messages.
pub fn test_config() -> OcrConfig {
    let mut config = Config::default().ocr;
    config.use_native = true;
    config.server_url = None;
    config.tesseract_cmd = "textcapture-no-such-tesseract".to_string();
    config.display_locale = DisplayLocale::English;
    config.min_confidence = 0.0;
    config
}

/// What a scripted backend does when asked for text.
#[derive(Debug, Clone)]
pub enum Script {
    Text(&'static str),
    TextWithConfidence(&'static str, f32),
    Blank,
    Fail(&'static str),
    /// Extraction reports an engine that lost its language data.
    Uninitialized,
    /// Construction fails, as when no engine is installed.
    Unavailable,
}

#[derive(Default)]
pub struct Calls {
    pub native_created: AtomicUsize,
    pub managed_created: AtomicUsize,
    pub extractions: AtomicUsize,
    pub languages: Mutex<Vec<(BackendKind, String)>>,
}

impl Calls {
    pub fn native(&self) -> usize {
        self.native_created.load(Ordering::SeqCst)
    }

    pub fn managed(&self) -> usize {
        self.managed_created.load(Ordering::SeqCst)
    }

    pub fn languages(&self) -> Vec<(BackendKind, String)> {
        self.languages.lock().unwrap().clone()
    }
}

pub struct ScriptedFactory {
    pub native_available: bool,
    pub native: Script,
    pub managed: Script,
    pub calls: Arc<Calls>,
}

impl ScriptedFactory {
    pub fn new(native: Script, managed: Script) -> Self {
        Self {
            native_available: true,
            native,
            managed,
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn without_native(managed: Script) -> Self {
        Self {
            native_available: false,
            ..Self::new(Script::Text("unused"), managed)
        }
    }

    fn build(&self, kind: BackendKind, script: &Script) -> Result<Box<dyn OcrBackend>> {
        if let Script::Unavailable = script {
            return Err(OcrError::NoEngineAvailable("scripted".to_string()));
        }
        Ok(Box::new(ScriptedBackend {
            kind,
            script: script.clone(),
            language: None,
            calls: Arc::clone(&self.calls),
        }))
    }
}

impl BackendFactory for ScriptedFactory {
    fn native_available(&self, _config: &OcrConfig) -> bool {
        self.native_available
    }

    fn native(&self, _config: &OcrConfig) -> Result<Box<dyn OcrBackend>> {
        self.calls.native_created.fetch_add(1, Ordering::SeqCst);
        self.build(BackendKind::Native, &self.native)
    }

    fn managed(&self, _config: &OcrConfig, _language: &str) -> Result<Box<dyn OcrBackend>> {
        self.calls.managed_created.fetch_add(1, Ordering::SeqCst);
        self.build(BackendKind::Managed, &self.managed)
    }
}

pub struct ScriptedBackend {
    kind: BackendKind,
    script: Script,
    language: Option<String>,
    calls: Arc<Calls>,
}

impl OcrBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn initialize(&mut self, language: &str) -> Result<()> {
        self.language = Some(language.to_string());
        self.calls
            .languages
            .lock()
            .unwrap()
            .push((self.kind, language.to_string()));
        Ok(())
    }

    fn extract_text(&mut self, image_path: &Path) -> Result<String> {
        Ok(self.extract_text_with_confidence(image_path)?.text)
    }

    fn extract_text_with_confidence(&mut self, _image_path: &Path) -> Result<RecognitionResult> {
        if self.language.is_none() {
            return Err(OcrError::NotInitialized);
        }
        self.calls.extractions.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Text(text) => Ok(RecognitionResult {
                text: text.to_string(),
                confidence: Some(0.9),
                ..Default::default()
            }),
            Script::TextWithConfidence(text, confidence) => Ok(RecognitionResult {
                text: text.to_string(),
                confidence: Some(*confidence),
                ..Default::default()
            }),
            Script::Blank => Ok(RecognitionResult {
                text: "  \n".to_string(),
                confidence: Some(0.0),
                ..Default::default()
            }),
            Script::Fail(reason) => Err(OcrError::BackendExecution(reason.to_string())),
            Script::Uninitialized => Err(OcrError::NotInitialized),
            Script::Unavailable => Err(OcrError::BackendUnavailable("scripted".to_string())),
        }
    }

    fn set_language(&mut self, language: &str) -> Result<()> {
        self.initialize(language)
    }

    fn supported_languages(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            name: format!("scripted {}", self.kind),
            available: true,
            initialized: self.language.is_some(),
            language: self.language.clone(),
            version: None,
            details: BTreeMap::new(),
        }
    }
}
