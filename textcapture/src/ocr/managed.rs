use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::OcrConfig;
use crate::error::{OcrError, Result};

use super::api::{MultilingualClient, MULTILINGUAL_LANGUAGES};
use super::backend::{BackendKind, EngineInfo, OcrBackend};
use super::classical::ClassicalEngine;
use super::result::RecognitionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionMethod {
    /// Neural engine behind the local OCR service.
    Multilingual,
    /// The Tesseract command-line tool.
    Classical,
}

impl FromStr for RecognitionMethod {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "multilingual" | "easyocr" | "neural" => Ok(RecognitionMethod::Multilingual),
            "classical" | "tesseract" => Ok(RecognitionMethod::Classical),
            other => Err(OcrError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for RecognitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionMethod::Multilingual => write!(f, "multilingual"),
            RecognitionMethod::Classical => write!(f, "classical"),
        }
    }
}

/// Managed recognition: the multilingual service when it answers, the
/// classical tool otherwise.
pub struct ManagedBackend {
    language: String,
    multilingual: Option<MultilingualClient>,
    classical: Option<ClassicalEngine>,
    default_method: RecognitionMethod,
    server_url: Option<String>,
    timeout_secs: u64,
    use_multilingual: bool,
    use_classical: bool,
    preprocess: bool,
}

impl ManagedBackend {
    /// Probe the enabled engines for `language`.
    ///
    /// Fails with `NoEngineAvailable` when neither engine can be used.
    pub fn new(config: &OcrConfig, language: &str) -> Result<Self> {
        let multilingual = if config.use_multilingual {
            connect_multilingual(config.server_url.as_deref(), language, config.timeout_secs)
        } else {
            None
        };

        let classical = if config.use_classical {
            let engine = ClassicalEngine::new(config, language);
            if engine.is_installed() {
                Some(engine)
            } else {
                warn!(command = %config.tesseract_cmd, "Classical OCR engine not installed");
                None
            }
        } else {
            None
        };

        let default_method = match (&multilingual, &classical) {
            (Some(_), _) => RecognitionMethod::Multilingual,
            (None, Some(_)) => RecognitionMethod::Classical,
            (None, None) => {
                return Err(OcrError::NoEngineAvailable(
                    "neither the multilingual service nor the tesseract tool is usable".to_string(),
                ))
            }
        };

        info!(language, method = %default_method, "Managed OCR backend ready");

        Ok(Self {
            language: language.to_string(),
            multilingual,
            classical,
            default_method,
            server_url: config.server_url.clone(),
            timeout_secs: config.timeout_secs,
            use_multilingual: config.use_multilingual,
            use_classical: config.use_classical,
            preprocess: true,
        })
    }

    pub fn default_method(&self) -> RecognitionMethod {
        self.default_method
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether the classical engine preprocesses before recognition.
    pub fn set_preprocess(&mut self, preprocess: bool) {
        self.preprocess = preprocess;
    }

    pub fn extract_text_with(
        &self,
        image_path: &Path,
        method: Option<RecognitionMethod>,
    ) -> Result<String> {
        match self.engine(method)? {
            Engine::Multilingual(client) => {
                check_file(image_path)?;
                Ok(client.recognize(image_path)?.text)
            }
            Engine::Classical(engine) => engine.extract_text(image_path, self.preprocess),
        }
    }

    pub fn extract_text_with_confidence_using(
        &self,
        image_path: &Path,
        method: Option<RecognitionMethod>,
    ) -> Result<RecognitionResult> {
        match self.engine(method)? {
            Engine::Multilingual(client) => {
                check_file(image_path)?;
                client.recognize(image_path)
            }
            Engine::Classical(engine) => {
                engine.extract_text_with_confidence(image_path, self.preprocess)
            }
        }
    }

    fn engine(&self, method: Option<RecognitionMethod>) -> Result<Engine<'_>> {
        let method = method.unwrap_or(self.default_method);
        match method {
            RecognitionMethod::Multilingual => self
                .multilingual
                .as_ref()
                .map(Engine::Multilingual)
                .ok_or_else(|| OcrError::UnsupportedMethod(method.to_string())),
            RecognitionMethod::Classical => self
                .classical
                .as_ref()
                .map(Engine::Classical)
                .ok_or_else(|| OcrError::UnsupportedMethod(method.to_string())),
        }
    }
}

enum Engine<'a> {
    Multilingual(&'a MultilingualClient),
    Classical(&'a ClassicalEngine),
}

fn connect_multilingual(
    server_url: Option<&str>,
    language: &str,
    timeout_secs: u64,
) -> Option<MultilingualClient> {
    let Some(url) = server_url else {
        info!("No OCR service configured; multilingual engine disabled");
        return None;
    };

    match MultilingualClient::connect(url, language, timeout_secs) {
        Ok(client) => {
            info!(url, language, "Multilingual OCR service connected");
            Some(client)
        }
        Err(e) => {
            warn!("Multilingual OCR engine unavailable: {}", e);
            None
        }
    }
}

fn check_file(image_path: &Path) -> Result<()> {
    if image_path.is_file() {
        Ok(())
    } else {
        Err(OcrError::FileNotFound(image_path.display().to_string()))
    }
}

impl OcrBackend for ManagedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Managed
    }

    /// Ready from construction; only a different language triggers a reload.
    fn initialize(&mut self, language: &str) -> Result<()> {
        if language == self.language {
            return Ok(());
        }
        self.set_language(language)
    }

    fn extract_text(&mut self, image_path: &Path) -> Result<String> {
        self.extract_text_with(image_path, None)
    }

    fn extract_text_with_confidence(&mut self, image_path: &Path) -> Result<RecognitionResult> {
        self.extract_text_with_confidence_using(image_path, None)
    }

    /// Rebuilds the multilingual client (new health probe). On failure nothing changes.
    fn set_language(&mut self, language: &str) -> Result<()> {
        if self.multilingual.is_some() {
            if let Some(url) = self.server_url.as_deref() {
                let client = MultilingualClient::connect(url, language, self.timeout_secs)?;
                self.multilingual = Some(client);
            }
        }
        if let Some(classical) = self.classical.as_mut() {
            classical.set_language(language);
        }
        self.language = language.to_string();
        info!(language, "Managed OCR language changed");
        Ok(())
    }

    fn supported_languages(&self) -> BTreeSet<String> {
        let mut languages = BTreeSet::new();
        if self.multilingual.is_some() {
            languages.extend(MULTILINGUAL_LANGUAGES.iter().map(|l| l.to_string()));
        }
        if let Some(classical) = &self.classical {
            match classical.list_languages() {
                Ok(installed) => languages.extend(installed),
                Err(e) => warn!("Could not list tesseract languages: {}", e),
            }
        }
        languages
    }

    fn info(&self) -> EngineInfo {
        let mut details = BTreeMap::new();
        details.insert(
            "multilingual_available".to_string(),
            self.multilingual.is_some().to_string(),
        );
        details.insert(
            "classical_available".to_string(),
            self.classical.is_some().to_string(),
        );
        details.insert(
            "use_multilingual".to_string(),
            self.use_multilingual.to_string(),
        );
        details.insert("use_classical".to_string(), self.use_classical.to_string());
        details.insert(
            "default_method".to_string(),
            self.default_method.to_string(),
        );
        if let Some(url) = &self.server_url {
            details.insert("server_url".to_string(), url.clone());
        }

        EngineInfo {
            name: "Managed OCR".to_string(),
            available: true,
            initialized: true,
            language: Some(self.language.clone()),
            version: self.classical.as_ref().and_then(|c| c.version().ok()),
            details,
        }
    }
}
