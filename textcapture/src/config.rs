use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::ocr::{DisplayLocale, PreprocessingSettings};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    /// Try the in-process engine before the managed engines.
    pub use_native: bool,
    /// Directory containing `*.traineddata`; `None` lets Tesseract search its defaults.
    pub tessdata_path: Option<String>,
    /// Command used to run the classical engine.
    pub tesseract_cmd: String,
    /// Page segmentation mode passed to the classical engine.
    pub page_seg_mode: u8,
    /// Base URL of the multilingual OCR service, e.g. `http://127.0.0.1:39835`.
    pub server_url: Option<String>,
    pub timeout_secs: u64,
    pub use_multilingual: bool,
    pub use_classical: bool,
    pub display_locale: DisplayLocale,
    pub scratch_dir: Option<PathBuf>,
    /// Results below this confidence count as empty. 0.0 disables the check.
    pub min_confidence: f32,
    pub preprocessing: PreprocessingSettings,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let defaults = PreprocessingSettings::default();

        Self {
            use_native: parse_env_or("OCR_USE_NATIVE", true),
            tessdata_path: non_empty_env("OCR_TESSDATA_PATH"),
            tesseract_cmd: non_empty_env("OCR_TESSERACT_CMD")
                .unwrap_or_else(|| "tesseract".to_string()),
            page_seg_mode: parse_env_or("OCR_TESSERACT_PSM", 6),
            server_url: non_empty_env("OCR_SERVER_URL"),
            timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
            use_multilingual: parse_env_or("OCR_USE_MULTILINGUAL", true),
            use_classical: parse_env_or("OCR_USE_CLASSICAL", true),
            display_locale: parse_env_or("OCR_DISPLAY_LOCALE", DisplayLocale::Vietnamese),
            scratch_dir: non_empty_env("OCR_SCRATCH_DIR").map(PathBuf::from),
            min_confidence: parse_env_or("OCR_MIN_CONFIDENCE", 0.0f32).clamp(0.0, 1.0),
            preprocessing: PreprocessingSettings {
                enhance_contrast: parse_env_or(
                    "OCR_PREPROCESS_ENHANCE_CONTRAST",
                    defaults.enhance_contrast,
                ),
                enhance_sharpness: parse_env_or(
                    "OCR_PREPROCESS_ENHANCE_SHARPNESS",
                    defaults.enhance_sharpness,
                ),
                denoise: parse_env_or("OCR_PREPROCESS_DENOISE", defaults.denoise),
                grayscale: parse_env_or("OCR_PREPROCESS_GRAYSCALE", defaults.grayscale),
                deskew: parse_env_or("OCR_PREPROCESS_DESKEW", defaults.deskew),
                remove_noise: parse_env_or("OCR_PREPROCESS_REMOVE_NOISE", defaults.remove_noise),
                binarize: parse_env_or("OCR_PREPROCESS_BINARIZE", defaults.binarize),
                resize: parse_env_or("OCR_PREPROCESS_RESIZE", defaults.resize),
                resize_factor: parse_env_or(
                    "OCR_PREPROCESS_RESIZE_FACTOR",
                    defaults.resize_factor,
                ),
                max_dimension: parse_env_or("OCR_MAX_DIMENSION", defaults.max_dimension),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
