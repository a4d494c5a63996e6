//! Language selectors and the per-backend code tables.
//!
//! The UI offers a short list of labels ("En", "Vi", "Jp", ...). Each label maps to
//! a three-letter Tesseract code for the native and classical engines, and to the
//! code the multilingual engine expects. Anything unrecognised resolves to English.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Vietnamese,
    Japanese,
    Korean,
    ChineseSimplified,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Vietnamese,
        Language::Japanese,
        Language::Korean,
        Language::ChineseSimplified,
    ];

    /// Resolve a UI selector, language name or backend code. Unknown input is English.
    pub fn from_selector(selector: &str) -> Self {
        Self::lookup(selector).unwrap_or_default()
    }

    /// Like `from_selector`, but `None` for anything unrecognised.
    pub fn lookup(selector: &str) -> Option<Self> {
        let key = selector.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.aliases().contains(&key.as_str()))
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Language::English => &["en", "eng", "english"],
            Language::Vietnamese => &["vi", "vie", "vietnamese", "tiếng việt"],
            Language::Japanese => &["jp", "ja", "jpn", "japanese"],
            Language::Korean => &["ko", "kor", "korean"],
            Language::ChineseSimplified => &["zh", "ch_sim", "chi_sim", "chinese", "zh-cn"],
        }
    }

    /// Label shown in the language picker.
    pub fn ui_label(self) -> &'static str {
        match self {
            Language::English => "En",
            Language::Vietnamese => "Vi",
            Language::Japanese => "Jp",
            Language::Korean => "Ko",
            Language::ChineseSimplified => "Zh",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Vietnamese => "Vietnamese",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::ChineseSimplified => "Chinese (Simplified)",
        }
    }

    pub fn tesseract_code(self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::Vietnamese => "vie",
            Language::Japanese => "jpn",
            Language::Korean => "kor",
            Language::ChineseSimplified => "chi_sim",
        }
    }

    pub fn multilingual_code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Vietnamese => "vi",
            Language::Japanese => "ja",
            Language::Korean => "ko",
            Language::ChineseSimplified => "ch_sim",
        }
    }

    /// Languages whose native recognition quality is poor enough that the
    /// dispatcher routes them straight to the managed engines.
    pub fn skips_native(self) -> bool {
        matches!(self, Language::Japanese)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.tesseract_code())
    }
}

/// Both backend codes for one selector, resolved once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageCodes {
    pub language: Language,
    pub tesseract: &'static str,
    pub multilingual: &'static str,
}

impl LanguageCodes {
    pub fn resolve(selector: &str) -> Self {
        let language = Language::from_selector(selector);
        Self {
            language,
            tesseract: language.tesseract_code(),
            multilingual: language.multilingual_code(),
        }
    }
}
