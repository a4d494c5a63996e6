use std::collections::BTreeSet;
use std::path::Path;
use std::process::{Command, Output};

use tracing::debug;

use crate::config::OcrConfig;
use crate::error::{OcrError, Result};

use super::language::Language;
use super::preprocessing::{preprocess, PreprocessedImage, PreprocessingSettings, ScratchPolicy};
use super::result::{mean_positive_confidence, parse_tsv, RecognitionResult};

/// The Tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct ClassicalEngine {
    command: String,
    page_seg_mode: u8,
    language: String,
    preprocessing: PreprocessingSettings,
    scratch: ScratchPolicy,
}

/// Tesseract wants three-letter codes; known ISO codes are translated, anything
/// else is passed through untouched.
fn tesseract_code(language: &str) -> String {
    Language::lookup(language)
        .map(|lang| lang.tesseract_code().to_string())
        .unwrap_or_else(|| language.to_string())
}

impl ClassicalEngine {
    pub fn new(config: &OcrConfig, language: &str) -> Self {
        Self {
            command: config.tesseract_cmd.clone(),
            page_seg_mode: config.page_seg_mode,
            language: tesseract_code(language),
            preprocessing: config.preprocessing,
            scratch: ScratchPolicy::from_option(config.scratch_dir.clone()),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: &str) {
        self.language = tesseract_code(language);
    }

    pub fn is_installed(&self) -> bool {
        self.version().is_ok()
    }

    /// First line of `tesseract --version`, e.g. `tesseract 5.3.0`.
    pub fn version(&self) -> Result<String> {
        let output = self.run(&["--version"])?;
        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        String::from_utf8_lossy(banner)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| OcrError::BackendExecution("tesseract printed no version".to_string()))
    }

    pub fn list_languages(&self) -> Result<BTreeSet<String>> {
        let output = self.run(&["--list-langs"])?;
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("List of"))
            .map(str::to_string)
            .collect())
    }

    pub fn extract_text(&self, image_path: &Path, preprocess: bool) -> Result<String> {
        let input = self.prepare(image_path, preprocess)?;
        let stdout = self.recognize(input.path(), None)?;
        Ok(stdout.trim().to_string())
    }

    /// Words with a confidence above zero, averaged on a 0-1 scale.
    pub fn extract_text_with_confidence(
        &self,
        image_path: &Path,
        preprocess: bool,
    ) -> Result<RecognitionResult> {
        let input = self.prepare(image_path, preprocess)?;
        let tsv = self.recognize(input.path(), Some("tsv"))?;

        let words: Vec<_> = parse_tsv(&tsv)
            .into_iter()
            .filter(|w| w.confidence > 0.0)
            .collect();
        let confidences: Vec<f32> = words.iter().map(|w| w.confidence / 100.0).collect();
        let text_parts: Vec<String> = words.iter().map(|w| w.text.clone()).collect();

        Ok(RecognitionResult {
            text: text_parts.join(" "),
            confidence: Some(mean_positive_confidence(&confidences)),
            text_parts,
            confidences,
            bounding_boxes: words.iter().map(|w| w.bounds).collect(),
        })
    }

    fn prepare(&self, image_path: &Path, preprocess_first: bool) -> Result<PreprocessedImage> {
        if !image_path.is_file() {
            return Err(OcrError::FileNotFound(image_path.display().to_string()));
        }
        if preprocess_first {
            Ok(preprocess(image_path, &self.preprocessing, &self.scratch))
        } else {
            Ok(PreprocessedImage::original(image_path))
        }
    }

    fn recognize(&self, image_path: &Path, output_config: Option<&str>) -> Result<String> {
        let psm = self.page_seg_mode.to_string();
        let image = image_path.to_string_lossy();
        let mut args = vec![
            image.as_ref(),
            "stdout",
            "-l",
            self.language.as_str(),
            "--psm",
            psm.as_str(),
        ];
        if let Some(config) = output_config {
            args.push(config);
        }

        debug!(command = %self.command, ?args, "Running classical engine");
        let output = self.run(&args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::BackendExecution(format!(
                "tesseract failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        match Command::new(&self.command).args(args).output() {
            Ok(output) => Ok(output),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::BackendUnavailable(
                format!("'{}' not found (install tesseract-ocr)", self.command),
            )),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}
