//! Backend selection and fallback.
//!
//! One call to [`OcrDispatcher::extract`] runs at most two strictly sequential
//! attempts: the native engine, then the managed engines. Japanese skips the
//! native engine. Errors that are not recoverable (see
//! [`OcrError::is_recoverable`]) end the request without a fallback. Every
//! backend error is folded into the returned [`DispatchOutcome`]; `extract`
//! itself never fails.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::OcrConfig;
use crate::error::{OcrError, Result};

use super::backend::{BackendFactory, BackendKind, DefaultBackendFactory};
use super::language::{Language, LanguageCodes};
use super::messages::DisplayLocale;
use super::result::is_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Dispatching,
    NativeAttempt,
    ManagedAttempt,
    Resolved(Resolution),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Recognized { chars: usize },
    Empty,
    LowConfidence { confidence: f32 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub backend: BackendKind,
    pub language: String,
    pub outcome: AttemptOutcome,
}

/// Final answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    /// Recognised text on success, otherwise the user-facing message.
    pub text: String,
    /// Diagnostic from the attempts that did not succeed, if any.
    pub diagnostic: Option<String>,
    pub resolution: Resolution,
    pub language: Language,
    /// Backend that produced the text.
    pub backend: Option<BackendKind>,
    pub attempts: Vec<Attempt>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.resolution == Resolution::Success
    }

    fn failure(
        text: String,
        diagnostic: Option<String>,
        language: Language,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            text,
            diagnostic,
            resolution: Resolution::Failure,
            language,
            backend: None,
            attempts,
        }
    }

    fn success(
        text: String,
        backend: BackendKind,
        diagnostic: Option<String>,
        language: Language,
        attempts: Vec<Attempt>,
    ) -> Self {
        Self {
            text,
            diagnostic,
            resolution: Resolution::Success,
            language,
            backend: Some(backend),
            attempts,
        }
    }
}

enum Extraction {
    Text(String),
    Empty,
    LowConfidence(f32),
}

pub struct OcrDispatcher {
    config: OcrConfig,
    factory: Arc<dyn BackendFactory>,
}

impl OcrDispatcher {
    pub fn new(config: OcrConfig) -> Self {
        Self::with_factory(config, Arc::new(DefaultBackendFactory))
    }

    pub fn with_factory(config: OcrConfig, factory: Arc<dyn BackendFactory>) -> Self {
        Self { config, factory }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn locale(&self) -> DisplayLocale {
        self.config.display_locale
    }

    pub fn extract(&self, image_path: impl AsRef<Path>, selector: &str) -> DispatchOutcome {
        self.extract_observed(image_path.as_ref(), selector, &mut |_| {})
    }

    /// `extract`, reporting each state transition to `observe`.
    pub fn extract_observed(
        &self,
        image_path: &Path,
        selector: &str,
        observe: &mut dyn FnMut(DispatchState),
    ) -> DispatchOutcome {
        observe(DispatchState::Dispatching);
        let outcome = self.dispatch(image_path, selector, observe);
        observe(DispatchState::Resolved(outcome.resolution));
        info!(
            resolution = ?outcome.resolution,
            backend = ?outcome.backend,
            attempts = outcome.attempts.len(),
            "OCR request resolved"
        );
        outcome
    }

    fn dispatch(
        &self,
        image_path: &Path,
        selector: &str,
        observe: &mut dyn FnMut(DispatchState),
    ) -> DispatchOutcome {
        let locale = self.locale();
        let codes = LanguageCodes::resolve(selector);
        let language = codes.language;

        let path_text = image_path.to_string_lossy();
        if path_text.trim().is_empty() {
            return DispatchOutcome::failure(locale.select_image(), None, language, Vec::new());
        }
        if !image_path.is_file() {
            let err = OcrError::InvalidInput(format!("image not found: {path_text}"));
            return DispatchOutcome::failure(
                locale.image_not_found(&path_text),
                Some(err.to_string()),
                language,
                Vec::new(),
            );
        }

        let mut attempts = Vec::new();

        if language.skips_native() {
            info!(language = %language, "Routing straight to managed OCR");
            observe(DispatchState::ManagedAttempt);
            let managed = self.attempt(
                BackendKind::Managed,
                codes.multilingual,
                image_path,
                &mut attempts,
            );
            return match managed {
                Ok(Extraction::Text(text)) => {
                    DispatchOutcome::success(text, BackendKind::Managed, None, language, attempts)
                }
                Ok(_) => {
                    DispatchOutcome::failure(locale.japanese_no_text(), None, language, attempts)
                }
                Err(e) => {
                    let diagnostic = e.to_string();
                    DispatchOutcome::failure(
                        locale.managed_error(&diagnostic),
                        Some(diagnostic),
                        language,
                        attempts,
                    )
                }
            };
        }

        let native_diagnostic = if !self.config.use_native {
            debug!("Native OCR disabled by configuration");
            locale.native_unavailable()
        } else if !self.factory.native_available(&self.config) {
            warn!("Native OCR unavailable, using managed OCR");
            locale.native_unavailable()
        } else {
            observe(DispatchState::NativeAttempt);
            let native = self.attempt(
                BackendKind::Native,
                codes.tesseract,
                image_path,
                &mut attempts,
            );
            match native {
                Ok(Extraction::Text(text)) => {
                    let backend = BackendKind::Native;
                    return DispatchOutcome::success(text, backend, None, language, attempts);
                }
                Ok(_) => {
                    info!("Native OCR recognized no text, falling back to managed OCR");
                    locale.native_empty()
                }
                Err(e) if !e.is_recoverable() => {
                    warn!("Native OCR failed: {}, not retrying", e);
                    let diagnostic = e.to_string();
                    return DispatchOutcome::failure(
                        locale.native_error(&diagnostic),
                        Some(diagnostic),
                        language,
                        attempts,
                    );
                }
                Err(e) => {
                    warn!("Native OCR failed: {}, falling back to managed OCR", e);
                    locale.native_failed(&e.to_string())
                }
            }
        };

        observe(DispatchState::ManagedAttempt);
        let managed = self.attempt(
            BackendKind::Managed,
            codes.multilingual,
            image_path,
            &mut attempts,
        );
        match managed {
            Ok(Extraction::Text(text)) => DispatchOutcome::success(
                text,
                BackendKind::Managed,
                Some(native_diagnostic),
                language,
                attempts,
            ),
            Ok(_) => {
                let diagnostic = Some(native_diagnostic);
                DispatchOutcome::failure(locale.no_text(), diagnostic, language, attempts)
            }
            Err(e) => {
                let managed_diagnostic = e.to_string();
                DispatchOutcome::failure(
                    locale.all_failed(&native_diagnostic, &managed_diagnostic),
                    Some(format!("{native_diagnostic}; {managed_diagnostic}")),
                    language,
                    attempts,
                )
            }
        }
    }

    /// Run one backend and record what happened.
    fn attempt(
        &self,
        kind: BackendKind,
        language: &str,
        image_path: &Path,
        attempts: &mut Vec<Attempt>,
    ) -> Result<Extraction> {
        info!(backend = %kind, language, "Attempting OCR");
        let result = self.invoke(kind, language, image_path);

        let outcome = match &result {
            Ok(Extraction::Text(text)) => AttemptOutcome::Recognized {
                chars: text.chars().count(),
            },
            Ok(Extraction::Empty) => AttemptOutcome::Empty,
            Ok(Extraction::LowConfidence(confidence)) => AttemptOutcome::LowConfidence {
                confidence: *confidence,
            },
            Err(e) => AttemptOutcome::Failed {
                error: e.to_string(),
            },
        };
        attempts.push(Attempt {
            backend: kind,
            language: language.to_string(),
            outcome,
        });

        result
    }

    fn invoke(&self, kind: BackendKind, language: &str, image_path: &Path) -> Result<Extraction> {
        let mut backend = match kind {
            BackendKind::Native => self.factory.native(&self.config)?,
            BackendKind::Managed => self.factory.managed(&self.config, language)?,
        };
        backend.initialize(language)?;

        let min_confidence = self.config.min_confidence;
        if min_confidence <= 0.0 {
            let text = backend.extract_text(image_path)?;
            return Ok(if is_blank(&text) {
                Extraction::Empty
            } else {
                Extraction::Text(text)
            });
        }

        let result = backend.extract_text_with_confidence(image_path)?;
        if result.is_blank() {
            return Ok(Extraction::Empty);
        }
        match result.confidence {
            Some(confidence) if confidence < min_confidence => {
                info!(confidence, min_confidence, "Discarding weak result");
                Ok(Extraction::LowConfidence(confidence))
            }
            _ => Ok(Extraction::Text(result.text)),
        }
    }
}

/// One caller's handle on a dispatcher: at most one request in flight.
pub struct OcrSession {
    dispatcher: OcrDispatcher,
    busy: AtomicBool,
    state: Mutex<DispatchState>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OcrSession {
    pub fn new(dispatcher: OcrDispatcher) -> Self {
        Self {
            dispatcher,
            busy: AtomicBool::new(false),
            state: Mutex::new(DispatchState::Idle),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn state(&self) -> DispatchState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(DispatchState::Idle)
    }

    /// Fails with `Busy` while another request from this session is running.
    pub fn extract(
        &self,
        image_path: impl AsRef<Path>,
        selector: &str,
    ) -> Result<DispatchOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejecting OCR request: another request is in flight");
            return Err(OcrError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let outcome = self
            .dispatcher
            .extract_observed(image_path.as_ref(), selector, &mut |next| {
                debug!(state = ?next, "Dispatch state");
                if let Ok(mut state) = self.state.lock() {
                    *state = next;
                }
            });
        Ok(outcome)
    }
}
