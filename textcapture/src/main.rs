use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textcapture::config::Config;
use textcapture::ocr::{
    try_preprocess, BackendAvailability, DisplayLocale, Language, LanguageCodes, ManagedBackend,
    NativeBackend, OcrBackend, OcrDispatcher, PreprocessingOverrides, RecognitionMethod,
    ScratchPolicy,
};

#[derive(Parser)]
#[command(name = "textcapture")]
#[command(about = "Extract text from an image with native and managed OCR engines")]
struct Args {
    /// Image to read
    image: Option<PathBuf>,

    /// Language selector: En, Vi, Jp, Ko, Zh (or a language code)
    #[arg(short, long, default_value = "En")]
    lang: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Run the managed engine directly and report confidence scores
    #[arg(long)]
    confidence: bool,

    /// Force a managed engine: multilingual or classical
    #[arg(long)]
    method: Option<String>,

    /// Print engine availability and versions, then exit
    #[arg(long)]
    info: bool,

    /// List supported languages, then exit
    #[arg(long)]
    languages: bool,

    /// Skip preprocessing before classical recognition
    #[arg(long)]
    no_preprocess: bool,

    /// Write the preprocessed image next to the scratch files and print its path
    #[arg(long)]
    keep_processed: bool,

    /// Binarize during preprocessing
    #[arg(long)]
    binarize: bool,

    /// Skip deskewing during preprocessing
    #[arg(long)]
    no_deskew: bool,

    /// Upscale by this factor during preprocessing
    #[arg(long)]
    resize: Option<f32>,

    /// Treat results below this confidence (0-1) as empty
    #[arg(long)]
    min_confidence: Option<f32>,

    /// Message language: vi or en
    #[arg(long)]
    locale: Option<DisplayLocale>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn overrides(&self) -> PreprocessingOverrides {
        PreprocessingOverrides {
            binarize: self.binarize.then_some(true),
            deskew: self.no_deskew.then_some(false),
            resize: self.resize.map(|_| true),
            resize_factor: self.resize,
            ..Default::default()
        }
    }
}

fn init_tracing(json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "textcapture=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    init_tracing(args.json_logs);

    let mut config = Config::from_env();
    config.ocr.preprocessing = config.ocr.preprocessing.merge(&args.overrides());
    if let Some(min) = args.min_confidence {
        config.ocr.min_confidence = min.clamp(0.0, 1.0);
    }
    if let Some(locale) = args.locale {
        config.ocr.display_locale = locale;
    }

    if args.info {
        print_info(&config, &args.lang, args.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.languages {
        print_languages(&config, args.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let image = args.image.clone().unwrap_or_default();

    if args.keep_processed {
        if let Some(kept) = keep_processed_copy(&config, &image)? {
            tracing::info!(path = %kept.display(), "Preprocessed image kept");
            if !args.json {
                eprintln!("Preprocessed image: {}", kept.display());
            }
        }
    }

    if args.confidence || args.method.is_some() {
        return run_managed(&config, &args, &image);
    }

    let dispatcher = OcrDispatcher::new(config.ocr);
    let outcome = dispatcher.extract(&image, &args.lang);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.text);
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Persist a preprocessed copy of `image`. A blank path is left for the
/// dispatcher to report.
fn keep_processed_copy(config: &Config, image: &Path) -> anyhow::Result<Option<PathBuf>> {
    if image.as_os_str().to_string_lossy().trim().is_empty() {
        return Ok(None);
    }
    let scratch = ScratchPolicy::from_option(config.ocr.scratch_dir.clone());
    let processed = try_preprocess(image, &config.ocr.preprocessing, &scratch)
        .with_context(|| format!("Failed to preprocess {}", image.display()))?;
    Ok(Some(processed.keep()?))
}

fn run_managed(config: &Config, args: &Args, image: &Path) -> anyhow::Result<ExitCode> {
    let method = args
        .method
        .as_deref()
        .map(str::parse::<RecognitionMethod>)
        .transpose()?;
    let codes = LanguageCodes::resolve(&args.lang);

    let mut backend = ManagedBackend::new(&config.ocr, codes.multilingual)?;
    backend.set_preprocess(!args.no_preprocess);
    let result = backend.extract_text_with_confidence_using(image, method)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.text);
        if let Some(confidence) = result.confidence {
            eprintln!("Confidence: {:.1}%", confidence * 100.0);
        }
    }

    Ok(if result.is_blank() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_info(config: &Config, selector: &str, as_json: bool) -> anyhow::Result<()> {
    let availability = BackendAvailability::get(config.ocr.tessdata_path.as_deref());
    let native = NativeBackend::new(&config.ocr).info();
    let codes = LanguageCodes::resolve(selector);
    let managed = ManagedBackend::new(&config.ocr, codes.multilingual).map(|b| b.info());

    let info = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "native_available": availability.native_available(),
        "availability": availability,
        "native": native,
        "managed": match &managed {
            Ok(info) => json!(info),
            Err(e) => json!({ "error": e.to_string() }),
        },
        "dependencies": {
            "image": "0.25",
            "imageproc": "0.25",
            "reqwest": "0.12",
            "leptess": if availability.binding_compiled { "0.14" } else { "not compiled" },
        },
        "config": config,
    });

    if as_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    match &availability.reason {
        None => {
            let version = native.version.unwrap_or_default();
            println!("Native OCR:  available ({version})");
        }
        Some(reason) => println!("Native OCR:  unavailable ({reason})"),
    }
    match managed {
        Ok(info) => {
            println!("Managed OCR: available");
            for (key, value) in &info.details {
                println!("  {key}: {value}");
            }
            if let Some(version) = info.version {
                println!("  tesseract: {version}");
            }
        }
        Err(e) => println!("Managed OCR: unavailable ({e})"),
    }
    Ok(())
}

fn print_languages(config: &Config, as_json: bool) -> anyhow::Result<()> {
    let installed = ManagedBackend::new(&config.ocr, "en")
        .map(|b| b.supported_languages())
        .unwrap_or_default();

    if as_json {
        let selectors: Vec<_> = Language::ALL
            .iter()
            .map(|l| {
                json!({
                    "label": l.ui_label(),
                    "name": l.name(),
                    "tesseract": l.tesseract_code(),
                    "multilingual": l.multilingual_code(),
                })
            })
            .collect();
        let output = json!({ "selectors": selectors, "managed": installed });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for lang in Language::ALL {
        println!(
            "{:<3} {:<22} tesseract={:<8} multilingual={}",
            lang.ui_label(),
            lang.name(),
            lang.tesseract_code(),
            lang.multilingual_code()
        );
    }
    if !installed.is_empty() {
        let list: Vec<String> = installed.into_iter().collect();
        println!("Managed engines: {}", list.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_processed_skips_blank_path() {
        let config = Config::default();
        for blank in ["", "  "] {
            let kept = keep_processed_copy(&config, Path::new(blank)).unwrap();
            assert!(kept.is_none());
        }
    }

    #[test]
    fn test_keep_processed_reports_missing_image() {
        let config = Config::default();
        let err = keep_processed_copy(&config, Path::new("/no/such/scan.png")).unwrap_err();
        assert!(err.to_string().contains("Failed to preprocess"));
    }

    #[test]
    fn test_keep_processed_persists_copy() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("scan.png");
        image::GrayImage::from_pixel(20, 10, image::Luma([200]))
            .save(&source)
            .unwrap();
        let mut config = Config::default();
        config.ocr.scratch_dir = Some(dir.path().join("kept"));

        let kept = keep_processed_copy(&config, &source).unwrap().unwrap();
        assert!(kept.is_file());
        assert!(kept.starts_with(dir.path().join("kept")));
    }
}
