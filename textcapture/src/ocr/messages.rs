//! User-facing messages produced by the dispatcher.
//!
//! Every failure the caller can see is rendered here, in the configured display
//! locale, with a short list of remediation hints.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayLocale {
    #[default]
    Vietnamese,
    English,
}

impl FromStr for DisplayLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vi" | "vie" | "vietnamese" => Ok(DisplayLocale::Vietnamese),
            "en" | "eng" | "english" => Ok(DisplayLocale::English),
            other => Err(format!("unknown display locale '{other}' (expected 'vi' or 'en')")),
        }
    }
}

impl fmt::Display for DisplayLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayLocale::Vietnamese => write!(f, "vi"),
            DisplayLocale::English => write!(f, "en"),
        }
    }
}

fn with_hints(headline: String, title: &str, hints: &[&str]) -> String {
    let mut message = headline;
    message.push_str("\n\n💡 ");
    message.push_str(title);
    message.push(':');
    for hint in hints {
        message.push_str("\n- ");
        message.push_str(hint);
    }
    message
}

impl DisplayLocale {
    fn hint_title(self) -> &'static str {
        match self {
            DisplayLocale::Vietnamese => "Gợi ý",
            DisplayLocale::English => "Suggestions",
        }
    }

    pub fn select_image(self) -> String {
        match self {
            DisplayLocale::Vietnamese => "Vui lòng chọn ảnh trước khi thực hiện OCR".into(),
            DisplayLocale::English => "Please select an image before running OCR".into(),
        }
    }

    pub fn image_not_found(self, path: &str) -> String {
        let headline = match self {
            DisplayLocale::Vietnamese => format!("❌ Không tìm thấy ảnh: {path}"),
            DisplayLocale::English => format!("❌ Image not found: {path}"),
        };
        let hints: &[&str] = match self {
            DisplayLocale::Vietnamese => &["Kiểm tra đường dẫn tới ảnh", "Chọn lại ảnh"],
            DisplayLocale::English => &["Check the image path", "Select the image again"],
        };
        with_hints(headline, self.hint_title(), hints)
    }

    pub fn japanese_no_text(self) -> String {
        let headline = match self {
            DisplayLocale::Vietnamese => "❌ Không thể nhận dạng văn bản tiếng Nhật từ ảnh này.",
            DisplayLocale::English => "❌ Could not recognize any Japanese text in this image.",
        };
        let hints: &[&str] = match self {
            DisplayLocale::Vietnamese => &[
                "Kiểm tra chất lượng ảnh",
                "Đảm bảo ảnh có text rõ ràng",
                "Thử với ảnh khác",
            ],
            DisplayLocale::English => &[
                "Check the image quality",
                "Make sure the text in the image is clear",
                "Try another image",
            ],
        };
        with_hints(headline.to_string(), self.hint_title(), hints)
    }

    pub fn managed_error(self, diagnostic: &str) -> String {
        match self {
            DisplayLocale::Vietnamese => format!("❌ OCR dự phòng lỗi: {diagnostic}"),
            DisplayLocale::English => format!("❌ Managed OCR failed: {diagnostic}"),
        }
    }

    pub fn no_text(self) -> String {
        let headline = match self {
            DisplayLocale::Vietnamese => "❌ Không thể nhận dạng văn bản từ ảnh này.",
            DisplayLocale::English => "❌ Could not recognize any text in this image.",
        };
        let hints: &[&str] = match self {
            DisplayLocale::Vietnamese => &[
                "Kiểm tra chất lượng ảnh",
                "Đảm bảo ảnh có text rõ ràng",
                "Thử với ngôn ngữ khác",
            ],
            DisplayLocale::English => &[
                "Check the image quality",
                "Make sure the text in the image is clear",
                "Try a different language",
            ],
        };
        with_hints(headline.to_string(), self.hint_title(), hints)
    }

    /// Both engines failed; embeds the native diagnostic and the managed error.
    pub fn all_failed(self, native_diagnostic: &str, managed_diagnostic: &str) -> String {
        let headline = match self {
            DisplayLocale::Vietnamese => format!(
                "❌ Cả OCR tích hợp và OCR dự phòng đều lỗi:\n\nTích hợp: {native_diagnostic}\nDự phòng: {managed_diagnostic}"
            ),
            DisplayLocale::English => format!(
                "❌ Both native and managed OCR failed:\n\nNative: {native_diagnostic}\nManaged: {managed_diagnostic}"
            ),
        };
        let hints: &[&str] = match self {
            DisplayLocale::Vietnamese => &[
                "Kiểm tra ảnh có hợp lệ không",
                "Thử ảnh khác",
                "Kiểm tra cài đặt Tesseract",
            ],
            DisplayLocale::English => &[
                "Check that the image is valid",
                "Try another image",
                "Check the Tesseract installation",
            ],
        };
        with_hints(headline, self.hint_title(), hints)
    }

    pub fn native_empty(self) -> String {
        match self {
            DisplayLocale::Vietnamese => {
                "OCR tích hợp không nhận diện được text, đang thử OCR dự phòng...".into()
            }
            DisplayLocale::English => "Native OCR found no text, trying managed OCR...".into(),
        }
    }

    pub fn native_failed(self, error: &str) -> String {
        match self {
            DisplayLocale::Vietnamese => {
                format!("OCR tích hợp lỗi: {error}, đang thử OCR dự phòng...")
            }
            DisplayLocale::English => format!("Native OCR failed: {error}, trying managed OCR..."),
        }
    }

    /// Native error that rules out a fallback attempt.
    pub fn native_error(self, error: &str) -> String {
        match self {
            DisplayLocale::Vietnamese => format!("❌ OCR tích hợp lỗi: {error}"),
            DisplayLocale::English => format!("❌ Native OCR failed: {error}"),
        }
    }

    pub fn native_unavailable(self) -> String {
        match self {
            DisplayLocale::Vietnamese => {
                "OCR tích hợp không khả dụng, đang thử OCR dự phòng...".into()
            }
            DisplayLocale::English => "Native OCR is unavailable, trying managed OCR...".into(),
        }
    }
}
