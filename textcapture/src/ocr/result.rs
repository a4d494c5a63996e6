use serde::Serialize;

/// Axis-aligned box around a recognised segment, in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Smallest box containing every polygon point. Empty polygons give a zero box.
    pub fn from_polygon(points: &[[f64; 2]]) -> Self {
        if points.is_empty() {
            return Self::default();
        }

        let min_x = points.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min);
        let min_y = points.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p[0]).fold(f64::NEG_INFINITY, f64::max);
        let max_y = points.iter().map(|p| p[1]).fold(f64::NEG_INFINITY, f64::max);

        Self {
            x: min_x.max(0.0) as u32,
            y: min_y.max(0.0) as u32,
            width: (max_x - min_x).max(0.0) as u32,
            height: (max_y - min_y).max(0.0) as u32,
        }
    }
}

/// Output of one successful backend invocation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RecognitionResult {
    pub text: String,
    /// Mean confidence in `[0, 1]`; `None` when the engine reports nothing.
    pub confidence: Option<f32>,
    pub text_parts: Vec<String>,
    pub confidences: Vec<f32>,
    pub bounding_boxes: Vec<BoundingBox>,
}

impl RecognitionResult {
    /// True when the text is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        is_blank(&self.text)
    }
}

pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean_confidence(confidences: &[f32]) -> f32 {
    if confidences.is_empty() {
        return 0.0;
    }
    confidences.iter().sum::<f32>() / confidences.len() as f32
}

/// Mean over scores strictly greater than zero. Scores `<= 0` mean "no data"
/// and are dropped from both numerator and denominator.
pub fn mean_positive_confidence(confidences: &[f32]) -> f32 {
    let positive: Vec<f32> = confidences.iter().copied().filter(|c| *c > 0.0).collect();
    mean_confidence(&positive)
}

/// One word row of Tesseract's TSV output.
#[derive(Debug, Clone, PartialEq)]
pub struct TsvWord {
    pub text: String,
    /// Raw Tesseract confidence, 0-100. `-1` rows never reach this type.
    pub confidence: f32,
    pub bounds: BoundingBox,
}

/// Parse Tesseract TSV (`level page block par line word left top width height conf text`).
///
/// Only word-level rows (level 5) are returned. The header line, structural rows
/// and malformed lines are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<TsvWord> {
    tsv.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 11 {
                return None;
            }

            let level: u32 = fields[0].trim().parse().ok()?;
            if level != 5 {
                return None;
            }

            let confidence: f32 = fields[10].trim().parse().ok()?;
            if confidence < 0.0 {
                return None;
            }

            let number = |i: usize| fields[i].trim().parse::<u32>().unwrap_or(0);
            Some(TsvWord {
                text: fields.get(11).map(|t| t.trim().to_string()).unwrap_or_default(),
                confidence,
                bounds: BoundingBox {
                    x: number(6),
                    y: number(7),
                    width: number(8),
                    height: number(9),
                },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
2\t1\t1\t0\t0\t0\t36\t92\t582\t28\t-1\t
5\t1\t1\t1\t1\t1\t36\t92\t81\t24\t96.063751\tHello
5\t1\t1\t1\t1\t2\t128\t92\t96\t24\t91.5\tWorld
5\t1\t1\t1\t1\t3\t230\t92\t12\t24\t0\t
";

    #[test]
    fn test_mean_positive_excludes_non_positive_scores() {
        let mean = mean_positive_confidence(&[0.9, 0.7, 0.0]);
        assert!((mean - 0.8).abs() < 1e-6, "got {mean}");

        let mean = mean_positive_confidence(&[-1.0, 50.0, 0.0, 70.0]);
        assert!((mean - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_mean_of_nothing_is_zero() {
        assert_eq!(mean_confidence(&[]), 0.0);
        assert_eq!(mean_positive_confidence(&[0.0, -1.0]), 0.0);
    }

    #[test]
    fn test_parse_tsv_keeps_word_rows_only() {
        let words = parse_tsv(SAMPLE_TSV);
        assert_eq!(words.len(), 3);
        assert_eq!(words[0].text, "Hello");
        assert_eq!(
            words[0].bounds,
            BoundingBox {
                x: 36,
                y: 92,
                width: 81,
                height: 24
            }
        );
        assert!((words[1].confidence - 91.5).abs() < f32::EPSILON);
        assert_eq!(words[2].confidence, 0.0);
    }

    #[test]
    fn test_parse_tsv_tolerates_garbage() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("not\ta\ttsv").is_empty());
        assert!(parse_tsv("5\t1\t1\t1\t1\t1\t0\t0\t1\t1\tNaNish\tx").is_empty());
    }

    #[test]
    fn test_bounding_box_from_polygon() {
        let bbox = BoundingBox::from_polygon(&[
            [10.0, 20.0],
            [110.0, 20.0],
            [110.0, 45.5],
            [10.0, 45.5],
        ]);
        assert_eq!(
            bbox,
            BoundingBox {
                x: 10,
                y: 20,
                width: 100,
                height: 25
            }
        );
        assert_eq!(BoundingBox::from_polygon(&[]), BoundingBox::default());
    }

    #[test]
    fn test_blank_detection() {
        assert!(is_blank(""));
        assert!(is_blank(" \n\t "));
        assert!(!is_blank(" a "));
    }
}
