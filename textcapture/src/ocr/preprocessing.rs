use std::path::{Path, PathBuf};

use image::{
    imageops::FilterType, DynamicImage, GenericImageView, GrayImage, ImageFormat, Luma, Rgb,
    RgbImage,
};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::{filter3x3, median_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::min_area_rect;
use imageproc::morphology::{close, open};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::error::{OcrError, Result};

/// Suffix appended to the source stem when naming processed images.
pub const PROCESSED_SUFFIX: &str = "_processed";

const CLAHE_GRID: u32 = 8;
const CLAHE_CLIP_LIMIT: f32 = 2.0;
const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];
/// Fits a 2x upscale of a 300 dpi letter page.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;
/// Rotations smaller than this (degrees) are skipped to avoid resampling blur.
const MIN_DESKEW_DEGREES: f32 = 0.1;

/// Every preprocessing option, with the defaults the engines were tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingSettings {
    pub enhance_contrast: bool,
    pub enhance_sharpness: bool,
    pub denoise: bool,
    pub grayscale: bool,
    pub deskew: bool,
    pub remove_noise: bool,
    pub binarize: bool,
    pub resize: bool,
    pub resize_factor: f32,
    /// Longest side the resize stage may produce; larger targets are scaled down to fit.
    pub max_dimension: u32,
}

impl Default for PreprocessingSettings {
    fn default() -> Self {
        Self {
            enhance_contrast: true,
            enhance_sharpness: true,
            denoise: true,
            grayscale: true,
            deskew: true,
            remove_noise: true,
            binarize: false,
            resize: false,
            resize_factor: 2.0,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl PreprocessingSettings {
    /// The fixed pipeline the native engine runs before recognition.
    pub fn native_preset() -> Self {
        Self {
            enhance_contrast: true,
            enhance_sharpness: true,
            denoise: true,
            grayscale: true,
            deskew: false,
            remove_noise: false,
            binarize: false,
            resize: false,
            resize_factor: 1.0,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Settings with every stage turned off.
    pub fn disabled() -> Self {
        Self {
            enhance_contrast: false,
            enhance_sharpness: false,
            denoise: false,
            grayscale: false,
            deskew: false,
            remove_noise: false,
            binarize: false,
            resize: false,
            resize_factor: 1.0,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }

    /// Apply per-call overrides; fields left as `None` keep their current value.
    pub fn merge(self, overrides: &PreprocessingOverrides) -> Self {
        Self {
            enhance_contrast: overrides.enhance_contrast.unwrap_or(self.enhance_contrast),
            enhance_sharpness: overrides.enhance_sharpness.unwrap_or(self.enhance_sharpness),
            denoise: overrides.denoise.unwrap_or(self.denoise),
            grayscale: overrides.grayscale.unwrap_or(self.grayscale),
            deskew: overrides.deskew.unwrap_or(self.deskew),
            remove_noise: overrides.remove_noise.unwrap_or(self.remove_noise),
            binarize: overrides.binarize.unwrap_or(self.binarize),
            resize: overrides.resize.unwrap_or(self.resize),
            resize_factor: overrides.resize_factor.unwrap_or(self.resize_factor),
            max_dimension: self.max_dimension,
        }
    }

    /// Short tag for logs, e.g. `gray+contrast+sharpen`.
    pub fn describe(&self) -> String {
        let stages = [
            (self.grayscale, "gray"),
            (self.enhance_contrast, "contrast"),
            (self.enhance_sharpness, "sharpen"),
            (self.denoise, "denoise"),
            (self.remove_noise, "morph"),
            (self.deskew, "deskew"),
            (self.binarize, "binarize"),
            (self.resize, "resize"),
        ];
        let enabled: Vec<&str> = stages
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        if enabled.is_empty() {
            "none".to_string()
        } else {
            enabled.join("+")
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingOverrides {
    pub enhance_contrast: Option<bool>,
    pub enhance_sharpness: Option<bool>,
    pub denoise: Option<bool>,
    pub grayscale: Option<bool>,
    pub deskew: Option<bool>,
    pub remove_noise: Option<bool>,
    pub binarize: Option<bool>,
    pub resize: Option<bool>,
    pub resize_factor: Option<f32>,
}

/// Where processed images are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScratchPolicy {
    /// A `textcapture` directory under the OS temp dir.
    #[default]
    SystemTemp,
    Directory(PathBuf),
}

impl ScratchPolicy {
    pub fn from_option(dir: Option<PathBuf>) -> Self {
        dir.map(ScratchPolicy::Directory).unwrap_or_default()
    }

    pub fn resolve(&self) -> Result<PathBuf> {
        let dir = match self {
            ScratchPolicy::SystemTemp => std::env::temp_dir().join("textcapture"),
            ScratchPolicy::Directory(dir) => dir.clone(),
        };
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Handle to the image a backend should read.
///
/// A processed image lives in a temporary file that is removed when the handle is
/// dropped. When preprocessing fails the handle points at the untouched source.
#[derive(Debug)]
pub struct PreprocessedImage {
    path: PathBuf,
    temp: Option<TempPath>,
}

impl PreprocessedImage {
    pub fn original(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp: None,
        }
    }

    fn processed(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            temp: Some(temp),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_processed(&self) -> bool {
        self.temp.is_some()
    }

    /// Persist the processed file past the handle's lifetime and return its path.
    pub fn keep(self) -> Result<PathBuf> {
        match self.temp {
            Some(temp) => temp.keep().map_err(|e| OcrError::Io(e.error)),
            None => Ok(self.path),
        }
    }
}

/// Best-effort preprocessing of an image file.
///
/// Never fails: when the source cannot be read, decoded or the result cannot be
/// written, the returned handle refers to the original path.
pub fn preprocess(
    image_path: &Path,
    settings: &PreprocessingSettings,
    scratch: &ScratchPolicy,
) -> PreprocessedImage {
    match try_preprocess(image_path, settings, scratch) {
        Ok(processed) => processed,
        Err(e) => {
            warn!(path = %image_path.display(), "Preprocessing skipped: {e}");
            PreprocessedImage::original(image_path)
        }
    }
}

/// Preprocess an image file, surfacing every failure.
pub fn try_preprocess(
    image_path: &Path,
    settings: &PreprocessingSettings,
    scratch: &ScratchPolicy,
) -> Result<PreprocessedImage> {
    if !image_path.is_file() {
        return Err(OcrError::FileNotFound(image_path.display().to_string()));
    }

    let img = image::open(image_path)
        .map_err(|e| OcrError::ImageLoad(format!("{}: {e}", image_path.display())))?;

    let processed = preprocess_image(&img, settings);

    let dir = scratch.resolve()?;
    let temp = tempfile::Builder::new()
        .prefix(&output_prefix(image_path))
        .suffix(".png")
        .tempfile_in(&dir)?
        .into_temp_path();

    processed.save_with_format(&temp, ImageFormat::Png)?;

    debug!(
        source = %image_path.display(),
        output = %temp.display(),
        stages = %settings.describe(),
        "Preprocessed image written"
    );

    Ok(PreprocessedImage::processed(temp))
}

/// `<stem>_processed_`; the temp-file builder appends a unique tail so concurrent
/// calls on the same source never share an output file.
fn output_prefix(image_path: &Path) -> String {
    let stem = image_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}{PROCESSED_SUFFIX}_")
}

/// Working copy: either a single luma plane or RGB.
enum Canvas {
    Gray(GrayImage),
    Color(RgbImage),
}

impl Canvas {
    fn luma(&self) -> GrayImage {
        match self {
            Canvas::Gray(gray) => gray.clone(),
            Canvas::Color(rgb) => DynamicImage::ImageRgb8(rgb.clone()).to_luma8(),
        }
    }

    fn map_planes(self, f: impl Fn(&GrayImage) -> GrayImage) -> Self {
        match self {
            Canvas::Gray(gray) => Canvas::Gray(f(&gray)),
            Canvas::Color(rgb) => {
                let [r, g, b] = split_channels(&rgb);
                Canvas::Color(merge_channels(&f(&r), &f(&g), &f(&b)))
            }
        }
    }

    fn into_dynamic(self) -> DynamicImage {
        match self {
            Canvas::Gray(gray) => DynamicImage::ImageLuma8(gray),
            Canvas::Color(rgb) => DynamicImage::ImageRgb8(rgb),
        }
    }
}

/// Run the enabled stages, in order, over a copy of `img`.
pub fn preprocess_image(img: &DynamicImage, settings: &PreprocessingSettings) -> DynamicImage {
    let mut canvas = if settings.grayscale {
        Canvas::Gray(img.to_luma8())
    } else {
        Canvas::Color(img.to_rgb8())
    };

    if settings.enhance_contrast {
        canvas = canvas.map_planes(clahe);
    }

    if settings.enhance_sharpness {
        canvas = canvas.map_planes(sharpen);
    }

    if settings.denoise {
        canvas = canvas.map_planes(|plane| median_filter(plane, 1, 1));
    }

    if settings.remove_noise {
        canvas = canvas.map_planes(remove_speckles);
    }

    if settings.deskew {
        canvas = deskew(canvas);
    }

    if settings.binarize {
        canvas = Canvas::Gray(binarize(&canvas.luma()));
    }

    let mut output = canvas.into_dynamic();

    if settings.resize {
        output = resize(output, settings.resize_factor, settings.max_dimension);
    }

    output
}

/// Contrast-limited adaptive histogram equalisation over an 8x8 tile grid.
///
/// Each tile's histogram is clipped at `CLAHE_CLIP_LIMIT` times the mean bin height,
/// the excess is spread evenly, and pixels blend the four nearest tile mappings.
pub fn clahe(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(CLAHE_GRID).max(1);
    let tile_h = height.div_ceil(CLAHE_GRID).max(1);
    let tiles_x = width.div_ceil(tile_w) as usize;
    let tiles_y = height.div_ceil(tile_h) as usize;

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx as u32 * tile_w;
            let y0 = ty as u32 * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            let area = (x1 - x0) * (y1 - y0);
            luts[ty * tiles_x + tx] = clipped_equalization(&mut hist, area);
        }
    }

    let axis = |pos: u32, tile: u32, count: usize| -> (usize, usize, f32) {
        let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
        let lo = (f.floor().max(0.0) as usize).min(count - 1);
        let hi = (lo + 1).min(count - 1);
        let weight = (f - lo as f32).clamp(0.0, 1.0);
        (lo, hi, weight)
    };

    GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (x_lo, x_hi, ax) = axis(x, tile_w, tiles_x);
        let (y_lo, y_hi, ay) = axis(y, tile_h, tiles_y);

        let at = |tx: usize, ty: usize| luts[ty * tiles_x + tx][v] as f32;
        let top = at(x_lo, y_lo) * (1.0 - ax) + at(x_hi, y_lo) * ax;
        let bottom = at(x_lo, y_hi) * (1.0 - ax) + at(x_hi, y_hi) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

fn clipped_equalization(hist: &mut [u32; 256], area: u32) -> [u8; 256] {
    let clip = ((CLAHE_CLIP_LIMIT * area as f32) / 256.0).max(1.0) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cumulative += bin;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// 3x3 sharpening convolution with replicated borders.
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    filter3x3::<_, i32, u8>(gray, &SHARPEN_KERNEL)
}

/// Morphological close then open with a cross-shaped element of radius 1.
fn remove_speckles(gray: &GrayImage) -> GrayImage {
    open(&close(gray, Norm::L1, 1), Norm::L1, 1)
}

/// Global Otsu threshold: pixels above the level become white, the rest black.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Skew of the foreground, in degrees within `[-45, 45)`.
///
/// Foreground is the minority side of the Otsu split. The minimum-area rectangle
/// around it gives an edge angle; rectangles reported below -45 degrees are the
/// same rectangle turned by 90, so they are folded back.
pub fn estimate_skew_angle(gray: &GrayImage) -> f32 {
    let level = otsu_level(gray);
    let total = (gray.width() as u64) * (gray.height() as u64);
    let dark = gray.pixels().filter(|p| p[0] <= level).count() as u64;
    let dark_text = dark * 2 <= total;

    let is_foreground = |v: u8| if dark_text { v <= level } else { v > level };

    // Per row, only the outermost foreground pixels can lie on the convex hull.
    let mut points: Vec<Point<i32>> = Vec::new();
    for y in 0..gray.height() {
        let row: Vec<u32> = (0..gray.width())
            .filter(|&x| is_foreground(gray.get_pixel(x, y)[0]))
            .collect();
        if let (Some(&first), Some(&last)) = (row.first(), row.last()) {
            points.push(Point::new(first as i32, y as i32));
            if last != first {
                points.push(Point::new(last as i32, y as i32));
            }
        }
    }

    if points.len() < 3 {
        return 0.0;
    }

    let rect = min_area_rect(&points);
    let dx = (rect[1].x - rect[0].x) as f32;
    let dy = (rect[1].y - rect[0].y) as f32;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }

    normalize_rect_angle(dy.atan2(dx).to_degrees())
}

/// Reduce an edge angle to the `[-90, 0)` rectangle convention, then fold
/// angles below -45 onto the perpendicular edge.
fn normalize_rect_angle(edge_degrees: f32) -> f32 {
    let mut angle = edge_degrees % 90.0;
    if angle >= 0.0 {
        angle -= 90.0;
    }
    if angle < -45.0 {
        angle += 90.0;
    }
    angle
}

fn deskew(canvas: Canvas) -> Canvas {
    let luma = canvas.luma();
    let angle = estimate_skew_angle(&luma);
    if angle.abs() < MIN_DESKEW_DEGREES {
        return canvas;
    }

    debug!(angle, "Deskewing image");
    let theta = -angle.to_radians();
    let background = background_level(&luma);

    match canvas {
        Canvas::Gray(gray) => Canvas::Gray(rotate_about_center(
            &gray,
            theta,
            Interpolation::Bicubic,
            Luma([background]),
        )),
        Canvas::Color(rgb) => Canvas::Color(rotate_about_center(
            &rgb,
            theta,
            Interpolation::Bicubic,
            Rgb([background; 3]),
        )),
    }
}

/// Fill value for pixels uncovered by rotation: the majority side of the Otsu split.
fn background_level(gray: &GrayImage) -> u8 {
    let level = otsu_level(gray);
    let total = (gray.width() as u64) * (gray.height() as u64);
    let dark = gray.pixels().filter(|p| p[0] <= level).count() as u64;
    if dark * 2 <= total {
        255
    } else {
        0
    }
}

fn resize(img: DynamicImage, factor: f32, max_dimension: u32) -> DynamicImage {
    if !factor.is_finite() || factor <= 0.0 {
        warn!(factor, "Ignoring invalid resize factor");
        return img;
    }

    let (width, height) = img.dimensions();
    let longest = width.max(height).max(1) as f32;
    let mut scale = factor;
    if longest * factor > max_dimension as f32 {
        scale = max_dimension.max(1) as f32 / longest;
        warn!(
            factor,
            max_dimension,
            applied = scale,
            "Resize factor exceeds the dimension cap, scaling to fit"
        );
    }

    let new_width = ((width as f32 * scale) as u32).clamp(1, max_dimension.max(1));
    let new_height = ((height as f32 * scale) as u32).clamp(1, max_dimension.max(1));
    if (new_width, new_height) == (width, height) {
        return img;
    }
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

fn split_channels(rgb: &RgbImage) -> [GrayImage; 3] {
    let (w, h) = rgb.dimensions();
    let plane = |c: usize| GrayImage::from_fn(w, h, |x, y| Luma([rgb.get_pixel(x, y)[c]]));
    [plane(0), plane(1), plane(2)]
}

fn merge_channels(r: &GrayImage, g: &GrayImage, b: &GrayImage) -> RgbImage {
    RgbImage::from_fn(r.width(), r.height(), |x, y| {
        Rgb([r.get_pixel(x, y)[0], g.get_pixel(x, y)[0], b.get_pixel(x, y)[0]])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white_with_bar(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let in_row = (height / 2 - 8..height / 2 + 8).contains(&y);
            if in_row && (40..width - 40).contains(&x) {
                Luma([0])
            } else {
                Luma([255])
            }
        })
    }

    fn low_contrast_gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([100 + (x % 40) as u8]))
    }

    fn spread(gray: &GrayImage) -> u8 {
        let min = gray.pixels().map(|p| p[0]).min().unwrap_or(0);
        let max = gray.pixels().map(|p| p[0]).max().unwrap_or(0);
        max - min
    }

    #[test]
    fn test_default_settings_match_documented_defaults() {
        let s = PreprocessingSettings::default();
        assert!(s.enhance_contrast && s.enhance_sharpness && s.denoise && s.grayscale);
        assert!(s.deskew && s.remove_noise);
        assert!(!s.binarize && !s.resize);
        assert_eq!(s.resize_factor, 2.0);
    }

    #[test]
    fn test_merge_overrides_only_present_fields() {
        let merged = PreprocessingSettings::default().merge(&PreprocessingOverrides {
            binarize: Some(true),
            deskew: Some(false),
            resize_factor: Some(3.0),
            ..Default::default()
        });

        assert!(merged.binarize);
        assert!(!merged.deskew);
        assert_eq!(merged.resize_factor, 3.0);
        assert!(merged.enhance_contrast, "untouched fields keep defaults");
        assert!(!merged.resize);
    }

    #[test]
    fn test_describe_lists_enabled_stages() {
        assert_eq!(PreprocessingSettings::disabled().describe(), "none");
        assert_eq!(
            PreprocessingSettings::native_preset().describe(),
            "gray+contrast+sharpen+denoise"
        );
    }

    #[test]
    fn test_clahe_stretches_low_contrast_input() {
        let gray = low_contrast_gradient(256, 256);
        let enhanced = clahe(&gray);
        assert_eq!(enhanced.dimensions(), gray.dimensions());
        assert!(spread(&enhanced) > spread(&gray));
    }

    #[test]
    fn test_clahe_handles_tiny_images() {
        let gray = GrayImage::from_pixel(3, 2, Luma([90]));
        let enhanced = clahe(&gray);
        assert_eq!(enhanced.dimensions(), (3, 2));
    }

    #[test]
    fn test_sharpen_keeps_flat_regions_flat() {
        let gray = GrayImage::from_pixel(16, 16, Luma([120]));
        let sharpened = sharpen(&gray);
        assert!(sharpened.pixels().all(|p| p[0] == 120));
    }

    #[test]
    fn test_sharpen_boosts_edges() {
        let gray = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 100 } else { 150 }]));
        let sharpened = sharpen(&gray);
        assert!(sharpened.get_pixel(4, 5)[0] < 100);
        assert!(sharpened.get_pixel(5, 5)[0] > 150);
    }

    #[test]
    fn test_binarize_produces_two_levels() {
        let gray = low_contrast_gradient(40, 10);
        let binary = binarize(&gray);
        assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(binary.pixels().any(|p| p[0] == 0));
        assert!(binary.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn test_rect_angle_normalization() {
        assert_eq!(normalize_rect_angle(0.0), 0.0);
        assert_eq!(normalize_rect_angle(90.0), 0.0);
        assert!((normalize_rect_angle(10.0) - 10.0).abs() < 1e-4);
        assert!((normalize_rect_angle(-80.0) - 10.0).abs() < 1e-4);
        assert!((normalize_rect_angle(-10.0) + 10.0).abs() < 1e-4);
        assert!((normalize_rect_angle(100.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_skew_of_level_bar_is_zero() {
        let angle = estimate_skew_angle(&white_with_bar(240, 120));
        assert!(angle.abs() < 0.5, "got {angle}");
    }

    #[test]
    fn test_deskew_straightens_rotated_bar() {
        let bar = white_with_bar(240, 160);
        let skewed = rotate_about_center(
            &bar,
            10f32.to_radians(),
            Interpolation::Nearest,
            Luma([255]),
        );

        let angle = estimate_skew_angle(&skewed);
        assert!((angle.abs() - 10.0).abs() < 1.5, "estimated {angle}");

        let straightened = match deskew(Canvas::Gray(skewed)) {
            Canvas::Gray(gray) => gray,
            Canvas::Color(_) => panic!("grayscale input must stay grayscale"),
        };
        let residual = estimate_skew_angle(&straightened);
        assert!(residual.abs() < 1.5, "residual skew {residual}");
    }

    #[test]
    fn test_blank_image_has_no_skew() {
        let blank = GrayImage::from_pixel(50, 50, Luma([255]));
        assert_eq!(estimate_skew_angle(&blank), 0.0);
    }

    #[test]
    fn test_pipeline_grayscale_output() {
        let img = DynamicImage::new_rgb8(60, 40);
        let out = preprocess_image(&img, &PreprocessingSettings::default());
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!(out.dimensions(), (60, 40));
    }

    #[test]
    fn test_pipeline_color_output_when_grayscale_disabled() {
        let settings = PreprocessingSettings {
            grayscale: false,
            deskew: false,
            ..Default::default()
        };
        let img = DynamicImage::new_rgba8(30, 20);
        let out = preprocess_image(&img, &settings);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_pipeline_binarize_forces_grayscale() {
        let settings = PreprocessingSettings {
            grayscale: false,
            binarize: true,
            ..PreprocessingSettings::disabled()
        };
        let out = preprocess_image(&DynamicImage::new_rgb8(20, 20), &settings);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_resize_scales_dimensions() {
        let settings = PreprocessingSettings {
            resize: true,
            resize_factor: 2.0,
            ..PreprocessingSettings::disabled()
        };
        let out = preprocess_image(&DynamicImage::new_luma8(25, 10), &settings);
        assert_eq!(out.dimensions(), (50, 20));
    }

    #[test]
    fn test_invalid_resize_factor_is_ignored() {
        let out = resize(DynamicImage::new_luma8(25, 10), 0.0, DEFAULT_MAX_DIMENSION);
        assert_eq!(out.dimensions(), (25, 10));
    }

    #[test]
    fn test_huge_resize_factor_is_capped() {
        let out = resize(DynamicImage::new_luma8(100, 50), 1000.0, 400);
        assert_eq!(out.dimensions(), (400, 200));
    }

    #[test]
    fn test_image_at_cap_is_left_alone() {
        let out = resize(DynamicImage::new_luma8(400, 30), 3.0, 400);
        assert_eq!(out.dimensions(), (400, 30));
    }

    #[test]
    fn test_output_prefix_uses_stem_and_suffix() {
        assert_eq!(
            output_prefix(Path::new("/photos/receipt.scan.jpg")),
            "receipt.scan_processed_"
        );
    }

    #[test]
    fn test_scratch_policy_from_option() {
        assert_eq!(ScratchPolicy::from_option(None), ScratchPolicy::SystemTemp);
        assert_eq!(
            ScratchPolicy::from_option(Some(PathBuf::from("/tmp/x"))),
            ScratchPolicy::Directory(PathBuf::from("/tmp/x"))
        );
    }
}
