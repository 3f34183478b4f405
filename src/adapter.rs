//! # Image Adapter
//!
//! Turns a rendered text label or an arbitrary uploaded image into a
//! [`PrintJob`] that fits one printer profile.
//!
//! ```text
//! source ──► decode ──► rotate ──► shrink to max_width ──► dither ──► PrintJob
//!                                   (Lanczos3, never up)     (1-bit)
//! ```
//!
//! Density is clamped to the model ceiling with a warning, never rejected.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::{debug, warn};

use crate::error::{LabelbotError, Result};
use crate::printer::{PaperType, PrinterProfile, Rotation};
use crate::render::dither::{self, DitheringAlgorithm};
use crate::render::text::{self, LabelPhrase};
use crate::render::Bitmap;

/// Smallest edge a scaled bitmap may have and still be worth printing.
pub const MIN_EDGE: u32 = 8;

/// What to print.
#[derive(Debug, Clone)]
pub enum LabelSource {
    /// A phrase, rendered on the label canvas
    Text(LabelPhrase),
    /// Encoded image bytes (PNG, JPEG, BMP, ...)
    Image(Vec<u8>),
}

/// Caller-side print parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptOptions {
    /// Requested density 1-5, clamped per model
    pub density: u8,
    pub rotation: Rotation,
    pub paper_type: PaperType,
    /// Force a monochrome conversion; `None` picks one from the content
    pub algorithm: Option<DitheringAlgorithm>,
}

impl Default for AdaptOptions {
    fn default() -> Self {
        Self {
            density: 3,
            rotation: Rotation::R0,
            paper_type: PaperType::Small,
            algorithm: None,
        }
    }
}

/// A fully prepared, immediately printable job. Consumed once by the bridge.
#[derive(Debug, Clone)]
pub struct PrintJob {
    pub bitmap: Bitmap,
    /// Density after clamping to the profile
    pub density: u8,
    pub rotation: Rotation,
    pub paper_type: PaperType,
    /// Non-fatal adjustments made while preparing the job
    pub warnings: Vec<String>,
    /// The phrase, when the job came from text
    pub phrase: Option<LabelPhrase>,
}

/// [`adapt`] on the blocking pool, for callers on the async runtime.
pub async fn adapt_blocking(source: LabelSource, profile: PrinterProfile, options: AdaptOptions) -> Result<PrintJob> {
    tokio::task::spawn_blocking(move || adapt(&source, &profile, options))
        .await
        .map_err(|e| LabelbotError::Render(format!("Image task failed: {}", e)))?
}

/// Prepare a print job for `profile`.
pub fn adapt(source: &LabelSource, profile: &PrinterProfile, options: AdaptOptions) -> Result<PrintJob> {
    let clamp = profile.clamp_density(options.density);
    let mut warnings = Vec::new();
    if let Some(warning) = clamp.warning {
        warn!(model = %profile.model, requested = clamp.requested, applied = clamp.applied, "density clamped");
        warnings.push(warning);
    }

    let (image, phrase) = match source {
        LabelSource::Text(phrase) => {
            if phrase.is_empty() {
                return Err(LabelbotError::Render("Label phrase is empty".to_string()));
            }
            let canvas = text::render_label(phrase)?;
            (DynamicImage::ImageLuma8(canvas), Some(phrase.clone()))
        }
        LabelSource::Image(bytes) => (decode_image(bytes)?, None),
    };

    let rotated = rotate(image, options.rotation);
    let fitted = fit_width(rotated, profile.max_width)?;
    let gray = fitted.to_luma8();
    let algorithm = options
        .algorithm
        .unwrap_or_else(|| dither::choose_algorithm(&gray));
    let bitmap = dither::dither(&gray, algorithm);

    debug!(
        width = bitmap.width(),
        height = bitmap.height(),
        algorithm = ?algorithm,
        density = clamp.applied,
        "print job prepared"
    );

    Ok(PrintJob {
        bitmap,
        density: clamp.applied,
        rotation: options.rotation,
        paper_type: options.paper_type,
        warnings,
        phrase,
    })
}

/// Decode image bytes, flattening any transparency onto white.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(LabelbotError::Render("Image is empty (0 bytes)".to_string()));
    }

    #[cfg(feature = "heif")]
    if is_heic(bytes) {
        return decode_heic(bytes).map(flatten_alpha);
    }

    let img = image::load_from_memory(bytes)
        .map_err(|e| LabelbotError::Render(format!("Failed to decode image: {}", e)))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(LabelbotError::Render("Image has zero size".to_string()));
    }
    Ok(flatten_alpha(img))
}

/// Composite onto white so transparent areas print as paper, not ink.
fn flatten_alpha(img: DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }
    let rgba = img.to_rgba8();
    let mut out = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([255, 255, 255, 255]));
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgba([blend(r), blend(g), blend(b), 255]));
    }
    DynamicImage::ImageRgba8(out)
}

/// Clockwise rotation; 90 and 270 swap the canvas dimensions.
fn rotate(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::R0 => img,
        Rotation::R90 => img.rotate90(),
        Rotation::R180 => img.rotate180(),
        Rotation::R270 => img.rotate270(),
    }
}

/// Shrink to `max_width` preserving aspect ratio. Never upscales.
fn fit_width(img: DynamicImage, max_width: u32) -> Result<DynamicImage> {
    let (width, height) = (img.width(), img.height());
    if width <= max_width {
        return Ok(img);
    }

    let scale = max_width as f64 / width as f64;
    let new_height = (height as f64 * scale).round() as u32;
    if new_height < MIN_EDGE {
        return Err(LabelbotError::Render(format!(
            "Image {}x{} is too wide to print: scaling to {} dots leaves {} rows",
            width, height, max_width, new_height
        )));
    }

    debug!(from_width = width, to_width = max_width, to_height = new_height, "scaling image down");
    Ok(img.resize_exact(max_width, new_height, FilterType::Lanczos3))
}

/// HEIC files carry an "ftyp" box with a HEIF brand right after the size.
#[cfg(feature = "heif")]
fn is_heic(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }
    matches!(
        &data[8..12],
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" | b"hevm" | b"hevs" | b"mif1" | b"msf1"
    )
}

#[cfg(feature = "heif")]
fn decode_heic(data: &[u8]) -> Result<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_err = |e: libheif_rs::HeifError| LabelbotError::Render(format!("Failed to decode HEIC: {}", e));
    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data).map_err(heif_err)?;
    let handle = ctx.primary_image_handle().map_err(heif_err)?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(heif_err)?;

    let planes = decoded.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| LabelbotError::Render("No interleaved RGB data in HEIC".to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    let mut rgb = image::RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let offset = y as usize * interleaved.stride + x as usize * 3;
            if offset + 2 < interleaved.data.len() {
                let px = &interleaved.data[offset..offset + 3];
                rgb.put_pixel(x, y, image::Rgb([px[0], px[1], px[2]]));
            }
        }
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

// ============================================================================
// TESTS
// ============================================================================
