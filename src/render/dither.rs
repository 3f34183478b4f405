//! # Monochrome Conversion
//!
//! Label printers only print black or white dots, so every image goes through
//! exactly one of these passes before it reaches the bridge:
//!
//! | Algorithm | Use |
//! |-----------|-----|
//! | Threshold | Images that are already (almost) black and white: text labels, line art |
//! | Floyd–Steinberg | Photos; error diffusion keeps detail at 203 DPI |
//! | Bayer 8x8 | Ordered halftone, deterministic and parallel |
//!
//! All three are deterministic: the same input always yields the same bitmap.
//!
//! ```
//! use labelbot::render::dither::pack_row;
//!
//! let row = vec![true, true, false, false, true, false, true, false];
//! assert_eq!(pack_row(&row), vec![0b11001010]);
//! ```

use image::GrayImage;
use rayon::prelude::*;

use super::bitmap::Bitmap;

/// Luminance below which a pixel prints black in threshold mode.
pub const THRESHOLD_LEVEL: u8 = 128;

/// Bayer 8x8 dithering matrix (values 0-63).
pub const BAYER8: [[u8; 8]; 8] = [
    [0, 32, 8, 40, 2, 34, 10, 42],
    [48, 16, 56, 24, 50, 18, 58, 26],
    [12, 44, 4, 36, 14, 46, 6, 38],
    [60, 28, 52, 20, 62, 30, 54, 22],
    [3, 35, 11, 43, 1, 33, 9, 41],
    [51, 19, 59, 27, 49, 17, 57, 25],
    [15, 47, 7, 39, 13, 45, 5, 37],
    [63, 31, 55, 23, 61, 29, 53, 21],
];

/// Monochrome conversion method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitheringAlgorithm {
    Threshold,
    Bayer,
    #[default]
    FloydSteinberg,
}

impl DitheringAlgorithm {
    /// Parse a user-supplied name, falling back to Floyd–Steinberg.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "none" | "threshold" => Self::Threshold,
            "bayer" => Self::Bayer,
            _ => Self::FloydSteinberg,
        }
    }
}

/// Bayer threshold for a pixel position, in (0, 1).
#[inline]
pub fn bayer_threshold(x: usize, y: usize) -> f32 {
    let matrix_value = BAYER8[y & 7][x & 7];
    (matrix_value as f32 + 0.5) / 64.0
}

/// Pack a row of pixels (true = black) into MSB-first bytes, zero padded.
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            bytes[i / 8] |= 1 << (7 - (i % 8));
        }
    }

    bytes
}

/// Check if an image is already binary (1-bit black/white).
///
/// Returns true if 80%+ of pixels are near pure black or pure white, which
/// tolerates anti-aliased edges and compression noise.
pub fn is_binary_image(gray: &GrayImage) -> bool {
    const TOLERANCE: u8 = 20;
    const MIN_BINARY_RATIO: f32 = 0.80;

    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return false;
    }

    let binary_count = gray
        .pixels()
        .filter(|p| p.0[0] <= TOLERANCE || p.0[0] >= (255 - TOLERANCE))
        .count();

    (binary_count as f32 / total as f32) >= MIN_BINARY_RATIO
}

/// Pick threshold for binary input, error diffusion otherwise.
pub fn choose_algorithm(gray: &GrayImage) -> DitheringAlgorithm {
    if is_binary_image(gray) {
        DitheringAlgorithm::Threshold
    } else {
        DitheringAlgorithm::FloydSteinberg
    }
}

/// Convert a grayscale image to a packed bitmap.
pub fn dither(gray: &GrayImage, algorithm: DitheringAlgorithm) -> Bitmap {
    let (width, height) = gray.dimensions();
    let data = match algorithm {
        DitheringAlgorithm::Threshold => pack_rows_parallel(gray, |_, _, v| v < THRESHOLD_LEVEL),
        DitheringAlgorithm::Bayer => pack_rows_parallel(gray, |x, y, v| {
            let intensity = 1.0 - (v as f32 / 255.0);
            intensity > bayer_threshold(x, y)
        }),
        DitheringAlgorithm::FloydSteinberg => floyd_steinberg(gray),
    };

    Bitmap::from_packed(width, height, data).unwrap_or_else(|_| Bitmap::new(width, height))
}

/// Point operations have no cross-row dependency, so rows pack in parallel.
fn pack_rows_parallel<F>(gray: &GrayImage, is_black: F) -> Vec<u8>
where
    F: Fn(usize, usize, u8) -> bool + Sync,
{
    let (width, height) = gray.dimensions();
    (0..height)
        .into_par_iter()
        .map(|y| {
            let row: Vec<bool> = (0..width)
                .map(|x| is_black(x as usize, y as usize, gray.get_pixel(x, y)[0]))
                .collect();
            pack_row(&row)
        })
        .collect::<Vec<Vec<u8>>>()
        .concat()
}

/// Floyd–Steinberg error diffusion (7/16, 3/16, 5/16, 1/16).
fn floyd_steinberg(gray: &GrayImage) -> Vec<u8> {
    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);
    let mut buffer: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32).collect();
    let mut data = Vec::with_capacity(w.div_ceil(8) * h);

    for y in 0..h {
        let mut row = Vec::with_capacity(w);
        for x in 0..w {
            let idx = y * w + x;
            let old = buffer[idx];
            let black = old < THRESHOLD_LEVEL as f32;
            let new = if black { 0.0 } else { 255.0 };
            let err = old - new;
            row.push(black);

            if x + 1 < w {
                buffer[idx + 1] += err * 7.0 / 16.0;
            }
            if y + 1 < h {
                if x > 0 {
                    buffer[idx + w - 1] += err * 3.0 / 16.0;
                }
                buffer[idx + w] += err * 5.0 / 16.0;
                if x + 1 < w {
                    buffer[idx + w + 1] += err * 1.0 / 16.0;
                }
            }
        }
        data.extend(pack_row(&row));
    }

    data
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn solid(width: u32, height: u32, value: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([value]))
    }

    #[test]
    fn test_bayer_matrix_values() {
        let mut seen = [false; 64];
        for row in &BAYER8 {
            for &val in row {
                assert!(!seen[val as usize], "Duplicate value {}", val);
                seen[val as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_pack_row_padding() {
        assert_eq!(pack_row(&[true, true, true, true]), vec![0xF0]);
        assert_eq!(pack_row(&[true; 9]), vec![0xFF, 0x80]);
        assert_eq!(pack_row(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_all_algorithms_keep_black_and_white() {
        for algo in [
            DitheringAlgorithm::Threshold,
            DitheringAlgorithm::Bayer,
            DitheringAlgorithm::FloydSteinberg,
        ] {
            let black = dither(&solid(16, 4, 0), algo);
            assert_eq!(black.black_dots(), 64, "{:?} black", algo);
            let white = dither(&solid(16, 4, 255), algo);
            assert_eq!(white.black_dots(), 0, "{:?} white", algo);
        }
    }

    #[test]
    fn test_floyd_steinberg_mid_gray_is_half() {
        let bmp = dither(&solid(64, 64, 128), DitheringAlgorithm::FloydSteinberg);
        let ratio = bmp.black_dots() as f32 / (64.0 * 64.0);
        assert!(ratio > 0.4 && ratio < 0.6, "ratio {}", ratio);
    }

    #[test]
    fn test_dither_is_deterministic() {
        let mut img = GrayImage::new(33, 17);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Luma([((x * 7 + y * 13) % 256) as u8]);
        }
        for algo in [DitheringAlgorithm::Bayer, DitheringAlgorithm::FloydSteinberg] {
            assert_eq!(dither(&img, algo), dither(&img, algo));
        }
    }

    #[test]
    fn test_binary_detection() {
        let mut img = solid(10, 10, 255);
        for x in 0..10 {
            img.put_pixel(x, 5, Luma([0]));
        }
        assert!(is_binary_image(&img));
        assert_eq!(choose_algorithm(&img), DitheringAlgorithm::Threshold);
        assert!(!is_binary_image(&solid(10, 10, 128)));
        assert_eq!(
            choose_algorithm(&solid(10, 10, 128)),
            DitheringAlgorithm::FloydSteinberg
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(DitheringAlgorithm::parse("none"), DitheringAlgorithm::Threshold);
        assert_eq!(DitheringAlgorithm::parse("BAYER"), DitheringAlgorithm::Bayer);
        assert_eq!(DitheringAlgorithm::parse("fs"), DitheringAlgorithm::FloydSteinberg);
    }
}
