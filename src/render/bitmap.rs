//! # Monochrome Bitmaps
//!
//! A [`Bitmap`] is the only image representation the printer accepts: one bit
//! per dot, rows packed MSB-first, `1` = black.
//!
//! ```text
//! x:     0 1 2 3 4 5 6 7 | 8 9 ...
//! byte:  b7 ........... b0 | b7 ...
//! ```

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};

use crate::error::{LabelbotError, Result};

/// Packed 1-bit image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// An all-white bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        let width_bytes = (width as usize).div_ceil(8);
        Self {
            width,
            height,
            data: vec![0u8; width_bytes * height as usize],
        }
    }

    /// Wrap already-packed row data.
    pub fn from_packed(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = (width as usize).div_ceil(8) * height as usize;
        if data.len() != expected {
            return Err(LabelbotError::Render(format!(
                "Packed data is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per packed row.
    pub fn width_bytes(&self) -> usize {
        (self.width as usize).div_ceil(8)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packed bytes of one row.
    pub fn row(&self, y: u32) -> &[u8] {
        let wb = self.width_bytes();
        let start = y as usize * wb;
        &self.data[start..start + wb]
    }

    /// Iterate packed rows top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(self.width_bytes().max(1))
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        let idx = y as usize * self.width_bytes() + x as usize / 8;
        (self.data[idx] >> (7 - (x % 8))) & 1 == 1
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, black: bool) {
        let idx = y as usize * self.width_bytes() + x as usize / 8;
        let bit = 1 << (7 - (x % 8));
        if black {
            self.data[idx] |= bit;
        } else {
            self.data[idx] &= !bit;
        }
    }

    /// Number of black dots.
    pub fn black_dots(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Expand to an 8-bit grayscale image (black = 0, white = 255).
    pub fn to_gray(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = if self.get(x, y) { 0u8 } else { 255u8 };
                img.put_pixel(x, y, Luma([color]));
            }
        }
        img
    }

    /// Encode as a PNG file.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(self.to_gray())
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| LabelbotError::Render(format!("Failed to encode PNG: {}", e)))?;
        Ok(bytes)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_white() {
        let bmp = Bitmap::new(12, 3);
        assert_eq!(bmp.width_bytes(), 2);
        assert_eq!(bmp.data().len(), 6);
        assert_eq!(bmp.black_dots(), 0);
    }

    #[test]
    fn test_set_get_msb_first() {
        let mut bmp = Bitmap::new(16, 1);
        bmp.set(0, 0, true);
        bmp.set(9, 0, true);
        assert_eq!(bmp.row(0), &[0x80, 0x40]);
        assert!(bmp.get(9, 0));
        bmp.set(0, 0, false);
        assert_eq!(bmp.row(0), &[0x00, 0x40]);
    }

    #[test]
    fn test_from_packed_checks_length() {
        assert!(Bitmap::from_packed(8, 2, vec![0xFF, 0x00]).is_ok());
        assert!(Bitmap::from_packed(9, 2, vec![0xFF, 0x00]).is_err());
    }

    #[test]
    fn test_png_decodes_back() {
        let mut bmp = Bitmap::new(10, 4);
        bmp.set(3, 2, true);
        let png = bmp.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (10, 4));
        assert_eq!(decoded.get_pixel(3, 2)[0], 0);
        assert_eq!(decoded.get_pixel(4, 2)[0], 255);
    }
}
