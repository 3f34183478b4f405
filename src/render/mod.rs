//! # Rendering Module
//!
//! Everything between "some pixels" and "bytes a label printer accepts".
//!
//! ## Modules
//!
//! - [`bitmap`]: packed 1-bit images, the only format the printer takes
//! - [`dither`]: threshold, Bayer 8x8 and Floyd–Steinberg monochrome conversion
//! - [`text`]: two-line label phrases and the bitmap-font label canvas
//!
//! ## Usage Example
//!
//! ```
//! use labelbot::render::{dither, text};
//!
//! let phrase = text::LabelPhrase::new("a dragon guards the teapot");
//! let canvas = text::render_label(&phrase)?;
//! let bitmap = dither::dither(&canvas, dither::choose_algorithm(&canvas));
//! assert_eq!(bitmap.width(), text::CANVAS_WIDTH);
//! # Ok::<(), labelbot::LabelbotError>(())
//! ```

pub mod bitmap;
pub mod dither;
pub mod text;

pub use bitmap::Bitmap;
pub use dither::DitheringAlgorithm;
pub use text::LabelPhrase;
