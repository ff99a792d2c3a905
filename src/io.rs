use base64::Engine;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ImageEncoder, ImageError, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Default file name offered by the download dialog.
pub const DEFAULT_DOWNLOAD_NAME: &str = "edited-image.png";

/// Extensions accepted by the open dialog and drag-and-drop.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif"];

/// Check if a path has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for image file operations
#[derive(Debug)]
pub enum ImageIoError {
    Io(std::io::Error),
    Decode(String),
    Encode(String),
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageIoError::Io(e) => write!(f, "I/O error: {}", e),
            ImageIoError::Decode(e) => write!(f, "Could not read image: {}", e),
            ImageIoError::Encode(e) => write!(f, "Could not encode image: {}", e),
        }
    }
}

impl std::error::Error for ImageIoError {}

impl From<std::io::Error> for ImageIoError {
    fn from(e: std::io::Error) -> Self {
        ImageIoError::Io(e)
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Proportionally shrink (`width`, `height`) into `max_w × max_h`: width
/// first, then height.  Never upscales; fractions are truncated, min 1.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let mut w = width as f64;
    let mut h = height as f64;
    if max_w > 0 && w > max_w as f64 {
        h = h * max_w as f64 / w;
        w = max_w as f64;
    }
    if max_h > 0 && h > max_h as f64 {
        w = w * max_h as f64 / h;
        h = max_h as f64;
    }
    ((w as u32).max(1), (h as u32).max(1))
}

/// Downscale `img` into the bounding box, or hand it back untouched when it
/// already fits.
pub fn fit_image(img: RgbaImage, max_w: u32, max_h: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let (fw, fh) = fit_within(w, h, max_w, max_h);
    if (fw, fh) == (w, h) {
        return img;
    }
    image::imageops::resize(&img, fw, fh, FilterType::Triangle)
}

/// Decode an image file to RGBA (animated GIFs yield their first frame).
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, ImageIoError> {
    let bytes = std::fs::read(path)?;
    load_from_memory(&bytes)
}

/// Decode encoded image bytes (drag-and-drop payloads, tests).
pub fn load_from_memory(bytes: &[u8]) -> Result<RgbaImage, ImageIoError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| ImageIoError::Decode(e.to_string()))
}

// ============================================================================
// SAVING
// ============================================================================

/// Encode to PNG in memory.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageIoError> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), image::ColorType::Rgba8)
        .map_err(|e: ImageError| ImageIoError::Encode(e.to_string()))?;
    Ok(out)
}

/// `data:image/png;base64,…` for the save payload.
pub fn to_data_url(img: &RgbaImage) -> Result<String, ImageIoError> {
    let png = encode_png(img)?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

/// Write a PNG file.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<(), ImageIoError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    PngEncoder::new(writer)
        .write_image(img.as_raw(), img.width(), img.height(), image::ColorType::Rgba8)
        .map_err(|e| ImageIoError::Encode(e.to_string()))
}

// ============================================================================
// FILE DIALOGS
// ============================================================================

/// Native open dialog restricted to the supported formats.
pub fn pick_image_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", SUPPORTED_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Native save dialog for the PNG download.
pub fn pick_download_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("PNG Image", &["png"])
        .set_file_name(DEFAULT_DOWNLOAD_NAME)
        .save_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn fit_shrinks_width_first_then_height() {
        assert_eq!(fit_within(1600, 1200, 800, 600), (800, 600));
        assert_eq!(fit_within(1000, 2000, 800, 600), (300, 600));
        assert_eq!(fit_within(2000, 1000, 800, 600), (800, 400));
        assert_eq!(fit_within(1001, 3, 800, 600), (800, 2));
        assert_eq!(fit_within(10_000, 1, 800, 600), (800, 1));
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within(320, 240, 800, 600), (320, 240));
        let img = RgbaImage::new(5, 5);
        assert_eq!(fit_image(img, 800, 600).dimensions(), (5, 5));
        assert_eq!(fit_image(RgbaImage::new(1600, 900), 800, 600).dimensions(), (800, 450));
    }

    #[test]
    fn png_data_url_decodes_back() {
        let img = RgbaImage::from_fn(4, 3, |x, y| Rgba([x as u8 * 60, y as u8 * 80, 9, 200]));
        let url = to_data_url(&img).unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
        let png = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(load_from_memory(&png).unwrap(), img);
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(matches!(load_from_memory(b"not an image"), Err(ImageIoError::Decode(_))));
    }

    #[test]
    fn extension_filter() {
        assert!(is_supported_image(Path::new("photo.JPG")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("noext")));
    }
}
