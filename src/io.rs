use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::error::{CompositorError, CompositorResult};

// ============================================================================
// DECODING
// ============================================================================

/// Decode any raster format the `image` crate understands into RGBA.
pub fn decode_image(bytes: &[u8]) -> CompositorResult<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Read and decode an image file.
pub fn load_image_file(path: &Path) -> CompositorResult<RgbaImage> {
    Ok(image::open(path)?.to_rgba8())
}

/// A decode running on the rayon pool. Poll with [`PendingImage::try_take`]
/// from the UI loop or block with [`PendingImage::wait`].
pub struct PendingImage {
    pub id: String,
    rx: Receiver<CompositorResult<RgbaImage>>,
}

impl PendingImage {
    pub fn spawn(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        let (tx, rx) = mpsc::channel();
        rayon::spawn(move || {
            // Receiver may already be gone if a newer load superseded this one.
            let _ = tx.send(decode_image(&bytes));
        });
        Self { id: id.into(), rx }
    }

    /// `None` while the decode is still running.
    pub fn try_take(&self) -> Option<CompositorResult<RgbaImage>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(CompositorError::LoadAbandoned)),
        }
    }

    pub fn wait(self) -> CompositorResult<RgbaImage> {
        self.rx
            .recv()
            .unwrap_or(Err(CompositorError::LoadAbandoned))
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Output formats for written memes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
        }
    }

    /// Match a format name or file extension, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            _ => None,
        }
    }
}

/// Encode an RGBA frame as PNG into memory.
pub fn encode_png(image: &RgbaImage) -> CompositorResult<Vec<u8>> {
    let mut out = Vec::new();
    write_encoded(image, &mut out, SaveFormat::Png, 100)?;
    Ok(out)
}

/// Encode and write an image to a file.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> CompositorResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_encoded(image, &mut writer, format, quality)?;
    writer.flush()?;
    Ok(())
}

fn write_encoded<W: Write>(
    image: &RgbaImage,
    writer: &mut W,
    format: SaveFormat,
    quality: u8,
) -> CompositorResult<()> {
    match format {
        SaveFormat::Png => {
            PngEncoder::new(writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                ColorType::Rgb8,
            )?;
        }
    }
    Ok(())
}
