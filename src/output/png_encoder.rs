//! PNG output encoder.
//!
//! Pure Rust PNG encoding using the `png` crate.

use crate::error::Result;
use crate::image::RasterImage;
use crate::som::Som;
use crate::visualizers::Visualizer;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// PNG encoder for rendered visualizations.
pub struct PngEncoder;

impl PngEncoder {
    /// Write an image to a PNG file.
    ///
    /// # Errors
    ///
    /// Returns an error if file creation or PNG encoding fails.
    pub fn write_to_file<P: AsRef<Path>>(image: &RasterImage, path: P) -> Result<()> {
        let file = File::create(path)?;
        Self::encode(image, BufWriter::new(file))
    }

    /// Encode an image to PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn to_bytes(image: &RasterImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        Self::encode(image, &mut buffer)?;
        Ok(buffer)
    }

    /// Render `variant` of `visualizer` through its cache and save it.
    ///
    /// # Errors
    ///
    /// Propagates rendering, file and encoding errors.
    pub fn export<P: AsRef<Path>>(
        visualizer: &dyn Visualizer,
        variant: usize,
        som: &Som,
        width: u32,
        height: u32,
        path: P,
    ) -> Result<()> {
        let image = visualizer.get_visualization(variant, som, width, height)?;
        Self::write_to_file(&image, path.as_ref())?;
        info!(
            "exported {} variant {variant} to {}",
            visualizer.name(),
            path.as_ref().display()
        );
        Ok(())
    }

    fn encode<W: Write>(image: &RasterImage, writer: W) -> Result<()> {
        let mut encoder = png::Encoder::new(writer, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.pixels())?;
        Ok(())
    }
}
