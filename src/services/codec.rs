//! Image codec service
//!
//! Thin layer over the `image` crate covering the operations the pipeline
//! needs: probing, decoding with orientation, flattening, fitting, encoding
//! and preview thumbnails.

use crate::error::{CatalogError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{
    codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ExtendedColorType,
    ImageDecoder, ImageEncoder, ImageFormat, ImageReader, Rgba, RgbaImage,
};
use std::io::Cursor;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Basic facts about an encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageProbe {
    pub format: Option<ImageFormat>,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// Service for decoding, transforming and encoding images
pub struct ImageCodec;

impl ImageCodec {
    /// Read format, dimensions and alpha presence
    pub fn probe(bytes: &[u8]) -> Result<ImageProbe> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader.format();
        let decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        let has_alpha = decoder.color_type().has_alpha();
        Ok(ImageProbe {
            format,
            width,
            height,
            has_alpha,
        })
    }

    /// Decode bytes of any supported format, optionally applying EXIF orientation
    pub fn decode(bytes: &[u8], auto_orient: bool) -> Result<DynamicImage> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        if reader.format().is_none() {
            return Err(CatalogError::composition(
                "Unrecognized image format. Supported formats: PNG, JPEG, WebP, TIFF",
            ));
        }

        let mut decoder = reader.into_decoder()?;
        let orientation = if auto_orient {
            decoder.orientation().ok()
        } else {
            None
        };
        let mut image = DynamicImage::from_decoder(decoder)?;
        if let Some(orientation) = orientation {
            image.apply_orientation(orientation);
        }

        log::debug!(
            "Decoded {}x{} image ({:?})",
            image.width(),
            image.height(),
            image.color()
        );
        Ok(image)
    }

    /// Composite onto opaque white, dropping transparency
    #[must_use]
    pub fn flatten_onto_white(image: &DynamicImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            if a == 255 {
                continue;
            }
            let blend = |c: u8| -> u8 {
                let c = u32::from(c);
                let a = u32::from(a);
                ((c * a + 255 * (255 - a) + 127) / 255) as u8
            };
            *pixel = Rgba([blend(r), blend(g), blend(b), 255]);
        }
        rgba
    }

    /// Decode and flatten into the canonical opaque raster
    pub fn normalize(bytes: &[u8], auto_orient: bool) -> Result<RgbaImage> {
        let image = Self::decode(bytes, auto_orient)?;
        Ok(Self::flatten_onto_white(&image))
    }

    /// Downscale to fit inside `max` x `max`, preserving aspect; never enlarges
    #[must_use]
    pub fn fit_within(image: RgbaImage, max: u32) -> RgbaImage {
        let (width, height) = image.dimensions();
        if width <= max && height <= max {
            return image;
        }
        log::debug!("Downscaling oversized {}x{} image to fit {}x{}", width, height, max, max);
        DynamicImage::ImageRgba8(image)
            .resize(max, max, FilterType::Lanczos3)
            .to_rgba8()
    }

    /// Center an image on a white square canvas
    #[must_use]
    pub fn place_centered(image: &RgbaImage, size: u32) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(size, size, WHITE);
        let x = (i64::from(size) - i64::from(image.width())) / 2;
        let y = (i64::from(size) - i64::from(image.height())) / 2;
        image::imageops::overlay(&mut canvas, image, x, y);
        canvas
    }

    /// Resize to cover `width` x `height`, cropping the overflow around the center
    #[must_use]
    pub fn cover(image: &DynamicImage, width: u32, height: u32) -> RgbaImage {
        image
            .resize_to_fill(width, height, FilterType::Lanczos3)
            .to_rgba8()
    }

    /// Resize to exact dimensions
    #[must_use]
    pub fn resize_exact(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
        image::imageops::resize(image, width, height, FilterType::Lanczos3)
    }

    /// Encode as baseline JPEG; the encoder writes all components unsubsampled (4:4:4)
    pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| CatalogError::composition(format!("Failed to encode JPEG: {}", e)))?;
        Ok(buffer)
    }

    /// Encode as PNG, keeping the alpha channel
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| CatalogError::composition(format!("Failed to encode PNG: {}", e)))?;
        Ok(buffer)
    }

    /// Re-encode an arbitrary source as an opaque JPEG
    pub fn reencode_jpeg(bytes: &[u8], auto_orient: bool, quality: u8) -> Result<Vec<u8>> {
        let flattened = Self::normalize(bytes, auto_orient)?;
        Self::encode_jpeg(&flattened, quality)
    }

    /// Downscaled JPEG thumbnail as a `data:` URI, with its dimensions
    pub fn thumbnail_data_uri(bytes: &[u8], max_dimension: u32) -> Result<(String, u32, u32)> {
        let image = Self::decode(bytes, false)?;
        let thumbnail = image.thumbnail(max_dimension, max_dimension);
        let rgba = Self::flatten_onto_white(&thumbnail);
        let jpeg = Self::encode_jpeg(&rgba, 80)?;
        let uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg));
        Ok((uri, rgba.width(), rgba.height()))
    }
}
