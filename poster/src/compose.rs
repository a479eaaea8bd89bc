use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Opaque black.
pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Fixed-size output surface. Built once from config, shared by every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    /// Scale small artwork up until one axis is flush with the canvas edges.
    pub allow_upscale: bool,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            allow_upscale: true,
        }
    }

    /// Fit `image` inside the canvas, preserving aspect ratio, and paste it
    /// centered on an opaque black background. Never crops.
    pub fn composite(&self, image: &DynamicImage) -> Result<RgbaImage, ComposeError> {
        if self.width == 0 || self.height == 0 {
            return Err(ComposeError::EmptyCanvas {
                width: self.width,
                height: self.height,
            });
        }
        let (src_w, src_h) = (image.width(), image.height());
        if src_w == 0 || src_h == 0 {
            return Err(ComposeError::EmptySource {
                width: src_w,
                height: src_h,
            });
        }

        let (fit_w, fit_h) = fit_dimensions(src_w, src_h, self.width, self.height, self.allow_upscale);
        let scaled = if (fit_w, fit_h) == (src_w, src_h) {
            image.to_rgba8()
        } else {
            image.resize_exact(fit_w, fit_h, FilterType::Lanczos3).to_rgba8()
        };

        let mut canvas = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        let x = (self.width - fit_w) / 2;
        let y = (self.height - fit_h) / 2;
        imageops::replace(&mut canvas, &scaled, i64::from(x), i64::from(y));

        debug!(
            src = format!("{src_w}x{src_h}"),
            fit = format!("{fit_w}x{fit_h}"),
            canvas = format!("{}x{}", self.width, self.height),
            x,
            y,
            "composited artwork"
        );
        Ok(canvas)
    }
}

/// Composite onto a `width` x `height` canvas, scaling to fit.
pub fn composite(image: &DynamicImage, width: u32, height: u32) -> Result<RgbaImage, ComposeError> {
    Canvas::new(width, height).composite(image)
}

/// Largest size with the source aspect ratio that fits in `max_w` x `max_h`.
///
/// The wider-than-target case is width-constrained, otherwise height. The
/// other axis is rounded to the nearest pixel and never drops below 1.
pub fn fit_dimensions(src_w: u32, src_h: u32, max_w: u32, max_h: u32, allow_upscale: bool) -> (u32, u32) {
    if !allow_upscale && src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    let (sw, sh, mw, mh) = (
        u64::from(src_w),
        u64::from(src_h),
        u64::from(max_w),
        u64::from(max_h),
    );
    if sw * mh >= sh * mw {
        let h = ((sh * mw + sw / 2) / sw).clamp(1, mh);
        (max_w, h as u32)
    } else {
        let w = ((sw * mh + sh / 2) / sh).clamp(1, mw);
        (w as u32, max_h)
    }
}

/// Decode artwork bytes, guessing the format from content.
pub fn decode_artwork(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError(e.to_string()))?
        .decode()
        .map_err(|e| DecodeError(e.to_string()))
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ComposeError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ComposeError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("source image has no pixels ({width}x{height})")]
    EmptySource { width: u32, height: u32 },
    #[error("canvas has no pixels ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to decode artwork: {0}")]
pub struct DecodeError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn solid(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, RED))
    }

    fn is_red(p: &Rgba<u8>) -> bool {
        p[0] > 245 && p[1] < 10 && p[2] < 10 && p[3] > 245
    }

    #[test]
    fn output_always_matches_canvas() {
        let sources = [(1, 1), (1000, 1500), (1920, 1080), (3, 4000), (4000, 3), (1080, 1920)];
        for (w, h) in sources {
            let out = composite(&solid(w, h), 1080, 1920).unwrap();
            assert_eq!(out.dimensions(), (1080, 1920), "source {w}x{h}");
        }
    }

    #[test]
    fn landscape_source_letterboxed_on_portrait_canvas() {
        // 200x100 fits 100x100 as 100x50, 25px bands top and bottom.
        let out = composite(&solid(200, 100), 100, 100).unwrap();
        assert_eq!(*out.get_pixel(50, 10), BACKGROUND);
        assert!(is_red(out.get_pixel(50, 50)));
        assert_eq!(*out.get_pixel(50, 90), BACKGROUND);
        assert!(is_red(out.get_pixel(0, 50)), "flush to the left edge");
        assert!(is_red(out.get_pixel(99, 50)), "flush to the right edge");
    }

    #[test]
    fn portrait_source_pillarboxed_on_square_canvas() {
        let out = composite(&solid(50, 100), 100, 100).unwrap();
        assert_eq!(*out.get_pixel(10, 50), BACKGROUND);
        assert!(is_red(out.get_pixel(50, 50)));
        assert_eq!(*out.get_pixel(90, 50), BACKGROUND);
        assert!(is_red(out.get_pixel(50, 0)));
        assert!(is_red(out.get_pixel(50, 99)));
    }

    #[test]
    fn fit_dimensions_preserves_aspect() {
        assert_eq!(fit_dimensions(1000, 1500, 1080, 1920, true), (1080, 1620));
        assert_eq!(fit_dimensions(1920, 1080, 1080, 1920, true), (1080, 608));
        assert_eq!(fit_dimensions(600, 900, 1080, 1920, true), (1080, 1620));
        assert_eq!(fit_dimensions(4000, 3, 100, 100, true), (100, 1));
        assert_eq!(fit_dimensions(1080, 1920, 1080, 1920, true), (1080, 1920));
    }

    #[test]
    fn downscale_only_keeps_small_sources() {
        assert_eq!(fit_dimensions(600, 900, 1080, 1920, false), (600, 900));
        assert_eq!(fit_dimensions(2000, 3000, 1080, 1920, false), (1080, 1620));

        let canvas = Canvas {
            width: 100,
            height: 100,
            allow_upscale: false,
        };
        let out = canvas.composite(&solid(20, 20)).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(*out.get_pixel(39, 50), BACKGROUND);
        assert!(is_red(out.get_pixel(40, 40)));
        assert!(is_red(out.get_pixel(59, 59)));
        assert_eq!(*out.get_pixel(60, 50), BACKGROUND);
    }

    #[test]
    fn degenerate_inputs_rejected() {
        let empty = DynamicImage::new_rgba8(0, 0);
        assert!(matches!(
            composite(&empty, 100, 100),
            Err(ComposeError::EmptySource { .. })
        ));
        assert!(matches!(
            composite(&solid(10, 10), 0, 100),
            Err(ComposeError::EmptyCanvas { .. })
        ));
    }

    #[test]
    fn png_encoding_decodes_back() {
        let out = composite(&solid(30, 60), 40, 40).unwrap();
        let png = encode_png(&out).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = decode_artwork(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (40, 40));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode_artwork(b"<html>not an image</html>").is_err());
        assert!(decode_artwork(&[]).is_err());
    }
}
