//! Screenshot helpers for inspectors. Grabbing pixels and encoding them are
//! the host toolkit's job; this crate only fixes the contract between the two.

use std::error::Error;
use std::fmt;
use std::future::Future;
use tracing::debug;

pub const PNG_QUALITY: u8 = 100;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Png => f.write_str("png"),
            Self::Jpeg => f.write_str("jpeg"),
        }
    }
}

/// Unencoded RGBA8 pixels, row-major, no padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawImage {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

#[derive(Debug)]
pub enum CaptureError {
    InvalidQuality(u8),
    MalformedImage {
        expected: usize,
        actual: usize,
    },
    Encode {
        format: ImageFormat,
        source: Box<dyn Error + Send + Sync>,
    },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuality(quality) => {
                write!(f, "image quality must be between 0 and 100, got {quality}")
            }
            Self::MalformedImage { expected, actual } => write!(
                f,
                "captured image has {actual} bytes of pixel data, expected {expected}"
            ),
            Self::Encode { format, source } => write!(f, "failed to encode {format}: {source}"),
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

/// Anything that can be rendered to pixels: a single view or a whole window.
pub trait Capturable {
    /// Resolves to `None` when there is nothing to capture (not laid out, not visible).
    fn capture(&self) -> impl Future<Output = Option<RawImage>> + Send;
}

pub trait ImageEncoder {
    fn encode(
        &self,
        image: &RawImage,
        format: ImageFormat,
        quality: u8,
    ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>>;
}

pub async fn capture_as_png<C, E>(target: &C, encoder: &E) -> Result<Option<Vec<u8>>, CaptureError>
where
    C: Capturable,
    E: ImageEncoder + ?Sized,
{
    capture_as(target, encoder, ImageFormat::Png, PNG_QUALITY).await
}

/// Quality is 0..=100; pass [`DEFAULT_JPEG_QUALITY`] when there is no preference.
pub async fn capture_as_jpeg<C, E>(
    target: &C,
    encoder: &E,
    quality: u8,
) -> Result<Option<Vec<u8>>, CaptureError>
where
    C: Capturable,
    E: ImageEncoder + ?Sized,
{
    capture_as(target, encoder, ImageFormat::Jpeg, quality).await
}

async fn capture_as<C, E>(
    target: &C,
    encoder: &E,
    format: ImageFormat,
    quality: u8,
) -> Result<Option<Vec<u8>>, CaptureError>
where
    C: Capturable,
    E: ImageEncoder + ?Sized,
{
    if quality > 100 {
        return Err(CaptureError::InvalidQuality(quality));
    }
    let Some(image) = target.capture().await else {
        debug!(%format, "nothing to capture");
        return Ok(None);
    };
    if image.pixels.len() != image.expected_len() {
        return Err(CaptureError::MalformedImage {
            expected: image.expected_len(),
            actual: image.pixels.len(),
        });
    }
    let bytes = encoder
        .encode(&image, format, quality)
        .map_err(|source| CaptureError::Encode { format, source })?;
    debug!(
        %format,
        quality,
        width = image.width,
        height = image.height,
        len = bytes.len(),
        "captured"
    );
    Ok(Some(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct View(Option<RawImage>);

    impl Capturable for View {
        async fn capture(&self) -> Option<RawImage> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct RecordingEncoder {
        calls: Mutex<Vec<(ImageFormat, u8)>>,
    }

    impl ImageEncoder for RecordingEncoder {
        fn encode(
            &self,
            image: &RawImage,
            format: ImageFormat,
            quality: u8,
        ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
            self.calls
                .lock()
                .expect("encoder mutex poisoned")
                .push((format, quality));
            Ok(image.pixels.clone())
        }
    }

    struct FailingEncoder;

    impl ImageEncoder for FailingEncoder {
        fn encode(
            &self,
            _image: &RawImage,
            _format: ImageFormat,
            _quality: u8,
        ) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
            Err("codec unavailable".into())
        }
    }

    fn one_pixel() -> View {
        View(Some(RawImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        }))
    }

    #[tokio::test]
    async fn png_always_uses_full_quality() {
        let encoder = RecordingEncoder::default();
        let bytes = capture_as_png(&one_pixel(), &encoder)
            .await
            .expect("capture should succeed");
        assert_eq!(bytes.as_deref(), Some(&[255, 0, 0, 255][..]));
        assert_eq!(
            encoder.calls.lock().expect("lock").as_slice(),
            [(ImageFormat::Png, PNG_QUALITY)]
        );
    }

    #[tokio::test]
    async fn jpeg_passes_requested_quality() {
        let encoder = RecordingEncoder::default();
        capture_as_jpeg(&one_pixel(), &encoder, DEFAULT_JPEG_QUALITY)
            .await
            .expect("capture should succeed");
        assert_eq!(
            encoder.calls.lock().expect("lock").as_slice(),
            [(ImageFormat::Jpeg, 80)]
        );
    }

    #[tokio::test]
    async fn nothing_to_capture_is_not_an_error() {
        let encoder = RecordingEncoder::default();
        let bytes = capture_as_png(&View(None), &encoder)
            .await
            .expect("empty capture is fine");
        assert_eq!(bytes, None);
        assert!(encoder.calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn rejects_out_of_range_quality() {
        let err = capture_as_jpeg(&one_pixel(), &RecordingEncoder::default(), 101)
            .await
            .expect_err("quality above 100 is invalid");
        assert!(matches!(err, CaptureError::InvalidQuality(101)));
    }

    #[tokio::test]
    async fn rejects_short_pixel_buffer() {
        let view = View(Some(RawImage {
            width: 2,
            height: 2,
            pixels: vec![0; 4],
        }));
        let err = capture_as_png(&view, &RecordingEncoder::default())
            .await
            .expect_err("buffer is too short");
        assert!(matches!(
            err,
            CaptureError::MalformedImage {
                expected: 16,
                actual: 4
            }
        ));
    }

    #[tokio::test]
    async fn encoder_failure_is_reported() {
        let err = capture_as_png(&one_pixel(), &FailingEncoder)
            .await
            .expect_err("encoder failed");
        assert!(err.to_string().contains("codec unavailable"));
        assert!(err.source().is_some());
    }
}
