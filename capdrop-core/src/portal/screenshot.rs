//! Interactive screenshots through the Screenshot portal

use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use url::Url;

use super::results::{screenshot_options, ScreenshotResults};
use super::transport::{is_invalid_args, new_token, BusTransport};
use crate::config::ImageFormat;
use crate::error::{CapdropError, Result, ResultExt};
use crate::types::Artifact;

pub const SCREENSHOT_IFACE: &str = "org.freedesktop.portal.Screenshot";

/// Attempts to find the portal's file before giving up
const COPY_ATTEMPTS: u32 = 40;
const COPY_STEP: Duration = Duration::from_millis(100);

/// How the captured image is stored
#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    pub format: ImageFormat,
    pub jpeg_quality: u8,
    /// Directory the private copy is written to
    pub output_dir: PathBuf,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            jpeg_quality: 90,
            output_dir: std::env::temp_dir(),
        }
    }
}

/// Ask the portal for an interactive screenshot and return its URI
pub async fn request_screenshot(transport: &BusTransport) -> Result<String> {
    let token = new_token();
    let response = match transport
        .request(SCREENSHOT_IFACE, "Screenshot", &("", screenshot_options(&token)), &token)
        .await
    {
        Err(e) if is_invalid_args(&e) => {
            debug!("Screenshot rejected (s, a{{sv}}); retrying with (a{{sv}})");
            let token = new_token();
            transport
                .request(SCREENSHOT_IFACE, "Screenshot", &(screenshot_options(&token),), &token)
                .await?
        }
        other => other?,
    };

    let results: ScreenshotResults = response.results()?;
    results
        .uri
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| CapdropError::protocol("Screenshot returned no uri"))
}

/// Take a screenshot and copy it somewhere private
pub async fn take_screenshot(transport: &BusTransport, options: &ScreenshotOptions) -> Result<Artifact> {
    let uri = request_screenshot(transport).await.context("Screenshot")?;
    debug!("portal saved screenshot at {}", uri);

    let source = uri_to_path(&uri)?;
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("png")
        .to_string();
    let dest = options.output_dir.join(private_name(&ext));

    copy_when_ready(&source, &dest, COPY_ATTEMPTS, COPY_STEP).await?;

    let path = match options.format {
        ImageFormat::Png => dest,
        ImageFormat::Jpeg => {
            let quality = options.jpeg_quality;
            tokio::task::spawn_blocking(move || reencode_jpeg(&dest, quality))
                .await
                .map_err(|e| CapdropError::process(format!("JPEG encoder task failed: {}", e)))??
        }
    };

    info!("Screenshot saved to {}", path.display());
    Ok(Artifact::from_path(path))
}

fn private_name(ext: &str) -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("capdrop-{}-{}.{}", std::process::id(), secs, ext)
}

/// Convert a `file://` URI to a local path, decoding percent escapes
pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let parsed = Url::parse(uri)
        .map_err(|e| CapdropError::protocol(format!("Invalid screenshot URI {}: {}", uri, e)))?;
    if parsed.scheme() != "file" {
        return Err(CapdropError::protocol(format!("Unsupported screenshot URI: {}", uri)));
    }
    parsed
        .to_file_path()
        .map_err(|_| CapdropError::protocol(format!("Screenshot URI is not a local path: {}", uri)))
}

/// Copy `source` to `dest` once it exists and is non-empty, polling up to
/// `attempts` times
pub async fn copy_when_ready(source: &Path, dest: &Path, attempts: u32, step: Duration) -> Result<()> {
    for attempt in 0..attempts {
        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.len() > 0 => {
                tokio::fs::copy(source, dest).await?;
                debug!("copied screenshot after {} polls", attempt);
                return Ok(());
            }
            _ => tokio::time::sleep(step).await,
        }
    }
    Err(CapdropError::timeout(
        format!("screenshot file {}", source.display()),
        step * attempts,
    ))
}

/// Re-encode an image as JPEG next to the original, removing the original
pub fn reencode_jpeg(source: &Path, quality: u8) -> Result<PathBuf> {
    let dest = source.with_extension("jpg");
    let rgb = image::open(source)?.to_rgb8();
    let file = std::fs::File::create(&dest)?;
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(file), quality.clamp(50, 100));
    rgb.write_with_encoder(encoder)?;
    if dest != source {
        std::fs::remove_file(source)?;
    }
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_to_path() {
        assert_eq!(
            uri_to_path("file:///home/me/Pictures/Screenshot%20from%202024.png").unwrap(),
            PathBuf::from("/home/me/Pictures/Screenshot from 2024.png")
        );
        assert_eq!(
            uri_to_path("file://localhost/tmp/a.png").unwrap(),
            PathBuf::from("/tmp/a.png")
        );
        assert!(uri_to_path("https://example.com/a.png").is_err());
    }

    #[test]
    fn test_uri_keeps_raw_bytes() {
        use std::os::unix::ffi::OsStrExt;
        let path = uri_to_path("file:///tmp/shot%FF.png").unwrap();
        assert_eq!(path.as_os_str().as_bytes(), b"/tmp/shot\xFF.png");
        assert_eq!(
            uri_to_path("file:///tmp/%E3%81%82.png").unwrap(),
            PathBuf::from("/tmp/\u{3042}.png")
        );
    }

    #[test]
    fn test_private_name() {
        let name = private_name("png");
        assert!(name.starts_with(&format!("capdrop-{}-", std::process::id())));
        assert!(name.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_copy_when_ready_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_when_ready(
            &dir.path().join("missing.png"),
            &dir.path().join("out.png"),
            3,
            Duration::from_millis(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CapdropError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_copy_when_ready_waits_for_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("late.png");
        let dest = dir.path().join("copy.png");
        let writer = {
            let source = source.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tokio::fs::write(&source, b"png").await.unwrap();
            })
        };
        copy_when_ready(&source, &dest, 40, Duration::from_millis(10)).await.unwrap();
        writer.await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"png");
    }

    #[test]
    fn test_reencode_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("shot.png");
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 30, 30])).save(&png).unwrap();
        let jpg = reencode_jpeg(&png, 90).unwrap();
        assert_eq!(jpg.extension().unwrap(), "jpg");
        assert!(!png.exists());
        assert!(std::fs::metadata(&jpg).unwrap().len() > 0);
    }
}
