//! Core types for capdrop
//!
//! These types are passed between the selection, capture and upload stages.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CapdropError;

/// A rectangle in global screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle with no area cannot be captured
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl std::str::FromStr for Rect {
    type Err = CapdropError;

    /// Accepts `x,y,w,h` or the `x,y wxh` form printed by selector tools
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s
            .trim()
            .split(|c: char| c == ',' || c == 'x' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();

        if fields.len() != 4 {
            return Err(CapdropError::InvalidRegion(format!(
                "expected 'x,y,w,h', got '{}'",
                s.trim()
            )));
        }

        let mut values = [0i32; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse().map_err(|_| {
                CapdropError::InvalidRegion(format!("'{}' is not an integer", field))
            })?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }
}

/// Which portal flavour a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenType {
    /// One-shot screenshot request
    Screenshot,
    /// Multi-step screencast session
    ScreenCast,
}

impl std::fmt::Display for ScreenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScreenType::Screenshot => write!(f, "Screenshot"),
            ScreenType::ScreenCast => write!(f, "ScreenCast"),
        }
    }
}

/// A captured file ready for the upload sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Local path of the file
    pub path: PathBuf,
    /// MIME type handed to the sink
    pub mime: &'static str,
}

impl Artifact {
    /// Create an artifact, deriving the MIME type from the file extension
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime = mime_for_path(&path);
        Self { path, mime }
    }

    /// File name without directories
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// MIME type for a capture artifact, by extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp4" => "video/mp4",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_parse_comma_form() {
        let rect: Rect = "100,100,400,300".parse().unwrap();
        assert_eq!(rect, Rect::new(100, 100, 400, 300));
    }

    #[test]
    fn test_rect_parse_selector_form() {
        let rect: Rect = "12,-40 640x480\n".parse().unwrap();
        assert_eq!(rect, Rect::new(12, -40, 640, 480));
    }

    #[test]
    fn test_rect_parse_rejects_garbage() {
        assert!("10,20,30".parse::<Rect>().is_err());
        assert!("a,b,c,d".parse::<Rect>().is_err());
    }

    #[test]
    fn test_rect_empty() {
        assert!(Rect::new(0, 0, 0, 10).is_empty());
        assert!(Rect::new(0, 0, 10, -1).is_empty());
        assert!(!Rect::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("/tmp/a.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("/tmp/a.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("REC_1.webm")), "video/webm");
        assert_eq!(Artifact::from_path("/v/REC_1.webm").file_name(), "REC_1.webm");
    }
}
