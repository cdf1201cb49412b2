//! Crop geometry for region capture
//!
//! A screencast stream always covers a whole monitor, so a selected region is
//! expressed as insets from each monitor edge.

use serde::{Deserialize, Serialize};

use crate::types::Rect;

/// Position and size of the monitor a stream covers, in global coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl MonitorGeometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from the optional position/size a portal stream reports,
    /// filling whatever is missing from `fallback`
    pub fn from_stream(
        position: Option<(i32, i32)>,
        size: Option<(i32, i32)>,
        fallback: MonitorGeometry,
    ) -> Self {
        let (x, y) = position.unwrap_or((fallback.x, fallback.y));
        let (width, height) = size.unwrap_or((fallback.width, fallback.height));
        Self::new(x, y, width, height)
    }
}

impl Default for MonitorGeometry {
    fn default() -> Self {
        Self::new(0, 0, 1920, 1080)
    }
}

/// Insets removed from each monitor edge; never negative
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRegion {
    /// True when nothing is cropped
    pub fn is_full_frame(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Display for CropRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "top={} left={} right={} bottom={}",
            self.top, self.left, self.right, self.bottom
        )
    }
}

/// Compute crop insets for `selection` on `monitor`.
///
/// Each edge is clamped at zero independently, so a selection that spills
/// past the monitor never yields a negative inset.
pub fn resolve_crop(selection: Rect, monitor: MonitorGeometry) -> CropRegion {
    let (x, y) = (i64::from(selection.x), i64::from(selection.y));
    let (w, h) = (i64::from(selection.width), i64::from(selection.height));
    let (mx, my) = (i64::from(monitor.x), i64::from(monitor.y));
    let (mw, mh) = (i64::from(monitor.width), i64::from(monitor.height));

    CropRegion {
        top: inset(y - my),
        left: inset(x - mx),
        right: inset((mx + mw) - (x + w)),
        bottom: inset((my + mh) - (y + h)),
    }
}

fn inset(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_stream_uses_fallback() {
        let fallback = MonitorGeometry::default();
        let m = MonitorGeometry::from_stream(None, Some((2560, 1440)), fallback);
        assert_eq!(m, MonitorGeometry::new(0, 0, 2560, 1440));

        let m = MonitorGeometry::from_stream(Some((1920, 0)), None, fallback);
        assert_eq!(m, MonitorGeometry::new(1920, 0, 1920, 1080));
    }

    #[test]
    fn test_full_frame() {
        let crop = resolve_crop(Rect::new(0, 0, 1920, 1080), MonitorGeometry::default());
        assert!(crop.is_full_frame());
    }

    #[test]
    fn test_second_monitor_offset() {
        let monitor = MonitorGeometry::new(1920, 0, 2560, 1440);
        let crop = resolve_crop(Rect::new(2020, 40, 100, 100), monitor);
        assert_eq!(crop.left, 100);
        assert_eq!(crop.top, 40);
        assert_eq!(crop.right, 2560 - 200);
        assert_eq!(crop.bottom, 1440 - 140);
    }
}
