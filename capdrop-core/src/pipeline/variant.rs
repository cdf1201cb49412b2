//! Pipeline variants and their search ordering

use serde::{Deserialize, Serialize};

/// `pipewiresrc` property used to point at the stream's node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKey {
    /// `path=<node>` (older plugin versions)
    #[serde(rename = "path")]
    Path,
    /// `target-object=<node>` (newer plugin versions)
    #[serde(rename = "target-object")]
    TargetObject,
    /// Let the plugin pick the stream behind the descriptor
    #[serde(rename = "none")]
    None,
}

impl TargetKey {
    /// Property name, or None when no target is set
    pub fn property(&self) -> Option<&'static str> {
        match self {
            Self::Path => Some("path"),
            Self::TargetObject => Some("target-object"),
            Self::None => None,
        }
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.property().unwrap_or("none"))
    }
}

/// Raw video format negotiated before encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    #[serde(rename = "I420")]
    I420,
    #[serde(rename = "BGRx")]
    Bgrx,
    #[serde(rename = "RGBA")]
    Rgba,
}

impl PixelFormat {
    pub fn caps_name(&self) -> &'static str {
        match self {
            Self::I420 => "I420",
            Self::Bgrx => "BGRx",
            Self::Rgba => "RGBA",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.caps_name())
    }
}

/// One pipeline configuration to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineVariant {
    /// Targeting property and node id, if any
    pub target: Option<(&'static str, u32)>,
    pub format: PixelFormat,
    /// Whether the caps declare the framerate
    pub include_framerate: bool,
}

impl std::fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target {
            Some((key, node)) => write!(f, "{}={}", key, node)?,
            None => write!(f, "no target")?,
        }
        write!(
            f,
            ", {}, {}",
            self.format,
            if self.include_framerate { "framerate" } else { "no framerate" }
        )
    }
}

/// Ordering of the variant search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantPolicy {
    pub target_keys: Vec<TargetKey>,
    pub formats: Vec<PixelFormat>,
    pub framerate_options: Vec<bool>,
}

impl Default for VariantPolicy {
    fn default() -> Self {
        Self {
            target_keys: vec![TargetKey::Path, TargetKey::TargetObject, TargetKey::None],
            formats: vec![PixelFormat::I420, PixelFormat::Bgrx, PixelFormat::Rgba],
            framerate_options: vec![true, false],
        }
    }
}

impl VariantPolicy {
    /// True when the product is empty
    pub fn is_empty(&self) -> bool {
        self.target_keys.is_empty() || self.formats.is_empty() || self.framerate_options.is_empty()
    }

    /// Number of variants the search will try
    pub fn len(&self) -> usize {
        self.target_keys.len() * self.formats.len() * self.framerate_options.len()
    }

    /// All variants for `node_id`: targets outermost, then formats, then
    /// framerate
    pub fn variants(&self, node_id: u32) -> Vec<PipelineVariant> {
        let mut out = Vec::with_capacity(self.len());
        for key in &self.target_keys {
            for format in &self.formats {
                for &include_framerate in &self.framerate_options {
                    out.push(PipelineVariant {
                        target: key.property().map(|k| (k, node_id)),
                        format: *format,
                        include_framerate,
                    });
                }
            }
        }
        out
    }
}
