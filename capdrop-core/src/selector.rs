//! Region selection
//!
//! The selection UI is an external tool; capdrop only runs it and parses the
//! rectangle it prints.

use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{CapdropError, Result};
use crate::types::Rect;

/// Where the capture rectangle comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSource {
    /// Given up front, e.g. on the command line
    Fixed(Rect),
    /// Printed by a selector command such as `slurp`
    Command(Vec<String>),
}

impl RegionSource {
    /// Fixed region if given, otherwise the configured selector
    pub fn from_args(region: Option<Rect>, selector: &[String]) -> Self {
        match region {
            Some(rect) => Self::Fixed(rect),
            None => Self::Command(selector.to_vec()),
        }
    }

    /// Obtain a non-empty rectangle
    pub async fn select(&self) -> Result<Rect> {
        let rect = match self {
            Self::Fixed(rect) => *rect,
            Self::Command(argv) => run_selector(argv).await?,
        };
        if rect.is_empty() {
            return Err(CapdropError::InvalidRegion(format!("{} has no area", rect)));
        }
        Ok(rect)
    }
}

async fn run_selector(argv: &[String]) -> Result<Rect> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        CapdropError::config("No region given and [selector].command is empty")
    })?;

    debug!("running selector {:?}", argv);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| CapdropError::process(format!("Failed to run selector {}: {}", program, e)))?;

    parse_selection(output.status.success(), &String::from_utf8_lossy(&output.stdout))
}

/// Interpret selector output; no output or a failed selector means the user
/// cancelled
pub fn parse_selection(success: bool, stdout: &str) -> Result<Rect> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty());
    match line {
        Some(line) if success => line.parse(),
        _ => Err(CapdropError::SelectionCancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(true, "10,20,300,200\n").unwrap(), Rect::new(10, 20, 300, 200));
        assert!(matches!(parse_selection(true, "\n"), Err(CapdropError::SelectionCancelled)));
        assert!(matches!(parse_selection(false, "selection cancelled\n"), Err(CapdropError::SelectionCancelled)));
        assert!(matches!(parse_selection(true, "garbage"), Err(CapdropError::InvalidRegion(_))));
    }

    #[tokio::test]
    async fn test_fixed_region_must_have_area() {
        let source = RegionSource::Fixed(Rect::new(0, 0, 0, 100));
        assert!(matches!(source.select().await, Err(CapdropError::InvalidRegion(_))));
    }

    #[tokio::test]
    async fn test_command_region() {
        let source = RegionSource::Command(vec!["echo".into(), "5,6 70x80".into()]);
        assert_eq!(source.select().await.unwrap(), Rect::new(5, 6, 70, 80));
    }
}
