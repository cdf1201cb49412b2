//! Integration tests for configuration system

use capdrop_core::audio::{AudioMode, AudioPolicy};
use capdrop_core::config::{sample_config, CursorMode, ImageFormat, PersistMode};
use capdrop_core::pipeline::{PixelFormat, TargetKey};
use capdrop_core::ConfigFile;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_file_default() {
    let config = ConfigFile::default();
    assert_eq!(config.capture.image_format, ImageFormat::Png);
    assert_eq!(config.capture.jpeg_quality, 90);
    assert_eq!(config.capture.fps, 30);
    assert_eq!(config.portal.timeout(), Duration::from_secs(60));
    assert_eq!(config.pipeline.launcher, "gst-launch-1.0");
    assert_eq!(config.audio.mode, AudioMode::Auto);
    assert!(config.upload.command.is_empty());
    assert!(config.portal.restore_token.is_none());
}

#[test]
fn test_config_file_sample_parses() {
    let sample = sample_config();
    let config: ConfigFile = toml::from_str(&sample).expect("Sample config should parse");
    assert!(config.validate().is_ok());
    assert_eq!(config.pipeline.policy().len(), 18);
    assert_eq!(config.selector.command[0], "slurp");
}

#[test]
fn test_partial_config_fills_defaults() {
    let config: ConfigFile = toml::from_str(
        r#"
[capture]
image_format = "jpeg"
jpeg_quality = 75

[audio]
mode = "device"
device = "alsa_output.usb.monitor"
"#,
    )
    .expect("partial config should parse");

    assert_eq!(config.capture.image_format, ImageFormat::Jpeg);
    assert_eq!(config.capture.jpeg_quality, 75);
    assert_eq!(config.capture.fps, 30);
    assert_eq!(
        config.audio,
        AudioPolicy {
            mode: AudioMode::Device,
            device: "alsa_output.usb.monitor".to_string(),
        }
    );
    assert_eq!(config.portal.cursor_mode, CursorMode::Embedded);
    assert_eq!(config.portal.persist_mode, PersistMode::Persistent);
}

#[test]
fn test_custom_variant_order() {
    let config: ConfigFile = toml::from_str(
        r#"
[pipeline]
target_keys = ["target-object"]
formats = ["BGRx", "I420"]
framerate_options = [false]
"#,
    )
    .expect("pipeline section should parse");

    let policy = config.pipeline.policy();
    assert_eq!(policy.target_keys, vec![TargetKey::TargetObject]);
    assert_eq!(policy.formats, vec![PixelFormat::Bgrx, PixelFormat::I420]);
    assert_eq!(policy.len(), 2);

    let variants = policy.variants(7);
    assert_eq!(variants[0].target, Some(("target-object", 7)));
    assert_eq!(variants[0].format, PixelFormat::Bgrx);
    assert!(!variants[0].include_framerate);
}

#[test]
fn test_validation_rejects_empty_policy() {
    let mut config = ConfigFile::default();
    config.pipeline.formats.clear();
    assert!(config.validate().is_err());

    let mut config = ConfigFile::default();
    config.capture.fps = 0;
    assert!(config.validate().is_err());

    let mut config = ConfigFile::default();
    config.pipeline.launcher = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_file_save_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("nested").join("config.toml");

    let mut config = ConfigFile::default();
    config.capture.duration = 12;
    config.upload.folder = "Screencasts".to_string();
    config.save_to(&config_path).expect("Failed to save config");

    let loaded = ConfigFile::load_from(&config_path).expect("Failed to load config");
    assert_eq!(loaded.capture.duration, 12);
    assert_eq!(loaded.upload.folder, "Screencasts");
    assert!(!config_path.with_extension("toml.tmp").exists());
}

#[test]
fn test_config_file_load_nonexistent() {
    let result = ConfigFile::load_from("/nonexistent/path/config.toml");
    // Should return default config, not error
    assert!(result.is_ok());
}

#[test]
fn test_config_file_load_invalid() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[capture]\njpeg_quality = 20\n").unwrap();

    assert!(ConfigFile::load_from(&config_path).is_err());
}

#[test]
fn test_store_restore_token_merges() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");

    let mut config = ConfigFile::default();
    config.upload.folder = "Shared".to_string();
    config.save_to(&config_path).unwrap();

    ConfigFile::store_restore_token(&config_path, "token-1").unwrap();
    ConfigFile::store_restore_token(&config_path, "token-2").unwrap();

    let loaded = ConfigFile::load_from(&config_path).unwrap();
    assert_eq!(loaded.portal.restore_token.as_deref(), Some("token-2"));
    // Other settings survive the merge
    assert_eq!(loaded.upload.folder, "Shared");
}

#[test]
fn test_store_restore_token_creates_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("capdrop").join("config.toml");

    ConfigFile::store_restore_token(&config_path, "fresh").unwrap();

    let loaded = ConfigFile::load_from(&config_path).unwrap();
    assert_eq!(loaded.portal.restore_token.as_deref(), Some("fresh"));
}
