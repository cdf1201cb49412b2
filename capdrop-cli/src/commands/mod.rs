//! CLI command implementations

mod config;
mod record;
mod shot;
mod start;
mod status;
mod stop;
mod upload;

pub use config::{config, ConfigArgs};
pub use record::{record, RecordArgs};
pub use shot::shot;
pub use start::{start, StartArgs};
pub use status::status;
pub use stop::stop;
pub use upload::{upload, UploadArgs};

use anyhow::{Context, Result};
use std::path::PathBuf;

use capdrop_core::config::{self as core_config, ConfigFile};
use capdrop_core::portal::PortalScreencast;
use capdrop_core::recorder::{Recorder, RecorderOptions, StateStore};
use capdrop_core::sink::{self, DesktopNotifier, Notifier, UploadSink, Uploader};
use capdrop_core::types::Artifact;

/// Settings document and the path it was loaded from
pub(crate) fn load_config() -> Result<(ConfigFile, PathBuf)> {
    let path = ConfigFile::default_path();
    let config = ConfigFile::load_from(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok((config, path))
}

/// Recorder wired to the portal, configured sink and desktop notifications
pub(crate) fn build_recorder(config: &ConfigFile, settings_path: PathBuf) -> Recorder<PortalScreencast, Uploader> {
    Recorder::new(
        PortalScreencast::new(config.portal.screencast_options()),
        Uploader::from_settings(&config.upload),
        StateStore::new(core_config::state_path()),
        RecorderOptions::from_config(config, Some(settings_path)),
    )
}

/// Upload an artifact and share the link. The file is kept on failure.
pub(crate) async fn deliver(config: &ConfigFile, artifact: &Artifact) -> Result<String> {
    let notifier = DesktopNotifier::default();
    let uploader = Uploader::from_settings(&config.upload);

    let link = uploader
        .upload(&artifact.path, artifact.mime)
        .await
        .with_context(|| format!("File kept at {}", artifact.path.display()))?;

    notifier.notify("capdrop", &format!("Uploaded:\n{}", link));
    announce(config, &link).await;
    Ok(link)
}

/// Copy and open a fresh link, then print it
pub(crate) async fn announce(config: &ConfigFile, link: &str) {
    sink::share_link(link, &config.upload).await;
    println!("{}", link);
}
