//! gst-launch command lines

use std::os::fd::RawFd;
use std::path::PathBuf;

use super::variant::PipelineVariant;
use crate::geometry::CropRegion;

/// Program plus argv, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Shell-ish rendering for logs
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }

    pub fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Inputs shared by every attempt of a fixed-duration capture
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub fps: u32,
    pub crop: CropRegion,
    pub output: PathBuf,
}

/// Inputs of a long-running recording
#[derive(Debug, Clone)]
pub struct RecordJob {
    pub node_id: u32,
    pub fps: u32,
    pub crop: CropRegion,
    pub output: PathBuf,
    /// Audio source, or None for video only
    pub audio_source: Option<String>,
}

fn s(value: impl ToString) -> String {
    value.to_string()
}

fn crop_args(crop: &CropRegion) -> Vec<String> {
    vec![
        s("videocrop"),
        format!("top={}", crop.top),
        format!("left={}", crop.left),
        format!("right={}", crop.right),
        format!("bottom={}", crop.bottom),
    ]
}

/// Arguments for one fixed-duration capture attempt
pub fn capture_args(job: &CaptureJob, variant: &PipelineVariant, fd: RawFd) -> Vec<String> {
    let mut args = vec![
        s("-e"),
        s("pipewiresrc"),
        format!("fd={}", fd),
        s("do-timestamp=true"),
    ];
    if let Some((key, node)) = variant.target {
        args.push(format!("{}={}", key, node));
    }

    let mut caps = format!("video/x-raw,format={}", variant.format);
    if variant.include_framerate {
        caps.push_str(&format!(",framerate={}/1", job.fps));
    }

    for element in ["queue", "videoconvert", "videoscale", "videorate"] {
        args.push(s("!"));
        args.push(s(element));
    }
    args.push(s("!"));
    args.push(caps);
    args.push(s("!"));
    args.extend(crop_args(&job.crop));
    args.extend(
        [
            "!",
            "queue",
            "!",
            "vp8enc",
            "deadline=1",
            "threads=4",
            "!",
            "webmmux",
            "streamable=true",
            "!",
            "filesink",
        ]
        .map(s),
    );
    args.push(format!("location={}", job.output.display()));
    args.push(s("sync=true"));
    args
}

/// Arguments for the muxed video(+audio) recording pipeline
pub fn record_args(job: &RecordJob, fd: RawFd) -> Vec<String> {
    let mut args = vec![
        s("-e"),
        s("webmmux"),
        s("name=mux"),
        s("streamable=true"),
        s("!"),
        s("filesink"),
        format!("location={}", job.output.display()),
        s("sync=true"),
        s("pipewiresrc"),
        format!("fd={}", fd),
        format!("path={}", job.node_id),
        s("do-timestamp=true"),
    ];
    for element in ["queue", "videoconvert", "videoscale", "videorate"] {
        args.push(s("!"));
        args.push(s(element));
    }
    args.push(s("!"));
    args.push(format!("video/x-raw,format=I420,framerate={}/1", job.fps));
    args.push(s("!"));
    args.extend(crop_args(&job.crop));
    args.extend(
        ["!", "queue", "!", "vp8enc", "deadline=1", "threads=4", "!", "queue", "!", "mux."].map(s),
    );

    if let Some(device) = &job.audio_source {
        args.push(s("pulsesrc"));
        args.push(format!("device={}", device));
        args.extend(
            [
                "!",
                "audioconvert",
                "!",
                "audioresample",
                "!",
                "queue",
                "!",
                "opusenc",
                "bitrate=128000",
                "!",
                "queue",
                "!",
                "mux.",
            ]
            .map(s),
        );
    }
    args
}
