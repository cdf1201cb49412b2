//! Integration tests for the fixed-duration pipeline variant search

mod mocks;

use capdrop_core::geometry::CropRegion;
use capdrop_core::pipeline::{
    CaptureJob, PixelFormat, SearchPlan, TargetKey, VariantPolicy, VariantSearch,
};
use capdrop_core::CapdropError;
use mocks::{null_remote, FakeRunner, FAKE_NODE};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn plan(dir: &Path, policy: VariantPolicy, duration: Duration) -> SearchPlan {
    SearchPlan {
        launcher: "gst-launch-1.0".to_string(),
        policy,
        node_id: FAKE_NODE,
        job: CaptureJob {
            fps: 30,
            crop: CropRegion::default(),
            output: dir.join("REC_test.webm"),
        },
        duration,
    }
}

#[test]
fn test_all_variants_fail() {
    let dir = TempDir::new().unwrap();
    let plan = plan(dir.path(), VariantPolicy::default(), Duration::from_secs(3));
    let mut search = VariantSearch::new(FakeRunner::never_succeeding());

    let err = search.run(&null_remote(), &plan).unwrap_err();
    match err {
        CapdropError::PipelineExhausted { attempts, last_error } => {
            assert_eq!(attempts, 18);
            assert!(last_error.contains("attempt 18"));
        }
        other => panic!("expected PipelineExhausted, got {:?}", other),
    }
    assert_eq!(search.into_runner().commands.len(), 18);
}

#[test]
fn test_variant_order() {
    let dir = TempDir::new().unwrap();
    let plan = plan(dir.path(), VariantPolicy::default(), Duration::from_secs(3));
    let mut search = VariantSearch::new(FakeRunner::never_succeeding());
    let _ = search.run(&null_remote(), &plan);
    let commands = search.into_runner().commands;

    let has = |i: usize, arg: &str| commands[i].args.iter().any(|a| a == arg);
    let caps = |i: usize| {
        commands[i]
            .args
            .iter()
            .find(|a| a.starts_with("video/x-raw"))
            .cloned()
            .unwrap_or_default()
    };

    // path=, I420, framerate first
    assert!(has(0, "path=44"));
    assert_eq!(caps(0), "video/x-raw,format=I420,framerate=30/1");
    // then the same without framerate
    assert!(has(1, "path=44"));
    assert_eq!(caps(1), "video/x-raw,format=I420");
    // formats change before targets
    assert_eq!(caps(2), "video/x-raw,format=BGRx,framerate=30/1");
    assert!(has(6, "target-object=44"));
    // the last third sets no target at all
    assert!(!commands[12].args.iter().any(|a| a.starts_with("path=") || a.starts_with("target-object=")));
    assert_eq!(caps(17), "video/x-raw,format=RGBA");

    for command in &commands {
        assert_eq!(command.program, "gst-launch-1.0");
        assert_eq!(command.args[0], "-e");
    }
}

#[test]
fn test_stops_at_first_success() {
    let dir = TempDir::new().unwrap();
    let plan = plan(dir.path(), VariantPolicy::default(), Duration::from_secs(3));
    let mut search = VariantSearch::new(FakeRunner::succeeding_on(5));

    let output = search.run(&null_remote(), &plan).unwrap();
    assert_eq!(output, plan.job.output);
    assert_eq!(std::fs::read(&output).unwrap(), b"webm-bytes");
    assert_eq!(search.into_runner().commands.len(), 5);
}

#[test]
fn test_zero_byte_output_is_removed_between_attempts() {
    let dir = TempDir::new().unwrap();
    let policy = VariantPolicy {
        target_keys: vec![TargetKey::Path],
        formats: vec![PixelFormat::I420],
        framerate_options: vec![true, false],
    };
    let plan = plan(dir.path(), policy, Duration::from_secs(3));
    let mut runner = FakeRunner::never_succeeding();
    runner.leave_empty_file = true;
    let mut search = VariantSearch::new(runner);

    assert!(search.run(&null_remote(), &plan).is_err());
    assert!(!plan.job.output.exists());
}

#[test]
fn test_exit_zero_without_output_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let policy = VariantPolicy {
        target_keys: vec![TargetKey::None],
        formats: vec![PixelFormat::Bgrx],
        framerate_options: vec![false],
    };
    let plan = plan(dir.path(), policy, Duration::from_secs(3));

    struct ExitsCleanly;
    impl capdrop_core::pipeline::AttemptRunner for ExitsCleanly {
        fn run(
            &mut self,
            _command: &capdrop_core::pipeline::LaunchCommand,
            _fd: capdrop_core::process::ChildFd,
            _duration: Duration,
        ) -> capdrop_core::Result<capdrop_core::pipeline::AttemptOutcome> {
            Ok(capdrop_core::pipeline::AttemptOutcome {
                exit_code: Some(0),
                stderr: String::new(),
            })
        }
    }

    let err = VariantSearch::new(ExitsCleanly).run(&null_remote(), &plan).unwrap_err();
    assert!(matches!(err, CapdropError::PipelineExhausted { attempts: 1, .. }));
}

#[test]
fn test_duration_has_a_floor() {
    let dir = TempDir::new().unwrap();
    let plan = plan(dir.path(), VariantPolicy::default(), Duration::ZERO);
    let mut search = VariantSearch::new(FakeRunner::succeeding_on(1));

    search.run(&null_remote(), &plan).unwrap();
    assert_eq!(search.into_runner().durations, vec![Duration::from_secs(1)]);
}
