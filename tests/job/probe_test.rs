//! Tests for the ffprobe client.

use ff_supervisor::job::{FfRunner, RunOptions};
use ff_supervisor::probe::{ProbeClient, ProbeError, Summary};
use tokio_util::sync::CancellationToken;

use crate::support::{FakeTools, PROBE_JSON};

#[tokio::test]
async fn probe_decodes_document() {
    let tools = FakeTools::new();
    let client = ProbeClient::new(tools.probe_ok());

    let probe = client
        .probe("in.mp4", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(probe.streams.len(), 2);
    assert_eq!(probe.streams[0].codec_type, "video");
    assert_eq!(probe.format.duration, "4.000000");
    assert_eq!(
        String::from_utf8_lossy(&probe.raw).trim(),
        PROBE_JSON.trim()
    );

    let summary = Summary::from_probe(&probe).unwrap();
    assert!(summary.has_video);
    assert!(summary.has_audio);
    assert_eq!((summary.width, summary.height), (1280, 720));
    assert_eq!(summary.duration.as_secs(), 4);
}

#[tokio::test]
async fn probe_receives_fixed_flags() {
    let tools = FakeTools::new();
    let log = tools.dir().join("args");
    let probe = tools.script(
        "ffprobe",
        &format!("printf '%s\\n' \"$*\" > '{}'\necho '{{}}'", log.display()),
    );

    ProbeClient::new(probe)
        .probe("https://cdn.example.com/a.m3u8", &CancellationToken::new())
        .await
        .unwrap();

    let args = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        args.trim(),
        "-hide_banner -v error -print_format json -show_format -show_streams -seekable 1 https://cdn.example.com/a.m3u8"
    );
}

#[tokio::test]
async fn probe_failure_carries_diagnostics() {
    let tools = FakeTools::new();
    let probe = tools.script(
        "ffprobe",
        "echo 'missing.mp4: No such file or directory' >&2\nexit 1",
    );

    let err = ProbeClient::new(probe)
        .probe("missing.mp4", &CancellationToken::new())
        .await
        .unwrap_err();

    let ProbeError::Process(job) = &err else {
        panic!("expected process error, got {err:?}");
    };
    assert_eq!(job.lines(), ["missing.mp4: No such file or directory"]);
    assert!(!job.is_invalid_input());
    assert!(err.to_string().contains("No such file or directory"));
}

#[tokio::test]
async fn ffprobe_stderr_keeps_only_last_lines() {
    let tools = FakeTools::new();
    let probe = tools.script(
        "ffprobe",
        "i=1\nwhile [ $i -le 25 ]; do echo \"error $i\" >&2; i=$((i+1)); done\nexit 1",
    );

    let err = ProbeClient::new(probe)
        .with_diagnostic_lines(4)
        .probe("in.mp4", &CancellationToken::new())
        .await
        .unwrap_err();

    let ProbeError::Process(job) = &err else {
        panic!("expected process error, got {err:?}");
    };
    assert_eq!(job.lines(), ["error 22", "error 23", "error 24", "error 25"]);
}

#[tokio::test]
async fn ffprobe_cancellation_returns_cancelled() {
    let tools = FakeTools::new();
    let probe = tools.script("ffprobe", "echo 'opening input' >&2\nexec sleep 30");
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        ProbeClient::new(probe).probe("in.mp4", &cancel),
    )
    .await
    .expect("probe did not return in time")
    .unwrap_err();

    let ProbeError::Process(job) = &err else {
        panic!("expected process error, got {err:?}");
    };
    assert!(job.is_cancelled());
}

#[tokio::test]
async fn probe_malformed_output_is_decode_error() {
    let tools = FakeTools::new();
    let probe = tools.script("ffprobe", "echo 'not json'");

    let err = ProbeClient::new(probe)
        .probe("in.mp4", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Decode(_)));
    assert!(err.to_string().starts_with("decode: "));
}

#[tokio::test]
async fn probe_missing_binary() {
    let err = ProbeClient::new("/nonexistent/ffprobe")
        .probe("in.mp4", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Process(_)));
}

#[tokio::test]
async fn run_reports_probe_phase() {
    let tools = FakeTools::new();
    let probe = tools.script("ffprobe", "echo 'Invalid data found when processing input' >&2\nexit 1");
    let ffmpeg = tools.script("ffmpeg", "exit 0");
    let runner = FfRunner::with_binaries(ffmpeg, probe);

    let err = runner
        .run(RunOptions::new("in.mp4", "out.mp4"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("probe: "), "got: {err}");
    assert!(err.is_invalid_input());
    assert!(err.job_error().is_some());
}

#[tokio::test]
async fn run_reports_summary_phase() {
    let tools = FakeTools::new();
    let probe = tools.script(
        "ffprobe",
        r#"echo '{"streams":[{"codec_type":"video","duration":"abc"}]}'"#,
    );
    let ffmpeg = tools.script("ffmpeg", "exit 0");
    let runner = FfRunner::with_binaries(ffmpeg, probe);

    let err = runner
        .run(RunOptions::new("in.mp4", "out.mp4"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("summary: "), "got: {err}");
    assert!(!err.is_invalid_input());
}
