//! Tests for supervised ffmpeg runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ff_supervisor::job::{
    ExecError, FfRunner, JobProgress, ProgressTransport, RunError, RunOptions, SpawnError,
};
use ff_supervisor::probe::Probe;
use tokio_util::sync::CancellationToken;

use crate::support::{FakeTools, PROBE_JSON};

/// Upper bound for any supervised run in these tests.
const RUN_DEADLINE: Duration = Duration::from_secs(10);

const PROGRESS_SCRIPT: &str = "\
printf 'frame=10\\nout_time_us=1000000\\nspeed=1.5x\\nprogress=continue\\n'
printf 'garbage line\\nout_time_us=2000000\\nspeed=2x\\nprogress=continue\\n'
printf 'progress=done\\n'";

fn probe() -> Probe {
    Probe::from_json(PROBE_JSON.as_bytes().to_vec()).unwrap()
}

fn runner(tools: &FakeTools, ffmpeg_body: &str) -> FfRunner {
    let ffmpeg = tools.script("ffmpeg", ffmpeg_body);
    FfRunner::with_binaries(ffmpeg, "/nonexistent/ffprobe")
}

fn collector() -> (Arc<Mutex<Vec<JobProgress>>>, impl FnMut(JobProgress) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |progress| sink.lock().unwrap().push(progress))
}

async fn run(runner: &FfRunner, options: RunOptions, cancel: &CancellationToken) -> Result<(), RunError> {
    tokio::time::timeout(RUN_DEADLINE, runner.run(options, cancel))
        .await
        .expect("run did not return in time")
}

#[tokio::test]
async fn run_reports_normalized_progress() {
    let tools = FakeTools::new();
    let runner = runner(&tools, PROGRESS_SCRIPT);
    let (seen, on_progress) = collector();

    let options = RunOptions::new("in.mp4", "out.mp4")
        .probe(probe())
        .on_progress(on_progress);
    run(&runner, options, &CancellationToken::new()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!((seen[0].complete - 0.25).abs() < 1e-9);
    assert!((seen[0].speed - 1.5).abs() < f64::EPSILON);
    assert!(!seen[0].done);
    assert!((seen[1].complete - 0.5).abs() < 1e-9);
    assert!((seen[1].speed - 2.0).abs() < f64::EPSILON);
    assert!(seen[2].done);
    assert!(seen[2].complete.abs() < f64::EPSILON);
}

#[tokio::test]
async fn run_survives_invalid_utf8_progress() {
    let tools = FakeTools::new();
    let runner = runner(
        &tools,
        "printf 'out_time_us=1000000\\nprogress=continue\\n'
printf 'title=\\377\\376\\n'
printf 'out_time_us=2000000\\nprogress=continue\\n'
printf 'out_time_us=3000000\\nprogress=done\\n'",
    );
    let (seen, on_progress) = collector();

    let options = RunOptions::new("in.mp4", "out.mp4")
        .probe(probe())
        .on_progress(on_progress);
    run(&runner, options, &CancellationToken::new()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!((seen[1].complete - 0.5).abs() < 1e-9);
    assert!(seen[2].done);
}

#[tokio::test]
async fn run_probes_when_no_metadata_given() {
    let tools = FakeTools::new();
    let probe = tools.probe_ok();
    let ffmpeg = tools.script("ffmpeg", PROGRESS_SCRIPT);
    let runner = FfRunner::with_binaries(ffmpeg, probe);
    let (seen, on_progress) = collector();

    let options = RunOptions::new("in.mp4", "out.mp4").on_progress(on_progress);
    run(&runner, options, &CancellationToken::new()).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[0].is_known());
}

#[tokio::test]
async fn run_builds_command_line() {
    let tools = FakeTools::new();
    let log = tools.dir().join("args");
    let runner = runner(&tools, &format!("printf '%s\\n' \"$*\" > '{}'", log.display()));

    let options = RunOptions::new("in.mp4", "out.mp4")
        .probe(probe())
        .input_args(["-ss", "2"])
        .args(["-c", "copy"])
        .progress_period(Duration::from_millis(500));
    run(&runner, options, &CancellationToken::new()).await.unwrap();

    let args = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        args.trim(),
        "-hide_banner -y -v error -xerror -nostdin -progress pipe:1 -stats_period 0.5 \
         -ss 2 -i in.mp4 -c copy out.mp4"
    );
}

#[tokio::test]
async fn run_failure_carries_last_diagnostic_lines() {
    let tools = FakeTools::new();
    let runner = runner(
        &tools,
        "i=1\nwhile [ $i -le 15 ]; do echo \"line $i\" >&2; i=$((i+1)); done\nexit 1",
    );

    let options = RunOptions::new("in.mp4", "out.mp4").probe(probe());
    let err = run(&runner, options, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("run: "), "got: {err}");
    let job = err.job_error().unwrap();
    assert!(matches!(job.cause(), ExecError::Exit { .. }));
    assert_eq!(job.lines().len(), 10);
    assert_eq!(job.lines()[0], "line 6");
    assert_eq!(job.lines()[9], "line 15");
    assert!(err.to_string().contains("\n  line 15"));
    assert!(!err.is_invalid_input());
}

#[tokio::test]
async fn run_classifies_invalid_input() {
    let tools = FakeTools::new();
    let runner = runner(
        &tools,
        "echo 'in.mp4: Invalid data found when processing input' >&2\nexit 1",
    );

    let options = RunOptions::new("in.mp4", "out.mp4").probe(probe());
    let err = run(&runner, options, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_invalid_input());
    assert!(ff_supervisor::is_invalid_input(&err));
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn run_cancellation_terminates_process() {
    let tools = FakeTools::new();
    let runner = runner(&tools, "exec sleep 30");
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let options = RunOptions::new("in.mp4", "out.mp4").probe(probe());
    let err = run(&runner, options, &cancel).await.unwrap_err();

    assert!(err.is_cancelled(), "got: {err}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn run_returns_when_pipes_outlive_process() {
    let tools = FakeTools::new();
    let runner = runner(&tools, &format!("{PROGRESS_SCRIPT}\nsleep 5 &\nexit 0"));
    let (seen, on_progress) = collector();

    let started = tokio::time::Instant::now();
    let options = RunOptions::new("in.mp4", "out.mp4")
        .probe(probe())
        .on_progress(on_progress);
    run(&runner, options, &CancellationToken::new()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn run_missing_binary_is_spawn_error() {
    let runner = FfRunner::with_binaries("/nonexistent/ffmpeg", "/nonexistent/ffprobe");

    let options = RunOptions::new("in.mp4", "out.mp4").probe(probe());
    let err = run(&runner, options, &CancellationToken::new())
        .await
        .unwrap_err();

    let job = err.job_error().unwrap();
    assert!(matches!(
        job.cause(),
        ExecError::Spawn {
            source: SpawnError::NotFound,
            ..
        }
    ));
    assert!(job.lines().is_empty());
}

#[tokio::test]
async fn run_listener_transport_passes_url() {
    let tools = FakeTools::new();
    let log = tools.dir().join("args");
    let runner = runner(&tools, &format!("printf '%s\\n' \"$*\" > '{}'", log.display()));

    let options = RunOptions::new("in.mp4", "out.mp4")
        .probe(probe())
        .transport(ProgressTransport::Listener);
    run(&runner, options, &CancellationToken::new()).await.unwrap();

    let args = std::fs::read_to_string(&log).unwrap();
    assert!(args.contains("-progress http://127.0.0.1:"), "got: {args}");
    assert!(args.contains("/progress -stats_period 1"), "got: {args}");
    assert!(!args.contains("pipe:1"));
}

#[tokio::test]
async fn run_listener_transport_cancellation() {
    let tools = FakeTools::new();
    let runner = runner(&tools, "exec sleep 30");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let options = RunOptions::new("in.mp4", "out.mp4")
        .probe(probe())
        .transport(ProgressTransport::Listener);
    let err = run(&runner, options, &cancel).await.unwrap_err();

    assert!(err.is_cancelled(), "got: {err}");
}
