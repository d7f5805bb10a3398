//! Job supervision tests against fake tools.

mod probe_test;
mod runner_test;

/// Verify the public job types are exported from the library.
#[test]
fn test_job_types_exported() {
    use ff_supervisor::job::{
        ExecError, FfRunner, JobProgress, JobState, JobStateMachine, ProgressTransport, RunError,
        RunOptions, SpawnError,
    };

    let _ = FfRunner::default();
    let _ = RunOptions::new("in", "out").transport(ProgressTransport::Pipe);
    let _ = JobStateMachine::new();
    let _ = JobState::Idle;
    let _: fn() -> ExecError = || ExecError::Cancelled;
    let _: fn() -> SpawnError = || SpawnError::NotFound;
    let _: Option<RunError> = None;
    let _: Option<JobProgress> = None;
}
