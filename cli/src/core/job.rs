//! # devenv Build Jobs (`core::job`)
//!
//! File: cli/src/core/job.rs
//!
//! ## Overview
//!
//! An `ExternalBuildJob` owns exactly one run of the external build tool. It
//! assembles the command line with [`CommandBuilder`], starts the process,
//! classifies every line the tool prints and reports a single terminal
//! [`JobResult`].
//!
//! ## Lifecycle
//!
//! ```text
//! Created --start()--> Running --exit 0------> Completed
//!    |                    |----exit != 0----> Failed(ExitCode)
//!    |                    '----cancel()-----> Cancelled
//!    '--bad settings / spawn error---------> Failed(Configuration | ProcessStart)
//! ```
//!
//! Terminal states are final and a job runs at most once; a second build
//! needs a new job.
//!
//! ## Output and cancellation
//!
//! Events are delivered on a caller-supplied unbounded channel: one
//! `JobEvent::Item` per output line, in the order the lines were read,
//! followed by exactly one `JobEvent::Finished`.
//!
//! Emitting an item and accepting a cancellation take the same lock. Once
//! `cancel()` has returned `true`, no further items are sent and the job ends
//! in `Cancelled`, even if the tool was exiting on its own at that moment.
//! The tool is asked to stop (SIGTERM on Unix) and given `kill_timeout` to
//! exit before it is killed outright.
//!
//! ## Examples
//!
//! ```rust
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let mut job = ExternalBuildJob::new(builder, BuildTarget::new("app.sln"), CommandVerb::Build);
//! let handle = job.start(tx)?;
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         JobEvent::Item(item) => println!("{}", item.text),
//!         JobEvent::Finished(result) => println!("{}", result),
//!     }
//! }
//! let result = handle.wait().await;
//! ```
//!
use crate::common::filter::{
    ClassifiedItem, CompilerClassifier, LineAnnotationFilter, OutputClassifier,
};
use crate::common::process::{self, MergedChild};
use crate::core::command::{BuildTarget, CommandBuilder, CommandVerb};
use crate::core::error::DevbuildError;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How long a cancelled tool gets to exit before it is killed outright.
pub const DEFAULT_KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to keep reading output after the tool has exited. Helper
/// processes that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How long to wait for the tool to be reaped after the forced kill.
const FORCED_KILL_REAP: Duration = Duration::from_secs(2);

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The build tool is not configured or not executable. No process was started.
    Configuration(String),
    /// The OS refused to start the build tool.
    ProcessStart(String),
    /// The build tool exited with a non-zero code.
    ExitCode(i32),
    /// The build tool was terminated by a signal and has no exit code.
    Terminated,
    /// Waiting on the build tool or the job task failed.
    Io(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Configuration(msg) => write!(f, "configuration error: {}", msg),
            FailureReason::ProcessStart(msg) => write!(f, "failed to start build tool: {}", msg),
            FailureReason::ExitCode(code) => write!(f, "build tool exited with code {}", code),
            FailureReason::Terminated => write!(f, "build tool was terminated by a signal"),
            FailureReason::Io(msg) => write!(f, "{}", msg),
        }
    }
}

/// The terminal outcome of a job, reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Succeeded => write!(f, "succeeded"),
            JobResult::Failed(reason) => write!(f, "failed ({})", reason),
            JobResult::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed(FailureReason),
    Cancelled,
}

impl From<JobResult> for JobState {
    fn from(result: JobResult) -> Self {
        match result {
            JobResult::Succeeded => JobState::Completed,
            JobResult::Failed(reason) => JobState::Failed(reason),
            JobResult::Cancelled => JobState::Cancelled,
        }
    }
}

/// Events a job sends to its sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Item(ClassifiedItem),
    Finished(JobResult),
}

/// Receiving end is owned by the caller; the job holds the sender.
pub type JobSink = mpsc::UnboundedSender<JobEvent>;

#[derive(Debug)]
struct Lifecycle {
    state: JobState,
    cancel_requested: bool,
}

/// State shared between the job, its handles and the task driving the tool.
#[derive(Debug)]
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    cancelled: Notify,
}

impl Shared {
    fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle {
                state: JobState::Created,
                cancel_requested: false,
            }),
            cancelled: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> JobState {
        self.lock().state.clone()
    }

    fn set_running(&self) {
        self.lock().state = JobState::Running;
    }

    /// Sends `item` unless a cancellation has been accepted.
    fn emit(&self, sink: &JobSink, item: ClassifiedItem) -> bool {
        let lifecycle = self.lock();
        if lifecycle.cancel_requested {
            return false;
        }
        // A closed sink only means nobody is listening any more.
        let _ = sink.send(JobEvent::Item(item));
        true
    }

    fn request_cancel(&self) -> bool {
        let mut lifecycle = self.lock();
        if lifecycle.state != JobState::Running || lifecycle.cancel_requested {
            return false;
        }
        lifecycle.cancel_requested = true;
        self.cancelled.notify_one();
        true
    }

    /// Records the terminal state. An accepted cancellation overrides `result`.
    fn finish(&self, result: JobResult) -> JobResult {
        let mut lifecycle = self.lock();
        let result = if lifecycle.cancel_requested {
            JobResult::Cancelled
        } else {
            result
        };
        lifecycle.state = result.clone().into();
        result
    }
}

/// Requests cancellation of a running job. Cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Returns `true` if the request was accepted, i.e. the job was running
    /// and will end in `Cancelled`.
    pub fn cancel(&self) -> bool {
        let accepted = self.shared.request_cancel();
        if accepted {
            info!("Cancellation requested for build job");
        }
        accepted
    }
}

/// Handle to a started job.
#[derive(Debug)]
pub struct JobHandle {
    shared: Arc<Shared>,
    task: JoinHandle<JobResult>,
}

impl JobHandle {
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    /// Waits for the job to reach a terminal state.
    pub async fn wait(self) -> JobResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                // Only reachable if the runtime shuts down under us; the
                // supervisor has had no chance to report.
                error!("Build job supervisor failed: {}", e);
                self.shared.finish(JobResult::Failed(FailureReason::Io(format!(
                    "build job task failed: {}",
                    e
                ))))
            }
        }
    }
}

/// One invocation of the external build tool.
pub struct ExternalBuildJob {
    builder: CommandBuilder,
    target: BuildTarget,
    verb: CommandVerb,
    classifier: Option<Box<dyn OutputClassifier>>,
    kill_timeout: Duration,
    shared: Arc<Shared>,
}

impl ExternalBuildJob {
    pub fn new(builder: CommandBuilder, target: BuildTarget, verb: CommandVerb) -> Self {
        Self {
            builder,
            target,
            verb,
            classifier: None,
            kill_timeout: DEFAULT_KILL_TIMEOUT,
            shared: Arc::new(Shared::new()),
        }
    }

    /// Replaces the default [`CompilerClassifier`]. The `N>` task-prefix
    /// filter is applied in front of whichever classifier is used.
    #[cfg(test)]
    pub fn with_classifier(mut self, classifier: impl OutputClassifier + 'static) -> Self {
        self.classifier = Some(Box::new(classifier));
        self
    }

    pub fn with_kill_timeout(mut self, timeout: Duration) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    /// Validates the settings and starts the build tool.
    ///
    /// Configuration and spawn errors are returned here, after the job has
    /// moved to `Failed` and a `Finished` event has been sent. Must be called
    /// from within a Tokio runtime.
    pub fn start(&mut self, sink: JobSink) -> Result<JobHandle, DevbuildError> {
        if self.state() != JobState::Created {
            return Err(DevbuildError::AlreadyStarted);
        }

        let spec = match self.builder.build(&self.target, self.verb) {
            Ok(spec) => spec,
            Err(e) => {
                let reason = match &e {
                    DevbuildError::Config(msg) => msg.clone(),
                    other => other.to_string(),
                };
                self.fail_early(&sink, FailureReason::Configuration(reason));
                return Err(e);
            }
        };

        let classifier = self
            .classifier
            .take()
            .unwrap_or_else(|| {
                Box::new(CompilerClassifier::new(spec.working_directory())) as Box<dyn OutputClassifier>
            });
        let filter = LineAnnotationFilter::new(classifier);

        info!(
            "Starting {} of {} in {}",
            self.verb,
            self.target.path().display(),
            spec.working_directory().display()
        );
        let merged = match process::spawn_with_merged_output(
            spec.program(),
            spec.args(),
            spec.working_directory(),
        ) {
            Ok(merged) => merged,
            Err(source) => {
                self.fail_early(&sink, FailureReason::ProcessStart(source.to_string()));
                return Err(DevbuildError::ProcessStart {
                    program: spec.program().to_path_buf(),
                    source,
                });
            }
        };

        self.shared.set_running();
        let driver = tokio::spawn(drive(
            Arc::clone(&self.shared),
            merged,
            filter,
            sink.clone(),
            self.kill_timeout,
        ));
        let task = tokio::spawn(supervise(Arc::clone(&self.shared), driver, sink));
        Ok(JobHandle {
            shared: Arc::clone(&self.shared),
            task,
        })
    }

    fn fail_early(&self, sink: &JobSink, reason: FailureReason) {
        warn!("Build job failed before starting: {}", reason);
        let result = self.shared.finish(JobResult::Failed(reason));
        let _ = sink.send(JobEvent::Finished(result));
    }
}

/// Pumps output through `filter` until the tool exits or the job is cancelled.
async fn drive(
    shared: Arc<Shared>,
    mut merged: MergedChild,
    mut filter: LineAnnotationFilter<Box<dyn OutputClassifier>>,
    sink: JobSink,
    kill_timeout: Duration,
) -> JobResult {
    let mut exit = None;
    let mut lines_open = true;
    let mut drain_deadline = Instant::now();

    let result = loop {
        if exit.is_some() && !lines_open {
            break exit_result(exit.take());
        }
        tokio::select! {
            biased;
            _ = shared.cancelled.notified() => {
                terminate(&mut merged.child, kill_timeout).await;
                break JobResult::Cancelled;
            }
            line = merged.lines.recv(), if lines_open => match line {
                Some(line) => {
                    let item = filter.classify(&line);
                    if !shared.emit(&sink, item) {
                        terminate(&mut merged.child, kill_timeout).await;
                        break JobResult::Cancelled;
                    }
                }
                None => lines_open = false,
            },
            status = merged.child.wait(), if exit.is_none() => {
                debug!(?status, "Build tool exited");
                exit = Some(status);
                drain_deadline = Instant::now() + OUTPUT_DRAIN_GRACE;
            }
            _ = tokio::time::sleep_until(drain_deadline), if exit.is_some() && lines_open => {
                warn!("Build tool output still open after exit; ignoring the rest");
                lines_open = false;
            }
        }
    };

    let result = shared.finish(result);
    info!("Build job {}", result);
    let _ = sink.send(JobEvent::Finished(result.clone()));
    result
}

/// Awaits the task driving the tool. If it died without reporting (a panic
/// in a classifier, say), records the failure and sends the `Finished` event
/// it never sent.
async fn supervise(
    shared: Arc<Shared>,
    driver: JoinHandle<JobResult>,
    sink: JobSink,
) -> JobResult {
    match driver.await {
        Ok(result) => result,
        Err(e) => {
            error!("Build job task failed: {}", e);
            let result = shared.finish(JobResult::Failed(FailureReason::Io(format!(
                "build job task failed: {}",
                e
            ))));
            let _ = sink.send(JobEvent::Finished(result.clone()));
            result
        }
    }
}

fn exit_result(exit: Option<std::io::Result<std::process::ExitStatus>>) -> JobResult {
    match exit {
        Some(Ok(status)) if status.success() => JobResult::Succeeded,
        Some(Ok(status)) => match status.code() {
            Some(code) => JobResult::Failed(FailureReason::ExitCode(code)),
            None => JobResult::Failed(FailureReason::Terminated),
        },
        Some(Err(e)) => JobResult::Failed(FailureReason::Io(format!(
            "failed to wait for build tool: {}",
            e
        ))),
        None => JobResult::Failed(FailureReason::Io("build tool exit status lost".into())),
    }
}

/// Asks the tool to stop, waiting up to `timeout` for it to exit before
/// killing it. The wait after the kill is bounded too, so cancellation always
/// completes.
async fn terminate(child: &mut Child, timeout: Duration) {
    request_stop(child);
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            info!(?status, "Build tool stopped after cancellation");
            return;
        }
        Ok(Err(e)) => {
            error!(error = %e, "Error waiting for cancelled build tool");
            return;
        }
        Err(_) => warn!(
            "Build tool did not exit within {:?}, forcing kill",
            timeout
        ),
    }
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Kill signal not delivered; build tool may have exited");
    }
    if tokio::time::timeout(FORCED_KILL_REAP, child.wait())
        .await
        .is_err()
    {
        error!("Build tool still running after forced kill; abandoning it");
    }
}

/// Sends SIGTERM so the tool can clean up.
#[cfg(unix)]
fn request_stop(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        debug!("Build tool already reaped, nothing to stop");
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!(error = %e, "SIGTERM not delivered; build tool may have exited");
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Kill not delivered; build tool may have exited");
    }
}
