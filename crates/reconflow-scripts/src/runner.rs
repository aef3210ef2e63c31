//! Script process lifecycle.
//!
//! [`ScriptRunner`] spawns a script with the target domain as its only
//! argument, streams each output line to the job's progress publisher and its
//! log file, and keeps a table of live processes so a job can be killed.
//!
//! Scripts run with their own output directory (`<targets_dir>/<domain>`) as
//! the working directory, also exported as `RECONFLOW_OUTPUT_DIR`.

use crate::error::{Result, ScriptError};
use crate::output::{list_output_files, stat_file, OutputFile};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reconflow_core::{validate_domain, JobId, ScriptsConfig};
use reconflow_events::{OutputStream, ProgressPublisher};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio_util::codec::{BytesCodec, FramedRead};
use tokio_util::sync::CancellationToken;

/// Longest output line forwarded as one event; longer lines arrive in pieces.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Environment variable pointing a script at its output directory.
pub const OUTPUT_DIR_ENV: &str = "RECONFLOW_OUTPUT_DIR";

/// What a script produced when it exited with code 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutput {
    /// Always 0
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// When the process exited
    pub finished_at: DateTime<Utc>,
    /// Files in the target's output directory, plus the job log
    pub output_files: Vec<OutputFile>,
}

/// A snapshot of a tracked live process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    /// Job the process belongs to
    pub job_id: JobId,
    /// Operating system process id
    pub pid: Option<u32>,
    /// Script file name
    pub script: String,
    /// Domain passed to the script
    pub domain: String,
    /// When the process was started
    pub started_at: DateTime<Utc>,
    /// Milliseconds since start
    pub runtime_ms: u64,
}

/// Stops output publishing for a job once it has been killed.
///
/// Publishing happens while holding the lock, so once `close` returns no
/// further event for the job can reach the bus.
#[derive(Debug)]
struct OutputGate {
    open: Mutex<bool>,
}

impl OutputGate {
    fn new() -> Self {
        Self {
            open: Mutex::new(true),
        }
    }

    fn emit(&self, publish: impl FnOnce()) {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            publish();
        }
    }

    fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

#[derive(Debug)]
struct TrackedProcess {
    pid: Option<u32>,
    script: String,
    domain: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    gate: Arc<OutputGate>,
}

type ProcessTable = Mutex<HashMap<JobId, TrackedProcess>>;

/// Removes a job's table entry however its run ends.
struct Registration<'a> {
    table: &'a ProcessTable,
    job_id: &'a JobId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.job_id);
    }
}

/// Runs scripts and tracks the live ones.
#[derive(Debug)]
pub struct ScriptRunner {
    config: ScriptsConfig,
    processes: ProcessTable,
}

impl ScriptRunner {
    /// Create a runner.
    #[must_use]
    pub fn new(config: ScriptsConfig) -> Self {
        Self {
            config,
            processes: Mutex::new(HashMap::new()),
        }
    }

    /// The runner's configuration.
    #[must_use]
    pub fn config(&self) -> &ScriptsConfig {
        &self.config
    }

    fn table(&self) -> MutexGuard<'_, HashMap<JobId, TrackedProcess>> {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve a script name to an absolute path inside the script directory.
    pub async fn resolve_script(&self, name: &str) -> Result<PathBuf> {
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|file_name| file_name == name);
        if !plain || name.starts_with('.') {
            return Err(ScriptError::InvalidName(name.to_string()));
        }

        match tokio::fs::canonicalize(self.config.script_dir.join(name)).await {
            Ok(path) if path.is_file() => Ok(path),
            Ok(_) => Err(ScriptError::NotFound(name.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ScriptError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Output directory for a domain.
    pub fn target_dir(&self, domain: &str) -> Result<PathBuf> {
        validate_domain(domain).map_err(|_| ScriptError::InvalidDomain(domain.to_string()))?;
        Ok(self.config.targets_dir.join(domain))
    }

    /// Path of a job's log file.
    #[must_use]
    pub fn log_path(&self, job_id: &JobId) -> PathBuf {
        self.config.log_dir.join(format!("{job_id}.log"))
    }

    /// Run `script` against `domain`, publishing its output as it arrives.
    ///
    /// Returns once the process has exited. Exit code 0 is success; anything
    /// else, including being killed, is an error.
    pub async fn run(
        &self,
        script: &str,
        domain: &str,
        progress: &ProgressPublisher,
    ) -> Result<ScriptOutput> {
        let job_id = progress.job_id().clone();
        let script_path = self.resolve_script(script).await?;
        let output_dir = self.target_dir(domain)?;
        tokio::fs::create_dir_all(&output_dir).await?;
        let output_dir = tokio::fs::canonicalize(&output_dir).await?;

        let mut command = if self.config.interpreter.trim().is_empty() {
            Command::new(&script_path)
        } else {
            let mut command = Command::new(self.config.interpreter.trim());
            command.arg(&script_path);
            command
        };
        command
            .arg(domain)
            .current_dir(&output_dir)
            .env(OUTPUT_DIR_ENV, &output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ScriptError::Spawn {
            script: script.to_string(),
            source,
        })?;

        let cancel = CancellationToken::new();
        let gate = Arc::new(OutputGate::new());
        self.table().insert(
            job_id.clone(),
            TrackedProcess {
                pid: child.id(),
                script: script.to_string(),
                domain: domain.to_string(),
                started_at: Utc::now(),
                cancel: cancel.clone(),
                gate: Arc::clone(&gate),
            },
        );
        let registration = Registration {
            table: &self.processes,
            job_id: &job_id,
        };
        tracing::info!(job_id = %job_id, script, domain, pid = ?child.id(), "script started");

        let mut capture = Capture {
            stdout: String::new(),
            stderr: String::new(),
            log: open_log(&self.log_path(&job_id)).await,
            gate: &gate,
            progress,
        };
        capture.pump(&mut child, &cancel).await;
        capture.finish_log().await;

        let Some(status) = wait_or_cancel(&mut child, &cancel).await? else {
            terminate(&mut child, Duration::from_secs(self.config.kill_grace_secs)).await?;
            tracing::info!(job_id = %job_id, script, "script terminated");
            return Err(ScriptError::Terminated);
        };
        drop(registration);

        match status.code() {
            Some(0) => {
                tracing::info!(job_id = %job_id, script, "script completed");
                Ok(ScriptOutput {
                    exit_code: 0,
                    stdout: capture.stdout,
                    stderr: capture.stderr,
                    finished_at: Utc::now(),
                    output_files: self.output_files(domain, Some(&job_id)).await?,
                })
            }
            Some(code) => {
                tracing::warn!(job_id = %job_id, script, code, "script exited with nonzero code");
                Err(ScriptError::NonZeroExit {
                    code,
                    stderr: capture.stderr,
                })
            }
            None => match exit_signal(status) {
                Some(signal) => {
                    tracing::warn!(job_id = %job_id, script, signal, "script killed by signal");
                    Err(ScriptError::Signaled(signal))
                }
                None => Err(ScriptError::Terminated),
            },
        }
    }

    /// Kill a tracked process.
    ///
    /// Returns `false` when no live process is tracked for the job. Once this
    /// returns `true`, no further output from the job is published.
    pub fn kill(&self, job_id: &JobId) -> bool {
        let Some(tracked) = self.table().remove(job_id) else {
            return false;
        };
        tracked.gate.close();
        tracked.cancel.cancel();
        tracing::info!(job_id = %job_id, script = %tracked.script, pid = ?tracked.pid, "kill requested");
        true
    }

    /// Snapshot of a live process.
    #[must_use]
    pub fn process_info(&self, job_id: &JobId) -> Option<ProcessInfo> {
        self.table().get(job_id).map(|tracked| ProcessInfo {
            job_id: job_id.clone(),
            pid: tracked.pid,
            script: tracked.script.clone(),
            domain: tracked.domain.clone(),
            started_at: tracked.started_at,
            runtime_ms: u64::try_from((Utc::now() - tracked.started_at).num_milliseconds())
                .unwrap_or_default(),
        })
    }

    /// Jobs with a live process.
    #[must_use]
    pub fn active_jobs(&self) -> Vec<JobId> {
        let mut jobs: Vec<JobId> = self.table().keys().cloned().collect();
        jobs.sort();
        jobs
    }

    /// Files in a domain's output directory, plus the job's log when given.
    pub async fn output_files(
        &self,
        domain: &str,
        job_id: Option<&JobId>,
    ) -> Result<Vec<OutputFile>> {
        let mut files = list_output_files(&self.target_dir(domain)?).await?;
        if let Some(job_id) = job_id {
            if let Some(log) = stat_file(&self.log_path(job_id)).await? {
                files.push(log);
            }
        }
        Ok(files)
    }
}

async fn open_log(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            tracing::warn!(path = %path.display(), error = %e, "cannot create log directory");
            return None;
        }
    }
    match OpenOptions::new().create(true).append(true).open(path).await {
        Ok(file) => Some(file),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot open job log");
            None
        }
    }
}

/// Accumulates output, appends it to the log and publishes it.
struct Capture<'a> {
    stdout: String,
    stderr: String,
    log: Option<File>,
    gate: &'a OutputGate,
    progress: &'a ProgressPublisher,
}

impl Capture<'_> {
    /// Read both pipes to EOF, or until the job is killed.
    async fn pump(&mut self, child: &mut Child, cancel: &CancellationToken) {
        let mut stdout = child
            .stdout
            .take()
            .map(|out| FramedRead::new(out, BytesCodec::new()));
        let mut stderr = child
            .stderr
            .take()
            .map(|err| FramedRead::new(err, BytesCodec::new()));
        let mut stdout_lines = LineSplitter::new(MAX_LINE_LENGTH);
        let mut stderr_lines = LineSplitter::new(MAX_LINE_LENGTH);

        while stdout.is_some() || stderr.is_some() {
            let (stream, chunk) = tokio::select! {
                () = cancel.cancelled() => return,
                chunk = next_chunk(&mut stdout), if stdout.is_some() => (OutputStream::Stdout, chunk),
                chunk = next_chunk(&mut stderr), if stderr.is_some() => (OutputStream::Stderr, chunk),
            };
            let splitter = match stream {
                OutputStream::Stdout => &mut stdout_lines,
                OutputStream::Stderr => &mut stderr_lines,
            };
            let lines = match chunk {
                Some(bytes) => splitter.push(&bytes),
                None => {
                    match stream {
                        OutputStream::Stdout => stdout = None,
                        OutputStream::Stderr => stderr = None,
                    }
                    splitter.finish().into_iter().collect()
                }
            };
            for line in lines {
                self.record(stream, line).await;
            }
        }
    }

    async fn record(&mut self, stream: OutputStream, line: Line) {
        let Line { text, terminated } = line;
        let (captured, log_line) = match stream {
            OutputStream::Stdout => (&mut self.stdout, format!("{text}\n")),
            OutputStream::Stderr => (&mut self.stderr, format!("ERROR: {text}\n")),
        };
        captured.push_str(&text);
        if terminated {
            captured.push('\n');
        }

        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.write_all(log_line.as_bytes()).await {
                tracing::warn!(job_id = %self.progress.job_id(), error = %e, "job log write failed, disabling log");
                self.log = None;
            }
        }

        let progress = self.progress;
        self.gate.emit(|| progress.output(stream, text));
    }

    async fn finish_log(&mut self) {
        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.flush().await {
                tracing::warn!(job_id = %self.progress.job_id(), error = %e, "job log flush failed");
            }
        }
    }
}

/// Next raw chunk; `None` once the stream is finished or broken.
async fn next_chunk<R>(reader: &mut Option<FramedRead<R, BytesCodec>>) -> Option<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match reader.as_mut()?.next().await? {
        Ok(chunk) => Some(chunk.to_vec()),
        Err(e) => {
            tracing::warn!(error = %e, "output stream read failed");
            None
        }
    }
}

/// One decoded piece of output.
#[derive(Debug, PartialEq, Eq)]
struct Line {
    text: String,
    /// False for a piece cut from an overlong line, or a final line without a newline
    terminated: bool,
}

impl Line {
    fn decode(bytes: &[u8], terminated: bool) -> Self {
        Self {
            text: String::from_utf8_lossy(bytes).into_owned(),
            terminated,
        }
    }
}

/// Splits raw output into lines no longer than `max` bytes.
///
/// Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug)]
struct LineSplitter {
    pending: Vec<u8>,
    max: usize,
}

impl LineSplitter {
    fn new(max: usize) -> Self {
        Self {
            pending: Vec::new(),
            max,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<Line> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        loop {
            let window = self.pending.len().min(self.max + 1);
            if let Some(pos) = self.pending[..window].iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                lines.push(Line::decode(&line, true));
            } else if self.pending.len() > self.max {
                let cut = split_point(&self.pending, self.max);
                let piece: Vec<u8> = self.pending.drain(..cut).collect();
                lines.push(Line::decode(&piece, false));
            } else {
                return lines;
            }
        }
    }

    /// Whatever is left once the stream has closed.
    fn finish(&mut self) -> Option<Line> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(Line::decode(&rest, false))
    }
}

/// Cut at `max`, or a few bytes earlier so a UTF-8 sequence stays whole.
fn split_point(bytes: &[u8], max: usize) -> usize {
    let floor = max.saturating_sub(3);
    let mut cut = max;
    while cut > floor && bytes[cut] & 0xC0 == 0x80 {
        cut -= 1;
    }
    cut
}

/// Wait for the child to exit unless the job is killed first.
///
/// An exit that has already happened wins over a kill request.
async fn wait_or_cancel(
    child: &mut Child,
    cancel: &CancellationToken,
) -> std::io::Result<Option<ExitStatus>> {
    tokio::select! {
        biased;
        status = child.wait() => status.map(Some),
        () = cancel.cancelled() => Ok(None),
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Ask the process group to stop, then force it after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    signal_group(child, false);
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(pid = ?child.id(), "script ignored SIGTERM, killing");
            signal_group(child, true);
            child.start_kill()?;
            child.wait().await
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, force: bool) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // `id()` is None once the child has been reaped, so a recycled pid is never signalled.
    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
    if let Err(e) = killpg(Pid::from_raw(pid), signal) {
        tracing::debug!(pid, ?signal, error = %e, "signal delivery failed");
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _force: bool) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "kill failed");
    }
}
