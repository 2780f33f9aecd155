//! Subprocess scorer: runs the external model with a bounded lifetime

use super::parser::ResultParser;
use super::{Scorer, ScoringError};
use crate::config::ScoringConfig;
use crate::features::{ValidatedFeatures, MESSAGES, OPTIONAL_ENRICHMENT_FIELDS, REQUIRED_NUMERIC_FIELDS};
use crate::metrics::METRICS;
use crate::prediction::PredictionResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, error, info, warn};

/// Program and argument vector of one scoring run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Command shape for logs, with free text reduced to its length
    pub fn redacted(&self) -> String {
        let mut parts = vec![self.program.clone()];
        let mut hide_next = false;
        for arg in &self.args {
            if hide_next {
                parts.push(format!("<{} chars>", arg.chars().count()));
                hide_next = false;
            } else {
                hide_next = arg == &format!("--{}", MESSAGES);
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Exit status and captured output of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringInvocationResult {
    pub exit_success: bool,
    pub exit_code: Option<i32>,
    /// stdout and stderr lines in arrival order
    pub combined_output: String,
}

/// Runs the scoring model as a child process
pub struct ProcessScorer {
    interpreter: Option<String>,
    script_path: PathBuf,
    working_dir: Option<PathBuf>,
    timeout: Duration,
    parser: ResultParser,
}

impl ProcessScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone().filter(|i| !i.trim().is_empty()),
            script_path: config.script_path.clone(),
            working_dir: config.working_dir.clone(),
            timeout: config.timeout(),
            parser: ResultParser::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Verify the entry-point script exists
    async fn check_entry_point(&self) -> Result<(), ScoringError> {
        match tokio::fs::metadata(&self.script_path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(ScoringError::Configuration(format!(
                "scoring entry point is not a file: {}",
                self.script_path.display()
            ))),
            Err(e) => Err(ScoringError::Configuration(format!(
                "scoring entry point not found: {} ({})",
                self.script_path.display(),
                e
            ))),
        }
    }

    /// Build the argument vector: required fields in canonical order, then
    /// the enrichment fields that are present
    pub fn build_invocation(&self, features: &ValidatedFeatures) -> Invocation {
        let script = self.script_path.to_string_lossy().into_owned();
        let (program, mut args) = match &self.interpreter {
            Some(interpreter) => (interpreter.clone(), vec![script]),
            None => (script, Vec::new()),
        };

        let features = features.features();
        let fields = REQUIRED_NUMERIC_FIELDS
            .iter()
            .chain(OPTIONAL_ENRICHMENT_FIELDS.iter());

        for field in fields {
            if let Some(value) = features.get(field) {
                args.push(format!("--{}", field));
                args.push(value.to_arg());
            }
        }

        Invocation { program, args }
    }

    /// Run the invocation to completion or until the timeout fires
    ///
    /// The child leads its own process group; every exit path kills the
    /// whole group, so processes spawned by the model do not outlive the run.
    pub async fn run(&self, invocation: &Invocation) -> Result<ScoringInvocationResult, ScoringError> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScoringError::Configuration(format!(
                    "cannot start scoring program {}: {}",
                    invocation.program, e
                ))
            } else {
                ScoringError::Io(e)
            }
        })?;

        // Declared after `child` so it drops first, while the leader is unreaped
        let group = ProcessGroup::new(child.id());

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            group.kill();
            let _ = child.kill().await;
            return Err(ScoringError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "scoring process output was not captured",
            )));
        };

        let mut output = CapturedOutput::new(MAX_CAPTURED_BYTES);
        let outcome = tokio::time::timeout(self.timeout, async {
            read_combined_output(stdout, stderr, &mut output).await?;
            child.wait().await
        })
        .await;

        match outcome {
            Ok(Ok(status)) => Ok(ScoringInvocationResult {
                exit_success: status.success(),
                exit_code: status.code(),
                combined_output: output.into_string(),
            }),
            Ok(Err(e)) => {
                group.kill();
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill scoring process: {}", kill_err);
                }
                Err(ScoringError::Io(e))
            }
            Err(_) => {
                group.kill();
                // kill() also reaps the leader
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill timed out scoring process: {}", kill_err);
                }
                Err(ScoringError::Timeout {
                    after: self.timeout,
                    output: output.into_string(),
                })
            }
        }
    }
}

/// Upper bound on retained process output, and on a single output line
pub const MAX_CAPTURED_BYTES: usize = 64 * 1024;

/// Process group of a spawned child, killed with SIGKILL on drop
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    #[cfg(unix)]
    fn kill(&self) {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid else {
            return;
        };
        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("Failed to kill scoring process group {}: {}", pgid, e),
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Tail of the process output, bounded to `max_bytes`
struct CapturedOutput {
    lines: VecDeque<String>,
    bytes: usize,
    max_bytes: usize,
}

impl CapturedOutput {
    fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes,
        }
    }

    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > self.max_bytes && self.lines.len() > 1 {
            if let Some(dropped) = self.lines.pop_front() {
                self.bytes -= dropped.len() + 1;
            }
        }
    }

    fn into_string(self) -> String {
        let mut output = String::with_capacity(self.bytes);
        for line in self.lines {
            output.push_str(&line);
            output.push('\n');
        }
        output
    }
}

/// Line reader that keeps at most `max_bytes` of each line
///
/// Partial lines live in `pending`, so a cancelled `next_line` loses nothing.
struct BoundedLines<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    max_bytes: usize,
}

impl<R: AsyncRead + Unpin> BoundedLines<R> {
    fn new(reader: R, max_bytes: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            max_bytes,
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            let (chunk, consumed, complete) = match available.iter().position(|b| *b == b'\n') {
                Some(pos) => (&available[..pos], pos + 1, true),
                None => (available, available.len(), false),
            };
            let room = self.max_bytes.saturating_sub(self.pending.len());
            self.pending.extend_from_slice(&chunk[..chunk.len().min(room)]);
            self.reader.consume(consumed);

            if complete {
                return Ok(Some(self.take_pending()));
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Drain stdout and stderr line by line until both reach EOF
async fn read_combined_output(
    stdout: ChildStdout,
    stderr: ChildStderr,
    output: &mut CapturedOutput,
) -> std::io::Result<()> {
    let mut out_lines = BoundedLines::new(stdout, MAX_CAPTURED_BYTES);
    let mut err_lines = BoundedLines::new(stderr, MAX_CAPTURED_BYTES);
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let line = tokio::select! {
            line = out_lines.next_line(), if out_open => {
                let line = line?;
                out_open = line.is_some();
                line
            }
            line = err_lines.next_line(), if err_open => {
                let line = line?;
                err_open = line.is_some();
                line
            }
        };

        if let Some(line) = line {
            debug!(line_len = line.len(), "scoring process output line");
            output.push(line);
        }
    }

    Ok(())
}

#[async_trait]
impl Scorer for ProcessScorer {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn score(&self, features: &ValidatedFeatures) -> Result<PredictionResult, ScoringError> {
        self.check_entry_point().await?;

        let invocation = self.build_invocation(features);
        info!("Running scoring process: {}", invocation.redacted());

        let start = Instant::now();
        let result = self.run(&invocation).await;

        let outcome = match &result {
            Ok(r) if r.exit_success => "success",
            Ok(_) => "exit_error",
            Err(e) if e.is_timeout() => "timeout",
            Err(_) => "error",
        };
        METRICS
            .scoring_process_duration
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        let result = result?;
        if !result.exit_success {
            error!(
                "Scoring process exited with code {:?} after {:?}",
                result.exit_code,
                start.elapsed()
            );
            return Err(ScoringError::Execution {
                exit_code: result.exit_code,
                output: result.combined_output,
            });
        }

        debug!("Scoring process finished in {:?}", start.elapsed());
        self.parser.parse(&result.combined_output)
    }
}
