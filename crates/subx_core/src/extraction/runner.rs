//! Cancellable external process runner.
//!
//! Every prober, extractor and OCR invocation goes through [`ToolCommand`].
//! The child is raced against the run's cancellation token and a
//! per-invocation timeout. A cancelled or timed-out child is killed and
//! reaped within a bounded grace period.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use super::types::{ToolError, ToolResult};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// One external program invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    timeout: Option<Duration>,
    kill_grace: Duration,
    accepted_exit_codes: Vec<i32>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
            kill_grace: Duration::from_secs(3),
            accepted_exit_codes: vec![0],
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kill the process if it runs longer than this. Zero disables the limit.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Time allowed for a killed process to exit.
    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Treat this exit code as success too.
    ///
    /// mkvtoolnix exits with 1 when it only emitted warnings.
    pub fn accept_exit_code(mut self, code: i32) -> Self {
        if !self.accepted_exit_codes.contains(&code) {
            self.accepted_exit_codes.push(code);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![quote(&self.program)];
        parts.extend(self.args.iter().map(|a| quote(&a.to_string_lossy())));
        parts.join(" ")
    }

    /// Run to completion, collecting stdout and stderr.
    pub async fn run(&self, cancel: &CancellationToken) -> ToolResult<ToolOutput> {
        self.run_with_lines(cancel, |_| {}).await
    }

    /// Run to completion, handing each stdout line to `on_line` as it arrives.
    pub async fn run_with_lines<F>(
        &self,
        cancel: &CancellationToken,
        mut on_line: F,
    ) -> ToolResult<ToolOutput>
    where
        F: FnMut(&str) + Send,
    {
        if cancel.is_cancelled() {
            return Err(ToolError::cancelled(&self.program));
        }

        tracing::debug!("Running: {}", self.display());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        configure_command(&mut cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::spawn(&self.program, e))?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let mut stdout_lines = child.stdout.take().map(StdoutLines::new);
        let mut stdout = String::new();

        let deadline = async {
            match self.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let status = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    self.terminate(&mut child).await;
                    return Err(ToolError::cancelled(&self.program));
                }
                _ = &mut deadline => {
                    self.terminate(&mut child).await;
                    return Err(ToolError::Timeout {
                        tool: self.program.clone(),
                        after: self.timeout.unwrap_or_default(),
                    });
                }
                line = next_line(&mut stdout_lines) => match line {
                    Some(line) => {
                        on_line(&line);
                        stdout.push_str(&line);
                        stdout.push('\n');
                    }
                    None => stdout_lines = None,
                },
                status = child.wait(), if stdout_lines.is_none() => {
                    break status?;
                }
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let exit_code = status.code().unwrap_or(-1);
        if !self.accepted_exit_codes.contains(&exit_code) {
            let message = if stderr.trim().is_empty() {
                last_lines(&stdout, 5)
            } else {
                stderr.trim().to_string()
            };
            return Err(ToolError::command_failed(&self.program, exit_code, message));
        }

        Ok(ToolOutput {
            exit_code,
            stdout,
            stderr,
        })
    }

    /// Kill the child and wait up to the grace period for it to exit.
    async fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.start_kill() {
            tracing::debug!("{} already exited: {}", self.program, e);
        }
        if tokio::time::timeout(self.kill_grace, child.wait()).await.is_err() {
            tracing::warn!(
                "{} did not exit within {}ms of being killed",
                self.program,
                self.kill_grace.as_millis()
            );
        }
    }
}

/// Child stdout split on `\n`.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte (a Latin-1 file
/// name in a tool message, say) does not end the stream while the child
/// is still writing.
struct StdoutLines {
    reader: BufReader<ChildStdout>,
    /// Bytes of the line being read; survives a cancelled read.
    pending: Vec<u8>,
}

impl StdoutLines {
    fn new(stdout: ChildStdout) -> Self {
        Self {
            reader: BufReader::new(stdout),
            pending: Vec::new(),
        }
    }

    async fn next(&mut self) -> Option<String> {
        match self.reader.read_until(b'\n', &mut self.pending).await {
            Ok(0) if self.pending.is_empty() => None,
            Ok(_) => {
                let mut bytes = std::mem::take(&mut self.pending);
                while matches!(bytes.last(), Some(b'\n' | b'\r')) {
                    bytes.pop();
                }
                Some(String::from_utf8_lossy(&bytes).into_owned())
            }
            Err(e) => {
                tracing::debug!("Stopped reading stdout: {}", e);
                None
            }
        }
    }
}

/// Next stdout line, or `None` at end of stream. Never resolves once the
/// stream is gone so the select loop falls through to `wait()`.
async fn next_line(lines: &mut Option<StdoutLines>) -> Option<String> {
    match lines {
        Some(reader) => reader.next().await,
        None => std::future::pending().await,
    }
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg)
    } else {
        arg.to_string()
    }
}

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a tokio process command.
fn configure_command(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}
