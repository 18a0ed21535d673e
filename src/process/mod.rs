//! Running external tools with captured output and an optional deadline

use log::{debug, warn};
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors raised while running an external tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with {status}:\n{stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} did not finish within {timeout:?} and was killed")]
    Timeout { tool: String, timeout: Duration },

    #[error("IO error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: io::Error,
    },
}

/// Captured result of a finished tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// One time budget shared by the successive tool calls of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Expires `limit` from now; `None` never expires
    pub fn after(limit: Option<Duration>) -> Self {
        Self(limit.map(|limit| Instant::now() + limit))
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|end| end.saturating_duration_since(Instant::now()))
    }
}

/// A single external tool call
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: PathBuf,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
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

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Limit this call to what is left of a task's budget
    pub fn within(self, deadline: Deadline) -> Self {
        self.timeout(deadline.remaining())
    }

    /// Short name used in error messages
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Run to completion and return the captured output whatever the exit code
    pub fn output(&self) -> Result<ToolOutput, ToolError> {
        let tool = self.tool_name();
        debug!("Running {} {:?}", self.program.display(), self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        // Drain both pipes on their own threads so a chatty tool cannot fill a
        // pipe buffer and block forever.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match self.wait(&mut child) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!("{} exceeded its timeout, killing it", tool);
                let _ = child.kill();
                let _ = child.wait();
                // Grandchildren may still hold the pipes open; leave the reader
                // threads detached instead of joining them.
                drop(stdout);
                drop(stderr);
                return Err(ToolError::Timeout {
                    tool,
                    timeout: self.timeout.unwrap_or_default(),
                });
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Io { tool, source });
            }
        };

        Ok(ToolOutput {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        })
    }

    /// Run to completion and fail on a non-zero exit code
    pub fn run(&self) -> Result<ToolOutput, ToolError> {
        let output = self.output()?;
        if !output.success() {
            return Err(ToolError::Failed {
                tool: self.tool_name(),
                status: output.status.to_string(),
                stderr: output.stderr.trim_end().to_string(),
            });
        }
        Ok(output)
    }

    /// `Ok(None)` means the deadline passed
    fn wait(&self, child: &mut Child) -> io::Result<Option<ExitStatus>> {
        let Some(timeout) = self.timeout else {
            return child.wait().map(Some);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Last `n` lines of a text, used to embed log tails in error messages
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
