//! Utilities for running external dump/restore tools with proper error handling

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use tracing::{debug, error};

/// Where a tool reads its standard input from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// A fully specified invocation of an external program
///
/// Argument order is preserved exactly as pushed, so drivers can rely on a
/// deterministic command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub stdin: Option<StdinSource>,
    pub working_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(StdinSource::File(path.into()));
        self
    }

    pub fn stdin_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(StdinSource::Bytes(bytes.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Command line for logs, with password arguments masked
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            match arg.split_once('=') {
                Some((flag, _)) if flag.ends_with("password") => {
                    line.push_str(flag);
                    line.push_str("=****");
                }
                _ => line.push_str(arg),
            }
        }
        line
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed with exit code {code:?}: {output}")]
    Failed {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

/// Join stdout and stderr the way a terminal would show them
pub fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim_end();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }
    combined
}

/// Run a tool to completion; any non-zero exit status is an error
pub fn run_tool(invocation: &ToolInvocation) -> Result<Output, ToolError> {
    let spawn_error = |source| ToolError::Spawn {
        program: invocation.program.clone(),
        source,
    };

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);
    cmd.envs(invocation.envs.iter().map(|(k, v)| (k, v)));
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    if let Some(dir) = &invocation.working_dir {
        cmd.current_dir(dir);
    }

    debug!("Running command: {}", invocation.display_line());

    let output = match &invocation.stdin {
        None => {
            cmd.stdin(Stdio::null());
            cmd.output().map_err(spawn_error)?
        }
        Some(StdinSource::File(path)) => {
            let file = File::open(path).map_err(spawn_error)?;
            cmd.stdin(Stdio::from(file));
            cmd.output().map_err(spawn_error)?
        }
        Some(StdinSource::Bytes(bytes)) => {
            cmd.stdin(Stdio::piped());
            let mut child = cmd.spawn().map_err(spawn_error)?;
            let stdin = child.stdin.take();

            // Feed stdin while stdout and stderr are drained
            let (output, written) = thread::scope(|scope| {
                let writer = scope.spawn(move || match stdin {
                    Some(mut stdin) => stdin.write_all(bytes),
                    None => Ok(()),
                });
                let output = child.wait_with_output();
                let written = writer
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")));
                (output, written)
            });

            let output = output.map_err(spawn_error)?;
            match written {
                Err(e) if output.status.success() => return Err(spawn_error(e)),
                Err(e) => debug!("Tool stopped reading stdin: {}", e),
                Ok(()) => {}
            }
            output
        }
    };

    if !output.status.success() {
        let combined = combined_output(&output);
        error!("Command failed: {}", invocation.display_line());
        error!("Output: {}", combined);
        return Err(ToolError::Failed {
            program: invocation.program.clone(),
            code: output.status.code(),
            output: combined,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim_end());
    }

    Ok(output)
}

/// Check whether a program can be found on the PATH
pub fn program_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Working directory argument helper for tools taking `--flag=path`
pub fn path_arg(flag: &str, path: &Path) -> String {
    format!("{}={}", flag, path.display())
}
