//! Subprocess helper shared by every CLI backend.
//!
//! All tool invocations go through [`Cmd`] so stdout, stderr and exit status
//! are captured the same way and a missing binary is reported as
//! [`Error::ToolMissing`] instead of a bare spawn error.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io::Write;
use std::process::{Command, Stdio};

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Whether the process exited zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A command line to run against the host.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    env: Vec<(String, String)>,
    stdin: Option<Vec<u8>>,
}

impl Cmd {
    /// Start building a command for `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdin: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Feed `input` to the child's stdin.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// The command line as a display string (for logs and errors).
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Run the command and capture its output, whatever the exit status.
    pub fn output(&self) -> Result<Output> {
        let resolved = which::which(&self.program).map_err(|_| Error::ToolMissing {
            tool: self.program.clone(),
        })?;

        log::debug!("running: {}", self.display());

        let mut command = Command::new(resolved);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        let mut write_result = Ok(());
        if let Some(input) = &self.stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            write_result = pipe.write_all(input);
            // pipe dropped here so the child sees EOF
        }
        // Reap the child even when feeding stdin failed
        let output = child.wait_with_output()?;
        match write_result {
            // The child exited without reading all of its input; its exit
            // status tells whether that was a failure
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                log::debug!("{} closed stdin early", self.program);
            }
            other => other?,
        }

        let result = Output {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        log::trace!("{} -> {:?}", self.program, result.code);
        Ok(result)
    }

    /// Run the command and return stdout, failing on non-zero exit.
    pub fn run(&self) -> Result<String> {
        let output = self.output()?;
        if !output.success() {
            return Err(Error::CommandFailed {
                command: self.display(),
                code: output.code,
                stderr: if output.stderr.trim().is_empty() {
                    output.stdout
                } else {
                    output.stderr
                },
            });
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_args() {
        let cmd = Cmd::new("apt-get")
            .args(["install", "-y"])
            .arg("nginx")
            .env("DEBIAN_FRONTEND", "noninteractive");
        assert_eq!(cmd.display(), "apt-get install -y nginx");
    }

    #[test]
    fn test_missing_tool() {
        let err = Cmd::new("hostkit-no-such-tool-xyz").output().unwrap_err();
        assert!(matches!(err, Error::ToolMissing { tool } if tool == "hostkit-no-such-tool-xyz"));
    }

    #[test]
    fn test_run_captures_stdout() {
        let out = Cmd::new("sh").args(["-c", "echo hello"]).run().unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_run_feeds_stdin() {
        let out = Cmd::new("cat").stdin("line one\n").run().unwrap();
        assert_eq!(out, "line one\n");
    }

    #[test]
    fn test_child_that_ignores_stdin_is_still_waited_on() {
        // larger than any pipe buffer, so the write fails once `sh` exits
        let input = vec![b'x'; 4 * 1024 * 1024];
        let out = Cmd::new("sh")
            .args(["-c", "exit 7"])
            .stdin(input.clone())
            .output()
            .unwrap();
        assert_eq!(out.code, Some(7));

        let out = Cmd::new("true").stdin(input).output().unwrap();
        assert!(out.success());
    }

    #[test]
    fn test_run_fails_on_nonzero_exit() {
        let err = Cmd::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run()
            .unwrap_err();
        match err {
            Error::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
