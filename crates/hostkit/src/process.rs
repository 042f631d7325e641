//! Cancellable process execution.
//!
//! Host tools are run as child processes with captured output. While the
//! child runs, an optional interrupt flag is polled; once it is set the child
//! is killed and [`Error::Interrupted`] is returned.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// How often a running child is checked for exit or interruption
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Whether the command exited with status zero
    pub success: bool,
    /// Exit code, if the command was not killed by a signal
    pub code: Option<i32>,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

/// Run `program` with `args` and wait for it to finish.
///
/// When `interrupt` is given and becomes `true` while the command runs, the
/// child is killed. Pass `None` for commands that must never be cut short.
pub fn run(program: &str, args: &[String], interrupt: Option<&AtomicBool>) -> Result<Output> {
    let command_line = display_command(program, args);
    log::trace!("Running {command_line}");

    if interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
        return Err(Error::Interrupted {
            command: command_line,
        });
    }

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ToolNotFound {
                tool: program.to_string(),
            },
            _ => Error::CommandFailed {
                message: format!("failed to execute {program}: {e}"),
                stderr: String::new(),
            },
        })?;

    // Drain both pipes concurrently so a chatty child never blocks on a full pipe
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            kill(&mut child, &command_line);
            let _ = stdout.join();
            let _ = stderr.join();
            return Err(Error::Interrupted {
                command: command_line,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();
    log::trace!("{command_line} exited with {status}");

    Ok(Output {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill(child: &mut Child, command_line: &str) {
    log::debug!("Interrupting {command_line}");
    if let Err(e) = child.kill() {
        log::warn!("Failed to kill {command_line}: {e}");
    }
    let _ = child.wait();
}

/// Render a command line for logs and error messages
pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert string slices into owned arguments
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_captures_output() {
        let out = run("sh", &args(["-c", "echo out; echo err >&2; exit 3"]), None).unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }

    #[test]
    fn test_missing_tool() {
        let err = run("hivekeep-no-such-tool", &[], None).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[test]
    fn test_interrupt_kills_child() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            setter.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        let err = run("sleep", &args(["10"]), Some(&flag)).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, Error::Interrupted { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_already_interrupted_does_not_spawn() {
        let flag = AtomicBool::new(true);
        let err = run("true", &[], Some(&flag)).unwrap_err();
        assert_eq!(err.to_string(), "interrupted: true");
    }

    #[test]
    fn test_display_command() {
        assert_eq!(
            display_command("docker", &args(["network", "ls"])),
            "docker network ls"
        );
    }
}
