//! Renderers turn an assembled HTML document into output bytes.
//!
//! The PDF engine is an external program: [`CommandRenderer`] pipes the
//! document to its stdin and collects stdout. Anything that reads HTML and
//! writes PDF works, e.g. `weasyprint - -`.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::document::{HtmlDocument, PageOptions};
use crate::error::RenderError;

/// What a renderer is asked to produce.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub document: &'a HtmlDocument,
    pub page: &'a PageOptions,
    /// Input file stem, for log lines.
    pub title: &'a str,
}

pub trait Renderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError>;

    /// Short label for logs and `--verbose` output.
    fn name(&self) -> &str;
}

/// Runs an external command with the document on stdin.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    command: String,
    timeout: Option<Duration>,
}

impl CommandRenderer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError> {
        log::info!("rendering {} with `{}`", request.title, self.command);
        let output = run_piped(
            &self.command,
            request.document.as_str().as_bytes().to_vec(),
            self.timeout,
        )?;
        if output.is_empty() {
            return Err(RenderError::EmptyOutput {
                command: self.command.clone(),
            });
        }
        Ok(output)
    }

    fn name(&self) -> &str {
        &self.command
    }
}

/// Emits the HTML document itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError> {
        Ok(request.document.as_str().as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "html"
    }
}

fn shell(command_str: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command_str);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command_str);
        c
    }
}

/// Executes a shell command with `input` on stdin and returns its stdout.
///
/// Stdin is fed and stdout/stderr are drained on separate threads, so a
/// renderer that streams output before it has read all of its input cannot
/// deadlock on a full pipe. On timeout the process is killed.
pub fn run_piped(
    command_str: &str,
    input: Vec<u8>,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, RenderError> {
    let mut child = shell(command_str)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RenderError::Spawn {
            command: command_str.to_string(),
            source,
        })?;

    let stdin = child.stdin.take();
    let writer = thread::spawn(move || -> std::io::Result<()> {
        if let Some(mut stdin) = stdin {
            stdin.write_all(&input)?;
        }
        Ok(())
    });

    let stdout = child.stdout.take();
    let reader = thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut stdout) = stdout {
            stdout.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr = child.stderr.take();
    let err_reader = thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf);
        }
        buf
    });

    let status = match timeout {
        Some(duration) => match child.wait_timeout(duration)? {
            Some(status) => status,
            None => {
                child.kill()?;
                let _ = child.wait();
                return Err(RenderError::Timeout {
                    command: command_str.to_string(),
                    timeout: duration,
                });
            }
        },
        None => child.wait()?,
    };

    let stdout = join(reader)?;
    let stderr = err_reader.join().unwrap_or_default();
    // A renderer may exit without reading all of stdin; only report a
    // broken pipe if the command itself failed.
    let write_result = join(writer);

    if !status.success() {
        return Err(RenderError::Failed {
            command: command_str.to_string(),
            status,
            stderr,
        });
    }
    if let Err(err) = write_result {
        if err.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(err.into());
        }
    }
    Ok(stdout)
}

fn join<T>(handle: thread::JoinHandle<std::io::Result<T>>) -> std::io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(std::io::Error::other("pipe thread panicked")))
}
