//! Markdown-to-HTML conversion. The builder treats the converter as an opaque
//! collaborator behind the [`Converter`] trait: markdown text in, an HTML
//! fragment out, or an error. [`Pulldown`] converts in-process while
//! [`Command`] pipes the markdown through an external program (e.g., the
//! classic `markdown` script).

use pulldown_cmark::{html, Options, Parser};
use std::fmt;
use std::io::{self, Write};
use std::process::{self, ExitStatus, Stdio};
use std::string::FromUtf8Error;

/// Converts markdown into an HTML fragment. Implementations are shared across
/// worker threads.
pub trait Converter: Sync {
    fn convert(&self, markdown: &str) -> Result<String>;
}

/// Converts markdown in-process with [`pulldown_cmark`].
pub struct Pulldown {
    options: Options,
}

impl Default for Pulldown {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        Pulldown { options }
    }
}

impl Converter for Pulldown {
    fn convert(&self, markdown: &str) -> Result<String> {
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markdown, self.options));
        Ok(out)
    }
}

/// Converts markdown by running an external program which reads markdown on
/// stdin and writes HTML on stdout. A non-zero exit status fails the
/// conversion.
pub struct Command {
    pub program: String,
    pub args: Vec<String>,
}

impl Command {
    /// Builds a [`Command`] from an argv-style list. Returns [`None`] if the
    /// list is empty.
    pub fn from_argv(argv: &[String]) -> Option<Command> {
        match argv {
            [program, args @ ..] => Some(Command {
                program: program.clone(),
                args: args.to_vec(),
            }),
            [] => None,
        }
    }
}

impl Converter for Command {
    fn convert(&self, markdown: &str) -> Result<String> {
        let mut child = process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::Spawn {
                program: self.program.clone(),
                err,
            })?;

        // Feed stdin from a second thread; writing everything up front could
        // deadlock once the child fills its stdout pipe.
        let stdin = child.stdin.take();
        let (written, output) = std::thread::scope(|scope| {
            let writer = stdin.map(|mut stdin| {
                scope.spawn(move || stdin.write_all(markdown.as_bytes()))
            });
            let output = child.wait_with_output();
            let written = match writer {
                None => Ok(()),
                Some(handle) => handle.join().unwrap_or_else(|_| {
                    Err(io::Error::new(
                        io::ErrorKind::Other,
                        "stdin writer panicked",
                    ))
                }),
            };
            (written, output)
        });
        let output = output?;

        if !output.status.success() {
            return Err(Error::Status {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim_end()
                    .to_owned(),
            });
        }

        // A program that exits successfully without consuming all of its
        // input has still produced its answer.
        match written {
            Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
                return Err(Error::Io(err))
            }
            _ => {}
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

/// Selects a converter from the configured argv: an external [`Command`] if
/// one is given, otherwise [`Pulldown`].
pub fn from_argv(argv: Option<&[String]>) -> Box<dyn Converter> {
    match argv.and_then(Command::from_argv) {
        Some(command) => {
            tracing::debug!(program = %command.program, "using external converter");
            Box::new(command)
        }
        None => Box::new(Pulldown::default()),
    }
}

/// Represents the result of a conversion.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failed conversion.
#[derive(Debug)]
pub enum Error {
    /// Returned when the external program couldn't be started.
    Spawn { program: String, err: io::Error },

    /// Returned when the external program exits unsuccessfully. `stderr`
    /// holds whatever diagnostics it printed.
    Status {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Returned when the converter's output isn't valid UTF-8.
    Utf8(FromUtf8Error),

    /// Returned for other I/O errors talking to the external program.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spawn { program, err } => {
                write!(f, "Running converter `{}`: {}", program, err)
            }
            Error::Status {
                program,
                status,
                stderr,
            } => match stderr.is_empty() {
                true => write!(f, "Converter `{}` failed: {}", program, status),
                false => write!(
                    f,
                    "Converter `{}` failed: {}: {}",
                    program, status, stderr
                ),
            },
            Error::Utf8(err) => {
                write!(f, "Converter output is not UTF-8: {}", err)
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn { program: _, err } => Some(err),
            Error::Status { .. } => None,
            Error::Utf8(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<FromUtf8Error> for Error {
    /// Converts a [`FromUtf8Error`] into an [`Error`].
    fn from(err: FromUtf8Error) -> Error {
        Error::Utf8(err)
    }
}
