//! Defines the [`Shell`] type, the minimal HTML document wrapped around each
//! converted body: a head with the title and the embedded stylesheet, then
//! the body itself. The shell is a [`gtmpl`] template which is given three
//! values:
//!
//! * `title`: the document title, HTML-escaped
//! * `stylesheet`: the raw contents of the stylesheet file
//! * `body`: the converter's HTML output
//!
//! The stylesheet is never decoded: the template sees a placeholder in its
//! place and the file's bytes are spliced into the rendered output.

use gtmpl::{Context, Template, Value};
use pulldown_cmark::escape::escape_html;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// The shell used when the project doesn't provide its own template.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{.title}}</title>
<style>
{{.stylesheet}}</style>
</head>
<body>
{{.body}}</body>
</html>
"#;

/// Stands in for the stylesheet while the template executes.
const STYLESHEET_PLACEHOLDER: &str = "\u{0}postshell:stylesheet\u{0}";

/// A loaded document shell: the template source and the stylesheet bytes.
#[derive(Debug)]
pub struct Shell {
    template: String,
    stylesheet: Vec<u8>,
}

impl Shell {
    /// Loads the stylesheet from `stylesheet` and the template from
    /// `template`, falling back to [`DEFAULT_TEMPLATE`]. The template is
    /// parsed once here so syntax errors surface before any file is built.
    pub fn load(stylesheet: &Path, template: Option<&Path>) -> Result<Shell> {
        let stylesheet = std::fs::read(stylesheet).map_err(|err| {
            let path = stylesheet.to_owned();
            match err.kind() {
                io::ErrorKind::NotFound => Error::MissingStylesheet { path, err },
                _ => Error::ReadStylesheet { path, err },
            }
        })?;
        let template = match template {
            None => DEFAULT_TEMPLATE.to_owned(),
            Some(path) => std::fs::read_to_string(path).map_err(|err| {
                Error::OpenTemplateFile {
                    path: path.to_owned(),
                    err,
                }
            })?,
        };
        Shell::new(template, stylesheet)
    }

    /// Builds a [`Shell`] from in-memory template source and stylesheet.
    pub fn new(template: String, stylesheet: Vec<u8>) -> Result<Shell> {
        parse_template(&template)?;
        Ok(Shell {
            template,
            stylesheet,
        })
    }

    /// Wraps `body` in the shell, with `title` escaped into the title slot.
    pub fn render(&self, title: &str, body: &str) -> Result<Vec<u8>> {
        let mut escaped_title = String::with_capacity(title.len());
        escape_html(&mut escaped_title, title)?;

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(escaped_title));
        m.insert(
            "stylesheet".to_owned(),
            Value::String(STYLESHEET_PLACEHOLDER.to_owned()),
        );
        m.insert("body".to_owned(), Value::String(body.to_owned()));

        // Parsed per render so a [`Shell`] can be shared across worker
        // threads.
        let template = parse_template(&self.template)?;
        let mut out = Vec::with_capacity(self.template.len() + body.len());
        template
            .execute(&mut out, &Context::from(Value::Object(m))?)
            .map_err(Error::Template)?;
        Ok(splice(&out, STYLESHEET_PLACEHOLDER.as_bytes(), &self.stylesheet))
    }
}

/// Replaces every occurrence of `placeholder` in `rendered` with
/// `replacement`.
fn splice(rendered: &[u8], placeholder: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rendered.len() + replacement.len());
    let mut rest = rendered;
    while let Some(i) = rest
        .windows(placeholder.len())
        .position(|window| window == placeholder)
    {
        out.extend_from_slice(&rest[..i]);
        out.extend_from_slice(replacement);
        rest = &rest[i + placeholder.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn parse_template(source: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(source).map_err(Error::ParseTemplate)?;
    Ok(template)
}

/// The result of a fallible shell operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or applying the document shell.
#[derive(Debug)]
pub enum Error {
    /// Returned when the stylesheet doesn't exist.
    MissingStylesheet { path: PathBuf, err: io::Error },

    /// Returned when the stylesheet exists but can't be read.
    ReadStylesheet { path: PathBuf, err: io::Error },

    /// Returned for I/O problems while opening the template file.
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned for errors parsing the template.
    ParseTemplate(String),

    /// Returned for errors executing the template.
    Template(String),

    /// Returned for other I/O errors.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingStylesheet { path, err } => {
                write!(f, "Missing stylesheet '{}': {}", path.display(), err)
            }
            Error::ReadStylesheet { path, err } => {
                write!(f, "Reading stylesheet '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => {
                write!(f, "Parsing shell template: {}", err)
            }
            Error::Template(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingStylesheet { path: _, err } => Some(err),
            Error::ReadStylesheet { path: _, err } => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Template(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}
