//! Exports the [`Builder`], which turns every source document in a content
//! directory into a rendered sibling, and [`clean`], which removes them again.
//! Each document is independent of every other, so the per-file work is
//! spread over a [`rayon`] thread pool.
//!
//! A failure on one document doesn't stop the others: every source is
//! attempted, and if any of them failed the whole build reports
//! [`Error::Incomplete`]. Outputs that were written stay on disk; the next
//! successful build overwrites them.

use crate::convert::{Converter, Error as ConvertError};
use crate::document::{self, Error as DocumentError, Extensions, SourceDocument};
use crate::shell::{Error as ShellError, Shell};
use crate::title::extract_title;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Converts source documents into rendered documents.
pub struct Builder<'a> {
    converter: &'a dyn Converter,
    extensions: &'a Extensions,
    pool: ThreadPool,
}

impl<'a> Builder<'a> {
    /// Constructs a new [`Builder`] with `threads` workers. Zero threads
    /// means one worker per CPU.
    pub fn new(
        converter: &'a dyn Converter,
        extensions: &'a Extensions,
        threads: usize,
    ) -> Result<Builder<'a>> {
        Ok(Builder {
            converter,
            extensions,
            pool: ThreadPoolBuilder::new().num_threads(threads).build()?,
        })
    }

    /// Writes the raw converter output for every source document in `dir`.
    /// Returns the paths of the rendered documents, sorted.
    pub fn build(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.render_all(dir, |_, body| Ok(body.into_bytes()))
    }

    /// Like [`Builder::build`], but wraps each converted body in `shell`
    /// with the title taken from the document's first top-level heading.
    pub fn build_with_shell(
        &self,
        dir: &Path,
        shell: &Shell,
    ) -> Result<Vec<PathBuf>> {
        self.render_all(dir, |doc, body| {
            shell.render(extract_title(&doc.contents), &body)
        })
    }

    fn render_all<F>(&self, dir: &Path, wrap: F) -> Result<Vec<PathBuf>>
    where
        F: Fn(&SourceDocument, String) -> std::result::Result<Vec<u8>, ShellError>
            + Sync,
    {
        let sources = document::discover(dir, &self.extensions.source)?;
        tracing::info!(
            dir = %dir.display(),
            sources = sources.len(),
            threads = self.pool.current_num_threads(),
            "building"
        );

        let results: Vec<Result<PathBuf>> = self.pool.install(|| {
            sources
                .par_iter()
                .map(|path| self.render_one(path, &wrap))
                .collect()
        });

        let mut built = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(path) => built.push(path),
                Err(err) => {
                    tracing::error!("{}", err);
                    failures.push(err);
                }
            }
        }

        match failures.is_empty() {
            true => {
                tracing::info!(built = built.len(), "build finished");
                Ok(built)
            }
            false => Err(Error::Incomplete { built, failures }),
        }
    }

    fn render_one<F>(&self, path: &Path, wrap: &F) -> Result<PathBuf>
    where
        F: Fn(&SourceDocument, String) -> std::result::Result<Vec<u8>, ShellError>,
    {
        let doc = SourceDocument::load(path)?;
        let body =
            self.converter
                .convert(&doc.contents)
                .map_err(|err| Error::Conversion {
                    path: path.to_owned(),
                    err,
                })?;
        let rendered = wrap(&doc, body).map_err(|err| Error::Shell {
            path: path.to_owned(),
            err,
        })?;

        let output = self.extensions.output_path(path);
        std::fs::write(&output, rendered).map_err(|err| Error::WriteOutput {
            path: output.clone(),
            err,
        })?;
        tracing::debug!(
            source = %path.display(),
            output = %output.display(),
            "rendered"
        );
        Ok(output)
    }
}

/// Deletes every rendered document in `dir` and returns the removed paths.
/// Source documents are never touched, even if the two extensions coincide.
/// A missing directory or an already-deleted file is not an error, so
/// cleaning twice in a row is harmless.
pub fn clean(dir: &Path, extensions: &Extensions) -> Result<Vec<PathBuf>> {
    let outputs = match document::discover(dir, &extensions.output) {
        Ok(outputs) => outputs,
        Err(DocumentError::Discover { err, .. })
            if err.depth() == 0
                && err.io_error().map(io::Error::kind)
                    == Some(io::ErrorKind::NotFound) =>
        {
            Vec::new()
        }
        Err(err) => return Err(err.into()),
    };

    let mut removed = Vec::with_capacity(outputs.len());
    for path in outputs {
        if extensions.is_source(&path) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed");
                removed.push(path);
            }
            Err(e) => match e.kind() {
                io::ErrorKind::NotFound => {}
                _ => return Err(Error::Clean { path, err: e }),
            },
        }
    }
    tracing::info!(dir = %dir.display(), removed = removed.len(), "cleaned");
    Ok(removed)
}

/// The result of a fallible build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building or cleaning rendered documents.
#[derive(Debug)]
pub enum Error {
    /// Returned when source documents can't be found or read.
    Document(DocumentError),

    /// Returned when the converter fails on a source document.
    Conversion { path: PathBuf, err: ConvertError },

    /// Returned when the document shell can't be applied.
    Shell { path: PathBuf, err: ShellError },

    /// Returned when a rendered document can't be written.
    WriteOutput { path: PathBuf, err: io::Error },

    /// Returned when a rendered document can't be deleted.
    Clean { path: PathBuf, err: io::Error },

    /// Returned when the worker pool can't be started.
    ThreadPool(ThreadPoolBuildError),

    /// Returned when one or more documents failed. `built` lists the
    /// documents which were rendered anyway.
    Incomplete {
        built: Vec<PathBuf>,
        failures: Vec<Error>,
    },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Document(err) => err.fmt(f),
            Error::Conversion { path, err } => {
                write!(f, "Converting '{}': {}", path.display(), err)
            }
            Error::Shell { path, err } => {
                write!(f, "Rendering '{}': {}", path.display(), err)
            }
            Error::WriteOutput { path, err } => {
                write!(f, "Writing '{}': {}", path.display(), err)
            }
            Error::Clean { path, err } => {
                write!(f, "Removing '{}': {}", path.display(), err)
            }
            Error::ThreadPool(err) => {
                write!(f, "Starting worker threads: {}", err)
            }
            Error::Incomplete { built, failures } => {
                write!(
                    f,
                    "{} of {} documents failed",
                    failures.len(),
                    failures.len() + built.len()
                )?;
                for failure in failures {
                    write!(f, "\n  {}", failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Document(err) => Some(err),
            Error::Conversion { path: _, err } => Some(err),
            Error::Shell { path: _, err } => Some(err),
            Error::WriteOutput { path: _, err } => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::ThreadPool(err) => Some(err),
            Error::Incomplete { built: _, failures } => {
                failures.first().map(|e| e as &(dyn std::error::Error + 'static))
            }
        }
    }
}

impl From<DocumentError> for Error {
    /// Converts [`DocumentError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: DocumentError) -> Error {
        Error::Document(err)
    }
}

impl From<ThreadPoolBuildError> for Error {
    /// Converts [`ThreadPoolBuildError`]s into [`Error`]. This allows us to
    /// use the `?` operator.
    fn from(err: ThreadPoolBuildError) -> Error {
        Error::ThreadPool(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::convert::{self, Pulldown};
    use crate::shell::DEFAULT_TEMPLATE;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    /// Fails on any document containing `FAIL`, otherwise defers to
    /// [`Pulldown`].
    struct Flaky(Pulldown);

    impl Converter for Flaky {
        fn convert(&self, markdown: &str) -> convert::Result<String> {
            match markdown.contains("FAIL") {
                true => Err(ConvertError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "converter exited with status 1",
                ))),
                false => self.0.convert(markdown),
            }
        }
    }

    fn content_dir(files: &[(&str, &str)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    fn shell() -> Shell {
        Shell::new(DEFAULT_TEMPLATE.to_owned(), b"body{}".to_vec()).unwrap()
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_build_one_output_per_source() -> Result<()> {
        let dir = content_dir(&[
            ("b.md", "Second"),
            ("a.md", "# First"),
            ("style.css", "body{}"),
        ]);
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        let built = Builder::new(&converter, &extensions, 2)?.build(dir.path())?;

        assert_eq!(
            vec![dir.path().join("a.html"), dir.path().join("b.html")],
            built
        );
        assert_eq!("<h1>First</h1>\n", read(&dir.path().join("a.html")));
        assert_eq!("<p>Second</p>\n", read(&dir.path().join("b.html")));
        Ok(())
    }

    #[test]
    fn test_build_with_shell_title_and_body() -> Result<()> {
        let dir = content_dir(&[("hello.md", "# Hello\nSome *text*.")]);
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        Builder::new(&converter, &extensions, 1)?
            .build_with_shell(dir.path(), &shell())?;

        let html = read(&dir.path().join("hello.html"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Hello</title>"));
        assert!(html.contains("<style>\nbody{}</style>"));
        assert!(html.contains("<p>Some <em>text</em>.</p>"));
        Ok(())
    }

    #[test]
    fn test_build_with_shell_without_heading() -> Result<()> {
        let dir = content_dir(&[("plain.md", "Just *prose*.\n\n## Not a title")]);
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        Builder::new(&converter, &extensions, 1)?
            .build_with_shell(dir.path(), &shell())?;

        let html = read(&dir.path().join("plain.html"));
        assert!(html.contains("<title></title>"));
        assert!(html.contains("<p>Just <em>prose</em>.</p>"));
        assert!(html.contains("<h2>Not a title</h2>"));
        Ok(())
    }

    #[test]
    fn test_build_is_deterministic() -> Result<()> {
        let dir = content_dir(&[
            ("a.md", "# A\n\n| x | y |\n|---|---|\n| 1 | 2 |\n"),
            ("b.md", "- [ ] todo\n- [x] done\n"),
        ]);
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        let builder = Builder::new(&converter, &extensions, 0)?;

        let first = builder.build_with_shell(dir.path(), &shell())?;
        let snapshot: Vec<String> = first.iter().map(|p| read(p)).collect();
        let second = builder.build_with_shell(dir.path(), &shell())?;
        assert_eq!(first, second);
        assert_eq!(
            snapshot,
            second.iter().map(|p| read(p)).collect::<Vec<String>>()
        );
        Ok(())
    }

    #[test]
    fn test_build_continues_past_failures() {
        let dir = content_dir(&[
            ("a.md", "# A"),
            ("b.md", "# B\nFAIL"),
            ("c.md", "# C"),
        ]);
        let converter = Flaky(Pulldown::default());
        let extensions = Extensions::default();
        let builder = Builder::new(&converter, &extensions, 2).unwrap();

        match builder.build(dir.path()) {
            Err(Error::Incomplete { built, failures }) => {
                assert_eq!(
                    vec![dir.path().join("a.html"), dir.path().join("c.html")],
                    built
                );
                assert_eq!(1, failures.len());
                match &failures[0] {
                    Error::Conversion { path, .. } => {
                        assert_eq!(&dir.path().join("b.md"), path)
                    }
                    other => panic!("wanted a conversion error; found {:?}", other),
                }
            }
            other => panic!("wanted an incomplete build; found {:?}", other),
        }
        assert!(dir.path().join("a.html").exists());
        assert!(!dir.path().join("b.html").exists());
        assert!(dir.path().join("c.html").exists());
    }

    #[test]
    fn test_build_missing_directory() {
        let dir = tempdir().unwrap();
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        let builder = Builder::new(&converter, &extensions, 1).unwrap();
        match builder.build(&dir.path().join("src")) {
            Err(Error::Document(DocumentError::Discover { .. })) => {}
            other => panic!("wanted a discovery error; found {:?}", other),
        }
    }

    #[test]
    fn test_clean_removes_only_outputs() -> Result<()> {
        let dir = content_dir(&[("a.md", "# A"), ("b.md", "B"), ("style.css", "")]);
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        let built = Builder::new(&converter, &extensions, 1)?.build(dir.path())?;

        let removed = clean(dir.path(), &extensions)?;
        assert_eq!(built, removed);
        for path in &built {
            assert!(!path.exists());
        }
        assert!(dir.path().join("a.md").exists());
        assert!(dir.path().join("b.md").exists());
        assert!(dir.path().join("style.css").exists());

        // A second clean has nothing left to do.
        assert!(clean(dir.path(), &extensions)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_clean_then_build_regenerates_same_outputs() -> Result<()> {
        let dir = content_dir(&[("a.md", "# A"), ("b.md", "B")]);
        let converter = Pulldown::default();
        let extensions = Extensions::default();
        let builder = Builder::new(&converter, &extensions, 1)?;

        let first = builder.build(dir.path())?;
        clean(dir.path(), &extensions)?;
        assert_eq!(first, builder.build(dir.path())?);
        Ok(())
    }

    #[test]
    fn test_clean_missing_directory() -> Result<()> {
        let dir = tempdir().unwrap();
        assert!(clean(&dir.path().join("src"), &Extensions::default())?.is_empty());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_unrelated_dangling_link_is_ignored() -> Result<()> {
        let dir = content_dir(&[("a.md", "# A")]);
        std::os::unix::fs::symlink(
            "/nonexistent/target",
            dir.path().join("old-draft.txt"),
        )
        .unwrap();
        let converter = Pulldown::default();
        let extensions = Extensions::default();

        let built = Builder::new(&converter, &extensions, 1)?.build(dir.path())?;
        assert_eq!(vec![dir.path().join("a.html")], built);

        assert_eq!(built, clean(dir.path(), &extensions)?);
        assert!(!dir.path().join("a.html").exists());
        assert!(dir.path().join("a.md").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_dangling_output_link_is_an_error() {
        let dir = content_dir(&[("a.md", "# A")]);
        std::os::unix::fs::symlink(
            "/nonexistent/target",
            dir.path().join("gone.html"),
        )
        .unwrap();
        match clean(dir.path(), &Extensions::default()) {
            Err(Error::Document(DocumentError::Discover { .. })) => {}
            other => panic!("wanted a discovery error; found {:?}", other),
        }
    }

    #[test]
    fn test_clean_never_removes_sources() -> Result<()> {
        let dir = content_dir(&[("a.md", "# A")]);
        let extensions = Extensions {
            source: "md".to_owned(),
            output: "md".to_owned(),
        };
        assert!(clean(dir.path(), &extensions)?.is_empty());
        assert!(dir.path().join("a.md").exists());
        Ok(())
    }
}
