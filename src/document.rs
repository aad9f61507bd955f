//! Defines the [`SourceDocument`] and [`Extensions`] types as well as the
//! discovery of documents in a content directory. A source document
//! `{dir}/foo.md` renders to the sibling `{dir}/foo.html`; nothing else about
//! the path changes.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The default extension for source documents.
pub const MARKDOWN_EXTENSION: &str = "md";

/// The default extension for rendered documents.
pub const HTML_EXTENSION: &str = "html";

/// The pair of file extensions (without the leading dot) which identify source
/// and rendered documents in the content directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extensions {
    /// The extension of source documents, e.g., `md`.
    pub source: String,

    /// The extension of rendered documents, e.g., `html`.
    pub output: String,
}

impl Default for Extensions {
    fn default() -> Self {
        Extensions {
            source: MARKDOWN_EXTENSION.to_owned(),
            output: HTML_EXTENSION.to_owned(),
        }
    }
}

impl Extensions {
    /// Maps a source path to its rendered path by swapping the extension.
    /// There is no collision handling: `foo.md` and `foo.markdown` would both
    /// map onto `foo.html` if both were considered sources.
    pub fn output_path(&self, source_path: &Path) -> PathBuf {
        source_path.with_extension(&self.output)
    }

    pub fn is_source(&self, path: &Path) -> bool {
        has_extension(path, &self.source)
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension() == Some(OsStr::new(extension))
}

/// A markdown file as read from disk. Its identity is its path.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub contents: String,
}

impl SourceDocument {
    /// Reads a [`SourceDocument`] from `path`. The file must be valid UTF-8.
    pub fn load(path: &Path) -> Result<SourceDocument> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(SourceDocument {
                path: path.to_owned(),
                contents,
            }),
            Err(err) => Err(Error::Read {
                path: path.to_owned(),
                err,
            }),
        }
    }
}

/// Lists the regular files directly inside `dir` whose extension is
/// `extension`. Subdirectories are not searched. The result is sorted so that
/// repeated runs visit files in the same order.
///
/// Only a failure to list `dir` itself, or to stat an entry with a matching
/// extension, is an error. Unreadable entries with other extensions (e.g., a
/// dangling symlink to an old draft) are logged and skipped.
pub fn discover(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                let unrelated = err.depth() > 0
                    && err
                        .path()
                        .map_or(false, |path| !has_extension(path, extension));
                if !unrelated {
                    return Err(Error::Discover {
                        dir: dir.to_owned(),
                        err,
                    });
                }
                tracing::warn!("skipping unreadable entry: {}", err);
                continue;
            }
        };
        if entry.file_type().is_file() && has_extension(entry.path(), extension)
        {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Represents the result of a document operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error finding or reading documents.
#[derive(Debug)]
pub enum Error {
    /// Returned when the content directory can't be listed.
    Discover { dir: PathBuf, err: walkdir::Error },

    /// Returned when a source document can't be read.
    Read { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Discover { dir, err } => {
                write!(f, "Listing directory '{}': {}", dir.display(), err)
            }
            Error::Read { path, err } => {
                write!(f, "Reading source file '{}': {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Discover { dir: _, err } => Some(err),
            Error::Read { path: _, err } => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_output_path_swaps_extension() {
        let extensions = Extensions::default();
        assert_eq!(
            PathBuf::from("src/intro.html"),
            extensions.output_path(Path::new("src/intro.md")),
        );
        assert_eq!(
            PathBuf::from("src/v1.2-notes.html"),
            extensions.output_path(Path::new("src/v1.2-notes.md")),
        );
    }

    #[test]
    fn test_discover_matches_extension_only() -> std::io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.md"), "# B")?;
        fs::write(dir.path().join("a.md"), "# A")?;
        fs::write(dir.path().join("a.html"), "<p>A</p>")?;
        fs::write(dir.path().join("style.css"), "body {}")?;
        fs::create_dir(dir.path().join("nested.md"))?;
        fs::write(dir.path().join("nested.md").join("c.md"), "# C")?;

        let found = discover(dir.path(), MARKDOWN_EXTENSION).unwrap();
        assert_eq!(
            vec![dir.path().join("a.md"), dir.path().join("b.md")],
            found
        );
        Ok(())
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = tempdir().unwrap();
        match discover(&dir.path().join("missing"), MARKDOWN_EXTENSION) {
            Err(Error::Discover { .. }) => {}
            other => panic!("wanted a discovery error; found {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_unrelated_dangling_link() -> std::io::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.md"), "# A")?;
        std::os::unix::fs::symlink(
            "/nonexistent/target",
            dir.path().join("old-draft.txt"),
        )?;

        let found = discover(dir.path(), MARKDOWN_EXTENSION).unwrap();
        assert_eq!(vec![dir.path().join("a.md")], found);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_dangling_link_with_matching_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# A").unwrap();
        std::os::unix::fs::symlink(
            "/nonexistent/target",
            dir.path().join("gone.md"),
        )
        .unwrap();

        match discover(dir.path(), MARKDOWN_EXTENSION) {
            Err(Error::Discover { err, .. }) => assert_eq!(1, err.depth()),
            other => panic!("wanted a discovery error; found {:?}", other),
        }
    }

    #[test]
    fn test_load_source_document() -> std::io::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("post.md");
        fs::write(&path, "# Hello\nSome *text*.")?;

        let doc = SourceDocument::load(&path).unwrap();
        assert_eq!(path, doc.path);
        assert_eq!("# Hello\nSome *text*.", doc.contents);
        Ok(())
    }
}
