//! Rewrites canonical site URLs into local `file://` URLs so that rendered
//! documents can be browsed offline.
//!
//! The substitution is deliberately blunt: every literal occurrence of the
//! canonical prefix is replaced, whether it sits in an `href` attribute or in
//! visible prose. Running the rewrite twice over the same files is only a
//! no-op if the local prefix doesn't itself contain the canonical prefix.

use rayon::prelude::*;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// A `(canonical prefix, local prefix)` substitution pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    canonical: String,
    local: String,
}

impl RewriteRule {
    /// Constructs a new [`RewriteRule`]. The canonical prefix must not be
    /// empty; an empty pattern would match between every pair of characters.
    pub fn new(canonical: &str, local: &str) -> Result<RewriteRule> {
        if canonical.is_empty() {
            return Err(Error::EmptyCanonicalPrefix);
        }
        Ok(RewriteRule {
            canonical: canonical.to_owned(),
            local: local.to_owned(),
        })
    }

    /// Replaces every occurrence of the canonical prefix in `text`. Borrows
    /// `text` unchanged when there's nothing to replace.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match text.contains(&self.canonical) {
            true => Cow::Owned(text.replace(&self.canonical, &self.local)),
            false => Cow::Borrowed(text),
        }
    }
}

/// Computes the `file://` URL for `dir`, made absolute against the current
/// working directory. The result ends in `/` exactly when `canonical` does, so
/// that `{canonical}foo.html` maps onto `{local}foo.html` without doubled or
/// missing separators.
pub fn local_prefix(dir: &Path, canonical: &str) -> Result<String> {
    let absolute = dir.canonicalize().map_err(|err| Error::Resolve {
        path: dir.to_owned(),
        err,
    })?;
    let url = Url::from_directory_path(&absolute)
        .map_err(|()| Error::NotAbsolute(absolute.clone()))?;
    let url = url.as_str();
    Ok(match canonical.ends_with('/') {
        true => url.to_owned(),
        false => url.trim_end_matches('/').to_owned(),
    })
}

/// Applies `rule` to each file in `paths` in place, one file per task. Files
/// which don't contain the canonical prefix are left untouched. Returns the
/// number of files that were rewritten.
///
/// The first I/O error fails the whole operation, but files that were already
/// rewritten stay rewritten.
pub fn rewrite_for_local_preview(
    paths: &[PathBuf],
    rule: &RewriteRule,
) -> Result<usize> {
    let changed = paths
        .par_iter()
        .map(|path| rewrite_file(path, rule))
        .collect::<Result<Vec<bool>>>()?;
    let changed = changed.into_iter().filter(|&c| c).count();
    tracing::info!(
        files = paths.len(),
        changed,
        from = %rule.canonical,
        to = %rule.local,
        "rewrote links for local preview"
    );
    Ok(changed)
}

fn rewrite_file(path: &Path, rule: &RewriteRule) -> Result<bool> {
    let io_error = |err| Error::RewriteIo {
        path: path.to_owned(),
        err,
    };
    let contents = std::fs::read_to_string(path).map_err(io_error)?;
    match rule.apply(&contents) {
        Cow::Borrowed(_) => Ok(false),
        Cow::Owned(rewritten) => {
            std::fs::write(path, rewritten).map_err(io_error)?;
            tracing::debug!(path = %path.display(), "rewrote");
            Ok(true)
        }
    }
}

/// The result of a fallible rewrite operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error rewriting links for local preview.
#[derive(Debug)]
pub enum Error {
    /// Returned when a rendered file can't be read or written back.
    RewriteIo { path: PathBuf, err: io::Error },

    /// Returned when the content directory can't be resolved to an absolute
    /// path.
    Resolve { path: PathBuf, err: io::Error },

    /// Returned when a resolved directory can't be expressed as a `file://`
    /// URL.
    NotAbsolute(PathBuf),

    /// Returned for a rule whose canonical prefix is empty.
    EmptyCanonicalPrefix,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::RewriteIo { path, err } => {
                write!(f, "Rewriting '{}': {}", path.display(), err)
            }
            Error::Resolve { path, err } => {
                write!(f, "Resolving directory '{}': {}", path.display(), err)
            }
            Error::NotAbsolute(path) => write!(
                f,
                "Can't build a file URL for '{}'",
                path.display()
            ),
            Error::EmptyCanonicalPrefix => {
                write!(f, "The canonical URL prefix must not be empty")
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::RewriteIo { path: _, err } => Some(err),
            Error::Resolve { path: _, err } => Some(err),
            Error::NotAbsolute(_) => None,
            Error::EmptyCanonicalPrefix => None,
        }
    }
}
