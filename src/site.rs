//! Exports [`build_site`] and [`clean_site`], which stitch the builder
//! operations together into the three build profiles:
//!
//! * [`Profile::Deploy`] wraps every converted document in the document shell
//! * [`Profile::Raw`] writes the converter output as-is
//! * [`Profile::Local`] does a deploy build and then rewrites the canonical
//!   site URL into a `file://` URL for the content directory, so that links
//!   resolve when browsing the output offline

use crate::build::{clean, Builder, Error as BuildError};
use crate::config::Config;
use crate::convert;
use crate::rewrite::{
    local_prefix, rewrite_for_local_preview, Error as RewriteError,
    RewriteRule,
};
use crate::shell::{Error as ShellError, Shell};
use std::fmt;
use std::path::PathBuf;

/// Selects what [`build_site`] produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Deploy,
    Raw,
    Local,
}

/// Builds every source document in the configured content directory
/// according to `profile` and returns the rendered paths.
pub fn build_site(config: &Config, profile: Profile) -> Result<Vec<PathBuf>> {
    // Resolve the rewrite rule before building anything so a missing
    // canonical URL doesn't leave half-finished output behind.
    let rule = match profile {
        Profile::Local => Some(local_rule(config)?),
        Profile::Deploy | Profile::Raw => None,
    };

    let converter = convert::from_argv(config.converter.as_deref());
    let builder =
        Builder::new(converter.as_ref(), &config.extensions, config.threads)?;

    let built = match profile {
        Profile::Raw => builder.build(&config.source_directory)?,
        Profile::Deploy | Profile::Local => {
            let shell =
                Shell::load(&config.stylesheet, config.template.as_deref())?;
            builder.build_with_shell(&config.source_directory, &shell)?
        }
    };

    if let Some(rule) = rule {
        rewrite_for_local_preview(&built, &rule)?;
    }
    Ok(built)
}

/// Deletes every rendered document in the configured content directory.
pub fn clean_site(config: &Config) -> Result<Vec<PathBuf>> {
    Ok(clean(&config.source_directory, &config.extensions)?)
}

fn local_rule(config: &Config) -> Result<RewriteRule> {
    let canonical = config
        .canonical_url
        .as_deref()
        .ok_or(Error::MissingCanonicalUrl)?;
    let local = local_prefix(&config.source_directory, canonical)?;
    Ok(RewriteRule::new(canonical, &local)?)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors building or cleaning documents.
    Build(BuildError),

    /// Returned for errors loading the document shell.
    Shell(ShellError),

    /// Returned for errors rewriting links for local preview.
    Rewrite(RewriteError),

    /// Returned when the local profile is requested without a canonical URL
    /// to rewrite.
    MissingCanonicalUrl,
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Build(err) => err.fmt(f),
            Error::Shell(err) => err.fmt(f),
            Error::Rewrite(err) => err.fmt(f),
            Error::MissingCanonicalUrl => write!(
                f,
                "A local build needs `canonical_url` in the project file or \
                 `--canonical-url` on the command line"
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Build(err) => Some(err),
            Error::Shell(err) => Some(err),
            Error::Rewrite(err) => Some(err),
            Error::MissingCanonicalUrl => None,
        }
    }
}

impl From<BuildError> for Error {
    /// Converts [`BuildError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: BuildError) -> Error {
        Error::Build(err)
    }
}

impl From<ShellError> for Error {
    /// Converts [`ShellError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ShellError) -> Error {
        Error::Shell(err)
    }
}

impl From<RewriteError> for Error {
    /// Converts [`RewriteError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: RewriteError) -> Error {
        Error::Rewrite(err)
    }
}
