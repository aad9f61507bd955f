use crate::document::{Extensions, HTML_EXTENSION, MARKDOWN_EXTENSION};
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// The name of the project file searched for by [`Config::from_directory`].
pub const PROJECT_FILE: &str = "postshell.yaml";

const DEFAULT_SOURCE_DIRECTORY: &str = "src";
const DEFAULT_STYLESHEET: &str = "style.css";

#[derive(Deserialize, Default)]
struct Project {
    source_directory: Option<PathBuf>,
    source_extension: Option<String>,
    output_extension: Option<String>,
    stylesheet: Option<PathBuf>,
    template: Option<PathBuf>,
    canonical_url: Option<String>,
    converter: Option<Vec<String>>,

    #[serde(default)]
    threads: usize,
}

/// The resolved build configuration. All paths are absolute or relative to
/// the working directory; project-file paths have already been joined onto
/// the project root.
#[derive(Debug)]
pub struct Config {
    pub source_directory: PathBuf,
    pub extensions: Extensions,
    pub stylesheet: PathBuf,
    pub template: Option<PathBuf>,
    pub canonical_url: Option<String>,
    pub converter: Option<Vec<String>>,
    pub threads: usize,
}

/// Settings given on the command line, which take precedence over the
/// project file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub source_directory: Option<PathBuf>,
    pub canonical_url: Option<String>,
    pub threads: Option<usize>,
}

impl Config {
    /// Looks for [`PROJECT_FILE`] in `dir` and then in each of its ancestors.
    /// If none exists, the defaults are used with `dir` as the project root.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let mut current = Some(dir);
        while let Some(candidate) = current {
            let path = candidate.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path)
                    .map_err(|e| anyhow!("Loading configuration: {:?}", e));
            }
            current = candidate.parent();
        }
        tracing::debug!(
            dir = %dir.display(),
            "no {} found; using defaults",
            PROJECT_FILE
        );
        Config::resolve(dir, Project::default())
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let file = match File::open(path) {
            Err(e) => {
                return Err(anyhow!(
                    "Opening project file `{}`: {}",
                    path.display(),
                    e
                ))
            }
            Ok(file) => file,
        };
        let project: Project = serde_yaml::from_reader(file)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => {
                tracing::info!(path = %path.display(), "loaded project file");
                Config::resolve(project_root, project)
            }
        }
    }

    fn resolve(project_root: &Path, project: Project) -> Result<Config> {
        let extensions = Extensions {
            source: project
                .source_extension
                .unwrap_or_else(|| MARKDOWN_EXTENSION.to_owned()),
            output: project
                .output_extension
                .unwrap_or_else(|| HTML_EXTENSION.to_owned()),
        };
        validate_extensions(&extensions)?;

        Ok(Config {
            source_directory: project_root.join(
                project
                    .source_directory
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIRECTORY)),
            ),
            extensions,
            stylesheet: project_root.join(
                project
                    .stylesheet
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLESHEET)),
            ),
            template: project
                .template
                .map(|relpath| project_root.join(relpath)),
            canonical_url: project.canonical_url,
            converter: project.converter,
            threads: project.threads,
        })
    }

    /// Applies command-line [`Overrides`] on top of this configuration.
    pub fn with_overrides(mut self, overrides: Overrides) -> Config {
        if let Some(dir) = overrides.source_directory {
            self.source_directory = dir;
        }
        if let Some(url) = overrides.canonical_url {
            self.canonical_url = Some(url);
        }
        if let Some(threads) = overrides.threads {
            self.threads = threads;
        }
        self
    }
}

fn validate_extensions(extensions: &Extensions) -> Result<()> {
    let trimmed = |ext: &str| ext.trim_start_matches('.').is_empty();
    if trimmed(&extensions.source) || trimmed(&extensions.output) {
        return Err(anyhow!("File extensions must not be empty"));
    }
    if extensions.source.starts_with('.') || extensions.output.starts_with('.')
    {
        return Err(anyhow!(
            "File extensions are given without a leading dot (e.g., `md`)"
        ));
    }
    if extensions.source == extensions.output {
        return Err(anyhow!(
            "Source and output extensions are both `{}`",
            extensions.source
        ));
    }
    Ok(())
}
