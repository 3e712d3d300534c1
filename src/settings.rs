use std::fs;
use std::path::{Path, PathBuf};

use serde_derive::Deserialize;

use crate::error::RotatorError;

const DEFAULT_MAX_FILES: u32 = 5;

/// Which log streams are managed, and where.
///
/// Can be built programmatically or loaded from a TOML file with
/// [`Settings::try_from_toml_file`]. Validation happens when the settings are
/// handed to [`Rotator::start`](crate::Rotator::start).
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// The single directory under which all inputs and outputs live.
    ///
    /// Must exist when the rotator starts.
    pub watch_dir: PathBuf,

    /// Ordered list of family name tokens.
    ///
    /// Determines both which sentinels are accepted and which output
    /// basenames are produced. Matching is first-match-wins, so no family
    /// may be a substring of another.
    pub families: Vec<String>,

    /// Largest generation index retained on disk.
    ///
    /// Generation `max_files` exists only transiently between a rotation
    /// and the compression that consumes it.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Remove the prior archive once a new one is in place.
    #[serde(default = "default_flag")]
    pub delete_obsolete_archives: bool,

    /// Remove generations `1..max_files` after a successful archive.
    #[serde(default = "default_flag")]
    pub delete_obsolete_logs: bool,
}

fn default_max_files() -> u32 {
    DEFAULT_MAX_FILES
}

fn default_flag() -> bool {
    true
}

impl Settings {
    pub fn new<P: Into<PathBuf>>(watch_dir: P, families: Vec<String>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            families,
            max_files: DEFAULT_MAX_FILES,
            delete_obsolete_archives: true,
            delete_obsolete_logs: true,
        }
    }

    #[must_use]
    pub fn max_files(mut self, max_files: u32) -> Self {
        self.max_files = max_files;
        self
    }

    /// Leaves the previous archive of a family on disk when a new one is
    /// produced.
    #[must_use]
    pub fn keep_obsolete_archives(mut self) -> Self {
        self.delete_obsolete_archives = false;
        self
    }

    /// Leaves the numbered generation files on disk after they have been
    /// archived.
    #[must_use]
    pub fn keep_obsolete_logs(mut self) -> Self {
        self.delete_obsolete_logs = false;
        self
    }

    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// `RotatorError::Io` if the file cannot be read,
    /// `RotatorError::Settings` if it cannot be parsed.
    pub fn try_from_toml_file(path: &Path) -> Result<Self, RotatorError> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| {
            RotatorError::Settings(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    pub(crate) fn validate(&self) -> Result<(), RotatorError> {
        if !self.watch_dir.is_dir() {
            return Err(RotatorError::Settings(format!(
                "watch directory {} does not exist",
                self.watch_dir.display()
            )));
        }
        if self.max_files == 0 {
            return Err(RotatorError::Settings(
                "max_files must be positive".to_owned(),
            ));
        }
        if self.families.is_empty() {
            return Err(RotatorError::Settings(
                "at least one family must be configured".to_owned(),
            ));
        }
        for family in &self.families {
            if family.is_empty() || family.contains('/') || family.contains('.') {
                return Err(RotatorError::Settings(format!(
                    "invalid family token {:?}",
                    family
                )));
            }
        }
        // First-match-wins classification breaks down as soon as one token
        // contains another (this also catches duplicates).
        for (i, a) in self.families.iter().enumerate() {
            for (j, b) in self.families.iter().enumerate() {
                if i != j && b.contains(a.as_str()) {
                    return Err(RotatorError::Settings(format!(
                        "family {:?} is a substring of family {:?}",
                        a, b
                    )));
                }
            }
        }
        Ok(())
    }
}
