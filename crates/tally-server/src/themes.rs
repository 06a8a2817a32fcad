//! Theme validation before activation.
//!
//! The actual checker (a theme linter) is an external collaborator behind
//! [`ThemeChecker`]. This module decides how strict the check is for the
//! current environment, which results block an upload, and announces
//! accepted uploads on the bus as the `theme.uploaded` model event.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tally_events::{DomainEvents, Event};
use thiserror::Error;

use crate::config::Environment;

/// Model event published for an accepted upload.
pub const THEME_UPLOADED: &str = "theme.uploaded";

/// Where the theme to check lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    /// An uploaded archive.
    Zip(PathBuf),
    /// An already-extracted theme directory.
    Directory(PathBuf),
}

/// Checker switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Leave the extracted archive on disk for the installer.
    pub keep_extracted_dir: bool,
    pub detect_package_json_errors: bool,
    pub detect_deprecated_css_errors: bool,
}

impl CheckOptions {
    /// Options for `source` in `environment`. Production skips the
    /// package.json and deprecated-CSS checks.
    pub fn for_environment(environment: Environment, source: &ThemeSource) -> Self {
        let strict = environment != Environment::Production;
        Self {
            keep_extracted_dir: matches!(source, ThemeSource::Zip(_)),
            detect_package_json_errors: strict,
            detect_deprecated_css_errors: strict,
        }
    }
}

/// One checker finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeIssue {
    pub rule: String,
    pub message: String,
    #[serde(default)]
    pub fatal: bool,
}

/// Formatted checker output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckedTheme {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub errors: Vec<ThemeIssue>,
    #[serde(default)]
    pub warnings: Vec<ThemeIssue>,
}

impl CheckedTheme {
    fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|issue| issue.fatal)
    }
}

#[derive(Debug, Error)]
pub enum ThemeError {
    /// At least one fatal error. Carries every error entry, fatal or not.
    #[error("theme is invalid: {} error(s)", .errors.len())]
    Validation { errors: Vec<ThemeIssue> },

    /// The checker itself could not run.
    #[error("theme check failed: {0}")]
    Checker(String),
}

/// The theme linter.
#[async_trait]
pub trait ThemeChecker: Send + Sync {
    async fn check(
        &self,
        source: &ThemeSource,
        options: &CheckOptions,
    ) -> Result<CheckedTheme, ThemeError>;
}

/// Runs the checker. Non-fatal errors are returned with the result; any
/// fatal error rejects the theme.
///
/// # Errors
///
/// Returns `ThemeError::Validation` on fatal errors, or the checker's own
/// error if it could not run.
pub async fn check_theme(
    checker: &dyn ThemeChecker,
    source: &ThemeSource,
    environment: Environment,
) -> Result<CheckedTheme, ThemeError> {
    let options = CheckOptions::for_environment(environment, source);
    let checked = checker.check(source, &options).await?;

    if checked.has_fatal_errors() {
        tracing::warn!(
            theme = %checked.name,
            errors = checked.errors.len(),
            "theme rejected"
        );
        return Err(ThemeError::Validation {
            errors: checked.errors,
        });
    }

    if !checked.errors.is_empty() {
        tracing::info!(
            theme = %checked.name,
            errors = checked.errors.len(),
            "theme accepted with non-fatal errors"
        );
    }
    Ok(checked)
}

/// Checks the theme and, when accepted, publishes `theme.uploaded` with the
/// theme name.
///
/// # Errors
///
/// See [`check_theme`]. Nothing is published on error.
pub async fn upload_theme(
    checker: &dyn ThemeChecker,
    bus: &DomainEvents,
    source: &ThemeSource,
    environment: Environment,
) -> Result<CheckedTheme, ThemeError> {
    let checked = check_theme(checker, source, environment).await?;

    let mut data = Map::new();
    data.insert("name".to_string(), Value::String(checked.name.clone()));
    bus.publish(Event::model(THEME_UPLOADED, data));

    Ok(checked)
}
