//! Tracking record construction.
//!
//! [`build_record`] is pure: it reads the defaults and the event payload and
//! returns a fresh [`TrackingRecord`]. It never mutates its inputs and has no
//! I/O.

use std::collections::HashSet;

use tally_events::{Event, FieldPath};
use tally_types::{TrackDefaults, TrackingRecord, EVENT_KEY};

use crate::error::ExtractionError;

/// Copies the payload field at `source` into the record under `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    output: String,
    source: FieldPath,
}

impl FieldRule {
    /// Record key written by this rule.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Payload path read by this rule.
    pub fn source(&self) -> &FieldPath {
        &self.source
    }
}

/// Field extraction rules (`output key → payload path`) for one
/// subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    rules: Vec<FieldRule>,
}

impl Extraction {
    /// Declares extraction rules from `(output, source)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] if an output key is empty, duplicated, or
    /// the reserved `event` key, or if a source path is malformed.
    pub fn new<I, K, S>(pairs: I) -> Result<Self, ExtractionError>
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut rules = Vec::new();

        for (output, source) in pairs {
            let output = output.into();
            if output.is_empty() {
                return Err(ExtractionError::EmptyKey);
            }
            if output == EVENT_KEY {
                return Err(ExtractionError::ReservedKey(output));
            }
            if !seen.insert(output.clone()) {
                return Err(ExtractionError::DuplicateKey(output));
            }
            let source = FieldPath::parse(source.as_ref()).map_err(|source| {
                ExtractionError::Path {
                    output: output.clone(),
                    source,
                }
            })?;
            rules.push(FieldRule { output, source });
        }

        Ok(Self { rules })
    }

    /// The declared rules, in declaration order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Whether no rules are declared.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Builds the tracking record for one event occurrence.
///
/// The record is `{...defaults, event: prefix + name, ...extracted}`.
/// Extracted fields win over defaults on key collision; a rule whose source
/// is missing (or that runs without a payload) leaves its key absent.
pub fn build_record(
    defaults: &TrackDefaults,
    prefix: &str,
    name: &str,
    extraction: Option<&Extraction>,
    payload: Option<&Event>,
) -> TrackingRecord {
    let mut record = TrackingRecord::new(defaults, format!("{prefix}{name}"));

    for rule in extraction.map(Extraction::rules).unwrap_or_default() {
        match payload.and_then(|event| event.field(&rule.source)) {
            Some(value) => record.set_field(rule.output.clone(), value),
            None => record.clear_field(&rule.output),
        };
    }

    record
}
