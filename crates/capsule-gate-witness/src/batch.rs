// crates/capsule-gate-witness/src/batch.rs
// ============================================================================
// Module: Witness Batch Runner
// Description: Filtered, bounded-concurrency witness runs over capsule sets.
// Purpose: Produce ordered capsule reports for a directory of capsules.
// Dependencies: capsule-gate-core, glob, tokio
// ============================================================================

//! ## Overview
//! The batch runner flattens every selected `(capsule, witness)` pair into
//! one task set, bounded by a semaphore. Results are written back by index,
//! so report order always equals document order and declaration order no
//! matter which runs finish first.
//!
//! Dropping the future returned by [`BatchRunner::run`] drops the task set,
//! which aborts every in-flight run; each run's process-group guard and temp
//! file are released as part of that.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use capsule_gate_core::CapsuleReport;
use capsule_gate_core::CapsuleStatus;
use capsule_gate_core::LoadedDocument;
use capsule_gate_core::WitnessName;
use capsule_gate_core::WitnessResult;
use capsule_gate_core::aggregate;
use capsule_gate_core::witness_name;
use glob::Pattern;
use glob::PatternError;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::engine::RunContext;
use crate::engine::WitnessEngine;

// ============================================================================
// SECTION: Filters
// ============================================================================

/// Invalid capsule file glob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid capsule file pattern {pattern}: {message}")]
pub struct FilterError {
    /// Offending pattern.
    pub pattern: String,
    /// Parser message.
    pub message: String,
}

/// Capsule and witness selection.
///
/// Capsule id and file-glob selectors are unioned; with neither, every
/// capsule is selected. Witness names restrict which witnesses run.
#[derive(Debug, Clone, Default)]
pub struct CapsuleFilter {
    /// Exact capsule ids.
    ids: Vec<String>,
    /// Globs matched against the source path or its file name.
    files: Vec<Pattern>,
    /// Witness names.
    witnesses: Vec<String>,
}

impl CapsuleFilter {
    /// Builds a filter.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when a file pattern is not a valid glob.
    pub fn new(
        ids: Vec<String>,
        file_patterns: &[String],
        witnesses: Vec<String>,
    ) -> Result<Self, FilterError> {
        let files = file_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|err: PatternError| FilterError {
                    pattern: pattern.clone(),
                    message: err.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            ids,
            files,
            witnesses,
        })
    }

    /// Returns true when the capsule is selected.
    #[must_use]
    pub fn selects_capsule(&self, id: Option<&str>, path: &Path) -> bool {
        if self.ids.is_empty() && self.files.is_empty() {
            return true;
        }
        let by_id = id.is_some_and(|id| self.ids.iter().any(|wanted| wanted == id));
        let file_name = path.file_name().map(Path::new);
        let by_file = self.files.iter().any(|pattern| {
            pattern.matches_path(path) || file_name.is_some_and(|name| pattern.matches_path(name))
        });
        by_id || by_file
    }

    /// Returns true when the witness is selected.
    #[must_use]
    pub fn selects_witness(&self, name: &WitnessName) -> bool {
        self.witnesses.is_empty() || self.witnesses.iter().any(|wanted| wanted == name.as_str())
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// A document that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadWarning {
    /// Source path.
    pub path: PathBuf,
    /// Load error message.
    pub message: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Capsule reports in document order.
    pub reports: Vec<CapsuleReport>,
    /// Documents skipped because they failed to load.
    pub warnings: Vec<LoadWarning>,
}

impl BatchReport {
    /// Returns true when any capsule is red.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|report| report.status == CapsuleStatus::Red)
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Batch runner options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum witnesses running at once (values below 1 mean 1).
    pub max_concurrency: usize,
    /// Directory relative witness `workdir` values resolve against.
    pub working_dir: PathBuf,
}

/// One scheduled witness run.
struct Job {
    /// Capsule slot.
    capsule: usize,
    /// Witness slot within the capsule.
    witness: usize,
    /// Raw witness entry.
    raw: serde_json::Value,
    /// Run context.
    context: RunContext,
}

/// Runs witnesses for many capsules.
#[derive(Clone)]
pub struct BatchRunner {
    /// Witness engine.
    engine: WitnessEngine,
    /// Runner options.
    options: BatchOptions,
}

impl BatchRunner {
    /// Creates a runner.
    #[must_use]
    pub const fn new(engine: WitnessEngine, options: BatchOptions) -> Self {
        Self {
            engine,
            options,
        }
    }

    /// Runs every selected witness of every selected capsule.
    pub async fn run(&self, documents: &[LoadedDocument], filter: &CapsuleFilter) -> BatchReport {
        let mut warnings = Vec::new();
        let mut capsules = Vec::new();
        let mut slots: Vec<Vec<Option<WitnessResult>>> = Vec::new();
        let mut names: Vec<Vec<WitnessName>> = Vec::new();
        let mut jobs = Vec::new();

        for loaded in documents {
            let document = match &loaded.document {
                Ok(document) => document,
                Err(err) => {
                    warnings.push(LoadWarning {
                        path: loaded.path.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if !filter.selects_capsule(document.id(), &loaded.path) {
                continue;
            }
            let capsule_index = capsules.len();
            let context = RunContext {
                capsule: document.capsule_id(),
                capsule_dir: capsule_dir(&loaded.path, &self.options.working_dir),
                working_dir: self.options.working_dir.clone(),
            };
            let selected: Vec<&serde_json::Value> = document
                .witnesses()
                .iter()
                .filter(|raw| filter.selects_witness(&witness_name(raw)))
                .collect();
            names.push(selected.iter().map(|raw| witness_name(raw)).collect());
            slots.push(vec![None; selected.len()]);
            for (witness_index, raw) in selected.into_iter().enumerate() {
                jobs.push(Job {
                    capsule: capsule_index,
                    witness: witness_index,
                    raw: raw.clone(),
                    context: context.clone(),
                });
            }
            capsules.push(context.capsule);
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for job in jobs {
            let engine = self.engine.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = engine.run(&job.raw, &job.context).await;
                (job.capsule, job.witness, result)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Ok((capsule, witness, result)) = joined
                && let Some(slot) = slots.get_mut(capsule).and_then(|row| row.get_mut(witness))
            {
                *slot = Some(result);
            }
        }

        let reports = capsules
            .into_iter()
            .zip(slots)
            .zip(names)
            .map(|((capsule, row), row_names)| {
                let results = row
                    .into_iter()
                    .zip(row_names)
                    .map(|(slot, name)| {
                        slot.unwrap_or_else(|| WitnessResult::error(name, "Witness task failed"))
                    })
                    .collect();
                aggregate(capsule, results)
            })
            .collect();
        BatchReport {
            reports,
            warnings,
        }
    }
}

/// Returns the directory containing a capsule file.
fn capsule_dir(path: &Path, working_dir: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if parent.is_absolute() => parent.to_path_buf(),
        Some(parent) => working_dir.join(parent),
        None => working_dir.to_path_buf(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn empty_filter_selects_everything() {
        let filter = CapsuleFilter::default();
        assert!(filter.selects_capsule(Some("a"), Path::new("x/a.yaml")));
        assert!(filter.selects_capsule(None, Path::new("x/a.yaml")));
        assert!(filter.selects_witness(&WitnessName::new("w")));
    }

    #[test]
    fn id_and_file_selectors_are_unioned() {
        let filter =
            CapsuleFilter::new(vec!["llm.a".to_string()], &["*_b.yaml".to_string()], Vec::new())
                .unwrap();
        assert!(filter.selects_capsule(Some("llm.a"), Path::new("caps/one.yaml")));
        assert!(filter.selects_capsule(Some("other"), Path::new("caps/llm_b.yaml")));
        assert!(!filter.selects_capsule(Some("other"), Path::new("caps/llm_c.yaml")));
    }

    #[test]
    fn file_globs_match_full_paths_too() {
        let filter =
            CapsuleFilter::new(Vec::new(), &["caps/**/*.yaml".to_string()], Vec::new()).unwrap();
        assert!(filter.selects_capsule(None, Path::new("caps/nested/x.yaml")));
        assert!(!filter.selects_capsule(None, Path::new("other/x.yaml")));
    }

    #[test]
    fn witness_filter_restricts_names() {
        let filter = CapsuleFilter::new(Vec::new(), &[], vec!["keep".to_string()]).unwrap();
        assert!(filter.selects_witness(&WitnessName::new("keep")));
        assert!(!filter.selects_witness(&WitnessName::new("drop")));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        assert!(CapsuleFilter::new(Vec::new(), &["[".to_string()], Vec::new()).is_err());
    }

    #[test]
    fn capsule_dir_is_absolute() {
        assert_eq!(
            capsule_dir(Path::new("caps/a.yaml"), Path::new("/work")),
            PathBuf::from("/work/caps")
        );
        assert_eq!(capsule_dir(Path::new("a.yaml"), Path::new("/work")), PathBuf::from("/work"));
    }
}
