//! Persisted run document
//!
//! A finished run is written as one pretty-printed JSON document holding the final
//! result and every intermediate step for audit.

use super::run::{PipelineFailure, PipelineRun, StepRecord};
use super::PipelineError;
use crate::protocol::Parameters;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Serialize)]
struct ResultsDocument<'a> {
    run_id: &'a str,
    pipeline: &'a str,
    seed: &'a Parameters,
    state: String,
    steps: &'a [StepRecord],
    final_result: Option<&'a Parameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<&'a PipelineFailure>,
    agents_used: Vec<String>,
    workflow_complete: bool,
    started_at: &'a str,
    finished_at: Option<&'a str>,
}

impl<'a> From<&'a PipelineRun> for ResultsDocument<'a> {
    fn from(run: &'a PipelineRun) -> Self {
        Self {
            run_id: &run.run_id,
            pipeline: &run.pipeline,
            seed: &run.seed,
            state: run.state.to_string(),
            steps: &run.steps,
            final_result: run.final_result(),
            failure: run.failure.as_ref(),
            agents_used: run.agents_used(),
            workflow_complete: run.is_completed(),
            started_at: &run.started_at,
            finished_at: run.finished_at.as_deref(),
        }
    }
}

/// Writes run documents to a fixed path
#[derive(Debug, Clone)]
pub struct ResultsWriter {
    path: PathBuf,
}

impl ResultsWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document for `run` as a JSON value
    pub fn document(run: &PipelineRun) -> serde_json::Value {
        serde_json::to_value(ResultsDocument::from(run)).unwrap_or_default()
    }

    /// Write the document for `run`, replacing any previous file
    pub async fn write(&self, run: &PipelineRun) -> Result<(), PipelineError> {
        let bytes = serde_json::to_vec_pretty(&ResultsDocument::from(run))
            .map_err(|e| self.error(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.error(e.to_string()))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| self.error(e.to_string()))?;

        info!(path = %self.path.display(), run_id = %run.run_id, "Run results written");
        Ok(())
    }

    fn error(&self, message: String) -> PipelineError {
        PipelineError::Results {
            path: self.path.clone(),
            message,
        }
    }
}
