//! Persisted per-(document, stage) state machine.
//!
//! State lives in the repository, not in process memory; the tracker is
//! stateless and a restarted process resumes from last known state.
//! Transitions are persisted immediately on entry and exit.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PlatenError, PlatenResult};
use crate::pipeline::Stage;
use crate::traits::Repository;
use crate::types::{StageState, StageStatus};

/// Progress of one document through the stage graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// The stage currently running, or the next one that is not terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
}

/// Tracks stage state transitions for documents.
#[derive(Clone)]
pub struct StageTracker {
    repository: Arc<dyn Repository>,
}

impl StageTracker {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Current status of a stage, `Pending` when never recorded.
    pub fn status(&self, document_id: &str, stage: Stage) -> PlatenResult<StageStatus> {
        Ok(self
            .repository
            .get_stage_status(document_id, stage)?
            .map(|s| s.status)
            .unwrap_or(StageStatus::Pending))
    }

    /// Full persisted state for one stage.
    pub fn state(&self, document_id: &str, stage: Stage) -> PlatenResult<Option<StageState>> {
        self.repository.get_stage_status(document_id, stage)
    }

    /// Verify every upstream dependency is completed or skipped.
    pub fn precheck(&self, document_id: &str, stage: Stage) -> PlatenResult<()> {
        for dep in stage.dependencies() {
            let status = self.status(document_id, *dep)?;
            if !status.satisfies_precondition() {
                return Err(PlatenError::precheck(stage.name(), dep.name()));
            }
        }
        Ok(())
    }

    pub fn mark_running(&self, document_id: &str, stage: Stage) -> PlatenResult<()> {
        self.repository
            .set_stage_status(document_id, stage, StageStatus::Running, None)
    }

    pub fn mark_completed(&self, document_id: &str, stage: Stage) -> PlatenResult<()> {
        info!(document_id, stage = %stage, "stage completed");
        self.repository
            .set_stage_status(document_id, stage, StageStatus::Completed, None)
    }

    pub fn mark_failed(&self, document_id: &str, stage: Stage, error: &str) -> PlatenResult<()> {
        info!(document_id, stage = %stage, error, "stage failed");
        self.repository
            .set_stage_status(document_id, stage, StageStatus::Failed, Some(error))
    }

    pub fn mark_skipped(&self, document_id: &str, stage: Stage, reason: &str) -> PlatenResult<()> {
        info!(document_id, stage = %stage, reason, "stage skipped");
        self.repository
            .set_stage_status(document_id, stage, StageStatus::Skipped, Some(reason))
    }

    /// Stages not yet in a satisfied terminal state, in canonical order.
    /// Failed stages are included: they are always retried.
    pub fn missing_stages(&self, document_id: &str) -> PlatenResult<Vec<Stage>> {
        let mut missing = Vec::new();
        for stage in Stage::all() {
            if !self.status(document_id, stage)?.satisfies_precondition() {
                missing.push(stage);
            }
        }
        Ok(missing)
    }

    /// Progress summary across the canonical stage list.
    pub fn progress(&self, document_id: &str) -> PlatenResult<Progress> {
        let stages = Stage::all();
        let total = stages.len();
        let mut completed = 0;
        let mut current_stage = None;
        let mut first_open = None;

        for stage in stages {
            let status = self.status(document_id, stage)?;
            match status {
                StageStatus::Completed | StageStatus::Skipped => completed += 1,
                StageStatus::Running => {
                    if current_stage.is_none() {
                        current_stage = Some(stage);
                    }
                }
                StageStatus::Pending | StageStatus::Failed => {
                    if first_open.is_none() {
                        first_open = Some(stage);
                    }
                }
            }
        }

        Ok(Progress {
            completed,
            total,
            current_stage: current_stage.or(first_open),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteRepository;

    fn tracker() -> StageTracker {
        let repo = SqliteRepository::in_memory().unwrap();
        StageTracker::new(Arc::new(repo))
    }

    #[test]
    fn test_unknown_stage_is_pending() {
        let t = tracker();
        assert_eq!(t.status("d1", Stage::Chunking).unwrap(), StageStatus::Pending);
    }

    #[test]
    fn test_transitions_persist() {
        let t = tracker();
        t.mark_running("d1", Stage::Chunking).unwrap();
        assert_eq!(t.status("d1", Stage::Chunking).unwrap(), StageStatus::Running);
        t.mark_completed("d1", Stage::Chunking).unwrap();
        assert_eq!(
            t.status("d1", Stage::Chunking).unwrap(),
            StageStatus::Completed
        );
    }

    #[test]
    fn test_precheck_blocks_until_upstream_done() {
        let t = tracker();
        let err = t.precheck("d1", Stage::Chunking).unwrap_err();
        assert!(matches!(err, PlatenError::PrecheckFailed { .. }));

        t.mark_completed("d1", Stage::Upload).unwrap();
        t.mark_completed("d1", Stage::TextExtraction).unwrap();
        assert!(t.precheck("d1", Stage::Chunking).is_ok());
    }

    #[test]
    fn test_skipped_satisfies_precheck() {
        let t = tracker();
        t.mark_completed("d1", Stage::Upload).unwrap();
        t.mark_completed("d1", Stage::TextExtraction).unwrap();
        t.mark_skipped("d1", Stage::ImageExtraction, "no images").unwrap();
        assert!(t.precheck("d1", Stage::VisualEmbedding).is_ok());
    }

    #[test]
    fn test_failed_upstream_blocks_downstream() {
        let t = tracker();
        t.mark_completed("d1", Stage::Upload).unwrap();
        t.mark_failed("d1", Stage::TextExtraction, "corrupt pdf").unwrap();
        let err = t.precheck("d1", Stage::Chunking).unwrap_err();
        match err {
            PlatenError::PrecheckFailed { missing, .. } => {
                assert_eq!(missing, "text-extraction");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_stages_excludes_terminal_ok() {
        let t = tracker();
        t.mark_completed("d1", Stage::Upload).unwrap();
        t.mark_skipped("d1", Stage::Thumbnail, "disabled").unwrap();
        t.mark_failed("d1", Stage::TextExtraction, "boom").unwrap();
        let missing = t.missing_stages("d1").unwrap();
        assert!(!missing.contains(&Stage::Upload));
        assert!(!missing.contains(&Stage::Thumbnail));
        // Failed stages are retried
        assert!(missing.contains(&Stage::TextExtraction));
    }

    #[test]
    fn test_progress_counts() {
        let t = tracker();
        t.mark_completed("d1", Stage::Upload).unwrap();
        t.mark_running("d1", Stage::TextExtraction).unwrap();
        let p = t.progress("d1").unwrap();
        assert_eq!(p.completed, 1);
        assert_eq!(p.total, 15);
        assert_eq!(p.current_stage, Some(Stage::TextExtraction));
    }
}
