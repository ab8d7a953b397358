use std::collections::HashMap;

use crate::foundation::error::{InkstepError, InkstepResult};
use crate::stroke::model::{StrokeLog, Submission};

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SubmissionId(pub String);

/// Everything the core hands over at submit time. The gateway assigns the id
/// and timestamps the accepted submission.
#[derive(Clone, Debug)]
pub struct SubmissionDraft {
    pub user_id: UserId,
    pub prompt_index: u32,
    pub image_png: Vec<u8>,
    pub stroke_log: StrokeLog,
    pub coverage: f64,
    pub duration_secs: u64,
}

/// What a stored submission offers for rendering: the preferred vector log, or
/// the rasterized PNG when no usable log exists (corrupt or legacy data).
#[derive(Clone, Debug)]
pub enum ReplaySource {
    Strokes(StrokeLog),
    Raster(Vec<u8>),
}

/// Boundary to the hosted data platform. Constructed once at startup and passed
/// by reference to whichever component needs it, so tests can substitute a fake.
///
/// All errors surface as `NetworkFailure`. Implementations that upload the
/// raster before inserting the submission row can orphan a stored raster when
/// the insert fails; that consistency gap belongs to the implementation, the
/// core never retries.
pub trait PersistenceGateway {
    /// Whether this user already submitted for this prompt. This is the
    /// one-submission-per-prompt-per-day gate; the core only reacts to it.
    fn has_submitted(&self, user: &UserId, prompt_index: u32) -> InkstepResult<bool>;

    fn save_submission(
        &mut self,
        draft: SubmissionDraft,
        submitted_at_ms: u64,
    ) -> InkstepResult<Submission>;

    fn load_stroke_log(&self, id: &SubmissionId) -> InkstepResult<ReplaySource>;

    /// Today's submissions for a prompt: the viewer's own first, the rest
    /// newest-first.
    fn load_gallery(&self, prompt_index: u32, viewer: &UserId) -> InkstepResult<Vec<Submission>>;

    /// Moderation: hide a submission from the gallery without deleting it.
    fn set_archived(&mut self, id: &SubmissionId, archived: bool) -> InkstepResult<()>;

    /// Moderation: remove a submission and its stored raster.
    fn delete_submission(&mut self, id: &SubmissionId) -> InkstepResult<()>;
}

/// In-process gateway used by tests and the demo CLI.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    submissions: HashMap<SubmissionId, Submission>,
    order: Vec<SubmissionId>,
    next_id: u64,
    /// When set, the next `save_submission` fails once (network-failure paths).
    pub fail_next_save: bool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn has_submitted(&self, user: &UserId, prompt_index: u32) -> InkstepResult<bool> {
        Ok(self
            .submissions
            .values()
            .any(|s| &s.user_id == user && s.prompt_index == prompt_index))
    }

    fn save_submission(
        &mut self,
        draft: SubmissionDraft,
        submitted_at_ms: u64,
    ) -> InkstepResult<Submission> {
        if self.fail_next_save {
            self.fail_next_save = false;
            return Err(InkstepError::network("simulated save failure"));
        }
        self.next_id += 1;
        let id = SubmissionId(format!("sub-{}", self.next_id));
        let submission = Submission {
            id: id.clone(),
            user_id: draft.user_id,
            prompt_index: draft.prompt_index,
            image_png: draft.image_png,
            stroke_log: draft.stroke_log,
            coverage: draft.coverage,
            duration_secs: draft.duration_secs,
            submitted_at: submitted_at_ms,
            archived: false,
        };
        self.submissions.insert(id.clone(), submission.clone());
        self.order.push(id);
        Ok(submission)
    }

    fn load_stroke_log(&self, id: &SubmissionId) -> InkstepResult<ReplaySource> {
        let s = self
            .submissions
            .get(id)
            .ok_or_else(|| InkstepError::network(format!("submission '{}' not found", id.0)))?;
        if s.stroke_log.is_empty() {
            Ok(ReplaySource::Raster(s.image_png.clone()))
        } else {
            Ok(ReplaySource::Strokes(s.stroke_log.clone()))
        }
    }

    fn load_gallery(&self, prompt_index: u32, viewer: &UserId) -> InkstepResult<Vec<Submission>> {
        let mut rows: Vec<Submission> = self
            .order
            .iter()
            .rev() // newest-first
            .filter_map(|id| self.submissions.get(id))
            .filter(|s| s.prompt_index == prompt_index && !s.archived)
            .cloned()
            .collect();
        if let Some(pos) = rows.iter().position(|s| &s.user_id == viewer)
            && pos > 0
        {
            let own = rows.remove(pos);
            rows.insert(0, own);
        }
        Ok(rows)
    }

    fn set_archived(&mut self, id: &SubmissionId, archived: bool) -> InkstepResult<()> {
        let s = self
            .submissions
            .get_mut(id)
            .ok_or_else(|| InkstepError::network(format!("submission '{}' not found", id.0)))?;
        s.archived = archived;
        Ok(())
    }

    fn delete_submission(&mut self, id: &SubmissionId) -> InkstepResult<()> {
        self.submissions
            .remove(id)
            .ok_or_else(|| InkstepError::network(format!("submission '{}' not found", id.0)))?;
        self.order.retain(|x| x != id);
        Ok(())
    }
}
