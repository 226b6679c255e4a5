//! One image submission at a time: validate, upload, create, settle.

use std::sync::Arc;

use shared::protocol::ImageRecord;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{OperationError, ValidationError, ValidationErrors},
    form::{FormDraft, ImageFile},
    mutation::CreateRecordMutation,
    notify::{Notification, Notifier},
    upload::{ProgressReporter, UploadAdapter, UploadProgress, UploadState},
    validation::{validate_draft, validate_file},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Success(ImageRecord),
    Failure(OperationError),
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Editing,
    Validating,
    Uploading,
    Submitting,
    Settled(Settlement),
}

impl SubmissionState {
    /// The submit control is disabled in these states.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Validating | Self::Uploading | Self::Submitting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another attempt was in flight.
    Ignored,
    Rejected(ValidationErrors),
    Settled(Settlement),
    /// The form was closed before the attempt finished; nothing was applied.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Ignored,
    Rejected(ValidationError),
    Uploaded { remote_url: String },
    Settled(Settlement),
    Abandoned,
}

struct FormInner {
    state: SubmissionState,
    draft: FormDraft,
    upload: UploadState,
    attempt_id: Uuid,
    // Bumped on close; in-flight results from an older generation are dropped.
    generation: u64,
}

impl FormInner {
    fn reset(&mut self) {
        self.draft = FormDraft::default();
        self.upload.clear();
    }

    fn begin_attempt_if_settled(&mut self) {
        if matches!(self.state, SubmissionState::Settled(_)) {
            self.attempt_id = Uuid::new_v4();
            self.state = SubmissionState::Editing;
        }
    }
}

pub struct SubmissionForm {
    uploader: Arc<dyn UploadAdapter>,
    mutation: CreateRecordMutation,
    notifier: Arc<dyn Notifier>,
    progress: ProgressReporter,
    inner: Mutex<FormInner>,
}

impl SubmissionForm {
    pub fn new(
        uploader: Arc<dyn UploadAdapter>,
        mutation: CreateRecordMutation,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (progress, _) = ProgressReporter::channel();
        Self {
            uploader,
            mutation,
            notifier,
            progress,
            inner: Mutex::new(FormInner {
                state: SubmissionState::Editing,
                draft: FormDraft::default(),
                upload: UploadState::default(),
                attempt_id: Uuid::new_v4(),
                generation: 0,
            }),
        }
    }

    pub async fn state(&self) -> SubmissionState {
        self.inner.lock().await.state.clone()
    }

    pub async fn draft(&self) -> FormDraft {
        self.inner.lock().await.draft.clone()
    }

    pub async fn upload_state(&self) -> UploadState {
        self.inner.lock().await.upload.clone()
    }

    pub async fn is_submit_enabled(&self) -> bool {
        !self.inner.lock().await.state.is_busy()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<UploadProgress> {
        self.progress.subscribe()
    }

    /// Replaces the selected file. A different file invalidates any finished
    /// upload. Returns false while an attempt is in flight.
    pub async fn select_file(&self, file: Option<ImageFile>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.is_busy() {
            return false;
        }
        inner.begin_attempt_if_settled();
        if inner.draft.file != file {
            inner.upload.remote_url = None;
            inner.upload.preview_url = file.as_ref().map(ImageFile::preview_url);
            inner.draft.file = file;
        }
        true
    }

    pub async fn set_title(&self, title: impl Into<String>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.is_busy() {
            return false;
        }
        inner.begin_attempt_if_settled();
        inner.draft.title = title.into();
        true
    }

    pub async fn set_description(&self, description: impl Into<String>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.is_busy() {
            return false;
        }
        inner.begin_attempt_if_settled();
        inner.draft.description = description.into();
        true
    }

    /// Uploads the selected file ahead of submit so a later submit can skip
    /// straight to record creation.
    pub async fn upload_selected(&self) -> UploadOutcome {
        let (attempt_id, generation, file, reporter) = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_busy() {
                return UploadOutcome::Ignored;
            }
            inner.begin_attempt_if_settled();
            if let Err(err) = validate_file(inner.draft.file.as_ref()) {
                return UploadOutcome::Rejected(err);
            }
            if let Some(remote_url) = inner.upload.remote_url.clone() {
                return UploadOutcome::Uploaded { remote_url };
            }
            let Some(file) = inner.draft.file.clone() else {
                return UploadOutcome::Rejected(ValidationError::MissingFile);
            };
            inner.state = SubmissionState::Uploading;
            let reporter = self.progress.next_upload();
            (inner.attempt_id, inner.generation, file, reporter)
        };

        let result = self.run_upload(attempt_id, &file, &reporter).await;
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(attempt = %attempt_id, "submission: dropping upload result after close");
            return UploadOutcome::Abandoned;
        }
        match result {
            Ok(remote_url) if !remote_url.trim().is_empty() => {
                inner.upload.remote_url = Some(remote_url.clone());
                inner.state = SubmissionState::Editing;
                UploadOutcome::Uploaded { remote_url }
            }
            Ok(_) => {
                let settlement =
                    self.settle_locked(&mut inner, attempt_id, OperationError::MissingUpload);
                UploadOutcome::Settled(settlement)
            }
            Err(err) => {
                let settlement = self.settle_locked(&mut inner, attempt_id, err);
                UploadOutcome::Settled(settlement)
            }
        }
    }

    pub async fn submit(&self) -> SubmitOutcome {
        let (attempt_id, generation, draft, reporter) = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_busy() {
                debug!(attempt = %inner.attempt_id, "submission: submit ignored while busy");
                return SubmitOutcome::Ignored;
            }
            inner.begin_attempt_if_settled();
            inner.state = SubmissionState::Validating;
            if let Err(errors) = validate_draft(&inner.draft) {
                inner.state = SubmissionState::Editing;
                info!(attempt = %inner.attempt_id, %errors, "submission: rejected by validation");
                return SubmitOutcome::Rejected(errors);
            }
            inner.state = if inner.upload.remote_url.is_some() {
                SubmissionState::Submitting
            } else {
                SubmissionState::Uploading
            };
            let reporter = inner
                .upload
                .remote_url
                .is_none()
                .then(|| self.progress.next_upload());
            (
                inner.attempt_id,
                inner.generation,
                inner.draft.clone(),
                reporter,
            )
        };

        if let (Some(reporter), Some(file)) = (reporter.as_ref(), draft.file.as_ref()) {
            let result = self.run_upload(attempt_id, file, reporter).await;
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                debug!(attempt = %attempt_id, "submission: dropping upload result after close");
                return SubmitOutcome::Abandoned;
            }
            match result {
                Ok(url) => {
                    // An empty url counts as no upload at all.
                    inner.upload.remote_url = Some(url).filter(|url| !url.trim().is_empty());
                }
                Err(err) => {
                    return SubmitOutcome::Settled(self.settle_locked(&mut inner, attempt_id, err));
                }
            }
        } else if reporter.is_none() {
            debug!(attempt = %attempt_id, "submission: reusing finished upload");
        }

        let remote_url = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                return SubmitOutcome::Abandoned;
            }
            match inner.upload.remote_url.clone() {
                Some(url) => {
                    inner.state = SubmissionState::Submitting;
                    url
                }
                None => {
                    warn!(attempt = %attempt_id, "submission: no uploaded image to register");
                    let settlement = self.settle_locked(
                        &mut inner,
                        attempt_id,
                        OperationError::MissingUpload,
                    );
                    return SubmitOutcome::Settled(settlement);
                }
            }
        };

        info!(attempt = %attempt_id, "submission: creating image record");
        let result = self
            .mutation
            .execute(&remote_url, &draft.title, &draft.description)
            .await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(attempt = %attempt_id, "submission: dropping create result after close");
            return SubmitOutcome::Abandoned;
        }
        let settlement = match result {
            Ok(record) => Settlement::Success(record),
            Err(err) => Settlement::Failure(err),
        };
        SubmitOutcome::Settled(self.finish_locked(&mut inner, attempt_id, settlement, false))
    }

    /// Closes the form: clears the draft and upload state and abandons any
    /// attempt still in flight.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.reset();
        inner.state = SubmissionState::Editing;
        inner.attempt_id = Uuid::new_v4();
        // Progress from the abandoned upload must not reach the next one.
        self.progress.next_upload();
        debug!(generation = inner.generation, "submission: form closed");
    }

    async fn run_upload(
        &self,
        attempt_id: Uuid,
        file: &ImageFile,
        reporter: &ProgressReporter,
    ) -> Result<String, OperationError> {
        info!(attempt = %attempt_id, filename = %file.filename, "submission: uploading image");
        self.uploader.upload(file, reporter).await.map_err(|err| {
            warn!(attempt = %attempt_id, "submission: upload failed: {err:#}");
            reporter.reset();
            OperationError::upload_failed(&err)
        })
    }

    // Upload failures keep the draft only when re-sending the same file is safe.
    fn settle_locked(
        &self,
        inner: &mut FormInner,
        attempt_id: Uuid,
        err: OperationError,
    ) -> Settlement {
        let keep_draft =
            matches!(err, OperationError::UploadFailed(_)) && self.uploader.is_idempotent();
        self.finish_locked(inner, attempt_id, Settlement::Failure(err), keep_draft)
    }

    fn finish_locked(
        &self,
        inner: &mut FormInner,
        attempt_id: Uuid,
        settlement: Settlement,
        keep_draft: bool,
    ) -> Settlement {
        if !keep_draft {
            inner.reset();
        }
        inner.state = SubmissionState::Settled(settlement.clone());
        info!(
            attempt = %attempt_id,
            success = settlement.is_success(),
            keep_draft,
            "submission: attempt settled"
        );
        self.notifier.notify(Notification::for_settlement(&settlement));
        settlement
    }
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
