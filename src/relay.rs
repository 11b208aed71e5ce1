use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::allocator;
use crate::error::SubmitError;
use crate::mailer::NotificationQueue;
use crate::sheets::SheetStore;
use crate::submission::{Submission, SubmissionId};
use crate::validator;

/// The submission pipeline: validate, allocate an ID, append, notify
///
/// Reading the last ID and appending the new row happen under one lock, so
/// two requests handled by this process can never be given the same ID. The
/// service also remembers the last ID it issued. When the sheet reports a
/// lower last ID (a stale read, or rows deleted or sorted by hand) the new ID
/// continues from the issued one instead, so IDs never repeat.
pub struct SubmissionService {
    store: Arc<dyn SheetStore>,
    notifications: Option<NotificationQueue>,
    last_issued: Mutex<Option<SubmissionId>>,
    today: fn() -> NaiveDate,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn SheetStore>, notifications: Option<NotificationQueue>) -> Self {
        SubmissionService {
            store,
            notifications,
            last_issued: Mutex::new(None),
            today: utc_today,
        }
    }

    /// Replace the clock used to stamp submissions.
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications.is_some()
    }

    /// Run one request body through the pipeline
    ///
    /// # Arguments
    /// * `body` - Decoded JSON request body
    ///
    /// # Returns
    /// * `Result<Submission, SubmitError>` - The persisted submission, or why nothing was written
    pub async fn submit(&self, body: &Value) -> Result<Submission, SubmitError> {
        let form = validator::validate(body).map_err(SubmitError::Invalid)?;

        let submission = {
            let mut last_issued = self.last_issued.lock().await;

            let rows = self.store.read_rows().await?;
            let id = allocator::next_id(&rows)?;
            let id = allocator::continue_after(id, *last_issued)?;

            let submission = Submission::new(id, (self.today)(), form);
            self.store.append_row(submission.to_row()).await?;
            *last_issued = Some(id);
            submission
        };

        log::info!(
            "Stored submission {} ({}) in {}",
            submission.id,
            submission.form.interest_type,
            self.store.kind()
        );

        if let Some(queue) = &self.notifications {
            queue.enqueue(submission.clone());
        }

        Ok(submission)
    }
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}
