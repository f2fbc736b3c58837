//! Handing finished dates out: completed, not-yet-shared dates flip to SHARED.
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::model::{DateFlag, ShareStatus};
use crate::store::{SheetStore, StoreError};

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("date list unreadable: {0}")]
    DateList(#[source] StoreError),
    #[error("failed to update {date}: {source}")]
    Flag {
        date: NaiveDate,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShareFailure {
    pub date: NaiveDate,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ShareSummary {
    pub shared: Vec<NaiveDate>,
    pub failed: Vec<ShareFailure>,
}

impl ShareSummary {
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.failed.is_empty()
    }
}

pub struct ShareGate {
    store: Arc<dyn SheetStore>,
}

impl ShareGate {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        Self { store }
    }

    /// Mark one date finished (or reopen it).
    #[instrument(skip(self))]
    pub async fn set_complete(&self, date: NaiveDate, complete: bool) -> Result<(), ShareError> {
        self.store
            .set_date_flag(date, DateFlag::Complete(complete))
            .await
            .map_err(|source| ShareError::Flag { date, source })?;
        info!("date completion updated");
        Ok(())
    }

    /// Share every complete, unshared date in chronological order. A date
    /// whose flag write fails stays NOT_SHARED and is listed; the rest carry on.
    #[instrument(skip_all)]
    pub async fn share_completed(&self) -> Result<ShareSummary, ShareError> {
        let entries = self
            .store
            .read_date_entries()
            .await
            .map_err(ShareError::DateList)?;

        let mut summary = ShareSummary::default();
        for entry in entries.iter().filter(|e| e.is_ready_to_share()) {
            match self
                .store
                .set_date_flag(entry.date, DateFlag::Share(ShareStatus::Shared))
                .await
            {
                Ok(()) => summary.shared.push(entry.date),
                Err(err) => {
                    warn!(date = %entry.date, %err, "sharing failed for date");
                    summary.failed.push(ShareFailure {
                        date: entry.date,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            shared = summary.shared.len(),
            failed = summary.failed.len(),
            "share run finished"
        );
        Ok(summary)
    }
}
