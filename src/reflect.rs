//! Batch reflection of checked submissions into per-date grids.
//!
//! A member is the unit of work: their `reflect_status` flips only after
//! every date was written. Anything less leaves them NOT_REFLECTED and the
//! next run recomputes the same grids from scratch.
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::availability::{GridBuilder, WindowParser};
use crate::date_index::DateIndex;
use crate::directory::{DirectoryError, MemberDirectory};
use crate::model::{Member, MemberFlag, MemberId, ReflectStatus, ReflectionRecord, Submission};
use crate::store::{SheetStore, StoreError};

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("date list unreadable: {0}")]
    DateList(#[source] StoreError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReflectionFailure {
    pub member_id: MemberId,
    pub member_name: String,
    /// `None` when the failure was the final status flip.
    pub date: Option<NaiveDate>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    /// Eligible members found at the start of the run.
    pub eligible: usize,
    /// Members flipped to REFLECTED.
    pub processed: usize,
    pub records_written: usize,
    /// Eligible members left for a later run because of the batch cap.
    pub deferred: usize,
    pub failed: Vec<ReflectionFailure>,
}

impl RunSummary {
    /// True only when nothing failed and nothing was deferred.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.deferred == 0
    }

    pub fn failed_members(&self) -> usize {
        let mut ids: Vec<&MemberId> = self.failed.iter().map(|f| &f.member_id).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

pub struct ReflectionOrchestrator {
    store: Arc<dyn SheetStore>,
    parser: WindowParser,
    builder: GridBuilder,
    batch_cap: usize,
}

impl ReflectionOrchestrator {
    pub fn new(
        store: Arc<dyn SheetStore>,
        parser: WindowParser,
        builder: GridBuilder,
        batch_cap: usize,
    ) -> Self {
        Self {
            store,
            parser,
            builder,
            batch_cap,
        }
    }

    /// Re-read the roster (never from cache) and the date list, then run.
    /// Either read failing aborts before any write.
    #[instrument(skip_all)]
    pub async fn run_once(&self, directory: &mut MemberDirectory) -> Result<RunSummary, ReflectError> {
        directory.load(true).await?;
        let dates = self
            .store
            .read_date_list()
            .await
            .map_err(ReflectError::DateList)?;
        let dates = DateIndex::build(dates);
        Ok(self.run(directory.all(), &dates).await)
    }

    /// Members are taken in roster order and dates chronologically; at most
    /// `batch_cap` eligible members are started.
    #[instrument(skip_all, fields(members = members.len(), dates = dates.len()))]
    pub async fn run(&self, members: &[Member], dates: &DateIndex) -> RunSummary {
        let mut eligible: Vec<&Member> = members
            .iter()
            .filter(|m| m.is_eligible_for_reflection())
            .collect();
        eligible.sort_by_key(|m| m.order);

        let mut summary = RunSummary {
            eligible: eligible.len(),
            ..Default::default()
        };
        if dates.is_empty() {
            warn!(eligible = summary.eligible, "no schedule dates; nothing to reflect");
            summary.deferred = summary.eligible;
            return summary;
        }

        let cap = self.batch_cap.min(eligible.len());
        summary.deferred = eligible.len() - cap;
        info!(
            eligible = summary.eligible,
            batch = cap,
            deferred = summary.deferred,
            "starting reflection run"
        );

        for member in eligible.into_iter().take(cap) {
            if self.reflect_member(member, dates, &mut summary).await {
                summary.processed += 1;
            }
        }

        info!(
            processed = summary.processed,
            records = summary.records_written,
            failed = summary.failed.len(),
            deferred = summary.deferred,
            "reflection run finished"
        );
        summary
    }

    /// Returns true once the member is marked REFLECTED.
    async fn reflect_member(&self, member: &Member, dates: &DateIndex, summary: &mut RunSummary) -> bool {
        let mut ok = true;
        for date in dates.iter() {
            match self.reflect_one(member, date).await {
                Ok(()) => summary.records_written += 1,
                Err(err) => {
                    warn!(member_id = %member.id, %date, %err, "reflection write failed");
                    summary.failed.push(failure(member, Some(date), &err));
                    ok = false;
                }
            }
        }
        if !ok {
            return false;
        }

        let flag = MemberFlag::Reflect(ReflectStatus::Reflected);
        match self.store.set_member_flag(&member.id, flag).await {
            Ok(()) => {
                info!(member_id = %member.id, name = %member.name, "member reflected");
                true
            }
            Err(err) => {
                warn!(member_id = %member.id, %err, "could not mark member reflected");
                summary.failed.push(failure(member, None, &err));
                false
            }
        }
    }

    async fn reflect_one(&self, member: &Member, date: NaiveDate) -> Result<(), StoreError> {
        let submission = self
            .store
            .read_submission(&member.id, date)
            .await?
            .unwrap_or_else(Submission::missing);
        let record = self.record_for(member, date, &submission);
        self.store.write_reflection(&record).await
    }

    /// Pure: the record a submission produces for one date.
    pub fn record_for(&self, member: &Member, date: NaiveDate, submission: &Submission) -> ReflectionRecord {
        let window = self.parser.parse_submission(submission);
        let (start_label, end_label) = window.labels();
        ReflectionRecord {
            member_id: member.id.clone(),
            date,
            grid: self.builder.build(&window, date),
            note: submission.note.clone(),
            start_label,
            end_label,
        }
    }
}

fn failure(member: &Member, date: Option<NaiveDate>, err: &StoreError) -> ReflectionFailure {
    ReflectionFailure {
        member_id: member.id.clone(),
        member_name: member.name.clone(),
        date,
        reason: err.to_string(),
    }
}
