//! The backing store the engine reads from and writes back to.
//!
//! Every call is an independent round trip with no transactional grouping.
//! Implementations map their own cell formats (locale labels, column
//! offsets) to the typed model before anything reaches the engine.
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    DateEntry, DateFlag, Member, MemberFlag, MemberId, ReflectionRecord, Submission,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn member_not_found(id: &MemberId) -> Self {
        StoreError::NotFound {
            what: "member",
            key: id.to_string(),
        }
    }

    pub fn date_not_found(date: NaiveDate) -> Self {
        StoreError::NotFound {
            what: "schedule date",
            key: date.to_string(),
        }
    }
}

#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Roster rows in any order; `order` is carried on each member.
    async fn read_member_roster(&self) -> Result<Vec<Member>, StoreError>;

    /// Schedule dates, chronological.
    async fn read_date_list(&self) -> Result<Vec<NaiveDate>, StoreError>;

    /// Schedule dates with their completion and share flags, chronological.
    async fn read_date_entries(&self) -> Result<Vec<DateEntry>, StoreError>;

    async fn set_date_flag(&self, date: NaiveDate, flag: DateFlag) -> Result<(), StoreError>;

    /// `None` when the member has no row for that date.
    async fn read_submission(
        &self,
        member_id: &MemberId,
        date: NaiveDate,
    ) -> Result<Option<Submission>, StoreError>;

    /// Overwrites any earlier output for the same (member, date).
    async fn write_reflection(&self, record: &ReflectionRecord) -> Result<(), StoreError>;

    async fn set_member_flag(&self, member_id: &MemberId, flag: MemberFlag) -> Result<(), StoreError>;

    /// Deny further edits to the member's personal submission store.
    async fn lock(&self, member_id: &MemberId) -> Result<(), StoreError>;

    /// Must succeed when nothing is locked.
    async fn unlock(&self, member_id: &MemberId) -> Result<(), StoreError>;
}
