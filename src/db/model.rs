//! Row-level views returned by repositories, and the label mapping between
//! sheet cell text and the typed statuses.
//!
//! Status columns hold whatever the sheet shows (`✅提出済み`, `未反映`, ...).
//! Only this module knows those strings; everything above it sees enums.

use chrono::NaiveDate;

use crate::config::Labels;
use crate::model::{
    DateEntry, Member, MemberId, ReflectStatus, ShareStatus, Slot, SubmitStatus, Submission,
    WishStatus,
};
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct StatusLabels {
    labels: Labels,
}

impl StatusLabels {
    pub fn new(labels: Labels) -> Self {
        Self { labels }
    }

    pub fn submit(&self, status: SubmitStatus) -> &str {
        match status {
            SubmitStatus::Submitted => &self.labels.submitted,
            SubmitStatus::NotSubmitted => &self.labels.not_submitted,
        }
    }

    pub fn parse_submit(&self, raw: &str) -> Option<SubmitStatus> {
        let raw = raw.trim();
        if raw == self.labels.submitted {
            Some(SubmitStatus::Submitted)
        } else if raw == self.labels.not_submitted {
            Some(SubmitStatus::NotSubmitted)
        } else {
            None
        }
    }

    pub fn reflect(&self, status: ReflectStatus) -> &str {
        match status {
            ReflectStatus::Reflected => &self.labels.reflected,
            ReflectStatus::NotReflected => &self.labels.not_reflected,
        }
    }

    pub fn parse_reflect(&self, raw: &str) -> Option<ReflectStatus> {
        let raw = raw.trim();
        if raw == self.labels.reflected {
            Some(ReflectStatus::Reflected)
        } else if raw == self.labels.not_reflected {
            Some(ReflectStatus::NotReflected)
        } else {
            None
        }
    }

    pub fn share(&self, status: ShareStatus) -> &str {
        match status {
            ShareStatus::Shared => &self.labels.shared,
            ShareStatus::NotShared => &self.labels.not_shared,
        }
    }

    pub fn parse_share(&self, raw: &str) -> Option<ShareStatus> {
        let raw = raw.trim();
        if raw == self.labels.shared {
            Some(ShareStatus::Shared)
        } else if raw == self.labels.not_shared {
            Some(ShareStatus::NotShared)
        } else {
            None
        }
    }

    pub fn wish(&self, status: WishStatus) -> &str {
        match status {
            WishStatus::Available => &self.labels.wish_available,
            WishStatus::Unavailable => &self.labels.wish_unavailable,
        }
    }

    /// Anything other than the "available" mark counts as unavailable,
    /// matching how the form is read: only `◯` opens a window.
    pub fn parse_wish(&self, raw: &str) -> WishStatus {
        if raw.trim() == self.labels.wish_available {
            WishStatus::Available
        } else {
            WishStatus::Unavailable
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub position: i64,
    pub submit_status: String,
    pub check_flag: bool,
    pub reflect_status: String,
    pub sheet_ref: Option<String>,
    pub locked: bool,
}

#[derive(Debug, Clone)]
pub struct DateRow {
    pub date: NaiveDate,
    pub complete: bool,
    pub share_status: String,
}

#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub wish_status: String,
    pub raw_start: Option<String>,
    pub raw_end: Option<String>,
    pub note: String,
}

/// A stored reflection joined with its member, for display.
#[derive(Debug, Clone)]
pub struct ReflectionRow {
    pub member_id: String,
    pub display_name: String,
    pub position: i64,
    pub date: NaiveDate,
    pub slots: String,
    pub note: String,
    pub start_label: String,
    pub end_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReflection {
    pub member_id: MemberId,
    pub display_name: String,
    pub order: usize,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
    pub note: String,
    pub start_label: String,
    pub end_label: String,
}

fn malformed(what: &'static str, detail: impl Into<String>) -> StoreError {
    StoreError::Malformed {
        what,
        detail: detail.into(),
    }
}

impl StatusLabels {
    pub fn member(&self, row: MemberRow) -> Result<Member, StoreError> {
        let submit_status = self.parse_submit(&row.submit_status).ok_or_else(|| {
            malformed("submit status", format!("{}: {:?}", row.id, row.submit_status))
        })?;
        let reflect_status = self.parse_reflect(&row.reflect_status).ok_or_else(|| {
            malformed("reflect status", format!("{}: {:?}", row.id, row.reflect_status))
        })?;
        let order = usize::try_from(row.position)
            .map_err(|_| malformed("member order", format!("{}: {}", row.id, row.position)))?;
        Ok(Member {
            id: MemberId::new(row.id),
            name: row.name,
            display_name: row.display_name,
            order,
            submit_status,
            check_flag: row.check_flag,
            reflect_status,
            sheet_ref: row.sheet_ref.filter(|s| !s.trim().is_empty()),
        })
    }

    /// `order` is the row's position in the chronological listing.
    pub fn date_entry(&self, order: usize, row: DateRow) -> Result<DateEntry, StoreError> {
        let share_status = self.parse_share(&row.share_status).ok_or_else(|| {
            malformed("share status", format!("{}: {:?}", row.date, row.share_status))
        })?;
        Ok(DateEntry {
            date: row.date,
            order,
            complete_flag: row.complete,
            share_status,
        })
    }

    pub fn submission(&self, row: SubmissionRow) -> Submission {
        Submission {
            wish_status: self.parse_wish(&row.wish_status),
            raw_start: row.raw_start,
            raw_end: row.raw_end,
            note: row.note,
        }
    }
}

impl ReflectionRow {
    pub fn into_stored(self) -> Result<StoredReflection, StoreError> {
        let slots: Vec<Slot> = serde_json::from_str(&self.slots)
            .map_err(|e| malformed("reflection grid", format!("{}@{}: {e}", self.member_id, self.date)))?;
        let order = usize::try_from(self.position).map_err(|_| {
            malformed("member order", format!("{}: {}", self.member_id, self.position))
        })?;
        Ok(StoredReflection {
            member_id: MemberId::new(self.member_id),
            display_name: self.display_name,
            order,
            date: self.date,
            slots,
            note: self.note,
            start_label: self.start_label,
            end_label: self.end_label,
        })
    }
}
