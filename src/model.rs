use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable member identifier (`usr_xxxxxx`). Generated once, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random candidate. Callers still check it against every id
    /// ever issued.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("usr_{}", &raw[..6]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubmitStatus {
    Submitted,
    NotSubmitted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReflectStatus {
    Reflected,
    NotReflected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShareStatus {
    Shared,
    NotShared,
}

/// The member's overall wish for one date: a time window, or "not available".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WishStatus {
    Available,
    Unavailable,
}

/// One cell of an availability grid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Slot {
    Available,
    Unavailable,
}

impl Slot {
    pub fn is_available(self) -> bool {
        matches!(self, Slot::Available)
    }

    pub fn as_char(self) -> char {
        match self {
            Slot::Available => 'o',
            Slot::Unavailable => '.',
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
}

/// A status field on a member row that the engine is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFlag {
    Submit(SubmitStatus),
    Check(bool),
    Reflect(ReflectStatus),
}

impl MemberFlag {
    pub fn field_name(&self) -> &'static str {
        match self {
            MemberFlag::Submit(_) => "submit_status",
            MemberFlag::Check(_) => "check_flag",
            MemberFlag::Reflect(_) => "reflect_status",
        }
    }
}

/// A status field on a schedule date row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFlag {
    Complete(bool),
    Share(ShareStatus),
}

impl DateFlag {
    pub fn field_name(&self) -> &'static str {
        match self {
            DateFlag::Complete(_) => "complete",
            DateFlag::Share(_) => "share_status",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub display_name: String,
    /// Dense 0-based roster position; decides column placement downstream.
    pub order: usize,
    pub submit_status: SubmitStatus,
    pub check_flag: bool,
    pub reflect_status: ReflectStatus,
    /// Handle to the member's personal submission store, if one exists.
    pub sheet_ref: Option<String>,
}

impl Member {
    /// Submitted, checked by an admin, and not yet reflected.
    pub fn is_eligible_for_reflection(&self) -> bool {
        self.submit_status == SubmitStatus::Submitted
            && self.check_flag
            && self.reflect_status == ReflectStatus::NotReflected
    }

    /// Submitted but not yet checked; the bulk check picks these up.
    pub fn is_awaiting_check(&self) -> bool {
        self.submit_status == SubmitStatus::Submitted && !self.check_flag
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateEntry {
    pub date: NaiveDate,
    pub order: usize,
    pub complete_flag: bool,
    pub share_status: ShareStatus,
}

impl DateEntry {
    /// Finished by the admin and not yet handed out.
    pub fn is_ready_to_share(&self) -> bool {
        self.complete_flag && self.share_status == ShareStatus::NotShared
    }
}

/// What a member entered on their personal form for one date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub wish_status: WishStatus,
    pub raw_start: Option<String>,
    pub raw_end: Option<String>,
    pub note: String,
}

impl Submission {
    /// The row used when a member has nothing recorded for a date.
    pub fn missing() -> Self {
        Self {
            wish_status: WishStatus::Unavailable,
            raw_start: None,
            raw_end: None,
            note: String::new(),
        }
    }
}

/// Output of one (member, date) reflection. Lives only for the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReflectionRecord {
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub grid: Vec<Slot>,
    pub note: String,
    pub start_label: String,
    pub end_label: String,
}
