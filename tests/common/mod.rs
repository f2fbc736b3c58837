#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use shift_reflect::availability::{GridBuilder, WindowParser};
use shift_reflect::model::{
    DateEntry, DateFlag, Member, MemberFlag, MemberId, ReflectStatus, ReflectionRecord,
    ShareStatus, SubmitStatus, Submission, WishStatus,
};
use shift_reflect::store::{SheetStore, StoreError};
use shift_reflect::timegrid::TimeGrid;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Store calls that can be told to fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fail {
    Roster,
    DateList,
    Submission(MemberId, NaiveDate),
    Write(MemberId, NaiveDate),
    Flag(MemberId),
    Lock(MemberId),
    Unlock(MemberId),
    DateFlag(NaiveDate),
}

#[derive(Default)]
struct State {
    roster: Vec<Member>,
    dates: Vec<NaiveDate>,
    /// `(complete, share)` per date; absent means `(false, NotShared)`.
    date_flags: HashMap<NaiveDate, (bool, ShareStatus)>,
    submissions: HashMap<(MemberId, NaiveDate), Submission>,
    written: Vec<ReflectionRecord>,
    flags: Vec<(MemberId, MemberFlag)>,
    locked: HashSet<MemberId>,
    lock_calls: Vec<(MemberId, bool)>,
    roster_reads: usize,
    failures: HashSet<Fail>,
}

/// In-memory `SheetStore` that records every write and applies flag changes
/// to its roster.
#[derive(Clone, Default)]
pub struct FakeSheet {
    state: Arc<Mutex<State>>,
}

impl FakeSheet {
    pub fn new(roster: Vec<Member>, dates: Vec<NaiveDate>) -> Self {
        let sheet = Self::default();
        {
            let mut state = sheet.state.try_lock().unwrap();
            state.roster = roster;
            state.dates = dates;
        }
        sheet
    }

    pub fn shared(&self) -> Arc<dyn SheetStore> {
        Arc::new(self.clone())
    }

    pub async fn fail(&self, f: Fail) {
        self.state.lock().await.failures.insert(f);
    }

    pub async fn heal(&self, f: &Fail) {
        self.state.lock().await.failures.remove(f);
    }

    pub async fn set_roster(&self, roster: Vec<Member>) {
        self.state.lock().await.roster = roster;
    }

    pub async fn submit(&self, id: &MemberId, date: NaiveDate, submission: Submission) {
        self.state
            .lock()
            .await
            .submissions
            .insert((id.clone(), date), submission);
    }

    pub async fn written(&self) -> Vec<ReflectionRecord> {
        self.state.lock().await.written.clone()
    }

    pub async fn flags(&self) -> Vec<(MemberId, MemberFlag)> {
        self.state.lock().await.flags.clone()
    }

    pub async fn member(&self, id: &MemberId) -> Option<Member> {
        self.state
            .lock()
            .await
            .roster
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    pub async fn is_locked(&self, id: &MemberId) -> bool {
        self.state.lock().await.locked.contains(id)
    }

    /// `(member, true)` for lock, `(member, false)` for unlock, in call order.
    pub async fn lock_calls(&self) -> Vec<(MemberId, bool)> {
        self.state.lock().await.lock_calls.clone()
    }

    pub async fn roster_reads(&self) -> usize {
        self.state.lock().await.roster_reads
    }

    pub async fn complete(&self, date: NaiveDate) {
        self.state
            .lock()
            .await
            .date_flags
            .entry(date)
            .or_insert((false, ShareStatus::NotShared))
            .0 = true;
    }

    pub async fn date_state(&self, date: NaiveDate) -> (bool, ShareStatus) {
        self.state
            .lock()
            .await
            .date_flags
            .get(&date)
            .copied()
            .unwrap_or((false, ShareStatus::NotShared))
    }
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {what} failure"))
}

#[async_trait]
impl SheetStore for FakeSheet {
    async fn read_member_roster(&self) -> Result<Vec<Member>, StoreError> {
        let mut state = self.state.lock().await;
        state.roster_reads += 1;
        if state.failures.contains(&Fail::Roster) {
            return Err(injected("roster"));
        }
        Ok(state.roster.clone())
    }

    async fn read_date_list(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let state = self.state.lock().await;
        if state.failures.contains(&Fail::DateList) {
            return Err(injected("date list"));
        }
        Ok(state.dates.clone())
    }

    async fn read_date_entries(&self) -> Result<Vec<DateEntry>, StoreError> {
        let state = self.state.lock().await;
        if state.failures.contains(&Fail::DateList) {
            return Err(injected("date list"));
        }
        Ok(state
            .dates
            .iter()
            .enumerate()
            .map(|(order, date)| {
                let (complete_flag, share_status) = state
                    .date_flags
                    .get(date)
                    .copied()
                    .unwrap_or((false, ShareStatus::NotShared));
                DateEntry {
                    date: *date,
                    order,
                    complete_flag,
                    share_status,
                }
            })
            .collect())
    }

    async fn set_date_flag(&self, date: NaiveDate, flag: DateFlag) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.failures.contains(&Fail::DateFlag(date)) {
            return Err(injected("date flag"));
        }
        if !state.dates.contains(&date) {
            return Err(StoreError::date_not_found(date));
        }
        let entry = state
            .date_flags
            .entry(date)
            .or_insert((false, ShareStatus::NotShared));
        match flag {
            DateFlag::Complete(c) => entry.0 = c,
            DateFlag::Share(s) => entry.1 = s,
        }
        Ok(())
    }

    async fn read_submission(
        &self,
        member_id: &MemberId,
        date: NaiveDate,
    ) -> Result<Option<Submission>, StoreError> {
        let state = self.state.lock().await;
        if state
            .failures
            .contains(&Fail::Submission(member_id.clone(), date))
        {
            return Err(injected("submission"));
        }
        Ok(state.submissions.get(&(member_id.clone(), date)).cloned())
    }

    async fn write_reflection(&self, record: &ReflectionRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state
            .failures
            .contains(&Fail::Write(record.member_id.clone(), record.date))
        {
            return Err(injected("write"));
        }
        state
            .written
            .retain(|r| !(r.member_id == record.member_id && r.date == record.date));
        state.written.push(record.clone());
        Ok(())
    }

    async fn set_member_flag(&self, member_id: &MemberId, flag: MemberFlag) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.failures.contains(&Fail::Flag(member_id.clone())) {
            return Err(injected("flag"));
        }
        let member = state
            .roster
            .iter_mut()
            .find(|m| &m.id == member_id)
            .ok_or_else(|| StoreError::member_not_found(member_id))?;
        match flag {
            MemberFlag::Submit(s) => member.submit_status = s,
            MemberFlag::Check(c) => member.check_flag = c,
            MemberFlag::Reflect(r) => member.reflect_status = r,
        }
        state.flags.push((member_id.clone(), flag));
        Ok(())
    }

    async fn lock(&self, member_id: &MemberId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.lock_calls.push((member_id.clone(), true));
        if state.failures.contains(&Fail::Lock(member_id.clone())) {
            return Err(injected("lock"));
        }
        state.locked.insert(member_id.clone());
        Ok(())
    }

    async fn unlock(&self, member_id: &MemberId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.lock_calls.push((member_id.clone(), false));
        if state.failures.contains(&Fail::Unlock(member_id.clone())) {
            return Err(injected("unlock"));
        }
        state.locked.remove(member_id);
        Ok(())
    }
}

pub fn id(n: usize) -> MemberId {
    MemberId::new(format!("usr_{n:06}"))
}

pub fn member(order: usize, submit: SubmitStatus, check: bool, reflect: ReflectStatus) -> Member {
    Member {
        id: id(order),
        name: format!("member{order}"),
        display_name: format!("Member {order}"),
        order,
        submit_status: submit,
        check_flag: check,
        reflect_status: reflect,
        sheet_ref: None,
    }
}

/// Submitted, checked, not yet reflected.
pub fn eligible(order: usize) -> Member {
    member(order, SubmitStatus::Submitted, true, ReflectStatus::NotReflected)
}

pub fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, d).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn available(start: &str, end: &str, note: &str) -> Submission {
    Submission {
        wish_status: WishStatus::Available,
        raw_start: Some(start.to_string()),
        raw_end: Some(end.to_string()),
        note: note.to_string(),
    }
}

/// 8:00..22:00 in 30-minute slots, defaults 8:00-22:00.
pub fn builder() -> GridBuilder {
    let grid = TimeGrid::new(hm(8, 0), hm(22, 0), 30).unwrap();
    GridBuilder::new(grid, hm(8, 0), hm(22, 0))
}

pub fn parser() -> WindowParser {
    WindowParser::new(["指定なし"])
}
