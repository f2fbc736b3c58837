use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, instrument};

use super::model::{StatusLabels, StoredReflection};
use super::repo::{self, Pool};
use crate::model::{
    DateEntry, DateFlag, Member, MemberFlag, MemberId, ReflectionRecord, Submission,
};
use crate::store::{SheetStore, StoreError};

/// Database errors surface as `Unavailable`: the engine treats them like a
/// spreadsheet that could not be reached.
fn unavailable(err: anyhow::Error) -> StoreError {
    StoreError::Unavailable(format!("{err:#}"))
}

#[derive(Clone)]
pub struct SqliteSheetStore {
    pool: Pool,
    labels: StatusLabels,
}

impl SqliteSheetStore {
    pub fn new(pool: Pool, labels: StatusLabels) -> Self {
        Self { pool, labels }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn labels(&self) -> &StatusLabels {
        &self.labels
    }

    pub async fn read_reflections(&self, date: NaiveDate) -> Result<Vec<StoredReflection>, StoreError> {
        repo::fetch_reflections(&self.pool, date)
            .await
            .map_err(unavailable)?
            .into_iter()
            .map(|row| row.into_stored())
            .collect()
    }

    pub async fn is_locked(&self, member_id: &MemberId) -> Result<bool, StoreError> {
        let row = repo::fetch_member(&self.pool, member_id)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| StoreError::member_not_found(member_id))?;
        Ok(row.locked)
    }

    async fn set_locked(&self, member_id: &MemberId, locked: bool) -> Result<(), StoreError> {
        let found = repo::set_locked(&self.pool, member_id, locked)
            .await
            .map_err(unavailable)?;
        if !found {
            return Err(StoreError::member_not_found(member_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SheetStore for SqliteSheetStore {
    #[instrument(skip_all)]
    async fn read_member_roster(&self) -> Result<Vec<Member>, StoreError> {
        let rows = repo::fetch_members(&self.pool).await.map_err(unavailable)?;
        debug!(rows = rows.len(), "roster rows read");
        rows.into_iter().map(|row| self.labels.member(row)).collect()
    }

    async fn read_date_list(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let rows = repo::fetch_dates(&self.pool).await.map_err(unavailable)?;
        Ok(rows.into_iter().map(|row| row.date).collect())
    }

    async fn read_date_entries(&self) -> Result<Vec<DateEntry>, StoreError> {
        repo::fetch_dates(&self.pool)
            .await
            .map_err(unavailable)?
            .into_iter()
            .enumerate()
            .map(|(order, row)| self.labels.date_entry(order, row))
            .collect()
    }

    async fn set_date_flag(&self, date: NaiveDate, flag: DateFlag) -> Result<(), StoreError> {
        let found = repo::update_date_flag(&self.pool, &self.labels, date, flag)
            .await
            .map_err(unavailable)?;
        if !found {
            return Err(StoreError::date_not_found(date));
        }
        Ok(())
    }

    async fn read_submission(
        &self,
        member_id: &MemberId,
        date: NaiveDate,
    ) -> Result<Option<Submission>, StoreError> {
        let row = repo::fetch_submission(&self.pool, member_id, date)
            .await
            .map_err(unavailable)?;
        Ok(row.map(|row| self.labels.submission(row)))
    }

    async fn write_reflection(&self, record: &ReflectionRecord) -> Result<(), StoreError> {
        repo::upsert_reflection(&self.pool, record)
            .await
            .map_err(unavailable)
    }

    async fn set_member_flag(&self, member_id: &MemberId, flag: MemberFlag) -> Result<(), StoreError> {
        let found = repo::update_member_flag(&self.pool, &self.labels, member_id, flag)
            .await
            .map_err(unavailable)?;
        if !found {
            return Err(StoreError::member_not_found(member_id));
        }
        Ok(())
    }

    async fn lock(&self, member_id: &MemberId) -> Result<(), StoreError> {
        self.set_locked(member_id, true).await
    }

    /// A member with no lock is simply left unlocked.
    async fn unlock(&self, member_id: &MemberId) -> Result<(), StoreError> {
        self.set_locked(member_id, false).await
    }
}
