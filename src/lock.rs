//! Per-member edit lock driven by the check flag.
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::directory::{DirectoryError, MemberDirectory};
use crate::model::{LockState, MemberFlag, MemberId};
use crate::store::{SheetStore, StoreError};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to lock {member_id}: {source}")]
    Lock {
        member_id: MemberId,
        #[source]
        source: StoreError,
    },
    #[error("failed to unlock {member_id}: {source}")]
    Unlock {
        member_id: MemberId,
        #[source]
        source: StoreError,
    },
    #[error("locked {member_id} but could not set the check flag: {source}")]
    CheckFlag {
        member_id: MemberId,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LockFailure {
    pub member_id: MemberId,
    pub member_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CheckSummary {
    pub checked: Vec<MemberId>,
    pub failed: Vec<LockFailure>,
}

impl CheckSummary {
    pub fn is_empty(&self) -> bool {
        self.checked.is_empty() && self.failed.is_empty()
    }
}

pub struct LockGate {
    store: Arc<dyn SheetStore>,
}

impl LockGate {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        Self { store }
    }

    /// Clears whatever lock is present, then applies a fresh one.
    #[instrument(skip_all, fields(member_id = %member_id))]
    pub async fn lock(&self, member_id: &MemberId) -> Result<LockState, LockError> {
        let lock_err = |source| LockError::Lock {
            member_id: member_id.clone(),
            source,
        };
        self.store.unlock(member_id).await.map_err(lock_err)?;
        self.store.lock(member_id).await.map_err(lock_err)?;
        info!("member locked");
        Ok(LockState::Locked)
    }

    #[instrument(skip_all, fields(member_id = %member_id))]
    pub async fn unlock(&self, member_id: &MemberId) -> Result<LockState, LockError> {
        self.store
            .unlock(member_id)
            .await
            .map_err(|source| LockError::Unlock {
                member_id: member_id.clone(),
                source,
            })?;
        info!("member unlocked");
        Ok(LockState::Unlocked)
    }

    /// The check-flag edit event: true locks, false unlocks.
    pub async fn on_check_flag_edited(
        &self,
        member_id: &MemberId,
        checked: bool,
    ) -> Result<LockState, LockError> {
        if checked {
            self.lock(member_id).await
        } else {
            self.unlock(member_id).await
        }
    }

    /// Lock every submitted-but-unchecked member and tick their check flag.
    /// A member whose lock fails stays unchecked; one whose check flag cannot
    /// be set is unlocked again. The rest carry on.
    #[instrument(skip_all)]
    pub async fn check_all_submitted(
        &self,
        directory: &mut MemberDirectory,
    ) -> Result<CheckSummary, LockError> {
        directory.load(true).await?;
        let targets: Vec<_> = directory
            .all()
            .iter()
            .filter(|m| m.is_awaiting_check())
            .cloned()
            .collect();

        let mut summary = CheckSummary::default();
        if targets.is_empty() {
            info!("no submitted members awaiting check");
            return Ok(summary);
        }

        for member in targets {
            let result = match self.lock(&member.id).await {
                Ok(_) => self
                    .store
                    .set_member_flag(&member.id, MemberFlag::Check(true))
                    .await
                    .map_err(|source| LockError::CheckFlag {
                        member_id: member.id.clone(),
                        source,
                    }),
                Err(err) => Err(err),
            };
            if let Err(LockError::CheckFlag { .. }) = result {
                // an unchecked member must not stay locked
                if let Err(unlock_err) = self.unlock(&member.id).await {
                    warn!(member_id = %member.id, %unlock_err, "member left locked without a check");
                }
            }
            match result {
                Ok(()) => summary.checked.push(member.id.clone()),
                Err(err) => {
                    warn!(member_id = %member.id, %err, "bulk check failed for member");
                    summary.failed.push(LockFailure {
                        member_id: member.id.clone(),
                        member_name: member.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            checked = summary.checked.len(),
            failed = summary.failed.len(),
            "bulk check finished"
        );
        Ok(summary)
    }
}
