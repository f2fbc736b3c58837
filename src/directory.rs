//! Cached roster with id/name/order lookups.
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::clock::{CacheEntry, Clock};
use crate::model::{Member, MemberId};
use crate::store::{SheetStore, StoreError};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("member roster unreadable: {0}")]
    Unreadable(#[from] StoreError),
    #[error("member roster is empty")]
    Empty,
    #[error("member roster row {order} has a blank id or name")]
    BlankRow { order: usize },
    #[error("duplicate member id {0}")]
    DuplicateId(MemberId),
    #[error("duplicate member name {0}")]
    DuplicateName(String),
    #[error("member orders are not a dense 0-based sequence (expected {expected}, found {found})")]
    OrderGap { expected: usize, found: usize },
}

#[derive(Debug, Clone)]
struct Roster {
    members: Vec<Member>,
    by_id: HashMap<MemberId, usize>,
    by_name: HashMap<String, MemberId>,
}

impl Roster {
    fn build(mut members: Vec<Member>) -> Result<Self, DirectoryError> {
        if members.is_empty() {
            return Err(DirectoryError::Empty);
        }
        members.sort_by_key(|m| m.order);

        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        for (expected, m) in members.iter().enumerate() {
            if m.order != expected {
                return Err(DirectoryError::OrderGap {
                    expected,
                    found: m.order,
                });
            }
            if m.id.as_str().trim().is_empty() || m.name.trim().is_empty() {
                return Err(DirectoryError::BlankRow { order: m.order });
            }
            if !seen.insert(m.id.clone()) {
                return Err(DirectoryError::DuplicateId(m.id.clone()));
            }
            if !names.insert(m.name.as_str()) {
                return Err(DirectoryError::DuplicateName(m.name.clone()));
            }
        }

        let by_id = members
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        let by_name = members
            .iter()
            .map(|m| (m.name.clone(), m.id.clone()))
            .collect();
        Ok(Self {
            members,
            by_id,
            by_name,
        })
    }
}

/// Reads the roster through the store and keeps it for a freshness window.
///
/// A failed load clears the cache; lookups then miss until a load succeeds.
pub struct MemberDirectory {
    store: Arc<dyn SheetStore>,
    clock: Arc<dyn Clock>,
    freshness: Duration,
    cache: Option<CacheEntry<Roster>>,
}

impl MemberDirectory {
    pub fn new(store: Arc<dyn SheetStore>, clock: Arc<dyn Clock>, freshness: Duration) -> Self {
        Self {
            store,
            clock,
            freshness,
            cache: None,
        }
    }

    #[instrument(skip(self))]
    pub async fn load(&mut self, force_refresh: bool) -> Result<(), DirectoryError> {
        let now = self.clock.now();
        if !force_refresh {
            if let Some(entry) = &self.cache {
                if entry.is_fresh(now) {
                    debug!("member directory cache hit");
                    return Ok(());
                }
            }
        }

        let result = match self.store.read_member_roster().await {
            Ok(rows) => Roster::build(rows),
            Err(err) => Err(DirectoryError::from(err)),
        };
        match result {
            Ok(roster) => {
                info!(members = roster.members.len(), "member directory loaded");
                self.cache = Some(CacheEntry::new(roster, now, self.freshness));
                Ok(())
            }
            Err(err) => {
                warn!(%err, "member directory load failed; cache cleared");
                self.cache = None;
                Err(err)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    fn roster(&self) -> Option<&Roster> {
        self.cache.as_ref().map(|e| &e.value)
    }

    pub fn get_by_id(&self, id: &MemberId) -> Option<&Member> {
        let roster = self.roster()?;
        roster.by_id.get(id).map(|&i| &roster.members[i])
    }

    pub fn get_id_by_name(&self, name: &str) -> Option<&MemberId> {
        self.roster()?.by_name.get(name)
    }

    pub fn get_order(&self, id: &MemberId) -> Option<usize> {
        self.get_by_id(id).map(|m| m.order)
    }

    /// Accepts either an id or a name.
    pub fn resolve(&self, key: &str) -> Option<&Member> {
        let id = MemberId::from(key);
        self.get_by_id(&id).or_else(|| {
            let id = self.get_id_by_name(key)?.clone();
            self.get_by_id(&id)
        })
    }

    /// Members by `order`; empty when not loaded.
    pub fn all(&self) -> &[Member] {
        self.roster().map(|r| r.members.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }
}
