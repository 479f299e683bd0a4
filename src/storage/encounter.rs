//! Wallet id → encounter date records

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::models::WalletToEncounterDateLink;
use crate::wallet_id::BritWalletId;
use crate::{BritError, Result};

/// Keyed store of [`WalletToEncounterDateLink`] records
///
/// Implementations do their own locking; the Matcher shares one store between
/// concurrent requests.
pub trait EncounterDateStore: Send + Sync {
    fn load(&self, wallet_id: &BritWalletId) -> Result<Option<WalletToEncounterDateLink>>;

    /// Insert or replace the record for `link.wallet_id`
    fn save(&self, link: &WalletToEncounterDateLink) -> Result<()>;

    /// Store `link` only if its wallet id has no record yet
    ///
    /// Atomic with respect to other callers: of several concurrent inserts for one
    /// wallet id exactly one returns `true`.
    fn insert_if_absent(&self, link: &WalletToEncounterDateLink) -> Result<bool>;
}

/// In-memory store, for a Matcher without persistence and for tests
///
/// Records are kept in their serialized line form so both stores share one
/// encoding path.
#[derive(Debug, Default)]
pub struct MemoryEncounterStore {
    lines: Mutex<HashMap<BritWalletId, String>>,
}

impl MemoryEncounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EncounterDateStore for MemoryEncounterStore {
    fn load(&self, wallet_id: &BritWalletId) -> Result<Option<WalletToEncounterDateLink>> {
        let lines = self
            .lines
            .lock()
            .map_err(|_| BritError::matcher_store("encounter store lock poisoned"))?;
        lines
            .get(wallet_id)
            .map(|line| WalletToEncounterDateLink::parse(line))
            .transpose()
    }

    fn save(&self, link: &WalletToEncounterDateLink) -> Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| BritError::matcher_store("encounter store lock poisoned"))?;
        lines.insert(link.wallet_id, link.serialize());
        Ok(())
    }

    fn insert_if_absent(&self, link: &WalletToEncounterDateLink) -> Result<bool> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| BritError::matcher_store("encounter store lock poisoned"))?;
        match lines.entry(link.wallet_id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(link.serialize());
                Ok(true)
            }
        }
    }
}
