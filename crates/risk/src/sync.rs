//! Per-market lock table for services that share a controller's markets
//! across threads.
//!
//! Operations touching several markets lock them in ascending `MarketId`
//! order, so two such operations can never wait on each other in a cycle.

use bankerjoe_core::MarketId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{JoeError, JoeResult};

#[derive(Debug, Default)]
pub struct MarketLocks {
    locks: BTreeMap<MarketId, RwLock<()>>,
}

impl MarketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lock for `market`; registering twice keeps the existing lock
    pub fn register(&mut self, market: MarketId) {
        self.locks.entry(market).or_default();
    }

    pub fn contains(&self, market: &MarketId) -> bool {
        self.locks.contains_key(market)
    }

    /// Sorted, deduplicated lock list; unknown markets fail before anything
    /// is locked
    fn ordered<'a>(&'a self, markets: &[MarketId]) -> JoeResult<Vec<&'a RwLock<()>>> {
        let ids: BTreeSet<&MarketId> = markets.iter().collect();
        ids.into_iter()
            .map(|id| {
                self.locks
                    .get(id)
                    .ok_or_else(|| JoeError::MarketNotListed(id.clone()))
            })
            .collect()
    }

    /// Exclusive access to every market in `markets`
    pub fn write_many(&self, markets: &[MarketId]) -> JoeResult<Vec<RwLockWriteGuard<'_, ()>>> {
        Ok(self
            .ordered(markets)?
            .into_iter()
            .map(|lock| lock.write().unwrap_or_else(PoisonError::into_inner))
            .collect())
    }

    /// Shared access to every market in `markets`, e.g. for a liquidity query
    pub fn read_many(&self, markets: &[MarketId]) -> JoeResult<Vec<RwLockReadGuard<'_, ()>>> {
        Ok(self
            .ordered(markets)?
            .into_iter()
            .map(|lock| lock.read().unwrap_or_else(PoisonError::into_inner))
            .collect())
    }
}
