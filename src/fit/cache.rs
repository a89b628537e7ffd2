//! Explicit memoization of pane fits.
//!
//! A fitted pane is only valid for one `(pane, p_low, p_high, fit_enabled)`
//! combination. `FitKey` captures that combination by value (thresholds are
//! compared bitwise), so a changed parameter can never hit a stale entry.

use std::collections::HashMap;

use log::debug;

use crate::domain::{Pane, PaneKey, Thresholds};

/// The caller-controlled inputs a fit depends on (besides the points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub thresholds: Thresholds,
    pub fit_enabled: bool,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            fit_enabled: true,
        }
    }
}

/// What a cached fit was computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaneId {
    Single(PaneKey),
    /// Union of several panes, in the order they were combined.
    Combined(Vec<PaneKey>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FitKey {
    pub pane: PaneId,
    p_low_bits: u64,
    p_high_bits: u64,
    pub fit_enabled: bool,
}

impl FitKey {
    pub fn new(pane: PaneId, params: FitParams) -> Self {
        Self {
            pane,
            p_low_bits: canonical_bits(params.thresholds.p_low),
            p_high_bits: canonical_bits(params.thresholds.p_high),
            fit_enabled: params.fit_enabled,
        }
    }

    fn matches(&self, params: FitParams) -> bool {
        self.p_low_bits == canonical_bits(params.thresholds.p_low)
            && self.p_high_bits == canonical_bits(params.thresholds.p_high)
            && self.fit_enabled == params.fit_enabled
    }
}

// -0.0 and 0.0 are the same threshold.
fn canonical_bits(p: f64) -> u64 {
    if p == 0.0 { 0.0f64.to_bits() } else { p.to_bits() }
}

#[derive(Debug, Clone, Default)]
pub struct FitCache {
    entries: HashMap<FitKey, Pane>,
    hits: usize,
    misses: usize,
}

impl FitCache {
    pub fn get(&mut self, key: &FitKey) -> Option<&Pane> {
        match self.entries.get(key) {
            Some(pane) => {
                self.hits += 1;
                debug!("fit cache hit: {:?}", key.pane);
                Some(pane)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: FitKey, pane: Pane) {
        self.entries.insert(key, pane);
    }

    /// Drop every entry computed for other parameters.
    pub fn retain_params(&mut self, params: FitParams) {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.matches(params));
        debug!("fit cache evicted {} stale entries", before - self.entries.len());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
