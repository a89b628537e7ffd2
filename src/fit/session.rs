//! A dataset plus its fit cache.
//!
//! The dataset is aggregated once; fits are recomputed only when the
//! parameters (`p_low`, `p_high`, fit enabled) change. Panes are independent,
//! so cache misses are fitted in parallel.

use log::info;
use rayon::prelude::*;

use crate::chart::dataset::{COMBINED_LABEL, Dataset};
use crate::domain::{DataPoint, Pane, PaneKey};
use crate::fit::cache::{FitCache, FitKey, FitParams, PaneId};
use crate::fit::classifier::{apply_regimes, classify_by_mean};
use crate::fit::fitter::{fit_pane, refine};

/// Fit (or just classify, when fitting is disabled) one pane's points.
///
/// Pure: the result depends only on `points` and `params`.
pub fn fit_points(key: &PaneKey, points: &[DataPoint], params: FitParams) -> Pane {
    if !params.fit_enabled {
        let regimes = classify_by_mean(points, params.thresholds);
        return Pane::new(key.clone(), apply_regimes(points, &regimes));
    }
    let fitted = fit_pane(points, params.thresholds);
    Pane {
        key: key.clone(),
        points: fitted.points,
        fit: Some(fitted.result),
    }
}

/// Like `fit_points`, but iterate from the classification the points carry.
pub fn refine_points(key: &PaneKey, points: &[DataPoint], params: FitParams) -> Pane {
    if !params.fit_enabled {
        return Pane::new(key.clone(), points.to_vec());
    }
    let fitted = refine(points, params.thresholds);
    Pane {
        key: key.clone(),
        points: fitted.points,
        fit: Some(fitted.result),
    }
}

#[derive(Debug, Clone)]
pub struct FitSession {
    dataset: Dataset,
    params: FitParams,
    cache: FitCache,
}

impl FitSession {
    pub fn new(dataset: Dataset, params: FitParams) -> Self {
        Self {
            dataset,
            params,
            cache: FitCache::default(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn params(&self) -> FitParams {
        self.params
    }

    pub fn cache(&self) -> &FitCache {
        &self.cache
    }

    /// Change parameters; entries for the old parameters are evicted.
    pub fn set_params(&mut self, params: FitParams) {
        if params != self.params {
            self.params = params;
            self.cache.retain_params(params);
        }
    }

    /// Every pane in grid order, fitted for the current parameters.
    pub fn fitted_panes(&mut self) -> Vec<Pane> {
        let keys = self.dataset.ordered_keys();
        let params = self.params;

        let mut slots: Vec<Option<Pane>> = Vec::with_capacity(keys.len());
        let mut missing = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let cache_key = FitKey::new(PaneId::Single(key.clone()), params);
            let cached = self.cache.get(&cache_key).cloned();
            if cached.is_none() {
                missing.push(i);
            }
            slots.push(cached);
        }

        let dataset = &self.dataset;
        let computed: Vec<(usize, Pane)> = missing
            .par_iter()
            .map(|&i| {
                let points = dataset.points(&keys[i]).unwrap_or_default();
                (i, fit_points(&keys[i], points, params))
            })
            .collect();

        info!(
            "fitted {} pane(s), {} from cache",
            keys.len(),
            keys.len() - computed.len()
        );

        for (i, pane) in computed {
            self.cache
                .insert(FitKey::new(PaneId::Single(keys[i].clone()), params), pane.clone());
            slots[i] = Some(pane);
        }
        slots.into_iter().flatten().collect()
    }

    /// The union of `keys` fitted as one pane. `None` when no points match.
    pub fn combined_pane(&mut self, keys: &[PaneKey]) -> Option<Pane> {
        let points = self.dataset.combined_points(keys);
        if points.is_empty() {
            return None;
        }
        let cache_key = FitKey::new(PaneId::Combined(keys.to_vec()), self.params);
        if let Some(pane) = self.cache.get(&cache_key) {
            return Some(pane.clone());
        }
        let pane = fit_points(&combined_key(), &points, self.params);
        info!("fitted combined pane over {} pane(s), {} points", keys.len(), points.len());
        self.cache.insert(cache_key, pane.clone());
        Some(pane)
    }
}

pub fn combined_key() -> PaneKey {
    PaneKey::new(COMBINED_LABEL, COMBINED_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::generate_records;
    use crate::domain::{SampleConfig, Thresholds};
    use crate::fit::fitter::MIN_POINTS;

    fn session() -> FitSession {
        let records = generate_records(&SampleConfig::default()).unwrap();
        let dataset = Dataset::from_records(&records).unwrap();
        FitSession::new(dataset, FitParams::default())
    }

    #[test]
    fn fits_every_pane_and_caches() {
        let mut s = session();
        let first = s.fitted_panes();
        assert_eq!(first.len(), 4);
        assert!(first.iter().all(|p| p.fit.is_some()));
        assert_eq!(first[0].key, PaneKey::new("A", "Control"));
        assert_eq!(s.cache().misses(), 4);

        let second = s.fitted_panes();
        assert_eq!(first, second);
        assert_eq!(s.cache().hits(), 4);
    }

    #[test]
    fn changing_params_invalidates() {
        let mut s = session();
        let before = s.fitted_panes();
        s.set_params(FitParams {
            thresholds: Thresholds::new(0.2, 0.8).unwrap(),
            fit_enabled: true,
        });
        assert!(s.cache().is_empty());
        let after = s.fitted_panes();
        assert_eq!(after.len(), before.len());
        assert_eq!(s.cache().len(), 4);

        // Same params again: no eviction.
        s.set_params(s.params());
        assert_eq!(s.cache().len(), 4);
    }

    #[test]
    fn disabled_fit_keeps_points_without_results() {
        let mut s = session();
        s.set_params(FitParams {
            thresholds: Thresholds::default(),
            fit_enabled: false,
        });
        let panes = s.fitted_panes();
        assert!(panes.iter().all(|p| p.fit.is_none()));
        assert!(panes.iter().all(|p| p.low_count() > 0 && p.high_count() > 0));
    }

    #[test]
    fn combined_pane_is_refit_over_the_union() {
        let mut s = session();
        let keys = s.dataset().ordered_keys();
        let combined = s.combined_pane(&keys).unwrap();
        assert_eq!(combined.key, combined_key());
        assert_eq!(combined.points.len(), s.dataset().point_count());
        assert!(combined.points.iter().any(|p| p.origin == keys[3]));

        let direct = fit_pane(&s.dataset().combined_points(&keys), s.params().thresholds);
        assert_eq!(combined.fit.as_ref(), Some(&direct.result));

        assert!(s.combined_pane(&[PaneKey::new("Z", "Z")]).is_none());
    }

    #[test]
    fn refining_fitted_panes_keeps_components() {
        let mut s = session();
        for pane in s.fitted_panes() {
            let again = refine_points(&pane.key, &pane.points, s.params());
            let (Some(a), Some(b)) = (pane.fit.as_ref(), again.fit.as_ref()) else {
                panic!("both fits present");
            };
            if a.converged {
                assert_eq!(b.iterations, 1);
                assert_eq!(a.components, b.components);
            }
        }

        let off = FitParams {
            thresholds: Thresholds::default(),
            fit_enabled: false,
        };
        let panes = s.fitted_panes();
        let pane = &panes[0];
        assert_eq!(refine_points(&pane.key, &pane.points, off).points, pane.points);
    }

    #[test]
    fn small_panes_are_displayable_without_fit() {
        let key = PaneKey::new("A", "Control");
        let records = generate_records(&SampleConfig::default()).unwrap();
        let dataset = Dataset::from_records(&records).unwrap();
        let points = &dataset.points(&key).unwrap()[..MIN_POINTS - 1];
        let pane = fit_points(&key, points, FitParams::default());
        let fit = pane.fit.unwrap();
        assert!(!fit.converged);
        assert_eq!(pane.points.len(), 2);
    }
}
