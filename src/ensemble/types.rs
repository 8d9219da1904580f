//! The ensemble: one member of the GA population.

use crate::error::{FitError, Result};
use crate::optimize::OptStatus;
use crate::plugin::PluginData;
use crate::target::Target;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Ratio-optimization cache state of one (ensemble, target) pair.
///
/// Replaces a bare "optimized" flag: composition changes and bootstrap
/// resampling set [`Stale`](CacheState::Stale) explicitly, and only
/// [`Converged`](CacheState::Converged) pairs are skipped by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CacheState {
    /// Ratios and fitness must be recomputed.
    #[default]
    Stale,
    /// The last optimization converged; ratios and fitness are current.
    Converged,
    /// The last optimization ended with a non-success status; retry.
    Failed,
}

impl CacheState {
    pub fn needs_optimization(self) -> bool {
        !matches!(self, CacheState::Converged)
    }
}

/// How initial ensembles are filled with components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillMode {
    /// Each position draws a component uniformly at random (with replacement).
    #[default]
    Random,
    /// Components are dealt in pool order, continuing from ensemble to
    /// ensemble, so every component is represented as evenly as possible.
    Uniform,
}

/// A weighted mixture over a fixed-size multiset of components.
///
/// Per target, the ensemble owns a ratio vector (same length as the
/// composition, non-negative, summing to one after every optimization),
/// per-restraint-type fitness, the optimizer cache state and status, and
/// plugin-owned state per restraint type.
///
/// Composition can only be changed through methods that invalidate every
/// target's cached ratios and fitness.
#[derive(Debug, Clone)]
pub struct Ensemble {
    component_names: Vec<String>,
    ratios: BTreeMap<String, Vec<f64>>,
    fitness: BTreeMap<String, BTreeMap<String, f64>>,
    cache: BTreeMap<String, CacheState>,
    opt_status: BTreeMap<String, OptStatus>,
    plugin_data: BTreeMap<String, BTreeMap<String, PluginData>>,
}

impl Ensemble {
    /// Creates an ensemble with uniform ratios and stale caches for every
    /// target.
    pub fn new(targets: &[Target], component_names: Vec<String>) -> Self {
        let size = component_names.len();
        let uniform = uniform_ratios(size);

        let mut ratios = BTreeMap::new();
        let mut cache = BTreeMap::new();
        let mut plugin_data = BTreeMap::new();
        for target in targets {
            ratios.insert(target.name.clone(), uniform.clone());
            cache.insert(target.name.clone(), CacheState::Stale);
            let slots: BTreeMap<String, PluginData> = target
                .restraint_types()
                .into_iter()
                .map(|kind| (kind.to_string(), PluginData::empty()))
                .collect();
            plugin_data.insert(target.name.clone(), slots);
        }

        Self {
            component_names,
            ratios,
            fitness: BTreeMap::new(),
            cache,
            opt_status: BTreeMap::new(),
            plugin_data,
        }
    }

    /// Creates an ensemble of `size` components drawn at random from `pool`.
    pub fn random<R: Rng>(targets: &[Target], size: usize, pool: &[String], rng: &mut R) -> Self {
        let names = (0..size)
            .filter_map(|_| pool.choose(&mut *rng).cloned())
            .collect();
        Self::new(targets, names)
    }

    /// Creates the `index`-th ensemble of a uniformly dealt population.
    pub fn uniform(targets: &[Target], index: usize, size: usize, pool: &[String]) -> Self {
        let names = if pool.is_empty() {
            Vec::new()
        } else {
            (0..size)
                .map(|j| pool[(index * size + j) % pool.len()].clone())
                .collect()
        };
        Self::new(targets, names)
    }

    pub fn size(&self) -> usize {
        self.component_names.len()
    }

    pub fn component_names(&self) -> &[String] {
        &self.component_names
    }

    /// The set of distinct components, ignoring order and multiplicity.
    pub fn component_set(&self) -> BTreeSet<&str> {
        self.component_names.iter().map(String::as_str).collect()
    }

    /// Replaces the component at `position`. Returns `true` (and
    /// invalidates every target) if the name actually changed.
    pub fn replace_component(&mut self, position: usize, name: &str) -> bool {
        match self.component_names.get_mut(position) {
            Some(slot) if *slot != name => {
                *slot = name.to_string();
                self.invalidate();
                true
            }
            _ => false,
        }
    }

    /// Swaps the components in `range` with `other`'s. Both ensembles are
    /// invalidated if either composition changed. Returns whether anything
    /// changed.
    pub fn exchange_components(&mut self, other: &mut Ensemble, range: Range<usize>) -> bool {
        let end = range.end.min(self.size()).min(other.size());
        let start = range.start.min(end);

        let mut changed = false;
        for i in start..end {
            if self.component_names[i] != other.component_names[i] {
                std::mem::swap(&mut self.component_names[i], &mut other.component_names[i]);
                changed = true;
            }
        }
        if changed {
            self.invalidate();
            other.invalidate();
        }
        changed
    }

    pub fn ratios(&self, target: &str) -> Option<&[f64]> {
        self.ratios.get(target).map(Vec::as_slice)
    }

    pub(crate) fn set_ratios(&mut self, target: &str, ratios: Vec<f64>) {
        self.ratios.insert(target.to_string(), ratios);
    }

    /// Per-restraint-type fitness for `target`, if scored.
    pub fn fitness(&self, target: &str) -> Option<&BTreeMap<String, f64>> {
        self.fitness.get(target)
    }

    /// Sum of the restraint-type fitness values for `target`.
    pub fn total_fitness(&self, target: &str) -> Option<f64> {
        self.fitness.get(target).map(|scores| scores.values().sum())
    }

    pub(crate) fn set_fitness(&mut self, target: &str, scores: BTreeMap<String, f64>) {
        self.fitness.insert(target.to_string(), scores);
    }

    pub fn cache_state(&self, target: &str) -> CacheState {
        self.cache.get(target).copied().unwrap_or_default()
    }

    pub(crate) fn set_cache_state(&mut self, target: &str, state: CacheState) {
        self.cache.insert(target.to_string(), state);
    }

    /// Last optimizer status for `target`, if an optimization has run.
    pub fn opt_status(&self, target: &str) -> Option<OptStatus> {
        self.opt_status.get(target).copied()
    }

    pub(crate) fn set_opt_status(&mut self, target: &str, status: OptStatus) {
        self.opt_status.insert(target.to_string(), status);
    }

    /// Plugin state for one (target, restraint type).
    pub fn plugin_data(&self, target: &str, kind: &str) -> Option<&PluginData> {
        self.plugin_data.get(target).and_then(|slots| slots.get(kind))
    }

    pub(crate) fn target_plugin_data_mut(&mut self, target: &str) -> &mut BTreeMap<String, PluginData> {
        self.plugin_data.entry(target.to_string()).or_default()
    }

    /// Marks every target stale and drops its fitness.
    pub fn invalidate(&mut self) {
        let targets: Vec<String> = self
            .cache
            .keys()
            .chain(self.ratios.keys())
            .cloned()
            .collect();
        for target in targets {
            self.invalidate_target(&target);
        }
    }

    /// Marks one target stale and drops its fitness.
    pub fn invalidate_target(&mut self, target: &str) {
        self.cache.insert(target.to_string(), CacheState::Stale);
        self.fitness.remove(target);
    }

    /// Projects the ratio vector for `target` onto the non-negative orthant
    /// and rescales it to sum to one.
    ///
    /// `index` only labels the error. On error the stored vector is left
    /// untouched.
    pub fn normalize(&mut self, index: usize, target: &str) -> Result<()> {
        let ratios = self
            .ratios
            .get_mut(target)
            .ok_or_else(|| FitError::UnknownTarget {
                ensemble: index,
                target: target.to_string(),
            })?;
        *ratios = normalized_ratios(index, target, ratios)?;
        Ok(())
    }
}

/// Clamped, sum-to-one copy of `ratios`. NaN and negative entries become
/// zero; a zero or non-finite sum is [`FitError::ZeroRatioSum`].
pub(crate) fn normalized_ratios(index: usize, target: &str, ratios: &[f64]) -> Result<Vec<f64>> {
    let clamped: Vec<f64> = ratios
        .iter()
        .map(|&r| if r.is_nan() || r < 0.0 { 0.0 } else { r })
        .collect();
    let sum: f64 = clamped.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return Err(FitError::ZeroRatioSum {
            ensemble: index,
            target: target.to_string(),
            sum,
        });
    }
    Ok(clamped.into_iter().map(|r| r / sum).collect())
}

/// `[1/n; n]`.
pub fn uniform_ratios(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{targets, two_targets};
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_new_is_uniform_and_stale() {
        let e = Ensemble::new(&targets(), names(&["A", "B", "C"]));
        let r = e.ratios("T1").unwrap();
        assert_eq!(r.len(), 3);
        assert!(r.iter().all(|&x| (x - 1.0 / 3.0).abs() < 1e-12));
        assert_eq!(e.cache_state("T1"), CacheState::Stale);
        assert!(e.fitness("T1").is_none());
        assert!(e.opt_status("T1").is_none());
        assert!(e.plugin_data("T1", "PROF").unwrap().is_empty());
    }

    #[test]
    fn test_uniform_fill_deals_in_order() {
        let pool = names(&["A", "B", "C", "D", "E"]);
        let e0 = Ensemble::uniform(&targets(), 0, 3, &pool);
        let e1 = Ensemble::uniform(&targets(), 1, 3, &pool);
        assert_eq!(e0.component_names(), &names(&["A", "B", "C"])[..]);
        assert_eq!(e1.component_names(), &names(&["D", "E", "A"])[..]);
    }

    #[test]
    fn test_replace_component_invalidates() {
        let mut e = Ensemble::new(&targets(), names(&["A", "B"]));
        e.set_cache_state("T1", CacheState::Converged);
        e.set_fitness("T1", BTreeMap::from([("PROF".to_string(), 1.0)]));

        assert!(!e.replace_component(0, "A"));
        assert_eq!(e.cache_state("T1"), CacheState::Converged);

        assert!(e.replace_component(0, "C"));
        assert_eq!(e.cache_state("T1"), CacheState::Stale);
        assert!(e.fitness("T1").is_none());
        assert_eq!(e.size(), 2);
    }

    #[test]
    fn test_exchange_invalidates_every_target() {
        let t = two_targets();
        let mut a = Ensemble::new(&t, names(&["A", "B"]));
        let mut b = Ensemble::new(&t, names(&["C", "B"]));
        for e in [&mut a, &mut b] {
            for target in ["T1", "T2"] {
                e.set_cache_state(target, CacheState::Converged);
                e.set_fitness(target, BTreeMap::from([("PROF".to_string(), 1.0)]));
            }
        }

        assert!(a.exchange_components(&mut b, 0..1));
        for e in [&a, &b] {
            for target in ["T1", "T2"] {
                assert_eq!(e.cache_state(target), CacheState::Stale, "{target}");
                assert!(e.fitness(target).is_none(), "{target}");
            }
        }
    }

    #[test]
    fn test_exchange_components() {
        let mut a = Ensemble::new(&targets(), names(&["A", "B", "C"]));
        let mut b = Ensemble::new(&targets(), names(&["A", "D", "E"]));
        a.set_cache_state("T1", CacheState::Converged);
        b.set_cache_state("T1", CacheState::Converged);

        assert!(a.exchange_components(&mut b, 1..3));
        assert_eq!(a.component_names(), &names(&["A", "D", "E"])[..]);
        assert_eq!(b.component_names(), &names(&["A", "B", "C"])[..]);
        assert_eq!(a.cache_state("T1"), CacheState::Stale);
        assert_eq!(b.cache_state("T1"), CacheState::Stale);
    }

    #[test]
    fn test_exchange_identical_keeps_cache() {
        let mut a = Ensemble::new(&targets(), names(&["A", "B"]));
        let mut b = a.clone();
        a.set_cache_state("T1", CacheState::Converged);
        assert!(!a.exchange_components(&mut b, 0..2));
        assert_eq!(a.cache_state("T1"), CacheState::Converged);
    }

    #[test]
    fn test_normalize_clamps_and_scales() {
        let mut e = Ensemble::new(&targets(), names(&["A", "B", "C"]));
        e.set_ratios("T1", vec![2.0, -1.0, 2.0]);
        e.normalize(0, "T1").unwrap();
        assert_eq!(e.ratios("T1").unwrap(), &[0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_normalize_zero_vector_is_error() {
        let mut e = Ensemble::new(&targets(), names(&["A", "B"]));
        e.set_ratios("T1", vec![0.0, -3.0]);
        assert!(matches!(
            e.normalize(4, "T1"),
            Err(FitError::ZeroRatioSum { ensemble: 4, .. })
        ));
        assert_eq!(e.ratios("T1").unwrap(), &[0.0, -3.0]);
    }

    #[test]
    fn test_normalize_unknown_target() {
        let mut e = Ensemble::new(&targets(), names(&["A"]));
        assert!(matches!(
            e.normalize(0, "nope"),
            Err(FitError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_cache_state_needs_optimization() {
        assert!(CacheState::Stale.needs_optimization());
        assert!(CacheState::Failed.needs_optimization());
        assert!(!CacheState::Converged.needs_optimization());
    }

    proptest! {
        #[test]
        fn prop_normalize_yields_simplex(raw in prop::collection::vec(-1.0f64..10.0, 1..8)) {
            prop_assume!(raw.iter().any(|&x| x > 1e-9));
            let mut e = Ensemble::new(&targets(), vec!["A".to_string(); raw.len()]);
            e.set_ratios("T1", raw);
            e.normalize(0, "T1").unwrap();
            let r = e.ratios("T1").unwrap();
            prop_assert!(r.iter().all(|&x| x >= 0.0));
            prop_assert!((r.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
