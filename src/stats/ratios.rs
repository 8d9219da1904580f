//! Component weight statistics across a population.

use super::summary::mean_stdev;
use crate::ensemble::Ensemble;
use crate::error::{FitError, Result};
use crate::target::Target;
use std::collections::BTreeMap;

/// Per target, per component, the weight it carries in every ensemble that
/// contains it, in population order.
pub type RatioStats = BTreeMap<String, BTreeMap<String, Vec<f64>>>;

/// Collects component weights per target.
///
/// Ensembles lacking a component contribute nothing for it. A component
/// listed more than once in an ensemble contributes the sum of its ratios,
/// not the ratio of its first occurrence, so each ensemble's weights still
/// add up to one.
pub fn ratio_stats(population: &[Ensemble], targets: &[Target]) -> Result<RatioStats> {
    let mut stats = RatioStats::new();
    for target in targets {
        let per_component = stats.entry(target.name.clone()).or_default();
        for (index, ensemble) in population.iter().enumerate() {
            let ratios = ensemble
                .ratios(&target.name)
                .ok_or_else(|| FitError::UnknownTarget {
                    ensemble: index,
                    target: target.name.clone(),
                })?;

            let mut weights: BTreeMap<&str, f64> = BTreeMap::new();
            for (name, r) in ensemble.component_names().iter().zip(ratios) {
                *weights.entry(name).or_insert(0.0) += r;
            }
            for (name, w) in weights {
                per_component.entry(name.to_string()).or_default().push(w);
            }
        }
    }
    Ok(stats)
}

/// Prevalence and weight summary of one component for one target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prevalence {
    pub component: String,
    /// Fraction of the population containing the component.
    pub prevalence: f64,
    /// Mean weight over the ensembles containing it.
    pub mean: f64,
    pub stdev: f64,
}

/// Per target, components ordered by prevalence (descending, ties by name),
/// dropping those below `min_prevalence` percent.
pub fn component_prevalence(
    stats: &RatioStats,
    population_size: usize,
    min_prevalence: f64,
) -> BTreeMap<String, Vec<Prevalence>> {
    let size = population_size.max(1) as f64;
    stats
        .iter()
        .map(|(target, per_component)| {
            let mut rows: Vec<Prevalence> = per_component
                .iter()
                .filter_map(|(component, weights)| {
                    let (mean, stdev) = mean_stdev(weights)?;
                    Some(Prevalence {
                        component: component.clone(),
                        prevalence: weights.len() as f64 / size,
                        mean,
                        stdev,
                    })
                })
                .filter(|row| row.prevalence * 100.0 >= min_prevalence)
                .collect();
            rows.sort_by(|a, b| {
                b.prevalence
                    .total_cmp(&a.prevalence)
                    .then_with(|| a.component.cmp(&b.component))
            });
            (target.clone(), rows)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{names, targets};

    fn population() -> Vec<Ensemble> {
        let t = targets();
        let mut a = Ensemble::new(&t, names(&["A", "B"]));
        a.set_ratios("T1", vec![0.25, 0.75]);
        let mut b = Ensemble::new(&t, names(&["A", "A", "C"]));
        b.set_ratios("T1", vec![0.2, 0.3, 0.5]);
        let c = Ensemble::new(&t, names(&["C", "D"]));
        vec![a, b, c]
    }

    #[test]
    fn test_absent_components_contribute_nothing() {
        let stats = ratio_stats(&population(), &targets()).unwrap();
        let t1 = &stats["T1"];
        assert_eq!(t1["A"], vec![0.25, 0.5]);
        assert_eq!(t1["B"], vec![0.75]);
        assert_eq!(t1["C"], vec![0.5, 0.5]);
        assert_eq!(t1["D"], vec![0.5]);
    }

    #[test]
    fn test_duplicate_component_weights_are_summed() {
        let t = targets();
        let mut e = Ensemble::new(&t, names(&["B", "A", "B"]));
        e.set_ratios("T1", vec![0.1, 0.6, 0.3]);
        let stats = ratio_stats(&[e], &t).unwrap();
        let t1 = &stats["T1"];
        assert_eq!(t1.len(), 2);
        assert!((t1["B"][0] - 0.4).abs() < 1e-12);
        assert_eq!(t1["A"], vec![0.6]);
        assert!((t1.values().map(|w| w[0]).sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_missing_target_is_an_error() {
        let pop = vec![Ensemble::new(&[], names(&["A"]))];
        assert!(matches!(
            ratio_stats(&pop, &targets()),
            Err(FitError::UnknownTarget { ensemble: 0, .. })
        ));
    }

    #[test]
    fn test_prevalence_order_and_threshold() {
        let stats = ratio_stats(&population(), &targets()).unwrap();
        let rows = &component_prevalence(&stats, 3, 0.0)["T1"];
        let order: Vec<&str> = rows.iter().map(|r| r.component.as_str()).collect();
        assert_eq!(order, vec!["A", "C", "B", "D"]);
        assert!((rows[0].prevalence - 2.0 / 3.0).abs() < 1e-12);
        assert!((rows[0].mean - 0.375).abs() < 1e-12);
        assert!((rows[0].stdev - 0.125).abs() < 1e-12);

        let filtered = &component_prevalence(&stats, 3, 50.0)["T1"];
        assert_eq!(filtered.len(), 2);
    }
}
