//! Scalar summaries.

/// Mean and population standard deviation (divides by `n`).
///
/// Returns `None` for an empty slice; a single value has stdev 0.
pub fn mean_stdev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Best, mean and standard deviation of a ranked list of scores.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScoreSummary {
    /// The first (best-ranked) score.
    pub best: f64,
    pub mean: f64,
    pub stdev: f64,
}

impl ScoreSummary {
    /// Summarizes `ranked`, whose first entry is taken as the best.
    pub fn from_ranked(ranked: &[f64]) -> Option<Self> {
        let best = *ranked.first()?;
        let (mean, stdev) = mean_stdev(ranked)?;
        Some(Self { best, mean, stdev })
    }
}
