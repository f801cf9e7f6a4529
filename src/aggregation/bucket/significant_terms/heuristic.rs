//! Significance scoring.

/// JLH score of a term.
///
/// Combines the absolute and the relative change of the share of documents containing the term
/// between the background set (`superset_*`) and the foreground set (`subset_*`). Terms which
/// are not more frequent in the foreground than in the background score 0.
pub fn jlh_score(
    subset_freq: u64,
    subset_size: u64,
    superset_freq: u64,
    superset_size: u64,
) -> f64 {
    if subset_size == 0 || superset_size == 0 || superset_freq == 0 {
        return 0.0;
    }
    let subset_probability = subset_freq as f64 / subset_size as f64;
    let superset_probability = superset_freq as f64 / superset_size as f64;
    if subset_probability <= superset_probability {
        return 0.0;
    }
    let absolute_change = subset_probability - superset_probability;
    let relative_change = subset_probability / superset_probability;
    absolute_change * relative_change
}
