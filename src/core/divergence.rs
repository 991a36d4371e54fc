use std::collections::BTreeSet;

/// Summed absolute per-class imbalance a candidate group would leave
/// against the global distribution if added to a subset.
///
/// The group contributes a presence indicator per class, matching the
/// image-level distribution definition: lower is better.
pub fn additive_imbalance(
    subset_distribution: &[f64],
    group_classes: &BTreeSet<usize>,
    global_distribution: &[f64],
) -> f64 {
    subset_distribution
        .iter()
        .zip(global_distribution)
        .enumerate()
        .map(|(class, (&subset, &global))| {
            let indicator = if group_classes.contains(&class) { 1.0 } else { 0.0 };
            (subset + indicator - global).abs()
        })
        .sum()
}

/// KL(D‖M) over indices where both terms are positive. Terms with a zero
/// numerator contribute exactly 0 (the 0·log(0/·) convention), so log is
/// never evaluated at 0.
fn kl_divergence(d: &[f64], m: &[f64]) -> f64 {
    d.iter()
        .zip(m)
        .filter(|(&d, &m)| d > 0.0 && m > 0.0)
        .map(|(&d, &m)| d * (d / m).ln())
        .sum()
}

/// Jensen-Shannon divergence between two distributions:
/// ½·KL(P‖M) + ½·KL(Q‖M) with M = (P+Q)/2. Symmetric, non-negative,
/// and zero iff P == Q.
pub fn jensen_shannon(p: &[f64], q: &[f64]) -> f64 {
    let m: Vec<f64> = p.iter().zip(q).map(|(&a, &b)| 0.5 * (a + b)).collect();
    0.5 * kl_divergence(p, &m) + 0.5 * kl_divergence(q, &m)
}

/// JSD between a subset's simulated post-assignment distribution and the
/// global distribution. The simulation adds the group's per-class presence
/// counts and renormalizes by the grown subset size.
pub fn simulated_jsd(
    subset_counts: &[usize],
    subset_size: usize,
    group_counts: &[usize],
    group_size: usize,
    global_distribution: &[f64],
) -> f64 {
    let new_size = subset_size + group_size;
    if new_size == 0 {
        return 0.0;
    }
    let simulated: Vec<f64> = subset_counts
        .iter()
        .zip(group_counts)
        .map(|(&subset, &group)| (subset + group) as f64 / new_size as f64)
        .collect();
    jensen_shannon(&simulated, global_distribution)
}
