use std::collections::BTreeSet;

use crate::metadata::{ImageId, MetadataStore};

/// Count, per class, how many of the given images contain that class.
///
/// Counts are image-level presence: an image contributes at most 1 to each
/// class it contains, however many disjoint mask regions carry it. Class
/// indices outside [0, num_classes) are ignored.
pub fn class_counts<I>(ids: I, metadata: &MetadataStore, num_classes: usize) -> Vec<usize>
where
    I: IntoIterator<Item = ImageId>,
{
    let mut counts = vec![0usize; num_classes];
    for id in ids {
        if let Some(record) = metadata.get(id) {
            for &index in &record.unique_class_indices {
                if index < num_classes {
                    counts[index] += 1;
                }
            }
        }
    }
    counts
}

/// Per-class presence frequency over an identifier set, normalized by the
/// set's size. Always has exactly `num_classes` entries; an empty set maps
/// every class to 0.0 rather than dividing by zero.
pub fn class_distribution(
    ids: &BTreeSet<ImageId>,
    metadata: &MetadataStore,
    num_classes: usize,
) -> Vec<f64> {
    let total = ids.len();
    let counts = class_counts(ids.iter().copied(), metadata, num_classes);
    if total == 0 {
        return vec![0.0; num_classes];
    }
    counts
        .into_iter()
        .map(|count| count as f64 / total as f64)
        .collect()
}

/// The class distribution over the entire metadata set, computed once per
/// split run as the immutable scoring reference.
pub fn global_distribution(metadata: &MetadataStore, num_classes: usize) -> Vec<f64> {
    let all: BTreeSet<ImageId> = metadata.ids().collect();
    class_distribution(&all, metadata, num_classes)
}

/// Render a distribution for the split report.
pub fn format_distribution(distribution: &[f64]) -> String {
    let entries: Vec<String> = distribution.iter().map(|v| format!("{:.3}", v)).collect();
    format!("[{}]", entries.join(", "))
}
