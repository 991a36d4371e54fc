use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::config::SplitConfig;
use crate::core::assigner::SplitAssignment;
use crate::core::distribution::{class_distribution, format_distribution, global_distribution};
use crate::error::{SplitError, SplitResult};
use crate::metadata::{ImageId, MetadataStore};

/// Check the split invariants and log the audit report.
///
/// Count conservation and pairwise disjointness are hard invariants: a
/// violation means the assigner is buggy and the run must not proceed to
/// materialization. Realized ratios and per-subset class distributions
/// are informational.
pub fn validate(
    assignment: &SplitAssignment,
    metadata: &MetadataStore,
    config: &SplitConfig,
) -> SplitResult<()> {
    let total = metadata.len();
    let assigned = assignment.total_assigned();
    if assigned != total {
        return Err(SplitError::CountMismatch { assigned, total });
    }

    let subsets = assignment.subsets();
    for (position, (first, first_ids)) in subsets.iter().enumerate() {
        for (second, second_ids) in subsets.iter().skip(position + 1) {
            let shared = first_ids.intersection(second_ids).count();
            if shared > 0 {
                return Err(SplitError::Overlap {
                    first: *first,
                    second: *second,
                    count: shared,
                });
            }
        }
    }

    // With counts conserved and subsets disjoint, a stray identifier is
    // the only remaining way to break the partition.
    let all: BTreeSet<ImageId> = metadata.ids().collect();
    for (subset, ids) in &subsets {
        if let Some(stray) = ids.difference(&all).next() {
            warn!(
                "Subset {} contains identifier {} that is absent from the metadata",
                subset.as_str(),
                stray
            );
            return Err(SplitError::CountMismatch { assigned, total });
        }
    }

    let num_classes = config.num_classes();
    let global = global_distribution(metadata, num_classes);
    info!("Global class distribution: {}", format_distribution(&global));

    for (subset, ids) in &subsets {
        let realized = ids.len() as f64 / total.max(1) as f64;
        let distribution = class_distribution(ids, metadata, num_classes);
        info!(
            "{} subset: {} images, realized ratio {:.3}, class distribution {}",
            subset.as_str(),
            ids.len(),
            realized,
            format_distribution(&distribution)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassEntry, Strategy};
    use crate::metadata::ImageRecord;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn test_config() -> SplitConfig {
        SplitConfig {
            classes: vec![ClassEntry {
                name: "Clean Hull".to_string(),
                index: 0,
                color: [0, 255, 0],
            }],
            split_ratios: vec![0.5, 0.5],
            seed: 4,
            strategy: Strategy::AdditiveImbalance,
            dataset_root: PathBuf::from("ALL"),
            metadata_path: PathBuf::from("ALL/Masks/Metadata.json"),
            training_path: PathBuf::from("TRAINING"),
            validation_path: PathBuf::from("VALIDATION"),
            testing_path: None,
            image_extension: "jpg".to_string(),
        }
    }

    fn store(ids: &[ImageId]) -> MetadataStore {
        let mut records = BTreeMap::new();
        for &id in ids {
            records.insert(
                id,
                ImageRecord {
                    unique_class_indices: BTreeSet::from([0]),
                    ..ImageRecord::default()
                },
            );
        }
        MetadataStore::from_records(records)
    }

    #[test]
    fn test_valid_assignment_passes() {
        let metadata = store(&[1, 2, 3, 4]);
        let assignment = SplitAssignment {
            training: BTreeSet::from([1, 2]),
            validation: BTreeSet::from([3, 4]),
            testing: None,
        };
        assert!(validate(&assignment, &metadata, &test_config()).is_ok());
    }

    #[test]
    fn test_missing_image_is_count_mismatch() {
        let metadata = store(&[1, 2, 3]);
        let assignment = SplitAssignment {
            training: BTreeSet::from([1]),
            validation: BTreeSet::from([3]),
            testing: None,
        };
        assert!(matches!(
            validate(&assignment, &metadata, &test_config()),
            Err(SplitError::CountMismatch {
                assigned: 2,
                total: 3
            })
        ));
    }

    #[test]
    fn test_shared_image_is_overlap() {
        // Three assigned against three total keeps the count check quiet
        // so the overlap check is what fires
        let metadata = store(&[1, 2, 3]);
        let assignment = SplitAssignment {
            training: BTreeSet::from([1, 2]),
            validation: BTreeSet::from([2]),
            testing: None,
        };
        assert!(matches!(
            validate(&assignment, &metadata, &test_config()),
            Err(SplitError::Overlap { count: 1, .. })
        ));
    }

    #[test]
    fn test_stray_identifier_rejected() {
        let metadata = store(&[1, 2]);
        let assignment = SplitAssignment {
            training: BTreeSet::from([1]),
            validation: BTreeSet::from([99]),
            testing: None,
        };
        assert!(validate(&assignment, &metadata, &test_config()).is_err());
    }
}
