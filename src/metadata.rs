use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{SplitError, SplitResult};

/// Canonical image identifier. Metadata keys arrive as strings from the
/// annotation export and are normalized to this form at load time.
pub type ImageId = u64;

/// Per-image annotation metadata as exported alongside the masks.
///
/// Field aliases accept both the capitalized keys of the older export
/// format and the camelCase keys of the current one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageRecord {
    /// Class indices present anywhere in the image's mask (image-level
    /// presence, each class listed at most once)
    #[serde(
        default,
        rename = "uniqueClassIndices",
        alias = "UniqueClassIndices"
    )]
    pub unique_class_indices: BTreeSet<usize>,

    /// Compact reference to near-duplicate images, e.g. "2, 4-6, 9"
    #[serde(default, rename = "similarity", alias = "Similarity")]
    pub similarity: Option<String>,

    /// Provenance flag; "no" marks frames not taken underwater
    #[serde(default, rename = "underwater", alias = "Underwater")]
    pub underwater: Option<String>,
}

impl ImageRecord {
    pub fn is_underwater(&self) -> bool {
        !matches!(self.underwater.as_deref(), Some("no"))
    }
}

/// In-memory store of all per-image metadata, keyed by canonical id.
///
/// Iteration order is ascending by id, which downstream grouping and
/// assignment rely on for reproducibility.
pub struct MetadataStore {
    records: BTreeMap<ImageId, ImageRecord>,
}

impl MetadataStore {
    /// Load metadata from a JSON mapping of image id to record.
    ///
    /// A missing file or a structurally invalid mapping is fatal. A single
    /// malformed record degrades to an empty class set so one bad
    /// annotation does not abort the whole run.
    pub fn load(path: &Path) -> SplitResult<Self> {
        if !path.exists() {
            return Err(SplitError::MetadataNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)?;
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&contents)
            .map_err(|e| SplitError::MetadataParse(format!("{:?}: {}", path, e)))?;

        let mut records = BTreeMap::new();
        for (key, value) in raw {
            let id: ImageId = key.trim().parse().map_err(|_| {
                SplitError::MetadataParse(format!("image identifier {:?} is not numeric", key))
            })?;

            let record = match serde_json::from_value::<ImageRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        "Malformed metadata for image {}: {}. Using empty class set.",
                        id, e
                    );
                    ImageRecord::default()
                }
            };
            records.insert(id, record);
        }

        info!("Loaded metadata for {} images from {:?}", records.len(), path);
        Ok(Self { records })
    }

    /// Build a store directly from records (used by callers that already
    /// hold parsed metadata, and by tests).
    pub fn from_records(records: BTreeMap<ImageId, ImageRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageRecord> {
        self.records.get(&id)
    }

    /// All image identifiers in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ImageId, &ImageRecord)> {
        self.records.iter().map(|(id, record)| (*id, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_not_found() {
        let path = std::env::temp_dir().join("split_fouling_no_such_metadata.json");
        let result = MetadataStore::load(&path);
        assert!(matches!(result, Err(SplitError::MetadataNotFound(_))));
    }

    #[test]
    fn test_load_parses_both_export_formats() {
        let dir = std::env::temp_dir().join("split_fouling_metadata_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Metadata.json");
        fs::write(
            &path,
            r#"{
                "1": {"uniqueClassIndices": [0, 1], "similarity": "2"},
                "2": {"UniqueClassIndices": [1], "Underwater": "no"},
                "3": {}
            }"#,
        )
        .unwrap();

        let store = MetadataStore::load(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(
            store.get(1).unwrap().unique_class_indices,
            BTreeSet::from([0, 1])
        );
        assert_eq!(store.get(1).unwrap().similarity.as_deref(), Some("2"));
        assert!(!store.get(2).unwrap().is_underwater());
        assert!(store.get(3).unwrap().unique_class_indices.is_empty());
        assert!(store.get(3).unwrap().is_underwater());
    }

    #[test]
    fn test_load_malformed_record_degrades_to_empty_classes() {
        let dir = std::env::temp_dir().join("split_fouling_metadata_degraded");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Metadata.json");
        fs::write(
            &path,
            r#"{"5": {"uniqueClassIndices": "not-a-list"}, "6": {"uniqueClassIndices": [2]}}"#,
        )
        .unwrap();

        let store = MetadataStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.get(5).unwrap().unique_class_indices.is_empty());
        assert_eq!(
            store.get(6).unwrap().unique_class_indices,
            BTreeSet::from([2])
        );
    }

    #[test]
    fn test_load_non_numeric_key_is_parse_error() {
        let dir = std::env::temp_dir().join("split_fouling_metadata_badkey");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Metadata.json");
        fs::write(&path, r#"{"frame_a": {}}"#).unwrap();

        let result = MetadataStore::load(&path);
        assert!(matches!(result, Err(SplitError::MetadataParse(_))));
    }
}
