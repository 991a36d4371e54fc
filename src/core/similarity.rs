use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::error::{SplitError, SplitResult};
use crate::metadata::{ImageId, MetadataStore};

/// Parse a similarity reference into the set of image ids it names.
///
/// The grammar is a comma-separated list of tokens, each either a bare
/// integer id or an inclusive range "A-B". Anything else is fatal for the
/// declaring record: silently dropping a token would break the partition
/// invariant downstream.
pub fn parse_similarity(id: ImageId, reference: &str) -> SplitResult<BTreeSet<ImageId>> {
    let malformed = |token: &str| SplitError::SimilarityParse {
        id,
        token: token.to_string(),
    };

    let mut referenced = BTreeSet::new();
    for token in reference.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some((start, end)) = token.split_once('-') {
            let start: ImageId = start.trim().parse().map_err(|_| malformed(token))?;
            let end: ImageId = end.trim().parse().map_err(|_| malformed(token))?;
            if start > end {
                return Err(malformed(token));
            }
            referenced.extend(start..=end);
        } else {
            referenced.insert(token.parse().map_err(|_| malformed(token))?);
        }
    }
    Ok(referenced)
}

/// Disjoint-set forest over dense indices, used to close similarity
/// references transitively.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut current = index;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_b.max(root_a)] = root_a.min(root_b);
        }
    }
}

/// Group images so that every chain of similarity references lands in one
/// group. An image without references forms a singleton group.
///
/// References are closed transitively: if image A references B and B
/// separately references C, all three end up together. References to ids
/// absent from the metadata are dropped with a warning, since an id the
/// store does not know cannot be assigned to any subset.
///
/// The returned groups partition the full identifier set and are emitted
/// in ascending order of each group's smallest member.
pub fn group_by_similarity(metadata: &MetadataStore) -> SplitResult<Vec<BTreeSet<ImageId>>> {
    let ids: Vec<ImageId> = metadata.ids().collect();
    let index_of: HashMap<ImageId, usize> = ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    let mut forest = UnionFind::new(ids.len());
    for (id, record) in metadata.iter() {
        let Some(reference) = record.similarity.as_deref() else {
            continue;
        };
        let declarer = index_of[&id];
        for referenced in parse_similarity(id, reference)? {
            match index_of.get(&referenced) {
                Some(&other) => forest.union(declarer, other),
                None => warn!(
                    "Image {} references unknown image {} in similarity annotation; ignoring",
                    id, referenced
                ),
            }
        }
    }

    let mut by_root: HashMap<usize, BTreeSet<ImageId>> = HashMap::new();
    for (index, id) in ids.iter().enumerate() {
        by_root.entry(forest.find(index)).or_default().insert(*id);
    }

    let mut groups: Vec<BTreeSet<ImageId>> = by_root.into_values().collect();
    groups.sort_by_key(|group| *group.iter().next().unwrap_or(&0));

    debug!(
        "Formed {} similarity groups from {} images",
        groups.len(),
        ids.len()
    );
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ImageRecord;
    use std::collections::BTreeMap;

    fn store(records: &[(ImageId, Option<&str>)]) -> MetadataStore {
        let mut map = BTreeMap::new();
        for (id, similarity) in records {
            map.insert(
                *id,
                ImageRecord {
                    similarity: similarity.map(str::to_string),
                    ..ImageRecord::default()
                },
            );
        }
        MetadataStore::from_records(map)
    }

    #[test]
    fn test_parse_single_range() {
        let parsed = parse_similarity(1, "3-5").unwrap();
        assert_eq!(parsed, BTreeSet::from([3, 4, 5]));
    }

    #[test]
    fn test_parse_mixed_list() {
        let parsed = parse_similarity(1, "2, 4-6, 9").unwrap();
        assert_eq!(parsed, BTreeSet::from([2, 4, 5, 6, 9]));
    }

    #[test]
    fn test_parse_malformed_token_fails() {
        let result = parse_similarity(7, "a-b");
        match result {
            Err(SplitError::SimilarityParse { id, token }) => {
                assert_eq!(id, 7);
                assert_eq!(token, "a-b");
            }
            other => panic!("expected SimilarityParse, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_reversed_range_fails() {
        assert!(matches!(
            parse_similarity(1, "5-3"),
            Err(SplitError::SimilarityParse { .. })
        ));
    }

    #[test]
    fn test_singletons_for_unreferenced_images() {
        let metadata = store(&[(1, None), (2, None)]);
        let groups = group_by_similarity(&metadata).unwrap();
        assert_eq!(groups, vec![BTreeSet::from([1]), BTreeSet::from([2])]);
    }

    #[test]
    fn test_one_sided_reference_merges_both() {
        // 2 references 1; the relation is symmetric regardless of declarer
        let metadata = store(&[(1, None), (2, Some("1")), (3, None)]);
        let groups = group_by_similarity(&metadata).unwrap();
        assert_eq!(groups, vec![BTreeSet::from([1, 2]), BTreeSet::from([3])]);
    }

    #[test]
    fn test_transitive_closure_across_declarations() {
        // 1 references 2, and 2 separately references 3
        let metadata = store(&[(1, Some("2")), (2, Some("3")), (3, None)]);
        let groups = group_by_similarity(&metadata).unwrap();
        assert_eq!(groups, vec![BTreeSet::from([1, 2, 3])]);
    }

    #[test]
    fn test_groups_partition_the_universe() {
        let metadata = store(&[
            (1, Some("2-4")),
            (2, None),
            (3, None),
            (4, None),
            (5, None),
            (6, Some("5")),
        ]);
        let groups = group_by_similarity(&metadata).unwrap();

        let mut seen = BTreeSet::new();
        for group in &groups {
            for id in group {
                assert!(seen.insert(*id), "image {} appears in two groups", id);
            }
        }
        assert_eq!(seen, metadata.ids().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_unknown_reference_is_dropped() {
        let metadata = store(&[(1, Some("99")), (2, None)]);
        let groups = group_by_similarity(&metadata).unwrap();
        assert_eq!(groups, vec![BTreeSet::from([1]), BTreeSet::from([2])]);
    }
}
