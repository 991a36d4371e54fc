use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{SplitConfig, Strategy};
use crate::core::distribution::{class_counts, class_distribution, global_distribution};
use crate::core::divergence::{additive_imbalance, simulated_jsd};
use crate::core::stratify::stratified_two_way;
use crate::metadata::{ImageId, MetadataStore};

/// One of the disjoint partitions of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subset {
    Training,
    Validation,
    Testing,
}

impl Subset {
    pub fn as_str(&self) -> &str {
        match self {
            Subset::Training => "training",
            Subset::Validation => "validation",
            Subset::Testing => "testing",
        }
    }
}

/// The finished assignment of every image identifier to exactly one subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    pub training: BTreeSet<ImageId>,
    pub validation: BTreeSet<ImageId>,
    /// Present only for three-way splits
    pub testing: Option<BTreeSet<ImageId>>,
}

impl SplitAssignment {
    fn new(with_testing: bool) -> Self {
        Self {
            training: BTreeSet::new(),
            validation: BTreeSet::new(),
            testing: with_testing.then(BTreeSet::new),
        }
    }

    /// Subsets in fixed preference order.
    pub fn subsets(&self) -> Vec<(Subset, &BTreeSet<ImageId>)> {
        let mut subsets = vec![
            (Subset::Training, &self.training),
            (Subset::Validation, &self.validation),
        ];
        if let Some(testing) = &self.testing {
            subsets.push((Subset::Testing, testing));
        }
        subsets
    }

    fn get_mut(&mut self, subset: Subset) -> &mut BTreeSet<ImageId> {
        match subset {
            Subset::Training => &mut self.training,
            Subset::Validation => &mut self.validation,
            Subset::Testing => self
                .testing
                .as_mut()
                .expect("testing subset requested for a two-way split"),
        }
    }

    pub fn total_assigned(&self) -> usize {
        self.subsets().iter().map(|(_, ids)| ids.len()).sum()
    }
}

/// Precomputed per-group scoring inputs.
struct GroupProfile {
    ids: BTreeSet<ImageId>,
    /// Per-class presence counts across the group's images
    counts: Vec<usize>,
    /// Classes present anywhere in the group
    presence: BTreeSet<usize>,
}

/// Assigns similarity groups to subsets.
///
/// The scored strategies run a greedy single pass: each group goes
/// atomically to the arg-min subset, and every decision feeds the state
/// the next one scores against. The stratified strategy replaces that
/// loop with a seeded multilabel stratified shuffle over whole groups.
pub struct SubsetAssigner<'a> {
    metadata: &'a MetadataStore,
    config: &'a SplitConfig,
    global: Vec<f64>,
    total_images: usize,
}

impl<'a> SubsetAssigner<'a> {
    pub fn new(metadata: &'a MetadataStore, config: &'a SplitConfig) -> Self {
        let global = global_distribution(metadata, config.num_classes());
        Self {
            metadata,
            config,
            global,
            total_images: metadata.len(),
        }
    }

    /// Assign every group to a subset. Groups are processed in the order
    /// the grouper emitted them and are never split.
    pub fn assign(&self, groups: Vec<BTreeSet<ImageId>>) -> SplitAssignment {
        let assignment = match self.config.strategy {
            Strategy::StratifiedShuffle => self.assign_stratified(groups),
            Strategy::AdditiveImbalance | Strategy::Jsd => self.assign_scored(groups),
        };
        info!(
            "Assignment complete: {} training, {} validation{}",
            assignment.training.len(),
            assignment.validation.len(),
            match &assignment.testing {
                Some(testing) => format!(", {} testing", testing.len()),
                None => String::new(),
            }
        );
        assignment
    }

    fn profile(&self, ids: BTreeSet<ImageId>) -> GroupProfile {
        let counts = class_counts(ids.iter().copied(), self.metadata, self.config.num_classes());
        let presence = counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(class, _)| class)
            .collect();
        GroupProfile {
            ids,
            counts,
            presence,
        }
    }

    fn group_is_underwater(&self, group: &BTreeSet<ImageId>) -> bool {
        group
            .iter()
            .all(|&id| self.metadata.get(id).map_or(true, |r| r.is_underwater()))
    }

    fn assign_scored(&self, groups: Vec<BTreeSet<ImageId>>) -> SplitAssignment {
        let mut assignment = SplitAssignment::new(self.config.has_testing());

        let mut candidates: Vec<(Subset, f64)> = vec![
            (Subset::Training, self.config.split_ratios[0]),
            (Subset::Validation, self.config.split_ratios[1]),
        ];
        if self.config.has_testing() {
            candidates.push((Subset::Testing, self.config.split_ratios[2]));
        }

        let mut remaining = Vec::with_capacity(groups.len());
        for group in groups {
            // Surface footage is useless for training; whole groups of it
            // go straight to testing, bypassing the scored loop.
            if self.config.has_testing() && !self.group_is_underwater(&group) {
                debug!("Forcing non-underwater group {:?} into testing", group);
                assignment.get_mut(Subset::Testing).extend(group);
            } else {
                remaining.push(self.profile(group));
            }
        }

        for group in remaining {
            let best = self.decide(&group, &candidates, &assignment);
            debug!(
                "Assigning group of {} image(s) starting at {:?} to {}",
                group.ids.len(),
                group.ids.iter().next(),
                best.as_str()
            );
            assignment.get_mut(best).extend(group.ids);
        }

        assignment
    }

    /// Best subset for a group: lowest score amongst subsets still under
    /// their target ratio, falling back to all subsets once every ratio is
    /// met so the pass can never deadlock. Ties keep the earlier subset in
    /// preference order.
    fn decide(
        &self,
        group: &GroupProfile,
        candidates: &[(Subset, f64)],
        assignment: &SplitAssignment,
    ) -> Subset {
        let choose = |require_under_ratio: bool| -> Option<Subset> {
            let mut best: Option<(Subset, f64)> = None;
            for &(subset, target_ratio) in candidates {
                let members = match subset {
                    Subset::Training => &assignment.training,
                    Subset::Validation => &assignment.validation,
                    Subset::Testing => assignment.testing.as_ref().expect("testing candidate"),
                };
                if require_under_ratio {
                    let realized = members.len() as f64 / self.total_images as f64;
                    if realized >= target_ratio {
                        continue;
                    }
                }
                let score = self.score(members, group);
                if best.map_or(true, |(_, best_score)| score < best_score) {
                    best = Some((subset, score));
                }
            }
            best.map(|(subset, _)| subset)
        };

        choose(true).unwrap_or_else(|| {
            choose(false).expect("at least one candidate subset must exist")
        })
    }

    fn score(&self, members: &BTreeSet<ImageId>, group: &GroupProfile) -> f64 {
        match self.config.strategy {
            Strategy::AdditiveImbalance => {
                let distribution =
                    class_distribution(members, self.metadata, self.config.num_classes());
                additive_imbalance(&distribution, &group.presence, &self.global)
            }
            Strategy::Jsd => {
                let counts =
                    class_counts(members.iter().copied(), self.metadata, self.config.num_classes());
                simulated_jsd(
                    &counts,
                    members.len(),
                    &group.counts,
                    group.ids.len(),
                    &self.global,
                )
            }
            Strategy::StratifiedShuffle => unreachable!("stratified strategy is not scored"),
        }
    }

    /// Stratified replacement for the scored loop: each group becomes one
    /// multilabel sample, split at the configured ratios with a seeded
    /// rng. For three-way splits the remainder is split a second time, as
    /// the upstream stratifier chain did.
    fn assign_stratified(&self, groups: Vec<BTreeSet<ImageId>>) -> SplitAssignment {
        let mut assignment = SplitAssignment::new(self.config.has_testing());
        let profiles: Vec<GroupProfile> =
            groups.into_iter().map(|group| self.profile(group)).collect();
        let labels: Vec<Vec<usize>> = profiles
            .iter()
            .map(|profile| profile.presence.iter().copied().collect())
            .collect();

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let ratios = &self.config.split_ratios;

        if self.config.has_testing() {
            let rest_fraction = ratios[1] + ratios[2];
            let (training, rest) =
                stratified_two_way(&labels, self.config.num_classes(), rest_fraction, &mut rng);

            let rest_labels: Vec<Vec<usize>> =
                rest.iter().map(|&index| labels[index].clone()).collect();
            let (validation, testing) = stratified_two_way(
                &rest_labels,
                self.config.num_classes(),
                ratios[2] / rest_fraction,
                &mut rng,
            );

            for index in training {
                assignment.training.extend(profiles[index].ids.iter().copied());
            }
            for local in validation {
                assignment
                    .validation
                    .extend(profiles[rest[local]].ids.iter().copied());
            }
            for local in testing {
                assignment
                    .get_mut(Subset::Testing)
                    .extend(profiles[rest[local]].ids.iter().copied());
            }
        } else {
            let (training, validation) =
                stratified_two_way(&labels, self.config.num_classes(), ratios[1], &mut rng);
            for index in training {
                assignment.training.extend(profiles[index].ids.iter().copied());
            }
            for index in validation {
                assignment
                    .validation
                    .extend(profiles[index].ids.iter().copied());
            }
        }

        assignment
    }
}
