use rand::rngs::StdRng;
use rand::Rng;

const TIE_EPSILON: f64 = 1e-9;

/// Two-way multilabel stratified split via iterative stratification.
///
/// Each sample carries a set of class labels; the split distributes every
/// label across both folds in proportion to the fold fractions, working
/// from the rarest label outward so scarce classes are placed before the
/// abundant ones use up fold capacity. The rng only breaks exact ties, so
/// the same seed always reproduces the same split.
///
/// Returns the sample indices of the first fold (fraction
/// `1 - second_fraction`) and the second fold, each in ascending order.
pub fn stratified_two_way(
    labels: &[Vec<usize>],
    num_classes: usize,
    second_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let total = labels.len();
    let fractions = [1.0 - second_fraction, second_fraction];

    let mut desired_total = [total as f64 * fractions[0], total as f64 * fractions[1]];

    let mut label_counts = vec![0usize; num_classes];
    for sample in labels {
        for &class in sample {
            if class < num_classes {
                label_counts[class] += 1;
            }
        }
    }
    let mut desired_label: Vec<[f64; 2]> = label_counts
        .iter()
        .map(|&count| [count as f64 * fractions[0], count as f64 * fractions[1]])
        .collect();
    let mut remaining_per_label = label_counts;

    let mut assignment: Vec<Option<usize>> = vec![None; total];

    // Place samples label by label, rarest label first.
    loop {
        let Some(rarest) = (0..num_classes)
            .filter(|&class| remaining_per_label[class] > 0)
            .min_by_key(|&class| remaining_per_label[class])
        else {
            break;
        };

        for index in 0..total {
            if assignment[index].is_some() || !labels[index].contains(&rarest) {
                continue;
            }

            let fold = pick_fold(desired_label[rarest], desired_total, rng);
            assignment[index] = Some(fold);
            desired_total[fold] -= 1.0;
            for &class in &labels[index] {
                if class < num_classes {
                    desired_label[class][fold] -= 1.0;
                    remaining_per_label[class] -= 1;
                }
            }
        }
    }

    // Label-free samples balance the remaining fold capacity directly.
    for index in 0..total {
        if assignment[index].is_none() {
            let fold = pick_fold(desired_total, desired_total, rng);
            assignment[index] = Some(fold);
            desired_total[fold] -= 1.0;
        }
    }

    let mut first = Vec::new();
    let mut second = Vec::new();
    for (index, fold) in assignment.into_iter().enumerate() {
        match fold {
            Some(0) => first.push(index),
            _ => second.push(index),
        }
    }
    (first, second)
}

/// Fold with the greater primary demand; ties fall back to overall fold
/// capacity, then to the rng.
fn pick_fold(primary: [f64; 2], capacity: [f64; 2], rng: &mut StdRng) -> usize {
    let by = |values: [f64; 2]| -> Option<usize> {
        if (values[0] - values[1]).abs() < TIE_EPSILON {
            None
        } else if values[0] > values[1] {
            Some(0)
        } else {
            Some(1)
        }
    };
    by(primary)
        .or_else(|| by(capacity))
        .unwrap_or_else(|| rng.gen_range(0..2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_split_sizes_match_fractions() {
        let labels: Vec<Vec<usize>> = (0..100).map(|i| vec![i % 2]).collect();
        let mut rng = StdRng::seed_from_u64(4);
        let (first, second) = stratified_two_way(&labels, 2, 0.2, &mut rng);
        assert_eq!(first.len(), 80);
        assert_eq!(second.len(), 20);
    }

    #[test]
    fn test_every_sample_assigned_exactly_once() {
        let labels: Vec<Vec<usize>> = (0..37).map(|i| vec![i % 3]).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let (first, second) = stratified_two_way(&labels, 3, 0.3, &mut rng);
        let mut all: Vec<usize> = first.iter().chain(second.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn test_labels_stratified_across_folds() {
        // 80 samples of class 0, 20 of class 1; a 0.25 split should keep
        // class 1 represented in both folds at roughly 1/4 of its count
        let labels: Vec<Vec<usize>> = (0..100)
            .map(|i| if i < 80 { vec![0] } else { vec![1] })
            .collect();
        let mut rng = StdRng::seed_from_u64(4);
        let (first, second) = stratified_two_way(&labels, 2, 0.25, &mut rng);

        let rare_in_second = second.iter().filter(|&&i| i >= 80).count();
        assert_eq!(rare_in_second, 5);
        assert_eq!(first.len() + second.len(), 100);
    }

    #[test]
    fn test_label_free_samples_fill_capacity() {
        let labels: Vec<Vec<usize>> = vec![Vec::new(); 10];
        let mut rng = StdRng::seed_from_u64(4);
        let (first, second) = stratified_two_way(&labels, 2, 0.2, &mut rng);
        assert_eq!(first.len(), 8);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_same_seed_reproduces_split() {
        let labels: Vec<Vec<usize>> = (0..50).map(|i| vec![i % 4]).collect();
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        assert_eq!(
            stratified_two_way(&labels, 4, 0.2, &mut rng_a),
            stratified_two_way(&labels, 4, 0.2, &mut rng_b)
        );
    }

    #[test]
    fn test_empty_input() {
        let mut rng = StdRng::seed_from_u64(4);
        let (first, second) = stratified_two_way(&[], 2, 0.2, &mut rng);
        assert!(first.is_empty());
        assert!(second.is_empty());
    }
}
