use rand::rngs::StdRng;
use rand::SeedableRng;

/// Select up to `cap` row indices per probability group.
///
/// A group at or over the cap is sampled uniformly at random; a smaller group
/// is kept whole in its existing order — never duplicated, never padded. Each
/// group draws from a freshly seeded generator so repeated runs with the same
/// seed pick the same rows.
pub fn sample_group_indices(
    row_groups: &[String],
    group_order: &[String],
    cap: usize,
    seed: u64,
) -> Vec<usize> {
    let mut selected = Vec::new();
    for label in group_order {
        let members: Vec<usize> = row_groups
            .iter()
            .enumerate()
            .filter(|(_, group)| *group == label)
            .map(|(i, _)| i)
            .collect();
        if members.len() >= cap {
            let mut rng = StdRng::seed_from_u64(seed);
            let chosen = rand::seq::index::sample(&mut rng, members.len(), cap);
            selected.extend(chosen.iter().map(|i| members[i]));
        } else {
            selected.extend(members);
        }
    }
    selected
}
