//! Generalized subset designs (GSD).
//!
//! A GSD is a balanced fraction of a multi-level full factorial. The levels
//! of every factor are split into `reduction` interleaved partitions; an
//! orthogonal array built from a cyclic Latin square picks which partition of
//! each factor is combined with which, and every picked combination is
//! expanded as a full factorial. Larger reductions give smaller designs.

use dp_types::{validation_error, DpResult};

/// Level numbers (1-based) of each factor in each partition:
/// `partitions[p][factor]`.
fn make_partitions(levels: &[usize], reduction: usize) -> Vec<Vec<Vec<usize>>> {
    (1..=reduction)
        .map(|partition| {
            levels
                .iter()
                .map(|&count| (partition..=count).step_by(reduction).collect())
                .collect()
        })
        .collect()
}

/// Orthogonal array over partition indices with `n_cols` columns and
/// `reduction^(n_cols - 1)` rows.
fn orthogonal_array(reduction: usize, n_cols: usize) -> Vec<Vec<usize>> {
    let latin = |row: usize, col: usize| (row + col) % reduction;

    let mut blocks: Vec<Vec<Vec<usize>>> = (0..reduction).map(|v| vec![vec![v]]).collect();
    let mut width = 1;
    while width < n_cols {
        blocks = (0..reduction)
            .map(|i| {
                (0..reduction)
                    .flat_map(|constant| {
                        blocks[latin(i, constant)].iter().map(move |row| {
                            let mut extended = Vec::with_capacity(row.len() + 1);
                            extended.push(constant);
                            extended.extend_from_slice(row);
                            extended
                        })
                    })
                    .collect()
            })
            .collect();
        width += 1;
    }
    blocks.swap_remove(0)
}

/// Cartesian product of level sets, last factor varying fastest.
fn product(sets: &[&[usize]]) -> Vec<Vec<usize>> {
    sets.iter().fold(vec![Vec::new()], |acc, set| {
        acc.iter()
            .flat_map(|prefix| {
                set.iter().map(move |&level| {
                    let mut row = prefix.clone();
                    row.push(level);
                    row
                })
            })
            .collect()
    })
}

/// Generalized subset design.
///
/// `levels[i]` is the number of levels of factor `i`; the result holds
/// 0-based level indices, one row per run. Fails when `reduction < 2` or when
/// some factor has fewer levels than partitions.
pub fn gsd(levels: &[usize], reduction: usize) -> DpResult<Vec<Vec<usize>>> {
    if levels.is_empty() {
        return Err(validation_error!("a design needs at least one factor"));
    }
    if reduction < 2 {
        return Err(validation_error!(
            "reduction has to be integer larger than 1, not {}",
            reduction
        ));
    }

    let partitions = make_partitions(levels, reduction);
    let mut design = Vec::new();
    for row in orthogonal_array(reduction, levels.len()) {
        let sets: Vec<&[usize]> = row
            .iter()
            .enumerate()
            .map(|(factor, &p)| partitions[p][factor].as_slice())
            .collect();
        if sets.iter().any(|set| set.is_empty()) {
            return Err(validation_error!(
                "reduction {} too large compared to factor levels {:?}",
                reduction,
                levels
            ));
        }
        design.extend(
            product(&sets)
                .into_iter()
                .map(|run| run.into_iter().map(|level| level - 1).collect::<Vec<_>>()),
        );
    }
    Ok(design)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn partitions_interleave_levels() {
        let partitions = make_partitions(&[5, 2], 2);
        assert_eq!(partitions[0], vec![vec![1, 3, 5], vec![1]]);
        assert_eq!(partitions[1], vec![vec![2, 4], vec![2]]);
    }

    #[test]
    fn orthogonal_array_is_balanced_in_pairs() {
        let oa = orthogonal_array(3, 3);
        assert_eq!(oa.len(), 9);
        for a in 0..3 {
            for b in a + 1..3 {
                let pairs: HashSet<(usize, usize)> = oa.iter().map(|r| (r[a], r[b])).collect();
                assert_eq!(pairs.len(), 9);
            }
        }
    }

    #[test]
    fn two_factor_reduction_two() {
        let design = gsd(&[5, 5], 2).unwrap();
        // {1,3,5}x{1,3,5} plus {2,4}x{2,4}
        assert_eq!(design.len(), 13);
        assert_eq!(design[0], vec![0, 0]);
        assert!(design.contains(&vec![1, 3]));
        assert!(!design.contains(&vec![0, 1]));
    }

    #[test]
    fn every_level_appears_in_every_column() {
        let levels = [5, 4, 3];
        let design = gsd(&levels, 3).unwrap();
        for (col, &count) in levels.iter().enumerate() {
            let seen: HashSet<usize> = design.iter().map(|r| r[col]).collect();
            assert_eq!(seen.len(), count, "column {col}");
        }
        let unique: HashSet<&Vec<usize>> = design.iter().collect();
        assert_eq!(unique.len(), design.len());
    }

    #[test]
    fn single_factor_uses_first_partition() {
        let design = gsd(&[5], 2).unwrap();
        assert_eq!(design, vec![vec![0], vec![2], vec![4]]);
    }

    #[test]
    fn rejects_bad_reduction() {
        assert!(gsd(&[5, 5], 1).is_err());
        assert!(gsd(&[2, 5], 3).is_err());
        assert!(gsd(&[], 2).is_err());
    }
}
