use crate::error::TrackingError;
use crate::my_types::*;

/// Sentinel cost for pruned candidate pairs. Large enough that the solver
/// only picks such a pair when nothing feasible remains, small enough to
/// keep the dual potentials finite.
const PRUNED_COST: f64 = 1e20;

/// Result of a bipartite minimum-cost assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Row i is assigned to column `mapping[i]`; `None` means unassigned.
    pub mapping: Vec<Option<usize>>,
    /// Total cost over the assigned pairs.
    pub cost: f64,
}

impl Assignment {
    pub fn num_assigned(&self) -> usize {
        self.mapping.iter().filter(|m| m.is_some()).count()
    }

    /// Iterator over assigned (row, col) pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter_map(|(row, col)| col.map(|c| (row, c)))
    }
}

fn validate(cost: &Matrixd) -> Result<(), TrackingError> {
    for v in cost.iter() {
        if !v.is_finite() {
            return Err(TrackingError::AssignmentSolver(
                "cost matrix contains a non-finite value".to_string(),
            ));
        }
        if *v < 0. {
            return Err(TrackingError::AssignmentSolver(
                "cost matrix contains a negative value".to_string(),
            ));
        }
    }
    Ok(())
}

/// Minimum-cost one-to-one assignment via shortest augmenting paths with
/// dual potentials (the Jonker-Volgenant flavour of the Hungarian method),
/// O(n^3). Rectangular matrices are padded square internally.
///
/// Columns are scanned in ascending order, so among equal-cost solutions the
/// one pairing the lowest row with the lowest column wins. This is what
/// makes linking deterministic.
pub fn solve(cost: &Matrixd) -> Result<Assignment, TrackingError> {
    validate(cost)?;
    let (n_rows, n_cols) = cost.shape();
    if n_rows == 0 || n_cols == 0 {
        return Ok(Assignment {
            mapping: vec![None; n_rows],
            cost: 0.,
        });
    }

    let n = n_rows.max(n_cols);
    let mut matrix = vec![PRUNED_COST; n * n];
    for i in 0..n_rows {
        for j in 0..n_cols {
            matrix[i * n + j] = cost[(i, j)];
        }
    }

    // Dual potentials for rows and columns.
    let mut u = vec![0.; n];
    let mut v = vec![0.; n];
    // Row currently assigned to each column.
    let mut col_assignment: Vec<Option<usize>> = vec![None; n];

    for i in 0..n {
        // Grow an alternating tree from row i until a free column is found.
        let mut min_to = vec![f64::INFINITY; n];
        let mut way: Vec<Option<usize>> = vec![None; n];
        let mut used = vec![false; n];

        let mut cur_row = i;
        let mut cur_col: Option<usize> = None;

        loop {
            let mut min_val = f64::INFINITY;
            let mut min_col = 0;

            for j in 0..n {
                if used[j] {
                    continue;
                }
                let reduced = matrix[cur_row * n + j] - u[cur_row] - v[j];
                if reduced < min_to[j] {
                    min_to[j] = reduced;
                    way[j] = cur_col;
                }
                if min_to[j] < min_val {
                    min_val = min_to[j];
                    min_col = j;
                }
            }

            for j in 0..n {
                if used[j] {
                    if let Some(row) = col_assignment[j] {
                        u[row] += min_val;
                    }
                    v[j] -= min_val;
                } else {
                    min_to[j] -= min_val;
                }
            }
            u[i] += min_val;

            used[min_col] = true;
            cur_col = Some(min_col);
            match col_assignment[min_col] {
                None => break,
                Some(row) => cur_row = row,
            }
        }

        // Flip the augmenting path back to the tree root.
        let mut col = cur_col;
        while let Some(j) = col {
            let prev = way[j];
            col_assignment[j] = match prev {
                Some(pj) => col_assignment[pj],
                None => Some(i),
            };
            col = prev;
        }
    }

    let mut mapping = vec![None; n_rows];
    for (j, assigned) in col_assignment.iter().enumerate() {
        if let Some(i) = assigned {
            if *i < n_rows && j < n_cols {
                mapping[*i] = Some(j);
            }
        }
    }
    let total = mapping
        .iter()
        .enumerate()
        .filter_map(|(i, j)| j.map(|j| cost[(i, j)]))
        .sum();

    Ok(Assignment { mapping, cost: total })
}

/// Assignment with a gate: pairs whose cost exceeds `gate` are pruned and
/// never appear in the result, even if that leaves rows unassigned.
pub fn solve_gated(cost: &Matrixd, gate: f64) -> Result<Assignment, TrackingError> {
    if !gate.is_finite() || gate < 0. {
        return Err(TrackingError::AssignmentSolver(
            "gate must be finite and non-negative".to_string(),
        ));
    }
    validate(cost)?;

    let (n_rows, n_cols) = cost.shape();
    let gated = Matrixd::from_fn(n_rows, n_cols, |i, j| {
        if cost[(i, j)] <= gate {
            cost[(i, j)]
        } else {
            PRUNED_COST
        }
    });

    let solved = solve(&gated)?;
    let mut mapping = solved.mapping;
    for (i, slot) in mapping.iter_mut().enumerate() {
        if let Some(j) = *slot {
            if cost[(i, j)] > gate {
                *slot = None;
            }
        }
    }
    let total = mapping
        .iter()
        .enumerate()
        .filter_map(|(i, j)| j.map(|j| cost[(i, j)]))
        .sum();

    Ok(Assignment { mapping, cost: total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: usize, cols: usize, data: &[f64]) -> Matrixd {
        Matrixd::from_row_slice(rows, cols, data)
    }

    #[test]
    fn solves_classic_3x3() {
        #[rustfmt::skip]
        let cost = matrix(3, 3, &[
            4., 1., 3.,
            2., 0., 5.,
            3., 2., 2.,
        ]);
        let assignment = solve(&cost).unwrap();
        assert_eq!(assignment.mapping, vec![Some(1), Some(0), Some(2)]);
        assert_eq!(assignment.cost, 5.);
    }

    #[test]
    fn rectangular_leaves_extra_columns_unassigned() {
        #[rustfmt::skip]
        let cost = matrix(2, 3, &[
            1., 9., 9.,
            9., 9., 1.,
        ]);
        let assignment = solve(&cost).unwrap();
        assert_eq!(assignment.mapping, vec![Some(0), Some(2)]);
        assert_eq!(assignment.num_assigned(), 2);
        assert_eq!(assignment.cost, 2.);
    }

    #[test]
    fn gate_prunes_expensive_pairs() {
        #[rustfmt::skip]
        let cost = matrix(2, 2, &[
            1., 50.,
            50., 50.,
        ]);
        let assignment = solve_gated(&cost, 10.).unwrap();
        assert_eq!(assignment.mapping, vec![Some(0), None]);
        assert_eq!(assignment.cost, 1.);
    }

    #[test]
    fn fully_gated_matrix_assigns_nothing() {
        let cost = matrix(2, 2, &[50., 60., 70., 80.]);
        let assignment = solve_gated(&cost, 10.).unwrap();
        assert_eq!(assignment.mapping, vec![None, None]);
        assert_eq!(assignment.cost, 0.);
    }

    #[test]
    fn negative_cost_is_a_solver_error() {
        let cost = matrix(2, 2, &[1., -2., 3., 4.]);
        assert!(matches!(
            solve(&cost),
            Err(TrackingError::AssignmentSolver(_))
        ));
    }

    #[test]
    fn non_finite_cost_is_a_solver_error() {
        let cost = matrix(1, 2, &[1., f64::NAN]);
        assert!(solve(&cost).is_err());
        assert!(solve_gated(&cost, 10.).is_err());
    }

    #[test]
    fn empty_matrix_is_fine() {
        let cost = Matrixd::zeros(0, 5);
        let assignment = solve(&cost).unwrap();
        assert!(assignment.mapping.is_empty());
        assert_eq!(assignment.cost, 0.);
    }

    #[test]
    fn equal_costs_break_ties_towards_lowest_indices() {
        let cost = matrix(2, 2, &[1., 1., 1., 1.]);
        let assignment = solve(&cost).unwrap();
        assert_eq!(assignment.mapping, vec![Some(0), Some(1)]);
    }

    #[test]
    fn repeated_solves_are_identical() {
        #[rustfmt::skip]
        let cost = matrix(3, 4, &[
            3., 7., 1., 9.,
            2., 2., 8., 4.,
            6., 5., 5., 1.,
        ]);
        let a = solve(&cost).unwrap();
        let b = solve(&cost).unwrap();
        assert_eq!(a, b);
    }
}
