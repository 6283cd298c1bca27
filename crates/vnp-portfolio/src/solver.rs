//! Thin wrapper over clarabel for the greedy allocator's continuous relaxation.
//!
//! Every problem here has the shape
//!
//! ```text
//! minimize    ½ zᵀ diag(p) z + qᵀ z
//! subject to  G z ≤ h
//! ```
//!
//! with G given as dense rows. Allocation problems stay well under a few
//! hundred variables, so densifying before the CSC conversion is fine.

use clarabel::algebra::*;
use clarabel::solver::*;
use serde::Serialize;

use crate::allocator::AllocationError;

/// Outcome of one relaxation solve, reduced to what the greedy allocator acts on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationStatus {
    Solved,
    /// Reduced-accuracy optimum; still usable as a starting point.
    AlmostSolved,
    Infeasible,
    /// Iteration cap, numerical trouble or any other terminal status.
    Failed(String),
    /// Relaxation skipped; allocator fell back to the naive floor.
    Skipped,
}

impl RelaxationStatus {
    /// True when the solver's iterate can seed the floor phase.
    pub fn usable(&self) -> bool {
        matches!(self, RelaxationStatus::Solved | RelaxationStatus::AlmostSolved)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Relaxation {
    pub status: RelaxationStatus,
    pub x: Vec<f64>,
}

/// Dense inequality system `G z ≤ h`.
#[derive(Clone, Debug, Default)]
pub(crate) struct Inequalities {
    pub rows: Vec<Vec<f64>>,
    pub rhs: Vec<f64>,
}

impl Inequalities {
    pub fn push(&mut self, row: Vec<f64>, rhs: f64) {
        self.rows.push(row);
        self.rhs.push(rhs);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Column-compressed copy of a dense row-major matrix. Row indices come out
/// sorted within each column, which clarabel requires.
fn dense_to_csc(rows: &[Vec<f64>], ncols: usize) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(ncols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..ncols {
        for (i, row) in rows.iter().enumerate() {
            let v = row[j];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }
    CscMatrix::new(rows.len(), ncols, colptr, rowval, nzval)
}

/// Diagonal quadratic term. Upper-triangular by construction.
fn diagonal_csc(diag: &[f64]) -> CscMatrix<f64> {
    let n = diag.len();
    let mut colptr = Vec::with_capacity(n + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for (j, &d) in diag.iter().enumerate() {
        if d != 0.0 {
            rowval.push(j);
            nzval.push(d);
        }
        colptr.push(nzval.len());
    }
    CscMatrix::new(n, n, colptr, rowval, nzval)
}

/// Quadratic program with diagonal P: minimize ½ zᵀ diag(p) z + qᵀz subject to `g`.
pub(crate) fn solve_qp(
    p_diag: &[f64],
    q: &[f64],
    g: &Inequalities,
    max_iter: u32,
) -> Result<Relaxation, AllocationError> {
    let n = q.len();
    if p_diag.len() != n || g.rows.iter().any(|r| r.len() != n) {
        return Err(AllocationError::Solver {
            detail: format!("dimension mismatch: {n} variables"),
        });
    }

    let p = diagonal_csc(p_diag);
    let a = dense_to_csc(&g.rows, n);
    let cones = [NonnegativeConeT(g.len())];

    let settings = DefaultSettingsBuilder::default()
        .max_iter(max_iter)
        .verbose(false)
        .build()
        .map_err(|e| AllocationError::Solver {
            detail: format!("failed to build settings: {e}"),
        })?;

    let mut solver = DefaultSolver::new(&p, q, &a, &g.rhs, &cones, settings).map_err(|e| {
        AllocationError::Solver {
            detail: format!("failed to create solver: {e:?}"),
        }
    })?;

    solver.solve();

    let status = match solver.solution.status {
        SolverStatus::Solved => RelaxationStatus::Solved,
        SolverStatus::AlmostSolved => RelaxationStatus::AlmostSolved,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            RelaxationStatus::Infeasible
        }
        other => RelaxationStatus::Failed(format!("{other:?}")),
    };

    Ok(Relaxation {
        status,
        x: solver.solution.x.clone(),
    })
}
