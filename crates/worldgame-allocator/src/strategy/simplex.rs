//! Dense two-phase simplex
//!
//! Maximizes `c·x` subject to linear constraints and `x ≥ 0`. Pivoting uses
//! Bland's rule (lowest eligible index enters, lowest basic index leaves on
//! ratio ties), which rules out cycling; an iteration cap bounds the work.
//!
//! Phase 1 minimizes the sum of artificial variables to find a feasible
//! basis; phase 2 optimizes the real objective from there.

/// Tolerance for pivots and reduced costs
const EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub coefficients: Vec<f64>,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(coefficients: Vec<f64>, relation: Relation, rhs: f64) -> Self {
        Self {
            coefficients,
            relation,
            rhs,
        }
    }
}

/// `max objective·x` subject to `constraints`, `x ≥ 0`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearProgram {
    pub objective: Vec<f64>,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpError {
    Infeasible,
    Unbounded,
    IterationLimit(usize),
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    basis: Vec<usize>,
    /// Reduced costs of the current objective
    reduced: Vec<f64>,
    value: f64,
    iterations: usize,
}

impl Tableau {
    fn pivot(&mut self, row: usize, col: usize) {
        let p = self.rows[row][col];
        for v in self.rows[row].iter_mut() {
            *v /= p;
        }
        self.rhs[row] /= p;

        let pivot_row = self.rows[row].clone();
        let pivot_rhs = self.rhs[row];
        for i in 0..self.rows.len() {
            if i == row {
                continue;
            }
            let factor = self.rows[i][col];
            if factor.abs() <= f64::EPSILON {
                continue;
            }
            for (v, p) in self.rows[i].iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
            self.rhs[i] -= factor * pivot_rhs;
        }

        let factor = self.reduced[col];
        if factor.abs() > f64::EPSILON {
            for (v, p) in self.reduced.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
            self.value += factor * pivot_rhs;
        }
        self.basis[row] = col;
    }

    /// Load an objective and express it over the non-basic columns
    fn set_objective(&mut self, costs: Vec<f64>) {
        self.reduced = costs;
        self.value = 0.0;
        for row in 0..self.rows.len() {
            let factor = self.reduced[self.basis[row]];
            if factor.abs() <= f64::EPSILON {
                continue;
            }
            for (v, a) in self.reduced.iter_mut().zip(&self.rows[row]) {
                *v -= factor * a;
            }
            self.value += factor * self.rhs[row];
        }
    }

    fn optimize(&mut self, allowed: &[bool], max_iterations: usize) -> Result<(), LpError> {
        loop {
            let entering = (0..self.reduced.len()).find(|&j| allowed[j] && self.reduced[j] > EPS);
            let Some(col) = entering else {
                return Ok(());
            };
            if self.iterations >= max_iterations {
                return Err(LpError::IterationLimit(self.iterations));
            }

            let mut leaving: Option<(usize, f64)> = None;
            for row in 0..self.rows.len() {
                let a = self.rows[row][col];
                if a <= EPS {
                    continue;
                }
                let ratio = self.rhs[row] / a;
                leaving = match leaving {
                    None => Some((row, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - EPS
                            || (ratio <= best_ratio + EPS && self.basis[row] < self.basis[best])
                        {
                            Some((row, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }
            let Some((row, _)) = leaving else {
                return Err(LpError::Unbounded);
            };

            self.pivot(row, col);
            self.iterations += 1;
        }
    }
}

/// Solve a linear program
pub fn solve(lp: &LinearProgram, max_iterations: usize) -> Result<LpSolution, LpError> {
    let n = lp.objective.len();
    let m = lp.constraints.len();

    // Normalize so every right-hand side is non-negative
    let constraints: Vec<Constraint> = lp
        .constraints
        .iter()
        .map(|c| {
            if c.rhs < 0.0 {
                let relation = match c.relation {
                    Relation::LessEq => Relation::GreaterEq,
                    Relation::GreaterEq => Relation::LessEq,
                    Relation::Equal => Relation::Equal,
                };
                Constraint::new(c.coefficients.iter().map(|a| -a).collect(), relation, -c.rhs)
            } else {
                c.clone()
            }
        })
        .collect();

    let slack_count = constraints
        .iter()
        .filter(|c| c.relation != Relation::Equal)
        .count();
    let artificial_count = constraints
        .iter()
        .filter(|c| c.relation != Relation::LessEq)
        .count();
    let width = n + slack_count + artificial_count;

    let mut rows = Vec::with_capacity(m);
    let mut rhs = Vec::with_capacity(m);
    let mut basis = Vec::with_capacity(m);
    let mut is_artificial = vec![false; width];
    let mut next_slack = n;
    let mut next_artificial = n + slack_count;

    for c in &constraints {
        let mut row = vec![0.0; width];
        for (j, a) in c.coefficients.iter().enumerate().take(n) {
            row[j] = *a;
        }
        match c.relation {
            Relation::LessEq => {
                row[next_slack] = 1.0;
                basis.push(next_slack);
                next_slack += 1;
            }
            Relation::GreaterEq => {
                row[next_slack] = -1.0;
                next_slack += 1;
                row[next_artificial] = 1.0;
                is_artificial[next_artificial] = true;
                basis.push(next_artificial);
                next_artificial += 1;
            }
            Relation::Equal => {
                row[next_artificial] = 1.0;
                is_artificial[next_artificial] = true;
                basis.push(next_artificial);
                next_artificial += 1;
            }
        }
        rows.push(row);
        rhs.push(c.rhs);
    }

    let mut tableau = Tableau {
        rows,
        rhs,
        basis,
        reduced: vec![0.0; width],
        value: 0.0,
        iterations: 0,
    };

    if artificial_count > 0 {
        let phase_one: Vec<f64> = is_artificial
            .iter()
            .map(|&a| if a { -1.0 } else { 0.0 })
            .collect();
        tableau.set_objective(phase_one);
        tableau.optimize(&vec![true; width], max_iterations)?;

        let scale = 1.0 + constraints.iter().map(|c| c.rhs.abs()).fold(0.0, f64::max);
        if tableau.value < -1e-7 * scale {
            return Err(LpError::Infeasible);
        }

        // Drive zero-level artificials out of the basis where possible
        for row in 0..m {
            if !is_artificial[tableau.basis[row]] {
                continue;
            }
            if let Some(col) = (0..width).find(|&j| !is_artificial[j] && tableau.rows[row][j].abs() > EPS) {
                tableau.pivot(row, col);
            }
        }
    }

    let mut costs = vec![0.0; width];
    costs[..n].copy_from_slice(&lp.objective);
    tableau.set_objective(costs);
    let allowed: Vec<bool> = is_artificial.iter().map(|a| !a).collect();
    tableau.optimize(&allowed, max_iterations)?;

    let mut x = vec![0.0; n];
    for (row, &col) in tableau.basis.iter().enumerate() {
        if col < n {
            x[col] = tableau.rhs[row].max(0.0);
        }
    }
    let objective = lp.objective.iter().zip(&x).map(|(c, v)| c * v).sum();

    Ok(LpSolution {
        x,
        objective,
        iterations: tableau.iterations,
    })
}
