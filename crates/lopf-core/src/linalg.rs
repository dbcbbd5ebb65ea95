//! Dense LU factorization with partial pivoting.
//!
//! Used for the reduced susceptance solves behind PTDF computation and
//! post-hoc voltage angle recovery. Sub-network reduced matrices are
//! small and well-conditioned; a dense factorization is sufficient
//! (for very large networks a sparse direct solver would take over).

use thiserror::Error;

#[derive(Debug, Error)]
#[error("matrix is singular")]
pub struct SingularMatrix;

/// LU factors of a square matrix, reusable across right-hand sides.
#[derive(Debug, Clone)]
pub struct DenseLu {
    lu: Vec<Vec<f64>>,
    perm: Vec<usize>,
}

impl DenseLu {
    /// Factorize `a` (consumed) with partial pivoting.
    pub fn factor(mut a: Vec<Vec<f64>>) -> Result<Self, SingularMatrix> {
        let n = a.len();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Find pivot
            let mut max_val = a[k][k].abs();
            let mut max_row = k;
            for i in (k + 1)..n {
                if a[i][k].abs() > max_val {
                    max_val = a[i][k].abs();
                    max_row = i;
                }
            }

            if max_val < 1e-12 {
                return Err(SingularMatrix);
            }

            if max_row != k {
                a.swap(k, max_row);
                perm.swap(k, max_row);
            }

            // Elimination
            for i in (k + 1)..n {
                a[i][k] /= a[k][k];
                for j in (k + 1)..n {
                    a[i][j] -= a[i][k] * a[k][j];
                }
            }
        }

        Ok(Self { lu: a, perm })
    }

    /// Solve `A x = b` for one right-hand side.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.len();
        debug_assert_eq!(b.len(), n);

        // Forward substitution (L y = P b)
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut acc = b[self.perm[i]];
            for j in 0..i {
                acc -= self.lu[i][j] * y[j];
            }
            y[i] = acc;
        }

        // Back substitution (U x = y)
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut acc = y[i];
            for j in (i + 1)..n {
                acc -= self.lu[i][j] * x[j];
            }
            x[i] = acc / self.lu[i][i];
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_2x2() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let lu = DenseLu::factor(a).unwrap();
        let x = lu.solve(&[5.0, 10.0]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        // Zero leading entry forces a row swap.
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let lu = DenseLu::factor(a).unwrap();
        let x = lu.solve(&[2.0, 3.0]);
        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_detected() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(DenseLu::factor(a).is_err());
    }

    #[test]
    fn test_solve_3x3_roundtrip() {
        let a = vec![
            vec![4.0, -1.0, 0.0],
            vec![-1.0, 4.0, -1.0],
            vec![0.0, -1.0, 4.0],
        ];
        let lu = DenseLu::factor(a.clone()).unwrap();
        let x = lu.solve(&[1.0, 2.0, 3.0]);
        for i in 0..3 {
            let ax: f64 = (0..3).map(|j| a[i][j] * x[j]).sum();
            assert!((ax - (i as f64 + 1.0)).abs() < 1e-12);
        }
    }
}
