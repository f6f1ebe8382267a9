//! One-dimensional effective mass Hamiltonians on a uniform grid
//!
//! The kinetic operator `-hbar^2 / 2 d/dz (1/m d/dz)` is discretised with the three point
//! stencil. The hopping between neighbouring sites uses the mean of their inverse masses
//! and the domain ends are hard walls, so the end sites couple to an absent neighbour
//! with their own mass.

use crate::constants::HBAR;
use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// A real symmetric tridiagonal matrix
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TridiagonalHamiltonian {
    diagonal: Vec<f64>,
    off_diagonal: Vec<f64>,
}

impl TridiagonalHamiltonian {
    /// Assemble the Hamiltonian for potential energy `potential` and absolute masses `masses`
    pub(crate) fn effective_mass(potential: &[f64], masses: &[f64], spacing: f64) -> Self {
        debug_assert_eq!(potential.len(), masses.len());
        let n = potential.len();
        let prefactor = -HBAR * HBAR / (2_f64 * spacing * spacing);

        let off_diagonal: Vec<f64> = masses
            .windows(2)
            .map(|pair| prefactor * 0.5 * (1_f64 / pair[0] + 1_f64 / pair[1]))
            .collect();

        let diagonal = (0..n)
            .map(|j| {
                let own = prefactor / masses[j];
                let left = if j == 0 { own } else { off_diagonal[j - 1] };
                let right = if j + 1 == n { own } else { off_diagonal[j] };
                potential[j] - (left + right)
            })
            .collect();

        Self {
            diagonal,
            off_diagonal,
        }
    }

    pub(crate) fn dimension(&self) -> usize {
        self.diagonal.len()
    }

    fn to_dense(&self) -> DMatrix<f64> {
        let n = self.dimension();
        let mut matrix = DMatrix::from_diagonal(&DVector::from_column_slice(&self.diagonal));
        for (j, &t) in self.off_diagonal.iter().enumerate() {
            matrix[(j, j + 1)] = t;
            matrix[(j + 1, j)] = t;
        }
        debug_assert_eq!(matrix.nrows(), n);
        matrix
    }

    /// Computes `H v`
    #[cfg(test)]
    pub(crate) fn apply(&self, vector: &DVector<f64>) -> DVector<f64> {
        let n = self.dimension();
        DVector::from_fn(n, |j, _| {
            let mut value = self.diagonal[j] * vector[j];
            if j > 0 {
                value += self.off_diagonal[j - 1] * vector[j - 1];
            }
            if j + 1 < n {
                value += self.off_diagonal[j] * vector[j + 1];
            }
            value
        })
    }

    /// Full eigen-decomposition with eigenvalues in ascending order
    pub(crate) fn eigen(&self) -> Eigenpairs {
        let decomposition = SymmetricEigen::new(self.to_dense());
        let mut order: Vec<usize> = (0..self.dimension()).collect();
        // stable, so degenerate pairs keep the decomposition's order
        order.sort_by(|&a, &b| {
            decomposition.eigenvalues[a].total_cmp(&decomposition.eigenvalues[b])
        });
        let values = order
            .iter()
            .map(|&k| decomposition.eigenvalues[k])
            .collect();
        let vectors = DMatrix::from_fn(self.dimension(), self.dimension(), |row, col| {
            decomposition.eigenvectors[(row, order[col])]
        });
        Eigenpairs { values, vectors }
    }
}

/// Eigenvalues in ascending order with the normalised eigenvectors stored column-wise
#[derive(Clone, Debug)]
pub(crate) struct Eigenpairs {
    pub(crate) values: Vec<f64>,
    pub(crate) vectors: DMatrix<f64>,
}

impl Eigenpairs {
    pub(crate) fn ground_state(&self) -> (f64, DVector<f64>) {
        (self.values[0], self.vectors.column(0).into_owned())
    }
}
