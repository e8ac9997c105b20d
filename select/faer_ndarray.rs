//! Bridge between `ndarray` matrices and the `faer` symmetric eigensolver.

use faer::diag::DiagRef;
use faer::linalg::solvers;
use faer::{Mat, MatRef, Side};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Self-adjoint eigendecomposition failed: {0:?}")]
    SelfAdjointEigen(solvers::EvdError),
    #[error("Eigendecomposition requires a square matrix, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    Array1::from_shape_fn(mat.nrows(), |i| mat[(i, 0)])
}

enum FaerStorage<'a> {
    Borrowed(MatRef<'a, f64>),
    Owned(Mat<f64>),
}

/// Zero-copy `faer` view of an `ndarray` matrix when its memory layout allows it.
pub struct FaerArrayView<'a> {
    storage: FaerStorage<'a>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let (rows, cols) = array.dim();
        let storage = match array.as_slice_memory_order() {
            Some(slice) if array.is_standard_layout() => {
                FaerStorage::Borrowed(MatRef::from_row_major_slice(slice, rows, cols))
            }
            Some(slice) if array.t().is_standard_layout() => {
                FaerStorage::Borrowed(MatRef::from_column_major_slice(slice, rows, cols))
            }
            _ => FaerStorage::Owned(Mat::from_fn(rows, cols, |i, j| array[(i, j)])),
        };
        Self { storage }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        match &self.storage {
            FaerStorage::Borrowed(view) => *view,
            FaerStorage::Owned(mat) => mat.as_ref(),
        }
    }
}

pub trait FaerEigh {
    /// Eigenvalues in ascending order with eigenvectors as columns.
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerEigh for ArrayBase<S, Ix2> {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError> {
        if self.nrows() != self.ncols() {
            return Err(FaerLinalgError::NotSquare {
                rows: self.nrows(),
                cols: self.ncols(),
            });
        }
        let faer_view = FaerArrayView::new(self);
        let eigen = faer_view
            .as_ref()
            .self_adjoint_eigen(side)
            .map_err(FaerLinalgError::SelfAdjointEigen)?;
        let values = diag_to_array(eigen.S());
        let vectors = mat_to_array(eigen.U());
        Ok((values, vectors))
    }
}

/// Eigenpairs of a symmetric matrix ordered by decreasing eigenvalue.
///
/// Each eigenvector is returned as a row of `vectors` with its sign fixed so
/// that the entry of largest magnitude is positive, which makes repeated
/// decompositions of the same matrix comparable.
pub struct DescendingEigen {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

pub fn descending_eigh<S: Data<Elem = f64>>(
    matrix: &ArrayBase<S, Ix2>,
) -> Result<DescendingEigen, FaerLinalgError> {
    let (ascending_values, ascending_vectors) = matrix.eigh(Side::Lower)?;
    let n = ascending_values.len();
    let mut values = Array1::zeros(n);
    let mut vectors = Array2::zeros((n, n));
    for (rank, source) in (0..n).rev().enumerate() {
        values[rank] = ascending_values[source];
        let column = ascending_vectors.column(source);
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        vectors
            .index_axis_mut(Axis(0), rank)
            .assign(&column.mapv(|v| v * sign));
    }
    Ok(DescendingEigen { values, vectors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn descending_order_and_reconstruction() {
        let m = array![[4.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 1.0]];
        let eigen = descending_eigh(&m).unwrap();

        assert!(eigen.values[0] >= eigen.values[1]);
        assert!(eigen.values[1] >= eigen.values[2]);

        let mut rebuilt = Array2::<f64>::zeros((3, 3));
        for k in 0..3 {
            let v = eigen.vectors.row(k);
            for i in 0..3 {
                for j in 0..3 {
                    rebuilt[[i, j]] += eigen.values[k] * v[i] * v[j];
                }
            }
        }
        for (a, b) in rebuilt.iter().zip(m.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn sign_convention_is_stable() {
        let m = array![[2.0, 0.0], [0.0, 1.0]];
        let eigen = descending_eigh(&m).unwrap();
        assert_abs_diff_eq!(eigen.values[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eigen.vectors[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(eigen.vectors[[1, 1]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_square_rejected() {
        let m = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            m.eigh(Side::Lower),
            Err(FaerLinalgError::NotSquare { rows: 2, cols: 3 })
        ));
    }
}
