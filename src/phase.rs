//! Phase-space vectors and matrices in homogeneous coordinates
//!
//! Coordinates are ordered `(x, x', y, y', z, z', 1)`. The trailing homogeneous coordinate turns
//! affine maps (linear part plus a constant offset) into plain 7x7 matrix products.

use std::fmt::Display;
use std::ops::{Index, Mul};

use nalgebra::{Matrix2, Matrix6, SMatrix, SVector, Vector6};

use crate::error::ModelError;

mod map;

pub use map::PhaseMap;

/// Number of homogeneous phase coordinates
pub const DIM: usize = 7;

/// Underlying storage of a [PhaseMatrix]
pub type Matrix7 = SMatrix<f64, DIM, DIM>;
/// Underlying storage of a [PhaseVector]
pub type Vector7 = SVector<f64, DIM>;

/// Named phase-space coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseIndex {
    /// Horizontal position
    X = 0,
    /// Horizontal slope
    Xp = 1,
    /// Vertical position
    Y = 2,
    /// Vertical slope
    Yp = 3,
    /// Longitudinal position
    Z = 4,
    /// Longitudinal slope
    Zp = 5,
    /// Homogeneous coordinate
    Hom = 6,
}

/// Phase planes, each owning a 2x2 diagonal block of a [PhaseMatrix]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// x, x'
    Horizontal,
    /// y, y'
    Vertical,
    /// z, z'
    Longitudinal,
}

impl Plane {
    /// All planes in coordinate order
    pub const ALL: [Plane; 3] = [Plane::Horizontal, Plane::Vertical, Plane::Longitudinal];

    /// Index of the position coordinate of this plane
    pub fn offset(self) -> usize {
        match self {
            Plane::Horizontal => 0,
            Plane::Vertical => 2,
            Plane::Longitudinal => 4,
        }
    }
}

/// Point in phase space. The homogeneous coordinate is always 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseVector(Vector7);

impl PhaseVector {
    /// Construct from the six phase coordinates
    pub fn new(coords: [f64; 6]) -> PhaseVector {
        let mut vec = Vector7::zeros();
        vec.fixed_rows_mut::<6>(0).copy_from_slice(&coords);
        vec[PhaseIndex::Hom as usize] = 1.0;
        PhaseVector(vec)
    }

    /// The origin of phase space
    pub fn zero() -> PhaseVector {
        PhaseVector::new([0.0; 6])
    }

    /// Value of a named coordinate
    pub fn get(&self, index: PhaseIndex) -> f64 {
        self.0[index as usize]
    }

    /// The six phase coordinates, without the homogeneous coordinate
    pub fn coords(&self) -> Vector6<f64> {
        self.0.fixed_rows::<6>(0).into_owned()
    }

    /// Raw homogeneous storage
    pub fn as_vector(&self) -> &Vector7 {
        &self.0
    }
}

impl Index<PhaseIndex> for PhaseVector {
    type Output = f64;

    fn index(&self, index: PhaseIndex) -> &f64 {
        &self.0[index as usize]
    }
}

/// Affine transformation of phase space.
///
/// The bottom row of a valid transfer matrix is `[0, 0, 0, 0, 0, 0, 1]`. Composition follows the
/// apply-first-on-the-right convention: applying `a` and then `b` is `b.times(&a)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseMatrix(Matrix7);

impl PhaseMatrix {
    /// The identity map
    pub fn identity() -> PhaseMatrix {
        PhaseMatrix(Matrix7::identity())
    }

    /// The translation `z -> z + offset`
    pub fn translation(offset: [f64; 6]) -> PhaseMatrix {
        let mut mat = Matrix7::identity();
        mat.fixed_view_mut::<6, 1>(0, 6).copy_from_slice(&offset);
        PhaseMatrix(mat)
    }

    /// Wrap a raw matrix. The caller is responsible for keeping the bottom row affine.
    pub fn from_matrix(mat: Matrix7) -> PhaseMatrix {
        PhaseMatrix(mat)
    }

    /// Raw 7x7 storage
    pub fn as_matrix(&self) -> &Matrix7 {
        &self.0
    }

    /// Element at `(row, col)`, 0-indexed.
    ///
    /// # Panics
    /// Panics when either index is outside `0..7`.
    pub fn get_elem(&self, row: usize, col: usize) -> f64 {
        self.0[(row, col)]
    }

    /// Set the element at `(row, col)`, 0-indexed.
    ///
    /// # Panics
    /// Panics when either index is outside `0..7`.
    pub fn set_elem(&mut self, row: usize, col: usize, value: f64) {
        self.0[(row, col)] = value;
    }

    /// Matrix product `self * rhs`, i.e. `rhs` applied first
    pub fn times(&self, rhs: &PhaseMatrix) -> PhaseMatrix {
        PhaseMatrix(self.0 * rhs.0)
    }

    /// Apply the map to a phase vector
    pub fn apply(&self, vec: &PhaseVector) -> PhaseVector {
        PhaseVector(self.0 * vec.0)
    }

    /// Transpose of the full homogeneous matrix
    pub fn transpose(&self) -> PhaseMatrix {
        PhaseMatrix(self.0.transpose())
    }

    /// Similarity-type transform `r * self * r^T`, as used to propagate covariance matrices
    pub fn conjugate_trans(&self, r: &PhaseMatrix) -> PhaseMatrix {
        PhaseMatrix(r.0 * self.0 * r.0.transpose())
    }

    /// Inverse of the affine map.
    ///
    /// Only the 6x6 phase block is inverted; the offset column follows as `-A^-1 b`. Fails with
    /// [ModelError::SingularMatrix] when the phase block is not invertible.
    pub fn inverse(&self) -> Result<PhaseMatrix, ModelError> {
        let linear: Matrix6<f64> = self.0.fixed_view::<6, 6>(0, 0).into_owned();
        let offset: Vector6<f64> = self.0.fixed_view::<6, 1>(0, 6).into_owned();

        let inv = linear.try_inverse().ok_or(ModelError::SingularMatrix)?;
        if !inv.iter().all(|x| x.is_finite()) {
            return Err(ModelError::SingularMatrix);
        }

        let mut res = Matrix7::identity();
        res.fixed_view_mut::<6, 6>(0, 0).copy_from(&inv);
        res.fixed_view_mut::<6, 1>(0, 6).copy_from(&(-(inv * offset)));

        Ok(PhaseMatrix(res))
    }

    /// Map taking the state at `from` to the state at `to`, where both are accumulated from a
    /// common origin: `to * from^-1`
    pub fn between(to: &PhaseMatrix, from: &PhaseMatrix) -> Result<PhaseMatrix, ModelError> {
        Ok(to.times(&from.inverse()?))
    }

    /// Determinant of the 6x6 phase block
    pub fn determinant(&self) -> f64 {
        self.0.fixed_view::<6, 6>(0, 0).into_owned().determinant()
    }

    /// 2x2 diagonal block belonging to `plane`
    pub fn block(&self, plane: Plane) -> Matrix2<f64> {
        let i = plane.offset();
        self.0.fixed_view::<2, 2>(i, i).into_owned()
    }

    /// Overwrite the 2x2 diagonal block belonging to `plane`
    pub fn set_block(&mut self, plane: Plane, block: &Matrix2<f64>) {
        let i = plane.offset();
        self.0.fixed_view_mut::<2, 2>(i, i).copy_from(block);
    }

    /// Build a block-diagonal matrix from one 2x2 block per plane
    pub fn from_blocks(x: &Matrix2<f64>, y: &Matrix2<f64>, z: &Matrix2<f64>) -> PhaseMatrix {
        let mut mat = PhaseMatrix::identity();
        mat.set_block(Plane::Horizontal, x);
        mat.set_block(Plane::Vertical, y);
        mat.set_block(Plane::Longitudinal, z);
        mat
    }

    /// Whether the bottom row is exactly `[0, .., 0, 1]`
    pub fn is_affine(&self) -> bool {
        (0..DIM - 1).all(|col| self.0[(DIM - 1, col)] == 0.0) && self.0[(DIM - 1, DIM - 1)] == 1.0
    }

    /// Largest absolute element-wise difference
    pub fn max_abs_diff(&self, other: &PhaseMatrix) -> f64 {
        (self.0 - other.0).amax()
    }
}

impl Index<(usize, usize)> for PhaseMatrix {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &f64 {
        &self.0[index]
    }
}

impl Mul for PhaseMatrix {
    type Output = PhaseMatrix;

    fn mul(self, rhs: PhaseMatrix) -> PhaseMatrix {
        self.times(&rhs)
    }
}

impl Mul<PhaseVector> for PhaseMatrix {
    type Output = PhaseVector;

    fn mul(self, rhs: PhaseVector) -> PhaseVector {
        self.apply(&rhs)
    }
}

impl Display for PhaseMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..DIM {
            for col in 0..DIM {
                write!(f, "{:>16.8e}", self.0[(row, col)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Matrix2;
    use proptest::prelude::*;

    use super::{PhaseIndex, PhaseMatrix, PhaseVector, Plane};
    use crate::error::ModelError;

    fn sample_matrix(entries: &[f64], offsets: &[f64]) -> PhaseMatrix {
        // Diagonally dominant, hence invertible
        let mut mat = PhaseMatrix::identity();
        for row in 0..6 {
            for col in 0..6 {
                let value = entries[row * 6 + col];
                mat.set_elem(row, col, if row == col { 8.0 + value } else { value });
            }
            mat.set_elem(row, 6, offsets[row]);
        }
        mat
    }

    #[test]
    fn identity_and_elements() {
        let mut mat = PhaseMatrix::identity();
        assert!(mat.is_affine());
        mat.set_elem(0, 1, 2.5);
        assert_eq!(mat.get_elem(0, 1), 2.5);
        assert_eq!(mat[(0, 1)], 2.5);
        assert_eq!(mat.get_elem(6, 6), 1.0);
    }

    #[test]
    fn apply_keeps_homogeneous_coordinate() {
        let mat = PhaseMatrix::translation([1.0, 0.0, -1.0, 0.0, 0.5, 0.0]);
        let vec = mat.apply(&PhaseVector::new([0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));

        assert_eq!(vec[PhaseIndex::Hom], 1.0);
        assert!((vec.get(PhaseIndex::X) - 1.1).abs() < 1e-15);
        assert!((vec.get(PhaseIndex::Y) + 0.7).abs() < 1e-15);
        assert!((vec.get(PhaseIndex::Z) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn blocks() {
        let x = Matrix2::new(1.0, 2.0, 3.0, 4.0);
        let y = Matrix2::new(5.0, 6.0, 7.0, 8.0);
        let z = Matrix2::new(9.0, 10.0, 11.0, 12.0);
        let mat = PhaseMatrix::from_blocks(&x, &y, &z);

        assert_eq!(mat.block(Plane::Horizontal), x);
        assert_eq!(mat.block(Plane::Vertical), y);
        assert_eq!(mat.block(Plane::Longitudinal), z);
        assert_eq!(mat.get_elem(3, 2), 7.0);
        assert_eq!(mat.get_elem(0, 2), 0.0);
    }

    #[test]
    fn singular_matrix() {
        let mut mat = PhaseMatrix::identity();
        mat.set_elem(0, 0, 0.0);

        assert!(matches!(mat.inverse(), Err(ModelError::SingularMatrix)));
    }

    #[test]
    fn conjugate_transform() {
        let mut r = PhaseMatrix::identity();
        r.set_elem(0, 1, 1.0);
        let mut sigma = PhaseMatrix::identity();
        sigma.set_elem(6, 6, 0.0);

        let res = sigma.conjugate_trans(&r);

        assert_eq!(res.get_elem(0, 0), 2.0);
        assert_eq!(res.get_elem(0, 1), 1.0);
        assert_eq!(res.get_elem(1, 0), 1.0);
        assert_eq!(res.get_elem(1, 1), 1.0);
    }

    proptest! {
        #[test]
        fn composition_order(
            a in prop::collection::vec(-1.0f64..1.0, 36),
            a_off in prop::collection::vec(-1.0f64..1.0, 6),
            b in prop::collection::vec(-1.0f64..1.0, 36),
            b_off in prop::collection::vec(-1.0f64..1.0, 6),
            v in prop::array::uniform6(-1.0f64..1.0),
        ) {
            let a = sample_matrix(&a, &a_off);
            let b = sample_matrix(&b, &b_off);
            let v = PhaseVector::new(v);

            let sequential = b.apply(&a.apply(&v));
            let composed = b.times(&a).apply(&v);

            for i in 0..7 {
                prop_assert!((sequential.as_vector()[i] - composed.as_vector()[i]).abs() < 1e-10);
            }
            prop_assert_eq!(composed[PhaseIndex::Hom], 1.0);
        }

        #[test]
        fn inverse_round_trip(
            a in prop::collection::vec(-1.0f64..1.0, 36),
            a_off in prop::collection::vec(-1.0f64..1.0, 6),
        ) {
            let mat = sample_matrix(&a, &a_off);
            let inv = mat.inverse().unwrap();

            prop_assert!(mat.times(&inv).max_abs_diff(&PhaseMatrix::identity()) < 1e-9);
            prop_assert!(inv.times(&mat).max_abs_diff(&PhaseMatrix::identity()) < 1e-9);
            prop_assert!(inv.is_affine());
        }
    }
}
