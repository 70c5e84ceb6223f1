//! Laurent polynomials with matrix coefficients
//!
//! A [`Polynomial`] maps signed degrees to [`SparseMatrix`] coefficients of a
//! fixed shape. Negative degrees are native; the witness polynomial r(X)
//! spans X^-m … X^(2m+1) and the constraint polynomial s(X) reaches X^-2m.
//!
//! Zero coefficients are never stored. The least and most significant
//! degrees are cached and rescanned from the remaining keys when an erase
//! removes one of them.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::{Result, ZkError};
use crate::field::Field;
use crate::matrix::SparseMatrix;

/// Sparse polynomial in X with `rows × cols` matrix coefficients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polynomial {
    rows: usize,
    cols: usize,
    terms: BTreeMap<i64, SparseMatrix>,
    lsd: Option<i64>,
    msd: Option<i64>,
}

impl Polynomial {
    /// Create the zero polynomial with the given coefficient shape
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(ZkError::invalid("coefficient shape must be non-zero"));
        }
        Ok(Self {
            rows,
            cols,
            terms: BTreeMap::new(),
            lsd: None,
            msd: None,
        })
    }

    /// Coefficient shape `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Set the coefficient of X^degree; a zero matrix erases the term
    pub fn put(&mut self, degree: i64, coefficient: SparseMatrix) -> Result<()> {
        if coefficient.rows() != self.rows || coefficient.cols() != self.cols {
            return Err(ZkError::invalid(format!(
                "coefficient {}x{} does not match polynomial shape {}x{}",
                coefficient.rows(),
                coefficient.cols(),
                self.rows,
                self.cols
            )));
        }
        if coefficient.is_zero() {
            self.erase(degree);
            return Ok(());
        }
        self.terms.insert(degree, coefficient);
        self.lsd = Some(self.lsd.map_or(degree, |d| d.min(degree)));
        self.msd = Some(self.msd.map_or(degree, |d| d.max(degree)));
        Ok(())
    }

    /// Coefficient of X^degree, the zero matrix when absent
    pub fn get(&self, degree: i64) -> SparseMatrix {
        self.terms
            .get(&degree)
            .cloned()
            .unwrap_or_else(|| SparseMatrix::zeros(self.rows, self.cols))
    }

    /// Stored coefficient of X^degree
    pub fn coefficient(&self, degree: i64) -> Option<&SparseMatrix> {
        self.terms.get(&degree)
    }

    /// Remove a term, returning its coefficient
    pub fn erase(&mut self, degree: i64) -> Option<SparseMatrix> {
        let removed = self.terms.remove(&degree)?;
        if self.lsd == Some(degree) {
            self.lsd = self.terms.keys().next().copied();
        }
        if self.msd == Some(degree) {
            self.msd = self.terms.keys().next_back().copied();
        }
        Some(removed)
    }

    /// Least significant degree, `None` for the zero polynomial
    pub fn lsd(&self) -> Option<i64> {
        self.lsd
    }

    /// Most significant degree, `None` for the zero polynomial
    pub fn msd(&self) -> Option<i64> {
        self.msd
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of non-zero terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in ascending degree order
    pub fn terms(&self) -> impl Iterator<Item = (i64, &SparseMatrix)> + '_ {
        self.terms.iter().map(|(&d, m)| (d, m))
    }

    fn accumulate(&mut self, degree: i64, term: SparseMatrix, field: &Field) -> Result<()> {
        let sum = match self.terms.get(&degree) {
            Some(existing) => existing.add(&term, field)?,
            None => term,
        };
        self.put(degree, sum)
    }

    fn same_shape(&self, other: &Polynomial) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(ZkError::invalid(format!(
                "polynomial shape mismatch {:?} vs {:?}",
                self.shape(),
                other.shape()
            )));
        }
        Ok(())
    }

    /// Termwise sum mod p
    pub fn add(&self, other: &Polynomial, field: &Field) -> Result<Polynomial> {
        self.same_shape(other)?;
        let mut out = self.clone();
        for (d, m) in other.terms() {
            out.accumulate(d, m.clone(), field)?;
        }
        Ok(out)
    }

    /// Multiply every coefficient by a scalar
    pub fn scale(&self, k: &BigUint, field: &Field) -> Polynomial {
        let mut out = Polynomial {
            rows: self.rows,
            cols: self.cols,
            terms: BTreeMap::new(),
            lsd: None,
            msd: None,
        };
        for (d, m) in self.terms() {
            let scaled = m.scale(k, field);
            if !scaled.is_zero() {
                out.terms.insert(d, scaled);
            }
        }
        out.refresh_bounds();
        out
    }

    /// Elementwise product of every coefficient with `m`
    pub fn hadamard(&self, m: &SparseMatrix, field: &Field) -> Result<Polynomial> {
        let mut out = Polynomial::new(self.rows, self.cols)?;
        for (d, c) in self.terms() {
            out.put(d, c.hadamard(m, field)?)?;
        }
        Ok(out)
    }

    /// Every coefficient multiplied by `mᵀ`
    pub fn dot(&self, m: &SparseMatrix, field: &Field) -> Result<Polynomial> {
        let mut out = Polynomial::new(self.rows, m.rows())?;
        for (d, c) in self.terms() {
            out.put(d, c.dot(m, field)?)?;
        }
        Ok(out)
    }

    /// Product of two polynomials
    ///
    /// Coefficient products are row inner products ([`SparseMatrix::dot`]),
    /// so two row-vector polynomials multiply to a scalar polynomial.
    pub fn mul(&self, other: &Polynomial, field: &Field) -> Result<Polynomial> {
        if self.cols != other.cols {
            return Err(ZkError::invalid(format!(
                "polynomial width mismatch {} vs {}",
                self.cols, other.cols
            )));
        }
        let mut acc = BTreeMap::<i64, SparseMatrix>::new();
        for (d1, a) in self.terms() {
            for (d2, b) in other.terms() {
                let prod = a.dot(b, field)?;
                if prod.is_zero() {
                    continue;
                }
                let degree = d1 + d2;
                let next = match acc.remove(&degree) {
                    Some(existing) => existing.add(&prod, field)?,
                    None => prod,
                };
                acc.insert(degree, next);
            }
        }
        acc.retain(|_, m| !m.is_zero());
        let mut out = Polynomial {
            rows: self.rows,
            cols: other.rows,
            terms: acc,
            lsd: None,
            msd: None,
        };
        out.refresh_bounds();
        Ok(out)
    }

    /// Evaluate at `x`; negative degrees use x⁻¹
    pub fn eval(&self, x: &BigUint, field: &Field) -> Result<SparseMatrix> {
        let mut out = SparseMatrix::zeros(self.rows, self.cols);
        for (d, m) in self.terms() {
            let weight = field.pow_signed(x, d)?;
            out = out.add(&m.scale(&weight, field), field)?;
        }
        Ok(out)
    }

    /// Evaluate a scalar (1×1) polynomial at `x`
    pub fn eval_scalar(&self, x: &BigUint, field: &Field) -> Result<BigUint> {
        if self.shape() != (1, 1) {
            return Err(ZkError::invalid("eval_scalar needs 1x1 coefficients"));
        }
        Ok(self.eval(x, field)?.cell(0, 0).cloned().unwrap_or_else(BigUint::zero))
    }

    fn refresh_bounds(&mut self) {
        self.lsd = self.terms.keys().next().copied();
        self.msd = self.terms.keys().next_back().copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Field {
        Field::new(BigUint::from(101u32)).unwrap()
    }

    fn scalar(v: i64) -> SparseMatrix {
        SparseMatrix::from_i64_row(&field(), &[v]).unwrap()
    }

    fn poly(terms: &[(i64, i64)]) -> Polynomial {
        let mut p = Polynomial::new(1, 1).unwrap();
        for &(d, v) in terms {
            p.put(d, scalar(v)).unwrap();
        }
        p
    }

    #[test]
    fn test_get_absent_is_zero() {
        let p = poly(&[(2, 5)]);
        assert!(p.get(7).is_zero());
        assert_eq!(p.get(2).get(0, 0), BigUint::from(5u32));
    }

    #[test]
    fn test_put_zero_is_pruned() {
        let mut p = poly(&[(-3, 1), (4, 2)]);
        p.put(4, scalar(0)).unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.msd(), Some(-3));
    }

    #[test]
    fn test_erase_rescans_bounds() {
        let mut p = poly(&[(-3, 1), (0, 1), (5, 1)]);
        assert_eq!((p.lsd(), p.msd()), (Some(-3), Some(5)));
        p.erase(-3);
        assert_eq!(p.lsd(), Some(0));
        p.erase(5);
        assert_eq!(p.msd(), Some(0));
        p.erase(0);
        assert_eq!((p.lsd(), p.msd()), (None, None));
        assert!(p.is_zero());
        assert!(p.erase(0).is_none());
    }

    #[test]
    fn test_add_commutative_and_associative() {
        let f = field();
        let a = poly(&[(-2, 7), (1, 50)]);
        let b = poly(&[(1, 51), (3, 9)]);
        let c = poly(&[(-2, 94), (0, 4)]);

        assert_eq!(a.add(&b, &f).unwrap(), b.add(&a, &f).unwrap());
        let left = a.add(&b, &f).unwrap().add(&c, &f).unwrap();
        let right = a.add(&b.add(&c, &f).unwrap(), &f).unwrap();
        assert_eq!(left, right);
        // 50 + 51 = 0 mod 101, 7 + 94 = 0 mod 101
        assert!(left.coefficient(1).is_none());
        assert!(left.coefficient(-2).is_none());
    }

    #[test]
    fn test_mul_degree_is_sum_of_degrees() {
        let f = field();
        let a = poly(&[(-2, 3), (4, 5)]);
        let b = poly(&[(-1, 2), (6, 7)]);
        let prod = a.mul(&b, &f).unwrap();
        assert_eq!(prod.msd(), Some(10));
        assert_eq!(prod.lsd(), Some(-3));
        assert_eq!(prod.get(10).get(0, 0), BigUint::from(35u32));
        // 3·7 at degree 4, 5·2 at degree 3
        assert_eq!(prod.get(4).get(0, 0), BigUint::from(21u32));
        assert_eq!(prod.get(3).get(0, 0), BigUint::from(10u32));
    }

    #[test]
    fn test_row_vector_product_is_inner_product() {
        let f = field();
        let mut a = Polynomial::new(1, 3).unwrap();
        a.put(1, SparseMatrix::from_i64_row(&f, &[1, 2, 3]).unwrap()).unwrap();
        let mut b = Polynomial::new(1, 3).unwrap();
        b.put(-1, SparseMatrix::from_i64_row(&f, &[4, 5, 6]).unwrap()).unwrap();
        let t = a.mul(&b, &f).unwrap();
        assert_eq!(t.shape(), (1, 1));
        assert_eq!(t.get(0).get(0, 0), BigUint::from(32u32));
    }

    #[test]
    fn test_eval_with_negative_degrees() {
        let f = field();
        // 3X^-1 + 2X at X = 4: 3·4⁻¹ + 8
        let p = poly(&[(-1, 3), (1, 2)]);
        let v = p.eval_scalar(&BigUint::from(4u32), &f).unwrap();
        let expected = f.add(
            &f.mul(&BigUint::from(3u32), &f.inv(&BigUint::from(4u32)).unwrap()),
            &BigUint::from(8u32),
        );
        assert_eq!(v, expected);
    }

    #[test]
    fn test_hadamard_and_scale() {
        let f = field();
        let mut p = Polynomial::new(1, 2).unwrap();
        p.put(2, SparseMatrix::from_i64_row(&f, &[3, 4]).unwrap()).unwrap();
        let weights = SparseMatrix::from_i64_row(&f, &[0, 2]).unwrap();
        let h = p.hadamard(&weights, &f).unwrap();
        assert_eq!(h.get(2).row(0), vec![BigUint::zero(), BigUint::from(8u32)]);
        let s = p.scale(&BigUint::zero(), &f);
        assert!(s.is_zero());
        assert_eq!(s.msd(), None);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut p = Polynomial::new(1, 2).unwrap();
        assert!(p.put(0, scalar(1)).is_err());
        let q = Polynomial::new(1, 3).unwrap();
        assert!(p.add(&q, &field()).is_err());
        assert!(p.mul(&q, &field()).is_err());
    }
}
