//! Sparse matrices over ℤ_p
//!
//! Cells are stored row → (col → value) and only when non-zero. Every write
//! or arithmetic result that reduces to zero removes the entry, so an absent
//! cell always reads as the additive identity and two equal matrices compare
//! equal structurally.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use serde_json::Value;

use crate::error::{Result, ZkError};
use crate::field::Field;

/// Sparse `rows × cols` matrix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    values: BTreeMap<usize, BTreeMap<usize, BigUint>>,
}

impl SparseMatrix {
    /// Create an all-zero matrix
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(ZkError::invalid(format!(
                "matrix dimensions must be non-zero, got {rows}x{cols}"
            )));
        }
        Ok(Self {
            rows,
            cols,
            values: BTreeMap::new(),
        })
    }

    pub(crate) fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: BTreeMap::new(),
        }
    }

    /// Build a `1 × len` row vector
    pub fn from_row(values: Vec<BigUint>) -> Result<Self> {
        let mut m = Self::new(1, values.len())?;
        for (j, v) in values.into_iter().enumerate() {
            m.set(0, j, v)?;
        }
        Ok(m)
    }

    /// Build a row vector from signed integers reduced into `field`
    pub fn from_i64_row(field: &Field, values: &[i64]) -> Result<Self> {
        Self::from_row(values.iter().map(|&v| field.from_i64(v)).collect())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored (non-zero) cells
    pub fn nnz(&self) -> usize {
        self.values.values().map(BTreeMap::len).sum()
    }

    pub fn is_zero(&self) -> bool {
        self.values.is_empty()
    }

    /// Stored value at (i, j), `None` when zero
    pub fn cell(&self, i: usize, j: usize) -> Option<&BigUint> {
        self.values.get(&i).and_then(|row| row.get(&j))
    }

    /// Value at (i, j)
    pub fn get(&self, i: usize, j: usize) -> BigUint {
        self.cell(i, j).cloned().unwrap_or_else(BigUint::zero)
    }

    /// Write a cell; writing zero erases it
    pub fn set(&mut self, i: usize, j: usize, value: BigUint) -> Result<()> {
        self.check_bounds(i, j)?;
        if value.is_zero() {
            self.erase(i, j);
        } else {
            self.values.entry(i).or_default().insert(j, value);
        }
        Ok(())
    }

    fn erase(&mut self, i: usize, j: usize) {
        if let Some(row) = self.values.get_mut(&i) {
            row.remove(&j);
            if row.is_empty() {
                self.values.remove(&i);
            }
        }
    }

    fn check_bounds(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.rows || j >= self.cols {
            return Err(ZkError::invalid(format!(
                "cell ({i}, {j}) outside {}x{} matrix",
                self.rows, self.cols
            )));
        }
        Ok(())
    }

    /// Whether row `i` holds any non-zero cell
    pub fn row_exists(&self, i: usize) -> bool {
        self.values.contains_key(&i)
    }

    /// Non-zero cells of row `i` in column order
    pub fn row_entries(&self, i: usize) -> impl Iterator<Item = (usize, &BigUint)> + '_ {
        self.values
            .get(&i)
            .into_iter()
            .flat_map(|row| row.iter().map(|(&j, v)| (j, v)))
    }

    /// All non-zero cells in row-major order
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, &BigUint)> + '_ {
        self.values
            .iter()
            .flat_map(|(&i, row)| row.iter().map(move |(&j, v)| (i, j, v)))
    }

    /// Row `i` as a dense vector
    pub fn row(&self, i: usize) -> Vec<BigUint> {
        let mut out = vec![BigUint::zero(); self.cols];
        for (j, v) in self.row_entries(i) {
            out[j] = v.clone();
        }
        out
    }

    /// Row `i` as a `1 × cols` matrix
    pub fn row_matrix(&self, i: usize) -> SparseMatrix {
        let mut out = SparseMatrix::zeros(1, self.cols);
        if let Some(row) = self.values.get(&i) {
            out.values.insert(0, row.clone());
        }
        out
    }

    /// Reshape a `1 × N` vector into `new_rows × new_cols`, row-major
    ///
    /// `new_rows` defaults to ⌈N / new_cols⌉. Cell `k` of the vector lands at
    /// `(k / new_cols, k % new_cols)`.
    pub fn group(&mut self, new_cols: usize, new_rows: Option<usize>) -> Result<()> {
        if self.rows != 1 {
            return Err(ZkError::invalid(format!(
                "only row vectors can be grouped, matrix has {} rows",
                self.rows
            )));
        }
        if new_cols == 0 {
            return Err(ZkError::invalid("group width must be non-zero"));
        }
        let new_rows = new_rows.unwrap_or_else(|| self.cols.div_ceil(new_cols));
        if new_rows == 0 || self.cols > new_cols * new_rows {
            return Err(ZkError::invalid(format!(
                "cannot fit {} cells into {new_rows}x{new_cols}",
                self.cols
            )));
        }
        let mut grouped = BTreeMap::<usize, BTreeMap<usize, BigUint>>::new();
        if let Some(row) = self.values.remove(&0) {
            for (k, v) in row {
                grouped
                    .entry(k / new_cols)
                    .or_default()
                    .insert(k % new_cols, v);
            }
        }
        self.rows = new_rows;
        self.cols = new_cols;
        self.values = grouped;
        Ok(())
    }

    /// Unpack into a `1 × (rows·cols)` row vector, inverse of [`group`](Self::group)
    pub fn flatten(&mut self) {
        let cols = self.cols;
        let mut flat = BTreeMap::new();
        for (i, row) in std::mem::take(&mut self.values) {
            for (j, v) in row {
                flat.insert(i * cols + j, v);
            }
        }
        self.cols = self.rows * cols;
        self.rows = 1;
        if !flat.is_empty() {
            self.values.insert(0, flat);
        }
    }

    /// Relabel every column j → j + k, growing or shrinking the width by `k`
    ///
    /// A negative shift fails if any stored cell would move below column 0.
    pub fn shift(&mut self, k: isize) -> Result<()> {
        let offset = k.unsigned_abs();
        if k < 0 {
            let lowest = self
                .values
                .values()
                .filter_map(|row| row.keys().next().copied())
                .min();
            if lowest.is_some_and(|j| j < offset) || self.cols <= offset {
                return Err(ZkError::invalid(format!(
                    "cannot shift {}-column matrix by {k}",
                    self.cols
                )));
            }
        }
        for row in self.values.values_mut() {
            *row = std::mem::take(row)
                .into_iter()
                .map(|(j, v)| if k < 0 { (j - offset, v) } else { (j + offset, v) })
                .collect();
        }
        self.cols = if k < 0 {
            self.cols - offset
        } else {
            self.cols + offset
        };
        Ok(())
    }

    /// Grow the column count by `k` without moving data
    pub fn extend(&mut self, k: usize) {
        self.cols += k;
    }

    /// Drop explicit zero cells and empty rows
    pub fn trim(&mut self) {
        self.values.retain(|_, row| {
            row.retain(|_, v| !v.is_zero());
            !row.is_empty()
        });
    }

    /// Append `other`'s columns after this matrix's columns
    pub fn append_columns(&mut self, other: &SparseMatrix) -> Result<()> {
        if self.rows != other.rows {
            return Err(ZkError::invalid(format!(
                "row mismatch on append: {} vs {}",
                self.rows, other.rows
            )));
        }
        let offset = self.cols;
        for (i, j, v) in other.entries() {
            self.values
                .entry(i)
                .or_default()
                .insert(j + offset, v.clone());
        }
        self.cols += other.cols;
        Ok(())
    }

    pub fn transpose(&self) -> SparseMatrix {
        let mut values = BTreeMap::<usize, BTreeMap<usize, BigUint>>::new();
        for (i, j, v) in self.entries() {
            values.entry(j).or_default().insert(i, v.clone());
        }
        SparseMatrix {
            rows: self.cols,
            cols: self.rows,
            values,
        }
    }

    fn check_same_shape(&self, other: &SparseMatrix, op: &str) -> Result<()> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(ZkError::invalid(format!(
                "{op}: shape mismatch {}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        Ok(())
    }

    /// Elementwise sum mod p
    pub fn add(&self, other: &SparseMatrix, field: &Field) -> Result<SparseMatrix> {
        self.check_same_shape(other, "add")?;
        let mut out = self.clone();
        for (i, j, v) in other.entries() {
            let sum = field.add(&out.get(i, j), v);
            out.set(i, j, sum)?;
        }
        Ok(out)
    }

    /// Multiply every cell by a scalar mod p
    pub fn scale(&self, k: &BigUint, field: &Field) -> SparseMatrix {
        let mut out = SparseMatrix::zeros(self.rows, self.cols);
        for (i, j, v) in self.entries() {
            let prod = field.mul(v, k);
            if !prod.is_zero() {
                out.values.entry(i).or_default().insert(j, prod);
            }
        }
        out
    }

    /// Elementwise (Hadamard) product mod p
    pub fn hadamard(&self, other: &SparseMatrix, field: &Field) -> Result<SparseMatrix> {
        self.check_same_shape(other, "hadamard")?;
        let mut out = SparseMatrix::zeros(self.rows, self.cols);
        for (i, j, v) in self.entries() {
            if let Some(w) = other.cell(i, j) {
                let prod = field.mul(v, w);
                if !prod.is_zero() {
                    out.values.entry(i).or_default().insert(j, prod);
                }
            }
        }
        Ok(out)
    }

    /// `self · otherᵀ` mod p: entry (i, k) is the inner product of row i of
    /// `self` with row k of `other`
    pub fn dot(&self, other: &SparseMatrix, field: &Field) -> Result<SparseMatrix> {
        if self.cols != other.cols {
            return Err(ZkError::invalid(format!(
                "dot: width mismatch {} vs {}",
                self.cols, other.cols
            )));
        }
        let mut out = SparseMatrix::zeros(self.rows, other.rows);
        for (&i, left) in &self.values {
            for (&k, right) in &other.values {
                let sum = left
                    .iter()
                    .filter_map(|(j, a)| right.get(j).map(|b| a * b))
                    .fold(BigUint::zero(), |acc, x| acc + x)
                    % field.modulus();
                if !sum.is_zero() {
                    out.values.entry(i).or_default().insert(k, sum);
                }
            }
        }
        Ok(out)
    }

    /// Nested arrays of decimal strings, for inspection only
    pub fn to_json(&self) -> Value {
        Value::Array(
            (0..self.rows)
                .map(|i| {
                    Value::Array(
                        self.row(i)
                            .iter()
                            .map(|v| Value::String(v.to_str_radix(10)))
                            .collect(),
                    )
                })
                .collect(),
        )
    }
}

impl fmt::Display for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Field {
        Field::new(BigUint::from(101u32)).unwrap()
    }

    fn big(v: u32) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn test_absent_cells_read_zero() {
        let mut m = SparseMatrix::new(2, 3).unwrap();
        assert_eq!(m.get(1, 2), BigUint::zero());
        m.set(1, 2, big(5)).unwrap();
        assert!(m.row_exists(1));
        m.set(1, 2, BigUint::zero()).unwrap();
        assert!(!m.row_exists(1));
        assert!(m.is_zero());
    }

    #[test]
    fn test_out_of_bounds_write() {
        let mut m = SparseMatrix::new(2, 3).unwrap();
        assert!(m.set(2, 0, big(1)).is_err());
        assert!(m.set(0, 3, big(1)).is_err());
        assert!(SparseMatrix::new(0, 3).is_err());
    }

    #[test]
    fn test_group_then_flatten() {
        let f = field();
        let original = SparseMatrix::from_i64_row(&f, &[1, 0, 3, 4, 0, 6, 7]).unwrap();
        let mut m = original.clone();
        m.group(3, None).unwrap();
        assert_eq!((m.rows(), m.cols()), (3, 3));
        assert_eq!(m.get(1, 0), big(4));
        assert_eq!(m.get(2, 0), big(7));
        m.flatten();
        assert_eq!(m.cols(), 9);
        for j in 0..7 {
            assert_eq!(m.get(0, j), original.get(0, j));
        }
    }

    #[test]
    fn test_group_rejects_overflow() {
        let f = field();
        let mut m = SparseMatrix::from_i64_row(&f, &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert!(m.group(3, Some(2)).is_err());

        let mut grid = SparseMatrix::new(2, 2).unwrap();
        assert!(grid.group(2, None).is_err());
    }

    #[test]
    fn test_shift_roundtrip() {
        let f = field();
        let original = SparseMatrix::from_i64_row(&f, &[0, 2, 0, 4]).unwrap();
        let mut m = original.clone();
        m.shift(5).unwrap();
        assert_eq!(m.cols(), 9);
        assert_eq!(m.get(0, 6), big(2));
        m.shift(-5).unwrap();
        assert_eq!(m, original);
    }

    #[test]
    fn test_negative_shift_below_zero_fails() {
        let f = field();
        let mut m = SparseMatrix::from_i64_row(&f, &[0, 2, 0, 4]).unwrap();
        assert!(m.shift(-2).is_err());
        m.shift(-1).unwrap();
        assert_eq!(m.get(0, 0), big(2));
    }

    #[test]
    fn test_extend_and_append() {
        let f = field();
        let mut a = SparseMatrix::from_i64_row(&f, &[1, 2]).unwrap();
        let b = SparseMatrix::from_i64_row(&f, &[3, 0, 5]).unwrap();
        a.append_columns(&b).unwrap();
        assert_eq!(a.row(0), vec![big(1), big(2), big(3), big(0), big(5)]);
        a.extend(2);
        assert_eq!(a.cols(), 7);
        assert_eq!(a.nnz(), 4);
    }

    #[test]
    fn test_arithmetic_prunes_zeros() {
        let f = field();
        let a = SparseMatrix::from_i64_row(&f, &[1, 2, 3]).unwrap();
        let b = SparseMatrix::from_i64_row(&f, &[-1, 0, 5]).unwrap();
        let sum = a.add(&b, &f).unwrap();
        assert_eq!(sum.cell(0, 0), None);
        assert_eq!(sum.get(0, 2), big(8));

        let h = a.hadamard(&b, &f).unwrap();
        assert_eq!(h.row(0), vec![big(100), big(0), big(15)]);

        let zero = a.scale(&BigUint::zero(), &f);
        assert!(zero.is_zero());
    }

    #[test]
    fn test_trim_drops_stored_zeros() {
        let mut m = SparseMatrix::new(2, 3).unwrap();
        m.set(0, 1, big(4)).unwrap();
        m.values.entry(0).or_default().insert(2, BigUint::zero());
        m.values.entry(1).or_default().insert(0, BigUint::zero());
        assert_eq!(m.nnz(), 3);
        assert!(m.row_exists(1));

        m.trim();
        assert_eq!(m.nnz(), 1);
        assert!(!m.row_exists(1));
        assert_eq!(m.get(0, 1), big(4));
        assert_eq!(m.get(0, 2), BigUint::zero());
    }

    #[test]
    fn test_dot_is_row_inner_product() {
        let f = field();
        let a = SparseMatrix::from_i64_row(&f, &[1, 2, 3]).unwrap();
        let b = SparseMatrix::from_i64_row(&f, &[4, 5, 6]).unwrap();
        let d = a.dot(&b, &f).unwrap();
        assert_eq!((d.rows(), d.cols()), (1, 1));
        assert_eq!(d.get(0, 0), big(32));
        assert!(a.dot(&SparseMatrix::new(1, 2).unwrap(), &f).is_err());
    }

    #[test]
    fn test_transpose() {
        let f = field();
        let mut m = SparseMatrix::from_i64_row(&f, &[1, 2, 3, 4, 5, 6]).unwrap();
        m.group(3, None).unwrap();
        let t = m.transpose();
        assert_eq!((t.rows(), t.cols()), (3, 2));
        assert_eq!(t.get(2, 1), big(6));
    }

    #[test]
    fn test_json_dump() {
        let f = field();
        let mut m = SparseMatrix::from_i64_row(&f, &[1, 0, 3, 4]).unwrap();
        m.group(2, None).unwrap();
        assert_eq!(m.to_json().to_string(), r#"[["1","0"],["3","4"]]"#);
    }
}
