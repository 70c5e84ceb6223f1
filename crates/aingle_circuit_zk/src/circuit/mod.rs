//! Arithmetic circuits
//!
//! A [`Circuit`] is a list of multiplication gates `a_i · b_i = c_i` plus
//! linear constraints over the gate wires. Gates are numbered in insertion
//! order; sub-circuits are composed by [`Circuit::append`], which copies the
//! other circuit's gates and constraints behind the existing ones.
//!
//! Once built and assigned, a circuit is reshaped into the `m × n` witness
//! matrices and handed to the [`zkp`](crate::zkp) layer with
//! [`Circuit::into_prover`] or [`Circuit::into_verifier`].
//!
//! # Example
//!
//! ```
//! use aingle_circuit_zk::circuit::{Circuit, Wire};
//! use aingle_circuit_zk::GroupParams;
//! use num_bigint::BigUint;
//!
//! let group = GroupParams::from_u64(607, 101, 8).unwrap();
//! let mut circuit = Circuit::new(group);
//! let g = circuit.add_gate();
//! // a_0 = 3
//! let q = circuit.add_linear();
//! circuit.constrain_i64(q, Wire::A, g, 1).unwrap();
//! circuit.set_constant(q, BigUint::from(3u32)).unwrap();
//!
//! circuit.set_value(Wire::A, g, BigUint::from(3u32)).unwrap();
//! circuit.set_value(Wire::B, g, BigUint::from(5u32)).unwrap();
//! circuit.set_value(Wire::C, g, BigUint::from(15u32)).unwrap();
//! assert!(circuit.is_satisfied());
//! ```

pub mod batch;
pub mod encryption;
pub mod slots;

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use num_bigint::BigUint;
use num_traits::Zero;
use serde_json::{json, Value};

use crate::commitment::{GeneratorSetup, PolynomialCommitment};
use crate::error::{Result, ZkError};
use crate::field::{Field, GroupParams};
use crate::matrix::SparseMatrix;
use crate::zkp::{calc_mn, generators_required, CircuitZkpProver, CircuitZkpVerifier, LinearConstraints};

pub use batch::{BatchCiphertexts, BatchEncryptionCircuit, BatchLayout};
pub use encryption::EncryptionCircuit;
pub use slots::SlotLayout;

/// One of the three wires of a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wire {
    /// Left input
    A,
    /// Right input
    B,
    /// Output
    C,
}

impl Wire {
    const ALL: [Wire; 3] = [Wire::A, Wire::B, Wire::C];

    fn index(self) -> usize {
        match self {
            Wire::A => 0,
            Wire::B => 1,
            Wire::C => 2,
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wire::A => "a",
            Wire::B => "b",
            Wire::C => "c",
        };
        f.write_str(name)
    }
}

/// The first unsatisfied part of a circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// `a_i · b_i ≠ c_i`
    Gate(usize),
    /// Linear constraint `q` does not hold
    Linear(usize),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Gate(i) => write!(f, "gate {i}"),
            Violation::Linear(q) => write!(f, "linear constraint {q}"),
        }
    }
}

/// Weights of one linear constraint, keyed by gate index per wire
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Linear {
    weights: [BTreeMap<usize, BigUint>; 3],
    k: BigUint,
}

/// Multiplication gates plus linear constraints over ℤ_p
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circuit {
    group: GroupParams,
    field: Field,
    gates: usize,
    values: [SparseMatrix; 3],
    linears: Vec<Linear>,
}

impl Circuit {
    /// Empty circuit over the scalar field of `group`
    pub fn new(group: GroupParams) -> Self {
        let field = group.scalar_field();
        Self {
            group,
            field,
            gates: 0,
            values: [
                SparseMatrix::zeros(1, 0),
                SparseMatrix::zeros(1, 0),
                SparseMatrix::zeros(1, 0),
            ],
            linears: Vec::new(),
        }
    }

    pub fn group(&self) -> &GroupParams {
        &self.group
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn gate_count(&self) -> usize {
        self.gates
    }

    pub fn linear_count(&self) -> usize {
        self.linears.len()
    }

    /// Add one gate, returning its index
    pub fn add_gate(&mut self) -> usize {
        self.add_gates(1)
    }

    /// Add `k` gates, returning the index of the first
    pub fn add_gates(&mut self, k: usize) -> usize {
        let first = self.gates;
        self.gates += k;
        for v in &mut self.values {
            v.extend(k);
        }
        first
    }

    /// Add an empty linear constraint (all weights and K zero)
    pub fn add_linear(&mut self) -> usize {
        self.linears.push(Linear::default());
        self.linears.len() - 1
    }

    fn linear_mut(&mut self, q: usize) -> Result<&mut Linear> {
        let count = self.linears.len();
        self.linears
            .get_mut(q)
            .ok_or_else(|| ZkError::invalid(format!("linear constraint {q} of {count} does not exist")))
    }

    /// Add `coeff` to the weight of `wire` at `gate` in constraint `q`
    pub fn constrain(&mut self, q: usize, wire: Wire, gate: usize, coeff: &BigUint) -> Result<()> {
        if gate >= self.gates {
            return Err(ZkError::invalid(format!(
                "gate {gate} outside circuit of {} gates",
                self.gates
            )));
        }
        let field = self.field.clone();
        let linear = self.linear_mut(q)?;
        let slot = &mut linear.weights[wire.index()];
        let sum = match slot.get(&gate) {
            Some(existing) => field.add(existing, coeff),
            None => field.reduce(coeff),
        };
        if sum.is_zero() {
            slot.remove(&gate);
        } else {
            slot.insert(gate, sum);
        }
        Ok(())
    }

    pub fn constrain_i64(&mut self, q: usize, wire: Wire, gate: usize, coeff: i64) -> Result<()> {
        let coeff = self.field.from_i64(coeff);
        self.constrain(q, wire, gate, &coeff)
    }

    /// Set the right-hand side K of constraint `q`
    pub fn set_constant(&mut self, q: usize, k: BigUint) -> Result<()> {
        let k = self.field.reduce(&k);
        self.linear_mut(q)?.k = k;
        Ok(())
    }

    pub fn constant(&self, q: usize) -> Option<&BigUint> {
        self.linears.get(q).map(|l| &l.k)
    }

    /// Weight of `wire` at `gate` in constraint `q`
    pub fn weight(&self, q: usize, wire: Wire, gate: usize) -> BigUint {
        self.linears
            .get(q)
            .and_then(|l| l.weights[wire.index()].get(&gate))
            .cloned()
            .unwrap_or_else(BigUint::zero)
    }

    /// Assign a wire value
    pub fn set_value(&mut self, wire: Wire, gate: usize, value: BigUint) -> Result<()> {
        let value = self.field.reduce(&value);
        self.values[wire.index()].set(0, gate, value)
    }

    pub fn value(&self, wire: Wire, gate: usize) -> BigUint {
        self.values[wire.index()].get(0, gate)
    }

    /// Copy `other` behind the existing gates; returns the gate offset
    pub fn append(&mut self, other: &Circuit) -> Result<usize> {
        if other.gates == 0 {
            return Err(ZkError::invalid("cannot append an empty circuit"));
        }
        if other.group != self.group {
            return Err(ZkError::invalid("cannot append a circuit over a different group"));
        }
        let offset = self.gates;
        self.gates += other.gates;
        for (mine, theirs) in self.values.iter_mut().zip(&other.values) {
            mine.append_columns(theirs)?;
        }
        for linear in &other.linears {
            let mut moved = Linear {
                k: linear.k.clone(),
                ..Linear::default()
            };
            for (dst, src) in moved.weights.iter_mut().zip(&linear.weights) {
                *dst = src.iter().map(|(&g, v)| (g + offset, v.clone())).collect();
            }
            self.linears.push(moved);
        }
        Ok(offset)
    }

    /// Insert `k` empty gates in front, moving every gate index up by `k`
    pub fn shift(&mut self, k: usize) -> Result<()> {
        for v in &mut self.values {
            v.shift(k as isize)?;
        }
        for linear in &mut self.linears {
            for w in &mut linear.weights {
                *w = std::mem::take(w).into_iter().map(|(g, v)| (g + k, v)).collect();
            }
        }
        self.gates += k;
        Ok(())
    }

    /// Copy the wire values of `other` into gates `offset..offset + other.gate_count()`
    pub fn assign_values(&mut self, other: &Circuit, offset: usize) -> Result<()> {
        if offset + other.gates > self.gates {
            return Err(ZkError::invalid(format!(
                "{} gates at offset {offset} overflow circuit of {} gates",
                other.gates, self.gates
            )));
        }
        for (mine, theirs) in self.values.iter_mut().zip(&other.values) {
            for (_, g, v) in theirs.entries() {
                mine.set(0, g + offset, v.clone())?;
            }
        }
        Ok(())
    }

    /// The first violated gate or constraint, if any
    pub fn first_violation(&self) -> Option<Violation> {
        let f = &self.field;
        for g in 0..self.gates {
            let ab = f.mul(&self.value(Wire::A, g), &self.value(Wire::B, g));
            if ab != self.value(Wire::C, g) {
                return Some(Violation::Gate(g));
            }
        }
        for (q, linear) in self.linears.iter().enumerate() {
            let mut sum = BigUint::zero();
            for wire in Wire::ALL {
                for (&g, w) in &linear.weights[wire.index()] {
                    sum += w * self.value(wire, g);
                }
            }
            if f.reduce(&sum) != linear.k {
                return Some(Violation::Linear(q));
            }
        }
        None
    }

    pub fn is_satisfied(&self) -> bool {
        self.first_violation().is_none()
    }

    /// Error naming the first violated gate or constraint
    pub fn check_satisfied(&self) -> Result<()> {
        match self.first_violation() {
            None => Ok(()),
            Some(v) => Err(ZkError::InconsistentWitness(format!("{v} is not satisfied"))),
        }
    }

    /// Witness shape `(m, n)` for this circuit
    pub fn witness_shape(&self) -> Result<(usize, usize)> {
        if self.gates == 0 {
            return Err(ZkError::invalid("circuit has no gates"));
        }
        Ok(calc_mn(self.gates))
    }

    /// Linear constraints reshaped to `m × n` weight matrices
    pub fn linear_constraints(&self) -> Result<LinearConstraints> {
        let (m, n) = self.witness_shape()?;
        let mut out = LinearConstraints::new();
        for linear in &self.linears {
            let [wa, wb, wc] = &linear.weights;
            out.push(
                to_grid(wa, m, n)?,
                to_grid(wb, m, n)?,
                to_grid(wc, m, n)?,
                linear.k.clone(),
            );
        }
        Ok(out)
    }

    /// Wire values reshaped to `m × n`
    pub fn witness(&self) -> Result<[SparseMatrix; 3]> {
        let (m, n) = self.witness_shape()?;
        let reshape = |v: &SparseMatrix| -> Result<SparseMatrix> {
            let mut grid = v.clone();
            grid.extend(m * n - grid.cols());
            grid.group(n, Some(m))?;
            grid.trim();
            Ok(grid)
        };
        Ok([
            reshape(&self.values[0])?,
            reshape(&self.values[1])?,
            reshape(&self.values[2])?,
        ])
    }

    /// Verifier for this circuit's constraints with sequential generators
    pub fn into_verifier(self) -> Result<CircuitZkpVerifier> {
        self.into_verifier_with(&GeneratorSetup::Sequential)
    }

    pub fn into_verifier_with(self, setup: &GeneratorSetup) -> Result<CircuitZkpVerifier> {
        let (m, n) = self.witness_shape()?;
        let constraints = self.linear_constraints()?;
        debug!(
            "circuit of {} gates and {} constraints as {m}x{n} witness",
            self.gates,
            constraints.len()
        );
        let commitment = PolynomialCommitment::with_setup(self.group, generators_required(m, n), setup)?;
        CircuitZkpVerifier::with_commitment(commitment, constraints)
    }

    /// Prover holding this circuit's assignment; the circuit is consumed
    pub fn into_prover(self) -> Result<CircuitZkpProver> {
        self.into_prover_with(&GeneratorSetup::Sequential)
    }

    pub fn into_prover_with(self, setup: &GeneratorSetup) -> Result<CircuitZkpProver> {
        let [a, b, c] = self.witness()?;
        let zkp = self.into_verifier_with(setup)?;
        CircuitZkpProver::new(zkp, a, b, c)
    }

    /// Nested decimal-string dump of the wires and constraints
    pub fn to_json(&self) -> Value {
        let row = |w: &BTreeMap<usize, BigUint>| -> Value {
            Value::Array(
                (0..self.gates)
                    .map(|g| Value::String(w.get(&g).map_or_else(|| "0".into(), |v| v.to_str_radix(10))))
                    .collect(),
            )
        };
        let side = |wire: Wire| -> Value {
            Value::Array(self.linears.iter().map(|l| row(&l.weights[wire.index()])).collect())
        };
        json!({
            "gates": self.gates,
            "A": self.values[0].to_json(),
            "B": self.values[1].to_json(),
            "C": self.values[2].to_json(),
            "Wqa": side(Wire::A),
            "Wqb": side(Wire::B),
            "Wqc": side(Wire::C),
            "Kq": self.linears.iter().map(|l| l.k.to_str_radix(10)).collect::<Vec<_>>(),
        })
    }
}

fn to_grid(weights: &BTreeMap<usize, BigUint>, m: usize, n: usize) -> Result<SparseMatrix> {
    let mut grid = SparseMatrix::new(m, n)?;
    for (&g, v) in weights {
        grid.set(g / n, g % n, v.clone())?;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupParams {
        GroupParams::from_u64(607, 101, 8).unwrap()
    }

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    /// a·b = c with a = 2, b = 3 and the constraint a + b = 5
    fn tiny() -> Circuit {
        let mut c = Circuit::new(group());
        let g = c.add_gate();
        let q = c.add_linear();
        c.constrain_i64(q, Wire::A, g, 1).unwrap();
        c.constrain_i64(q, Wire::B, g, 1).unwrap();
        c.set_constant(q, big(5)).unwrap();
        c.set_value(Wire::A, g, big(2)).unwrap();
        c.set_value(Wire::B, g, big(3)).unwrap();
        c.set_value(Wire::C, g, big(6)).unwrap();
        c
    }

    #[test]
    fn test_satisfied() {
        let c = tiny();
        assert!(c.is_satisfied());
        assert!(c.check_satisfied().is_ok());
    }

    #[test]
    fn test_violations_located() {
        let mut c = tiny();
        c.set_value(Wire::C, 0, big(7)).unwrap();
        assert_eq!(c.first_violation(), Some(Violation::Gate(0)));

        let mut c = tiny();
        c.set_constant(0, big(6)).unwrap();
        assert_eq!(c.first_violation(), Some(Violation::Linear(0)));
        assert!(matches!(c.check_satisfied(), Err(ZkError::InconsistentWitness(_))));
    }

    #[test]
    fn test_constrain_accumulates_and_prunes() {
        let mut c = tiny();
        c.constrain_i64(0, Wire::A, 0, -1).unwrap();
        assert_eq!(c.weight(0, Wire::A, 0), big(0));
        assert!(c.constrain_i64(0, Wire::A, 1, 1).is_err());
        assert!(c.constrain_i64(3, Wire::A, 0, 1).is_err());
    }

    #[test]
    fn test_append_offsets_constraints() {
        let mut c = tiny();
        let offset = c.append(&tiny()).unwrap();
        assert_eq!(offset, 1);
        assert_eq!(c.gate_count(), 2);
        assert_eq!(c.linear_count(), 2);
        assert_eq!(c.weight(1, Wire::B, 1), big(1));
        assert_eq!(c.weight(1, Wire::B, 0), big(0));
        assert_eq!(c.value(Wire::C, 1), big(6));
        assert!(c.is_satisfied());
    }

    #[test]
    fn test_append_empty_rejected() {
        let mut c = tiny();
        assert!(c.append(&Circuit::new(group())).is_err());
    }

    #[test]
    fn test_shift_and_assign() {
        let mut c = tiny();
        c.shift(2).unwrap();
        assert_eq!(c.gate_count(), 3);
        assert_eq!(c.value(Wire::A, 2), big(2));
        assert_eq!(c.weight(0, Wire::A, 2), big(1));

        let mut host = Circuit::new(group());
        host.add_gates(4);
        host.assign_values(&tiny(), 3).unwrap();
        assert_eq!(host.value(Wire::C, 3), big(6));
        assert!(host.assign_values(&tiny(), 4).is_err());
    }

    #[test]
    fn test_reshape_pads_to_grid() {
        let mut c = Circuit::new(group());
        for _ in 0..5 {
            c.append(&tiny()).unwrap();
        }
        assert_eq!(c.witness_shape().unwrap(), (2, 3));
        let [a, _, cw] = c.witness().unwrap();
        assert_eq!((a.rows(), a.cols()), (2, 3));
        assert_eq!(cw.get(1, 1), big(6));
        assert_eq!(cw.get(1, 2), big(0));
        let lc = c.linear_constraints().unwrap();
        assert_eq!(lc.len(), 5);
        assert_eq!(lc.wqa[4].get(1, 1), big(1));
    }

    #[test]
    fn test_prove_tiny_circuit() {
        let mut c = tiny();
        c.append(&tiny()).unwrap();
        let verifier_circuit = c.clone();
        let mut prover = c.into_prover().unwrap();
        let mut verifier = verifier_circuit.into_verifier().unwrap();

        let commits = prover.commit().unwrap();
        verifier.set_commits(commits).unwrap();
        let y = verifier.calculate_y().unwrap();
        assert_eq!(prover.zkp_mut().calculate_y().unwrap(), y);
        let pc = prover.poly_commit(&y).unwrap();
        verifier.set_poly_commits(pc).unwrap();
        let x = verifier.calculate_x().unwrap();
        let proofs = prover.prove(&y, &x).unwrap();
        assert!(verifier.verify(&proofs, &y, &x));
    }

    #[test]
    fn test_json_dump() {
        let json = tiny().to_json();
        assert_eq!(json["gates"], 1);
        assert_eq!(json["Wqa"][0][0], "1");
        assert_eq!(json["Kq"][0], "5");
        assert_eq!(json["C"][0][0], "6");
    }
}
