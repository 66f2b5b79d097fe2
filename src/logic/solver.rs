//! Truth-table entailment with a per-variable interval theory
//!
//! The enumerator visits every assignment to the ground atoms. An assignment
//! counts only if it satisfies every premise and its comparison literals can
//! be met by actual numbers; each numeric variable is checked on its own by
//! narrowing an interval of exact rationals.

use super::formula::{Atom, Grounding};
use super::statement::CompareOp;
use super::words::Term;
use crate::error::{Error, Result};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::One;
use std::collections::BTreeMap;

/// Hard ceiling on atoms, whatever the configuration says (bits in a `u64`)
const MAX_ENUMERABLE_ATOMS: usize = 63;

/// A satisfying assignment together with numbers that realize it
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Bit `i` is the value of atom `i`
    pub assignment: u64,
    /// A value for every numeric variable
    pub witnesses: BTreeMap<Term, BigRational>,
}

impl Model {
    /// Value of atom `index`
    pub fn value(&self, index: usize) -> bool {
        (self.assignment >> index) & 1 == 1
    }
}

/// Outcome of an entailment check
#[derive(Debug, Clone, PartialEq)]
pub enum Entailment {
    /// Every model of the premises satisfies the conclusion
    Entailed {
        /// Assignments that satisfied the premises
        models: u64,
        /// Assignments visited
        visited: u64,
    },
    /// A model of the premises where the conclusion fails
    Counterexample(Model),
    /// No assignment satisfies the premises
    InconsistentPremises,
}

/// Exhaustive truth-table enumerator
#[derive(Debug, Clone)]
pub struct Enumerator {
    max_atoms: usize,
    max_assignments: usize,
}

impl Enumerator {
    /// Creates an enumerator with the given budgets
    pub fn new(max_atoms: usize, max_assignments: usize) -> Self {
        Enumerator {
            max_atoms: max_atoms.min(MAX_ENUMERABLE_ATOMS),
            max_assignments,
        }
    }

    /// Decide whether the premises entail the conclusion
    pub fn check(&self, grounding: &Grounding) -> Result<Entailment> {
        let atoms = grounding.table.atoms();
        if atoms.len() > self.max_atoms {
            return Err(Error::budget("logic atoms", self.max_atoms));
        }
        let total: u64 = 1u64 << atoms.len();
        if total > self.max_assignments as u64 {
            return Err(Error::budget("truth assignments", self.max_assignments));
        }

        let mut models = 0u64;
        for assignment in 0..total {
            if !grounding.premises.iter().all(|p| p.eval(assignment)) {
                continue;
            }
            let witnesses = match numeric_witnesses(atoms, assignment) {
                Some(w) => w,
                None => continue,
            };
            models += 1;
            if !grounding.conclusion.eval(assignment) {
                return Ok(Entailment::Counterexample(Model {
                    assignment,
                    witnesses,
                }));
            }
        }

        if models == 0 {
            Ok(Entailment::InconsistentPremises)
        } else {
            Ok(Entailment::Entailed {
                models,
                visited: total,
            })
        }
    }
}

/// Numbers satisfying every comparison literal of `assignment`, if any
fn numeric_witnesses(atoms: &[Atom], assignment: u64) -> Option<BTreeMap<Term, BigRational>> {
    let mut constraints: BTreeMap<&Term, Vec<(CompareOp, &BigRational)>> = BTreeMap::new();
    for (i, atom) in atoms.iter().enumerate() {
        if let Atom::Compare {
            variable,
            op,
            value,
        } = atom
        {
            let truth = (assignment >> i) & 1 == 1;
            let op = if truth { *op } else { op.negate() };
            constraints.entry(variable).or_default().push((op, value));
        }
    }
    constraints
        .into_iter()
        .map(|(variable, list)| Interval::from_constraints(&list).map(|v| (variable.clone(), v)))
        .collect()
}

/// Feasible region of one variable: bounds, a pinned value, excluded points
#[derive(Debug, Clone, Default)]
struct Interval {
    lower: Option<(BigRational, bool)>,
    upper: Option<(BigRational, bool)>,
}

impl Interval {
    /// A value meeting every constraint, or `None` if they conflict
    fn from_constraints(constraints: &[(CompareOp, &BigRational)]) -> Option<BigRational> {
        let mut interval = Interval::default();
        let mut pinned: Option<&BigRational> = None;
        let mut excluded = 0usize;
        for (op, value) in constraints {
            match op {
                CompareOp::Gt => interval.refine_lower_bound(value, true),
                CompareOp::Ge => interval.refine_lower_bound(value, false),
                CompareOp::Lt => interval.refine_upper_bound(value, true),
                CompareOp::Le => interval.refine_upper_bound(value, false),
                CompareOp::Eq => match pinned {
                    Some(p) if p != *value => return None,
                    _ => pinned = Some(value),
                },
                CompareOp::Ne => excluded += 1,
            }
        }
        let satisfies = |x: &BigRational| constraints.iter().all(|(op, v)| op.holds(x, v));

        if let Some(p) = pinned {
            return if satisfies(p) { Some(p.clone()) } else { None };
        }

        // Distinct candidates inside the interval; each excluded point can
        // rule out at most one of them.
        let one = BigRational::one();
        let two = BigRational::from_integer(BigInt::from(2));
        let mut candidate = match (&interval.lower, &interval.upper) {
            (Some((lo, ls)), Some((hi, hs))) => {
                if lo > hi || (lo == hi && (*ls || *hs)) {
                    return None;
                }
                if lo == hi {
                    lo.clone()
                } else {
                    (lo + hi) / &two
                }
            }
            (Some((lo, strict)), None) => {
                if *strict {
                    lo + &one
                } else {
                    lo.clone()
                }
            }
            (None, Some((hi, strict))) => {
                if *strict {
                    hi - &one
                } else {
                    hi.clone()
                }
            }
            (None, None) => BigRational::from_integer(BigInt::from(0)),
        };
        for _ in 0..=excluded {
            if satisfies(&candidate) {
                return Some(candidate);
            }
            candidate = match (&interval.lower, &interval.upper) {
                (_, Some((hi, _))) if interval.lower.is_some() => (&candidate + hi) / &two,
                (None, Some(_)) => &candidate - &one,
                _ => &candidate + &one,
            };
        }
        None
    }

    fn refine_lower_bound(&mut self, value: &BigRational, strict: bool) {
        let tighter = match &self.lower {
            None => true,
            Some((lo, lo_strict)) => value > lo || (value == lo && strict && !lo_strict),
        };
        if tighter {
            self.lower = Some((value.clone(), strict));
        }
    }

    fn refine_upper_bound(&mut self, value: &BigRational, strict: bool) {
        let tighter = match &self.upper {
            None => true,
            Some((hi, hi_strict)) => value < hi || (value == hi && strict && !hi_strict),
        };
        if tighter {
            self.upper = Some((value.clone(), strict));
        }
    }
}
