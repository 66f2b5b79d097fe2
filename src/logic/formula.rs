//! Ground propositional formulas over interned atoms

use super::statement::{Clause, CompareOp, Statement};
use super::words::Term;
use num_rational::BigRational;
use std::collections::{BTreeMap, BTreeSet};

/// Indivisible fact the enumerator assigns a truth value to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Atom {
    /// `subject` belongs to `predicate`
    Holds {
        /// Individual
        subject: Term,
        /// Class or property
        predicate: Term,
    },
    /// Propositional letter
    Prop(Term),
    /// Numeric comparison against a literal
    Compare {
        /// Variable compared
        variable: Term,
        /// Operator
        op: CompareOp,
        /// Literal
        value: BigRational,
    },
}

/// Ground formula
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    /// Atom by index
    Atom(usize),
    /// Negation
    Not(Box<Formula>),
    /// Conjunction; empty is true
    And(Vec<Formula>),
    /// Disjunction; empty is false
    Or(Vec<Formula>),
    /// Material implication
    Implies(Box<Formula>, Box<Formula>),
}

impl Formula {
    /// Evaluate under `assignment`, where bit `i` is the value of atom `i`
    pub fn eval(&self, assignment: u64) -> bool {
        match self {
            Formula::Atom(i) => (assignment >> i) & 1 == 1,
            Formula::Not(inner) => !inner.eval(assignment),
            Formula::And(parts) => parts.iter().all(|p| p.eval(assignment)),
            Formula::Or(parts) => parts.iter().any(|p| p.eval(assignment)),
            Formula::Implies(a, b) => !a.eval(assignment) || b.eval(assignment),
        }
    }
}

/// Interning table for atoms
#[derive(Debug, Clone, Default)]
pub struct AtomTable {
    atoms: Vec<Atom>,
    index: BTreeMap<Atom, usize>,
}

impl AtomTable {
    /// Index of `atom`, adding it if new
    pub fn intern(&mut self, atom: Atom) -> usize {
        if let Some(i) = self.index.get(&atom) {
            return *i;
        }
        let i = self.atoms.len();
        self.index.insert(atom.clone(), i);
        self.atoms.push(atom);
        i
    }

    /// Atoms in index order
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of atoms
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Returns true if no atom was interned
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// Premises and conclusion grounded over a finite set of individuals
#[derive(Debug, Clone)]
pub struct Grounding {
    /// Interned atoms
    pub table: AtomTable,
    /// One formula per premise
    pub premises: Vec<Formula>,
    /// The conclusion
    pub conclusion: Formula,
    /// Individuals universals were instantiated over
    pub individuals: BTreeSet<Term>,
}

/// Ground `premises` and `conclusion`
///
/// Universals are instantiated over every individual named anywhere in the
/// set. A universal conclusion `All C are P` is checked against a fresh
/// individual that is only known to be a `C`.
pub fn ground(premises: &[Statement], conclusion: &Statement) -> Grounding {
    let mut individuals: BTreeSet<Term> = BTreeSet::new();
    for statement in premises.iter().chain(std::iter::once(conclusion)) {
        collect_individuals(statement, &mut individuals);
    }
    if let Statement::Universal { class, .. } = conclusion {
        individuals.insert(witness(class));
    }

    let mut table = AtomTable::default();
    let premises = premises
        .iter()
        .map(|s| ground_statement(s, &individuals, &mut table))
        .collect();
    let conclusion = match conclusion {
        Statement::Universal {
            class,
            predicate,
            polarity,
        } => {
            let w = witness(class);
            Formula::Implies(
                Box::new(holds(&w, class, true, &mut table)),
                Box::new(holds(&w, predicate, *polarity, &mut table)),
            )
        }
        other => ground_statement(other, &individuals, &mut table),
    };

    Grounding {
        table,
        premises,
        conclusion,
        individuals,
    }
}

/// Fresh individual standing for an arbitrary member of `class`
pub fn witness(class: &Term) -> Term {
    Term::named(
        format!("#arbitrary_{}", class.key()),
        format!("an arbitrary {}", class.display()),
    )
}

fn collect_individuals(statement: &Statement, out: &mut BTreeSet<Term>) {
    let mut visit = |clause: &Clause| {
        if let Clause::Triple { subject, .. } = clause {
            out.insert(subject.clone());
        }
    };
    match statement {
        Statement::Assertion(clause) => visit(clause),
        Statement::Universal { .. } => {}
        Statement::Conditional {
            antecedent,
            consequent,
        } => antecedent.iter().chain(consequent.iter()).for_each(visit),
        Statement::Conjunction(clauses) | Statement::Disjunction(clauses) => {
            clauses.iter().for_each(visit)
        }
    }
}

fn ground_statement(
    statement: &Statement,
    individuals: &BTreeSet<Term>,
    table: &mut AtomTable,
) -> Formula {
    match statement {
        Statement::Assertion(clause) => ground_clause(clause, table),
        Statement::Universal {
            class,
            predicate,
            polarity,
        } => Formula::And(
            individuals
                .iter()
                .map(|s| {
                    Formula::Implies(
                        Box::new(holds(s, class, true, table)),
                        Box::new(holds(s, predicate, *polarity, table)),
                    )
                })
                .collect(),
        ),
        Statement::Conditional {
            antecedent,
            consequent,
        } => Formula::Implies(
            Box::new(Formula::And(
                antecedent.iter().map(|c| ground_clause(c, table)).collect(),
            )),
            Box::new(Formula::And(
                consequent.iter().map(|c| ground_clause(c, table)).collect(),
            )),
        ),
        Statement::Conjunction(clauses) => {
            Formula::And(clauses.iter().map(|c| ground_clause(c, table)).collect())
        }
        Statement::Disjunction(clauses) => {
            Formula::Or(clauses.iter().map(|c| ground_clause(c, table)).collect())
        }
    }
}

fn ground_clause(clause: &Clause, table: &mut AtomTable) -> Formula {
    match clause {
        Clause::Triple {
            subject,
            predicate,
            polarity,
        } => holds(subject, predicate, *polarity, table),
        Clause::Prop { name, polarity } => literal(table.intern(Atom::Prop(name.clone())), *polarity),
        Clause::Comparison {
            variable,
            op,
            value,
            polarity,
        } => {
            let atom = Atom::Compare {
                variable: variable.clone(),
                op: *op,
                value: value.clone(),
            };
            literal(table.intern(atom), *polarity)
        }
    }
}

fn holds(subject: &Term, predicate: &Term, polarity: bool, table: &mut AtomTable) -> Formula {
    let atom = Atom::Holds {
        subject: subject.clone(),
        predicate: predicate.clone(),
    };
    literal(table.intern(atom), polarity)
}

fn literal(index: usize, polarity: bool) -> Formula {
    if polarity {
        Formula::Atom(index)
    } else {
        Formula::Not(Box::new(Formula::Atom(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::statement::parse_statement;

    fn statements(texts: &[&str]) -> Vec<Statement> {
        texts.iter().map(|t| parse_statement(t).unwrap()).collect()
    }

    #[test]
    fn test_universal_is_instantiated_per_individual() {
        let premises = statements(&["All men are mortal", "Socrates is a man", "Plato is a man"]);
        let conclusion = parse_statement("Plato is mortal").unwrap();
        let g = ground(&premises, &conclusion);
        assert_eq!(g.individuals.len(), 2);
        match &g.premises[0] {
            Formula::And(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        // man and mortal for each of two individuals
        assert_eq!(g.table.len(), 4);
    }

    #[test]
    fn test_universal_conclusion_uses_witness() {
        let premises = statements(&["All dogs are mammals", "All mammals are animals"]);
        let conclusion = parse_statement("All dogs are animals").unwrap();
        let g = ground(&premises, &conclusion);
        assert_eq!(g.individuals.len(), 1);
        let w = g.individuals.iter().next().unwrap();
        assert!(w.display().starts_with("an arbitrary"));
    }

    #[test]
    fn test_eval() {
        let f = Formula::Implies(Box::new(Formula::Atom(0)), Box::new(Formula::Atom(1)));
        assert!(f.eval(0b00));
        assert!(!f.eval(0b01));
        assert!(f.eval(0b11));
        assert!(Formula::And(vec![]).eval(0));
        assert!(!Formula::Or(vec![]).eval(0));
    }
}
