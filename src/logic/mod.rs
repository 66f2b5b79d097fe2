//! Logic Verification Engine
//!
//! Premises and a conclusion are written in a small controlled English
//! ([`statement`]). Universals are grounded over the individuals the set
//! mentions ([`formula`]) and entailment is decided by enumerating truth
//! assignments with a numeric feasibility check ([`solver`]).
//!
//! # Example
//!
//! ```
//! use qwed_verify::config::LogicConfig;
//! use qwed_verify::logic::LogicEngine;
//!
//! let engine = LogicEngine::new(LogicConfig::default());
//! let verdict = engine.verify(
//!     &["All men are mortal", "Socrates is a man"],
//!     "Socrates is mortal",
//! );
//! assert!(verdict.is_verified());
//! ```

pub mod formula;
pub mod solver;
pub mod statement;
pub mod words;

use crate::config::LogicConfig;
use crate::error::{Error, Result};
use crate::parser::format_rational;
use crate::verdict::{EngineKind, Finding, Severity, Verdict};
use formula::{ground, Atom, Grounding};
use solver::{Entailment, Enumerator, Model};
use statement::{parse_statement, Statement};
use std::collections::BTreeSet;
use tracing::debug;

/// Logic verification engine
#[derive(Debug, Clone)]
pub struct LogicEngine {
    config: LogicConfig,
    enumerator: Enumerator,
}

impl LogicEngine {
    /// Creates an engine
    pub fn new(config: LogicConfig) -> Self {
        let enumerator = Enumerator::new(config.max_atoms, config.max_assignments);
        LogicEngine { config, enumerator }
    }

    /// Engine configuration
    pub fn config(&self) -> &LogicConfig {
        &self.config
    }

    /// Check whether `premises` entail `conclusion`; errors become `undetermined`
    pub fn verify<S: AsRef<str>>(&self, premises: &[S], conclusion: &str) -> Verdict {
        match self.try_verify(premises, conclusion) {
            Ok(verdict) => verdict,
            Err(err) => Verdict::undetermined_from(EngineKind::Logic, &err),
        }
    }

    fn try_verify<S: AsRef<str>>(&self, premises: &[S], conclusion: &str) -> Result<Verdict> {
        let premises = premises
            .iter()
            .enumerate()
            .map(|(i, p)| {
                parse_statement(p.as_ref())
                    .map_err(|err| Error::parse(format!("premise {}: {}", i + 1, err)))
            })
            .collect::<Result<Vec<_>>>()?;
        let conclusion = parse_statement(conclusion)
            .map_err(|err| Error::parse(format!("conclusion: {}", err)))?;

        if let Some(missing) = ungrounded_terms(&premises, &conclusion) {
            debug!(missing = %missing, "conclusion not grounded in premises");
            return Ok(Verdict::undetermined(
                EngineKind::Logic,
                format!("conclusion mentions {} which no premise mentions", missing),
                Finding::new(
                    Severity::Info,
                    "ungrounded-conclusion",
                    format!("no premise mentions {}", missing),
                ),
            ));
        }

        let grounding = ground(&premises, &conclusion);
        debug!(
            atoms = grounding.table.len(),
            individuals = grounding.individuals.len(),
            "grounded claim set"
        );

        match self.enumerator.check(&grounding)? {
            Entailment::Entailed { models, visited } => Ok(Verdict::verified(
                EngineKind::Logic,
                1.0,
                format!(
                    "conclusion holds in all {} models of the premises ({} assignments checked)",
                    models, visited
                ),
            )),
            Entailment::Counterexample(model) => {
                let rendered = render_model(&grounding, &model);
                debug!(counterexample = %rendered, "entailment refuted");
                Ok(Verdict::refuted(
                    EngineKind::Logic,
                    1.0,
                    format!(
                        "premises do not entail the conclusion; counterexample: {}",
                        rendered
                    ),
                    Finding::new(Severity::High, "counterexample", rendered),
                ))
            }
            Entailment::InconsistentPremises => Ok(Verdict::undetermined(
                EngineKind::Logic,
                "no assignment satisfies all premises",
                Finding::new(
                    Severity::Info,
                    "inconsistent-premises",
                    "the premises contradict each other",
                ),
            )),
        }
    }
}

/// Conclusion terms that appear in no premise, joined for display
fn ungrounded_terms(premises: &[Statement], conclusion: &Statement) -> Option<String> {
    let known: BTreeSet<&str> = premises
        .iter()
        .flat_map(Statement::terms)
        .map(|t| t.key())
        .collect();
    let mut seen = BTreeSet::new();
    let missing: Vec<String> = conclusion
        .terms()
        .into_iter()
        .filter(|t| !known.contains(t.key()) && seen.insert(t.key()))
        .map(|t| format!("'{}'", t.display()))
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing.join(", "))
    }
}

/// Truth values of the named atoms, then the numbers chosen for variables
fn render_model(grounding: &Grounding, model: &Model) -> String {
    let mut parts = Vec::new();
    for (i, atom) in grounding.table.atoms().iter().enumerate() {
        let value = model.value(i);
        match atom {
            Atom::Holds { subject, predicate } => parts.push(format!(
                "{} is {}{}",
                subject,
                if value { "" } else { "not " },
                predicate
            )),
            Atom::Prop(name) => parts.push(format!("{} is {}", name, value)),
            Atom::Compare { .. } => {}
        }
    }
    for (variable, value) in &model.witnesses {
        parts.push(format!("{} = {}", variable, format_rational(value)));
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LogicEngine {
        LogicEngine::new(LogicConfig::default())
    }

    #[test]
    fn test_syllogism() {
        let v = engine().verify(&["All men are mortal", "Socrates is a man"], "Socrates is mortal");
        assert!(v.is_verified());
        assert_eq!(v.confidence(), 1.0);
        assert!(v.findings().is_empty());
    }

    #[test]
    fn test_unrelated_conclusion() {
        let v = engine().verify(&["All men are mortal", "Socrates is a man"], "Zeus is immortal");
        assert!(v.is_undetermined());
        assert_eq!(v.findings()[0].kind(), "ungrounded-conclusion");
    }

    #[test]
    fn test_numeric_entailment() {
        let v = engine().verify(&["income > 60000"], "income > 50000");
        assert!(v.is_verified());

        let v = engine().verify(&["income > 50000"], "income is greater than 60000");
        assert!(v.is_refuted());
        assert_eq!(v.confidence(), 1.0);
        assert!(v.explanation().contains("income = "));
        assert_eq!(v.findings()[0].kind(), "counterexample");
    }

    #[test]
    fn test_modus_ponens_and_converse() {
        assert!(engine().verify(&["If it rains then the ground is wet", "it rains"], "the ground is wet").is_verified());
        let v = engine().verify(&["If P then Q", "Q"], "P");
        assert!(v.is_refuted());
        assert!(v.explanation().contains("P is false"));
    }

    #[test]
    fn test_disjunctive_syllogism() {
        assert!(engine().verify(&["P or Q", "not P"], "Q").is_verified());
        assert!(engine().verify(&["either P or Q"], "Q").is_refuted());
    }

    #[test]
    fn test_universal_conclusion() {
        let v = engine().verify(&["All dogs are mammals", "All mammals are animals"], "All dogs are animals");
        assert!(v.is_verified());
        let v = engine().verify(&["All dogs are mammals", "All cats are animals"], "All dogs are animals");
        assert!(v.is_refuted());
        assert!(v.explanation().contains("an arbitrary"));
    }

    #[test]
    fn test_inconsistent_premises() {
        let v = engine().verify(&["P", "not P"], "P");
        assert!(v.is_undetermined());
        assert_eq!(v.findings()[0].kind(), "inconsistent-premises");
    }

    #[test]
    fn test_parse_error_names_premise() {
        let v = engine().verify(&["P", "income > lots"], "P");
        assert!(v.is_undetermined());
        assert!(v.explanation().contains("premise 2"));
        assert_eq!(v.findings()[0].kind(), "parse-error");
    }

    #[test]
    fn test_budget() {
        let small = LogicEngine::new(LogicConfig {
            max_atoms: 3,
            max_assignments: 1 << 20,
        });
        let v = small.verify(&["a and b and c and d"], "a");
        assert!(v.is_undetermined());
        assert_eq!(v.findings()[0].kind(), "budget-exhausted");
    }
}
