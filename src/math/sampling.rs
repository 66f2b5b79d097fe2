use super::eval::{eval_f64, format_value, Bindings};
use crate::parser::Expr;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Outcome of comparing two expressions at random points
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    /// Every defined trial agreed
    Agree {
        /// Trials where both sides were defined
        defined: usize,
        /// Trials attempted
        total: usize,
    },
    /// A trial disagreed
    Counterexample {
        /// Point where the sides differ
        point: Bindings,
        /// Left-hand value
        left: f64,
        /// Right-hand value
        right: f64,
    },
    /// No trial was defined on both sides
    NoDefinedPoints {
        /// Trials attempted
        total: usize,
    },
}

/// Seeded sampler over a symmetric domain
///
/// The same seed and inputs always produce the same points, so verdicts
/// derived from sampling are reproducible.
#[derive(Debug, Clone)]
pub struct Sampler {
    seed: u64,
    trials: usize,
    domain: f64,
    abs_tolerance: f64,
    rel_tolerance: f64,
}

impl Sampler {
    /// Creates a sampler
    pub fn new(seed: u64, trials: usize, domain: f64, abs_tolerance: f64, rel_tolerance: f64) -> Self {
        Sampler {
            seed,
            trials: trials.max(1),
            domain: domain.abs().max(f64::MIN_POSITIVE),
            abs_tolerance,
            rel_tolerance,
        }
    }

    /// Compare `left` and `right` over `symbols`
    pub fn compare(&self, left: &Expr, right: &Expr, symbols: &[String]) -> SampleOutcome {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut defined = 0usize;
        for _ in 0..self.trials {
            let point: Bindings = symbols
                .iter()
                .map(|name| (name.clone(), rng.gen_range(-self.domain..=self.domain)))
                .collect();
            let (a, b) = match (eval_f64(left, &point), eval_f64(right, &point)) {
                (Ok(a), Ok(b)) => (a, b),
                _ => continue,
            };
            defined += 1;
            if !self.close(a, b) {
                return SampleOutcome::Counterexample {
                    point,
                    left: a,
                    right: b,
                };
            }
        }
        if defined == 0 {
            SampleOutcome::NoDefinedPoints { total: self.trials }
        } else {
            SampleOutcome::Agree {
                defined,
                total: self.trials,
            }
        }
    }

    /// Returns true when `a` and `b` agree within tolerance
    pub fn close(&self, a: f64, b: f64) -> bool {
        let scale = a.abs().max(b.abs());
        (a - b).abs() <= self.abs_tolerance + self.rel_tolerance * scale
    }
}

/// Render a sample point as `x = 1.5, y = -2`
pub fn format_point(point: &Bindings) -> String {
    point
        .iter()
        .map(|(name, value)| format!("{} = {}", name, format_value(*value)))
        .collect::<Vec<_>>()
        .join(", ")
}
