//! Closed controlled-English grammar for premises and conclusions

use super::words::Term;
use crate::error::{Error, Result};
use crate::parser::{format_rational, Number};
use num_rational::BigRational;
use std::fmt;

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompareOp {
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `=`
    Eq,
    /// `!=`
    Ne,
}

impl CompareOp {
    fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            ">" => CompareOp::Gt,
            "<" => CompareOp::Lt,
            ">=" | "\u{2265}" => CompareOp::Ge,
            "<=" | "\u{2264}" => CompareOp::Le,
            "=" | "==" => CompareOp::Eq,
            "!=" | "\u{2260}" => CompareOp::Ne,
            _ => return None,
        };
        Some(op)
    }

    /// The operator that holds exactly when this one does not
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
        }
    }

    /// Evaluate `lhs op rhs`
    pub fn holds(self, lhs: &BigRational, rhs: &BigRational) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
        }
    }

    /// Operator symbol
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
        }
    }
}

/// Smallest unit of a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `subject is [not] predicate`
    Triple {
        /// Individual the clause is about
        subject: Term,
        /// Class or property
        predicate: Term,
        /// False when negated
        polarity: bool,
    },
    /// Propositional letter such as `P`
    Prop {
        /// Letter or word
        name: Term,
        /// False when negated
        polarity: bool,
    },
    /// `variable op value`
    Comparison {
        /// Numeric variable
        variable: Term,
        /// Operator
        op: CompareOp,
        /// Exact literal
        value: BigRational,
        /// False when negated
        polarity: bool,
    },
}

impl Clause {
    /// The same clause with its polarity flipped
    pub fn negated(self) -> Self {
        match self {
            Clause::Triple {
                subject,
                predicate,
                polarity,
            } => Clause::Triple {
                subject,
                predicate,
                polarity: !polarity,
            },
            Clause::Prop { name, polarity } => Clause::Prop {
                name,
                polarity: !polarity,
            },
            Clause::Comparison {
                variable,
                op,
                value,
                polarity,
            } => Clause::Comparison {
                variable,
                op,
                value,
                polarity: !polarity,
            },
        }
    }

    /// Terms the clause mentions
    pub fn terms(&self) -> Vec<&Term> {
        match self {
            Clause::Triple {
                subject, predicate, ..
            } => vec![subject, predicate],
            Clause::Prop { name, .. } => vec![name],
            Clause::Comparison { variable, .. } => vec![variable],
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Clause::Triple {
                subject,
                predicate,
                polarity,
            } => write!(
                f,
                "{} is {}{}",
                subject,
                if *polarity { "" } else { "not " },
                predicate
            ),
            Clause::Prop { name, polarity } => {
                write!(f, "{}{}", if *polarity { "" } else { "not " }, name)
            }
            Clause::Comparison {
                variable,
                op,
                value,
                polarity,
            } => {
                let op = if *polarity { *op } else { op.negate() };
                write!(f, "{} {} {}", variable, op.symbol(), format_rational(value))
            }
        }
    }
}

/// One parsed premise or conclusion
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A single clause
    Assertion(Clause),
    /// `All C are P`, `No C are P`
    Universal {
        /// Class quantified over
        class: Term,
        /// Property every member has (or lacks)
        predicate: Term,
        /// False for `No C are P` and `All C are not P`
        polarity: bool,
    },
    /// `If A then B`
    Conditional {
        /// Conjoined conditions
        antecedent: Vec<Clause>,
        /// Conjoined consequences
        consequent: Vec<Clause>,
    },
    /// `A and B`
    Conjunction(Vec<Clause>),
    /// `A or B`
    Disjunction(Vec<Clause>),
}

impl Statement {
    /// Terms the statement mentions
    pub fn terms(&self) -> Vec<&Term> {
        match self {
            Statement::Assertion(clause) => clause.terms(),
            Statement::Universal {
                class, predicate, ..
            } => vec![class, predicate],
            Statement::Conditional {
                antecedent,
                consequent,
            } => antecedent
                .iter()
                .chain(consequent.iter())
                .flat_map(Clause::terms)
                .collect(),
            Statement::Conjunction(clauses) | Statement::Disjunction(clauses) => {
                clauses.iter().flat_map(Clause::terms).collect()
            }
        }
    }
}

const COPULAS: &[&str] = &["is", "are", "was", "were"];
const QUANTIFIERS: &[&str] = &["all", "every", "each", "any", "no"];

/// Word-form comparisons, longest first, rewritten to operator tokens
/// when a number follows
const COMPARISON_PHRASES: &[(&[&str], &str)] = &[
    (&["is", "greater", "than", "or", "equal", "to"], ">="),
    (&["is", "less", "than", "or", "equal", "to"], "<="),
    (&["is", "not", "greater", "than"], "<="),
    (&["is", "not", "less", "than"], ">="),
    (&["is", "not", "equal", "to"], "!="),
    (&["is", "no", "less", "than"], ">="),
    (&["is", "no", "more", "than"], "<="),
    (&["is", "greater", "than"], ">"),
    (&["is", "more", "than"], ">"),
    (&["is", "less", "than"], "<"),
    (&["is", "fewer", "than"], "<"),
    (&["is", "at", "least"], ">="),
    (&["is", "at", "most"], "<="),
    (&["is", "equal", "to"], "="),
    (&["does", "not", "equal"], "!="),
    (&["is", "above"], ">"),
    (&["is", "over"], ">"),
    (&["is", "below"], "<"),
    (&["is", "under"], "<"),
    (&["is", "not"], "!="),
    (&["exceeds"], ">"),
    (&["equals"], "="),
    (&["is"], "="),
];

/// Parse one sentence of the closed grammar
pub fn parse_statement(text: &str) -> Result<Statement> {
    let tokens = rewrite_comparisons(tokenize(text));
    if tokens.is_empty() {
        return Err(Error::EmptyInput);
    }
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let lower: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

    if lower[0] == "if" {
        let (antecedent, consequent) = if let Some(then) = find(&lower, "then") {
            (&words[1..then], &words[then + 1..])
        } else if let Some(comma) = find(&lower, ",") {
            (&words[1..comma], &words[comma + 1..])
        } else {
            return Err(Error::parse(format!(
                "conditional needs 'then' or a comma: {}",
                text.trim()
            )));
        };
        return Ok(Statement::Conditional {
            antecedent: parse_conjuncts(antecedent)?,
            consequent: parse_conjuncts(consequent)?,
        });
    }
    if let Some(i) = find(&lower, "implies") {
        return Ok(Statement::Conditional {
            antecedent: parse_conjuncts(&words[..i])?,
            consequent: parse_conjuncts(&words[i + 1..])?,
        });
    }

    if QUANTIFIERS.contains(&lower[0].as_str()) {
        return parse_universal(&words, &lower, text);
    }

    let (words, lower) = if lower[0] == "either" {
        (&words[1..], &lower[1..])
    } else {
        (&words[..], &lower[..])
    };
    if find(lower, "or").is_some() {
        let parts = split_on(words, lower, &["or", ","]);
        return Ok(Statement::Disjunction(
            parts.iter().map(|p| parse_clause(p)).collect::<Result<_>>()?,
        ));
    }
    if find(lower, "and").is_some() {
        return Ok(Statement::Conjunction(parse_conjuncts(words)?));
    }
    Ok(Statement::Assertion(parse_clause(words)?))
}

fn parse_universal(words: &[&str], lower: &[String], text: &str) -> Result<Statement> {
    let negative_quantifier = lower[0] == "no";
    let rest = &words[1..];
    let rest_lower = &lower[1..];

    let (class_words, mut predicate_words, mut negated) =
        match rest_lower.iter().position(|w| w == "are" || w == "is") {
            Some(c) => (&rest[..c], &rest[c + 1..], false),
            None => match rest_lower
                .iter()
                .position(|w| matches!(w.as_str(), "do" | "does" | "don't" | "doesn't" | "cannot"))
            {
                Some(d) if matches!(rest_lower[d].as_str(), "do" | "does") => {
                    let negated = rest_lower.get(d + 1).map(String::as_str) == Some("not");
                    let skip = if negated { 2 } else { 1 };
                    (&rest[..d], &rest[(d + skip).min(rest.len())..], negated)
                }
                Some(d) => (&rest[..d], &rest[d + 1..], true),
                // `All birds fly`: the last word is the verb
                None if rest.len() >= 2 => (&rest[..rest.len() - 1], &rest[rest.len() - 1..], false),
                None => {
                    return Err(Error::parse(format!(
                        "universal needs a class and a predicate: {}",
                        text.trim()
                    )))
                }
            },
        };
    if predicate_words
        .first()
        .map_or(false, |w| w.eq_ignore_ascii_case("not"))
    {
        negated = !negated;
        predicate_words = &predicate_words[1..];
    }

    let class = term(class_words, text)?;
    let predicate = term(predicate_words, text)?;
    Ok(Statement::Universal {
        class,
        predicate,
        polarity: negative_quantifier == negated,
    })
}

fn parse_conjuncts(words: &[&str]) -> Result<Vec<Clause>> {
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    split_on(words, &lower, &["and", ","])
        .iter()
        .map(|p| parse_clause(p))
        .collect()
}

fn parse_clause(words: &[&str]) -> Result<Clause> {
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let text = words.join(" ");
    if words.is_empty() {
        return Err(Error::parse("empty clause"));
    }

    const NOT_THE_CASE: &[&str] = &["it", "is", "not", "the", "case", "that"];
    if lower.len() > NOT_THE_CASE.len()
        && lower.iter().zip(NOT_THE_CASE).all(|(a, b)| a == b)
    {
        return Ok(parse_clause(&words[NOT_THE_CASE.len()..])?.negated());
    }
    if lower[0] == "not" {
        return Ok(parse_clause(&words[1..])?.negated());
    }

    if let Some((i, op)) = lower
        .iter()
        .enumerate()
        .find_map(|(i, w)| CompareOp::from_token(w).map(|op| (i, op)))
    {
        let variable = term(&words[..i], &text)?;
        let value = match &words[i + 1..] {
            [literal] => parse_number(literal).ok_or_else(|| {
                Error::parse(format!("expected a number after '{}' in: {}", op.symbol(), text))
            })?,
            _ => {
                return Err(Error::parse(format!(
                    "comparison needs exactly one number: {}",
                    text
                )))
            }
        };
        return Ok(Clause::Comparison {
            variable,
            op,
            value,
            polarity: true,
        });
    }

    if let Some(c) = lower
        .iter()
        .position(|w| COPULAS.contains(&w.as_str()))
        .filter(|c| *c > 0)
    {
        let mut after = &words[c + 1..];
        let mut polarity = true;
        if after.first().map_or(false, |w| w.eq_ignore_ascii_case("not")) {
            polarity = false;
            after = &after[1..];
        }
        return Ok(Clause::Triple {
            subject: term(&words[..c], &text)?,
            predicate: term(after, &text)?,
            polarity,
        });
    }

    if let Some(d) = lower.iter().position(|w| {
        matches!(w.as_str(), "does" | "do" | "doesn't" | "don't" | "cannot")
    }) {
        let skip = match lower[d].as_str() {
            "does" | "do" if lower.get(d + 1).map(String::as_str) == Some("not") => 2,
            "does" | "do" => {
                return Err(Error::parse(format!("unsupported auxiliary in: {}", text)))
            }
            _ => 1,
        };
        if d > 0 {
            return Ok(Clause::Triple {
                subject: term(&words[..d], &text)?,
                predicate: term(&words[(d + skip).min(words.len())..], &text)?,
                polarity: false,
            });
        }
    }

    if words.len() == 1 {
        return Ok(Clause::Prop {
            name: term(words, &text)?,
            polarity: true,
        });
    }
    // `Tweety flies`
    Ok(Clause::Triple {
        subject: term(&words[..1], &text)?,
        predicate: term(&words[1..], &text)?,
        polarity: true,
    })
}

fn term(words: &[&str], text: &str) -> Result<Term> {
    Term::from_words(words)
        .ok_or_else(|| Error::parse(format!("missing noun phrase in: {}", text.trim())))
}

fn parse_number(token: &str) -> Option<BigRational> {
    let (negative, digits) = match token.strip_prefix(['-', '\u{2212}']) {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    match Number::from_decimal(digits)? {
        Number::Exact(value) if negative => Some(-value),
        Number::Exact(value) => Some(value),
        Number::Approx(_) => None,
    }
}

fn find(lower: &[String], word: &str) -> Option<usize> {
    lower.iter().position(|w| w == word)
}

fn split_on<'a>(words: &[&'a str], lower: &[String], separators: &[&str]) -> Vec<Vec<&'a str>> {
    let mut parts: Vec<Vec<&'a str>> = vec![Vec::new()];
    for (word, low) in words.iter().zip(lower) {
        if separators.contains(&low.as_str()) {
            if parts.last().map_or(false, |p| !p.is_empty()) {
                parts.push(Vec::new());
            }
        } else if let Some(last) = parts.last_mut() {
            last.push(word);
        }
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Split a sentence into words, commas and operator tokens
///
/// Sentence punctuation is dropped, thousands separators inside numbers are
/// removed, and currency or percent signs next to digits are ignored.
fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let digit_at = |i: usize| chars.get(i).map_or(false, |c| c.is_ascii_digit());

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_alphanumeric() || c == '_' || c == '\'' => current.push(c),
            '.' if digit_at(i + 1) && (i == 0 || !chars[i - 1].is_alphabetic()) => current.push(c),
            '-' | '\u{2212}' if current.is_empty() && digit_at(i + 1) => current.push('-'),
            '-' if !current.is_empty() && chars.get(i + 1).map_or(false, |n| n.is_alphabetic()) => {
                current.push(c)
            }
            ',' if i > 0 && chars[i - 1].is_ascii_digit() && digit_at(i + 1) => {}
            '$' | '%' | '\u{20ac}' | '\u{00a3}' => {}
            '>' | '<' | '=' | '!' | '\u{2265}' | '\u{2264}' | '\u{2260}' => {
                flush(&mut current, &mut tokens);
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                if matches!(two.as_str(), ">=" | "<=" | "!=" | "==") {
                    tokens.push(two);
                    i += 1;
                } else if c != '!' {
                    tokens.push(c.to_string());
                }
            }
            ',' => {
                flush(&mut current, &mut tokens);
                tokens.push(",".to_string());
            }
            _ => flush(&mut current, &mut tokens),
        }
        i += 1;
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Replace word-form comparisons followed by a number with operator tokens
fn rewrite_comparisons(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    'outer: while i < tokens.len() {
        for (phrase, op) in COMPARISON_PHRASES {
            let end = i + phrase.len();
            let matches_phrase = end < tokens.len()
                && tokens[i..end]
                    .iter()
                    .zip(phrase.iter())
                    .all(|(t, p)| t.eq_ignore_ascii_case(p));
            if matches_phrase && parse_number(&tokens[end]).is_some() {
                out.push((*op).to_string());
                i = end;
                continue 'outer;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(t: &Term) -> &str {
        t.key()
    }

    #[test]
    fn test_universal() {
        match parse_statement("All men are mortal.").unwrap() {
            Statement::Universal {
                class,
                predicate,
                polarity,
            } => {
                assert_eq!(key(&class), "man");
                assert_eq!(key(&predicate), "mortal");
                assert!(polarity);
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_statement("No reptiles are mammals").unwrap() {
            Statement::Universal { polarity, .. } => assert!(!polarity),
            other => panic!("unexpected {:?}", other),
        }
        match parse_statement("All birds fly").unwrap() {
            Statement::Universal { predicate, .. } => assert_eq!(key(&predicate), "fly"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assertion_and_negation() {
        assert_eq!(
            parse_statement("Socrates is a man").unwrap(),
            Statement::Assertion(Clause::Triple {
                subject: Term::named("socrate", ""),
                predicate: Term::named("man", ""),
                polarity: true,
            })
        );
        match parse_statement("It is not the case that Tweety flies").unwrap() {
            Statement::Assertion(Clause::Triple { polarity, .. }) => assert!(!polarity),
            other => panic!("unexpected {:?}", other),
        }
        match parse_statement("Tweety does not fly").unwrap() {
            Statement::Assertion(Clause::Triple {
                predicate,
                polarity,
                ..
            }) => {
                assert_eq!(key(&predicate), "fly");
                assert!(!polarity);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conditionals() {
        let s = parse_statement("If P then Q").unwrap();
        assert!(matches!(s, Statement::Conditional { .. }));
        let s = parse_statement("If it rains, the ground is wet").unwrap();
        match s {
            Statement::Conditional { consequent, .. } => {
                assert_eq!(consequent.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            parse_statement("P implies Q").unwrap(),
            Statement::Conditional { .. }
        ));
        assert!(parse_statement("If P Q").is_err());
    }

    #[test]
    fn test_connectives() {
        match parse_statement("Either P or Q").unwrap() {
            Statement::Disjunction(parts) => assert_eq!(parts.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        match parse_statement("P and not Q").unwrap() {
            Statement::Conjunction(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], Clause::Prop { polarity: false, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_comparisons() {
        for text in [
            "income > 50000",
            "income>50,000",
            "income is greater than $50,000",
            "income exceeds 50000",
        ] {
            match parse_statement(text).unwrap() {
                Statement::Assertion(Clause::Comparison {
                    variable, op, value, ..
                }) => {
                    assert_eq!(key(&variable), "income");
                    assert_eq!(op, CompareOp::Gt);
                    assert_eq!(value, BigRational::from_integer(50_000.into()));
                }
                other => panic!("unexpected {:?} for {}", other, text),
            }
        }
        match parse_statement("rate is at most 0.3").unwrap() {
            Statement::Assertion(Clause::Comparison { op, .. }) => assert_eq!(op, CompareOp::Le),
            other => panic!("unexpected {:?}", other),
        }
        match parse_statement("income is greater than or equal to 10").unwrap() {
            Statement::Assertion(Clause::Comparison { op, .. }) => assert_eq!(op, CompareOp::Ge),
            other => panic!("unexpected {:?}", other),
        }
        match parse_statement("x = -5").unwrap() {
            Statement::Assertion(Clause::Comparison { value, .. }) => {
                assert_eq!(value, BigRational::from_integer((-5).into()))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(parse_statement("  "), Err(Error::EmptyInput));
        assert!(parse_statement("income > lots").is_err());
        assert!(parse_statement("All").is_err());
    }

    #[test]
    fn test_compare_op_negation() {
        let five = BigRational::from_integer(5.into());
        let six = BigRational::from_integer(6.into());
        for op in [
            CompareOp::Gt,
            CompareOp::Lt,
            CompareOp::Ge,
            CompareOp::Le,
            CompareOp::Eq,
            CompareOp::Ne,
        ] {
            assert_ne!(op.holds(&six, &five), op.negate().holds(&six, &five));
        }
    }
}
