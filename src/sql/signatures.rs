//! Injection signature table
//!
//! Signatures run in table order. Each one reads one view of the query (see
//! [`SqlText`]): raw text when literal contents matter, the comment-keeping
//! mask for truncation markers, and the code view for keywords.

use super::text::SqlText;
use crate::verdict::Severity;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Which view of the query a pattern runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// The query as given
    Raw,
    /// Literal bodies blanked, comments kept
    Masked,
    /// Literal bodies and comments blanked
    Code,
}

/// Extra check on a regex match
pub type Predicate = fn(&Captures) -> bool;

/// How a signature finds its matches
#[derive(Debug)]
pub enum Matcher {
    /// Regular expression over one view
    Pattern {
        view: View,
        regex: Regex,
        /// Match must start in code, outside literals and comments
        anchored_in_code: bool,
        predicate: Option<Predicate>,
    },
    /// A quoted literal that never closes
    UnbalancedQuotes,
    /// Schema or privilege changes and unbounded DELETE/UPDATE
    Destructive,
}

/// One row of the table
#[derive(Debug)]
pub struct Signature {
    /// Finding kind tag
    pub kind: &'static str,
    /// Finding severity
    pub severity: Severity,
    /// Message prefix
    pub description: &'static str,
    /// Bind placeholders in the query suppress this signature
    pub suppressible: bool,
    /// Match rule
    pub matcher: Matcher,
}

/// A signature match
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Byte offset in the query
    pub offset: usize,
    /// The matched text, shortened
    pub excerpt: String,
}

const EXCERPT_CHARS: usize = 48;

lazy_static! {
    static ref STACKED: Regex = Regex::new(
        r"(?i);\s*(?:SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|TRUNCATE|EXEC|EXECUTE|GRANT|REVOKE|SHUTDOWN|DECLARE|REPLACE|MERGE|CALL)\b"
    )
    .expect("STACKED regex is valid");

    static ref LITERAL_COMPARISON: Regex = Regex::new(
        r#"(?i)\bOR\s+(?:'([^']*)'|"([^"]*)"|(-?\d+(?:\.\d+)?))\s*(=|<>|!=|<=|>=|<|>)\s*(?:'([^']*)'|"([^"]*)"|(-?\d+(?:\.\d+)?))"#
    )
    .expect("LITERAL_COMPARISON regex is valid");

    static ref CONSTANT_TRUE: Regex = Regex::new(r"(?i)\bOR\s+(?:NOT\s+FALSE|TRUE)\b")
        .expect("CONSTANT_TRUE regex is valid");

    static ref SELF_COMPARISON: Regex =
        Regex::new(r"(?i)\bOR\s+([A-Za-z_][\w.]*)\s*=\s*([A-Za-z_][\w.]*)")
            .expect("SELF_COMPARISON regex is valid");

    static ref COMMENT_AFTER_QUOTE: Regex = Regex::new(r"'\s*(?:--|#|/\*)")
        .expect("COMMENT_AFTER_QUOTE regex is valid");

    static ref SLEEP_CALL: Regex =
        Regex::new(r"(?i)\b(?:SLEEP|PG_SLEEP|BENCHMARK|DBMS_LOCK\.SLEEP)\s*\(")
            .expect("SLEEP_CALL regex is valid");

    static ref WAITFOR_DELAY: Regex = Regex::new(r"(?i)\bWAITFOR\s+DELAY\b")
        .expect("WAITFOR_DELAY regex is valid");

    static ref UNION_SELECT: Regex = Regex::new(r"(?i)\bUNION\s+(?:ALL\s+)?SELECT\b")
        .expect("UNION_SELECT regex is valid");

    static ref CONCATENATION: Regex = Regex::new(
        r#"['"]\s*\+\s*[A-Za-z_$]|[A-Za-z_$)\]]\s*\+\s*['"]|\$\{[^}]*\}"#
    )
    .expect("CONCATENATION regex is valid");

    static ref DESTRUCTIVE_HEAD: Regex =
        Regex::new(r"(?i)^\s*(DROP|TRUNCATE|ALTER|GRANT|REVOKE)\b")
            .expect("DESTRUCTIVE_HEAD regex is valid");

    static ref UNBOUNDED_HEAD: Regex = Regex::new(r"(?i)^\s*(DELETE|UPDATE)\b")
        .expect("UNBOUNDED_HEAD regex is valid");

    static ref WHERE_CLAUSE: Regex = Regex::new(r"(?i)\bWHERE\b")
        .expect("WHERE_CLAUSE regex is valid");

    static ref PLACEHOLDER: Regex = Regex::new(
        r"\?|(?:^|[^:\w]):[A-Za-z_]\w*|\$\d+|(?:^|[^@\w])@[A-Za-z_]\w*|%s|%\([A-Za-z_]\w*\)s"
    )
    .expect("PLACEHOLDER regex is valid");

    static ref TABLE_REFERENCE: Regex = Regex::new(
        r"(?i)\b(?:FROM|JOIN|INTO|UPDATE|TABLE)\s+(?:IF\s+(?:NOT\s+)?EXISTS\s+)?`?([A-Za-z_][\w.]*)`?"
    )
    .expect("TABLE_REFERENCE regex is valid");

    /// The shared signature table, in evaluation order
    pub static ref SIGNATURES: Vec<Signature> = vec![
        Signature {
            kind: "stacked-statements",
            severity: Severity::High,
            description: "second statement after ';'",
            suppressible: false,
            matcher: pattern(View::Code, &STACKED, false, None),
        },
        Signature {
            kind: "tautology",
            severity: Severity::High,
            description: "always-true condition",
            suppressible: true,
            matcher: pattern(View::Raw, &LITERAL_COMPARISON, true, Some(literal_comparison_holds)),
        },
        Signature {
            kind: "tautology",
            severity: Severity::High,
            description: "always-true condition",
            suppressible: true,
            matcher: pattern(View::Code, &CONSTANT_TRUE, false, None),
        },
        Signature {
            kind: "tautology",
            severity: Severity::High,
            description: "always-true condition",
            suppressible: true,
            matcher: pattern(View::Code, &SELF_COMPARISON, false, Some(same_operand)),
        },
        Signature {
            kind: "comment-truncation",
            severity: Severity::High,
            description: "comment cuts off the rest of the query after a quote",
            suppressible: false,
            matcher: pattern(View::Masked, &COMMENT_AFTER_QUOTE, false, None),
        },
        Signature {
            kind: "time-based-probe",
            severity: Severity::High,
            description: "timing function",
            suppressible: false,
            matcher: pattern(View::Code, &SLEEP_CALL, false, None),
        },
        Signature {
            kind: "time-based-probe",
            severity: Severity::High,
            description: "timing function",
            suppressible: false,
            matcher: pattern(View::Code, &WAITFOR_DELAY, false, None),
        },
        Signature {
            kind: "union-select",
            severity: Severity::High,
            description: "UNION SELECT appends a second result set",
            suppressible: false,
            matcher: pattern(View::Code, &UNION_SELECT, false, None),
        },
        Signature {
            kind: "string-concatenation",
            severity: Severity::Medium,
            description: "query text built by string concatenation",
            suppressible: true,
            matcher: pattern(View::Raw, &CONCATENATION, false, None),
        },
        Signature {
            kind: "unbalanced-quotes",
            severity: Severity::High,
            description: "quoted literal is never closed",
            suppressible: true,
            matcher: Matcher::UnbalancedQuotes,
        },
        Signature {
            kind: "destructive-statement",
            severity: Severity::High,
            description: "destructive statement",
            suppressible: false,
            matcher: Matcher::Destructive,
        },
    ];
}

fn pattern(
    view: View,
    regex: &Regex,
    anchored_in_code: bool,
    predicate: Option<Predicate>,
) -> Matcher {
    Matcher::Pattern {
        view,
        regex: regex.clone(),
        anchored_in_code,
        predicate,
    }
}

impl Signature {
    /// Every match of this signature in `text`, in offset order
    pub fn matches(&self, text: &SqlText) -> Vec<Hit> {
        match &self.matcher {
            Matcher::Pattern {
                view,
                regex,
                anchored_in_code,
                predicate,
            } => {
                let haystack = match view {
                    View::Raw => text.raw(),
                    View::Masked => text.masked(),
                    View::Code => text.code(),
                };
                regex
                    .captures_iter(haystack)
                    .filter_map(|caps| {
                        let m = caps.get(0)?;
                        if *anchored_in_code && !text.is_code(m.start()) {
                            return None;
                        }
                        if let Some(check) = predicate {
                            if !check(&caps) {
                                return None;
                            }
                        }
                        let excerpt = text.raw().get(m.range()).unwrap_or(m.as_str());
                        Some(Hit {
                            offset: m.start(),
                            excerpt: shorten(excerpt),
                        })
                    })
                    .collect()
            }
            Matcher::UnbalancedQuotes => text
                .unterminated()
                .map(|offset| Hit {
                    offset,
                    excerpt: shorten(text.raw().get(offset..).unwrap_or_default()),
                })
                .into_iter()
                .collect(),
            Matcher::Destructive => destructive_statements(text),
        }
    }
}

fn destructive_statements(text: &SqlText) -> Vec<Hit> {
    let mut hits = Vec::new();
    for range in text.statements() {
        let code = match text.code().get(range.clone()) {
            Some(code) => code,
            None => continue,
        };
        let lead = code.len() - code.trim_start().len();
        let offset = range.start + lead;
        let statement = text.raw().get(offset..range.end).unwrap_or_default();

        if DESTRUCTIVE_HEAD.is_match(code) {
            hits.push(Hit {
                offset,
                excerpt: shorten(statement),
            });
        } else if let Some(caps) = UNBOUNDED_HEAD.captures(code) {
            if !WHERE_CLAUSE.is_match(code) {
                hits.push(Hit {
                    offset,
                    excerpt: format!("{} without WHERE", caps[1].to_ascii_uppercase()),
                });
            }
        }
    }
    hits
}

/// Byte offset of the first bind placeholder in code, if any
pub fn first_placeholder(text: &SqlText) -> Option<usize> {
    PLACEHOLDER.find(text.code()).map(|m| m.start())
}

/// Number of bind placeholders in code
pub fn placeholder_count(text: &SqlText) -> usize {
    PLACEHOLDER.find_iter(text.code()).count()
}

/// Table names referenced after FROM, JOIN, INTO, UPDATE or TABLE
pub fn referenced_tables(text: &SqlText) -> Vec<(usize, String)> {
    TABLE_REFERENCE
        .captures_iter(text.code())
        .filter_map(|caps| {
            let name = caps.get(1)?;
            Some((name.start(), name.as_str().to_string()))
        })
        .collect()
}

fn shorten(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(EXCERPT_CHARS).collect();
    short.push_str("...");
    short
}

#[derive(Debug, PartialEq)]
enum Literal {
    Number(f64),
    Text(String),
}

fn literal(caps: &Captures, first: usize) -> Option<Literal> {
    if let Some(s) = caps.get(first).or_else(|| caps.get(first + 1)) {
        return Some(Literal::Text(s.as_str().to_string()));
    }
    caps.get(first + 2)
        .and_then(|n| n.as_str().parse().ok())
        .map(Literal::Number)
}

fn as_number(lit: &Literal) -> Option<f64> {
    match lit {
        Literal::Number(n) => Some(*n),
        Literal::Text(s) => s.trim().parse().ok(),
    }
}

/// Comparison of two literals that holds whatever the bound values are
fn literal_comparison_holds(caps: &Captures) -> bool {
    let (left, right) = match (literal(caps, 1), literal(caps, 5)) {
        (Some(l), Some(r)) => (l, r),
        _ => return false,
    };
    let op = match caps.get(4) {
        Some(op) => op.as_str(),
        None => return false,
    };
    let ordering = match (&left, &right) {
        (Literal::Text(l), Literal::Text(r)) => l.partial_cmp(r),
        _ => match (as_number(&left), as_number(&right)) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
    };
    let ordering = match ordering {
        Some(ordering) => ordering,
        None => return false,
    };
    match op {
        "=" => ordering.is_eq(),
        "<>" | "!=" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        ">" => ordering.is_gt(),
        "<=" => ordering.is_le(),
        ">=" => ordering.is_ge(),
        _ => false,
    }
}

fn same_operand(caps: &Captures) -> bool {
    match (caps.get(1), caps.get(2)) {
        (Some(l), Some(r)) => l.as_str().eq_ignore_ascii_case(r.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<&'static str> {
        let text = SqlText::new(sql);
        SIGNATURES
            .iter()
            .filter(|s| !s.matches(&text).is_empty())
            .map(|s| s.kind)
            .collect()
    }

    #[test]
    fn test_tautologies() {
        assert_eq!(kinds("SELECT * FROM t WHERE id = '1' OR '1'='1'"), vec!["tautology"]);
        assert_eq!(kinds("SELECT * FROM t WHERE id = 5 OR 1=1"), vec!["tautology"]);
        assert_eq!(kinds("SELECT * FROM t WHERE a = 1 OR 'a'<>'b'"), vec!["tautology"]);
        assert_eq!(kinds("SELECT * FROM t WHERE a = 1 OR 2 > 1"), vec!["tautology"]);
        assert_eq!(kinds("SELECT * FROM t WHERE a = 1 OR TRUE"), vec!["tautology"]);
        assert_eq!(kinds("SELECT * FROM t WHERE a = 1 OR x = x"), vec!["tautology"]);
    }

    #[test]
    fn test_false_comparisons_are_not_tautologies() {
        assert!(kinds("SELECT * FROM t WHERE a = 1 OR 1=2").is_empty());
        assert!(kinds("SELECT * FROM t WHERE a = 1 OR 'a'='b'").is_empty());
        assert!(kinds("SELECT * FROM t WHERE a = 1 OR t.x = u.x").is_empty());
        assert!(kinds("SELECT * FROM t WHERE note = 'x OR 1=1'").is_empty());
    }

    #[test]
    fn test_structural_signatures() {
        assert_eq!(
            kinds("SELECT * FROM users WHERE name = 'a'; DROP TABLE users"),
            vec!["stacked-statements", "destructive-statement"]
        );
        assert_eq!(
            kinds("SELECT * FROM users WHERE name = 'admin'--' AND pw = 'x'"),
            vec!["comment-truncation"]
        );
        assert_eq!(kinds("SELECT pg_sleep(5)"), vec!["time-based-probe"]);
        assert_eq!(kinds("SELECT 1; WAITFOR DELAY '0:0:5'"), vec!["time-based-probe"]);
        assert_eq!(
            kinds("SELECT a FROM t UNION ALL SELECT password FROM users"),
            vec!["union-select"]
        );
        assert_eq!(
            kinds("SELECT * FROM t WHERE name = '\" + name + \"'"),
            vec!["string-concatenation"]
        );
        assert_eq!(kinds("SELECT * FROM t WHERE name = 'O'Brien'"), vec!["unbalanced-quotes"]);
    }

    #[test]
    fn test_destructive_statements() {
        assert_eq!(kinds("DROP TABLE users"), vec!["destructive-statement"]);
        assert_eq!(kinds("DELETE FROM logs"), vec!["destructive-statement"]);
        assert!(kinds("DELETE FROM logs WHERE day < 3").is_empty());
        assert!(kinds("UPDATE t SET a = 1 WHERE id = 2").is_empty());

        let text = SqlText::new("update t set a = 1");
        let hits = SIGNATURES
            .iter()
            .find(|s| s.kind == "destructive-statement")
            .map(|s| s.matches(&text))
            .unwrap_or_default();
        assert_eq!(hits[0].excerpt, "UPDATE without WHERE");
    }

    #[test]
    fn test_placeholders() {
        for sql in [
            "SELECT * FROM t WHERE id = ?",
            "SELECT * FROM t WHERE id = :id",
            "SELECT * FROM t WHERE id = $1",
            "SELECT * FROM t WHERE id = @id",
            "SELECT * FROM t WHERE id = %s",
            "SELECT * FROM t WHERE id = %(id)s",
        ] {
            assert!(first_placeholder(&SqlText::new(sql)).is_some(), "{}", sql);
        }
        assert!(first_placeholder(&SqlText::new("SELECT '?' FROM t")).is_none());
        assert!(first_placeholder(&SqlText::new("SELECT a::text, @@version FROM t")).is_none());
        assert_eq!(placeholder_count(&SqlText::new("VALUES (?, ?, ?)")), 3);
    }

    #[test]
    fn test_referenced_tables() {
        let text = SqlText::new("SELECT * FROM public.users u JOIN orders o ON u.id = o.uid");
        let names: Vec<String> = referenced_tables(&text).into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["public.users", "orders"]);

        let text = SqlText::new("DROP TABLE IF EXISTS `audit`");
        assert_eq!(referenced_tables(&text)[0].1, "audit");
    }
}
