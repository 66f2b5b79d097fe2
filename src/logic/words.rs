//! Term normalization for the controlled-English grammar

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

lazy_static! {
    /// Plurals that suffix rules cannot undo
    static ref IRREGULAR_PLURALS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("men", "man");
        m.insert("women", "woman");
        m.insert("people", "person");
        m.insert("children", "child");
        m.insert("mice", "mouse");
        m.insert("geese", "goose");
        m.insert("feet", "foot");
        m.insert("teeth", "tooth");
        m.insert("oxen", "ox");
        m.insert("humans", "human");
        m
    };
}

const ARTICLES: &[&str] = &["a", "an", "the"];

/// A normalized noun phrase with the text it was written as
///
/// Equality and ordering use the key only, so `men` and `a man` are the same
/// term.
#[derive(Debug, Clone)]
pub struct Term {
    key: String,
    display: String,
}

impl Term {
    /// Build a term from the words of a phrase
    ///
    /// Leading articles are dropped when a noun follows them; a phrase made
    /// only of articles keeps its last word, so `A` names a proposition.
    /// Returns `None` for an empty phrase.
    pub fn from_words(words: &[&str]) -> Option<Self> {
        let start = words
            .iter()
            .position(|w| !ARTICLES.contains(&w.to_lowercase().as_str()))
            .or_else(|| words.len().checked_sub(1))?;
        let words = &words[start..];
        let last = words.len() - 1;
        let key_parts: Vec<String> = words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let cleaned = clean(w);
                if i == last {
                    singularize(&cleaned)
                } else {
                    cleaned
                }
            })
            .filter(|w| !w.is_empty())
            .collect();
        if key_parts.is_empty() {
            return None;
        }
        Some(Term {
            key: key_parts.join("_"),
            display: words.join(" "),
        })
    }

    /// Term with an explicit key and display text
    pub fn named(key: impl Into<String>, display: impl Into<String>) -> Self {
        Term {
            key: key.into(),
            display: display.into(),
        }
    }

    /// Normalized key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Text as written
    pub fn display(&self) -> &str {
        &self.display
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Term {}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::hash::Hash for Term {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Lowercase and keep only word characters
fn clean(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Reduce a plural noun or third-person verb to its base form
pub fn singularize(word: &str) -> String {
    if let Some(base) = IRREGULAR_PLURALS.get(word) {
        return (*base).to_string();
    }
    let n = word.len();
    if n > 4 && word.ends_with("ies") {
        return format!("{}y", &word[..n - 3]);
    }
    if word.ends_with("sses")
        || word.ends_with("shes")
        || word.ends_with("ches")
        || word.ends_with("xes")
        || word.ends_with("zzes")
    {
        return word[..n - 2].to_string();
    }
    if n > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is") {
        return word[..n - 1].to_string();
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("men"), "man");
        assert_eq!(singularize("cats"), "cat");
        assert_eq!(singularize("flies"), "fly");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("glass"), "glass");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("is"), "is");
    }

    #[test]
    fn test_articles_and_plurals_share_a_key() {
        let a = Term::from_words(&["a", "Man"]).unwrap();
        let b = Term::from_words(&["men"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.display(), "Man");
    }

    #[test]
    fn test_multi_word_phrase() {
        let t = Term::from_words(&["the", "credit", "scores"]).unwrap();
        assert_eq!(t.key(), "credit_score");
        assert_eq!(t.display(), "credit scores");
    }

    #[test]
    fn test_bare_article_names_a_proposition() {
        let a = Term::from_words(&["A"]).unwrap();
        assert_eq!(a.key(), "a");
        assert_eq!(a.display(), "A");
        assert_eq!(Term::from_words(&["the"]).unwrap().key(), "the");
        assert!(Term::from_words(&[]).is_none());
    }
}
