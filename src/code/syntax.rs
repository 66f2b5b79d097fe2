//! Shallow syntax tree for call resolution
//!
//! Sources are split into logical statements and each statement is parsed into
//! just the structure the risk walker needs: imports, simple assignments and
//! expression trees of calls, attribute chains, subscripts and string
//! operations. Anything else is skipped token by token, so malformed or
//! unfamiliar syntax degrades to fewer nodes rather than an error.

use super::scanner::{SrcKind, SrcToken};
use super::Language;
use crate::verdict::Location;

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Bare identifier
    Name {
        /// Identifier
        name: String,
        /// Position
        location: Location,
    },
    /// `object.name`
    Attribute {
        /// Receiver
        object: Box<Node>,
        /// Member name
        name: String,
    },
    /// `callee(args)`
    Call {
        /// Called expression
        callee: Box<Node>,
        /// Positional and keyword argument values, in order
        args: Vec<Node>,
    },
    /// `object[index]`
    Subscript {
        /// Indexed expression
        object: Box<Node>,
        /// Index expressions
        index: Vec<Node>,
    },
    /// String literal
    Str {
        /// Body without quotes
        value: String,
        /// f-string or template literal with substitutions
        interpolated: bool,
        /// Position
        location: Location,
    },
    /// Binary operation
    Binary {
        /// Operator text
        op: String,
        /// Left operand
        left: Box<Node>,
        /// Right operand
        right: Box<Node>,
    },
    /// Tuple, list, dict, object literal or parameter list
    Group {
        /// Element expressions
        items: Vec<Node>,
        /// Position of the opening bracket
        location: Location,
    },
    /// Number or constant keyword
    Literal {
        /// Position
        location: Location,
    },
}

impl Node {
    /// Position of the first token of the node
    pub fn location(&self) -> Location {
        match self {
            Node::Name { location, .. }
            | Node::Str { location, .. }
            | Node::Group { location, .. }
            | Node::Literal { location } => *location,
            Node::Attribute { object, .. }
            | Node::Call { callee: object, .. }
            | Node::Subscript { object, .. } => object.location(),
            Node::Binary { left, .. } => left.location(),
        }
    }

    /// Source-like rendering for messages
    pub fn describe(&self) -> String {
        match self {
            Node::Name { name, .. } => name.clone(),
            Node::Attribute { object, name } => format!("{}.{}", object.describe(), name),
            Node::Call { callee, .. } => format!("{}(...)", callee.describe()),
            Node::Subscript { object, .. } => format!("{}[...]", object.describe()),
            Node::Str { .. } => "<string>".to_string(),
            Node::Binary { op, left, right } => {
                format!("{} {} {}", left.describe(), op, right.describe())
            }
            Node::Group { .. } => "(...)".to_string(),
            Node::Literal { .. } => "<literal>".to_string(),
        }
    }
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Plain name
    Name(String),
    /// `{ key: local }` destructuring, as `(key, local)` pairs
    Destructure(Vec<(String, String)>),
    /// Attribute, subscript, tuple or anything else
    Other,
}

/// One logical statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `import m`, `import m as a`, `import a from 'm'`, `import * as a from 'm'`
    Import {
        /// Module path
        module: String,
        /// Local binding, when renamed
        alias: Option<String>,
        /// Position
        location: Location,
    },
    /// `from m import a as b`, `import { a as b } from 'm'`
    FromImport {
        /// Module path
        module: String,
        /// `(imported, local)` pairs
        names: Vec<(String, String)>,
        /// Position
        location: Location,
    },
    /// `targets = value`
    Assign {
        /// Assigned names
        targets: Vec<Target>,
        /// Expressions on the right, the first one being the value
        value: Vec<Node>,
    },
    /// Anything else, as the expressions it contains
    Expr(Vec<Node>),
}

const PY_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield", "match",
    "case",
];

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "finally", "for", "function", "if",
    "import", "in", "instanceof", "let", "new", "of", "return", "static", "switch", "throw", "try",
    "typeof", "var", "void", "while", "with", "yield",
];

/// Keywords that prefix an operand rather than end the expression
const PREFIX_KEYWORDS: &[&str] = &["not", "await", "new", "typeof", "void", "delete", "yield"];

/// Keywords followed by a declared name that is not a reference
const DECLARATION_KEYWORDS: &[&str] = &["def", "class", "function"];

const CONSTANTS: &[&str] = &["True", "False", "None", "true", "false", "null", "undefined"];

const DECLARATORS: &[&str] = &["const", "let", "var"];

fn precedence(op: &str) -> Option<u8> {
    let p = match op {
        "||" | "&&" | "??" => 1,
        "==" | "!=" | "===" | "!==" | "<" | ">" | "<=" | ">=" | "|" | "&" | "^" | "<<" | ">>"
        | ">>>" => 2,
        "+" | "-" => 3,
        "*" | "/" | "%" | "//" | "@" => 4,
        "**" => 5,
        _ => return None,
    };
    Some(p)
}

/// Split `tokens` into statements and parse each one
pub fn parse_program(tokens: &[SrcToken], language: Language) -> Vec<Stmt> {
    split_statements(tokens, language)
        .into_iter()
        .flat_map(|s| parse_statement(s, language))
        .collect()
}

fn split_statements(tokens: &[SrcToken], language: Language) -> Vec<&[SrcToken]> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut kept_braces = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        let current = &tokens[start..i];
        let boundary = match &token.kind {
            SrcKind::Open('(') | SrcKind::Open('[') => {
                depth += 1;
                false
            }
            SrcKind::Close(')') | SrcKind::Close(']') => {
                depth = depth.saturating_sub(1);
                false
            }
            SrcKind::Open('{') if language == Language::JavaScript && depth == 0 => {
                if opens_binding_list(current) {
                    kept_braces += 1;
                    false
                } else {
                    true
                }
            }
            SrcKind::Close('}') if language == Language::JavaScript && depth == 0 => {
                if kept_braces > 0 {
                    kept_braces -= 1;
                    false
                } else {
                    true
                }
            }
            SrcKind::Semicolon => depth == 0 && kept_braces == 0,
            SrcKind::Newline => {
                depth == 0 && kept_braces == 0 && !continues(current, tokens.get(i + 1))
            }
            _ => false,
        };
        if boundary {
            if !current.is_empty() {
                statements.push(current);
            }
            start = i + 1;
        }
    }
    if start < tokens.len() {
        statements.push(&tokens[start..]);
    }
    statements
}

/// `const {`, `let {`, `import {`, `import a, {`
fn opens_binding_list(current: &[SrcToken]) -> bool {
    let current = strip_export(current);
    let head = match current.first().and_then(SrcToken::ident) {
        Some(h) => h,
        None => return false,
    };
    if !DECLARATORS.contains(&head) && head != "import" {
        return false;
    }
    match current.last() {
        Some(last) if current.len() == 1 => last.ident().is_some(),
        Some(last) => {
            matches!(last.kind, SrcKind::Comma)
                && !current.iter().any(|t| t.is_op("=") || t.is_op("=>"))
        }
        None => false,
    }
}

/// A line ending in an operator, or followed by `.x`, continues
fn continues(current: &[SrcToken], next: Option<&SrcToken>) -> bool {
    let trailing = current
        .last()
        .map_or(false, |t| matches!(t.kind, SrcKind::Op(_) | SrcKind::Dot | SrcKind::Comma));
    let leading = next.map_or(false, |t| matches!(t.kind, SrcKind::Dot) || t.is_op("?."));
    trailing || leading
}

fn strip_export(tokens: &[SrcToken]) -> &[SrcToken] {
    let mut tokens = tokens;
    while let Some(word) = tokens.first().and_then(SrcToken::ident) {
        if word == "export" || word == "default" {
            tokens = &tokens[1..];
        } else {
            break;
        }
    }
    tokens
}

fn parse_statement(tokens: &[SrcToken], language: Language) -> Vec<Stmt> {
    let tokens = if language == Language::JavaScript {
        strip_export(tokens)
    } else {
        tokens
    };
    let first = match tokens.first() {
        Some(t) => t,
        None => return Vec::new(),
    };
    match (language, first.ident()) {
        (Language::Python, Some("import")) => return parse_py_import(tokens),
        (Language::Python, Some("from")) => {
            if let Some(stmt) = parse_py_from(tokens) {
                return vec![stmt];
            }
        }
        (Language::JavaScript, Some("import")) => {
            let stmts = parse_js_import(tokens);
            if !stmts.is_empty() {
                return stmts;
            }
        }
        _ => {}
    }

    let assigns = top_level_positions(tokens, |t| t.is_op("="));
    if assigns.is_empty() {
        let nodes = Parser::new(tokens, language).parse_sequence(None);
        return vec![Stmt::Expr(nodes)];
    }
    let mut targets = Vec::new();
    let mut from = 0;
    for pos in &assigns {
        targets.push(parse_target(&tokens[from..*pos], language));
        from = pos + 1;
    }
    let value = Parser::new(&tokens[from..], language).parse_sequence(None);
    vec![Stmt::Assign { targets, value }]
}

/// Indices of tokens matching `pred` outside any bracket
fn top_level_positions(tokens: &[SrcToken], pred: impl Fn(&SrcToken) -> bool) -> Vec<usize> {
    let mut depth = 0usize;
    let mut out = Vec::new();
    for (i, t) in tokens.iter().enumerate() {
        match t.kind {
            SrcKind::Open(_) => depth += 1,
            SrcKind::Close(_) => depth = depth.saturating_sub(1),
            _ if depth == 0 && pred(t) => out.push(i),
            _ => {}
        }
    }
    out
}

fn parse_target(tokens: &[SrcToken], language: Language) -> Target {
    let mut tokens = tokens;
    if let Some(word) = tokens.first().and_then(SrcToken::ident) {
        if DECLARATORS.contains(&word) {
            tokens = &tokens[1..];
        }
    }
    // `x: int = ...`
    if language == Language::Python {
        if let Some(colon) = top_level_positions(tokens, |t| t.is_op(":")).first() {
            tokens = &tokens[..*colon];
        }
    }
    match tokens {
        [single] => single
            .ident()
            .map_or(Target::Other, |n| Target::Name(n.to_string())),
        [open, inner @ .., close]
            if open.kind == SrcKind::Open('{') && close.kind == SrcKind::Close('}') =>
        {
            Target::Destructure(binding_list(inner, ":"))
        }
        _ => Target::Other,
    }
}

/// `a, b: c, d = 1` or `a, b as c` as `(name, local)` pairs
fn binding_list(tokens: &[SrcToken], rename: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for part in tokens.split(|t| matches!(t.kind, SrcKind::Comma)) {
        let words: Vec<&SrcToken> = part
            .iter()
            .filter(|t| !matches!(t.kind, SrcKind::Newline))
            .collect();
        let name = match words.first().and_then(|t| t.ident()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        let renamed = words.get(1).map_or(false, |t| match rename {
            "as" => t.ident() == Some("as"),
            op => t.is_op(op),
        });
        let local = if renamed {
            words.get(2).and_then(|t| t.ident()).map(str::to_string)
        } else {
            None
        };
        pairs.push((name.clone(), local.unwrap_or(name)));
    }
    pairs
}

/// Dotted module path starting at `tokens[i]`, and the index after it
fn dotted_name(tokens: &[SrcToken], mut i: usize) -> (String, usize) {
    let mut path = String::new();
    while let Some(t) = tokens.get(i) {
        match &t.kind {
            SrcKind::Dot => path.push('.'),
            SrcKind::Op(op) if op == "..." => path.push_str("..."),
            SrcKind::Ident(name) if name != "import" && name != "as" => {
                if !path.is_empty() && !path.ends_with('.') {
                    break;
                }
                path.push_str(name);
            }
            _ => break,
        }
        i += 1;
    }
    (path, i)
}

fn parse_py_import(tokens: &[SrcToken]) -> Vec<Stmt> {
    let location = tokens[0].location;
    let mut imports = Vec::new();
    for part in tokens[1..].split(|t| matches!(t.kind, SrcKind::Comma)) {
        let (module, next) = dotted_name(part, 0);
        if module.is_empty() {
            continue;
        }
        let alias = match (part.get(next).and_then(SrcToken::ident), part.get(next + 1)) {
            (Some("as"), Some(t)) => t.ident().map(str::to_string),
            _ => None,
        };
        imports.push(Stmt::Import {
            module,
            alias,
            location,
        });
    }
    imports
}

fn parse_py_from(tokens: &[SrcToken]) -> Option<Stmt> {
    let (module, next) = dotted_name(tokens, 1);
    if tokens.get(next).and_then(SrcToken::ident) != Some("import") {
        return None;
    }
    let rest: Vec<SrcToken> = tokens[next + 1..]
        .iter()
        .filter(|t| !matches!(t.kind, SrcKind::Open('(') | SrcKind::Close(')')))
        .cloned()
        .collect();
    Some(Stmt::FromImport {
        module,
        names: binding_list(&rest, "as"),
        location: tokens[0].location,
    })
}

fn parse_js_import(tokens: &[SrcToken]) -> Vec<Stmt> {
    let location = tokens[0].location;
    // `import 'side-effect'`
    if let Some(SrcKind::Str { value, .. }) = tokens.get(1).map(|t| &t.kind) {
        return vec![Stmt::Import {
            module: value.clone(),
            alias: None,
            location,
        }];
    }
    let from = match tokens.iter().position(|t| t.ident() == Some("from")) {
        Some(f) => f,
        None => return Vec::new(),
    };
    let module = match tokens.get(from + 1).map(|t| &t.kind) {
        Some(SrcKind::Str { value, .. }) => value.clone(),
        _ => return Vec::new(),
    };
    let clause = &tokens[1..from];

    // `import * as cp from 'm'`
    if clause.first().map_or(false, |t| t.is_op("*")) {
        let alias = clause.get(2).and_then(SrcToken::ident).map(str::to_string);
        return vec![Stmt::Import {
            module,
            alias,
            location,
        }];
    }

    let mut stmts = Vec::new();
    // `import cp from 'm'` binds the default export, treated as the module
    if let Some(alias) = clause.first().and_then(SrcToken::ident) {
        stmts.push(Stmt::Import {
            module: module.clone(),
            alias: Some(alias.to_string()),
            location,
        });
    }
    let open = clause.iter().position(|t| t.kind == SrcKind::Open('{'));
    let close = clause.iter().rposition(|t| t.kind == SrcKind::Close('}'));
    if let (Some(open), Some(close)) = (open, close) {
        if open < close {
            stmts.push(Stmt::FromImport {
                module,
                names: binding_list(&clause[open + 1..close], "as"),
                location,
            });
        }
    }
    stmts
}

/// Precedence-climbing parser over one statement
pub struct Parser<'a> {
    tokens: &'a [SrcToken],
    current: usize,
    language: Language,
}

impl<'a> Parser<'a> {
    /// Creates a parser over `tokens`
    pub fn new(tokens: &'a [SrcToken], language: Language) -> Self {
        Parser {
            tokens,
            current: 0,
            language,
        }
    }

    /// Parse expressions until `close` (consumed) or the end, skipping
    /// tokens that start no expression
    pub fn parse_sequence(&mut self, close: Option<char>) -> Vec<Node> {
        let mut items = Vec::new();
        while let Some(token) = self.peek() {
            match &token.kind {
                SrcKind::Close(_) => {
                    self.current += 1;
                    if close.is_some() {
                        break;
                    }
                }
                SrcKind::Comma | SrcKind::Newline | SrcKind::Semicolon => self.current += 1,
                SrcKind::Ident(word) if DECLARATION_KEYWORDS.contains(&word.as_str()) => {
                    self.current += 1;
                    // The declared name is not a reference
                    if self.peek().and_then(SrcToken::ident).is_some() {
                        self.current += 1;
                    }
                }
                // Keyword argument name: `shell=True`
                SrcKind::Ident(_)
                    if close.is_some()
                        && self.language == Language::Python
                        && self.peek_at(1).map_or(false, |t| t.is_op("=")) =>
                {
                    self.current += 2;
                }
                _ => {
                    let save = self.current;
                    match self.parse_expr() {
                        Some(node) => items.push(node),
                        None => self.current = save + 1,
                    }
                }
            }
        }
        items
    }

    fn parse_expr(&mut self) -> Option<Node> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let (op, prec) = match self.peek().map(|t| &t.kind) {
                Some(SrcKind::Op(op)) => match precedence(op) {
                    Some(p) if p >= min_prec => (op.clone(), p),
                    _ => break,
                },
                _ => break,
            };
            let save = self.current;
            self.current += 1;
            match self.parse_binary(prec + 1) {
                Some(right) => {
                    left = Node::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    }
                }
                None => {
                    self.current = save;
                    break;
                }
            }
        }
        Some(left)
    }

    fn parse_unary(&mut self) -> Option<Node> {
        match &self.peek()?.kind {
            SrcKind::Op(op) if matches!(op.as_str(), "-" | "+" | "!" | "~" | "*" | "**" | "...") => {
                self.current += 1;
                self.parse_unary()
            }
            SrcKind::Ident(word) if PREFIX_KEYWORDS.contains(&word.as_str()) => {
                self.current += 1;
                self.parse_unary()
            }
            _ => {
                let primary = self.parse_primary()?;
                Some(self.parse_postfix(primary))
            }
        }
    }

    fn parse_primary(&mut self) -> Option<Node> {
        let token = self.peek()?.clone();
        let location = token.location;
        let node = match token.kind {
            SrcKind::Ident(name) => {
                if CONSTANTS.contains(&name.as_str()) {
                    Node::Literal { location }
                } else if self.is_keyword(&name) {
                    return None;
                } else {
                    Node::Name { name, location }
                }
            }
            SrcKind::Str {
                value,
                interpolated,
            } => Node::Str {
                value,
                interpolated,
                location,
            },
            SrcKind::Number => Node::Literal { location },
            SrcKind::Open(open) => {
                self.current += 1;
                let start = self.current;
                let mut items = self.parse_sequence(Some(open));
                let inner = &self.tokens[start..self.current.max(start)];
                let tuple = !top_level_positions(inner, |t| matches!(t.kind, SrcKind::Comma)).is_empty();
                // Parentheses around a single expression only group
                if open == '(' && items.len() == 1 && !tuple {
                    return items.pop();
                }
                return Some(Node::Group { items, location });
            }
            _ => return None,
        };
        self.current += 1;
        Some(node)
    }

    fn parse_postfix(&mut self, mut node: Node) -> Node {
        loop {
            let token = match self.peek() {
                Some(t) => t,
                None => break,
            };
            match &token.kind {
                _ if matches!(token.kind, SrcKind::Dot) || token.is_op("?.") => {
                    match self.peek_at(1).and_then(SrcToken::ident) {
                        Some(name) => {
                            node = Node::Attribute {
                                object: Box::new(node),
                                name: name.to_string(),
                            };
                            self.current += 2;
                        }
                        None => break,
                    }
                }
                SrcKind::Open('(') => {
                    self.current += 1;
                    let args = self.parse_sequence(Some('('));
                    node = Node::Call {
                        callee: Box::new(node),
                        args,
                    };
                }
                SrcKind::Open('[') => {
                    self.current += 1;
                    let index = self.parse_sequence(Some('['));
                    node = Node::Subscript {
                        object: Box::new(node),
                        index,
                    };
                }
                _ => break,
            }
        }
        node
    }

    fn is_keyword(&self, word: &str) -> bool {
        match self.language {
            Language::Python => PY_KEYWORDS.contains(&word),
            Language::JavaScript => JS_KEYWORDS.contains(&word),
        }
    }

    fn peek(&self) -> Option<&'a SrcToken> {
        self.tokens.get(self.current)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a SrcToken> {
        self.tokens.get(self.current + ahead)
    }
}
