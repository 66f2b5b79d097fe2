//! Single pre-order traversal producing risk findings in source order

use super::syntax::{Node, Stmt, Target};
use super::tables::{CapabilityTable, Sink};
use crate::verdict::{Finding, Location, Severity};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Method names that send their argument to a database
const QUERY_METHODS: &[&str] = &[
    "execute",
    "executemany",
    "executescript",
    "exec_driver_sql",
    "raw",
    "query",
    "$queryRawUnsafe",
    "$executeRawUnsafe",
];

/// Calls that load a module named by their first argument
const IMPORT_CALLS: &[&str] = &["require", "__import__", "importlib.import_module"];

/// How a callee was resolved
enum Callee {
    /// Fully qualified through imports and aliases
    Qualified(String),
    /// Computed at runtime
    Dynamic,
    /// Method on a value, or a literal
    Unresolved,
}

/// Walks statements in order, tracking aliases and tainted names
pub struct Walker<'a> {
    table: &'a CapabilityTable,
    report_imports: bool,
    aliases: HashMap<String, String>,
    tainted: HashSet<String>,
    findings: Vec<Finding>,
}

impl<'a> Walker<'a> {
    /// Creates a walker over `table`
    pub fn new(table: &'a CapabilityTable, report_imports: bool) -> Self {
        Walker {
            table,
            report_imports,
            aliases: HashMap::new(),
            tainted: HashSet::new(),
            findings: Vec::new(),
        }
    }

    /// Walk `program` and return its findings
    pub fn walk(mut self, program: &[Stmt]) -> Vec<Finding> {
        for stmt in program {
            self.statement(stmt);
        }
        self.findings
    }

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Import {
                module,
                alias,
                location,
            } => {
                let (local, bound) = match alias {
                    Some(a) => (a.clone(), module.clone()),
                    None => {
                        let root = module.split('.').next().unwrap_or(module).to_string();
                        (root.clone(), root)
                    }
                };
                self.bind(local, Some(bound), false);
                self.report_import(module, *location);
            }
            Stmt::FromImport {
                module,
                names,
                location,
            } => {
                for (name, local) in names {
                    self.bind(local.clone(), Some(format!("{}.{}", module, name)), false);
                }
                self.report_import(module, *location);
            }
            Stmt::Assign { targets, value } => {
                for node in value {
                    self.visit(node);
                }
                let first = value.first();
                let bound = first.and_then(|n| self.qualified_name(n));
                let tainted = first.map_or(false, |n| self.is_dynamic_string(n));
                for target in targets {
                    match target {
                        Target::Name(name) => self.bind(name.clone(), bound.clone(), tainted),
                        Target::Destructure(pairs) => {
                            for (key, local) in pairs {
                                let member = bound.as_ref().map(|b| format!("{}.{}", b, key));
                                self.bind(local.clone(), member, false);
                            }
                        }
                        Target::Other => {}
                    }
                }
            }
            Stmt::Expr(nodes) => {
                for node in nodes {
                    self.visit(node);
                }
            }
        }
    }

    fn bind(&mut self, local: String, qualified: Option<String>, tainted: bool) {
        if tainted {
            self.tainted.insert(local.clone());
        } else {
            self.tainted.remove(&local);
        }
        match qualified {
            Some(q) if q != local => {
                self.aliases.insert(local, q);
            }
            _ => {
                self.aliases.remove(&local);
            }
        }
    }

    fn visit(&mut self, node: &Node) {
        match node {
            Node::Call { callee, args } => {
                self.check_call(callee, args);
                self.visit(callee);
                for arg in args {
                    self.visit(arg);
                }
            }
            Node::Attribute { object, .. } => self.visit(object),
            Node::Subscript { object, index } => {
                self.visit(object);
                for i in index {
                    self.visit(i);
                }
            }
            Node::Binary { left, right, .. } => {
                self.visit(left);
                self.visit(right);
            }
            Node::Group { items, .. } => {
                for item in items {
                    self.visit(item);
                }
            }
            Node::Name { .. } | Node::Str { .. } | Node::Literal { .. } => {}
        }
    }

    fn check_call(&mut self, callee: &Node, args: &[Node]) {
        let location = callee.location();
        if let Some(loader) = self.import_loader(callee) {
            match args.first() {
                Some(Node::Str {
                    value,
                    interpolated: false,
                    ..
                }) => self.report_import(value, location),
                _ => self.findings.push(Finding::at(
                    Severity::Medium,
                    "dynamic-import",
                    location,
                    format!("{} with a computed module name", loader),
                )),
            }
            return;
        }

        let name = match self.resolve(callee) {
            Callee::Qualified(name) => name,
            Callee::Dynamic => {
                debug!(callee = %callee.describe(), "unresolved dynamic call");
                self.findings.push(Finding::at(
                    Severity::Medium,
                    "dynamic-call-unresolved",
                    location,
                    format!("callee {} is computed at runtime", callee.describe()),
                ));
                return;
            }
            Callee::Unresolved => match callee {
                Node::Attribute { name, .. } => name.clone(),
                _ => return,
            },
        };

        let capability = self.table.lookup(&name).cloned();
        if let Some(cap) = &capability {
            self.findings.push(Finding::at(
                cap.severity,
                cap.kind,
                location,
                format!("call to {}", name),
            ));
        }

        let method = name.rsplit('.').next().unwrap_or(&name);
        let sink = match capability.map(|c| c.sink) {
            Some(sink) if sink != Sink::None => sink,
            _ if matches!(callee, Node::Attribute { .. }) && QUERY_METHODS.contains(&method) => {
                Sink::Query
            }
            _ => return,
        };
        if let (Some(severity), Some(arg)) = (
            sink.injection_severity(),
            args.iter().find(|a| self.is_dynamic_string(a)),
        ) {
            self.findings.push(Finding::at(
                severity,
                "injection-risk",
                arg.location(),
                format!(
                    "interpolated string reaches {} sink {}",
                    sink.as_str(),
                    name
                ),
            ));
        }
    }

    fn report_import(&mut self, module: &str, location: Location) {
        if self.report_imports && self.table.is_dangerous_module(module) {
            self.findings.push(Finding::at(
                Severity::Low,
                "dangerous-import",
                location,
                format!("imports {}", module),
            ));
        }
    }

    /// Name of the loader if `callee` is `require`, `__import__` or `importlib.import_module`
    fn import_loader(&self, callee: &Node) -> Option<String> {
        let name = match callee {
            Node::Name { .. } | Node::Attribute { .. } => self.qualified_name(callee)?,
            _ => return None,
        };
        if IMPORT_CALLS.contains(&name.as_str()) {
            Some(name)
        } else {
            None
        }
    }

    fn resolve(&self, callee: &Node) -> Callee {
        match callee {
            Node::Name { .. } | Node::Attribute { .. } => match self.qualified_name(callee) {
                Some(name) => Callee::Qualified(name),
                None => Callee::Unresolved,
            },
            Node::Call { callee: inner, args } if self.module_of_call(inner, args).is_some() => {
                Callee::Unresolved
            }
            Node::Call { .. } | Node::Subscript { .. } | Node::Group { .. } | Node::Binary { .. } => {
                Callee::Dynamic
            }
            Node::Str { .. } | Node::Literal { .. } => Callee::Unresolved,
        }
    }

    /// Dotted name of `node` after substituting aliases
    fn qualified_name(&self, node: &Node) -> Option<String> {
        match node {
            Node::Name { name, .. } => Some(self.aliases.get(name).cloned().unwrap_or_else(|| name.clone())),
            Node::Attribute { object, name } => {
                self.qualified_name(object).map(|q| format!("{}.{}", q, name))
            }
            Node::Call { callee, args } => self.module_of_call(callee, args),
            _ => None,
        }
    }

    /// Module loaded by `require('m')` and friends
    fn module_of_call(&self, callee: &Node, args: &[Node]) -> Option<String> {
        self.import_loader(callee)?;
        match args.first() {
            Some(Node::Str {
                value,
                interpolated: false,
                ..
            }) => Some(value.clone()),
            _ => None,
        }
    }

    /// String built at runtime from non-literal parts
    fn is_dynamic_string(&self, node: &Node) -> bool {
        match node {
            Node::Str { interpolated, .. } => *interpolated,
            Node::Name { name, .. } => self.tainted.contains(name),
            Node::Binary { op, left, right } if op == "+" => {
                (self.is_stringy(left) || self.is_stringy(right))
                    && !(is_constant(left) && is_constant(right))
            }
            Node::Binary { op, left, right } if op == "%" => {
                self.is_stringy(left) && !is_constant(right)
            }
            Node::Call { callee, args } => match callee.as_ref() {
                Node::Attribute { object, name } if name == "format" => {
                    self.is_stringy(object) && args.iter().any(|a| !is_constant(a))
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn is_stringy(&self, node: &Node) -> bool {
        matches!(node, Node::Str { .. }) || self.is_dynamic_string(node)
    }
}

/// Literal with no runtime part
fn is_constant(node: &Node) -> bool {
    match node {
        Node::Str { interpolated, .. } => !interpolated,
        Node::Literal { .. } => true,
        Node::Binary { left, right, .. } => is_constant(left) && is_constant(right),
        Node::Group { items, .. } => items.iter().all(is_constant),
        _ => false,
    }
}
