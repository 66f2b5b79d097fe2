//! Dangerous-capability tables
//!
//! One read-only table per language, built once. Extending a table yields a
//! new table; the shared ones never change.

use super::Language;
use crate::verdict::Severity;
use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// What an interpolated argument reaching the call would mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sink {
    /// Not an injection sink
    None,
    /// Operating-system command
    Command,
    /// Code evaluation
    Eval,
    /// Database query
    Query,
}

impl Sink {
    /// Severity of an `injection-risk` finding for this sink
    pub fn injection_severity(self) -> Option<Severity> {
        match self {
            Sink::Command | Sink::Eval => Some(Severity::Critical),
            Sink::Query => Some(Severity::High),
            Sink::None => None,
        }
    }

    /// Short description for messages
    pub fn as_str(self) -> &'static str {
        match self {
            Sink::None => "none",
            Sink::Command => "command",
            Sink::Eval => "evaluation",
            Sink::Query => "query",
        }
    }
}

/// A dangerous capability reached through a qualified call name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Severity of calling it at all
    pub severity: Severity,
    /// Finding kind tag
    pub kind: &'static str,
    /// Injection sink category
    pub sink: Sink,
}

impl Capability {
    /// Creates a capability entry
    pub const fn new(severity: Severity, kind: &'static str, sink: Sink) -> Self {
        Capability {
            severity,
            kind,
            sink,
        }
    }
}

/// Qualified call name to capability, plus modules worth reporting on import
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityTable {
    language: Language,
    entries: HashMap<String, Capability>,
    modules: BTreeSet<String>,
}

const COMMAND: Capability = Capability::new(Severity::High, "command-execution", Sink::Command);
const EVAL: Capability = Capability::new(Severity::Critical, "dynamic-evaluation", Sink::Eval);
const COMPILE: Capability = Capability::new(Severity::Medium, "dynamic-compilation", Sink::Eval);
const DESERIALIZE: Capability =
    Capability::new(Severity::High, "unsafe-deserialization", Sink::None);
const DESERIALIZE_ADVISORY: Capability =
    Capability::new(Severity::Medium, "unsafe-deserialization", Sink::None);
const RAW_SQL: Capability = Capability::new(Severity::Low, "raw-sql", Sink::Query);

lazy_static! {
    static ref PYTHON: Arc<CapabilityTable> = Arc::new(CapabilityTable::build(
        Language::Python,
        &[
            (COMMAND, &[
                "os.system", "os.popen", "os.popen2", "os.popen3", "os.spawnl", "os.spawnle",
                "os.spawnlp", "os.spawnv", "os.spawnve", "os.spawnvp", "os.execl", "os.execle",
                "os.execlp", "os.execv", "os.execve", "os.execvp", "os.startfile",
                "subprocess.call", "subprocess.run", "subprocess.Popen", "subprocess.check_call",
                "subprocess.check_output", "subprocess.getoutput", "subprocess.getstatusoutput",
                "commands.getoutput", "commands.getstatusoutput", "pty.spawn",
                "asyncio.create_subprocess_shell",
            ]),
            (EVAL, &["eval", "exec", "execfile", "builtins.eval", "builtins.exec"]),
            (COMPILE, &["compile", "builtins.compile"]),
            (DESERIALIZE, &[
                "pickle.load", "pickle.loads", "cPickle.load", "cPickle.loads", "_pickle.loads",
                "marshal.load", "marshal.loads", "dill.load", "dill.loads", "yaml.load",
                "yaml.unsafe_load", "jsonpickle.decode",
            ]),
            (DESERIALIZE_ADVISORY, &["shelve.open", "yaml.full_load", "pandas.read_pickle"]),
            (RAW_SQL, &["pandas.read_sql", "pandas.read_sql_query", "sqlalchemy.text"]),
            (Capability::new(Severity::Low, "insecure-temp-file", Sink::None), &["tempfile.mktemp"]),
            (Capability::new(Severity::Low, "weak-hash", Sink::None), &["hashlib.md5", "hashlib.sha1"]),
            (
                Capability::new(Severity::Medium, "tls-verification-disabled", Sink::None),
                &["ssl._create_unverified_context"],
            ),
        ],
        &[
            "os", "subprocess", "commands", "pty", "pickle", "cPickle", "_pickle", "marshal",
            "dill", "shelve", "ctypes",
        ],
    ));

    static ref JAVASCRIPT: Arc<CapabilityTable> = Arc::new(CapabilityTable::build(
        Language::JavaScript,
        &[
            (COMMAND, &[
                "child_process.exec", "child_process.execSync", "child_process.spawn",
                "child_process.spawnSync", "child_process.execFile", "child_process.execFileSync",
                "child_process.fork", "shelljs.exec",
            ]),
            (EVAL, &[
                "eval", "Function", "window.eval", "global.eval", "globalThis.eval",
                "vm.runInThisContext", "vm.runInNewContext", "vm.runInContext",
                "vm.compileFunction", "vm.Script",
            ]),
            (DESERIALIZE, &["node-serialize.unserialize", "serialize-to-js.deserialize"]),
            (Capability::new(Severity::Medium, "dom-injection", Sink::None), &["document.write", "document.writeln"]),
        ],
        &["child_process", "vm", "node-serialize", "serialize-to-js", "shelljs"],
    ));
}

impl CapabilityTable {
    fn build(
        language: Language,
        groups: &[(Capability, &[&str])],
        modules: &[&str],
    ) -> Self {
        let mut entries = HashMap::new();
        for (capability, names) in groups {
            for name in names.iter() {
                entries.insert((*name).to_string(), capability.clone());
            }
        }
        CapabilityTable {
            language,
            entries,
            modules: modules.iter().map(|m| (*m).to_string()).collect(),
        }
    }

    /// The shared table for `language`
    pub fn for_language(language: Language) -> Arc<CapabilityTable> {
        match language {
            Language::Python => Arc::clone(&PYTHON),
            Language::JavaScript => Arc::clone(&JAVASCRIPT),
        }
    }

    /// A copy of this table with one more entry
    pub fn with_entry(&self, name: impl Into<String>, capability: Capability) -> Self {
        let mut table = self.clone();
        table.entries.insert(name.into(), capability);
        table
    }

    /// A copy of this table that also reports imports of `module`
    pub fn with_module(&self, module: impl Into<String>) -> Self {
        let mut table = self.clone();
        table.modules.insert(module.into());
        table
    }

    /// Language the table describes
    pub fn language(&self) -> Language {
        self.language
    }

    /// Capability reached by calling `qualified`
    pub fn lookup(&self, qualified: &str) -> Option<&Capability> {
        self.entries.get(qualified)
    }

    /// Returns true if importing `module` (or its top-level package) is reported
    pub fn is_dangerous_module(&self, module: &str) -> bool {
        let root = module.split('.').next().unwrap_or(module);
        self.modules.contains(module) || self.modules.contains(root)
    }

    /// Number of call entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no call entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_tables() {
        let py = CapabilityTable::for_language(Language::Python);
        assert_eq!(py.lookup("os.system").map(|c| c.sink), Some(Sink::Command));
        assert_eq!(py.lookup("eval").map(|c| c.severity), Some(Severity::Critical));
        assert!(py.lookup("os.path.join").is_none());
        assert!(py.is_dangerous_module("os.path"));
        assert!(!py.is_dangerous_module("json"));

        let js = CapabilityTable::for_language(Language::JavaScript);
        assert_eq!(js.language(), Language::JavaScript);
        assert!(js.lookup("child_process.execSync").is_some());
        assert!(js.lookup("exec").is_none());
    }

    #[test]
    fn test_with_entry_leaves_shared_table_alone() {
        let base = CapabilityTable::for_language(Language::Python);
        let extended = base.with_entry(
            "requests.get",
            Capability::new(Severity::Medium, "network-call", Sink::None),
        );
        assert_eq!(extended.len(), base.len() + 1);
        assert!(CapabilityTable::for_language(Language::Python)
            .lookup("requests.get")
            .is_none());
    }

    #[test]
    fn test_injection_severity() {
        assert_eq!(Sink::Command.injection_severity(), Some(Severity::Critical));
        assert_eq!(Sink::Query.injection_severity(), Some(Severity::High));
        assert_eq!(Sink::None.injection_severity(), None);
    }
}
