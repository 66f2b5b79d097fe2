//! Integration tests for the static code-risk engine

use qwed_verify::code::CodeEngine;
use qwed_verify::config::CodeConfig;
use qwed_verify::Severity;

fn scan(source: &str, language: &str) -> qwed_verify::Verdict {
    CodeEngine::new(CodeConfig::default()).scan(source, Some(language))
}

fn kinds(verdict: &qwed_verify::Verdict) -> Vec<&str> {
    verdict.findings().iter().map(|f| f.kind()).collect()
}

#[test]
fn test_python_command_injection() {
    let verdict = scan(
        "import subprocess\nhost = input()\nsubprocess.call(f\"ping -c 1 {host}\", shell=True)\n",
        "python",
    );
    assert!(verdict.is_refuted());
    assert_eq!(verdict.max_severity(), Some(Severity::Critical));
    assert!(kinds(&verdict).contains(&"injection-risk"));
}

#[test]
fn test_python_alias_resolution() {
    let verdict = scan("from os import system as run\nrun('ls')\n", "py");
    assert!(verdict.is_refuted());
    assert!(kinds(&verdict).contains(&"command-execution"));
}

#[test]
fn test_eval_of_input() {
    let verdict = scan("eval(input())", "python");
    assert!(verdict.is_refuted());
    assert!(!verdict.findings().is_empty());
}

#[test]
fn test_safe_python() {
    let verdict = scan("def add(a, b):\n    return a + b\n", "python");
    assert!(verdict.is_verified());
    assert!(verdict.findings().is_empty());
}

#[test]
fn test_javascript_destructured_require() {
    let verdict = scan(
        "const { exec } = require('child_process');\nexec(`rm -rf ${dir}`);\n",
        "javascript",
    );
    assert!(verdict.is_refuted());
    assert_eq!(verdict.max_severity(), Some(Severity::Critical));
}

#[test]
fn test_javascript_safe_module() {
    let verdict = scan("const path = require('path');\nconsole.log(path.join('a', 'b'));\n", "js");
    assert!(verdict.is_verified());
}

#[test]
fn test_unsupported_language() {
    let verdict = scan("fn main() {}", "rust");
    assert!(verdict.is_undetermined());
    assert_eq!(kinds(&verdict), vec!["unsupported-language"]);
}

#[test]
fn test_default_language_is_python() {
    let verdict = CodeEngine::new(CodeConfig::default()).scan("import pickle\npickle.loads(data)\n", None);
    assert!(verdict.is_refuted());
}
