//! Capability surface for generated rendering code.
//!
//! Generated code may only reach plotting, numeric and tabular libraries
//! plus the caller's `data_info`. The policy rejects code that imports
//! anything else or names a filesystem, process, network or dynamic
//! evaluation primitive. Executors must still isolate execution; this check
//! runs before any code leaves the orchestrator.

use crate::errors::SandboxViolation;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// A capability exposed to generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Plotting primitives (`plt`).
    Plotting,
    /// Numeric arrays (`np`).
    Numeric,
    /// Tabular data frames (`pd`).
    Tabular,
    /// In-memory byte buffers for the rendered image (`io`).
    ImageBuffer,
}

/// Everything generated code is allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Granted capabilities.
    pub capabilities: Vec<Capability>,
    /// The styled specification the code was generated from.
    pub specification: String,
    /// Caller-supplied dataset summary.
    pub data_info: Value,
}

impl ExecutionContext {
    /// Creates a context with the standard plotting surface.
    #[must_use]
    pub fn plotting(specification: impl Into<String>, data_info: Value) -> Self {
        Self {
            capabilities: vec![
                Capability::Plotting,
                Capability::Numeric,
                Capability::Tabular,
                Capability::ImageBuffer,
            ],
            specification: specification.into(),
            data_info,
        }
    }

    /// Returns true if `capability` is granted.
    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

const DENIED: &[(&str, &str)] = &[
    ("open(", "filesystem"),
    ("os.", "filesystem"),
    ("pathlib", "filesystem"),
    ("shutil", "filesystem"),
    ("subprocess", "process"),
    ("popen", "process"),
    ("multiprocessing", "process"),
    ("threading", "process"),
    ("socket", "network"),
    ("urllib", "network"),
    ("requests", "network"),
    ("http", "network"),
    ("eval(", "dynamic evaluation"),
    ("exec(", "dynamic evaluation"),
    ("compile(", "dynamic evaluation"),
    ("__import__", "dynamic evaluation"),
    ("importlib", "dynamic evaluation"),
    ("__builtins__", "dynamic evaluation"),
    ("globals(", "dynamic evaluation"),
    ("getattr(", "dynamic evaluation"),
];

/// File readers and writers reachable through the allowed libraries.
const IO_CALLS: &str = r"\b(read_[A-Za-z0-9_]+|to_(?:csv|excel|json|parquet|pickle|hdf|sql|feather|html|latex|stata|xml|markdown|clipboard|orc)|tofile|fromfile|load|loadtxt|genfromtxt|fromregex|memmap|save|savez|savez_compressed|savetxt|imread|imsave)\s*\(";

/// `savefig(` and its first argument.
const SAVEFIG: &str = r"\bsavefig\s*\(\s*([^,)]*)";

/// Names bound to an in-memory buffer.
const BUFFER_BINDING: &str = r"\b([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:io\s*\.\s*)?BytesIO\s*\(";

struct Patterns {
    io_calls: Regex,
    savefig: Regex,
    buffer_binding: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                io_calls: Regex::new(IO_CALLS).ok()?,
                savefig: Regex::new(SAVEFIG).ok()?,
                buffer_binding: Regex::new(BUFFER_BINDING).ok()?,
            })
        })
        .as_ref()
}

/// Screens generated code before execution.
///
/// Only code positions are inspected: string literal contents and comments
/// are blanked first, so a label mentioning `requests` passes while a call
/// to `requests.get` does not. `savefig` must target a `BytesIO` buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPolicy {
    allowed_modules: Vec<String>,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self::new(["matplotlib", "numpy", "pandas", "io", "math"])
    }
}

impl SandboxPolicy {
    /// Creates a policy allowing imports of the given top-level modules.
    #[must_use]
    pub fn new<I, S>(allowed_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_modules: allowed_modules.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks `code`, returning the first violation found.
    pub fn check(&self, code: &str) -> Result<(), SandboxViolation> {
        let code = code_positions(code);

        for line in code.lines() {
            for module in imported_modules(line) {
                if !self.allowed_modules.iter().any(|m| m == module) {
                    return Err(SandboxViolation::new(module, "import"));
                }
            }
        }

        for (token, category) in DENIED {
            if contains_identifier(&code, token) {
                return Err(SandboxViolation::new(*token, *category));
            }
        }

        let patterns = patterns().ok_or_else(|| SandboxViolation::new("policy", "unavailable"))?;
        if let Some(call) = patterns.io_calls.captures(&code).and_then(|c| c.get(1)) {
            return Err(SandboxViolation::new(call.as_str(), "filesystem"));
        }

        let buffers: Vec<&str> = patterns
            .buffer_binding
            .captures_iter(&code)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        for target in patterns.savefig.captures_iter(&code).filter_map(|c| c.get(1)) {
            if !is_buffer_target(target.as_str(), &buffers) {
                return Err(SandboxViolation::new("savefig", "filesystem"));
            }
        }

        Ok(())
    }
}

/// True if a `savefig` target is a `BytesIO` buffer.
fn is_buffer_target(argument: &str, buffers: &[&str]) -> bool {
    let argument = argument.trim();
    let argument = argument
        .strip_prefix("fname")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('='))
        .map_or(argument, str::trim);
    let direct = argument
        .strip_prefix("io")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('.'))
        .map_or(argument, str::trim_start);
    direct.starts_with("BytesIO(") || buffers.contains(&argument)
}

/// Replaces string literal contents and comments with spaces.
///
/// Quotes and newlines are kept so line structure survives. Replacement
/// fields of f-strings stay visible.
fn code_positions(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(' ');
                    i += 1;
                }
            }
            '\'' | '"' => {
                let triple = chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c);
                let width = if triple { 3 } else { 1 };
                let formatted = is_formatted_prefix(&chars[..i]);
                out.extend(std::iter::repeat(c).take(width));
                i += width;

                let mut depth = 0usize;
                while i < chars.len() {
                    let d = chars[i];
                    if d == '\\' {
                        out.push(' ');
                        if let Some(&next) = chars.get(i + 1) {
                            out.push(if next == '\n' { '\n' } else { ' ' });
                        }
                        i += 2;
                        continue;
                    }
                    let closes = d == c
                        && (!triple || (chars.get(i + 1) == Some(&c) && chars.get(i + 2) == Some(&c)));
                    if depth == 0 && closes {
                        out.extend(std::iter::repeat(c).take(width));
                        i += width;
                        break;
                    }
                    if d == '\n' && !triple {
                        break;
                    }

                    if formatted && d == '{' {
                        if depth == 0 && chars.get(i + 1) == Some(&'{') {
                            out.push_str("  ");
                            i += 2;
                            continue;
                        }
                        depth += 1;
                        out.push(d);
                    } else if formatted && d == '}' && depth > 0 {
                        depth -= 1;
                        out.push(d);
                    } else if depth > 0 || d == '\n' {
                        out.push(d);
                    } else {
                        out.push(' ');
                    }
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// True if the literal opening after `before` carries an `f` prefix.
fn is_formatted_prefix(before: &[char]) -> bool {
    let prefix: Vec<char> = before
        .iter()
        .rev()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .copied()
        .collect();
    prefix.len() <= 2 && prefix.iter().any(|c| matches!(c, 'f' | 'F'))
}

/// Top-level module names imported on one line of Python.
fn imported_modules(line: &str) -> Vec<&str> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("import ") {
        rest.split(',').filter_map(module_root).collect()
    } else if let Some(rest) = line.strip_prefix("from ") {
        module_root(rest).into_iter().collect()
    } else {
        Vec::new()
    }
}

fn module_root(name: &str) -> Option<&str> {
    let name = name.split_whitespace().next()?;
    name.split('.').next().filter(|n| !n.is_empty())
}

/// True if `token` occurs in `code` not preceded by an identifier character.
fn contains_identifier(code: &str, token: &str) -> bool {
    code.match_indices(token).any(|(at, _)| {
        code[..at]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })
}
