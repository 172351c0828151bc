//! User command definitions.
//!
//! Papers often wrap figures in helpers such as
//! `\newcommand{\fig}[1]{\includegraphics{figs/#1}}`. The parser records such
//! definitions and expands invocations on a scratch copy of each line, so the
//! include and asset scanners see the paths. Written files are never expanded.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

use crate::error::{PackError, Result};

/// Nested expansion limit; anything deeper is treated as a runaway macro.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// `\newcommand{\name}[n][default]{` up to and including the body's opening brace.
static NEWCOMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(re)?newcommand\*?\s*(?:\{\s*(\\[A-Za-z@]+)\s*\}|(\\[A-Za-z@]+))\s*(?:\[\s*(\d)\s*\])?\s*(?:\[[^\]]*\])?\s*\{",
    )
    .expect("valid newcommand regex")
});

/// Start of a command definition within a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionHead {
    pub name: String,
    pub num_args: usize,
    pub renew: bool,
    /// Byte offset where `\newcommand` starts
    pub start: usize,
    /// Byte offset of the body's opening brace
    pub body_start: usize,
}

/// Find the first `\newcommand` / `\renewcommand` in `line`.
pub fn find_definition(line: &str) -> Option<DefinitionHead> {
    let caps = NEWCOMMAND.captures(line)?;
    let whole = caps.get(0)?;
    let name = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
    let num_args = caps.get(4).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
    Some(DefinitionHead {
        name,
        num_args,
        renew: caps.get(1).is_some(),
        start: whole.start(),
        body_start: whole.end() - 1,
    })
}

/// Outcome of scanning for the brace that closes a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BraceScan {
    /// Closed at this byte offset.
    Closed(usize),
    /// Still open; carries the current nesting depth.
    Open(usize),
}

/// Track `{`/`}` nesting in `text`, starting from `depth`, ignoring `\{` and `\}`.
pub fn scan_braces(text: &str, mut depth: usize) -> BraceScan {
    let mut escaped = false;
    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return BraceScan::Closed(idx);
                }
            }
            _ => {}
        }
    }
    BraceScan::Open(depth)
}

#[derive(Debug, Clone)]
struct MacroDefinition {
    num_args: usize,
    body: String,
    regex: Regex,
}

/// Recorded user commands, keyed by name including the backslash.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    definitions: BTreeMap<String, MacroDefinition>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Record (or replace) a definition.
    pub fn define(&mut self, name: &str, num_args: usize, body: &str) {
        let escaped = regex::escape(name);
        let pattern = if num_args == 0 {
            // The character after the name must not continue it.
            format!(r"{escaped}([^A-Za-z@]|$)")
        } else {
            format!(r"{escaped}{}", r"\s*\{([^{}]*)\}".repeat(num_args))
        };
        let Ok(regex) = Regex::new(&pattern) else {
            tracing::debug!("Skipping command {name}: cannot build a matcher");
            return;
        };
        tracing::debug!("Recorded command {name} with {num_args} argument(s)");
        self.definitions
            .insert(name.to_string(), MacroDefinition { num_args, body: body.to_string(), regex });
    }

    /// Expand every recorded command in `line` until nothing changes.
    pub fn expand(&self, line: &str) -> Result<String> {
        if self.is_empty() || !line.contains('\\') {
            return Ok(line.to_string());
        }
        let mut current = line.to_string();
        for _ in 0..MAX_EXPANSION_DEPTH {
            let mut changed = false;
            for def in self.definitions.values() {
                if !def.regex.is_match(&current) {
                    continue;
                }
                let replaced = def
                    .regex
                    .replace_all(&current, |caps: &Captures| substitute(def, caps))
                    .into_owned();
                if replaced != current {
                    current = replaced;
                    changed = true;
                }
            }
            if !changed {
                return Ok(current);
            }
        }
        let name = self
            .definitions
            .iter()
            .find(|(_, def)| def.regex.is_match(&current))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        Err(PackError::MacroDepth { name, limit: MAX_EXPANSION_DEPTH })
    }
}

/// Body of `def` with `#1..#n` replaced by the invocation's arguments.
fn substitute(def: &MacroDefinition, caps: &Captures) -> String {
    if def.num_args == 0 {
        let tail = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        return format!("{}{tail}", def.body);
    }
    let mut out = String::with_capacity(def.body.len());
    let mut chars = def.body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('#') => {
                chars.next();
                out.push('#');
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let idx = d.to_digit(10).unwrap_or(0) as usize;
                match caps.get(idx).filter(|_| idx >= 1 && idx <= def.num_args) {
                    Some(arg) => out.push_str(arg.as_str()),
                    None => {
                        out.push('#');
                        out.push(d);
                    }
                }
            }
            _ => out.push('#'),
        }
    }
    out
}
