//! Identifier sanitization.

use std::collections::{HashMap, HashSet};

use super::MAX_NAME_RETRIES;
use crate::error::{CompileError, Result};

/// Words a generated C program cannot use as identifiers.
pub const C_RESERVED: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "main", "_Bool", "_Complex",
];

/// Turn `identifier` into a valid C identifier.
///
/// ```
/// # use ddac::frontend::clean::clean;
/// assert_eq!(clean("a^{-1}").unwrap(), "a__1");
/// assert_eq!(clean("a^b_c^{ef}").unwrap(), "a_b_c_ef");
/// assert_eq!(clean("77%alc").unwrap(), "_77alc");
/// ```
pub fn clean(identifier: &str) -> Result<String> {
    let mut cleaned = identifier
        .chars()
        .filter(char::is_ascii)
        .collect::<String>()
        .replace(['{', '}', '\\'], "")
        .replace(['^', '-'], "_");
    cleaned.retain(|c| c.is_ascii_alphanumeric() || c == '_');

    if cleaned.is_empty() {
        return Err(CompileError::EmptyIdentifier {
            original: identifier.to_string(),
        });
    }
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        cleaned.insert(0, '_');
    }
    Ok(cleaned)
}

/// Assigns distinct clean identifiers to distinct names.
#[derive(Debug, Clone, Default)]
pub struct Renamer {
    reserved: HashSet<String>,
    used: HashSet<String>,
    table: HashMap<String, String>,
}

impl Renamer {
    /// A renamer that never hands out any of `reserved`.
    pub fn new(reserved: &[&str]) -> Self {
        Self {
            reserved: reserved.iter().map(|word| word.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Clean identifier for `name`, the same one on every call.
    pub fn rename(&mut self, name: &str) -> Result<String> {
        if let Some(renamed) = self.table.get(name) {
            return Ok(renamed.clone());
        }

        let base = clean(name)?;
        let mut candidate = base.clone();
        let mut retries = 0;
        while self.reserved.contains(&candidate) || self.used.contains(&candidate) {
            if retries == MAX_NAME_RETRIES {
                return Err(CompileError::NameExhaustion(base));
            }
            candidate.push('_');
            retries += 1;
        }

        self.used.insert(candidate.clone());
        self.table.insert(name.to_string(), candidate.clone());
        Ok(candidate)
    }

    /// Identifier previously handed out for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(String::as_str)
    }
}
