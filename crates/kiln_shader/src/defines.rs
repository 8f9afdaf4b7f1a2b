//! Shader Defines Table
//!
//! The compile registry takes defines as a single opaque string of
//! `KEY=VALUE;KEY2=VALUE2` tokens and passes it through verbatim; the string
//! is part of the compile identity. [`ShaderDefines`] is a convenience
//! builder for that string.
//!
//! Entries are kept sorted by key, so identical define sets always produce
//! identical tables (and therefore identical cache keys).
//!
//! ```rust,ignore
//! let mut defines = ShaderDefines::new();
//! defines.set("MAX_LIGHTS", "8");
//! defines.set("HAS_NORMAL_MAP", "1");
//! assert_eq!(defines.to_table(), "HAS_NORMAL_MAP=1;MAX_LIGHTS=8");
//! ```

use std::hash::{Hash, Hasher};

/// Separator between `KEY=VALUE` tokens.
pub const DEFINE_SEPARATOR: char = ';';

/// An ordered collection of shader macro definitions.
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    defines: Vec<(String, String)>,
}

impl ShaderDefines {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Parses a `KEY=VALUE;KEY2=VALUE2` table.
    ///
    /// Tokens without `=` get an empty value; empty tokens are skipped. Later
    /// duplicates override earlier ones.
    #[must_use]
    pub fn parse(table: &str) -> Self {
        let mut result = Self::new();
        for token in table.split(DEFINE_SEPARATOR) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, value)) => result.set(key.trim(), value.trim()),
                None => result.set(token, ""),
            }
        }
        result
    }

    /// Sets a define, replacing the value of an existing key.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.defines.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            Ok(idx) => value.clone_into(&mut self.defines[idx].1),
            Err(idx) => self.defines.insert(idx, (key.to_string(), value.to_string())),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        if let Ok(idx) = self.defines.binary_search_by(|(k, _)| k.as_str().cmp(key)) {
            self.defines.remove(idx);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.defines[idx].1.as_str())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges `other` into `self`; values from `other` win on conflict.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for (key, value) in other.iter() {
            self.set(key, value);
        }
    }

    /// Renders the table string passed to the compile registry.
    #[must_use]
    pub fn to_table(&self) -> String {
        let mut table = String::new();
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                table.push(DEFINE_SEPARATOR);
            }
            table.push_str(key);
            if !value.is_empty() {
                table.push('=');
                table.push_str(value);
            }
        }
        table
    }

    /// Content hash, for cache lookups.
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for ShaderDefines {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.defines.hash(state);
    }
}

impl PartialEq for ShaderDefines {
    fn eq(&self, other: &Self) -> bool {
        self.defines == other.defines
    }
}

impl Eq for ShaderDefines {}

impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::new();
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}

impl std::fmt::Display for ShaderDefines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_table())
    }
}
