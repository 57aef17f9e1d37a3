//! Configuration for the filesystem engine

use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Patterns compressed by default on save
pub const DEFAULT_COMPRESS_PATTERNS: [&str; 3] = ["*.ks", "*.menu", "*.tjs"];

/// Configuration for an [`ArcFileSystem`](crate::ArcFileSystem)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcConfig {
    /// Display name; `None` takes the name of the first loaded archive
    pub name: Option<String>,

    /// File name globs (`*`, `?`) whose files are compressed on save
    pub compress_patterns: Vec<String>,

    /// Compress the footer name table
    pub compress_name_table: bool,
}

impl Default for ArcConfig {
    fn default() -> Self {
        Self {
            name: None,
            compress_patterns: DEFAULT_COMPRESS_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            compress_name_table: true,
        }
    }
}

impl ArcConfig {
    /// Create a configuration with a fixed display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Replace the compress patterns
    #[must_use]
    pub fn with_compress_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compress_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable name table compression
    #[must_use]
    pub const fn with_compressed_name_table(mut self, enable: bool) -> Self {
        self.compress_name_table = enable;
        self
    }
}

/// Compiled set of file name globs
///
/// Globs match the whole, case-sensitive file name. `*` matches any run of
/// characters and `?` matches exactly one.
#[derive(Debug, Clone, Default)]
pub struct CompressList {
    patterns: Vec<String>,
    compiled: Vec<Regex>,
}

impl CompressList {
    /// Compile a list of globs
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for pattern in patterns {
            list.push(pattern)?;
        }
        Ok(list)
    }

    /// Add a glob
    pub fn push(&mut self, pattern: impl Into<String>) -> Result<()> {
        let pattern = pattern.into();
        self.compiled.push(Regex::new(&glob_to_regex(&pattern))?);
        self.patterns.push(pattern);
        Ok(())
    }

    /// Remove a glob, returning whether it was present
    pub fn remove(&mut self, pattern: &str) -> bool {
        match self.patterns.iter().position(|p| p == pattern) {
            Some(index) => {
                self.patterns.remove(index);
                self.compiled.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every glob
    pub fn clear(&mut self) {
        self.patterns.clear();
        self.compiled.clear();
    }

    /// Globs in insertion order
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether any glob matches `name`
    pub fn is_match(&self, name: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(name))
    }
}

/// Translate a `*`/`?` glob into an anchored regular expression
pub fn glob_to_regex(glob: &str) -> String {
    let escaped = regex::escape(glob).replace(r"\*", ".*").replace(r"\?", ".");
    format!("^{escaped}$")
}
