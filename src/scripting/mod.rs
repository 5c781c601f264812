//! Rhai Scripting for Record Filters
//!
//! The source stage can be given a filter deciding which records enter the
//! pipeline. Besides plain closures, filters can be written as Rhai
//! expressions evaluated against each record's text, which lets the CLI take
//! a filter on the command line.
//!
//! ## Example Scripts
//!
//! Keep mostly-Latin text with at least two words (a cheap stand-in for
//! language detection):
//! ```rhai
//! ascii_ratio(text) > 0.9 && word_count(text) >= 2
//! ```
//!
//! Drop link spam:
//! ```rhai
//! !has_url(text)
//! ```
//!
//! Only records mentioning a topic:
//! ```rhai
//! contains_word(text, "video") || contains_word(text, "song")
//! ```

mod engine;

pub use engine::{ascii_ratio, ScriptEngine};

use crate::error::Result;
use crate::pipeline::source::TextFilter;
use rhai::AST;

/// A compiled filter expression
pub struct ScriptFilter {
    engine: ScriptEngine,
    ast: AST,
    source: String,
}

impl ScriptFilter {
    /// Compile a filter expression
    pub fn compile(source: &str) -> Result<Self> {
        let engine = ScriptEngine::new();
        let ast = engine.compile(source)?;
        Ok(Self {
            engine,
            ast,
            source: source.to_string(),
        })
    }

    /// Get the source code of this filter
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, text: &str) -> Result<bool> {
        self.engine.evaluate(&self.ast, text)
    }
}

impl TextFilter for ScriptFilter {
    fn accept(&mut self, text: &str) -> Result<bool> {
        self.evaluate(text)
    }
}

impl std::fmt::Debug for ScriptFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptFilter")
            .field("source", &self.source)
            .finish()
    }
}

/// Built-in filter expressions
pub mod builtins {
    /// Mostly-Latin text of two or more words
    pub const ENGLISH_HEURISTIC: &str = "ascii_ratio(text) > 0.9 && word_count(text) >= 2";

    /// Anything that is not just whitespace
    pub const NON_EMPTY: &str = "word_count(text) > 0";

    /// Records without links
    pub const NO_LINKS: &str = "!has_url(text)";

    /// List of all built-in filters with names
    pub fn all() -> Vec<(&'static str, &'static str)> {
        vec![
            ("english", ENGLISH_HEURISTIC),
            ("non-empty", NON_EMPTY),
            ("no-links", NO_LINKS),
        ]
    }

    /// Look up a built-in filter by name
    pub fn by_name(name: &str) -> Option<&'static str> {
        all().into_iter().find(|(n, _)| *n == name).map(|(_, s)| s)
    }
}
