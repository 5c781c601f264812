//! Rhai Script Engine Implementation
//!
//! Compiles and evaluates record filter expressions.
//!
//! ## Scope
//!
//! - `text` - The record text being filtered
//!
//! ## Text Functions
//!
//! - `word_count(text)` - Number of whitespace separated words
//! - `ascii_ratio(text)` - Share of alphabetic characters that are ASCII (0.0-1.0)
//! - `contains_word(text, word)` - Case-insensitive whole-word match
//! - `has_url(text)` - True if any word looks like a link

use crate::error::{Result, ResultExt, SentiflowError};
use rhai::{Dynamic, Engine, Scope, AST};

/// Share of alphabetic characters that are ASCII letters.
///
/// Text without letters scores 0.0.
pub fn ascii_ratio(text: &str) -> f64 {
    let (ascii, total) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(ascii, total), c| {
            (ascii + usize::from(c.is_ascii()), total + 1)
        });
    if total == 0 {
        0.0
    } else {
        ascii as f64 / total as f64
    }
}

fn contains_word(text: &str, word: &str) -> bool {
    let word = word.to_lowercase();
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .any(|w| w.to_lowercase() == word)
}

fn has_url(text: &str) -> bool {
    text.split_whitespace().any(|w| {
        let w = w.to_ascii_lowercase();
        w.starts_with("http://") || w.starts_with("https://") || w.starts_with("www.")
    })
}

/// Rhai engine preconfigured with text helpers and safety limits
pub struct ScriptEngine {
    engine: Engine,
}

impl ScriptEngine {
    /// Create a new script engine with default configuration
    pub fn new() -> Self {
        let mut engine = Engine::new();
        Self::configure_engine(&mut engine);
        Self { engine }
    }

    /// Configure the Rhai engine with built-in functions and safety limits
    fn configure_engine(engine: &mut Engine) {
        // Set safety limits
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);

        engine.register_fn("word_count", |text: &str| -> i64 {
            text.split_whitespace().count() as i64
        });
        engine.register_fn("ascii_ratio", |text: &str| -> f64 { ascii_ratio(text) });
        engine.register_fn("contains_word", |text: &str, word: &str| -> bool {
            contains_word(text, word)
        });
        engine.register_fn("has_url", |text: &str| -> bool { has_url(text) });
    }

    /// Compile a filter expression
    pub fn compile(&self, source: &str) -> Result<AST> {
        self.engine
            .compile(source)
            .map_err(|e| SentiflowError::Script(format!("Compilation error: {}", e)))
    }

    /// Evaluate a compiled filter against one text
    pub fn evaluate(&self, ast: &AST, text: &str) -> Result<bool> {
        let mut scope = Scope::new();
        scope.push("text", text.to_string());

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .context("Filter evaluation failed")?;

        value.as_bool().map_err(|type_name| {
            SentiflowError::Script(format!(
                "Filter must return a bool, got {}",
                type_name
            ))
        })
    }

    /// Validate a script without executing it
    pub fn validate(&self, source: &str) -> Result<()> {
        self.compile(source).map(|_| ())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine").finish_non_exhaustive()
    }
}
