//! Nesting depth and formatting settings threaded through compilation.

use super::GrammarOptions;

/// A snapshot of where a terminal sits.
///
/// Terminals keep a copy so that whitespace and "any JSON" rules are
/// specialised to the depth they were created at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Scope {
    pub(crate) allow_new_lines: bool,
    pub(crate) pad_spaces: usize,
    pub(crate) depth: usize,
}

impl Scope {
    /// The same settings one level deeper.
    pub(crate) fn nested(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }

    /// The same position with newlines disabled.
    ///
    /// Without newlines whitespace no longer depends on depth, so every depth
    /// collapses onto depth zero and shares one set of rules.
    pub(crate) fn flat(self) -> Self {
        Self {
            allow_new_lines: false,
            pad_spaces: self.pad_spaces,
            depth: 0,
        }
    }
}

/// Tracks the current depth while the compiler walks the schema.
#[derive(Debug)]
pub(crate) struct ScopeTracker {
    current: Scope,
}

impl ScopeTracker {
    pub(crate) fn new(options: &GrammarOptions) -> Self {
        Self::starting_at(Scope {
            allow_new_lines: options.allow_new_lines,
            pad_spaces: options.pad_spaces,
            depth: 0,
        })
    }

    /// A tracker that resumes at a scope captured earlier.
    pub(crate) fn starting_at(scope: Scope) -> Self {
        Self { current: scope }
    }

    pub(crate) fn current(&self) -> Scope {
        self.current
    }

    /// Runs `f` one level deeper, restoring the depth afterwards.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.current;
        self.current = saved.nested();
        let result = f(self);
        self.current = saved;
        result
    }
}
