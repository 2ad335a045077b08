//! Grammar-wide options.

/// How an irresolvable lookahead conflict is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Record a warning and fall back to declaration order.
    #[default]
    Warn,
    /// Record a fatal error.
    Error,
}

/// Options that steer the analysis.
///
/// The defaults match what a grammar without an options block gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Upper bound for adaptive lookahead growth at choice points.
    pub max_lookahead: usize,
    /// Default case sensitivity of token patterns.
    pub ignore_case: bool,
    pub conflict_policy: ConflictPolicy,
    /// Check alternatives carrying an explicit lookahead for conflicts too.
    pub force_lookahead_check: bool,
    /// Merge equivalent DFA states after subset construction.
    pub minimize: bool,
    /// Run the per-lexical-state and per-choice-point stages on the rayon pool.
    pub parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_lookahead: 2,
            ignore_case: false,
            conflict_policy: ConflictPolicy::Warn,
            force_lookahead_check: false,
            minimize: true,
            parallel: true,
        }
    }
}

impl Options {
    /// Values below 1 are clamped to 1.
    pub fn with_max_lookahead(mut self, k: usize) -> Self {
        self.max_lookahead = k.max(1);
        self
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_force_lookahead_check(mut self, force: bool) -> Self {
        self.force_lookahead_check = force;
        self
    }

    pub fn with_minimize(mut self, minimize: bool) -> Self {
        self.minimize = minimize;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
