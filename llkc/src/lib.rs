//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Runtime support for the `llkc` grammar compiler.
//!
//! `llkc` provides the small pieces shared between the analysis core
//! (`llkc-gen`) and anything that executes its output:
//!  * [`Position`] / [`Span`]: source locations (and the [`span!`] macro),
//!  * [`ScanCursor`]: position tracking with push-back support,
//!  * [`ScanTable`] / [`Scanner`]: a longest-match scanner that runs the
//!    per-lexical-state DFA tables produced by `llkc-gen`.

mod cursor;
mod scanner;

pub use crate::cursor::{Position, ScanCursor, Span, SpanError};
pub use crate::scanner::{
    Disposition, EOF_KIND, ScanError, ScanStats, ScanTable, ScannedToken, Scanner,
};
