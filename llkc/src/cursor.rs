use thiserror::Error;

/// A 0-based line/column position in source text.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// 0-based line number.
    pub line: usize,
    /// 0-based column number (character position in the line).
    pub column: usize,
}

impl Position {
    /// Creates a new `Position`.
    #[inline]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A half-open source range: `[start, end)`.
///
/// `Span` marks the region of source text that a token, a grammar element or
/// a diagnostic refers to. Grammar elements built without source information
/// carry `Span::default()`.
///
/// Invariants are not enforced here, but it is conventional for `start <= end`
/// in lexicographic `(line, column)` ordering.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    /// Creates a new `Span`.
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Start (or restart) this span at its current `end` position (empty span at end).
    /// Effect: span(x,y, z,w) -> span(z,w, z,w)
    pub fn collapse(&mut self) {
        self.start = self.end;
    }

    /// Merge with another span by covering both.
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Is this span empty (start == end)?
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the inclusive line range spanned by this `Span`.
    #[inline]
    pub fn line_range(&self) -> (usize, usize) {
        (self.start.line, self.end.line)
    }

    /// Pretty-print for diagnostics (human-readable).
    #[inline]
    pub fn display(&self) -> String {
        format!(
            "{}:{} to {}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("line history is empty")]
    HistoryEmpty,
    #[error("unexpected retreat past column 0 of line {line}")]
    UnexpectedRetreat { line: usize },
}

/// Tracks the current scan position.
///
/// `ScanCursor` advances and retreats over characters, updating a `Span` and
/// remembering the lengths of the lines it crossed so that characters pushed
/// back after an overlong match restore the exact column. The history only
/// has to reach back to the start of the current token; [`ScanCursor::commit`]
/// drops it.
#[derive(Debug, Clone, Default)]
pub struct ScanCursor {
    pub pos: usize,
    pub span: Span,
    line_history: Vec<usize>,
}

impl ScanCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by consuming `ch`, updating span and line history.
    pub fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line_history.push(self.span.end.column);
            self.span.end.line += 1;
            self.span.end.column = 0;
        } else {
            self.span.end.column += 1;
        }
        self.pos += 1;
    }

    /// Retreat by undoing `ch`, updating span and line history.
    pub fn retreat(&mut self, ch: char) -> Result<(), SpanError> {
        if ch == '\n' {
            if self.span.end.column != 0 || self.span.end.line == 0 {
                return Err(SpanError::UnexpectedRetreat {
                    line: self.span.end.line,
                });
            }
            self.span.end.column = self.line_history.pop().ok_or(SpanError::HistoryEmpty)?;
            self.span.end.line -= 1;
        } else {
            if self.span.end.column == 0 {
                return Err(SpanError::UnexpectedRetreat {
                    line: self.span.end.line,
                });
            }
            self.span.end.column -= 1;
        }
        self.pos -= 1;
        if self.span.start > self.span.end {
            self.span.start = self.span.end;
        }
        Ok(())
    }

    /// Ends the current token: the span restarts at the current position.
    pub fn commit(&mut self) {
        self.span.collapse();
        self.line_history.clear();
    }
}

/// Build an `Option<Span>` inline from 0-based line/column coordinates.
///
/// # Examples
///
/// ```rust
/// # use llkc::span;
/// let s = span!(0, 0, 1, 4);
/// assert_eq!(s.unwrap().end.column, 4);
/// ```
#[macro_export]
macro_rules! span {
    ($line_start:expr, $col_start:expr, $line_end:expr, $col_end:expr) => {
        Some($crate::Span {
            start: $crate::Position {
                line: $line_start,
                column: $col_start,
            },
            end: $crate::Position {
                line: $line_end,
                column: $col_end,
            },
        })
    };
}
