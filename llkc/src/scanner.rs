use crate::cursor::{ScanCursor, Span, SpanError};
use smartstring::alias::String;
use std::fmt::Debug;
use std::iter::Fuse;
use thiserror::Error;

/// Token kind reserved for end of input.
pub const EOF_KIND: u32 = 0;

/// What the scanner does with a matched token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Disposition {
    /// Handed to the parser.
    #[default]
    Token,
    /// Discarded.
    Skip,
    /// Kept as a prefix of the next token's image.
    More,
    /// Handed over but flagged as not significant to the grammar (comments).
    Special,
}

/// Read-only view of per-mode DFA tables.
///
/// A mode corresponds to a lexical state. States are numbered per mode; a
/// missing transition means the automaton is dead for the remaining input.
pub trait ScanTable {
    fn initial_mode(&self) -> usize;
    fn mode_name(&self, mode: usize) -> &str;

    fn start_state(&self, mode: usize) -> u32;
    fn next_state(&self, mode: usize, state: u32, ch: char) -> Option<u32>;
    fn accepting(&self, mode: usize, state: u32) -> Option<u32>;

    fn disposition(&self, kind: u32) -> Disposition;
    fn next_mode(&self, kind: u32) -> Option<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("no token matches {found:?} in lexical state {mode} at {}", span.display())]
    NoMatch { found: char, mode: String, span: Span },

    #[error("input ended inside a partial token in lexical state {mode}")]
    UnexpectedEof { mode: String, span: Span },

    #[error(transparent)]
    Span(#[from] SpanError),
}

/// A token produced by [`Scanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedToken {
    pub kind: u32,
    pub image: String,
    pub span: Span,
    pub special: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub unreads: usize,
    pub chars: usize,
    pub matches: usize,
}

/// Longest-match scanner driven by a [`ScanTable`].
///
/// Each step runs the current mode's DFA as far as the input allows, remembers
/// the last accepting position and pushes the overshoot back. The winning
/// kind's disposition and mode switch are applied before the next step. After
/// the input is exhausted a single `EOF` token is produced.
pub struct Scanner<'t, T, I>
where
    T: ScanTable + ?Sized,
    I: Iterator<Item = char>,
{
    table: &'t T,
    input: Fuse<I>,
    mode: usize,
    unread: Vec<char>,
    lexeme: Vec<char>,
    image: String,
    image_span: Option<Span>,
    cursor: ScanCursor,
    end_flag: bool,
    stats: ScanStats,
}

impl<'t, T, I> Scanner<'t, T, I>
where
    T: ScanTable + ?Sized,
    I: Iterator<Item = char>,
{
    pub fn new(table: &'t T, input: I) -> Self {
        Self {
            table,
            input: input.fuse(),
            mode: table.initial_mode(),
            unread: Vec::new(),
            lexeme: Vec::new(),
            image: String::new(),
            image_span: None,
            cursor: ScanCursor::new(),
            end_flag: false,
            stats: ScanStats::default(),
        }
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    pub fn begin(&mut self, mode: usize) {
        self.mode = mode;
    }

    pub fn stats(&self) -> ScanStats {
        self.stats.clone()
    }

    pub fn try_next(&mut self) -> Result<Option<ScannedToken>, ScanError> {
        if self.end_flag {
            return Ok(None);
        }

        while let Some(kind) = self.try_match()? {
            let span = self.cursor.span;
            let lexeme: String = self.lexeme.drain(..).collect();
            self.cursor.commit();
            log::trace!(
                "MATCHED: mode={}, kind={}, lexeme={:?}",
                self.table.mode_name(self.mode),
                kind,
                lexeme
            );
            if let Some(next) = self.table.next_mode(kind) {
                log::trace!("MODE: {} -> {}", self.mode, next);
                self.mode = next;
            }

            match self.table.disposition(kind) {
                Disposition::Skip => {
                    self.image.clear();
                    self.image_span = None;
                }
                Disposition::More => {
                    self.image.push_str(&lexeme);
                    self.image_span = Some(self.image_span.map_or(span, |s| s.merge(&span)));
                }
                disposition @ (Disposition::Token | Disposition::Special) => {
                    let mut image = std::mem::take(&mut self.image);
                    image.push_str(&lexeme);
                    let span = self.image_span.take().map_or(span, |s| s.merge(&span));
                    return Ok(Some(ScannedToken {
                        kind,
                        image,
                        span,
                        special: disposition == Disposition::Special,
                    }));
                }
            }
        }

        self.end_flag = true;
        let span = self.cursor.span;
        if !self.image.is_empty() {
            return Err(ScanError::UnexpectedEof {
                mode: self.table.mode_name(self.mode).into(),
                span: self.image_span.unwrap_or(span),
            });
        }
        Ok(Some(ScannedToken {
            kind: EOF_KIND,
            image: String::new(),
            span,
            special: false,
        }))
    }

    fn read(&mut self) -> Option<char> {
        let ch = self.unread.pop().or_else(|| {
            let ch = self.input.next();
            if ch.is_some() {
                self.stats.chars += 1;
            }
            ch
        })?;
        self.cursor.advance(ch);
        self.lexeme.push(ch);
        Some(ch)
    }

    /// Runs the DFA of the current mode from the start state. Returns the
    /// kind of the longest match, leaving exactly its characters in `lexeme`.
    fn try_match(&mut self) -> Result<Option<u32>, ScanError> {
        self.stats.matches += 1;
        let mode = self.mode;
        let mut state = self.table.start_state(mode);
        let mut last_match: Option<(u32, usize)> = None;

        while let Some(ch) = self.read() {
            match self.table.next_state(mode, state, ch) {
                Some(next) => {
                    state = next;
                    if let Some(kind) = self.table.accepting(mode, state) {
                        log::trace!(
                            "ACCEPT: ch={:?}, len={}, kind={}, s={}",
                            ch,
                            self.lexeme.len(),
                            kind,
                            state
                        );
                        last_match = Some((kind, self.lexeme.len()));
                    }
                }
                None => {
                    log::trace!("DEAD: ch={:?}, s={}", ch, state);
                    break;
                }
            }
        }

        let keep = last_match.map_or(0, |(_, len)| len);
        while self.lexeme.len() > keep {
            if let Some(ch) = self.lexeme.pop() {
                self.cursor.retreat(ch)?;
                self.unread.push(ch);
                self.stats.unreads += 1;
            }
        }

        match last_match {
            Some((kind, _)) => Ok(Some(kind)),
            None => match self.unread.last() {
                Some(&found) => {
                    let mut span = self.cursor.span;
                    span.end.column += 1;
                    Err(ScanError::NoMatch {
                        found,
                        mode: self.table.mode_name(mode).into(),
                        span,
                    })
                }
                None => Ok(None),
            },
        }
    }
}

impl<T, I> Iterator for Scanner<'_, T, I>
where
    T: ScanTable + ?Sized,
    I: Iterator<Item = char>,
{
    type Item = Result<ScannedToken, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.try_next() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(err) => {
                self.end_flag = true;
                Some(Err(err))
            }
        }
    }
}
