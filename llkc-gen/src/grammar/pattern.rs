//! Token patterns.
//!
//! A [`Pattern`] is either built directly or parsed from a regular-expression
//! subset with [`Pattern::parse`]. Parsing goes through `regex-automata`'s
//! syntax front end; the resulting HIR is lowered into the small tree below,
//! which is what the NFA builder consumes.

use regex_automata::util::syntax;
use regex_syntax::hir::{Class, Hir, HirKind};
use smartstring::alias::String;
use thiserror::Error;

/// Largest bound accepted in `{min,max}` repetitions.
pub const REPEAT_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassItem {
    Char(char),
    /// Inclusive range.
    Range(char, char),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharClass {
    pub items: Vec<ClassItem>,
    pub negated: bool,
}

impl CharClass {
    pub fn new(items: Vec<ClassItem>) -> Self {
        Self {
            items,
            negated: false,
        }
    }

    pub fn negated(items: Vec<ClassItem>) -> Self {
        Self {
            items,
            negated: true,
        }
    }

    pub fn range(lo: char, hi: char) -> Self {
        Self::new(vec![ClassItem::Range(lo, hi)])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Literal(String),
    Class(CharClass),
    Seq(Vec<Pattern>),
    Alt(Vec<Pattern>),
    ZeroOrMore(Box<Pattern>),
    OneOrMore(Box<Pattern>),
    ZeroOrOne(Box<Pattern>),
    Repeat {
        inner: Box<Pattern>,
        min: u32,
        /// `None` means unbounded.
        max: Option<u32>,
    },
    /// Reference to another token definition, inlined before NFA construction.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("cannot parse pattern {pattern:?}: {message}")]
    Regex { pattern: String, message: String },

    #[error("inverted character range {lo:?}-{hi:?}")]
    InvertedRange { lo: char, hi: char },

    #[error("character class matches nothing")]
    EmptyClass,

    #[error("repetition {{{min},{max}}} has min greater than max")]
    BadRepeat { min: u32, max: u32 },

    #[error("repetition bound {bound} exceeds the limit of {}", REPEAT_LIMIT)]
    RepeatTooLarge { bound: u32 },

    #[error("unsupported pattern construct: {0}")]
    Unsupported(String),
}

impl Pattern {
    pub fn literal(s: &str) -> Self {
        Pattern::Literal(s.into())
    }

    pub fn reference(name: &str) -> Self {
        Pattern::Ref(name.into())
    }

    /// Parses a regular-expression subset: literal characters, classes,
    /// groups, alternation and quantifiers. Anchors and other zero-width
    /// assertions are rejected.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let conf = syntax::Config::new();
        let hir = syntax::parse_with(pattern, &conf).map_err(|e| PatternError::Regex {
            pattern: pattern.into(),
            message: e.to_string().into(),
        })?;
        lower(&hir)
    }

    /// Structural check: can the pattern match the empty string? References
    /// are treated as non-empty; callers check resolved patterns.
    pub fn matches_empty(&self) -> bool {
        match self {
            Pattern::Literal(s) => s.is_empty(),
            Pattern::Class(_) | Pattern::Ref(_) => false,
            Pattern::Seq(items) => items.iter().all(Pattern::matches_empty),
            Pattern::Alt(items) => items.iter().any(Pattern::matches_empty),
            Pattern::ZeroOrMore(_) | Pattern::ZeroOrOne(_) => true,
            Pattern::OneOrMore(inner) => inner.matches_empty(),
            Pattern::Repeat { inner, min, .. } => *min == 0 || inner.matches_empty(),
        }
    }

    /// Names referenced anywhere inside the pattern, in order of appearance.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Ref(name) => out.push(name.as_str()),
            Pattern::Seq(items) | Pattern::Alt(items) => {
                items.iter().for_each(|p| p.collect_refs(out))
            }
            Pattern::ZeroOrMore(inner)
            | Pattern::OneOrMore(inner)
            | Pattern::ZeroOrOne(inner)
            | Pattern::Repeat { inner, .. } => inner.collect_refs(out),
            Pattern::Literal(_) | Pattern::Class(_) => {}
        }
    }

    /// Checks classes and repetition bounds.
    pub fn validate(&self) -> Result<(), PatternError> {
        match self {
            Pattern::Literal(_) | Pattern::Ref(_) => Ok(()),
            Pattern::Class(class) => {
                for item in &class.items {
                    if let ClassItem::Range(lo, hi) = *item {
                        if lo > hi {
                            return Err(PatternError::InvertedRange { lo, hi });
                        }
                    }
                }
                if class.items.is_empty() && !class.negated {
                    return Err(PatternError::EmptyClass);
                }
                Ok(())
            }
            Pattern::Seq(items) | Pattern::Alt(items) => {
                items.iter().try_for_each(Pattern::validate)
            }
            Pattern::ZeroOrMore(inner) | Pattern::OneOrMore(inner) | Pattern::ZeroOrOne(inner) => {
                inner.validate()
            }
            Pattern::Repeat { inner, min, max } => {
                let bound = max.unwrap_or(*min).max(*min);
                if bound > REPEAT_LIMIT {
                    return Err(PatternError::RepeatTooLarge { bound });
                }
                if let Some(max) = *max {
                    if *min > max {
                        return Err(PatternError::BadRepeat { min: *min, max });
                    }
                }
                inner.validate()
            }
        }
    }
}

fn lower(hir: &Hir) -> Result<Pattern, PatternError> {
    Ok(match hir.kind() {
        HirKind::Empty => Pattern::Seq(Vec::new()),
        HirKind::Literal(lit) => {
            let s = std::str::from_utf8(&lit.0)
                .map_err(|_| PatternError::Unsupported("non-UTF-8 literal".into()))?;
            Pattern::Literal(s.into())
        }
        HirKind::Class(Class::Unicode(class)) => Pattern::Class(CharClass::new(
            class
                .iter()
                .map(|r| {
                    if r.start() == r.end() {
                        ClassItem::Char(r.start())
                    } else {
                        ClassItem::Range(r.start(), r.end())
                    }
                })
                .collect(),
        )),
        HirKind::Class(Class::Bytes(class)) => Pattern::Class(CharClass::new(
            class
                .iter()
                .map(|r| ClassItem::Range(char::from(r.start()), char::from(r.end())))
                .collect(),
        )),
        HirKind::Look(look) => {
            return Err(PatternError::Unsupported(format!("{:?}", look).into()));
        }
        HirKind::Repetition(rep) => {
            let inner = Box::new(lower(&rep.sub)?);
            match (rep.min, rep.max) {
                (0, None) => Pattern::ZeroOrMore(inner),
                (1, None) => Pattern::OneOrMore(inner),
                (0, Some(1)) => Pattern::ZeroOrOne(inner),
                (min, max) => Pattern::Repeat { inner, min, max },
            }
        }
        HirKind::Capture(cap) => lower(&cap.sub)?,
        HirKind::Concat(items) => Pattern::Seq(items.iter().map(lower).collect::<Result<_, _>>()?),
        HirKind::Alternation(items) => {
            Pattern::Alt(items.iter().map(lower).collect::<Result<_, _>>()?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digits_plus() {
        let p = Pattern::parse("[0-9]+").unwrap();
        assert_eq!(
            p,
            Pattern::OneOrMore(Box::new(Pattern::Class(CharClass::range('0', '9'))))
        );
        assert!(!p.matches_empty());
    }

    #[test]
    fn parses_literal_and_alternation() {
        assert_eq!(Pattern::parse("abc").unwrap(), Pattern::literal("abc"));
        let p = Pattern::parse("if|else").unwrap();
        assert!(matches!(p, Pattern::Alt(ref v) if v.len() == 2));
    }

    #[test]
    fn bounded_repeat() {
        let p = Pattern::parse("x{2,3}").unwrap();
        assert_eq!(
            p,
            Pattern::Repeat {
                inner: Box::new(Pattern::literal("x")),
                min: 2,
                max: Some(3)
            }
        );
        assert!(p.validate().is_ok());
    }

    #[test]
    fn rejects_anchors() {
        assert!(matches!(
            Pattern::parse("^a"),
            Err(PatternError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_malformed_syntax() {
        assert!(matches!(
            Pattern::parse("[z-a]"),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn validation_errors() {
        let inverted = Pattern::Class(CharClass::range('z', 'a'));
        assert_eq!(
            inverted.validate(),
            Err(PatternError::InvertedRange { lo: 'z', hi: 'a' })
        );
        assert_eq!(
            Pattern::Class(CharClass::new(vec![])).validate(),
            Err(PatternError::EmptyClass)
        );
        let bad = Pattern::Repeat {
            inner: Box::new(Pattern::literal("a")),
            min: 3,
            max: Some(2),
        };
        assert_eq!(bad.validate(), Err(PatternError::BadRepeat { min: 3, max: 2 }));
        let big = Pattern::Repeat {
            inner: Box::new(Pattern::literal("a")),
            min: 1,
            max: Some(REPEAT_LIMIT + 1),
        };
        assert!(matches!(
            big.validate(),
            Err(PatternError::RepeatTooLarge { .. })
        ));
    }

    #[test]
    fn empty_matches_and_refs() {
        assert!(Pattern::parse("a*").unwrap().matches_empty());
        assert!(Pattern::parse("(a|)").unwrap().matches_empty());
        let p = Pattern::Seq(vec![
            Pattern::reference("DIGIT"),
            Pattern::ZeroOrMore(Box::new(Pattern::reference("LETTER"))),
        ]);
        assert_eq!(p.references(), vec!["DIGIT", "LETTER"]);
        assert!(!p.matches_empty());
    }
}
