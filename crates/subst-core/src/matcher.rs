//! Delimiter recognition at arbitrary buffer positions.
//!
//! A [`Matcher`] reports how many characters starting at a position satisfy
//! its rule, with `0` meaning "no match". The substitution engine uses
//! matchers for the placeholder prefix, suffix, escape and default separator.

use std::fmt;

/// A rule recognizing a short pattern at a buffer position.
///
/// Matchers are plain values; build them with the constructors
/// ([`Matcher::string`], [`Matcher::char_set`], ...) which normalize
/// degenerate inputs (an empty string becomes [`Matcher::None`], a single
/// character becomes [`Matcher::Char`]).
///
/// # Example
///
/// ```
/// use subst_core::Matcher;
///
/// let prefix = Matcher::string("${");
/// let text: Vec<char> = "a${b}".chars().collect();
///
/// assert_eq!(prefix.match_at(&text, 1, 0, text.len()), 2);
/// assert_eq!(prefix.match_at(&text, 0, 0, text.len()), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Matcher {
    /// Never matches.
    #[default]
    None,
    /// A single character.
    Char(char),
    /// Any one character of a sorted, deduplicated set.
    CharSet(Vec<char>),
    /// An exact character sequence.
    Sequence(Vec<char>),
    /// Every matcher in order, each starting where the previous one ended.
    All(Vec<Matcher>),
    /// Any character at or below U+0020 (the `trim` class).
    Whitespace,
}

impl Matcher {
    /// Match a single character.
    #[must_use]
    pub fn char(ch: char) -> Self {
        Self::Char(ch)
    }

    /// Match any one of the given characters.
    #[must_use]
    pub fn char_set(chars: impl IntoIterator<Item = char>) -> Self {
        let mut set: Vec<char> = chars.into_iter().collect();
        set.sort_unstable();
        set.dedup();
        match set.as_slice() {
            [] => Self::None,
            [ch] => Self::Char(*ch),
            _ => Self::CharSet(set),
        }
    }

    /// Match an exact string.
    #[must_use]
    pub fn string(literal: &str) -> Self {
        let chars: Vec<char> = literal.chars().collect();
        match chars.as_slice() {
            [] => Self::None,
            [ch] => Self::Char(*ch),
            _ => Self::Sequence(chars),
        }
    }

    /// Match every present matcher consecutively.
    ///
    /// Absent slots are dropped: they match vacuously and contribute nothing
    /// to the matched length.
    #[must_use]
    pub fn all(parts: impl IntoIterator<Item = Option<Matcher>>) -> Self {
        Self::All(parts.into_iter().flatten().collect())
    }

    /// Match any whitespace or control character (≤ U+0020).
    #[must_use]
    pub fn whitespace() -> Self {
        Self::Whitespace
    }

    /// Nominal pattern length when this matcher is satisfied.
    ///
    /// Used to decide how many characters must be available before a match
    /// attempt is meaningful.
    pub fn size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Char(_) | Self::CharSet(_) | Self::Whitespace => 1,
            Self::Sequence(chars) => chars.len(),
            Self::All(parts) => parts.iter().map(Self::size).sum(),
        }
    }

    /// Number of characters matched at `pos`, or `0` for no match.
    ///
    /// `[start, end)` is the addressable window. Matching only ever looks
    /// forward from `pos`, so no variant reads `start`; `All` hands it on to
    /// its parts unchanged. Single-character matchers only look at
    /// `buffer[pos]` and do not consult the window either; callers must make
    /// sure `pos < end` before asking. `Sequence` fails when fewer than its
    /// length remain before `end`. A position past the end of `buffer` never
    /// matches.
    pub fn match_at(&self, buffer: &[char], pos: usize, start: usize, end: usize) -> usize {
        match self {
            Self::None => 0,
            Self::Char(expected) => usize::from(buffer.get(pos) == Some(expected)),
            Self::CharSet(set) => buffer
                .get(pos)
                .map_or(0, |ch| usize::from(set.binary_search(ch).is_ok())),
            Self::Whitespace => usize::from(buffer.get(pos).is_some_and(|&ch| ch <= ' ')),
            Self::Sequence(expected) => {
                // Room check comes first so a short window never touches `buffer`.
                if end.saturating_sub(pos) < expected.len() {
                    return 0;
                }
                match buffer.get(pos..pos + expected.len()) {
                    Some(window) if window == expected.as_slice() => expected.len(),
                    _ => 0,
                }
            }
            Self::All(parts) => {
                let mut total = 0;
                for part in parts {
                    let matched = part.match_at(buffer, pos + total, start, end);
                    if matched == 0 {
                        return 0;
                    }
                    total += matched;
                }
                total
            }
        }
    }

    /// Whether this matcher can never match anything.
    pub fn is_none(&self) -> bool {
        self.size() == 0
    }
}

impl From<char> for Matcher {
    fn from(ch: char) -> Self {
        Self::char(ch)
    }
}

impl From<&str> for Matcher {
    fn from(literal: &str) -> Self {
        Self::string(literal)
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("<none>"),
            Self::Char(ch) => write!(f, "{ch:?}"),
            Self::CharSet(set) => write!(f, "[{}]", set.iter().collect::<String>()),
            Self::Sequence(chars) => write!(f, "{:?}", chars.iter().collect::<String>()),
            Self::All(parts) => {
                f.write_str("(")?;
                for (idx, part) in parts.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
            Self::Whitespace => f.write_str("<whitespace>"),
        }
    }
}
