//! Recursive placeholder substitution.
//!
//! Scans text left to right. At each position:
//!
//! 1. escape + prefix: the prefix is emitted literally, the escape dropped
//! 2. prefix: the expression runs to the balancing suffix, its key is
//!    substituted, resolved, and the value substituted again before output
//! 3. anything else is copied through
//!
//! Every nested pass (key, value, default) counts one level of depth; going
//! past [`Substitutor::max_depth`] fails with [`SubstError::RecursionLimit`].
//! A key that reappears while its own value is being expanded fails the same
//! way at once, whatever the limit.

use std::fmt;
use std::sync::Arc;

use crate::{Lookup, Matcher, SubstError, null_lookup};

/// Default placeholder prefix.
pub const DEFAULT_PREFIX: &str = "${";
/// Default placeholder suffix.
pub const DEFAULT_SUFFIX: &str = "}";
/// Default escape character.
pub const DEFAULT_ESCAPE: char = '$';
/// Default separator between key and default value.
pub const DEFAULT_SEPARATOR: &str = ":-";
/// Default maximum recursion depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;
/// Highest accepted maximum recursion depth.
///
/// Each level of nesting recurses on the call stack, so the limit has to fit
/// comfortably in a 2 MiB thread stack.
pub const MAX_DEPTH_LIMIT: usize = 128;

/// Result of one incremental step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Characters appended to the output.
    pub produced: usize,
    /// Buffer position where scanning should resume.
    pub next: usize,
}

/// Resume point for [`Substitutor::substitute_next_with`].
///
/// Remembers how far an open placeholder has been scanned, so re-entering
/// with more input only looks at the new characters. Keep one per input
/// stream and only append to the buffer between calls while it is in use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    open: Option<OpenScan>,
}

/// Scan progress inside an expression whose prefix starts at `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenScan {
    open: usize,
    cursor: usize,
    nesting: usize,
}

impl ScanState {
    /// Whether a placeholder is waiting for more input.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Where to continue scanning the expression opened at `open`.
    fn resume(&self, open: usize, end: usize) -> Option<(usize, usize)> {
        self.open
            .filter(|scan| scan.open == open && scan.cursor <= end)
            .map(|scan| (scan.cursor, scan.nesting))
    }
}

/// Placeholder substitution engine.
///
/// Cheap to clone: matchers are small and the lookup is shared.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use subst_core::Substitutor;
///
/// let vars = HashMap::from([
///     ("animal".to_owned(), "fox".to_owned()),
///     ("target".to_owned(), "dog".to_owned()),
/// ]);
/// let subst = Substitutor::new(Arc::new(vars));
///
/// let text = subst.replace("The quick ${animal} jumps over the ${target:-cat}.").unwrap();
/// assert_eq!(text, "The quick fox jumps over the dog.");
///
/// // Escaped placeholders are left alone.
/// assert_eq!(subst.replace("$${animal}").unwrap(), "${animal}");
/// ```
#[derive(Clone)]
pub struct Substitutor {
    prefix: Matcher,
    suffix: Matcher,
    escape: Matcher,
    default_separator: Matcher,
    lookup: Arc<dyn Lookup>,
    max_depth: usize,
    substitute_in_keys: bool,
    substitute_in_values: bool,
    preserve_escapes: bool,
    fail_on_undefined: bool,
}

impl Substitutor {
    /// Create a substitutor with `${key:-default}` syntax and `$` escape.
    #[must_use]
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self {
            prefix: Matcher::string(DEFAULT_PREFIX),
            suffix: Matcher::string(DEFAULT_SUFFIX),
            escape: Matcher::char(DEFAULT_ESCAPE),
            default_separator: Matcher::string(DEFAULT_SEPARATOR),
            lookup,
            max_depth: DEFAULT_MAX_DEPTH,
            substitute_in_keys: true,
            substitute_in_values: true,
            preserve_escapes: false,
            fail_on_undefined: false,
        }
    }

    /// Set the placeholder prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<Matcher>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the placeholder suffix.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<Matcher>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the escape matcher. [`Matcher::None`] disables escaping.
    #[must_use]
    pub fn with_escape(mut self, escape: impl Into<Matcher>) -> Self {
        self.escape = escape.into();
        self
    }

    /// Set the key/default separator. [`Matcher::None`] disables defaults.
    #[must_use]
    pub fn with_default_separator(mut self, separator: impl Into<Matcher>) -> Self {
        self.default_separator = separator.into();
        self
    }

    /// Replace the lookup.
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.lookup = lookup;
        self
    }

    /// Set the maximum recursion depth, clamped to `1..=`[`MAX_DEPTH_LIMIT`].
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(1, MAX_DEPTH_LIMIT);
        self
    }

    /// Whether placeholders inside a key are substituted before lookup.
    #[must_use]
    pub fn with_substitute_in_keys(mut self, enabled: bool) -> Self {
        self.substitute_in_keys = enabled;
        self
    }

    /// Whether resolved values are substituted again before output.
    #[must_use]
    pub fn with_substitute_in_values(mut self, enabled: bool) -> Self {
        self.substitute_in_values = enabled;
        self
    }

    /// Keep the escape character in front of an escaped prefix.
    #[must_use]
    pub fn with_preserve_escapes(mut self, enabled: bool) -> Self {
        self.preserve_escapes = enabled;
        self
    }

    /// Fail on keys that resolve to nothing and have no default.
    #[must_use]
    pub fn with_fail_on_undefined(mut self, enabled: bool) -> Self {
        self.fail_on_undefined = enabled;
        self
    }

    /// Placeholder prefix matcher.
    pub fn prefix(&self) -> &Matcher {
        &self.prefix
    }

    /// Placeholder suffix matcher.
    pub fn suffix(&self) -> &Matcher {
        &self.suffix
    }

    /// Escape matcher.
    pub fn escape(&self) -> &Matcher {
        &self.escape
    }

    /// Key/default separator matcher.
    pub fn default_separator(&self) -> &Matcher {
        &self.default_separator
    }

    /// Maximum recursion depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Substitute every placeholder in `source`.
    pub fn replace(&self, source: &str) -> Result<String, SubstError> {
        let chars: Vec<char> = source.chars().collect();
        self.substitute_all(&chars, &mut Vec::new(), 0)
    }

    /// Substitute the character window `[offset, offset + length)` of `source`.
    ///
    /// Only the substituted window is returned; text outside it is neither
    /// scanned nor copied.
    pub fn replace_range(
        &self,
        source: &str,
        offset: usize,
        length: usize,
    ) -> Result<String, SubstError> {
        let chars: Vec<char> = source.chars().collect();
        let len = chars.len();
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= len)
            .ok_or(SubstError::InvalidRange {
                offset,
                length,
                len,
            })?;
        self.substitute_all(&chars[offset..end], &mut Vec::new(), 0)
    }

    /// Substitute `text` in place. Returns whether anything changed.
    pub fn replace_in(&self, text: &mut String) -> Result<bool, SubstError> {
        let replaced = self.replace(text)?;
        if replaced == *text {
            return Ok(false);
        }
        *text = replaced;
        Ok(true)
    }

    /// Advance through `buffer[pos..end]` as far as the available input allows.
    ///
    /// Output for the consumed characters is appended to `out`. When
    /// `at_eof` is false, anything that might still turn into a prefix,
    /// escape or expression boundary once more input arrives is left
    /// unconsumed. Returns `None` when nothing at `pos` can be decided yet
    /// (or `pos == end`); feed more input and call again with the same `pos`.
    ///
    /// Running this to completion with `at_eof` set produces exactly the
    /// output of [`replace`](Self::replace), however the input was split.
    pub fn substitute_next(
        &self,
        buffer: &[char],
        pos: usize,
        end: usize,
        at_eof: bool,
        out: &mut String,
    ) -> Result<Option<Progress>, SubstError> {
        self.substitute_next_with(buffer, pos, end, at_eof, out, &mut ScanState::default())
    }

    /// [`substitute_next`](Self::substitute_next) that keeps its place in an
    /// open placeholder across calls.
    ///
    /// When a call returns `None` because a placeholder is still open,
    /// `state` records how far it was scanned; the next call with the same
    /// `pos` and a longer buffer continues from there. Buffering a long
    /// placeholder chunk by chunk thus costs time linear in its length.
    pub fn substitute_next_with(
        &self,
        buffer: &[char],
        pos: usize,
        end: usize,
        at_eof: bool,
        out: &mut String,
        state: &mut ScanState,
    ) -> Result<Option<Progress>, SubstError> {
        if end > buffer.len() || pos > end {
            return Err(SubstError::InvalidRange {
                offset: pos,
                length: end.saturating_sub(pos),
                len: buffer.len(),
            });
        }
        if pos == end {
            return Ok(None);
        }

        let window = Window {
            buffer,
            start: pos,
            end,
            at_eof,
        };
        let written = out.len();
        let next = self.step(&window, pos, out, &mut Vec::new(), 0, state)?;
        Ok(next.map(|next| Progress {
            produced: out[written..].chars().count(),
            next,
        }))
    }

    /// Substitute a complete buffer at the given depth.
    fn substitute_all(
        &self,
        text: &[char],
        trail: &mut Vec<String>,
        depth: usize,
    ) -> Result<String, SubstError> {
        let window = Window::complete(text);
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        while pos < text.len() {
            match self.step(&window, pos, &mut out, trail, depth, &mut ScanState::default())? {
                Some(next) => pos = next,
                None => break,
            }
        }
        Ok(out)
    }

    /// One scanning step: a run of plain text or a single expression.
    fn step(
        &self,
        window: &Window<'_>,
        pos: usize,
        out: &mut String,
        trail: &mut Vec<String>,
        depth: usize,
        state: &mut ScanState,
    ) -> Result<Option<usize>, SubstError> {
        let mut cursor = pos;
        while cursor < window.end {
            match self.token_at(window, cursor) {
                Token::Text => {
                    out.push(window.buffer[cursor]);
                    cursor += 1;
                }
                Token::Escaped { escape, prefix } => {
                    let keep_from = if self.preserve_escapes {
                        cursor
                    } else {
                        cursor + escape
                    };
                    cursor += escape + prefix;
                    out.extend(&window.buffer[keep_from..cursor]);
                }
                Token::Open(prefix) => {
                    // Flush the pending text run; the expression starts the next step.
                    if cursor > pos {
                        break;
                    }
                    return self.expression(window, cursor, prefix, out, trail, depth, state);
                }
                Token::Starved => break,
            }
        }
        Ok((cursor > pos).then_some(cursor))
    }

    /// Classify the position `at`.
    fn token_at(&self, window: &Window<'_>, at: usize) -> Token {
        match window.probe(&self.escape, at) {
            Probe::Starved => return Token::Starved,
            Probe::Hit(escape) => match window.probe(&self.prefix, at + escape) {
                Probe::Hit(prefix) => return Token::Escaped { escape, prefix },
                Probe::Starved => return Token::Starved,
                Probe::Miss => {}
            },
            Probe::Miss => {}
        }
        match window.probe(&self.prefix, at) {
            Probe::Hit(prefix) => Token::Open(prefix),
            Probe::Miss => Token::Text,
            Probe::Starved => Token::Starved,
        }
    }

    /// Handle an expression whose prefix starts at `open`.
    #[allow(clippy::too_many_arguments)]
    fn expression(
        &self,
        window: &Window<'_>,
        open: usize,
        prefix: usize,
        out: &mut String,
        trail: &mut Vec<String>,
        depth: usize,
        state: &mut ScanState,
    ) -> Result<Option<usize>, SubstError> {
        let body_start = open + prefix;
        let (from, nesting) = state.resume(open, window.end).unwrap_or((body_start, 0));
        let scan = self.scan_expression(window, from, nesting);
        state.open = match scan {
            Scan::Starved { cursor, nesting } => Some(OpenScan {
                open,
                cursor,
                nesting,
            }),
            _ => None,
        };
        match scan {
            Scan::Starved { .. } => Ok(None),
            Scan::Unterminated => {
                tracing::debug!(offset = open, "Unterminated placeholder passed through");
                out.extend(&window.buffer[open..window.end]);
                Ok(Some(window.end))
            }
            Scan::Closed { close, end } => {
                let body = &window.buffer[body_start..close];
                let raw = &window.buffer[open..end];
                self.resolve(body, raw, out, trail, depth)?;
                Ok(Some(end))
            }
        }
    }

    /// Find the suffix balancing the open expression, scanning from `from`
    /// with `nesting` inner expressions still open.
    fn scan_expression(&self, window: &Window<'_>, from: usize, mut nesting: usize) -> Scan {
        let mut cursor = from;
        while cursor < window.end {
            match window.probe(&self.suffix, cursor) {
                Probe::Hit(len) => {
                    if nesting == 0 {
                        return Scan::Closed {
                            close: cursor,
                            end: cursor + len,
                        };
                    }
                    nesting -= 1;
                    cursor += len;
                    continue;
                }
                Probe::Starved => return Scan::Starved { cursor, nesting },
                Probe::Miss => {}
            }
            match window.probe(&self.prefix, cursor) {
                Probe::Hit(len) => {
                    nesting += 1;
                    cursor += len;
                }
                Probe::Starved => return Scan::Starved { cursor, nesting },
                Probe::Miss => cursor += 1,
            }
        }
        if window.at_eof {
            Scan::Unterminated
        } else {
            Scan::Starved { cursor, nesting }
        }
    }

    /// Split an expression body at the first top-level default separator.
    fn split_default<'a>(&self, body: &'a [char]) -> (&'a [char], Option<&'a [char]>) {
        if self.default_separator.is_none() {
            return (body, None);
        }
        let window = Window::complete(body);
        let mut nesting = 0usize;
        let mut cursor = 0;
        while cursor < body.len() {
            if nesting == 0
                && let Probe::Hit(len) = window.probe(&self.default_separator, cursor)
            {
                return (&body[..cursor], Some(&body[cursor + len..]));
            }
            if nesting > 0
                && let Probe::Hit(len) = window.probe(&self.suffix, cursor)
            {
                nesting -= 1;
                cursor += len;
                continue;
            }
            if let Probe::Hit(len) = window.probe(&self.prefix, cursor) {
                nesting += 1;
                cursor += len;
                continue;
            }
            cursor += 1;
        }
        (body, None)
    }

    /// Resolve one expression body and append its replacement.
    fn resolve(
        &self,
        body: &[char],
        raw: &[char],
        out: &mut String,
        trail: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), SubstError> {
        let (key, default) = self.split_default(body);
        let key = if self.substitute_in_keys {
            self.nested(key, trail, depth)?
        } else {
            key.iter().collect()
        };
        if trail.contains(&key) {
            let mut cycle = trail.clone();
            cycle.push(key);
            return Err(self.recursion_limit(&cycle));
        }

        let value = match self.lookup.lookup(&key) {
            Ok(value) => value,
            Err(source) => return Err(SubstError::Lookup { key, source }),
        };

        match (value, default) {
            (Some(value), _) => {
                tracing::trace!(key = %key, "Resolved placeholder");
                if !self.substitute_in_values {
                    out.push_str(&value);
                    return Ok(());
                }
                let value: Vec<char> = value.chars().collect();
                trail.push(key);
                let expanded = self.nested(&value, trail, depth);
                trail.pop();
                out.push_str(&expanded?);
            }
            (None, Some(default)) => {
                tracing::trace!(key = %key, "Using default value");
                out.push_str(&self.nested(default, trail, depth)?);
            }
            (None, None) if self.fail_on_undefined => {
                return Err(SubstError::Undefined { key });
            }
            (None, None) => {
                tracing::debug!(key = %key, "Unresolved placeholder passed through");
                out.extend(raw);
            }
        }
        Ok(())
    }

    /// Substitute `text` one level deeper.
    fn nested(
        &self,
        text: &[char],
        trail: &mut Vec<String>,
        depth: usize,
    ) -> Result<String, SubstError> {
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(self.recursion_limit(trail));
        }
        self.substitute_all(text, trail, depth)
    }

    fn recursion_limit(&self, trail: &[String]) -> SubstError {
        let chain = trail.join(" -> ");
        tracing::warn!(max_depth = self.max_depth, chain = %chain, "Recursion limit exceeded");
        SubstError::RecursionLimit {
            max_depth: self.max_depth,
            chain,
        }
    }
}

impl Default for Substitutor {
    fn default() -> Self {
        Self::new(null_lookup())
    }
}

impl fmt::Debug for Substitutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Substitutor")
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("escape", &self.escape)
            .field("default_separator", &self.default_separator)
            .field("max_depth", &self.max_depth)
            .field("substitute_in_keys", &self.substitute_in_keys)
            .field("substitute_in_values", &self.substitute_in_values)
            .field("preserve_escapes", &self.preserve_escapes)
            .field("fail_on_undefined", &self.fail_on_undefined)
            .finish_non_exhaustive()
    }
}

/// Addressable part of the input for one scan.
struct Window<'a> {
    buffer: &'a [char],
    start: usize,
    end: usize,
    /// No input will follow `end`.
    at_eof: bool,
}

impl<'a> Window<'a> {
    fn complete(buffer: &'a [char]) -> Self {
        Self {
            buffer,
            start: 0,
            end: buffer.len(),
            at_eof: true,
        }
    }

    /// Try `matcher` at `at`, reporting when the answer depends on unread input.
    fn probe(&self, matcher: &Matcher, at: usize) -> Probe {
        let size = matcher.size();
        if size == 0 {
            return Probe::Miss;
        }
        if self.end.saturating_sub(at) < size {
            return if self.at_eof {
                Probe::Miss
            } else {
                Probe::Starved
            };
        }
        match matcher.match_at(self.buffer, at, self.start, self.end) {
            0 => Probe::Miss,
            len => Probe::Hit(len),
        }
    }
}

enum Probe {
    Hit(usize),
    Miss,
    Starved,
}

enum Token {
    Text,
    Escaped { escape: usize, prefix: usize },
    Open(usize),
    Starved,
}

enum Scan {
    Closed { close: usize, end: usize },
    Unterminated,
    Starved { cursor: usize, nesting: usize },
}
