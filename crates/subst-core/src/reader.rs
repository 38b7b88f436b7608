//! Streaming substitution over an [`io::Read`] source.
//!
//! [`SubstitutingReader`] pulls UTF-8 bytes from its source, feeds the
//! decoded characters through [`Substitutor::substitute_next_with`] and hands
//! out the result. Only two things are held in memory: characters that cannot
//! be decided yet (a partial prefix or an open placeholder) and output the
//! caller has not collected. An open placeholder is scanned once, however many
//! reads it spans.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};

use crate::{ScanState, Substitutor};

/// Bytes requested from the source per read.
const READ_CHUNK: usize = 8 * 1024;

/// Incremental reader yielding substituted text.
///
/// The output is identical to [`Substitutor::replace`] on the whole input,
/// regardless of how the source splits its data or how large the caller's
/// read requests are.
///
/// Any failure (source I/O, invalid UTF-8, substitution error) closes the
/// reader; later reads fail.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use std::io::Read;
/// use std::sync::Arc;
/// use subst_core::{SubstitutingReader, Substitutor};
///
/// let vars = HashMap::from([("user".to_owned(), "ada".to_owned())]);
/// let subst = Substitutor::new(Arc::new(vars));
///
/// let mut reader = SubstitutingReader::new("home=/home/${user}".as_bytes(), subst);
/// let mut out = String::new();
/// reader.read_to_string(&mut out).unwrap();
/// assert_eq!(out, "home=/home/ada");
/// ```
pub struct SubstitutingReader<R> {
    source: Option<R>,
    substitutor: Substitutor,
    /// Decoded input not yet consumed by the engine.
    pending: Vec<char>,
    /// Substituted output not yet delivered.
    ready: VecDeque<char>,
    /// Tail bytes of a character only partly copied by [`Read::read`].
    carry: VecDeque<u8>,
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    undecoded: Vec<u8>,
    /// Failure hit after part of a request was already delivered.
    deferred: Option<io::Error>,
    /// How far the placeholder at the start of `pending` has been scanned.
    scan: ScanState,
    eof: bool,
}

impl<R: Read> SubstitutingReader<R> {
    /// Wrap `source`.
    pub fn new(source: R, substitutor: Substitutor) -> Self {
        Self {
            source: Some(source),
            substitutor,
            pending: Vec::new(),
            ready: VecDeque::new(),
            carry: VecDeque::new(),
            undecoded: Vec::new(),
            deferred: None,
            scan: ScanState::default(),
            eof: false,
        }
    }

    /// Read one substituted character. `None` at end of stream.
    pub fn read_char(&mut self) -> io::Result<Option<char>> {
        self.ensure_open()?;
        if !self.carry.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "character partially consumed by a byte read",
            ));
        }
        if !self.fill()? {
            return Ok(None);
        }
        Ok(self.ready.pop_front())
    }

    /// Fill `buf` with substituted characters.
    ///
    /// Returns the number written, `Some(0)` for an empty `buf` (no input is
    /// consumed) and `None` at end of stream.
    pub fn read_chars(&mut self, buf: &mut [char]) -> io::Result<Option<usize>> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(Some(0));
        }
        if !self.carry.is_empty() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "character partially consumed by a byte read",
            ));
        }

        let mut written = 0;
        while written < buf.len() && self.fill_or_defer(written > 0)? {
            let n = (buf.len() - written).min(self.ready.len());
            for (slot, ch) in buf[written..written + n].iter_mut().zip(self.ready.drain(..n)) {
                *slot = ch;
            }
            written += n;
        }
        Ok((written > 0).then_some(written))
    }

    /// Release the source and drop all buffered data.
    pub fn close(&mut self) {
        self.source = None;
        self.pending.clear();
        self.ready.clear();
        self.carry.clear();
        self.undecoded.clear();
        self.scan = ScanState::default();
    }

    /// Whether the reader has been closed.
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    /// Unwrap the source. `None` if the reader was closed.
    pub fn into_inner(self) -> Option<R> {
        self.source
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if self.is_closed() {
            return Err(io::Error::other("reader is closed"));
        }
        Ok(())
    }

    /// Make sure `ready` holds output. Returns `false` at end of stream.
    fn fill(&mut self) -> io::Result<bool> {
        while self.ready.is_empty() {
            if !self.pending.is_empty() && self.advance()? {
                continue;
            }
            if self.eof {
                return Ok(false);
            }
            self.read_source()?;
        }
        Ok(true)
    }

    /// Like [`fill`](Self::fill), but once part of a request has been
    /// delivered a failure is held back for the next call.
    fn fill_or_defer(&mut self, delivered: bool) -> io::Result<bool> {
        match self.fill() {
            Err(err) if delivered => {
                self.deferred = Some(err);
                Ok(false)
            }
            other => other,
        }
    }

    /// Run the engine over `pending`. Returns whether any input was consumed.
    fn advance(&mut self) -> io::Result<bool> {
        let mut out = String::new();
        let step = self.substitutor.substitute_next_with(
            &self.pending,
            0,
            self.pending.len(),
            self.eof,
            &mut out,
            &mut self.scan,
        );
        match step {
            Ok(Some(progress)) => {
                self.pending.drain(..progress.next);
                self.scan = ScanState::default();
                self.ready.extend(out.chars());
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                self.close();
                Err(io::Error::new(ErrorKind::InvalidData, err))
            }
        }
    }

    /// Pull the next chunk from the source into `pending`.
    fn read_source(&mut self) -> io::Result<()> {
        let Some(source) = self.source.as_mut() else {
            return Err(io::Error::other("reader is closed"));
        };

        let mut chunk = [0u8; READ_CHUNK];
        let read = loop {
            match source.read(&mut chunk) {
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                other => break other,
            }
        };
        let n = match read {
            Ok(n) => n,
            Err(err) => {
                self.close();
                return Err(err);
            }
        };

        if n == 0 {
            self.eof = true;
            if !self.undecoded.is_empty() {
                self.close();
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    "stream ended inside a UTF-8 sequence",
                ));
            }
            return Ok(());
        }

        self.undecoded.extend_from_slice(&chunk[..n]);
        self.decode()
    }

    /// Move complete characters from `undecoded` to `pending`.
    fn decode(&mut self) -> io::Result<()> {
        let valid = match std::str::from_utf8(&self.undecoded) {
            Ok(_) => self.undecoded.len(),
            // Incomplete sequence at the end: keep it for the next chunk.
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(err) => {
                self.close();
                return Err(io::Error::new(ErrorKind::InvalidData, err));
            }
        };
        let text = std::str::from_utf8(&self.undecoded[..valid])
            .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?;
        self.pending.extend(text.chars());
        self.undecoded.drain(..valid);
        Ok(())
    }
}

impl<R: Read> Read for SubstitutingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        let mut written = 0;
        while written < buf.len() {
            if let Some(byte) = self.carry.pop_front() {
                buf[written] = byte;
                written += 1;
                continue;
            }
            if !self.fill_or_defer(written > 0)? {
                break;
            }
            let Some(ch) = self.ready.pop_front() else {
                break;
            };
            let mut encoded = [0u8; 4];
            let bytes = ch.encode_utf8(&mut encoded).as_bytes();
            let room = buf.len() - written;
            if bytes.len() <= room {
                buf[written..written + bytes.len()].copy_from_slice(bytes);
                written += bytes.len();
            } else {
                buf[written..].copy_from_slice(&bytes[..room]);
                self.carry.extend(&bytes[room..]);
                written = buf.len();
            }
        }
        Ok(written)
    }
}
