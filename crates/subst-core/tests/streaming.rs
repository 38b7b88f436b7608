//! Streaming output must match whole-buffer substitution for every chunking.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use subst_core::{Matcher, SubstitutingReader, Substitutor};

/// Source returning at most `size` bytes per read.
struct Chunked<'a> {
    data: &'a [u8],
    size: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.size.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn default_substitutor() -> Substitutor {
    let vars = HashMap::from([
        ("name".to_owned(), "world".to_owned()),
        ("inner".to_owned(), "X".to_owned()),
        ("outerX".to_owned(), "Y".to_owned()),
        ("greeting".to_owned(), "Hello, ${name}".to_owned()),
        ("empty".to_owned(), String::new()),
        ("名前".to_owned(), "世界".to_owned()),
    ]);
    Substitutor::new(Arc::new(vars))
}

const INPUTS: &[&str] = &[
    "",
    "plain text without placeholders",
    "${name}",
    "Hi ${name}, ${greeting}!",
    "${outer${inner}}",
    "${missing:-fallback} and ${missing}",
    "$${name} vs ${name} vs $$${name}",
    "trailing dollar $",
    "trailing prefix ${",
    "unterminated ${name and more text",
    "nested unterminated ${a ${name}",
    "${empty}${empty}|${empty:-x}",
    "${missing:-${name:-none}}",
    "$$$$ {} }{ ${}",
    "こんにちは、${名前}！ ${名前:-誰}",
];

fn stream(subst: &Substitutor, input: &str, chunk: usize) -> String {
    let source = Chunked {
        data: input.as_bytes(),
        size: chunk,
    };
    let mut reader = SubstitutingReader::new(source, subst.clone());
    let mut out = String::new();
    reader.read_to_string(&mut out).unwrap();
    out
}

#[test]
fn test_every_chunk_size_matches_whole_buffer() {
    let subst = default_substitutor();
    for input in INPUTS {
        let expected = subst.replace(input).unwrap();
        for chunk in 1..=input.len() + 1 {
            assert_eq!(
                stream(&subst, input, chunk),
                expected,
                "input {input:?} with chunk size {chunk}"
            );
        }
    }
}

#[test]
fn test_custom_delimiters_under_chunking() {
    let vars = HashMap::from([("user".to_owned(), "ada".to_owned())]);
    let subst = Substitutor::new(Arc::new(vars))
        .with_prefix("{{")
        .with_suffix("}}")
        .with_escape('\\')
        .with_default_separator(Matcher::string("||"));
    let input = "{{user}} \\{{user}} {{nobody||guest}} {{user} }} {{";
    let expected = subst.replace(input).unwrap();
    assert_eq!(expected, "ada {{user}} guest {{user} }} {{");
    for chunk in 1..=input.len() + 1 {
        assert_eq!(stream(&subst, input, chunk), expected, "chunk size {chunk}");
    }
}

#[test]
fn test_every_request_size_matches_whole_buffer() {
    let subst = default_substitutor();
    let input = "Hi ${name}, ${greeting}! ${outer${inner}} $${x} ${名前}";
    let expected: Vec<char> = subst.replace(input).unwrap().chars().collect();

    for request in 1..=expected.len() + 1 {
        for chunk in [1, 3, 7, input.len()] {
            let source = Chunked {
                data: input.as_bytes(),
                size: chunk,
            };
            let mut reader = SubstitutingReader::new(source, subst.clone());
            let mut buf = vec!['\0'; request];
            let mut got = Vec::new();
            while let Some(n) = reader.read_chars(&mut buf).unwrap() {
                assert!(n > 0);
                got.extend_from_slice(&buf[..n]);
            }
            assert_eq!(got, expected, "request {request}, chunk {chunk}");
        }
    }
}

#[test]
fn test_byte_reads_of_every_size() {
    let subst = default_substitutor();
    let input = "${名前} and ${name}";
    let expected = subst.replace(input).unwrap();

    for request in 1..=8 {
        let mut reader = SubstitutingReader::new(input.as_bytes(), subst.clone());
        let mut buf = vec![0u8; request];
        let mut bytes = Vec::new();
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&buf[..n]);
        }
        assert_eq!(String::from_utf8(bytes).unwrap(), expected, "request {request}");
    }
}

#[test]
fn test_long_placeholder_spanning_many_reads() {
    let key = "k".repeat(10_000);
    let vars = HashMap::from([(key.clone(), "found".to_owned())]);
    let subst = Substitutor::new(Arc::new(vars));
    let input = format!("<${{{key}}}>");
    assert_eq!(stream(&subst, &input, 13), "<found>");
}

#[test]
fn test_recursion_limit_under_streaming() {
    let vars = HashMap::from([("a".to_owned(), "${a}".to_owned())]);
    let subst = Substitutor::new(Arc::new(vars)).with_max_depth(3);
    let source = Chunked {
        data: b"x ${a} y",
        size: 2,
    };
    let mut reader = SubstitutingReader::new(source, subst);
    let mut out = String::new();
    assert!(reader.read_to_string(&mut out).is_err());
    assert!(reader.is_closed());
}

#[test]
fn test_multi_mib_unterminated_tail_streams_in_linear_time() {
    let subst = default_substitutor();
    let input = format!("x ${{{}", "k".repeat(4 * 1024 * 1024));

    let started = Instant::now();
    let expected = subst.replace(&input).unwrap();
    let whole = started.elapsed();

    let started = Instant::now();
    let streamed = stream(&subst, &input, 8 * 1024);
    let chunked = started.elapsed();

    assert_eq!(streamed.len(), expected.len());
    assert!(streamed == expected, "streamed output differs from replace");
    // Rescanning the open placeholder on every read blows far past this.
    let bound = whole.max(Duration::from_millis(100)) * 25;
    assert!(
        chunked < bound,
        "streaming took {chunked:?}, whole-buffer replace took {whole:?}"
    );
}
