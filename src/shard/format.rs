//! Decoding and validation of shard assets.
//!
//! A shard arrives either as the generator's script output
//! (`var searchData = [ ... ];` with single-quoted strings) or as a bare JSON
//! array. Both are normalized to JSON text, decoded record by record into
//! [`Record`] values, and validated before the shard is handed out.

use super::{Shard, ShardId};
use crate::error::ShardLoadError;
use crate::types::{Occurrence, Record};
use regex::Regex;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Leading `var searchData =` (or `let`/`const`) of a script shard.
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:var|let|const)\s+[A-Za-z_$][A-Za-z0-9_$]*\s*=\s*")
        .unwrap_or_else(|e| unreachable!("assignment pattern is valid: {e}"))
});

/// Parse and validate a shard from its raw text.
pub(crate) fn parse_shard(id: &ShardId, text: &str) -> Result<Shard, ShardLoadError> {
    let fingerprint = xxhash_rust::xxh3::xxh3_64(text.as_bytes());

    let json = script_to_json(text).map_err(|message| ShardLoadError::Syntax {
        shard: id.clone(),
        message,
    })?;

    let values: Vec<serde_json::Value> =
        serde_json::from_str(&json).map_err(|e| ShardLoadError::Syntax {
            shard: id.clone(),
            message: e.to_string(),
        })?;

    let mut records: Vec<Arc<Record>> = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        let raw = RawRecord::deserialize(value).map_err(|e| ShardLoadError::Shape {
            shard: id.clone(),
            position,
            message: e.to_string(),
        })?;
        let record = raw.into_record();
        validate(id, position, &record, records.last().map(|r| r.token()))?;
        records.push(Arc::new(record));
    }

    Ok(Shard {
        id: id.clone(),
        records,
        fingerprint,
    })
}

/// Check one record against the shard invariants, given the token before it.
fn validate(
    id: &ShardId,
    position: usize,
    record: &Record,
    previous: Option<&str>,
) -> Result<(), ShardLoadError> {
    let token = record.token();
    if token.is_empty() {
        return Err(ShardLoadError::EmptyToken {
            shard: id.clone(),
            position,
        });
    }
    if token.chars().any(char::is_uppercase) {
        return Err(ShardLoadError::UppercaseToken {
            shard: id.clone(),
            position,
            token: token.to_string(),
        });
    }
    if record.occurrences().is_empty() {
        return Err(ShardLoadError::NoOccurrences {
            shard: id.clone(),
            position,
            token: token.to_string(),
        });
    }
    if let Some(previous) = previous {
        match previous.cmp(token) {
            Ordering::Less => {}
            Ordering::Equal => {
                return Err(ShardLoadError::DuplicateToken {
                    shard: id.clone(),
                    position,
                    token: token.to_string(),
                });
            }
            Ordering::Greater => {
                return Err(ShardLoadError::Unsorted {
                    shard: id.clone(),
                    position,
                    previous: previous.to_string(),
                    token: token.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Convert a script shard into JSON text.
///
/// Strips the variable assignment and trailing semicolon, then rewrites every
/// string literal (single- or double-quoted, with JS escapes) as a JSON string.
/// Input that is already plain JSON passes through unchanged.
fn script_to_json(text: &str) -> Result<Cow<'_, str>, String> {
    let text = text.trim_start_matches('\u{feff}');
    let body = match ASSIGNMENT.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    let body = body.trim_end().trim_end_matches(';').trim();

    if !body.contains('\'') && !body.contains('\\') {
        return Ok(Cow::Borrowed(body));
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' || c == '"' {
            let literal = read_string(&mut chars, c)?;
            out.push_str(&serde_json::to_string(&literal).map_err(|e| e.to_string())?);
        } else {
            out.push(c);
        }
    }
    Ok(Cow::Owned(out))
}

/// Read a JS string literal body up to the closing `quote`, decoding escapes.
fn read_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Result<String, String> {
    let mut value = String::new();
    loop {
        let c = chars.next().ok_or("unterminated string literal")?;
        match c {
            c if c == quote => return Ok(value),
            '\\' => {
                let escaped = chars.next().ok_or("unterminated escape sequence")?;
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    'v' => value.push('\u{b}'),
                    '0' => value.push('\0'),
                    'x' => value.push(read_hex_char(chars, 2)?),
                    'u' => value.push(read_unicode_escape(chars)?),
                    // line continuation
                    '\n' => {}
                    other => value.push(other),
                }
            }
            '\n' => return Err("newline inside string literal".to_string()),
            c => value.push(c),
        }
    }
}

fn read_hex_digits(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    len: usize,
) -> Result<u32, String> {
    let digits: String = chars.by_ref().take(len).collect();
    if digits.len() != len {
        return Err("truncated hex escape".to_string());
    }
    // from_str_radix would also take a sign
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid hex escape '{digits}'"));
    }
    u32::from_str_radix(&digits, 16).map_err(|_| format!("invalid hex escape '{digits}'"))
}

fn read_hex_char(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    len: usize,
) -> Result<char, String> {
    let code = read_hex_digits(chars, len)?;
    char::from_u32(code).ok_or_else(|| format!("invalid character code {code:#x}"))
}

/// Decode `\uXXXX`, combining a UTF-16 surrogate pair when one follows.
fn read_unicode_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<char, String> {
    let high = read_hex_digits(chars, 4)?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high).ok_or_else(|| format!("lone surrogate {high:#x}"));
    }
    if chars.next() != Some('\\') || chars.next() != Some('u') {
        return Err(format!("unpaired surrogate {high:#x}"));
    }
    let low = read_hex_digits(chars, 4)?;
    if !(0xDC00..0xE000).contains(&low) {
        return Err(format!("invalid low surrogate {low:#x}"));
    }
    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
    char::from_u32(code).ok_or_else(|| format!("invalid character code {code:#x}"))
}

/// A record as it appears on disk, before validation.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecord {
    /// `[token, displayName, occurrences]`
    Flat(String, String, RawOccurrences),
    /// `[token, [displayName, [url, flag, scope], ...]]`
    Native(String, NativeEntry),
}

/// Single-pair and sequence-of-pairs occurrence shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOccurrences {
    One(RawPair),
    Many(Vec<RawPair>),
}

#[derive(Deserialize)]
struct RawPair(String, String);

#[derive(Deserialize)]
struct NativeLink(String, i64, String);

struct NativeEntry {
    display_name: String,
    links: Vec<NativeLink>,
}

impl<'de> Deserialize<'de> for NativeEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntryVisitor;

        impl<'de> Visitor<'de> for EntryVisitor {
            type Value = NativeEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("[displayName, [url, flag, scope], ...]")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let display_name: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let mut links = Vec::new();
                while let Some(link) = seq.next_element::<NativeLink>()? {
                    links.push(link);
                }
                Ok(NativeEntry {
                    display_name,
                    links,
                })
            }
        }

        deserializer.deserialize_seq(EntryVisitor)
    }
}

impl RawRecord {
    fn into_record(self) -> Record {
        match self {
            Self::Flat(token, display_name, occurrences) => {
                let occurrences = match occurrences {
                    RawOccurrences::One(pair) => vec![pair.into_occurrence()],
                    RawOccurrences::Many(pairs) => {
                        pairs.into_iter().map(RawPair::into_occurrence).collect()
                    }
                };
                Record::with_token(token, display_name, occurrences)
            }
            Self::Native(token, entry) => {
                let occurrences = entry
                    .links
                    .into_iter()
                    .map(|NativeLink(url, flag, scope)| Occurrence::new(url, scope).external(flag == 0))
                    .collect();
                Record::with_token(token, entry.display_name, occurrences)
            }
        }
    }
}

impl RawPair {
    fn into_occurrence(self) -> Occurrence {
        Occurrence::new(self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn id() -> ShardId {
        ShardId::new("functions", 0)
    }

    const NATIVE: &str = r"var searchData=
[
  ['add',['add',['../classabt_1_1LinkedHashSet.html#a2fb349304f262d7da51d9b960b4b5f50',1,'abt::LinkedHashSet::add()'],['../classabt_1_1RandomAccessSet.html#a614203405f1c27c578e2ed550e648a65',1,'abt::RandomAccessSet::add()']]],
  ['addalias',['addAlias',['../classoptions_1_1BaseOption.html#a3767ec7ada22b53b97e54705182ca170',1,'options::BaseOption']]]
];";

    #[test]
    fn test_parse_native_script() {
        let shard = parse_shard(&id(), NATIVE).unwrap();
        check!(shard.records.len() == 2);

        let add = &shard.records[0];
        check!(add.token() == "add");
        check!(add.display_name() == "add");
        check!(add.occurrences().len() == 2);
        check!(&*add.occurrences()[1].qualified_name == "abt::RandomAccessSet::add()");
        check!(!add.occurrences()[0].external);

        check!(shard.records[1].display_name() == "addAlias");
    }

    #[test]
    fn test_native_link_flag_marks_external_pages() {
        let text = "var searchData=[['a',['A',['in.html#1',1,'ns::In'],['out.html#2',0,'ns::Out']]]];";
        let shard = parse_shard(&id(), text).unwrap();
        let_assert!([internal, external] = shard.records[0].occurrences());
        check!(&*internal.url == "in.html#1");
        check!(!internal.external);
        check!(&*external.url == "out.html#2");
        check!(external.external);
    }

    #[test]
    fn test_parse_flat_json_with_both_occurrence_shapes() {
        let text = r#"[
            ["add", "add", [["a.html#1", "abt::LinkedHashSet::add"], ["b.html#2", "abt::RandomAccessSet::add"]]],
            ["addalias", "addAlias", ["c.html#3", "options::BaseOption"]]
        ]"#;
        let shard = parse_shard(&id(), text).unwrap();
        check!(shard.records[0].occurrences().len() == 2);
        check!(shard.records[1].occurrences().len() == 1);
        check!(&*shard.records[1].occurrences()[0].url == "c.html#3");
    }

    #[test]
    fn test_escaped_quotes_in_script_strings() {
        let text = r"var searchData=[['operator_27',['operator\'',['x.html#1',1,'ns::X::operator\'()']]]];";
        let shard = parse_shard(&id(), text).unwrap();
        check!(shard.records[0].display_name() == "operator'");
        check!(&*shard.records[0].occurrences()[0].qualified_name == "ns::X::operator'()");
    }

    #[rstest]
    #[case(r"'\u00e9'", "é")]
    #[case(r"'\ud83d\ude00'", "\u{1F600}")]
    #[case(r"'a\x41'", "aA")]
    #[case(r#"'say \"hi\"'"#, "say \"hi\"")]
    #[case(r"'back\\slash'", "back\\slash")]
    fn test_script_string_escapes(#[case] literal: &str, #[case] expected: &str) {
        let json = script_to_json(literal).unwrap();
        let decoded: String = serde_json::from_str(&json).unwrap();
        check!(decoded == expected);
    }

    #[test]
    fn test_plain_json_is_borrowed() {
        let_assert!(Ok(Cow::Borrowed(_)) = script_to_json(r#"[["a","A",["u","q"]]]"#));
    }

    #[rstest]
    #[case("var searchData=[['add", "unterminated")]
    #[case("not a table", "expected")]
    #[case("{\"a\": 1}", "invalid type")]
    #[case(r"var searchData=[['\x+1',['a',['u',1,'q']]]];", "invalid hex escape")]
    #[case(r"var searchData=[['\u-0041',['a',['u',1,'q']]]];", "invalid hex escape")]
    fn test_syntax_errors(#[case] text: &str, #[case] needle: &str) {
        let_assert!(Err(ShardLoadError::Syntax { message, .. }) = parse_shard(&id(), text));
        check!(message.contains(needle), "message was: {}", message);
    }

    #[rstest]
    #[case(r#"[["add", "add"]]"#)]
    #[case(r#"[["add", "add", [["u"]]]]"#)]
    #[case(r#"[["add", 5, ["u", "q"]]]"#)]
    #[case(r#"[["add", "add", ["u", "q"], "extra"]]"#)]
    fn test_wrong_shape_is_rejected(#[case] text: &str) {
        let_assert!(Err(ShardLoadError::Shape { position, .. }) = parse_shard(&id(), text));
        check!(position == 0);
    }

    #[test]
    fn test_unsorted_tokens_reject_whole_shard() {
        let text = r#"[
            ["add", "add", ["a", "x"]],
            ["agent", "Agent", ["b", "y"]],
            ["addalias", "addAlias", ["c", "z"]]
        ]"#;
        let_assert!(
            Err(ShardLoadError::Unsorted {
                position,
                previous,
                token,
                ..
            }) = parse_shard(&id(), text)
        );
        check!(position == 2);
        check!(previous == "agent");
        check!(token == "addalias");
    }

    #[test]
    fn test_duplicate_tokens_are_rejected() {
        let text = r#"[["add", "add", ["a", "x"]], ["add", "Add", ["b", "y"]]]"#;
        let_assert!(Err(ShardLoadError::DuplicateToken { position: 1, .. }) = parse_shard(&id(), text));
    }

    #[rstest]
    #[case(r#"[["", "x", ["a", "x"]]]"#)]
    #[case(r#"[["Add", "Add", ["a", "x"]]]"#)]
    #[case(r#"[["add", "add", []]]"#)]
    #[case("[['add',['add']]]")]
    fn test_invalid_records(#[case] text: &str) {
        let err = parse_shard(&id(), text).unwrap_err();
        check!(matches!(
            err,
            ShardLoadError::EmptyToken { .. }
                | ShardLoadError::UppercaseToken { .. }
                | ShardLoadError::NoOccurrences { .. }
        ));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = parse_shard(&id(), r#"[["a", "A", ["u", "q"]]]"#).unwrap();
        let b = parse_shard(&id(), r#"[["a", "A", ["u", "q2"]]]"#).unwrap();
        check!(a.fingerprint != b.fingerprint);
    }
}
