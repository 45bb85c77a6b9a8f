//! `key[<separator>value]` lines and ordered lists of them.
//!
//! Capabilities and command arguments share this shape and only differ in separator and line ending.

use std::io;

use bstr::{BStr, BString, ByteSlice};

use crate::{
    pktline::{self, Packet, Reader},
    Error, Terminator, WriteTo,
};

/// How a particular kind of pair looks on the wire.
pub trait Pair: Sized {
    /// The byte between key and value.
    const SEPARATOR: u8;
    /// Whether the line ends with a line-feed.
    const NEWLINE: bool;
    /// The grammar element name used in error messages.
    const WHAT: &'static str;

    /// Assemble a pair from already validated parts.
    fn from_parts(key: BString, value: Option<BString>) -> Self;
    /// The key, never empty once decoded.
    fn key(&self) -> &BStr;
    /// The value, if there is one.
    fn value(&self) -> Option<&BStr>;

    /// Decode a pair from the payload of a single pkt-line.
    fn from_line(line: &[u8]) -> Result<Self, Error> {
        let (key, value) = split::<Self>(line)?;
        Ok(Self::from_parts(key.into(), value.map(Into::into)))
    }
}

fn split<P: Pair>(line: &[u8]) -> Result<(&[u8], Option<&[u8]>), Error> {
    let content = if P::NEWLINE {
        line.strip_suffix(b"\n").ok_or_else(|| Error::malformed(P::WHAT, line))?
    } else {
        line.strip_suffix(b"\n").unwrap_or(line)
    };
    let (key, value) = match content.find_byte(P::SEPARATOR) {
        Some(pos) => (&content[..pos], Some(&content[pos + 1..])),
        None => (content, None),
    };
    if key.is_empty() || value.is_some_and(<[u8]>::is_empty) {
        return Err(Error::malformed(P::WHAT, line));
    }
    Ok((key, value))
}

/// Write `pair` as a single pkt-line. An empty value is written like no value.
pub(crate) fn write_pair<P: Pair>(pair: &P, out: &mut dyn io::Write) -> io::Result<()> {
    let key = pair.key();
    let value = pair.value().filter(|v| !v.is_empty());
    let mut line = Vec::with_capacity(key.len() + value.map_or(0, |v| v.len() + 1) + 1);
    line.extend_from_slice(key);
    if let Some(value) = value {
        line.push(P::SEPARATOR);
        line.extend_from_slice(value);
    }
    if P::NEWLINE {
        line.push(b'\n');
    }
    pktline::write_data(&line, out)
}

/// An ordered list of pairs, in wire order.
///
/// Lookups are linear and the first pair with a matching key wins.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
pub struct List<T> {
    items: Vec<T>,
}

impl<T> Default for List<T> {
    fn default() -> Self {
        List { items: Vec::new() }
    }
}

impl<T> List<T> {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item`.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Append `item` and return the list.
    pub fn with(mut self, item: T) -> Self {
        self.items.push(item);
        self
    }

    /// The pairs in wire order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// The amount of pairs.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Return `true` if there is no pair.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Pair> List<T> {
    /// The first pair named `key`.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&T> {
        let key = key.as_ref();
        self.items.iter().find(|item| item.key() == key)
    }

    /// The value of the first pair named `key`, if it has one.
    pub fn value(&self, key: impl AsRef<[u8]>) -> Option<&BStr> {
        self.get(key).and_then(T::value)
    }

    /// Return `true` if a pair named `key` is present.
    pub fn has(&self, key: impl AsRef<[u8]>) -> bool {
        self.get(key).is_some()
    }

    /// Decode pairs until the next terminator, and return them along with that terminator.
    ///
    /// The caller decides whether the terminator is the one its message expects.
    pub fn read_from<R: io::Read>(reader: &mut Reader<R>) -> Result<(Self, Terminator), Error> {
        let mut list = Self::new();
        let terminator = loop {
            match reader.read()? {
                Packet::Data(line) => list.items.push(T::from_line(line)?),
                Packet::Progress(_) => {}
                Packet::Flush => break Terminator::Flush,
                Packet::Delimiter => break Terminator::Delimiter,
                Packet::ResponseEnd => break Terminator::ResponseEnd,
            }
        };
        Ok((list, terminator))
    }
}

impl<T: Pair> WriteTo for List<T> {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for item in &self.items {
            write_pair(item, out)?;
        }
        Ok(())
    }
}

impl<T> From<Vec<T>> for List<T> {
    fn from(items: Vec<T>) -> Self {
        List { items }
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        List {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T> IntoIterator for List<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Colon(BString, Option<BString>);

    impl Pair for Colon {
        const SEPARATOR: u8 = b':';
        const NEWLINE: bool = true;
        const WHAT: &'static str = "colon pair";

        fn from_parts(key: BString, value: Option<BString>) -> Self {
            Colon(key, value)
        }
        fn key(&self) -> &BStr {
            self.0.as_bstr()
        }
        fn value(&self) -> Option<&BStr> {
            self.1.as_ref().map(|v| v.as_bstr())
        }
    }

    #[test]
    fn splits_at_the_first_separator_only() {
        let pair = Colon::from_line(b"a:b:c\n").unwrap();
        assert_eq!(pair, Colon("a".into(), Some("b:c".into())));
    }

    #[test]
    fn empty_key_or_empty_value_is_malformed() {
        for line in [&b":v\n"[..], &b"k:\n"[..], &b"\n"[..]] {
            let err = Colon::from_line(line).unwrap_err();
            assert!(matches!(err, Error::MalformedLine { what: "colon pair", .. }), "{line:?}");
        }
    }

    #[test]
    fn lookups_are_first_match_and_consistent() {
        let list: List<Colon> = vec![
            Colon("k".into(), Some("first".into())),
            Colon("flag".into(), None),
            Colon("k".into(), Some("second".into())),
        ]
        .into();
        assert_eq!(list.value("k").unwrap(), "first");
        assert!(list.has("flag"));
        assert_eq!(list.value("flag"), None);
        for key in ["k", "flag", "missing-key", "K"] {
            assert_eq!(list.has(key), list.get(key).is_some(), "{key}");
        }
    }

    #[test]
    fn reading_reports_the_terminator() {
        let mut rd = Reader::new(&b"0008a:b\n0006c\n0001"[..]);
        let (list, terminator) = List::<Colon>::read_from(&mut rd).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(terminator, Terminator::Delimiter);
        assert_eq!(list.to_bytes().unwrap(), b"0008a:b\n0006c\n");
    }
}
