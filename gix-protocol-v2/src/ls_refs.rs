//! References as listed by the `ls-refs` command.

use std::{collections::HashMap, io};

use bstr::{BStr, BString, ByteSlice};

use crate::{
    pktline::{self, Packet, Reader},
    Error, Terminator, WriteTo,
};

/// Prefixes of well-known reference attributes.
pub mod attribute {
    /// The target of a symbolic ref, sent if `symrefs` was requested.
    pub const SYMREF_TARGET: &str = "symref-target:";
    /// The object a tag peels to, sent if `peel` was requested.
    pub const PEELED: &str = "peeled:";
}

/// The object id placeholder of a symbolic ref pointing to a branch that doesn't exist yet.
pub const UNBORN: &str = "unborn";

/// A single reference in the form `<oid> <name>[ <attribute>]*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reference {
    /// The hex object id, or `unborn`. Its syntax isn't validated.
    pub object_id: BString,
    /// The full name of the reference.
    pub name: BString,
    /// Attributes like `symref-target:refs/heads/main`, in wire order.
    pub attributes: Vec<BString>,
}

impl Reference {
    /// Decode a reference from `line`.
    ///
    /// This is lenient and accepts a missing name (`<oid> \n`) as well as empty attributes
    /// produced by consecutive spaces.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        let malformed = || Error::malformed("ref", line);
        let content = line.strip_suffix(b"\n").ok_or_else(malformed)?;
        let (object_id, rest) = content.split_once_str(" ").ok_or_else(malformed)?;
        let mut tokens = rest.split_str(" ");
        let name = tokens.next().unwrap_or_default();
        Ok(Reference {
            object_id: object_id.into(),
            name: name.into(),
            attributes: tokens.map(Into::into).collect(),
        })
    }

    /// Like [`from_line()`](Self::from_line()), but fail if the name is missing.
    pub fn from_line_strict(line: &[u8]) -> Result<Self, Error> {
        let reference = Self::from_line(line)?;
        if reference.name.is_empty() {
            return Err(Error::malformed("ref", line));
        }
        Ok(reference)
    }

    /// Return `true` if this is a symbolic ref to a branch without commits.
    pub fn is_unborn(&self) -> bool {
        self.object_id == UNBORN
    }

    /// The name of the ref this symbolic ref points to.
    pub fn symref_target(&self) -> Option<&BStr> {
        self.attribute(attribute::SYMREF_TARGET)
    }

    /// The object id this ref peels to.
    pub fn peeled(&self) -> Option<&BStr> {
        self.attribute(attribute::PEELED)
    }

    fn attribute(&self, prefix: &str) -> Option<&BStr> {
        self.attributes
            .iter()
            .find_map(|attr| attr.strip_prefix(prefix.as_bytes()))
            .map(ByteSlice::as_bstr)
    }
}

impl WriteTo for Reference {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let mut line = Vec::with_capacity(
            self.object_id.len()
                + 1
                + self.name.len()
                + self.attributes.iter().map(|a| a.len() + 1).sum::<usize>()
                + 1,
        );
        line.extend_from_slice(&self.object_id);
        line.push(b' ');
        line.extend_from_slice(&self.name);
        for attr in &self.attributes {
            line.push(b' ');
            line.extend_from_slice(attr);
        }
        line.push(b'\n');
        pktline::write_data(&line, out)
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.object_id, self.name)?;
        for attr in &self.attributes {
            write!(f, " {attr}")?;
        }
        Ok(())
    }
}

/// The response to `ls-refs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListReferencesResponse {
    /// All references in the order they were sent.
    pub references: Vec<Reference>,
}

impl ListReferencesResponse {
    /// Decode a response, consuming everything up to and including its flush packet.
    pub fn read_from<R: io::Read>(reader: &mut Reader<R>) -> Result<Self, Error> {
        let mut references = Vec::new();
        loop {
            match reader.read()? {
                Packet::Data(line) => references.push(Reference::from_line(line)?),
                Packet::Progress(_) => {}
                Packet::Flush => break,
                Packet::Delimiter => return Err(Error::unexpected(Terminator::Delimiter, "ls-refs response")),
                Packet::ResponseEnd => return Err(Error::unexpected(Terminator::ResponseEnd, "ls-refs response")),
            }
        }
        tracing::debug!(count = references.len(), "decoded ls-refs response");
        Ok(ListReferencesResponse { references })
    }

    /// Map reference names to their object ids. Later duplicates replace earlier ones.
    pub fn to_map(&self) -> HashMap<&BStr, &BStr> {
        self.references
            .iter()
            .map(|r| (r.name.as_bstr(), r.object_id.as_bstr()))
            .collect()
    }
}

impl WriteTo for ListReferencesResponse {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        for reference in &self.references {
            reference.write_to(out)?;
        }
        pktline::write_flush(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "808e50d724f604f69ab93c6da2919c014667bedb";

    #[test]
    fn reference_with_attributes() {
        let r = Reference::from_line(b"unborn HEAD symref-target:refs/heads/main\n").unwrap();
        assert!(r.is_unborn());
        assert_eq!(r.name, "HEAD");
        assert_eq!(r.symref_target().unwrap(), "refs/heads/main");
        assert_eq!(r.peeled(), None);
        assert_eq!(r.to_string(), "unborn HEAD symref-target:refs/heads/main");
    }

    #[test]
    fn peeled_tag() {
        let line = format!("{OID} refs/tags/v1.0 peeled:{OID}\n");
        let r = Reference::from_line(line.as_bytes()).unwrap();
        assert!(!r.is_unborn());
        assert_eq!(r.peeled().unwrap(), OID);
    }

    #[test]
    fn consecutive_spaces_yield_empty_attributes() {
        let r = Reference::from_line(b"abc refs/heads/x  peeled:def\n").unwrap();
        assert_eq!(r.attributes, vec![BString::from(""), BString::from("peeled:def")]);
        assert_eq!(r.to_bytes().unwrap(), b"0021abc refs/heads/x  peeled:def\n");
    }

    #[test]
    fn missing_name_is_tolerated_unless_strict() {
        let r = Reference::from_line(b"abc \n").unwrap();
        assert_eq!(r.name, "");
        assert!(r.attributes.is_empty());
        let err = Reference::from_line_strict(b"abc \n").unwrap_err();
        assert_eq!(err.kind(), crate::Kind::MalformedLine);
        assert!(Reference::from_line_strict(b"abc HEAD\n").is_ok());
    }

    #[test]
    fn missing_separator_or_newline_is_malformed() {
        for line in [&b"abc\n"[..], &b"abc HEAD"[..]] {
            let err = Reference::from_line(line).unwrap_err();
            assert!(matches!(err, Error::MalformedLine { what: "ref", .. }), "{line:?}");
        }
    }

    #[test]
    fn map_keeps_the_last_duplicate() {
        let response = ListReferencesResponse {
            references: vec![
                Reference::from_line(b"1 HEAD\n").unwrap(),
                Reference::from_line(b"2 HEAD\n").unwrap(),
            ],
        };
        let map = response.to_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[b"HEAD".as_bstr()], "2");
    }
}
