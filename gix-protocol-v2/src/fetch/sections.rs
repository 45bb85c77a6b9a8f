use std::io;

use bstr::{BString, ByteSlice};

use crate::{pktline, Error, WriteTo};

/// The sections of a fetch response, in the order they have to appear in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    /// `acknowledgments`
    Acknowledgements,
    /// `shallow-info`
    ShallowInfo,
    /// `wanted-refs`
    WantedRefs,
    /// `packfile-uris`
    PackfileUris,
    /// `packfile`
    Packfile,
}

impl Section {
    /// All sections in protocol order.
    pub const ALL: [Section; 5] = [
        Section::Acknowledgements,
        Section::ShallowInfo,
        Section::WantedRefs,
        Section::PackfileUris,
        Section::Packfile,
    ];

    /// The name of the section as used in its header line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Acknowledgements => "acknowledgments",
            Section::ShallowInfo => "shallow-info",
            Section::WantedRefs => "wanted-refs",
            Section::PackfileUris => "packfile-uris",
            Section::Packfile => "packfile",
        }
    }

    /// Identify the section whose header is `line`, which includes the line-feed.
    pub fn from_header(line: &[u8]) -> Option<Self> {
        let name = line.strip_suffix(b"\n")?;
        Self::ALL.into_iter().find(|section| section.as_str().as_bytes() == name)
    }

    pub(crate) fn write_header(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let mut line = Vec::with_capacity(self.as_str().len() + 1);
        line.extend_from_slice(self.as_str().as_bytes());
        line.push(b'\n');
        pktline::write_data(&line, out)
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn write_line(parts: &[&[u8]], out: &mut dyn io::Write) -> io::Result<()> {
    let mut line = Vec::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (idx, part) in parts.iter().enumerate() {
        if idx != 0 {
            line.push(b' ');
        }
        line.extend_from_slice(part);
    }
    line.push(b'\n');
    pktline::write_data(&line, out)
}

/// Split `<first> <second>\n` with both parts non-empty.
fn split_pair<'a>(what: &'static str, line: &'a [u8]) -> Result<(&'a [u8], &'a [u8]), Error> {
    line.strip_suffix(b"\n")
        .and_then(|content| content.split_once_str(" "))
        .filter(|(first, second)| !first.is_empty() && !second.is_empty())
        .ok_or_else(|| Error::malformed(what, line))
}

fn object_id_after<'a>(prefix: &[u8], what: &'static str, line: &'a [u8]) -> Result<&'a [u8], Error> {
    line.strip_suffix(b"\n")
        .and_then(|content| content.strip_prefix(prefix))
        .filter(|oid| !oid.is_empty())
        .ok_or_else(|| Error::malformed(what, line))
}

/// The outcome of negotiation so far.
///
/// Object ids aren't validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Acknowledgements {
    /// The server is ready to send a pack.
    pub ready: bool,
    /// The server found no common object.
    pub nak: bool,
    /// Object ids the server has in common with the client, in the order received.
    pub acks: Vec<BString>,
}

impl Acknowledgements {
    /// Consume one line of the section body.
    pub fn parse_line(&mut self, line: &[u8]) -> Result<(), Error> {
        match line {
            b"NAK\n" => self.nak = true,
            b"ready\n" => self.ready = true,
            _ => {
                let oid = object_id_after(b"ACK ", "ack", line)?;
                self.acks.push(oid.into());
            }
        }
        Ok(())
    }
}

impl WriteTo for Acknowledgements {
    /// Write the header and body, without terminator.
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        Section::Acknowledgements.write_header(out)?;
        if self.nak {
            pktline::write_data(b"NAK\n", out)?;
        }
        for oid in &self.acks {
            write_line(&[&b"ACK"[..], &oid[..]], out)?;
        }
        if self.ready {
            pktline::write_data(b"ready\n", out)?;
        }
        Ok(())
    }
}

/// A commit the client has to treat as shallow from now on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shallow {
    /// The commit id.
    pub object_id: BString,
}

/// A commit that isn't shallow anymore.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unshallow {
    /// The commit id.
    pub object_id: BString,
}

impl Shallow {
    /// Decode `shallow <oid>\n`.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        Ok(Shallow {
            object_id: object_id_after(b"shallow ", "shallow", line)?.into(),
        })
    }
}

impl Unshallow {
    /// Decode `unshallow <oid>\n`.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        Ok(Unshallow {
            object_id: object_id_after(b"unshallow ", "unshallow", line)?.into(),
        })
    }
}

impl WriteTo for Shallow {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        write_line(&[&b"shallow"[..], &self.object_id[..]], out)
    }
}

impl WriteTo for Unshallow {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        write_line(&[&b"unshallow"[..], &self.object_id[..]], out)
    }
}

/// Changes to the client's shallow boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShallowInfo {
    /// Commits that became shallow.
    pub shallow: Vec<Shallow>,
    /// Commits that are no longer shallow.
    pub unshallow: Vec<Unshallow>,
}

impl ShallowInfo {
    /// Consume one line of the section body.
    pub fn parse_line(&mut self, line: &[u8]) -> Result<(), Error> {
        if line.starts_with(b"shallow ") {
            self.shallow.push(Shallow::from_line(line)?);
        } else if line.starts_with(b"unshallow ") {
            self.unshallow.push(Unshallow::from_line(line)?);
        } else {
            return Err(Error::malformed("shallow-info", line));
        }
        Ok(())
    }
}

impl WriteTo for ShallowInfo {
    /// Write the header and body, without terminator. All `shallow` lines precede all `unshallow` lines.
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        Section::ShallowInfo.write_header(out)?;
        for shallow in &self.shallow {
            shallow.write_to(out)?;
        }
        for unshallow in &self.unshallow {
            unshallow.write_to(out)?;
        }
        Ok(())
    }
}

/// The object a ref requested with `want-ref` points to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WantedRef {
    /// The object id.
    pub object_id: BString,
    /// The full ref name.
    pub name: BString,
}

impl WantedRef {
    /// Decode `<oid> <name>\n`.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        let (object_id, name) = split_pair("wanted-ref", line)?;
        Ok(WantedRef {
            object_id: object_id.into(),
            name: name.into(),
        })
    }
}

impl WriteTo for WantedRef {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        write_line(&[&self.object_id[..], &self.name[..]], out)
    }
}

/// A part of the pack the client has to download separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackfileUri {
    /// The hash of the pack file at `uri`, at least 40 hex digits.
    pub checksum: BString,
    /// Where to download the pack from.
    pub uri: BString,
}

impl PackfileUri {
    /// Decode `<checksum> <uri>\n`.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        let (checksum, uri) = split_pair("packfile-uri", line)?;
        if checksum.len() < 40 || !checksum.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::malformed("packfile-uri", line));
        }
        Ok(PackfileUri {
            checksum: checksum.into(),
            uri: uri.into(),
        })
    }
}

impl WriteTo for PackfileUri {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        write_line(&[&self.checksum[..], &self.uri[..]], out)
    }
}

impl std::fmt::Display for PackfileUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.checksum, self.uri)
    }
}

pub(crate) fn write_list<T: WriteTo>(section: Section, items: &[T], out: &mut dyn io::Write) -> io::Result<()> {
    section.write_header(out)?;
    for item in items {
        item.write_to(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUM: &str = "f4a5cb6e2cbb0c7e9a7b7d4e3e0ebc1f1b2a2b8c";

    #[test]
    fn headers_are_matched_exactly() {
        assert_eq!(Section::from_header(b"acknowledgments\n"), Some(Section::Acknowledgements));
        assert_eq!(Section::from_header(b"packfile\n"), Some(Section::Packfile));
        assert_eq!(Section::from_header(b"packfile"), None);
        assert_eq!(Section::from_header(b"acknowledgements\n"), None);
    }

    #[test]
    fn acknowledgement_lines() {
        let mut acks = Acknowledgements::default();
        for line in [&b"ACK 1234\n"[..], &b"ready\n"[..], &b"ACK 5678\n"[..], &b"NAK\n"[..]] {
            acks.parse_line(line).unwrap();
        }
        assert!(acks.ready && acks.nak);
        assert_eq!(acks.acks, vec![BString::from("1234"), BString::from("5678")]);
        let err = acks.parse_line(b"ACK 1234").unwrap_err();
        assert_eq!(err.to_string(), r#"invalid ack: "ACK 1234""#);
        assert!(acks.parse_line(b"continue\n").is_err());
    }

    #[test]
    fn shallow_info_lines() {
        let mut info = ShallowInfo::default();
        info.parse_line(b"unshallow 1\n").unwrap();
        info.parse_line(b"shallow 2\n").unwrap();
        assert_eq!(info.shallow[0].object_id, "2");
        assert_eq!(info.unshallow[0].object_id, "1");
        assert!(info.parse_line(b"deepen 1\n").is_err());
        assert_eq!(
            info.to_bytes().unwrap(),
            b"0011shallow-info\n000eshallow 2\n0010unshallow 1\n"
        );
    }

    #[test]
    fn wanted_ref_needs_both_parts() {
        let r = WantedRef::from_line(b"1234 refs/heads/main\n").unwrap();
        assert_eq!(r.name, "refs/heads/main");
        assert!(WantedRef::from_line(b"1234\n").is_err());
        assert!(WantedRef::from_line(b" refs/heads/main\n").is_err());
    }

    #[test]
    fn packfile_uri_checksum_is_validated() {
        let line = format!("{CHECKSUM} https://example.com/pack\n");
        let uri = PackfileUri::from_line(line.as_bytes()).unwrap();
        assert_eq!(uri.to_string(), format!("{CHECKSUM} https://example.com/pack"));
        let short = format!("{} https://example.com/pack\n", &CHECKSUM[..39]);
        assert!(PackfileUri::from_line(short.as_bytes()).is_err());
        let not_hex = format!("{}z https://example.com/pack\n", &CHECKSUM[..40]);
        assert!(PackfileUri::from_line(not_hex.as_bytes()).is_err());
    }
}
