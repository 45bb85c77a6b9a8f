//! Capabilities and the capability advertisement a server opens every exchange with.

use std::io;

use bstr::{BStr, BString, ByteSlice};

use crate::{
    pair::{self, Pair},
    pktline::{self, Packet, Reader},
    Error, Terminator, WriteTo,
};

/// Well-known capability names.
pub mod name {
    /// The implementation and version of the sender, like `git/2.45.0`. Informative only.
    pub const AGENT: &str = "agent";
    /// The server accepts `server-option=<option>` capabilities in requests.
    pub const SERVER_OPTION: &str = "server-option";
    /// The hash algorithm of object ids, `sha1` unless advertised otherwise.
    pub const OBJECT_FORMAT: &str = "object-format";
    /// An identifier of the process for tracing across requests.
    pub const SESSION_ID: &str = "session-id";
    /// The command listing references.
    pub const LS_REFS: &str = "ls-refs";
    /// The command negotiating and sending a packfile.
    pub const FETCH: &str = "fetch";
    /// The command retrieving information about objects without fetching them.
    pub const OBJECT_INFO: &str = "object-info";
}

/// A capability in the form `key[=value]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capability {
    /// The name of the capability.
    pub key: BString,
    /// The value of the capability, never empty if set.
    pub value: Option<BString>,
}

impl Capability {
    /// A capability without value.
    pub fn new(key: impl Into<BString>) -> Self {
        Capability {
            key: key.into(),
            value: None,
        }
    }

    /// Set the value of this capability.
    pub fn with_value(mut self, value: impl Into<BString>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Decode a capability from `line`, which must end in a line-feed.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        <Self as Pair>::from_line(line)
    }

    /// Parse `key[=value]` as typed by a user, without line-feed.
    pub fn from_spec(spec: &str) -> Result<Self, Error> {
        let mut line = BString::from(spec);
        line.push(b'\n');
        Self::from_line(&line)
    }
}

impl Pair for Capability {
    const SEPARATOR: u8 = b'=';
    const NEWLINE: bool = true;
    const WHAT: &'static str = "capability";

    fn from_parts(key: BString, value: Option<BString>) -> Self {
        Capability { key, value }
    }

    fn key(&self) -> &BStr {
        self.key.as_bstr()
    }

    fn value(&self) -> Option<&BStr> {
        self.value.as_ref().map(|v| v.as_bstr())
    }
}

impl WriteTo for Capability {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        pair::write_pair(self, out)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.as_ref().filter(|v| !v.is_empty()) {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// The capability-list of advertisements and command requests.
pub type Capabilities = pair::List<Capability>;

impl std::fmt::Display for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, capability) in self.iter().enumerate() {
            if idx != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{capability}")?;
        }
        Ok(())
    }
}

/// The line every advertisement starts with.
pub const VERSION_LINE: &[u8] = b"version 2\n";

/// What a server sends first: the protocol version followed by everything it supports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilityAdvertisement {
    /// All capabilities in the order they were advertised.
    pub capabilities: Capabilities,
}

impl CapabilityAdvertisement {
    /// Decode an advertisement, consuming everything up to and including its flush packet.
    pub fn read_from<R: io::Read>(reader: &mut Reader<R>) -> Result<Self, Error> {
        match reader.read()? {
            Packet::Data(line) if line == VERSION_LINE => {}
            Packet::Data(line) | Packet::Progress(line) => return Err(Error::malformed("protocol-version", line)),
            Packet::Flush => return Err(Error::unexpected(Terminator::Flush, "capability advertisement")),
            Packet::Delimiter => return Err(Error::unexpected(Terminator::Delimiter, "capability advertisement")),
            Packet::ResponseEnd => return Err(Error::unexpected(Terminator::ResponseEnd, "capability advertisement")),
        }
        let (capabilities, terminator) = Capabilities::read_from(reader)?;
        if terminator != Terminator::Flush {
            return Err(Error::unexpected(terminator, "capability advertisement"));
        }
        tracing::debug!(count = capabilities.len(), "decoded capability advertisement");
        Ok(CapabilityAdvertisement { capabilities })
    }

    /// The advertised agent string.
    pub fn agent(&self) -> Option<&BStr> {
        self.capabilities.value(name::AGENT)
    }

    /// The advertised hash algorithm, `sha1` if the server didn't say.
    pub fn object_format(&self) -> &BStr {
        self.capabilities
            .value(name::OBJECT_FORMAT)
            .unwrap_or_else(|| "sha1".into())
    }

    /// Return `true` if `command` (or any other capability) is advertised.
    pub fn supports(&self, command: &str) -> bool {
        self.capabilities.has(command)
    }

    /// The space-separated features of `command`, like `shallow` and `filter` in `fetch=shallow filter`.
    ///
    /// Returns `None` if the command isn't advertised at all.
    pub fn command_features(&self, command: &str) -> Option<impl Iterator<Item = &BStr> + '_> {
        let capability = self.capabilities.get(command)?;
        let features: &[u8] = capability.value.as_ref().map_or(&b""[..], |v| &v[..]);
        Some(
            features
                .split_str(" ")
                .filter(|feature| !feature.is_empty())
                .map(ByteSlice::as_bstr),
        )
    }
}

impl WriteTo for CapabilityAdvertisement {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        pktline::write_data(VERSION_LINE, out)?;
        self.capabilities.write_to(out)?;
        pktline::write_flush(out)
    }
}
