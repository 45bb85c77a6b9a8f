//! Command requests and their arguments.

use std::io;

use bstr::{BStr, BString, ByteSlice};

use crate::{
    capabilities::{Capabilities, Capability},
    pair::{self, Pair},
    pktline::{self, Packet, Reader},
    Error, Terminator, WriteTo,
};

/// Well-known argument names of the `ls-refs` and `fetch` commands.
pub mod name {
    /// `ls-refs`: show the target of symbolic refs.
    pub const SYMREFS: &str = "symrefs";
    /// `ls-refs`: show peeled tags.
    pub const PEEL: &str = "peel";
    /// `ls-refs`: only list refs starting with the value. May be given more than once.
    pub const REF_PREFIX: &str = "ref-prefix";
    /// `ls-refs`: list `HEAD` even if it points to an unborn branch.
    pub const UNBORN: &str = "unborn";

    /// `fetch`: an object the client wants.
    pub const WANT: &str = "want";
    /// `fetch`: an object the client has.
    pub const HAVE: &str = "have";
    /// `fetch`: end negotiation and send the pack.
    pub const DONE: &str = "done";
    /// `fetch`: deltas may reference objects outside of the pack.
    pub const THIN_PACK: &str = "thin-pack";
    /// `fetch`: don't send progress on side-band channel 2.
    pub const NO_PROGRESS: &str = "no-progress";
    /// `fetch`: send annotated tags pointing to objects in the pack.
    pub const INCLUDE_TAG: &str = "include-tag";
    /// `fetch`: the client understands offset deltas.
    pub const OFS_DELTA: &str = "ofs-delta";
    /// `fetch`: a commit the client only has a shallow copy of.
    pub const SHALLOW: &str = "shallow";
    /// `fetch`: limit history to the given depth.
    pub const DEEPEN: &str = "deepen";
    /// `fetch`: the depth is relative to the current shallow boundary.
    pub const DEEPEN_RELATIVE: &str = "deepen-relative";
    /// `fetch`: limit history to commits after the given time.
    pub const DEEPEN_SINCE: &str = "deepen-since";
    /// `fetch`: exclude history reachable from the given revision.
    pub const DEEPEN_NOT: &str = "deepen-not";
    /// `fetch`: omit objects matching a filter-spec.
    pub const FILTER: &str = "filter";
    /// `fetch`: a ref the client wants, by full name.
    pub const WANT_REF: &str = "want-ref";
    /// `fetch`: multiplex the entire response, not only the packfile section.
    pub const SIDEBAND_ALL: &str = "sideband-all";
    /// `fetch`: URI protocols the client can download parts of the pack from.
    pub const PACKFILE_URIS: &str = "packfile-uris";
    /// `fetch`: never send `ready`, wait for `done` instead.
    pub const WAIT_FOR_DONE: &str = "wait-for-done";
}

/// A command argument in the form `key[ value]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Argument {
    /// The name of the argument.
    pub key: BString,
    /// The value of the argument, never empty if set.
    pub value: Option<BString>,
}

impl Argument {
    /// An argument without value.
    pub fn new(key: impl Into<BString>) -> Self {
        Argument {
            key: key.into(),
            value: None,
        }
    }

    /// Set the value of this argument.
    pub fn with_value(mut self, value: impl Into<BString>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Decode an argument from `line`. A single trailing line-feed is ignored.
    pub fn from_line(line: &[u8]) -> Result<Self, Error> {
        <Self as Pair>::from_line(line)
    }
}

impl Pair for Argument {
    const SEPARATOR: u8 = b' ';
    const NEWLINE: bool = false;
    const WHAT: &'static str = "argument";

    fn from_parts(key: BString, value: Option<BString>) -> Self {
        Argument { key, value }
    }

    fn key(&self) -> &BStr {
        self.key.as_bstr()
    }

    fn value(&self) -> Option<&BStr> {
        self.value.as_ref().map(|v| v.as_bstr())
    }
}

impl WriteTo for Argument {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        pair::write_pair(self, out)
    }
}

impl std::fmt::Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.as_ref().filter(|v| !v.is_empty()) {
            Some(value) => write!(f, "{} {}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

/// The arguments of a command request.
pub type Arguments = pair::List<Argument>;

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<")?;
        for (idx, argument) in self.iter().enumerate() {
            if idx != 0 {
                f.write_str(",")?;
            }
            write!(f, "{argument}")?;
        }
        f.write_str(">")
    }
}

const COMMAND_PREFIX: &[u8] = b"command=";

/// A request to run `command` on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandRequest {
    /// The name of the command, like `ls-refs`.
    pub command: BString,
    /// Capabilities in effect for this request, like `agent` or `object-format`.
    pub capabilities: Capabilities,
    /// Command specific arguments.
    pub arguments: Arguments,
}

impl CommandRequest {
    /// A request for `command` without capabilities or arguments.
    pub fn new(command: impl Into<BString>) -> Self {
        CommandRequest {
            command: command.into(),
            capabilities: Capabilities::new(),
            arguments: Arguments::new(),
        }
    }

    /// Add `capability` to the request.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Add `argument` to the request.
    pub fn with_argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Decode a request, consuming everything up to and including its flush packet.
    pub fn read_from<R: io::Read>(reader: &mut Reader<R>) -> Result<Self, Error> {
        let command = match reader.read()? {
            Packet::Data(line) | Packet::Progress(line) => parse_command(line)?,
            Packet::Flush => return Err(Error::unexpected(Terminator::Flush, "command request")),
            Packet::Delimiter => return Err(Error::unexpected(Terminator::Delimiter, "command request")),
            Packet::ResponseEnd => return Err(Error::unexpected(Terminator::ResponseEnd, "command request")),
        };
        let (capabilities, terminator) = Capabilities::read_from(reader)?;
        if terminator != Terminator::Delimiter {
            return Err(Error::unexpected(terminator, "capability list of command request"));
        }
        let (arguments, terminator) = Arguments::read_from(reader)?;
        if terminator != Terminator::Flush {
            return Err(Error::unexpected(terminator, "arguments of command request"));
        }
        tracing::debug!(
            command = %command,
            capabilities = capabilities.len(),
            arguments = arguments.len(),
            "decoded command request"
        );
        Ok(CommandRequest {
            command,
            capabilities,
            arguments,
        })
    }
}

fn parse_command(line: &[u8]) -> Result<BString, Error> {
    line.strip_prefix(COMMAND_PREFIX)
        .and_then(|rest| rest.strip_suffix(b"\n"))
        .filter(|name| !name.is_empty())
        .map(|name| name.as_bstr().to_owned())
        .ok_or_else(|| Error::malformed("command-request", line))
}

impl WriteTo for CommandRequest {
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        let mut line = Vec::with_capacity(COMMAND_PREFIX.len() + self.command.len() + 1);
        line.extend_from_slice(COMMAND_PREFIX);
        line.extend_from_slice(&self.command);
        line.push(b'\n');
        pktline::write_data(&line, out)?;
        self.capabilities.write_to(out)?;
        pktline::write_delimiter(out)?;
        self.arguments.write_to(out)?;
        pktline::write_flush(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_without_and_with_value() {
        assert_eq!(Argument::from_line(b"key").unwrap(), Argument::new("key"));
        assert_eq!(
            Argument::from_line(b"key value").unwrap(),
            Argument::new("key").with_value("value")
        );
    }

    #[test]
    fn argument_with_empty_key_is_malformed() {
        let err = Argument::from_line(b" value").unwrap_err();
        assert_eq!(err.to_string(), r#"invalid argument: " value""#);
    }

    #[test]
    fn argument_with_trailing_separator_is_malformed() {
        assert!(Argument::from_line(b"key ").is_err());
    }

    #[test]
    fn argument_tolerates_one_trailing_newline() {
        assert_eq!(
            Argument::from_line(b"want 1234\n").unwrap(),
            Argument::new("want").with_value("1234")
        );
        assert_eq!(Argument::from_line(b"done\n").unwrap(), Argument::new("done"));
    }

    #[test]
    fn arguments_are_written_without_newline() {
        assert_eq!(
            Argument::new("ref-prefix").with_value("refs/heads/").to_bytes().unwrap(),
            b"001aref-prefix refs/heads/"
        );
    }

    #[test]
    fn arguments_display() {
        let args: Arguments = vec![Argument::new("peel"), Argument::new("ref-prefix").with_value("HEAD")].into();
        assert_eq!(args.to_string(), "<peel,ref-prefix HEAD>");
        assert_eq!(Arguments::new().to_string(), "<>");
    }

    #[test]
    fn command_line_is_validated() {
        for line in [&b"comand=ls-refs\n"[..], &b"command=ls-refs"[..], &b"command=\n"[..]] {
            let err = parse_command(line).unwrap_err();
            assert!(
                matches!(err, Error::MalformedLine { what: "command-request", .. }),
                "{line:?}"
            );
        }
        assert_eq!(parse_command(b"command=fetch\n").unwrap(), "fetch");
    }
}
