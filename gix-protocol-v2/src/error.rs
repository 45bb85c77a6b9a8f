//! The error type shared by every decoder and encoder in this crate.

use bstr::BString;

use crate::fetch::Section;

/// A zero-length pkt-line marker as it may appear in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// `0000`, ends a message.
    Flush,
    /// `0001`, ends a section within a message.
    Delimiter,
    /// `0002`, ends a response in stateless exchanges. Never expected by any message of this crate.
    ResponseEnd,
}

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Terminator::Flush => "flush-pkt",
            Terminator::Delimiter => "delim-pkt",
            Terminator::ResponseEnd => "response-end-pkt",
        })
    }
}

/// Stable high-level error classification for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A line failed a literal, prefix or separator check.
    MalformedLine,
    /// A flush or delimiter arrived where the message grammar doesn't allow one.
    UnexpectedTerminator,
    /// A section header that isn't known, or isn't permitted at this point of the message.
    UnknownSection,
    /// A side-band unit with a channel byte outside of `1..=3`.
    MalformedSideband,
    /// The remote aborted with a message on side-band channel 3.
    RemoteFatal,
    /// The underlying stream or one of the sinks failed.
    Transport,
}

/// The error returned by all decoding operations.
///
/// There is no partial success: a value that failed to decode must be discarded by the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A line didn't have the shape required by `what`.
    #[error("invalid {what}: {line:?}")]
    MalformedLine {
        /// The grammar element that was expected, like `capability` or `wanted-ref`.
        what: &'static str,
        /// The offending line, verbatim.
        line: BString,
    },
    /// A terminator showed up where the grammar of `context` doesn't permit it.
    #[error("unexpected {terminator} in {context}")]
    UnexpectedTerminator {
        /// The terminator that was read.
        terminator: Terminator,
        /// The message or section being decoded.
        context: &'static str,
    },
    /// A line in section-header position that doesn't name a known section.
    #[error("unsupported pkt-line: {line:?}")]
    UnknownSection {
        /// The offending line, verbatim.
        line: BString,
    },
    /// A known section arrived after a section it must precede, or twice.
    #[error("section '{section}' is not allowed after section '{after}'")]
    SectionOutOfOrder {
        /// The section whose header was just read.
        section: Section,
        /// The section that was read before it.
        after: Section,
    },
    /// A side-band unit didn't start with a valid channel byte.
    #[error("invalid sideband: {line:?}")]
    MalformedSideband {
        /// The offending unit, verbatim.
        line: BString,
    },
    /// The remote sent a message on the fatal-error channel.
    #[error("fatal: {message}")]
    RemoteFatal {
        /// The message as sent by the remote, without `fatal: ` prefix and trailing newline.
        message: BString,
    },
    /// Reading from the stream or writing to a sink failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The stream contained bytes that don't form a pkt-line.
    #[error(transparent)]
    Packetline(#[from] gix_packetline_blocking::decode::Error),
}

impl Error {
    pub(crate) fn malformed(what: &'static str, line: &[u8]) -> Self {
        Error::MalformedLine {
            what,
            line: line.into(),
        }
    }

    pub(crate) fn unexpected(terminator: Terminator, context: &'static str) -> Self {
        Error::UnexpectedTerminator { terminator, context }
    }

    /// Fast classification helper returning a stable error kind.
    pub fn kind(&self) -> Kind {
        match self {
            Error::MalformedLine { .. } => Kind::MalformedLine,
            Error::UnexpectedTerminator { .. } => Kind::UnexpectedTerminator,
            Error::UnknownSection { .. } | Error::SectionOutOfOrder { .. } => Kind::UnknownSection,
            Error::MalformedSideband { .. } => Kind::MalformedSideband,
            Error::RemoteFatal { .. } => Kind::RemoteFatal,
            Error::Io(_) | Error::Packetline(_) => Kind::Transport,
        }
    }
}
