//! Message model of git's wire protocol version 2.
//!
//! This crate encodes and decodes the messages exchanged once both sides speak protocol v2:
//!
//! - the [capability advertisement](capabilities::CapabilityAdvertisement) a server opens with,
//! - [command requests](command::CommandRequest) sent by clients,
//! - the [`ls-refs` response](ls_refs::ListReferencesResponse),
//! - the sectioned [`fetch` response](fetch::FetchResponse), including the side-band multiplexed packfile.
//!
//! pkt-line framing is provided by `gix-packetline-blocking`, transports are up to the caller.
//!
//! # Example
//!
//! ```no_run
//! use gix_protocol_v2::{command::{Argument, CommandRequest}, pktline::Reader, ls_refs::ListReferencesResponse, WriteTo};
//!
//! let request = CommandRequest::new("ls-refs").with_argument(Argument::new("symrefs"));
//! let mut connection = std::net::TcpStream::connect("localhost:9418")?;
//! request.write_to(&mut connection)?;
//! let refs = ListReferencesResponse::read_from(&mut Reader::new(connection))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::io;

pub mod capabilities;
pub mod command;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ls_refs;
pub mod pair;
pub mod pktline;
pub mod sideband;

pub use config::{DecodeOptions, SectionOrder};
pub use error::{Error, Kind, Terminator};

/// The result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Writing of messages in their wire format.
pub trait WriteTo {
    /// Write the complete message, terminators included, to `out`.
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()>;

    /// Return the wire format as a new buffer.
    ///
    /// This only fails if a single line exceeds the maximum pkt-line length.
    fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}
