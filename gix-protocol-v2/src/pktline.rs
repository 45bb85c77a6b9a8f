//! pkt-line reading and writing on top of `gix-packetline-blocking`.
//!
//! Decoders pull [`Packet`]s from a [`Reader`], which turns the flush and delimiter markers into
//! values to branch on instead of stopping the underlying iterator at them.

use std::io;

use gix_packetline_blocking::{encode, PacketLineRef, StreamingPeekableIter};

use crate::{sideband::Band, Error};

pub use gix_packetline_blocking::Channel;

/// One unit read from a pkt-line stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    /// A line with payload. In demultiplexing mode, the payload of a channel-1 unit.
    Data(&'a [u8]),
    /// The payload of a channel-2 unit, only produced in demultiplexing mode.
    Progress(&'a [u8]),
    /// `0000`
    Flush,
    /// `0001`
    Delimiter,
    /// `0002`
    ResponseEnd,
}

/// A pkt-line reader handing out one [`Packet`] at a time.
pub struct Reader<R> {
    inner: StreamingPeekableIter<R>,
    demultiplex: bool,
}

impl<R: io::Read> Reader<R> {
    /// Create a new reader over `read`.
    pub fn new(read: R) -> Self {
        Reader {
            inner: StreamingPeekableIter::new(read, &[], false),
            demultiplex: false,
        }
    }

    /// Like [`new()`](Self::new()), but log every line read at trace level if `trace` is `true`.
    pub fn with_trace(read: R, trace: bool) -> Self {
        Reader {
            inner: StreamingPeekableIter::new(read, &[], trace),
            demultiplex: false,
        }
    }

    /// If `enabled`, interpret every data line as side-band unit.
    ///
    /// Channel 1 then yields [`Packet::Data`], channel 2 [`Packet::Progress`] and channel 3 ends
    /// reading with [`Error::RemoteFatal`].
    pub fn set_demultiplex(&mut self, enabled: bool) {
        self.demultiplex = enabled;
    }

    /// Return `true` if data lines are currently read as side-band units.
    pub fn is_demultiplexing(&self) -> bool {
        self.demultiplex
    }

    /// Read the next packet.
    ///
    /// Running out of input is an error as every message ends with a terminator.
    pub fn read(&mut self) -> Result<Packet<'_>, Error> {
        let line = match self.inner.read_line() {
            Some(line) => line??,
            None => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
        };
        Ok(match line {
            PacketLineRef::Data(data) if self.demultiplex => match Band::decode(data)? {
                Band::Data(data) => Packet::Data(data),
                Band::Progress(text) => Packet::Progress(text),
                Band::Fatal(message) => return Err(Band::fatal_error(message)),
            },
            PacketLineRef::Data(data) => Packet::Data(data),
            PacketLineRef::Flush => Packet::Flush,
            PacketLineRef::Delimiter => Packet::Delimiter,
            PacketLineRef::ResponseEnd => Packet::ResponseEnd,
        })
    }

    /// Return the wrapped stream.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

/// Write `data` as a single pkt-line.
pub fn write_data(data: &[u8], out: &mut dyn io::Write) -> io::Result<()> {
    encode::data_to_write(data, out).map(|_| ())
}

/// Write a flush packet.
pub fn write_flush(out: &mut dyn io::Write) -> io::Result<()> {
    encode::flush_to_write(out).map(|_| ())
}

/// Write a delimiter packet.
pub fn write_delimiter(out: &mut dyn io::Write) -> io::Result<()> {
    encode::delim_to_write(out).map(|_| ())
}

/// Write `data` as a single side-band unit on `channel`.
pub fn write_band(channel: Channel, data: &[u8], out: &mut dyn io::Write) -> io::Result<()> {
    encode::band_to_write(channel, data, out).map(|_| ())
}
