//! Side-band multiplexing of pack data, progress and fatal errors over one pkt-line stream.

use std::io;

use bstr::ByteSlice;

use crate::{
    pktline::{self, Channel},
    Error,
};

/// The maximum size of side-band units to produce.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `side-band`, with pkt-lines of up to 1000 bytes.
    Basic,
    /// `side-band-64k`, with pkt-lines of up to 65520 bytes.
    #[default]
    Large,
}

impl Mode {
    /// The amount of payload bytes that fit into one unit, after the length header and the channel byte.
    pub fn max_data_size(self) -> usize {
        match self {
            Mode::Basic => 1000 - 4 - 1,
            Mode::Large => 65520 - 4 - 1,
        }
    }
}

/// A side-band unit split into its channel and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band<'a> {
    /// Channel 1, opaque pack data.
    Data(&'a [u8]),
    /// Channel 2, human-readable progress.
    Progress(&'a [u8]),
    /// Channel 3, a fatal error message.
    Fatal(&'a [u8]),
}

impl<'a> Band<'a> {
    /// Split `unit` at its leading channel byte.
    ///
    /// A unit that is just the channel byte is valid and has an empty payload.
    pub fn decode(unit: &'a [u8]) -> Result<Self, Error> {
        let (channel, payload) = unit
            .split_first()
            .ok_or_else(|| Error::MalformedSideband { line: unit.into() })?;
        Ok(match *channel {
            1 => Band::Data(payload),
            2 => Band::Progress(payload),
            3 => Band::Fatal(payload),
            _ => return Err(Error::MalformedSideband { line: unit.into() }),
        })
    }

    /// The channel this unit belongs to.
    pub fn channel(&self) -> Channel {
        match self {
            Band::Data(_) => Channel::Data,
            Band::Progress(_) => Channel::Progress,
            Band::Fatal(_) => Channel::Error,
        }
    }

    /// Turn the payload of a channel-3 unit into the error it represents.
    pub(crate) fn fatal_error(message: &[u8]) -> Error {
        let message = message.strip_suffix(b"\n").unwrap_or(message);
        let message = message.strip_prefix(b"fatal: ").unwrap_or(message);
        Error::RemoteFatal {
            message: message.as_bstr().to_owned(),
        }
    }
}

/// Write `data` on `channel`, split into as many units as `mode` requires.
///
/// Empty `data` produces a single unit with just the channel byte, which serves as keep-alive.
pub fn write(channel: Channel, data: &[u8], mode: Mode, out: &mut dyn io::Write) -> io::Result<()> {
    if data.is_empty() {
        return pktline::write_data(&[channel as u8], out);
    }
    for chunk in data.chunks(mode.max_data_size()) {
        pktline::write_band(channel, chunk, out)?;
    }
    Ok(())
}

/// A writer for the packfile section, multiplexing pack data with progress and errors.
///
/// Bytes written through [`io::Write`] go to channel 1.
pub struct Writer<W: io::Write> {
    out: W,
    mode: Mode,
}

impl<W: io::Write> Writer<W> {
    /// Create a new writer producing units as large as `mode` allows.
    pub fn new(out: W, mode: Mode) -> Self {
        Writer { out, mode }
    }

    /// Send a progress `message` on channel 2.
    pub fn progress(&mut self, message: &[u8]) -> io::Result<()> {
        write(Channel::Progress, message, self.mode, &mut self.out)
    }

    /// Send a fatal error `message` on channel 3. The remote stops reading after it.
    pub fn fatal(&mut self, message: &[u8]) -> io::Result<()> {
        write(Channel::Error, message, self.mode, &mut self.out)
    }

    /// End the packfile section with a flush packet and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        pktline::write_flush(&mut self.out)?;
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: io::Write> io::Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let chunk = &buf[..buf.len().min(self.mode.max_data_size())];
        pktline::write_band(Channel::Data, chunk, &mut self.out)?;
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decode_selects_channel_by_first_byte() {
        assert_eq!(Band::decode(b"\x01PACK").unwrap(), Band::Data(b"PACK"));
        assert_eq!(Band::decode(b"\x02Counting").unwrap(), Band::Progress(b"Counting"));
        assert_eq!(Band::decode(b"\x03boom").unwrap(), Band::Fatal(b"boom"));
        assert_eq!(Band::decode(b"\x02").unwrap(), Band::Progress(b""));
    }

    #[test]
    fn decode_rejects_unknown_channels_and_empty_units() {
        for unit in [&b"\x04data"[..], &b"packfile\n"[..], &b""[..]] {
            let err = Band::decode(unit).unwrap_err();
            assert_eq!(err.kind(), crate::error::Kind::MalformedSideband, "{unit:?}");
        }
    }

    #[test]
    fn fatal_messages_lose_prefix_and_newline() {
        let err = Band::fatal_error(b"fatal: xyz\n");
        assert!(matches!(err, Error::RemoteFatal { ref message } if message == "xyz"));
        let err = Band::fatal_error(b"xyz");
        assert!(matches!(err, Error::RemoteFatal { ref message } if message == "xyz"));
    }

    #[test]
    fn basic_mode_chunks_into_small_units() {
        let mut out = Vec::new();
        write(Channel::Data, &[b'x'; 1000], Mode::Basic, &mut out).unwrap();
        // 995 + 5 bytes of payload
        assert_eq!(&out[..5], b"03e8\x01");
        assert_eq!(&out[1000..1005], b"000a\x01");
        assert_eq!(out.len(), 1000 + 10);
    }

    #[test]
    fn writer_multiplexes_and_ends_with_flush() {
        let mut w = Writer::new(Vec::new(), Mode::Large);
        w.progress(b"Counting objects\r").unwrap();
        w.write_all(b"PACK").unwrap();
        w.fatal(b"").unwrap();
        let out = w.finish().unwrap();
        assert_eq!(out, b"0016\x02Counting objects\r0009\x01PACK0005\x030000".to_vec());
    }
}
