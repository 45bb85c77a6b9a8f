//! The response to the `fetch` command.
//!
//! A response consists of optional sections followed by the side-band multiplexed packfile:
//!
//! ```text
//! [acknowledgments] [shallow-info] [wanted-refs] [packfile-uris] packfile
//! ```
//!
//! If the acknowledgements contain `NAK`, the response ends right after them and negotiation continues.
use std::io;

use tracing::{debug, trace, warn};

use crate::{
    config::{DecodeOptions, SectionOrder},
    pktline::{self, Channel, Packet, Reader},
    sideband, Error, Terminator, WriteTo,
};

mod sections;
mod state;

pub use sections::{Acknowledgements, PackfileUri, Section, Shallow, ShallowInfo, Unshallow, WantedRef};
use state::State;

/// The way a fetch response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The response was flushed after the acknowledgements, more negotiation has to follow.
    Acknowledgements,
    /// The packfile was received completely.
    Packfile,
}

/// A decoded fetch response, without the pack itself.
///
/// Every section is `None` if it wasn't sent, and `Some` if it was, even if it was empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FetchResponse {
    /// The `acknowledgments` section.
    pub acknowledgements: Option<Acknowledgements>,
    /// The `shallow-info` section.
    pub shallow_info: Option<ShallowInfo>,
    /// The `wanted-refs` section.
    pub wanted_refs: Option<Vec<WantedRef>>,
    /// The `packfile-uris` section.
    pub packfile_uris: Option<Vec<PackfileUri>>,
}

/// How the body of a section ended.
enum BodyEnd {
    Delimiter,
    Flush,
    Header(Section),
}

impl FetchResponse {
    /// Return `true` if the `packfile` section follows the other sections when this response is written.
    pub fn expects_packfile(&self) -> bool {
        !self.acknowledgements.as_ref().is_some_and(|acks| acks.nak)
    }

    /// Decode a response from `reader`, writing pack data to `pack` and progress messages to `progress`.
    ///
    /// Reading stops after the flush packet that ends the response. A message on side-band channel 3
    /// aborts with [`Error::RemoteFatal`].
    ///
    /// `reader` is left in the side-band mode it was in before, no matter how decoding ended.
    pub fn read_from<R: io::Read>(
        reader: &mut Reader<R>,
        options: &DecodeOptions,
        pack: &mut dyn io::Write,
        progress: &mut dyn io::Write,
    ) -> Result<(Self, Completion), Error> {
        let demultiplex = reader.is_demultiplexing();
        reader.set_demultiplex(options.sideband_all);
        let res = Self::read_sections(reader, options, pack, progress);
        reader.set_demultiplex(demultiplex);
        res
    }

    fn read_sections<R: io::Read>(
        reader: &mut Reader<R>,
        options: &DecodeOptions,
        pack: &mut dyn io::Write,
        progress: &mut dyn io::Write,
    ) -> Result<(Self, Completion), Error> {
        let mut response = FetchResponse::default();
        let mut state = State::Start;
        let mut pending = None;
        loop {
            let section = match pending.take() {
                Some(section) => section,
                None => read_header(reader, progress)?,
            };
            if !state.permits(section) {
                let after = state.section().unwrap_or(section);
                match options.section_order {
                    SectionOrder::Strict => return Err(Error::SectionOutOfOrder { section, after }),
                    SectionOrder::Lenient => {
                        warn!(%section, %after, "accepting fetch-response section out of order");
                    }
                }
            }
            state = State::Within(section);
            debug!(%section, "entering fetch-response section");

            let end = match section {
                Section::Acknowledgements => {
                    let acks = response.acknowledgements.get_or_insert_with(Default::default);
                    read_body(reader, section, progress, |line| acks.parse_line(line))?
                }
                Section::ShallowInfo => {
                    let info = response.shallow_info.get_or_insert_with(Default::default);
                    read_body(reader, section, progress, |line| info.parse_line(line))?
                }
                Section::WantedRefs => {
                    let refs = response.wanted_refs.get_or_insert_with(Default::default);
                    read_body(reader, section, progress, |line| {
                        refs.push(WantedRef::from_line(line)?);
                        Ok(())
                    })?
                }
                Section::PackfileUris => {
                    let uris = response.packfile_uris.get_or_insert_with(Default::default);
                    read_body(reader, section, progress, |line| {
                        uris.push(PackfileUri::from_line(line)?);
                        Ok(())
                    })?
                }
                Section::Packfile => {
                    read_packfile(reader, pack, progress)?;
                    debug!("fetch response complete");
                    return Ok((response, Completion::Packfile));
                }
            };

            match end {
                BodyEnd::Delimiter => {}
                BodyEnd::Header(next) => pending = Some(next),
                BodyEnd::Flush if section == Section::Acknowledgements => {
                    debug!("fetch response ended after acknowledgements");
                    return Ok((response, Completion::Acknowledgements));
                }
                BodyEnd::Flush => return Err(Error::unexpected(Terminator::Flush, section.as_str())),
            }
        }
    }

    /// Write all sections up to and including the `packfile` header, or the closing flush packet
    /// if the acknowledgements contain `NAK`.
    ///
    /// A server continues with the pack, for instance through a [`sideband::Writer`].
    pub fn write_sections(&self, out: &mut dyn io::Write) -> io::Result<()> {
        if let Some(acks) = &self.acknowledgements {
            acks.write_to(out)?;
            if acks.nak {
                return pktline::write_flush(out);
            }
            pktline::write_delimiter(out)?;
        }
        if let Some(info) = &self.shallow_info {
            info.write_to(out)?;
            pktline::write_delimiter(out)?;
        }
        if let Some(refs) = &self.wanted_refs {
            sections::write_list(Section::WantedRefs, refs, out)?;
            pktline::write_delimiter(out)?;
        }
        if let Some(uris) = &self.packfile_uris {
            sections::write_list(Section::PackfileUris, uris, out)?;
            pktline::write_delimiter(out)?;
        }
        Section::Packfile.write_header(out)
    }

    /// Write the complete response with `pack` as content of the packfile section, split into
    /// side-band units as large as `mode` allows.
    ///
    /// `pack` is ignored if the response ends after the acknowledgements.
    pub fn write_with_pack(&self, pack: &[u8], mode: sideband::Mode, out: &mut dyn io::Write) -> io::Result<()> {
        self.write_sections(out)?;
        if !self.expects_packfile() {
            return Ok(());
        }
        if !pack.is_empty() {
            sideband::write(Channel::Data, pack, mode, out)?;
        }
        pktline::write_flush(out)
    }
}

impl WriteTo for FetchResponse {
    /// Write the complete response with an empty packfile section.
    fn write_to(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.write_with_pack(&[], sideband::Mode::default(), out)
    }
}

fn read_header<R: io::Read>(reader: &mut Reader<R>, progress: &mut dyn io::Write) -> Result<Section, Error> {
    loop {
        match reader.read()? {
            Packet::Data(line) => {
                return Section::from_header(line).ok_or_else(|| Error::UnknownSection { line: line.into() })
            }
            Packet::Progress(text) => progress.write_all(text)?,
            Packet::Flush => return Err(Error::unexpected(Terminator::Flush, "fetch response")),
            Packet::Delimiter => return Err(Error::unexpected(Terminator::Delimiter, "fetch response")),
            Packet::ResponseEnd => return Err(Error::unexpected(Terminator::ResponseEnd, "fetch response")),
        }
    }
}

/// Feed section body lines to `on_line` until a terminator or the next section header.
fn read_body<R: io::Read>(
    reader: &mut Reader<R>,
    section: Section,
    progress: &mut dyn io::Write,
    mut on_line: impl FnMut(&[u8]) -> Result<(), Error>,
) -> Result<BodyEnd, Error> {
    loop {
        match reader.read()? {
            Packet::Data(line) => match Section::from_header(line) {
                Some(next) => return Ok(BodyEnd::Header(next)),
                None => on_line(line)?,
            },
            Packet::Progress(text) => progress.write_all(text)?,
            Packet::Delimiter => return Ok(BodyEnd::Delimiter),
            Packet::Flush => return Ok(BodyEnd::Flush),
            Packet::ResponseEnd => return Err(Error::unexpected(Terminator::ResponseEnd, section.as_str())),
        }
    }
}

fn read_packfile<R: io::Read>(
    reader: &mut Reader<R>,
    pack: &mut dyn io::Write,
    progress: &mut dyn io::Write,
) -> Result<(), Error> {
    reader.set_demultiplex(true);
    let mut bytes = 0_u64;
    loop {
        match reader.read()? {
            Packet::Data(data) => {
                trace!(channel = 1, size = data.len(), "side-band unit");
                bytes += data.len() as u64;
                pack.write_all(data)?;
            }
            Packet::Progress(text) => {
                trace!(channel = 2, size = text.len(), "side-band unit");
                progress.write_all(text)?;
            }
            Packet::Flush => break,
            Packet::Delimiter => return Err(Error::unexpected(Terminator::Delimiter, "packfile")),
            Packet::ResponseEnd => return Err(Error::unexpected(Terminator::ResponseEnd, "packfile")),
        }
    }
    debug!(bytes, "received packfile");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8], options: &DecodeOptions) -> Result<(FetchResponse, Completion, Vec<u8>, Vec<u8>), Error> {
        let mut reader = Reader::new(input);
        let (mut pack, mut progress) = (Vec::new(), Vec::new());
        let (response, completion) = FetchResponse::read_from(&mut reader, options, &mut pack, &mut progress)?;
        Ok((response, completion, pack, progress))
    }

    #[test]
    fn expects_packfile_unless_nak() {
        let mut response = FetchResponse::default();
        assert!(response.expects_packfile());
        response.acknowledgements = Some(Acknowledgements {
            ready: true,
            ..Default::default()
        });
        assert!(response.expects_packfile());
        response.acknowledgements = Some(Acknowledgements {
            nak: true,
            ..Default::default()
        });
        assert!(!response.expects_packfile());
    }

    #[test]
    fn missing_delimiter_between_sections_is_tolerated() {
        let input = b"0011shallow-info\n000eshallow 1\n0010wanted-refs\n0013a refs/heads/b\n0001000dpackfile\n0000";
        let (response, completion, pack, _) = decode(input, &DecodeOptions::default()).unwrap();
        assert_eq!(completion, Completion::Packfile);
        assert_eq!(response.shallow_info.unwrap().shallow.len(), 1);
        assert_eq!(response.wanted_refs.unwrap()[0].name, "refs/heads/b");
        assert!(pack.is_empty());
    }

    #[test]
    fn flush_after_other_sections_is_unexpected() {
        let err = decode(b"0010wanted-refs\n0000", &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "unexpected flush-pkt in wanted-refs");
    }

    #[test]
    fn delimiter_inside_packfile_is_unexpected() {
        let err = decode(b"000dpackfile\n0001", &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::Kind::UnexpectedTerminator);
    }
}
