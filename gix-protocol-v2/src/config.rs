//! Options controlling how strictly responses are decoded.

use crate::pktline::Reader;

/// What to do if fetch-response sections arrive in an order the protocol doesn't allow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SectionOrder {
    /// Fail with [`Error::SectionOutOfOrder`](crate::Error::SectionOutOfOrder).
    #[default]
    Strict,
    /// Accept any order, merging repeated sections into the one seen first, and log a warning.
    Lenient,
}

/// Options for decoding responses.
#[derive(Debug, Default, Clone)]
pub struct DecodeOptions {
    /// How to handle sections arriving out of order.
    pub section_order: SectionOrder,
    /// Whether the `sideband-all` argument was sent, which multiplexes every line of a fetch response.
    pub sideband_all: bool,
    /// Log every pkt-line read at trace level.
    pub trace: bool,
}

impl DecodeOptions {
    /// Set the section order policy.
    pub fn with_section_order(mut self, order: SectionOrder) -> Self {
        self.section_order = order;
        self
    }

    /// Expect every line of the fetch response to be multiplexed.
    pub fn with_sideband_all(mut self, enabled: bool) -> Self {
        self.sideband_all = enabled;
        self
    }

    /// Enable pkt-line tracing.
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Create a pkt-line reader over `read`, tracing lines if configured.
    pub fn reader<R: std::io::Read>(&self, read: R) -> Reader<R> {
        Reader::with_trace(read, self.trace)
    }
}
