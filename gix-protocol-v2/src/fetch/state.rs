use super::Section;

/// Where the decoder is within a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    /// No section header was read yet.
    Start,
    /// The header of the given section was read last.
    Within(Section),
}

impl State {
    /// The sections that may follow.
    pub(crate) fn successors(self) -> &'static [Section] {
        use Section::*;
        match self {
            State::Start => &[Acknowledgements, ShallowInfo, WantedRefs, PackfileUris, Packfile],
            State::Within(Acknowledgements) => &[ShallowInfo, WantedRefs, PackfileUris, Packfile],
            State::Within(ShallowInfo) => &[WantedRefs, PackfileUris, Packfile],
            State::Within(WantedRefs) => &[PackfileUris, Packfile],
            State::Within(PackfileUris) => &[Packfile],
            State::Within(Packfile) => &[],
        }
    }

    pub(crate) fn permits(self, next: Section) -> bool {
        self.successors().contains(&next)
    }

    /// The section last entered, if any.
    pub(crate) fn section(self) -> Option<Section> {
        match self {
            State::Start => None,
            State::Within(section) => Some(section),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_section_may_come_first() {
        for section in Section::ALL {
            assert!(State::Start.permits(section), "{section}");
        }
    }

    #[test]
    fn sections_only_move_forward() {
        for current in Section::ALL {
            for next in Section::ALL {
                assert_eq!(State::Within(current).permits(next), next > current, "{current} -> {next}");
            }
        }
    }

    #[test]
    fn packfile_is_terminal() {
        assert!(State::Within(Section::Packfile).successors().is_empty());
    }
}
