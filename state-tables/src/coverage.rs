//! Subtable coverage flags and table kinds.

/// The kinds of state table this crate understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TableKind {
    /// A `mort` contextual glyph substitution subtable.
    Contextual,
    /// A `mort` glyph insertion subtable.
    Insertion,
    /// A state-based (format 1) `kern` subtable.
    Kerning,
}

impl TableKind {
    /// The subtable type stored in the low bits of the coverage word.
    pub fn nibble(self) -> u8 {
        match self {
            TableKind::Contextual => 1,
            TableKind::Insertion => 5,
            TableKind::Kerning => 1,
        }
    }
}

/// Per-subtable header flags.
///
/// The container table owns the binary form of these flags; the engine
/// only reads the booleans and the kind nibble.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coverage {
    /// Glyphs are processed from last to first.
    pub reverse: bool,
    /// The subtable applies to vertical text.
    pub vertical: bool,
    /// Kerning values move glyphs perpendicular to the line.
    ///
    /// If text is normally written horizontally, adjustments will be
    /// vertical.
    pub cross_stream: bool,
    /// The subtable has variation kerning values.
    pub variation: bool,
    /// The subtable type, in the low four bits.
    pub kind: u8,
}

impl Coverage {
    /// Coverage for a horizontal, forward subtable of the given kind.
    pub fn new(kind: TableKind) -> Self {
        Coverage {
            kind: kind.nibble(),
            ..Default::default()
        }
    }

    pub fn with_cross_stream(mut self, cross_stream: bool) -> Self {
        self.cross_stream = cross_stream;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }

    /// True if the table has horizontal values.
    #[inline]
    pub fn is_horizontal(&self) -> bool {
        !self.vertical
    }
}
