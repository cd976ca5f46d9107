//! Test data shared by the state-tables crate and its benches.

pub mod bebuffer;

pub mod kerning {

    /// Glyph 10 followed by glyph 10 kerns by -40.
    #[rustfmt::skip]
    pub static SIMPLE: &[u8] = &[
        0x00, 0x05, // numClasses
        0x00, 0x0C, // classTableOffset
        0x00, 0x14, // stateArrayOffset
        0x00, 0x24, // entryTableOffset
        0x00, 0x30, // valueOffset
        0x00, 0x32, // valueArrayEndOffset
        // class table, format 0
        0x00, 0x00, // format
        0x00, 0x0A, // firstGlyph
        0x00, 0x01, // glyphCount
        0x04, 0x00, // class 4, padding
        // state array: SOT, SOL, saw glyph 10
        0x00, 0x00, 0x00, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x02,
        0x00, // padding
        // entry 0: to SOT, no values
        0x00, 0x14, 0x3F, 0xFF,
        // entry 1: to state 2, push
        0x00, 0x1E, 0xBF, 0xFF,
        // entry 2: to SOT, values at 0x30
        0x00, 0x14, 0x00, 0x30,
        // values
        0xFF, 0xD9, // -40, end of list
    ];
}

pub mod contextual {

    /// Swaps glyphs 10 and 11 when 10 is followed by 11.
    #[rustfmt::skip]
    pub static SWAP: &[u8] = &[
        0x00, 0x06, // numClasses
        0x00, 0x0A, // classTableOffset
        0x00, 0x12, // stateArrayOffset
        0x00, 0x24, // entryTableOffset
        0x00, 0x3C, // substitutionTable
        // class table, format 0
        0x00, 0x00, // format
        0x00, 0x0A, // firstGlyph
        0x00, 0x02, // glyphCount
        0x04, 0x05, // classes 4 and 5
        // state array: SOT, SOL, saw glyph 10
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x01, 0x02,
        // entry 0: to SOT, no substitution
        0x00, 0x12, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        // entry 1: to state 2, mark
        0x00, 0x1E, 0x80, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        // entry 2: to SOT, both maps start ten words before the table
        0x00, 0x12, 0x00, 0x00, 0xFF, 0xF6, 0xFF, 0xF6,
        // substitutions for glyphs 10 and 11
        0x00, 0x0B,
        0x00, 0x0A,
    ];
}
