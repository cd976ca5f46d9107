#![no_main]
//! Decodes arbitrary bytes as a subtable of each kind.
//!
//! Anything that decodes and validates must encode again, and the encoded
//! bytes must decode.

use libfuzzer_sys::fuzz_target;
use state_tables::{Coverage, Subtable, TableKind, Validate};

const KINDS: [TableKind; 3] = [
    TableKind::Contextual,
    TableKind::Insertion,
    TableKind::Kerning,
];

fuzz_target!(|data: &[u8]| {
    let Some((glyph_count, data)) = data.split_first_chunk::<2>() else {
        return;
    };
    let glyph_count = u16::from_be_bytes(*glyph_count);
    for kind in KINDS {
        let Ok(subtable) = Subtable::decode(kind, data, glyph_count, Coverage::new(kind)) else {
            continue;
        };
        if subtable.validate().is_err() {
            continue;
        }
        let bytes = subtable.encode().expect("valid subtables encode");
        Subtable::decode(kind, &bytes, glyph_count, subtable.coverage())
            .expect("encoded subtables decode");
    }
});
