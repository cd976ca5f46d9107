#![no_main]
//! Runs decoded subtables over glyphs taken from the end of the input.

use libfuzzer_sys::fuzz_target;
use state_tables::{
    types::GlyphId16, walker::run_from_glyphs, Coverage, Subtable, TableKind, Walker,
    WalkerOptions,
};

const MAX_RUN_LEN: usize = 64;

fuzz_target!(|data: &[u8]| {
    let Some((&split, data)) = data.split_first() else {
        return;
    };
    let split = (split as usize * 2).min(data.len());
    let (table, glyphs) = data.split_at(split);
    let run = run_from_glyphs(
        glyphs
            .chunks_exact(2)
            .take(MAX_RUN_LEN)
            .map(|raw| GlyphId16::new(u16::from_be_bytes([raw[0], raw[1]]))),
    );
    let options = WalkerOptions {
        max_steps_per_glyph: 16,
    };
    let ignorable = |glyph: GlyphId16| glyph.to_u16() % 7 == 0;
    for kind in [TableKind::Insertion, TableKind::Kerning] {
        let coverage = Coverage::new(kind);
        match Subtable::decode(kind, table, u16::MAX, coverage) {
            Ok(Subtable::Insertion(table)) => {
                if let Ok(walker) = Walker::with_options(&table, options) {
                    let _ = walker.run(&run, ignorable);
                }
            }
            Ok(Subtable::Kerning(table)) => {
                if let Ok(walker) = Walker::with_options(&table, options) {
                    let _ = walker.run(&run, ignorable);
                }
            }
            _ => (),
        }
    }
});
