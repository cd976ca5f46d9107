//! State-based kerning.
//!
//! Kerning entries push glyphs onto a small stack and pop them off again,
//! applying one value from the entry's value list to each popped glyph.
//! Value lists are stored in the payload area as big-endian words; the low
//! bit of the last word of a list is set to terminate it, which is why
//! values themselves are always even.

use read_fonts::types::GlyphId16;

use crate::{
    codec::{ActionCodec, DecodeLayout, EncodeLayout, EntryStakes},
    error::DecodeError,
    pool::{dense_items, PayloadPool},
    read::Cursor,
    validate::ValidationCtx,
    walker::RunContext,
    write::LinkedWriter,
    Action, Entry, StateTable, TableKind,
};

/// The bits of the flags word holding the value list offset.
const VALUE_OFFSET_MASK: u16 = 0x3FFF;
const END_OF_LIST: u16 = 0x0001;
/// The cross-stream value that resets the cross-stream adjustment.
const RESET_CROSS_STREAM: u16 = 0x8000;

/// One adjustment applied to a popped glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KernValue {
    /// The adjustment, in font units; always even.
    pub value: i16,
    /// Reset the cross-stream adjustment instead of adding to it.
    ///
    /// Only meaningful in cross-stream subtables.
    pub reset_cross_stream: bool,
}

impl KernValue {
    pub fn new(value: i16) -> Self {
        KernValue {
            value,
            reset_cross_stream: false,
        }
    }

    /// The marker that resets cross-stream kerning.
    pub fn reset_cross_stream() -> Self {
        KernValue {
            value: 0,
            reset_cross_stream: true,
        }
    }

    /// The word stored for this value, without the terminator bit.
    fn to_word(self, cross_stream: bool) -> u16 {
        match (cross_stream, self.reset_cross_stream) {
            (true, true) => RESET_CROSS_STREAM,
            (true, false) => self.value as u16 & 0x7FFE,
            (false, _) => self.value as u16 & !END_OF_LIST,
        }
    }

    fn from_word(word: u16, cross_stream: bool) -> Self {
        let word = word & !END_OF_LIST;
        if !cross_stream {
            return KernValue::new(word as i16);
        }
        if word == RESET_CROSS_STREAM {
            return KernValue::reset_cross_stream();
        }
        // sign extend from fifteen bits
        KernValue::new(((word << 1) as i16) >> 1)
    }
}

impl From<i16> for KernValue {
    fn from(value: i16) -> Self {
        KernValue::new(value)
    }
}

/// The values applied to the glyphs an entry pops, most recently pushed first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KerningAction(pub Vec<KernValue>);

impl KerningAction {
    pub fn new(values: impl IntoIterator<Item = KernValue>) -> Self {
        KerningAction(values.into_iter().collect())
    }

    pub fn values(&self) -> &[KernValue] {
        &self.0
    }
}

impl Action for KerningAction {
    /// The variation tuple index of the subtable, if it has one.
    type Selector = Option<u16>;

    const KIND: TableKind = TableKind::Kerning;

    fn canonicalize(&mut self) {
        for value in self.0.iter_mut() {
            if value.reset_cross_stream {
                value.value = 0;
            } else if value.value & 1 != 0 {
                log::warn!(
                    "kerning value {} is odd, storing {}",
                    value.value,
                    value.value & !1
                );
                value.value &= !1;
            }
        }
    }

    fn validate_kind(table: &StateTable<Self>, ctx: &mut ValidationCtx) {
        let cross_stream = table.coverage.cross_stream;
        let range = if cross_stream {
            -16384..=16382
        } else {
            i16::MIN..=32766
        };
        for (state_name, row) in table.rows() {
            ctx.in_state(state_name, |ctx| {
                for (class_name, entry) in row.iter() {
                    ctx.in_class(class_name, |ctx| {
                        for (i, value) in entry.action.0.iter().enumerate() {
                            ctx.in_field("values", |ctx| {
                                ctx.in_index(i, |ctx| {
                                    if value.reset_cross_stream && !cross_stream {
                                        ctx.report(
                                            "reset cross-stream is only allowed in cross-stream tables",
                                        );
                                    } else if !range.contains(&value.value) {
                                        ctx.report(format!(
                                            "value {} is outside {}..={}",
                                            value.value,
                                            range.start(),
                                            range.end()
                                        ));
                                    }
                                })
                            })
                        }
                    })
                }
            })
        }
    }

    fn apply(&self, run: &mut RunContext, push: bool) -> bool {
        let mut changed = false;
        for value in &self.0 {
            let Some(pos) = run.pop() else {
                break;
            };
            changed |= if value.reset_cross_stream {
                run.reset(pos)
            } else {
                run.adjust(pos, value.value as i32)
            };
        }
        if push {
            if let Some(pos) = run.current() {
                run.push(pos);
            }
        }
        changed
    }
}

/// Where each entry's values were placed, as word positions in the payload.
pub struct PackedValues {
    words: Vec<u16>,
    positions: Vec<Option<usize>>,
}

impl ActionCodec for KerningAction {
    const ENTRY_FIELDS: usize = 0;
    const HAS_PAYLOAD_LIMIT: bool = true;
    type Packed = PackedValues;

    fn pack(layout: &EncodeLayout<Self>) -> PackedValues {
        let mut pool = PayloadPool::new();
        let positions = layout
            .entries
            .iter()
            .map(|entry| {
                let values = &entry.action.0;
                if values.is_empty() {
                    return None;
                }
                let mut words = values
                    .iter()
                    .map(|value| value.to_word(layout.cross_stream))
                    .collect::<Vec<_>>();
                if let Some(last) = words.last_mut() {
                    *last |= END_OF_LIST;
                }
                Some(pool.place(words.clone(), || dense_items(&words), |_| false))
            })
            .collect();
        log::debug!(
            "packed {} kerning value lists into {} words",
            pool.num_lists(),
            pool.len()
        );
        PackedValues {
            words: pool.into_words(),
            positions,
        }
    }

    fn write_entry(
        index: usize,
        _entry: &Entry<Self>,
        flags: u16,
        packed: &PackedValues,
        stakes: &EntryStakes,
        writer: &mut LinkedWriter,
    ) {
        match packed.positions[index] {
            Some(position) => writer.write_masked_offset(
                stakes.base,
                stakes.payload,
                2 * position,
                VALUE_OFFSET_MASK,
                flags,
                "valueOffset",
            ),
            None => writer.write_u16(flags | VALUE_OFFSET_MASK),
        }
    }

    fn write_payloads(packed: &PackedValues, writer: &mut LinkedWriter) {
        for word in &packed.words {
            writer.write_u16(*word);
        }
    }

    fn decode_actions(layout: &DecodeLayout) -> Result<Vec<Self>, DecodeError> {
        layout
            .entries
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let offset = raw.flags & VALUE_OFFSET_MASK;
                if offset == VALUE_OFFSET_MASK || offset == 0 {
                    return Ok(KerningAction::default());
                }
                let start = offset as usize;
                if !layout.payload.contains(&start) {
                    return Err(DecodeError::InvalidPayloadOffset { entry: i, offset });
                }
                let mut cursor =
                    Cursor::region(layout.data, start, layout.payload.end, "kerning values");
                let mut values = Vec::new();
                loop {
                    let word = cursor
                        .read_u16()
                        .map_err(|_| DecodeError::MissingTerminator { offset: start })?;
                    values.push(KernValue::from_word(word, layout.cross_stream));
                    if word & END_OF_LIST != 0 {
                        break;
                    }
                }
                Ok(KerningAction(values))
            })
            .collect()
    }
}

/// The kerning a table applies between two glyphs at the start of a run.
///
/// A convenience for checking converted tables: runs `[left, right]` and
/// returns the adjustment given to `left`.
pub fn pair_kerning(
    walker: &crate::Walker<KerningAction>,
    left: GlyphId16,
    right: GlyphId16,
) -> i32 {
    let run = crate::walker::run_from_glyphs([left, right]);
    walker.run_one(&run, 0, |_| false).glyphs[0].kerning
}
