//! Glyph insertion.
//!
//! An entry may insert a list of glyphs next to the marked glyph, next to
//! the current glyph, or both. Lists are stored in the payload area as runs
//! of glyph words; the entry holds their counts and placement in its flags
//! and the byte offset of each list in its two extra fields.

use std::collections::BTreeSet;

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

/// The most glyphs one list can hold; its count is a five bit field.
pub const MAX_INSERTION_LEN: usize = 31;

const CURRENT_IS_KASHIDA_LIKE: u16 = 0x2000;
const MARKED_IS_KASHIDA_LIKE: u16 = 0x1000;
const CURRENT_INSERT_BEFORE: u16 = 0x0800;
const MARKED_INSERT_BEFORE: u16 = 0x0400;
const CURRENT_INSERT_COUNT: u16 = 0x03E0;
const MARKED_INSERT_COUNT: u16 = 0x001F;
const CURRENT_COUNT_SHIFT: u16 = 5;

/// The offset stored for a missing list.
const NO_LIST: u16 = 0xFFFF;

/// Glyphs to insert next to one position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Insertion {
    /// Insert before the glyph instead of after it.
    pub before: bool,
    /// The inserted glyphs behave like a kashida, stretching rather than
    /// splitting the glyphs around them.
    pub kashida_like: bool,
    pub glyphs: Vec<GlyphId16>,
}

impl Insertion {
    pub fn before(glyphs: impl IntoIterator<Item = GlyphId16>) -> Self {
        Insertion {
            before: true,
            kashida_like: false,
            glyphs: glyphs.into_iter().collect(),
        }
    }

    pub fn after(glyphs: impl IntoIterator<Item = GlyphId16>) -> Self {
        Insertion {
            before: false,
            kashida_like: false,
            glyphs: glyphs.into_iter().collect(),
        }
    }

    pub fn kashida_like(mut self) -> Self {
        self.kashida_like = true;
        self
    }

    /// The index glyphs go to when inserted relative to `pos`.
    fn target(&self, pos: usize) -> usize {
        if self.before {
            pos
        } else {
            pos + 1
        }
    }

    fn flags(&self, kashida: u16, before: u16) -> u16 {
        let mut flags = 0;
        if self.kashida_like {
            flags |= kashida;
        }
        if self.before {
            flags |= before;
        }
        flags
    }
}

/// Insertions at the current glyph and at the mark.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsertionAction {
    pub current: Option<Insertion>,
    pub marked: Option<Insertion>,
}

impl Action for InsertionAction {
    /// The sub-feature flags of the subtable.
    type Selector = u32;

    const KIND: TableKind = TableKind::Insertion;

    fn canonicalize(&mut self) {
        for insertion in [&mut self.current, &mut self.marked] {
            if insertion.as_ref().is_some_and(|ins| ins.glyphs.is_empty()) {
                *insertion = None;
            }
        }
    }

    fn validate_kind(table: &StateTable<Self>, ctx: &mut ValidationCtx) {
        for (state_name, row) in table.rows() {
            ctx.in_state(state_name, |ctx| {
                for (class_name, entry) in row.iter() {
                    let lists = [
                        ("current", &entry.action.current),
                        ("marked", &entry.action.marked),
                    ];
                    for (field, insertion) in lists {
                        let Some(insertion) = insertion else {
                            continue;
                        };
                        if insertion.glyphs.len() > MAX_INSERTION_LEN {
                            ctx.in_class(class_name, |ctx| {
                                ctx.in_field(field, |ctx| {
                                    ctx.report(format!(
                                        "{} glyphs, at most {MAX_INSERTION_LEN} can be inserted",
                                        insertion.glyphs.len()
                                    ))
                                })
                            });
                        }
                    }
                }
            })
        }
    }

    fn apply(&self, run: &mut RunContext, _push: bool) -> bool {
        // (target, anchor, glyphs); the current list first, so that at a
        // shared target the marked glyphs end up in front
        let mut edits = Vec::with_capacity(2);
        if let (Some(insertion), Some(pos)) = (&self.current, run.current()) {
            edits.push((insertion.target(pos), pos, &insertion.glyphs));
        }
        if let (Some(insertion), Some(pos)) = (&self.marked, run.mark()) {
            edits.push((insertion.target(pos), pos, &insertion.glyphs));
        }
        // insert at the higher index first, so the lower one stays valid
        edits.sort_by_key(|(target, _, _)| std::cmp::Reverse(*target));
        let mut changed = false;
        for (target, anchor, glyphs) in edits {
            run.insert(target, anchor, glyphs);
            changed |= !glyphs.is_empty();
        }
        changed
    }
}

impl StateTable<InsertionAction> {
    /// Every glyph any entry can insert.
    pub fn inserted_glyphs(&self) -> BTreeSet<GlyphId16> {
        self.rows()
            .flat_map(|(_, row)| row.iter())
            .flat_map(|(_, entry)| [&entry.action.current, &entry.action.marked])
            .flatten()
            .flat_map(|insertion| insertion.glyphs.iter().copied())
            .collect()
    }
}

/// Where each entry's lists were placed, as word positions in the payload.
pub struct PackedLists {
    words: Vec<u16>,
    /// Per entry: the current and marked list positions.
    positions: Vec<[Option<usize>; 2]>,
}

impl ActionCodec for InsertionAction {
    const ENTRY_FIELDS: usize = 2;
    const HAS_PAYLOAD_LIMIT: bool = false;
    type Packed = PackedLists;

    fn pack(layout: &EncodeLayout<Self>) -> PackedLists {
        let mut pool = PayloadPool::new();
        let mut place = |insertion: &Option<Insertion>| {
            let glyphs = insertion
                .as_ref()?
                .glyphs
                .iter()
                .map(|glyph| glyph.to_u16())
                .collect::<Vec<_>>();
            Some(pool.place(glyphs.clone(), || dense_items(&glyphs), |_| false))
        };
        let positions = layout
            .entries
            .iter()
            .map(|entry| [place(&entry.action.current), place(&entry.action.marked)])
            .collect();
        log::debug!(
            "packed {} insertion lists into {} words",
            pool.num_lists(),
            pool.len()
        );
        PackedLists {
            words: pool.into_words(),
            positions,
        }
    }

    fn write_entry(
        index: usize,
        entry: &Entry<Self>,
        mut flags: u16,
        packed: &PackedLists,
        stakes: &EntryStakes,
        writer: &mut LinkedWriter,
    ) {
        let action = &entry.action;
        // validation caps every list at 31 glyphs
        if let Some(current) = &action.current {
            flags |= current.flags(CURRENT_IS_KASHIDA_LIKE, CURRENT_INSERT_BEFORE);
            flags |= (current.glyphs.len() as u16) << CURRENT_COUNT_SHIFT & CURRENT_INSERT_COUNT;
        }
        if let Some(marked) = &action.marked {
            flags |= marked.flags(MARKED_IS_KASHIDA_LIKE, MARKED_INSERT_BEFORE);
            flags |= marked.glyphs.len() as u16 & MARKED_INSERT_COUNT;
        }
        writer.write_u16(flags);
        let fields = ["currentInsertIndex", "markedInsertIndex"];
        for (position, field) in packed.positions[index].iter().zip(fields) {
            match position {
                Some(position) => {
                    writer.write_offset(stakes.base, stakes.payload, 2 * position, field)
                }
                None => writer.write_u16(NO_LIST),
            }
        }
    }

    fn write_payloads(packed: &PackedLists, writer: &mut LinkedWriter) {
        for word in &packed.words {
            writer.write_u16(*word);
        }
    }

    fn decode_actions(layout: &DecodeLayout) -> Result<Vec<Self>, DecodeError> {
        let read_list = |entry: usize, offset: u16, count: u16| {
            if count == 0 || offset == NO_LIST || offset == 0 {
                return Ok(None);
            }
            let start = offset as usize;
            if start < layout.payload.start || start >= layout.payload.end {
                return Err(DecodeError::InvalidPayloadOffset { entry, offset });
            }
            let mut cursor =
                Cursor::region(layout.data, start, layout.payload.end, "insertion glyphs");
            let glyphs = (0..count)
                .map(|_| cursor.read_u16().map(GlyphId16::new))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(glyphs))
        };
        layout
            .entries
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let flags = raw.flags;
                let current_count = (flags & CURRENT_INSERT_COUNT) >> CURRENT_COUNT_SHIFT;
                let marked_count = flags & MARKED_INSERT_COUNT;
                Ok::<_, DecodeError>(InsertionAction {
                    current: read_list(i, raw.fields[0], current_count)?.map(|glyphs| {
                        Insertion {
                            before: flags & CURRENT_INSERT_BEFORE != 0,
                            kashida_like: flags & CURRENT_IS_KASHIDA_LIKE != 0,
                            glyphs,
                        }
                    }),
                    marked: read_list(i, raw.fields[1], marked_count)?.map(|glyphs| {
                        Insertion {
                            before: flags & MARKED_INSERT_BEFORE != 0,
                            kashida_like: flags & MARKED_IS_KASHIDA_LIKE != 0,
                            glyphs,
                        }
                    }),
                })
            })
            .collect()
    }
}
