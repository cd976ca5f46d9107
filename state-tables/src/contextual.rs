//! Contextual glyph substitution.
//!
//! Each entry may carry two substitution maps: one applied to the glyph at
//! the most recent mark, and one applied to the current glyph. In binary
//! form the maps live in one shared array of glyph words, and an entry
//! stores, for each map, a word offset such that the substitute for glyph
//! `g` is the word at `(g + offset) mod 65536`. Maps are packed so that the
//! words they read never collide.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use read_fonts::types::GlyphId16;

use crate::{
    codec::{ActionCodec, DecodeLayout, EncodeLayout, EntryStakes, MARK},
    error::DecodeError,
    pool::PayloadPool,
    read::Cursor,
    validate::ValidationCtx,
    walker::RunContext,
    write::LinkedWriter,
    Action, Entry, StateTable, TableKind,
};

/// The offset stored for a missing map.
const NO_MAP: u16 = 0xFFFF;

/// A substitution applied at the mark and at the current glyph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextualAction {
    /// Substitutions for the glyph at the mark.
    pub marked: BTreeMap<GlyphId16, GlyphId16>,
    /// Substitutions for the current glyph.
    pub current: BTreeMap<GlyphId16, GlyphId16>,
}

impl ContextualAction {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_marked(mut self, from: GlyphId16, to: GlyphId16) -> Self {
        self.marked.insert(from, to);
        self
    }

    pub fn with_current(mut self, from: GlyphId16, to: GlyphId16) -> Self {
        self.current.insert(from, to);
        self
    }
}

impl Action for ContextualAction {
    /// The sub-feature flags of the subtable.
    type Selector = u32;

    const KIND: TableKind = TableKind::Contextual;

    fn canonicalize(&mut self) {
        self.marked.retain(|from, to| from != to);
        self.current.retain(|from, to| from != to);
    }

    fn validate_kind(table: &StateTable<Self>, ctx: &mut ValidationCtx) {
        let candidates = Candidates::new(table);
        for (state_name, row) in table.rows() {
            ctx.in_state(state_name, |ctx| {
                for (class_name, entry) in row.iter() {
                    ctx.in_class(class_name, |ctx| {
                        let current = candidates.current(entry);
                        if let Some(glyph) = entry
                            .action
                            .current
                            .keys()
                            .find(|glyph| !current.contains(*glyph))
                        {
                            ctx.in_field("current", |ctx| {
                                ctx.report(format!(
                                    "glyph {} never reaches this entry",
                                    glyph.to_u16()
                                ))
                            });
                        }
                        if let Some(glyph) = entry
                            .action
                            .marked
                            .keys()
                            .find(|glyph| !candidates.marked.contains(*glyph))
                        {
                            ctx.in_field("marked", |ctx| {
                                ctx.report(format!(
                                    "glyph {} is never marked",
                                    glyph.to_u16()
                                ))
                            });
                        }
                    })
                }
            })
        }
    }

    fn apply(&self, run: &mut RunContext, _push: bool) -> bool {
        // the current glyph first; a mark on the same glyph sees the result
        let mut changed = false;
        if let Some(current) = run.current() {
            if let Some(to) = self.current.get(&run.glyph(current)) {
                changed |= run.substitute(current, *to);
            }
        }
        if let Some(mark) = run.mark() {
            if let Some(to) = self.marked.get(&run.glyph(mark)) {
                changed |= run.substitute(mark, *to);
            }
        }
        changed
    }
}

/// The glyphs each map of an entry can be asked about.
struct Candidates<'a> {
    by_entry: HashMap<&'a Entry<ContextualAction>, BTreeSet<GlyphId16>>,
    marked: BTreeSet<GlyphId16>,
}

impl<'a> Candidates<'a> {
    fn new(table: &'a StateTable<ContextualAction>) -> Self {
        let mut classes_by_entry: HashMap<_, HashSet<&str>> = HashMap::new();
        let mut marked_classes = HashSet::new();
        for (_, row) in table.rows() {
            for (class_name, entry) in row.iter() {
                classes_by_entry.entry(entry).or_default().insert(class_name);
                if entry.mark {
                    marked_classes.insert(class_name);
                }
            }
        }
        let glyphs_of = |classes: &HashSet<&str>| {
            table
                .class_table
                .iter()
                .filter(|(_, name)| classes.contains(name))
                .map(|(gid, _)| gid)
                .collect::<BTreeSet<_>>()
        };
        Candidates {
            marked: glyphs_of(&marked_classes),
            by_entry: classes_by_entry
                .iter()
                .map(|(entry, classes)| (*entry, glyphs_of(classes)))
                .collect(),
        }
    }

    fn current(&self, entry: &Entry<ContextualAction>) -> &BTreeSet<GlyphId16> {
        static EMPTY: BTreeSet<GlyphId16> = BTreeSet::new();
        self.by_entry.get(entry).unwrap_or(&EMPTY)
    }
}

/// Where each entry's maps were placed.
pub struct PackedMaps {
    words: Vec<u16>,
    /// Per entry: the mark and current word offsets.
    offsets: Vec<[u16; 2]>,
}

/// A map filled out with identity values over every glyph that can reach it.
fn full_map(
    map: &BTreeMap<GlyphId16, GlyphId16>,
    candidates: &BTreeSet<GlyphId16>,
) -> Vec<(u16, u16)> {
    candidates
        .iter()
        .map(|glyph| (glyph.to_u16(), map.get(glyph).unwrap_or(glyph).to_u16()))
        .collect()
}

impl ActionCodec for ContextualAction {
    const ENTRY_FIELDS: usize = 2;
    const HAS_PAYLOAD_LIMIT: bool = false;
    type Packed = PackedMaps;

    fn pack(layout: &EncodeLayout<Self>) -> PackedMaps {
        let cells = &layout.cells;
        let marked_candidates = cells.glyphs_reaching(|i| layout.entries[i].mark);
        let mut pool = PayloadPool::new();
        let mut place = |full: Vec<(u16, u16)>| {
            let Some(min) = full.first().map(|(glyph, _)| *glyph as usize) else {
                return NO_MAP;
            };
            let placed = pool.place(
                full.clone(),
                || {
                    full.iter()
                        .map(|(glyph, value)| (*glyph as usize - min, *value))
                        .collect()
                },
                // an offset of 0xFFFF would read as "no map"
                |offset| offset + 1 == min,
            );
            (placed as isize - min as isize).rem_euclid(0x10000) as u16
        };
        let offsets = layout
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let marked = if entry.action.marked.is_empty() {
                    NO_MAP
                } else {
                    place(full_map(&entry.action.marked, &marked_candidates))
                };
                let current = if entry.action.current.is_empty() {
                    NO_MAP
                } else {
                    place(full_map(
                        &entry.action.current,
                        &cells.glyphs_reaching(|cell| cell == i),
                    ))
                };
                [marked, current]
            })
            .collect();
        log::debug!(
            "packed {} substitution maps into {} words",
            pool.num_lists(),
            pool.len()
        );
        PackedMaps {
            words: pool.into_words(),
            offsets,
        }
    }

    fn write_entry(
        index: usize,
        _entry: &Entry<Self>,
        flags: u16,
        packed: &PackedMaps,
        _stakes: &EntryStakes,
        writer: &mut LinkedWriter,
    ) {
        writer.write_u16(flags);
        for offset in packed.offsets[index] {
            writer.write_u16(offset);
        }
    }

    fn write_payloads(packed: &PackedMaps, writer: &mut LinkedWriter) {
        for word in &packed.words {
            writer.write_u16(*word);
        }
    }

    fn decode_actions(layout: &DecodeLayout) -> Result<Vec<Self>, DecodeError> {
        let cells = &layout.cells;
        let marked_candidates = cells.glyphs_reaching(|i| layout.entries[i].flags & MARK != 0);
        let read_map = |offset: u16, candidates: &BTreeSet<GlyphId16>| {
            let mut map = BTreeMap::new();
            if offset == NO_MAP {
                return Ok(map);
            }
            for glyph in candidates {
                let word = (glyph.to_u16() as usize + offset as usize) % 0x10000;
                let pos = layout.payload.start + 2 * word;
                let value = GlyphId16::new(
                    Cursor::region(layout.data, pos, layout.payload.end, "substitution table")
                        .read_u16()?,
                );
                if value != *glyph {
                    map.insert(*glyph, value);
                }
            }
            Ok::<_, DecodeError>(map)
        };
        layout
            .entries
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                Ok::<_, DecodeError>(ContextualAction {
                    marked: read_map(raw.fields[0], &marked_candidates)?,
                    current: read_map(raw.fields[1], &cells.glyphs_reaching(|cell| cell == i))?,
                })
            })
            .collect()
    }
}

impl StateTable<ContextualAction> {
    /// Every glyph each glyph can become through a single substitution.
    pub fn glyph_effects(&self) -> BTreeMap<GlyphId16, BTreeSet<GlyphId16>> {
        let mut effects: BTreeMap<_, BTreeSet<_>> = BTreeMap::new();
        for (_, row) in self.rows() {
            for (_, entry) in row.iter() {
                for (from, to) in entry.action.marked.iter().chain(&entry.action.current) {
                    effects.entry(*from).or_default().insert(*to);
                }
            }
        }
        effects
    }
}
