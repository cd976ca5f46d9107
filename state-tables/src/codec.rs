//! Encoding and decoding of whole state tables.
//!
//! Every kind shares one layout:
//!
//! ```text
//! header         numClasses, classTableOffset, stateArrayOffset,
//!                entryTableOffset, payloadAreaOffset (all u16), and for
//!                kerning a trailing valueArrayEndOffset
//! name stash     optional, see `names`
//! class table    see `class_table`
//! state array    numStates * numClasses one-byte entry indices
//! entry table    newStateOffset: u16, flags: u16, then kind-specific words
//! payload area   kind-specific words
//! ```
//!
//! All offsets are bytes from the start of the subtable. The kind-specific
//! parts are supplied by each [`Action`] through [`ActionCodec`].

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
};

use read_fonts::{types::GlyphId16, FontData};

use crate::{
    class_table::{self, ClassTableFormat},
    error::{DecodeError, EncodeError, NameError},
    names::{self, NameRegistry, MAX_CLASSES},
    pool::Pool,
    read::{region_end, Cursor},
    validate::Validate,
    write::{LinkedWriter, Stake},
    Action, ClassTable, Coverage, Entry, StateRow, StateTable,
};

/// Entry flag: remember (or push) the current glyph.
pub const MARK: u16 = 0x8000;
/// Entry flag: process the current glyph again.
pub const NO_ADVANCE: u16 = 0x4000;

/// Options that control encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Store state and class names after the header, so that decoding
    /// recovers them. On by default.
    pub write_names: bool,
    /// Use this class table format when it can represent the table.
    pub class_table_format: Option<ClassTableFormat>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            write_names: true,
            class_table_format: None,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_names(mut self, write_names: bool) -> Self {
        self.write_names = write_names;
        self
    }

    pub fn with_class_table_format(mut self, format: Option<ClassTableFormat>) -> Self {
        self.class_table_format = format;
        self
    }
}

/// What a decoder needs to know that the subtable itself does not say.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeArgs<S> {
    /// The number of glyphs in the font; every classified glyph must be below it.
    pub glyph_count: u16,
    pub coverage: Coverage,
    pub selector: S,
}

impl<S: Default> DecodeArgs<S> {
    pub fn new(glyph_count: u16, coverage: Coverage) -> Self {
        DecodeArgs {
            glyph_count,
            coverage,
            selector: S::default(),
        }
    }
}

impl<S> DecodeArgs<S> {
    pub fn with_selector(self, selector: S) -> Self {
        DecodeArgs {
            glyph_count: self.glyph_count,
            coverage: self.coverage,
            selector,
        }
    }
}

/// The state array, with class membership.
///
/// Shared by encoding and decoding so the kinds can reason about which
/// glyphs reach which entry.
#[derive(Clone, Debug)]
pub struct CellLayout {
    pub num_classes: usize,
    /// Entry indices, `num_classes` per state.
    pub cells: Vec<usize>,
    /// The glyphs of each class, by class index.
    pub class_glyphs: Vec<Vec<GlyphId16>>,
}

impl CellLayout {
    fn new(num_classes: usize, cells: Vec<usize>, classes: &BTreeMap<GlyphId16, u8>) -> Self {
        let mut class_glyphs = vec![Vec::new(); num_classes];
        for (gid, class) in classes {
            if let Some(glyphs) = class_glyphs.get_mut(*class as usize) {
                glyphs.push(*gid);
            }
        }
        CellLayout {
            num_classes,
            cells,
            class_glyphs,
        }
    }

    pub fn num_states(&self) -> usize {
        self.cells.len() / self.num_classes.max(1)
    }

    /// The glyphs whose class, in some state, leads to any entry accepted by `f`.
    pub fn glyphs_reaching(&self, f: impl Fn(usize) -> bool) -> BTreeSet<GlyphId16> {
        let mut classes = BTreeSet::new();
        for (i, entry) in self.cells.iter().enumerate() {
            if f(*entry) {
                classes.insert(i % self.num_classes);
            }
        }
        classes
            .into_iter()
            .flat_map(|class| self.class_glyphs[class].iter().copied())
            .collect()
    }
}

/// A normalized table resolved to indices, ready to be written.
pub struct EncodeLayout<'a, A> {
    pub names: NameRegistry,
    /// Distinct entries, in entry table order.
    pub entries: Vec<&'a Entry<A>>,
    pub cells: CellLayout,
    pub cross_stream: bool,
}

impl<'a, A: Action> EncodeLayout<'a, A> {
    /// Resolve a normalized table.
    pub(crate) fn new(table: &'a StateTable<A>) -> Result<Self, NameError> {
        let names = NameRegistry::for_table(table)?;
        let mut pool = Pool::new();
        let mut cells = Vec::with_capacity(names.num_states() * names.num_classes());
        for state_name in names.states() {
            let row = table
                .row(state_name)
                .ok_or_else(|| NameError::UnknownName(state_name.clone()))?;
            for class_name in names.classes() {
                let entry = row
                    .get(class_name)
                    .ok_or_else(|| NameError::UnknownName(class_name.clone()))?;
                cells.push(pool.intern(entry));
            }
        }
        let classes = table
            .class_table
            .iter()
            .filter_map(|(gid, name)| Some((gid, names.class_index(name)?)))
            .collect();
        let cells = CellLayout::new(names.num_classes(), cells, &classes);
        Ok(EncodeLayout {
            names,
            entries: pool.into_items(),
            cells,
            cross_stream: table.coverage.cross_stream,
        })
    }
}

/// The positions entries may point at.
pub struct EntryStakes {
    /// The start of the subtable.
    pub base: Stake,
    /// The start of the payload area.
    pub payload: Stake,
}

/// An entry table record before its payload is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub new_state: u16,
    pub flags: u16,
    /// The kind-specific words; unused words are zero.
    pub fields: [u16; 2],
}

/// A subtable resolved to indices, ready to have its payloads read.
pub struct DecodeLayout<'a> {
    pub data: FontData<'a>,
    pub entries: Vec<RawEntry>,
    pub cells: CellLayout,
    /// Byte range of the payload area.
    pub payload: Range<usize>,
    pub cross_stream: bool,
}

/// The binary hooks of an [`Action`].
pub trait ActionCodec: Sized {
    /// The number of words in an entry record after `newStateOffset` and `flags`.
    const ENTRY_FIELDS: usize;
    /// Whether the header ends with the offset past the payload area.
    const HAS_PAYLOAD_LIMIT: bool;

    /// Payload placement, computed once before anything is written.
    type Packed;

    fn pack(layout: &EncodeLayout<Self>) -> Self::Packed;

    /// Write the flags word and kind-specific words of one entry.
    ///
    /// `flags` already holds the mark and no-advance bits.
    fn write_entry(
        index: usize,
        entry: &Entry<Self>,
        flags: u16,
        packed: &Self::Packed,
        stakes: &EntryStakes,
        writer: &mut LinkedWriter,
    );

    fn write_payloads(packed: &Self::Packed, writer: &mut LinkedWriter);

    /// Read the payload of every entry, in entry table order.
    fn decode_actions(layout: &DecodeLayout) -> Result<Vec<Self>, DecodeError>;
}

pub(crate) fn encode<A: Action>(
    table: &StateTable<A>,
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let table = table.normalized();
    table.validate()?;
    let layout = EncodeLayout::new(&table)?;
    let packed = A::pack(&layout);
    let names = &layout.names;
    log::debug!(
        "encoding {:?} table: {} states, {} classes, {} entries",
        A::KIND,
        names.num_states(),
        names.num_classes(),
        layout.entries.len()
    );

    let mut writer = LinkedWriter::new();
    let base = writer.stake_here();
    let class_table = writer.stake();
    let state_array = writer.stake();
    let entry_table = writer.stake();
    let payload = writer.stake();
    let payload_end = writer.stake();

    writer.write_u16(names.num_classes() as u16);
    writer.write_offset(base, class_table, 0, "classTableOffset");
    writer.write_offset(base, state_array, 0, "stateArrayOffset");
    writer.write_offset(base, entry_table, 0, "entryTableOffset");
    writer.write_offset(base, payload, 0, "payloadAreaOffset");
    if A::HAS_PAYLOAD_LIMIT {
        writer.write_offset(base, payload_end, 0, "valueArrayEndOffset");
    }
    if options.write_names {
        if let Some(stash) = names.stash_bytes() {
            writer.write_slice(&stash);
        }
    }

    writer.place(class_table);
    writer.write_slice(
        &table
            .class_table
            .encode(names, options.class_table_format)?,
    );
    writer.align(2);

    writer.place(state_array);
    let rows = (0..names.num_states())
        .map(|_| writer.stake())
        .collect::<Vec<_>>();
    for (row, cells) in rows
        .iter()
        .zip(layout.cells.cells.chunks(layout.cells.num_classes))
    {
        writer.place(*row);
        for cell in cells {
            // validation caps the entry count at 256
            writer.write_u8(*cell as u8);
        }
    }
    writer.align(2);

    writer.place(entry_table);
    let stakes = EntryStakes { base, payload };
    for (i, entry) in layout.entries.iter().enumerate() {
        let next = names
            .state_index(&entry.next_state)
            .ok_or_else(|| NameError::UnknownName(entry.next_state.clone()))?;
        writer.write_offset(base, rows[next], 0, "newStateOffset");
        let mut flags = 0;
        if entry.mark {
            flags |= MARK;
        }
        if entry.no_advance {
            flags |= NO_ADVANCE;
        }
        A::write_entry(i, entry, flags, &packed, &stakes, &mut writer);
    }

    writer.place(payload);
    A::write_payloads(&packed, &mut writer);
    writer.place(payload_end);
    writer.finish()
}

const OFFSET_FIELDS: [&str; 5] = [
    "classTableOffset",
    "stateArrayOffset",
    "entryTableOffset",
    "payloadAreaOffset",
    "valueArrayEndOffset",
];

pub(crate) fn decode<A: Action>(
    bytes: &[u8],
    args: &DecodeArgs<A::Selector>,
) -> Result<StateTable<A>, DecodeError> {
    let data = FontData::new(bytes);
    let len = data.len();
    let mut header = Cursor::new(data, "header");
    let raw_num_classes = header.read_u16()?;
    if raw_num_classes < names::class::RESERVED.len() as u16 {
        return Err(DecodeError::TooFewClasses(raw_num_classes));
    }
    if raw_num_classes as usize > MAX_CLASSES {
        return Err(DecodeError::TooManyClasses(raw_num_classes));
    }
    let num_classes = raw_num_classes as usize;

    let num_offsets = if A::HAS_PAYLOAD_LIMIT { 5 } else { 4 };
    let mut offsets = Vec::with_capacity(num_offsets);
    for _ in 0..num_offsets {
        offsets.push(header.read_u16()? as usize);
    }
    let header_len = header.position();
    for (field, offset) in OFFSET_FIELDS.iter().zip(&offsets) {
        if *offset < header_len || *offset > len {
            return Err(DecodeError::OffsetOutOfBounds {
                field,
                offset: *offset,
                len,
            });
        }
    }
    let (class_off, state_off, entry_off, payload_off) =
        (offsets[0], offsets[1], offsets[2], offsets[3]);
    let payload_end = match offsets.get(4) {
        Some(end) if *end < payload_off => {
            return Err(DecodeError::OffsetOutOfBounds {
                field: OFFSET_FIELDS[4],
                offset: *end,
                len,
            })
        }
        Some(end) => *end,
        None => len,
    };
    let region = |start: usize, context| {
        Cursor::region(data, start, region_end(start, &offsets, len), context)
    };

    let first_structure = offsets.iter().copied().min().unwrap_or(len);
    let stash = names::read_name_stash(&mut Cursor::region(
        data,
        header_len,
        first_structure,
        "name data",
    ))?;

    let classes = class_table::decode_indices(
        &mut region(class_off, "class table"),
        num_classes,
        args.glyph_count,
    )?;

    let record_len = 4 + 2 * A::ENTRY_FIELDS;
    let mut cursor = region(entry_off, "entry table");
    let num_entries = cursor.remaining() / record_len;
    if num_entries == 0 {
        return Err(DecodeError::EmptyEntryTable);
    }
    let mut entries = Vec::with_capacity(num_entries);
    for _ in 0..num_entries {
        let mut entry = RawEntry {
            new_state: cursor.read_u16()?,
            flags: cursor.read_u16()?,
            ..Default::default()
        };
        for field in entry.fields.iter_mut().take(A::ENTRY_FIELDS) {
            *field = cursor.read_u16()?;
        }
        entries.push(entry);
    }

    let mut targets = Vec::with_capacity(num_entries);
    for (i, entry) in entries.iter().enumerate() {
        let target = (entry.new_state as usize)
            .checked_sub(state_off)
            .filter(|rel| rel % num_classes == 0)
            .map(|rel| rel / num_classes)
            .ok_or(DecodeError::MisalignedStateOffset {
                entry: i,
                offset: entry.new_state,
            })?;
        targets.push(target);
    }
    let referenced_states = targets.iter().map(|t| t + 1).max().unwrap_or(0);
    let mut num_states = referenced_states.max(names::state::RESERVED.len());
    if let Some(stash) = &stash {
        if stash.classes.len() + names::class::RESERVED.len() != num_classes {
            return Err(DecodeError::InvalidNameStash("class count does not match"));
        }
        let stashed_states = stash.states.len() + names::state::RESERVED.len();
        if stashed_states < num_states {
            return Err(DecodeError::InvalidNameStash("fewer names than states"));
        }
        num_states = stashed_states;
    }

    let mut cursor = region(state_off, "state array");
    let mut cells = Vec::with_capacity(num_states * num_classes);
    for i in 0..num_states * num_classes {
        let index = cursor.read_u8()?;
        if index as usize >= num_entries {
            return Err(DecodeError::EntryIndexOutOfRange {
                state: i / num_classes,
                class: i % num_classes,
                index,
                num_entries,
            });
        }
        cells.push(index as usize);
    }

    let names = match stash {
        Some(stash) => NameRegistry::new(stash.states, stash.classes)?,
        None => NameRegistry::synthesized(num_states, num_classes)?,
    };
    let layout = DecodeLayout {
        data,
        entries,
        cells: CellLayout::new(num_classes, cells, &classes),
        payload: payload_off..payload_end,
        cross_stream: args.coverage.cross_stream,
    };
    let actions = A::decode_actions(&layout)?;
    log::debug!(
        "decoded {:?} table: {num_states} states, {num_classes} classes, {num_entries} entries",
        A::KIND
    );

    let mut table = StateTable::new()
        .with_coverage(args.coverage)
        .with_selector(args.selector.clone());
    table.class_table = ClassTable::from_indices(&classes, names.classes());
    for (state_idx, cells) in layout.cells.cells.chunks(num_classes).enumerate() {
        let row = cells
            .iter()
            .zip(names.classes())
            .map(|(entry_idx, class_name)| {
                let raw = &layout.entries[*entry_idx];
                let entry = Entry {
                    next_state: names.states()[targets[*entry_idx]].clone(),
                    mark: raw.flags & MARK != 0,
                    no_advance: raw.flags & NO_ADVANCE != 0,
                    action: actions[*entry_idx].clone(),
                };
                (class_name.clone(), entry)
            })
            .collect::<StateRow<A>>();
        table.insert_row(names.states()[state_idx].clone(), row);
    }
    Ok(table)
}
