//! The logical state table.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use read_fonts::types::GlyphId16;

use crate::{
    codec::{self, DecodeArgs, EncodeOptions},
    error::{DecodeError, EncodeError},
    names::{class, state, MAX_CLASSES},
    validate::{Validate, ValidationCtx},
    Action, ClassTable, Coverage, Entry, StateRow,
};

/// The most entries a table can hold; state array cells are one byte.
pub const MAX_ENTRIES: usize = 256;

/// A finite state machine over glyph classes.
///
/// States and classes are identified by name. Each state has a
/// [`StateRow`] giving the [`Entry`] to follow for each class, and the
/// [`ClassTable`] assigns glyphs to classes.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateTable<A: Action> {
    rows: IndexMap<String, StateRow<A>>,
    pub class_table: ClassTable,
    pub coverage: Coverage,
    /// The sub-feature mask or variation tuple index of the subtable.
    pub selector: A::Selector,
}

impl<A: Action> StateTable<A> {
    /// A table containing the two start states and nothing else.
    pub fn new() -> Self {
        StateTable {
            rows: state::RESERVED
                .iter()
                .map(|name| (name.to_string(), StateRow::new()))
                .collect(),
            class_table: ClassTable::new(),
            coverage: Coverage::new(A::KIND),
            selector: Default::default(),
        }
    }

    pub fn with_coverage(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_selector(mut self, selector: A::Selector) -> Self {
        self.selector = selector;
        self
    }

    /// The state names, in table order.
    pub fn states(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.keys().map(String::as_str)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &StateRow<A>)> + '_ {
        self.rows.iter().map(|(name, row)| (name.as_str(), row))
    }

    pub fn num_states(&self) -> usize {
        self.rows.len()
    }

    pub fn contains_state(&self, name: &str) -> bool {
        self.rows.contains_key(name)
    }

    pub fn row(&self, name: &str) -> Option<&StateRow<A>> {
        self.rows.get(name)
    }

    pub fn row_mut(&mut self, name: &str) -> Option<&mut StateRow<A>> {
        self.rows.get_mut(name)
    }

    /// The row for a state, adding an empty one if the state is new.
    pub fn add_state(&mut self, name: impl Into<String>) -> &mut StateRow<A> {
        self.rows.entry(name.into()).or_default()
    }

    /// Replace the row for a state.
    pub fn insert_row(&mut self, name: impl Into<String>, row: StateRow<A>) -> Option<StateRow<A>> {
        self.rows.insert(name.into(), row)
    }

    /// Set one cell, adding the state if needed.
    pub fn set_entry(&mut self, state: &str, class: &str, entry: Entry<A>) {
        self.add_state(state).insert(class, entry);
    }

    pub fn entry(&self, state: &str, class: &str) -> Option<&Entry<A>> {
        self.rows.get(state)?.get(class)
    }

    /// Every class name the table knows about.
    ///
    /// The reserved classes come first, then classes in the order they are
    /// first seen in the rows, then classes only named by the class table.
    pub fn class_names(&self) -> IndexSet<&str> {
        let mut names = class::RESERVED.iter().copied().collect::<IndexSet<_>>();
        names.extend(self.rows.values().flat_map(|row| row.iter().map(|(c, _)| c)));
        names.extend(self.class_table.iter().map(|(_, name)| name));
        names
    }

    /// The class of a glyph, as seen by the state machine.
    ///
    /// Glyphs without a class are "Out of bounds"; the deleted glyph
    /// markers `0xFFFF` and `0xFFFE` are "Deleted glyph".
    pub fn class_of(&self, glyph: GlyphId16) -> &str {
        if glyph.to_u16() >= 0xFFFE {
            return class::DELETED_GLYPH;
        }
        self.class_table
            .get(glyph)
            .unwrap_or(class::OUT_OF_BOUNDS)
    }

    /// Fill in missing cells and put every payload in canonical form.
    ///
    /// Both start states are added if missing ("Start of line" copies
    /// "Start of text"), every row gets an entry for every known class, and
    /// missing cells stay in their own state doing nothing. Class table
    /// assignments to "Out of bounds" are dropped, since absence already
    /// means that. Normalizing twice gives the same table as normalizing once.
    pub fn normalize(&mut self) {
        if !self.rows.contains_key(state::START_OF_TEXT) {
            self.rows
                .shift_insert(0, state::START_OF_TEXT.to_string(), StateRow::new());
        }
        if !self.rows.contains_key(state::START_OF_LINE) {
            let row = self.rows[state::START_OF_TEXT].clone();
            let idx = self.rows.get_index_of(state::START_OF_TEXT).unwrap_or(0) + 1;
            self.rows
                .shift_insert(idx, state::START_OF_LINE.to_string(), row);
        }
        self.class_table
            .retain(|_, name| name.as_str() != class::OUT_OF_BOUNDS);

        let classes = self
            .class_names()
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        for (state_name, row) in self.rows.iter_mut() {
            for class_name in &classes {
                row.get_or_insert_with(class_name, || Entry::new(state_name.clone()));
            }
            for (_, entry) in row.iter_mut() {
                entry.action.canonicalize();
            }
        }
    }

    /// A normalized copy of the table.
    pub fn normalized(&self) -> Self {
        let mut table = self.clone();
        table.normalize();
        table
    }

    /// Rename states; names missing from `renames` are kept.
    ///
    /// Row keys and the targets of every entry are updated.
    pub fn rename_states(&mut self, renames: &HashMap<String, String>) {
        let lookup = |name: &str| renames.get(name).cloned();
        self.rows = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|(name, mut row)| {
                for (_, entry) in row.iter_mut() {
                    if let Some(new) = lookup(&entry.next_state) {
                        entry.next_state = new;
                    }
                }
                (lookup(&name).unwrap_or(name), row)
            })
            .collect();
    }

    /// Rename classes; names missing from `renames` are kept.
    ///
    /// Both the rows and the class table are updated.
    pub fn rename_classes(&mut self, renames: &HashMap<String, String>) {
        for row in self.rows.values_mut() {
            row.rename_classes(|name| renames.get(name).cloned());
        }
        self.class_table.rename(renames);
    }

    /// Encode the table with default options.
    ///
    /// The table is normalized and validated first.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        self.encode_with_options(&EncodeOptions::default())
    }

    pub fn encode_with_options(&self, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
        codec::encode(self, options)
    }

    /// Decode a table from the bytes of one subtable.
    ///
    /// The result is not validated.
    pub fn decode(data: &[u8], args: &DecodeArgs<A::Selector>) -> Result<Self, DecodeError> {
        codec::decode(data, args)
    }

    /// The number of distinct entries, once normalized.
    fn num_distinct_entries(&self) -> usize {
        self.rows
            .values()
            .flat_map(|row| row.iter().map(|(_, entry)| entry))
            .collect::<HashSet<_>>()
            .len()
    }
}

impl<A: Action> Default for StateTable<A> {
    fn default() -> Self {
        StateTable::new()
    }
}

impl<A: Action> Validate for StateTable<A> {
    fn validate_impl(&self, ctx: &mut ValidationCtx) {
        ctx.in_table("StateTable", |ctx| {
            for name in state::RESERVED {
                if !self.rows.contains_key(name) {
                    ctx.report(format!("missing state '{name}'"));
                }
            }
            for (state_name, row) in self.rows() {
                ctx.in_state(state_name, |ctx| {
                    for (class_name, entry) in row.iter() {
                        ctx.in_class(class_name, |ctx| {
                            if !self.rows.contains_key(&entry.next_state) {
                                ctx.in_field("next_state", |ctx| {
                                    ctx.report(format!(
                                        "next state '{}' is not in the table",
                                        entry.next_state
                                    ))
                                });
                            }
                            if entry.no_advance && entry.next_state == state_name {
                                ctx.report("entry loops on its own state without advancing");
                            }
                        })
                    }
                })
            }

            let num_classes = self.class_names().len();
            if num_classes > MAX_CLASSES {
                ctx.report(format!(
                    "{num_classes} classes, at most {MAX_CLASSES} are allowed"
                ));
            }
            ctx.in_field("class_table", |ctx| {
                if self.class_table.get(GlyphId16::new(0xFFFF)).is_some() {
                    ctx.report("glyph 0xFFFF is the deleted glyph and cannot be classified");
                }
            });
            ctx.in_field("coverage", |ctx| {
                if self.coverage.kind != A::KIND.nibble() {
                    ctx.report(format!(
                        "kind {} does not match {:?} tables ({})",
                        self.coverage.kind,
                        A::KIND,
                        A::KIND.nibble()
                    ));
                }
            });

            let normalized = self.normalized();
            let num_entries = normalized.num_distinct_entries();
            if num_entries > MAX_ENTRIES {
                ctx.report(format!(
                    "{num_entries} distinct entries, at most {MAX_ENTRIES} are allowed"
                ));
            }
            A::validate_kind(&normalized, ctx);
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        kerning::{KernValue, KerningAction},
        ContextualAction,
    };

    fn gid(raw: u16) -> GlyphId16 {
        GlyphId16::new(raw)
    }

    fn small_table() -> StateTable<KerningAction> {
        let mut table = StateTable::new();
        table.class_table.insert(gid(5), "letter");
        table.set_entry(
            state::START_OF_TEXT,
            "letter",
            Entry::new("Saw letter").with_mark(),
        );
        table.set_entry(
            "Saw letter",
            "letter",
            Entry::new(state::START_OF_TEXT).with_action(KerningAction::new([KernValue::new(-40)])),
        );
        table
    }

    #[test]
    fn normalize_fills_every_cell() {
        let table = small_table().normalized();
        assert_eq!(
            table.states().collect::<Vec<_>>(),
            [state::START_OF_TEXT, state::START_OF_LINE, "Saw letter"]
        );
        for (state_name, row) in table.rows() {
            assert_eq!(row.len(), 5, "{state_name}");
        }
        // missing cells stay put
        assert_eq!(
            table.entry("Saw letter", class::DELETED_GLYPH),
            Some(&Entry::new("Saw letter"))
        );
        assert_eq!(
            table.entry(state::START_OF_LINE, class::END_OF_TEXT),
            Some(&Entry::new(state::START_OF_LINE))
        );
    }

    #[test]
    fn start_of_line_copies_start_of_text() {
        let table = small_table().normalized();
        assert_eq!(
            table.entry(state::START_OF_LINE, "letter"),
            table.entry(state::START_OF_TEXT, "letter")
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = small_table().normalized();
        let twice = once.normalized();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_keeps_closure() {
        let table = small_table().normalized();
        for (_, row) in table.rows() {
            for (_, entry) in row.iter() {
                assert!(table.contains_state(&entry.next_state));
            }
        }
    }

    #[test]
    fn normalize_drops_out_of_bounds_assignments() {
        let mut table = small_table();
        table.class_table.insert(gid(9), class::OUT_OF_BOUNDS);
        let table = table.normalized();
        assert_eq!(table.class_table.get(gid(9)), None);
        assert_eq!(table.class_of(gid(9)), class::OUT_OF_BOUNDS);
        assert_eq!(table.class_of(gid(0xFFFF)), class::DELETED_GLYPH);
        assert_eq!(table.class_of(gid(0xFFFE)), class::DELETED_GLYPH);
    }

    #[test]
    fn valid_table_passes() {
        assert!(small_table().validate().is_ok());
    }

    #[test]
    fn missing_state_is_reported() {
        let mut table = small_table();
        table.set_entry("Saw letter", class::END_OF_TEXT, Entry::new("Nowhere"));
        let report = table.validate().unwrap_err();
        assert_eq!(
            report.messages().collect::<Vec<_>>(),
            ["next state 'Nowhere' is not in the table"]
        );
    }

    #[test]
    fn self_loop_without_advance_is_reported() {
        let mut table = small_table();
        table.set_entry(
            "Saw letter",
            class::DELETED_GLYPH,
            Entry::new("Saw letter").with_no_advance(),
        );
        let report = table.validate().unwrap_err();
        assert_eq!(report.len(), 1);
        assert!(report.to_string().contains("state 'Saw letter' class 'Deleted glyph'"));
    }

    #[test]
    fn too_many_classes_is_reported() {
        let mut table = small_table();
        for i in 0..260u16 {
            table.class_table.insert(gid(100 + i), format!("c{i}"));
        }
        let report = table.validate().unwrap_err();
        assert!(report
            .messages()
            .any(|msg| msg == "265 classes, at most 256 are allowed"));
    }

    #[test]
    fn missing_start_state_is_reported() {
        let mut table = StateTable::<ContextualAction>::default();
        table.rows.shift_remove(state::START_OF_LINE);
        let report = table.validate().unwrap_err();
        assert_eq!(
            report.messages().collect::<Vec<_>>(),
            ["missing state 'Start of line'"]
        );
    }

    #[test]
    fn coverage_kind_must_match() {
        let mut table = small_table();
        table.coverage.kind = 5;
        assert!(table.validate().is_err());
    }

    #[test]
    fn rename_states_and_classes() {
        let mut table = small_table();
        table.rename_states(&HashMap::from([("Saw letter".into(), "After".into())]));
        table.rename_classes(&HashMap::from([("letter".into(), "alpha".into())]));
        assert!(table.contains_state("After"));
        assert!(!table.contains_state("Saw letter"));
        assert_eq!(
            table.entry(state::START_OF_TEXT, "alpha").map(|e| e.next_state.as_str()),
            Some("After")
        );
        assert_eq!(table.class_table.get(gid(5)), Some("alpha"));
        assert!(table.validate().is_ok());
    }
}
