//! Building kerning state tables from two-axis class kerning.
//!
//! A class kerning table assigns each glyph a left class and a right class
//! and gives a value for each pair of classes. A state table only has one
//! class per glyph, so each distinct combination of left and right class
//! becomes one combined class, and the machine remembers the left class of
//! the previous glyph in its state.

use std::collections::{BTreeMap, BTreeSet};

use read_fonts::types::GlyphId16;

use crate::{
    kerning::{KernValue, KerningAction},
    names::{class, state},
    Action, Coverage, Entry, StateRow, StateTable,
};

/// Kerning by left and right glyph class.
///
/// Class zero on either axis means the glyph is unclassified on that axis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassKerningTable {
    pub left_classes: BTreeMap<GlyphId16, u16>,
    pub right_classes: BTreeMap<GlyphId16, u16>,
    /// Values by `(left class, right class)`.
    pub values: BTreeMap<(u16, u16), i16>,
    pub coverage: Coverage,
    pub tuple_index: Option<u16>,
}

/// The left and right class of a combined class; zero is unclassified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Combined {
    left: u16,
    right: u16,
}

impl Combined {
    fn name(self) -> String {
        match (self.left, self.right) {
            (0, right) => format!("class_R_{right}"),
            (left, 0) => format!("class_L_{left}"),
            (left, right) => format!("class_LR_{left}_{right}"),
        }
    }
}

fn left_state(left: u16) -> String {
    format!("Saw_L_{left}")
}

impl ClassKerningTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// The kerning between two glyphs, if their classes have a value.
    pub fn kerning(&self, left: GlyphId16, right: GlyphId16) -> Option<i16> {
        let left = *self.left_classes.get(&left)?;
        let right = *self.right_classes.get(&right)?;
        self.values.get(&(left, right)).copied()
    }

    /// The combined class of every glyph classified on either axis.
    fn combined_classes(&self) -> BTreeMap<GlyphId16, Combined> {
        let glyphs = self
            .left_classes
            .keys()
            .chain(self.right_classes.keys())
            .copied()
            .collect::<BTreeSet<_>>();
        glyphs
            .into_iter()
            .filter_map(|glyph| {
                let combined = Combined {
                    left: self.left_classes.get(&glyph).copied().unwrap_or_default(),
                    right: self.right_classes.get(&glyph).copied().unwrap_or_default(),
                };
                (combined.left != 0 || combined.right != 0).then_some((glyph, combined))
            })
            .collect()
    }

    /// The nonzero values between classified pairs.
    fn pair_values(&self) -> impl Iterator<Item = ((u16, u16), i16)> + '_ {
        self.values
            .iter()
            .filter(|((left, right), value)| *left != 0 && *right != 0 && **value != 0)
            .map(|(pair, value)| (*pair, *value))
    }

    /// Build an equivalent state table.
    ///
    /// Each glyph with a left class that starts some pair is pushed and
    /// remembered in a `Saw_L_n` state; the following glyph's right class
    /// then selects the value that pops it. Glyphs that can be both the
    /// right side of one pair and the left side of the next are pushed
    /// again as their value is applied.
    pub fn to_state_table(&self) -> StateTable<KerningAction> {
        let combined = self.combined_classes();
        let values = self.pair_values().collect::<BTreeMap<_, _>>();
        let lefts = values
            .keys()
            .map(|(left, _)| *left)
            .collect::<BTreeSet<_>>();
        // class names in order of their first glyph
        let mut classes = Vec::<Combined>::new();
        for class in combined.values() {
            if !classes.contains(class) {
                classes.push(*class);
            }
        }
        log::debug!(
            "converting class kerning: {} glyphs, {} combined classes, {} left states",
            combined.len(),
            classes.len(),
            lefts.len()
        );

        let mut table = StateTable::new()
            .with_coverage(Coverage {
                kind: KerningAction::KIND.nibble(),
                ..self.coverage
            })
            .with_selector(self.tuple_index);
        table.class_table = combined
            .iter()
            .map(|(glyph, class)| (*glyph, class.name()))
            .collect();

        // where a glyph of this class goes when it may start a pair
        let start_pair = |class: &Combined| -> Option<Entry<KerningAction>> {
            lefts
                .contains(&class.left)
                .then(|| Entry::new(left_state(class.left)).with_mark())
        };
        let reserved_row = |current: &str| -> StateRow<KerningAction> {
            [
                (class::END_OF_TEXT, Entry::new(state::START_OF_TEXT)),
                (class::OUT_OF_BOUNDS, Entry::new(state::START_OF_TEXT)),
                (class::DELETED_GLYPH, Entry::new(current)),
                (class::END_OF_LINE, Entry::new(state::START_OF_TEXT)),
            ]
            .into_iter()
            .collect()
        };

        for start in state::RESERVED {
            let mut row = reserved_row(start);
            for class in &classes {
                let entry = start_pair(class).unwrap_or_else(|| Entry::new(state::START_OF_TEXT));
                row.insert(class.name(), entry);
            }
            table.insert_row(start, row);
        }

        for left in &lefts {
            let state_name = left_state(*left);
            let mut row = reserved_row(&state_name);
            for class in &classes {
                let value = values.get(&(*left, class.right)).copied();
                let entry = match (value, start_pair(class)) {
                    // pop the left glyph, then push this one as the next left
                    (Some(value), Some(next)) => {
                        next.with_action(KerningAction::new([KernValue::new(value)]))
                    }
                    (Some(value), None) => Entry::new(state::START_OF_TEXT)
                        .with_action(KerningAction::new([KernValue::new(value)])),
                    (None, Some(next)) => next,
                    (None, None) => Entry::new(state::START_OF_TEXT),
                };
                row.insert(class.name(), entry);
            }
            table.insert_row(state_name, row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{
        codec::DecodeArgs, kerning::pair_kerning, validate::Validate, TableKind, Walker,
    };

    fn gid(raw: u16) -> GlyphId16 {
        GlyphId16::new(raw)
    }

    fn source() -> ClassKerningTable {
        ClassKerningTable {
            left_classes: BTreeMap::from([(gid(10), 1), (gid(11), 2), (gid(13), 0)]),
            right_classes: BTreeMap::from([(gid(11), 1), (gid(12), 2), (gid(14), 3)]),
            values: BTreeMap::from([((1, 1), -30), ((2, 2), -40), ((1, 3), 0), ((0, 2), 50)]),
            coverage: Coverage::new(TableKind::Kerning),
            tuple_index: None,
        }
    }

    #[test]
    fn combined_class_names() {
        let table = source().to_state_table();
        let classes = &table.class_table;
        assert_eq!(classes.get(gid(10)), Some("class_L_1"));
        assert_eq!(classes.get(gid(11)), Some("class_LR_2_1"));
        assert_eq!(classes.get(gid(12)), Some("class_R_2"));
        // unclassified on both axes
        assert_eq!(classes.get(gid(13)), None);
        assert_eq!(classes.get(gid(14)), Some("class_R_3"));
    }

    #[test]
    fn one_state_per_left_class() {
        let table = source().to_state_table();
        assert_eq!(
            table.states().collect::<Vec<_>>(),
            [state::START_OF_TEXT, state::START_OF_LINE, "Saw_L_1", "Saw_L_2"]
        );
    }

    #[test]
    fn every_cell_is_explicit() {
        let table = source().to_state_table();
        let num_classes = table.class_names().len();
        for (state_name, row) in table.rows() {
            assert_eq!(row.len(), num_classes, "{state_name}");
        }
        assert_eq!(table.normalized(), table);
        assert!(table.validate().is_ok());
    }

    #[test]
    fn fused_pairs_kern() {
        let _ = env_logger::builder().is_test(true).try_init();
        let walker = Walker::new(&source().to_state_table()).unwrap();
        for left in [10, 11, 12, 13, 14] {
            for right in [10, 11, 12, 13, 14] {
                let expected = match (left, right) {
                    (10, 11) => -30,
                    (11, 12) => -40,
                    _ => 0,
                };
                assert_eq!(
                    pair_kerning(&walker, gid(left), gid(right)),
                    expected,
                    "{left} {right}"
                );
            }
        }
    }

    #[test]
    fn fusion_consumes_both_glyphs() {
        let walker = Walker::new(&source().to_state_table()).unwrap();
        let run = crate::walker::run_from_glyphs([gid(10), gid(11)]);
        let outcome = walker.run_one(&run, 0, |_| false);
        assert_eq!(outcome.glyphs[0].kerning, -30);
        assert_eq!(outcome.consumed, 2);
    }

    #[test]
    fn right_glyph_starts_next_pair() {
        let table = source().to_state_table();
        let entry = table.entry("Saw_L_1", "class_LR_2_1").unwrap();
        assert_eq!(
            entry,
            &Entry::new("Saw_L_2")
                .with_mark()
                .with_action(KerningAction::new([KernValue::new(-30)]))
        );
        assert_eq!(
            table.entry("Saw_L_1", class::DELETED_GLYPH),
            Some(&Entry::new("Saw_L_1"))
        );
    }

    #[test]
    fn left_classes_are_not_merged() {
        let source = ClassKerningTable {
            left_classes: BTreeMap::from([(gid(1), 1), (gid(2), 2)]),
            right_classes: BTreeMap::from([(gid(3), 1)]),
            values: BTreeMap::from([((1, 1), -10), ((2, 1), -10)]),
            ..Default::default()
        };
        let table = source.to_state_table();
        assert_eq!(table.num_states(), 4);
        assert_eq!(table.coverage.kind, TableKind::Kerning.nibble());
    }

    #[test]
    fn converted_tables_round_trip() {
        let table = source().to_state_table().with_selector(Some(1));
        let bytes = table.encode().unwrap();
        let args = DecodeArgs::new(20, table.coverage).with_selector(Some(1));
        let decoded = StateTable::<KerningAction>::decode(&bytes, &args).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn run_chains_fused_pairs() {
        let source = ClassKerningTable {
            left_classes: BTreeMap::from([(gid(1), 1), (gid(2), 2)]),
            right_classes: BTreeMap::from([(gid(2), 1), (gid(3), 2)]),
            values: BTreeMap::from([((1, 1), -10), ((2, 2), -20)]),
            ..Default::default()
        };
        let walker = Walker::new(&source.to_state_table()).unwrap();
        let run = crate::walker::run_from_glyphs([gid(1), gid(2), gid(3), gid(1), gid(3)]);
        let kerning = walker
            .run(&run, |_| false)
            .iter()
            .map(|glyph| glyph.kerning)
            .collect::<Vec<_>>();
        assert_eq!(kerning, [-10, -20, 0, 0, 0]);
    }

    fn random_source(rng: &mut StdRng, glyphs: u16, classes: u16) -> ClassKerningTable {
        let mut source = ClassKerningTable::new();
        for gid in 1..=glyphs {
            source
                .left_classes
                .insert(GlyphId16::new(gid), rng.gen_range(0..=classes));
            source
                .right_classes
                .insert(GlyphId16::new(gid), rng.gen_range(0..=classes));
        }
        source.left_classes.insert(GlyphId16::new(1), 1);
        for left in 1..=classes {
            for right in 1..=classes {
                if rng.gen_bool(0.4) {
                    // odd values cannot be stored
                    source
                        .values
                        .insert((left, right), rng.gen_range(-300i16..=300) & !1);
                }
            }
        }
        source
    }

    #[test]
    fn random_sources_kern_like_their_classes() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rng = StdRng::seed_from_u64(0x6b65726e);
        for _ in 0..40 {
            let glyphs = rng.gen_range(2u16..16);
            let classes = rng.gen_range(1u16..4);
            let source = random_source(&mut rng, glyphs, classes);
            let table = source.to_state_table();

            let bytes = table.encode().unwrap();
            let args = DecodeArgs::new(glyphs + 1, table.coverage);
            let decoded = StateTable::<KerningAction>::decode(&bytes, &args).unwrap();
            assert_eq!(decoded, table);

            let walker = Walker::new(&decoded).unwrap();
            for left in 1..=glyphs {
                for right in 1..=glyphs {
                    let (left, right) = (gid(left), gid(right));
                    assert_eq!(
                        pair_kerning(&walker, left, right),
                        source.kerning(left, right).unwrap_or_default() as i32,
                        "{left:?} {right:?}"
                    );
                }
            }
        }
    }
}
