//! Running a state table over a glyph sequence.

use read_fonts::types::GlyphId16;

use crate::{
    names::{class, state},
    validate::{Validate, ValidationReport},
    Action, StateTable,
};

/// The number of glyphs the kerning stack holds.
pub const KERNING_STACK_SIZE: usize = 8;

/// One glyph of a run, with its provenance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunGlyph {
    pub glyph: GlyphId16,
    /// The index of the input glyph this glyph came from.
    pub source: usize,
    /// The accumulated kerning adjustment, in font units.
    pub kerning: i32,
}

impl RunGlyph {
    pub fn new(glyph: GlyphId16, source: usize) -> Self {
        RunGlyph {
            glyph,
            source,
            kerning: 0,
        }
    }
}

/// Build a run from plain glyph ids, using each glyph's index as its source.
pub fn run_from_glyphs(glyphs: impl IntoIterator<Item = GlyphId16>) -> Vec<RunGlyph> {
    glyphs
        .into_iter()
        .enumerate()
        .map(|(i, glyph)| RunGlyph::new(glyph, i))
        .collect()
}

/// The result of running a table once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub glyphs: Vec<RunGlyph>,
    /// The number of input slots up to and including the glyph that acted,
    /// counted from the start position; zero if nothing changed.
    pub consumed: usize,
}

/// Limits applied while walking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalkerOptions {
    /// How many times in a row a glyph may be processed without advancing.
    pub max_steps_per_glyph: usize,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        WalkerOptions {
            max_steps_per_glyph: 64,
        }
    }
}

/// The mutable state an [`Action`] sees when it is applied.
///
/// Positions are indices into the run being edited. Insertions shift every
/// position the walker is tracking, so they keep naming the same glyphs.
pub struct RunContext<'a> {
    glyphs: &'a mut Vec<RunGlyph>,
    current: Option<usize>,
    mark: Option<usize>,
    /// Where the walk resumes once the current glyph is done.
    next: Option<usize>,
    stack: Vec<usize>,
    cross_stream: bool,
}

impl<'a> RunContext<'a> {
    fn new(glyphs: &'a mut Vec<RunGlyph>, cross_stream: bool) -> Self {
        RunContext {
            glyphs,
            current: None,
            mark: None,
            next: None,
            stack: Vec::with_capacity(KERNING_STACK_SIZE),
            cross_stream,
        }
    }

    /// The position of the glyph being processed, or `None` at end of text.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// The most recently marked position.
    pub fn mark(&self) -> Option<usize> {
        self.mark
    }

    pub fn is_cross_stream(&self) -> bool {
        self.cross_stream
    }

    pub fn glyph(&self, pos: usize) -> GlyphId16 {
        self.glyphs[pos].glyph
    }

    /// Replace the glyph at `pos`, returning `true` if it changed.
    pub fn substitute(&mut self, pos: usize, glyph: GlyphId16) -> bool {
        let slot = &mut self.glyphs[pos].glyph;
        let changed = *slot != glyph;
        *slot = glyph;
        changed
    }

    /// Insert glyphs at `at`, attributing them to the glyph at `anchor`.
    ///
    /// Inserted glyphs are never processed by the walk that inserted them.
    pub fn insert(&mut self, at: usize, anchor: usize, glyphs: &[GlyphId16]) {
        let source = self.glyphs[anchor].source;
        self.glyphs.splice(
            at..at,
            glyphs.iter().map(|glyph| RunGlyph::new(*glyph, source)),
        );
        let shift = |pos: &mut usize| {
            if *pos >= at {
                *pos += glyphs.len();
            }
        };
        self.current.iter_mut().for_each(shift);
        self.mark.iter_mut().for_each(shift);
        self.next.iter_mut().for_each(shift);
        self.stack.iter_mut().for_each(shift);
    }

    /// Push a position onto the kerning stack, dropping the oldest if it is full.
    pub fn push(&mut self, pos: usize) {
        if self.stack.len() == KERNING_STACK_SIZE {
            self.stack.remove(0);
        }
        self.stack.push(pos);
    }

    /// Pop the most recently pushed position.
    pub fn pop(&mut self) -> Option<usize> {
        self.stack.pop()
    }

    /// Add to the kerning of the glyph at `pos`, returning `true` if it changed.
    pub fn adjust(&mut self, pos: usize, value: i32) -> bool {
        self.glyphs[pos].kerning += value;
        value != 0
    }

    /// Clear the kerning of the glyph at `pos`, returning `true` if it changed.
    pub fn reset(&mut self, pos: usize) -> bool {
        std::mem::take(&mut self.glyphs[pos].kerning) != 0
    }

    fn len(&self) -> usize {
        self.glyphs.len()
    }
}

/// Whether a walk ends at the first action or at the end of the text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Until {
    FirstAction,
    EndOfText,
}

/// Runs a validated, normalized table over glyph runs.
#[derive(Clone, Debug)]
pub struct Walker<A: Action> {
    table: StateTable<A>,
    options: WalkerOptions,
}

impl<A: Action> Walker<A> {
    /// Prepare a table for running, refusing it if it does not validate.
    pub fn new(table: &StateTable<A>) -> Result<Self, ValidationReport> {
        Self::with_options(table, WalkerOptions::default())
    }

    pub fn with_options(
        table: &StateTable<A>,
        options: WalkerOptions,
    ) -> Result<Self, ValidationReport> {
        let table = table.normalized();
        table.validate()?;
        Ok(Walker { table, options })
    }

    pub fn table(&self) -> &StateTable<A> {
        &self.table
    }

    /// Run the table once, beginning at `start`.
    ///
    /// Glyphs for which `is_ignorable` returns `true` are skipped. The walk
    /// stops at the first entry whose action changes the run; the outcome
    /// holds the edited run and the number of input slots consumed. If no
    /// action fires the run is returned unchanged with `consumed` zero.
    pub fn run_one(
        &self,
        glyphs: &[RunGlyph],
        start: usize,
        is_ignorable: impl Fn(GlyphId16) -> bool,
    ) -> RunOutcome {
        let unchanged = || RunOutcome {
            glyphs: glyphs.to_vec(),
            consumed: 0,
        };
        if start >= glyphs.len() {
            return unchanged();
        }
        let mut run = glyphs.to_vec();
        let Some(acted_at) = self.walk(&mut run, start, &is_ignorable, Until::FirstAction) else {
            return unchanged();
        };
        let consumed = match acted_at {
            Some(pos) if self.table.coverage.reverse => start - pos + 1,
            Some(pos) => pos - start + 1,
            None if self.table.coverage.reverse => start + 1,
            None => glyphs.len() - start,
        };
        RunOutcome {
            glyphs: run,
            consumed,
        }
    }

    /// Apply the table across a whole run.
    ///
    /// This is one continuous walk from the start of the text: the state,
    /// the mark and the kerning stack carry over from one action to the
    /// next, so a glyph that ends one match can begin another.
    pub fn run(
        &self,
        glyphs: &[RunGlyph],
        is_ignorable: impl Fn(GlyphId16) -> bool,
    ) -> Vec<RunGlyph> {
        let mut run = glyphs.to_vec();
        if let Some(start) = run.len().checked_sub(1) {
            let start = if self.table.coverage.reverse { start } else { 0 };
            self.walk(&mut run, start, &is_ignorable, Until::EndOfText);
        }
        run
    }

    /// The first glyph at or beyond `from` in processing order that is not
    /// ignorable, or `None` for end of text.
    fn seek(
        &self,
        glyphs: &[RunGlyph],
        from: Option<usize>,
        is_ignorable: &impl Fn(GlyphId16) -> bool,
    ) -> Option<usize> {
        let from = from?;
        if self.table.coverage.reverse {
            (0..=from.min(glyphs.len().checked_sub(1)?))
                .rev()
                .find(|i| !is_ignorable(glyphs[*i].glyph))
        } else {
            (from..glyphs.len()).find(|i| !is_ignorable(glyphs[*i].glyph))
        }
    }

    /// Step the machine over `run` from `start`, editing it in place.
    ///
    /// Returns the position of the last glyph whose action changed the run
    /// (`Some(None)` if that happened at end of text), or `None` if no
    /// action fired.
    fn walk(
        &self,
        run: &mut Vec<RunGlyph>,
        start: usize,
        is_ignorable: &impl Fn(GlyphId16) -> bool,
        until: Until,
    ) -> Option<Option<usize>> {
        let reverse = self.table.coverage.reverse;
        let at_text_start = if reverse {
            start + 1 == run.len()
        } else {
            start == 0
        };
        let mut current_state = if at_text_start {
            state::START_OF_TEXT
        } else {
            state::START_OF_LINE
        };

        let mut pos = self.seek(&run[..], Some(start), is_ignorable);
        let mut ctx = RunContext::new(run, self.table.coverage.cross_stream);
        let mut acted_at = None;
        let mut stalled = 0;
        loop {
            let class_name = match pos {
                Some(pos) => self.table.class_of(ctx.glyph(pos)),
                None => class::END_OF_TEXT,
            };
            let Some(entry) = self.table.entry(current_state, class_name) else {
                // unreachable for a normalized, validated table
                log::error!("no entry for class '{class_name}' in state '{current_state}'");
                return acted_at;
            };
            ctx.current = pos;
            ctx.next = match pos {
                Some(pos) if reverse => pos.checked_sub(1),
                Some(pos) => Some(pos + 1),
                None => None,
            };
            if entry.mark && pos.is_some() {
                ctx.mark = pos;
            }
            let before = ctx.len();
            if entry.action.apply(&mut ctx, entry.mark) {
                log::trace!(
                    "action in state '{current_state}' on class '{class_name}': {} glyphs",
                    ctx.len() as isize - before as isize
                );
                acted_at = Some(ctx.current);
                if until == Until::FirstAction {
                    return Some(pos);
                }
            }
            current_state = entry.next_state.as_str();
            let Some(current) = ctx.current else {
                return acted_at;
            };
            if entry.no_advance {
                stalled += 1;
                if stalled > self.options.max_steps_per_glyph {
                    log::warn!(
                        "glyph at {current} was processed {stalled} times without advancing, giving up"
                    );
                    return acted_at;
                }
                pos = Some(current);
            } else {
                stalled = 0;
                pos = self.seek(&ctx.glyphs[..], ctx.next, is_ignorable);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        insertion::{Insertion, InsertionAction},
        ContextualAction, Coverage, Entry, TableKind,
    };

    fn gid(raw: u16) -> GlyphId16 {
        GlyphId16::new(raw)
    }

    fn glyphs(raw: &[u16]) -> Vec<RunGlyph> {
        run_from_glyphs(raw.iter().copied().map(gid))
    }

    fn ids(run: &[RunGlyph]) -> Vec<u16> {
        run.iter().map(|g| g.glyph.to_u16()).collect()
    }

    fn never(_: GlyphId16) -> bool {
        false
    }

    /// Inserts 96 before and 97 after the word "Dave".
    fn dave() -> StateTable<InsertionAction> {
        let mut table = StateTable::new();
        for (glyph, name) in [(12, "D"), (41, "a"), (62, "v"), (45, "e")] {
            table.class_table.insert(gid(glyph), name);
        }
        for start in state::RESERVED {
            table.set_entry(start, "D", Entry::new("Saw D").with_mark());
        }
        for (from, class_name, to) in [
            ("Saw D", "a", "Saw Da"),
            ("Saw Da", "v", "Saw Dav"),
        ] {
            table.set_entry(from, class_name, Entry::new(to));
        }
        for from in ["Saw D", "Saw Da", "Saw Dav"] {
            for class_name in [class::END_OF_TEXT, class::OUT_OF_BOUNDS, "a", "v", "e"] {
                if table.entry(from, class_name).is_none() {
                    table.set_entry(from, class_name, Entry::new(state::START_OF_TEXT));
                }
            }
            table.set_entry(from, "D", Entry::new("Saw D").with_mark());
        }
        table.set_entry(
            "Saw Dav",
            "e",
            Entry::new(state::START_OF_TEXT).with_action(InsertionAction {
                marked: Some(Insertion::before([gid(96)])),
                current: Some(Insertion::after([gid(97)])),
            }),
        );
        table
    }

    #[test]
    fn dave_inserts_around_word() {
        let _ = env_logger::builder().is_test(true).try_init();
        let walker = Walker::new(&dave()).unwrap();
        let outcome = walker.run_one(&glyphs(&[12, 41, 62, 45]), 0, never);
        assert_eq!(ids(&outcome.glyphs), [96, 12, 41, 62, 45, 97]);
        assert_eq!(outcome.consumed, 4);
        // inserted glyphs take the source of their anchor
        let sources = outcome.glyphs.iter().map(|g| g.source).collect::<Vec<_>>();
        assert_eq!(sources, [0, 0, 1, 2, 3, 3]);
    }

    #[test]
    fn partial_words_are_unchanged() {
        let walker = Walker::new(&dave()).unwrap();
        for partial in [&[12, 41, 62][..], &[12, 41], &[41, 62, 45], &[12, 41, 45]] {
            let input = glyphs(partial);
            let outcome = walker.run_one(&input, 0, never);
            assert_eq!(outcome.glyphs, input);
            assert_eq!(outcome.consumed, 0);
        }
    }

    #[test]
    fn ignorable_glyphs_are_skipped_but_counted() {
        let walker = Walker::new(&dave()).unwrap();
        let input = glyphs(&[12, 500, 41, 62, 500, 45]);
        let outcome = walker.run_one(&input, 0, |g| g == gid(500));
        assert_eq!(ids(&outcome.glyphs), [96, 12, 500, 41, 62, 500, 45, 97]);
        assert_eq!(outcome.consumed, 6);
    }

    #[test]
    fn run_covers_every_word() {
        let walker = Walker::new(&dave()).unwrap();
        let input = glyphs(&[12, 41, 62, 45, 3, 12, 41, 62, 45]);
        let output = walker.run(&input, never);
        assert_eq!(
            ids(&output),
            [96, 12, 41, 62, 45, 97, 3, 96, 12, 41, 62, 45, 97]
        );
    }

    #[test]
    fn later_start_uses_start_of_line() {
        let mut table = dave();
        // only words at the start of the text are decorated
        table.set_entry(state::START_OF_LINE, "D", Entry::new(state::START_OF_LINE));
        let walker = Walker::new(&table).unwrap();
        let input = glyphs(&[3, 12, 41, 62, 45]);
        assert_eq!(walker.run_one(&input, 1, never).consumed, 0);
        let input = glyphs(&[12, 41, 62, 45]);
        assert_eq!(walker.run_one(&input, 0, never).consumed, 4);
    }

    fn substitute_after(first: u16, second: u16, to: u16) -> StateTable<ContextualAction> {
        let mut table = StateTable::new();
        table.class_table.insert(gid(first), "first");
        table.class_table.insert(gid(second), "second");
        for start in state::RESERVED {
            table.set_entry(start, "first", Entry::new("Saw first"));
        }
        table.set_entry(
            "Saw first",
            "second",
            Entry::new(state::START_OF_TEXT).with_action(ContextualAction {
                current: BTreeMap::from([(gid(second), gid(to))]),
                ..Default::default()
            }),
        );
        for class_name in [class::END_OF_TEXT, class::OUT_OF_BOUNDS] {
            table.set_entry("Saw first", class_name, Entry::new(state::START_OF_TEXT));
        }
        table
    }

    #[test]
    fn substitution_keeps_source() {
        let walker = Walker::new(&substitute_after(5, 6, 60)).unwrap();
        let outcome = walker.run_one(&glyphs(&[5, 6, 6]), 0, never);
        assert_eq!(ids(&outcome.glyphs), [5, 60, 6]);
        assert_eq!(outcome.glyphs[1].source, 1);
        assert_eq!(outcome.consumed, 2);
    }

    #[test]
    fn deleted_glyphs_use_their_class() {
        let walker = Walker::new(&substitute_after(5, 6, 60)).unwrap();
        // "Deleted glyph" stays in the current state after normalization
        let outcome = walker.run_one(&glyphs(&[5, 0xFFFF, 6]), 0, never);
        assert_eq!(ids(&outcome.glyphs), [5, 0xFFFF, 60]);
        assert_eq!(outcome.consumed, 3);
    }

    #[test]
    fn reverse_walks_backwards() {
        let table = substitute_after(6, 5, 50)
            .with_coverage(Coverage::new(TableKind::Contextual).with_reverse(true));
        let walker = Walker::new(&table).unwrap();
        // processed from the end: 6 is seen first, then 5
        let outcome = walker.run_one(&glyphs(&[5, 6]), 1, never);
        assert_eq!(ids(&outcome.glyphs), [50, 6]);
        assert_eq!(outcome.consumed, 2);
        assert_eq!(ids(&walker.run(&glyphs(&[5, 6, 5, 6]), never)), [50, 6, 50, 6]);
    }

    /// Every "x" after the first in a row of them becomes "y".
    fn repeat_after_first(x: u16, y: u16) -> StateTable<ContextualAction> {
        let mut table = StateTable::new();
        table.class_table.insert(gid(x), "x");
        for start in state::RESERVED {
            table.set_entry(start, "x", Entry::new("Saw x"));
        }
        table.set_entry(
            "Saw x",
            "x",
            Entry::new("Saw x").with_action(ContextualAction::new().with_current(gid(x), gid(y))),
        );
        for class_name in [class::END_OF_TEXT, class::OUT_OF_BOUNDS] {
            table.set_entry("Saw x", class_name, Entry::new(state::START_OF_TEXT));
        }
        table
    }

    #[test]
    fn run_keeps_state_between_actions() {
        let walker = Walker::new(&repeat_after_first(5, 6)).unwrap();
        let output = walker.run(&glyphs(&[5, 5, 5, 7, 5, 5]), never);
        assert_eq!(ids(&output), [5, 6, 6, 7, 5, 6]);
        // run_one still stops at the first change
        let outcome = walker.run_one(&glyphs(&[5, 5, 5]), 0, never);
        assert_eq!(ids(&outcome.glyphs), [5, 6, 5]);
        assert_eq!(outcome.consumed, 2);
    }

    #[test]
    fn run_keeps_state_in_reverse() {
        let table = repeat_after_first(5, 6)
            .with_coverage(Coverage::new(TableKind::Contextual).with_reverse(true));
        let walker = Walker::new(&table).unwrap();
        let output = walker.run(&glyphs(&[5, 5, 7, 5, 5, 5]), never);
        assert_eq!(ids(&output), [6, 5, 7, 6, 6, 5]);
    }

    #[test]
    fn inserted_glyphs_are_not_processed() {
        // "Dave" inserts another "D" (12) after the "e"
        let mut table = dave();
        table.set_entry(
            "Saw Dav",
            "e",
            Entry::new(state::START_OF_TEXT).with_action(InsertionAction {
                marked: Some(Insertion::before([gid(96)])),
                current: Some(Insertion::after([gid(12)])),
            }),
        );
        let walker = Walker::new(&table).unwrap();
        // the inserted "D" would otherwise start a second match
        let output = walker.run(&glyphs(&[12, 41, 62, 45, 41, 62, 45]), never);
        assert_eq!(ids(&output), [96, 12, 41, 62, 45, 12, 41, 62, 45]);
        let sources = output.iter().map(|g| g.source).collect::<Vec<_>>();
        assert_eq!(sources, [0, 0, 1, 2, 3, 3, 4, 5, 6]);
    }

    #[test]
    fn insertion_keeps_tracked_positions() {
        let mut run = glyphs(&[1, 2, 3, 4]);
        let mut ctx = RunContext::new(&mut run, false);
        ctx.current = Some(2);
        ctx.mark = Some(1);
        ctx.next = Some(3);
        ctx.push(3);
        ctx.insert(2, 2, &[gid(9), gid(9)]);
        assert_eq!((ctx.current, ctx.mark, ctx.next), (Some(4), Some(1), Some(5)));
        assert_eq!(ctx.pop(), Some(5));
        assert_eq!(ctx.glyph(4), gid(3));
    }

    #[test]
    fn both_deleted_values_use_deleted_class() {
        let walker = Walker::new(&substitute_after(5, 6, 60)).unwrap();
        let output = walker.run(&glyphs(&[5, 0xFFFE, 6, 5, 0xFFFF, 6]), never);
        assert_eq!(ids(&output), [5, 0xFFFE, 60, 5, 0xFFFF, 60]);
    }

    #[test]
    fn no_advance_cycles_are_bounded() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut table = StateTable::<ContextualAction>::new();
        table.class_table.insert(gid(5), "x");
        for start in state::RESERVED {
            table.set_entry(start, "x", Entry::new("A").with_no_advance());
        }
        table.set_entry("A", "x", Entry::new("B").with_no_advance());
        table.set_entry("B", "x", Entry::new("A").with_no_advance());
        let walker = Walker::with_options(&table, WalkerOptions { max_steps_per_glyph: 4 }).unwrap();
        let input = glyphs(&[5, 5]);
        let outcome = walker.run_one(&input, 0, never);
        assert_eq!(outcome.glyphs, input);
        assert_eq!(outcome.consumed, 0);
    }

    #[test]
    fn invalid_tables_are_refused() {
        let mut table = StateTable::<ContextualAction>::new();
        table.set_entry(state::START_OF_TEXT, "x", Entry::new("Nowhere"));
        assert!(Walker::new(&table).is_err());
    }

    #[test]
    fn kerning_stack_drops_oldest() {
        let mut run = glyphs(&(0..10).collect::<Vec<_>>());
        let mut ctx = RunContext::new(&mut run, false);
        for pos in 0..10 {
            ctx.push(pos);
        }
        let popped = std::iter::from_fn(|| ctx.pop()).collect::<Vec<_>>();
        assert_eq!(popped, [9, 8, 7, 6, 5, 4, 3, 2]);
    }
}
