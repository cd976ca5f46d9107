//! Transitions and rows of the state machine.

use indexmap::IndexMap;

/// One transition of the state machine.
///
/// Entries are compared, hashed and pooled by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry<A> {
    /// The state to move to after this entry is processed.
    pub next_state: String,
    /// Remember the current glyph's position (or push it, for kerning).
    pub mark: bool,
    /// Process the same glyph again in the next state.
    pub no_advance: bool,
    pub action: A,
}

impl<A: Default> Entry<A> {
    /// An entry that moves to `next_state` and does nothing else.
    pub fn new(next_state: impl Into<String>) -> Self {
        Entry {
            next_state: next_state.into(),
            mark: false,
            no_advance: false,
            action: A::default(),
        }
    }
}

impl<A> Entry<A> {
    pub fn with_mark(mut self) -> Self {
        self.mark = true;
        self
    }

    pub fn with_no_advance(mut self) -> Self {
        self.no_advance = true;
        self
    }

    pub fn with_action(mut self, action: A) -> Self {
        self.action = action;
        self
    }
}

/// The entries of one state, keyed by class name.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateRow<A> {
    entries: IndexMap<String, Entry<A>>,
}

impl<A> StateRow<A> {
    pub fn new() -> Self {
        StateRow {
            entries: IndexMap::new(),
        }
    }

    /// Set the entry for a class, returning the previous one.
    pub fn insert(&mut self, class: impl Into<String>, entry: Entry<A>) -> Option<Entry<A>> {
        self.entries.insert(class.into(), entry)
    }

    pub fn get(&self, class: &str) -> Option<&Entry<A>> {
        self.entries.get(class)
    }

    pub fn get_mut(&mut self, class: &str) -> Option<&mut Entry<A>> {
        self.entries.get_mut(class)
    }

    pub fn contains_class(&self, class: &str) -> bool {
        self.entries.contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entry<A>)> + '_ {
        self.entries.iter().map(|(class, entry)| (class.as_str(), entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Entry<A>)> + '_ {
        self.entries
            .iter_mut()
            .map(|(class, entry)| (class.as_str(), entry))
    }

    /// Return the entry for a class, inserting one from `f` if it is missing.
    pub(crate) fn get_or_insert_with(
        &mut self,
        class: &str,
        f: impl FnOnce() -> Entry<A>,
    ) -> &mut Entry<A> {
        self.entries.entry(class.to_owned()).or_insert_with(f)
    }

    /// Rename classes in place, keeping their order.
    pub(crate) fn rename_classes(&mut self, rename: impl Fn(&str) -> Option<String>) {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(class, entry)| (rename(&class).unwrap_or(class), entry))
            .collect();
    }
}

impl<A> Default for StateRow<A> {
    fn default() -> Self {
        StateRow::new()
    }
}

impl<A, S: Into<String>> FromIterator<(S, Entry<A>)> for StateRow<A> {
    fn from_iter<T: IntoIterator<Item = (S, Entry<A>)>>(iter: T) -> Self {
        StateRow {
            entries: iter
                .into_iter()
                .map(|(class, entry)| (class.into(), entry))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn entries_compare_by_value() {
        let a: Entry<Vec<u16>> = Entry::new("Saw D").with_mark();
        let b = Entry::new(String::from("Saw D")).with_mark();
        assert_eq!(a, b);
        let set = [a.clone(), b, a.clone().with_no_advance()]
            .into_iter()
            .collect::<HashSet<_>>();
        assert_eq!(set.len(), 2);
        assert_ne!(a.clone().with_action(vec![1]), a);
    }

    #[test]
    fn row_rename_keeps_order() {
        let mut row: StateRow<()> = [
            ("a", Entry::new("Start of text")),
            ("b", Entry::new("Start of text")),
            ("c", Entry::new("Start of text")),
        ]
        .into_iter()
        .collect();
        row.rename_classes(|class| (class == "b").then(|| "B".to_string()));
        assert_eq!(row.iter().map(|(c, _)| c).collect::<Vec<_>>(), ["a", "B", "c"]);
        assert!(row.contains_class("B"));
        assert!(!row.contains_class("b"));
    }
}
