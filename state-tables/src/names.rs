//! Mapping between state and class names and their binary slot indices.
//!
//! State tables are authored with string names, but the binary form only
//! stores dense indices. A handful of indices are fixed by the format: the
//! first four classes and the first two states always have the meaning
//! described in [`class`] and [`state`]. A [`NameRegistry`] holds one ordered
//! list of state names and one of class names that honour those slots.

use std::collections::HashMap;

use crate::{
    error::{DecodeError, NameError},
    read::Cursor,
    StateTable,
};

/// Class names with fixed binary indices.
pub mod class {
    pub const END_OF_TEXT: &str = "End of text";
    pub const OUT_OF_BOUNDS: &str = "Out of bounds";
    pub const DELETED_GLYPH: &str = "Deleted glyph";
    pub const END_OF_LINE: &str = "End of line";

    /// The reserved class names, in index order.
    pub const RESERVED: [&str; 4] = [END_OF_TEXT, OUT_OF_BOUNDS, DELETED_GLYPH, END_OF_LINE];

    pub const END_OF_TEXT_INDEX: u8 = 0;
    pub const OUT_OF_BOUNDS_INDEX: u8 = 1;
    pub const DELETED_GLYPH_INDEX: u8 = 2;
    pub const END_OF_LINE_INDEX: u8 = 3;
}

/// State names with fixed binary indices.
pub mod state {
    pub const START_OF_TEXT: &str = "Start of text";
    pub const START_OF_LINE: &str = "Start of line";

    /// The reserved state names, in index order.
    pub const RESERVED: [&str; 2] = [START_OF_TEXT, START_OF_LINE];
}

/// The largest number of classes a table can hold; class indices are one byte.
pub const MAX_CLASSES: usize = 256;

/// Marks the optional block of names that follows the header.
const NAME_STASH_MAGIC: u16 = 0xFEED;

/// Names read back from the block following the header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct NameStash {
    pub(crate) classes: Vec<String>,
    pub(crate) states: Vec<String>,
}

/// Ordered state and class names, with the reserved names in their slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRegistry {
    states: Vec<String>,
    classes: Vec<String>,
    state_indices: HashMap<String, usize>,
    class_indices: HashMap<String, usize>,
}

impl NameRegistry {
    /// Build a registry from the names that follow the reserved ones.
    ///
    /// Neither list may contain a reserved name, and the total number of
    /// classes may not exceed [`MAX_CLASSES`].
    pub fn new(
        added_states: impl IntoIterator<Item = String>,
        added_classes: impl IntoIterator<Item = String>,
    ) -> Result<Self, NameError> {
        let states = with_reserved(&state::RESERVED, added_states)?;
        let classes = with_reserved(&class::RESERVED, added_classes)?;
        if classes.len() > MAX_CLASSES {
            return Err(NameError::TooManyClasses(classes.len()));
        }
        let state_indices = index_names(&states)?;
        let class_indices = index_names(&classes)?;
        Ok(NameRegistry {
            states,
            classes,
            state_indices,
            class_indices,
        })
    }

    /// Collect the names declared by a table.
    ///
    /// States keep the table's order. Classes are added in the order they are
    /// first seen while scanning rows in state order, followed by any class
    /// that only appears in the class table, in glyph order.
    pub fn for_table<A: crate::Action>(table: &StateTable<A>) -> Result<Self, NameError> {
        let states = table
            .states()
            .filter(|name| !state::RESERVED.contains(name))
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let mut classes = indexmap::IndexSet::new();
        for (_, row) in table.rows() {
            for (class_name, _) in row.iter() {
                if !class::RESERVED.contains(&class_name) {
                    classes.insert(class_name);
                }
            }
        }
        for (_, class_name) in table.class_table.iter() {
            if !class::RESERVED.contains(&class_name) {
                classes.insert(class_name);
            }
        }
        NameRegistry::new(states, classes.into_iter().map(str::to_owned))
    }

    /// Build a registry of placeholder names for the given counts.
    ///
    /// Names past the reserved slots are "state N" and "class N".
    pub fn synthesized(num_states: usize, num_classes: usize) -> Result<Self, NameError> {
        let states = (state::RESERVED.len()..num_states).map(|i| format!("state {i}"));
        let classes = (class::RESERVED.len()..num_classes).map(|i| format!("class {i}"));
        NameRegistry::new(states, classes)
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// The names past the reserved state slots.
    pub fn added_states(&self) -> &[String] {
        &self.states[state::RESERVED.len()..]
    }

    /// The names past the reserved class slots.
    pub fn added_classes(&self) -> &[String] {
        &self.classes[class::RESERVED.len()..]
    }

    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.state_indices.get(name).copied()
    }

    /// The one-byte index of a class.
    pub fn class_index(&self, name: &str) -> Option<u8> {
        // fits: the constructor caps the class count at 256
        self.class_indices.get(name).map(|idx| *idx as u8)
    }

    pub fn state_name(&self, index: usize) -> Option<&str> {
        self.states.get(index).map(String::as_str)
    }

    pub fn class_name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// The added names, in the form written after the header.
    ///
    /// This is `None` if there are no added names, or if one of them is too
    /// long for its one-byte length.
    pub(crate) fn stash_bytes(&self) -> Option<Vec<u8>> {
        if self.added_classes().is_empty() && self.added_states().is_empty() {
            return None;
        }
        if let Some(long) = self
            .added_classes()
            .iter()
            .chain(self.added_states())
            .find(|name| name.len() > u8::MAX as usize)
        {
            log::warn!("name '{long}' is longer than 255 bytes, names will not be stored");
            return None;
        }
        let mut out = NAME_STASH_MAGIC.to_be_bytes().to_vec();
        for names in [self.added_classes(), self.added_states()] {
            out.extend_from_slice(&(names.len() as u16).to_be_bytes());
            for name in names {
                out.push(name.len() as u8);
                out.extend_from_slice(name.as_bytes());
            }
        }
        if out.len() % 2 != 0 {
            out.push(0);
        }
        Some(out)
    }
}

/// Read the names stored between the header and the first structure.
///
/// Returns `None` if the region does not start with the stash marker.
pub(crate) fn read_name_stash(cursor: &mut Cursor) -> Result<Option<NameStash>, DecodeError> {
    if cursor.remaining() < 2 || cursor.read_u16()? != NAME_STASH_MAGIC {
        return Ok(None);
    }
    let mut read_names = || -> Result<Vec<String>, DecodeError> {
        let count = cursor.read_u16()?;
        (0..count)
            .map(|_| {
                let len = cursor.read_u8()? as usize;
                String::from_utf8(cursor.read_bytes(len)?)
                    .map_err(|_| DecodeError::InvalidNameStash("name is not UTF-8"))
            })
            .collect()
    };
    let classes = read_names()?;
    let states = read_names()?;
    Ok(Some(NameStash { classes, states }))
}

fn with_reserved(
    reserved: &[&str],
    added: impl IntoIterator<Item = String>,
) -> Result<Vec<String>, NameError> {
    let mut names = reserved.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    for name in added {
        if reserved.contains(&name.as_str()) {
            return Err(NameError::ReservedName {
                name,
                index: names.len(),
            });
        }
        names.push(name);
    }
    Ok(names)
}

fn index_names(names: &[String]) -> Result<HashMap<String, usize>, NameError> {
    let mut indices = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        if indices.insert(name.clone(), i).is_some() {
            return Err(NameError::DuplicateName(name.clone()));
        }
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use read_fonts::FontData;

    use super::*;

    #[test]
    fn reserved_slots() {
        let names = NameRegistry::new(
            ["Saw D".to_string()],
            ["D".to_string(), "a".to_string()],
        )
        .unwrap();
        assert_eq!(names.state_name(0), Some(state::START_OF_TEXT));
        assert_eq!(names.state_name(1), Some(state::START_OF_LINE));
        assert_eq!(names.state_index("Saw D"), Some(2));
        assert_eq!(names.class_index(class::END_OF_TEXT), Some(0));
        assert_eq!(names.class_index(class::OUT_OF_BOUNDS), Some(1));
        assert_eq!(names.class_index(class::DELETED_GLYPH), Some(2));
        assert_eq!(names.class_index(class::END_OF_LINE), Some(3));
        assert_eq!(names.class_index("D"), Some(4));
        assert_eq!(names.class_index("a"), Some(5));
        assert_eq!(names.added_classes(), ["D", "a"]);
    }

    #[test]
    fn synthesized_names() {
        let names = NameRegistry::synthesized(4, 6).unwrap();
        assert_eq!(names.states()[2..], ["state 2", "state 3"]);
        assert_eq!(names.classes()[4..], ["class 4", "class 5"]);
        // never fewer than the reserved names
        let names = NameRegistry::synthesized(0, 0).unwrap();
        assert_eq!(names.num_states(), 2);
        assert_eq!(names.num_classes(), 4);
    }

    #[test]
    fn reserved_name_in_added_slot() {
        let err = NameRegistry::new([], ["x".to_string(), "Deleted glyph".to_string()]);
        assert_eq!(
            err,
            Err(NameError::ReservedName {
                name: "Deleted glyph".into(),
                index: 5
            })
        );
    }

    #[test]
    fn too_many_classes() {
        let classes = (0..253).map(|i| format!("c{i}"));
        assert_eq!(
            NameRegistry::new([], classes),
            Err(NameError::TooManyClasses(257))
        );
        let classes = (0..252).map(|i| format!("c{i}"));
        assert!(NameRegistry::new([], classes).is_ok());
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = NameRegistry::new(["s".to_string(), "s".to_string()], []);
        assert_eq!(err, Err(NameError::DuplicateName("s".into())));
    }

    #[test]
    fn stash_round_trip() {
        let names = NameRegistry::new(
            ["Saw D".to_string(), "Saw Da".to_string()],
            ["D".to_string()],
        )
        .unwrap();
        let bytes = names.stash_bytes().unwrap();
        assert_eq!(
            bytes,
            [0xFE, 0xED, 0, 1, 1, b'D', 0, 2, 5, b'S', b'a', b'w', b' ', b'D', 6, b'S', b'a', b'w', b' ', b'D', b'a', 0]
        );
        let mut cursor = Cursor::new(FontData::new(&bytes), "name data");
        let stash = read_name_stash(&mut cursor).unwrap().unwrap();
        assert_eq!(stash.classes, ["D"]);
        assert_eq!(stash.states, ["Saw D", "Saw Da"]);
    }

    #[test]
    fn no_stash_without_added_names() {
        let names = NameRegistry::synthesized(2, 4).unwrap();
        assert_eq!(names.stash_bytes(), None);
        let bytes = [0u8, 2, 0, 0];
        let mut cursor = Cursor::new(FontData::new(&bytes), "name data");
        assert_eq!(read_name_stash(&mut cursor), Ok(None));
    }

    #[test]
    fn long_names_are_not_stashed() {
        let names = NameRegistry::new(["s".repeat(256)], []).unwrap();
        assert_eq!(names.stash_bytes(), None);
    }

    #[test]
    fn truncated_stash() {
        let bytes = [0xFE, 0xED, 0, 1, 4, b'a'];
        let mut cursor = Cursor::new(FontData::new(&bytes), "name data");
        assert!(matches!(
            read_name_stash(&mut cursor),
            Err(DecodeError::InsufficientBytes { context: "name data", .. })
        ));
    }
}
