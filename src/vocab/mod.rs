//! Two-way translation tables for concepts the two systems name differently.
//!
//! Snapshots carry statuses in the DDI vocabulary; the source-of-truth
//! adapter translates on the way in and on the way out. An unmapped value is
//! an error, never a silent default.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VocabError {
    #[error("Unknown {concept} '{value}'")]
    UnknownStatus { concept: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// DDI value -> source-of-truth value
    ToSot,
    /// Source-of-truth value -> DDI value
    ToDdi,
}

/// A fixed bidirectional table of (DDI value, source-of-truth value) pairs
#[derive(Debug)]
pub struct Vocabulary {
    pub concept: &'static str,
    pairs: &'static [(&'static str, &'static str)],
}

impl Vocabulary {
    pub const fn new(
        concept: &'static str,
        pairs: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { concept, pairs }
    }

    pub fn translate(&self, value: &str, direction: Direction) -> Result<&'static str, VocabError> {
        self.pairs
            .iter()
            .find_map(|(ddi, sot)| match direction {
                Direction::ToSot if *ddi == value => Some(*sot),
                Direction::ToDdi if *sot == value => Some(*ddi),
                _ => None,
            })
            .ok_or_else(|| VocabError::UnknownStatus {
                concept: self.concept,
                value: value.to_string(),
            })
    }

    /// Values known on the given side
    pub fn values(&self, direction: Direction) -> Vec<&'static str> {
        self.pairs
            .iter()
            .map(|(ddi, sot)| match direction {
                Direction::ToSot => *ddi,
                Direction::ToDdi => *sot,
            })
            .collect()
    }
}

pub static VLAN_STATUS: Vocabulary = Vocabulary::new(
    "VLAN status",
    &[
        ("ASSIGNED", "Active"),
        ("UNASSIGNED", "Deprecated"),
        ("RESERVED", "Reserved"),
    ],
);

pub static IP_ADDRESS_STATUS: Vocabulary = Vocabulary::new(
    "IP address status",
    &[
        ("USED", "Active"),
        ("UNUSED", "Deprecated"),
        ("RESERVED", "Reserved"),
    ],
);

pub fn vlan_status(value: &str, direction: Direction) -> Result<&'static str, VocabError> {
    VLAN_STATUS.translate(value, direction)
}

pub fn ip_address_status(value: &str, direction: Direction) -> Result<&'static str, VocabError> {
    IP_ADDRESS_STATUS.translate(value, direction)
}
