//! Telemetry containers and match criteria

use super::{ContainerId, ParameterId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComparisonOperator {
    Equality,
    Inequality,
    LargerThan,
    LargerOrEqual,
    SmallerThan,
    SmallerOrEqual,
}

/// Condition on the current value of a parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub parameter: ParameterId,
    pub operator: ComparisonOperator,
    pub value: String,
    pub use_calibrated: bool,
}

impl Comparison {
    pub fn raw_equals(parameter: ParameterId, value: impl ToString) -> Self {
        Self {
            parameter,
            operator: ComparisonOperator::Equality,
            value: value.to_string(),
            use_calibrated: false,
        }
    }
}

/// One comparison, or the conjunction of several
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MatchCriteria {
    Comparison(Comparison),
    All(Vec<Comparison>),
}

impl MatchCriteria {
    /// Single comparison when the list has one element
    pub fn from_list(mut comparisons: Vec<Comparison>) -> Option<Self> {
        match comparisons.len() {
            0 => None,
            1 => comparisons.pop().map(Self::Comparison),
            _ => Some(Self::All(comparisons)),
        }
    }

    pub fn comparisons(&self) -> &[Comparison] {
        match self {
            Self::Comparison(c) => std::slice::from_ref(c),
            Self::All(list) => list,
        }
    }
}

/// Bit position of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryLocation {
    ContainerStart(i64),
    PreviousEntry(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RepeatCount {
    Fixed(u32),
    /// Count read from the value of a parameter
    Dynamic(ParameterId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Repeat {
    pub count: RepeatCount,
    /// Gap in bits between consecutive occurrences
    pub offset_bits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntryItem {
    Parameter(ParameterId),
    /// Parameter selected at runtime through an alias held by `selector`
    IndirectParameter {
        selector: ParameterId,
        namespace: String,
    },
    Container(ContainerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerEntry {
    pub location: EntryLocation,
    pub repeat: Option<Repeat>,
    pub item: EntryItem,
}

impl ContainerEntry {
    pub fn new(item: EntryItem, location: EntryLocation) -> Self {
        Self {
            location,
            repeat: None,
            item,
        }
    }

    pub fn with_repeat(mut self, repeat: Repeat) -> Self {
        self.repeat = Some(repeat);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceContainer {
    pub name: String,
    pub description: Option<String>,
    pub base: Option<ContainerId>,
    pub restriction: Option<MatchCriteria>,
    pub is_abstract: bool,
    pub size_in_bits: Option<u32>,
    pub entries: Vec<ContainerEntry>,
    pub aliases: Vec<Alias>,
}

impl SequenceContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            base: None,
            restriction: None,
            is_abstract: false,
            size_in_bits: None,
            entries: Vec::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: ContainerId, restriction: Option<MatchCriteria>) -> Self {
        self.base = Some(base);
        self.restriction = restriction;
        self
    }

    pub fn add_entry(&mut self, entry: ContainerEntry) {
        self.entries.push(entry);
    }
}
