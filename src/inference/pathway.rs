//! Declarative inference pathways.
//!
//! A pathway says: "to infer `target`, these tags must be set and these
//! conditions on them must hold; if so, compute the value from them". It is
//! plain data, built through [`PathwayBuilder`], so its preconditions can be
//! inspected without running it.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use log::debug;

use crate::{
    data::{
        tag::{Tag, TagLookup, WorkingTagSet},
        value::Value,
    },
    errors::{Error, Result},
};

pub type Predicate = fn(&Value) -> bool;

/// Computes the target value from the asserted tags. An `InvalidEncoding`
/// error means the inputs admit no valid value and the pathway does not fire.
pub type Compute = fn(&KnownTags<'_>) -> Result<Value>;

#[derive(Clone)]
pub enum Condition {
    IsSet(Tag),
    That(Tag, Predicate),
    IsEq(Tag, Value),
}

impl Condition {
    pub fn tag(&self) -> Tag {
        match self {
            Condition::IsSet(tag) | Condition::That(tag, _) | Condition::IsEq(tag, _) => *tag,
        }
    }

    fn holds(&self, value: &Value) -> bool {
        match self {
            Condition::IsSet(_) => true,
            Condition::That(_, predicate) => predicate(value),
            Condition::IsEq(_, expected) => value == expected,
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::IsSet(tag) => write!(f, "IsSet({})", tag),
            Condition::That(tag, _) => write!(f, "That({}, <predicate>)", tag),
            Condition::IsEq(tag, value) => write!(f, "IsEq({}, {:?})", tag, value),
        }
    }
}

/// Immutable builder: every assertion returns a new builder and leaves the
/// receiver untouched, so partial pathways can be shared.
#[derive(Debug, Clone)]
pub struct PathwayBuilder {
    target: Tag,
    conditions: Vec<Condition>,
}

impl PathwayBuilder {
    pub fn new(target: Tag) -> Self {
        PathwayBuilder {
            target,
            conditions: Vec::new(),
        }
    }

    pub fn assert_is_set(&self, tag: Tag) -> Self {
        self.with(Condition::IsSet(tag))
    }

    pub fn assert_that(&self, tag: Tag, predicate: Predicate) -> Self {
        self.with(Condition::That(tag, predicate))
    }

    pub fn assert_is_eq(&self, tag: Tag, value: impl Into<Value>) -> Self {
        self.with(Condition::IsEq(tag, value.into()))
    }

    pub fn complete(&self, compute: Compute) -> Pathway {
        Pathway {
            target: self.target,
            conditions: self.conditions.clone(),
            compute,
        }
    }

    fn with(&self, condition: Condition) -> Self {
        let mut conditions = self.conditions.clone();
        conditions.push(condition);
        PathwayBuilder {
            target: self.target,
            conditions,
        }
    }
}

#[derive(Clone)]
pub struct Pathway {
    target: Tag,
    conditions: Vec<Condition>,
    compute: Compute,
}

impl Pathway {
    pub fn target(&self) -> Tag {
        self.target
    }

    /// Tags that must be set before this pathway may fire.
    pub fn requirements(&self) -> BTreeSet<Tag> {
        self.conditions.iter().map(Condition::tag).collect()
    }

    /// Returns the inferred value, or `None` when the target is already set or
    /// a precondition does not hold.
    pub fn evaluate(&self, tags: &WorkingTagSet) -> Result<Option<Value>> {
        if tags.is_set(self.target) {
            return Ok(None);
        }

        let mut known = BTreeMap::new();
        for condition in &self.conditions {
            let tag = condition.tag();
            let value = match tags.get(tag) {
                Some(value) => value,
                None => return Ok(None),
            };
            if !condition.holds(value) {
                return Ok(None);
            }
            known.insert(tag, value);
        }

        match (self.compute)(&KnownTags { values: known }) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_invalid_encoding() => {
                debug!(
                    tag = self.target.key(), err = err.message.as_str();
                    "Pathway has no valid result"
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl fmt::Debug for Pathway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pathway")
            .field("target", &self.target)
            .field("conditions", &self.conditions)
            .finish()
    }
}

/// Read-only view of the tags a pathway asserted, handed to its compute
/// function once every precondition holds.
pub struct KnownTags<'a> {
    values: BTreeMap<Tag, &'a Value>,
}

impl TagLookup for KnownTags<'_> {
    fn value(&self, tag: Tag) -> Result<&Value> {
        self.values.get(&tag).copied().ok_or_else(|| Error::missing_tag(tag))
    }
}
