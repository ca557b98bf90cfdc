use std::{collections::BTreeMap, fmt};

use serde::Serialize;

use crate::errors::{Error, Result};

use super::value::{DoubleArray, UInt, Value, ValueKind};

/// Road attribute understood by the inference pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Tag {
    #[serde(rename = "oneway")]
    Oneway,
    #[serde(rename = "junction")]
    Junction,
    #[serde(rename = "surface")]
    Surface,
    #[serde(rename = "lanes")]
    Lanes,
    #[serde(rename = "lanes:forward")]
    LanesForward,
    #[serde(rename = "lanes:backward")]
    LanesBackward,
    #[serde(rename = "turn:lanes:forward")]
    TurnLanesForward,
    #[serde(rename = "turn:lanes:backward")]
    TurnLanesBackward,
    /// Undirected turn markings. Only read by pathways, never part of the output.
    #[serde(rename = "turn:lanes")]
    TurnLanes,
}

impl Tag {
    pub const ALL: [Tag; 9] = [
        Tag::Oneway,
        Tag::Junction,
        Tag::Surface,
        Tag::Lanes,
        Tag::LanesForward,
        Tag::LanesBackward,
        Tag::TurnLanesForward,
        Tag::TurnLanesBackward,
        Tag::TurnLanes,
    ];

    pub const OUTPUT: [Tag; 8] = [
        Tag::Oneway,
        Tag::Junction,
        Tag::Surface,
        Tag::Lanes,
        Tag::LanesForward,
        Tag::LanesBackward,
        Tag::TurnLanesForward,
        Tag::TurnLanesBackward,
    ];

    /// Key of the tag in OSM data.
    pub fn key(self) -> &'static str {
        match self {
            Tag::Oneway => "oneway",
            Tag::Junction => "junction",
            Tag::Surface => "surface",
            Tag::Lanes => "lanes",
            Tag::LanesForward => "lanes:forward",
            Tag::LanesBackward => "lanes:backward",
            Tag::TurnLanesForward => "turn:lanes:forward",
            Tag::TurnLanesBackward => "turn:lanes:backward",
            Tag::TurnLanes => "turn:lanes",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Tag::Oneway => ValueKind::Bool,
            Tag::Junction | Tag::Surface => ValueKind::Str,
            Tag::Lanes | Tag::LanesForward | Tag::LanesBackward => ValueKind::UInt,
            Tag::TurnLanesForward | Tag::TurnLanesBackward | Tag::TurnLanes => {
                ValueKind::double_array(ValueKind::Str)
            }
        }
    }

    pub fn is_output(self) -> bool {
        self != Tag::TurnLanes
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Typed read access to tag values. Asking for a tag that has no value is a
/// `MissingTag` error, asking for the wrong type a `TypeMismatch`.
pub trait TagLookup {
    fn value(&self, tag: Tag) -> Result<&Value>;

    fn bool(&self, tag: Tag) -> Result<bool> {
        self.value(tag)?
            .as_bool()
            .ok_or_else(|| Error::type_mismatch(tag, ValueKind::Bool.name()))
    }

    fn uint(&self, tag: Tag) -> Result<UInt> {
        self.value(tag)?
            .as_uint()
            .ok_or_else(|| Error::type_mismatch(tag, ValueKind::UInt.name()))
    }

    fn str(&self, tag: Tag) -> Result<&str> {
        self.value(tag)?
            .as_str()
            .ok_or_else(|| Error::type_mismatch(tag, ValueKind::Str.name()))
    }

    fn double_array(&self, tag: Tag) -> Result<&DoubleArray> {
        self.value(tag)?
            .as_double_array()
            .ok_or_else(|| Error::type_mismatch(tag, "a double array"))
    }
}

/// Every tag mapped to a value that may not be known yet. Filled in place
/// while inferring.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingTagSet {
    values: BTreeMap<Tag, Option<Value>>,
}

impl WorkingTagSet {
    pub fn new() -> Self {
        WorkingTagSet {
            values: Tag::ALL.into_iter().map(|tag| (tag, None)).collect(),
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.values.get(&tag).and_then(Option::as_ref)
    }

    pub fn is_set(&self, tag: Tag) -> bool {
        self.get(tag).is_some()
    }

    pub fn set(&mut self, tag: Tag, value: Value) {
        self.values.insert(tag, Some(value));
    }

    pub fn count_unset(&self, tags: &[Tag]) -> usize {
        tags.iter().filter(|tag| !self.is_set(**tag)).count()
    }

    /// Drops the helper tags and requires every output tag to be set.
    pub fn into_final(mut self) -> Result<FinalTagSet> {
        let mut values = BTreeMap::new();
        for tag in Tag::OUTPUT {
            let value = self
                .values
                .remove(&tag)
                .flatten()
                .ok_or_else(|| Error::missing_tag(tag))?;
            values.insert(tag, value);
        }
        FinalTagSet::new(values)
    }
}

impl Default for WorkingTagSet {
    fn default() -> Self {
        WorkingTagSet::new()
    }
}

/// Definite value for every output tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FinalTagSet {
    values: BTreeMap<Tag, Value>,
}

impl FinalTagSet {
    pub fn new(values: BTreeMap<Tag, Value>) -> Result<Self> {
        if let Some(tag) = Tag::OUTPUT.into_iter().find(|tag| !values.contains_key(tag)) {
            return Err(Error::missing_tag(tag));
        }
        Ok(FinalTagSet { values })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tag, &Value)> {
        self.values.iter().map(|(tag, value)| (*tag, value))
    }
}

impl TagLookup for FinalTagSet {
    fn value(&self, tag: Tag) -> Result<&Value> {
        self.values.get(&tag).ok_or_else(|| Error::missing_tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_serialized_name_is_osm_key() {
        for tag in Tag::ALL {
            assert_eq!(serde_json::to_value(tag).unwrap(), tag.key());
        }
    }

    #[test]
    fn test_working_set_starts_unset() {
        let working = WorkingTagSet::new();
        assert_eq!(working.count_unset(&Tag::ALL), Tag::ALL.len());
        assert!(!working.is_set(Tag::Lanes));
    }

    #[test]
    fn test_into_final_requires_every_output_tag() {
        let mut working = WorkingTagSet::new();
        for tag in Tag::OUTPUT {
            if tag != Tag::Surface {
                working.set(tag, Value::Bool(false));
            }
        }
        let err = working.clone().into_final().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingTag);

        working.set(Tag::Surface, Value::from("asphalt"));
        let tags = working.into_final().unwrap();
        assert_eq!(tags.str(Tag::Surface).unwrap(), "asphalt");
        assert_eq!(tags.iter().count(), Tag::OUTPUT.len());
    }

    #[test]
    fn test_lookup_reports_type_mismatch() {
        let mut working = WorkingTagSet::new();
        for tag in Tag::OUTPUT {
            working.set(tag, Value::Bool(true));
        }
        let tags = working.into_final().unwrap();
        assert!(tags.bool(Tag::Lanes).unwrap());
        assert_eq!(tags.uint(Tag::Lanes).unwrap_err().kind, ErrorKind::TypeMismatch);
        assert_eq!(tags.value(Tag::TurnLanes).unwrap_err().kind, ErrorKind::MissingTag);
    }
}
