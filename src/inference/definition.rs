use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use lazy_static::lazy_static;

use crate::{
    data::{
        record::Warning,
        tag::{FinalTagSet, Tag},
        value::Value,
    },
    errors::{Error, ErrorKind, Result},
};

use super::{pathway::Pathway, rules};

/// Rewrites a final value into its canonical form. Reads other tags from the
/// complete, not yet formatted, record.
pub type FormatFn = fn(Tag, &Value, &FinalTagSet) -> Result<Value>;

/// Appends warnings about a final value to `warnings`.
pub type ValidateFn = fn(&Value, &FinalTagSet, &mut BTreeSet<Warning>) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Calculation,
    Fallback,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Calculation => "calculation",
            Stage::Fallback => "fallback",
        }
    }
}

/// Everything the pipeline knows about producing one tag.
#[derive(Clone)]
pub struct InferenceDefinition {
    pub tag: Tag,
    /// Exact derivations. Any two that fire on the same tags must agree.
    pub calculations: Vec<Pathway>,
    /// Heuristics, in order of preference.
    pub fallbacks: Vec<Pathway>,
    pub default: Value,
    pub format: FormatFn,
    pub validate: ValidateFn,
}

impl InferenceDefinition {
    pub fn new(tag: Tag, default: impl Into<Value>) -> Self {
        InferenceDefinition {
            tag,
            calculations: Vec::new(),
            fallbacks: Vec::new(),
            default: default.into(),
            format: keep_value,
            validate: no_warnings,
        }
    }

    pub fn with_calculations(mut self, calculations: Vec<Pathway>) -> Self {
        self.calculations = calculations;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<Pathway>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn with_format(mut self, format: FormatFn) -> Self {
        self.format = format;
        self
    }

    pub fn with_validate(mut self, validate: ValidateFn) -> Self {
        self.validate = validate;
        self
    }

    pub fn pathways(&self, stage: Stage) -> &[Pathway] {
        match stage {
            Stage::Calculation => &self.calculations,
            Stage::Fallback => &self.fallbacks,
        }
    }
}

impl fmt::Debug for InferenceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceDefinition")
            .field("tag", &self.tag)
            .field("calculations", &self.calculations)
            .field("fallbacks", &self.fallbacks)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

pub fn keep_value(_tag: Tag, value: &Value, _tags: &FinalTagSet) -> Result<Value> {
    Ok(value.clone())
}

pub fn no_warnings(
    _value: &Value,
    _tags: &FinalTagSet,
    _warnings: &mut BTreeSet<Warning>,
) -> Result<()> {
    Ok(())
}

lazy_static! {
    static ref DEFINITIONS: Vec<InferenceDefinition> = rules::definitions();
}

/// The definitions every way is compiled with.
pub fn definitions() -> &'static [InferenceDefinition] {
    &DEFINITIONS
}

/// Checks that `definitions` cover each output tag exactly once and that
/// every pathway and default fits the tag it belongs to.
pub fn check_registry(definitions: &[InferenceDefinition]) -> Result<()> {
    let mut seen: BTreeMap<Tag, usize> = BTreeMap::new();
    for definition in definitions {
        let tag = definition.tag;
        *seen.entry(tag).or_insert(0) += 1;

        if !tag.is_output() {
            return Err(format!("Helper tag '{}' must not have a definition", tag).into());
        }
        if !tag.kind().matches(&definition.default) {
            return Err(Error::type_mismatch(tag, tag.kind().name()));
        }
        let pathways = definition.calculations.iter().chain(&definition.fallbacks);
        for pathway in pathways {
            if pathway.target() != tag {
                return Err(format!(
                    "Pathway for '{}' is registered under '{}'",
                    pathway.target(),
                    tag
                )
                .into());
            }
            if pathway.requirements().contains(&tag) {
                return Err(format!("Pathway for '{}' requires its own target", tag).into());
            }
        }
    }

    if let Some((tag, count)) = seen.iter().find(|(_, count)| **count > 1) {
        return Err(format!("Tag '{}' has {} definitions", tag, count).into());
    }
    if let Some(tag) = Tag::OUTPUT.into_iter().find(|tag| !seen.contains_key(tag)) {
        return Err(Error::new(
            ErrorKind::MissingTag,
            format!("Tag '{}' has no definition", tag),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::value::UInt, inference::pathway::PathwayBuilder};

    #[test]
    fn test_registered_definitions_pass_check() {
        check_registry(definitions()).unwrap();
    }

    #[test]
    fn test_duplicate_definition_is_rejected() {
        let mut definitions = definitions().to_vec();
        definitions.push(InferenceDefinition::new(Tag::Surface, "asphalt"));
        assert!(check_registry(&definitions).is_err());
    }

    #[test]
    fn test_missing_definition_is_rejected() {
        let definitions: Vec<_> = definitions()
            .iter()
            .filter(|definition| definition.tag != Tag::Lanes)
            .cloned()
            .collect();
        let err = check_registry(&definitions).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingTag);
    }

    #[test]
    fn test_misplaced_pathway_is_rejected() {
        let mut definitions = definitions().to_vec();
        let surface = definitions
            .iter_mut()
            .find(|definition| definition.tag == Tag::Surface)
            .unwrap();
        surface.fallbacks.push(
            PathwayBuilder::new(Tag::Lanes)
                .assert_is_set(Tag::Oneway)
                .complete(|_| Ok(UInt::from(1).into())),
        );
        assert!(check_registry(&definitions).is_err());
    }

    #[test]
    fn test_default_of_wrong_kind_is_rejected() {
        let mut definitions = definitions().to_vec();
        let lanes = definitions
            .iter_mut()
            .find(|definition| definition.tag == Tag::Lanes)
            .unwrap();
        lanes.default = Value::from("two");
        let err = check_registry(&definitions).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
