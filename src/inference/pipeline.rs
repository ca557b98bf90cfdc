use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    data::{
        record::WarningSets,
        tag::{FinalTagSet, Tag, TagLookup, WorkingTagSet},
    },
    errors::{Error, Result},
};

use super::definition::{InferenceDefinition, Stage};

/// Result of running every stage over one working tag set.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub tags: FinalTagSet,
    pub inferred: BTreeSet<Tag>,
    pub warnings: WarningSets,
    pub trace: StageTrace,
}

/// Number of defined tags still unset after each pass of the fixed-point stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTrace {
    pub calculation: Vec<usize>,
    pub fallback: Vec<usize>,
}

/// Calculates, falls back and defaults until every defined tag is set, then
/// formats and validates the complete record.
pub fn run(
    mut working: WorkingTagSet,
    definitions: &[InferenceDefinition],
) -> Result<PipelineOutcome> {
    let mut inferred = BTreeSet::new();
    let trace = StageTrace {
        calculation: run_to_fixed_point(
            &mut working,
            definitions,
            Stage::Calculation,
            &mut inferred,
        )?,
        fallback: run_to_fixed_point(&mut working, definitions, Stage::Fallback, &mut inferred)?,
    };
    apply_defaults(&mut working, definitions, &mut inferred);

    let complete = working.into_final()?;
    let tags = format(&complete, definitions)?;
    let warnings = validate(&tags, definitions)?;

    Ok(PipelineOutcome {
        tags,
        inferred,
        warnings,
        trace,
    })
}

fn run_to_fixed_point(
    working: &mut WorkingTagSet,
    definitions: &[InferenceDefinition],
    stage: Stage,
    inferred: &mut BTreeSet<Tag>,
) -> Result<Vec<usize>> {
    let defined: Vec<Tag> = definitions.iter().map(|definition| definition.tag).collect();
    let mut unset_per_pass = Vec::new();

    loop {
        let mut changed = false;
        for definition in definitions {
            if working.is_set(definition.tag) {
                continue;
            }
            for pathway in definition.pathways(stage) {
                if let Some(value) = pathway.evaluate(working)? {
                    let kind = definition.tag.kind();
                    if !kind.matches(&value) {
                        return Err(Error::type_mismatch(definition.tag, kind.name()));
                    }
                    debug!(tag = definition.tag.key(), stage = stage.name(); "Pathway fired");
                    working.set(definition.tag, value);
                    inferred.insert(definition.tag);
                    changed = true;
                    break;
                }
            }
        }
        unset_per_pass.push(working.count_unset(&defined));
        if !changed {
            break;
        }
    }

    debug!(stage = stage.name(), passes = unset_per_pass.len(); "Stage reached fixed point");
    Ok(unset_per_pass)
}

fn apply_defaults(
    working: &mut WorkingTagSet,
    definitions: &[InferenceDefinition],
    inferred: &mut BTreeSet<Tag>,
) {
    for definition in definitions {
        if !working.is_set(definition.tag) {
            working.set(definition.tag, definition.default.clone());
            inferred.insert(definition.tag);
        }
    }
}

/// Every formatter sees the unformatted record, so the order is irrelevant.
/// Formatting never changes whether a tag counts as inferred.
fn format(tags: &FinalTagSet, definitions: &[InferenceDefinition]) -> Result<FinalTagSet> {
    let mut formatted = BTreeMap::new();
    for (tag, value) in tags.iter() {
        formatted.insert(tag, value.clone());
    }
    for definition in definitions {
        let value = tags.value(definition.tag)?;
        formatted.insert(definition.tag, (definition.format)(definition.tag, value, tags)?);
    }
    FinalTagSet::new(formatted)
}

fn validate(tags: &FinalTagSet, definitions: &[InferenceDefinition]) -> Result<WarningSets> {
    let mut warnings = WarningSets::new();
    for definition in definitions {
        let mut found = BTreeSet::new();
        (definition.validate)(tags.value(definition.tag)?, tags, &mut found)?;
        if !found.is_empty() {
            warnings.insert(definition.tag, found);
        }
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{record::Warning, value::{UInt, Value}},
        errors::ErrorKind,
        inference::{
            definition::{definitions, InferenceDefinition},
            pathway::PathwayBuilder,
        },
    };

    fn working(raw: &[(Tag, &str)]) -> WorkingTagSet {
        let mut working = WorkingTagSet::new();
        for (tag, text) in raw {
            working.set(*tag, tag.kind().parse(text).unwrap());
        }
        working
    }

    #[test]
    fn test_empty_input_takes_defaults() {
        let outcome = run(WorkingTagSet::new(), definitions()).unwrap();
        assert!(!outcome.tags.bool(Tag::Oneway).unwrap());
        assert_eq!(outcome.tags.uint(Tag::Lanes).unwrap(), UInt::from(2));
        assert_eq!(outcome.tags.uint(Tag::LanesForward).unwrap(), UInt::from(1));
        assert_eq!(outcome.tags.uint(Tag::LanesBackward).unwrap(), UInt::from(1));
        assert_eq!(outcome.tags.str(Tag::Surface).unwrap(), "asphalt");
        assert_eq!(outcome.tags.value(Tag::TurnLanesForward).unwrap().to_string(), "none");
        assert_eq!(outcome.inferred.len(), Tag::OUTPUT.len());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_calculation_stage_chains_pathways() {
        let outcome = run(
            working(&[(Tag::Oneway, "yes"), (Tag::TurnLanes, "left|through|through;right")]),
            definitions(),
        )
        .unwrap();
        assert_eq!(outcome.tags.uint(Tag::LanesForward).unwrap(), UInt::from(3));
        assert_eq!(outcome.tags.uint(Tag::LanesBackward).unwrap(), UInt::ZERO);
        assert_eq!(outcome.tags.uint(Tag::Lanes).unwrap(), UInt::from(3));
        assert_eq!(
            outcome.tags.value(Tag::TurnLanesForward).unwrap().to_string(),
            "left|through|through;right"
        );
        // Everything was derivable without a heuristic.
        assert_eq!(outcome.trace.fallback.len(), 1);
        assert!(!outcome.inferred.contains(&Tag::Oneway));
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_fixed_point_passes_are_monotonic() {
        let outcome = run(working(&[(Tag::LanesForward, "2")]), definitions()).unwrap();
        for passes in [&outcome.trace.calculation, &outcome.trace.fallback] {
            assert!(passes.windows(2).all(|pair| pair[1] <= pair[0]));
            assert!(passes.len() <= Tag::OUTPUT.len() + 1);
        }
        assert_eq!(outcome.tags.uint(Tag::LanesBackward).unwrap(), UInt::from(2));
        assert_eq!(outcome.tags.uint(Tag::Lanes).unwrap(), UInt::from(4));
    }

    #[test]
    fn test_contradictory_counts_warn_instead_of_failing() {
        let outcome = run(
            working(&[(Tag::Lanes, "1"), (Tag::LanesBackward, "2")]),
            definitions(),
        )
        .unwrap();
        // `lanes - backward` has no valid result, so the forward count is a heuristic.
        assert_eq!(outcome.tags.uint(Tag::LanesForward).unwrap(), UInt::from(1));
        let lanes_warnings = outcome.warnings.get(&Tag::Lanes).unwrap();
        assert!(lanes_warnings.contains(&Warning::LaneCountMismatch {
            lanes: 1,
            forward: 1,
            backward: 2
        }));
    }

    #[test]
    fn test_pathway_of_wrong_kind_is_a_defect() {
        let mut definitions = definitions().to_vec();
        for definition in definitions.iter_mut() {
            if definition.tag == Tag::Surface {
                *definition = InferenceDefinition::new(Tag::Surface, "asphalt")
                    .with_calculations(vec![PathwayBuilder::new(Tag::Surface)
                        .assert_is_set(Tag::Oneway)
                        .complete(|_| Ok(Value::Bool(true)))]);
            }
        }
        let err = run(working(&[(Tag::Oneway, "yes")]), &definitions).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_missing_definition_fails_with_missing_tag() {
        let definitions: Vec<_> = definitions()
            .iter()
            .filter(|definition| definition.tag != Tag::Junction)
            .cloned()
            .collect();
        let err = run(WorkingTagSet::new(), &definitions).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingTag);
    }
}
