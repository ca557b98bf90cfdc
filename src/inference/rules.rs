//! Inference definitions for every output tag.
//!
//! The lane counts are tied together by `lanes = forward + backward`. Each of
//! the three can be calculated from the other two; those relations are listed
//! again among the fallbacks because a fallback can supply the missing operand.

use std::collections::BTreeSet;

use crate::{
    data::{
        record::Warning,
        tag::{FinalTagSet, Tag, TagLookup},
        value::{Array, DoubleArray, UInt, Value},
    },
    errors::{Error, ErrorKind, Result},
};

use super::{
    definition::InferenceDefinition,
    pathway::{Pathway, PathwayBuilder},
};

const ROUNDABOUT: &str = "roundabout";
const DEFAULT_SURFACE: &str = "asphalt";
const NO_MARKING: &str = "none";

const KNOWN_SURFACES: &[&str] = &[
    "asphalt",
    "chipseal",
    "cobblestone",
    "compacted",
    "concrete",
    "concrete:plates",
    "concrete:lanes",
    "dirt",
    "earth",
    "fine_gravel",
    "grass",
    "grass_paver",
    "gravel",
    "ground",
    "metal",
    "mud",
    "paved",
    "paving_stones",
    "pebblestone",
    "rock",
    "sand",
    "sett",
    "unhewn_cobblestone",
    "unpaved",
    "wood",
];

const KNOWN_TURN_MARKINGS: &[&str] = &[
    NO_MARKING,
    "left",
    "slight_left",
    "sharp_left",
    "through",
    "right",
    "slight_right",
    "sharp_right",
    "reverse",
    "merge_to_left",
    "merge_to_right",
];

pub fn definitions() -> Vec<InferenceDefinition> {
    vec![
        oneway(),
        junction(),
        surface(),
        lanes(),
        lanes_forward(),
        lanes_backward(),
        turn_lanes_forward(),
        turn_lanes_backward(),
    ]
}

fn oneway() -> InferenceDefinition {
    InferenceDefinition::new(Tag::Oneway, false)
        .with_calculations(vec![PathwayBuilder::new(Tag::Oneway)
            .assert_is_eq(Tag::Junction, ROUNDABOUT)
            .complete(|_| Ok(true.into()))])
        .with_validate(validate_oneway)
}

fn junction() -> InferenceDefinition {
    InferenceDefinition::new(Tag::Junction, "").with_format(normalize_text)
}

fn surface() -> InferenceDefinition {
    InferenceDefinition::new(Tag::Surface, DEFAULT_SURFACE)
        .with_format(normalize_text)
        .with_validate(validate_surface)
}

fn lanes() -> InferenceDefinition {
    InferenceDefinition::new(Tag::Lanes, UInt::from(2))
        .with_calculations(vec![lanes_from_directions()])
        .with_fallbacks(vec![
            lanes_from_directions(),
            PathwayBuilder::new(Tag::Lanes)
                .assert_is_eq(Tag::Oneway, true)
                .complete(|_| Ok(UInt::from(1).into())),
            PathwayBuilder::new(Tag::Lanes)
                .assert_is_eq(Tag::Oneway, false)
                .complete(|_| Ok(UInt::from(2).into())),
        ])
        .with_validate(validate_lanes)
}

fn lanes_forward() -> InferenceDefinition {
    InferenceDefinition::new(Tag::LanesForward, UInt::from(1))
        .with_calculations(vec![
            forward_from_remainder(),
            PathwayBuilder::new(Tag::LanesForward)
                .assert_is_set(Tag::TurnLanesForward)
                .complete(|tags| count_rows(tags.double_array(Tag::TurnLanesForward)?)),
        ])
        .with_fallbacks(vec![
            forward_from_remainder(),
            // The larger half goes forward.
            PathwayBuilder::new(Tag::LanesForward)
                .assert_is_set(Tag::Lanes)
                .complete(|tags| {
                    let lanes = tags.uint(Tag::Lanes)?;
                    Ok(lanes.subtract(lanes.divide(UInt::from(2))?)?.into())
                }),
            PathwayBuilder::new(Tag::LanesForward)
                .assert_is_set(Tag::LanesBackward)
                .complete(|tags| Ok(tags.uint(Tag::LanesBackward)?.into())),
        ])
}

fn lanes_backward() -> InferenceDefinition {
    InferenceDefinition::new(Tag::LanesBackward, UInt::from(1))
        .with_calculations(vec![
            PathwayBuilder::new(Tag::LanesBackward)
                .assert_is_eq(Tag::Oneway, true)
                .complete(|_| Ok(UInt::ZERO.into())),
            backward_from_remainder(),
            PathwayBuilder::new(Tag::LanesBackward)
                .assert_is_set(Tag::TurnLanesBackward)
                .complete(|tags| count_rows(tags.double_array(Tag::TurnLanesBackward)?)),
        ])
        .with_fallbacks(vec![
            backward_from_remainder(),
            PathwayBuilder::new(Tag::LanesBackward)
                .assert_is_set(Tag::Lanes)
                .complete(|tags| Ok(tags.uint(Tag::Lanes)?.divide(UInt::from(2))?.into())),
            PathwayBuilder::new(Tag::LanesBackward)
                .assert_is_set(Tag::LanesForward)
                .complete(|tags| Ok(tags.uint(Tag::LanesForward)?.into())),
        ])
}

fn turn_lanes_forward() -> InferenceDefinition {
    InferenceDefinition::new(Tag::TurnLanesForward, DoubleArray::empty())
        .with_calculations(vec![PathwayBuilder::new(Tag::TurnLanesForward)
            .assert_is_eq(Tag::Oneway, true)
            .assert_is_set(Tag::TurnLanes)
            .complete(|tags| Ok(tags.value(Tag::TurnLanes)?.clone()))])
        .with_format(format_turn_lanes)
        .with_validate(|value, tags, warnings| {
            validate_turn_lanes(value, tags.uint(Tag::LanesForward)?, warnings)
        })
}

fn turn_lanes_backward() -> InferenceDefinition {
    InferenceDefinition::new(Tag::TurnLanesBackward, DoubleArray::empty())
        .with_calculations(vec![PathwayBuilder::new(Tag::TurnLanesBackward)
            .assert_is_eq(Tag::Oneway, true)
            .complete(|_| Ok(DoubleArray::empty().into()))])
        .with_format(format_turn_lanes)
        .with_validate(|value, tags, warnings| {
            validate_turn_lanes(value, tags.uint(Tag::LanesBackward)?, warnings)
        })
}

fn lanes_from_directions() -> Pathway {
    PathwayBuilder::new(Tag::Lanes)
        .assert_is_set(Tag::LanesForward)
        .assert_is_set(Tag::LanesBackward)
        .complete(|tags| {
            Ok(tags.uint(Tag::LanesForward)?.add(tags.uint(Tag::LanesBackward)?).into())
        })
}

fn forward_from_remainder() -> Pathway {
    PathwayBuilder::new(Tag::LanesForward)
        .assert_is_set(Tag::Lanes)
        .assert_is_set(Tag::LanesBackward)
        .complete(|tags| {
            Ok(tags.uint(Tag::Lanes)?.subtract(tags.uint(Tag::LanesBackward)?)?.into())
        })
}

fn backward_from_remainder() -> Pathway {
    PathwayBuilder::new(Tag::LanesBackward)
        .assert_is_set(Tag::Lanes)
        .assert_is_set(Tag::LanesForward)
        .complete(|tags| {
            Ok(tags.uint(Tag::Lanes)?.subtract(tags.uint(Tag::LanesForward)?)?.into())
        })
}

fn count_rows(markings: &DoubleArray) -> Result<Value> {
    let rows = i64::try_from(markings.len())
        .map_err(|_| Error::invalid_encoding("too many turn lanes"))?;
    Ok(UInt::new(rows)?.into())
}

fn normalize_text(tag: Tag, value: &Value, _tags: &FinalTagSet) -> Result<Value> {
    let text = value
        .as_str()
        .ok_or_else(|| Error::type_mismatch(tag, "a string"))?;
    Ok(text.trim().to_lowercase().into())
}

/// Trims markings and writes absent ones as `none`. A value without lanes
/// becomes one unmarked lane per lane in that direction.
fn format_turn_lanes(tag: Tag, value: &Value, tags: &FinalTagSet) -> Result<Value> {
    let lanes = match tag {
        Tag::TurnLanesForward => tags.uint(Tag::LanesForward)?,
        Tag::TurnLanesBackward => tags.uint(Tag::LanesBackward)?,
        _ => return Ok(value.clone()),
    };
    let markings = value
        .as_double_array()
        .ok_or_else(|| Error::type_mismatch(tag, "a double array"))?;

    if markings.is_empty() {
        let rows = (0..lanes.get())
            .map(|_| Array::new(vec![NO_MARKING.into()]))
            .collect::<Result<Vec<_>>>()?;
        return Ok(DoubleArray::with_delimiter(rows, markings.delimiter())?.into());
    }

    let rows = markings
        .rows()
        .iter()
        .map(|row| {
            let items = row
                .items()
                .iter()
                .map(|item| {
                    let marking = item.to_string().trim().to_lowercase();
                    if marking.is_empty() {
                        Value::from(NO_MARKING)
                    } else {
                        Value::from(marking)
                    }
                })
                .collect();
            Array::with_delimiter(items, row.delimiter())
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DoubleArray::with_delimiter(rows, markings.delimiter())?.into())
}

fn validate_oneway(
    value: &Value,
    tags: &FinalTagSet,
    warnings: &mut BTreeSet<Warning>,
) -> Result<()> {
    let oneway = value
        .as_bool()
        .ok_or_else(|| Error::type_mismatch(Tag::Oneway, "a boolean"))?;
    let backward = tags.uint(Tag::LanesBackward)?;
    if oneway && backward != UInt::ZERO {
        warnings.insert(Warning::OnewayWithBackwardLanes {
            backward: backward.get(),
        });
    }
    if !oneway && tags.str(Tag::Junction)? == ROUNDABOUT {
        warnings.insert(Warning::RoundaboutNotOneway);
    }
    Ok(())
}

fn validate_surface(
    value: &Value,
    _tags: &FinalTagSet,
    warnings: &mut BTreeSet<Warning>,
) -> Result<()> {
    let surface = value
        .as_str()
        .ok_or_else(|| Error::type_mismatch(Tag::Surface, "a string"))?;
    if !KNOWN_SURFACES.contains(&surface) {
        warnings.insert(Warning::UnrecognizedSurface {
            surface: surface.to_string(),
        });
    }
    Ok(())
}

fn validate_lanes(
    value: &Value,
    tags: &FinalTagSet,
    warnings: &mut BTreeSet<Warning>,
) -> Result<()> {
    let lanes = value
        .as_uint()
        .ok_or_else(|| Error::type_mismatch(Tag::Lanes, "an unsigned integer"))?;
    let forward = tags.uint(Tag::LanesForward)?;
    let backward = tags.uint(Tag::LanesBackward)?;
    if lanes != forward.add(backward) {
        warnings.insert(Warning::LaneCountMismatch {
            lanes: lanes.get(),
            forward: forward.get(),
            backward: backward.get(),
        });
    }
    Ok(())
}

fn validate_turn_lanes(value: &Value, lanes: UInt, warnings: &mut BTreeSet<Warning>) -> Result<()> {
    let markings = value
        .as_double_array()
        .ok_or_else(|| Error::new(ErrorKind::TypeMismatch, "turn lanes are not a double array"))?;
    if markings.len() != lanes.get() as usize {
        warnings.insert(Warning::TurnLanesMismatch {
            markings: markings.len(),
            lanes: lanes.get(),
        });
    }
    for marking in markings.rows().iter().flat_map(Array::items) {
        let marking = marking.to_string();
        if !KNOWN_TURN_MARKINGS.contains(&marking.as_str()) {
            warnings.insert(Warning::UnrecognizedTurnMarking { marking });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::{tag::WorkingTagSet, value::ValueKind},
        inference::definition::Stage,
    };

    fn working(raw: &[(Tag, &str)]) -> WorkingTagSet {
        let mut working = WorkingTagSet::new();
        for (tag, text) in raw {
            working.set(*tag, tag.kind().parse(text).unwrap());
        }
        working
    }

    fn complete(raw: &[(Tag, &str)]) -> FinalTagSet {
        working(raw).into_final().unwrap()
    }

    /// Consistent tag sets: every calculation that fires on one of them must
    /// yield the value already recorded for its target.
    fn consistent_ways() -> Vec<Vec<(Tag, &'static str)>> {
        vec![
            vec![
                (Tag::Oneway, "yes"),
                (Tag::Junction, ""),
                (Tag::Lanes, "2"),
                (Tag::LanesForward, "2"),
                (Tag::LanesBackward, "0"),
                (Tag::TurnLanes, "left|through"),
                (Tag::TurnLanesForward, "left|through"),
                (Tag::TurnLanesBackward, ""),
            ],
            vec![
                (Tag::Oneway, "no"),
                (Tag::Junction, ""),
                (Tag::Lanes, "4"),
                (Tag::LanesForward, "3"),
                (Tag::LanesBackward, "1"),
                (Tag::TurnLanesForward, "left|through|through;right"),
                (Tag::TurnLanesBackward, "through"),
            ],
            vec![
                (Tag::Oneway, "yes"),
                (Tag::Junction, "roundabout"),
                (Tag::Lanes, "1"),
                (Tag::LanesForward, "1"),
                (Tag::LanesBackward, "0"),
                (Tag::TurnLanesBackward, ""),
            ],
        ]
    }

    #[test]
    fn test_calculations_agree_on_consistent_tags() {
        for raw in consistent_ways() {
            let full = working(&raw);
            for definition in definitions() {
                let Some(expected) = full.get(definition.tag) else {
                    continue;
                };
                let mut without_target = WorkingTagSet::new();
                for (tag, text) in &raw {
                    if *tag != definition.tag {
                        without_target.set(*tag, tag.kind().parse(text).unwrap());
                    }
                }
                for pathway in definition.pathways(Stage::Calculation) {
                    if let Some(value) = pathway.evaluate(&without_target).unwrap() {
                        assert_eq!(&value, expected, "{:?} on {:?}", pathway, raw);
                    }
                }
            }
        }
    }

    #[test]
    fn test_formatters_are_idempotent() {
        let tags = complete(&[
            (Tag::Oneway, "no"),
            (Tag::Junction, " Roundabout "),
            (Tag::Surface, "Paving_Stones "),
            (Tag::Lanes, "3"),
            (Tag::LanesForward, "2"),
            (Tag::LanesBackward, "1"),
            (Tag::TurnLanesForward, "Left||through; right"),
            (Tag::TurnLanesBackward, ""),
        ]);
        for definition in definitions() {
            let value = tags.value(definition.tag).unwrap();
            let once = (definition.format)(definition.tag, value, &tags).unwrap();
            let twice = (definition.format)(definition.tag, &once, &tags).unwrap();
            assert_eq!(once, twice, "{}", definition.tag);
        }
    }

    #[test]
    fn test_format_turn_lanes_marks_absent_markings() {
        let tags = complete(&[
            (Tag::Oneway, "no"),
            (Tag::Junction, ""),
            (Tag::Surface, "asphalt"),
            (Tag::Lanes, "3"),
            (Tag::LanesForward, "2"),
            (Tag::LanesBackward, "1"),
            (Tag::TurnLanesForward, "Left||through; right"),
            (Tag::TurnLanesBackward, ""),
        ]);
        let forward = format_turn_lanes(
            Tag::TurnLanesForward,
            tags.value(Tag::TurnLanesForward).unwrap(),
            &tags,
        )
        .unwrap();
        assert_eq!(forward.to_string(), "left|none|through;right");

        let backward = format_turn_lanes(
            Tag::TurnLanesBackward,
            tags.value(Tag::TurnLanesBackward).unwrap(),
            &tags,
        )
        .unwrap();
        assert_eq!(backward.to_string(), "none");
    }

    #[test]
    fn test_format_turn_lanes_without_lanes_stays_empty() {
        let tags = complete(&[
            (Tag::Oneway, "yes"),
            (Tag::Junction, ""),
            (Tag::Surface, "asphalt"),
            (Tag::Lanes, "1"),
            (Tag::LanesForward, "1"),
            (Tag::LanesBackward, "0"),
            (Tag::TurnLanesForward, "through"),
            (Tag::TurnLanesBackward, ""),
        ]);
        let backward = format_turn_lanes(
            Tag::TurnLanesBackward,
            tags.value(Tag::TurnLanesBackward).unwrap(),
            &tags,
        )
        .unwrap();
        assert!(backward.as_double_array().unwrap().is_empty());
    }

    #[test]
    fn test_filled_turn_lanes_match_wide_roads() {
        let tags = complete(&[
            (Tag::Oneway, "yes"),
            (Tag::Junction, ""),
            (Tag::Surface, "asphalt"),
            (Tag::Lanes, "70"),
            (Tag::LanesForward, "70"),
            (Tag::LanesBackward, "0"),
            (Tag::TurnLanesForward, ""),
            (Tag::TurnLanesBackward, ""),
        ]);
        let forward = format_turn_lanes(
            Tag::TurnLanesForward,
            tags.value(Tag::TurnLanesForward).unwrap(),
            &tags,
        )
        .unwrap();
        assert_eq!(forward.as_double_array().unwrap().len(), 70);

        let mut warnings = BTreeSet::new();
        validate_turn_lanes(&forward, UInt::from(70), &mut warnings).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_turn_lanes_reports_mismatch_and_unknown_markings() {
        let value = ValueKind::double_array(ValueKind::Str)
            .parse("left|through;u_turn")
            .unwrap();
        let mut warnings = BTreeSet::new();
        validate_turn_lanes(&value, UInt::from(3), &mut warnings).unwrap();
        assert!(warnings.contains(&Warning::TurnLanesMismatch { markings: 2, lanes: 3 }));
        assert!(warnings.contains(&Warning::UnrecognizedTurnMarking {
            marking: "u_turn".to_string()
        }));
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_validate_surface() {
        let tags = complete(&[
            (Tag::Oneway, "no"),
            (Tag::Junction, ""),
            (Tag::Surface, "asphalt"),
            (Tag::Lanes, "2"),
            (Tag::LanesForward, "1"),
            (Tag::LanesBackward, "1"),
            (Tag::TurnLanesForward, ""),
            (Tag::TurnLanesBackward, ""),
        ]);
        let mut warnings = BTreeSet::new();
        validate_surface(&Value::from("asphalt"), &tags, &mut warnings).unwrap();
        assert!(warnings.is_empty());
        validate_surface(&Value::from("lava"), &tags, &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_validate_roundabout_must_be_oneway() {
        let tags = complete(&[
            (Tag::Oneway, "no"),
            (Tag::Junction, "roundabout"),
            (Tag::Surface, "asphalt"),
            (Tag::Lanes, "2"),
            (Tag::LanesForward, "1"),
            (Tag::LanesBackward, "1"),
            (Tag::TurnLanesForward, ""),
            (Tag::TurnLanesBackward, ""),
        ]);
        let mut warnings = BTreeSet::new();
        validate_oneway(&Value::Bool(false), &tags, &mut warnings).unwrap();
        assert_eq!(warnings, BTreeSet::from([Warning::RoundaboutNotOneway]));
    }
}
