use std::collections::HashMap;

use log::debug;

use crate::{
    data::{osm::Way, record::WayRecord, tag::{Tag, WorkingTagSet}},
    errors::{Error, Result},
};

use super::{
    definition::{definitions, InferenceDefinition},
    pipeline,
};

/// Parses every recognized key of `raw`. Absent keys stay unset; a present
/// value that does not fit its tag's grammar fails the whole parse.
pub fn parse_tags(raw: &HashMap<String, String>) -> Result<WorkingTagSet> {
    let mut working = WorkingTagSet::new();
    for tag in Tag::ALL {
        if let Some(text) = raw.get(tag.key()) {
            let value = tag.kind().parse(text).map_err(|err| {
                Error::new(err.kind, format!("{}={}: {}", tag.key(), text, err.message))
            })?;
            working.set(tag, value);
        }
    }
    Ok(working)
}

/// Compiles one way with the registered definitions.
pub fn compile_way(way: &Way) -> Result<WayRecord> {
    compile_way_with(way, definitions())
}

pub fn compile_way_with(way: &Way, definitions: &[InferenceDefinition]) -> Result<WayRecord> {
    let working = parse_tags(&way.tags)?;
    let outcome = pipeline::run(working, definitions)?;

    let record = WayRecord {
        id: way.id,
        nodes: way.nodes.clone(),
        raw_tags: way.tags.iter().map(|(key, value)| (key.clone(), value.clone())).collect(),
        tags: outcome.tags,
        inferred: outcome.inferred,
        warnings: outcome.warnings,
    };
    debug!(way_id = way.id, warnings = record.warning_count(); "Compiled way");
    Ok(record)
}
