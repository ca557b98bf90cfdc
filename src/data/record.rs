use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::Serialize;

use super::{
    osm::OsmId,
    tag::{FinalTagSet, Tag},
};

pub type WarningSets = BTreeMap<Tag, BTreeSet<Warning>>;

/// Advisory note about a final tag value that disagrees with other tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    OnewayWithBackwardLanes { backward: u32 },
    RoundaboutNotOneway,
    LaneCountMismatch { lanes: u32, forward: u32, backward: u32 },
    TurnLanesMismatch { markings: usize, lanes: u32 },
    UnrecognizedSurface { surface: String },
    UnrecognizedTurnMarking { marking: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::OnewayWithBackwardLanes { backward } => {
                write!(f, "oneway with {} backward lanes", backward)
            }
            Warning::RoundaboutNotOneway => write!(f, "roundabout that is not oneway"),
            Warning::LaneCountMismatch { lanes, forward, backward } => write!(
                f,
                "{} lanes but {} forward and {} backward",
                lanes, forward, backward
            ),
            Warning::TurnLanesMismatch { markings, lanes } => write!(
                f,
                "turn lanes unequal to lanes: {} marked, {} lanes",
                markings, lanes
            ),
            Warning::UnrecognizedSurface { surface } => {
                write!(f, "unrecognized surface '{}'", surface)
            }
            Warning::UnrecognizedTurnMarking { marking } => {
                write!(f, "unrecognized turn marking '{}'", marking)
            }
        }
    }
}

/// Compiled lane description of one way.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WayRecord {
    pub id: OsmId,
    pub nodes: Vec<OsmId>,
    /// Tags as found in the source, including the ones the model ignores.
    pub raw_tags: BTreeMap<String, String>,
    pub tags: FinalTagSet,
    /// Tags absent from `raw_tags` whose value the pipeline supplied.
    pub inferred: BTreeSet<Tag>,
    pub warnings: WarningSets,
}

impl WayRecord {
    pub fn is_inferred(&self, tag: Tag) -> bool {
        self.inferred.contains(&tag)
    }

    pub fn warnings_for(&self, tag: Tag) -> impl Iterator<Item = &Warning> {
        self.warnings.get(&tag).into_iter().flatten()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.values().map(BTreeSet::len).sum()
    }
}
