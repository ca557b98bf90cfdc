use std::collections::HashMap;

pub type OsmId = u64;

/// A `<way>` element as it appears in the .osm file: ordered node references
/// and the free-text tag dictionary, kept without any processing.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone, PartialEq)]
#[archive(check_bytes)]
pub struct Way {
    pub id: OsmId,
    pub nodes: Vec<OsmId>,
    pub tags: HashMap<String, String>,
}

impl Way {
    pub fn has_key(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }
}
