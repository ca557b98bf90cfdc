use self::osm::Way;

pub mod osm;
pub mod record;
pub mod tag;
pub mod value;

/// Ways read from the .osm file, in document order.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
#[archive(check_bytes)]
pub struct OsmMapData {
    pub ways: Vec<Way>,
}
