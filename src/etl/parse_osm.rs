use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::str;

use log::info;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::config::UserConfig;
use crate::data::OsmMapData;
use crate::data::osm::{OsmId, Way};
use crate::errors::{Error, Result};
use crate::etl::Etl;

pub const ETL_NAME: &str = "parse_osm";
pub const OUTPUT_FILE_NAME: &str = "osm_ways.rkyv";

enum ParserState {
    Top,
    Way(Way),
    /// Inside a node or relation, whose tags are not ours.
    Other,
}

pub struct ParseOsmEtl<'a> {
    config: &'a UserConfig,
}

impl ParseOsmEtl<'_> {
    fn create_osm_reader(&self) -> Result<Reader<Box<dyn BufRead>>> {
        let file = fs::File::open(&self.config.data_path)?;
        let file_reader = BufReader::new(file);
        let source: Box<dyn BufRead> = if self.config.data_path.ends_with(".xz") {
            Box::new(BufReader::new(XzDecoder::new(file_reader)))
        } else {
            Box::new(file_reader)
        };
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        Ok(reader)
    }

    pub fn new(config: &UserConfig) -> ParseOsmEtl {
        ParseOsmEtl {
            config
        }
    }
}

fn parse_way(el: &BytesStart) -> Result<Way> {
    let mut id: Option<OsmId> = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == b"id" {
            id = Some(attribute.unescape_value()?.parse()?);
        }
    }

    Ok(Way {
        id: id.ok_or("Way element without id")?,
        nodes: Vec::new(),
        tags: HashMap::new(),
    })
}

fn parse_node_ref(el: &BytesStart) -> Result<OsmId> {
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        if attribute.key.as_ref() == b"ref" {
            return Ok(attribute.unescape_value()?.parse()?);
        }
    }
    Err("Node reference without ref".into())
}

fn parse_tag(el: &BytesStart) -> Result<(String, String)> {
    let mut key: Option<String> = None;
    let mut value: Option<String> = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        match attribute.key.as_ref() {
            b"k" => key = Some(attribute.unescape_value()?.into_owned()),
            b"v" => value = Some(attribute.unescape_value()?.into_owned()),
            _ => (),
        }
    }
    match (key, value) {
        (Some(key), Some(value)) => Ok((key, value)),
        _ => Err(Error::from("Tag element needs both k and v")),
    }
}

/// Collects every way of an OSM XML document, with its node references and
/// tags in document order.
pub fn read_ways<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<Way>> {
    let mut buf = Vec::new();
    let mut state = ParserState::Top;
    let mut ways: Vec<Way> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                match e.name().as_ref() {
                    b"way" => state = ParserState::Way(parse_way(&e)?),
                    b"node" | b"relation" => state = ParserState::Other,
                    _ => (),
                }
            },
            Event::Empty(e) => {
                match (e.name().as_ref(), &mut state) {
                    (b"nd", ParserState::Way(way)) => way.nodes.push(parse_node_ref(&e)?),
                    (b"tag", ParserState::Way(way)) => {
                        let (key, value) = parse_tag(&e)?;
                        way.tags.insert(key, value);
                    },
                    (b"way", _) => ways.push(parse_way(&e)?),
                    _ => (),
                }
            },
            Event::End(e) => {
                match e.name().as_ref() {
                    b"way" => {
                        let finished = std::mem::replace(&mut state, ParserState::Top);
                        if let ParserState::Way(way) = finished {
                            ways.push(way);
                        }
                    },
                    b"node" | b"relation" => state = ParserState::Top,
                    _ => (),
                }
            },
            Event::Text(_) => return Err("Didn't expect to see Text in OSM file.".into()),
            _ => (),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    };
    Ok(ways)
}

impl Etl for ParseOsmEtl<'_> {
    type Input = Reader<Box<dyn BufRead>>;
    type Output = OsmMapData;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        self.create_osm_reader()
    }

    fn transform(&mut self, mut input: Self::Input) -> Result<Self::Output> {
        let ways = read_ways(&mut input)?;
        info!(etl_name = ETL_NAME, ways = ways.len(); "Read ways");
        Ok(OsmMapData {
            ways,
        })
    }

    fn load(&mut self, output_path: &Path, output: Self::Output) -> Result<()> {
        let bytes = rkyv::to_bytes::<_, 256>(&output)
            .map_err(|err| format!("Could not serialize ways: {:?}", err))?;
        let mut output_file = fs::File::create(output_path)?;
        output_file.write_all(&bytes)?;
        Ok(())
    }
}
