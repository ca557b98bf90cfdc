use std::{fs::{self, File}, io::{BufWriter, Write}, path::Path};

use log::{info, warn};

use crate::{
    config::UserConfig,
    data::{osm::Way, record::WayRecord, OsmMapData},
    errors::{Error, Result},
    inference::compile_way,
};
use crate::etl::parse_osm;

use super::Etl;

pub const ETL_NAME: &str = "compile_ways";
pub const OUTPUT_FILE_NAME: &str = "way_records.json";

/// Turns the parsed ways into lane records. Ways with malformed tags are
/// skipped and counted; any other failure aborts the batch.
pub struct CompileWaysEtl<'a> {
    config: &'a UserConfig,
    skipped: usize,
}

impl CompileWaysEtl<'_> {
    pub fn new(config: &UserConfig) -> CompileWaysEtl {
        CompileWaysEtl {
            config,
            skipped: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn is_selected(&self, way: &Way) -> bool {
        !self.config.highways_only || way.has_key("highway")
    }

    fn compile_all(&mut self, ways: impl Iterator<Item = Way>) -> Result<Vec<WayRecord>> {
        let mut records = Vec::new();
        for way in ways {
            match compile_way(&way) {
                Ok(record) => records.push(record),
                Err(err) if err.is_invalid_encoding() => {
                    warn!(
                        etl_name = ETL_NAME, way_id = way.id, err = err.message.as_str();
                        "Skipping way with malformed tags"
                    );
                    self.skipped += 1;
                },
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }
}

impl Etl for CompileWaysEtl<'_> {
    type Input = OsmMapData;
    type Output = Vec<WayRecord>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn output_file_name(&self) -> &str {
        OUTPUT_FILE_NAME
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let input_file_path = dir.join(parse_osm::OUTPUT_FILE_NAME);
        let bytes = fs::read(input_file_path)?;

        // The archive must be read from an aligned buffer.
        let mut aligned = rkyv::AlignedVec::with_capacity(bytes.len());
        aligned.extend_from_slice(&bytes);

        let input = rkyv::from_bytes::<OsmMapData>(&aligned)
            .map_err(|err| Error::from(format!("Could not deserialize way cache: {:?}", err)))?;
        Ok(input)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        self.skipped = 0;
        let selected: Vec<Way> = input
            .ways
            .into_iter()
            .filter(|way| self.is_selected(way))
            .collect();
        info!(etl_name = ETL_NAME, ways = selected.len(); "Compiling ways");

        let records = self.compile_all(tqdm::tqdm(selected.into_iter()))?;
        info!(
            etl_name = ETL_NAME, records = records.len(), skipped = self.skipped;
            "Compiled ways"
        );
        Ok(records)
    }

    fn load(&mut self, output_path: &Path, output: Self::Output) -> Result<()> {
        let warnings: usize = output.iter().map(WayRecord::warning_count).sum();
        let mut writer = BufWriter::new(File::create(output_path)?);
        serde_json::to_writer_pretty(&mut writer, &output)?;
        writer.flush()?;
        info!(
            etl_name = ETL_NAME, records = output.len(), warnings = warnings;
            "Wrote way records"
        );
        Ok(())
    }
}
