use std::env;
use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use lane_inference::config::UserConfig;
use lane_inference::errors::Result;
use lane_inference::etl::compile_ways::CompileWaysEtl;
use lane_inference::etl::parse_osm::ParseOsmEtl;
use lane_inference::etl::Etl;
use lane_inference::inference::definition::{check_registry, definitions};

const DEFAULT_CONFIG_PATH: &str = "config/default.json";

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.output_dir).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let user_config = UserConfig::load(&config_path)?;
    setup_logging(&user_config.log_level);
    info!(
        config_path = config_path.as_str(), data_path = user_config.data_path.as_str();
        "Loaded config"
    );

    check_registry(definitions())?;

    let output_dir = create_output_dir(&user_config)?;
    let mut parse_osm = ParseOsmEtl::new(&user_config);
    let mut compile_ways = CompileWaysEtl::new(&user_config);
    if user_config.rebuild {
        parse_osm.clean(&output_dir)?;
        compile_ways.clean(&output_dir)?;
    }

    parse_osm.process(&output_dir)?;
    compile_ways.process(&output_dir)?;

    Ok(())
}
