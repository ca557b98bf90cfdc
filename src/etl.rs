pub mod compile_ways;
pub mod parse_osm;

use std::{fs, path::{Path, PathBuf}};
use log::{info, error};

use crate::errors::Result;


/// One cached step of the batch: reads what earlier steps left in the output
/// directory and writes a single file there.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;
    fn output_file_name(&self) -> &str;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, output_path: &Path, output: Self::Output) -> Result<()>;

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.output_file_name())
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(self.output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        if self.is_cached(dir)? {
            fs::remove_file(self.output_path(dir))?;
            info!(etl_name = self.etl_name(); "Removed cached output");
        }
        Ok(())
    }

    fn process(&mut self, dir: &Path) -> Result<()> {
        let etl_name = self.etl_name().to_string();
        info!(etl_name = etl_name.as_str(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = etl_name.as_str(); "Using cached value");
            return Ok(());
        }

        info!(etl_name = etl_name.as_str(); "Extracting");
        let input = log_failure(&etl_name, "extract", self.extract(dir))?;

        info!(etl_name = etl_name.as_str(); "Transforming");
        let output = log_failure(&etl_name, "transform", self.transform(input))?;

        info!(etl_name = etl_name.as_str(); "Loading");
        let output_path = self.output_path(dir);
        log_failure(&etl_name, "load", self.load(&output_path, output))?;

        info!(etl_name = etl_name.as_str(); "Process finished");
        Ok(())
    }
}

fn log_failure<T>(etl_name: &str, step: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error!(
            etl_name = etl_name, step = step, err = err.message.as_str();
            "ETL step failed with error"
        );
    }
    result
}
