pub mod config;
pub mod host;
pub mod site;

use sitegate_core::{Config, Database};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Open the allowance database named by `config`.
pub fn open_store(config: &Config) -> Result<Database, Box<dyn std::error::Error>> {
    let path = config.database_path()?;
    Ok(Database::open(&path)?)
}
