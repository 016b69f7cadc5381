//! Config command - print the effective configuration

use crate::cli::error::HelpfulError;
use anyhow::Result;
use citeflow_ingest::IngestConfig;

/// Arguments for the config command
#[derive(Debug)]
pub struct ConfigArgs {
    pub json: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let path = IngestConfig::default_path();
    let config = IngestConfig::resolve(None)
        .map_err(|err| HelpfulError::invalid_config(&path, &err.to_string()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        if path.is_file() {
            println!("# loaded from {}", path.display());
        } else {
            println!("# defaults (no {})", path.display());
        }
        print!("{}", config.to_toml_string()?);
    }
    Ok(())
}
