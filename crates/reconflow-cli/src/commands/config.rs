use crate::cli::{ConfigArgs, ConfigCommand};
use anyhow::Context as _;
use reconflow_core::AppConfig;
use std::path::Path;

pub fn run(args: &ConfigArgs, path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = super::load_config(path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommand::Init => {
            let path = match path {
                Some(path) => path.to_path_buf(),
                None => AppConfig::config_path()?,
            };
            if path.exists() {
                println!("{} already exists", path.display());
                return Ok(());
            }
            AppConfig::default()
                .save_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}
