//! `cogni config` — Configuration management commands.

use cogni_config::AppConfig;
use std::path::Path;

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path(config_path: &Path) {
    println!("{}", config_path.display());
}

pub fn init(config_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() && !force {
        println!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
        return Ok(());
    }

    if let Some(dir) = config_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("Wrote default config to {}", config_path.display());
    println!("No tools are allowed until you list them under [tools].allowed_tools.");
    Ok(())
}
