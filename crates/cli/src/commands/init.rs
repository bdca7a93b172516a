//! `tandem init` — write a default config file.

use std::path::Path;

use tandem_config::AppConfig;

use super::CliResult;

pub fn run(config_path: Option<&Path>) -> CliResult {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if config_path.exists() {
        println!("  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run `tandem init`.");
        return Ok(());
    }

    write_default(&config_path)?;
    println!("  Created {}", config_path.display());
    println!();
    println!("  Next steps:");
    println!("    1. Add your API key to the file, or export TANDEM_API_KEY");
    println!("    2. Run: tandem chat");
    Ok(())
}

fn write_default(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, AppConfig::default_toml())
}
