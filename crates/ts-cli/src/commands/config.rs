//! Config command implementations

use anyhow::{Context, Result};
use std::path::Path;

use ts_core::config::{self, ClientConfig};

use crate::output::{print_error, print_info, print_success, print_warning};

/// Print the config file location
pub fn config_path(path: &Path) -> Result<()> {
    println!("{}", path.display());
    Ok(())
}

/// Show the effective configuration
pub fn config_show(path: &Path) -> Result<()> {
    let config = if path.exists() {
        print_info(&format!("Configuration file: {:?}", path));
        config::load_or_default(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?
    } else {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'tabshell config init' to create one; showing defaults");
        ClientConfig::default()
    };
    println!();

    let content = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    println!("{}", content);
    Ok(())
}

/// Write the default configuration
pub fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    config::save_config(path, &ClientConfig::default())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        config_init(&path, false).unwrap();
        let loaded = config::load_or_default(&path).unwrap();
        assert_eq!(loaded.term, ClientConfig::default().term);
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "handshake_timeout = 12\n").unwrap();

        config_init(&path, false).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "handshake_timeout = 12\n"
        );
    }
}
