//! Profile management commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ts_core::profile::DEFAULT_SSH_PORT;
use ts_core::{ConnectionProfile, Credentials, ProfileId, ProfileStore};

use crate::output::{format_profiles, print_info, print_success};

/// Fields for a new profile, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: Option<String>,
    pub key_file: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl NewProfile {
    /// Build the profile, reading the key file if one was given
    pub fn into_profile(self) -> Result<ConnectionProfile> {
        let auth = match (self.password, self.key_file) {
            (Some(_), Some(_)) => anyhow::bail!("Use either --password or --key, not both"),
            (Some(password), None) => Credentials::Password { password },
            (None, Some(path)) => {
                let key = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read key file: {:?}", path))?;
                Credentials::PrivateKey {
                    key,
                    passphrase: self.passphrase,
                }
            }
            (None, None) => anyhow::bail!("A profile needs --password or --key"),
        };

        Ok(ConnectionProfile {
            id: ProfileId::generate(),
            name: self.name,
            host: self.host,
            port: self.port.unwrap_or(DEFAULT_SSH_PORT),
            username: self.username,
            handshake_timeout: self.timeout_secs.map(Duration::from_secs),
            auth,
        })
    }
}

/// List stored profiles as a table or as JSON
pub fn profiles_list(store: &dyn ProfileStore, json: bool) -> Result<()> {
    let profiles = store.list()?;
    if json {
        // Secrets stay out of listings; use `export` to move them
        let redacted: Vec<serde_json::Value> = profiles
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "name": p.name,
                    "host": p.host,
                    "port": p.port,
                    "username": p.username,
                    "auth": p.auth.method(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&redacted)?);
    } else {
        println!("{}", format_profiles(&profiles));
    }
    Ok(())
}

/// Add a profile
pub fn profiles_add(store: &dyn ProfileStore, new: NewProfile) -> Result<ProfileId> {
    let profile = new.into_profile()?;
    let id = profile.id.clone();
    let name = profile.name.clone();
    store
        .save(profile)
        .with_context(|| format!("Failed to save profile '{}'", name))?;
    print_success(&format!("Added profile '{}' ({})", name, id));
    Ok(id)
}

/// Remove a profile
pub fn profiles_remove(store: &dyn ProfileStore, id: &str) -> Result<()> {
    store.delete(&ProfileId::new(id))?;
    print_success(&format!("Removed profile {}", id));
    Ok(())
}

/// Copy a profile under a new ID
pub fn profiles_duplicate(store: &dyn ProfileStore, id: &str) -> Result<()> {
    let copy = store.duplicate(&ProfileId::new(id))?;
    print_success(&format!("Created '{}' ({})", copy.name, copy.id));
    Ok(())
}

/// Export all profiles to a JSON file
pub fn profiles_export(store: &dyn ProfileStore, path: &Path) -> Result<()> {
    let count = store
        .export_json(path)
        .with_context(|| format!("Failed to export profiles to {:?}", path))?;
    print_success(&format!("Exported {} profiles to {:?}", count, path));
    print_info("The export contains credentials; keep it private");
    Ok(())
}

/// Import profiles from a JSON file
pub fn profiles_import(store: &dyn ProfileStore, path: &Path) -> Result<()> {
    let count = store
        .import_json(path)
        .with_context(|| format!("Failed to import profiles from {:?}", path))?;
    print_success(&format!("Imported {} profiles from {:?}", count, path));
    Ok(())
}
