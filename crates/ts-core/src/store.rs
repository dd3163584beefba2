//! Profile persistence
//!
//! Profiles are kept in a TOML file (`[[profiles]]` tables). Writes go
//! through a temporary file and a rename so a crash never leaves a
//! half-written store behind.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ProfileError;
use crate::profile::ConnectionProfile;
use crate::types::ProfileId;

/// Storage for connection profiles
pub trait ProfileStore: Send + Sync {
    /// All stored profiles in insertion order
    fn list(&self) -> Result<Vec<ConnectionProfile>, ProfileError>;

    /// Insert a new profile or replace the one with the same ID
    fn save(&self, profile: ConnectionProfile) -> Result<(), ProfileError>;

    /// Remove a profile
    fn delete(&self, id: &ProfileId) -> Result<(), ProfileError>;

    /// Look up a single profile
    fn get(&self, id: &ProfileId) -> Result<ConnectionProfile, ProfileError> {
        self.list()?
            .into_iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| ProfileError::NotFound(id.clone()))
    }

    /// Store a copy of a profile under a fresh ID and return it
    fn duplicate(&self, id: &ProfileId) -> Result<ConnectionProfile, ProfileError> {
        let copy = self.get(id)?.duplicate();
        self.save(copy.clone())?;
        Ok(copy)
    }

    /// Write all profiles to `path` as a pretty JSON array
    fn export_json(&self, path: &Path) -> Result<usize, ProfileError> {
        let profiles = self.list()?;
        let json = serde_json::to_string_pretty(&profiles)?;
        write_private(path, &json)?;
        Ok(profiles.len())
    }

    /// Upsert every profile from a JSON array at `path`
    fn import_json(&self, path: &Path) -> Result<usize, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        let profiles: Vec<ConnectionProfile> = serde_json::from_str(&content)?;
        let count = profiles.len();
        for profile in profiles {
            self.save(profile)?;
        }
        Ok(count)
    }
}

/// Write a file only the owner can read, since it holds credentials
fn write_private(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    // `mode` only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(content.as_bytes())?;
    file.sync_all()
}

fn upsert(profiles: &mut Vec<ConnectionProfile>, profile: ConnectionProfile) {
    match profiles.iter_mut().find(|p| p.id == profile.id) {
        Some(existing) => *existing = profile,
        None => profiles.push(profile),
    }
}

/// In-memory store, mostly for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<Vec<ConnectionProfile>>,
}

impl MemoryProfileStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with profiles
    pub fn with_profiles(profiles: Vec<ConnectionProfile>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn list(&self) -> Result<Vec<ConnectionProfile>, ProfileError> {
        Ok(self
            .profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, profile: ConnectionProfile) -> Result<(), ProfileError> {
        profile.validate()?;
        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        upsert(&mut profiles, profile);
        Ok(())
    }

    fn delete(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let before = profiles.len();
        profiles.retain(|p| &p.id != id);
        if profiles.len() == before {
            return Err(ProfileError::NotFound(id.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: Vec<ConnectionProfile>,
}

/// TOML-file-backed store
pub struct FileProfileStore {
    path: PathBuf,
    profiles: Mutex<Vec<ConnectionProfile>>,
}

impl FileProfileStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let path = path.into();
        let profiles = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: ProfileFile = toml::from_str(&content)?;
            file.profiles
        } else {
            Vec::new()
        };

        tracing::debug!("Loaded {} profiles from {:?}", profiles.len(), path);

        Ok(Self {
            path,
            profiles: Mutex::new(profiles),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, profiles: &[ConnectionProfile]) -> Result<(), ProfileError> {
        let file = ProfileFile {
            profiles: profiles.to_vec(),
        };
        let content = toml::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("toml.tmp");
        write_private(&tmp, &content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ProfileStore for FileProfileStore {
    fn list(&self) -> Result<Vec<ConnectionProfile>, ProfileError> {
        Ok(self
            .profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    fn save(&self, profile: ConnectionProfile) -> Result<(), ProfileError> {
        profile.validate()?;
        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let mut updated = profiles.clone();
        upsert(&mut updated, profile);
        self.persist(&updated)?;
        *profiles = updated;
        Ok(())
    }

    fn delete(&self, id: &ProfileId) -> Result<(), ProfileError> {
        let mut profiles = self.profiles.lock().unwrap_or_else(|e| e.into_inner());
        let updated: Vec<_> = profiles.iter().filter(|p| &p.id != id).cloned().collect();
        if updated.len() == profiles.len() {
            return Err(ProfileError::NotFound(id.clone()));
        }
        self.persist(&updated)?;
        *profiles = updated;
        Ok(())
    }
}
