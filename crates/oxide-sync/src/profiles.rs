//! Saved connection profiles.
//!
//! Profiles live in a JSON file as a list of `{ "name", "target" }` entries.
//! The file is rewritten in full on every change.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::target::ConnectionTarget;

/// A named connection target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name, unique within a store.
    pub name: String,
    /// Connection target.
    pub target: ConnectionTarget,
    /// When the profile was last saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Creates a profile.
    pub fn new(name: impl Into<String>, target: ConnectionTarget) -> Self {
        Self {
            name: name.into(),
            target,
            saved_at: None,
        }
    }
}

/// File-backed collection of profiles.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    /// Loads the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let profiles = match fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| Error::ProfileFile {
                    path: path.clone(),
                    message: e.to_string(),
                })?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No profile file, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, profiles })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds or replaces a profile by name and persists the store.
    pub fn save(&mut self, mut profile: Profile) -> Result<()> {
        profile.saved_at = Some(Utc::now());
        match self.profiles.iter_mut().find(|p| p.name == profile.name) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
        self.persist()
    }

    /// Removes a profile by name and persists the store.
    ///
    /// Removing an unknown name is not an error.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let before = self.profiles.len();
        self.profiles.retain(|p| p.name != name);
        if self.profiles.len() == before {
            debug!(name = %name, "Profile not present, nothing to delete");
            return Ok(());
        }
        self.persist()
    }

    /// Looks up a profile by name.
    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Returns a copy of every profile, in saved order.
    pub fn all(&self) -> Vec<Profile> {
        self.profiles.clone()
    }

    /// Resolves a command-line argument: a saved profile name, else a
    /// connection URL.
    pub fn resolve(&self, name_or_url: &str) -> Result<ConnectionTarget> {
        if let Some(profile) = self.get(name_or_url) {
            return Ok(profile.target.clone());
        }
        if !name_or_url.contains(':') {
            return Err(Error::ProfileNotFound(name_or_url.to_string()));
        }
        ConnectionTarget::from_url(name_or_url)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.profiles)?;
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), profiles = self.profiles.len(), "Saved profiles");
        Ok(())
    }
}
