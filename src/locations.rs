//! Warehouse shelf locations per product name, kept as a two-column CSV.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::domain::value_objects::fold_case;
use crate::store::write_atomic;

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: io::Error },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Location { pub name: String, pub location: String }

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationRegistry { entries: BTreeMap<String, String> }

impl LocationRegistry {
    pub fn new() -> Self { Self::default() }

    /// Reads the registry file. Missing or unreadable files yield an empty registry.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_csv(&text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "location file unreadable, treating as empty");
                Self::new()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), LocationError> {
        let text = self.to_csv()?;
        write_atomic(path, text.as_bytes()).map_err(|source| LocationError::Io { path: path.to_owned(), source })
    }

    pub fn from_csv(text: &str) -> Self {
        let mut registry = Self::new();
        registry.import_csv(text);
        registry
    }

    /// Merges `name,location` rows into the registry; later rows win.
    /// Rows with fewer than two columns are skipped. Returns the rows applied.
    pub fn import_csv(&mut self, text: &str) -> usize {
        let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(text.as_bytes());
        let mut applied = 0;
        for record in reader.records() {
            let record = match record {
                Ok(r) => r,
                Err(e) => { warn!(error = %e, "skipping malformed location row"); continue; }
            };
            let (Some(name), Some(location)) = (record.get(0), record.get(1)) else { continue };
            if name.trim().is_empty() { continue; }
            self.set(name, location);
            applied += 1;
        }
        applied
    }

    pub fn to_csv(&self) -> Result<String, LocationError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        for (name, location) in &self.entries {
            writer.write_record([name, location])?;
        }
        let bytes = writer.into_inner().map_err(|e| LocationError::Csv(csv::Error::from(e.into_error())))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn get(&self, name: &str) -> Option<&str> { self.entries.get(name.trim()).map(String::as_str) }

    /// Returns the previous location, if any.
    pub fn set(&mut self, name: &str, location: &str) -> Option<String> {
        self.entries.insert(name.trim().to_string(), location.trim().to_string())
    }

    /// Entries whose name contains `query` (case-insensitive), sorted by name.
    pub fn search(&self, query: &str) -> Vec<Location> {
        let query = fold_case(query.trim());
        let mut found: Vec<Location> = self.entries.iter()
            .filter(|(name, _)| query.is_empty() || fold_case(name).contains(&query))
            .map(|(name, location)| Location { name: name.clone(), location: location.clone() })
            .collect();
        found.sort_by_cached_key(|l| fold_case(&l.name));
        found
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
