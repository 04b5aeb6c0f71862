use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShotlogError};
use crate::models::Record;
use crate::timestamp::{isoformat_utc, parse_iso_utc};

/// Owns the collection file: one pretty-printed JSON array holding every
/// record. All writes are whole-collection atomic rewrites; there is no
/// partial-record update path at this layer.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

/// What `load` found, including how many legacy `defer_until` values had
/// to be rewritten into normalized UTC form.
#[derive(Debug)]
pub struct LoadedCollection {
    pub records: Vec<Record>,
    pub sanitized_defer_timestamps: usize,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<LoadedCollection> {
        if !self.path.exists() {
            return Err(ShotlogError::NotFound(self.path.display().to_string()));
        }
        let raw = fs::read_to_string(&self.path)?;
        let mut records: Vec<Record> = serde_json::from_str(&raw)?;
        validate_collection(&records)?;
        let sanitized = sanitize_defer_timestamps(&mut records);
        Ok(LoadedCollection {
            records,
            sanitized_defer_timestamps: sanitized,
        })
    }

    /// Atomic overwrite: write a sibling temp file, fsync, rename over the
    /// target, then sync the parent directory. A crash mid-save leaves the
    /// previous collection intact.
    pub fn save(&self, records: &[Record]) -> Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        fs::create_dir_all(&parent)?;

        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                ShotlogError::Validation(format!(
                    "invalid collection filename: {}",
                    self.path.display()
                ))
            })?;
        let tmp_name = format!(".{file_name}.shotlog.tmp.{}", uuid::Uuid::new_v4().simple());
        let tmp_path = parent.join(tmp_name);

        let body = serde_json::to_string_pretty(records)?;
        {
            let mut tmp = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&tmp_path)?;
            tmp.write_all(body.as_bytes())?;
            tmp.write_all(b"\n")?;
            tmp.sync_all()?;
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(ShotlogError::from(err));
        }

        if let Ok(dir) = fs::File::open(&parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

fn validate_collection(records: &[Record]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if record.id.trim().is_empty() {
            return Err(ShotlogError::Validation(
                "record with empty id in collection".to_string(),
            ));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(ShotlogError::Validation(format!(
                "duplicate record id in collection: {}",
                record.id
            )));
        }
    }
    Ok(())
}

/// Rewrite legacy `defer_until` values (naive or offset forms) into the
/// canonical trailing-`Z` UTC rendering. Returns how many changed.
pub fn sanitize_defer_timestamps(records: &mut [Record]) -> usize {
    let mut changed = 0;
    for record in records {
        let Some(raw) = record.defer_until.as_deref() else {
            continue;
        };
        if raw.is_empty() {
            continue;
        }
        let normalized = isoformat_utc(parse_iso_utc(raw));
        if raw != normalized {
            record.defer_until = Some(normalized);
            changed += 1;
        }
    }
    changed
}
