//! On-disk snapshot of the domain set.
//!
//! The snapshot is a pretty-printed JSON array of domain strings, sorted so
//! consecutive snapshots diff cleanly. Writes go to a temporary file in the
//! target's directory which is then renamed over the target; a crash before
//! the rename leaves the previous snapshot untouched.

use std::fmt;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::{DeserializeSeed, SeqAccess, Visitor};
use tempfile::NamedTempFile;

use crate::error::PersistenceError;

/// Result of reading a snapshot file.
#[derive(Debug)]
pub enum SnapshotLoad {
    /// No snapshot yet, first run.
    Missing,
    /// The whole file parsed.
    Loaded(Vec<String>),
    /// Parsing stopped part-way; `entries` holds what came before the error.
    Malformed {
        entries: Vec<String>,
        error: PersistenceError,
    },
}

/// Reads the snapshot at `path`.
///
/// # Errors
///
/// Returns [`PersistenceError::Read`] if the file exists but cannot be read.
/// A missing file is [`SnapshotLoad::Missing`], not an error.
pub async fn load(path: &Path) -> Result<SnapshotLoad, PersistenceError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SnapshotLoad::Missing),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    Ok(parse(&bytes, path))
}

/// Parses snapshot bytes element by element so a broken tail keeps its prefix.
///
/// UTF-8 is validated per string, so a bad byte only cuts off the element it
/// sits in.
fn parse(bytes: &[u8], path: &Path) -> SnapshotLoad {
    let mut entries = Vec::new();
    let mut de = serde_json::Deserializer::from_slice(bytes);

    let result = Collect(&mut entries)
        .deserialize(&mut de)
        .and_then(|()| de.end());

    match result {
        Ok(()) => SnapshotLoad::Loaded(entries),
        Err(source) => SnapshotLoad::Malformed {
            entries,
            error: PersistenceError::Parse {
                path: path.to_path_buf(),
                source,
            },
        },
    }
}

struct Collect<'a>(&'a mut Vec<String>);

impl<'de> DeserializeSeed<'de> for Collect<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Collect<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of domain strings")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(domain) = seq.next_element::<String>()? {
            self.0.push(domain);
        }
        Ok(())
    }
}

/// A fully written and synced temporary snapshot awaiting [`commit`](Self::commit).
///
/// Dropping it without committing removes the temporary file.
pub struct StagedSnapshot {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedSnapshot {
    /// Location of the temporary file.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Atomically replaces the target with the staged file.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Write`] if the rename fails; the previous
    /// snapshot is left in place.
    pub fn commit(self) -> Result<(), PersistenceError> {
        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|e| PersistenceError::Write {
                path: target.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

/// Writes `domains` to a temporary file next to `path` without replacing it.
///
/// # Errors
///
/// Returns [`PersistenceError::Write`] if the temporary file cannot be
/// created, written or synced.
pub fn stage<'a, I>(path: &Path, domains: I) -> Result<StagedSnapshot, PersistenceError>
where
    I: IntoIterator<Item = &'a str>,
{
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut sorted: Vec<&str> = domains.into_iter().collect();
    sorted.sort_unstable();

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &sorted)
            .map_err(|e| write_err(e.into()))?;
        writer.write_all(b"\n").map_err(write_err)?;
        writer.flush().map_err(write_err)?;
    }
    // Keep the operator's mode on the replaced file; new files get 0600.
    if let Ok(existing) = std::fs::metadata(path) {
        file.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_err)?;
    }
    file.as_file().sync_all().map_err(write_err)?;

    Ok(StagedSnapshot {
        file,
        target: path.to_path_buf(),
    })
}

/// Stages and commits a snapshot in one step.
///
/// # Errors
///
/// See [`stage`] and [`StagedSnapshot::commit`].
pub fn write<'a, I>(path: &Path, domains: I) -> Result<(), PersistenceError>
where
    I: IntoIterator<Item = &'a str>,
{
    stage(path, domains)?.commit()
}
