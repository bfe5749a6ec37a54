//! Durable storage for batches that could not be delivered.
use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    event::{EventBatch, Fragment},
    Error, Result,
};

/// Append-only sink for batches the join service did not accept.
///
/// A write must be durable once it returns `Ok`. A connection descriptor the store cannot use
/// must fail every write.
pub trait OverflowStore {
    fn write(&self, connection: &str, batch: &EventBatch) -> Result<()>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverflowRecord<'a> {
    written_at: DateTime<Utc>,
    fragments: &'a [Fragment],
}

/// A batch read back from a [`FileOverflowStore`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBatch {
    pub written_at: DateTime<Utc>,
    pub fragments: Vec<Fragment>,
}

/// [`OverflowStore`] writing JSON lines into a local directory.
///
/// The connection descriptor is a `file://` URL of the directory. Batches are appended to one
/// file per day (`overflow-YYYYMMDD.jsonl`) and flushed to disk before `write` returns.
#[derive(Debug, Default)]
pub struct FileOverflowStore {
    // Serializes appends from the flush thread and explicit flushes.
    write_lock: Mutex<()>,
}

impl FileOverflowStore {
    pub fn new() -> FileOverflowStore {
        FileOverflowStore::default()
    }

    /// Read every batch stored under `connection`, oldest file first.
    pub fn read_batches(connection: &str) -> Result<Vec<StoredBatch>> {
        let directory = directory(connection)?;
        if !directory.exists() {
            return Ok(Vec::new());
        }

        let mut paths = fs::read_dir(&directory)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        paths.retain(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("overflow-") && name.ends_with(".jsonl"))
        });
        paths.sort();

        let mut batches = Vec::new();
        for path in paths {
            for line in BufReader::new(fs::File::open(path)?).lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    batches.push(serde_json::from_str(&line)?);
                }
            }
        }
        Ok(batches)
    }
}

impl OverflowStore for FileOverflowStore {
    fn write(&self, connection: &str, batch: &EventBatch) -> Result<()> {
        let directory = directory(connection)?;

        let written_at = Utc::now();
        let mut line = serde_json::to_vec(&OverflowRecord {
            written_at,
            fragments: &batch.fragments,
        })?;
        line.push(b'\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        fs::create_dir_all(&directory)?;
        let path = directory.join(format!("overflow-{}.jsonl", written_at.format("%Y%m%d")));
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        file.sync_data()?;

        log::debug!(target: "mwt",
                    fragments = batch.len(),
                    path:% = path.display();
                    "wrote batch to overflow store");
        Ok(())
    }
}

fn directory(connection: &str) -> Result<PathBuf> {
    let url = Url::parse(connection)
        .map_err(|err| Error::InvalidConnectionString(format!("not a URL ({err})")))?;
    if url.scheme() != "file" {
        return Err(Error::InvalidConnectionString(format!(
            "unsupported scheme {:?}, expected \"file\"",
            url.scheme()
        )));
    }
    url.to_file_path()
        .map_err(|()| Error::InvalidConnectionString("not a local path".to_owned()))
}
