//! Optional on-disk snapshots of the latest successful refresh.
//!
//! By default nothing survives a restart; a cache configured with a
//! [`SnapshotStore`] reloads the last persisted value at construction and
//! can serve it, stale, until the first live refresh lands.

use std::fs;
use std::fs::File;
use std::io;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Where the latest successful value is persisted between runs.
///
/// Saves are fire-and-forget: a failed save is logged and dropped, never
/// surfaced to readers. Before reaching for this, consider whether you need
/// it at all: a cache that rehydrates from disk has to worry about schema
/// changes between application versions, where a purely in-memory cache
/// gets a clean slate on every start.
pub trait SnapshotStore<Value>: Send + Sync {
    fn load(&self) -> Option<Value>;

    fn save(&self, value: &Value);
}

/// Abstracts away the selection of serialization format for snapshots.
/// Buffered I/O because snapshot values are arbitrary caller types and may
/// be large.
pub trait SnapshotFormat<Value>
where
    Value: Serialize + for<'a> Deserialize<'a>,
{
    fn serialize(writer: &mut BufWriter<File>, value: &Value) -> io::Result<()>;

    fn deserialize(reader: BufReader<File>) -> Option<Value>;
}

pub struct JsonSnapshotFormat<Value> {
    phantom: PhantomData<Value>,
}

impl<Value> SnapshotFormat<Value> for JsonSnapshotFormat<Value>
where
    Value: Serialize + for<'a> Deserialize<'a>,
{
    fn serialize(writer: &mut BufWriter<File>, value: &Value) -> io::Result<()> {
        serde_json::to_writer(&mut *writer, value)?;
        writer.flush()
    }

    fn deserialize(reader: BufReader<File>) -> Option<Value> {
        serde_json::from_reader(reader).ok()
    }
}

pub struct BincodeSnapshotFormat<Value> {
    phantom: PhantomData<Value>,
}

impl<Value> SnapshotFormat<Value> for BincodeSnapshotFormat<Value>
where
    Value: Serialize + for<'a> Deserialize<'a>,
{
    fn serialize(writer: &mut BufWriter<File>, value: &Value) -> io::Result<()> {
        bincode::serialize_into(&mut *writer, value)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        writer.flush()
    }

    fn deserialize(reader: BufReader<File>) -> Option<Value> {
        bincode::deserialize_from(reader).ok()
    }
}

/// Single-file snapshot store. Writes go to a uuid-named staging file next
/// to the target and are renamed into place, so an interrupted write leaves
/// the previous snapshot intact.
pub struct SnapshotFile<Value, Format> {
    path: PathBuf,
    phantom_format: PhantomData<Format>,
    phantom_value: PhantomData<Value>,
}

impl<Value, Format> SnapshotFile<Value, Format> {
    pub fn new(path: PathBuf) -> Self {
        SnapshotFile {
            path,
            phantom_format: Default::default(),
            phantom_value: Default::default(),
        }
    }
}

impl<Value, Format> SnapshotStore<Value> for SnapshotFile<Value, Format>
where
    Value: Serialize + for<'a> Deserialize<'a> + Send + Sync,
    Format: SnapshotFormat<Value> + Send + Sync,
{
    fn load(&self) -> Option<Value> {
        let file = File::open(&self.path).ok()?;

        Format::deserialize(BufReader::new(file))
    }

    fn save(&self, value: &Value) {
        let staged = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let result = File::create(&staged)
            .and_then(|file| Format::serialize(&mut BufWriter::new(file), value))
            .and_then(|()| fs::rename(&staged, &self.path));

        if let Err(error) = result {
            warn!(path = %self.path.display(), error = %error, "snapshot save failed");
            let _ = fs::remove_file(&staged);
        }
    }
}

pub type JsonSnapshotFile<Value> = SnapshotFile<Value, JsonSnapshotFormat<Value>>;
pub type BincodeSnapshotFile<Value> = SnapshotFile<Value, BincodeSnapshotFormat<Value>>;
