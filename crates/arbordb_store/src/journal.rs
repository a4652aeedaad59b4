//! Durable storage engine backed by an append-only journal.
//!
//! The journal layout inside the store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK           # Advisory lock for single-process access
//! └─ journal.log    # Append-only record log
//! ```
//!
//! `journal.log` starts with a 6-byte header (magic + format version)
//! followed by records of the form `[type: u8][len: u32 BE][payload]`.
//! Put payloads carry the namespace and the entity's wire encoding;
//! delete payloads carry the namespace and the key's canonical bytes. On
//! open, the journal is replayed into an in-memory table set; a truncated
//! tail (from a crash mid-append) is logged, trimmed, and tolerated.

use crate::config::StoreConfig;
use crate::datastore::{Datastore, Namespace};
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryDatastore;
use crate::query::{NativeQuery, QueryResponse};
use arbordb_codec::{CanonicalDecoder, CanonicalEncoder, Entity, Key};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes identifying an ArborDB journal.
const JOURNAL_MAGIC: [u8; 4] = *b"AJNL";

/// Current journal format version.
const JOURNAL_VERSION: u16 = 1;

/// Size of the journal file header.
const HEADER_LEN: usize = 6;

/// Size of a record envelope (type byte + payload length).
const ENVELOPE_LEN: usize = 5;

/// Maximum payload size; bounded by the 4-byte length field.
const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    /// Put (insert or overwrite) an entity.
    Put = 1,
    /// Delete an entity by key.
    Delete = 2,
}

impl RecordType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Delete),
            _ => None,
        }
    }
}

/// A durable storage engine.
///
/// `JournalDatastore` offers the same [`Datastore`] contract as
/// [`MemoryDatastore`], made durable by writing every mutation to an
/// append-only journal before applying it in memory. Reads and queries
/// are served entirely from the replayed in-memory tables.
///
/// Only one process may hold a store directory at a time; a second open
/// fails with [`StoreError::Locked`].
///
/// # Example
///
/// ```no_run
/// use arbordb_store::{Datastore, JournalDatastore, StoreConfig};
/// use std::path::Path;
///
/// let store = JournalDatastore::open(
///     Path::new("my_store"),
///     StoreConfig::default(),
/// ).unwrap();
/// ```
pub struct JournalDatastore {
    /// Replayed tables; the source of truth for reads.
    mem: MemoryDatastore,
    /// The journal file, positioned at its end.
    journal: Mutex<File>,
    /// Sync the journal after every append.
    sync_on_write: bool,
    /// Store directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl JournalDatastore {
    /// Opens or creates a durable store in the given directory.
    ///
    /// Replays the journal into memory, trimming a truncated tail if the
    /// previous process crashed mid-append.
    ///
    /// # Errors
    ///
    /// Fails with:
    /// - [`StoreError::Locked`] if another process holds the store
    /// - [`StoreError::InvalidFormat`] if the directory is missing and
    ///   `create_if_missing` is off, or the journal is corrupted
    /// - [`StoreError::Unavailable`] on I/O failure
    pub fn open(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path).map_err(StoreError::unavailable)?;
            } else {
                return Err(StoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(StoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join("LOCK"))
            .map_err(StoreError::unavailable)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        let mut journal = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join("journal.log"))
            .map_err(StoreError::unavailable)?;

        let mem = MemoryDatastore::new();
        let good_len = Self::replay(&mut journal, &mem)?;

        let file_len = journal
            .metadata()
            .map_err(StoreError::unavailable)?
            .len();
        if good_len < file_len {
            warn!(
                good = good_len,
                total = file_len,
                "trimming truncated journal tail"
            );
            journal.set_len(good_len).map_err(StoreError::unavailable)?;
        }
        journal
            .seek(SeekFrom::End(0))
            .map_err(StoreError::unavailable)?;

        debug!(path = %path.display(), entities = mem.entity_count(), "opened store");

        Ok(Self {
            mem,
            journal: Mutex::new(journal),
            sync_on_write: config.sync_on_write,
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the total entity count across all namespaces.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.mem.entity_count()
    }

    /// Replays the journal into `mem` and returns the length of the
    /// well-formed prefix.
    fn replay(journal: &mut File, mem: &MemoryDatastore) -> StoreResult<u64> {
        let mut data = Vec::new();
        journal
            .seek(SeekFrom::Start(0))
            .map_err(StoreError::unavailable)?;
        journal
            .read_to_end(&mut data)
            .map_err(StoreError::unavailable)?;

        if data.is_empty() {
            let mut header = Vec::with_capacity(HEADER_LEN);
            header.extend_from_slice(&JOURNAL_MAGIC);
            header.extend_from_slice(&JOURNAL_VERSION.to_be_bytes());
            journal.write_all(&header).map_err(StoreError::unavailable)?;
            journal.sync_data().map_err(StoreError::unavailable)?;
            return Ok(HEADER_LEN as u64);
        }

        if data.len() < HEADER_LEN {
            // A crash during creation can leave a partial header; nothing
            // can follow it, so start over.
            warn!("resetting journal with incomplete header");
            journal.set_len(0).map_err(StoreError::unavailable)?;
            return Self::replay(journal, mem);
        }

        if data[..4] != JOURNAL_MAGIC {
            return Err(StoreError::invalid_format("journal magic mismatch"));
        }
        let version = u16::from_be_bytes([data[4], data[5]]);
        if version != JOURNAL_VERSION {
            return Err(StoreError::invalid_format(format!(
                "unsupported journal version: {version}"
            )));
        }

        let mut pos = HEADER_LEN;
        let mut records = 0usize;
        while pos < data.len() {
            if data.len() - pos < ENVELOPE_LEN {
                break; // Truncated envelope at the tail.
            }
            let record_type = match RecordType::from_byte(data[pos]) {
                Some(t) => t,
                None => {
                    // A bad type byte inside the file is corruption, not
                    // an interrupted append.
                    return Err(StoreError::invalid_format(format!(
                        "unknown journal record type {} at offset {pos}",
                        data[pos]
                    )));
                }
            };
            let len =
                u32::from_be_bytes([data[pos + 1], data[pos + 2], data[pos + 3], data[pos + 4]])
                    as usize;
            let start = pos + ENVELOPE_LEN;
            let Some(end) = start.checked_add(len) else {
                break;
            };
            if end > data.len() {
                break; // Truncated payload at the tail.
            }

            Self::apply(record_type, &data[start..end], mem)?;
            records += 1;
            pos = end;
        }

        debug!(records, "replayed journal");
        Ok(pos as u64)
    }

    /// Applies one replayed record to the in-memory tables.
    fn apply(record_type: RecordType, payload: &[u8], mem: &MemoryDatastore) -> StoreResult<()> {
        let mut decoder = CanonicalDecoder::new(payload);
        let pair_error = || StoreError::invalid_format("journal payload is not a [ns, body] pair");

        if decoder.array_len().map_err(|_| pair_error())? != 2 {
            return Err(pair_error());
        }
        let ns = Namespace::new(decoder.text().map_err(|_| pair_error())?);
        let body = decoder.bytes().map_err(|_| pair_error())?;

        match record_type {
            RecordType::Put => {
                let entity = Entity::from_wire_bytes(&body).map_err(|e| {
                    StoreError::invalid_format(format!("bad entity in journal: {e}"))
                })?;
                // Replayed keys are complete, so this also raises the
                // table's id high-water mark.
                mem.put(&ns, entity)?;
            }
            RecordType::Delete => {
                let mut key_decoder = CanonicalDecoder::new(&body);
                let path = key_decoder.key_path().map_err(|e| {
                    StoreError::invalid_format(format!("bad key in journal: {e}"))
                })?;
                let key = Key::from_path(path).map_err(|e| {
                    StoreError::invalid_format(format!("bad key in journal: {e}"))
                })?;
                mem.delete(&ns, &key)?;
            }
        }
        Ok(())
    }

    /// Appends one record to the journal.
    fn append(&self, record_type: RecordType, ns: &Namespace, body: &[u8]) -> StoreResult<()> {
        let mut encoder = CanonicalEncoder::new();
        encoder.array_header(2);
        encoder.text(ns.as_str());
        encoder.bytes(body);
        let payload = encoder.into_bytes();

        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(StoreError::invalid_format(format!(
                "journal payload too large: {} bytes",
                payload.len()
            )));
        }

        let mut journal = self.journal.lock();
        let mut record = Vec::with_capacity(ENVELOPE_LEN + payload.len());
        record.push(record_type as u8);
        #[allow(clippy::cast_possible_truncation)]
        record.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        record.extend_from_slice(&payload);

        journal.write_all(&record).map_err(StoreError::unavailable)?;
        if self.sync_on_write {
            journal.sync_data().map_err(StoreError::unavailable)?;
        }
        Ok(())
    }
}

impl Datastore for JournalDatastore {
    fn put(&self, ns: &Namespace, entity: Entity) -> StoreResult<Key> {
        entity.key().validate()?;

        // Assign the identifier first so the journal records the final
        // key; the write-ahead record then lands before the table update.
        let key = self.mem.complete_key(ns, entity.key());
        let entity = entity.with_key(key.clone());

        self.append(RecordType::Put, ns, &entity.to_wire_bytes()?)?;
        self.mem.put(ns, entity)?;
        Ok(key)
    }

    fn get(&self, ns: &Namespace, key: &Key) -> StoreResult<Option<Entity>> {
        self.mem.get(ns, key)
    }

    fn delete(&self, ns: &Namespace, key: &Key) -> StoreResult<()> {
        key.validate()?;
        self.append(RecordType::Delete, ns, &key.canonical_bytes())?;
        self.mem.delete(ns, key)
    }

    fn run_query(&self, ns: &Namespace, query: &NativeQuery) -> StoreResult<QueryResponse> {
        self.mem.run_query(ns, query)
    }
}

impl std::fmt::Debug for JournalDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalDatastore")
            .field("path", &self.path)
            .field("entity_count", &self.entity_count())
            .finish_non_exhaustive()
    }
}
