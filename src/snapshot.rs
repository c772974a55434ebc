//! Atomically swappable dataset snapshot.
//!
//! The dataset and document set are loaded once and shared read-only; a reload
//! builds a fresh [`Snapshot`] and swaps the `Arc` under a short write lock,
//! so in-flight queries keep the snapshot they started with and readers never
//! observe a half-updated dataset.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{info, warn};
use parking_lot::RwLock;

use crate::{dataset::Dataset, docs::DocumentSet, io_utils};

const DOCUMENT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Boundary contract with the storage collaborator: raw decoded text in, no
/// writes ever.
pub trait Storage: Send + Sync {
    fn load_table(&self) -> Result<String>;
    fn load_documents(&self) -> Result<Vec<(String, String)>>;
}

pub struct FsStorage {
    table_path: PathBuf,
    docs_dir: Option<PathBuf>,
    encoding: &'static Encoding,
}

impl FsStorage {
    pub fn new(
        table_path: PathBuf,
        docs_dir: Option<PathBuf>,
        encoding: &'static Encoding,
    ) -> FsStorage {
        FsStorage {
            table_path,
            docs_dir,
            encoding,
        }
    }
}

impl Storage for FsStorage {
    fn load_table(&self) -> Result<String> {
        io_utils::read_to_string(&self.table_path, self.encoding)
    }

    fn load_documents(&self) -> Result<Vec<(String, String)>> {
        let Some(dir) = &self.docs_dir else {
            return Ok(Vec::new());
        };
        read_document_dir(dir, self.encoding)
    }
}

fn read_document_dir(dir: &Path, encoding: &'static Encoding) -> Result<Vec<(String, String)>> {
    let mut documents = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("Reading docs directory {dir:?}"))?;
    for entry in entries {
        let path = entry?.path();
        let is_document = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                DOCUMENT_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if !is_document {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match io_utils::read_to_string(&path, encoding) {
            Ok(body) => documents.push((stem.to_string(), body)),
            Err(err) => warn!("Skipping unreadable document {path:?}: {err}"),
        }
    }
    documents.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(documents)
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub dataset: Dataset,
    pub documents: DocumentSet,
}

pub struct Store {
    storage: Box<dyn Storage>,
    delimiter: Option<u8>,
    current: RwLock<Arc<Snapshot>>,
}

impl Store {
    /// Load the initial snapshot. Storage failures degrade to an empty
    /// snapshot so callers can still answer with an explanatory envelope.
    pub fn open(storage: Box<dyn Storage>, delimiter: Option<u8>) -> Result<Store> {
        let store = Store {
            storage,
            delimiter,
            current: RwLock::new(Arc::new(Snapshot::default())),
        };
        store.reload()?;
        Ok(store)
    }

    /// The current immutable snapshot. Cheap to call per query.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Rebuild from storage and swap atomically. An unreadable table is
    /// caught at this boundary and becomes an empty dataset, never a failure.
    pub fn reload(&self) -> Result<()> {
        let dataset = match self.storage.load_table() {
            Ok(table) => Dataset::parse(&table, self.delimiter),
            Err(err) => {
                warn!("Table unavailable: {err}");
                Dataset::default()
            }
        };
        let documents = match self.storage.load_documents() {
            Ok(texts) => DocumentSet::from_named_texts(texts),
            Err(err) => {
                warn!("Documents unavailable: {err}");
                DocumentSet::default()
            }
        };
        info!(
            "Loaded snapshot: {} row(s), {} column(s), {} document(s)",
            dataset.rows.len(),
            dataset.columns.len(),
            documents.names().len()
        );
        *self.current.write() = Arc::new(Snapshot { dataset, documents });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemoryStorage {
        table: Arc<parking_lot::Mutex<String>>,
    }

    impl Storage for MemoryStorage {
        fn load_table(&self) -> Result<String> {
            Ok(self.table.lock().clone())
        }

        fn load_documents(&self) -> Result<Vec<(String, String)>> {
            Ok(vec![("mision".to_string(), "Formar.".to_string())])
        }
    }

    #[test]
    fn reload_swaps_snapshot_and_keeps_old_reference_valid() {
        let table = Arc::new(parking_lot::Mutex::new("NOMBRE,NOTA\nAna,7\n".to_string()));
        let store = Store::open(
            Box::new(MemoryStorage {
                table: table.clone(),
            }),
            None,
        )
        .unwrap();
        let before = store.snapshot();
        assert_eq!(before.dataset.rows.len(), 1);

        *table.lock() = "NOMBRE,NOTA\nAna,7\nBeto,8\n".to_string();
        store.reload().unwrap();

        let after = store.snapshot();
        assert_eq!(after.dataset.rows.len(), 2);
        // The snapshot taken before the reload is unchanged.
        assert_eq!(before.dataset.rows.len(), 1);
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn load_table(&self) -> Result<String> {
            Err(anyhow::anyhow!("disk on fire"))
        }

        fn load_documents(&self) -> Result<Vec<(String, String)>> {
            Err(anyhow::anyhow!("disk still on fire"))
        }
    }

    #[test]
    fn unreadable_storage_degrades_to_empty_snapshot() {
        let store = Store::open(Box::new(BrokenStorage), None).unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.dataset.is_empty());
        assert!(snapshot.documents.is_empty());
    }

    #[test]
    fn documents_flow_into_the_snapshot() {
        let table = Arc::new(parking_lot::Mutex::new(String::new()));
        let store = Store::open(Box::new(MemoryStorage { table }), None).unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.dataset.is_empty());
        assert_eq!(snapshot.documents.get("mision"), Some("Formar."));
    }
}
