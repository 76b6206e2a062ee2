//! In-memory certificate registry shared by every scan source.
//!
//! One [`parking_lot::Mutex`] guards the record list and both dedup
//! indexes, so the duplicate check and the insertion of an `add` happen as
//! a unit: of any number of concurrent submissions carrying the same key,
//! exactly one is accepted.
//!
//! Validation order inside [`RecordStore::add`]:
//! 1. missing key fields (checked before taking the lock)
//! 2. capacity
//! 3. duplicate folio or national identifier

use crate::error::Rejection;
use crate::record::{DedupKey, Provenance, Record, RecordFields};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Result of an accepted `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub key: DedupKey,
    /// Number of records held after this insertion.
    pub total: usize,
}

#[derive(Default)]
struct Inner {
    records: Vec<Record>,
    folios: HashSet<String>,
    national_ids: HashSet<String>,
}

/// Ordered, capacity-bounded, deduplicating record store.
///
/// Create one per process (or per test) and share it behind an `Arc`.
pub struct RecordStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl RecordStore {
    pub fn new(capacity: usize) -> Self {
        info!("Record store created (capacity {capacity})");
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Build a record from `fields` and insert it if admissible.
    pub fn add(&self, fields: RecordFields, provenance: Provenance) -> Result<Admission, Rejection> {
        let key = fields.dedup_key();
        if key.is_empty() {
            warn!("Rejected {provenance} record without Folio or CURP");
            return Err(Rejection::MissingKeyFields);
        }

        let mut inner = self.inner.lock();

        if inner.records.len() >= self.capacity {
            warn!("Rejected {key}: store full ({} records)", self.capacity);
            return Err(Rejection::StoreFull {
                capacity: self.capacity,
            });
        }

        if let Some(folio) = key.folio.as_ref().filter(|f| inner.folios.contains(*f)) {
            warn!("Rejected duplicate Folio {folio}");
            return Err(Rejection::DuplicateKey {
                field: "Folio",
                value: folio.clone(),
            });
        }
        if let Some(id) = key.national_id.as_ref().filter(|id| inner.national_ids.contains(*id)) {
            warn!("Rejected duplicate CURP {id}");
            return Err(Rejection::DuplicateKey {
                field: "CURP",
                value: id.clone(),
            });
        }

        if let Some(folio) = &key.folio {
            inner.folios.insert(folio.clone());
        }
        if let Some(id) = &key.national_id {
            inner.national_ids.insert(id.clone());
        }
        let record = Record::new(fields, provenance, Local::now().naive_local());
        debug!("Storing {record}");
        inner.records.push(record);
        let total = inner.records.len();
        drop(inner);

        info!("Accepted {key} via {provenance} ({total} total)");
        Ok(Admission { key, total })
    }

    /// Independent copy of every record, in insertion order.
    pub fn snapshot(&self) -> Vec<Record> {
        let records = self.inner.lock().records.clone();
        debug!("Snapshot of {} record(s)", records.len());
        records
    }

    /// Remove every record and dedup key. Returns how many records were held.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let removed = inner.records.len();
        *inner = Inner::default();
        drop(inner);
        info!("Cleared {removed} record(s)");
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn fields(folio: Option<&str>, curp: Option<&str>) -> RecordFields {
        let mut f = RecordFields::new();
        if let Some(v) = folio {
            f.insert_text(Field::Folio, v);
        }
        if let Some(v) = curp {
            f.insert_text(Field::NationalId, v);
        }
        f.insert_text(Field::Registrant, "ANA RUIZ");
        f
    }

    #[test]
    fn accepts_then_rejects_duplicate_folio() {
        let store = RecordStore::new(10);
        let ok = store.add(fields(Some("1"), None), Provenance::QrScan).unwrap();
        assert_eq!(ok.total, 1);
        assert_eq!(
            store.add(fields(Some("1"), Some("X")), Provenance::PdfText),
            Err(Rejection::DuplicateKey {
                field: "Folio",
                value: "1".into()
            })
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_national_id_alone_is_rejected() {
        let store = RecordStore::new(10);
        store.add(fields(Some("1"), Some("abc")), Provenance::QrScan).unwrap();
        let err = store.add(fields(Some("2"), Some("ABC")), Provenance::QrScan).unwrap_err();
        assert_eq!(
            err,
            Rejection::DuplicateKey {
                field: "CURP",
                value: "ABC".into()
            }
        );
    }

    #[test]
    fn missing_keys_checked_first() {
        let store = RecordStore::new(1);
        store.add(fields(Some("1"), None), Provenance::QrScan).unwrap();
        assert_eq!(
            store.add(fields(None, None), Provenance::QrScan),
            Err(Rejection::MissingKeyFields)
        );
    }

    #[test]
    fn full_precedes_duplicate() {
        let store = RecordStore::new(1);
        store.add(fields(Some("1"), None), Provenance::QrScan).unwrap();
        assert_eq!(
            store.add(fields(Some("1"), None), Provenance::QrScan),
            Err(Rejection::StoreFull { capacity: 1 })
        );
    }

    #[test]
    fn clear_resets_dedup_index() {
        let store = RecordStore::new(10);
        store.add(fields(Some("1"), None), Provenance::QrScan).unwrap();
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert!(store.add(fields(Some("1"), None), Provenance::QrScan).is_ok());
    }

    #[test]
    fn snapshot_is_independent() {
        let store = RecordStore::new(10);
        store.add(fields(Some("1"), None), Provenance::QrScan).unwrap();
        let snap = store.snapshot();
        store.add(fields(Some("2"), None), Provenance::QrImage).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
        assert_eq!(store.snapshot()[1].provenance(), Provenance::QrImage);
    }
}
