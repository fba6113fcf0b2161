//! StateStore: redb-backed persistence for blobshare.
//!
//! Provides typed operations over submission items, the weight state and
//! the flush log. Two id indexes are kept in step with the items table
//! inside the same write transaction: `pending` (not yet admitted) and
//! `reserved` (admitted, batch not yet acknowledged). All values are JSON-serialized into redb's `&[u8]`
//! value columns. The store supports both on-disk and in-memory backends
//! (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::Serialize;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ITEMS).map_err(map_err!(Table))?;
        txn.open_table(PENDING).map_err(map_err!(Table))?;
        txn.open_table(RESERVED).map_err(map_err!(Table))?;
        txn.open_table(WEIGHTS).map_err(map_err!(Table))?;
        txn.open_table(FLUSHES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Items ──────────────────────────────────────────────────────

    /// Insert or update a submission item.
    pub fn put_item(&self, item: &SubmissionItem) -> StateResult<()> {
        self.put_items(std::slice::from_ref(item))
    }

    /// Insert or update several items in one transaction.
    pub fn put_items(&self, items: &[SubmissionItem]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_items(&txn, items)?;
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = items.len(), "items stored");
        Ok(())
    }

    /// Get an item by id.
    pub fn get_item(&self, id: &str) -> StateResult<Option<SubmissionItem>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ITEMS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let item: SubmissionItem =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    /// List all items, pending and processed.
    pub fn list_items(&self) -> StateResult<Vec<SubmissionItem>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ITEMS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let item: SubmissionItem =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(item);
        }
        Ok(results)
    }

    /// List items that have not been admitted into a batch yet.
    pub fn list_pending(&self) -> StateResult<Vec<SubmissionItem>> {
        self.list_indexed(PENDING)
    }

    /// List admitted items whose batch has not been acknowledged.
    pub fn list_reserved(&self) -> StateResult<Vec<SubmissionItem>> {
        self.list_indexed(RESERVED)
    }

    /// Resolve every id in an index table against the items table.
    fn list_indexed(
        &self,
        index: TableDefinition<'static, &'static str, ()>,
    ) -> StateResult<Vec<SubmissionItem>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let ids = txn.open_table(index).map_err(map_err!(Table))?;
        let items = txn.open_table(ITEMS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in ids.iter().map_err(map_err!(Read))? {
            let (id, _) = entry.map_err(map_err!(Read))?;
            let Some(value) = items.get(id.value()).map_err(map_err!(Read))? else {
                continue;
            };
            let item: SubmissionItem =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(item);
        }
        Ok(results)
    }

    // ── Weights ────────────────────────────────────────────────────

    /// Load the persisted weight state, if any.
    pub fn load_weights(&self) -> StateResult<Option<WeightState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WEIGHTS).map_err(map_err!(Table))?;
        match table.get(WEIGHTS_KEY).map_err(map_err!(Read))? {
            Some(guard) => {
                let weights: WeightState =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(weights))
            }
            None => Ok(None),
        }
    }

    /// Replace the persisted weight state.
    pub fn put_weights(&self, weights: &WeightState) -> StateResult<()> {
        self.commit_cycle(&[], weights)
    }

    /// Persist a scheduling cycle: updated items and the weight state
    /// that produced them, in a single write transaction.
    pub fn commit_cycle(&self, items: &[SubmissionItem], weights: &WeightState) -> StateResult<()> {
        self.commit_reservation(items, &[], weights)
    }

    /// Persist a cycle that admitted a batch: `reserved` ids are marked as
    /// awaiting acknowledgment in the same transaction that stores the
    /// items and weights.
    pub fn commit_reservation(
        &self,
        items: &[SubmissionItem],
        reserved: &[ItemId],
        weights: &WeightState,
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        write_items(&txn, items)?;
        {
            let mut reserved_table = txn.open_table(RESERVED).map_err(map_err!(Table))?;
            for id in reserved {
                reserved_table
                    .insert(id.as_str(), ())
                    .map_err(map_err!(Write))?;
            }
            let mut weight_table = txn.open_table(WEIGHTS).map_err(map_err!(Table))?;
            insert_json(&mut weight_table, WEIGHTS_KEY, weights)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            items = items.len(),
            reserved = reserved.len(),
            alpha = weights.alpha,
            beta = weights.beta,
            gamma = weights.gamma,
            "cycle committed"
        );
        Ok(())
    }

    // ── Flushes ────────────────────────────────────────────────────

    /// Record a completed flush.
    pub fn put_flush(&self, record: &FlushRecord) -> StateResult<()> {
        let key = record.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(FLUSHES).map_err(map_err!(Table))?;
            insert_json(&mut table, &key, record)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "flush recorded");
        Ok(())
    }

    /// Acknowledge a flush: record it, release its items' reservations and
    /// store the weight state, in one write transaction.
    pub fn complete_flush(&self, record: &FlushRecord, weights: &WeightState) -> StateResult<()> {
        let key = record.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut flush_table = txn.open_table(FLUSHES).map_err(map_err!(Table))?;
            insert_json(&mut flush_table, &key, record)?;
            let mut reserved_table = txn.open_table(RESERVED).map_err(map_err!(Table))?;
            for id in &record.item_ids {
                reserved_table
                    .remove(id.as_str())
                    .map_err(map_err!(Write))?;
            }
            let mut weight_table = txn.open_table(WEIGHTS).map_err(map_err!(Table))?;
            insert_json(&mut weight_table, WEIGHTS_KEY, weights)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, items = record.item_ids.len(), "flush acknowledged");
        Ok(())
    }

    /// Most recent flushes, newest first.
    pub fn list_flushes(&self, limit: usize) -> StateResult<Vec<FlushRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FLUSHES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))?.rev() {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: FlushRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }
}

/// Store items and keep both id indexes in step. A pending item is in
/// `pending` and never in `reserved`; a processed item leaves `pending`.
fn write_items(txn: &WriteTransaction, items: &[SubmissionItem]) -> StateResult<()> {
    let mut item_table = txn.open_table(ITEMS).map_err(map_err!(Table))?;
    let mut pending_table = txn.open_table(PENDING).map_err(map_err!(Table))?;
    let mut reserved_table = txn.open_table(RESERVED).map_err(map_err!(Table))?;
    for item in items {
        insert_json(&mut item_table, &item.id, item)?;
        let id = item.id.as_str();
        if item.is_pending() {
            pending_table.insert(id, ()).map_err(map_err!(Write))?;
            reserved_table.remove(id).map_err(map_err!(Write))?;
        } else {
            pending_table.remove(id).map_err(map_err!(Write))?;
        }
    }
    Ok(())
}

fn insert_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StateResult<()> {
    let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
    table
        .insert(key, bytes.as_slice())
        .map_err(map_err!(Write))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobshare_core::SchedulerConfig;

    fn test_item(rollup_id: u32, bid: f64) -> SubmissionItem {
        SubmissionItem::new(rollup_id, format!("0x{rollup_id:04x}"), vec![7; 65], "payload", bid)
    }

    // ── Item CRUD ──────────────────────────────────────────────────

    #[test]
    fn item_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let item = test_item(1, 0.02);

        store.put_item(&item).unwrap();
        let retrieved = store.get_item(&item.id).unwrap();

        assert_eq!(retrieved, Some(item));
    }

    #[test]
    fn item_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_item("nope").unwrap().is_none());
    }

    #[test]
    fn list_pending_skips_processed() {
        let store = StateStore::open_in_memory().unwrap();
        let pending = test_item(1, 0.01);
        let mut done = test_item(2, 0.02);
        done.processed = true;
        store.put_items(&[pending.clone(), done]).unwrap();

        assert_eq!(store.list_items().unwrap().len(), 2);
        let listed = store.list_pending().unwrap();
        assert_eq!(listed, vec![pending]);
    }

    #[test]
    fn item_update_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        let mut item = test_item(1, 0.01);
        store.put_item(&item).unwrap();

        item.wait_rounds = 3;
        item.priority_score = 0.42;
        store.put_item(&item).unwrap();

        let retrieved = store.get_item(&item.id).unwrap().unwrap();
        assert_eq!(retrieved.wait_rounds, 3);
        assert_eq!(retrieved.priority_score, 0.42);
        assert_eq!(store.list_items().unwrap().len(), 1);
    }

    #[test]
    fn pending_index_follows_processed_flag() {
        let store = StateStore::open_in_memory().unwrap();
        let mut item = test_item(1, 0.01);
        store.put_item(&item).unwrap();
        assert_eq!(store.list_pending().unwrap().len(), 1);

        item.processed = true;
        store.put_item(&item).unwrap();
        assert!(store.list_pending().unwrap().is_empty());

        item.processed = false;
        store.put_item(&item).unwrap();
        assert_eq!(store.list_pending().unwrap(), vec![item]);
    }

    #[test]
    fn list_pending_ignores_processed_history() {
        let store = StateStore::open_in_memory().unwrap();
        let history: Vec<_> = (0..50)
            .map(|i| {
                let mut item = test_item(i, 0.01);
                item.processed = true;
                item
            })
            .collect();
        store.put_items(&history).unwrap();
        let fresh = test_item(99, 0.05);
        store.put_item(&fresh).unwrap();

        assert_eq!(store.list_items().unwrap().len(), 51);
        assert_eq!(store.list_pending().unwrap(), vec![fresh]);
    }

    // ── Weights ────────────────────────────────────────────────────

    #[test]
    fn weights_absent_until_written() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.load_weights().unwrap().is_none());

        let weights = WeightState::neutral(&SchedulerConfig::default());
        store.put_weights(&weights).unwrap();
        assert_eq!(store.load_weights().unwrap(), Some(weights));
    }

    #[test]
    fn commit_cycle_writes_items_and_weights_together() {
        let store = StateStore::open_in_memory().unwrap();
        let mut item = test_item(1, 0.05);
        store.put_item(&item).unwrap();

        item.priority_score = 0.9;
        let mut weights = WeightState::neutral(&SchedulerConfig::default());
        weights.alpha = 0.5;
        weights.beta = 0.25;
        weights.gamma = 0.25;
        store.commit_cycle(std::slice::from_ref(&item), &weights).unwrap();

        assert_eq!(store.get_item(&item.id).unwrap().unwrap().priority_score, 0.9);
        assert_eq!(store.load_weights().unwrap().unwrap().alpha, 0.5);
    }

    // ── Flushes ────────────────────────────────────────────────────

    #[test]
    fn flushes_listed_newest_first() {
        let store = StateStore::open_in_memory().unwrap();
        for (at, tx) in [(100, "0xaa"), (300, "0xcc"), (200, "0xbb")] {
            store
                .put_flush(&FlushRecord {
                    transport_ref: tx.to_string(),
                    item_ids: vec![format!("item-{at}")],
                    total_size_kb: 1.0,
                    payload_bytes: 72,
                    flushed_at: at,
                })
                .unwrap();
        }

        let all = store.list_flushes(10).unwrap();
        let refs: Vec<_> = all.iter().map(|f| f.transport_ref.as_str()).collect();
        assert_eq!(refs, vec!["0xcc", "0xbb", "0xaa"]);

        assert_eq!(store.list_flushes(1).unwrap().len(), 1);
    }

    #[test]
    fn reservation_released_by_ack_or_requeue() {
        let store = StateStore::open_in_memory().unwrap();
        let mut a = test_item(1, 0.01);
        let mut b = test_item(2, 0.02);
        store.put_items(&[a.clone(), b.clone()]).unwrap();

        a.processed = true;
        b.processed = true;
        let mut weights = WeightState::neutral(&SchedulerConfig::default());
        store
            .commit_reservation(&[a.clone(), b.clone()], &[a.id.clone(), b.id.clone()], &weights)
            .unwrap();
        assert!(store.list_pending().unwrap().is_empty());
        assert_eq!(store.list_reserved().unwrap().len(), 2);

        weights.current_accumulated_size_kb = 0.25;
        let record = FlushRecord {
            transport_ref: "0xabc".to_string(),
            item_ids: vec![a.id.clone()],
            total_size_kb: 1.0,
            payload_bytes: 80,
            flushed_at: 10,
        };
        store.complete_flush(&record, &weights).unwrap();
        assert_eq!(store.list_reserved().unwrap(), vec![b.clone()]);
        assert_eq!(store.list_flushes(10).unwrap(), vec![record]);
        assert_eq!(store.load_weights().unwrap(), Some(weights.clone()));

        b.processed = false;
        store.commit_cycle(std::slice::from_ref(&b), &weights).unwrap();
        assert!(store.list_reserved().unwrap().is_empty());
        assert_eq!(store.list_pending().unwrap(), vec![b]);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");
        let item = test_item(4, 0.03);
        let weights = WeightState::neutral(&SchedulerConfig::default());

        {
            let store = StateStore::open(&db_path).unwrap();
            store.commit_cycle(std::slice::from_ref(&item), &weights).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get_item(&item.id).unwrap(), Some(item));
        assert_eq!(store.load_weights().unwrap(), Some(weights));
    }

    // ── Edge cases ─────────────────────────────────────────────────

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_items().unwrap().is_empty());
        assert!(store.list_pending().unwrap().is_empty());
        assert!(store.list_flushes(10).unwrap().is_empty());
        store.put_items(&[]).unwrap();
    }
}
