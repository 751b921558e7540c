//! In-memory run store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::RunStore;
use crate::error::StoreError;
use crate::models::{CanonicalRecord, NewRun, RecordKind, Run};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    runs: HashMap<i64, Run>,
    records: HashMap<(i64, RecordKind, u32), Vec<CanonicalRecord>>,
}

/// Run store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    state: Mutex<State>,
    reject_saves: AtomicBool,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save_records` call fail.
    pub fn reject_saves(&self, reject: bool) {
        self.reject_saves.store(reject, Ordering::SeqCst);
    }

    /// Records stored for one run, kind and month.
    pub async fn records(&self, run_id: i64, kind: RecordKind, month: u32) -> Vec<CanonicalRecord> {
        let state = self.state.lock().await;
        state
            .records
            .get(&(run_id, kind, month))
            .cloned()
            .unwrap_or_default()
    }

    /// Total records stored for a run.
    pub async fn record_count(&self, run_id: i64) -> usize {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .filter(|((id, _, _), _)| *id == run_id)
            .map(|(_, records)| records.len())
            .sum()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let run = Run::pending(state.next_id, new);
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn load_run(&self, id: i64) -> Result<Run, StoreError> {
        let state = self.state.lock().await;
        state.runs.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn update_run(&self, run: &Run) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.runs.get_mut(&run.id) {
            Some(stored) => {
                *stored = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(run.id)),
        }
    }

    async fn save_records(
        &self,
        run: &Run,
        kind: RecordKind,
        month: u32,
        records: &[CanonicalRecord],
    ) -> Result<usize, StoreError> {
        if self.reject_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("store is rejecting writes".into()));
        }
        let mut state = self.state.lock().await;
        if !state.runs.contains_key(&run.id) {
            return Err(StoreError::NotFound(run.id));
        }
        state
            .records
            .entry((run.id, kind, month))
            .or_default()
            .extend_from_slice(records);
        Ok(records.len())
    }
}
