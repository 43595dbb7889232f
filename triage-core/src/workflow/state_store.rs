//! Thread state persistence using JSON file storage

use crate::models::{IncidentWorkflowState, StateTransition};
use crate::workflow::approval::{ApprovalRecord, ApprovalStatus};
use anyhow::{Context, Result};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Root JSON store containing all workflow data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JsonStore {
    /// One state per workflow thread
    pub threads: Vec<IncidentWorkflowState>,
    /// Transition audit records
    pub transitions: Vec<StateTransition>,
    /// Approval requests raised by the human gate
    pub approvals: Vec<ApprovalRecord>,
}

/// Durable, keyed-by-thread storage of in-flight workflow state.
///
/// Backed by one JSON file guarded with advisory file locks; the in-memory
/// copy is serialized back after every mutation so a restarted process can
/// resume any thread.
pub struct ThreadStateStore {
    /// Path to JSON store file
    store_path: PathBuf,
    /// In-memory data store
    store: Arc<Mutex<JsonStore>>,
}

impl ThreadStateStore {
    /// Create new persistence manager, loading any existing store file
    pub fn new<P: AsRef<Path>>(store_path: P) -> Result<Self> {
        let store_path = store_path.as_ref().to_path_buf();

        if let Some(parent) = store_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create thread store directory")?;
        }

        let store = if store_path.exists() {
            Self::load_store(&store_path)?
        } else {
            JsonStore::default()
        };

        Ok(Self {
            store_path,
            store: Arc::new(Mutex::new(store)),
        })
    }

    /// Load JSON store from file with file locking
    fn load_store(path: &Path) -> Result<JsonStore> {
        let file = File::open(path).context("Failed to open thread store file")?;

        file.lock_shared()
            .context("Failed to acquire read lock on thread store")?;

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(file);
        reader
            .read_to_string(&mut contents)
            .context("Failed to read thread store")?;

        drop(reader);

        if contents.is_empty() {
            return Ok(JsonStore::default());
        }

        serde_json::from_str(&contents).context("Failed to parse thread store JSON")
    }

    /// Save JSON store to file with file locking
    fn save_store(&self) -> Result<()> {
        let store = self.store.lock().unwrap();

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.store_path)
            .context("Failed to open thread store file for writing")?;

        file.lock_exclusive()
            .context("Failed to acquire write lock on thread store")?;

        let json =
            serde_json::to_string_pretty(&*store).context("Failed to serialize thread store")?;

        let mut writer = std::io::BufWriter::new(file);
        writer
            .write_all(json.as_bytes())
            .context("Failed to write thread store")?;

        writer
            .flush()
            .context("Failed to flush thread store to disk")?;

        Ok(())
    }

    /// Insert or replace the state for a thread
    pub fn upsert_thread(&self, state: &IncidentWorkflowState) -> Result<()> {
        {
            let mut store = self.store.lock().unwrap();
            if let Some(existing) = store
                .threads
                .iter_mut()
                .find(|t| t.thread_id == state.thread_id)
            {
                *existing = state.clone();
            } else {
                store.threads.push(state.clone());
            }
        }
        self.save_store()
    }

    /// Get the state for a thread
    pub fn get_thread(&self, thread_id: &str) -> Option<IncidentWorkflowState> {
        let store = self.store.lock().unwrap();
        store
            .threads
            .iter()
            .find(|t| t.thread_id == thread_id)
            .cloned()
    }

    /// Find threads that have not reached a terminal state, for resumption
    /// after a process restart
    pub fn find_incomplete(&self) -> Vec<IncidentWorkflowState> {
        let store = self.store.lock().unwrap();
        store
            .threads
            .iter()
            .filter(|t| !t.done)
            .cloned()
            .collect()
    }

    /// Append a transition audit record
    pub fn record_transition(&self, transition: StateTransition) -> Result<()> {
        {
            let mut store = self.store.lock().unwrap();
            store.transitions.push(transition);
        }
        self.save_store()
    }

    /// Get transitions for a thread, in recorded order
    pub fn transitions_for(&self, thread_id: &str) -> Vec<StateTransition> {
        let store = self.store.lock().unwrap();
        store
            .transitions
            .iter()
            .filter(|t| t.thread_id == thread_id)
            .cloned()
            .collect()
    }

    /// Persist an approval request
    pub fn create_approval(&self, approval: ApprovalRecord) -> Result<()> {
        {
            let mut store = self.store.lock().unwrap();
            store.approvals.push(approval);
        }
        self.save_store()
    }

    /// Update the status of an approval request
    pub fn update_approval_status(
        &self,
        approval_id: Uuid,
        status: ApprovalStatus,
        responder: Option<String>,
    ) -> Result<()> {
        {
            let mut store = self.store.lock().unwrap();
            if let Some(approval) = store.approvals.iter_mut().find(|a| a.id == approval_id) {
                approval.status = status;
                approval.responded_at = Some(Utc::now());
                approval.responder = responder;
            }
        }
        self.save_store()
    }

    /// Get an approval request by ID
    pub fn get_approval(&self, approval_id: Uuid) -> Option<ApprovalRecord> {
        let store = self.store.lock().unwrap();
        store
            .approvals
            .iter()
            .find(|a| a.id == approval_id)
            .cloned()
    }

    /// Get pending approvals for a thread
    pub fn pending_approvals(&self, thread_id: &str) -> Vec<ApprovalRecord> {
        let store = self.store.lock().unwrap();
        store
            .approvals
            .iter()
            .filter(|a| a.thread_id == thread_id && a.status == ApprovalStatus::Pending)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Incident, TransitionKind};
    use tempfile::tempdir;

    fn test_state(thread_id: &str) -> IncidentWorkflowState {
        IncidentWorkflowState::new(
            thread_id,
            Incident {
                id: "INC-1".to_string(),
                summary: Some("High error rate on checkout".to_string()),
                severity: None,
                source: None,
                service: Some("checkout-api".to_string()),
            },
        )
    }

    #[test]
    fn test_upsert_and_get_thread() {
        let dir = tempdir().unwrap();
        let store = ThreadStateStore::new(dir.path().join("threads.json")).unwrap();

        let mut state = test_state("t-1");
        store.upsert_thread(&state).unwrap();

        let loaded = store.get_thread("t-1").unwrap();
        assert_eq!(loaded.incident.id, "INC-1");
        assert!(!loaded.done);

        // Upsert replaces rather than duplicates
        state.done = true;
        state.next_node = None;
        store.upsert_thread(&state).unwrap();
        assert!(store.get_thread("t-1").unwrap().done);
        assert_eq!(store.find_incomplete().len(), 0);
    }

    #[test]
    fn test_store_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("threads.json");

        {
            let store = ThreadStateStore::new(&path).unwrap();
            store.upsert_thread(&test_state("t-1")).unwrap();
            store.upsert_thread(&test_state("t-2")).unwrap();
        }

        let reopened = ThreadStateStore::new(&path).unwrap();
        assert!(reopened.get_thread("t-1").is_some());
        assert_eq!(reopened.find_incomplete().len(), 2);
    }

    #[test]
    fn test_transitions_are_scoped_by_thread() {
        let dir = tempdir().unwrap();
        let store = ThreadStateStore::new(dir.path().join("threads.json")).unwrap();

        for (thread, to_step) in [("t-1", "reviewer"), ("t-1", "judge"), ("t-2", "reviewer")] {
            store
                .record_transition(StateTransition {
                    id: Uuid::new_v4(),
                    thread_id: thread.to_string(),
                    from_step: None,
                    to_step: to_step.to_string(),
                    kind: TransitionKind::Step,
                    timestamp: Utc::now(),
                })
                .unwrap();
        }

        assert_eq!(store.transitions_for("t-1").len(), 2);
        assert_eq!(store.transitions_for("t-2").len(), 1);
        assert_eq!(store.transitions_for("t-1")[1].to_step, "judge");
    }
}
