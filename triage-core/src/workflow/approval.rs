//! Human approval request management

use crate::models::HumanDecision;
use crate::workflow::state_store::ThreadStateStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Approval request status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for an approver response
    Pending,
    /// Approver granted the request
    Approved,
    /// Approver denied the request
    Denied,
    /// No response arrived before the in-process wait expired; the thread
    /// is parked in the store until resumed
    Expired,
}

/// Persisted approval request record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Unique approval request identifier
    pub id: Uuid,
    /// Workflow thread awaiting the decision
    pub thread_id: String,
    /// Human-readable description of what needs sign-off
    pub description: String,
    /// Current request status
    pub status: ApprovalStatus,
    /// When the request was raised
    pub requested_at: DateTime<Utc>,
    /// When a response was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    /// Identity of the responder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responder: Option<String>,
}

/// Manages approval requests and routes responses back to waiting gates.
///
/// Requests are persisted so an operator can list them out-of-band;
/// responses travel over oneshot channels to whichever gate is waiting
/// in-process. A response that arrives after the waiter gave up still
/// updates the persisted record.
pub struct ApprovalManager {
    /// Persistence layer
    store: Arc<ThreadStateStore>,
    /// Pending approval response channels
    pending_channels: Arc<DashMap<Uuid, oneshot::Sender<HumanDecision>>>,
}

impl ApprovalManager {
    /// Create new approval manager
    pub fn new(store: Arc<ThreadStateStore>) -> Self {
        Self {
            store,
            pending_channels: Arc::new(DashMap::new()),
        }
    }

    /// Raise an approval request and return the response channel
    pub fn request_approval(
        &self,
        thread_id: &str,
        description: String,
    ) -> Result<(Uuid, oneshot::Receiver<HumanDecision>)> {
        let approval = ApprovalRecord {
            id: Uuid::new_v4(),
            thread_id: thread_id.to_string(),
            description,
            status: ApprovalStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            responder: None,
        };

        let approval_id = approval.id;
        self.store
            .create_approval(approval)
            .context("Failed to persist approval request")?;

        let (tx, rx) = oneshot::channel();
        self.pending_channels.insert(approval_id, tx);

        tracing::info!(
            approval_id = %approval_id,
            thread_id = %thread_id,
            "approval request created"
        );

        Ok((approval_id, rx))
    }

    /// Record a human decision for an approval request
    pub fn respond(&self, approval_id: Uuid, decision: HumanDecision) -> Result<()> {
        let status = if decision.approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Denied
        };

        self.store
            .update_approval_status(approval_id, status, Some(decision.approver.clone()))
            .context("Failed to update approval status")?;

        if let Some((_key, tx)) = self.pending_channels.remove(&approval_id) {
            let _ = tx.send(decision);
            tracing::info!(approval_id = %approval_id, "approval response delivered");
        } else {
            tracing::warn!(
                approval_id = %approval_id,
                "approval response recorded but no gate was waiting"
            );
        }

        Ok(())
    }

    /// Mark an approval request as expired after the in-process wait gave up
    pub fn expire(&self, approval_id: Uuid) -> Result<()> {
        self.pending_channels.remove(&approval_id);
        self.store
            .update_approval_status(approval_id, ApprovalStatus::Expired, None)
            .context("Failed to expire approval request")
    }

    /// Get an approval request by ID
    pub fn get_approval(&self, approval_id: Uuid) -> Option<ApprovalRecord> {
        self.store.get_approval(approval_id)
    }

    /// Get pending approvals for a thread
    pub fn pending_for(&self, thread_id: &str) -> Vec<ApprovalRecord> {
        self.store.pending_approvals(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_decision(approved: bool) -> HumanDecision {
        HumanDecision {
            approved,
            approver: "operator1".to_string(),
            comment: Some("reviewed".to_string()),
            based_on_judgment: None,
        }
    }

    #[tokio::test]
    async fn test_request_and_respond() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ThreadStateStore::new(dir.path().join("threads.json")).unwrap());
        let manager = ApprovalManager::new(store);

        let (approval_id, rx) = manager
            .request_approval("t-1", "Approve remediation for INC-1".to_string())
            .unwrap();

        assert_eq!(
            manager.get_approval(approval_id).unwrap().status,
            ApprovalStatus::Pending
        );
        assert_eq!(manager.pending_for("t-1").len(), 1);

        manager.respond(approval_id, test_decision(true)).unwrap();

        let decision = rx.await.unwrap();
        assert!(decision.approved);

        let record = manager.get_approval(approval_id).unwrap();
        assert_eq!(record.status, ApprovalStatus::Approved);
        assert_eq!(record.responder.as_deref(), Some("operator1"));
        assert!(manager.pending_for("t-1").is_empty());
    }

    #[tokio::test]
    async fn test_denial_updates_record() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ThreadStateStore::new(dir.path().join("threads.json")).unwrap());
        let manager = ApprovalManager::new(store);

        let (approval_id, rx) = manager
            .request_approval("t-1", "Approve remediation".to_string())
            .unwrap();
        manager.respond(approval_id, test_decision(false)).unwrap();

        let decision = rx.await.unwrap();
        assert!(!decision.approved);
        assert_eq!(
            manager.get_approval(approval_id).unwrap().status,
            ApprovalStatus::Denied
        );
    }

    #[tokio::test]
    async fn test_expire_closes_the_channel() {
        let dir = tempdir().unwrap();
        let store = Arc::new(ThreadStateStore::new(dir.path().join("threads.json")).unwrap());
        let manager = ApprovalManager::new(store);

        let (approval_id, rx) = manager
            .request_approval("t-1", "Approve remediation".to_string())
            .unwrap();
        manager.expire(approval_id).unwrap();

        assert!(rx.await.is_err());
        assert_eq!(
            manager.get_approval(approval_id).unwrap().status,
            ApprovalStatus::Expired
        );
    }
}
