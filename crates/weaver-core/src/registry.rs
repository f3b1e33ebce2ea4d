//! Action records and their status transitions.
//!
//! The registry owns every [`ActionRecord`]. Status only changes through its
//! methods, which keep the pending count and the settled notification
//! consistent:
//!
//! ```text
//! pending -> running -> complete | aborted | failed
//!    \_________________________/  (abort, from any non-terminal state)
//! ```
//!
//! Terminal states are final; later updates are ignored.

use crate::action::{Action, ActionId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Capacity of the status update channel.
const UPDATE_CAPACITY: usize = 256;

/// Status of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Running,
    Complete,
    Aborted,
    Failed { error: String },
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted | Self::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
            Self::Failed { .. } => "failed",
        }
    }
}

/// An action and its execution state.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub id: ActionId,
    pub action: Action,
    pub status: ActionStatus,
    /// Set once a handler has been given the action.
    pub executed: bool,
    /// Registration order across all turns.
    pub creation_order: u64,
    abort: CancellationToken,
}

impl ActionRecord {
    /// Signal observed by the running handler.
    pub fn abort_signal(&self) -> CancellationToken {
        self.abort.clone()
    }
}

/// A status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionUpdate {
    pub id: ActionId,
    pub status: ActionStatus,
}

#[derive(Debug, Default)]
struct RegistryState {
    records: HashMap<ActionId, ActionRecord>,
    next_order: u64,
    /// Registered actions not yet terminal.
    pending: usize,
}

/// Owner of all action records.
#[derive(Debug)]
pub struct ActionRegistry {
    state: Mutex<RegistryState>,
    updates: broadcast::Sender<ActionUpdate>,
    /// Bumped once each time the pending count drops back to zero.
    settled: watch::Sender<u64>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let (settled, _) = watch::channel(0);
        Self {
            state: Mutex::new(RegistryState::default()),
            updates,
            settled,
        }
    }
}

impl ActionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an action as pending. Returns false if the id already exists,
    /// in which case nothing changes.
    pub fn register(&self, id: ActionId, action: Action) -> bool {
        let mut state = self.lock();
        if state.records.contains_key(&id) {
            debug!(action_id = %id, "Action already registered");
            return false;
        }

        let creation_order = state.next_order;
        state.next_order += 1;
        state.pending += 1;
        state.records.insert(
            id.clone(),
            ActionRecord {
                id: id.clone(),
                action,
                status: ActionStatus::Pending,
                executed: false,
                creation_order,
                abort: CancellationToken::new(),
            },
        );
        drop(state);

        debug!(action_id = %id, creation_order, "Action registered");
        self.notify(id, ActionStatus::Pending);
        true
    }

    /// Replace the payload of a non-terminal action (content grew or the
    /// action closed).
    pub fn update_action(&self, id: &ActionId, action: Action) -> bool {
        let mut state = self.lock();
        match state.records.get_mut(id) {
            Some(record) if !record.status.is_terminal() => {
                record.action = action;
                true
            }
            Some(_) => false,
            None => {
                warn!(action_id = %id, "Update for unknown action");
                false
            }
        }
    }

    pub fn get(&self, id: &ActionId) -> Option<ActionRecord> {
        self.lock().records.get(id).cloned()
    }

    /// Claim the right to run a handler for the action.
    ///
    /// Returns true exactly once per action, and never for a terminal one.
    pub fn mark_executed(&self, id: &ActionId) -> bool {
        let mut state = self.lock();
        match state.records.get_mut(id) {
            Some(record) if !record.executed && !record.status.is_terminal() => {
                record.executed = true;
                true
            }
            _ => false,
        }
    }

    /// Pending to running. Returns false if the action is not pending or
    /// already running.
    pub fn start(&self, id: &ActionId) -> bool {
        self.transition(id, ActionStatus::Running)
    }

    pub fn complete(&self, id: &ActionId) -> bool {
        self.transition(id, ActionStatus::Complete)
    }

    pub fn fail(&self, id: &ActionId, error: impl Into<String>) -> bool {
        self.transition(
            id,
            ActionStatus::Failed {
                error: error.into(),
            },
        )
    }

    /// Abort a non-terminal action and signal its handler.
    pub fn abort(&self, id: &ActionId) -> bool {
        let token = self.get(id).map(|record| record.abort);
        let aborted = self.transition(id, ActionStatus::Aborted);
        if aborted {
            if let Some(token) = token {
                token.cancel();
            }
        }
        aborted
    }

    /// Abort every non-terminal action. Returns how many were aborted.
    pub fn abort_all(&self) -> usize {
        let ids: Vec<ActionId> = self
            .lock()
            .records
            .values()
            .filter(|record| !record.status.is_terminal())
            .map(|record| record.id.clone())
            .collect();
        ids.iter().filter(|id| self.abort(id)).count()
    }

    fn transition(&self, id: &ActionId, status: ActionStatus) -> bool {
        let mut state = self.lock();
        let Some(record) = state.records.get_mut(id) else {
            warn!(action_id = %id, status = status.as_str(), "Status update for unknown action");
            return false;
        };
        if record.status.is_terminal() || record.status == status {
            return false;
        }
        if status == ActionStatus::Running && record.status != ActionStatus::Pending {
            return false;
        }

        debug!(
            action_id = %id,
            from = record.status.as_str(),
            to = status.as_str(),
            "Action status changed"
        );
        record.status = status.clone();

        if status.is_terminal() {
            state.pending = state.pending.saturating_sub(1);
            if state.pending == 0 {
                self.settled.send_modify(|batch| *batch += 1);
            }
        }
        drop(state);

        self.notify(id.clone(), status);
        true
    }

    fn notify(&self, id: ActionId, status: ActionStatus) {
        // No subscribers is fine
        let _ = self.updates.send(ActionUpdate { id, status });
    }

    /// All records in creation order.
    pub fn snapshot(&self) -> Vec<ActionRecord> {
        let mut records: Vec<ActionRecord> = self.lock().records.values().cloned().collect();
        records.sort_by_key(|record| record.creation_order);
        records
    }

    /// Status changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ActionUpdate> {
        self.updates.subscribe()
    }

    /// Number of registered actions not yet terminal.
    pub fn pending_count(&self) -> usize {
        self.lock().pending
    }

    /// How many times all actions have settled.
    pub fn settled_batches(&self) -> u64 {
        *self.settled.borrow()
    }

    /// Wait until no registered action is left non-terminal.
    pub async fn wait_settled(&self) {
        let mut settled = {
            let state = self.lock();
            if state.pending == 0 {
                return;
            }
            // Subscribed under the lock so the zero crossing cannot be missed
            self.settled.subscribe()
        };
        let _ = settled.changed().await;
    }
}
