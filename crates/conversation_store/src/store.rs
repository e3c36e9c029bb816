use std::sync::{Arc, Mutex, MutexGuard};

use chat_api::{ChatApiError, ConversationSummary};

use crate::backend::ConversationBackend;

pub type ListenerId = u64;

type Listener = Arc<dyn Fn(&[ConversationSummary]) + Send + Sync>;

struct StoreState {
    summaries: Vec<ConversationSummary>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
    /// Bumped on every completed server refresh; lets queued refreshers
    /// detect that the fetch they were waiting for already landed.
    refresh_epoch: u64,
}

/// Shared cache of conversation summaries with subscribe/notify observers.
///
/// One instance serves every observer in the process; pass it by reference.
pub struct ConversationStore {
    backend: Arc<dyn ConversationBackend>,
    state: Mutex<StoreState>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn ConversationBackend>) -> Self {
        Self {
            backend,
            state: Mutex::new(StoreState {
                summaries: Vec::new(),
                listeners: Vec::new(),
                next_listener_id: 1,
                refresh_epoch: 0,
            }),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Current cache contents in order.
    pub fn snapshot(&self) -> Vec<ConversationSummary> {
        self.lock_state().summaries.clone()
    }

    /// Registers an observer invoked with a snapshot after every cache change.
    pub fn subscribe(
        &self,
        listener: impl Fn(&[ConversationSummary]) + Send + Sync + 'static,
    ) -> ListenerId {
        let mut state = self.lock_state();
        let listener_id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push((listener_id, Arc::new(listener)));
        listener_id
    }

    pub fn unsubscribe(&self, listener_id: ListenerId) {
        self.lock_state()
            .listeners
            .retain(|(id, _)| *id != listener_id);
    }

    /// Replaces the cache wholesale from the server and notifies.
    ///
    /// Concurrent refreshers deduplicate: callers queue on one gate, and a
    /// caller that waited through someone else's completed fetch returns with
    /// the already-replaced cache instead of fetching again.
    pub async fn refresh(&self) -> Result<(), ChatApiError> {
        let seen_epoch = self.lock_state().refresh_epoch;
        let _gate = self.refresh_gate.lock().await;
        if self.lock_state().refresh_epoch != seen_epoch {
            return Ok(());
        }

        let summaries = self.backend.list().await?;
        let (snapshot, listeners) = {
            let mut state = self.lock_state();
            state.summaries = summaries;
            state.refresh_epoch += 1;
            (state.summaries.clone(), cloned_listeners(&state))
        };
        notify(&listeners, &snapshot);
        Ok(())
    }

    /// Idempotent insert: a summary whose id is already cached is a no-op,
    /// otherwise it is prepended and observers are notified.
    pub fn add_session(&self, summary: ConversationSummary) {
        let changed = {
            let mut state = self.lock_state();
            if state
                .summaries
                .iter()
                .any(|cached| cached.id == summary.id)
            {
                None
            } else {
                state.summaries.insert(0, summary);
                Some((state.summaries.clone(), cloned_listeners(&state)))
            }
        };

        if let Some((snapshot, listeners)) = changed {
            notify(&listeners, &snapshot);
        }
    }

    /// Renames a conversation; the cache mutates only after the server
    /// acknowledges.
    pub async fn rename(&self, conversation_id: &str, title: &str) -> Result<(), ChatApiError> {
        self.backend.rename(conversation_id, title).await?;

        let changed = {
            let mut state = self.lock_state();
            match state
                .summaries
                .iter_mut()
                .find(|cached| cached.id == conversation_id)
            {
                Some(cached) => {
                    cached.title = title.to_string();
                    Some((state.summaries.clone(), cloned_listeners(&state)))
                }
                None => {
                    // The server accepted an id this cache never held; the
                    // cache converges on the next refresh.
                    tracing::debug!(conversation_id, "renamed conversation not in cache");
                    None
                }
            }
        };

        if let Some((snapshot, listeners)) = changed {
            notify(&listeners, &snapshot);
        }
        Ok(())
    }

    /// Removes a conversation after a confirmed server delete.
    pub async fn remove(&self, conversation_id: &str) -> Result<(), ChatApiError> {
        self.backend.delete(conversation_id).await?;

        let changed = {
            let mut state = self.lock_state();
            let before = state.summaries.len();
            state.summaries.retain(|cached| cached.id != conversation_id);
            if state.summaries.len() == before {
                None
            } else {
                Some((state.summaries.clone(), cloned_listeners(&state)))
            }
        };

        if let Some((snapshot, listeners)) = changed {
            notify(&listeners, &snapshot);
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn cloned_listeners(state: &StoreState) -> Vec<Listener> {
    state
        .listeners
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
}

/// Listeners run outside the state lock so a listener may subscribe,
/// unsubscribe, or read the store without deadlocking.
fn notify(listeners: &[Listener], snapshot: &[ConversationSummary]) {
    for listener in listeners {
        listener(snapshot);
    }
}
