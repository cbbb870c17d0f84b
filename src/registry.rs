//! Registry of active sessions
//!
//! The only shared mutable state of the relay: handle → mailbox, guarded by a
//! single mutex. The map is never exposed; every operation takes the lock for
//! its full duration, so register, remove, lookup, snapshot, count and
//! delivery are mutually exclusive.
//!
//! Mailboxes are unbounded, so enqueueing never waits while the lock is held.
//! The registry holds the only sending side of every mailbox: removing an
//! entry closes that mailbox, and nothing can be enqueued into it afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::message::Message;
use crate::types::{Handle, SessionId};

/// Sending side of a session mailbox
pub type Mailbox = mpsc::UnboundedSender<Message>;

/// Receiving side of a session mailbox, drained by the send loop
pub type MailboxReceiver = mpsc::UnboundedReceiver<Message>;

/// Create a new mailbox pair
pub fn mailbox() -> (Mailbox, MailboxReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug)]
struct Entry {
    session_id: SessionId,
    mailbox: Mailbox,
}

/// Shared directory of registered sessions
///
/// Cheap to clone; all clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sessions: Arc<Mutex<BTreeMap<Handle, Entry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session if its handle is free
    ///
    /// The absence check and the insert happen under one lock acquisition, so
    /// two concurrent registrations of the same handle cannot both succeed.
    pub async fn register(
        &self,
        handle: Handle,
        session_id: SessionId,
        mailbox: Mailbox,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&handle) {
            return Err(RegistryError::AlreadyExists(handle));
        }
        debug!("Registered {} ({})", handle, session_id);
        sessions.insert(handle, Entry { session_id, mailbox });
        Ok(())
    }

    /// Remove a handle, whichever session holds it
    ///
    /// Returns true if an entry was deleted.
    pub async fn remove(&self, handle: &str) -> bool {
        self.sessions.lock().await.remove(handle).is_some()
    }

    /// Remove a handle only if it still belongs to `session_id`
    ///
    /// Returns true for exactly one caller per registration.
    pub async fn remove_session(&self, handle: &Handle, session_id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(handle) {
            Some(entry) if entry.session_id == session_id => {
                sessions.remove(handle);
                true
            }
            _ => false,
        }
    }

    /// Session currently registered under `handle`
    pub async fn lookup(&self, handle: &str) -> Option<SessionId> {
        self.sessions
            .lock()
            .await
            .get(handle)
            .map(|entry| entry.session_id)
    }

    /// Registered handles in sorted order
    pub async fn snapshot(&self) -> Vec<Handle> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Enqueue a copy of `msg` into every registered mailbox
    ///
    /// Returns the number of mailboxes that accepted the message. Enumeration
    /// and delivery share one lock acquisition: a concurrent join or leave is
    /// either fully before or fully after this broadcast.
    pub(crate) async fn deliver_all(&self, msg: &Message) -> usize {
        let sessions = self.sessions.lock().await;
        let mut delivered = 0;
        for (handle, entry) in sessions.iter() {
            if entry.mailbox.send(msg.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!("Mailbox of {} is closed, dropping broadcast", handle);
            }
        }
        delivered
    }

    /// Enqueue `msg` into the mailbox of `handle`
    ///
    /// Returns false if the handle is not registered.
    pub(crate) async fn deliver_to(&self, handle: &str, msg: Message) -> bool {
        let sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get(handle) else {
            return false;
        };
        if entry.mailbox.send(msg).is_err() {
            warn!("Mailbox of {} is closed, dropping message", handle);
        }
        true
    }
}
