//! Message dispatch
//!
//! Resolves the destination of a [`Message`] against the [`Registry`] and
//! enqueues it into the matching mailbox(es).

use tracing::{debug, warn};

use crate::error::DispatchError;
use crate::message::{Message, Origin, Target};
use crate::registry::Registry;

/// Stateless router over a shared registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Registry,
}

impl Dispatcher {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Route a message
    ///
    /// `all` goes to every registered session, the sender included, and
    /// returns the number of mailboxes reached. A named target gets the
    /// message if registered; otherwise the sender receives a `system`
    /// error and `NoSuchUser` is returned.
    pub async fn dispatch(&self, msg: Message) -> Result<usize, DispatchError> {
        debug!("Mes({}->{}): {}", msg.origin(), msg.target(), msg.body());

        let name = match msg.target() {
            Target::All => return Ok(self.registry.deliver_all(&msg).await),
            Target::User(name) => name.clone(),
        };

        let origin = msg.origin().clone();
        if self.registry.deliver_to(&name, msg).await {
            return Ok(1);
        }

        self.report_unknown_target(&origin, &name).await;
        Err(DispatchError::NoSuchUser(name))
    }

    /// Write the "no such user" reply straight into the sender's mailbox
    ///
    /// Never routed through `dispatch`, so a vanished sender ends here.
    async fn report_unknown_target(&self, origin: &Origin, missing: &str) {
        match origin {
            Origin::User(sender) => {
                let reply = Message::no_such_user(sender, missing);
                if !self.registry.deliver_to(sender.as_str(), reply).await {
                    debug!("{} left before the error reply for {}", sender, missing);
                }
            }
            Origin::System => {
                warn!("System message to unknown user {} dropped", missing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{mailbox, MailboxReceiver};
    use crate::types::{Handle, SessionId};

    fn handle(name: &str) -> Handle {
        Handle::parse(name).unwrap()
    }

    async fn join(registry: &Registry, name: &str) -> MailboxReceiver {
        let (tx, rx) = mailbox();
        registry
            .register(handle(name), SessionId::new(), tx)
            .await
            .unwrap();
        rx
    }

    fn drain(rx: &mut MailboxReceiver) -> Vec<Message> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let mut alice = join(&registry, "alice").await;
        let mut bob = join(&registry, "bob").await;
        let mut carol = join(&registry, "carol").await;

        let msg = Message::broadcast(&handle("alice"), "hello");
        assert_eq!(dispatcher.dispatch(msg.clone()).await.unwrap(), 3);

        assert_eq!(drain(&mut alice), vec![msg.clone()]);
        assert_eq!(drain(&mut bob), vec![msg.clone()]);
        assert_eq!(drain(&mut carol), vec![msg]);
    }

    #[tokio::test]
    async fn test_unicast_only_reaches_target_in_order() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let mut alice = join(&registry, "alice").await;
        let mut bob = join(&registry, "bob").await;

        let first = Message::new(
            Origin::User(handle("bob")),
            Target::User("alice".into()),
            "one",
        );
        let second = Message::new(
            Origin::User(handle("bob")),
            Target::User("alice".into()),
            "two",
        );
        dispatcher.dispatch(first.clone()).await.unwrap();
        dispatcher.dispatch(second.clone()).await.unwrap();

        assert_eq!(drain(&mut alice), vec![first, second]);
        assert!(drain(&mut bob).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_replies_to_sender_once() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let mut alice = join(&registry, "alice").await;
        let mut bob = join(&registry, "bob").await;

        let msg = Message::new(
            Origin::User(handle("alice")),
            Target::User("carol".into()),
            "hey",
        );
        let result = dispatcher.dispatch(msg).await;

        assert!(matches!(result, Err(DispatchError::NoSuchUser(ref name)) if name == "carol"));
        assert_eq!(
            drain(&mut alice),
            vec![Message::no_such_user(&handle("alice"), "carol")]
        );
        assert!(drain(&mut bob).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_from_departed_sender_does_not_recurse() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());

        let msg = Message::new(
            Origin::User(handle("ghost")),
            Target::User("nobody".into()),
            "boo",
        );
        assert!(dispatcher.dispatch(msg).await.is_err());

        let system = Message::new(Origin::System, Target::User("nobody".into()), "x");
        assert!(dispatcher.dispatch(system).await.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_consistent_with_concurrent_joins() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let mut receivers = Vec::new();
        for i in 0..8 {
            receivers.push(join(&registry, &format!("user{}", i)).await);
        }

        let joiner = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut late = Vec::new();
                for i in 0..8 {
                    late.push(join(&registry, &format!("late{}", i)).await);
                }
                late
            })
        };

        let delivered = dispatcher
            .dispatch(Message::announcement("ping"))
            .await
            .unwrap();
        let mut late = joiner.await.unwrap();

        // Every session counted by the broadcast got exactly one copy
        let mut received = 0;
        for rx in receivers.iter_mut().chain(late.iter_mut()) {
            let msgs = drain(rx);
            assert!(msgs.len() <= 1);
            received += msgs.len();
        }
        assert_eq!(received, delivered);
        assert!(delivered >= 8);
    }

    #[tokio::test]
    async fn test_broadcast_consistent_with_concurrent_leaves() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let mut stayers = Vec::new();
        for i in 0..8 {
            stayers.push(join(&registry, &format!("stay{}", i)).await);
        }
        let mut leavers = Vec::new();
        let mut sessions = Vec::new();
        for i in 0..8 {
            let (tx, rx) = mailbox();
            let id = SessionId::new();
            let name = handle(&format!("leave{}", i));
            registry.register(name.clone(), id, tx).await.unwrap();
            sessions.push((name, id));
            leavers.push(rx);
        }

        let remover = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for (name, id) in sessions {
                    assert!(registry.remove_session(&name, id).await);
                    tokio::task::yield_now().await;
                }
            })
        };

        let delivered = dispatcher
            .dispatch(Message::announcement("ping"))
            .await
            .unwrap();
        remover.await.unwrap();

        for rx in stayers.iter_mut() {
            assert_eq!(drain(rx).len(), 1);
        }

        // Removed mailboxes hold at most the one copy, then report closed
        let mut reached = Vec::new();
        for rx in leavers.iter_mut() {
            let msgs = drain(rx);
            assert!(msgs.len() <= 1);
            reached.push(msgs.len() == 1);
            assert!(rx.recv().await.is_none());
        }

        // Leaves happen in order, so the broadcast saw a suffix of them
        let first_reached = reached.iter().position(|r| *r).unwrap_or(reached.len());
        assert!(reached[first_reached..].iter().all(|r| *r));

        let leavers_reached = reached.iter().filter(|r| **r).count();
        assert_eq!(delivered, stayers.len() + leavers_reached);
        assert_eq!(registry.count().await, 8);
    }
}
