//! Actor runtime and envelope delivery
//!
//! Delivery semantics follow the production bus contract: fire-and-forget,
//! at-most-once, FIFO between a given sender/recipient pair, no ordering
//! across senders. Sending to an absent coordinate whose region is hosted
//! here spawns the actor first; sending to any other absent coordinate
//! drops the envelope.
//!
//! Every actor owns a mailbox drained by a dedicated task, so at most one
//! message is ever being processed for a given coordinate. Handlers are
//! synchronous and must complete their side effects before returning;
//! waits are expressed by returning to the runtime and being re-entered on
//! the next delivery.

use crate::{Coordinates, Envelope, Message};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the runtime does with the actor after a message
pub enum Flow {
    /// Keep the mailbox open and wait for the next delivery
    Continue,
    /// Discard the actor and its mailbox
    Stop,
}

/// A message-driven actor
pub trait Actor: Send {
    fn receive(&mut self, envelope: Envelope, context: &Context) -> Flow;
}

/// Creates the actor for a coordinate on first delivery
pub trait ActorFactory: Send + Sync {
    fn create(&self, coordinates: &Coordinates) -> Box<dyn Actor>;
}

/// The in-process message bus
pub struct Lake {
    mailboxes: DashMap<Coordinates, mpsc::UnboundedSender<Envelope>>,
    factories: DashMap<String, Arc<dyn ActorFactory>>,
}

impl Lake {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mailboxes: DashMap::new(),
            factories: DashMap::new(),
        })
    }

    /// Host a region: actors in it are spawned on first delivery
    pub fn host_region(&self, region: impl Into<String>, factory: Arc<dyn ActorFactory>) {
        self.factories.insert(region.into(), factory);
    }

    /// Register a plain mailbox for an externally driven party
    /// (a requester, an account service outside this process)
    pub fn register(&self, coordinates: Coordinates) -> mpsc::UnboundedReceiver<Envelope> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.mailboxes.insert(coordinates, sender);
        receiver
    }

    /// Fire-and-forget delivery
    pub fn send(self: &Arc<Self>, envelope: Envelope) {
        let envelope = match self.try_deliver(envelope) {
            Ok(()) => return,
            Err(envelope) => envelope,
        };

        let Some(factory) = self
            .factories
            .get(&envelope.to.region)
            .map(|factory| factory.value().clone())
        else {
            tracing::debug!("dropping envelope for unknown recipient {}", envelope.to);
            return;
        };

        let mailbox = match self.mailboxes.entry(envelope.to.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    // stale mailbox of a stopped actor, respawn
                    let sender = self.spawn(envelope.to.clone(), factory);
                    occupied.insert(sender.clone());
                    sender
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => {
                let sender = self.spawn(envelope.to.clone(), factory);
                vacant.insert(sender.clone());
                sender
            }
        };

        let _ = mailbox.send(envelope);
    }

    /// Deliver the envelope after a delay (reply timeouts)
    pub fn schedule(self: &Arc<Self>, envelope: Envelope, delay: Duration) {
        let lake = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lake.send(envelope);
        });
    }

    fn try_deliver(&self, envelope: Envelope) -> Result<(), Envelope> {
        match self.mailboxes.get(&envelope.to) {
            Some(mailbox) => mailbox.send(envelope).map_err(|rejected| rejected.0),
            None => Err(envelope),
        }
    }

    fn spawn(
        self: &Arc<Self>,
        coordinates: Coordinates,
        factory: Arc<dyn ActorFactory>,
    ) -> mpsc::UnboundedSender<Envelope> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let lake = Arc::clone(self);
        let guard = sender.clone();

        tokio::spawn(async move {
            let mut actor = factory.create(&coordinates);
            let context = Context {
                lake: Arc::clone(&lake),
                coordinates: coordinates.clone(),
            };
            while let Some(envelope) = receiver.recv().await {
                if let Flow::Stop = actor.receive(envelope, &context) {
                    break;
                }
            }
            drop(receiver);
            lake.mailboxes
                .remove_if(&coordinates, |_, mailbox| mailbox.same_channel(&guard));
        });

        sender
    }
}

/// Handle the runtime passes into each `receive` call
pub struct Context {
    lake: Arc<Lake>,
    coordinates: Coordinates,
}

impl Context {
    /// Own coordinates of the receiving actor
    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    /// Send a message, stamping the actor's own coordinates as sender
    pub fn send(&self, to: Coordinates, message: Message) {
        self.lake
            .send(Envelope::new(self.coordinates.clone(), to, message));
    }

    /// Deliver a message to the given coordinates after a delay
    pub fn schedule(&self, to: Coordinates, message: Message, delay: Duration) {
        self.lake
            .schedule(Envelope::new(self.coordinates.clone(), to, message), delay);
    }
}
