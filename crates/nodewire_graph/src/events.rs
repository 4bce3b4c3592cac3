// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications for collaborators (renderers, persistence).
//!
//! Events are delivered synchronously, right after the mutation that caused
//! them has completed. Subscribers either register a callback or take a
//! channel receiver and drain it on their own schedule.

use crate::edge::EdgeId;
use crate::node::{Node, NodeId};
use std::fmt;
use std::sync::mpsc;

/// A change to the graph or the editor selection
#[derive(Debug, Clone)]
pub enum GraphEvent {
    /// A node was added
    NodeAdded(NodeId),
    /// A node's attributes changed (position, name)
    NodeChanged(Node),
    /// A node was removed
    NodeDeleted(NodeId),
    /// An edge was added
    EdgeAdded(EdgeId),
    /// An edge was removed
    EdgeDeleted(EdgeId),
    /// The editor selection changed
    SelectionChanged,
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&GraphEvent)>;

/// Publish/subscribe list of event consumers
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    callbacks: Vec<(SubscriptionId, Callback)>,
    channels: Vec<mpsc::Sender<GraphEvent>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every event
    pub fn subscribe(&mut self, callback: impl FnMut(&GraphEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(sub, _)| *sub != id);
        self.callbacks.len() != before
    }

    /// Create a channel that receives a copy of every event.
    ///
    /// Dropping the receiver unsubscribes it on the next emit.
    pub fn subscribe_channel(&mut self) -> mpsc::Receiver<GraphEvent> {
        let (sender, receiver) = mpsc::channel();
        self.channels.push(sender);
        receiver
    }

    /// Deliver an event to every subscriber
    pub fn emit(&mut self, event: GraphEvent) {
        for (_, callback) in &mut self.callbacks {
            callback(&event);
        }
        self.channels.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.len() + self.channels.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("callbacks", &self.callbacks.len())
            .field("channels", &self.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_callbacks_and_unsubscribe() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = bus.subscribe(move |event| sink.borrow_mut().push(format!("{event:?}")));

        bus.emit(GraphEvent::SelectionChanged);
        assert_eq!(seen.borrow().len(), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(GraphEvent::SelectionChanged);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_channel_drops_when_receiver_gone() {
        let mut bus = EventBus::new();
        let receiver = bus.subscribe_channel();
        let edge = EdgeId::new();
        bus.emit(GraphEvent::EdgeDeleted(edge));
        assert!(matches!(receiver.try_recv(), Ok(GraphEvent::EdgeDeleted(id)) if id == edge));

        drop(receiver);
        bus.emit(GraphEvent::SelectionChanged);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
