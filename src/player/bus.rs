use std::fmt;
use std::sync::mpsc;
use crate::core::{StreamKind, TransportState};

/// Identity of whatever posted a message, so the controller can tell its own
/// pipeline apart from the pipeline's children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId {
    pub id: u64,
    pub name: String,
}

impl SourceId {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Notifications posted by the engine from its own threads.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    StateChanged {
        source: SourceId,
        old: TransportState,
        new: TransportState,
        pending: Option<TransportState>,
    },
    Error {
        source: SourceId,
        message: String,
        debug: Option<String>,
    },
    EndOfStream,
    TagsChanged {
        kind: StreamKind,
        index: usize,
    },
}

/// Posting half of the bus; cheap to clone into engine threads.
#[derive(Debug, Clone)]
pub struct BusSender {
    sender: mpsc::Sender<BusMessage>,
}

impl BusSender {
    /// Posting after the control side is gone is not an error worth reporting.
    pub fn post(&self, message: BusMessage) {
        if self.sender.send(message).is_err() {
            log::debug!("Bus receiver dropped, discarding message");
        }
    }
}

/// Receiving half of the bus, owned by the control thread.
#[derive(Debug)]
pub struct Bus {
    receiver: mpsc::Receiver<BusMessage>,
}

impl Bus {
    pub fn new() -> (BusSender, Bus) {
        let (sender, receiver) = mpsc::channel();
        (BusSender { sender }, Bus { receiver })
    }

    /// Everything posted so far, in arrival order, without blocking.
    pub fn drain(&self) -> Vec<BusMessage> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let (sender, bus) = Bus::new();
        let source = SourceId::new(1, "playbin");

        sender.post(BusMessage::StateChanged {
            source: source.clone(),
            old: TransportState::Null,
            new: TransportState::Ready,
            pending: Some(TransportState::Playing),
        });
        sender.post(BusMessage::TagsChanged { kind: StreamKind::Audio, index: 0 });
        sender.post(BusMessage::EndOfStream);

        let messages = bus.drain();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], BusMessage::StateChanged { new: TransportState::Ready, .. }));
        assert!(matches!(messages[1], BusMessage::TagsChanged { kind: StreamKind::Audio, index: 0 }));
        assert_eq!(messages[2], BusMessage::EndOfStream);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_post_from_other_thread() {
        let (sender, bus) = Bus::new();
        let handle = std::thread::spawn(move || {
            for index in 0..5 {
                sender.post(BusMessage::TagsChanged { kind: StreamKind::Video, index });
            }
        });
        handle.join().unwrap();

        let indices: Vec<usize> = bus
            .drain()
            .into_iter()
            .filter_map(|m| match m {
                BusMessage::TagsChanged { index, .. } => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_post_after_bus_dropped_is_silent() {
        let (sender, bus) = Bus::new();
        drop(bus);
        sender.post(BusMessage::EndOfStream);
    }
}
