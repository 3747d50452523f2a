//! The events that drive a peer's state machine, and the bounded queue that
//! multiplexes them - per RFC 4271 section 8.1's event model, simplified to
//! the subset this speaker implements.

use octavius_bgp_wire::UpdateMessage;

/// Bound on the event queue. The FSM is always the fastest consumer of its
/// own events (no event handler itself blocks on I/O before enqueueing the
/// next one), so this only needs to absorb a short burst, not model
/// backpressure.
const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum Event {
    ManualStart,
    TcpConnectionConfirmed,
    BgpOpen,
    KeepaliveMsg,
    UpdateMsg(UpdateMessage),
    EstablishedStateEvent,
    LocRibChanged,
    AdjRibOutChanged,
    AdjRibInChanged,
}

impl Event {
    pub fn show(&self) -> &'static str {
        match self {
            Self::ManualStart => "ManualStart",
            Self::TcpConnectionConfirmed => "TcpConnectionConfirmed",
            Self::BgpOpen => "BgpOpen",
            Self::KeepaliveMsg => "KeepaliveMsg",
            Self::UpdateMsg(_) => "UpdateMsg",
            Self::EstablishedStateEvent => "EstablishedStateEvent",
            Self::LocRibChanged => "LocRibChanged",
            Self::AdjRibOutChanged => "AdjRibOutChanged",
            Self::AdjRibInChanged => "AdjRibInChanged",
        }
    }
}

/// A FIFO of events with one consumer (the FSM's own event loop) and
/// potentially many producers - the FSM itself, enqueueing follow-up events
/// from inside a transition.
pub struct EventQueue {
    sender: tokio::sync::mpsc::Sender<Event>,
    receiver: tokio::sync::mpsc::Receiver<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = tokio::sync::mpsc::channel(QUEUE_CAPACITY);
        Self { sender, receiver }
    }

    /// A cloneable handle producers other than the FSM's own loop can use to
    /// enqueue events - the FSM always retains one for itself.
    pub fn sender(&self) -> tokio::sync::mpsc::Sender<Event> {
        self.sender.clone()
    }

    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Enqueues `event` from inside the FSM's own event loop. The queue is
    /// bounded, so this can in principle wait for room; in practice the FSM
    /// never enqueues more than one or two follow-up events per handled
    /// event, well under capacity.
    pub async fn enqueue(&self, event: Event) {
        if self.sender.send(event).await.is_err() {
            unreachable!("EventQueue's own receiver outlives every sender it hands out");
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
