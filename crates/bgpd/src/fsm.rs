//! The per-peer event-driven state machine: IDLE -> CONNECT -> OPEN_SENT ->
//! OPEN_CONFIRM -> ESTABLISHED, as laid out in RFC 4271 section 8.

use crate::{
    config::PeerConfig,
    connection::Connection,
    event::{
        Event,
        EventQueue,
    },
    PeerError,
};
use log::{
    info,
    trace,
    warn,
};
use octavius_bgp_rib::{
    AdjRibIn,
    AdjRibOut,
    LocRib,
};
use octavius_bgp_route::RoutingTableInstaller;
use octavius_bgp_wire::{
    BgpMessage,
    OpenMessage,
};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub enum FsmState {
    #[default]
    Idle,
    Connect,
    OpenSent,
    OpenConfirm,
    Established,
}

/// One peer session. `LocRib` is taken by `Arc` because, per the speaker's
/// concurrency model, it is shared across every peer task of the same
/// speaker instance - this session only ever reads and conditionally
/// installs into it, never owns it outright.
pub struct PeerFsm<I: RoutingTableInstaller> {
    state: FsmState,
    state_tx: watch::Sender<FsmState>,
    config: PeerConfig,
    events: EventQueue,
    conn: Option<Connection>,
    loc_rib: Arc<LocRib>,
    adj_rib_in: AdjRibIn,
    adj_rib_out: AdjRibOut,
    installer: I,
}

impl<I: RoutingTableInstaller> PeerFsm<I> {
    pub fn new(config: PeerConfig, loc_rib: Arc<LocRib>, installer: I) -> Self {
        Self {
            state: FsmState::default(),
            state_tx: watch::channel(FsmState::default()).0,
            config,
            events: EventQueue::new(),
            conn: None,
            loc_rib,
            adj_rib_in: AdjRibIn::new(),
            adj_rib_out: AdjRibOut::new(),
            installer,
        }
    }

    /// The session's current state, for tests and diagnostics - never
    /// consulted by the event loop itself, which drives off `self.state`
    /// directly.
    pub fn state(&self) -> FsmState {
        self.state
    }

    /// A handle that observes every state transition this session makes,
    /// including ones that happen after `run` has taken ownership of
    /// `self`. Subscribe before calling `run`.
    pub fn subscribe(&self) -> watch::Receiver<FsmState> {
        self.state_tx.subscribe()
    }

    fn set_state(&mut self, state: FsmState) {
        self.state = state;
        self.state_tx.send_replace(state);
    }

    /// Drives the session until its connection fails or is lost. Dropping
    /// this future (e.g. on the process receiving a cancellation signal)
    /// closes the underlying `Connection` as part of ordinary unwinding -
    /// there is no separate cancellation path to observe.
    pub async fn run(mut self) -> Result<(), PeerError> {
        info!("peer {} started in {:?} mode", self.config.raw, self.config.mode);
        self.events.enqueue(Event::ManualStart).await;

        loop {
            let Some(event) = self.next_event().await? else {
                info!("peer {}: event queue closed, exiting", self.config.raw);
                return Ok(());
            };
            trace!("peer {}: state={:?} event={}", self.config.raw, self.state, event.show());
            self.handle_event(event).await?;
        }
    }

    /// One iteration of the algorithm from the speaker's event-loop design:
    /// a queued event is preferred; otherwise, once a connection exists and
    /// this peer isn't still waiting on one (`state != Connect`), one
    /// `recv()` is attempted; otherwise the loop blocks on the next queued
    /// event.
    async fn next_event(&mut self) -> Result<Option<Event>, PeerError> {
        if let Some(event) = self.events.try_recv() {
            return Ok(Some(event));
        }

        if self.state != FsmState::Connect {
            if let Some(conn) = self.conn.as_mut() {
                let message = conn.recv().await?;
                return Ok(Some(event_from_message(message)));
            }
        }

        Ok(self.events.recv().await)
    }

    async fn handle_event(&mut self, event: Event) -> Result<(), PeerError> {
        match (self.state, event) {
            (FsmState::Idle, Event::ManualStart) => {
                self.conn = Some(Connection::open(&self.config).await?);
                self.set_state(FsmState::Connect);
                self.events.enqueue(Event::TcpConnectionConfirmed).await;
            }

            (FsmState::Connect, Event::TcpConnectionConfirmed) => {
                let open = OpenMessage::new(self.config.local_as.into(), self.config.local_ip);
                self.send(BgpMessage::Open(open)).await?;
                self.set_state(FsmState::OpenSent);
            }

            (FsmState::OpenSent, Event::BgpOpen) => {
                self.send(BgpMessage::KeepAlive).await?;
                self.set_state(FsmState::OpenConfirm);
            }

            (FsmState::OpenConfirm, Event::KeepaliveMsg) => {
                self.set_state(FsmState::Established);
                info!("peer {} reached ESTABLISHED", self.config.raw);
                self.events.enqueue(Event::EstablishedStateEvent).await;
            }

            (FsmState::Established, Event::EstablishedStateEvent | Event::LocRibChanged) => {
                if self.adj_rib_out.install_from_loc(&self.loc_rib, self.config.remote_as).await {
                    self.events.enqueue(Event::AdjRibOutChanged).await;
                }
            }

            (FsmState::Established, Event::AdjRibOutChanged) => {
                let updates = self.adj_rib_out.to_update_messages(self.config.local_ip, self.config.local_as).await;
                for update in updates {
                    self.send(BgpMessage::Update(update)).await?;
                }
            }

            (FsmState::Established, Event::UpdateMsg(update)) => {
                if self.adj_rib_in.install_from_update(&update).await {
                    self.events.enqueue(Event::AdjRibInChanged).await;
                }
            }

            (FsmState::Established, Event::AdjRibInChanged) => match self.loc_rib.install_from_in(&self.adj_rib_in, &self.installer).await {
                Ok(true) => self.events.enqueue(Event::LocRibChanged).await,
                Ok(false) => {}
                Err(error) => warn!("peer {}: kernel FIB install failed => {error}", self.config.raw),
            },

            (state, event) => {
                trace!("peer {}: ignoring {} in state {:?}", self.config.raw, event.show(), state);
            }
        }
        Ok(())
    }

    async fn send(&mut self, message: BgpMessage) -> Result<(), PeerError> {
        let conn = self.conn.as_mut().expect("a message is only ever sent once a Connection has been opened");
        conn.send(&message).await
    }
}

fn event_from_message(message: BgpMessage) -> Event {
    match message {
        BgpMessage::Open(_) => Event::BgpOpen,
        BgpMessage::KeepAlive => Event::KeepaliveMsg,
        BgpMessage::Update(update) => Event::UpdateMsg(update),
    }
}
