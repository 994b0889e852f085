//! `RoomControllerActor` - owns one room session.
//!
//! The actor:
//! - Drives the connection lifecycle (`new -> connecting -> connected`,
//!   back to `connecting` on disconnect, `closed` from anywhere)
//! - Runs the join sequence on every signaling `open`
//! - Owns the local producers, the webcam selection and device catalog,
//!   and the remote peer/consumer registry
//! - Publishes every change as a discrete [`StateUpdate`]
//!
//! # Reconnect Handling
//!
//! On signaling `disconnected`:
//! 1. Error notice, every per-cycle listener detached, epoch bumped
//! 2. Local producers and transports closed, media session remote-closed
//!    (best-effort)
//! 3. State back to `connecting`
//!
//! The next `open` reruns the join sequence. Remote peers and consumers
//! still present are re-observed without being published twice.

use super::messages::{Reply, RoomEvent, RoomMessage, RoomSnapshot, SignalingLifecycle};
use super::metrics::MailboxMonitor;
use super::peers::PeerRegistry;
use super::producers::LocalProducers;
use crate::config::Config;
use crate::devices::{DeviceCatalog, MediaDevices, WebcamSelection};
use crate::errors::RoomError;
use crate::events::{MediaCapabilities, Notice, NoticeLevel, RoomState, StateSink, StateUpdate};
use crate::media::{MediaKind, MediaSession, MediaSessionEvent, Transport, TransportDirection};
use crate::observability::metrics::{
    record_join, record_notice, record_reconnect, record_state_transition,
};
use crate::preferences::PreferenceStore;
use crate::relay::Relay;
use crate::signaling::{SignalingEvent, SignalingSession, METHOD_CHANGE_DISPLAY_NAME};
use crate::subscription::{Subscription, SubscriptionSet};
use common::types::PeerName;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the controller mailbox.
const ROOM_CHANNEL_BUFFER: usize = 64;

/// Display name used when neither config nor preferences provide one.
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// External collaborators of the controller.
#[derive(Clone)]
pub struct RoomCollaborators {
    pub signaling: Arc<dyn SignalingSession>,
    pub media: Arc<dyn MediaSession>,
    pub devices: Arc<dyn MediaDevices>,
    pub sink: Arc<dyn StateSink>,
    pub preferences: Arc<dyn PreferenceStore>,
}

/// Posts collaborator events into the actor's event mailbox.
#[derive(Clone)]
pub(super) struct EventPoster {
    sender: mpsc::UnboundedSender<RoomEvent>,
    mailbox: Arc<MailboxMonitor>,
}

impl EventPoster {
    pub(super) fn post(&self, event: RoomEvent) {
        let name = event.name();
        self.mailbox.record_enqueue();
        if self.sender.send(event).is_err() {
            self.mailbox.record_send_failed();
            debug!(target: "room.controller", event = name, "Controller stopped, event dropped");
        }
    }
}

/// Handle to a `RoomControllerActor`.
#[derive(Clone)]
pub struct RoomControllerHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    closed: Arc<AtomicBool>,
    mailbox: Arc<MailboxMonitor>,
    room_id: String,
}

impl RoomControllerHandle {
    /// Spawn a controller for `config.room_id`. See [`RoomControllerActor::spawn`].
    pub fn spawn(config: Config, collaborators: RoomCollaborators) -> (Self, JoinHandle<()>) {
        RoomControllerActor::spawn(config, collaborators)
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Whether the session has been closed. Closing is irreversible.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Mailbox statistics of the controller.
    #[must_use]
    pub fn mailbox(&self) -> &MailboxMonitor {
        &self.mailbox
    }

    /// Ask the server to change the display name.
    pub async fn set_display_name(&self, display_name: impl Into<String>) -> Result<(), RoomError> {
        let display_name = display_name.into();
        self.request(|respond_to| RoomMessage::SetDisplayName {
            display_name,
            respond_to,
        })
        .await
    }

    pub async fn mute_mic(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::MuteMic { respond_to })
            .await
    }

    pub async fn unmute_mic(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::UnmuteMic { respond_to })
            .await
    }

    pub async fn add_webcam(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::AddWebcam { respond_to })
            .await
    }

    pub async fn remove_webcam(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::RemoveWebcam { respond_to })
            .await
    }

    pub async fn cycle_webcam_device(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::CycleWebcamDevice { respond_to })
            .await
    }

    pub async fn cycle_webcam_resolution(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::CycleWebcamResolution { respond_to })
            .await
    }

    pub async fn enable_audio_only(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::EnableAudioOnly { respond_to })
            .await
    }

    pub async fn disable_audio_only(&self) -> Result<(), RoomError> {
        self.request(|respond_to| RoomMessage::DisableAudioOnly { respond_to })
            .await
    }

    /// Close the session. Idempotent: closing a closed session is a no-op.
    pub async fn close(&self) -> Result<(), RoomError> {
        if self.is_closed() {
            return Ok(());
        }
        match self
            .request(|respond_to| RoomMessage::Close { respond_to })
            .await
        {
            Err(RoomError::Closed) => Ok(()),
            other => other,
        }
    }

    /// Snapshot of the controller state. Still answers after close.
    pub async fn get_state(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::GetState { respond_to: tx }).await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Stop the actor task. Closes the session first if still open.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> RoomMessage,
    ) -> Result<T, RoomError> {
        if self.is_closed() {
            return Err(RoomError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.mailbox.record_enqueue();
        self.sender.send(message).await.map_err(|e| {
            self.mailbox.record_send_failed();
            RoomError::Internal(format!("channel send failed: {e}"))
        })
    }
}

/// The room controller actor.
pub struct RoomControllerActor {
    pub(super) room_id: String,
    pub(super) config: Config,
    receiver: mpsc::Receiver<RoomMessage>,
    events: mpsc::UnboundedReceiver<RoomEvent>,
    pub(super) poster: EventPoster,
    cancel_token: CancellationToken,
    closed: Arc<AtomicBool>,
    mailbox: Arc<MailboxMonitor>,

    pub(super) signaling: Arc<dyn SignalingSession>,
    pub(super) media: Arc<dyn MediaSession>,
    pub(super) devices: Arc<dyn MediaDevices>,
    pub(super) sink: Arc<dyn StateSink>,
    pub(super) preferences: Arc<dyn PreferenceStore>,
    relay: Relay,

    state: RoomState,
    /// Connection cycle number; bumped on every disconnect.
    pub(super) epoch: u64,
    signaling_open: bool,
    /// Media-session listeners of the current cycle.
    cycle: SubscriptionSet,
    signaling_subscription: Option<Subscription>,

    pub(super) send_transport: Option<Arc<dyn Transport>>,
    pub(super) recv_transport: Option<Arc<dyn Transport>>,
    capabilities: MediaCapabilities,
    pub(super) producers: LocalProducers,
    pub(super) peers: PeerRegistry,
    pub(super) catalog: DeviceCatalog,
    pub(super) webcam: WebcamSelection,
    display_name: String,
    pub(super) audio_only: bool,
    pub(super) audio_only_in_progress: bool,
    pub(super) webcam_in_progress: bool,
}

impl RoomControllerActor {
    /// Spawn the controller.
    ///
    /// Emits `connecting` and opens the signaling session once running.
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: Config,
        collaborators: RoomCollaborators,
    ) -> (RoomControllerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);
        let (events_tx, events) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));
        let mailbox = Arc::new(MailboxMonitor::new(config.room_id.clone()));

        let display_name = resolve_display_name(&config, collaborators.preferences.as_ref());
        let relay = Relay::spawn(
            Arc::clone(&collaborators.signaling),
            Arc::clone(&collaborators.media),
            cancel_token.child_token(),
        );

        let actor = Self {
            room_id: config.room_id.clone(),
            config,
            receiver,
            events,
            poster: EventPoster {
                sender: events_tx,
                mailbox: Arc::clone(&mailbox),
            },
            cancel_token: cancel_token.clone(),
            closed: Arc::clone(&closed),
            mailbox: Arc::clone(&mailbox),
            signaling: collaborators.signaling,
            media: collaborators.media,
            devices: collaborators.devices,
            sink: collaborators.sink,
            preferences: collaborators.preferences,
            relay,
            state: RoomState::New,
            epoch: 0,
            signaling_open: false,
            cycle: SubscriptionSet::new(),
            signaling_subscription: None,
            send_transport: None,
            recv_transport: None,
            capabilities: MediaCapabilities::default(),
            producers: LocalProducers::default(),
            peers: PeerRegistry::default(),
            catalog: DeviceCatalog::default(),
            webcam: WebcamSelection::default(),
            display_name,
            audio_only: false,
            audio_only_in_progress: false,
            webcam_in_progress: false,
        };

        let handle = RoomControllerHandle {
            sender,
            cancel_token,
            closed,
            mailbox,
            room_id: actor.room_id.clone(),
        };

        let task = tokio::spawn(actor.run());
        (handle, task)
    }

    #[instrument(skip_all, name = "room.actor", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "room.controller",
            room_id = %self.room_id,
            peer_name = %self.config.peer_name,
            "Room controller started"
        );

        self.start();

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(target: "room.controller", room_id = %self.room_id, "Room controller cancelled");
                    break;
                }

                Some(event) = self.events.recv() => {
                    self.mailbox.record_dequeue();
                    self.handle_event(event).await;
                }

                message = self.receiver.recv() => {
                    match message {
                        Some(message) => {
                            self.mailbox.record_dequeue();
                            self.handle_message(message).await;
                        }
                        None => {
                            info!(target: "room.controller", room_id = %self.room_id, "All handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.close();
        self.cancel_token.cancel();
        info!(
            target: "room.controller",
            room_id = %self.room_id,
            messages_processed = self.mailbox.messages_processed(),
            "Room controller stopped"
        );
    }

    /// Subscribe to signaling, publish the initial state and open signaling.
    fn start(&mut self) {
        let poster = self.poster.clone();
        let relay = self.relay.clone();
        let subscription = self.signaling.subscribe(Arc::new(move |event| match event {
            SignalingEvent::Open => poster.post(RoomEvent::Signaling(SignalingLifecycle::Open)),
            SignalingEvent::Disconnected => {
                poster.post(RoomEvent::Signaling(SignalingLifecycle::Disconnected));
            }
            SignalingEvent::Close => poster.post(RoomEvent::Signaling(SignalingLifecycle::Close)),
            SignalingEvent::Request(request) => relay.handle_inbound_request(request),
        }));
        self.signaling_subscription = Some(subscription);

        self.sink.publish(StateUpdate::DisplayName {
            display_name: self.display_name.clone(),
        });
        self.set_state(RoomState::Connecting);
        self.signaling.open();
    }

    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::SetDisplayName {
                display_name,
                respond_to,
            } => {
                let result = self.set_display_name(display_name).await;
                self.respond("Could not change display name", result, respond_to);
            }
            RoomMessage::MuteMic { respond_to } => {
                let result = self.mute_mic();
                self.respond("Could not mute microphone", result, respond_to);
            }
            RoomMessage::UnmuteMic { respond_to } => {
                let result = self.unmute_mic();
                self.respond("Could not unmute microphone", result, respond_to);
            }
            RoomMessage::AddWebcam { respond_to } => {
                let result = self.add_webcam().await;
                self.respond("Could not enable webcam", result, respond_to);
            }
            RoomMessage::RemoveWebcam { respond_to } => {
                let result = self.remove_webcam();
                self.respond("Could not disable webcam", result, respond_to);
            }
            RoomMessage::CycleWebcamDevice { respond_to } => {
                let result = self.cycle_webcam_device().await;
                self.respond("Could not change webcam", result, respond_to);
            }
            RoomMessage::CycleWebcamResolution { respond_to } => {
                let result = self.cycle_webcam_resolution().await;
                self.respond("Could not change webcam resolution", result, respond_to);
            }
            RoomMessage::EnableAudioOnly { respond_to } => {
                let result = self.enable_audio_only();
                self.respond("Could not enable audio-only mode", result, respond_to);
            }
            RoomMessage::DisableAudioOnly { respond_to } => {
                let result = self.disable_audio_only().await;
                self.respond("Could not disable audio-only mode", result, respond_to);
            }
            RoomMessage::Close { respond_to } => {
                self.close();
                let _ = respond_to.send(Ok(()));
            }
            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(Ok(self.snapshot()));
            }
        }
    }

    async fn handle_event(&mut self, event: RoomEvent) {
        if self.is_closed() {
            debug!(target: "room.controller", event = event.name(), "Event after close ignored");
            return;
        }

        match event {
            RoomEvent::Signaling(SignalingLifecycle::Open) => self.handle_signaling_open().await,
            RoomEvent::Signaling(SignalingLifecycle::Disconnected) => {
                self.handle_signaling_disconnected();
            }
            RoomEvent::Signaling(SignalingLifecycle::Close) => {
                info!(target: "room.controller", room_id = %self.room_id, "Signaling closed");
                self.close();
            }
            RoomEvent::NewPeer { epoch, peer } => {
                if self.is_current(epoch) {
                    self.register_peer(peer, true);
                }
            }
            RoomEvent::Peer {
                epoch,
                peer_name,
                event,
            } => {
                if self.is_current(epoch) {
                    self.handle_peer_event(&peer_name, event);
                }
            }
            RoomEvent::Consumer {
                epoch,
                consumer_id,
                event,
            } => {
                if self.is_current(epoch) {
                    self.handle_consumer_event(&consumer_id, event);
                }
            }
            RoomEvent::ConsumerTrack {
                epoch,
                consumer_id,
                result,
            } => {
                if self.is_current(epoch) {
                    self.handle_consumer_track(&consumer_id, result);
                }
            }
            RoomEvent::Producer { producer_id, event } => {
                self.handle_producer_event(&producer_id, event);
            }
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        if epoch == self.epoch {
            true
        } else {
            debug!(
                target: "room.controller",
                event_epoch = epoch,
                current_epoch = self.epoch,
                "Stale event discarded"
            );
            false
        }
    }

    #[instrument(skip_all, name = "room.join", fields(room_id = %self.room_id, epoch = self.epoch))]
    async fn handle_signaling_open(&mut self) {
        if self.signaling_open {
            debug!(target: "room.controller", "Signaling already open, ignoring");
            return;
        }
        self.signaling_open = true;
        info!(target: "room.controller", room_id = %self.room_id, "Signaling open, joining room");

        // Nothing from a previous cycle may deliver into this one.
        self.cycle.clear();
        self.peers.begin_cycle();

        let started = Instant::now();
        match self.join().await {
            Ok(()) => {
                record_join("success", started.elapsed());
                info!(
                    target: "room.controller",
                    room_id = %self.room_id,
                    peers = self.peers.peer_infos().len(),
                    "Joined room"
                );
            }
            Err(e) => {
                record_join("error", started.elapsed());
                error!(target: "room.controller", room_id = %self.room_id, error = %e, "Join failed");
                self.notify(
                    NoticeLevel::Error,
                    format!("Could not join the room: {}", e.user_message()),
                );
                self.close();
            }
        }
    }

    /// The join sequence. Each stage runs only after the previous one
    /// succeeded; on failure the caller closes the session.
    async fn join(&mut self) -> Result<(), RoomError> {
        // The media session issues requests while joining, so its relay
        // listener goes in first.
        let epoch = self.epoch;
        let relay = self.relay.clone();
        let poster = self.poster.clone();
        self.cycle
            .push(self.media.subscribe(Arc::new(move |event| match event {
                MediaSessionEvent::Request { data, responder } => {
                    relay.forward_request(data, responder);
                }
                MediaSessionEvent::Notify { data } => relay.forward_notification(data),
                MediaSessionEvent::NewPeer(peer) => poster.post(RoomEvent::NewPeer { epoch, peer }),
            })));

        let peers = self
            .media
            .join(&self.display_name, &self.config.device)
            .await?;

        self.send_transport = Some(self.media.create_transport(TransportDirection::Send, "send")?);
        self.recv_transport = Some(self.media.create_transport(TransportDirection::Recv, "recv")?);

        self.capabilities = MediaCapabilities {
            can_send_mic: self.media.can_send(MediaKind::Audio),
            can_send_webcam: self.media.can_send(MediaKind::Video),
        };
        self.sink
            .publish(StateUpdate::MediaCapabilities(self.capabilities));

        let mut webcam_failure = None;
        if self.config.produce {
            if self.capabilities.can_send_mic {
                if let Err(e) = self.create_producer(MediaKind::Audio).await {
                    warn!(
                        target: "room.controller",
                        error = %e,
                        "Could not enable microphone, continuing without it"
                    );
                }
            }
            if self.capabilities.can_send_webcam && !self.audio_only && self.webcam_preferred() {
                webcam_failure = self.enable_webcam().await.err();
            }
        }

        self.set_state(RoomState::Connected);
        self.sink.publish(StateUpdate::RemoveAllNotifications);
        self.notify(NoticeLevel::Info, "You are in the room");
        // Reported after the notices are cleared so it stays visible.
        if let Some(e) = webcam_failure {
            self.report_failure("Could not enable webcam", &e);
        }

        for peer in peers {
            self.register_peer(peer, false);
        }
        self.finish_peer_cycle();
        Ok(())
    }

    fn handle_signaling_disconnected(&mut self) {
        if !self.signaling_open {
            debug!(target: "room.controller", "Disconnect before open ignored");
            return;
        }
        self.signaling_open = false;
        warn!(target: "room.controller", room_id = %self.room_id, "Signaling disconnected");
        record_reconnect();
        self.notify(NoticeLevel::Error, "Connection lost, reconnecting");

        self.cycle.clear();
        self.peers.detach_all();
        self.epoch += 1;

        self.close_all_producers();
        self.close_transports();

        // Best-effort: the session is being torn down either way.
        if let Err(e) = self.media.remote_close("signaling disconnected") {
            debug!(target: "room.controller", error = %e, "Remote close failed");
        }

        self.set_state(RoomState::Connecting);
    }

    /// Close the session. Idempotent.
    fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(target: "room.controller", room_id = %self.room_id, "Closing room");

        self.cycle.clear();
        self.peers.clear();
        if let Some(subscription) = self.signaling_subscription.take() {
            subscription.unsubscribe();
        }

        self.media.leave();
        self.close_all_producers();
        self.close_transports();

        // Give the final leave notification time to flush.
        let signaling = Arc::clone(&self.signaling);
        let grace = self.config.close_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            signaling.close();
        });

        self.set_state(RoomState::Closed);
    }

    fn close_transports(&mut self) {
        for transport in [self.send_transport.take(), self.recv_transport.take()]
            .into_iter()
            .flatten()
        {
            transport.close();
        }
    }

    async fn set_display_name(&mut self, display_name: String) -> Result<(), RoomError> {
        self.ensure_open()?;
        match self
            .signaling
            .send(
                METHOD_CHANGE_DISPLAY_NAME,
                json!({ "displayName": display_name }),
            )
            .await
        {
            Ok(_) => {
                info!(target: "room.controller", room_id = %self.room_id, "Display name changed");
                self.display_name.clone_from(&display_name);
                if let Err(e) = self.preferences.set_display_name(&display_name) {
                    warn!(target: "room.controller", error = %e, "Could not persist display name");
                }
                self.sink
                    .publish(StateUpdate::DisplayName { display_name });
                self.notify(NoticeLevel::Info, "Display name changed");
                Ok(())
            }
            Err(e) => {
                // Put the previous name back in front of the user.
                self.sink.publish(StateUpdate::DisplayName {
                    display_name: self.display_name.clone(),
                });
                Err(e.into())
            }
        }
    }

    pub(super) fn ensure_open(&self) -> Result<(), RoomError> {
        if self.is_closed() {
            Err(RoomError::Closed)
        } else {
            Ok(())
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn webcam_preferred(&self) -> bool {
        match self.preferences.load() {
            Ok(preferences) => preferences.webcam_enabled,
            Err(e) => {
                warn!(target: "room.controller", error = %e, "Could not load preferences");
                true
            }
        }
    }

    fn set_state(&mut self, state: RoomState) {
        info!(
            target: "room.controller",
            room_id = %self.room_id,
            from = self.state.as_str(),
            to = state.as_str(),
            "Room state changed"
        );
        self.state = state;
        record_state_transition(state.as_str());
        self.sink.publish(StateUpdate::RoomState { state });
    }

    /// Show a notice and schedule its removal.
    pub(super) fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        let timeout = match level {
            NoticeLevel::Info => self.config.notice_timeout,
            NoticeLevel::Error => self.config.error_notice_timeout,
        };
        let notice = Notice::new(level, text, timeout);
        let id = notice.id;
        record_notice(level.as_str());
        self.sink.publish(StateUpdate::ShowNotification(notice));

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            sink.publish(StateUpdate::RemoveNotification { id });
        });
    }

    /// Exactly one error notice per failed operation. A closed session
    /// reports nothing.
    pub(super) fn report_failure(&self, context: &str, err: &RoomError) {
        if matches!(err, RoomError::Closed) {
            return;
        }
        warn!(target: "room.controller", room_id = %self.room_id, error = %err, "{context}");
        self.notify(
            NoticeLevel::Error,
            format!("{context}: {}", err.user_message()),
        );
    }

    fn respond<T>(&self, context: &str, result: Result<T, RoomError>, respond_to: Reply<T>) {
        if let Err(e) = &result {
            self.report_failure(context, e);
        }
        let _ = respond_to.send(result);
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            peer_name: PeerName::from(self.config.peer_name.as_str()),
            display_name: self.display_name.clone(),
            state: self.state,
            capabilities: self.capabilities,
            can_change_webcam: self.catalog.can_change(),
            webcam_in_progress: self.webcam_in_progress,
            audio_only: self.audio_only,
            audio_only_in_progress: self.audio_only_in_progress,
            webcam: self.webcam.clone(),
            producers: self.producers.infos(),
            peers: self.peers.peer_infos(),
            consumers: self.peers.consumer_infos(),
        }
    }
}

fn resolve_display_name(config: &Config, preferences: &dyn PreferenceStore) -> String {
    if let Some(name) = &config.display_name {
        return name.clone();
    }
    match preferences.load() {
        Ok(stored) => stored
            .display_name
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        Err(e) => {
            warn!(target: "room.controller", error = %e, "Could not load preferences");
            DEFAULT_DISPLAY_NAME.to_string()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::preferences::{MemoryPreferenceStore, Preferences};

    #[test]
    fn test_display_name_prefers_config() {
        let mut config = Config::for_room("r");
        config.display_name = Some("Alice".to_string());
        let store = MemoryPreferenceStore::with_preferences(Preferences {
            display_name: Some("Stored".to_string()),
            webcam_enabled: true,
        });
        assert_eq!(resolve_display_name(&config, &store), "Alice");
    }

    #[test]
    fn test_display_name_falls_back_to_preferences_then_default() {
        let config = Config::for_room("r");
        let store = MemoryPreferenceStore::with_preferences(Preferences {
            display_name: Some("Stored".to_string()),
            webcam_enabled: true,
        });
        assert_eq!(resolve_display_name(&config, &store), "Stored");

        let empty = MemoryPreferenceStore::new();
        assert_eq!(resolve_display_name(&config, &empty), DEFAULT_DISPLAY_NAME);
    }
}
