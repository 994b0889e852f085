//! Mock media session and media objects.
//!
//! Producers and consumers emit their lifecycle events synchronously from
//! `pause`/`resume`/`close`, the way a local media stack reports them.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::{MockConsumer, MockMediaSession, MockPeer};
//!
//! let alice = MockPeer::new("alice", "Alice")
//!     .with_consumer(MockConsumer::new("c-1", "alice", MediaKind::Audio));
//!
//! let media = MockMediaSession::builder()
//!     .can_send_audio(true)
//!     .can_send_video(true)
//!     .with_peer(alice)
//!     .build();
//! ```

use async_trait::async_trait;
use common::types::{ConsumerId, PeerName, ProducerId};
use room_client::errors::MediaError;
use room_client::media::{
    Consumer, DeviceInfo, LifecycleEvent, MediaKind, MediaSession, MediaSessionEvent, MediaTrack,
    Originator, PeerEvent, Producer, ProducerOptions, RemotePeer, Transport, TransportDirection,
};
use room_client::signaling::{Response, Responder};
use room_client::subscription::{EventEmitter, Listener, Subscription};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

// ============================================================================
// Media session
// ============================================================================

#[derive(Debug, Default)]
struct SessionState {
    joined: bool,
    join_calls: usize,
    leave_calls: usize,
    remote_close_calls: usize,
    joined_as: Vec<String>,
    peers: Vec<Arc<MockPeer>>,
    transports: Vec<Arc<MockTransport>>,
    producers: Vec<Arc<MockProducer>>,
    notifications: Vec<Value>,
}

#[derive(Debug, Default, Clone)]
struct SessionConfig {
    can_send_audio: bool,
    can_send_video: bool,
    fail_join: Option<MediaError>,
    fail_receive: bool,
    fail_create_producer: Option<MediaKind>,
}

/// Mock media session.
#[derive(Debug)]
pub struct MockMediaSession {
    config: SessionConfig,
    events: EventEmitter<MediaSessionEvent>,
    state: Mutex<SessionState>,
    next_producer: AtomicUsize,
}

impl Default for MockMediaSession {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MockMediaSession {
    /// Create a new MockMediaSession builder.
    #[must_use]
    pub fn builder() -> MockMediaSessionBuilder {
        MockMediaSessionBuilder::default()
    }

    /// A session that may send both audio and video and has no peers.
    #[must_use]
    pub fn permissive() -> Self {
        Self::builder().can_send_audio(true).can_send_video(true).build()
    }

    /// Replace the peers returned by the next `join`.
    pub fn set_peers(&self, peers: Vec<Arc<MockPeer>>) {
        self.state.lock().unwrap().peers = peers;
    }

    /// Announce a new peer. It is also returned by later `join` calls.
    pub fn emit_new_peer(&self, peer: Arc<MockPeer>) {
        self.state.lock().unwrap().peers.push(Arc::clone(&peer));
        self.events.emit(MediaSessionEvent::NewPeer(peer));
    }

    /// Issue a request toward the server; the answer arrives on the receiver.
    pub fn emit_request(&self, data: Value) -> oneshot::Receiver<Response> {
        let (responder, rx) = Responder::channel();
        self.events.emit(MediaSessionEvent::Request { data, responder });
        rx
    }

    /// Issue a notification toward the server.
    pub fn emit_notify(&self, data: Value) {
        self.events.emit(MediaSessionEvent::Notify { data });
    }

    #[must_use]
    pub fn join_count(&self) -> usize {
        self.state.lock().unwrap().join_calls
    }

    #[must_use]
    pub fn leave_count(&self) -> usize {
        self.state.lock().unwrap().leave_calls
    }

    #[must_use]
    pub fn remote_close_count(&self) -> usize {
        self.state.lock().unwrap().remote_close_calls
    }

    /// Display names passed to `join`, in order.
    #[must_use]
    pub fn joined_as(&self) -> Vec<String> {
        self.state.lock().unwrap().joined_as.clone()
    }

    /// Every transport created so far.
    #[must_use]
    pub fn transports(&self) -> Vec<Arc<MockTransport>> {
        self.state.lock().unwrap().transports.clone()
    }

    /// Every producer created so far.
    #[must_use]
    pub fn producers(&self) -> Vec<Arc<MockProducer>> {
        self.state.lock().unwrap().producers.clone()
    }

    /// The most recently created producer of `kind`.
    #[must_use]
    pub fn last_producer(&self, kind: MediaKind) -> Option<Arc<MockProducer>> {
        self.producers()
            .into_iter()
            .rev()
            .find(|producer| producer.kind() == kind)
    }

    /// Notifications fed in through `receive_notification`.
    #[must_use]
    pub fn notifications(&self) -> Vec<Value> {
        self.state.lock().unwrap().notifications.clone()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

#[async_trait]
impl MediaSession for MockMediaSession {
    async fn join(
        &self,
        display_name: &str,
        _device: &DeviceInfo,
    ) -> Result<Vec<Arc<dyn RemotePeer>>, MediaError> {
        let mut state = self.state.lock().unwrap();
        state.join_calls += 1;
        state.joined_as.push(display_name.to_string());
        if let Some(error) = &self.config.fail_join {
            return Err(error.clone());
        }
        state.joined = true;
        Ok(state
            .peers
            .iter()
            .map(|peer| Arc::clone(peer) as Arc<dyn RemotePeer>)
            .collect())
    }

    fn leave(&self) {
        let mut state = self.state.lock().unwrap();
        state.leave_calls += 1;
        state.joined = false;
    }

    fn remote_close(&self, _reason: &str) -> Result<(), MediaError> {
        let mut state = self.state.lock().unwrap();
        state.remote_close_calls += 1;
        state.joined = false;
        Ok(())
    }

    fn create_transport(
        &self,
        direction: TransportDirection,
        _tag: &str,
    ) -> Result<Arc<dyn Transport>, MediaError> {
        let transport = Arc::new(MockTransport::new(direction, self.config.fail_receive));
        self.state
            .lock()
            .unwrap()
            .transports
            .push(Arc::clone(&transport));
        Ok(transport)
    }

    fn create_producer(&self, options: ProducerOptions) -> Result<Arc<dyn Producer>, MediaError> {
        let kind = options.track.kind;
        if self.config.fail_create_producer == Some(kind) {
            return Err(MediaError::Rejected(format!("{kind} producer refused")));
        }
        let n = self.next_producer.fetch_add(1, Ordering::SeqCst);
        let producer = Arc::new(MockProducer::new(
            format!("producer-{n}"),
            options.source,
            options.track,
            options.simulcast.len(),
        ));
        self.state
            .lock()
            .unwrap()
            .producers
            .push(Arc::clone(&producer));
        Ok(producer)
    }

    fn can_send(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Audio => self.config.can_send_audio,
            MediaKind::Video => self.config.can_send_video,
        }
    }

    async fn receive_notification(&self, data: Value) -> Result<(), MediaError> {
        self.state.lock().unwrap().notifications.push(data);
        Ok(())
    }

    fn is_joined(&self) -> bool {
        self.state.lock().unwrap().joined
    }

    fn subscribe(&self, listener: Listener<MediaSessionEvent>) -> Subscription {
        self.events.subscribe(listener)
    }
}

/// Builder for MockMediaSession configuration.
#[derive(Debug, Default)]
pub struct MockMediaSessionBuilder {
    config: SessionConfig,
    peers: Vec<Arc<MockPeer>>,
}

impl MockMediaSessionBuilder {
    #[must_use]
    pub fn can_send_audio(mut self, allowed: bool) -> Self {
        self.config.can_send_audio = allowed;
        self
    }

    #[must_use]
    pub fn can_send_video(mut self, allowed: bool) -> Self {
        self.config.can_send_video = allowed;
        self
    }

    /// Peer already present in the room when joining.
    #[must_use]
    pub fn with_peer(mut self, peer: MockPeer) -> Self {
        self.peers.push(Arc::new(peer));
        self
    }

    /// Make every `join` fail with `error`.
    #[must_use]
    pub fn fail_join(mut self, error: MediaError) -> Self {
        self.config.fail_join = Some(error);
        self
    }

    /// Make every consumer receive on the created transports fail.
    #[must_use]
    pub fn fail_receive(mut self) -> Self {
        self.config.fail_receive = true;
        self
    }

    /// Refuse to create producers of `kind`.
    #[must_use]
    pub fn fail_create_producer(mut self, kind: MediaKind) -> Self {
        self.config.fail_create_producer = Some(kind);
        self
    }

    /// Build the MockMediaSession.
    #[must_use]
    pub fn build(self) -> MockMediaSession {
        MockMediaSession {
            config: self.config,
            events: EventEmitter::new(),
            state: Mutex::new(SessionState {
                peers: self.peers,
                ..SessionState::default()
            }),
            next_producer: AtomicUsize::new(0),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Mock send/receive transport.
#[derive(Debug)]
pub struct MockTransport {
    direction: TransportDirection,
    fail_receive: bool,
    closed: AtomicBool,
    sent: Mutex<Vec<ProducerId>>,
    received: Mutex<Vec<ConsumerId>>,
}

impl MockTransport {
    #[must_use]
    pub fn new(direction: TransportDirection, fail_receive: bool) -> Self {
        Self {
            direction,
            fail_receive,
            closed: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Producers sent over this transport.
    #[must_use]
    pub fn sent(&self) -> Vec<ProducerId> {
        self.sent.lock().unwrap().clone()
    }

    /// Consumers received over this transport.
    #[must_use]
    pub fn received(&self) -> Vec<ConsumerId> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn direction(&self) -> TransportDirection {
        self.direction
    }

    async fn send(&self, producer: Arc<dyn Producer>) -> Result<(), MediaError> {
        if self.is_closed() {
            return Err(MediaError::Closed);
        }
        self.sent.lock().unwrap().push(producer.id());
        Ok(())
    }

    async fn receive(&self, consumer: Arc<dyn Consumer>) -> Result<MediaTrack, MediaError> {
        if self.fail_receive {
            return Err(MediaError::Transport("receive failed".to_string()));
        }
        if self.is_closed() {
            return Err(MediaError::Closed);
        }
        self.received.lock().unwrap().push(consumer.id());
        Ok(MediaTrack {
            id: format!("remote-{}", consumer.id()),
            kind: consumer.kind(),
            device_id: None,
            width: None,
            height: None,
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Producer
// ============================================================================

/// Mock local producer.
#[derive(Debug)]
pub struct MockProducer {
    id: ProducerId,
    kind: MediaKind,
    source: String,
    simulcast_layers: usize,
    track: Mutex<Option<MediaTrack>>,
    replaced: AtomicUsize,
    locally_paused: AtomicBool,
    remotely_paused: AtomicBool,
    closed: AtomicBool,
    events: EventEmitter<LifecycleEvent>,
}

impl MockProducer {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        track: MediaTrack,
        simulcast_layers: usize,
    ) -> Self {
        Self {
            id: ProducerId::from(id.into()),
            kind: track.kind,
            source: source.into(),
            simulcast_layers,
            track: Mutex::new(Some(track)),
            replaced: AtomicUsize::new(0),
            locally_paused: AtomicBool::new(false),
            remotely_paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            events: EventEmitter::new(),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn simulcast_layers(&self) -> usize {
        self.simulcast_layers
    }

    /// Number of successful `replace_track` calls.
    #[must_use]
    pub fn replace_count(&self) -> usize {
        self.replaced.load(Ordering::SeqCst)
    }

    pub fn remote_pause(&self) {
        self.remotely_paused.store(true, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Paused(Originator::Remote));
    }

    pub fn remote_resume(&self) {
        self.remotely_paused.store(false, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Resumed(Originator::Remote));
    }

    /// Close from the server side.
    pub fn remote_close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.events.emit(LifecycleEvent::Closed(Originator::Remote));
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

#[async_trait]
impl Producer for MockProducer {
    fn id(&self) -> ProducerId {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn source(&self) -> String {
        self.source.clone()
    }

    fn track(&self) -> Option<MediaTrack> {
        self.track.lock().unwrap().clone()
    }

    fn codec(&self) -> Option<String> {
        Some(match self.kind {
            MediaKind::Audio => "opus".to_string(),
            MediaKind::Video => "VP8".to_string(),
        })
    }

    fn locally_paused(&self) -> bool {
        self.locally_paused.load(Ordering::SeqCst)
    }

    fn remotely_paused(&self) -> bool {
        self.remotely_paused.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        self.locally_paused.store(true, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Paused(Originator::Local));
    }

    fn resume(&self) {
        self.locally_paused.store(false, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Resumed(Originator::Local));
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.events.emit(LifecycleEvent::Closed(Originator::Local));
        }
    }

    async fn replace_track(&self, track: &MediaTrack) -> Result<(), MediaError> {
        if self.is_closed() {
            return Err(MediaError::Closed);
        }
        *self.track.lock().unwrap() = Some(track.clone());
        self.replaced.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self, listener: Listener<LifecycleEvent>) -> Subscription {
        self.events.subscribe(listener)
    }
}

// ============================================================================
// Consumer
// ============================================================================

/// Mock remote consumer.
#[derive(Debug)]
pub struct MockConsumer {
    id: ConsumerId,
    peer_name: PeerName,
    kind: MediaKind,
    supported: bool,
    locally_paused: AtomicBool,
    remotely_paused: AtomicBool,
    events: EventEmitter<LifecycleEvent>,
}

impl MockConsumer {
    #[must_use]
    pub fn new(id: impl Into<String>, peer_name: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: ConsumerId::from(id.into()),
            peer_name: PeerName::from(peer_name.into()),
            kind,
            supported: true,
            locally_paused: AtomicBool::new(false),
            remotely_paused: AtomicBool::new(false),
            events: EventEmitter::new(),
        }
    }

    /// Mark the consumer as not decodable by this client.
    #[must_use]
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn remote_pause(&self) {
        self.remotely_paused.store(true, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Paused(Originator::Remote));
    }

    /// Close from the server side.
    pub fn remote_close(&self) {
        self.events.emit(LifecycleEvent::Closed(Originator::Remote));
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

impl Consumer for MockConsumer {
    fn id(&self) -> ConsumerId {
        self.id.clone()
    }

    fn peer_name(&self) -> PeerName {
        self.peer_name.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn source(&self) -> String {
        match self.kind {
            MediaKind::Audio => "mic".to_string(),
            MediaKind::Video => "webcam".to_string(),
        }
    }

    fn supported(&self) -> bool {
        self.supported
    }

    fn codec(&self) -> Option<String> {
        Some(match self.kind {
            MediaKind::Audio => "opus".to_string(),
            MediaKind::Video => "VP8".to_string(),
        })
    }

    fn locally_paused(&self) -> bool {
        self.locally_paused.load(Ordering::SeqCst)
    }

    fn remotely_paused(&self) -> bool {
        self.remotely_paused.load(Ordering::SeqCst)
    }

    fn pause(&self) {
        self.locally_paused.store(true, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Paused(Originator::Local));
    }

    fn resume(&self) {
        self.locally_paused.store(false, Ordering::SeqCst);
        self.events.emit(LifecycleEvent::Resumed(Originator::Local));
    }

    fn subscribe(&self, listener: Listener<LifecycleEvent>) -> Subscription {
        self.events.subscribe(listener)
    }
}

// ============================================================================
// Peer
// ============================================================================

/// Mock remote peer.
#[derive(Debug)]
pub struct MockPeer {
    name: PeerName,
    display_name: String,
    consumers: Mutex<Vec<Arc<MockConsumer>>>,
    events: EventEmitter<PeerEvent>,
}

impl MockPeer {
    #[must_use]
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: PeerName::from(name.into()),
            display_name: display_name.into(),
            consumers: Mutex::new(Vec::new()),
            events: EventEmitter::new(),
        }
    }

    /// Consumer already present when the peer is first seen.
    #[must_use]
    pub fn with_consumer(self, consumer: MockConsumer) -> Self {
        self.consumers.lock().unwrap().push(Arc::new(consumer));
        self
    }

    /// The peer's consumers.
    #[must_use]
    pub fn mock_consumers(&self) -> Vec<Arc<MockConsumer>> {
        self.consumers.lock().unwrap().clone()
    }

    /// Announce a new consumer for this peer.
    pub fn add_consumer(&self, consumer: Arc<MockConsumer>) {
        self.consumers.lock().unwrap().push(Arc::clone(&consumer));
        self.events.emit(PeerEvent::NewConsumer(consumer));
    }

    /// The peer leaves the room.
    pub fn close(&self) {
        self.events.emit(PeerEvent::Closed);
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

impl RemotePeer for MockPeer {
    fn name(&self) -> PeerName {
        self.name.clone()
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn device(&self) -> DeviceInfo {
        DeviceInfo::default()
    }

    fn consumers(&self) -> Vec<Arc<dyn Consumer>> {
        self.consumers
            .lock()
            .unwrap()
            .iter()
            .map(|consumer| Arc::clone(consumer) as Arc<dyn Consumer>)
            .collect()
    }

    fn subscribe(&self, listener: Listener<PeerEvent>) -> Subscription {
        self.events.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_track() -> MediaTrack {
        MediaTrack {
            id: "t-1".to_string(),
            kind: MediaKind::Audio,
            device_id: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_producer_emits_lifecycle_synchronously() {
        let producer = MockProducer::new("p-1", "mic", audio_track(), 0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = producer.subscribe(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        producer.pause();
        producer.close();
        producer.close();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                LifecycleEvent::Paused(Originator::Local),
                LifecycleEvent::Closed(Originator::Local),
            ]
        );
        assert!(producer.locally_paused());
    }

    #[tokio::test]
    async fn test_join_returns_configured_peers() {
        let media = MockMediaSession::builder()
            .with_peer(MockPeer::new("alice", "Alice"))
            .build();

        let peers = media.join("Bob", &DeviceInfo::default()).await.unwrap();
        assert_eq!(peers.len(), 1);
        assert!(media.is_joined());
        assert_eq!(media.joined_as(), vec!["Bob".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_join_is_recorded() {
        let media = MockMediaSession::builder()
            .fail_join(MediaError::Rejected("room full".to_string()))
            .build();

        assert!(media.join("Bob", &DeviceInfo::default()).await.is_err());
        assert_eq!(media.join_count(), 1);
        assert!(!media.is_joined());
    }
}
