//! Remote peer and consumer bookkeeping.
//!
//! The registry survives reconnects. At the start of every connection cycle
//! all entries are marked unseen and their observers detached; the join
//! snapshot then re-marks the peers and consumers that are still present
//! (re-attaching observers without publishing them again), and whatever is
//! left unseen is reported closed.

use super::messages::RoomEvent;
use super::room::RoomControllerActor;
use crate::errors::MediaError;
use crate::events::{ConsumerInfo, NoticeLevel, PeerInfo, StateUpdate};
use crate::media::{Consumer, LifecycleEvent, MediaKind, MediaTrack, Originator, PeerEvent, RemotePeer};
use crate::observability::metrics::record_consumer_receive;
use crate::subscription::Subscription;
use common::types::{ConsumerId, PeerName};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of observing a peer or consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Seen {
    /// First observation.
    New,
    /// Known from an earlier connection cycle.
    Carried,
    /// Already observed in this cycle.
    Duplicate,
}

struct PeerEntry {
    info: PeerInfo,
    seen: bool,
    subscription: Option<Subscription>,
}

struct ConsumerEntry {
    consumer: Arc<dyn Consumer>,
    info: ConsumerInfo,
    seen: bool,
    subscription: Option<Subscription>,
}

/// Remote peers and their consumers, keyed for deterministic ordering.
#[derive(Default)]
pub(super) struct PeerRegistry {
    peers: BTreeMap<PeerName, PeerEntry>,
    consumers: BTreeMap<ConsumerId, ConsumerEntry>,
}

impl PeerRegistry {
    /// Mark everything unseen and detach every observer.
    pub(super) fn begin_cycle(&mut self) {
        self.detach_all();
        for entry in self.peers.values_mut() {
            entry.seen = false;
        }
        for entry in self.consumers.values_mut() {
            entry.seen = false;
        }
    }

    /// Detach every peer and consumer observer.
    pub(super) fn detach_all(&mut self) {
        for entry in self.peers.values_mut() {
            if let Some(subscription) = entry.subscription.take() {
                subscription.unsubscribe();
            }
        }
        for entry in self.consumers.values_mut() {
            if let Some(subscription) = entry.subscription.take() {
                subscription.unsubscribe();
            }
        }
    }

    /// Remove entries not seen since [`Self::begin_cycle`].
    ///
    /// Returns the removed consumers and peer names.
    pub(super) fn finish_cycle(&mut self) -> (Vec<ConsumerInfo>, Vec<PeerName>) {
        let stale_consumers: Vec<ConsumerId> = self
            .consumers
            .iter()
            .filter(|(_, entry)| !entry.seen)
            .map(|(id, _)| id.clone())
            .collect();
        let stale_peers: Vec<PeerName> = self
            .peers
            .iter()
            .filter(|(_, entry)| !entry.seen)
            .map(|(name, _)| name.clone())
            .collect();

        let consumers = stale_consumers
            .iter()
            .filter_map(|id| self.remove_consumer(id))
            .collect();
        for name in &stale_peers {
            self.peers.remove(name);
        }
        (consumers, stale_peers)
    }

    pub(super) fn observe_peer(&mut self, info: PeerInfo) -> Seen {
        match self.peers.get_mut(&info.name) {
            Some(entry) if entry.seen => Seen::Duplicate,
            Some(entry) => {
                entry.seen = true;
                entry.info.display_name = info.display_name;
                entry.info.device = info.device;
                Seen::Carried
            }
            None => {
                self.peers.insert(
                    info.name.clone(),
                    PeerEntry {
                        info,
                        seen: true,
                        subscription: None,
                    },
                );
                Seen::New
            }
        }
    }

    pub(super) fn attach_peer(&mut self, name: &PeerName, subscription: Subscription) {
        if let Some(entry) = self.peers.get_mut(name) {
            entry.subscription = Some(subscription);
        }
    }

    pub(super) fn observe_consumer(&mut self, consumer: Arc<dyn Consumer>, info: ConsumerInfo) -> Seen {
        let seen = match self.consumers.get_mut(&info.id) {
            Some(entry) if entry.seen => return Seen::Duplicate,
            Some(entry) => {
                entry.seen = true;
                entry.consumer = consumer;
                Seen::Carried
            }
            None => {
                self.consumers.insert(
                    info.id.clone(),
                    ConsumerEntry {
                        consumer,
                        info: info.clone(),
                        seen: true,
                        subscription: None,
                    },
                );
                Seen::New
            }
        };

        if let Some(peer) = self.peers.get_mut(&info.peer_name) {
            if !peer.info.consumers.contains(&info.id) {
                peer.info.consumers.push(info.id);
            }
        }
        seen
    }

    /// Bring a carried consumer's pause flags up to date.
    ///
    /// Returns the flags that changed, as `(originator, paused)`.
    pub(super) fn sync_pause_flags(
        &mut self,
        id: &ConsumerId,
        locally_paused: bool,
        remotely_paused: bool,
    ) -> Vec<(Originator, bool)> {
        let Some(entry) = self.consumers.get_mut(id) else {
            return Vec::new();
        };
        let mut changes = Vec::new();
        if entry.info.locally_paused != locally_paused {
            entry.info.locally_paused = locally_paused;
            changes.push((Originator::Local, locally_paused));
        }
        if entry.info.remotely_paused != remotely_paused {
            entry.info.remotely_paused = remotely_paused;
            changes.push((Originator::Remote, remotely_paused));
        }
        changes
    }

    pub(super) fn attach_consumer(&mut self, id: &ConsumerId, subscription: Subscription) {
        if let Some(entry) = self.consumers.get_mut(id) {
            entry.subscription = Some(subscription);
        }
    }

    /// Remove a peer and all of its consumers.
    pub(super) fn remove_peer(&mut self, name: &PeerName) -> Option<(PeerInfo, Vec<ConsumerInfo>)> {
        let entry = self.peers.remove(name)?;
        let consumers = entry
            .info
            .consumers
            .iter()
            .filter_map(|id| self.remove_consumer(id))
            .collect();
        Some((entry.info, consumers))
    }

    pub(super) fn remove_consumer(&mut self, id: &ConsumerId) -> Option<ConsumerInfo> {
        let entry = self.consumers.remove(id)?;
        if let Some(peer) = self.peers.get_mut(&entry.info.peer_name) {
            peer.info.consumers.retain(|c| c != id);
        }
        Some(entry.info)
    }

    pub(super) fn consumer_info_mut(&mut self, id: &ConsumerId) -> Option<&mut ConsumerInfo> {
        self.consumers.get_mut(id).map(|entry| &mut entry.info)
    }

    pub(super) fn consumers_of_kind(&self, kind: MediaKind) -> Vec<Arc<dyn Consumer>> {
        self.consumers
            .values()
            .filter(|entry| entry.info.kind == kind)
            .map(|entry| Arc::clone(&entry.consumer))
            .collect()
    }

    pub(super) fn peer_infos(&self) -> Vec<PeerInfo> {
        self.peers.values().map(|entry| entry.info.clone()).collect()
    }

    pub(super) fn consumer_infos(&self) -> Vec<ConsumerInfo> {
        self.consumers
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    pub(super) fn clear(&mut self) {
        self.detach_all();
        self.consumers.clear();
        self.peers.clear();
    }
}

impl RoomControllerActor {
    /// Publish (if new) and observe a remote peer and its consumers.
    ///
    /// `announce` controls the "joined the room" notice; it is off for peers
    /// already present in the join snapshot.
    pub(super) fn register_peer(&mut self, peer: Arc<dyn RemotePeer>, announce: bool) {
        let info = PeerInfo {
            name: peer.name(),
            display_name: peer.display_name(),
            device: peer.device(),
            consumers: Vec::new(),
        };
        let name = info.name.clone();

        match self.peers.observe_peer(info.clone()) {
            Seen::Duplicate => {
                debug!(target: "room.peers", peer = %name, "Peer already registered this cycle");
                return;
            }
            Seen::Carried => {
                debug!(target: "room.peers", peer = %name, "Peer carried over from previous cycle");
            }
            Seen::New => {
                info!(
                    target: "room.peers",
                    room_id = %self.room_id,
                    peer = %name,
                    "Peer registered"
                );
                let display_name = info.display_name.clone();
                self.sink.publish(StateUpdate::NewPeer(info));
                if announce {
                    self.notify(
                        NoticeLevel::Info,
                        format!("{display_name} has joined the room"),
                    );
                }
            }
        }

        let poster = self.poster.clone();
        let epoch = self.epoch;
        let peer_name = name.clone();
        let subscription = peer.subscribe(Arc::new(move |event| {
            poster.post(RoomEvent::Peer {
                epoch,
                peer_name: peer_name.clone(),
                event,
            });
        }));
        self.peers.attach_peer(&name, subscription);

        for consumer in peer.consumers() {
            self.register_consumer(consumer);
        }
    }

    /// Publish (if new), observe and start receiving a consumer.
    pub(super) fn register_consumer(&mut self, consumer: Arc<dyn Consumer>) {
        let info = ConsumerInfo {
            id: consumer.id(),
            peer_name: consumer.peer_name(),
            kind: consumer.kind(),
            source: consumer.source(),
            supported: consumer.supported(),
            locally_paused: consumer.locally_paused(),
            remotely_paused: consumer.remotely_paused(),
            codec: consumer.codec(),
            track: None,
        };
        let id = info.id.clone();
        let kind = info.kind;

        match self.peers.observe_consumer(Arc::clone(&consumer), info.clone()) {
            Seen::Duplicate => return,
            Seen::Carried => {
                debug!(target: "room.peers", consumer_id = %id, "Consumer carried over from previous cycle");
                let changes = self
                    .peers
                    .sync_pause_flags(&id, info.locally_paused, info.remotely_paused);
                for (originator, paused) in changes {
                    self.publish_consumer_pause(&id, originator, paused);
                }
            }
            Seen::New => {
                debug!(
                    target: "room.peers",
                    consumer_id = %id,
                    peer = %info.peer_name,
                    kind = kind.as_str(),
                    "Consumer registered"
                );
                self.sink.publish(StateUpdate::NewConsumer(info));
            }
        }

        let poster = self.poster.clone();
        let epoch = self.epoch;
        let consumer_id = id.clone();
        let subscription = consumer.subscribe(Arc::new(move |event| {
            poster.post(RoomEvent::Consumer {
                epoch,
                consumer_id: consumer_id.clone(),
                event,
            });
        }));
        self.peers.attach_consumer(&id, subscription);

        if self.audio_only && kind == MediaKind::Video && !consumer.locally_paused() {
            consumer.pause();
        }

        if consumer.supported() {
            self.receive_consumer(consumer);
        } else {
            debug!(target: "room.peers", consumer_id = %id, "Consumer not supported, not receiving");
        }
    }

    fn receive_consumer(&self, consumer: Arc<dyn Consumer>) {
        let Some(transport) = self.recv_transport.clone() else {
            warn!(target: "room.peers", consumer_id = %consumer.id(), "No receive transport for consumer");
            return;
        };
        let poster = self.poster.clone();
        let epoch = self.epoch;
        let consumer_id = consumer.id();
        tokio::spawn(async move {
            let result = transport.receive(consumer).await;
            poster.post(RoomEvent::ConsumerTrack {
                epoch,
                consumer_id,
                result,
            });
        });
    }

    /// Report peers and consumers that did not survive a reconnect.
    pub(super) fn finish_peer_cycle(&mut self) {
        let (consumers, peers) = self.peers.finish_cycle();
        for consumer in consumers {
            self.sink.publish(StateUpdate::ConsumerClosed {
                consumer_id: consumer.id,
                peer_name: consumer.peer_name,
            });
        }
        for peer_name in peers {
            info!(target: "room.peers", peer = %peer_name, "Peer gone after reconnect");
            self.sink.publish(StateUpdate::PeerClosed { peer_name });
        }
    }

    pub(super) fn handle_peer_event(&mut self, peer_name: &PeerName, event: PeerEvent) {
        match event {
            PeerEvent::NewConsumer(consumer) => self.register_consumer(consumer),
            PeerEvent::Closed => {
                let Some((info, consumers)) = self.peers.remove_peer(peer_name) else {
                    return;
                };
                info!(
                    target: "room.peers",
                    room_id = %self.room_id,
                    peer = %peer_name,
                    "Peer closed"
                );
                for consumer in consumers {
                    self.sink.publish(StateUpdate::ConsumerClosed {
                        consumer_id: consumer.id,
                        peer_name: consumer.peer_name,
                    });
                }
                self.sink.publish(StateUpdate::PeerClosed {
                    peer_name: info.name,
                });
                if self.media.is_joined() {
                    self.notify(
                        NoticeLevel::Info,
                        format!("{} left the room", info.display_name),
                    );
                }
            }
        }
    }

    pub(super) fn handle_consumer_event(&mut self, consumer_id: &ConsumerId, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Closed(originator) => {
                if let Some(info) = self.peers.remove_consumer(consumer_id) {
                    debug!(
                        target: "room.peers",
                        consumer_id = %consumer_id,
                        originator = originator.as_str(),
                        "Consumer closed"
                    );
                    self.sink.publish(StateUpdate::ConsumerClosed {
                        consumer_id: info.id,
                        peer_name: info.peer_name,
                    });
                }
            }
            LifecycleEvent::Paused(originator) | LifecycleEvent::Resumed(originator) => {
                let paused = matches!(event, LifecycleEvent::Paused(_));
                let Some(info) = self.peers.consumer_info_mut(consumer_id) else {
                    return;
                };
                match originator {
                    Originator::Local => info.locally_paused = paused,
                    Originator::Remote => info.remotely_paused = paused,
                }
                self.publish_consumer_pause(consumer_id, originator, paused);
            }
        }
    }

    fn publish_consumer_pause(&self, consumer_id: &ConsumerId, originator: Originator, paused: bool) {
        let consumer_id = consumer_id.clone();
        self.sink.publish(if paused {
            StateUpdate::ConsumerPaused {
                consumer_id,
                originator,
            }
        } else {
            StateUpdate::ConsumerResumed {
                consumer_id,
                originator,
            }
        });
    }

    pub(super) fn handle_consumer_track(
        &mut self,
        consumer_id: &ConsumerId,
        result: Result<MediaTrack, MediaError>,
    ) {
        match result {
            Ok(track) => {
                record_consumer_receive("success");
                let Some(info) = self.peers.consumer_info_mut(consumer_id) else {
                    debug!(target: "room.peers", consumer_id = %consumer_id, "Track for unknown consumer dropped");
                    return;
                };
                // A consumer carried over a reconnect is received again on
                // the new transport; an unchanged track is not republished.
                if info.track.as_ref() == Some(&track) {
                    debug!(target: "room.peers", consumer_id = %consumer_id, "Consumer track unchanged");
                    return;
                }
                info.track = Some(track.clone());
                self.sink.publish(StateUpdate::ConsumerTrack {
                    consumer_id: consumer_id.clone(),
                    track,
                });
            }
            Err(e) => {
                // The consumer stays known without a track; no retry.
                record_consumer_receive("error");
                warn!(
                    target: "room.peers",
                    consumer_id = %consumer_id,
                    error = %e,
                    "Could not receive consumer"
                );
                if let Some(info) = self.peers.consumer_info_mut(consumer_id) {
                    info.track = None;
                }
            }
        }
    }
}
