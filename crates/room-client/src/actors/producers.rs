//! Local producer lifecycle: creation, mute/unmute, removal and the
//! producer event observers.
//!
//! At most one live producer exists per media kind. [`LocalProducers`] owns
//! them together with their observer subscriptions, so closing a producer
//! always detaches its observers first.

use super::messages::RoomEvent;
use super::room::RoomControllerActor;
use crate::devices::CaptureRequest;
use crate::errors::RoomError;
use crate::events::{ProducerInfo, StateUpdate};
use crate::media::{
    LifecycleEvent, MediaKind, MediaTrack, Originator, Producer, ProducerOptions, WEBCAM_SIMULCAST,
};
use crate::observability::metrics::record_producer_created;
use crate::subscription::Subscription;
use common::types::ProducerId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source tag of the microphone producer.
pub const MIC_SOURCE: &str = "mic";

/// Source tag of the webcam producer.
pub const WEBCAM_SOURCE: &str = "webcam";

/// A live producer with its observers.
pub(super) struct ProducerSlot {
    pub(super) producer: Arc<dyn Producer>,
    pub(super) info: ProducerInfo,
    observers: Subscription,
}

impl ProducerSlot {
    /// Detach observers, then close the producer.
    fn close(self) -> ProducerId {
        let ProducerSlot {
            producer,
            info,
            observers,
        } = self;
        observers.unsubscribe();
        producer.close();
        info.id
    }
}

/// The local producers, at most one per kind.
#[derive(Default)]
pub(super) struct LocalProducers {
    mic: Option<ProducerSlot>,
    webcam: Option<ProducerSlot>,
}

impl LocalProducers {
    fn entry(&mut self, kind: MediaKind) -> &mut Option<ProducerSlot> {
        match kind {
            MediaKind::Audio => &mut self.mic,
            MediaKind::Video => &mut self.webcam,
        }
    }

    pub(super) fn get(&self, kind: MediaKind) -> Option<&ProducerSlot> {
        match kind {
            MediaKind::Audio => self.mic.as_ref(),
            MediaKind::Video => self.webcam.as_ref(),
        }
    }

    pub(super) fn get_mut(&mut self, kind: MediaKind) -> Option<&mut ProducerSlot> {
        self.entry(kind).as_mut()
    }

    pub(super) fn contains(&self, kind: MediaKind) -> bool {
        self.get(kind).is_some()
    }

    /// Store `slot`; if its kind is already taken, close it instead.
    pub(super) fn insert_or_close(&mut self, slot: ProducerSlot) -> Result<(), RoomError> {
        let kind = slot.info.kind;
        let entry = self.entry(kind);
        if entry.is_some() {
            slot.close();
            return Err(RoomError::ProducerExists(kind));
        }
        *entry = Some(slot);
        Ok(())
    }

    pub(super) fn take(&mut self, kind: MediaKind) -> Option<ProducerSlot> {
        self.entry(kind).take()
    }

    fn kind_of(&self, id: &ProducerId) -> Option<MediaKind> {
        [MediaKind::Audio, MediaKind::Video]
            .into_iter()
            .find(|kind| self.get(*kind).is_some_and(|slot| &slot.info.id == id))
    }

    pub(super) fn take_by_id(&mut self, id: &ProducerId) -> Option<ProducerSlot> {
        let kind = self.kind_of(id)?;
        self.take(kind)
    }

    pub(super) fn find_mut(&mut self, id: &ProducerId) -> Option<&mut ProducerSlot> {
        let kind = self.kind_of(id)?;
        self.get_mut(kind)
    }

    pub(super) fn take_all(&mut self) -> Vec<ProducerSlot> {
        self.mic.take().into_iter().chain(self.webcam.take()).collect()
    }

    pub(super) fn infos(&self) -> Vec<ProducerInfo> {
        self.mic
            .iter()
            .chain(self.webcam.iter())
            .map(|slot| slot.info.clone())
            .collect()
    }
}

/// Producer options for a freshly captured track.
pub(super) fn producer_options(kind: MediaKind, track: MediaTrack) -> ProducerOptions {
    match kind {
        MediaKind::Audio => ProducerOptions {
            track,
            source: MIC_SOURCE.to_string(),
            simulcast: Vec::new(),
        },
        MediaKind::Video => ProducerOptions {
            track,
            source: WEBCAM_SOURCE.to_string(),
            simulcast: WEBCAM_SIMULCAST.to_vec(),
        },
    }
}

impl RoomControllerActor {
    /// Capture, create, observe and send a producer of `kind`.
    ///
    /// On failure the partially built producer is closed before the error is
    /// returned; nothing is left half-registered.
    pub(super) async fn create_producer(&mut self, kind: MediaKind) -> Result<(), RoomError> {
        self.ensure_open()?;
        let transport = self
            .send_transport
            .clone()
            .ok_or(RoomError::NotConnected)?;
        if !self.media.can_send(kind) {
            return Err(RoomError::CapabilityDenied(kind));
        }
        if self.producers.contains(kind) {
            return Err(RoomError::ProducerExists(kind));
        }

        let request = match kind {
            MediaKind::Audio => CaptureRequest::Audio,
            MediaKind::Video => self
                .webcam
                .capture_request()
                .ok_or(RoomError::NoWebcamDevices)?,
        };

        let result = self.start_producer(kind, &request, transport).await;
        record_producer_created(
            kind.as_str(),
            if result.is_ok() { "success" } else { "error" },
        );
        result
    }

    async fn start_producer(
        &mut self,
        kind: MediaKind,
        request: &CaptureRequest,
        transport: Arc<dyn crate::media::Transport>,
    ) -> Result<(), RoomError> {
        let track = self.devices.capture(request).await?;

        let producer = match self.media.create_producer(producer_options(kind, track.clone())) {
            Ok(producer) => producer,
            Err(e) => {
                self.devices.release(&track);
                return Err(e.into());
            }
        };
        let observers = self.observe_producer(&producer);
        // The producer holds its own copy of the capture.
        self.devices.release(&track);

        if let Err(e) = transport.send(Arc::clone(&producer)).await {
            observers.unsubscribe();
            producer.close();
            return Err(e.into());
        }

        let device = match kind {
            MediaKind::Audio => None,
            MediaKind::Video => self.webcam.device.clone(),
        };
        let info = ProducerInfo {
            id: producer.id(),
            kind,
            source: producer.source(),
            track: producer.track(),
            codec: producer.codec(),
            locally_paused: producer.locally_paused(),
            remotely_paused: producer.remotely_paused(),
            device_label: device.as_ref().map(|d| d.label.clone()),
            facing: device.as_ref().map(crate::devices::VideoDevice::facing),
            resolution: (kind == MediaKind::Video).then_some(self.webcam.resolution),
        };

        info!(
            target: "room.producer",
            room_id = %self.room_id,
            producer_id = %info.id,
            kind = kind.as_str(),
            "Producer created"
        );

        self.producers.insert_or_close(ProducerSlot {
            producer,
            info: info.clone(),
            observers,
        })?;
        self.sink.publish(StateUpdate::NewProducer(info));
        Ok(())
    }

    fn observe_producer(&self, producer: &Arc<dyn Producer>) -> Subscription {
        let poster = self.poster.clone();
        let producer_id = producer.id();
        producer.subscribe(Arc::new(move |event| {
            poster.post(RoomEvent::Producer {
                producer_id: producer_id.clone(),
                event,
            });
        }))
    }

    pub(super) fn handle_producer_event(&mut self, producer_id: &ProducerId, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Closed(originator) => {
                if let Some(slot) = self.producers.take_by_id(producer_id) {
                    info!(
                        target: "room.producer",
                        room_id = %self.room_id,
                        producer_id = %producer_id,
                        originator = originator.as_str(),
                        "Producer closed"
                    );
                    drop(slot);
                    self.sink.publish(StateUpdate::ProducerClosed {
                        producer_id: producer_id.clone(),
                    });
                }
            }
            LifecycleEvent::Paused(originator) | LifecycleEvent::Resumed(originator) => {
                let paused = matches!(event, LifecycleEvent::Paused(_));
                let Some(slot) = self.producers.find_mut(producer_id) else {
                    debug!(
                        target: "room.producer",
                        producer_id = %producer_id,
                        "Event for unknown producer ignored"
                    );
                    return;
                };
                match originator {
                    Originator::Local => slot.info.locally_paused = paused,
                    Originator::Remote => slot.info.remotely_paused = paused,
                }
                let producer_id = producer_id.clone();
                self.sink.publish(if paused {
                    StateUpdate::ProducerPaused {
                        producer_id,
                        originator,
                    }
                } else {
                    StateUpdate::ProducerResumed {
                        producer_id,
                        originator,
                    }
                });
            }
        }
    }

    pub(super) fn mute_mic(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        let slot = self
            .producers
            .get(MediaKind::Audio)
            .ok_or(RoomError::NoProducer(MediaKind::Audio))?;
        debug!(target: "room.producer", producer_id = %slot.info.id, "Muting microphone");
        slot.producer.pause();
        Ok(())
    }

    pub(super) fn unmute_mic(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        let slot = self
            .producers
            .get(MediaKind::Audio)
            .ok_or(RoomError::NoProducer(MediaKind::Audio))?;
        debug!(target: "room.producer", producer_id = %slot.info.id, "Unmuting microphone");
        slot.producer.resume();
        Ok(())
    }

    /// Persist the disabled preference, then close the webcam producer.
    pub(super) fn remove_webcam(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        if let Err(e) = self.preferences.set_webcam_enabled(false) {
            warn!(target: "room.producer", error = %e, "Could not persist webcam preference");
        }
        if self.close_producer(MediaKind::Video) {
            Ok(())
        } else {
            Err(RoomError::NoProducer(MediaKind::Video))
        }
    }

    /// Close the producer of `kind` if there is one. Returns whether one was closed.
    pub(super) fn close_producer(&mut self, kind: MediaKind) -> bool {
        match self.producers.take(kind) {
            Some(slot) => {
                let producer_id = slot.close();
                info!(
                    target: "room.producer",
                    room_id = %self.room_id,
                    producer_id = %producer_id,
                    kind = kind.as_str(),
                    "Producer closed locally"
                );
                self.sink.publish(StateUpdate::ProducerClosed { producer_id });
                true
            }
            None => false,
        }
    }

    pub(super) fn close_all_producers(&mut self) {
        for slot in self.producers.take_all() {
            let producer_id = slot.close();
            self.sink.publish(StateUpdate::ProducerClosed { producer_id });
        }
    }
}
