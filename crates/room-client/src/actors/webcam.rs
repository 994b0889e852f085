//! Webcam device and resolution cycling, plus audio-only mode.
//!
//! Switching device or resolution never recreates the webcam producer: a new
//! capture replaces the producer's track, so the producer id and everything
//! subscribed to it survive the switch.

use super::room::RoomControllerActor;
use crate::devices::VideoDevice;
use crate::errors::RoomError;
use crate::events::StateUpdate;
use crate::media::MediaKind;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

impl RoomControllerActor {
    /// Re-enumerate video inputs and reconcile the selection with them.
    pub(super) async fn refresh_webcams(&mut self) -> Result<(), RoomError> {
        let devices = self.devices.enumerate_video_inputs().await?;
        self.catalog.rebuild(devices);
        self.webcam.reconcile(&self.catalog);

        debug!(
            target: "room.webcam",
            devices = self.catalog.len(),
            selected = ?self.webcam.device.as_ref().map(|d| d.device_id.as_str()),
            "Webcam catalog refreshed"
        );
        self.sink.publish(StateUpdate::CanChangeWebcam {
            can_change: self.catalog.can_change(),
        });
        Ok(())
    }

    /// Persist the enabled preference, then enable the webcam.
    #[instrument(skip_all, name = "room.add_webcam", fields(room_id = %self.room_id))]
    pub(super) async fn add_webcam(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        if let Err(e) = self.preferences.set_webcam_enabled(true) {
            warn!(target: "room.webcam", error = %e, "Could not persist webcam preference");
        }
        self.enable_webcam().await
    }

    /// Refresh the catalog and create the webcam producer.
    pub(super) async fn enable_webcam(&mut self) -> Result<(), RoomError> {
        if self.producers.contains(MediaKind::Video) {
            return Err(RoomError::ProducerExists(MediaKind::Video));
        }
        self.set_webcam_in_progress(true);
        let result = match self.refresh_webcams().await {
            Ok(()) => self.create_producer(MediaKind::Video).await,
            Err(e) => Err(e),
        };
        self.set_webcam_in_progress(false);
        result
    }

    /// Switch to the next webcam in the catalog at the default resolution.
    #[instrument(skip_all, name = "room.cycle_webcam_device", fields(room_id = %self.room_id))]
    pub(super) async fn cycle_webcam_device(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        if !self.producers.contains(MediaKind::Video) {
            return Err(RoomError::NoProducer(MediaKind::Video));
        }

        self.set_webcam_in_progress(true);
        let result = self.switch_webcam_device().await;
        self.set_webcam_in_progress(false);
        result
    }

    async fn switch_webcam_device(&mut self) -> Result<(), RoomError> {
        self.refresh_webcams().await?;
        if !self.webcam.select_next(&self.catalog) {
            return Err(RoomError::NoWebcamDevices);
        }
        info!(
            target: "room.webcam",
            device_id = ?self.webcam.device.as_ref().map(|d| d.device_id.as_str()),
            "Switching webcam device"
        );
        self.replace_webcam_track().await
    }

    /// Advance the resolution tier, rolling back if the new capture fails.
    #[instrument(skip_all, name = "room.cycle_webcam_resolution", fields(room_id = %self.room_id))]
    pub(super) async fn cycle_webcam_resolution(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        if !self.producers.contains(MediaKind::Video) {
            return Err(RoomError::NoProducer(MediaKind::Video));
        }

        self.set_webcam_in_progress(true);
        let previous = self.webcam.resolution;
        self.webcam.resolution = previous.next();
        info!(
            target: "room.webcam",
            from = previous.as_str(),
            to = self.webcam.resolution.as_str(),
            "Switching webcam resolution"
        );

        let result = self.replace_webcam_track().await;
        if result.is_err() {
            self.webcam.resolution = previous;
            debug!(target: "room.webcam", resolution = previous.as_str(), "Webcam resolution rolled back");
        }
        self.set_webcam_in_progress(false);
        result
    }

    /// Capture from the current selection and swap it into the webcam producer.
    async fn replace_webcam_track(&mut self) -> Result<(), RoomError> {
        let request = self
            .webcam
            .capture_request()
            .ok_or(RoomError::NoWebcamDevices)?;
        let producer = self
            .producers
            .get(MediaKind::Video)
            .map(|slot| Arc::clone(&slot.producer))
            .ok_or(RoomError::NoProducer(MediaKind::Video))?;

        let track = self.devices.capture(&request).await?;
        let replaced = producer.replace_track(&track).await;
        self.devices.release(&track);
        replaced?;

        let device = self.webcam.device.clone();
        let resolution = self.webcam.resolution;
        let Some(slot) = self.producers.get_mut(MediaKind::Video) else {
            return Err(RoomError::NoProducer(MediaKind::Video));
        };
        slot.info.track = producer.track();
        slot.info.device_label = device.as_ref().map(|d| d.label.clone());
        slot.info.facing = device.as_ref().map(VideoDevice::facing);
        slot.info.resolution = Some(resolution);

        self.sink.publish(StateUpdate::ProducerTrack {
            producer_id: slot.info.id.clone(),
            track: slot.info.track.clone(),
            device_label: slot.info.device_label.clone(),
            facing: slot.info.facing,
            resolution: slot.info.resolution,
        });
        Ok(())
    }

    /// Drop the webcam (keeping the stored preference) and pause video consumers.
    #[instrument(skip_all, name = "room.enable_audio_only", fields(room_id = %self.room_id))]
    pub(super) fn enable_audio_only(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        if self.audio_only {
            return Ok(());
        }

        self.set_audio_only_in_progress(true);
        self.close_producer(MediaKind::Video);
        for consumer in self.peers.consumers_of_kind(MediaKind::Video) {
            if !consumer.locally_paused() {
                consumer.pause();
            }
        }
        self.audio_only = true;
        self.sink.publish(StateUpdate::AudioOnly { enabled: true });
        self.set_audio_only_in_progress(false);
        info!(target: "room.webcam", "Audio-only mode enabled");
        Ok(())
    }

    /// Re-add the webcam when permitted and resume video consumers.
    #[instrument(skip_all, name = "room.disable_audio_only", fields(room_id = %self.room_id))]
    pub(super) async fn disable_audio_only(&mut self) -> Result<(), RoomError> {
        self.ensure_open()?;
        if !self.audio_only {
            return Ok(());
        }

        self.set_audio_only_in_progress(true);
        let result = if !self.producers.contains(MediaKind::Video)
            && self.send_transport.is_some()
            && self.media.can_send(MediaKind::Video)
        {
            self.enable_webcam().await
        } else {
            Ok(())
        };
        for consumer in self.peers.consumers_of_kind(MediaKind::Video) {
            if consumer.locally_paused() {
                consumer.resume();
            }
        }
        self.audio_only = false;
        self.sink.publish(StateUpdate::AudioOnly { enabled: false });
        self.set_audio_only_in_progress(false);
        info!(target: "room.webcam", "Audio-only mode disabled");
        result
    }

    fn set_webcam_in_progress(&mut self, in_progress: bool) {
        self.webcam_in_progress = in_progress;
        self.sink
            .publish(StateUpdate::WebcamInProgress { in_progress });
    }

    fn set_audio_only_in_progress(&mut self, in_progress: bool) {
        self.audio_only_in_progress = in_progress;
        self.sink
            .publish(StateUpdate::AudioOnlyInProgress { in_progress });
    }
}
