//! Track manager
//!
//! Creates the main track on construction and provides the hierarchy
//! operations the control plane uses: building tracks, removing them,
//! traversal, and collecting active data planes for the callback
//! contexts. The public hierarchy policy is single-level: child
//! tracks attach to the main track.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Track, TrackError};
use crate::audio::AudioDataPlane;
use crate::midi::MidiDataPlane;

pub struct TrackManager {
    main_track: Arc<Track>,
    /// Serializes structural snapshots (see `clear_tracks`).
    manager_mutex: Mutex<()>,
}

impl TrackManager {
    /// Create the manager and its main track.
    pub fn new() -> Self {
        let main_track = Track::new_main();
        log::info!("TrackManager: created MainTrack (root of hierarchy)");
        Self {
            main_track,
            manager_mutex: Mutex::new(()),
        }
    }

    pub fn main_track(&self) -> Arc<Track> {
        self.main_track.clone()
    }

    /// Build a detached track, not yet in the hierarchy.
    pub fn create_track(&self) -> Arc<Track> {
        log::info!("TrackManager: created detached track");
        Track::new()
    }

    /// Build a track attached under `parent`. Anything other than the
    /// main track falls back to the main track as parent (the
    /// hierarchy is single-level).
    pub fn create_child_track(&self, parent: Option<&Arc<Track>>) -> Arc<Track> {
        let parent = match parent {
            Some(parent) if parent.is_main() => parent.clone(),
            Some(_) => {
                log::warn!("TrackManager: hierarchy is single-level, attaching to MainTrack");
                self.main_track.clone()
            }
            None => self.main_track.clone(),
        };

        let track = Track::new();
        if let Err(err) = parent.add_child(&track) {
            // A freshly built track cannot be parented or cyclic.
            log::error!("TrackManager: failed to attach new track: {}", err);
        }
        log::info!(
            "TrackManager: created child track, {} tracks in hierarchy",
            self.track_count()
        );
        track
    }

    /// Detach a track from the hierarchy. Its children are detached
    /// too and become orphans owned by the caller. The main track
    /// cannot be removed.
    pub fn remove_track(&self, track: &Arc<Track>) -> Result<(), TrackError> {
        if track.is_main() {
            return Err(TrackError::CannotRemoveMainTrack);
        }

        for child in track.children() {
            track.remove_child(&child);
        }
        track.remove_from_parent();

        log::info!(
            "TrackManager: removed track, {} tracks in hierarchy",
            self.track_count()
        );
        Ok(())
    }

    /// Main track followed by its descendants, breadth-first.
    pub fn all_tracks(&self) -> Vec<Arc<Track>> {
        let mut tracks = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.main_track.clone());
        while let Some(track) = queue.pop_front() {
            queue.extend(track.children());
            tracks.push(track);
        }
        tracks
    }

    pub fn track_count(&self) -> usize {
        self.all_tracks().len()
    }

    /// Detach every child of the main track. The children snapshot is
    /// taken under the manager mutex and the detaching happens outside
    /// it, so child detach never contends with other manager
    /// operations.
    pub fn clear_tracks(&self) {
        log::info!(
            "TrackManager: clearing tracks, {} before clear",
            self.track_count()
        );

        let children = {
            let _guard = self.manager_mutex.lock().unwrap();
            self.main_track.children()
        };

        for child in children {
            child.remove_from_parent();
        }
    }

    /// Audio data planes of active (running) tracks, for the audio
    /// callback context.
    pub fn track_audio_dataplanes(&self) -> Vec<Arc<AudioDataPlane>> {
        self.main_track.collect_running_audio_planes()
    }

    /// MIDI data planes of active (running) tracks, for the MIDI
    /// callback context.
    pub fn track_midi_dataplanes(&self) -> Vec<Arc<MidiDataPlane>> {
        self.main_track.collect_running_midi_planes()
    }
}

impl Default for TrackManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_starts_with_only_the_main_track() {
        let manager = TrackManager::new();
        assert!(manager.main_track().is_main());
        assert_eq!(manager.track_count(), 1);
    }

    #[test]
    fn child_tracks_attach_to_main_by_default() {
        let manager = TrackManager::new();
        let track = manager.create_child_track(None);

        assert!(Arc::ptr_eq(
            &track.parent().unwrap(),
            &manager.main_track()
        ));
        assert_eq!(manager.track_count(), 2);
    }

    #[test]
    fn non_main_parent_falls_back_to_main() {
        let manager = TrackManager::new();
        let first = manager.create_child_track(None);
        let second = manager.create_child_track(Some(&first));

        // Single-level hierarchy: second is a sibling, not a child.
        assert!(Arc::ptr_eq(
            &second.parent().unwrap(),
            &manager.main_track()
        ));
        assert_eq!(first.child_count(), 0);
    }

    #[test]
    fn main_track_cannot_be_removed() {
        let manager = TrackManager::new();
        let main = manager.main_track();
        assert!(matches!(
            manager.remove_track(&main),
            Err(TrackError::CannotRemoveMainTrack)
        ));
    }

    #[test]
    fn remove_track_orphans_its_children() {
        let manager = TrackManager::new();
        let track = manager.create_child_track(None);
        let nested = manager.create_track();
        track.add_child(&nested).unwrap();

        manager.remove_track(&track).unwrap();

        assert!(track.parent().is_none());
        assert!(nested.parent().is_none());
        assert_eq!(track.child_count(), 0);
        assert_eq!(manager.track_count(), 1);
    }

    #[test]
    fn all_tracks_is_breadth_first_from_main() {
        let manager = TrackManager::new();
        let first = manager.create_child_track(None);
        let second = manager.create_child_track(None);

        let all = manager.all_tracks();
        assert_eq!(all.len(), 3);
        assert!(Arc::ptr_eq(&all[0], &manager.main_track()));
        assert!(Arc::ptr_eq(&all[1], &first));
        assert!(Arc::ptr_eq(&all[2], &second));
    }

    #[test]
    fn clear_tracks_detaches_all_children() {
        let manager = TrackManager::new();
        let first = manager.create_child_track(None);
        let second = manager.create_child_track(None);

        manager.clear_tracks();

        assert_eq!(manager.track_count(), 1);
        assert!(first.parent().is_none());
        assert!(second.parent().is_none());
    }

    #[test]
    fn dataplane_collection_tracks_running_state() {
        let manager = TrackManager::new();
        let track = manager.create_child_track(None);

        assert!(manager.track_audio_dataplanes().is_empty());
        assert!(manager.track_midi_dataplanes().is_empty());

        track.audio_dataplane().start();
        track.midi_dataplane().start();
        assert_eq!(manager.track_audio_dataplanes().len(), 1);
        assert_eq!(manager.track_midi_dataplanes().len(), 1);

        track.audio_dataplane().stop();
        assert!(manager.track_audio_dataplanes().is_empty());
    }
}
