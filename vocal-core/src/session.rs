//! # Session Module
//!
//! Wires the analysis stages together for one singer:
//! `AudioFrame -> PitchDetector -> confidence -> RangeTracker`.
//!
//! Results reach the host through a [`RangeObserver`]. Frames are analysed
//! synchronously, one call per frame; how often frames are delivered is up to
//! the caller.

use crate::confidence;
use crate::note::NoteLabel;
use crate::pitch::{AudioFrame, DetectorConfig, PitchDetector, PitchEstimate};
use crate::range::{PushOutcome, RangeSample, RangeTracker, TrackerConfig, VocalRangeResult};
use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete analysis configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
}

/// Receives session output. Every method defaults to doing nothing.
pub trait RangeObserver {
    /// Called once per analysed frame, pitched or not.
    fn on_pitch(&mut self, _estimate: &PitchEstimate) {}

    /// Called whenever a sample is accepted, with the session-wide extremes.
    fn on_progress(&mut self, _lowest_hz: f32, _highest_hz: f32) {}

    /// Called with every snapshot the tracker emits.
    fn on_snapshot(&mut self, _result: &VocalRangeResult) {}
}

impl RangeObserver for () {}

/// Session output as a message, for observers that live on another thread.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Pitch(PitchEstimate),
    Progress { lowest_hz: f32, highest_hz: f32 },
    Snapshot(VocalRangeResult),
}

/// Forwards every callback over the channel without blocking. Events that do
/// not fit in a full bounded channel are dropped, and a disconnected receiver
/// is ignored; either way the session keeps running.
impl RangeObserver for Sender<SessionEvent> {
    fn on_pitch(&mut self, estimate: &PitchEstimate) {
        forward(self, SessionEvent::Pitch(*estimate));
    }

    fn on_progress(&mut self, lowest_hz: f32, highest_hz: f32) {
        forward(
            self,
            SessionEvent::Progress {
                lowest_hz,
                highest_hz,
            },
        );
    }

    fn on_snapshot(&mut self, result: &VocalRangeResult) {
        forward(self, SessionEvent::Snapshot(result.clone()));
    }
}

fn forward(sender: &Sender<SessionEvent>, event: SessionEvent) {
    match sender.try_send(event) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(event)) => log::trace!("event channel full, dropped {event:?}"),
    }
}

/// One singer's range-finding session.
pub struct RangeSession<O: RangeObserver = ()> {
    detector: PitchDetector,
    tracker: RangeTracker,
    observer: O,
}

impl RangeSession<()> {
    /// A session with no observer; poll the tracker state instead.
    pub fn unobserved(config: SessionConfig) -> Self {
        Self::new(config, ())
    }
}

impl<O: RangeObserver> RangeSession<O> {
    pub fn new(config: SessionConfig, observer: O) -> Self {
        Self {
            detector: PitchDetector::new(config.detector),
            tracker: RangeTracker::new(config.tracker),
            observer,
        }
    }

    /// Starts tracking, discarding any previous session state.
    pub fn start(&mut self) {
        self.tracker.start();
    }

    /// Stops tracking and returns the last snapshot, the session result.
    pub fn stop(&mut self) -> Option<VocalRangeResult> {
        self.tracker.stop()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracker.is_tracking()
    }

    /// Analyses one frame.
    ///
    /// Detection runs whether or not the session is tracking, so a host can
    /// show live pitch before `start`. Only a tracking session feeds the
    /// range tracker.
    ///
    /// # Arguments
    /// * `frame` - Samples and sample rate, borrowed for this call only
    /// * `timestamp` - Position of the frame in the caller's stream
    pub fn process_frame(&mut self, frame: AudioFrame<'_>, timestamp: Duration) -> PitchEstimate {
        let estimate = self.detector.estimate(frame, timestamp);
        self.observer.on_pitch(&estimate);

        let Some(frequency_hz) = estimate.frequency_hz else {
            log::trace!("no pitch at {timestamp:?}");
            return estimate;
        };
        if !self.tracker.is_tracking() {
            return estimate;
        }

        let sample = RangeSample {
            frequency_hz,
            confidence: confidence::estimate(frequency_hz),
        };
        match self.tracker.push(sample) {
            PushOutcome::Accepted => self.report_progress(),
            PushOutcome::Snapshot(result) => {
                self.report_progress();
                self.observer.on_snapshot(&result);
            }
            PushOutcome::Discarded | PushOutcome::Idle => {}
        }
        estimate
    }

    fn report_progress(&mut self) {
        if let Some((lowest, highest)) = self.tracker.running_extrema() {
            self.observer.on_progress(lowest, highest);
        }
    }

    /// Root note for the latest snapshot, if one has been emitted.
    pub fn root_note(&self) -> Option<NoteLabel> {
        self.tracker
            .last_snapshot()
            .map(VocalRangeResult::optimal_root_note)
    }

    pub fn tracker(&self) -> &RangeTracker {
        &self.tracker
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }
}
