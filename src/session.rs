//! One stream direction's worth of state, owned explicitly.
//!
//! The user and guideline stabilizers are separate instances with separate
//! filter banks; the latency tracker is shared between the send path, the
//! feedback path and the eviction task. `shutdown` stops the eviction task,
//! so nothing runs in the background after teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::channel::FrameChannel;
use crate::config::Config;
use crate::landmark::Landmark;
use crate::latency::{LatencyStats, LatencyTracker};
use crate::protocol::FeedbackPayload;
use crate::stabilizer::LandmarkStabilizer;
use crate::transmit::{epoch_ms, FrameTransmitter};

/// Stabilized feedback handed to the rendering side.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub guideline: Vec<Landmark>,
    pub score: f32,
    /// Round trip for the matched frame; `None` for unmatched responses.
    pub round_trip_ms: Option<f64>,
}

pub struct Session {
    user_stabilizer: LandmarkStabilizer,
    guideline_stabilizer: LandmarkStabilizer,
    transmitter: FrameTransmitter,
    tracker: Arc<LatencyTracker>,
    evictor: JoinHandle<()>,
}

impl Session {
    /// Wire up a session over an already-connected channel. Needs a tokio
    /// runtime for the eviction task.
    pub fn start(channel: Arc<dyn FrameChannel>, config: &Config) -> Self {
        let tracker = Arc::new(LatencyTracker::new(config.latency.window));
        let transmitter = FrameTransmitter::new(
            channel,
            Arc::clone(&tracker),
            Duration::from_millis(config.transmit.min_interval_ms),
        );

        let ttl_ms = config.latency.ttl_ms;
        let interval = Duration::from_millis(config.latency.evict_interval_ms);
        let evict_tracker = Arc::clone(&tracker);
        let evictor = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                evict_tracker.evict_stale(epoch_ms(), ttl_ms);
            }
        });

        Session {
            user_stabilizer: LandmarkStabilizer::new(config.filter.user, &config.stabilizer),
            guideline_stabilizer: LandmarkStabilizer::new(
                config.filter.guideline,
                &config.stabilizer,
            ),
            transmitter,
            tracker,
            evictor,
        }
    }

    /// Stabilize one raw frame and offer it to the transmitter. The
    /// stabilized landmarks go back to the caller for local display whether
    /// or not the frame was admitted; the flag reports whether it was sent.
    pub fn process_frame(&mut self, landmarks: &[Landmark], t_secs: f64) -> (Vec<Landmark>, bool) {
        let stabilized = self.user_stabilizer.stabilize(landmarks, t_secs);
        let sent = self.transmitter.try_send(&stabilized);
        (stabilized, sent)
    }

    /// Match a server response and stabilize its guideline pose through the
    /// guideline-side filter bank.
    pub fn handle_feedback(&mut self, feedback: &FeedbackPayload, t_secs: f64) -> Feedback {
        let round_trip_ms = self.tracker.record_receive(&feedback.request_id, epoch_ms());
        let guideline = self
            .guideline_stabilizer
            .stabilize(&feedback.landmarks, t_secs);
        Feedback {
            guideline,
            score: feedback.score,
            round_trip_ms,
        }
    }

    pub fn stats(&self) -> Option<LatencyStats> {
        self.tracker.stats()
    }

    pub fn tracker(&self) -> &Arc<LatencyTracker> {
        &self.tracker
    }

    /// Clear both filter banks, e.g. when the tracked subject changes.
    pub fn reset_filters(&mut self) {
        self.user_stabilizer.reset();
        self.guideline_stabilizer.reset();
    }

    /// Tear down the session and stop the eviction task.
    pub fn shutdown(self) {
        self.evictor.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ClientMessage;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct MockChannel {
        connected: AtomicBool,
        sent: Mutex<Vec<ClientMessage>>,
    }

    impl MockChannel {
        fn new() -> Self {
            Self {
                connected: AtomicBool::new(true),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn last_request_id(&self) -> Option<String> {
            self.sent.lock().unwrap().iter().rev().find_map(|m| match m {
                ClientMessage::Frame(p) => Some(p.request_id.clone()),
                _ => None,
            })
        }
    }

    impl FrameChannel for MockChannel {
        fn send(&self, msg: ClientMessage) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }
    }

    fn frame(x: f32) -> Vec<Landmark> {
        vec![Landmark::new(23, x, 0.5, 0.0).with_visibility(0.9)]
    }

    #[tokio::test]
    async fn test_frame_roundtrip_through_session() {
        let channel = Arc::new(MockChannel::new());
        let mut session = Session::start(channel.clone(), &Config::default());

        let (stabilized, sent) = session.process_frame(&frame(0.5), 0.0);
        assert!(sent);
        assert_eq!(stabilized.len(), 1);
        assert_eq!(stabilized[0].id, 23);
        assert_eq!(session.tracker().pending_count(), 1);

        let request_id = channel.last_request_id().unwrap();
        let feedback = session.handle_feedback(
            &FeedbackPayload {
                request_id,
                landmarks: frame(0.6),
                score: 0.1,
            },
            0.033,
        );
        assert!(feedback.round_trip_ms.is_some());
        assert_eq!(feedback.guideline.len(), 1);
        assert_eq!(session.tracker().pending_count(), 0);
        assert_eq!(session.stats().unwrap().count, 1);

        session.shutdown();
    }

    #[tokio::test]
    async fn test_unmatched_feedback_reports_none() {
        let channel = Arc::new(MockChannel::new());
        let mut session = Session::start(channel, &Config::default());

        let feedback = session.handle_feedback(
            &FeedbackPayload {
                request_id: "foreign".to_string(),
                landmarks: frame(0.5),
                score: 0.0,
            },
            0.0,
        );
        assert!(feedback.round_trip_ms.is_none());
        assert!(session.stats().is_none());

        session.shutdown();
    }

    #[tokio::test]
    async fn test_stream_directions_do_not_share_filters() {
        let channel = Arc::new(MockChannel::new());
        let mut session = Session::start(channel, &Config::default());

        // run the user stream for a while
        for i in 0..5 {
            session.process_frame(&frame(0.5 + i as f32 * 0.05), i as f64 * 0.033);
        }

        // guideline stream has never seen id 23: first frame passes through
        let feedback = session.handle_feedback(
            &FeedbackPayload {
                request_id: "x".to_string(),
                landmarks: frame(0.9),
                score: 0.0,
            },
            1.0,
        );
        assert_eq!(feedback.guideline[0].x, 0.9);

        session.shutdown();
    }
}
