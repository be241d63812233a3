//! Outbound frame admission and correlation.
//!
//! Excess frames are dropped, never queued: only the freshest pose estimate
//! is worth sending. Each admitted frame carries a correlation id the server
//! echoes back, which keys the latency bookkeeping.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::warn;
use uuid::Uuid;

use crate::channel::FrameChannel;
use crate::landmark::Landmark;
use crate::latency::LatencyTracker;
use crate::protocol::{ClientMessage, FramePayload};

/// Wall-clock milliseconds since the epoch.
pub fn epoch_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

/// One admission decision per attempt, atomic under the caller's lock.
struct SendGate {
    min_interval: Duration,
    last_sent: Option<Instant>,
}

impl SendGate {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sent: None,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }
}

/// Rate-limited frame sender.
pub struct FrameTransmitter {
    channel: Arc<dyn FrameChannel>,
    tracker: Arc<LatencyTracker>,
    gate: Mutex<SendGate>,
}

impl FrameTransmitter {
    pub fn new(
        channel: Arc<dyn FrameChannel>,
        tracker: Arc<LatencyTracker>,
        min_interval: Duration,
    ) -> Self {
        Self {
            channel,
            tracker,
            gate: Mutex::new(SendGate::new(min_interval)),
        }
    }

    /// Send a frame if the channel is up and the rate limit allows it.
    ///
    /// Returns true iff the frame was actually handed to the channel.
    /// Rejected frames leave no trace: no latency record, no slot consumed
    /// when the channel is down.
    pub fn try_send(&self, landmarks: &[Landmark]) -> bool {
        if !self.channel.is_connected() {
            return false;
        }

        if !self.gate.lock().unwrap().admit(Instant::now()) {
            return false;
        }

        let start_ms = epoch_ms();
        let request_id = next_request_id(start_ms);
        self.tracker.record_send(&request_id, start_ms);

        let payload = FramePayload {
            request_id: request_id.clone(),
            timestamp_ms: start_ms as u64,
            landmarks: landmarks.to_vec(),
        };
        match self.channel.send(ClientMessage::Frame(payload)) {
            Ok(()) => true,
            Err(e) => {
                warn!("frame send failed: {e}");
                self.tracker.forget(&request_id);
                false
            }
        }
    }
}

/// Epoch millis + 8 random hex digits, unique per send.
fn next_request_id(start_ms: f64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", start_ms as u64, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockChannel {
        connected: AtomicBool,
        fail_sends: bool,
        sent: Mutex<Vec<ClientMessage>>,
    }

    impl MockChannel {
        fn new(connected: bool) -> Self {
            Self {
                connected: AtomicBool::new(connected),
                fail_sends: false,
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
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
            if self.fail_sends {
                anyhow::bail!("broken pipe");
            }
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }
    }

    fn frame() -> Vec<Landmark> {
        vec![Landmark::new(0, 0.5, 0.5, 0.0)]
    }

    #[test]
    fn test_gate_admits_first_rejects_within_interval() {
        let mut gate = SendGate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(gate.admit(t0));
        assert!(!gate.admit(t0 + Duration::from_millis(10)));
        assert!(gate.admit(t0 + Duration::from_millis(110)));
    }

    #[test]
    fn test_try_send_registers_latency_record() {
        let channel = Arc::new(MockChannel::new(true));
        let tracker = Arc::new(LatencyTracker::new(16));
        let tx = FrameTransmitter::new(
            channel.clone(),
            tracker.clone(),
            Duration::from_millis(100),
        );

        assert!(tx.try_send(&frame()));
        assert_eq!(channel.sent_count(), 1);
        assert_eq!(tracker.pending_count(), 1);

        // the wire id matches the registered record
        let id = channel.last_request_id().unwrap();
        assert!(tracker.record_receive(&id, epoch_ms() + 1.0).is_some());
    }

    #[test]
    fn test_try_send_rate_limited() {
        let channel = Arc::new(MockChannel::new(true));
        let tracker = Arc::new(LatencyTracker::new(16));
        let tx = FrameTransmitter::new(
            channel.clone(),
            tracker.clone(),
            Duration::from_secs(3600),
        );

        assert!(tx.try_send(&frame()));
        // immediate second attempt falls inside the interval
        assert!(!tx.try_send(&frame()));
        assert_eq!(channel.sent_count(), 1);
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn test_try_send_disconnected_leaves_no_trace() {
        let channel = Arc::new(MockChannel::new(false));
        let tracker = Arc::new(LatencyTracker::new(16));
        let tx = FrameTransmitter::new(
            channel.clone(),
            tracker.clone(),
            Duration::from_millis(100),
        );

        assert!(!tx.try_send(&frame()));
        assert_eq!(channel.sent_count(), 0);
        assert_eq!(tracker.pending_count(), 0);

        // the failed attempt consumed no admission slot
        channel.connected.store(true, Ordering::Relaxed);
        assert!(tx.try_send(&frame()));
    }

    #[test]
    fn test_try_send_failure_forgets_record() {
        let mut mock = MockChannel::new(true);
        mock.fail_sends = true;
        let channel = Arc::new(mock);
        let tracker = Arc::new(LatencyTracker::new(16));
        let tx = FrameTransmitter::new(channel, tracker.clone(), Duration::from_millis(100));

        assert!(!tx.try_send(&frame()));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let channel = Arc::new(MockChannel::new(true));
        let tracker = Arc::new(LatencyTracker::new(16));
        let tx = FrameTransmitter::new(channel.clone(), tracker, Duration::ZERO);

        for _ in 0..50 {
            assert!(tx.try_send(&frame()));
        }
        let sent = channel.sent.lock().unwrap();
        let mut ids: Vec<String> = sent
            .iter()
            .map(|m| match m {
                ClientMessage::Frame(p) => p.request_id.clone(),
                _ => unreachable!(),
            })
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }
}
