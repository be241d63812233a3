//! Pose sender: drives a synthetic pose stream through the stabilizer and the
//! rate-limited transmitter, and prints per-second feedback statistics.
//!
//! Stands in for the pose-detection collaborator during development; swap
//! `synthetic_pose` for a real landmark source to drive a live stream.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pose_relay::channel::{FrameChannel, SocketChannel};
use pose_relay::config::Config;
use pose_relay::landmark::{Landmark, LandmarkIndex};
use pose_relay::protocol::ServerMessage;
use pose_relay::session::Session;
use pose_relay::similarity;

const CONFIG_PATH: &str = "config.toml";
const FRAME_INTERVAL: Duration = Duration::from_millis(33); // ~30fps producer

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::load_or_default(CONFIG_PATH);

    println!("Pose Sender ({})", env!("GIT_VERSION"));
    println!("Server: {}", config.server.addr);
    println!(
        "Send cap: {}ms  TTL: {}s",
        config.transmit.min_interval_ms,
        config.latency.ttl_ms / 1000.0
    );
    println!(
        "Filter: user(min_cutoff={}, beta={})  guideline(beta={})  dead_zone={}",
        config.filter.user.min_cutoff,
        config.filter.user.beta,
        config.filter.guideline.beta,
        config.stabilizer.dead_zone
    );
    println!();

    let (channel, mut feedback_rx) = SocketChannel::connect(&config.server.addr).await?;
    println!("Connected");
    let channel = Arc::new(channel);
    let mut session = Session::start(channel.clone(), &config);

    let started = Instant::now();
    let mut fps_timer = Instant::now();
    let mut frame_count = 0u32;
    let mut sent_count = 0u32;
    let mut matched_count = 0u32;
    let mut unmatched_count = 0u32;
    let mut latest_user: Vec<Landmark> = Vec::new();
    let mut latest_guideline: Vec<Landmark> = Vec::new();

    loop {
        let t = started.elapsed().as_secs_f64();

        let frame = synthetic_pose(t);
        let (stabilized, sent) = session.process_frame(&frame, t);
        latest_user = stabilized;
        frame_count += 1;
        if sent {
            sent_count += 1;
        }

        while let Ok(msg) = feedback_rx.try_recv() {
            match msg {
                ServerMessage::Ready => println!("Server ready"),
                ServerMessage::Feedback(payload) => {
                    let feedback = session.handle_feedback(&payload, t);
                    if feedback.round_trip_ms.is_some() {
                        matched_count += 1;
                    } else {
                        unmatched_count += 1;
                    }
                    latest_guideline = feedback.guideline;
                }
            }
        }

        if !channel.is_connected() {
            println!("Connection lost");
            break;
        }

        // ログ（1秒に1回）
        if fps_timer.elapsed() >= Duration::from_secs(1) {
            let divergence = similarity::score(&latest_user, &latest_guideline);
            match session.stats() {
                Some(stats) => println!(
                    "FPS: {} (sent: {}, matched: {}, unmatched: {}) | divergence {:.3} | rtt mean {:.1}ms  p95 {:.1}ms  pending {}",
                    frame_count,
                    sent_count,
                    matched_count,
                    unmatched_count,
                    divergence,
                    stats.mean,
                    stats.p95,
                    session.tracker().pending_count()
                ),
                None => println!(
                    "FPS: {} (sent: {}) | no feedback yet",
                    frame_count, sent_count
                ),
            }
            frame_count = 0;
            sent_count = 0;
            matched_count = 0;
            unmatched_count = 0;
            fps_timer = Instant::now();
        }

        tokio::time::sleep(FRAME_INTERVAL).await;
    }

    session.shutdown();
    channel.close();
    println!("Shutting down...");
    Ok(())
}

/// Standing pose with slow sway plus sub-dead-zone sensor jitter, so both
/// filter paths (suppression and tracking) get exercised.
fn synthetic_pose(t: f64) -> Vec<Landmark> {
    let sway = ((t * 0.8).sin() * 0.05) as f32;
    let bob = ((t * 1.7).sin() * 0.02) as f32;

    (0..LandmarkIndex::COUNT as u32)
        .map(|id| {
            let (bx, by) = base_position(id);
            // deterministic per-channel jitter, mostly below the dead zone
            let jx = ((t * 91.0 + id as f64 * 3.1).sin() * 0.0015) as f32;
            let jy = ((t * 83.0 + id as f64 * 5.7).sin() * 0.0015) as f32;
            Landmark::new(id, bx + sway + jx, by + bob + jy, 0.0).with_visibility(0.95)
        })
        .collect()
}

fn base_position(id: u32) -> (f32, f32) {
    use LandmarkIndex::*;
    match LandmarkIndex::from_index(id) {
        Some(Nose) => (0.50, 0.15),
        Some(LeftShoulder) => (0.62, 0.30),
        Some(RightShoulder) => (0.38, 0.30),
        Some(LeftElbow) => (0.68, 0.42),
        Some(RightElbow) => (0.32, 0.42),
        Some(LeftWrist) => (0.70, 0.54),
        Some(RightWrist) => (0.30, 0.54),
        Some(LeftHip) => (0.57, 0.55),
        Some(RightHip) => (0.43, 0.55),
        Some(LeftKnee) => (0.57, 0.75),
        Some(RightKnee) => (0.43, 0.75),
        Some(LeftAnkle) => (0.57, 0.93),
        Some(RightAnkle) => (0.43, 0.93),
        // 顔・手指などの細部は頭部/手首の近傍にまとめる
        _ => (0.50, 0.22),
    }
}
