//! Feedback server: receives stabilized pose frames over TCP, scores each one
//! against the selected guideline pose, and replies with the guideline
//! landmarks plus the divergence score. The frame's correlation id is echoed
//! back unmodified.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};

use pose_relay::config::Config;
use pose_relay::landmark::{Landmark, LandmarkIndex};
use pose_relay::protocol::{self, ClientMessage, FeedbackPayload, ServerMessage};
use pose_relay::similarity;

const CONFIG_PATH: &str = "config.toml";

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

type LogFile = Arc<Mutex<std::io::BufWriter<std::fs::File>>>;

fn open_log_file() -> Result<LogFile> {
    std::fs::create_dir_all("logs")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("logs/feedback_{}.log", ts);
    let file = std::fs::File::create(&path)?;
    eprintln!("Log: {}", path);
    Ok(Arc::new(Mutex::new(std::io::BufWriter::new(file))))
}

macro_rules! log {
    ($logfile:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        eprintln!("{}", msg);
        if let Ok(mut f) = $logfile.lock() {
            let _ = writeln!(f, "{}", msg);
            let _ = f.flush();
        }
    }};
}

// ---------------------------------------------------------------------------
// Guideline poses
// ---------------------------------------------------------------------------

/// 正規化座標によるざっくりした基準姿勢
fn guideline_pose(name: &str) -> Vec<Landmark> {
    use LandmarkIndex::*;
    let hip_y: f32 = if name == "squat" { 0.72 } else { 0.55 };
    let knee_y: f32 = if name == "squat" { 0.80 } else { 0.75 };

    (0..LandmarkIndex::COUNT as u32)
        .map(|id| {
            let (x, y) = match LandmarkIndex::from_index(id) {
                Some(Nose) => (0.50, 0.15),
                Some(LeftShoulder) => (0.62, 0.30),
                Some(RightShoulder) => (0.38, 0.30),
                // Tポーズ: 腕は横に伸ばす
                Some(LeftElbow) => (0.76, 0.30),
                Some(RightElbow) => (0.24, 0.30),
                Some(LeftWrist) => (0.90, 0.30),
                Some(RightWrist) => (0.10, 0.30),
                Some(LeftHip) => (0.57, hip_y),
                Some(RightHip) => (0.43, hip_y),
                Some(LeftKnee) => (0.57, knee_y),
                Some(RightKnee) => (0.43, knee_y),
                Some(LeftAnkle) => (0.57, 0.93),
                Some(RightAnkle) => (0.43, 0.93),
                _ => (0.50, 0.22),
            };
            Landmark::new(id, x, y, 0.0).with_visibility(1.0)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    let logfile = open_log_file()?;

    log!(logfile, "Feedback Server ({})", env!("GIT_VERSION"));
    log!(logfile, "Listening on {}", config.server.listen_addr);

    let listener = TcpListener::bind(&config.server.listen_addr).await?;

    loop {
        let (stream, peer) = listener.accept().await?;
        log!(logfile, "client connected: {}", peer);
        let client_log = Arc::clone(&logfile);
        tokio::spawn(async move {
            match handle_client(stream, &client_log).await {
                Ok(frames) => log!(client_log, "client {} done ({} frames)", peer, frames),
                Err(e) => log!(client_log, "client {} error: {}", peer, e),
            }
        });
    }
}

async fn handle_client(stream: TcpStream, logfile: &LogFile) -> Result<u64> {
    let mut stream = protocol::message_stream(stream);
    protocol::send_message(&mut stream, &ServerMessage::Ready).await?;

    let mut guideline = guideline_pose("t_pose");
    let mut processed = 0u64;
    let mut report_count = 0u64;
    let mut report_timer = Instant::now();

    loop {
        let msg: ClientMessage = match protocol::recv_message(&mut stream).await {
            Ok(msg) => msg,
            Err(_) => break, // disconnect
        };

        match msg {
            ClientMessage::Frame(payload) => {
                let score = similarity::score(&payload.landmarks, &guideline);
                let reply = ServerMessage::Feedback(FeedbackPayload {
                    request_id: payload.request_id,
                    landmarks: guideline.clone(),
                    score,
                });
                protocol::send_message(&mut stream, &reply).await?;
                processed += 1;
                report_count += 1;

                if report_timer.elapsed() >= Duration::from_secs(10) {
                    log!(
                        logfile,
                        "{:.1} frames/s, last score {:.3}",
                        report_count as f64 / report_timer.elapsed().as_secs_f64(),
                        score
                    );
                    report_count = 0;
                    report_timer = Instant::now();
                }
            }
            ClientMessage::SelectGuideline { name } => {
                guideline = guideline_pose(&name);
                log!(logfile, "guideline -> {}", name);
            }
        }
    }

    Ok(processed)
}
