use anyhow::Result;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use pose_relay::channel::{FrameChannel, SocketChannel};
use pose_relay::config::Config;
use pose_relay::landmark::Landmark;
use pose_relay::protocol::{ClientMessage, ServerMessage};
use pose_relay::session::Session;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = Config::load_or_default(CONFIG_PATH);

    println!("=== Pose Relay - 接続テスト ===");
    println!("接続先: {}", config.server.addr);
    println!();
    println!("コマンド:");
    println!("  f x y         - 腰座標を指定して1フレーム送信 (例: f 0.5 0.55)");
    println!("  t             - テスト送信 (10フレーム連続)");
    println!("  s             - レイテンシ統計を表示");
    println!("  g name        - ガイドライン切り替え (例: g squat)");
    println!("  r             - フィルタをリセット");
    println!("  q             - 終了");
    println!();

    let (channel, mut feedback_rx) = SocketChannel::connect(&config.server.addr).await?;
    let channel = Arc::new(channel);
    let mut session = Session::start(channel.clone(), &config);
    let started = Instant::now();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let parts: Vec<&str> = input.trim().split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "f" if parts.len() == 3 => {
                let x: f32 = parts[1].parse()?;
                let y: f32 = parts[2].parse()?;
                let frame = test_frame(x, y);
                let (_, sent) = session.process_frame(&frame, started.elapsed().as_secs_f64());
                println!("{}", if sent { "送信しました" } else { "レート制限で破棄" });
            }
            "t" => {
                println!("テスト送信中...");
                for i in 0..10 {
                    let x = 0.5 + i as f32 * 0.01;
                    let frame = test_frame(x, 0.55);
                    let (_, sent) =
                        session.process_frame(&frame, started.elapsed().as_secs_f64());
                    println!("  x = {:.2} {}", x, if sent { "送信" } else { "破棄" });
                    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
                }
                println!("テスト完了");
            }
            "s" => match session.stats() {
                Some(stats) => {
                    println!(
                        "往復 {}件: min {:.1}ms  mean {:.1}ms  median {:.1}ms  p95 {:.1}ms  max {:.1}ms",
                        stats.count, stats.min, stats.mean, stats.median, stats.p95, stats.max
                    );
                    println!(
                        "未応答: {}  破棄済み: {}",
                        session.tracker().pending_count(),
                        session.tracker().evicted_total()
                    );
                }
                None => println!("まだ応答がありません"),
            },
            "g" if parts.len() == 2 => {
                channel.send(ClientMessage::SelectGuideline {
                    name: parts[1].to_string(),
                })?;
                println!("ガイドライン: {}", parts[1]);
            }
            "r" => {
                session.reset_filters();
                println!("フィルタをリセットしました");
            }
            "q" => {
                println!("終了します");
                break;
            }
            _ => {
                println!("不明なコマンド: {}", parts[0]);
            }
        }

        // 溜まっているフィードバックを処理
        while let Ok(msg) = feedback_rx.try_recv() {
            match msg {
                ServerMessage::Ready => println!("サーバー準備完了"),
                ServerMessage::Feedback(payload) => {
                    let feedback =
                        session.handle_feedback(&payload, started.elapsed().as_secs_f64());
                    match feedback.round_trip_ms {
                        Some(rtt) => {
                            println!("フィードバック: score={:.3} rtt={:.1}ms", feedback.score, rtt)
                        }
                        None => println!("フィードバック: score={:.3} (照合不能)", feedback.score),
                    }
                }
            }
        }
    }

    session.shutdown();
    channel.close();
    Ok(())
}

/// 腰だけ動かした最小限のテストフレーム
fn test_frame(hip_x: f32, hip_y: f32) -> Vec<Landmark> {
    vec![
        Landmark::new(23, hip_x, hip_y, 0.0).with_visibility(1.0),
        Landmark::new(24, hip_x - 0.14, hip_y, 0.0).with_visibility(1.0),
    ]
}
