//! TCP protocol for pose-sender ↔ feedback-server communication.
//!
//! Messages are bincode inside length-delimited frames. The `request_id`
//! of a frame round-trips unmodified in the matching feedback message.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::landmark::Landmark;

// --- Message types ---

/// Sender → Server
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientMessage {
    Frame(FramePayload),
    /// 比較対象のガイドラインを切り替える
    SelectGuideline { name: String },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FramePayload {
    /// 往復で変更されない相関ID
    pub request_id: String,
    /// 送信時刻（エポックミリ秒）
    pub timestamp_ms: u64,
    pub landmarks: Vec<Landmark>,
}

/// Server → Sender
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ServerMessage {
    Ready,
    Feedback(FeedbackPayload),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FeedbackPayload {
    /// 対応するフレームの相関ID（そのまま返す）
    pub request_id: String,
    /// ガイドラインポーズ
    pub landmarks: Vec<Landmark>,
    /// 姿勢乖離スコア（0で完全一致）
    pub score: f32,
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(1024 * 1024) // 1MB, a frame is only 33 landmarks
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}
