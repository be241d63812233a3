use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transmit: TransmitConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub stabilizer: StabilizerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// 送信先アドレス（クライアント側）
    #[serde(default = "default_server_addr")]
    pub addr: String,
    /// 待ち受けアドレス（サーバー側）
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_server_addr() -> String { "127.0.0.1:9100".to_string() }
fn default_listen_addr() -> String { "0.0.0.0:9100".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransmitConfig {
    /// 最小送信間隔（ミリ秒）。超過分のフレームは破棄される
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_min_interval_ms() -> u64 { 100 }

impl Default for TransmitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LatencyConfig {
    /// 未応答レコードの生存時間（ミリ秒）
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: f64,
    /// 破棄パスの実行間隔（ミリ秒）
    #[serde(default = "default_evict_interval_ms")]
    pub evict_interval_ms: u64,
    /// 統計ウィンドウの最大サンプル数
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_ttl_ms() -> f64 { 60_000.0 }
fn default_evict_interval_ms() -> u64 { 10_000 }
fn default_window() -> usize { 240 }

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            evict_interval_ms: default_evict_interval_ms(),
            window: default_window(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StabilizerConfig {
    /// デッドゾーン幅。これ未満の座標変化は無視する
    #[serde(default = "default_dead_zone")]
    pub dead_zone: f32,
    /// 可視性のジャンプ判定閾値
    #[serde(default = "default_visibility_jump")]
    pub visibility_jump: f32,
    /// ジャンプ時に新しい値へ寄せる割合
    #[serde(default = "default_visibility_blend")]
    pub visibility_blend: f32,
}

fn default_dead_zone() -> f32 { 0.002 }
fn default_visibility_jump() -> f32 { 0.3 }
fn default_visibility_blend() -> f32 { 0.3 }

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            dead_zone: default_dead_zone(),
            visibility_jump: default_visibility_jump(),
            visibility_blend: default_visibility_blend(),
        }
    }
}

/// One Euro フィルタのパラメータ一式
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct FilterParams {
    #[serde(default = "default_min_cutoff")]
    pub min_cutoff: f32,
    #[serde(default = "default_user_beta")]
    pub beta: f32,
    #[serde(default = "default_d_cutoff")]
    pub d_cutoff: f32,
}

fn default_min_cutoff() -> f32 { 0.001 }
fn default_user_beta() -> f32 { 0.1 }
fn default_guideline_beta() -> f32 { 0.05 }
fn default_d_cutoff() -> f32 { 1.0 }

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_cutoff: default_min_cutoff(),
            beta: default_user_beta(),
            d_cutoff: default_d_cutoff(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilterConfig {
    /// 自分のポーズ用（応答性重視）
    #[serde(default)]
    pub user: FilterParams,
    /// ガイドライン表示用（滑らかさ重視）
    #[serde(default = "default_guideline_params")]
    pub guideline: FilterParams,
}

fn default_guideline_params() -> FilterParams {
    FilterParams {
        min_cutoff: default_min_cutoff(),
        beta: default_guideline_beta(),
        d_cutoff: default_d_cutoff(),
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            user: FilterParams::default(),
            guideline: default_guideline_params(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルがなければデフォルト値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(_) => Config::default(),
        }
    }
}
