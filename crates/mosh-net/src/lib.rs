//! # mosh-net
//!
//! UDP データグラムトランスポートのコア実装。
//!
//! 単一の UDP ソケット上で、暗号化・リプレイ耐性つきのペイロード伝送を提供する。
//! 順序保証・再送・輻輳制御は行わない（上位の同期プロトコルの責任）。
//!
//! ## 提供する性質
//!
//! - 方向ビットで分割された単調増加 nonce による認証つきフレーミング
//! - サーバーがクライアントのアドレス変化に透過的に追従するローミング
//! - 16 ビットミリ秒タイムスタンプの相互エコーによる RTT 推定
//! - マルチホーム・ポート枯渇・v4/v6 混在に耐える bind 探索
//!
//! ## UDP データグラムの構造
//!
//! ```text
//! [nonce_tail: 8bytes][ciphertext + auth_tag: variable]
//!
//! 平文（暗号化前）:
//!   [timestamp: u16 BE][timestamp_reply: u16 BE][payload...]
//!
//! nonce (64bit):
//!   bit 63   = direction (TO_SERVER=0, TO_CLIENT=1)
//!   bit 62..0 = シーケンス番号（方向ごとに単調増加）
//! ```
//!
//! タイムスタンプの特殊値 `0xFFFF` は「不在」を表す。

pub mod addr;
pub mod connection;
pub mod error;
pub mod packet;
pub mod timestamp;

pub use addr::Endpoint;
pub use connection::Connection;
pub use error::NetworkError;
pub use packet::Packet;
pub use timestamp::{Clock, Timestamp16};

pub use mosh_crypto::Direction;

/// bind 探索範囲の下限ポート
pub const PORT_RANGE_LOW: u16 = 60001;

/// bind 探索範囲の上限ポート
pub const PORT_RANGE_HIGH: u16 = 60999;

/// 送信データグラムの最大サイズ（バイト）
/// モバイル環境向けの保守的な設定
pub const SEND_MTU: usize = 500;

/// 受信バッファのサイズ（バイト）。これを超えるデータグラムはエラーになる
pub const RECEIVE_MTU: usize = 2048;

/// 再送タイムアウト advisory の最小値（ミリ秒）
pub const MIN_RTO: u64 = 50;

/// 再送タイムアウト advisory の最大値（ミリ秒）
pub const MAX_RTO: u64 = 1000;
