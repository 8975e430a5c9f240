//! トランスポートパケットの双方向コーデック
//!
//! ## 平文レイアウト（暗号化前）
//! ```text
//! [timestamp: u16 BE][timestamp_reply: u16 BE][payload...]
//! ```
//!
//! 方向とシーケンス番号は平文には載らず、AEAD の nonce（direction_seq）として
//! 運ばれる。nonce が認証されるため、これらを改竄すると復号が失敗する。

use mosh_crypto::{CryptoSession, Direction};

use crate::error::NetworkError;
use crate::timestamp::Timestamp16;

/// トランスポートヘッダー長（timestamp:2 + timestamp_reply:2）
const HEADER_LEN: usize = 4;

/// direction ビットを除いたシーケンス番号のマスク
pub(crate) const SEQUENCE_MASK: u64 = !(1u64 << 63);

/// 平文ヘッダー + ペイロードを持つトランスポートパケット
///
/// `encode`/`decode` は `CryptoSession` に対する双方向の変換。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// シーケンス番号（63 ビット、方向ごとに単調増加）
    pub seq: u64,
    /// パケットの方向
    pub direction: Direction,
    /// 送信側の 16 ビットタイムスタンプ（`ABSENT` = 不在）
    pub timestamp: Timestamp16,
    /// エコーバックされるタイムスタンプ（保持時間補正済み、`ABSENT` = 不在）
    pub timestamp_reply: Timestamp16,
    /// 不透明なペイロードバイト列
    pub payload: Vec<u8>,
}

impl Packet {
    /// フィールドからパケットを構築する
    pub fn new(
        seq: u64,
        direction: Direction,
        timestamp: Timestamp16,
        timestamp_reply: Timestamp16,
        payload: Vec<u8>,
    ) -> Self {
        Packet {
            seq,
            direction,
            timestamp,
            timestamp_reply,
            payload,
        }
    }

    /// パケットを暗号化して UDP に載せるバイト列を返す
    pub fn encode(&self, session: &CryptoSession) -> Result<Vec<u8>, NetworkError> {
        let nonce = self.direction.apply_to_seq(self.seq);

        let mut plaintext = Vec::with_capacity(HEADER_LEN + self.payload.len());
        plaintext.extend_from_slice(&self.timestamp.raw().to_be_bytes());
        plaintext.extend_from_slice(&self.timestamp_reply.raw().to_be_bytes());
        plaintext.extend_from_slice(&self.payload);

        Ok(session.encrypt(nonce, &plaintext)?)
    }

    /// 受信した UDP ペイロードを復号してパケットに戻す
    ///
    /// # エラー
    /// - `NetworkError::Crypto`: 復号失敗（認証タグ検証失敗・短すぎる暗号文）
    /// - `NetworkError::MalformedPacket`: 平文がヘッダー長（4 バイト）未満
    ///
    /// どちらの失敗も該当データグラムを捨てるだけでよく、接続は継続する。
    pub fn decode(coded: &[u8], session: &CryptoSession) -> Result<Self, NetworkError> {
        let (nonce, plaintext) = session.decrypt(coded)?;

        if plaintext.len() < HEADER_LEN {
            return Err(NetworkError::MalformedPacket);
        }

        let direction = Direction::from_seq(nonce);
        let seq = nonce & SEQUENCE_MASK;

        let timestamp = u16::from_be_bytes([plaintext[0], plaintext[1]]).into();
        let timestamp_reply = u16::from_be_bytes([plaintext[2], plaintext[3]]).into();
        let payload = plaintext[HEADER_LEN..].to_vec();

        Ok(Packet {
            seq,
            direction,
            timestamp,
            timestamp_reply,
            payload,
        })
    }
}
