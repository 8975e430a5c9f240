//! # mosh-crypto
//!
//! AES-128-OCB3 暗号プリミティブ実装
//!
//! mosh プロトコルのパケット暗号化に使われる AES-128-OCB3 を実装するクレート。
//! `no_std` + `alloc` 環境で動作する。
//!
//! トランスポート層（`mosh-net`）からはシールドボックスとして扱われる：
//! 64 ビットの nonce と平文を渡して暗号化し、受信側では暗号文から
//! (nonce, 平文) を復元する。nonce の意味付け（direction ビット + シーケンス番号）と
//! 平文のレイアウトはトランスポート層の責任であり、このクレートは関知しない。
//!
//! ## 暗号化仕様
//!
//! ```text
//! UDP ペイロード構造:
//!   [nonce_tail: 8bytes][ciphertext + auth_tag: variable]
//!
//! Nonce（12バイト）:
//!   bytes[0..4]  = 0x00000000 (ゼロパディング、送信時省略)
//!   bytes[4..12] = direction_seq as u64, big-endian
//!
//! direction_seq:
//!   bit 63       = direction (TO_SERVER=0, TO_CLIENT=1)
//!   bit 62..0    = シーケンス番号
//! ```

#![no_std]
extern crate alloc;

mod error;
mod nonce;
mod session;

pub use error::CryptoError;
pub use nonce::MoshNonce;
pub use session::{CryptoSession, SEALED_OVERHEAD};

/// mosh パケットの方向（TO_SERVER or TO_CLIENT）
///
/// nonce の bit 63 が方向を表し、鍵空間をクライアント→サーバーと
/// サーバー→クライアントの二つのストリームに分割する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// クライアント → サーバー (bit 63 = 0)
    ToServer = 0,
    /// サーバー → クライアント (bit 63 = 1)
    ToClient = 1,
}

impl Direction {
    /// direction_seq の MSB から方向を判定する
    pub fn from_seq(direction_seq: u64) -> Self {
        if direction_seq >> 63 == 0 {
            Direction::ToServer
        } else {
            Direction::ToClient
        }
    }

    /// direction をシーケンス番号の MSB に適用して direction_seq を作る
    ///
    /// seq の bit 63 は常に上書きされるため、有効なシーケンス番号は 63 ビット。
    pub fn apply_to_seq(&self, seq: u64) -> u64 {
        match self {
            Direction::ToServer => seq & !(1u64 << 63),
            Direction::ToClient => seq | (1u64 << 63),
        }
    }

    /// 反対方向を返す（受信パケットの期待方向の判定に使う）
    pub fn opposite(&self) -> Self {
        match self {
            Direction::ToServer => Direction::ToClient,
            Direction::ToClient => Direction::ToServer,
        }
    }
}

/// Base64 文字列（22文字）を 16 バイトの鍵にデコードする
///
/// mosh-server が出力するキーフォーマット: `4NeCCgvZFe2RnPgrcU1PQw`（22文字、
/// URL-safe・パディングなし）
pub fn decode_base64_key(key_b64: &str) -> Result<[u8; 16], CryptoError> {
    use base64::Engine as _;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(key_b64)
        .map_err(|_| CryptoError::InvalidBase64)?;

    if bytes.len() != 16 {
        return Err(CryptoError::InvalidKeyLength);
    }

    let mut key = [0u8; 16];
    key.copy_from_slice(&bytes);
    Ok(key)
}

/// 16 バイトの鍵を Base64 文字列（22文字）にエンコードする
///
/// サーバーが起動時に生成した鍵をクライアントへ渡すときの表示用。
/// `decode_base64_key` と往復可能。
pub fn encode_base64_key(key: &[u8; 16]) -> alloc::string::String {
    use base64::Engine as _;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_to_server() {
        let dir = Direction::from_seq(0x0000000000000001u64);
        assert_eq!(dir, Direction::ToServer);
    }

    #[test]
    fn test_direction_to_client() {
        let dir = Direction::from_seq(0x8000000000000001u64);
        assert_eq!(dir, Direction::ToClient);
    }

    #[test]
    fn test_direction_apply_to_seq() {
        let seq: u64 = 42;
        let ts = Direction::ToServer.apply_to_seq(seq);
        assert_eq!(ts >> 63, 0);
        let tc = Direction::ToClient.apply_to_seq(seq);
        assert_eq!(tc >> 63, 1);
    }

    #[test]
    fn test_direction_opposite() {
        assert_eq!(Direction::ToServer.opposite(), Direction::ToClient);
        assert_eq!(Direction::ToClient.opposite(), Direction::ToServer);
    }

    #[test]
    fn test_decode_base64_key_valid() {
        // 16バイト = 22文字（URL-safe base64 no-pad）
        let key_b64 = "AAAAAAAAAAAAAAAAAAAAAA"; // 16 zero bytes
        let key = decode_base64_key(key_b64).unwrap();
        assert_eq!(key, [0u8; 16]);
    }

    #[test]
    fn test_decode_base64_key_invalid_length() {
        let key_b64 = "AAAAAAAAAAAAAA"; // 短すぎる
        let result = decode_base64_key(key_b64);
        assert!(result.is_err());
    }

    #[test]
    fn test_base64_key_roundtrip() {
        let key = [
            0x4Eu8, 0xD7, 0x82, 0x0A, 0x0B, 0xD9, 0x15, 0xED,
            0x91, 0x9C, 0xF8, 0x2B, 0x71, 0x4D, 0x4F, 0x43,
        ];
        let encoded = encode_base64_key(&key);
        assert_eq!(encoded.len(), 22);
        assert_eq!(decode_base64_key(&encoded).unwrap(), key);
    }
}
