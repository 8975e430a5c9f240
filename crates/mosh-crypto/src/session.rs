//! AES-128-OCB3 セッション実装
//!
//! mosh の Session クラスに相当する暗号セッション管理。

use alloc::vec::Vec;

use aead::KeyInit;
use aes::Aes128;
use ocb3::Ocb3;

use crate::error::CryptoError;
use crate::nonce::MoshNonce;
use crate::decode_base64_key;

/// AES-128-OCB3 (12バイト nonce, 16バイト tag) の型エイリアス
type Aes128Ocb3 = Ocb3<Aes128>;

/// 認証タグ長（バイト）
const TAG_LEN: usize = 16;

/// シール時に平文へ加わるバイト数（nonce 後半 8 バイト + 認証タグ 16 バイト）
pub const SEALED_OVERHEAD: usize = MoshNonce::TAIL_LEN + TAG_LEN;

/// AES-128-OCB3 暗号セッション
///
/// mosh プロトコルのパケット暗号化/復号を担当する。nonce はトランスポート層が
/// 組み立てた 64 ビット値（direction ビット + シーケンス番号）をそのまま受け取る。
/// nonce の一意性の保証（方向ごとの単調増加）は呼び出し側の責任。
pub struct CryptoSession {
    cipher: Aes128Ocb3,
}

impl CryptoSession {
    /// mosh-server が出力する Base64 鍵（22文字）からセッションを初期化する
    ///
    /// # 引数
    /// - `key_b64`: Base64 エンコードされた 16 バイト鍵（例: "4NeCCgvZFe2RnPgrcU1PQw"）
    ///
    /// # エラー
    /// - `CryptoError::InvalidBase64`: Base64 デコード失敗
    /// - `CryptoError::InvalidKeyLength`: 鍵長が 16 バイト以外
    pub fn from_base64_key(key_b64: &str) -> Result<Self, CryptoError> {
        let key = decode_base64_key(key_b64)?;
        Ok(Self::from_key(key))
    }

    /// 16 バイトの raw 鍵からセッションを初期化する
    pub fn from_key(key: [u8; 16]) -> Self {
        let cipher = Aes128Ocb3::new((&key).into());
        CryptoSession { cipher }
    }

    /// 平文を暗号化して UDP ペイロードを返す
    ///
    /// ## UDP ペイロード構造
    /// ```text
    /// [nonce_tail: 8bytes][ciphertext_with_tag: variable]
    /// ```
    ///
    /// # 引数
    /// - `nonce`: direction_seq（bit 63 = 方向、bit 62..0 = シーケンス番号）
    /// - `plaintext`: 暗号化する平文（トランスポート層のヘッダー + ペイロード）
    pub fn encrypt(&self, nonce: u64, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = MoshNonce::new(nonce);

        use aead::Aead;
        let ciphertext = self
            .cipher
            .encrypt(nonce.as_bytes().into(), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        // UDP ペイロードの組み立て: nonce後半8バイト + 暗号文
        let mut coded = Vec::with_capacity(MoshNonce::TAIL_LEN + ciphertext.len());
        coded.extend_from_slice(nonce.tail_bytes());
        coded.extend_from_slice(&ciphertext);

        Ok(coded)
    }

    /// 受信した UDP ペイロードを復号する
    ///
    /// # 引数
    /// - `coded`: UDP ペイロード（nonce 後半8バイト + 暗号文）
    ///
    /// # 戻り値
    /// `(nonce, plaintext)`。nonce の解釈（方向・シーケンス番号の取り出し）は
    /// 呼び出し側が行う。
    ///
    /// # エラー
    /// - `CryptoError::PacketTooShort`: パケットが短すぎる（最低 8 + 16 = 24 バイト必要）
    /// - `CryptoError::DecryptionFailed`: 認証タグ検証失敗
    pub fn decrypt(&self, coded: &[u8]) -> Result<(u64, Vec<u8>), CryptoError> {
        // 最低: nonce_tail(8) + empty_plaintext_with_tag(16) = 24 バイト
        if coded.len() < SEALED_OVERHEAD {
            return Err(CryptoError::PacketTooShort);
        }

        let nonce = MoshNonce::from_coded_prefix(coded).ok_or(CryptoError::PacketTooShort)?;
        let ciphertext = &coded[MoshNonce::TAIL_LEN..];

        use aead::Aead;
        let plaintext = self
            .cipher
            .decrypt(nonce.as_bytes().into(), ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        Ok((nonce.val(), plaintext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Direction;

    fn make_session() -> CryptoSession {
        CryptoSession::from_key([0u8; 16])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let session = make_session();
        let plaintext = b"Hello, mosh!";
        let nonce = Direction::ToServer.apply_to_seq(7);

        let coded = session.encrypt(nonce, plaintext).unwrap();

        // 復号には同じ鍵の別セッションを使う
        let recv_session = make_session();
        let (recovered_nonce, recovered) = recv_session.decrypt(&coded).unwrap();

        assert_eq!(recovered_nonce, nonce);
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_nonce_direction_bit_survives() {
        let session = make_session();
        let nonce = Direction::ToClient.apply_to_seq(99);

        let coded = session.encrypt(nonce, b"x").unwrap();
        let (recovered_nonce, _) = session.decrypt(&coded).unwrap();

        assert_eq!(Direction::from_seq(recovered_nonce), Direction::ToClient);
        assert_eq!(recovered_nonce & !(1u64 << 63), 99);
    }

    #[test]
    fn test_sealed_overhead() {
        let session = make_session();
        let coded = session.encrypt(0, b"four").unwrap();
        assert_eq!(coded.len(), 4 + SEALED_OVERHEAD);
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let send_session = make_session();
        let coded = send_session.encrypt(0, b"secret").unwrap();

        // 異なる鍵で復号 → 失敗すべき
        let recv_session = CryptoSession::from_key([0xFFu8; 16]);
        let result = recv_session.decrypt(&coded);
        assert_eq!(result, Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_decrypt_too_short_fails() {
        let session = make_session();
        let result = session.decrypt(&[0u8; 10]);
        assert_eq!(result, Err(CryptoError::PacketTooShort));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let session = make_session();
        let mut coded = session.encrypt(3, b"integrity").unwrap();
        let last = coded.len() - 1;
        coded[last] ^= 0x01;
        assert_eq!(session.decrypt(&coded), Err(CryptoError::DecryptionFailed));
    }

    #[test]
    fn test_from_base64_key() {
        // 16 zero bytes → base64url = "AAAAAAAAAAAAAAAAAAAAAA"
        let session = CryptoSession::from_base64_key("AAAAAAAAAAAAAAAAAAAAAA");
        assert!(session.is_ok());
    }
}
