//! トランスポート層のエラー型
//!
//! エラーは伝播ポリシーで二分される：構造的な失敗（bind・recvfrom）は
//! 呼び出し側へ伝播し、データグラム単位の失敗（復号失敗・折り返し・不正形式）は
//! そのデータグラムだけを捨てて処理を続行する。sendto の失敗は UDP の
//! パケットロスと区別できないため、例外ではなく状態として保持される。

use std::io;

use mosh_crypto::CryptoError;
use thiserror::Error;

/// トランスポート層のエラー
#[derive(Debug, Error)]
pub enum NetworkError {
    /// エンドポイントの数値パースに失敗（DNS 名は受け付けない）
    #[error("could not resolve {0:?} (numeric host required)")]
    ResolutionFailed(String),
    /// ソケットの作成・問い合わせに失敗
    #[error("socket: {0}")]
    SocketFailed(#[source] io::Error),
    /// ソケットオプションの設定に失敗
    #[error("setsockopt: {0}")]
    SetsockoptFailed(#[source] io::Error),
    /// 候補ポートすべてへの bind に失敗
    #[error("bind: {0}")]
    BindFailed(#[source] io::Error),
    /// sendto の失敗。`Connection::send_error` に保持され、raise はされない
    #[error("sendto: {0}")]
    SendFailed(#[source] io::Error),
    /// recvfrom の失敗
    #[error("recvfrom: {0}")]
    RecvFailed(#[source] io::Error),
    /// 受信バッファを超えるデータグラム（切り詰めではなくエラーとして報告する）
    #[error("received oversize datagram (size {size}) and limit is {limit}")]
    OversizedDatagram { size: usize, limit: usize },
    /// 復号後の平文がトランスポートヘッダーより短い
    #[error("packet too short for transport header")]
    MalformedPacket,
    /// 暗号操作の失敗（認証タグ検証失敗・鍵の不正を含む）
    #[error("crypto: {0}")]
    Crypto(CryptoError),
    /// 受信パケットの方向が自分の送信方向と同じ（悪意ある折り返しの疑い）
    #[error("packet direction mismatch (possible reflection)")]
    DirectionMismatch,
}

impl From<CryptoError> for NetworkError {
    fn from(e: CryptoError) -> Self {
        NetworkError::Crypto(e)
    }
}

impl NetworkError {
    /// データグラム単位の一過性エラーかどうか
    ///
    /// `true` のエラーは対象のデータグラムを捨てるだけでよく、接続状態には
    /// 影響しない。イベントループは無視して受信を続行する。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            NetworkError::MalformedPacket
                | NetworkError::Crypto(_)
                | NetworkError::DirectionMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(NetworkError::MalformedPacket.is_transient());
        assert!(NetworkError::Crypto(CryptoError::DecryptionFailed).is_transient());
        assert!(NetworkError::DirectionMismatch.is_transient());

        let io_err = || io::Error::new(io::ErrorKind::Other, "boom");
        assert!(!NetworkError::RecvFailed(io_err()).is_transient());
        assert!(!NetworkError::BindFailed(io_err()).is_transient());
        assert!(!NetworkError::OversizedDatagram { size: 3000, limit: 2048 }.is_transient());
    }

    #[test]
    fn test_display_messages() {
        let e = NetworkError::OversizedDatagram { size: 4096, limit: 2048 };
        assert_eq!(
            e.to_string(),
            "received oversize datagram (size 4096) and limit is 2048"
        );

        let e = NetworkError::ResolutionFailed("example.com".into());
        assert!(e.to_string().contains("example.com"));
    }
}
