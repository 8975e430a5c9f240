//! mosh Nonce 実装
//!
//! ## mosh Nonce 構造（12バイト）
//! ```text
//! bytes[0..4]  = 0x00000000  (ゼロパディング)
//! bytes[4..12] = direction_seq as u64, big-endian
//! ```
//!
//! UDP ペイロードには nonce の後半 8 バイト（bytes[4..12]）のみ送信する
//! （先頭 4 バイトは常にゼロなので省略）。
//! direction_seq の解釈（bit 63 = 方向、残りがシーケンス番号）は
//! トランスポート層が行う。このクレートでは不透明な u64 として扱う。

/// mosh プロトコルの Nonce（12バイト）
///
/// direction_seq から構築され、AES-128-OCB3 の nonce として使用される。
/// 方向ごとに単調増加するシーケンス番号を載せるため、一つの鍵のもとで
/// nonce が再利用されることはない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoshNonce([u8; 12]);

impl MoshNonce {
    /// UDP ペイロードに載る nonce 後半部分の長さ（バイト）
    pub const TAIL_LEN: usize = 8;

    /// direction_seq から Nonce を構築する
    ///
    /// # 例
    /// ```
    /// use mosh_crypto::MoshNonce;
    /// let nonce = MoshNonce::new(42);
    /// assert_eq!(nonce.val(), 42);
    /// ```
    pub fn new(direction_seq: u64) -> Self {
        let mut bytes = [0u8; 12];
        // bytes[0..4] はゼロのまま（ゼロパディング）
        bytes[4..12].copy_from_slice(&direction_seq.to_be_bytes());
        MoshNonce(bytes)
    }

    /// nonce の後半 8 バイトから Nonce を復元する
    ///
    /// UDP ペイロードは nonce の先頭 4 バイト（ゼロ）を省略して送信するため、
    /// 受信側は 8 バイトを受け取り、先頭 4 バイトをゼロ埋めして復元する。
    pub fn from_tail(tail: &[u8; 8]) -> Self {
        let mut bytes = [0u8; 12];
        bytes[4..12].copy_from_slice(tail);
        MoshNonce(bytes)
    }

    /// 受信パケットの先頭 8 バイトから Nonce を復元する（スライス版）
    pub fn from_coded_prefix(bytes: &[u8]) -> Option<Self> {
        let tail: [u8; 8] = bytes.get(0..Self::TAIL_LEN)?.try_into().ok()?;
        Some(Self::from_tail(&tail))
    }

    /// direction_seq（方向ビットを含む 64 ビット値）を取得する
    pub fn val(&self) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[4..12]);
        u64::from_be_bytes(buf)
    }

    /// 12 バイトの nonce データへの参照を返す
    /// AES-OCB3 の nonce 引数として使用する
    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// UDP ペイロードに埋め込む 8 バイト（nonce の後半）
    pub fn tail_bytes(&self) -> &[u8] {
        &self.0[4..12]
    }
}
