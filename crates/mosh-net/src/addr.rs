//! ファミリー非依存の UDP ピアアドレス
//!
//! IPv4/IPv6 のどちらでも同じ操作（パース・比較・表示・ポート書き換え）を
//! 提供する値型。ローミングの比較対象になるため、解決は数値アドレス限定で
//! 決定的に行う（ホットパスで DNS を引かない）。

use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use crate::error::NetworkError;

/// UDP ピアのエンドポイント（アドレス + ポート）
///
/// `SocketAddr` の薄いラッパー。等価性はファミリー込みで判定されるため、
/// v4 アドレスと同じビットを持つ v4-mapped v6 アドレスは等しくならない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    /// 数値アドレス文字列からエンドポイントを解決する
    ///
    /// # 引数
    /// - `host`: `"192.0.2.1"` や `"2001:db8::1"` のような数値アドレス
    /// - `port`: ホストバイトオーダーのポート番号
    ///
    /// # エラー
    /// - `NetworkError::ResolutionFailed`: ホスト文字列が数値アドレスではない
    pub fn resolve(host: &str, port: u16) -> Result<Self, NetworkError> {
        let ip = IpAddr::from_str(host.trim())
            .map_err(|_| NetworkError::ResolutionFailed(host.into()))?;
        Ok(Endpoint(SocketAddr::new(ip, port)))
    }

    /// IPv6 ワイルドカードアドレス（`[::]:0`）を返す
    pub fn bind_any() -> Self {
        Endpoint(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0))
    }

    /// 自分と同じファミリーのワイルドカードアドレス（ポート 0）を返す
    ///
    /// クライアントのローカルソケットを開くときに使う。
    pub fn wildcard_same_family(&self) -> Self {
        let ip: IpAddr = match self.0 {
            SocketAddr::V4(_) => std::net::Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        Endpoint(SocketAddr::new(ip, 0))
    }

    /// ポート番号（ホストバイトオーダー）
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// ポート番号を書き換える（ファミリー非依存）
    pub fn set_port(&mut self, port: u16) {
        self.0.set_port(port);
    }

    /// ポートを含まない表示用アドレス文字列
    pub fn address(&self) -> String {
        self.0.ip().to_string()
    }

    /// IPv6 エンドポイントか
    pub fn is_ipv6(&self) -> bool {
        self.0.is_ipv6()
    }

    /// 内部の `SocketAddr` を返す（sendto / bind 用）
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(sa: SocketAddr) -> Self {
        Endpoint(sa)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address(), self.port())
    }
}
