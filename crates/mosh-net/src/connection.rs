//! UDP コネクション管理
//!
//! ソケットのライフサイクル（bind 探索・ソケットオプション）、パケットの送受信、
//! クライアントアドレスへのローミング追従、RTT 推定を担当する。
//!
//! ## 並行性
//!
//! シングルスレッド・協調前提。一つの `Connection` が一つのソケットを所有し、
//! 再入は想定しない。ブロックしうるのは `recv` のみで、readiness の多重化
//! （select / poll）は呼び出し側の責任。`fd()` がそのための記述子を返す。
//!
//! ## 時刻
//!
//! すべての判断は所有する凍結クロックのスナップショットを観測する。
//! イベントループは各周回の先頭で `tick()` を呼ぶこと。

use std::io;
use std::mem;
use std::net::UdpSocket;
use std::os::fd::{AsRawFd, RawFd};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{error, info};

use mosh_crypto::{encode_base64_key, CryptoSession, Direction};

use crate::addr::Endpoint;
use crate::error::NetworkError;
use crate::packet::Packet;
use crate::timestamp::{Clock, Timestamp16};
use crate::{MAX_RTO, MIN_RTO, PORT_RANGE_HIGH, PORT_RANGE_LOW, RECEIVE_MTU, SEND_MTU};

/// RTT 推定の平滑化係数（RFC 6298: alpha = 1/8）
const SRTT_ALPHA: f64 = 1.0 / 8.0;

/// RTT 分散の平滑化係数（RFC 6298: beta = 1/4）
const RTTVAR_BETA: f64 = 1.0 / 4.0;

/// これ以上古い受信タイムスタンプはエコーバックしない（ミリ秒）
const ECHO_TIMEOUT_MS: u64 = 1000;

/// これ以上大きい RTT サンプルは捨てる（ミリ秒）。
/// 相手プロセスが長時間停止していた場合（Ctrl-Z など）の異常値対策
const RTT_SAMPLE_CEILING_MS: u16 = 5000;

/// 暗号化 UDP コネクション
///
/// サーバー（`server` コンストラクタ）とクライアント（`client` コンストラクタ）の
/// 両側で同じ型を使う。サーバーは `TO_CLIENT` 方向で送信し、シーケンス順の
/// パケットを受け取るたびにクライアントの最新ソースアドレスへ追従する。
pub struct Connection {
    sock: UdpSocket,
    clock: Clock,

    /// 相手のエンドポイント。サーバーでは最初のパケット受信まで bind アドレスが入る
    remote_addr: Endpoint,
    has_remote_addr: bool,
    server: bool,
    mtu: usize,

    key: [u8; 16],
    session: CryptoSession,
    direction: Direction,
    next_seq: u64,

    /// エコーバック待ちの受信タイムスタンプとその受信時刻
    saved_timestamp: Option<Timestamp16>,
    saved_timestamp_received_at: u64,

    /// この値未満のシーケンス番号はタイムスタンプ・ローミングに影響しない
    expected_receiver_seq: u64,

    rtt_hit: bool,
    srtt: f64,
    rttvar: f64,

    /// 最後の sendto の失敗（成功でクリアされる）
    send_error: Option<NetworkError>,
}

impl Connection {
    /// サーバー側コネクションを構築する
    ///
    /// ランダムな 16 バイト鍵を生成し、`desired_ip` / `desired_port` の指定に
    /// 従って bind する。鍵は `key_base64()` で取り出してクライアントへ渡す。
    ///
    /// # 引数
    /// - `desired_ip`: bind したいローカル IP（数値アドレス）。マルチホームの
    ///   サーバーでラッパーが指定してくる。bind できなければワイルドカードへ
    ///   フォールバックする
    /// - `desired_port`: bind したいポート。指定時はそのポートのみ試す。
    ///   省略時は `PORT_RANGE_LOW..=PORT_RANGE_HIGH` を昇順に探索する
    ///
    /// # エラー
    /// - `NetworkError::BindFailed`: フォールバック先でも bind できなかった（致命的）
    pub fn server(
        desired_ip: Option<&str>,
        desired_port: Option<u16>,
    ) -> Result<Self, NetworkError> {
        let mut key = [0u8; 16];
        OsRng.fill_bytes(&mut key);
        Self::server_with_key(key, desired_ip, desired_port)
    }

    /// 鍵を指定してサーバー側コネクションを構築する
    pub fn server_with_key(
        key: [u8; 16],
        desired_ip: Option<&str>,
        desired_port: Option<u16>,
    ) -> Result<Self, NetworkError> {
        // まず指定 IP への bind を試す。解決失敗・bind 失敗はどちらも
        // 黙ってワイルドカードへのフォールスルーになる
        if let Some(ip) = desired_ip {
            if let Ok(local) = Endpoint::resolve(ip, desired_port.unwrap_or(0)) {
                if let Ok((sock, bound)) = try_bind(local) {
                    return Ok(Self::new(sock, bound, true, key));
                }
            }
        }

        // ワイルドカードで再試行。ここでの失敗は致命的
        let mut local = Endpoint::bind_any();
        if let Some(port) = desired_port {
            local.set_port(port);
        }
        let (sock, bound) = try_bind(local)?;
        Ok(Self::new(sock, bound, true, key))
    }

    /// クライアント側コネクションを構築する
    ///
    /// # 引数
    /// - `key_b64`: サーバーが表示した Base64 鍵（22文字）
    /// - `ip`: サーバーの数値アドレス
    /// - `port`: サーバーのポート
    ///
    /// クライアントは特定のローカルポートには bind しない（同一ファミリーの
    /// ワイルドカード・ポート 0 でソケットを開く）。
    pub fn client(key_b64: &str, ip: &str, port: u16) -> Result<Self, NetworkError> {
        let key = mosh_crypto::decode_base64_key(key_b64)?;

        let remote = Endpoint::resolve(ip, port)?;
        let local = remote.wildcard_same_family();
        let sock =
            UdpSocket::bind(local.socket_addr()).map_err(NetworkError::SocketFailed)?;
        setup_socket(&sock, local.is_ipv6())?;

        let mut conn = Self::new(sock, remote, false, key);
        conn.has_remote_addr = true;
        Ok(conn)
    }

    fn new(sock: UdpSocket, remote_addr: Endpoint, server: bool, key: [u8; 16]) -> Self {
        let mut clock = Clock::new();
        clock.tick();

        Connection {
            sock,
            clock,
            remote_addr,
            has_remote_addr: false,
            server,
            mtu: SEND_MTU,
            key,
            session: CryptoSession::from_key(key),
            direction: if server {
                Direction::ToClient
            } else {
                Direction::ToServer
            },
            next_seq: 0,
            saved_timestamp: None,
            saved_timestamp_received_at: 0,
            expected_receiver_seq: 0,
            rtt_hit: false,
            srtt: 1000.0,
            rttvar: 500.0,
            send_error: None,
        }
    }

    /// ペイロードからシーケンス番号・タイムスタンプ入りのパケットを組み立てる
    fn new_packet(&mut self, payload: Vec<u8>) -> Packet {
        let now = self.clock.now();

        let mut outgoing_timestamp_reply = Timestamp16::ABSENT;
        if let Some(saved) = self.saved_timestamp {
            if now - self.saved_timestamp_received_at < ECHO_TIMEOUT_MS {
                // ローカルで保持していた時間だけ進めた「補正済み」タイムスタンプを返す
                outgoing_timestamp_reply =
                    saved.advance(now - self.saved_timestamp_received_at);
                self.saved_timestamp = None;
                self.saved_timestamp_received_at = 0;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        Packet::new(
            seq,
            self.direction,
            Timestamp16::from_ms(now),
            outgoing_timestamp_reply,
            payload,
        )
    }

    /// ペイロードを暗号化して相手へ送信する
    ///
    /// sendto の失敗は raise せず `send_error` に保持する。UDP では送信の成功と
    /// パケットの到達に相関がないため、上位層の制御フローを変えない。
    ///
    /// # エラー
    /// - `NetworkError::Crypto`: 暗号化の失敗（構造的なエラーのみ）
    pub fn send(&mut self, payload: &[u8]) -> Result<(), NetworkError> {
        debug_assert!(self.has_remote_addr);

        let px = self.new_packet(payload.to_vec());
        let coded = px.encode(&self.session)?;

        match self.sock.send_to(&coded, self.remote_addr.socket_addr()) {
            Ok(n) if n == coded.len() => {
                self.send_error = None;
            }
            Ok(n) => {
                self.send_error = Some(NetworkError::SendFailed(io::Error::new(
                    io::ErrorKind::Other,
                    format!("short send: {} of {} bytes", n, coded.len()),
                )));
            }
            Err(e) => {
                self.send_error = Some(NetworkError::SendFailed(e));
            }
        }

        Ok(())
    }

    /// データグラムを一つ受信してペイロードを返す
    ///
    /// シーケンス番号が期待値以上のパケットだけがタイムスタンプ・RTT・相手
    /// アドレスを更新できる。リプレイされたパケットでこれらを書き換えられない
    /// ための安全要件。ただしペイロード自体は順序が前後していても重複していても
    /// 呼び出し側へ返す（順序づけは上位層の仕事）。
    ///
    /// # エラー
    /// - `NetworkError::RecvFailed`: recvfrom の失敗（構造的）
    /// - `NetworkError::OversizedDatagram`: `RECEIVE_MTU` 超過（構造的）
    /// - `is_transient()` が真のエラー: このデータグラムだけ捨てて続行してよい
    pub fn recv(&mut self) -> Result<Vec<u8>, NetworkError> {
        // バッファを 1 バイト大きく取ることで、カーネルに切り詰められた
        // 超過データグラムを長さで検出できる
        let mut buf = [0u8; RECEIVE_MTU + 1];
        let (received_len, source) = self
            .sock
            .recv_from(&mut buf)
            .map_err(NetworkError::RecvFailed)?;

        if received_len > RECEIVE_MTU {
            return Err(NetworkError::OversizedDatagram {
                size: received_len,
                limit: RECEIVE_MTU,
            });
        }

        let p = Packet::decode(&buf[..received_len], &self.session)?;

        // 自分の送信方向と同じ方向のパケットは悪意ある折り返しの可能性がある
        if p.direction == self.direction {
            return Err(NetworkError::DirectionMismatch);
        }

        if p.seq >= self.expected_receiver_seq {
            self.expected_receiver_seq = p.seq + 1;

            if !p.timestamp.is_absent() {
                self.saved_timestamp = Some(p.timestamp);
                self.saved_timestamp_received_at = self.clock.now();
            }

            if !p.timestamp_reply.is_absent() {
                let now16 = Timestamp16::from_ms(self.clock.now());
                let r = Timestamp16::diff(now16, p.timestamp_reply);

                if r < RTT_SAMPLE_CEILING_MS {
                    self.update_rtt(r as f64);
                }
            }

            self.has_remote_addr = true;

            // ローミング: クライアントだけがアドレスを変えられる。サーバーは
            // シーケンス順の正規パケットのソースアドレスへ追従する
            if self.server {
                let source = Endpoint::from(source);
                if source != self.remote_addr {
                    self.remote_addr = source;
                    info!("server now attached to client at {}", self.remote_addr);
                }
            }
        }

        // 順序が前後したパケットや重複パケットもペイロードは返す
        Ok(p.payload)
    }

    /// RFC 6298 の指数移動平均で RTT 推定を更新する
    fn update_rtt(&mut self, r: f64) {
        if !self.rtt_hit {
            // 初回サンプル
            self.srtt = r;
            self.rttvar = r / 2.0;
            self.rtt_hit = true;
        } else {
            self.rttvar = (1.0 - RTTVAR_BETA) * self.rttvar + RTTVAR_BETA * (self.srtt - r).abs();
            self.srtt = (1.0 - SRTT_ALPHA) * self.srtt + SRTT_ALPHA * r;
        }
    }

    /// 再送タイムアウトの advisory 値（ミリ秒）を返す
    ///
    /// `ceil(SRTT + 4 * RTTVAR)` を `[MIN_RTO, MAX_RTO]` に丸めた値。
    /// このレイヤー自体は再送しない。
    pub fn timeout(&self) -> u64 {
        ((self.srtt + 4.0 * self.rttvar).ceil() as u64).clamp(MIN_RTO, MAX_RTO)
    }

    /// クロックのスナップショットを更新し、新しいミリ秒カウンタを返す
    ///
    /// イベントループの各周回の先頭で呼び出すこと。
    pub fn tick(&mut self) -> u64 {
        self.clock.tick()
    }

    /// bind されたローカルポートを返す
    pub fn port(&self) -> Result<u16, NetworkError> {
        self.sock
            .local_addr()
            .map(|a| a.port())
            .map_err(NetworkError::SocketFailed)
    }

    /// readiness 多重化（select / poll）用の raw ファイル記述子
    pub fn fd(&self) -> RawFd {
        self.sock.as_raw_fd()
    }

    /// `recv` のブロック時間を制限する（`None` で無制限に戻す）
    ///
    /// readiness 多重化を使わない単純なホスト向け。
    pub fn set_read_timeout(
        &self,
        timeout: Option<std::time::Duration>,
    ) -> Result<(), NetworkError> {
        self.sock
            .set_read_timeout(timeout)
            .map_err(NetworkError::SocketFailed)
    }

    /// 相手のアドレスを学習済みか
    pub fn has_remote_addr(&self) -> bool {
        self.has_remote_addr
    }

    /// 現在の相手エンドポイント
    pub fn remote_addr(&self) -> Endpoint {
        self.remote_addr
    }

    /// 最後の送信エラー（成功でクリアされる）
    pub fn send_error(&self) -> Option<&NetworkError> {
        self.send_error.as_ref()
    }

    /// 平滑化 RTT（ミリ秒）
    pub fn srtt(&self) -> f64 {
        self.srtt
    }

    /// セッション鍵を Base64（22文字）で返す
    pub fn key_base64(&self) -> String {
        encode_base64_key(&self.key)
    }

    /// 送信データグラムの最大サイズ（バイト）
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// 次の送信シーケンス番号を返す（テスト用）
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// 受信側が期待する最小シーケンス番号を返す（テスト用）
    pub fn expected_receiver_seq(&self) -> u64 {
        self.expected_receiver_seq
    }

    /// RTT サンプルを一度でも観測したか（テスト用）
    pub fn rtt_hit(&self) -> bool {
        self.rtt_hit
    }

    /// エコーバック待ちの受信タイムスタンプを返す（テスト用）
    pub fn saved_timestamp(&self) -> Option<u16> {
        self.saved_timestamp.map(|t| t.raw())
    }
}

/// エンドポイントへの bind を試みる
///
/// ポートが指定されていればそのポートのみ、0 なら
/// `PORT_RANGE_LOW..=PORT_RANGE_HIGH` を昇順に探索し、最初に成功した
/// ソケットを返す。`UdpSocket::bind` はソケット作成と bind を兼ねるため、
/// 失敗した試行の記述子はその場で閉じられ、ファミリーをまたいでも
/// 記述子はリークしない。
fn try_bind(local: Endpoint) -> Result<(UdpSocket, Endpoint), NetworkError> {
    let (search_low, search_high) = match local.port() {
        0 => (PORT_RANGE_LOW, PORT_RANGE_HIGH),
        p => (p, p),
    };

    let mut addr = local;
    let mut last_err: Option<io::Error> = None;

    for port in search_low..=search_high {
        addr.set_port(port);
        match UdpSocket::bind(addr.socket_addr()) {
            Ok(sock) => {
                setup_socket(&sock, addr.is_ipv6())?;
                return Ok((sock, addr));
            }
            Err(e) => last_err = Some(e),
        }
    }

    let err = last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no candidate ports"));
    error!("failed binding to {}:{} : {}", addr.address(), search_high, err);
    Err(NetworkError::BindFailed(err))
}

/// データグラムソケットの共通オプションを設定する
///
/// - Path MTU discovery を無効化（カーネルに DF ビットを立てさせない）。
///   対応 OS でこの設定に失敗した場合は致命的
/// - diffserv 値を AF42 + ECT(0) に設定。QoS マーキングは advisory なので
///   失敗しても無視する
fn setup_socket(sock: &UdpSocket, v6: bool) -> Result<(), NetworkError> {
    let fd = sock.as_raw_fd();

    #[cfg(target_os = "linux")]
    {
        let flag: libc::c_int = libc::IP_PMTUDISC_DONT;
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::IPPROTO_IP,
                libc::IP_MTU_DISCOVER,
                &flag as *const _ as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(NetworkError::SetsockoptFailed(io::Error::last_os_error()));
        }
    }

    // AF42 (DSCP 36) | ECT(0)
    let dscp: libc::c_int = 0x92;
    let (level, option) = if v6 {
        (libc::IPPROTO_IPV6, libc::IPV6_TCLASS)
    } else {
        (libc::IPPROTO_IP, libc::IP_TOS)
    };
    unsafe {
        let _ = libc::setsockopt(
            fd,
            level,
            option,
            &dscp as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }

    Ok(())
}
