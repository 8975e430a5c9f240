//! 16 ビットタイムスタンプと「凍結」クロック
//!
//! mosh はミリ秒単位の時刻の下位 16 ビットをタイムスタンプとして使用する。
//! RTT 計算のために送信側のタイムスタンプを受信側がエコーバックする。
//! 約 65.5 秒で一周するため、すべての演算は mod 2^16 で行う。

use std::time::Instant;

/// イベントループが所有する「凍結」単調クロック
///
/// `tick()` でスナップショットを更新し、`now()` はスナップショットを返す。
/// 一回のループ内のすべての判断（RTT 計算・タイムスタンプ保存・ローミング）が
/// 同じ時刻を観測することが、RTT の再現性の前提になる。
#[derive(Debug)]
pub struct Clock {
    origin: Instant,
    frozen_ms: u64,
}

impl Clock {
    /// 新しいクロックを生成する。スナップショットは 0 ms から始まる
    pub fn new() -> Self {
        Clock {
            origin: Instant::now(),
            frozen_ms: 0,
        }
    }

    /// スナップショットを現在時刻へ更新し、その値を返す
    ///
    /// イベントループの各周回の先頭で一度だけ呼び出すこと。
    pub fn tick(&mut self) -> u64 {
        self.frozen_ms = self.origin.elapsed().as_millis() as u64;
        self.frozen_ms
    }

    /// 最後の `tick()` 時点のミリ秒カウンタを返す
    pub fn now(&self) -> u64 {
        self.frozen_ms
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// mosh パケットのタイムスタンプ（16ビット、ミリ秒の下位16ビット）
///
/// `0xFFFF` は「不在」を表すセンチネルで、実タイムスタンプとしては決して生成されない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp16(u16);

impl Timestamp16 {
    /// 「不在」を表す特殊値
    pub const ABSENT: Self = Timestamp16(u16::MAX);

    /// ミリ秒カウンタから Timestamp16 を生成する
    ///
    /// 下位 16 ビットがセンチネル `0xFFFF` に一致した場合は 1 進める
    /// （ラップして 0 になる）。これにより実タイムスタンプが「不在」と
    /// 混同されることはない。
    pub fn from_ms(now_ms: u64) -> Self {
        let ts = (now_ms & 0xFFFF) as u16;
        if ts == u16::MAX {
            Timestamp16(ts.wrapping_add(1))
        } else {
            Timestamp16(ts)
        }
    }

    /// 2 つのタイムスタンプの差を計算する（newer - older, mod 2^16）
    ///
    /// 結果は常に `[0, 65535]` の範囲。
    pub fn diff(newer: Self, older: Self) -> u16 {
        newer.0.wrapping_sub(older.0)
    }

    /// 保持時間ぶんだけ進めたタイムスタンプを返す（mod 2^16）
    ///
    /// 受信したタイムスタンプをエコーバックするとき、ローカルで保持していた
    /// 時間を補正するために使う。
    pub fn advance(&self, held_ms: u64) -> Self {
        Timestamp16(self.0.wrapping_add(held_ms as u16))
    }

    /// 生の u16 値を返す
    pub fn raw(&self) -> u16 {
        self.0
    }

    /// センチネル（不在）かどうか
    pub fn is_absent(&self) -> bool {
        self.0 == u16::MAX
    }
}

impl From<u16> for Timestamp16 {
    fn from(val: u16) -> Self {
        Timestamp16(val)
    }
}
