//! # mosh-term
//!
//! 端末フレームバッファのデータモデル。
//!
//! エミュレータ層（エスケープシーケンスの解釈）が操作するグリッドと描画状態を
//! 提供する。`no_std` + `alloc` 環境で動作し、パースは一切行わない。
//!
//! ## 構成
//!
//! - [`Cell`] / [`Row`]: グリッドの単位。全角グリフが右隣のセルを占有する
//!   「重なり」関係を行内の列インデックスで保持する
//! - [`DrawState`]: カーソル・結合文字アンカー・タブ・スクロール領域・
//!   origin / auto-wrap モード
//! - [`Framebuffer`]: 行ベクタと `DrawState` を所有し、スクロールと
//!   重なりの管理を行う唯一の変更主体
//!
//! ## 重なりグラフの不変条件
//!
//! ```text
//! - 基底セル（width == 2）は占有する列のリスト overlapped_cells を持つ
//! - 占有されたセルは基底セルへの逆リンク overlapping_cell を持つ
//! - overlapping_cell が Some のセルの overlapped_cells は常に空
//!   （グラフは深さ 1 の森）
//! - 逆リンクとリストは常に整合し、セルは高々一つのリストにしか現れない
//! ```

#![no_std]
extern crate alloc;

mod cell;
mod drawstate;
mod framebuffer;

pub use cell::{Cell, Row};
pub use drawstate::DrawState;
pub use framebuffer::Framebuffer;
