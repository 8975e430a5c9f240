//! フレームバッファ本体
//!
//! 行ベクタと描画状態を所有し、スクロールと重なりの管理を行う。
//! グリッドを変更できるのはこの型だけ。

use alloc::vec::Vec;

use crate::cell::{Cell, Row};
use crate::drawstate::DrawState;

/// 端末グリッドと描画状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framebuffer {
    rows: Vec<Row>,
    ds: DrawState,
}

impl Framebuffer {
    /// 指定サイズの空フレームバッファを作る
    pub fn new(width: usize, height: usize) -> Self {
        let mut rows = Vec::with_capacity(height);
        rows.resize(height, Row::new(width));
        Framebuffer {
            rows,
            ds: DrawState::new(width, height),
        }
    }

    pub fn ds(&self) -> &DrawState {
        &self.ds
    }

    pub fn ds_mut(&mut self) -> &mut DrawState {
        &mut self.ds
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> &Row {
        &self.rows[row]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut Row {
        &mut self.rows[row]
    }

    /// 指定位置のセル
    pub fn cell_at(&self, row: usize, col: usize) -> &Cell {
        self.rows[row].cell(col)
    }

    pub fn cell_at_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        self.rows[row].cell_mut(col)
    }

    /// カーソル位置のセル。グリッドが空（幅または高さ 0）なら None
    pub fn cursor_cell(&mut self) -> Option<&mut Cell> {
        if self.ds.width() == 0 || self.ds.height() == 0 {
            return None;
        }
        let (row, col) = (self.ds.cursor_row(), self.ds.cursor_col());
        Some(self.rows[row].cell_mut(col))
    }

    /// 結合文字アンカーのセル。結合文字はカーソルではなくこのセルに追記する
    pub fn combining_cell(&mut self) -> Option<&mut Cell> {
        if self.ds.width() == 0 || self.ds.height() == 0 {
            return None;
        }
        let (row, col) = (self.ds.combining_char_row(), self.ds.combining_char_col());
        Some(self.rows[row].cell_mut(col))
    }

    /// セルをリセットし、重なりグラフの整合性を保つ
    pub fn reset_cell(&mut self, row: usize, col: usize) {
        self.rows[row].reset_cell(col);
    }

    /// `(row, col)` に置かれた全角グリフの右隣セルを占有させる
    pub fn claim_overlap(&mut self, row: usize, col: usize) {
        self.rows[row].claim_overlap(col);
    }

    /// スクロール領域を N 行スクロールする
    ///
    /// `N > 0` で上方向（領域上端の行が消え、下端に空行が入る）、`N < 0` で
    /// 下方向。各行につきカーソルを逆方向へ 1 行相対移動させるため、カーソルは
    /// 画面上の同じ行に貼り付く（領域の端で snap される場合を除く）。
    pub fn scroll(&mut self, n: isize) {
        if n >= 0 {
            for _ in 0..n {
                self.rows.remove(self.ds.limit_top());
                self.rows
                    .insert(self.ds.limit_bottom(), Row::new(self.ds.width()));
                self.ds.move_row(-1, true);
            }
        } else {
            for _ in 0..(-n) {
                self.rows.remove(self.ds.limit_bottom());
                self.rows
                    .insert(self.ds.limit_top(), Row::new(self.ds.width()));
                self.ds.move_row(1, true);
            }
        }
    }

    /// カーソルを相対移動し、領域からあふれる分は先にスクロールで吸収する
    pub fn move_rows_autoscroll(&mut self, rows: isize) {
        let cursor = self.ds.cursor_row() as isize;

        if cursor + rows > self.ds.limit_bottom() as isize {
            self.scroll(cursor + rows - self.ds.limit_bottom() as isize);
        } else if cursor + rows < self.ds.limit_top() as isize {
            self.scroll(cursor + rows - self.ds.limit_top() as isize);
        }

        self.ds.move_row(rows, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 行の識別用に 1 文字だけ書き込む
    fn mark(fb: &mut Framebuffer, row: usize, ch: char) {
        fb.cell_at_mut(row, 0).append(ch);
    }

    fn mark_of(fb: &Framebuffer, row: usize) -> Option<char> {
        fb.cell_at(row, 0).contents().first().copied()
    }

    #[test]
    fn test_scroll_up_shifts_rows() {
        let mut fb = Framebuffer::new(80, 5);
        for (i, ch) in ['a', 'b', 'c', 'd', 'e'].into_iter().enumerate() {
            mark(&mut fb, i, ch);
        }
        fb.ds_mut().move_row(3, false);

        fb.scroll(2);

        // 残った行は 2 行ぶん上へ、下 2 行は空行
        assert_eq!(mark_of(&fb, 0), Some('c'));
        assert_eq!(mark_of(&fb, 1), Some('d'));
        assert_eq!(mark_of(&fb, 2), Some('e'));
        assert_eq!(mark_of(&fb, 3), None);
        assert_eq!(mark_of(&fb, 4), None);

        // 新しい行は現在の幅を持つ
        assert_eq!(fb.row(4).width(), 80);

        // カーソルは画面上の行に貼り付く（3 → 1）
        assert_eq!(fb.ds().cursor_row(), 1);
    }

    #[test]
    fn test_scroll_down_shifts_rows() {
        let mut fb = Framebuffer::new(80, 5);
        for (i, ch) in ['a', 'b', 'c', 'd', 'e'].into_iter().enumerate() {
            mark(&mut fb, i, ch);
        }
        fb.ds_mut().move_row(1, false);

        fb.scroll(-1);

        assert_eq!(mark_of(&fb, 0), None);
        assert_eq!(mark_of(&fb, 1), Some('a'));
        assert_eq!(mark_of(&fb, 2), Some('b'));
        assert_eq!(mark_of(&fb, 3), Some('c'));
        assert_eq!(mark_of(&fb, 4), Some('d'));

        // カーソルは逆方向へ 1 行（1 → 2）
        assert_eq!(fb.ds().cursor_row(), 2);
    }

    #[test]
    fn test_scroll_respects_region_in_origin_mode() {
        let mut fb = Framebuffer::new(80, 8);
        for i in 0..8 {
            mark(&mut fb, i, (b'a' + i as u8) as char);
        }
        fb.ds_mut().set_scrolling_region(2, 5);
        fb.ds_mut().set_origin_mode(true);

        fb.scroll(1);

        // 領域外は不変
        assert_eq!(mark_of(&fb, 0), Some('a'));
        assert_eq!(mark_of(&fb, 1), Some('b'));
        assert_eq!(mark_of(&fb, 6), Some('g'));
        assert_eq!(mark_of(&fb, 7), Some('h'));

        // 領域内は 1 行ずつ上へ、下端は空行
        assert_eq!(mark_of(&fb, 2), Some('d'));
        assert_eq!(mark_of(&fb, 3), Some('e'));
        assert_eq!(mark_of(&fb, 4), Some('f'));
        assert_eq!(mark_of(&fb, 5), None);
    }

    #[test]
    fn test_move_rows_autoscroll_at_bottom() {
        let mut fb = Framebuffer::new(80, 5);
        for (i, ch) in ['a', 'b', 'c', 'd', 'e'].into_iter().enumerate() {
            mark(&mut fb, i, ch);
        }
        fb.ds_mut().move_row(4, false);

        // 下端から 2 行下がる → 2 行スクロールして吸収
        fb.move_rows_autoscroll(2);

        assert_eq!(fb.ds().cursor_row(), 4);
        assert_eq!(mark_of(&fb, 0), Some('c'));
        assert_eq!(mark_of(&fb, 2), Some('e'));
        assert_eq!(mark_of(&fb, 3), None);
        assert_eq!(mark_of(&fb, 4), None);
    }

    #[test]
    fn test_move_rows_autoscroll_within_region_no_scroll() {
        let mut fb = Framebuffer::new(80, 5);
        mark(&mut fb, 0, 'a');
        fb.ds_mut().move_row(1, false);

        fb.move_rows_autoscroll(2);

        // 領域内に収まる移動ではスクロールしない
        assert_eq!(fb.ds().cursor_row(), 3);
        assert_eq!(mark_of(&fb, 0), Some('a'));
    }

    #[test]
    fn test_cursor_cell_none_on_empty_grid() {
        let mut fb = Framebuffer::new(0, 0);
        assert!(fb.cursor_cell().is_none());
        assert!(fb.combining_cell().is_none());
    }

    #[test]
    fn test_combining_cell_follows_anchor() {
        let mut fb = Framebuffer::new(80, 24);
        fb.cursor_cell().unwrap().append('e');
        // 印字に伴う暗黙の前進
        fb.ds_mut().move_col(1, true, true);

        // 結合文字はカーソル位置ではなくアンカーのセルに付く
        fb.combining_cell().unwrap().append('\u{0301}');

        assert_eq!(fb.cell_at(0, 0).contents(), &['e', '\u{0301}']);
        assert!(fb.cell_at(0, 1).is_blank());
    }
}
