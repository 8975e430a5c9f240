//! 描画状態（カーソル・タブ・スクロール領域・各種モード）

use alloc::vec::Vec;

/// エミュレータ層が使うカーソル状態
///
/// 不変条件: `cursor_col < width`、`limit_top() <= cursor_row <= limit_bottom()`、
/// `scrolling_region_top_row <= scrolling_region_bottom_row` で両者とも
/// `[0, height)` の範囲内。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawState {
    width: usize,
    height: usize,

    cursor_col: usize,
    cursor_row: usize,

    /// 結合文字の挿入先アンカー。結合文字はカーソル位置ではなく
    /// このアンカーのセルに追記される
    combining_char_col: usize,
    combining_char_row: usize,

    tabs: Vec<bool>,

    scrolling_region_top_row: usize,
    scrolling_region_bottom_row: usize,

    next_print_will_wrap: bool,
    origin_mode: bool,
    auto_wrap_mode: bool,
}

impl DrawState {
    /// 初期状態を作る。タブは 8 桁ごと、スクロール領域は画面全体
    pub fn new(width: usize, height: usize) -> Self {
        let mut tabs = Vec::with_capacity(width);
        for i in 0..width {
            tabs.push(i % 8 == 0);
        }

        DrawState {
            width,
            height,
            cursor_col: 0,
            cursor_row: 0,
            combining_char_col: 0,
            combining_char_row: 0,
            tabs,
            scrolling_region_top_row: 0,
            scrolling_region_bottom_row: height.saturating_sub(1),
            next_print_will_wrap: false,
            origin_mode: false,
            auto_wrap_mode: true,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cursor_row(&self) -> usize {
        self.cursor_row
    }

    pub fn cursor_col(&self) -> usize {
        self.cursor_col
    }

    pub fn combining_char_row(&self) -> usize {
        self.combining_char_row
    }

    pub fn combining_char_col(&self) -> usize {
        self.combining_char_col
    }

    pub fn next_print_will_wrap(&self) -> bool {
        self.next_print_will_wrap
    }

    pub fn origin_mode(&self) -> bool {
        self.origin_mode
    }

    pub fn set_origin_mode(&mut self, origin_mode: bool) {
        self.origin_mode = origin_mode;
    }

    pub fn auto_wrap_mode(&self) -> bool {
        self.auto_wrap_mode
    }

    pub fn set_auto_wrap_mode(&mut self, auto_wrap_mode: bool) {
        self.auto_wrap_mode = auto_wrap_mode;
    }

    /// 現在のカーソル位置を結合文字アンカーとして記録する
    pub fn new_grapheme(&mut self) {
        self.combining_char_col = self.cursor_col;
        self.combining_char_row = self.cursor_row;
    }

    /// カーソルを許容範囲内に収める
    fn snap_cursor_to_border(&mut self) {
        if self.cursor_row < self.limit_top() {
            self.cursor_row = self.limit_top();
        }
        if self.cursor_row > self.limit_bottom() {
            self.cursor_row = self.limit_bottom();
        }
        if self.cursor_col >= self.width {
            self.cursor_col = self.width.saturating_sub(1);
        }
    }

    /// カーソル行を移動する
    ///
    /// # 引数
    /// - `n`: 相対移動量または絶対行
    /// - `relative`: 真なら現在行からの相対移動
    ///
    /// 移動後は `[limit_top, limit_bottom]` に収め、結合文字アンカーを更新し、
    /// 折り返し予約をクリアする。
    pub fn move_row(&mut self, n: isize, relative: bool) {
        let target = if relative {
            self.cursor_row as isize + n
        } else {
            n
        };

        self.cursor_row = target
            .clamp(self.limit_top() as isize, self.limit_bottom() as isize)
            .max(0) as usize;

        self.new_grapheme();
        self.next_print_will_wrap = false;
    }

    /// カーソル桁を移動する
    ///
    /// # 引数
    /// - `n`: 相対移動量または絶対桁
    /// - `relative`: 真なら現在桁からの相対移動
    /// - `implicit`: 印字に伴う暗黙の前進なら真
    ///
    /// 暗黙の移動では移動前にアンカーを記録し、右端からあふれた場合は
    /// `next_print_will_wrap` を立てる（カーソル自体は右端に留まる）。
    /// 明示の移動ではアンカーを移動先に取り直し、折り返し予約をクリアする。
    pub fn move_col(&mut self, n: isize, relative: bool, implicit: bool) {
        if implicit {
            self.new_grapheme();
        }

        let target = if relative {
            self.cursor_col as isize + n
        } else {
            n
        };

        if implicit && target >= self.width as isize {
            self.next_print_will_wrap = true;
        }

        self.cursor_col = target
            .clamp(0, self.width.saturating_sub(1) as isize)
            .max(0) as usize;

        if !implicit {
            self.new_grapheme();
            self.next_print_will_wrap = false;
        }
    }

    /// 現在の桁にタブを立てる
    pub fn set_tab(&mut self) {
        self.tabs[self.cursor_col] = true;
    }

    /// 指定桁のタブを消す
    pub fn clear_tab(&mut self, col: usize) {
        self.tabs[col] = false;
    }

    /// 現在の桁より右で最初のタブ桁を返す（なければ None）
    pub fn get_next_tab(&self) -> Option<usize> {
        ((self.cursor_col + 1)..self.width).find(|&i| self.tabs[i])
    }

    /// スクロール領域を設定する
    ///
    /// 入力は `[0, height - 1]` に丸め、上下が逆なら `bottom` を `top` まで
    /// 引き上げる。origin モード中はカーソルを領域内に収め、結合文字アンカーを
    /// 取り直す。
    pub fn set_scrolling_region(&mut self, top: isize, bottom: isize) {
        if self.height < 1 {
            return;
        }

        let max_row = (self.height - 1) as isize;
        self.scrolling_region_top_row = top.clamp(0, max_row) as usize;
        self.scrolling_region_bottom_row = bottom.clamp(0, max_row) as usize;

        if self.scrolling_region_bottom_row < self.scrolling_region_top_row {
            self.scrolling_region_bottom_row = self.scrolling_region_top_row;
        }

        if self.origin_mode {
            self.snap_cursor_to_border();
            self.new_grapheme();
        }
    }

    pub fn scrolling_region_top_row(&self) -> usize {
        self.scrolling_region_top_row
    }

    pub fn scrolling_region_bottom_row(&self) -> usize {
        self.scrolling_region_bottom_row
    }

    /// カーソルが取れる最小行。origin モード中はスクロール領域の上端
    pub fn limit_top(&self) -> usize {
        if self.origin_mode {
            self.scrolling_region_top_row
        } else {
            0
        }
    }

    /// カーソルが取れる最大行。origin モード中はスクロール領域の下端
    pub fn limit_bottom(&self) -> usize {
        if self.origin_mode {
            self.scrolling_region_bottom_row
        } else {
            self.height.saturating_sub(1)
        }
    }
}
