//! The logical 2D array of lines: visible page plus scrollback history.
//!
//! One deque holds everything. The front `history_line_count()` entries are
//! scrollback (oldest first); the trailing `page_size().lines` entries are
//! the visible page. `zero_index` — the deque position of screen row 1 —
//! falls out of that arithmetic, so a full-page scroll is just pushing blank
//! lines at the back.
//!
//! The grid also owns the coordinate system's stateful parts: cursor,
//! margins, and tab stops. Command semantics (what CUP or IL mean) live in
//! the screen dispatcher; the grid provides the mutations.

use std::collections::{BTreeSet, VecDeque};

use crate::attrs::GraphicsAttributes;
use crate::cell::Cell;
use crate::cursor::{Cursor, SavedCursor};
use crate::line::{Line, LineFlags};
use crate::primitives::{ColumnCount, LineCount, LineOffset, Margin, PageSize};

/// Grid of lines over `[-history, page.lines)`.
#[derive(Debug, Clone)]
pub struct Grid<C: Cell> {
    lines: VecDeque<Line<C>>,
    page: PageSize,
    max_history: usize,
    /// Flags given to newly created lines; loses `WRAPPABLE` while DECAWM
    /// is off.
    default_line_flags: LineFlags,
    pub cursor: Cursor,
    pub saved_cursors: Vec<SavedCursor>,
    pub margin: Margin,
    tab_stops: BTreeSet<u16>,
}

impl<C: Cell> Grid<C> {
    #[must_use]
    pub fn new(page: PageSize, max_history: LineCount) -> Self {
        let page = PageSize::new(page.lines, page.columns);
        let flags = LineFlags::WRAPPABLE;
        let mut lines = VecDeque::with_capacity(page.lines.as_usize());
        for _ in 0..page.lines.0 {
            lines.push_back(Line::blank(page.columns, GraphicsAttributes::default(), flags));
        }
        Self {
            lines,
            page,
            max_history: max_history.as_usize(),
            default_line_flags: flags,
            cursor: Cursor::default(),
            saved_cursors: Vec::new(),
            margin: Margin::fullscreen(page),
            tab_stops: Self::default_tab_stops(page.columns),
        }
    }

    #[must_use]
    pub fn page_size(&self) -> PageSize {
        self.page
    }

    #[must_use]
    pub fn columns(&self) -> u16 {
        self.page.columns.0
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.page.lines.0
    }

    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Deque index of screen row 1.
    #[must_use]
    pub fn zero_index(&self) -> usize {
        self.lines.len() - self.page.lines.as_usize()
    }

    #[must_use]
    pub fn history_line_count(&self) -> LineCount {
        LineCount(self.zero_index() as u16)
    }

    /// Deque index for a line offset, if it is within history or the page.
    fn index_of(&self, offset: LineOffset) -> Option<usize> {
        let idx = self.zero_index() as i64 + i64::from(offset.0);
        (idx >= 0 && (idx as usize) < self.lines.len()).then_some(idx as usize)
    }

    /// Line at the given offset.
    ///
    /// Panics when the offset is outside `[-history, rows)`; offsets are
    /// produced by the engine, so that is a bookkeeping bug.
    #[must_use]
    pub fn line_at(&self, offset: LineOffset) -> &Line<C> {
        let idx = self
            .index_of(offset)
            .unwrap_or_else(|| panic!("line offset {offset} out of range"));
        &self.lines[idx]
    }

    pub fn line_at_mut(&mut self, offset: LineOffset) -> &mut Line<C> {
        let idx = self
            .index_of(offset)
            .unwrap_or_else(|| panic!("line offset {offset} out of range"));
        &mut self.lines[idx]
    }

    /// Whether `offset` addresses an existing history or page line.
    #[must_use]
    pub fn contains_line(&self, offset: LineOffset) -> bool {
        self.index_of(offset).is_some()
    }

    /// Rendered text of the line at `offset`.
    #[must_use]
    pub fn line_text(&self, offset: LineOffset) -> String {
        self.line_at(offset).to_utf8()
    }

    /// Rendered text of a history line; index 0 is the most recent row
    /// scrolled out, 1 the one before it, and so on.
    #[must_use]
    pub fn history_text_line(&self, index: usize) -> Option<String> {
        let offset = LineOffset(-1 - index as i32);
        self.index_of(offset).map(|idx| self.lines[idx].to_utf8())
    }

    pub fn clear_history(&mut self) {
        let history = self.zero_index();
        self.lines.drain(..history);
    }

    /// Update the flags new lines are created with (DECAWM toggles).
    pub fn set_default_wrappable(&mut self, wrappable: bool) {
        self.default_line_flags
            .set(LineFlags::WRAPPABLE, wrappable);
    }

    #[must_use]
    pub fn default_line_flags(&self) -> LineFlags {
        self.default_line_flags
    }

    fn blank_line(&self, fill: GraphicsAttributes) -> Line<C> {
        Line::blank(self.page.columns, fill, self.default_line_flags)
    }

    // ── Tab stops ───────────────────────────────────────────────────

    fn default_tab_stops(columns: ColumnCount) -> BTreeSet<u16> {
        (9..=columns.0).step_by(8).collect()
    }

    /// HTS: set a tab stop at the given 1-based column.
    pub fn set_tab_stop(&mut self, col: u16) {
        if (1..=self.columns()).contains(&col) {
            self.tab_stops.insert(col);
        }
    }

    /// TBC 0: clear the tab stop at the given column.
    pub fn clear_tab_stop(&mut self, col: u16) {
        self.tab_stops.remove(&col);
    }

    /// TBC 3: clear every tab stop.
    pub fn clear_all_tab_stops(&mut self) {
        self.tab_stops.clear();
    }

    /// Next tab stop strictly right of `col`, clamped to `limit`.
    #[must_use]
    pub fn next_tab_stop(&self, col: u16, limit: u16) -> u16 {
        if col >= limit {
            return limit;
        }
        self.tab_stops
            .range(col + 1..=limit)
            .next()
            .copied()
            .unwrap_or(limit)
    }

    /// Previous tab stop strictly left of `col`, clamped to `floor`.
    #[must_use]
    pub fn prev_tab_stop(&self, col: u16, floor: u16) -> u16 {
        if col <= floor {
            return floor;
        }
        self.tab_stops
            .range(floor..col)
            .next_back()
            .copied()
            .unwrap_or(floor)
    }

    // ── Scrolling ───────────────────────────────────────────────────

    /// Scroll the region up by `n`: the top `n` region rows disappear and
    /// blank rows appear at the region's bottom.
    ///
    /// When the region is the whole page with no horizontal restriction,
    /// evicted rows move into scrollback; otherwise they are discarded.
    pub fn scroll_up(&mut self, n: u16, margin: Margin, fill: GraphicsAttributes) {
        let n = n.min(margin.vertical.span());
        if n == 0 {
            return;
        }
        if margin.is_full_vertical(self.page) && margin.is_full_horizontal(self.page) {
            for _ in 0..n {
                let line = self.blank_line(fill);
                self.lines.push_back(line);
            }
            self.enforce_history_cap();
        } else if margin.is_full_horizontal(self.page) {
            let zi = self.zero_index();
            let top = zi + margin.vertical.from as usize - 1;
            let bottom = zi + margin.vertical.to as usize - 1;
            for _ in 0..n {
                self.lines.remove(top);
                let line = self.blank_line(fill);
                self.lines.insert(bottom, line);
            }
        } else {
            self.scroll_cells(n, margin, fill, true);
        }
    }

    /// Scroll the region down by `n`: blank rows appear at the region's top,
    /// the bottom `n` region rows are discarded. Never consumes scrollback.
    pub fn scroll_down(&mut self, n: u16, margin: Margin, fill: GraphicsAttributes) {
        let n = n.min(margin.vertical.span());
        if n == 0 {
            return;
        }
        if margin.is_full_horizontal(self.page) {
            let zi = self.zero_index();
            let top = zi + margin.vertical.from as usize - 1;
            let bottom = zi + margin.vertical.to as usize - 1;
            for _ in 0..n {
                self.lines.remove(bottom);
                let line = self.blank_line(fill);
                self.lines.insert(top, line);
            }
        } else {
            self.scroll_cells(n, margin, fill, false);
        }
    }

    /// Rectangular scroll: only columns `[left, right]` of the region rows
    /// move; cells outside the horizontal margin stay untouched.
    fn scroll_cells(&mut self, n: u16, margin: Margin, fill: GraphicsAttributes, up: bool) {
        let left = margin.horizontal.from - 1;
        let right = margin.horizontal.to - 1;
        let top = margin.vertical.from;
        let bottom = margin.vertical.to;

        let rows: Vec<u16> = if up {
            (top..=bottom).collect()
        } else {
            (top..=bottom).rev().collect()
        };
        for row in rows {
            let src_row = if up {
                row.checked_add(n).filter(|r| *r <= bottom)
            } else {
                row.checked_sub(n).filter(|r| *r >= top)
            };
            match src_row {
                Some(src) => {
                    let cells: Vec<C> = {
                        let line = self.line_at_mut(LineOffset::from_screen_row(src));
                        line.cells()[left as usize..=right as usize].to_vec()
                    };
                    let line = self.line_at_mut(LineOffset::from_screen_row(row));
                    let dst = line.cells_mut();
                    dst[left as usize..=right as usize].clone_from_slice(&cells);
                    // A wide character straddling the margin edge loses the
                    // half outside the copied band.
                    if dst[left as usize].is_wide_continuation() {
                        dst[left as usize].reset(fill);
                    }
                    if dst[right as usize].width() == 2 {
                        dst[right as usize].reset(fill);
                    }
                }
                None => {
                    let line = self.line_at_mut(LineOffset::from_screen_row(row));
                    line.blank_range(left, right, fill);
                }
            }
        }
    }

    /// IL: insert `n` blank lines at `row`, pushing lines below it down and
    /// out of the region's bottom.
    pub fn insert_lines(&mut self, row: u16, n: u16, margin: Margin, fill: GraphicsAttributes) {
        let mut region = margin;
        region.vertical.from = row;
        self.scroll_down(n, region, fill);
    }

    /// DL: delete `n` lines at `row`, pulling lines below it up; blanks
    /// appear at the region's bottom.
    pub fn delete_lines(&mut self, row: u16, n: u16, margin: Margin, fill: GraphicsAttributes) {
        let mut region = margin;
        region.vertical.from = row;
        self.scroll_up(n, region, fill);
    }

    fn enforce_history_cap(&mut self) {
        let max_len = self.page.lines.as_usize() + self.max_history;
        while self.lines.len() > max_len {
            self.lines.pop_front();
        }
    }

    // ── Resize with reflow ──────────────────────────────────────────

    /// Resize the grid, reflowing wrappable content to the new width and
    /// moving lines between page and history for height changes.
    ///
    /// Margins reset to the full page. The cursor follows its content
    /// through the reflow: when the line it sits on re-wraps, the cursor
    /// lands on the chunk now holding that cell.
    pub fn resize(&mut self, new_page: PageSize, fill: GraphicsAttributes) {
        let new_page = PageSize::new(new_page.lines, new_page.columns);
        if new_page == self.page {
            self.margin = Margin::fullscreen(self.page);
            return;
        }

        // Cursor as an absolute deque position, stable across both phases.
        let mut cur_idx = self.zero_index() + self.cursor.row as usize - 1;

        if new_page.columns != self.page.columns {
            let target_len = self.lines.len();
            let (idx, col) =
                self.reflow_columns(new_page.columns, cur_idx, (self.cursor.col - 1) as usize);
            cur_idx = idx;
            self.cursor.col = col as u16 + 1;
            self.cursor.pending_wrap = false;
            self.page.columns = new_page.columns;
            self.tab_stops = Self::default_tab_stops(new_page.columns);
            // Wrapped growth first consumes blank rows at the bottom before
            // anything is pushed into history.
            while self.lines.len() > target_len
                && self.lines.len() - 1 > cur_idx
                && self.lines.back().is_some_and(Line::is_blank)
            {
                self.lines.pop_back();
            }
        }

        let old_rows = self.page.lines.0;
        let new_rows = new_page.lines.0;
        if new_rows < old_rows {
            // Prefer dropping blank rows below the cursor over pushing
            // content into history.
            let mut excess = (old_rows - new_rows) as usize;
            while excess > 0
                && self.lines.len() > 1
                && self.lines.len() - 1 > cur_idx
                && self.lines.back().is_some_and(Line::is_blank)
            {
                self.lines.pop_back();
                excess -= 1;
            }
        }
        self.page.lines = new_page.lines;
        while self.lines.len() < new_page.lines.as_usize() {
            let line = self.blank_line(fill);
            self.lines.push_back(line);
        }
        let before_cap = self.lines.len();
        self.enforce_history_cap();
        cur_idx = cur_idx.saturating_sub(before_cap - self.lines.len());

        let row = cur_idx as i64 - self.zero_index() as i64 + 1;
        self.cursor.row = row.clamp(1, i64::from(new_rows)) as u16;
        self.cursor.col = self.cursor.col.min(new_page.columns.0).max(1);
        self.margin = Margin::fullscreen(self.page);
    }

    /// Reflow every line to a new column count.
    ///
    /// Physical lines are regrouped into logical lines along their WRAPPED
    /// flags, then re-split at the new width. Non-wrappable lines truncate
    /// or widen in place. Returns the tracked cursor as a new
    /// `(deque index, 0-based column)` pair.
    fn reflow_columns(
        &mut self,
        new_columns: ColumnCount,
        cursor_idx: usize,
        cursor_col: usize,
    ) -> (usize, usize) {
        let width = new_columns.as_usize().max(1);
        let old = std::mem::take(&mut self.lines);
        let mut out: VecDeque<Line<C>> = VecDeque::with_capacity(old.len());
        let mut iter = old.into_iter().peekable();
        let mut src_idx = 0usize;
        let mut new_cursor = (0usize, cursor_col.min(width - 1));

        while let Some(mut line) = iter.next() {
            let this_idx = src_idx;
            src_idx += 1;
            let continues = iter.peek().is_some_and(Line::is_wrapped);

            let fast = !line.is_wrappable()
                || (!continues
                    && !line.is_wrapped()
                    && line
                        .trivial_buffer()
                        .is_some_and(|t| t.used_columns <= new_columns.0));
            if fast {
                if this_idx == cursor_idx {
                    new_cursor = (out.len(), cursor_col.min(width - 1));
                }
                line.resize(new_columns);
                out.push_back(line);
                continue;
            }

            // Gather the logical line, remembering where the cursor's cell
            // lands in the concatenation.
            let first_flags = line.flags();
            let mut cursor_pos: Option<usize> = None;
            let mut cells: Vec<C> = line.trim_blank_right().to_vec();
            if this_idx == cursor_idx {
                cursor_pos = Some(cursor_col.min(cells.len()));
            }
            while let Some(mut cont) = iter.next_if(Line::is_wrapped) {
                let offset = cells.len();
                let trimmed = cont.trim_blank_right();
                if src_idx == cursor_idx {
                    cursor_pos = Some(offset + cursor_col.min(trimmed.len()));
                }
                cells.extend_from_slice(trimmed);
                src_idx += 1;
            }

            let chunks = split_into_rows(cells, new_columns);
            let cursor_chunk = cursor_pos.map(|pos| {
                let chunk = (pos / width).min(chunks.len() - 1);
                (chunk, pos - chunk * width)
            });
            for (i, chunk) in chunks.into_iter().enumerate() {
                let flags = if i == 0 {
                    first_flags
                } else {
                    LineFlags::WRAPPABLE | LineFlags::WRAPPED
                };
                if let Some((chunk_idx, col)) = cursor_chunk
                    && chunk_idx == i
                {
                    new_cursor = (out.len(), col.min(width - 1));
                }
                out.push_back(Line::from_cells(chunk, flags));
            }
        }
        self.lines = out;
        new_cursor
    }

    /// Invariants from the data model, checked by tests after mutations.
    pub fn verify(&self) {
        for (i, line) in self.lines.iter().enumerate() {
            assert_eq!(
                line.size(),
                self.page.columns.0,
                "line {i} width mismatch"
            );
        }
        assert!(self.lines.len() >= self.page.lines.as_usize());
        assert!(self.zero_index() <= self.max_history);
        assert!((1..=self.rows()).contains(&self.cursor.row));
        assert!((1..=self.columns()).contains(&self.cursor.col));
    }
}

/// Split a logical line's content into page rows of `columns` cells,
/// never separating a wide character from its continuation half. Every
/// returned row is padded to exactly `columns` cells.
fn split_into_rows<C: Cell>(cells: Vec<C>, columns: ColumnCount) -> Vec<Vec<C>> {
    let width = columns.as_usize().max(1);
    let mut rows: Vec<Vec<C>> = Vec::new();
    let mut current: Vec<C> = Vec::with_capacity(width);
    let mut units = cells.into_iter().peekable();

    while let Some(cell) = units.next() {
        let needed = if cell.width() == 2 { 2 } else { 1 };
        if needed > width {
            // A wide character cannot fit a one-column page; degrade to a
            // blank rather than violating the width invariant.
            let _ = units.next_if(Cell::is_wide_continuation);
            current.push(C::default());
        } else {
            if current.len() + needed > width {
                while current.len() < width {
                    current.push(C::default());
                }
                rows.push(std::mem::replace(&mut current, Vec::with_capacity(width)));
            }
            current.push(cell);
            if needed == 2
                && let Some(cont) = units.next_if(Cell::is_wide_continuation)
            {
                current.push(cont);
            }
        }
        if current.len() == width && units.peek().is_some() {
            rows.push(std::mem::replace(&mut current, Vec::with_capacity(width)));
        }
    }
    while current.len() < width {
        current.push(C::default());
    }
    rows.push(current);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CompactCell;
    use crate::primitives::Band;

    type TestGrid = Grid<CompactCell>;

    fn grid(cols: u16, rows: u16, history: u16) -> TestGrid {
        TestGrid::new(
            PageSize::new(LineCount(rows), ColumnCount(cols)),
            LineCount(history),
        )
    }

    fn put_text(grid: &mut TestGrid, row: u16, text: &str) {
        let line = grid.line_at_mut(LineOffset::from_screen_row(row));
        for (i, ch) in text.chars().enumerate() {
            line.use_cell_at(i as u16)
                .write(GraphicsAttributes::default(), ch, 1);
        }
    }

    fn page_text(grid: &TestGrid) -> Vec<String> {
        (1..=grid.rows())
            .map(|row| grid.line_text(LineOffset::from_screen_row(row)))
            .collect()
    }

    #[test]
    fn new_grid_is_blank_page_without_history() {
        let g = grid(4, 3, 10);
        assert_eq!(g.history_line_count(), LineCount(0));
        assert_eq!(page_text(&g), vec!["    ", "    ", "    "]);
        g.verify();
    }

    #[test]
    fn full_page_scroll_moves_top_line_to_history() {
        let mut g = grid(3, 2, 5);
        put_text(&mut g, 1, "aaa");
        put_text(&mut g, 2, "bbb");
        g.scroll_up(1, Margin::fullscreen(g.page_size()), GraphicsAttributes::default());
        assert_eq!(g.history_line_count(), LineCount(1));
        assert_eq!(g.line_text(LineOffset(-1)), "aaa");
        assert_eq!(page_text(&g), vec!["bbb", "   "]);
        g.verify();
    }

    #[test]
    fn history_is_bounded() {
        let mut g = grid(2, 2, 2);
        for i in 0..6u16 {
            put_text(&mut g, 1, &i.to_string());
            g.scroll_up(1, Margin::fullscreen(g.page_size()), GraphicsAttributes::default());
        }
        assert_eq!(g.history_line_count(), LineCount(2));
        g.verify();
    }

    #[test]
    fn history_text_line_zero_is_most_recent() {
        let mut g = grid(2, 1, 5);
        for text in ["a", "b", "c"] {
            put_text(&mut g, 1, text);
            g.scroll_up(1, Margin::fullscreen(g.page_size()), GraphicsAttributes::default());
        }
        assert_eq!(g.history_text_line(0).unwrap(), "c ");
        assert_eq!(g.history_text_line(1).unwrap(), "b ");
        assert_eq!(g.history_text_line(2).unwrap(), "a ");
        assert_eq!(g.history_text_line(3), None);
    }

    #[test]
    fn region_scroll_discards_instead_of_archiving() {
        let mut g = grid(5, 5, 10);
        for (row, text) in ["11111", "22222", "33333", "44444", "55555"]
            .iter()
            .enumerate()
        {
            put_text(&mut g, row as u16 + 1, text);
        }
        let mut margin = Margin::fullscreen(g.page_size());
        margin.vertical = Band { from: 2, to: 4 };
        g.scroll_up(1, margin, GraphicsAttributes::default());
        assert_eq!(g.history_line_count(), LineCount(0));
        assert_eq!(
            page_text(&g),
            vec!["11111", "33333", "44444", "     ", "55555"]
        );
        g.verify();
    }

    #[test]
    fn rectangular_scroll_touches_only_margin_columns() {
        let mut g = grid(5, 5, 0);
        for (row, text) in ["12345", "67890", "ABCDE", "FGHIJ", "KLMNO"]
            .iter()
            .enumerate()
        {
            put_text(&mut g, row as u16 + 1, text);
        }
        let margin = Margin {
            vertical: Band { from: 2, to: 4 },
            horizontal: Band { from: 2, to: 4 },
        };
        g.scroll_up(1, margin, GraphicsAttributes::default());
        assert_eq!(
            page_text(&g),
            vec!["12345", "6BCD0", "AGHIE", "F   J", "KLMNO"]
        );
        g.verify();
    }

    #[test]
    fn scroll_down_inserts_blanks_at_region_top() {
        let mut g = grid(3, 3, 0);
        put_text(&mut g, 1, "aaa");
        put_text(&mut g, 2, "bbb");
        put_text(&mut g, 3, "ccc");
        g.scroll_down(1, Margin::fullscreen(g.page_size()), GraphicsAttributes::default());
        assert_eq!(page_text(&g), vec!["   ", "aaa", "bbb"]);
        g.verify();
    }

    #[test]
    fn scroll_clamps_to_region_height() {
        let mut g = grid(3, 3, 0);
        put_text(&mut g, 1, "aaa");
        let mut margin = Margin::fullscreen(g.page_size());
        margin.vertical = Band { from: 1, to: 2 };
        g.scroll_up(99, margin, GraphicsAttributes::default());
        assert_eq!(page_text(&g), vec!["   ", "   ", "   "]);
        g.verify();
    }

    #[test]
    fn insert_and_delete_lines_respect_region_bottom() {
        let mut g = grid(3, 4, 0);
        for (row, text) in ["aaa", "bbb", "ccc", "ddd"].iter().enumerate() {
            put_text(&mut g, row as u16 + 1, text);
        }
        let mut margin = Margin::fullscreen(g.page_size());
        margin.vertical = Band { from: 1, to: 3 };
        g.insert_lines(2, 1, margin, GraphicsAttributes::default());
        assert_eq!(page_text(&g), vec!["aaa", "   ", "bbb", "ddd"]);
        g.delete_lines(2, 1, margin, GraphicsAttributes::default());
        assert_eq!(page_text(&g), vec!["aaa", "bbb", "   ", "ddd"]);
        g.verify();
    }

    // ── Tab stops ───────────────────────────────────────────────────

    #[test]
    fn default_tab_stops_every_eight_columns() {
        let g = grid(20, 1, 0);
        assert_eq!(g.next_tab_stop(1, 20), 9);
        assert_eq!(g.next_tab_stop(9, 20), 17);
        assert_eq!(g.next_tab_stop(17, 20), 20);
    }

    #[test]
    fn custom_tab_stops() {
        let mut g = grid(20, 1, 0);
        g.clear_all_tab_stops();
        assert_eq!(g.next_tab_stop(1, 20), 20);
        g.set_tab_stop(5);
        g.set_tab_stop(13);
        assert_eq!(g.next_tab_stop(1, 20), 5);
        assert_eq!(g.next_tab_stop(5, 20), 13);
        assert_eq!(g.prev_tab_stop(13, 1), 5);
        g.clear_tab_stop(5);
        assert_eq!(g.next_tab_stop(1, 20), 13);
    }

    #[test]
    fn prev_tab_stop_clamps_to_floor() {
        let g = grid(20, 1, 0);
        assert_eq!(g.prev_tab_stop(5, 1), 1);
        assert_eq!(g.prev_tab_stop(12, 1), 9);
    }

    // ── Resize / reflow ─────────────────────────────────────────────

    #[test]
    fn widen_pads_lines() {
        let mut g = grid(3, 2, 0);
        put_text(&mut g, 1, "abc");
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(5)),
            GraphicsAttributes::default(),
        );
        assert_eq!(page_text(&g), vec!["abc  ", "     "]);
        g.verify();
    }

    #[test]
    fn shrink_width_wraps_content() {
        let mut g = grid(6, 2, 10);
        put_text(&mut g, 1, "abcdef");
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(3)),
            GraphicsAttributes::default(),
        );
        assert_eq!(page_text(&g), vec!["abc", "def"]);
        let second = g.line_at(LineOffset(1));
        assert!(second.is_wrapped());
        g.verify();
    }

    #[test]
    fn grow_width_rejoins_wrapped_lines() {
        let mut g = grid(6, 2, 10);
        put_text(&mut g, 1, "abcdef");
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(3)),
            GraphicsAttributes::default(),
        );
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(6)),
            GraphicsAttributes::default(),
        );
        assert_eq!(page_text(&g), vec!["abcdef", "      "]);
        g.verify();
    }

    #[test]
    fn shrink_height_pushes_rows_into_history() {
        let mut g = grid(3, 4, 10);
        for (row, text) in ["aaa", "bbb", "ccc", "ddd"].iter().enumerate() {
            put_text(&mut g, row as u16 + 1, text);
        }
        g.cursor.row = 4;
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(3)),
            GraphicsAttributes::default(),
        );
        assert_eq!(g.history_line_count(), LineCount(2));
        assert_eq!(page_text(&g), vec!["ccc", "ddd"]);
        assert_eq!(g.cursor.row, 2);
        g.verify();
    }

    #[test]
    fn shrink_height_drops_blank_rows_below_cursor_first() {
        let mut g = grid(3, 4, 10);
        put_text(&mut g, 1, "aaa");
        g.cursor.row = 1;
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(3)),
            GraphicsAttributes::default(),
        );
        assert_eq!(g.history_line_count(), LineCount(0));
        assert_eq!(page_text(&g), vec!["aaa", "   "]);
        assert_eq!(g.cursor.row, 1);
        g.verify();
    }

    #[test]
    fn grow_height_pulls_lines_back_from_history() {
        let mut g = grid(3, 2, 10);
        put_text(&mut g, 1, "aaa");
        put_text(&mut g, 2, "bbb");
        g.scroll_up(1, Margin::fullscreen(g.page_size()), GraphicsAttributes::default());
        assert_eq!(g.history_line_count(), LineCount(1));
        g.resize(
            PageSize::new(LineCount(3), ColumnCount(3)),
            GraphicsAttributes::default(),
        );
        assert_eq!(g.history_line_count(), LineCount(0));
        assert_eq!(page_text(&g), vec!["aaa", "bbb", "   "]);
        g.verify();
    }

    #[test]
    fn reflow_joins_wrapped_text_across_resize_round_trip() {
        let mut g = grid(8, 3, 10);
        put_text(&mut g, 1, "abcdefgh");
        let original = g.line_text(LineOffset(0));
        g.resize(
            PageSize::new(LineCount(3), ColumnCount(5)),
            GraphicsAttributes::default(),
        );
        g.resize(
            PageSize::new(LineCount(3), ColumnCount(8)),
            GraphicsAttributes::default(),
        );
        assert_eq!(g.line_text(LineOffset(0)), original);
        g.verify();
    }

    #[test]
    fn reflow_keeps_wide_chars_whole() {
        let mut g = grid(4, 2, 10);
        {
            let line = g.line_at_mut(LineOffset(0));
            line.use_cell_at(0)
                .write(GraphicsAttributes::default(), 'a', 1);
            line.use_cell_at(1)
                .write(GraphicsAttributes::default(), '中', 2);
            *line.use_cell_at(2) = CompactCell::continuation(GraphicsAttributes::default(), 0);
            line.use_cell_at(3)
                .write(GraphicsAttributes::default(), 'b', 1);
        }
        g.resize(
            PageSize::new(LineCount(2), ColumnCount(2)),
            GraphicsAttributes::default(),
        );
        // "a" + pad, then "中", then "b": the wide char never splits.
        let texts = page_text(&g);
        let all: String = texts.join("");
        assert!(all.contains('中'));
        for row in 1..=g.rows() {
            let line = g.line_at(LineOffset::from_screen_row(row));
            assert_eq!(line.size(), 2);
        }
        g.verify();
    }

    #[test]
    fn resize_resets_margins() {
        let mut g = grid(10, 10, 0);
        g.margin.vertical = Band { from: 2, to: 5 };
        g.resize(
            PageSize::new(LineCount(6), ColumnCount(10)),
            GraphicsAttributes::default(),
        );
        assert_eq!(g.margin, Margin::fullscreen(g.page_size()));
    }

    #[test]
    fn split_into_rows_pads_every_row() {
        let cells: Vec<CompactCell> = "abcde"
            .chars()
            .map(|ch| {
                let mut c = CompactCell::default();
                c.write(GraphicsAttributes::default(), ch, 1);
                c
            })
            .collect();
        let rows = split_into_rows(cells, ColumnCount(3));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.len() == 3));
    }
}
