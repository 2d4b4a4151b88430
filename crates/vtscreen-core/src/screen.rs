//! The screen: applies parser events to the grid.
//!
//! This is the listener side of the engine. Every VT command the parser
//! recognizes lands here as a [`Events`] callback and turns into cursor
//! motion, rendition changes, or grid mutations. The screen also owns the
//! pieces of state that span cells: the mode set, the hyperlink registry,
//! and the two host collaborators (reply sink and notifier).
//!
//! Coordinate discipline: all command handlers work in 1-based screen
//! coordinates (cursor space) and cross into 0-based grid offsets only at
//! the line/cell access boundary.

use std::cell::RefCell;
use std::rc::Rc;

use crate::attrs::{Color, GraphicsAttributes, SgrFlags, UnderlineStyle};
use crate::cell::{Cell, CompactCell, HyperlinkRegistry, display_width};
use crate::cursor::{CharsetId, SavedCursor, translate_charset};
use crate::grid::Grid;
use crate::line::LineFlags;
use crate::modes::Modes;
use crate::parser::{Events, Params};
use crate::primitives::{Band, CellLocation, LineCount, LineOffset, Margin, PageSize};
use crate::selection::{SelectionHelper, Selector};

/// Receives response byte strings (CPR, DA, DSR replies).
///
/// Invoked inline from command dispatch; implementations must not re-enter
/// the screen.
pub trait ReplySink {
    fn write_reply(&mut self, bytes: &[u8]);
}

impl ReplySink for () {
    fn write_reply(&mut self, _bytes: &[u8]) {}
}

impl ReplySink for Vec<u8> {
    fn write_reply(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// Shared-buffer sink, convenient for hosts that keep the buffer after
/// handing the sink to the screen.
impl ReplySink for Rc<RefCell<Vec<u8>>> {
    fn write_reply(&mut self, bytes: &[u8]) {
        self.borrow_mut().extend_from_slice(bytes);
    }
}

/// Receives human-readable diagnostics: window titles, protocol errors.
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

impl Notifier for () {
    fn notify(&mut self, _message: &str) {}
}

impl Notifier for Rc<RefCell<Vec<String>>> {
    fn notify(&mut self, message: &str) {
        self.borrow_mut().push(message.to_string());
    }
}

/// Upper bound on accumulated OSC payload; longer strings are truncated.
const MAX_OSC_LEN: usize = 4096;

/// Terminal screen: grid plus everything the VT dispatch needs around it.
pub struct Screen<C: Cell = CompactCell> {
    grid: Grid<C>,
    modes: Modes,
    hyperlinks: HyperlinkRegistry,
    reply: Box<dyn ReplySink>,
    notifier: Box<dyn Notifier>,
    osc: Vec<u8>,
    /// Last printed codepoint, for grapheme-cluster continuation.
    last_char: Option<char>,
    /// Lead cell of the last printed cluster (1-based row, col).
    last_cell: Option<(u16, u16)>,
    /// Last graphic character, for REP.
    last_graphic: Option<char>,
}

impl Screen<CompactCell> {
    /// A screen with the default cell representation and no collaborators.
    #[must_use]
    pub fn new(page: PageSize, max_history: LineCount) -> Self {
        Self::with_collaborators(page, max_history, Box::new(()), Box::new(()), None)
    }
}

impl<C: Cell> Screen<C> {
    /// Full constructor: page size, scrollback capacity, reply sink,
    /// notifier, and an optional initial rendition.
    #[must_use]
    pub fn with_collaborators(
        page: PageSize,
        max_history: LineCount,
        reply: Box<dyn ReplySink>,
        notifier: Box<dyn Notifier>,
        initial_sgr: Option<GraphicsAttributes>,
    ) -> Self {
        let mut grid = Grid::new(page, max_history);
        if let Some(sgr) = initial_sgr {
            grid.cursor.graphics = sgr;
        }
        Self {
            grid,
            modes: Modes::default(),
            hyperlinks: HyperlinkRegistry::new(),
            reply,
            notifier,
            osc: Vec::new(),
            last_char: None,
            last_cell: None,
            last_graphic: None,
        }
    }

    // ── State access ────────────────────────────────────────────────

    #[must_use]
    pub fn page_size(&self) -> PageSize {
        self.grid.page_size()
    }

    #[must_use]
    pub fn grid(&self) -> &Grid<C> {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid<C> {
        &mut self.grid
    }

    #[must_use]
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    #[must_use]
    pub fn hyperlinks(&self) -> &HyperlinkRegistry {
        &self.hyperlinks
    }

    /// 1-based cursor position in real screen coordinates.
    #[must_use]
    pub fn cursor_position(&self) -> (u16, u16) {
        (self.grid.cursor.row, self.grid.cursor.col)
    }

    /// 1-based cursor position relative to the origin (margin-relative when
    /// DECOM is on). This is what CPR reports.
    #[must_use]
    pub fn logical_cursor_position(&self) -> (u16, u16) {
        let cursor = &self.grid.cursor;
        if cursor.origin_mode {
            (
                cursor.row.saturating_sub(self.grid.margin.vertical.from) + 1,
                cursor.col.saturating_sub(self.grid.margin.horizontal.from) + 1,
            )
        } else {
            (cursor.row, cursor.col)
        }
    }

    /// Cell at a grid location (negative lines reach scrollback).
    ///
    /// Inflates the owning line; do not hold the reference across writes.
    pub fn at(&mut self, pos: CellLocation) -> &C {
        self.grid
            .line_at_mut(pos.line)
            .use_cell_at(pos.column.0)
    }

    /// Rendered text of the cell at `pos` without forcing inflation.
    #[must_use]
    pub fn cell_text_at(&self, pos: CellLocation) -> String {
        self.grid.line_at(pos.line).text_range(pos.column.0, pos.column.0)
    }

    /// Hyperlink URI under the given position, if any.
    #[must_use]
    pub fn hyperlink_uri_at(&self, pos: CellLocation) -> Option<&str> {
        let id = self.grid.line_at(pos.line).hyperlink_at(pos.column.0);
        self.hyperlinks.get(id)
    }

    pub fn mark_line(&mut self, line: LineOffset, marked: bool) {
        self.grid
            .line_at_mut(line)
            .set_flag(LineFlags::MARKED, marked);
    }

    // ── Render queries ──────────────────────────────────────────────

    /// The full page as text: one line per row, each terminated by `\n`.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for row in 1..=self.grid.rows() {
            out.push_str(&self.grid.line_text(LineOffset::from_screen_row(row)));
            out.push('\n');
        }
        out
    }

    /// Text of a single 1-based page row.
    #[must_use]
    pub fn render_text_line(&self, row: u16) -> String {
        assert!((1..=self.grid.rows()).contains(&row), "row {row} out of page");
        self.grid.line_text(LineOffset::from_screen_row(row))
    }

    /// Text of a scrollback row; index 0 is the most recently evicted line.
    #[must_use]
    pub fn render_history_text_line(&self, index: usize) -> Option<String> {
        self.grid.history_text_line(index)
    }

    /// Extract the selected text for a completed selection.
    ///
    /// Ranges on soft-wrapped line boundaries join without a newline.
    #[must_use]
    pub fn selection_text(&self, selector: &Selector) -> String {
        let ranges = selector.ranges();
        let mut out = String::new();
        for (i, range) in ranges.iter().enumerate() {
            if !self.grid.contains_line(range.line) {
                continue;
            }
            let line = self.grid.line_at(range.line);
            let text = line.text_range(range.from.0, range.to.0);
            out.push_str(text.trim_end_matches(' '));
            if let Some(next) = ranges.get(i + 1)
                && !self.is_line_wrapped(next.line)
            {
                out.push('\n');
            }
        }
        out
    }

    /// Resize the page, reflowing content (see [`Grid::resize`]).
    pub fn resize(&mut self, page: PageSize) {
        let fill = self.grid.cursor.graphics;
        self.grid.resize(page, fill);
        self.last_char = None;
        self.last_cell = None;
    }

    // ── Write path ──────────────────────────────────────────────────

    fn write_char(&mut self, raw: char) {
        let charset = self.grid.cursor.charsets.take_active();
        let ch = translate_charset(charset, raw);

        if self.try_append_to_cluster(ch) {
            return;
        }

        let width = display_width(ch);
        if width == 0 {
            // Combining mark with no base cell; nothing to attach to.
            return;
        }

        if self.grid.cursor.pending_wrap {
            if self.modes.dec.autowrap {
                self.soft_wrap();
            } else {
                self.grid.cursor.pending_wrap = false;
            }
        }

        let boundary = self.right_boundary();
        if width == 2 && self.grid.cursor.col + 1 > boundary {
            // A wide character cannot straddle the boundary.
            if self.modes.dec.autowrap {
                self.soft_wrap();
            } else {
                return;
            }
        }

        if self.modes.ansi.insert {
            self.insert_blank_cells(u16::from(width));
        }

        let (row, col) = (self.grid.cursor.row, self.grid.cursor.col);
        self.put_cell(row, col, ch, width);
        self.last_char = Some(ch);
        self.last_cell = Some((row, col));
        self.last_graphic = Some(ch);
        self.advance_cursor_from(col, u16::from(width));
    }

    /// Append `ch` to the previous cell when the grapheme segmenter does
    /// not break between them. Handles a cluster growing wide (VS16).
    fn try_append_to_cluster(&mut self, ch: char) -> bool {
        let Some(last) = self.last_char else {
            return false;
        };
        if is_grapheme_boundary(last, ch) {
            return false;
        }
        let Some((row, col)) = self.last_cell else {
            return false;
        };

        let boundary = self.right_boundary();
        let grown = {
            let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
            let cell = line.use_cell_at(col - 1);
            cell.append_character(ch)
        };
        self.last_char = Some(ch);

        if grown == 2 {
            if col + 1 > boundary {
                // No room for the continuation half; keep the cluster narrow.
                let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
                line.use_cell_at(col - 1).set_width(1);
            } else {
                let attrs = self.grid.cursor.graphics;
                let link = self.grid.cursor.hyperlink;
                let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
                let cells = line.cells_mut();
                let idx = col as usize; // continuation position, 0-based
                if cells[idx].width() == 2 && idx + 1 < cells.len() {
                    cells[idx + 1].reset(attrs);
                }
                cells[idx] = C::continuation(attrs, link);
                self.grid.cursor.pending_wrap = false;
                self.advance_cursor_from(col, 2);
            }
        }
        true
    }

    fn put_cell(&mut self, row: u16, col: u16, ch: char, width: u8) {
        let attrs = self.grid.cursor.graphics;
        let link = self.grid.cursor.hyperlink;
        let wrappable = self.modes.dec.autowrap;
        let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
        // Writing stamps the line with the current autowrap setting, so
        // reflow later knows whether this row may re-wrap.
        line.set_flag(LineFlags::WRAPPABLE, wrappable);

        if width == 1 {
            let mut buf = [0u8; 4];
            let text = ch.encode_utf8(&mut buf);
            if line.try_emplace_text(col - 1, text, 1, attrs, link) {
                return;
            }
        }

        let cells = line.cells_mut();
        let idx = (col - 1) as usize;
        // Overwriting half of a wide character orphans the other half.
        if idx > 0 && cells[idx].is_wide_continuation() {
            cells[idx - 1].reset(attrs);
        }
        if cells[idx].width() == 2 && idx + 1 < cells.len() {
            cells[idx + 1].reset(attrs);
        }
        cells[idx].write(attrs, ch, width);
        cells[idx].set_hyperlink(link);
        if width == 2 && idx + 1 < cells.len() {
            if cells[idx + 1].width() == 2 && idx + 2 < cells.len() {
                cells[idx + 2].reset(attrs);
            }
            cells[idx + 1] = C::continuation(attrs, link);
        }
    }

    /// Move the cursor past a cell written at `col` with the given width,
    /// latching pending-wrap at the boundary.
    fn advance_cursor_from(&mut self, col: u16, width: u16) {
        let boundary = self.right_boundary();
        let next = col + width;
        if next > boundary {
            self.grid.cursor.col = boundary;
            self.grid.cursor.pending_wrap = self.modes.dec.autowrap;
        } else {
            self.grid.cursor.col = next;
            self.grid.cursor.pending_wrap = false;
        }
    }

    /// Autowrap: continue on the next line, marking it as a soft-wrap
    /// continuation.
    fn soft_wrap(&mut self) {
        self.grid.cursor.pending_wrap = false;
        self.linefeed_impl(true);
    }

    // ── Cursor motion helpers ───────────────────────────────────────

    fn top_boundary(&self) -> u16 {
        let top = self.grid.margin.vertical.from;
        if self.grid.cursor.row >= top { top } else { 1 }
    }

    fn bottom_boundary(&self) -> u16 {
        let bottom = self.grid.margin.vertical.to;
        if self.grid.cursor.row <= bottom {
            bottom
        } else {
            self.grid.rows()
        }
    }

    fn left_boundary(&self) -> u16 {
        let left = self.grid.margin.horizontal.from;
        if self.grid.cursor.col >= left { left } else { 1 }
    }

    fn right_boundary(&self) -> u16 {
        let right = self.grid.margin.horizontal.to;
        if self.grid.cursor.col <= right {
            right
        } else {
            self.grid.columns()
        }
    }

    fn carriage_return(&mut self) {
        let cursor = &mut self.grid.cursor;
        cursor.pending_wrap = false;
        cursor.col = if cursor.origin_mode || cursor.col >= self.grid.margin.horizontal.from {
            self.grid.margin.horizontal.from
        } else {
            1
        };
    }

    /// Line feed: move down (scrolling at the bottom margin) and return to
    /// the line start, per the engine's newline semantics.
    fn linefeed(&mut self) {
        self.linefeed_impl(false);
    }

    fn linefeed_impl(&mut self, soft_wrap: bool) {
        self.index();
        self.carriage_return();
        if soft_wrap {
            let row = self.grid.cursor.row;
            self.grid
                .line_at_mut(LineOffset::from_screen_row(row))
                .set_flag(LineFlags::WRAPPED, true);
        }
    }

    /// IND: move down one line; at the bottom margin the region scrolls up.
    fn index(&mut self) {
        self.grid.cursor.pending_wrap = false;
        let bottom = self.grid.margin.vertical.to;
        let row = self.grid.cursor.row;
        if row == bottom {
            let margin = self.effective_margin();
            let fill = self.grid.cursor.graphics;
            self.grid.scroll_up(1, margin, fill);
        } else if row < self.grid.rows() {
            self.grid.cursor.row += 1;
        }
        self.last_cell = None;
        self.last_char = None;
    }

    /// RI: move up one line; at the top margin the region scrolls down.
    fn reverse_index(&mut self) {
        self.grid.cursor.pending_wrap = false;
        let top = self.grid.margin.vertical.from;
        let row = self.grid.cursor.row;
        if row == top {
            let margin = self.effective_margin();
            let fill = self.grid.cursor.graphics;
            self.grid.scroll_down(1, margin, fill);
        } else if row > 1 {
            self.grid.cursor.row -= 1;
        }
        self.last_cell = None;
        self.last_char = None;
    }

    /// DECBI: move left; at the left margin the region shifts right.
    fn back_index(&mut self) {
        self.grid.cursor.pending_wrap = false;
        if self.grid.cursor.col == self.grid.margin.horizontal.from {
            self.horizontal_pan(false);
        } else if self.grid.cursor.col > 1 {
            self.grid.cursor.col -= 1;
        }
    }

    /// DECFI: move right; at the right margin the region shifts left.
    fn forward_index(&mut self) {
        self.grid.cursor.pending_wrap = false;
        if self.grid.cursor.col == self.grid.margin.horizontal.to {
            self.horizontal_pan(true);
        } else if self.grid.cursor.col < self.grid.columns() {
            self.grid.cursor.col += 1;
        }
    }

    /// Shift the margin area one column left (`true`) or right (`false`).
    fn horizontal_pan(&mut self, left: bool) {
        let fill = self.grid.cursor.graphics;
        let margin = self.grid.margin;
        let (l, r) = (margin.horizontal.from - 1, margin.horizontal.to - 1);
        for row in margin.vertical.from..=margin.vertical.to {
            let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
            let cells = line.cells_mut();
            if left {
                for i in l as usize..r as usize {
                    cells[i] = cells[i + 1].clone();
                }
                cells[r as usize].reset(fill);
            } else {
                for i in ((l as usize + 1)..=r as usize).rev() {
                    cells[i] = cells[i - 1].clone();
                }
                cells[l as usize].reset(fill);
            }
        }
    }

    fn move_cursor_up(&mut self, n: u16) {
        let floor = self.top_boundary();
        let cursor = &mut self.grid.cursor;
        cursor.row = cursor.row.saturating_sub(n).max(floor);
        cursor.pending_wrap = false;
    }

    fn move_cursor_down(&mut self, n: u16) {
        let cap = self.bottom_boundary();
        let cursor = &mut self.grid.cursor;
        cursor.row = cursor.row.saturating_add(n).min(cap);
        cursor.pending_wrap = false;
    }

    fn move_cursor_forward(&mut self, n: u16) {
        let cap = self.right_boundary();
        let cursor = &mut self.grid.cursor;
        cursor.col = cursor.col.saturating_add(n).min(cap);
        cursor.pending_wrap = false;
    }

    fn move_cursor_backward(&mut self, n: u16) {
        let floor = self.left_boundary();
        let cursor = &mut self.grid.cursor;
        cursor.col = cursor.col.saturating_sub(n).max(floor);
        cursor.pending_wrap = false;
    }

    fn backspace(&mut self) {
        self.move_cursor_backward(1);
    }

    /// CUP/HVP: absolute positioning, margin-relative under DECOM.
    fn move_cursor_to(&mut self, row: u16, col: u16) {
        let margin = self.grid.margin;
        let rows = self.grid.rows();
        let columns = self.grid.columns();
        let cursor = &mut self.grid.cursor;
        cursor.pending_wrap = false;
        if cursor.origin_mode {
            cursor.row = margin
                .vertical
                .from
                .saturating_add(row.saturating_sub(1))
                .min(margin.vertical.to);
            cursor.col = margin
                .horizontal
                .from
                .saturating_add(col.saturating_sub(1))
                .min(margin.horizontal.to);
        } else {
            cursor.row = row.min(rows).max(1);
            cursor.col = col.min(columns).max(1);
        }
        self.last_char = None;
        self.last_cell = None;
    }

    fn move_cursor_to_line(&mut self, row: u16) {
        let col = if self.grid.cursor.origin_mode {
            self.grid
                .cursor
                .col
                .saturating_sub(self.grid.margin.horizontal.from)
                + 1
        } else {
            self.grid.cursor.col
        };
        self.move_cursor_to(row, col);
    }

    fn move_cursor_to_column(&mut self, col: u16) {
        let row = if self.grid.cursor.origin_mode {
            self.grid
                .cursor
                .row
                .saturating_sub(self.grid.margin.vertical.from)
                + 1
        } else {
            self.grid.cursor.row
        };
        self.move_cursor_to(row, col);
    }

    fn cursor_next_line(&mut self, n: u16) {
        self.move_cursor_down(n);
        self.carriage_return();
    }

    fn cursor_prev_line(&mut self, n: u16) {
        self.move_cursor_up(n);
        self.carriage_return();
    }

    /// HT / CHT: forward over tab stops, clamped at the right margin.
    fn move_cursor_to_next_tab(&mut self) {
        let limit = self.right_boundary();
        let cursor_col = self.grid.cursor.col;
        self.grid.cursor.col = self.grid.next_tab_stop(cursor_col, limit);
        self.grid.cursor.pending_wrap = false;
    }

    fn cursor_forward_tab(&mut self, count: u16) {
        for _ in 0..count {
            self.move_cursor_to_next_tab();
        }
    }

    fn cursor_backward_tab(&mut self, count: u16) {
        let floor = self.left_boundary();
        for _ in 0..count {
            let col = self.grid.cursor.col;
            self.grid.cursor.col = self.grid.prev_tab_stop(col, floor);
        }
        self.grid.cursor.pending_wrap = false;
    }

    // ── Margins and region ──────────────────────────────────────────

    /// The margin the scroll commands see: horizontal bands apply only
    /// under DECLRMM.
    fn effective_margin(&self) -> Margin {
        let mut margin = self.grid.margin;
        if !self.modes.dec.left_right_margin {
            margin.horizontal = Band {
                from: 1,
                to: self.grid.columns(),
            };
        }
        margin
    }

    /// DECSTBM. Out-of-range or non-increasing pairs are ignored.
    fn set_top_bottom_margin(&mut self, top: u16, bottom: u16) {
        let bottom = if bottom == 0 { self.grid.rows() } else { bottom };
        let Some(band) = Band::checked(top.max(1), bottom.min(self.grid.rows())) else {
            return;
        };
        self.grid.margin.vertical = band;
        self.move_cursor_to(1, 1);
    }

    /// DECSLRM; requires DECLRMM.
    fn set_left_right_margin(&mut self, left: u16, right: u16) {
        if !self.modes.dec.left_right_margin {
            return;
        }
        let right = if right == 0 { self.grid.columns() } else { right };
        let Some(band) = Band::checked(left.max(1), right.min(self.grid.columns())) else {
            return;
        };
        self.grid.margin.horizontal = band;
        self.move_cursor_to(1, 1);
    }

    // ── Erase / insert / delete ─────────────────────────────────────

    fn clear_to_end_of_line(&mut self) {
        let fill = self.grid.cursor.graphics;
        let (row, col) = (self.grid.cursor.row, self.grid.cursor.col);
        let width = self.grid.columns();
        self.grid
            .line_at_mut(LineOffset::from_screen_row(row))
            .blank_range(col - 1, width - 1, fill);
    }

    fn clear_to_begin_of_line(&mut self) {
        let fill = self.grid.cursor.graphics;
        let (row, col) = (self.grid.cursor.row, self.grid.cursor.col);
        self.grid
            .line_at_mut(LineOffset::from_screen_row(row))
            .blank_range(0, col - 1, fill);
    }

    fn clear_line(&mut self) {
        let fill = self.grid.cursor.graphics;
        let row = self.grid.cursor.row;
        self.grid
            .line_at_mut(LineOffset::from_screen_row(row))
            .blank_out(fill);
    }

    fn clear_to_end_of_screen(&mut self) {
        self.clear_to_end_of_line();
        let fill = self.grid.cursor.graphics;
        for row in self.grid.cursor.row + 1..=self.grid.rows() {
            self.grid
                .line_at_mut(LineOffset::from_screen_row(row))
                .blank_out(fill);
        }
    }

    fn clear_to_begin_of_screen(&mut self) {
        self.clear_to_begin_of_line();
        let fill = self.grid.cursor.graphics;
        for row in 1..self.grid.cursor.row {
            self.grid
                .line_at_mut(LineOffset::from_screen_row(row))
                .blank_out(fill);
        }
    }

    /// ED 2: the page scrolls into history before blanking, so a full clear
    /// never destroys content that scrollback could retain.
    fn clear_screen(&mut self) {
        let fill = self.grid.cursor.graphics;
        let rows = self.grid.rows();
        self.grid
            .scroll_up(rows, Margin::fullscreen(self.page_size()), fill);
    }

    fn erase_characters(&mut self, n: u16) {
        let fill = self.grid.cursor.graphics;
        let (row, col) = (self.grid.cursor.row, self.grid.cursor.col);
        let to = (col - 1).saturating_add(n.max(1) - 1);
        self.grid
            .line_at_mut(LineOffset::from_screen_row(row))
            .blank_range(col - 1, to, fill);
    }

    fn insert_blank_cells(&mut self, n: u16) {
        let (row, col) = (self.grid.cursor.row, self.grid.cursor.col);
        let right = self.right_boundary();
        if col > right {
            return;
        }
        let fill = self.grid.cursor.graphics;
        let n = n.max(1).min(right - col + 1);
        let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
        let cells = line.cells_mut();
        let (l, r) = ((col - 1) as usize, (right - 1) as usize);
        if l > 0 && cells[l].is_wide_continuation() {
            cells[l - 1].reset(fill);
        }
        for i in ((l + n as usize)..=r).rev() {
            cells[i] = cells[i - n as usize].clone();
        }
        for cell in &mut cells[l..l + n as usize] {
            cell.reset(fill);
        }
        // A wide head shifted against the right edge loses its other half.
        if cells[r].width() == 2 {
            cells[r].reset(fill);
        }
    }

    fn delete_characters(&mut self, n: u16) {
        let (row, col) = (self.grid.cursor.row, self.grid.cursor.col);
        let right = self.right_boundary();
        if col > right {
            return;
        }
        let fill = self.grid.cursor.graphics;
        let n = (n.max(1)).min(right - col + 1) as usize;
        let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
        let cells = line.cells_mut();
        let (l, r) = ((col - 1) as usize, (right - 1) as usize);
        if l > 0 && cells[l].is_wide_continuation() {
            cells[l - 1].reset(fill);
        }
        for i in l..=r - n.min(r - l) {
            let src = i + n;
            cells[i] = if src <= r {
                cells[src].clone()
            } else {
                C::filled(fill)
            };
        }
        for cell in &mut cells[(r + 1 - n.min(r + 1 - l))..=r] {
            cell.reset(fill);
        }
        if cells[l].is_wide_continuation() {
            cells[l].reset(fill);
        }
    }

    fn insert_lines(&mut self, n: u16) {
        let margin = self.effective_margin();
        let cursor = &self.grid.cursor;
        if !margin.vertical.contains(cursor.row) || !margin.horizontal.contains(cursor.col) {
            return;
        }
        let row = cursor.row;
        let fill = cursor.graphics;
        self.grid.insert_lines(row, n.max(1), margin, fill);
        self.grid.cursor.pending_wrap = false;
    }

    fn delete_lines(&mut self, n: u16) {
        let margin = self.effective_margin();
        let cursor = &self.grid.cursor;
        if !margin.vertical.contains(cursor.row) || !margin.horizontal.contains(cursor.col) {
            return;
        }
        let row = cursor.row;
        let fill = cursor.graphics;
        self.grid.delete_lines(row, n.max(1), margin, fill);
        self.grid.cursor.pending_wrap = false;
    }

    fn scroll_up(&mut self, n: u16) {
        let margin = self.effective_margin();
        let fill = self.grid.cursor.graphics;
        self.grid.scroll_up(n.max(1), margin, fill);
    }

    fn scroll_down(&mut self, n: u16) {
        let margin = self.effective_margin();
        let fill = self.grid.cursor.graphics;
        self.grid.scroll_down(n.max(1), margin, fill);
    }

    /// DECALN: fill the page with `E`, reset margins, home the cursor.
    fn screen_alignment_pattern(&mut self) {
        for row in 1..=self.grid.rows() {
            self.grid
                .line_at_mut(LineOffset::from_screen_row(row))
                .fill_with('E', GraphicsAttributes::default());
        }
        self.grid.margin = Margin::fullscreen(self.page_size());
        self.grid.cursor.pending_wrap = false;
        self.grid.cursor.row = 1;
        self.grid.cursor.col = 1;
    }

    // ── Modes, save/restore, resets ─────────────────────────────────

    fn set_dec_mode(&mut self, mode: u16, enabled: bool) {
        if !self.modes.set_dec(mode, enabled) {
            tracing::trace!(mode, enabled, "ignoring unknown DEC private mode");
            return;
        }
        match mode {
            6 => {
                self.grid.cursor.origin_mode = enabled;
                self.move_cursor_to(1, 1);
            }
            7 => {
                self.grid.set_default_wrappable(enabled);
                if !enabled {
                    self.grid.cursor.pending_wrap = false;
                }
            }
            69 if !enabled => {
                self.grid.margin.horizontal = Band {
                    from: 1,
                    to: self.grid.columns(),
                };
            }
            _ => {}
        }
    }

    fn save_cursor(&mut self) {
        let saved = SavedCursor {
            cursor: self.grid.cursor.clone(),
            autowrap: self.modes.dec.autowrap,
        };
        self.grid.saved_cursors.push(saved);
    }

    fn restore_cursor(&mut self) {
        let saved = self.grid.saved_cursors.pop().unwrap_or(SavedCursor {
            cursor: crate::cursor::Cursor::default(),
            autowrap: true,
        });
        self.grid.cursor = saved.cursor;
        self.grid.cursor.row = self.grid.cursor.row.min(self.grid.rows()).max(1);
        self.grid.cursor.col = self.grid.cursor.col.min(self.grid.columns()).max(1);
        self.modes.dec.autowrap = saved.autowrap;
        self.modes.dec.origin = self.grid.cursor.origin_mode;
        self.grid.set_default_wrappable(saved.autowrap);
        self.last_char = None;
        self.last_cell = None;
    }

    /// RIS: everything back to construction state; scrollback dropped.
    fn hard_reset(&mut self) {
        let page = self.grid.page_size();
        let history = LineCount(self.grid.max_history() as u16);
        self.grid = Grid::new(page, history);
        self.modes = Modes::default();
        self.hyperlinks.clear();
        self.osc.clear();
        self.last_char = None;
        self.last_cell = None;
        self.last_graphic = None;
    }

    /// DECSTR: reset modes, rendition, margins, and saved cursors; screen
    /// content and cursor position survive.
    fn soft_reset(&mut self) {
        self.modes = Modes::default();
        self.grid.set_default_wrappable(true);
        self.grid.margin = Margin::fullscreen(self.page_size());
        self.grid.cursor.graphics.reset();
        self.grid.cursor.origin_mode = false;
        self.grid.cursor.pending_wrap = false;
        self.grid.cursor.charsets = Default::default();
        self.grid.cursor.hyperlink = 0;
        self.grid.saved_cursors.clear();
    }

    // ── Reports ─────────────────────────────────────────────────────

    fn reply_str(&mut self, text: &str) {
        self.reply.write_reply(text.as_bytes());
    }

    /// CPR: `ESC [ r ; c R`, origin-relative.
    fn report_cursor_position(&mut self) {
        let (row, col) = self.logical_cursor_position();
        self.reply_str(&format!("\x1b[{row};{col}R"));
    }

    /// DECXCPR: `ESC [ r ; c ; 1 R` (page 1).
    fn report_extended_cursor_position(&mut self) {
        let (row, col) = self.logical_cursor_position();
        self.reply_str(&format!("\x1b[{row};{col};1R"));
    }

    fn send_device_attributes(&mut self) {
        self.reply_str("\x1b[?62;22c");
    }

    fn send_secondary_device_attributes(&mut self) {
        self.reply_str("\x1b[>61;0;0c");
    }

    fn report_dec_mode(&mut self, mode: u16) {
        let value = match self.modes.dec_mode(mode) {
            Some(true) => 1,
            Some(false) => 2,
            None => 0,
        };
        self.reply_str(&format!("\x1b[?{mode};{value}$y"));
    }

    // ── SGR ─────────────────────────────────────────────────────────

    fn apply_sgr(&mut self, params: &Params) {
        if params.is_empty() {
            self.grid.cursor.graphics.reset();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            let p = params.get_or_zero(i);
            let g = &mut self.grid.cursor.graphics;
            match p {
                0 => g.reset(),
                1 => g.flags.insert(SgrFlags::BOLD),
                2 => g.flags.insert(SgrFlags::FAINT),
                3 => g.flags.insert(SgrFlags::ITALIC),
                4 => {
                    if params.is_sub(i + 1) {
                        i += 1;
                        self.apply_underline_style(params.get_or_zero(i));
                    } else {
                        g.flags.insert(SgrFlags::UNDERLINE);
                        g.underline_style = UnderlineStyle::Straight;
                    }
                }
                5 => g.flags.insert(SgrFlags::BLINK),
                6 => g.flags.insert(SgrFlags::RAPID_BLINK),
                7 => g.flags.insert(SgrFlags::INVERSE),
                8 => g.flags.insert(SgrFlags::HIDDEN),
                9 => g.flags.insert(SgrFlags::CROSSED_OUT),
                21 => g.flags.insert(SgrFlags::DOUBLY_UNDERLINED),
                22 => g.flags.remove(SgrFlags::BOLD | SgrFlags::FAINT),
                23 => g.flags.remove(SgrFlags::ITALIC),
                24 => {
                    g.flags.remove(
                        SgrFlags::UNDERLINE
                            | SgrFlags::DOUBLY_UNDERLINED
                            | SgrFlags::CURLY_UNDERLINED,
                    );
                    g.underline_style = UnderlineStyle::Straight;
                }
                25 => g.flags.remove(SgrFlags::BLINK | SgrFlags::RAPID_BLINK),
                27 => g.flags.remove(SgrFlags::INVERSE),
                28 => g.flags.remove(SgrFlags::HIDDEN),
                29 => g.flags.remove(SgrFlags::CROSSED_OUT),
                30..=37 => g.fg = Color::Named((p - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(params, &mut i) {
                        self.grid.cursor.graphics.fg = color;
                    }
                }
                39 => g.fg = Color::Default,
                40..=47 => g.bg = Color::Named((p - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(params, &mut i) {
                        self.grid.cursor.graphics.bg = color;
                    }
                }
                49 => g.bg = Color::Default,
                51 => g.flags.insert(SgrFlags::FRAMED),
                52 => g.flags.insert(SgrFlags::ENCIRCLED),
                53 => g.flags.insert(SgrFlags::OVERLINE),
                54 => g.flags.remove(SgrFlags::FRAMED | SgrFlags::ENCIRCLED),
                55 => g.flags.remove(SgrFlags::OVERLINE),
                58 => {
                    if let Some(color) = extended_color(params, &mut i) {
                        self.grid.cursor.graphics.underline_color = Some(color);
                    }
                }
                59 => g.underline_color = None,
                90..=97 => g.fg = Color::Named((p - 90 + 8) as u8),
                100..=107 => g.bg = Color::Named((p - 100 + 8) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    fn apply_underline_style(&mut self, style: u16) {
        let g = &mut self.grid.cursor.graphics;
        g.flags.remove(
            SgrFlags::UNDERLINE | SgrFlags::DOUBLY_UNDERLINED | SgrFlags::CURLY_UNDERLINED,
        );
        let (flag, style) = match style {
            0 => {
                g.underline_style = UnderlineStyle::Straight;
                return;
            }
            1 => (SgrFlags::UNDERLINE, UnderlineStyle::Straight),
            2 => (SgrFlags::DOUBLY_UNDERLINED, UnderlineStyle::Double),
            3 => (SgrFlags::CURLY_UNDERLINED, UnderlineStyle::Curly),
            4 => (SgrFlags::UNDERLINE, UnderlineStyle::Dotted),
            5 => (SgrFlags::UNDERLINE, UnderlineStyle::Dashed),
            _ => (SgrFlags::UNDERLINE, UnderlineStyle::Straight),
        };
        g.flags.insert(flag);
        g.underline_style = style;
    }

    // ── OSC ─────────────────────────────────────────────────────────

    fn dispatch_osc(&mut self) {
        let data = std::mem::take(&mut self.osc);
        let Some(semi) = data.iter().position(|&b| b == b';') else {
            return;
        };
        let Ok(cmd) = core::str::from_utf8(&data[..semi]) else {
            return;
        };
        let Ok(cmd) = cmd.parse::<u16>() else {
            return;
        };
        let rest = &data[semi + 1..];
        match cmd {
            0 | 2 => {
                let title = String::from_utf8_lossy(rest);
                self.notifier.notify(&title);
            }
            8 => {
                // OSC 8 ; params ; uri
                let Some(second) = rest.iter().position(|&b| b == b';') else {
                    return;
                };
                let uri = String::from_utf8_lossy(&rest[second + 1..]);
                self.grid.cursor.hyperlink = self.hyperlinks.intern(&uri);
            }
            _ => {
                tracing::trace!(cmd, "ignoring unhandled OSC");
            }
        }
    }
}

/// Whether the grapheme segmenter breaks between two adjacent codepoints.
fn is_grapheme_boundary(a: char, b: char) -> bool {
    use unicode_segmentation::UnicodeSegmentation;
    if a.is_ascii() && b.is_ascii() {
        // ASCII pairs always break (CR LF never reaches the print path).
        return true;
    }
    let mut buf = [0u8; 8];
    let a_len = a.encode_utf8(&mut buf).len();
    let b_len = b.encode_utf8(&mut buf[a_len..]).len();
    match core::str::from_utf8(&buf[..a_len + b_len]) {
        Ok(s) => s.graphemes(true).count() > 1,
        Err(_) => true,
    }
}

/// Decode an SGR 38/48/58 extended color, advancing `i` past the consumed
/// parameters. Handles both semicolon and colon (with or without a
/// colorspace id) forms.
fn extended_color(params: &Params, i: &mut usize) -> Option<Color> {
    let base = *i;
    if params.is_sub(base + 1) {
        let mut run: Vec<u16> = Vec::new();
        let mut j = base + 1;
        while j < params.len() && params.is_sub(j) {
            run.push(params.get_or_zero(j));
            j += 1;
        }
        *i = j - 1;
        match run.first() {
            Some(5) => run.get(1).map(|&n| Color::Indexed(n.min(255) as u8)),
            Some(2) => {
                let rgb = if run.len() >= 5 { &run[2..5] } else { run.get(1..4)? };
                Some(Color::Rgb(
                    rgb[0].min(255) as u8,
                    rgb[1].min(255) as u8,
                    rgb[2].min(255) as u8,
                ))
            }
            _ => None,
        }
    } else {
        match params.get(base + 1) {
            Some(5) => {
                *i = base + 2;
                Some(Color::Indexed(params.get_or_zero(base + 2).min(255) as u8))
            }
            Some(2) => {
                *i = base + 4;
                Some(Color::Rgb(
                    params.get_or_zero(base + 2).min(255) as u8,
                    params.get_or_zero(base + 3).min(255) as u8,
                    params.get_or_zero(base + 4).min(255) as u8,
                ))
            }
            _ => None,
        }
    }
}

// ── Parser event wiring ─────────────────────────────────────────────

impl<C: Cell> Events for Screen<C> {
    fn print(&mut self, ch: char) {
        self.write_char(ch);
    }

    fn print_run(&mut self, text: &str, cell_count: usize) -> usize {
        // Fast path: plain run into a trivial line, no wrap involved.
        let boundary = self.right_boundary();
        let cursor = &self.grid.cursor;
        let charsets = &cursor.charsets;
        let plain = charsets.single_shift.is_none()
            && charsets.slots[charsets.active] == CharsetId::UsAscii;
        if plain
            && !cursor.pending_wrap
            && !self.modes.ansi.insert
            && cell_count <= usize::from(boundary.saturating_sub(cursor.col) + 1)
        {
            let (row, col) = (cursor.row, cursor.col);
            let attrs = cursor.graphics;
            let link = cursor.hyperlink;
            let wrappable = self.modes.dec.autowrap;
            let line = self.grid.line_at_mut(LineOffset::from_screen_row(row));
            let emplaced = line.try_emplace_text(col - 1, text, cell_count as u16, attrs, link);
            if emplaced {
                line.set_flag(LineFlags::WRAPPABLE, wrappable);
                let last_col = col + cell_count as u16 - 1;
                self.last_char = text.chars().next_back();
                self.last_graphic = self.last_char;
                self.last_cell = Some((row, last_col));
                self.advance_cursor_from(last_col, 1);
                let cursor = &self.grid.cursor;
                return if cursor.pending_wrap {
                    0
                } else {
                    usize::from(boundary - cursor.col + 1)
                };
            }
        }
        for ch in text.chars() {
            self.write_char(ch);
        }
        let cursor = &self.grid.cursor;
        if cursor.pending_wrap {
            0
        } else {
            usize::from(self.right_boundary().saturating_sub(cursor.col) + 1)
        }
    }

    fn execute(&mut self, control: u8) {
        self.last_char = None;
        match control {
            0x0A | 0x0B | 0x0C => self.linefeed(),
            0x0D => self.carriage_return(),
            0x08 => self.backspace(),
            0x09 => self.move_cursor_to_next_tab(),
            0x0E => self.grid.cursor.charsets.active = 1, // SO
            0x0F => self.grid.cursor.charsets.active = 0, // SI
            0x07 => {}                                    // BEL
            _ => {}
        }
    }

    fn csi_dispatch(
        &mut self,
        private: Option<u8>,
        params: &Params,
        intermediates: &[u8],
        final_byte: u8,
    ) {
        self.last_char = None;

        if let Some(marker) = private {
            match (marker, intermediates, final_byte) {
                (b'?', [], b'h') => {
                    for &mode in params.values() {
                        self.set_dec_mode(mode, true);
                    }
                }
                (b'?', [], b'l') => {
                    for &mode in params.values() {
                        self.set_dec_mode(mode, false);
                    }
                }
                (b'?', [], b'n') if params.get_or_zero(0) == 6 => {
                    self.report_extended_cursor_position();
                }
                (b'?', [b'$'], b'p') => self.report_dec_mode(params.get_or_zero(0)),
                (b'>', [], b'c') => self.send_secondary_device_attributes(),
                _ => {
                    tracing::trace!(final_byte, "ignoring unhandled private CSI");
                }
            }
            return;
        }

        match (intermediates, final_byte) {
            ([], b'A') => self.move_cursor_up(params.get_or(0, 1)),
            ([], b'B') => self.move_cursor_down(params.get_or(0, 1)),
            ([], b'C') => self.move_cursor_forward(params.get_or(0, 1)),
            ([], b'D') => self.move_cursor_backward(params.get_or(0, 1)),
            ([], b'E') => self.cursor_next_line(params.get_or(0, 1)),
            ([], b'F') => self.cursor_prev_line(params.get_or(0, 1)),
            ([], b'G') => self.move_cursor_to_column(params.get_or(0, 1)),
            ([], b'H' | b'f') => {
                self.move_cursor_to(params.get_or(0, 1), params.get_or(1, 1));
            }
            ([], b'I') => {
                let count = params.get_or(0, 1).min(self.grid.columns());
                self.cursor_forward_tab(count);
            }
            ([], b'J') => match params.get_or_zero(0) {
                0 => self.clear_to_end_of_screen(),
                1 => self.clear_to_begin_of_screen(),
                2 => self.clear_screen(),
                3 => self.grid.clear_history(),
                _ => {}
            },
            ([], b'K') => match params.get_or_zero(0) {
                0 => self.clear_to_end_of_line(),
                1 => self.clear_to_begin_of_line(),
                2 => self.clear_line(),
                _ => {}
            },
            ([], b'L') => self.insert_lines(params.get_or(0, 1)),
            ([], b'M') => self.delete_lines(params.get_or(0, 1)),
            ([], b'P') => self.delete_characters(params.get_or(0, 1)),
            ([], b'S') => self.scroll_up(params.get_or(0, 1)),
            ([], b'T') => self.scroll_down(params.get_or(0, 1)),
            ([], b'X') => self.erase_characters(params.get_or(0, 1)),
            ([], b'Z') => {
                let count = params.get_or(0, 1).min(self.grid.columns());
                self.cursor_backward_tab(count);
            }
            ([], b'@') => self.insert_blank_cells(params.get_or(0, 1)),
            ([], b'b') => {
                // Repeats beyond one page row add nothing visible.
                let count = params.get_or(0, 1).min(self.grid.columns());
                if let Some(ch) = self.last_graphic {
                    for _ in 0..count {
                        self.write_char(ch);
                    }
                }
            }
            ([], b'c') if params.get_or_zero(0) == 0 => self.send_device_attributes(),
            ([], b'd') => self.move_cursor_to_line(params.get_or(0, 1)),
            ([], b'g') => match params.get_or_zero(0) {
                0 => {
                    let col = self.grid.cursor.col;
                    self.grid.clear_tab_stop(col);
                }
                3 => self.grid.clear_all_tab_stops(),
                _ => {}
            },
            ([], b'h') => {
                for &mode in params.values() {
                    self.modes.set_ansi(mode, true);
                }
            }
            ([], b'l') => {
                for &mode in params.values() {
                    self.modes.set_ansi(mode, false);
                }
            }
            ([], b'm') => self.apply_sgr(params),
            ([], b'n') => match params.get_or_zero(0) {
                5 => self.reply_str("\x1b[0n"),
                6 => self.report_cursor_position(),
                _ => {}
            },
            ([], b'r') => {
                self.set_top_bottom_margin(params.get_or(0, 1), params.get_or_zero(1));
            }
            ([], b's') => {
                if self.modes.dec.left_right_margin {
                    self.set_left_right_margin(params.get_or(0, 1), params.get_or_zero(1));
                } else if params.is_empty() {
                    self.save_cursor();
                }
            }
            ([], b'u') if params.is_empty() => self.restore_cursor(),
            ([b' '], b'q') => {} // DECSCUSR: shape is a host concern
            ([b'!'], b'p') => self.soft_reset(),
            _ => {
                tracing::trace!(final_byte, "ignoring unhandled CSI");
            }
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], final_byte: u8) {
        self.last_char = None;
        match (intermediates, final_byte) {
            ([], b'7') => self.save_cursor(),
            ([], b'8') => self.restore_cursor(),
            ([], b'D') => self.index(),
            ([], b'M') => self.reverse_index(),
            ([], b'E') => self.linefeed(),
            ([], b'H') => {
                let col = self.grid.cursor.col;
                self.grid.set_tab_stop(col);
            }
            ([], b'c') => self.hard_reset(),
            ([], b'6') => self.back_index(),
            ([], b'9') => self.forward_index(),
            ([], b'N') => self.grid.cursor.charsets.single_shift = Some(2),
            ([], b'O') => self.grid.cursor.charsets.single_shift = Some(3),
            ([], b'=' | b'>') => {} // keypad modes: input-side concern
            ([], b'\\') => {}       // ST after a string sequence
            ([b'#'], b'8') => self.screen_alignment_pattern(),
            ([b'('], designator) => {
                self.grid.cursor.charsets.slots[0] = CharsetId::from_designator(designator);
            }
            ([b')'], designator) => {
                self.grid.cursor.charsets.slots[1] = CharsetId::from_designator(designator);
            }
            ([b'*'], designator) => {
                self.grid.cursor.charsets.slots[2] = CharsetId::from_designator(designator);
            }
            ([b'+'], designator) => {
                self.grid.cursor.charsets.slots[3] = CharsetId::from_designator(designator);
            }
            _ => {
                tracing::trace!(final_byte, "ignoring unhandled ESC sequence");
            }
        }
    }

    fn osc_start(&mut self) {
        self.osc.clear();
    }

    fn osc_put(&mut self, byte: u8) {
        if self.osc.len() < MAX_OSC_LEN {
            self.osc.push(byte);
        }
    }

    fn osc_end(&mut self) {
        self.dispatch_osc();
    }

    fn dcs_hook(&mut self, _params: &Params, _intermediates: &[u8], final_byte: u8) {
        // DCS payloads (Sixel, DECRQSS, ...) are out of scope; consume them.
        tracing::trace!(final_byte, "consuming unhandled DCS sequence");
    }

    fn error(&mut self, message: &str) {
        tracing::trace!(message, "parse error");
        self.notifier.notify(message);
    }
}

impl<C: Cell> SelectionHelper for Screen<C> {
    fn page_size(&self) -> PageSize {
        self.grid.page_size()
    }

    fn is_line_wrapped(&self, line: LineOffset) -> bool {
        self.grid.contains_line(line) && self.grid.line_at(line).is_wrapped()
    }

    fn cell_empty(&self, pos: CellLocation) -> bool {
        if !self.grid.contains_line(pos.line) {
            return true;
        }
        // Selection-centric emptiness: a cell holding only a space is as
        // blank as an unwritten one.
        let line = self.grid.line_at(pos.line);
        line.cell_empty_at(pos.column.0) || line.text_range(pos.column.0, pos.column.0) == " "
    }

    fn cell_width(&self, pos: CellLocation) -> u8 {
        if self.grid.contains_line(pos.line) {
            self.grid.line_at(pos.line).cell_width_at(pos.column.0)
        } else {
            1
        }
    }
}
