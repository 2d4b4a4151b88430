//! User text selection over the grid.
//!
//! Selectors are computed ranges, never grid mutations. A selector is built
//! against a [`SelectionHelper`] — a small capability set the screen hands
//! out at construction time — so the selection logic needs no access to
//! cells, lines, or the grid itself. Line offsets may be negative: selection
//! reaches into scrollback with the same coordinates the grid uses.

use crate::primitives::{CellLocation, ColumnOffset, LineOffset, PageSize};

/// Capabilities a selector needs from the screen.
///
/// `cell_empty` is selection-centric: cells holding nothing *or a lone
/// space* count as empty, so word expansion stops at written blanks too.
pub trait SelectionHelper {
    fn page_size(&self) -> PageSize;
    /// Whether the line is a soft-wrap continuation of its predecessor.
    fn is_line_wrapped(&self, line: LineOffset) -> bool;
    fn cell_empty(&self, pos: CellLocation) -> bool;
    fn cell_width(&self, pos: CellLocation) -> u8;
}

/// One selected span on a single line, columns inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRange {
    pub line: LineOffset,
    pub from: ColumnOffset,
    pub to: ColumnOffset,
}

impl SelectionRange {
    /// Number of columns covered.
    #[must_use]
    pub fn length(&self) -> u16 {
        self.to.0 - self.from.0 + 1
    }
}

/// Selection expansion behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Cell-exact from anchor to head.
    Linear,
    /// Anchor and head expand to word boundaries (non-blank runs).
    LinearWordWise,
    /// Every touched line is taken whole, following soft wraps.
    FullLine,
    /// The same column band on every touched line, ignoring wraps.
    Rectangular,
}

/// An in-progress or completed selection.
///
/// The selector borrows its helper for its own lifetime only; dropping the
/// selector releases the screen.
pub struct Selector<'a> {
    helper: &'a dyn SelectionHelper,
    mode: SelectionMode,
    anchor: CellLocation,
    head: CellLocation,
    complete: bool,
}

impl<'a> Selector<'a> {
    #[must_use]
    pub fn new(helper: &'a dyn SelectionHelper, mode: SelectionMode, anchor: CellLocation) -> Self {
        Self {
            helper,
            mode,
            anchor,
            head: anchor,
            complete: false,
        }
    }

    #[must_use]
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    #[must_use]
    pub fn anchor(&self) -> CellLocation {
        self.anchor
    }

    #[must_use]
    pub fn head(&self) -> CellLocation {
        self.head
    }

    /// Move the selection head. Returns whether the selection changed;
    /// completed selections refuse further extension.
    pub fn extend(&mut self, to: CellLocation) -> bool {
        if self.complete {
            return false;
        }
        let clamped = self.clamp(to);
        let changed = clamped != self.head;
        self.head = clamped;
        changed
    }

    /// Freeze the selection.
    pub fn complete(&mut self) {
        self.complete = true;
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    fn clamp(&self, pos: CellLocation) -> CellLocation {
        let page = self.helper.page_size();
        CellLocation::new(
            LineOffset(pos.line.0.min(page.lines.0 as i32 - 1)),
            ColumnOffset(pos.column.0.min(page.columns.0 - 1)),
        )
    }

    /// The selected spans, one per touched line, top to bottom.
    #[must_use]
    pub fn ranges(&self) -> Vec<SelectionRange> {
        let (start, end) = if self.anchor <= self.head {
            (self.anchor, self.head)
        } else {
            (self.head, self.anchor)
        };
        match self.mode {
            SelectionMode::Linear => self.linear_ranges(start, end),
            SelectionMode::LinearWordWise => {
                let start = self.expand_left(start);
                let end = self.expand_right(end);
                self.linear_ranges(start, end)
            }
            SelectionMode::FullLine => self.full_line_ranges(start, end),
            SelectionMode::Rectangular => self.rectangular_ranges(start, end),
        }
    }

    fn last_column(&self) -> ColumnOffset {
        ColumnOffset(self.helper.page_size().columns.0 - 1)
    }

    /// Per-line ranges between two cell positions, keeping wide cells whole:
    /// the start pulls back to the lead half, the end stretches over the
    /// continuation half.
    fn linear_ranges(&self, start: CellLocation, end: CellLocation) -> Vec<SelectionRange> {
        let start = self.snap_to_wide_lead(start);
        let end = self.snap_to_wide_end(end);
        let last = self.last_column();
        let mut out = Vec::new();
        for line in start.line.0..=end.line.0 {
            let line = LineOffset(line);
            let from = if line == start.line {
                start.column
            } else {
                ColumnOffset(0)
            };
            let to = if line == end.line { end.column } else { last };
            out.push(SelectionRange { line, from, to });
        }
        out
    }

    fn full_line_ranges(&self, start: CellLocation, end: CellLocation) -> Vec<SelectionRange> {
        let mut top = start.line;
        let mut bottom = end.line;
        // A wrapped line continues its predecessor; take whole logical lines.
        while self.helper.is_line_wrapped(top) {
            top = top - 1;
        }
        while self.helper.is_line_wrapped(bottom + 1) {
            bottom = bottom + 1;
        }
        let last = self.last_column();
        (top.0..=bottom.0)
            .map(|line| SelectionRange {
                line: LineOffset(line),
                from: ColumnOffset(0),
                to: last,
            })
            .collect()
    }

    fn rectangular_ranges(&self, start: CellLocation, end: CellLocation) -> Vec<SelectionRange> {
        let (left, right) = if start.column <= end.column {
            (start.column, end.column)
        } else {
            (end.column, start.column)
        };
        (start.line.0..=end.line.0)
            .map(|line| SelectionRange {
                line: LineOffset(line),
                from: left,
                to: right,
            })
            .collect()
    }

    /// Word expansion: walk left over non-blank cells, following a soft
    /// wrap onto the previous line.
    fn expand_left(&self, mut pos: CellLocation) -> CellLocation {
        if self.helper.cell_empty(pos) {
            return pos;
        }
        loop {
            let prev = if pos.column.0 > 0 {
                CellLocation::new(pos.line, ColumnOffset(pos.column.0 - 1))
            } else if self.helper.is_line_wrapped(pos.line) {
                CellLocation::new(pos.line - 1, self.last_column())
            } else {
                return pos;
            };
            if self.helper.cell_empty(prev) {
                return pos;
            }
            pos = prev;
        }
    }

    fn expand_right(&self, mut pos: CellLocation) -> CellLocation {
        if self.helper.cell_empty(pos) {
            return pos;
        }
        let last = self.last_column();
        loop {
            let next = if pos.column < last {
                CellLocation::new(pos.line, ColumnOffset(pos.column.0 + 1))
            } else if self.helper.is_line_wrapped(pos.line + 1) {
                CellLocation::new(pos.line + 1, ColumnOffset(0))
            } else {
                return pos;
            };
            if self.helper.cell_empty(next) {
                return pos;
            }
            pos = next;
        }
    }

    fn snap_to_wide_lead(&self, pos: CellLocation) -> CellLocation {
        if pos.column.0 > 0 && self.helper.cell_width(pos) == 0 {
            CellLocation::new(pos.line, ColumnOffset(pos.column.0 - 1))
        } else {
            pos
        }
    }

    fn snap_to_wide_end(&self, pos: CellLocation) -> CellLocation {
        let last = self.last_column();
        if pos.column < last && self.helper.cell_width(pos) == 2 {
            CellLocation::new(pos.line, ColumnOffset(pos.column.0 + 1))
        } else {
            pos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{ColumnCount, LineCount};

    /// Text-backed helper: index 0 of `lines` is the oldest line; the last
    /// `page_rows` entries are the visible page.
    struct TextHelper {
        lines: Vec<(&'static str, bool)>,
        page_rows: u16,
        cols: u16,
    }

    impl TextHelper {
        fn line(&self, offset: LineOffset) -> Option<&(&'static str, bool)> {
            let history = self.lines.len() as i32 - self.page_rows as i32;
            let idx = history + offset.0;
            if idx < 0 {
                return None;
            }
            self.lines.get(idx as usize)
        }
    }

    impl SelectionHelper for TextHelper {
        fn page_size(&self) -> PageSize {
            PageSize::new(LineCount(self.page_rows), ColumnCount(self.cols))
        }

        fn is_line_wrapped(&self, line: LineOffset) -> bool {
            self.line(line).is_some_and(|(_, wrapped)| *wrapped)
        }

        fn cell_empty(&self, pos: CellLocation) -> bool {
            self.line(pos.line)
                .and_then(|(text, _)| text.chars().nth(pos.column.as_usize()))
                .is_none_or(|ch| ch == ' ')
        }

        fn cell_width(&self, _pos: CellLocation) -> u8 {
            1
        }
    }

    fn loc(line: i32, col: u16) -> CellLocation {
        CellLocation::new(LineOffset(line), ColumnOffset(col))
    }

    fn range(line: i32, from: u16, to: u16) -> SelectionRange {
        SelectionRange {
            line: LineOffset(line),
            from: ColumnOffset(from),
            to: ColumnOffset(to),
        }
    }

    fn helper_11x3() -> TextHelper {
        TextHelper {
            //         0123456789A
            lines: vec![
                ("12345,67890", false),
                ("ab,cdefg,hi", false),
                ("12345,67890", false),
                ("foo", false),
                ("bar", false),
            ],
            page_rows: 3,
            cols: 11,
        }
    }

    #[test]
    fn linear_single_cell() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(1, 1));
        assert!(!sel.extend(loc(1, 1)), "no-op extend reports unchanged");
        sel.complete();
        assert_eq!(sel.ranges(), vec![range(1, 1, 1)]);
    }

    #[test]
    fn linear_forward_within_line() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(1, 1));
        assert!(sel.extend(loc(1, 3)));
        sel.complete();
        let ranges = sel.ranges();
        assert_eq!(ranges, vec![range(1, 1, 3)]);
        assert_eq!(ranges[0].length(), 3);
    }

    #[test]
    fn linear_backward_normalizes() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(1, 3));
        sel.extend(loc(1, 1));
        assert_eq!(sel.ranges(), vec![range(1, 1, 3)]);
    }

    #[test]
    fn linear_multi_line_takes_whole_middle_lines() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(0, 8));
        sel.extend(loc(2, 3));
        assert_eq!(
            sel.ranges(),
            vec![range(0, 8, 10), range(1, 0, 10), range(2, 0, 3)]
        );
    }

    #[test]
    fn linear_selection_in_history() {
        // Anchor and head both on scrollback lines.
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(-2, 6));
        sel.extend(loc(-1, 2));
        sel.complete();
        let ranges = sel.ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], range(-2, 6, 10));
        assert_eq!(ranges[0].length(), 5);
        assert_eq!(ranges[1], range(-1, 0, 2));
        assert_eq!(ranges[1].length(), 3);
    }

    #[test]
    fn extend_after_complete_is_refused() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(0, 0));
        sel.complete();
        assert!(!sel.extend(loc(2, 5)));
        assert_eq!(sel.ranges(), vec![range(0, 0, 0)]);
    }

    #[test]
    fn extend_clamps_to_page() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(0, 0));
        sel.extend(loc(99, 99));
        assert_eq!(sel.head(), loc(2, 10));
    }

    #[test]
    fn linear_extension_is_monotonic() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Linear, loc(0, 2));
        sel.extend(loc(1, 4));
        let before: Vec<_> = sel.ranges();
        sel.extend(loc(2, 6));
        let after: Vec<_> = sel.ranges();
        for r in &before {
            let superset = after
                .iter()
                .any(|a| a.line == r.line && a.from <= r.from && a.to >= r.to);
            assert!(superset, "range {r:?} lost when extending further");
        }
    }

    #[test]
    fn word_wise_expands_to_word_boundaries() {
        let helper = TextHelper {
            lines: vec![("foo bar baz", false)],
            page_rows: 1,
            cols: 11,
        };
        let mut sel = Selector::new(&helper, SelectionMode::LinearWordWise, loc(0, 5));
        sel.extend(loc(0, 5));
        assert_eq!(sel.ranges(), vec![range(0, 4, 6)]);
    }

    #[test]
    fn word_wise_spans_words_between_anchor_and_head() {
        let helper = TextHelper {
            lines: vec![("foo bar baz", false)],
            page_rows: 1,
            cols: 11,
        };
        let mut sel = Selector::new(&helper, SelectionMode::LinearWordWise, loc(0, 1));
        sel.extend(loc(0, 9));
        assert_eq!(sel.ranges(), vec![range(0, 0, 10)]);
    }

    #[test]
    fn word_wise_on_blank_cell_stays_put() {
        let helper = TextHelper {
            lines: vec![("a b", false)],
            page_rows: 1,
            cols: 3,
        };
        let sel = Selector::new(&helper, SelectionMode::LinearWordWise, loc(0, 1));
        assert_eq!(sel.ranges(), vec![range(0, 1, 1)]);
    }

    #[test]
    fn word_wise_follows_soft_wrap() {
        let helper = TextHelper {
            lines: vec![("abcd", false), ("ef g", true)],
            page_rows: 2,
            cols: 4,
        };
        // "abcdef" is one logical word split across the wrap.
        let mut sel = Selector::new(&helper, SelectionMode::LinearWordWise, loc(1, 0));
        sel.extend(loc(1, 0));
        assert_eq!(sel.ranges(), vec![range(0, 0, 3), range(1, 0, 1)]);
    }

    #[test]
    fn full_line_takes_whole_lines() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::FullLine, loc(0, 5));
        sel.extend(loc(1, 2));
        assert_eq!(sel.ranges(), vec![range(0, 0, 10), range(1, 0, 10)]);
    }

    #[test]
    fn full_line_follows_wraps_both_ways() {
        let helper = TextHelper {
            lines: vec![
                ("aaaa", false),
                ("bbbb", true), // continues line 0
                ("cccc", true), // continues line 1
                ("dddd", false),
            ],
            page_rows: 4,
            cols: 4,
        };
        let sel = Selector::new(&helper, SelectionMode::FullLine, loc(1, 2));
        assert_eq!(
            sel.ranges(),
            vec![range(0, 0, 3), range(1, 0, 3), range(2, 0, 3)]
        );
    }

    #[test]
    fn rectangular_selects_same_columns_every_line() {
        let helper = helper_11x3();
        let mut sel = Selector::new(&helper, SelectionMode::Rectangular, loc(0, 7));
        sel.extend(loc(2, 2));
        assert_eq!(
            sel.ranges(),
            vec![range(0, 2, 7), range(1, 2, 7), range(2, 2, 7)]
        );
    }

    #[test]
    fn rectangular_ignores_wrap_state() {
        let helper = TextHelper {
            lines: vec![("abcd", false), ("efgh", true)],
            page_rows: 2,
            cols: 4,
        };
        let mut sel = Selector::new(&helper, SelectionMode::Rectangular, loc(0, 1));
        sel.extend(loc(1, 2));
        assert_eq!(sel.ranges(), vec![range(0, 1, 2), range(1, 1, 2)]);
    }

    /// Wide-cell integrity with a helper that reports a wide pair.
    struct WideHelper;

    impl SelectionHelper for WideHelper {
        fn page_size(&self) -> PageSize {
            PageSize::new(LineCount(1), ColumnCount(4))
        }
        fn is_line_wrapped(&self, _line: LineOffset) -> bool {
            false
        }
        fn cell_empty(&self, _pos: CellLocation) -> bool {
            false
        }
        fn cell_width(&self, pos: CellLocation) -> u8 {
            // Columns 1-2 hold a wide character pair.
            match pos.column.0 {
                1 => 2,
                2 => 0,
                _ => 1,
            }
        }
    }

    #[test]
    fn linear_selection_keeps_wide_cells_whole() {
        // Anchor on the continuation half pulls back to the lead.
        let mut sel = Selector::new(&WideHelper, SelectionMode::Linear, loc(0, 2));
        sel.extend(loc(0, 2));
        assert_eq!(sel.ranges(), vec![range(0, 1, 2)]);

        // Head on the lead half stretches over the continuation.
        let mut sel = Selector::new(&WideHelper, SelectionMode::Linear, loc(0, 0));
        sel.extend(loc(0, 1));
        assert_eq!(sel.ranges(), vec![range(0, 0, 2)]);
    }
}
