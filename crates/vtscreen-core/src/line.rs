//! A single grid row with two internal representations.
//!
//! Lines written once, left-to-right, at a uniform rendition stay *trivial*:
//! UTF-8 text plus fill attributes and a display width. Everything that needs
//! per-cell state (SGR changes mid-line, overwrites, combining marks landing
//! on earlier cells) forces the line to *inflate* into an explicit cell
//! sequence. Inflation is deterministic and lazy; callers must never hold a
//! cell reference across an operation that may re-tag the line.

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::attrs::GraphicsAttributes;
use crate::cell::{Cell, HyperlinkId, VS16};
use crate::primitives::ColumnCount;

bitflags! {
    /// Per-line state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineFlags: u8 {
        /// The line participates in autowrap and reflow. Cleared when the
        /// line is created while DECAWM is off.
        const WRAPPABLE = 1 << 0;
        /// The line is a soft-wrap continuation of its predecessor.
        const WRAPPED   = 1 << 1;
        /// Marked by the application (prompt marks, selection anchors).
        const MARKED    = 1 << 2;
    }
}

/// Compact representation of a pristine line: text written once at uniform
/// attributes, plus the fill rendition for the untouched remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct TrivialLineBuffer {
    pub text: String,
    /// Display columns occupied by `text`.
    pub used_columns: u16,
    /// Total width of the line in columns (`used_columns <= display_width`).
    pub display_width: u16,
    pub text_attributes: GraphicsAttributes,
    pub fill_attributes: GraphicsAttributes,
    pub hyperlink: HyperlinkId,
}

#[derive(Debug, Clone, PartialEq)]
enum LineBuffer<C> {
    Trivial(TrivialLineBuffer),
    Inflated(Vec<C>),
}

/// One grid row.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<C: Cell> {
    buffer: LineBuffer<C>,
    flags: LineFlags,
}

/// Display width of a grapheme cluster, clamped to terminal semantics.
///
/// VS16 forces emoji presentation (width 2) even where `unicode-width` does
/// not account for it; a bare combining cluster still occupies one cell.
fn grapheme_width(grapheme: &str) -> u8 {
    let mut width = UnicodeWidthStr::width(grapheme).min(2) as u8;
    if width < 2 && grapheme.chars().any(|ch| ch == VS16) {
        width = 2;
    }
    width.max(1)
}

/// Convert a trivial buffer into an explicit cell sequence.
///
/// Grapheme clusters become one lead cell plus `width - 1` continuation
/// cells; the remainder is padded with fill-attribute cells so that the
/// result length equals `display_width` exactly.
pub(crate) fn inflate<C: Cell>(trivial: &TrivialLineBuffer) -> Vec<C> {
    let target = trivial.display_width as usize;
    let mut cells: Vec<C> = Vec::with_capacity(target);

    for grapheme in trivial.text.graphemes(true) {
        let width = grapheme_width(grapheme);
        let mut chars = grapheme.chars();
        let Some(first) = chars.next() else { continue };

        let mut cell = C::default();
        cell.write(trivial.text_attributes, first, width);
        cell.set_hyperlink(trivial.hyperlink);
        for ch in chars {
            cell.append_character(ch);
        }
        // The segmenter's verdict wins over incremental append adjustments.
        cell.set_width(width);
        cells.push(cell);
        for _ in 1..width {
            cells.push(C::continuation(trivial.text_attributes, trivial.hyperlink));
        }
    }

    debug_assert!(
        cells.len() <= target,
        "trivial text wider than display width: {} > {target}",
        cells.len(),
    );
    cells.truncate(target);
    while cells.len() < target {
        cells.push(C::filled(trivial.fill_attributes));
    }
    cells
}

/// Per-column view of a trivial buffer, used by the read-only accessors.
enum TrivialColumn<'a> {
    Lead(&'a str, u8),
    Continuation,
    Fill,
}

fn trivial_columns(trivial: &TrivialLineBuffer) -> Vec<TrivialColumn<'_>> {
    let mut columns = Vec::with_capacity(trivial.display_width as usize);
    for grapheme in trivial.text.graphemes(true) {
        let width = grapheme_width(grapheme);
        columns.push(TrivialColumn::Lead(grapheme, width));
        for _ in 1..width {
            columns.push(TrivialColumn::Continuation);
        }
    }
    columns.truncate(trivial.display_width as usize);
    while columns.len() < trivial.display_width as usize {
        columns.push(TrivialColumn::Fill);
    }
    columns
}

impl<C: Cell> Line<C> {
    /// A blank line of the given width, in trivial form.
    #[must_use]
    pub fn blank(columns: ColumnCount, fill: GraphicsAttributes, flags: LineFlags) -> Self {
        Self {
            buffer: LineBuffer::Trivial(TrivialLineBuffer {
                text: String::new(),
                used_columns: 0,
                display_width: columns.0,
                text_attributes: fill,
                fill_attributes: fill,
                hyperlink: 0,
            }),
            flags,
        }
    }

    /// Build a line from an explicit cell sequence.
    ///
    /// The caller is responsible for `cells.len()` matching the page width.
    #[must_use]
    pub fn from_cells(cells: Vec<C>, flags: LineFlags) -> Self {
        Self {
            buffer: LineBuffer::Inflated(cells),
            flags,
        }
    }

    /// Width of this line in display columns.
    #[must_use]
    pub fn size(&self) -> u16 {
        match &self.buffer {
            LineBuffer::Trivial(t) => t.display_width,
            LineBuffer::Inflated(cells) => cells.len() as u16,
        }
    }

    #[must_use]
    pub fn is_trivial(&self) -> bool {
        matches!(self.buffer, LineBuffer::Trivial(_))
    }

    #[must_use]
    pub fn trivial_buffer(&self) -> Option<&TrivialLineBuffer> {
        match &self.buffer {
            LineBuffer::Trivial(t) => Some(t),
            LineBuffer::Inflated(_) => None,
        }
    }

    // ── Flags ───────────────────────────────────────────────────────

    #[must_use]
    pub fn flags(&self) -> LineFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: LineFlags, enabled: bool) {
        self.flags.set(flag, enabled);
    }

    #[must_use]
    pub fn is_wrappable(&self) -> bool {
        self.flags.contains(LineFlags::WRAPPABLE)
    }

    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.flags.contains(LineFlags::WRAPPED)
    }

    #[must_use]
    pub fn is_marked(&self) -> bool {
        self.flags.contains(LineFlags::MARKED)
    }

    // ── Cell access ─────────────────────────────────────────────────

    /// Explicit cell sequence, inflating the trivial form on first use.
    pub fn cells_mut(&mut self) -> &mut Vec<C> {
        let inflated = match &self.buffer {
            LineBuffer::Trivial(t) => Some(inflate(t)),
            LineBuffer::Inflated(_) => None,
        };
        if let Some(cells) = inflated {
            self.buffer = LineBuffer::Inflated(cells);
        }
        match &mut self.buffer {
            LineBuffer::Inflated(cells) => cells,
            LineBuffer::Trivial(_) => unreachable!("line was just inflated"),
        }
    }

    /// Read-only cell view, inflating on first use.
    pub fn cells(&mut self) -> &[C] {
        self.cells_mut().as_slice()
    }

    /// Mutable access to the cell at `col`, inflating as needed.
    ///
    /// Panics if `col` is outside the line — a column bookkeeping bug, not
    /// user input.
    pub fn use_cell_at(&mut self, col: u16) -> &mut C {
        let width = self.size();
        assert!(col < width, "column {col} out of line width {width}");
        &mut self.cells_mut()[col as usize]
    }

    /// Whether the cell at `col` holds no codepoints.
    ///
    /// Works on both representations without inflating.
    #[must_use]
    pub fn cell_empty_at(&self, col: u16) -> bool {
        match &self.buffer {
            LineBuffer::Inflated(cells) => cells.get(col as usize).is_none_or(Cell::is_empty),
            LineBuffer::Trivial(t) => {
                if col >= t.used_columns {
                    return true;
                }
                matches!(
                    trivial_columns(t).get(col as usize),
                    Some(TrivialColumn::Continuation | TrivialColumn::Fill) | None
                )
            }
        }
    }

    /// Display width of the cell at `col` (0 for continuation halves).
    #[must_use]
    pub fn cell_width_at(&self, col: u16) -> u8 {
        match &self.buffer {
            LineBuffer::Inflated(cells) => cells.get(col as usize).map_or(1, Cell::width),
            LineBuffer::Trivial(t) => match trivial_columns(t).get(col as usize) {
                Some(TrivialColumn::Lead(_, width)) => *width,
                Some(TrivialColumn::Continuation) => 0,
                Some(TrivialColumn::Fill) | None => 1,
            },
        }
    }

    /// Hyperlink handle at `col` (0 when none).
    #[must_use]
    pub fn hyperlink_at(&self, col: u16) -> HyperlinkId {
        match &self.buffer {
            LineBuffer::Inflated(cells) => cells.get(col as usize).map_or(0, Cell::hyperlink),
            LineBuffer::Trivial(t) => {
                if col < t.used_columns {
                    t.hyperlink
                } else {
                    0
                }
            }
        }
    }

    /// Columns occupied by content: the index one past the last non-empty
    /// cell (a trailing wide continuation counts as occupied).
    #[must_use]
    pub fn used_columns(&self) -> u16 {
        match &self.buffer {
            LineBuffer::Trivial(t) => t.used_columns,
            LineBuffer::Inflated(cells) => {
                let mut end = cells.len();
                while end > 0 && cells[end - 1].is_empty() && !cells[end - 1].is_wide_continuation()
                {
                    end -= 1;
                }
                end as u16
            }
        }
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.used_columns() == 0
    }

    /// Cell view excluding trailing blank fill cells.
    pub fn trim_blank_right(&mut self) -> &[C] {
        let used = self.used_columns() as usize;
        &self.cells_mut()[..used]
    }

    // ── Bulk writes ─────────────────────────────────────────────────

    /// Fast path: append a contiguous UTF-8 run to a trivial line.
    ///
    /// Succeeds only when the line is trivial, the write starts exactly at
    /// the current end of text, the rendition matches, and the run fits.
    /// Returns `false` (without modifying anything) otherwise; the caller
    /// falls back to per-cell writes.
    pub fn try_emplace_text(
        &mut self,
        at_col: u16,
        text: &str,
        cell_count: u16,
        attrs: GraphicsAttributes,
        hyperlink: HyperlinkId,
    ) -> bool {
        let LineBuffer::Trivial(t) = &mut self.buffer else {
            return false;
        };
        if at_col != t.used_columns || at_col + cell_count > t.display_width {
            return false;
        }
        if t.used_columns > 0 && (t.text_attributes != attrs || t.hyperlink != hyperlink) {
            return false;
        }
        if t.used_columns == 0 {
            t.text_attributes = attrs;
            t.hyperlink = hyperlink;
        }
        t.text.push_str(text);
        t.used_columns += cell_count;
        true
    }

    /// Fill the whole line with one character at the given rendition
    /// (DECALN). The result is trivial again.
    pub fn fill_with(&mut self, ch: char, attrs: GraphicsAttributes) {
        let width = self.size();
        let per_char = crate::cell::display_width(ch).max(1) as u16;
        let count = width / per_char;
        self.buffer = LineBuffer::Trivial(TrivialLineBuffer {
            text: std::iter::repeat_n(ch, count as usize).collect(),
            used_columns: count * per_char,
            display_width: width,
            text_attributes: attrs,
            fill_attributes: attrs,
            hyperlink: 0,
        });
        self.flags.remove(LineFlags::WRAPPED);
    }

    /// Reset the whole line to blanks with the given fill rendition.
    pub fn blank_out(&mut self, fill: GraphicsAttributes) {
        let width = self.size();
        self.buffer = LineBuffer::Trivial(TrivialLineBuffer {
            text: String::new(),
            used_columns: 0,
            display_width: width,
            text_attributes: fill,
            fill_attributes: fill,
            hyperlink: 0,
        });
        self.flags.remove(LineFlags::WRAPPED);
    }

    /// Erase the inclusive column range `[from, to]` to the fill rendition.
    ///
    /// Erasing half of a wide character erases its other half as well, so no
    /// orphaned continuation cells survive.
    pub fn blank_range(&mut self, from: u16, to: u16, fill: GraphicsAttributes) {
        let width = self.size();
        if from >= width || to < from {
            return;
        }
        let to = to.min(width - 1);
        if from == 0 && to == width - 1 {
            self.blank_out(fill);
            return;
        }
        let cells = self.cells_mut();
        if from > 0 && cells[from as usize].is_wide_continuation() {
            cells[from as usize - 1].reset(fill);
        }
        if (to as usize + 1) < cells.len() && cells[to as usize + 1].is_wide_continuation() {
            cells[to as usize + 1].reset(fill);
        }
        for cell in &mut cells[from as usize..=to as usize] {
            cell.reset(fill);
        }
    }

    // ── Reshaping ───────────────────────────────────────────────────

    /// Adjust the line to a new width without reflow semantics: widen with
    /// blanks, or truncate.
    pub fn resize(&mut self, columns: ColumnCount) {
        let new = columns.0;
        if let LineBuffer::Trivial(t) = &mut self.buffer
            && new >= t.used_columns
        {
            t.display_width = new;
            return;
        }
        let cells = self.cells_mut();
        let shrinking = (new as usize) < cells.len();
        cells.resize_with(new as usize, C::default);
        // Truncation may have cut a wide character in half.
        if shrinking
            && let Some(last) = cells.last_mut()
            && last.width() == 2
        {
            last.reset(GraphicsAttributes::default());
        }
    }

    /// Reshape to a new column count, returning overflow cells.
    ///
    /// Widening and trivial lines whose text still fits never allocate cell
    /// storage. Shrinking a wrappable line splits it and returns the removed
    /// tail (trailing blanks trimmed) so the grid can wrap it onto the next
    /// line; shrinking a non-wrappable line truncates. A split landing in
    /// the middle of a wide character moves the whole character into the
    /// overflow and pads this line with a blank.
    pub fn reflow(&mut self, new_columns: ColumnCount) -> Vec<C> {
        let new = new_columns.0;
        if let LineBuffer::Trivial(t) = &mut self.buffer
            && new >= t.used_columns
        {
            t.display_width = new;
            return Vec::new();
        }

        let wrappable = self.is_wrappable();
        let cells = self.cells_mut();
        let new_len = new as usize;

        use std::cmp::Ordering;
        match new_len.cmp(&cells.len()) {
            Ordering::Equal => Vec::new(),
            Ordering::Greater => {
                cells.resize_with(new_len, C::default);
                Vec::new()
            }
            Ordering::Less if !wrappable => {
                cells.truncate(new_len);
                if let Some(last) = cells.last_mut()
                    && last.width() == 2
                {
                    last.reset(GraphicsAttributes::default());
                }
                Vec::new()
            }
            Ordering::Less => {
                let mut overflow = cells.split_off(new_len);
                if overflow.first().is_some_and(Cell::is_wide_continuation)
                    && let Some(head) = cells.pop()
                {
                    let attrs = *head.attributes();
                    overflow.insert(0, head);
                    cells.push(C::filled(attrs));
                }
                while overflow
                    .last()
                    .is_some_and(|c| c.is_empty() && !c.is_wide_continuation())
                {
                    overflow.pop();
                }
                overflow
            }
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// UTF-8 rendition of the whole line. Empty cells render as one space;
    /// wide-character continuation cells are skipped.
    #[must_use]
    pub fn to_utf8(&self) -> String {
        match &self.buffer {
            LineBuffer::Trivial(t) => {
                let mut out = String::with_capacity(
                    t.text.len() + (t.display_width - t.used_columns) as usize,
                );
                out.push_str(&t.text);
                for _ in t.used_columns..t.display_width {
                    out.push(' ');
                }
                out
            }
            LineBuffer::Inflated(cells) => {
                let mut out = String::new();
                for cell in cells {
                    if cell.is_wide_continuation() {
                        continue;
                    }
                    out.push_str(&cell.to_utf8());
                }
                out
            }
        }
    }

    /// Like [`to_utf8`](Self::to_utf8), optionally stripping leading and
    /// trailing whitespace of the rendered string.
    #[must_use]
    pub fn to_utf8_trimmed(&self, strip_leading: bool, strip_trailing: bool) -> String {
        let mut out = self.to_utf8();
        if strip_trailing {
            let trimmed = out.trim_end().len();
            out.truncate(trimmed);
        }
        if strip_leading {
            let start = out.len() - out.trim_start().len();
            out.drain(..start);
        }
        out
    }

    /// Render the inclusive column range `[from, to]`, skipping wide-char
    /// continuation halves. Used by selection extraction.
    #[must_use]
    pub fn text_range(&self, from: u16, to: u16) -> String {
        let width = self.size();
        if width == 0 || from >= width {
            return String::new();
        }
        let to = to.min(width - 1);
        let mut out = String::new();
        match &self.buffer {
            LineBuffer::Inflated(cells) => {
                for cell in &cells[from as usize..=to as usize] {
                    if cell.is_wide_continuation() {
                        continue;
                    }
                    out.push_str(&cell.to_utf8());
                }
            }
            LineBuffer::Trivial(t) => {
                let columns = trivial_columns(t);
                for column in &columns[from as usize..=to as usize] {
                    match column {
                        TrivialColumn::Lead(g, _) => out.push_str(g),
                        TrivialColumn::Continuation => {}
                        TrivialColumn::Fill => out.push(' '),
                    }
                }
            }
        }
        out
    }
}
