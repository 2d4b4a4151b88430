//! Strong-typed screen coordinates.
//!
//! Two coordinate conventions coexist in the engine and must never be mixed
//! silently:
//!
//! - **0-based offsets** ([`LineOffset`], [`ColumnOffset`]) address grid
//!   content. A negative [`LineOffset`] reaches into scrollback history
//!   (`-1` is the most recent history row).
//! - **1-based screen coordinates** are what the cursor API and margins use,
//!   matching how VT sequences address the page.
//!
//! The converters on [`CellLocation`] are the only bridge between the two.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// 0-based line offset relative to the top of the visible page.
///
/// Negative values address scrollback: `-1` is the line most recently
/// scrolled out, `-historyLineCount` the oldest retained one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineOffset(pub i32);

impl LineOffset {
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Convert a 1-based screen row to a line offset.
    #[must_use]
    pub const fn from_screen_row(row: u16) -> Self {
        Self(row as i32 - 1)
    }

    /// Convert back to a 1-based screen row. Meaningless for history lines.
    #[must_use]
    pub const fn screen_row(self) -> u16 {
        (self.0 + 1) as u16
    }
}

impl Add<i32> for LineOffset {
    type Output = Self;
    fn add(self, rhs: i32) -> Self {
        Self(self.0 + rhs)
    }
}

impl Sub<i32> for LineOffset {
    type Output = Self;
    fn sub(self, rhs: i32) -> Self {
        Self(self.0 - rhs)
    }
}

impl AddAssign<i32> for LineOffset {
    fn add_assign(&mut self, rhs: i32) {
        self.0 += rhs;
    }
}

impl fmt::Display for LineOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 0-based column offset within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ColumnOffset(pub u16);

impl ColumnOffset {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Convert a 1-based screen column to a column offset.
    #[must_use]
    pub const fn from_screen_column(col: u16) -> Self {
        Self(col.saturating_sub(1))
    }

    /// Convert back to a 1-based screen column.
    #[must_use]
    pub const fn screen_column(self) -> u16 {
        self.0 + 1
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ColumnOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A count of lines (rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineCount(pub u16);

impl LineCount {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A count of columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ColumnCount(pub u16);

impl ColumnCount {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Page dimensions: number of visible lines and columns, both at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageSize {
    pub lines: LineCount,
    pub columns: ColumnCount,
}

impl PageSize {
    /// Create a page size, clamping both dimensions to at least 1.
    #[must_use]
    pub fn new(lines: LineCount, columns: ColumnCount) -> Self {
        Self {
            lines: LineCount(lines.0.max(1)),
            columns: ColumnCount(columns.0.max(1)),
        }
    }

    #[must_use]
    pub const fn cell_count(self) -> usize {
        self.lines.0 as usize * self.columns.0 as usize
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.columns.0, self.lines.0)
    }
}

/// A cell position in 0-based offsets. Ordering is line-major, which makes
/// selection anchors directly comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CellLocation {
    pub line: LineOffset,
    pub column: ColumnOffset,
}

impl CellLocation {
    #[must_use]
    pub const fn new(line: LineOffset, column: ColumnOffset) -> Self {
        Self { line, column }
    }

    /// Build a location from 1-based screen coordinates.
    #[must_use]
    pub const fn from_screen(row: u16, col: u16) -> Self {
        Self {
            line: LineOffset::from_screen_row(row),
            column: ColumnOffset::from_screen_column(col),
        }
    }
}

impl fmt::Display for CellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.line, self.column)
    }
}

/// An inclusive 1-based coordinate band, used for both margin axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Band {
    pub from: u16,
    pub to: u16,
}

impl Band {
    /// Create a band. Returns `None` unless `1 <= from < to`.
    ///
    /// DECSTBM/DECSLRM require a strictly increasing pair; a degenerate or
    /// reversed request is ignored by the dispatcher.
    #[must_use]
    pub fn checked(from: u16, to: u16) -> Option<Self> {
        (from >= 1 && from < to).then_some(Self { from, to })
    }

    #[must_use]
    pub const fn contains(self, value: u16) -> bool {
        self.from <= value && value <= self.to
    }

    /// Number of rows/columns covered by this band.
    #[must_use]
    pub const fn span(self) -> u16 {
        self.to - self.from + 1
    }
}

/// Scroll region margins in 1-based inclusive screen coordinates.
///
/// Defaults span the full page. The horizontal band only becomes effective
/// when DECLRMM is enabled; the dispatcher keeps it at full width otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Margin {
    pub vertical: Band,
    pub horizontal: Band,
}

impl Margin {
    /// A margin covering the whole page.
    #[must_use]
    pub fn fullscreen(page: PageSize) -> Self {
        Self {
            vertical: Band {
                from: 1,
                to: page.lines.0,
            },
            horizontal: Band {
                from: 1,
                to: page.columns.0,
            },
        }
    }

    /// Whether the vertical band spans every page row.
    #[must_use]
    pub fn is_full_vertical(&self, page: PageSize) -> bool {
        self.vertical.from == 1 && self.vertical.to == page.lines.0
    }

    /// Whether the horizontal band spans every page column.
    #[must_use]
    pub fn is_full_horizontal(&self, page: PageSize) -> bool {
        self.horizontal.from == 1 && self.horizontal.to == page.columns.0
    }

    /// Whether the given 1-based position lies inside both bands.
    #[must_use]
    pub fn contains(&self, row: u16, col: u16) -> bool {
        self.vertical.contains(row) && self.horizontal.contains(col)
    }
}
