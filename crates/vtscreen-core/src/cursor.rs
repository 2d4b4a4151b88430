//! Cursor state: 1-based position, pending-wrap latch, rendition, charsets.

use crate::attrs::GraphicsAttributes;
use crate::cell::HyperlinkId;
use crate::primitives::CellLocation;

/// Character set designators for the G0..G3 slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharsetId {
    #[default]
    UsAscii,
    /// DEC Special Graphics (line drawing), `ESC ( 0`.
    DecSpecial,
    /// United Kingdom, `ESC ( A`.
    British,
}

impl CharsetId {
    /// Map a designator final byte to a charset. Unknown designators fall
    /// back to US-ASCII.
    #[must_use]
    pub fn from_designator(byte: u8) -> Self {
        match byte {
            b'0' => Self::DecSpecial,
            b'A' => Self::British,
            _ => Self::UsAscii,
        }
    }
}

/// The four designated character sets plus the active (shifted-in) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetTable {
    pub slots: [CharsetId; 4],
    /// Currently shifted-in slot (SI selects 0, SO selects 1).
    pub active: usize,
    /// One-shot slot override from SS2/SS3.
    pub single_shift: Option<usize>,
}

impl Default for CharsetTable {
    fn default() -> Self {
        Self {
            slots: [CharsetId::UsAscii; 4],
            active: 0,
            single_shift: None,
        }
    }
}

impl CharsetTable {
    /// The charset the next printed character resolves against, consuming
    /// any pending single shift.
    pub fn take_active(&mut self) -> CharsetId {
        match self.single_shift.take() {
            Some(slot) => self.slots[slot],
            None => self.slots[self.active],
        }
    }
}

/// Translate a codepoint through the given charset.
///
/// Only DEC Special Graphics and the UK pound substitution actually remap;
/// everything else passes through.
#[must_use]
pub fn translate_charset(charset: CharsetId, ch: char) -> char {
    match charset {
        CharsetId::UsAscii => ch,
        CharsetId::British => {
            if ch == '#' {
                '£'
            } else {
                ch
            }
        }
        CharsetId::DecSpecial => match ch {
            '`' => '\u{25C6}', // diamond
            'a' => '\u{2592}', // checkerboard
            'b' => '\u{2409}', // HT symbol
            'c' => '\u{240C}', // FF symbol
            'd' => '\u{240D}', // CR symbol
            'e' => '\u{240A}', // LF symbol
            'f' => '\u{00B0}', // degree
            'g' => '\u{00B1}', // plus/minus
            'h' => '\u{2424}', // NL symbol
            'i' => '\u{240B}', // VT symbol
            'j' => '\u{2518}', // lower-right corner
            'k' => '\u{2510}', // upper-right corner
            'l' => '\u{250C}', // upper-left corner
            'm' => '\u{2514}', // lower-left corner
            'n' => '\u{253C}', // crossing lines
            'o' => '\u{23BA}', // scan line 1
            'p' => '\u{23BB}', // scan line 3
            'q' => '\u{2500}', // horizontal line
            'r' => '\u{23BC}', // scan line 7
            's' => '\u{23BD}', // scan line 9
            't' => '\u{251C}', // left tee
            'u' => '\u{2524}', // right tee
            'v' => '\u{2534}', // bottom tee
            'w' => '\u{252C}', // top tee
            'x' => '\u{2502}', // vertical line
            'y' => '\u{2264}', // less than or equal
            'z' => '\u{2265}', // greater than or equal
            '{' => '\u{03C0}', // pi
            '|' => '\u{2260}', // not equal
            '}' => '\u{00A3}', // pound sign
            '~' => '\u{00B7}', // centered dot
            _ => ch,
        },
    }
}

/// Cursor state.
///
/// `row` and `col` are 1-based screen coordinates; the grid's 0-based
/// offsets are reached only through [`Cursor::location`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
    /// Latched after printing in the last column with autowrap on; the next
    /// printable character wraps first, then prints.
    pub pending_wrap: bool,
    /// Current SGR rendition applied to printed and filled cells.
    pub graphics: GraphicsAttributes,
    /// DECOM: addressing is margin-relative while set.
    pub origin_mode: bool,
    pub charsets: CharsetTable,
    /// Active OSC 8 hyperlink applied to printed cells (0 = none).
    pub hyperlink: HyperlinkId,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            row: 1,
            col: 1,
            pending_wrap: false,
            graphics: GraphicsAttributes::default(),
            origin_mode: false,
            charsets: CharsetTable::default(),
            hyperlink: 0,
        }
    }
}

impl Cursor {
    /// The cursor position as a 0-based grid location.
    #[must_use]
    pub fn location(&self) -> CellLocation {
        CellLocation::from_screen(self.row, self.col)
    }
}

/// Snapshot pushed by DECSC and restored by DECRC.
///
/// Autowrap is saved alongside the cursor per DEC semantics even though it
/// lives in the mode set.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCursor {
    pub cursor: Cursor,
    pub autowrap: bool,
}
