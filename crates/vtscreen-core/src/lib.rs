#![forbid(unsafe_code)]

//! Host-agnostic VT/ANSI screen-state engine.
//!
//! `vtscreen-core` turns a byte stream of ECMA-48 / DEC VT / xterm control
//! sequences into a renderable cell grid with scrollback, margins, modes,
//! reflow on resize, and text selection. It is the terminal model only — no
//! PTY, no fonts, no rendering, no I/O of any kind. Hosts feed bytes in and
//! pull render/selection queries out; responses (CPR and friends) and
//! diagnostics flow through two injected collaborators.
//!
//! # Architecture
//!
//! - [`parser`]: byte stream → semantic events (DEC STD 070 state machine).
//! - [`screen`]: event listener; applies every VT command to the grid.
//! - [`grid`]: visible page + scrollback ring, cursor, margins, tab stops.
//! - [`line`]: one row, lazily switching between a compact trivial form and
//!   an explicit cell sequence.
//! - [`cell`]: the cell contract plus its two representations.
//! - [`selection`]: range computation over grid + scrollback.
//!
//! # Design principles
//!
//! - **No I/O**: all types are pure data + logic; the host supplies bytes.
//! - **Deterministic**: identical byte sequences produce identical state.
//! - **Single-threaded**: every operation completes synchronously; the two
//!   collaborator callbacks are invoked inline and must not re-enter.

pub mod attrs;
pub mod cell;
pub mod cursor;
pub mod grid;
pub mod line;
pub mod modes;
pub mod parser;
pub mod primitives;
pub mod screen;
pub mod selection;

pub use attrs::{Color, GraphicsAttributes, SgrFlags, UnderlineStyle};
pub use cell::{Cell, CompactCell, HyperlinkId, HyperlinkRegistry, SimpleCell, display_width};
pub use cursor::{CharsetId, CharsetTable, Cursor, SavedCursor, translate_charset};
pub use grid::Grid;
pub use line::{Line, LineFlags, TrivialLineBuffer};
pub use modes::{AnsiModes, DecModes, Modes};
pub use parser::{Events, Params, Parser};
pub use primitives::{
    Band, CellLocation, ColumnCount, ColumnOffset, LineCount, LineOffset, Margin, PageSize,
};
pub use screen::{Notifier, ReplySink, Screen};
pub use selection::{SelectionHelper, SelectionMode, SelectionRange, Selector};
