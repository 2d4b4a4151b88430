//! End-to-end scenarios driving the parser + screen through byte streams
//! and comparing full page renders.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use vtscreen_core::{
    CellLocation, ColumnCount, ColumnOffset, LineCount, LineOffset, PageSize, Parser, Screen,
    SelectionMode, Selector,
};

fn loc(line: i32, col: u16) -> CellLocation {
    CellLocation::new(LineOffset(line), ColumnOffset(col))
}

fn screen(cols: u16, rows: u16) -> (Parser, Screen) {
    let page = PageSize::new(LineCount(rows), ColumnCount(cols));
    (Parser::new(), Screen::new(page, LineCount(100)))
}

fn feed(parser: &mut Parser, screen: &mut Screen, bytes: &[u8]) {
    parser.feed(screen, bytes);
}

// ── Autowrap ────────────────────────────────────────────────────────

#[test]
fn autowrap_toggle_on_single_row() {
    let (mut p, mut s) = screen(3, 1);
    feed(&mut p, &mut s, b"\x1b[?7l");
    feed(&mut p, &mut s, b"ABCD");
    assert_eq!(s.render_text(), "ABD\n");

    feed(&mut p, &mut s, b"\x1b[?7h");
    feed(&mut p, &mut s, b"EF");
    assert_eq!(s.render_text(), "F  \n");
}

#[test]
fn autowrap_fills_page_and_scrolls() {
    let (mut p, mut s) = screen(3, 2);
    feed(&mut p, &mut s, b"ABCDEFG");
    assert_eq!(s.render_text(), "DEF\nG  \n");
}

// ── Margins and Index ───────────────────────────────────────────────

#[test]
fn index_at_bottom_of_vertical_margin_scrolls_region() {
    let (mut p, mut s) = screen(5, 5);
    feed(&mut p, &mut s, b"12345\n67890\nABCDE\nFGHIJ\nKLMNO");
    feed(&mut p, &mut s, b"\x1b[2;4r\x1b[4;2H\x1bD");
    assert_eq!(s.render_text(), "12345\nABCDE\nFGHIJ\n     \nKLMNO\n");
}

#[test]
fn index_with_left_right_margins_scrolls_rectangle() {
    let (mut p, mut s) = screen(5, 5);
    feed(&mut p, &mut s, b"12345\n67890\nABCDE\nFGHIJ\nKLMNO");
    feed(&mut p, &mut s, b"\x1b[?69h\x1b[2;4s\x1b[2;4r\x1b[4;2H\x1bD");
    assert_eq!(s.render_text(), "12345\n6BCD0\nAGHIE\nF   J\nKLMNO\n");
}

#[test]
fn reverse_index_at_top_margin_scrolls_down() {
    let (mut p, mut s) = screen(5, 5);
    feed(&mut p, &mut s, b"12345\n67890\nABCDE\nFGHIJ\nKLMNO");
    feed(&mut p, &mut s, b"\x1b[2;4r\x1b[2;1H\x1bM");
    assert_eq!(s.render_text(), "12345\n     \n67890\nABCDE\nKLMNO\n");
}

#[test]
fn index_below_margin_moves_without_scrolling() {
    let (mut p, mut s) = screen(5, 5);
    feed(&mut p, &mut s, b"12345\n67890\nABCDE\nFGHIJ\nKLMNO");
    // Cursor below the scroll region: IND just moves down until the page end.
    feed(&mut p, &mut s, b"\x1b[2;3r\x1b[5;1H\x1bD");
    assert_eq!(s.render_text(), "12345\n67890\nABCDE\nFGHIJ\nKLMNO\n");
    assert_eq!(s.cursor_position(), (5, 1));
}

// ── Scrollback ──────────────────────────────────────────────────────

#[test]
fn scroll_off_top_lands_in_history() {
    let (mut p, mut s) = screen(5, 5);
    feed(&mut p, &mut s, b"12345\n67890\nABCDE\nFGHIJ\nKLMNO\nPQRST\x1b[H");
    assert_eq!(s.grid().history_line_count(), LineCount(1));
    assert_eq!(s.render_history_text_line(0).unwrap(), "12345");
    assert_eq!(s.render_text(), "67890\nABCDE\nFGHIJ\nKLMNO\nPQRST\n");
}

#[test]
fn region_scrolls_never_reach_history() {
    let (mut p, mut s) = screen(3, 3);
    feed(&mut p, &mut s, b"aaa\nbbb\nccc");
    feed(&mut p, &mut s, b"\x1b[1;2r\x1b[2;1H\n\n\n");
    assert_eq!(s.grid().history_line_count(), LineCount(0));
}

// ── Tabs ────────────────────────────────────────────────────────────

#[test]
fn tab_stops_and_wrap_interaction() {
    let (mut p, mut s) = screen(20, 3);
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (1, 9));
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (1, 17));
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (1, 20));

    feed(&mut p, &mut s, b"\x1b[?7h");
    feed(&mut p, &mut s, b"AB");
    assert_eq!(s.cursor_position(), (2, 2));
    assert_eq!(s.render_text_line(2).trim_end(), "B");
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (2, 9));
}

#[test]
fn hts_and_tbc_manage_custom_stops() {
    let (mut p, mut s) = screen(20, 1);
    feed(&mut p, &mut s, b"\x1b[3g");
    feed(&mut p, &mut s, b"\x1b[1;5H\x1bH\x1b[1;12H\x1bH\x1b[1;1H");
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (1, 5));
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (1, 12));
    feed(&mut p, &mut s, b"\t");
    assert_eq!(s.cursor_position(), (1, 20), "no stop left: right margin");
    feed(&mut p, &mut s, b"\x1b[2Z");
    assert_eq!(s.cursor_position(), (1, 5), "CBT walks back over stops");
}

// ── Boundary behaviors ──────────────────────────────────────────────

#[test]
fn insert_delete_at_margins() {
    let (mut p, mut s) = screen(5, 3);
    feed(&mut p, &mut s, b"abcde\nfghij\nklmno");
    // IL at the bottom margin row shifts it out entirely.
    feed(&mut p, &mut s, b"\x1b[1;2r\x1b[2;1H\x1b[9L");
    assert_eq!(s.render_text(), "abcde\n     \nklmno\n");
}

#[test]
fn scroll_counts_clamp_to_region_height() {
    let (mut p, mut s) = screen(3, 3);
    feed(&mut p, &mut s, b"aaa\nbbb\nccc");
    feed(&mut p, &mut s, b"\x1b[1;2r\x1b[99S\x1b[99T");
    // Up then down by more than the region: region ends blank.
    assert_eq!(s.render_text(), "   \n   \nccc\n");
}

#[test]
fn pending_wrap_survives_until_next_print() {
    let (mut p, mut s) = screen(3, 2);
    feed(&mut p, &mut s, b"ABC");
    // Cursor reports the last column while the wrap is pending.
    assert_eq!(s.cursor_position(), (1, 3));
    feed(&mut p, &mut s, b"\x1b[6n"); // report does not disturb the latch
    feed(&mut p, &mut s, b"D");
    assert_eq!(s.render_text(), "ABC\nD  \n");
}

// ── DECOM ───────────────────────────────────────────────────────────

#[test]
fn origin_mode_confines_addressing_to_margins() {
    let (mut p, mut s) = screen(10, 10);
    feed(&mut p, &mut s, b"\x1b[3;7r\x1b[?6h\x1b[1;1HX");
    assert_eq!(s.render_text_line(3), "X         ");
    feed(&mut p, &mut s, b"\x1b[99;99H");
    assert_eq!(s.cursor_position(), (7, 10));
}

// ── Reports ─────────────────────────────────────────────────────────

#[test]
fn cursor_position_reports_are_bit_exact() {
    let page = PageSize::new(LineCount(10), ColumnCount(20));
    let reply = Rc::new(RefCell::new(Vec::new()));
    let mut s: Screen = Screen::with_collaborators(
        page,
        LineCount(0),
        Box::new(reply.clone()),
        Box::new(()),
        None,
    );
    let mut p = Parser::new();
    feed(&mut p, &mut s, b"\x1b[4;11H\x1b[6n\x1b[?6n");
    assert_eq!(reply.borrow().as_slice(), b"\x1b[4;11R\x1b[4;11;1R");
}

// ── DECALN ──────────────────────────────────────────────────────────

#[test]
fn decaln_fills_and_homes() {
    let (mut p, mut s) = screen(4, 3);
    feed(&mut p, &mut s, b"zz\x1b[2;3r\x1b[2;2H\x1b#8");
    assert_eq!(s.render_text(), "EEEE\nEEEE\nEEEE\n");
    assert_eq!(s.cursor_position(), (1, 1));
    // Margins were reset: IND at the page bottom scrolls the full page.
    feed(&mut p, &mut s, b"\x1b[3;1H\x1bD");
    assert_eq!(s.render_text(), "EEEE\nEEEE\n    \n");
}

// ── Selection over the live screen ──────────────────────────────────

#[test]
fn linear_selection_extracts_text() {
    let (mut p, mut s) = screen(11, 3);
    feed(&mut p, &mut s, b"12345,67890\nab,cdefg,hi\n12345,67890");
    let mut sel = Selector::new(&s, SelectionMode::Linear, loc(1, 3));
    sel.extend(loc(2, 4));
    sel.complete();
    assert_eq!(s.selection_text(&sel), "cdefg,hi\n12345");
}

#[test]
fn selection_reaches_into_history() {
    let (mut p, mut s) = screen(11, 3);
    feed(
        &mut p,
        &mut s,
        b"12345,67890\nab,cdefg,hi\n12345,67890\nfoo\nbar",
    );
    assert_eq!(s.grid().history_line_count(), LineCount(2));
    assert_eq!(s.render_history_text_line(0).unwrap(), "ab,cdefg,hi");

    // Anchor on the newest history line, head on the top page row.
    let mut sel = Selector::new(&s, SelectionMode::Linear, loc(-1, 6));
    sel.extend(loc(0, 2));
    sel.complete();

    let ranges = sel.ranges();
    assert_eq!(ranges.len(), 2);
    assert_eq!((ranges[0].line.0, ranges[0].from.0, ranges[0].to.0), (-1, 6, 10));
    assert_eq!(ranges[0].length(), 5);
    assert_eq!((ranges[1].line.0, ranges[1].from.0, ranges[1].to.0), (0, 0, 2));
    assert_eq!(ranges[1].length(), 3);
    assert_eq!(s.selection_text(&sel), "fg,hi\n123");
}

#[test]
fn selection_joins_soft_wrapped_lines_without_newline() {
    let (mut p, mut s) = screen(4, 3);
    feed(&mut p, &mut s, b"abcdefgh");
    let mut sel = Selector::new(&s, SelectionMode::Linear, loc(0, 0));
    sel.extend(loc(1, 3));
    sel.complete();
    assert_eq!(s.selection_text(&sel), "abcdefgh");
}

#[test]
fn full_line_selection_covers_logical_line() {
    let (mut p, mut s) = screen(4, 3);
    feed(&mut p, &mut s, b"abcdefgh\nxy");
    let sel = Selector::new(&s, SelectionMode::FullLine, loc(1, 1));
    assert_eq!(s.selection_text(&sel), "abcdefgh");
}

// ── Reflow on resize ────────────────────────────────────────────────

#[test]
fn shrink_then_grow_restores_wrapped_text() {
    let (mut p, mut s) = screen(8, 3);
    feed(&mut p, &mut s, b"abcdefgh");
    s.resize(PageSize::new(LineCount(3), ColumnCount(5)));
    assert_eq!(s.render_text(), "abcde\nfgh  \n     \n");
    s.resize(PageSize::new(LineCount(3), ColumnCount(8)));
    assert_eq!(s.render_text(), "abcdefgh\n        \n        \n");
}

#[test]
fn resize_keeps_non_wrappable_lines_truncated() {
    let (mut p, mut s) = screen(6, 2);
    feed(&mut p, &mut s, b"\x1b[?7l");
    feed(&mut p, &mut s, b"abcdef");
    s.resize(PageSize::new(LineCount(2), ColumnCount(3)));
    assert_eq!(s.render_text(), "abc\n   \n");
    s.resize(PageSize::new(LineCount(2), ColumnCount(6)));
    assert_eq!(s.render_text(), "abc   \n      \n");
}

// ── Protocol error recovery ─────────────────────────────────────────

#[test]
fn malformed_sequences_do_not_poison_the_stream() {
    let (mut p, mut s) = screen(10, 2);
    // Unknown CSI, aborted CSI, bad UTF-8, then normal text.
    feed(&mut p, &mut s, b"\x1b[999z\x1b[12\x18\xC3ok");
    assert_eq!(s.render_text_line(1).trim_end(), "\u{FFFD}ok");
}

#[test]
fn error_messages_reach_the_notifier() {
    let page = PageSize::new(LineCount(2), ColumnCount(10));
    let notes = Rc::new(RefCell::new(Vec::new()));
    let mut s: Screen = Screen::with_collaborators(
        page,
        LineCount(0),
        Box::new(()),
        Box::new(notes.clone()),
        None,
    );
    let mut p = Parser::new();
    feed(&mut p, &mut s, &[0xC3, b'a']);
    assert!(
        notes
            .borrow()
            .iter()
            .any(|m| m.contains("UTF-8")),
        "expected a UTF-8 diagnostic, got {:?}",
        notes.borrow()
    );
}
