//! VT/DEC control-sequence parser.
//!
//! A deterministic state machine after the DEC STD 070 / VT500 model,
//! driven one byte at a time and reporting everything it recognizes to an
//! [`Events`] listener. The parser owns no screen state: it segments the
//! byte stream into printable text, C0 controls, and ESC/CSI/OSC/DCS/PM/APC
//! sequences, and leaves interpretation to the listener.
//!
//! Ground state additionally assembles UTF-8: incomplete sequences consume
//! bytes without emitting, malformed ones print U+FFFD and resync. Runs of
//! printable ASCII are batched through [`Events::print_run`] while the
//! listener reports remaining cell budget.

use smallvec::SmallVec;

/// Parameter slots retained per CSI/DCS sequence; further parameters switch
/// the sequence into its ignore state.
pub const MAX_PARAMS: usize = 16;

/// Intermediate bytes retained per sequence (ECMA-48 allows more, but no
/// recognized sequence uses over two).
pub const MAX_INTERMEDIATES: usize = 2;

const REPLACEMENT: char = '\u{FFFD}';

/// Numeric parameters of a CSI or DCS sequence.
///
/// Colon-separated sub-parameters (SGR 4:3, 38:2:...) are kept in the same
/// flat list with a marker, so dispatchers can either treat them uniformly
/// or split on sub-parameter boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: SmallVec<[u16; MAX_PARAMS]>,
    sub: SmallVec<[bool; MAX_PARAMS]>,
}

impl Params {
    fn clear(&mut self) {
        self.values.clear();
        self.sub.clear();
    }

    /// Append a parameter. Returns `false` when the slots are exhausted.
    fn push(&mut self, value: u16, is_sub: bool) -> bool {
        if self.values.len() == MAX_PARAMS {
            return false;
        }
        self.values.push(value);
        self.sub.push(is_sub);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied()
    }

    /// Parameter at `index`, or `default` when absent or zero.
    #[must_use]
    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        match self.values.get(index).copied() {
            None | Some(0) => default,
            Some(v) => v,
        }
    }

    /// Parameter at `index` taken literally, defaulting to zero.
    #[must_use]
    pub fn get_or_zero(&self, index: usize) -> u16 {
        self.values.get(index).copied().unwrap_or(0)
    }

    /// Whether the parameter at `index` was attached to its predecessor
    /// with a colon.
    #[must_use]
    pub fn is_sub(&self, index: usize) -> bool {
        self.sub.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn values(&self) -> &[u16] {
        &self.values
    }
}

impl FromIterator<u16> for Params {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut params = Self::default();
        for value in iter {
            let _ = params.push(value, false);
        }
        params
    }
}

/// Listener for parser events.
///
/// Only `print` and `csi_dispatch` have no default; everything else
/// defaults to a no-op (or per-character fallback for `print_run`), so
/// simple listeners stay small.
pub trait Events {
    /// One printable codepoint (after UTF-8 assembly).
    fn print(&mut self, ch: char);

    /// A contiguous run of printable ASCII occupying `cell_count` columns.
    ///
    /// Returns the remaining cell budget on the current row; the parser
    /// stops batching when it reaches zero. The default funnels the run
    /// through [`print`](Self::print).
    fn print_run(&mut self, text: &str, cell_count: usize) -> usize {
        let _ = cell_count;
        for ch in text.chars() {
            self.print(ch);
        }
        0
    }

    /// A C0 control (LF, CR, HT, BS, BEL, SO/SI, ...).
    fn execute(&mut self, control: u8) {
        let _ = control;
    }

    /// A complete CSI sequence.
    ///
    /// `private` holds the leading private marker (`?`, `>`, `<`, `=`)
    /// when present.
    fn csi_dispatch(&mut self, private: Option<u8>, params: &Params, intermediates: &[u8], final_byte: u8);

    /// A complete ESC sequence (no CSI/OSC/DCS introducer).
    fn esc_dispatch(&mut self, intermediates: &[u8], final_byte: u8) {
        let _ = (intermediates, final_byte);
    }

    fn osc_start(&mut self) {}
    fn osc_put(&mut self, byte: u8) {
        let _ = byte;
    }
    fn osc_end(&mut self) {}

    /// A DCS sequence header was recognized; payload follows via
    /// [`dcs_put`](Self::dcs_put) until [`dcs_unhook`](Self::dcs_unhook).
    fn dcs_hook(&mut self, params: &Params, intermediates: &[u8], final_byte: u8) {
        let _ = (params, intermediates, final_byte);
    }
    fn dcs_put(&mut self, byte: u8) {
        let _ = byte;
    }
    fn dcs_unhook(&mut self) {}

    fn apc_start(&mut self) {}
    fn apc_put(&mut self, byte: u8) {
        let _ = byte;
    }
    fn apc_end(&mut self) {}

    fn pm_start(&mut self) {}
    fn pm_put(&mut self, byte: u8) {
        let _ = byte;
    }
    fn pm_end(&mut self) {}

    /// Advisory protocol diagnostics (malformed sequences, overflows).
    /// Never fatal; the parser has already recovered.
    fn error(&mut self, message: &str) {
        let _ = message;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    SosPmApcString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Sos,
    Pm,
    Apc,
}

/// The parser itself: pure state, no allocation beyond the parameter list.
#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    params: Params,
    param: u16,
    param_has_digits: bool,
    param_is_sub: bool,
    private_marker: Option<u8>,
    intermediates: SmallVec<[u8; MAX_INTERMEDIATES]>,
    intermediates_overflow: bool,
    string_kind: Option<StringKind>,
    /// UTF-8 assembly (ground state only).
    utf8_buf: [u8; 4],
    utf8_len: u8,
    utf8_remaining: u8,
    /// Cleared when the listener reports an exhausted run budget.
    batch_runs: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: Params::default(),
            param: 0,
            param_has_digits: false,
            param_is_sub: false,
            private_marker: None,
            intermediates: SmallVec::new(),
            intermediates_overflow: false,
            string_kind: None,
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_remaining: 0,
            batch_runs: true,
        }
    }

    /// Feed a chunk of bytes, reporting events to `listener`.
    ///
    /// Contiguous printable ASCII in ground state goes through
    /// [`Events::print_run`] as long as the listener reports budget.
    pub fn feed(&mut self, listener: &mut impl Events, bytes: &[u8]) {
        let mut i = 0;
        while i < bytes.len() {
            let byte = bytes[i];
            if self.state == State::Ground
                && self.utf8_remaining == 0
                && self.batch_runs
                && (0x20..=0x7E).contains(&byte)
            {
                let start = i;
                while i < bytes.len() && (0x20..=0x7E).contains(&bytes[i]) {
                    i += 1;
                }
                let run = &bytes[start..i];
                if run.len() == 1 {
                    listener.print(run[0] as char);
                } else if let Ok(text) = core::str::from_utf8(run) {
                    let budget = listener.print_run(text, run.len());
                    self.batch_runs = budget > 0;
                }
                continue;
            }
            self.advance(listener, byte);
            i += 1;
        }
    }

    /// Advance the state machine by one byte.
    pub fn advance(&mut self, listener: &mut impl Events, byte: u8) {
        // UTF-8 assembly lives entirely in ground state.
        if self.state == State::Ground && (self.utf8_remaining > 0 || byte >= 0x80) {
            self.advance_utf8(listener, byte);
            return;
        }

        // Anywhere rules: CAN/SUB abort, ESC restarts.
        match byte {
            0x18 | 0x1A => {
                self.leave_string(listener);
                self.state = State::Ground;
                self.batch_runs = true;
                return;
            }
            0x1B => {
                self.leave_string(listener);
                self.clear_sequence();
                self.state = State::Escape;
                self.batch_runs = true;
                return;
            }
            _ => {}
        }

        match self.state {
            State::Ground => self.advance_ground(listener, byte),
            State::Escape => self.advance_escape(listener, byte),
            State::EscapeIntermediate => self.advance_escape_intermediate(listener, byte),
            State::CsiEntry => self.advance_csi_entry(listener, byte),
            State::CsiParam => self.advance_csi_param(listener, byte),
            State::CsiIntermediate => self.advance_csi_intermediate(listener, byte),
            State::CsiIgnore => self.advance_csi_ignore(listener, byte),
            State::DcsEntry => self.advance_dcs_entry(listener, byte),
            State::DcsParam => self.advance_dcs_param(listener, byte),
            State::DcsIntermediate => self.advance_dcs_intermediate(listener, byte),
            State::DcsPassthrough => self.advance_dcs_passthrough(listener, byte),
            State::DcsIgnore => self.advance_dcs_ignore(byte),
            State::OscString => self.advance_osc_string(listener, byte),
            State::SosPmApcString => self.advance_sos_pm_apc(listener, byte),
        }
    }

    // ── UTF-8 assembly ──────────────────────────────────────────────

    fn advance_utf8(&mut self, listener: &mut impl Events, byte: u8) {
        if self.utf8_remaining == 0 {
            match byte {
                0xC2..=0xDF => self.begin_utf8(byte, 1),
                0xE0..=0xEF => self.begin_utf8(byte, 2),
                0xF0..=0xF4 => self.begin_utf8(byte, 3),
                _ => {
                    // Stray continuation or overlong/out-of-range lead.
                    listener.error("invalid UTF-8 lead byte");
                    listener.print(REPLACEMENT);
                }
            }
            return;
        }

        if (0x80..=0xBF).contains(&byte) {
            self.utf8_buf[self.utf8_len as usize] = byte;
            self.utf8_len += 1;
            self.utf8_remaining -= 1;
            if self.utf8_remaining == 0 {
                let len = self.utf8_len as usize;
                self.utf8_len = 0;
                match core::str::from_utf8(&self.utf8_buf[..len])
                    .ok()
                    .and_then(|s| s.chars().next())
                {
                    Some(ch) => listener.print(ch),
                    None => {
                        listener.error("malformed UTF-8 sequence");
                        listener.print(REPLACEMENT);
                    }
                }
            }
        } else {
            // Truncated sequence: report it, then reprocess this byte.
            self.utf8_len = 0;
            self.utf8_remaining = 0;
            listener.error("truncated UTF-8 sequence");
            listener.print(REPLACEMENT);
            self.advance(listener, byte);
        }
    }

    fn begin_utf8(&mut self, lead: u8, remaining: u8) {
        self.utf8_buf[0] = lead;
        self.utf8_len = 1;
        self.utf8_remaining = remaining;
    }

    // ── Sequence bookkeeping ────────────────────────────────────────

    fn clear_sequence(&mut self) {
        self.params.clear();
        self.param = 0;
        self.param_has_digits = false;
        self.param_is_sub = false;
        self.private_marker = None;
        self.intermediates.clear();
        self.intermediates_overflow = false;
    }

    /// Exit action for string-consuming states, fired when a string is
    /// terminated (ST/BEL) or aborted (CAN/SUB/ESC).
    fn leave_string(&mut self, listener: &mut impl Events) {
        match self.state {
            State::OscString => listener.osc_end(),
            State::DcsPassthrough => listener.dcs_unhook(),
            State::SosPmApcString => match self.string_kind.take() {
                Some(StringKind::Apc) => listener.apc_end(),
                Some(StringKind::Pm) => listener.pm_end(),
                Some(StringKind::Sos) | None => {}
            },
            _ => {}
        }
    }

    fn collect_intermediate(&mut self, byte: u8) {
        if self.intermediates.len() < MAX_INTERMEDIATES {
            self.intermediates.push(byte);
        } else {
            self.intermediates_overflow = true;
        }
    }

    fn accumulate_digit(&mut self, digit: u8) {
        self.param = self
            .param
            .saturating_mul(10)
            .saturating_add(u16::from(digit));
        self.param_has_digits = true;
    }

    /// Close the current parameter at a `;` or `:` separator.
    ///
    /// Returns `false` on slot exhaustion, in which case the caller enters
    /// the ignore state.
    fn next_param(&mut self, sub_follows: bool) -> bool {
        let pushed = self.params.push(self.param, self.param_is_sub);
        self.param = 0;
        self.param_has_digits = false;
        self.param_is_sub = sub_follows;
        pushed
    }

    /// Close the trailing parameter before dispatch.
    fn finish_params(&mut self) {
        if self.param_has_digits || self.param_is_sub || !self.params.is_empty() {
            let _ = self.params.push(self.param, self.param_is_sub);
        }
        self.param = 0;
        self.param_has_digits = false;
        self.param_is_sub = false;
    }

    // ── Ground / Escape ─────────────────────────────────────────────

    fn advance_ground(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => {
                listener.execute(byte);
                self.batch_runs = true;
            }
            0x20..=0x7E => listener.print(byte as char),
            _ => {} // DEL
        }
    }

    fn advance_escape(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => listener.execute(byte),
            0x20..=0x2F => {
                self.collect_intermediate(byte);
                self.state = State::EscapeIntermediate;
            }
            b'[' => {
                self.clear_sequence();
                self.state = State::CsiEntry;
            }
            b']' => {
                listener.osc_start();
                self.state = State::OscString;
            }
            b'P' => {
                self.clear_sequence();
                self.state = State::DcsEntry;
            }
            b'X' => {
                self.string_kind = Some(StringKind::Sos);
                self.state = State::SosPmApcString;
            }
            b'^' => {
                self.string_kind = Some(StringKind::Pm);
                listener.pm_start();
                self.state = State::SosPmApcString;
            }
            b'_' => {
                self.string_kind = Some(StringKind::Apc);
                listener.apc_start();
                self.state = State::SosPmApcString;
            }
            0x30..=0x7E => {
                listener.esc_dispatch(&self.intermediates, byte);
                self.state = State::Ground;
            }
            _ => {} // DEL
        }
    }

    fn advance_escape_intermediate(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => listener.execute(byte),
            0x20..=0x2F => self.collect_intermediate(byte),
            0x30..=0x7E => {
                listener.esc_dispatch(&self.intermediates, byte);
                self.state = State::Ground;
            }
            _ => {} // DEL
        }
    }

    // ── CSI ─────────────────────────────────────────────────────────

    fn csi_dispatch(&mut self, listener: &mut impl Events, final_byte: u8) {
        self.finish_params();
        if self.intermediates_overflow {
            listener.error("CSI sequence with too many intermediates");
        } else {
            listener.csi_dispatch(
                self.private_marker,
                &self.params,
                &self.intermediates,
                final_byte,
            );
        }
        self.state = State::Ground;
    }

    fn advance_csi_entry(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => listener.execute(byte),
            0x20..=0x2F => {
                self.collect_intermediate(byte);
                self.state = State::CsiIntermediate;
            }
            0x30..=0x3B => {
                self.state = State::CsiParam;
                self.advance_csi_param(listener, byte);
            }
            0x3C..=0x3F => {
                self.private_marker = Some(byte);
                self.state = State::CsiParam;
            }
            0x40..=0x7E => self.csi_dispatch(listener, byte),
            _ => {} // DEL
        }
    }

    fn advance_csi_param(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => listener.execute(byte),
            b'0'..=b'9' => self.accumulate_digit(byte - b'0'),
            b';' => {
                if !self.next_param(false) {
                    listener.error("CSI sequence with too many parameters");
                    self.state = State::CsiIgnore;
                }
            }
            b':' => {
                if !self.next_param(true) {
                    listener.error("CSI sequence with too many parameters");
                    self.state = State::CsiIgnore;
                }
            }
            0x20..=0x2F => {
                self.collect_intermediate(byte);
                self.state = State::CsiIntermediate;
            }
            0x3C..=0x3F => {
                listener.error("private marker inside CSI parameters");
                self.state = State::CsiIgnore;
            }
            0x40..=0x7E => self.csi_dispatch(listener, byte),
            _ => {} // DEL
        }
    }

    fn advance_csi_intermediate(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => listener.execute(byte),
            0x20..=0x2F => self.collect_intermediate(byte),
            0x30..=0x3F => {
                listener.error("parameter after CSI intermediate byte");
                self.state = State::CsiIgnore;
            }
            0x40..=0x7E => self.csi_dispatch(listener, byte),
            _ => {} // DEL
        }
    }

    fn advance_csi_ignore(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => listener.execute(byte),
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    // ── DCS ─────────────────────────────────────────────────────────

    fn dcs_hook(&mut self, listener: &mut impl Events, final_byte: u8) {
        self.finish_params();
        if self.intermediates_overflow {
            listener.error("DCS sequence with too many intermediates");
            self.state = State::DcsIgnore;
        } else {
            listener.dcs_hook(&self.params, &self.intermediates, final_byte);
            self.state = State::DcsPassthrough;
        }
    }

    fn advance_dcs_entry(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x20..=0x2F => {
                self.collect_intermediate(byte);
                self.state = State::DcsIntermediate;
            }
            0x30..=0x3B => {
                self.state = State::DcsParam;
                self.advance_dcs_param(listener, byte);
            }
            0x3C..=0x3F => {
                self.private_marker = Some(byte);
                self.state = State::DcsParam;
            }
            0x40..=0x7E => self.dcs_hook(listener, byte),
            _ => {} // C0 and DEL ignored inside DCS headers
        }
    }

    fn advance_dcs_param(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            b'0'..=b'9' => self.accumulate_digit(byte - b'0'),
            b';' => {
                if !self.next_param(false) {
                    self.state = State::DcsIgnore;
                }
            }
            b':' => {
                if !self.next_param(true) {
                    self.state = State::DcsIgnore;
                }
            }
            0x20..=0x2F => {
                self.collect_intermediate(byte);
                self.state = State::DcsIntermediate;
            }
            0x3C..=0x3F => {
                listener.error("private marker inside DCS parameters");
                self.state = State::DcsIgnore;
            }
            0x40..=0x7E => self.dcs_hook(listener, byte),
            _ => {}
        }
    }

    fn advance_dcs_intermediate(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x20..=0x2F => self.collect_intermediate(byte),
            0x30..=0x3F => {
                listener.error("parameter after DCS intermediate byte");
                self.state = State::DcsIgnore;
            }
            0x40..=0x7E => self.dcs_hook(listener, byte),
            _ => {}
        }
    }

    fn advance_dcs_passthrough(&mut self, listener: &mut impl Events, byte: u8) {
        // ESC (ST) is handled by the anywhere rule; everything else except
        // DEL is payload.
        if byte != 0x7F {
            listener.dcs_put(byte);
        }
    }

    fn advance_dcs_ignore(&mut self, byte: u8) {
        // Consume until ST (via the anywhere ESC rule) or BEL.
        if byte == 0x07 {
            self.state = State::Ground;
        }
    }

    // ── OSC / SOS / PM / APC ────────────────────────────────────────

    fn advance_osc_string(&mut self, listener: &mut impl Events, byte: u8) {
        match byte {
            0x07 => {
                // BEL terminator (xterm extension).
                listener.osc_end();
                self.state = State::Ground;
            }
            0x20..=0xFF => listener.osc_put(byte),
            _ => {} // C0 ignored inside OSC
        }
    }

    fn advance_sos_pm_apc(&mut self, listener: &mut impl Events, byte: u8) {
        if !(0x20..=0xFF).contains(&byte) {
            return;
        }
        match self.string_kind {
            Some(StringKind::Apc) => listener.apc_put(byte),
            Some(StringKind::Pm) => listener.pm_put(byte),
            Some(StringKind::Sos) | None => {}
        }
    }
}
