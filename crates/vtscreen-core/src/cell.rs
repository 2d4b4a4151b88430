//! Terminal cell: the fundamental unit of the grid.
//!
//! The grid is generic over the cell representation so the storage strategy
//! is chosen once, at construction, with no per-cell dynamic dispatch. Both
//! implementations honor the same contract:
//!
//! - zero or more codepoints forming one grapheme cluster (zero ⇒ empty),
//! - a display width of 1 or 2 (0 marks the continuation half of a wide
//!   character),
//! - graphics attributes and an optional hyperlink handle.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use unicode_width::UnicodeWidthChar;

use crate::attrs::GraphicsAttributes;

/// Variation Selector-16: requests emoji (wide) presentation for the
/// preceding codepoint.
pub(crate) const VS16: char = '\u{FE0F}';

/// Upper bound on codepoints stored per cell. ZWJ emoji sequences stay well
/// below this; anything longer is dropped rather than grown unboundedly.
const MAX_CODEPOINTS: usize = 7;

/// Display width of a single codepoint in terminal columns.
///
/// Returns 0 for combining marks and other non-spacing codepoints, 1 for
/// narrow and 2 for East-Asian Wide/Fullwidth characters.
#[must_use]
pub fn display_width(ch: char) -> u8 {
    match UnicodeWidthChar::width(ch) {
        Some(w) => w.min(2) as u8,
        None => 0,
    }
}

/// Contract shared by all cell representations.
pub trait Cell: Clone + Default + PartialEq + std::fmt::Debug {
    /// Overwrite this cell with a single codepoint, width, and attributes.
    ///
    /// Any previous codepoints and hyperlink are discarded.
    fn write(&mut self, attrs: GraphicsAttributes, ch: char, width: u8);

    /// Append a codepoint to the grapheme cluster in this cell.
    ///
    /// Returns the new display width if appending changed it (a VS16 turning
    /// a narrow base into a wide cluster), or 0 when the width is unchanged.
    fn append_character(&mut self, ch: char) -> u8;

    fn codepoint_count(&self) -> usize;

    fn first_codepoint(&self) -> Option<char>;

    /// Display width: 1 or 2, or 0 for a wide-character continuation cell.
    fn width(&self) -> u8;

    fn set_width(&mut self, width: u8);

    /// A cell with no codepoints. Continuation and erased cells are empty.
    fn is_empty(&self) -> bool {
        self.codepoint_count() == 0
    }

    /// Whether this cell is the trailing half of a wide character.
    fn is_wide_continuation(&self) -> bool {
        self.width() == 0
    }

    fn attributes(&self) -> &GraphicsAttributes;

    fn attributes_mut(&mut self) -> &mut GraphicsAttributes;

    fn hyperlink(&self) -> HyperlinkId;

    fn set_hyperlink(&mut self, id: HyperlinkId);

    /// UTF-8 rendition of this cell. Empty cells render as a single space.
    fn to_utf8(&self) -> String;

    /// Erase this cell: no codepoints, width 1, given fill attributes.
    fn reset(&mut self, attrs: GraphicsAttributes);

    /// A blank fill cell carrying the given attributes.
    fn filled(attrs: GraphicsAttributes) -> Self {
        let mut cell = Self::default();
        cell.reset(attrs);
        cell
    }

    /// The trailing half of a wide character: empty, width 0, same
    /// attributes and hyperlink as the leading cell.
    fn continuation(attrs: GraphicsAttributes, hyperlink: HyperlinkId) -> Self {
        let mut cell = Self::default();
        cell.reset(attrs);
        cell.set_width(0);
        cell.set_hyperlink(hyperlink);
        cell
    }
}

/// Compute the width a cluster should have after appending `ch`.
fn appended_width(current: u8, ch: char) -> u8 {
    if ch == VS16 {
        return 2;
    }
    current.max(display_width(ch))
}

/// Cell storing its codepoints inline.
///
/// The common case (one codepoint, occasionally a combining mark or VS16)
/// never leaves the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactCell {
    codepoints: SmallVec<[char; 2]>,
    width: u8,
    attrs: GraphicsAttributes,
    hyperlink: HyperlinkId,
}

impl Default for CompactCell {
    fn default() -> Self {
        Self {
            codepoints: SmallVec::new(),
            width: 1,
            attrs: GraphicsAttributes::default(),
            hyperlink: 0,
        }
    }
}

impl Cell for CompactCell {
    fn write(&mut self, attrs: GraphicsAttributes, ch: char, width: u8) {
        self.codepoints.clear();
        self.codepoints.push(ch);
        self.width = width;
        self.attrs = attrs;
        self.hyperlink = 0;
    }

    fn append_character(&mut self, ch: char) -> u8 {
        if self.codepoints.len() >= MAX_CODEPOINTS {
            return 0;
        }
        self.codepoints.push(ch);
        let new_width = appended_width(self.width, ch);
        if new_width != self.width {
            self.width = new_width;
            new_width
        } else {
            0
        }
    }

    fn codepoint_count(&self) -> usize {
        self.codepoints.len()
    }

    fn first_codepoint(&self) -> Option<char> {
        self.codepoints.first().copied()
    }

    fn width(&self) -> u8 {
        self.width
    }

    fn set_width(&mut self, width: u8) {
        self.width = width;
    }

    fn attributes(&self) -> &GraphicsAttributes {
        &self.attrs
    }

    fn attributes_mut(&mut self) -> &mut GraphicsAttributes {
        &mut self.attrs
    }

    fn hyperlink(&self) -> HyperlinkId {
        self.hyperlink
    }

    fn set_hyperlink(&mut self, id: HyperlinkId) {
        self.hyperlink = id;
    }

    fn to_utf8(&self) -> String {
        if self.codepoints.is_empty() {
            " ".to_string()
        } else {
            self.codepoints.iter().collect()
        }
    }

    fn reset(&mut self, attrs: GraphicsAttributes) {
        self.codepoints.clear();
        self.width = 1;
        self.attrs = attrs;
        self.hyperlink = 0;
    }
}

/// Cell storing its grapheme cluster as a `String`.
///
/// The straightforward reference representation: simpler to reason about,
/// one heap allocation per multi-codepoint cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleCell {
    text: String,
    width: u8,
    attrs: GraphicsAttributes,
    hyperlink: HyperlinkId,
}

impl Default for SimpleCell {
    fn default() -> Self {
        Self {
            text: String::new(),
            width: 1,
            attrs: GraphicsAttributes::default(),
            hyperlink: 0,
        }
    }
}

impl Cell for SimpleCell {
    fn write(&mut self, attrs: GraphicsAttributes, ch: char, width: u8) {
        self.text.clear();
        self.text.push(ch);
        self.width = width;
        self.attrs = attrs;
        self.hyperlink = 0;
    }

    fn append_character(&mut self, ch: char) -> u8 {
        if self.text.chars().count() >= MAX_CODEPOINTS {
            return 0;
        }
        self.text.push(ch);
        let new_width = appended_width(self.width, ch);
        if new_width != self.width {
            self.width = new_width;
            new_width
        } else {
            0
        }
    }

    fn codepoint_count(&self) -> usize {
        self.text.chars().count()
    }

    fn first_codepoint(&self) -> Option<char> {
        self.text.chars().next()
    }

    fn width(&self) -> u8 {
        self.width
    }

    fn set_width(&mut self, width: u8) {
        self.width = width;
    }

    fn attributes(&self) -> &GraphicsAttributes {
        &self.attrs
    }

    fn attributes_mut(&mut self) -> &mut GraphicsAttributes {
        &mut self.attrs
    }

    fn hyperlink(&self) -> HyperlinkId {
        self.hyperlink
    }

    fn set_hyperlink(&mut self, id: HyperlinkId) {
        self.hyperlink = id;
    }

    fn to_utf8(&self) -> String {
        if self.text.is_empty() {
            " ".to_string()
        } else {
            self.text.clone()
        }
    }

    fn reset(&mut self, attrs: GraphicsAttributes) {
        self.text.clear();
        self.width = 1;
        self.attrs = attrs;
        self.hyperlink = 0;
    }
}

/// Hyperlink identifier for OSC 8 links.
///
/// Zero means "no link". Non-zero values index into the screen's
/// [`HyperlinkRegistry`].
pub type HyperlinkId = u16;

/// Interner for OSC 8 hyperlink URIs.
///
/// Cells store compact [`HyperlinkId`]s instead of full URI strings. Handles
/// are valid for the lifetime of the screen; the registry is only cleared by
/// a full reset.
#[derive(Debug, Clone, Default)]
pub struct HyperlinkRegistry {
    uris: Vec<String>,
    lookup: FxHashMap<String, HyperlinkId>,
}

impl HyperlinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a URI and return its hyperlink ID.
    ///
    /// Empty URIs return 0 ("no link"), as does running out of ID space.
    pub fn intern(&mut self, uri: &str) -> HyperlinkId {
        if uri.is_empty() {
            return 0;
        }
        if let Some(&id) = self.lookup.get(uri) {
            return id;
        }
        let next = self.uris.len() + 1;
        if next > HyperlinkId::MAX as usize {
            return 0;
        }
        let id = next as HyperlinkId;
        self.uris.push(uri.to_string());
        self.lookup.insert(uri.to_string(), id);
        id
    }

    /// Look up the URI for a hyperlink ID.
    #[must_use]
    pub fn get(&self, id: HyperlinkId) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.uris.get(id as usize - 1).map(String::as_str)
    }

    /// Drop all registered hyperlinks (full reset).
    pub fn clear(&mut self) {
        self.uris.clear();
        self.lookup.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}
