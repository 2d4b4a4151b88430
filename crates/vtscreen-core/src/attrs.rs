//! Graphics attributes: colors, underline styles, and SGR flags.

use bitflags::bitflags;

/// Color representation for terminal cells.
///
/// Supports the standard terminal color model hierarchy:
/// default → 16 named → 256 indexed → 24-bit RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default (SGR 39 / SGR 49).
    #[default]
    Default,
    /// Named color index (0-15): standard 8 + bright 8.
    Named(u8),
    /// 256-color palette index (0-255).
    Indexed(u8),
    /// 24-bit true color.
    Rgb(u8, u8, u8),
}

/// Underline rendering style (SGR 4:0 .. 4:5 sub-parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UnderlineStyle {
    #[default]
    Straight,
    Double,
    Curly,
    Dotted,
    Dashed,
}

bitflags! {
    /// SGR text attribute flags.
    ///
    /// Maps directly to the ECMA-48 / VT SGR parameter values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SgrFlags: u16 {
        const BOLD              = 1 << 0;
        const FAINT             = 1 << 1;
        const ITALIC            = 1 << 2;
        const UNDERLINE         = 1 << 3;
        const BLINK             = 1 << 4;
        const RAPID_BLINK       = 1 << 5;
        const INVERSE           = 1 << 6;
        const HIDDEN            = 1 << 7;
        const CROSSED_OUT       = 1 << 8;
        const DOUBLY_UNDERLINED = 1 << 9;
        const CURLY_UNDERLINED  = 1 << 10;
        const FRAMED            = 1 << 11;
        const ENCIRCLED         = 1 << 12;
        const OVERLINE          = 1 << 13;
    }
}

/// The full graphics rendition carried by each cell: colors, underline
/// color/style, and the SGR flag set.
///
/// The hyperlink handle is deliberately *not* part of this struct — it lives
/// on the cell, since links span attribute changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GraphicsAttributes {
    pub fg: Color,
    pub bg: Color,
    /// Underline color (SGR 58). `None` means use the foreground color.
    pub underline_color: Option<Color>,
    pub underline_style: UnderlineStyle,
    pub flags: SgrFlags,
}

impl GraphicsAttributes {
    /// Reset to the default rendition (SGR 0).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether every field is at its default (a "plain" rendition).
    ///
    /// Plain renditions allow lines to stay in their trivial representation.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attributes_are_plain() {
        let attrs = GraphicsAttributes::default();
        assert!(attrs.is_default());
        assert_eq!(attrs.fg, Color::Default);
        assert_eq!(attrs.bg, Color::Default);
        assert_eq!(attrs.underline_color, None);
        assert_eq!(attrs.underline_style, UnderlineStyle::Straight);
        assert!(attrs.flags.is_empty());
    }

    #[test]
    fn reset_restores_defaults() {
        let mut attrs = GraphicsAttributes {
            fg: Color::Rgb(255, 0, 0),
            bg: Color::Indexed(42),
            underline_color: Some(Color::Named(3)),
            underline_style: UnderlineStyle::Curly,
            flags: SgrFlags::BOLD | SgrFlags::CURLY_UNDERLINED,
        };
        assert!(!attrs.is_default());
        attrs.reset();
        assert!(attrs.is_default());
    }
}
