//! Packed token metadata, replicating the 32-bit encoding used by
//! vscode-textmate's `tokenizeLine2`.
//!
//! Layout, LSB first:
//! - bits 0..8: language id
//! - bits 8..11: token type
//! - bits 11..14: font style (italic=1, bold=2, underline=4)
//! - bits 14..23: foreground color table index
//! - bits 23..32: background color table index

use serde::{Deserialize, Serialize};

use crate::error::{Error, VermiglioResult};

const LANGUAGE_ID_OFFSET: u32 = 0;
const TOKEN_TYPE_OFFSET: u32 = 8;
const FONT_STYLE_OFFSET: u32 = 11;
const FOREGROUND_OFFSET: u32 = 14;
const BACKGROUND_OFFSET: u32 = 23;

const LANGUAGE_ID_MASK: u32 = 0b1111_1111;
const TOKEN_TYPE_MASK: u32 = 0b111;
const FONT_STYLE_MASK: u32 = 0b111;
const COLOR_MASK: u32 = 0b1_1111_1111;

/// Font style flags as encoded in token metadata
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug,
)]
pub struct FontStyle {
    bits: u8,
}

impl FontStyle {
    /// Italic font style
    pub const ITALIC: Self = Self { bits: 1 };
    /// Bold font style
    pub const BOLD: Self = Self { bits: 2 };
    /// Underline font style
    pub const UNDERLINE: Self = Self { bits: 4 };

    /// Returns an empty set of flags
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Returns `true` if no flags are currently stored
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Returns `true` if all of the flags in `other` are contained within `self`
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Returns the font style from a theme `fontStyle` setting string
    pub fn from_settings_str(font_style_str: &str) -> Self {
        let mut font_style = Self::empty();
        if font_style_str.contains("italic") {
            font_style.insert(FontStyle::ITALIC);
        }
        if font_style_str.contains("bold") {
            font_style.insert(FontStyle::BOLD);
        }
        if font_style_str.contains("underline") {
            font_style.insert(FontStyle::UNDERLINE);
        }
        font_style
    }

    /// Inserts the specified flags in-place
    pub fn insert(&mut self, other: Self) {
        self.bits |= other.bits;
    }

    pub(crate) const fn bits(self) -> u8 {
        self.bits
    }

    pub(crate) const fn from_bits(bits: u8) -> Self {
        Self { bits: bits & 0b111 }
    }
}

/// Packs the five metadata fields into one u32.
/// Fields wider than their slot are truncated to it.
pub const fn pack_metadata(
    language_id: u32,
    token_type: u32,
    font_style: FontStyle,
    foreground: u32,
    background: u32,
) -> u32 {
    ((language_id & LANGUAGE_ID_MASK) << LANGUAGE_ID_OFFSET)
        | ((token_type & TOKEN_TYPE_MASK) << TOKEN_TYPE_OFFSET)
        | (((font_style.bits() as u32) & FONT_STYLE_MASK) << FONT_STYLE_OFFSET)
        | ((foreground & COLOR_MASK) << FOREGROUND_OFFSET)
        | ((background & COLOR_MASK) << BACKGROUND_OFFSET)
}

pub const fn language_id(metadata: u32) -> u32 {
    (metadata >> LANGUAGE_ID_OFFSET) & LANGUAGE_ID_MASK
}

pub const fn token_type(metadata: u32) -> u32 {
    (metadata >> TOKEN_TYPE_OFFSET) & TOKEN_TYPE_MASK
}

pub const fn font_style(metadata: u32) -> FontStyle {
    FontStyle::from_bits(((metadata >> FONT_STYLE_OFFSET) & FONT_STYLE_MASK) as u8)
}

/// Foreground color table index. 0 means unset/inherit.
pub const fn foreground(metadata: u32) -> u32 {
    (metadata >> FOREGROUND_OFFSET) & COLOR_MASK
}

/// Background color table index. 0 means unset/inherit.
pub const fn background(metadata: u32) -> u32 {
    (metadata >> BACKGROUND_OFFSET) & COLOR_MASK
}

/// Canonical class name marker for bold tokens
pub const BOLD_CLASS: &str = "mtkb";
/// Canonical class name marker for italic tokens
pub const ITALIC_CLASS: &str = "mtki";
/// Canonical class name marker for underlined tokens
pub const UNDERLINE_CLASS: &str = "mtku";

/// Returns the theme-independent canonical class names for a token: the
/// `mtk<N>` color class (absent when the foreground index is 0) followed by
/// modifier markers for each set font style bit.
pub(crate) fn canonical_class_names(metadata: u32) -> Vec<String> {
    let mut names = Vec::with_capacity(2);
    let fg = foreground(metadata);
    if fg > 0 {
        names.push(format!("mtk{}", fg));
    }
    let style = font_style(metadata);
    if style.contains(FontStyle::BOLD) {
        names.push(BOLD_CLASS.to_string());
    }
    if style.contains(FontStyle::ITALIC) {
        names.push(ITALIC_CLASS.to_string());
    }
    if style.contains(FontStyle::UNDERLINE) {
        names.push(UNDERLINE_CLASS.to_string());
    }
    names
}

/// The suffix of a canonical class name: the color table index for `mtk<N>`
/// or the single-letter modifier marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CanonicalSuffix {
    Color(u32),
    Bold,
    Italic,
    Underline,
}

impl CanonicalSuffix {
    pub(crate) fn parse(class_name: &str) -> VermiglioResult<Self> {
        match class_name {
            BOLD_CLASS => return Ok(CanonicalSuffix::Bold),
            ITALIC_CLASS => return Ok(CanonicalSuffix::Italic),
            UNDERLINE_CLASS => return Ok(CanonicalSuffix::Underline),
            _ => {}
        }
        let digits = class_name
            .strip_prefix("mtk")
            .ok_or_else(|| Error::InvalidClassName(class_name.to_string()))?;
        let index: u32 = digits
            .parse()
            .map_err(|_| Error::InvalidClassName(class_name.to_string()))?;
        if index == 0 {
            // Index 0 is the reserved "unset" slot and never gets a class
            return Err(Error::InvalidClassName(class_name.to_string()));
        }
        Ok(CanonicalSuffix::Color(index))
    }

    pub(crate) fn as_suffix_string(self) -> String {
        match self {
            CanonicalSuffix::Color(index) => index.to_string(),
            CanonicalSuffix::Bold => "b".to_string(),
            CanonicalSuffix::Italic => "i".to_string(),
            CanonicalSuffix::Underline => "u".to_string(),
        }
    }
}

/// Looks a `mtk<N>` class up in a color map. Indices are 1-based, with
/// slot 0 reserved; anything else is an internal inconsistency.
pub(crate) fn color_from_color_map<'m>(
    color_map: &'m [String],
    class_name: &str,
) -> VermiglioResult<&'m str> {
    match CanonicalSuffix::parse(class_name)? {
        CanonicalSuffix::Color(index) => color_map
            .get(index as usize)
            .map(|c| c.as_str())
            .ok_or_else(|| Error::InvalidClassName(class_name.to_string())),
        _ => Err(Error::InvalidClassName(class_name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_boundary_values() {
        let cases = [
            (0u32, 0u32, FontStyle::empty(), 0u32, 0u32),
            (255, 7, FontStyle::from_bits(7), 511, 511),
            (
                97,
                3,
                FontStyle::ITALIC,
                200,
                130,
            ),
        ];
        for (lang, typ, style, fg, bg) in cases {
            let packed = pack_metadata(lang, typ, style, fg, bg);
            assert_eq!(language_id(packed), lang);
            assert_eq!(token_type(packed), typ);
            assert_eq!(font_style(packed), style);
            assert_eq!(foreground(packed), fg);
            assert_eq!(background(packed), bg);
        }
    }

    #[test]
    fn canonical_names_include_modifiers() {
        let mut style = FontStyle::BOLD;
        style.insert(FontStyle::UNDERLINE);
        let packed = pack_metadata(1, 0, style, 5, 0);
        assert_eq!(canonical_class_names(packed), vec!["mtk5", "mtkb", "mtku"]);
    }

    #[test]
    fn canonical_names_skip_unset_foreground() {
        let packed = pack_metadata(1, 0, FontStyle::ITALIC, 0, 3);
        assert_eq!(canonical_class_names(packed), vec!["mtki"]);
    }

    #[test]
    fn color_lookup_is_one_based() {
        let map = vec![
            "#000000".to_string(),
            "#ff0000".to_string(),
            "#00ff00".to_string(),
        ];
        assert_eq!(color_from_color_map(&map, "mtk1").unwrap(), "#ff0000");
        assert_eq!(color_from_color_map(&map, "mtk2").unwrap(), "#00ff00");
        assert!(color_from_color_map(&map, "mtk0").is_err());
        assert!(color_from_color_map(&map, "mtk3").is_err());
        assert!(color_from_color_map(&map, "bogus").is_err());
    }

    #[test]
    fn suffixes() {
        assert_eq!(
            CanonicalSuffix::parse("mtk12").unwrap().as_suffix_string(),
            "12"
        );
        assert_eq!(
            CanonicalSuffix::parse("mtkb").unwrap().as_suffix_string(),
            "b"
        );
        assert!(CanonicalSuffix::parse("mtk").is_err());
    }
}
