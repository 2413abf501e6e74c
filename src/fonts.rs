//! Font resolution and text metrics for text watermarks
//!
//! The crate never loads font files. Families are classified into a few
//! classes whose average advance widths are good enough to center a text
//! watermark on its anchor, and which map onto the PDF standard fonts.

/// Family used when the requested one is unavailable
pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";

/// Family able to shape CJK glyphs (Adobe-GB1 predefined CID font)
pub const CJK_FONT_FAMILY: &str = "STSong-Light";

/// Text size in points at scale 1.0
pub const TEXT_BASE_SIZE: f64 = 30.0;

/// Broad font class, decides metrics and the PDF base font
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontClass {
    Sans,
    Serif,
    Mono,
    Cjk,
}

impl FontClass {
    /// Classify a family name
    pub fn of(family: &str) -> Self {
        let name = family.to_ascii_lowercase();
        if name == CJK_FONT_FAMILY.to_ascii_lowercase()
            || ["song", "hei", "kai", "ming", "mincho", "yahei"]
                .iter()
                .any(|k| name.contains(k))
        {
            FontClass::Cjk
        } else if name.contains("courier") || name.contains("mono") || name.contains("consol") {
            FontClass::Mono
        } else if name.contains("times")
            || name.contains("garamond")
            || name.contains("georgia")
            || (name.contains("serif") && !name.contains("sans"))
        {
            FontClass::Serif
        } else {
            FontClass::Sans
        }
    }

    fn ascent(self) -> f64 {
        match self {
            FontClass::Cjk => 0.88,
            FontClass::Mono => 0.63,
            _ => 0.72,
        }
    }

    fn descent(self) -> f64 {
        match self {
            FontClass::Cjk => 0.12,
            FontClass::Mono => 0.16,
            _ => 0.21,
        }
    }
}

/// A family chosen for a particular piece of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub family: String,
    pub class: FontClass,
}

/// Picks the family a text watermark is drawn with
///
/// `available` comes from the host's font enumeration. Lookup is
/// case-insensitive; anything unknown falls back to `default_family`, and
/// content containing CJK codepoints always gets `cjk_family`.
#[derive(Debug, Clone)]
pub struct FontResolver {
    available: Vec<String>,
    default_family: String,
    cjk_family: String,
}

impl Default for FontResolver {
    fn default() -> Self {
        Self::new(
            ["Helvetica", "Times-Roman", "Courier"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl FontResolver {
    pub fn new(available: Vec<String>) -> Self {
        Self {
            available,
            default_family: DEFAULT_FONT_FAMILY.to_string(),
            cjk_family: CJK_FONT_FAMILY.to_string(),
        }
    }

    pub fn with_cjk_family(mut self, family: impl Into<String>) -> Self {
        self.cjk_family = family.into();
        self
    }

    pub fn resolve(&self, requested: &str, content: &str) -> ResolvedFont {
        if contains_cjk(content) {
            return ResolvedFont {
                family: self.cjk_family.clone(),
                class: FontClass::Cjk,
            };
        }

        let family = self
            .available
            .iter()
            .find(|f| f.eq_ignore_ascii_case(requested.trim()))
            .cloned()
            .unwrap_or_else(|| self.default_family.clone());
        let class = FontClass::of(&family);
        ResolvedFont { family, class }
    }
}

/// True for codepoints a basic Latin font cannot render
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF     // Hangul Jamo
        | 0x2E80..=0x2FDF   // radicals
        | 0x3000..=0x303F   // CJK symbols and punctuation
        | 0x3040..=0x30FF   // Hiragana, Katakana
        | 0x3100..=0x31BF   // Bopomofo
        | 0x3400..=0x4DBF   // Extension A
        | 0x4E00..=0x9FFF   // Unified ideographs
        | 0xAC00..=0xD7AF   // Hangul syllables
        | 0xF900..=0xFAFF   // Compatibility ideographs
        | 0xFF00..=0xFFEF   // Half/full-width forms
        | 0x20000..=0x2FA1F // Extensions B..F, supplement
    )
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Measured text box in points, unrotated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextExtent {
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl TextExtent {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

/// Approximate advance of `text` at `size` points
pub fn measure_text(text: &str, font: &ResolvedFont, size: f64) -> TextExtent {
    let em: f64 = text.chars().map(|c| advance_em(c, font.class)).sum();
    TextExtent {
        width: em * size,
        ascent: font.class.ascent() * size,
        descent: font.class.descent() * size,
    }
}

fn advance_em(c: char, class: FontClass) -> f64 {
    match class {
        FontClass::Mono => 0.6,
        FontClass::Cjk => {
            if is_cjk(c) {
                1.0
            } else {
                0.5
            }
        }
        FontClass::Sans => latin_advance(c),
        FontClass::Serif => latin_advance(c) * 0.93,
    }
}

fn latin_advance(c: char) -> f64 {
    match c {
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '!' | '|' | '\'' => 0.24,
        ' ' | 'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' | '/' => 0.31,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.86,
        'A'..='Z' => 0.68,
        _ => 0.55,
    }
}
