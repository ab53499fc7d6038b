//! Static table of content stream operators.
//!
//! Every operator of PDF 32000-1 Annex A has one entry. Operators that open a
//! scope (`q`, `BT`, `BDC`, `BMC`, `BX`) name the operator that closes it, so
//! that a parser can check nesting without knowing what the operators draw.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Role of a keyword in the nesting structure of a content stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum KeywordClass {
    Standalone,
    Opening,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum KeywordId {
    /// Sentinel for operators missing from the table.
    Unknown,
    CloseFillStroke,
    FillStroke,
    CloseFillStrokeEvenOdd,
    FillStrokeEvenOdd,
    BeginMarkedContentProperties,
    BeginInlineImage,
    BeginMarkedContent,
    BeginText,
    BeginCompatibility,
    CurveTo,
    ConcatMatrix,
    StrokeColorSpace,
    FillColorSpace,
    DashPattern,
    GlyphWidth,
    GlyphWidthBoundingBox,
    PaintXObject,
    MarkedPointProperties,
    EndInlineImage,
    EndMarkedContent,
    EndText,
    EndCompatibility,
    Fill,
    FillObsolete,
    FillEvenOdd,
    StrokeGray,
    FillGray,
    GraphicsState,
    ClosePath,
    Flatness,
    InlineImageData,
    LineJoin,
    LineCap,
    StrokeCmyk,
    FillCmyk,
    LineTo,
    MoveTo,
    MiterLimit,
    MarkedPoint,
    EndPath,
    SaveState,
    RestoreState,
    Rectangle,
    StrokeRgb,
    FillRgb,
    RenderingIntent,
    CloseStroke,
    Stroke,
    StrokeColor,
    FillColor,
    StrokeColorN,
    FillColorN,
    Shade,
    NextLine,
    CharacterSpacing,
    MoveText,
    MoveTextSetLeading,
    TextFont,
    ShowText,
    ShowTextAdjusted,
    TextLeading,
    TextMatrix,
    TextRenderingMode,
    TextRise,
    WordSpacing,
    HorizontalScaling,
    CurveToInitialReplicated,
    LineWidth,
    Clip,
    ClipEvenOdd,
    CurveToFinalReplicated,
    NextLineShowText,
    NextLineSpacingShowText,
}

/// One row of the keyword table.
#[derive(Debug, PartialEq, Eq)]
pub struct KeywordInfo {
    pub class: KeywordClass,
    pub id: KeywordId,
    /// The closing keyword, set exactly for opening keywords.
    pub close: Option<KeywordId>,
    pub text: &'static str,
    pub description: &'static str,
}

const fn standalone(id: KeywordId, text: &'static str, description: &'static str) -> KeywordInfo {
    KeywordInfo {
        class: KeywordClass::Standalone,
        id,
        close: None,
        text,
        description,
    }
}

const fn opening(id: KeywordId, close: KeywordId, text: &'static str, description: &'static str) -> KeywordInfo {
    KeywordInfo {
        class: KeywordClass::Opening,
        id,
        close: Some(close),
        text,
        description,
    }
}

const fn closing(id: KeywordId, text: &'static str, description: &'static str) -> KeywordInfo {
    KeywordInfo {
        class: KeywordClass::Closing,
        id,
        close: None,
        text,
        description,
    }
}

/// Returned for every keyword not listed in [`KEYWORDS`].
pub static UNKNOWN: KeywordInfo = standalone(KeywordId::Unknown, "", "Unknown keyword");

use KeywordId::*;

pub static KEYWORDS: &[KeywordInfo] = &[
    standalone(CloseFillStroke, "b", "Close, fill, and stroke path using nonzero winding number rule"),
    standalone(FillStroke, "B", "Fill and stroke path using nonzero winding number rule"),
    standalone(CloseFillStrokeEvenOdd, "b*", "Close, fill, and stroke path using even-odd rule"),
    standalone(FillStrokeEvenOdd, "B*", "Fill and stroke path using even-odd rule"),
    opening(
        BeginMarkedContentProperties,
        EndMarkedContent,
        "BDC",
        "Begin marked-content sequence with property list",
    ),
    standalone(BeginInlineImage, "BI", "Begin inline image object"),
    opening(BeginMarkedContent, EndMarkedContent, "BMC", "Begin marked-content sequence"),
    opening(BeginText, EndText, "BT", "Begin text object"),
    opening(BeginCompatibility, EndCompatibility, "BX", "Begin compatibility section"),
    standalone(CurveTo, "c", "Append curved segment to path (three control points)"),
    standalone(ConcatMatrix, "cm", "Concatenate matrix to current transformation matrix"),
    standalone(StrokeColorSpace, "CS", "Set color space for stroking operations"),
    standalone(FillColorSpace, "cs", "Set color space for nonstroking operations"),
    standalone(DashPattern, "d", "Set line dash pattern"),
    standalone(GlyphWidth, "d0", "Set glyph width in Type 3 font"),
    standalone(GlyphWidthBoundingBox, "d1", "Set glyph width and bounding box in Type 3 font"),
    standalone(PaintXObject, "Do", "Invoke named XObject"),
    standalone(MarkedPointProperties, "DP", "Define marked-content point with property list"),
    standalone(EndInlineImage, "EI", "End inline image object"),
    closing(EndMarkedContent, "EMC", "End marked-content sequence"),
    closing(EndText, "ET", "End text object"),
    closing(EndCompatibility, "EX", "End compatibility section"),
    standalone(Fill, "f", "Fill path using nonzero winding number rule"),
    standalone(FillObsolete, "F", "Fill path using nonzero winding number rule (obsolete)"),
    standalone(FillEvenOdd, "f*", "Fill path using even-odd rule"),
    standalone(StrokeGray, "G", "Set gray level for stroking operations"),
    standalone(FillGray, "g", "Set gray level for nonstroking operations"),
    standalone(GraphicsState, "gs", "Set parameters from graphics state parameter dictionary"),
    standalone(ClosePath, "h", "Close subpath"),
    standalone(Flatness, "i", "Set flatness tolerance"),
    standalone(InlineImageData, "ID", "Begin inline image data"),
    standalone(LineJoin, "j", "Set line join style"),
    standalone(LineCap, "J", "Set line cap style"),
    standalone(StrokeCmyk, "K", "Set CMYK color for stroking operations"),
    standalone(FillCmyk, "k", "Set CMYK color for nonstroking operations"),
    standalone(LineTo, "l", "Append straight line segment to path"),
    standalone(MoveTo, "m", "Begin new subpath"),
    standalone(MiterLimit, "M", "Set miter limit"),
    standalone(MarkedPoint, "MP", "Define marked-content point"),
    standalone(EndPath, "n", "End path without filling or stroking"),
    opening(SaveState, RestoreState, "q", "Save graphics state"),
    closing(RestoreState, "Q", "Restore graphics state"),
    standalone(Rectangle, "re", "Append rectangle to path"),
    standalone(StrokeRgb, "RG", "Set RGB color for stroking operations"),
    standalone(FillRgb, "rg", "Set RGB color for nonstroking operations"),
    standalone(RenderingIntent, "ri", "Set color rendering intent"),
    standalone(CloseStroke, "s", "Close and stroke path"),
    standalone(Stroke, "S", "Stroke path"),
    standalone(StrokeColor, "SC", "Set color for stroking operations"),
    standalone(FillColor, "sc", "Set color for nonstroking operations"),
    standalone(
        StrokeColorN,
        "SCN",
        "Set color for stroking operations (ICCBased and special color spaces)",
    ),
    standalone(
        FillColorN,
        "scn",
        "Set color for nonstroking operations (ICCBased and special color spaces)",
    ),
    standalone(Shade, "sh", "Paint area defined by shading pattern"),
    standalone(NextLine, "T*", "Move to start of next text line"),
    standalone(CharacterSpacing, "Tc", "Set character spacing"),
    standalone(MoveText, "Td", "Move text position"),
    standalone(MoveTextSetLeading, "TD", "Move text position and set leading"),
    standalone(TextFont, "Tf", "Set text font and size"),
    standalone(ShowText, "Tj", "Show text"),
    standalone(ShowTextAdjusted, "TJ", "Show text, allowing individual glyph positioning"),
    standalone(TextLeading, "TL", "Set text leading"),
    standalone(TextMatrix, "Tm", "Set text matrix and text line matrix"),
    standalone(TextRenderingMode, "Tr", "Set text rendering mode"),
    standalone(TextRise, "Ts", "Set text rise"),
    standalone(WordSpacing, "Tw", "Set word spacing"),
    standalone(HorizontalScaling, "Tz", "Set horizontal text scaling"),
    standalone(CurveToInitialReplicated, "v", "Append curved segment to path (initial point replicated)"),
    standalone(LineWidth, "w", "Set line width"),
    standalone(Clip, "W", "Set clipping path using nonzero winding number rule"),
    standalone(ClipEvenOdd, "W*", "Set clipping path using even-odd rule"),
    standalone(CurveToFinalReplicated, "y", "Append curved segment to path (final point replicated)"),
    standalone(NextLineShowText, "'", "Move to next line and show text"),
    standalone(
        NextLineSpacingShowText,
        "\"",
        "Set word and character spacing, move to next line, and show text",
    ),
];

static BY_TEXT: LazyLock<HashMap<&'static str, &'static KeywordInfo>> =
    LazyLock::new(|| KEYWORDS.iter().map(|info| (info.text, info)).collect());

static BY_ID: LazyLock<HashMap<KeywordId, &'static KeywordInfo>> =
    LazyLock::new(|| KEYWORDS.iter().map(|info| (info.id, info)).collect());

/// Table entry for `text`, or [`UNKNOWN`].
pub fn lookup(text: &str) -> &'static KeywordInfo {
    BY_TEXT.get(text).copied().unwrap_or(&UNKNOWN)
}

/// Table entry for `id`; [`KeywordId::Unknown`] yields [`UNKNOWN`].
pub fn info(id: KeywordId) -> &'static KeywordInfo {
    BY_ID.get(&id).copied().unwrap_or(&UNKNOWN)
}

impl KeywordId {
    pub fn info(self) -> &'static KeywordInfo {
        info(self)
    }

    pub fn as_str(self) -> &'static str {
        self.info().text
    }
}

/// An operator as written in a content stream.
#[derive(Debug, Clone, Eq)]
pub enum Keyword {
    Known(KeywordId),
    /// Keyword missing from the table, kept verbatim.
    Unknown(String),
}

impl Keyword {
    pub fn new(text: &str) -> Keyword {
        match lookup(text).id {
            KeywordId::Unknown => Keyword::Unknown(text.to_owned()),
            id => Keyword::Known(id),
        }
    }

    pub fn id(&self) -> KeywordId {
        match self {
            Keyword::Known(id) => *id,
            Keyword::Unknown(text) => lookup(text).id,
        }
    }

    pub fn info(&self) -> &'static KeywordInfo {
        info(self.id())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Keyword::Known(id) => id.as_str(),
            Keyword::Unknown(text) => text,
        }
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Keyword) -> bool {
        match (self.id(), other.id()) {
            (KeywordId::Unknown, KeywordId::Unknown) => self.as_str() == other.as_str(),
            (a, b) => a == b,
        }
    }
}

impl From<KeywordId> for Keyword {
    fn from(id: KeywordId) -> Self {
        Keyword::Known(id)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_id_is_reachable_both_ways() {
        let mut texts = HashSet::new();
        for entry in KEYWORDS {
            assert!(texts.insert(entry.text), "duplicate keyword {}", entry.text);
            assert_eq!(lookup(entry.text), entry);
            assert_eq!(info(entry.id), entry);
        }
        assert_eq!(BY_ID.len(), KEYWORDS.len());
    }

    #[test]
    fn close_is_set_exactly_for_openings() {
        for entry in KEYWORDS {
            match entry.class {
                KeywordClass::Opening => {
                    let close = entry.close.map(info);
                    assert_eq!(close.map(|c| c.class), Some(KeywordClass::Closing), "{}", entry.text);
                }
                _ => assert_eq!(entry.close, None, "{}", entry.text),
            }
        }
    }

    #[test]
    fn marked_content_shares_its_close() {
        assert_eq!(lookup("BDC").close, Some(KeywordId::EndMarkedContent));
        assert_eq!(lookup("BMC").close, Some(KeywordId::EndMarkedContent));
        assert_eq!(lookup("q").close, Some(KeywordId::RestoreState));
        assert_eq!(lookup("BT").close, Some(KeywordId::EndText));
    }

    #[test]
    fn unknown_keywords_compare_by_text() {
        assert_eq!(lookup("setrgbcolor"), &UNKNOWN);
        assert_eq!(info(KeywordId::Unknown).class, KeywordClass::Standalone);
        assert_eq!(Keyword::new("foo"), Keyword::Unknown("foo".into()));
        assert_ne!(Keyword::new("foo"), Keyword::new("bar"));
        assert_eq!(Keyword::Unknown("q".into()), Keyword::Known(KeywordId::SaveState));
    }
}
