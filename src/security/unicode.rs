//! Invisible-character and homoglyph risk scoring.
//!
//! Nothing here rejects text. [`scan_text`] reports what it found and an
//! aggregate score so the caller can decide.

use serde::{Deserialize, Serialize};
use unicode_categories::UnicodeCategories;

/// At most this many findings are recorded; counts keep going.
pub const MAX_FINDINGS: usize = 32;

/// Scores are clamped to this.
pub const MAX_SCORE: u32 = 100;

const BIDI_WEIGHT: u32 = 25;
const ZERO_WIDTH_WEIGHT: u32 = 10;
const INVISIBLE_WEIGHT: u32 = 5;
const MIXED_SCRIPT_WEIGHT: u32 = 15;
const CONFUSABLE_WEIGHT: u32 = 5;

/// Cyrillic and Greek letters that render like a Latin letter.
static CONFUSABLES: phf::Map<char, char> = phf::phf_map! {
    // Cyrillic lower case
    'а' => 'a', 'в' => 'b', 'е' => 'e', 'һ' => 'h', 'і' => 'i', 'ј' => 'j',
    'к' => 'k', 'м' => 'm', 'о' => 'o', 'р' => 'p', 'с' => 'c',
    'т' => 't', 'у' => 'y', 'х' => 'x', 'ѕ' => 's', 'ԁ' => 'd', 'ԛ' => 'q',
    'ԝ' => 'w', 'ӏ' => 'l', 'ү' => 'y',
    // Cyrillic upper case
    'А' => 'A', 'В' => 'B', 'Е' => 'E', 'К' => 'K', 'М' => 'M', 'Н' => 'H',
    'О' => 'O', 'Р' => 'P', 'С' => 'C', 'Т' => 'T', 'Х' => 'X', 'Ѕ' => 'S',
    'І' => 'I', 'Ј' => 'J', 'Ү' => 'Y', 'Ԛ' => 'Q', 'Ԝ' => 'W',
    // Greek lower case
    'α' => 'a', 'β' => 'b', 'γ' => 'y', 'ε' => 'e', 'ι' => 'i', 'κ' => 'k',
    'ν' => 'v', 'ο' => 'o', 'ρ' => 'p', 'τ' => 't', 'υ' => 'u', 'χ' => 'x',
    // Greek upper case
    'Α' => 'A', 'Β' => 'B', 'Ε' => 'E', 'Ζ' => 'Z', 'Η' => 'H', 'Ι' => 'I',
    'Κ' => 'K', 'Μ' => 'M', 'Ν' => 'N', 'Ο' => 'O', 'Ρ' => 'P', 'Τ' => 'T',
    'Υ' => 'Y', 'Χ' => 'X',
};

/// Coarse script classes relevant to Latin look-alikes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Script {
    Latin,
    Greek,
    Cyrillic,
    Other,
}

pub(crate) fn script_of(c: char) -> Script {
    match c {
        'A'..='Z' | 'a'..='z' => Script::Latin,
        '\u{00C0}'..='\u{024F}' | '\u{1E00}'..='\u{1EFF}' if c.is_alphabetic() => Script::Latin,
        '\u{0370}'..='\u{03FF}' | '\u{1F00}'..='\u{1FFF}' => Script::Greek,
        '\u{0400}'..='\u{052F}' | '\u{2DE0}'..='\u{2DFF}' | '\u{A640}'..='\u{A69F}' => {
            Script::Cyrillic
        }
        _ => Script::Other,
    }
}

fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' | '\u{200E}' | '\u{200F}' | '\u{061C}'
    )
}

fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{180E}'
    )
}

/// Latin and Cyrillic/Greek in one run of letters.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ScriptMix {
    latin: bool,
    greek: bool,
    cyrillic: bool,
}

impl ScriptMix {
    pub(crate) fn add(&mut self, c: char) {
        match script_of(c) {
            Script::Latin => self.latin = true,
            Script::Greek => self.greek = true,
            Script::Cyrillic => self.cyrillic = true,
            Script::Other => {}
        }
    }

    pub(crate) fn is_mixed(&self) -> bool {
        self.latin && (self.greek || self.cyrillic)
    }
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// An explicit directional formatting character.
    BidiControl,
    /// A zero-width space, joiner or similar.
    ZeroWidth,
    /// Any other invisible format character (`Cf`).
    InvisibleFormat,
    /// A word mixing Latin with Cyrillic or Greek letters.
    MixedScript,
    /// A Cyrillic or Greek letter standing in for a Latin one inside a
    /// mixed-script word.
    Confusable,
}

/// One flagged location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// What was found.
    pub kind: FindingKind,
    /// Byte offset into the scanned text.
    pub offset: usize,
    /// The offending character, or the first character of a flagged word.
    pub character: char,
}

/// Result of [`scan_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnicodeReport {
    /// Aggregate risk, `0..=100`.
    pub score: u32,
    /// Bidirectional controls seen.
    pub bidi_controls: usize,
    /// Zero-width characters seen.
    pub zero_width: usize,
    /// Other invisible format characters seen.
    pub invisible: usize,
    /// Mixed-script words seen.
    pub mixed_script_words: usize,
    /// Confusable substitutions seen.
    pub confusables: usize,
    /// The first [`MAX_FINDINGS`] findings, by offset.
    pub findings: Vec<Finding>,
    /// Whether findings were dropped.
    pub truncated: bool,
}

impl UnicodeReport {
    /// Whether nothing at all was flagged.
    pub fn is_clean(&self) -> bool {
        self.score == 0
    }

    fn record(&mut self, kind: FindingKind, offset: usize, character: char) {
        if self.findings.len() < MAX_FINDINGS {
            self.findings.push(Finding {
                kind,
                offset,
                character,
            });
        } else {
            self.truncated = true;
        }
    }

    fn compute_score(&self) -> u32 {
        let weighted = [
            (self.bidi_controls, BIDI_WEIGHT),
            (self.zero_width, ZERO_WIDTH_WEIGHT),
            (self.invisible, INVISIBLE_WEIGHT),
            (self.mixed_script_words, MIXED_SCRIPT_WEIGHT),
            (self.confusables, CONFUSABLE_WEIGHT),
        ];
        weighted
            .iter()
            .fold(0u32, |acc, &(count, weight)| {
                let count = u32::try_from(count).unwrap_or(u32::MAX);
                acc.saturating_add(count.saturating_mul(weight))
            })
            .min(MAX_SCORE)
    }
}

/// A word being accumulated by [`scan_text`].
#[derive(Default)]
struct Word {
    start: Option<(usize, char)>,
    mix: ScriptMix,
    /// Confusable letters in the word, by offset.
    candidates: Vec<(usize, char)>,
}

impl Word {
    fn push(&mut self, offset: usize, c: char) {
        if self.start.is_none() {
            self.start = Some((offset, c));
        }
        self.mix.add(c);
        if CONFUSABLES.contains_key(&c) {
            self.candidates.push((offset, c));
        }
    }

    fn finish(&mut self, report: &mut UnicodeReport) {
        if let Some((offset, first)) = self.start.take() {
            if self.mix.is_mixed() {
                report.mixed_script_words += 1;
                report.record(FindingKind::MixedScript, offset, first);
                for &(at, c) in &self.candidates {
                    report.confusables += 1;
                    report.record(FindingKind::Confusable, at, c);
                }
            }
        }
        self.mix = ScriptMix::default();
        self.candidates.clear();
    }
}

/// Score `text` for invisible and look-alike characters.
///
/// ```
/// # use markpass::scan_text;
/// assert!(scan_text("plain text").is_clean());
/// let report = scan_text("p\u{430}ypal");
/// assert_eq!(report.mixed_script_words, 1);
/// assert_eq!(report.confusables, 1);
/// ```
pub fn scan_text(text: &str) -> UnicodeReport {
    let mut report = UnicodeReport::default();
    let mut word = Word::default();

    for (offset, c) in text.char_indices() {
        if c.is_alphanumeric() || (c == '\'' && word.start.is_some()) {
            word.push(offset, c);
            continue;
        }
        word.finish(&mut report);

        if is_bidi_control(c) {
            report.bidi_controls += 1;
            report.record(FindingKind::BidiControl, offset, c);
        } else if is_zero_width(c) {
            report.zero_width += 1;
            report.record(FindingKind::ZeroWidth, offset, c);
        } else if c.is_other_format() {
            report.invisible += 1;
            report.record(FindingKind::InvisibleFormat, offset, c);
        }
    }
    word.finish(&mut report);

    report.score = report.compute_score();
    report
}

/// Replace look-alike letters with their Latin counterpart and drop
/// invisible characters, so that visually identical strings compare equal.
///
/// ```
/// # use markpass::skeleton;
/// assert_eq!(skeleton("\u{440}\u{430}y\u{200B}pal"), "paypal");
/// ```
pub fn skeleton(text: &str) -> String {
    text.chars()
        .filter(|&c| !(is_bidi_control(c) || is_zero_width(c) || c.is_other_format()))
        .map(|c| CONFUSABLES.get(&c).copied().unwrap_or(c))
        .collect()
}
