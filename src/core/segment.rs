//! Sentence and word boundary detection.
//!
//! A [`BoundaryDetector`] turns text into an ordered list of non-overlapping
//! byte spans. Bytes that no span covers are always whitespace: that is the only
//! thing segmentation discards. Two detectors ship with the crate:
//!
//! - [`RuleDetector`]: the default, rule-based detector. Words are runs of
//!   letters/digits/symbols with a few joining rules (contractions, decimals,
//!   hyphenated compounds, acronyms); punctuation is split off. Sentences end
//!   at terminal punctuation followed by whitespace and a non-lowercase
//!   character, unless the period closes a known abbreviation or an initial.
//! - [`ModelDetector`]: built from a loaded model. It carries the model's
//!   abbreviation list and, optionally, a word pattern compiled with `regexr`.
//!
//! [`render`] joins the spans into the output string (`\n` between sentences,
//! a space between words) under a byte capacity.

use std::sync::LazyLock;

use log::warn;
use regexr::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;

use super::buffer::{Overflow, TextBuffer};

/// Abbreviations whose trailing period neither ends a sentence nor splits off
/// as its own word token. Stored lowercase, without the final period.
pub const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "dept", "gen", "gov", "lt", "col", "sgt", "capt", "rev", "hon", "jan", "feb", "mar", "apr",
    "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "vol", "fig", "pp", "cf", "al",
    "approx", "est", "mt", "ave", "rd", "blvd", "e.g", "i.e", "a.m", "p.m", "ph.d",
];

/// Kind of token a segmentation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Sentence,
    Word,
}

impl TokenKind {
    /// Byte placed between tokens in the joined output.
    #[inline]
    pub fn separator(self) -> char {
        match self {
            TokenKind::Sentence => '\n',
            TokenKind::Word => ' ',
        }
    }
}

/// Half-open byte range `[start, end)` of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Decides where tokens begin and end.
///
/// Implementations must return spans that are ordered, non-overlapping, lie on
/// UTF-8 character boundaries, never contain the kind's separator, and leave
/// only whitespace uncovered.
pub trait BoundaryDetector: Send + Sync {
    fn detect(&self, text: &str, kind: TokenKind) -> Vec<TokenSpan>;
}

/// Result of segmenting one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    kind: TokenKind,
    text: String,
    spans: Vec<TokenSpan>,
}

impl Segmentation {
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Tokens joined by the kind's separator.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Byte spans into the original input.
    pub fn spans(&self) -> &[TokenSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Iterate over the tokens of the joined output.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        let separator = self.kind.separator();
        let text = if self.spans.is_empty() { None } else { Some(self.text.as_str()) };
        text.into_iter().flat_map(move |t| t.split(separator))
    }
}

/// Join the tokens covered by `spans` with the kind's separator.
///
/// Fails with [`Overflow`] when the joined output would exceed `capacity` bytes.
pub fn render(
    text: &str,
    kind: TokenKind,
    spans: Vec<TokenSpan>,
    capacity: usize,
) -> Result<Segmentation, Overflow> {
    let mut out = TextBuffer::new(capacity);
    for (i, span) in spans.iter().enumerate() {
        if i > 0 {
            out.push(kind.separator())?;
        }
        out.push_str(&text[span.range()])?;
    }
    Ok(Segmentation {
        kind,
        text: out.into_string(),
        spans,
    })
}

/// Rule-based detector used when no model is supplied.
#[derive(Debug, Clone)]
pub struct RuleDetector {
    abbreviations: FxHashSet<String>,
}

impl Default for RuleDetector {
    fn default() -> Self {
        Self::with_abbreviations(DEFAULT_ABBREVIATIONS.iter().copied())
    }
}

impl RuleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a detector with its own abbreviation list (case-insensitive,
    /// trailing period optional).
    pub fn with_abbreviations<I, S>(abbreviations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let abbreviations = abbreviations
            .into_iter()
            .map(|a| a.as_ref().trim_end_matches('.').to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Self { abbreviations }
    }

    pub fn is_abbreviation(&self, word: &str) -> bool {
        self.abbreviations
            .contains(word.trim_end_matches('.').to_lowercase().as_str())
    }

    /// Word spans.
    pub fn words(&self, text: &str) -> Vec<TokenSpan> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let byte_at = |i: usize| if i < n { chars[i].0 } else { text.len() };
        let punctuation = punctuation_mask(text);
        let is_word_char = |i: usize| {
            let (b, c) = chars[i];
            !c.is_whitespace() && !c.is_ascii_punctuation() && !punctuation[b]
        };

        let mut spans = Vec::new();
        let mut i = 0;
        while i < n {
            let (start, c) = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }

            if !is_word_char(i) {
                // Punctuation, with repeats of the same character kept together.
                let mut j = i + 1;
                while j < n && chars[j].1 == c {
                    j += 1;
                }
                spans.push(TokenSpan::new(start, byte_at(j)));
                i = j;
                continue;
            }

            let mut j = i + 1;
            let mut part_len = 1;
            let mut acronym = false;
            loop {
                if j < n && is_word_char(j) {
                    j += 1;
                    part_len += 1;
                    continue;
                }
                if j + 1 < n
                    && is_word_char(j + 1)
                    && joins_word(chars[j - 1].1, chars[j].1, chars[j + 1].1, part_len)
                {
                    if chars[j].1 == '.' && !chars[j - 1].1.is_numeric() {
                        acronym = true;
                    }
                    j += 2;
                    part_len = 1;
                    continue;
                }
                break;
            }

            if j < n && chars[j].1 == '.' {
                let word = &text[start..byte_at(j)];
                if acronym || self.is_abbreviation(word) {
                    j += 1;
                }
            }

            spans.push(TokenSpan::new(start, byte_at(j)));
            i = j;
        }
        spans
    }

    /// Sentence spans.
    pub fn sentences(&self, text: &str) -> Vec<TokenSpan> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let byte_at = |i: usize| if i < n { chars[i].0 } else { text.len() };

        let mut spans = Vec::new();
        let mut sentence_start = 0;
        let mut i = 0;
        while i < n {
            let c = chars[i].1;
            if is_line_break(c) {
                push_trimmed(text, byte_at(sentence_start), chars[i].0, &mut spans);
                i += 1;
                sentence_start = i;
                continue;
            }

            if is_wide_terminator(c) {
                let mut j = i + 1;
                while j < n && (is_wide_terminator(chars[j].1) || is_terminator(chars[j].1)) {
                    j += 1;
                }
                j = skip_closers(&chars, j);
                push_trimmed(text, byte_at(sentence_start), byte_at(j), &mut spans);
                sentence_start = j;
                i = j;
                continue;
            }

            if is_terminator(c) {
                let mut j = i + 1;
                while j < n && is_terminator(chars[j].1) {
                    j += 1;
                }
                let run_len = j - i;
                j = skip_closers(&chars, j);
                if self.ends_sentence(text, &chars, i, run_len, j) {
                    push_trimmed(text, byte_at(sentence_start), byte_at(j), &mut spans);
                    sentence_start = j;
                }
                i = j;
                continue;
            }

            i += 1;
        }
        push_trimmed(text, byte_at(sentence_start), text.len(), &mut spans);
        spans
    }

    /// Whether the terminator run starting at char `at` (with `run_len`
    /// terminators, closers ending before `next`) ends a sentence.
    fn ends_sentence(
        &self,
        text: &str,
        chars: &[(usize, char)],
        at: usize,
        run_len: usize,
        next: usize,
    ) -> bool {
        let n = chars.len();
        if next < n && !chars[next].1.is_whitespace() {
            return false;
        }

        let mut k = next;
        while k < n && chars[k].1.is_whitespace() && !is_line_break(chars[k].1) {
            k += 1;
        }
        if k < n && !is_line_break(chars[k].1) && chars[k].1.is_lowercase() {
            return false;
        }

        if run_len == 1 && chars[at].1 == '.' {
            let mut p = at;
            while p > 0 && !chars[p - 1].1.is_whitespace() && !is_opener(chars[p - 1].1) {
                p -= 1;
            }
            let word = &text[chars[p].0..chars[at].0];
            let mut word_chars = word.chars();
            let initial = matches!(
                (word_chars.next(), word_chars.next()),
                (Some(c), None) if c.is_uppercase() && c != 'I'
            );
            if initial && in_name(chars, p, k) {
                return false;
            }
            if self.is_abbreviation(word) {
                return false;
            }
        }

        true
    }
}

impl BoundaryDetector for RuleDetector {
    fn detect(&self, text: &str, kind: TokenKind) -> Vec<TokenSpan> {
        match kind {
            TokenKind::Sentence => self.sentences(text),
            TokenKind::Word => self.words(text),
        }
    }
}

/// Detector driven by a loaded model.
pub struct ModelDetector {
    rules: RuleDetector,
    word_pattern: Option<Regex>,
}

impl ModelDetector {
    pub fn new(rules: RuleDetector, word_pattern: Option<Regex>) -> Self {
        Self {
            rules,
            word_pattern,
        }
    }

    pub fn rules(&self) -> &RuleDetector {
        &self.rules
    }

    /// Pattern matches become tokens; anything else that is not whitespace
    /// is split by the rules, so no text is dropped.
    fn pattern_words(&self, regex: &Regex, text: &str) -> Vec<TokenSpan> {
        let mut spans = Vec::new();
        let mut last = 0;
        for m in regex.find_iter(text) {
            let (start, end) = (m.start(), m.end());
            self.gap_words(text, last, start, &mut spans);
            // A match spanning whitespace yields one token per run.
            let mut run_start = None;
            for (i, c) in text[start..end].char_indices() {
                match (c.is_whitespace(), run_start) {
                    (true, Some(s)) => {
                        spans.push(TokenSpan::new(s, start + i));
                        run_start = None;
                    }
                    (false, None) => run_start = Some(start + i),
                    _ => {}
                }
            }
            if let Some(s) = run_start {
                spans.push(TokenSpan::new(s, end));
            }
            last = end;
        }
        self.gap_words(text, last, text.len(), &mut spans);
        spans
    }

    fn gap_words(&self, text: &str, start: usize, end: usize, spans: &mut Vec<TokenSpan>) {
        if start >= end {
            return;
        }
        spans.extend(
            self.rules
                .words(&text[start..end])
                .into_iter()
                .map(|s| TokenSpan::new(s.start + start, s.end + start)),
        );
    }
}

impl BoundaryDetector for ModelDetector {
    fn detect(&self, text: &str, kind: TokenKind) -> Vec<TokenSpan> {
        match (kind, &self.word_pattern) {
            (TokenKind::Word, Some(regex)) => self.pattern_words(regex, text),
            _ => self.rules.detect(text, kind),
        }
    }
}

impl std::fmt::Debug for ModelDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDetector")
            .field("rules", &self.rules)
            .field("word_pattern", &self.word_pattern.is_some())
            .finish()
    }
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<TokenSpan>) {
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    if start + lead < end - trail {
        spans.push(TokenSpan::new(start + lead, end - trail));
    }
}

fn skip_closers(chars: &[(usize, char)], mut j: usize) -> usize {
    while j < chars.len() && is_closer(chars[j].1) {
        j += 1;
    }
    j
}

/// Whether `mid` keeps a word run going between `prev` and `next`.
/// `part_len` counts the characters since the last joiner.
fn joins_word(prev: char, mid: char, next: char, part_len: usize) -> bool {
    match mid {
        '\'' | '\u{2019}' => prev.is_alphanumeric() && next.is_alphabetic(),
        '.' => {
            (prev.is_numeric() && next.is_numeric())
                || (part_len == 1 && prev.is_alphabetic() && next.is_alphabetic())
        }
        ',' => prev.is_numeric() && next.is_numeric(),
        '-' => prev.is_alphanumeric() && next.is_alphanumeric(),
        _ => false,
    }
}

static PUNCTUATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    RegexBuilder::new(r"\p{P}+")
        .jit(true)
        .build()
        .inspect_err(|e| warn!("Unicode punctuation class unavailable, ASCII only: {}", e))
        .ok()
});

/// Marks the first byte of every character in general category P.
fn punctuation_mask(text: &str) -> Vec<bool> {
    let mut mask = vec![false; text.len()];
    if let Some(regex) = PUNCTUATION.as_ref() {
        for m in regex.find_iter(text) {
            for (i, _) in text[m.start()..m.end()].char_indices() {
                mask[m.start() + i] = true;
            }
        }
    }
    mask
}

/// Whether the capital letter at char `p`, followed by a period, reads as a
/// name initial: it opens the text, a bracket or a sentence, follows a
/// capitalised word or another initial, or precedes another initial (char
/// `next`).
fn in_name(chars: &[(usize, char)], p: usize, next: usize) -> bool {
    let mut q = p;
    while q > 0 && chars[q - 1].1.is_whitespace() && !is_line_break(chars[q - 1].1) {
        q -= 1;
    }
    if q == 0 || is_line_break(chars[q - 1].1) || is_opener(chars[q - 1].1) {
        return true;
    }
    let before = chars[q - 1].1;
    if is_terminator(before) || is_wide_terminator(before) {
        return true;
    }
    while q > 0 && !chars[q - 1].1.is_whitespace() {
        q -= 1;
    }
    if chars[q].1.is_uppercase() {
        return true;
    }
    next + 1 < chars.len() && chars[next].1.is_uppercase() && chars[next + 1].1 == '.'
}

#[inline]
fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

#[inline]
fn is_terminator(c: char) -> bool {
    matches!(
        c,
        '.' | '!' | '?' | '\u{2026}' | '\u{061F}' | '\u{06D4}' | '\u{0964}' | '\u{0965}'
    )
}

#[inline]
fn is_wide_terminator(c: char) -> bool {
    matches!(c, '\u{3002}' | '\u{FF01}' | '\u{FF1F}')
}

#[inline]
fn is_closer(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | ')' | ']' | '}' | '\u{2019}' | '\u{201D}' | '\u{00BB}' | '\u{300D}' | '\u{300F}'
    )
}

#[inline]
fn is_opener(c: char) -> bool {
    matches!(
        c,
        '"' | '\'' | '(' | '[' | '{' | '\u{2018}' | '\u{201C}' | '\u{00AB}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<&str> {
        RuleDetector::new()
            .words(text)
            .iter()
            .map(|s| &text[s.range()])
            .collect()
    }

    fn sentences(text: &str) -> Vec<&str> {
        RuleDetector::new()
            .sentences(text)
            .iter()
            .map(|s| &text[s.range()])
            .collect()
    }

    #[test]
    fn test_words_split_punctuation() {
        let text = "Hello, world!";
        let spans = RuleDetector::new().words(text);
        assert_eq!(
            spans,
            vec![
                TokenSpan::new(0, 5),
                TokenSpan::new(5, 6),
                TokenSpan::new(7, 12),
                TokenSpan::new(12, 13)
            ]
        );
    }

    #[test]
    fn test_words_joining_rules() {
        assert_eq!(words("don't stop"), vec!["don't", "stop"]);
        assert_eq!(words("pi is 3.14"), vec!["pi", "is", "3.14"]);
        assert_eq!(words("1,000 people"), vec!["1,000", "people"]);
        assert_eq!(words("state-of-the-art"), vec!["state-of-the-art"]);
        assert_eq!(words("the U.S. army"), vec!["the", "U.S.", "army"]);
        assert_eq!(words("e.g. this"), vec!["e.g.", "this"]);
        assert_eq!(words("end.Next"), vec!["end", ".", "Next"]);
    }

    #[test]
    fn test_words_abbreviation_keeps_period() {
        assert_eq!(words("Dr. Smith"), vec!["Dr.", "Smith"]);
        assert_eq!(words("home."), vec!["home", "."]);
    }

    #[test]
    fn test_words_punctuation_runs() {
        assert_eq!(words("Wait... what?!"), vec!["Wait", "...", "what", "?", "!"]);
        assert_eq!(words("(yes)"), vec!["(", "yes", ")"]);
        assert_eq!(words("'quoted'"), vec!["'", "quoted", "'"]);
    }

    #[test]
    fn test_words_unicode() {
        assert_eq!(words("Привет, мир!"), vec!["Привет", ",", "мир", "!"]);
        assert_eq!(words("naïve café"), vec!["naïve", "café"]);
        assert_eq!(words("«oui»"), vec!["«", "oui", "»"]);
    }

    #[test]
    fn test_words_split_non_latin_punctuation() {
        assert_eq!(words("مرحبا، عالم؟"), vec!["مرحبا", "،", "عالم", "؟"]);
        assert_eq!(words("यह वाक्य है।"), vec!["यह", "वाक्य", "है", "।"]);
        assert_eq!(words("你好，世界"), vec!["你好", "，", "世界"]);
    }

    #[test]
    fn test_words_empty_and_whitespace() {
        assert!(words("").is_empty());
        assert!(words(" \t\n ").is_empty());
    }

    #[test]
    fn test_sentences_abbreviation() {
        assert_eq!(
            sentences("Dr. Smith went home. He was tired."),
            vec!["Dr. Smith went home.", "He was tired."]
        );
    }

    #[test]
    fn test_sentences_terminators() {
        assert_eq!(
            sentences("Really?! Yes. \"Fine.\" Done"),
            vec!["Really?!", "Yes.", "\"Fine.\"", "Done"]
        );
    }

    #[test]
    fn test_sentences_no_break_before_lowercase() {
        assert_eq!(
            sentences("It costs approx. five dollars. OK."),
            vec!["It costs approx. five dollars.", "OK."]
        );
        assert_eq!(sentences("Wait... and then"), vec!["Wait... and then"]);
    }

    #[test]
    fn test_sentences_initials_and_decimals() {
        assert_eq!(
            sentences("J. R. Tolkien wrote 3.5 books. Maybe."),
            vec!["J. R. Tolkien wrote 3.5 books.", "Maybe."]
        );
    }

    #[test]
    fn test_sentences_single_letters_outside_names() {
        assert_eq!(sentences("So did I. Then we left."), vec!["So did I.", "Then we left."]);
        assert_eq!(
            sentences("We chose plan B. It worked."),
            vec!["We chose plan B.", "It worked."]
        );
        assert_eq!(
            sentences("George W. Bush spoke. Then he left."),
            vec!["George W. Bush spoke.", "Then he left."]
        );
    }

    #[test]
    fn test_sentences_non_latin_terminators() {
        assert_eq!(
            sentences("यह एक वाक्य है। यह दूसरा है।"),
            vec!["यह एक वाक्य है।", "यह दूसरा है।"]
        );
        assert_eq!(sentences("كيف حالك؟ أنا بخير۔"), vec!["كيف حالك؟", "أنا بخير۔"]);
    }

    #[test]
    fn test_sentences_line_breaks() {
        assert_eq!(
            sentences("  first line\n\nsecond line  \r\nthird"),
            vec!["first line", "second line", "third"]
        );
    }

    #[test]
    fn test_sentences_wide_terminators() {
        assert_eq!(sentences("今日は晴れ。明日は雨！"), vec!["今日は晴れ。", "明日は雨！"]);
    }

    #[test]
    fn test_custom_abbreviations() {
        let rules = RuleDetector::with_abbreviations(["Fig."]);
        assert!(rules.is_abbreviation("fig"));
        assert!(!rules.is_abbreviation("dr"));
        let text = "See Fig. Two. Dr. No.";
        let got: Vec<&str> = rules.sentences(text).iter().map(|s| &text[s.range()]).collect();
        assert_eq!(got, vec!["See Fig. Two.", "Dr.", "No."]);
    }

    #[test]
    fn test_render_joins_with_separator() {
        let text = "Hello, world!";
        let spans = RuleDetector::new().words(text);
        let seg = render(text, TokenKind::Word, spans, 64).unwrap();
        assert_eq!(seg.text(), "Hello , world !");
        assert_eq!(seg.tokens().collect::<Vec<_>>(), vec!["Hello", ",", "world", "!"]);
    }

    #[test]
    fn test_render_overflow() {
        let text = "Hello, world!";
        let spans = RuleDetector::new().words(text);
        let err = render(text, TokenKind::Word, spans, 5).unwrap_err();
        assert_eq!(err.capacity, 5);
        assert!(err.needed > 5);
    }

    #[test]
    fn test_render_empty() {
        let seg = render("", TokenKind::Sentence, Vec::new(), 0).unwrap();
        assert!(seg.is_empty());
        assert_eq!(seg.tokens().count(), 0);
    }

    #[test]
    fn test_model_pattern_words() {
        let regex = regexr::RegexBuilder::new(r"[a-z]+(?: [a-z]+)?|[0-9]+")
            .build()
            .unwrap();
        let detector = ModelDetector::new(RuleDetector::new(), Some(regex));
        let text = "ab cd 42";
        let spans = detector.detect(text, TokenKind::Word);
        let tokens: Vec<&str> = spans.iter().map(|s| &text[s.range()]).collect();
        assert_eq!(tokens, vec!["ab", "cd", "42"]);

        // sentence detection still uses the rules
        let text = "One. Two.";
        assert_eq!(detector.detect(text, TokenKind::Sentence).len(), 2);
    }

    #[test]
    fn test_model_pattern_keeps_text_between_matches() {
        let regex = regexr::RegexBuilder::new(r"\p{L}+|\p{N}+").build().unwrap();
        let detector = ModelDetector::new(RuleDetector::new(), Some(regex));
        let text = "don't stop-2, ok?";
        let spans = detector.detect(text, TokenKind::Word);
        let tokens: Vec<&str> = spans.iter().map(|s| &text[s.range()]).collect();
        assert_eq!(tokens, vec!["don", "'", "t", "stop", "-", "2", ",", "ok", "?"]);

        let mut covered = 0;
        for span in &spans {
            assert!(text[covered..span.start].trim().is_empty());
            covered = span.end;
        }
        assert!(text[covered..].trim().is_empty());
        assert_eq!(detector.detect(text, TokenKind::Sentence).len(), 2);
    }
}
