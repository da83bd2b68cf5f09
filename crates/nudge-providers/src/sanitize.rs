//! Output sanitization: turns raw model output into a single reminder.
//!
//! Small models like to answer with several alternatives ("Or: ...",
//! "Option 2: ..."), markdown, list bullets or whole paragraphs. Only the
//! first variant survives, stripped of formatting and capped in length.

use std::sync::LazyLock;

use regex::Regex;

/// Longest message kept verbatim, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;
/// Shorter results are rejected.
pub const MIN_MESSAGE_CHARS: usize = 10;
/// A first sentence shorter than this gets its successor appended.
const SHORT_SENTENCE_CHARS: usize = 50;

/// Phrases showing the model produced alternates.
static EXAMPLE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:or|alternatively|example|another option|lub tak|lub też|lub|albo|przykład|może|i jeszcze|następnie|ewentualnie|potem|i znów|i tak dalej|(?:option|version|opcja|wersja)\s*\d+)\s*:|przykładowe",
    )
    .expect("valid example marker regex")
});

/// Where the second variant starts. Searched in order; the earliest hit wins.
const SEPARATORS: &[&str] = &[
    "\nOr:",
    "\nAlternatively:",
    "\nExample:",
    "\nAnother option:",
    "\nLub:",
    "\nAlbo:",
    "\nMoże:",
    "\nPrzykład:",
    "\nNastępnie:",
    "\nI jeszcze:",
    "\nLub tak:",
    "\nLub też:",
    "\nEwentualnie:",
    "\nPotem:",
    "\nI znów:",
    "\nI tak dalej:",
    "\nPrzykładowe",
];

/// Numbered variants: "Option 2:", "Wersja 3:".
static NUMBERED_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n[ \t]*(?:Option|Version|Opcja|Wersja)\s*\d+\s*:")
        .expect("valid numbered separator regex")
});

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static ITALIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(.+?)`").expect("valid code regex"));

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+[.)]|[-*•])\s*").expect("valid list marker regex"));

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("valid sentence regex"));

/// Clean raw model output. `None` means the output is unusable.
pub fn clean_message(raw: &str) -> Option<String> {
    let mut message = raw.trim().to_string();
    if message.is_empty() {
        return None;
    }

    let original_chars = message.chars().count();
    if original_chars > 200 {
        tracing::warn!("⚠️ Model returned a long message ({original_chars} chars), cleaning up");
        tracing::debug!("Original message: {message}");
    }

    // Stripping markdown can expose a separator ("\n**Or:**") or another
    // list marker, so repeat until nothing changes.
    loop {
        let next = strip_list_markers(&strip_markdown(&first_variant(&message)));
        if next == message {
            break;
        }
        message = next;
    }

    if message.chars().count() > MAX_MESSAGE_CHARS {
        tracing::warn!(
            "⚠️ Message still too long after cleanup ({} chars), keeping the opening",
            message.chars().count()
        );
        message = opening_sentences(&message);
    }

    let cleaned_chars = message.chars().count();
    if cleaned_chars < MIN_MESSAGE_CHARS {
        tracing::error!("❌ Message too short after cleanup: '{message}'");
        return None;
    }

    if cleaned_chars * 2 < original_chars {
        tracing::info!("✂️ Significantly reduced message length: {original_chars} → {cleaned_chars} chars");
    }

    Some(message)
}

/// Text before the second variant, when the model offered several.
fn first_variant(message: &str) -> String {
    if !EXAMPLE_MARKER_RE.is_match(message) {
        return message.to_string();
    }
    let Some(pos) = first_separator(message) else {
        return message.to_string();
    };
    tracing::warn!("⚠️ Message contains example indicators, keeping the first variant");
    let first = message[..pos].trim();
    tracing::info!(
        "✂️ Extracted first variant ({} → {} chars)",
        message.chars().count(),
        first.chars().count()
    );
    first.to_string()
}

/// Byte offset of the earliest separator, if any.
fn first_separator(message: &str) -> Option<usize> {
    let literal = SEPARATORS.iter().filter_map(|sep| message.find(sep));
    let numbered = NUMBERED_SEPARATOR_RE.find(message).map(|m| m.start());
    literal.chain(numbered).min()
}

/// Unwrap bold, italic and code spans, including nested ones like ``` ``x`` ```.
fn strip_markdown(message: &str) -> String {
    let mut current = message.to_string();
    loop {
        let s = BOLD_RE.replace_all(&current, "$1");
        let s = ITALIC_RE.replace_all(&s, "$1");
        let s = CODE_RE.replace_all(&s, "$1").into_owned();
        if s == current {
            return current;
        }
        current = s;
    }
}

/// Drop leading list markers, stacked ones ("1. - ") included.
fn strip_list_markers(message: &str) -> String {
    let mut current = message.trim();
    while let Some(m) = LIST_MARKER_RE.find(current) {
        current = current[m.end()..].trim_start();
    }
    current.to_string()
}

/// Sentences with their terminal punctuation kept.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            out.push(sentence);
        }
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

/// First sentence, or the first two when the first is very short.
fn opening_sentences(text: &str) -> String {
    let parts = sentences(text);
    let Some(first) = parts.first() else {
        return text.trim().to_string();
    };

    let mut out = if first.chars().count() < SHORT_SENTENCE_CHARS && parts.len() > 1 {
        format!("{} {}", first, parts[1])
    } else {
        first.to_string()
    };

    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}
