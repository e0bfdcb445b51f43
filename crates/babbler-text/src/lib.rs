//! Text on both sides of the model: splitting input into [`Word`] tokens and
//! turning generated tokens back into a displayable sentence.
//!
//! Tokens alternate between words and separators (whitespace, punctuation);
//! separators are symbols like any other, so detokenizing is concatenation.
//! Contractions such as "don't" stay one token via the apostrophe rule.
//! Case is preserved.

use babbler_dict::Word;

/// Split input text into tokens.
///
/// 1. Splits on word boundaries (alphabetic and digit transitions, with an
///    apostrophe exception for contractions).
/// 2. Ensures the sequence ends with sentence-terminal punctuation
///    (`!`, `.` or `?`).
///
/// Input without any non-whitespace character yields no tokens.
///
/// # Examples
///
/// ```
/// use babbler_text::tokenize;
///
/// let tokens: Vec<String> = tokenize("Don't you think so?")
///     .iter()
///     .map(|w| w.to_string())
///     .collect();
/// assert_eq!(tokens, vec!["Don't", " ", "you", " ", "think", " ", "so", "?"]);
/// ```
pub fn tokenize(input: &str) -> Vec<Word> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;

    for pos in 1..=bytes.len() {
        if is_boundary(bytes, pos) {
            // Boundaries only fall next to ASCII bytes, so `pos` is a char boundary.
            tokens.push(input[start..pos].to_string());
            start = pos;
        }
    }

    normalize_terminal(&mut tokens);
    tokens.iter().map(|t| Word::new(t)).collect()
}

/// Whether position `pos` in `input` is a word boundary.
///
/// 1. `pos == 0`: never a boundary
/// 2. `pos == len`: always a boundary
/// 3. Apostrophe between two letters: no boundary on either side of it
/// 4. Exactly one of `pos` and `pos - 1` is alphabetic: boundary
/// 5. Digit status differs between `pos` and `pos - 1`: boundary
pub fn is_boundary(input: &[u8], pos: usize) -> bool {
    if pos == 0 {
        return false;
    }
    if pos == input.len() {
        return true;
    }

    let curr = input[pos];
    let prev = input[pos - 1];

    if curr == b'\''
        && pos + 1 < input.len()
        && prev.is_ascii_alphabetic()
        && input[pos + 1].is_ascii_alphabetic()
    {
        return false;
    }
    if prev == b'\''
        && pos >= 2
        && input[pos - 2].is_ascii_alphabetic()
        && curr.is_ascii_alphabetic()
    {
        return false;
    }

    if curr.is_ascii_alphabetic() != prev.is_ascii_alphabetic() {
        return true;
    }

    curr.is_ascii_digit() != prev.is_ascii_digit()
}

/// Ensure the token sequence ends with sentence-terminal punctuation.
///
/// - If the last token starts with an alphanumeric char, append "."
/// - Otherwise if the last token doesn't end with `!`, `.` or `?`, its final
///   character becomes "."
fn normalize_terminal(tokens: &mut Vec<String>) {
    let Some(last) = tokens.last_mut() else {
        return;
    };

    if last.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        tokens.push(".".to_string());
    } else if !last.ends_with(['!', '.', '?']) {
        last.pop();
        last.push('.');
    }
}

/// Join reply tokens into a sentence, upper-casing the first letter and the
/// first letter after each `!`, `.` or `?` that is followed by whitespace.
/// Every other character keeps the case it was learned with.
pub fn capitalize(tokens: &[Word]) -> String {
    let raw: String = tokens.iter().map(Word::to_string_lossy).collect();
    let mut out = String::with_capacity(raw.len());
    let mut start = true;
    let mut prev_terminal = false;

    for c in raw.chars() {
        if start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            start = false;
        } else {
            out.push(c);
        }

        if prev_terminal && c.is_whitespace() {
            start = true;
        }
        prev_terminal = matches!(c, '!' | '.' | '?');
    }

    out
}
