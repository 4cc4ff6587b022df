//! Statute citation shapes shared by the segmenter and the term filter.

use lawdb_core::data_processor::is_numeral;

/// Units that may close a `第…` citation (article, chapter, section, paragraph, item, part).
pub const CITATION_UNITS: &str = "条章节款项编";

pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// If a citation such as `第十三条` starts at `chars[i]`, the index one past its last char.
pub fn citation_end(chars: &[(usize, char)], i: usize) -> Option<usize> {
    if chars.get(i)?.1 != '第' { return None; }
    let mut j = i + 1;
    while j < chars.len() && is_numeral(chars[j].1) { j += 1; }
    if j == i + 1 { return None; }
    let (_, unit) = chars.get(j)?;
    CITATION_UNITS.contains(*unit).then_some(j + 1)
}

/// `第十三条`, `第2章` or a bracketed title such as `《民法典》`.
pub fn is_citation(token: &str) -> bool {
    if let Some(inner) = token.strip_prefix('《').and_then(|t| t.strip_suffix('》')) {
        return !inner.is_empty() && !inner.contains('》');
    }
    let chars: Vec<(usize, char)> = token.char_indices().collect();
    citation_end(&chars, 0) == Some(chars.len())
}

/// Lexical keep rule: purely numeric, a statute citation, or at least two characters.
pub fn keep_token(token: &str) -> bool {
    if token.is_empty() { return false; }
    token.chars().all(char::is_numeric) || is_citation(token) || token.chars().count() >= 2
}
