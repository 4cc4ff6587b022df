use tantivy::tokenizer::{
    LowerCaser, StopWordFilter, TextAnalyzer, Token, TokenStream, Tokenizer as TantivyTokenizer,
};

use lawdb_core::traits::Tokenizer;

use crate::legal::{citation_end, is_cjk};

/// Function words removed before indexing. Chinese entries are bigrams
/// because the segmenter emits CJK text as overlapping bigrams; single
/// characters never survive the length filter anyway.
pub const STOP_WORDS: &[&str] = &[
    "a","an","and","are","as","at","be","by","for","from","has","he","in","is","it","its","of","on","that","the","to","was","will","with","or","but","not","this","these","they","them","their","there","then","than","so","if","when","where","why","how","what","which","who","whom","whose","can","could","should","would","may","might","must","shall","do","does","did","have","had","having",
    "我们","你们","他们","这个","那个","什么","怎么","如何","为什","哪些","请问",
];

/// Segmenter for statute text.
///
/// - `《…》` law titles are emitted whole, followed by the tokens of the title text
/// - `第…条` / `第…章` style citations are emitted whole
/// - other CJK runs become overlapping character bigrams (a lone character stays a unigram)
/// - Latin letters and digits form word tokens
#[derive(Clone, Default)]
pub struct LegalTokenizer;

pub struct LegalTokenStream {
    tokens: Vec<Token>,
    cursor: usize,
}

impl TantivyTokenizer for LegalTokenizer {
    type TokenStream<'a> = LegalTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> LegalTokenStream {
        let mut tokens = Vec::new();
        segment_into(text, 0, &mut tokens);
        for (position, token) in tokens.iter_mut().enumerate() { token.position = position; }
        LegalTokenStream { tokens, cursor: 0 }
    }
}

impl TokenStream for LegalTokenStream {
    fn advance(&mut self) -> bool {
        if self.cursor < self.tokens.len() { self.cursor += 1; true } else { false }
    }

    fn token(&self) -> &Token { &self.tokens[self.cursor - 1] }

    fn token_mut(&mut self) -> &mut Token { &mut self.tokens[self.cursor - 1] }
}

fn push_token(out: &mut Vec<Token>, text: &str, base: usize, from: usize, to: usize) {
    out.push(Token {
        offset_from: base + from,
        offset_to: base + to,
        position: 0,
        text: text[from..to].to_string(),
        position_length: 1,
    });
}

fn segment_into(text: &str, base: usize, out: &mut Vec<Token>) {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let end_of = |idx: usize| -> usize { chars.get(idx).map_or(text.len(), |&(o, _)| o) };
    let mut i = 0;
    while i < chars.len() {
        let (offset, c) = chars[i];
        if c == '《' {
            if let Some(close) = chars[i + 1..].iter().position(|&(_, ch)| ch == '》') {
                let close_idx = i + 1 + close;
                push_token(out, text, base, offset, end_of(close_idx + 1));
                let inner_from = end_of(i + 1);
                let inner_to = chars[close_idx].0;
                segment_into(&text[inner_from..inner_to], base + inner_from, out);
                i = close_idx + 1;
                continue;
            }
            i += 1;
            continue;
        }
        if let Some(end) = citation_end(&chars, i) {
            push_token(out, text, base, offset, end_of(end));
            i = end;
            continue;
        }
        if is_cjk(c) {
            let start = i;
            let mut j = i + 1;
            while j < chars.len() && is_cjk(chars[j].1) && citation_end(&chars, j).is_none() { j += 1; }
            if j - start == 1 {
                push_token(out, text, base, offset, end_of(j));
            } else {
                for k in start..j - 1 { push_token(out, text, base, chars[k].0, end_of(k + 2)); }
            }
            i = j;
            continue;
        }
        if c.is_alphanumeric() {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_alphanumeric() && !is_cjk(chars[j].1) { j += 1; }
            push_token(out, text, base, offset, end_of(j));
            i = j;
            continue;
        }
        i += 1;
    }
}

/// Segmenter → lowercase → stopword removal.
pub fn build_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(LegalTokenizer)
        .filter(LowerCaser)
        .filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
        .build()
}

/// Tokenizer provider backed by a tantivy analyzer pipeline.
#[derive(Clone)]
pub struct AnalyzerTokenizer {
    analyzer: TextAnalyzer,
}

impl AnalyzerTokenizer {
    pub fn new(analyzer: TextAnalyzer) -> Self { Self { analyzer } }
}

impl Default for AnalyzerTokenizer {
    fn default() -> Self { Self::new(build_analyzer()) }
}

impl Tokenizer for AnalyzerTokenizer {
    fn tokenize(&self, text: &str) -> anyhow::Result<Vec<String>> {
        // token_stream needs &mut; analyzers are cheap to clone
        let mut analyzer = self.analyzer.clone();
        let mut stream = analyzer.token_stream(text);
        let mut tokens = Vec::new();
        while stream.advance() { tokens.push(stream.token().text.clone()); }
        Ok(tokens)
    }
}
