//! Rule-based token pipeline. Deliberately naive: whitespace and
//! punctuation splitting plus surface annotations, enough to feed
//! downstream consumers that expect spaCy-shaped records.

use std::collections::HashSet;

use super::{Token, TokenPipeline};

const ENG_STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "of", "in", "on", "at", "to", "for",
    "with", "by", "from", "as", "is", "are", "was", "were", "be", "been", "being", "it", "its",
    "this", "that", "these", "those", "he", "she", "they", "we", "you", "i", "his", "her",
    "their", "our", "your", "my", "not", "no", "do", "does", "did", "have", "has", "had",
    "will", "would", "can", "could",
];

pub struct BasicPipeline {
    name: String,
    stop_words: HashSet<&'static str>,
}

impl BasicPipeline {
    /// Language is the suffix of the pipeline name; only English ships a
    /// stop-word list, other languages run without one.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let language = name.rsplit('-').next().unwrap_or("");
        let stop_words = match language {
            "eng" => ENG_STOP_WORDS.iter().copied().collect(),
            _ => HashSet::new(),
        };
        Self { name, stop_words }
    }
}

impl TokenPipeline for BasicPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn tokenize(&self, text: &str) -> Vec<Vec<Token>> {
        split_sentences(text)
            .into_iter()
            .map(|sentence| {
                let mut tokens = Vec::new();
                for word in sentence.split_whitespace() {
                    for piece in split_word(word) {
                        let index = tokens.len() as u32 + 1;
                        tokens.push(token_for(&piece, index, &self.stop_words));
                    }
                }
                tokens
            })
            .collect()
    }
}

/// Splits on `.`, `!` or `?` followed by whitespace. Abbreviations are
/// not special-cased.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut prev_terminal = false;

    for (i, ch) in text.char_indices() {
        if prev_terminal && ch.is_whitespace() {
            let chunk = text[start..i].trim();
            if !chunk.is_empty() {
                sentences.push(chunk);
            }
            start = i;
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Peels leading and trailing punctuation off a whitespace-delimited
/// word, each punctuation character becoming its own piece. Interior
/// punctuation (hyphens, apostrophes, decimal points) stays put.
fn split_word(word: &str) -> Vec<String> {
    let mut leading: Vec<String> = Vec::new();
    let mut core = word;

    while let Some(ch) = core.chars().next() {
        if is_punct_char(ch) && core.chars().count() > 1 {
            leading.push(ch.to_string());
            core = &core[ch.len_utf8()..];
        } else {
            break;
        }
    }

    let mut trailing: Vec<String> = Vec::new();
    while let Some(ch) = core.chars().last() {
        if is_punct_char(ch) && core.chars().count() > 1 {
            trailing.push(ch.to_string());
            core = &core[..core.len() - ch.len_utf8()];
        } else {
            break;
        }
    }

    let mut pieces = leading;
    pieces.push(core.to_string());
    pieces.extend(trailing.into_iter().rev());
    pieces
}

fn token_for(text: &str, index: u32, stop_words: &HashSet<&'static str>) -> Token {
    let nonempty = !text.is_empty();
    let is_punct = nonempty && text.chars().all(is_punct_char);
    let is_alpha = nonempty && text.chars().all(char::is_alphabetic);
    let like_num = looks_numeric(text);
    let lemma = text.to_lowercase();
    let is_stop = stop_words.contains(lemma.as_str());

    let pos = if is_punct {
        "PUNCT"
    } else if like_num {
        "NUM"
    } else {
        "X"
    };
    let dep = if is_punct { "punct" } else { "dep" };

    Token {
        text: text.to_string(),
        index,
        lemma,
        pos: pos.to_string(),
        dep: dep.to_string(),
        shape: shape_of(text),
        is_alpha,
        is_punct,
        like_num,
        is_stop,
    }
}

fn is_punct_char(ch: char) -> bool {
    ch.is_ascii_punctuation()
        || matches!(
            ch,
            '…' | '–' | '—' | '»' | '«' | '„' | '“' | '”' | '‘' | '’' | '·' | '•'
        )
}

/// Digits with `.`, `,` or `/` separators, e.g. `12,000` or `3/4`.
fn looks_numeric(text: &str) -> bool {
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    has_digit
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '/'))
}

/// spaCy-style word shape: uppercase -> X, lowercase -> x, digit -> d,
/// anything else verbatim, runs longer than four collapsed.
fn shape_of(text: &str) -> String {
    let mut shape = String::new();
    let mut run_char = '\0';
    let mut run_len = 0usize;

    for ch in text.chars() {
        let mapped = if ch.is_uppercase() {
            'X'
        } else if ch.is_lowercase() {
            'x'
        } else if ch.is_ascii_digit() {
            'd'
        } else {
            ch
        };

        if mapped == run_char {
            run_len += 1;
            if run_len <= 4 {
                shape.push(mapped);
            }
        } else {
            run_char = mapped;
            run_len = 1;
            shape.push(mapped);
        }
    }
    shape
}
