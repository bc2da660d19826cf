//! Word-level tokenization of canonical text.
//!
//! Tokens drive the fine-grained redline inside a modified block. Whitespace
//! is dropped, each punctuation character is its own token, and capitalised
//! words that do not open a sentence are tagged as likely defined terms.

use serde::{Deserialize, Serialize};

/// Classification of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Word,
    Number,
    Punctuation,
    DefinedTerm,
}

/// A single token of canonical text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Text as it appears in the canonical text.
    pub text: String,
    pub kind: TokenKind,
    /// Lowercased, diacritic-folded form used for comparison.
    pub normalized: String,
    /// Byte offset into the canonical text.
    pub offset: usize,
}

/// Tokenize canonical text.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if is_punctuation(ch) {
            chars.next();
            let text = ch.to_string();
            tokens.push(Token {
                normalized: normalize_token(&text),
                text,
                kind: TokenKind::Punctuation,
                offset,
            });
            continue;
        }

        let mut end = offset;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || is_punctuation(c) {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        let word = &text[offset..end];
        let sentence_start = opens_sentence(&tokens);
        tokens.push(Token {
            text: word.to_string(),
            kind: classify_word(word, sentence_start),
            normalized: normalize_token(word),
            offset,
        });
    }

    tokens
}

/// Lowercase and fold common Latin diacritics.
pub fn normalize_token(token: &str) -> String {
    token.chars().map(fold_diacritic).collect::<String>().to_lowercase()
}

fn opens_sentence(previous: &[Token]) -> bool {
    match previous.last() {
        None => true,
        Some(t) => t.kind == TokenKind::Punctuation && matches!(t.text.as_str(), "." | "!" | "?" | ":" | ";"),
    }
}

fn classify_word(word: &str, sentence_start: bool) -> TokenKind {
    if is_numeric(word) {
        return TokenKind::Number;
    }
    if !sentence_start && is_capitalised(word) {
        return TokenKind::DefinedTerm;
    }
    TokenKind::Word
}

fn is_numeric(word: &str) -> bool {
    let digits = word.chars().take_while(|c| c.is_ascii_digit() || *c == ',').count();
    if digits == 0 || !word.starts_with(|c: char| c.is_ascii_digit()) {
        return false;
    }
    let rest = &word[digits..];
    rest.is_empty() || matches!(rest.to_ascii_lowercase().as_str(), "st" | "nd" | "rd" | "th")
}

/// Title Case, or all caps with at least two letters.
fn is_capitalised(word: &str) -> bool {
    let mut letters = word.chars().filter(|c| c.is_alphabetic());
    let Some(first) = letters.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }
    let rest: Vec<char> = letters.collect();
    rest.iter().all(|c| c.is_lowercase()) || (!rest.is_empty() && rest.iter().all(|c| c.is_uppercase()))
}

fn is_punctuation(ch: char) -> bool {
    matches!(
        ch,
        '.' | ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}' | '-'
            | '\u{2013}' | '\u{2014}' | '/' | '\\' | '&' | '*' | '+' | '=' | '<' | '>' | '|'
            | '\u{00A7}' | '%' | '$' | '\u{20AC}' | '\u{00A3}'
    )
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'ç' => 'c',
        'Ç' => 'C',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ñ' => 'n',
        'Ñ' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => 'O',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' => 'Y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn splits_words_and_punctuation() {
        let tokens = tokenize("The Borrower shall, upon request,");
        assert_eq!(
            texts(&tokens),
            vec!["The", "Borrower", "shall", ",", "upon", "request", ","]
        );
    }

    #[test]
    fn classifies_kinds() {
        let tokens = tokenize("Term. Twelve (12) months from the 1st Closing Date.");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(tokens[0].kind, TokenKind::Word, "sentence-initial word");
        assert_eq!(tokens[1].kind, TokenKind::Punctuation);
        assert_eq!(tokens[2].kind, TokenKind::Word, "first word after a full stop");
        assert_eq!(tokens[4].kind, TokenKind::Number);
        assert!(kinds.contains(&TokenKind::DefinedTerm));
        let first = tokens.iter().find(|t| t.text == "1st").unwrap();
        assert_eq!(first.kind, TokenKind::Number);
        let closing = tokens.iter().find(|t| t.text == "Closing").unwrap();
        assert_eq!(closing.kind, TokenKind::DefinedTerm);
    }

    #[test]
    fn offsets_are_byte_offsets() {
        let text = "Café liability";
        let tokens = tokenize(text);
        assert_eq!(tokens[1].offset, "Café ".len());
        assert_eq!(&text[tokens[1].offset..], "liability");
    }

    #[test]
    fn normalized_folds_case_and_accents() {
        let tokens = tokenize("the Société Générale");
        assert_eq!(tokens[1].normalized, "societe");
        assert_eq!(tokens[2].normalized, "generale");
    }

    #[test]
    fn all_caps_is_defined_term() {
        let tokens = tokenize("the LENDER may");
        assert_eq!(tokens[1].kind, TokenKind::DefinedTerm);
    }

    #[test]
    fn empty_and_whitespace_only() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn token_kind_wire_tags() {
        let json = serde_json::to_string(&TokenKind::DefinedTerm).unwrap();
        assert_eq!(json, "\"defined_term\"");
    }
}
