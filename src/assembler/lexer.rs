use super::diagnostics::Diagnostics;
use super::tokens::{Token, TokenData, TokenKind, keyword_kind};
use crate::settings;
use std::iter::Peekable;
use std::str::Chars;

/// Tokenizes one compile unit. The lexer works line by line: comments are
/// stripped, the remainder is scanned left to right, and every non-empty
/// line is closed with a NewLine token so the parser can treat newlines as
/// grammar. Errors accumulate in the returned batch; the token prefix that
/// was recognized before an error is always returned.
pub fn tokenize(source: &str, path: &str) -> (Vec<Token>, Diagnostics) {
    let mut tokens: Vec<Token> = Vec::with_capacity(source.len() / settings::SRC_TO_TOKEN_RATIO);
    let mut diagnostics = Diagnostics::new(path);

    for (index, raw_line) in source.lines().enumerate() {
        let line = index as u32 + 1;

        let text = match raw_line.find(';') {
            Some(comment_start) => &raw_line[..comment_start],
            None => raw_line,
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        scan_line(text, line, &mut tokens, &mut diagnostics);
        tokens.push(Token::new("", TokenKind::NewLine, line));
    }

    (tokens, diagnostics)
}

fn scan_line(text: &str, line: u32, tokens: &mut Vec<Token>, diagnostics: &mut Diagnostics) {
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            lex_number(&mut chars, line, tokens, diagnostics);
            continue;
        }

        if c == '\'' || c == '"' {
            if !lex_quoted(&mut chars, c, line, tokens, diagnostics) {
                // Unterminated literal, the rest of the line is unusable
                return;
            }
            continue;
        }

        if let Some(kind) = special_token_kind(c) {
            chars.next();
            tokens.push(Token::new(c.to_string(), kind, line));
            continue;
        }

        if is_special(c) {
            chars.next();
            diagnostics.error(line, format!("Unexpected character '{c}'."));
            continue;
        }

        lex_identifier(&mut chars, line, tokens);
    }
}

fn lex_identifier(chars: &mut Peekable<Chars>, line: u32, tokens: &mut Vec<Token>) {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if is_special(c) {
            break;
        }
        word.push(c);
        chars.next();
    }

    let kind = keyword_kind(&word).unwrap_or(TokenKind::Identifier);
    tokens.push(Token::new(word, kind, line));
}

// A number word is the maximal run of non-space characters not terminated by
// a special character, except that ',' and '.' never terminate a number.
fn lex_number(
    chars: &mut Peekable<Chars>,
    line: u32,
    tokens: &mut Vec<Token>,
    diagnostics: &mut Diagnostics,
) {
    let mut word = String::new();
    while let Some(&c) = chars.peek() {
        if is_special(c) && c != ',' && c != '.' {
            break;
        }
        word.push(c);
        chars.next();
    }

    if let Some(token) = decode_number(&word, line, diagnostics) {
        tokens.push(token);
    }
}

fn decode_number(word: &str, line: u32, diagnostics: &mut Diagnostics) -> Option<Token> {
    let chars: Vec<char> = word.chars().collect();

    let (kind, base, body): (TokenKind, u32, &[char]) =
        if chars.len() > 1 && chars[0] == '0' && (chars[1] == 'b' || chars[1] == 'B') {
            (TokenKind::BinInteger, 2, &chars[2..])
        } else if chars.len() > 1 && chars[0] == '0' && (chars[1] == 'x' || chars[1] == 'X') {
            (TokenKind::HexInteger, 16, &chars[2..])
        } else if chars.len() > 1 && chars[0] == '0' && chars[1].is_ascii_digit() {
            (TokenKind::OctInteger, 8, &chars[1..])
        } else {
            (TokenKind::DecInteger, 10, &chars[..])
        };

    if body.contains(&'.') {
        // A dot promotes octal and decimal words to a real literal
        if base == 2 || base == 16 {
            diagnostics.error(line, format!("Invalid number literal '{word}'."));
            return None;
        }
        return decode_real(word, line, diagnostics);
    }

    let (digits, suffix) = match body.last() {
        Some(&'i') => (&body[..body.len() - 1], "i"),
        Some(&'l') => (&body[..body.len() - 1], "l"),
        _ => (body, ""),
    };

    if digits.is_empty() {
        diagnostics.error(line, format!("Invalid number literal '{word}'."));
        return None;
    }

    let mut value: u64 = 0;
    for (i, &c) in digits.iter().enumerate() {
        if c == ',' {
            // Group separators sit strictly between digits
            if i == 0 || i == digits.len() - 1 || digits[i - 1] == ',' {
                diagnostics.error(line, format!("Invalid number literal '{word}'."));
                return None;
            }
            continue;
        }

        let Some(digit) = c.to_digit(base) else {
            diagnostics.error(line, format!("Invalid number literal '{word}'."));
            return None;
        };

        value = match value
            .checked_mul(base as u64)
            .and_then(|v| v.checked_add(digit as u64))
        {
            Some(v) => v,
            None => {
                diagnostics.error(line, format!("Invalid number literal '{word}'."));
                return None;
            }
        };
    }

    let mut token = Token::new(word, kind, line);
    token.suffix = suffix.to_owned();
    token.data = TokenData::Integer(value);
    Some(token)
}

fn decode_real(word: &str, line: u32, diagnostics: &mut Diagnostics) -> Option<Token> {
    let dot_count = word.chars().filter(|&c| c == '.').count();
    let ends_in_digit = word.chars().last().is_some_and(|c| c.is_ascii_digit());
    if dot_count > 1 || !ends_in_digit {
        diagnostics.error(line, format!("Invalid number literal '{word}'."));
        return None;
    }

    let word_chars: Vec<char> = word.chars().collect();
    for (i, &c) in word_chars.iter().enumerate() {
        if c == ',' {
            let neighbors_are_digits = i > 0
                && i < word_chars.len() - 1
                && word_chars[i - 1].is_ascii_digit()
                && word_chars[i + 1].is_ascii_digit();
            if !neighbors_are_digits {
                diagnostics.error(line, format!("Invalid number literal '{word}'."));
                return None;
            }
        } else if c != '.' && !c.is_ascii_digit() {
            diagnostics.error(line, format!("Invalid number literal '{word}'."));
            return None;
        }
    }

    let cleaned: String = word.chars().filter(|&c| c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(value) => {
            let mut token = Token::new(word, TokenKind::Decimal, line);
            token.data = TokenData::Real(value);
            Some(token)
        }
        Err(_) => {
            diagnostics.error(line, format!("Invalid number literal '{word}'."));
            None
        }
    }
}

// Returns false when the literal never terminates, which abandons the line.
fn lex_quoted(
    chars: &mut Peekable<Chars>,
    delimiter: char,
    line: u32,
    tokens: &mut Vec<Token>,
    diagnostics: &mut Diagnostics,
) -> bool {
    chars.next(); // opening delimiter

    let mut value = String::new();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\'') => value.push('\''),
                Some('"') => value.push('"'),
                Some(other) => {
                    diagnostics.error(line, format!("Invalid escape sequence '\\{other}'."));
                    value.push(other);
                }
                None => break,
            }
            continue;
        }

        if c == delimiter {
            let kind = if delimiter == '\'' {
                TokenKind::Character
            } else {
                TokenKind::StringLiteral
            };
            let mut token = Token::new(value.clone(), kind, line);
            token.data = TokenData::Text(value);
            tokens.push(token);
            return true;
        }

        value.push(c);
    }

    let what = if delimiter == '\'' {
        "Unterminated character literal."
    } else {
        "Unterminated string literal."
    };
    diagnostics.error(line, what);
    false
}

fn special_token_kind(c: char) -> Option<TokenKind> {
    match c {
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        ':' => Some(TokenKind::Colon),
        '.' => Some(TokenKind::Dot),
        ',' => Some(TokenKind::Comma),
        '[' => Some(TokenKind::LeftBracket),
        ']' => Some(TokenKind::RightBracket),
        '(' => Some(TokenKind::LeftParenthesis),
        ')' => Some(TokenKind::RightParenthesis),
        _ => None,
    }
}

fn is_special(c: char) -> bool {
    matches!(
        c,
        '~' | '`'
            | '!'
            | '@'
            | '#'
            | '$'
            | '%'
            | '^'
            | '&'
            | '*'
            | '('
            | ')'
            | '-'
            | '+'
            | '='
            | '|'
            | '\\'
            | '{'
            | '['
            | '}'
            | ']'
            | ':'
            | ';'
            | '"'
            | '\''
            | '<'
            | ','
            | '>'
            | '.'
            | '?'
            | '/'
    ) || c.is_whitespace()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lex(source: &str) -> (Vec<Token>, Diagnostics) {
        tokenize(source, "test.sba")
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn keywords_and_punctuation() {
        assert_eq!(
            kinds("proc entrypoint:"),
            vec![
                TokenKind::ProcKeyword,
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::NewLine,
            ]
        );
        assert_eq!(
            kinds("func add(a, b):"),
            vec![
                TokenKind::FuncKeyword,
                TokenKind::Identifier,
                TokenKind::LeftParenthesis,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Identifier,
                TokenKind::RightParenthesis,
                TokenKind::Colon,
                TokenKind::NewLine,
            ]
        );
    }

    #[test]
    fn dotted_names_lex_as_separate_tokens() {
        assert_eq!(
            kinds("call u.add"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::NewLine,
            ]
        );
    }

    #[test]
    fn integer_literals_decode_with_base_and_suffix() {
        let cases = [
            ("42", TokenKind::DecInteger, 42, ""),
            ("42i", TokenKind::DecInteger, 42, "i"),
            ("42l", TokenKind::DecInteger, 42, "l"),
            ("0b101", TokenKind::BinInteger, 5, ""),
            ("0B101i", TokenKind::BinInteger, 5, "i"),
            ("017", TokenKind::OctInteger, 15, ""),
            ("0x1F", TokenKind::HexInteger, 31, ""),
            ("0Xffl", TokenKind::HexInteger, 255, "l"),
            ("4,000,000,000", TokenKind::DecInteger, 4_000_000_000, ""),
            ("0", TokenKind::DecInteger, 0, ""),
        ];

        for (source, kind, value, suffix) in cases {
            let (tokens, diagnostics) = lex(source);
            assert!(!diagnostics.has_error(), "'{source}' should lex");
            assert_eq!(tokens[0].kind, kind, "kind of '{source}'");
            assert_eq!(tokens[0].integer_value(), value, "value of '{source}'");
            assert_eq!(tokens[0].suffix, suffix, "suffix of '{source}'");
        }
    }

    #[test]
    fn decimal_literals_decode_to_doubles() {
        let (tokens, diagnostics) = lex("3.14");
        assert!(!diagnostics.has_error());
        assert_eq!(tokens[0].kind, TokenKind::Decimal);
        assert_eq!(tokens[0].real_value(), 3.14);

        // A dot promotes an octal word to a real literal
        let (tokens, _) = lex("07.5");
        assert_eq!(tokens[0].kind, TokenKind::Decimal);
        assert_eq!(tokens[0].real_value(), 7.5);
    }

    #[test]
    fn bad_number_literals_are_errors() {
        for source in ["0x1.2", "0b1.0", "1,,2", "1,", "1..2", "3.14i", "0x", "99g"] {
            let (_, diagnostics) = lex(source);
            assert!(diagnostics.has_error(), "'{source}' should be rejected");
        }
    }

    #[test]
    fn u64_overflow_is_rejected_in_the_lexer() {
        let (_, diagnostics) = lex("99999999999999999999999999");
        assert!(diagnostics.has_error());
    }

    #[test]
    fn string_and_character_literals() {
        let (tokens, diagnostics) = lex("string32 \"Hi\" to s");
        assert!(!diagnostics.has_error());
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[1].text(), "Hi");

        let (tokens, _) = lex("'a'");
        assert_eq!(tokens[0].kind, TokenKind::Character);
        assert_eq!(tokens[0].text(), "a");

        let (tokens, _) = lex("\"a\\\"b\"");
        assert_eq!(tokens[0].text(), "a\"b");
    }

    #[test]
    fn unterminated_literal_abandons_the_line_but_keeps_the_newline() {
        let (tokens, diagnostics) = lex("push \"oops\nret");
        assert!(diagnostics.has_error());

        // Line 1 keeps its recognized prefix and its NewLine
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::NewLine);
        assert_eq!(tokens[1].line, 1);
        assert_eq!(tokens[2].word, "ret");
    }

    #[test]
    fn newline_tokens_match_non_empty_lines() {
        let source = "proc entrypoint:\n\n; only a comment\n    ret\n";
        let (tokens, _) = lex(source);
        let newlines = tokens
            .iter()
            .filter(|token| token.kind == TokenKind::NewLine)
            .count();
        assert_eq!(newlines, 2);
    }

    proptest! {
        #[test]
        fn newline_count_law(lines in proptest::collection::vec("[ a-z0-9:.,+]{0,12}", 0..8)) {
            let source = lines.join("\n");
            let expected = lines
                .iter()
                .map(|line| match line.find(';') {
                    Some(at) => &line[..at],
                    None => line.as_str(),
                })
                .filter(|line| !line.trim().is_empty())
                .count();

            let (tokens, _) = tokenize(&source, "prop.sba");
            let newlines = tokens
                .iter()
                .filter(|token| token.kind == TokenKind::NewLine)
                .count();
            prop_assert_eq!(newlines, expected);
        }

        #[test]
        fn tokens_never_cross_their_line(lines in proptest::collection::vec("[a-z0-9 ]{0,10}", 1..6)) {
            let source = lines.join("\n");
            let (tokens, _) = tokenize(&source, "prop.sba");
            for token in &tokens {
                prop_assert!(token.line >= 1);
                prop_assert!((token.line as usize) <= lines.len());
            }
        }
    }
}
