//! Expression tokenizer.

use compact_str::CompactString;

use crate::errors::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(CompactString),
    Number(f64),
    Str(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,

    Assign,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    LtEq,
    GtEq,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    return Err(ExpressionError::UnexpectedChar('&'));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    return Err(ExpressionError::UnexpectedChar('|'));
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    if bytes.get(i + 2) == Some(&b'=') {
                        tokens.push(Token::EqEqEq);
                        i += 3;
                    } else {
                        tokens.push(Token::EqEq);
                        i += 2;
                    }
                } else {
                    tokens.push(Token::Assign);
                    i += 1;
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    if bytes.get(i + 2) == Some(&b'=') {
                        tokens.push(Token::NotEqEq);
                        i += 3;
                    } else {
                        tokens.push(Token::NotEq);
                        i += 2;
                    }
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::LtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::GtEq);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut out = String::new();
                i += 1;
                loop {
                    match input[i..].chars().next() {
                        None => return Err(ExpressionError::UnterminatedString),
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = input[i + 1..]
                                .chars()
                                .next()
                                .ok_or(ExpressionError::UnterminatedString)?;
                            out.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                other => other,
                            });
                            i += 1 + escaped.len_utf8();
                        }
                        Some(ch) => {
                            out.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token::Str(out));
            }
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    // A dot not followed by a digit is member access on a
                    // number literal; stop before it
                    if bytes[i] == b'.' && !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                        break;
                    }
                    i += 1;
                }
                let text = &input[start..i];
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::UnexpectedToken(text.to_string()))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < bytes.len() {
                    let ch = bytes[i] as char;
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(CompactString::from(&input[start..i])));
            }
            other => return Err(ExpressionError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_and_idents() {
        let tokens = tokenize("a.b[0] !== c && !d").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("b".into()),
                Token::LBracket,
                Token::Number(0.0),
                Token::RBracket,
                Token::NotEqEq,
                Token::Ident("c".into()),
                Token::AndAnd,
                Token::Not,
                Token::Ident("d".into()),
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let tokens = tokenize(r#"'a\'b' + "c\n""#).unwrap();
        assert_eq!(tokens[0], Token::Str("a'b".into()));
        assert_eq!(tokens[2], Token::Str("c\n".into()));
    }

    #[test]
    fn decimal_vs_member_dot() {
        assert_eq!(tokenize("1.5").unwrap(), vec![Token::Number(1.5)]);
        let tokens = tokenize("x.1").unwrap();
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn rejects_stray_characters() {
        assert!(matches!(
            tokenize("a # b"),
            Err(ExpressionError::UnexpectedChar('#'))
        ));
        assert!(matches!(
            tokenize("'open"),
            Err(ExpressionError::UnterminatedString)
        ));
    }
}
