//! PDF tokenizer.
//!
//! Produces the atomic tokens of PDF syntax (numbers, strings, names,
//! keywords and delimiters) with whitespace and comments skipped. Escape
//! sequences in literal and hex strings are left for the parser; `#XX`
//! escapes in names are decoded here.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Raw literal string content, escapes not yet decoded
    LiteralString(&'a [u8]),
    /// Raw hex string content, whitespace included
    HexString(&'a [u8]),
    /// Name without the leading slash, `#XX` escapes decoded
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// `R` in an indirect reference
    R,
}

/// PDF whitespace characters (ISO 32000-1, Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

fn is_delimiter(c: u8) -> bool {
    matches!(c, b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}')
}

/// Skip any run of whitespace and `%` comments.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut rest = input;
    loop {
        let (after_ws, _) = take_while(is_whitespace)(rest)?;
        match comment(after_ws) {
            Ok((after_comment, _)) => rest = after_comment,
            Err(_) => return Ok((after_ws, ())),
        }
    }
}

fn comment(input: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(input)
}

fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), opt(digit1))))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    let number_error = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));
    let text = std::str::from_utf8(text).map_err(|_| number_error())?;

    if text.contains('.') {
        let normalized = text.trim_start_matches('+');
        let normalized = if normalized.ends_with('.') {
            format!("{}0", normalized)
        } else {
            normalized.to_string()
        };
        normalized.parse::<f64>().map(|n| (rest, Token::Real(n))).map_err(|_| number_error())
    } else {
        text.trim_start_matches('+')
            .parse::<i64>()
            .map(|n| (rest, Token::Integer(n)))
            .map_err(|_| number_error())
    }
}

/// Literal strings may nest balanced parentheses; a backslash always
/// consumes the following byte.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2,
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[pos + 1..], Token::LiteralString(&body[..pos])));
                }
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)))
}

fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)), Token::HexString),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in a raw name.
///
/// Malformed sequences are kept literally.
///
/// ```
/// # use pdf_ais::lexer::decode_name_escapes;
/// assert_eq!(decode_name_escapes(b"A#20B"), "A B");
/// assert_eq!(decode_name_escapes(b"A#"), "A#");
/// ```
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = &raw[i + 1..i + 3];
            if let Some(byte) = std::str::from_utf8(hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(|c: u8| !is_whitespace(c) && !is_delimiter(c)), |raw: &[u8]| {
            Token::Name(decode_name_escapes(raw))
        }),
    )(input)
}

/// Keywords and delimiters. `<<` and `>>` are matched here, ahead of hex strings.
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::R, tag(b"R")),
    ))(input)
}

/// Parse one token after skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((parse_keyword, parse_name, parse_number, parse_literal_string, parse_hex_string))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(token(b"42 ").unwrap().1, Token::Integer(42));
        assert_eq!(token(b"-17").unwrap().1, Token::Integer(-17));
        assert_eq!(token(b"+5").unwrap().1, Token::Integer(5));
        assert_eq!(token(b"-.5").unwrap().1, Token::Real(-0.5));
        assert_eq!(token(b"4.").unwrap().1, Token::Real(4.0));
    }

    #[test]
    fn test_names_and_escapes() {
        assert_eq!(token(b"/Type").unwrap().1, Token::Name("Type".to_string()));
        assert_eq!(token(b"/A#20B ").unwrap().1, Token::Name("A B".to_string()));
        let (rest, tok) = token(b"/Sig/Filter").unwrap();
        assert_eq!(tok, Token::Name("Sig".to_string()));
        assert_eq!(rest, b"/Filter");
    }

    #[test]
    fn test_literal_string_nesting() {
        let (rest, tok) = token(b"(a (b) \\) c) tail").unwrap();
        assert_eq!(tok, Token::LiteralString(b"a (b) \\) c"));
        assert_eq!(rest, b" tail");
    }

    #[test]
    fn test_unbalanced_literal_string() {
        assert!(token(b"(never closed").is_err());
    }

    #[test]
    fn test_hex_string_vs_dict() {
        assert_eq!(token(b"<00 FF>").unwrap().1, Token::HexString(b"00 FF"));
        assert_eq!(token(b"<<").unwrap().1, Token::DictStart);
    }

    #[test]
    fn test_keywords_order() {
        assert_eq!(token(b"endobj").unwrap().1, Token::ObjEnd);
        assert_eq!(token(b"endstream").unwrap().1, Token::StreamEnd);
        assert_eq!(token(b"stream\n").unwrap().1, Token::StreamStart);
        assert_eq!(token(b"R").unwrap().1, Token::R);
    }

    #[test]
    fn test_comments_are_skipped() {
        let (_, tok) = token(b"% comment\n  %another\r\n true").unwrap();
        assert_eq!(tok, Token::True);
    }
}
