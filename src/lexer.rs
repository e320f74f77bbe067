//! Byte-level scanner for Ada 83 source text.
//!
//! One token per [`Lexer::next_token`] call; `tokenize` drains the stream
//! into a `Vec` for the parser. Single-byte lookahead suffices everywhere
//! except based literals, `..` versus a fraction point, and the
//! single-quote ambiguity between character literals and the tick
//! delimiter, which also consults the previously emitted token.
//!
//! Scan failures never abort here: they become `TokenKind::Error` tokens
//! whose text slot carries the explanation, and the parser escalates them.

use crate::bignum::{BigInt, BigRat};
use crate::diag::SourceLoc;
use crate::intern::{Interner, Symbol};
use crate::token::{Token, TokenKind};

pub struct Lexer<'s, 'i> {
    bytes: &'s [u8],
    source: &'s str,
    interner: &'i mut Interner,
    file: Symbol,
    pos: usize,
    line: u32,
    col: u32,
    /// Kind of the last emitted token, for tick disambiguation.
    prev_kind: TokenKind,
}

impl<'s, 'i> Lexer<'s, 'i> {
    pub fn new(source: &'s str, file_name: &str, interner: &'i mut Interner) -> Self {
        let file = interner.intern(file_name);
        Lexer {
            bytes: source.as_bytes(),
            source,
            interner,
            file,
            pos: 0,
            line: 1,
            col: 1,
            prev_kind: TokenKind::Eof,
        }
    }

    /// Drain the whole stream. The final element is always `Eof`.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        let gap = self.skip_blanks();
        let loc = self.here();
        let start = self.pos;

        let Some(&b) = self.bytes.get(self.pos) else {
            return self.emit(Token::new(TokenKind::Eof, loc, Symbol::EMPTY));
        };

        let token = match b {
            b'a'..=b'z' | b'A'..=b'Z' => self.scan_identifier(loc, start),
            b'0'..=b'9' => self.scan_number(loc, start),
            b'"' | b'%' => self.scan_string(loc, start, b),
            b'\'' => self.scan_tick_or_char(loc, start, gap),
            _ => self.scan_delimiter(loc, start),
        };
        self.emit(token)
    }

    fn emit(&mut self, token: Token) -> Token {
        self.prev_kind = token.kind;
        token
    }

    fn here(&self) -> SourceLoc {
        SourceLoc::new(self.file, self.line, self.col)
    }

    fn peek(&self, ahead: usize) -> u8 {
        self.bytes.get(self.pos + ahead).copied().unwrap_or(0)
    }

    fn bump(&mut self) {
        if self.bytes[self.pos] == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
    }

    /// Skip whitespace and `--` comments. Returns true when anything was
    /// skipped, which is what separates `X 'a'` from `X'First`.
    fn skip_blanks(&mut self) -> bool {
        let start = self.pos;
        loop {
            match self.peek(0) {
                b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c => self.bump(),
                b'-' if self.peek(1) == b'-' => {
                    while self.pos < self.bytes.len() && self.peek(0) != b'\n' {
                        self.bump();
                    }
                }
                _ => break,
            }
            if self.pos >= self.bytes.len() {
                break;
            }
        }
        self.pos != start
    }

    fn span_text(&mut self, start: usize) -> Symbol {
        self.interner.intern(&self.source[start..self.pos])
    }

    fn error_token(&mut self, loc: SourceLoc, message: &str) -> Token {
        let text = self.interner.intern(message);
        Token::new(TokenKind::Error, loc, text)
    }

    fn scan_identifier(&mut self, loc: SourceLoc, start: usize) -> Token {
        while matches!(self.peek(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.bump();
        }
        let spelling = &self.source[start..self.pos];
        let kind = TokenKind::keyword(&spelling.to_ascii_lowercase()).unwrap_or(TokenKind::Ident);
        let text = self.span_text(start);
        Token::new(kind, loc, text)
    }

    fn scan_number(&mut self, loc: SourceLoc, start: usize) -> Token {
        let mut digits = String::new();
        self.take_digits(&mut digits, 10);

        // base # extended-digits [ . extended-digits ] # [exponent]
        if self.peek(0) == b'#' || (self.peek(0) == b':' && self.peek(1).is_ascii_hexdigit()) {
            return self.scan_based(loc, start, &digits);
        }

        let mut fraction = String::new();
        let mut is_real = false;
        if self.peek(0) == b'.' && self.peek(1) != b'.' && !self.peek(1).is_ascii_alphabetic() {
            is_real = true;
            self.bump();
            if !self.peek(0).is_ascii_digit() {
                return self.error_token(loc, "digit expected after decimal point");
            }
            self.take_digits(&mut fraction, 10);
        }

        let mut exponent = 0i32;
        if matches!(self.peek(0), b'e' | b'E') {
            self.bump();
            let neg = match self.peek(0) {
                b'+' => {
                    self.bump();
                    false
                }
                b'-' => {
                    self.bump();
                    true
                }
                _ => false,
            };
            if neg && !is_real {
                return self.error_token(loc, "negative exponent on integer literal");
            }
            if !self.peek(0).is_ascii_digit() {
                return self.error_token(loc, "digit expected in exponent");
            }
            let mut exp_digits = String::new();
            self.take_digits(&mut exp_digits, 10);
            let magnitude: i32 = match exp_digits.parse() {
                Ok(m) if m <= 10_000 => m,
                _ => return self.error_token(loc, "exponent out of range"),
            };
            exponent = if neg { -magnitude } else { magnitude };
        }

        if self.peek(0).is_ascii_alphanumeric() {
            return self.error_token(loc, "letter or digit after numeric literal");
        }

        let text = self.span_text(start);
        if is_real {
            let mantissa = match BigInt::parse_decimal(&format!("{}{}", digits, fraction)) {
                Some(v) => v,
                None => return self.error_token(loc, "malformed real literal"),
            };
            let scale = exponent - fraction.len() as i32;
            let mut token = Token::new(TokenKind::RealLit, loc, text);
            token.fval = BigRat::scaled(mantissa, 10, scale).to_f64();
            return token;
        }

        let mut value = match BigInt::parse_decimal(&digits) {
            Some(v) => v,
            None => return self.error_token(loc, "malformed integer literal"),
        };
        for _ in 0..exponent {
            value = value.mul_small(10);
        }
        self.integer_token(loc, text, value)
    }

    fn scan_based(&mut self, loc: SourceLoc, start: usize, base_digits: &str) -> Token {
        let delimiter = self.peek(0);
        self.bump();
        let base: u64 = match base_digits.replace('_', "").parse() {
            Ok(b) if (2..=16).contains(&b) => b,
            _ => return self.error_token(loc, "base must be in the range 2 .. 16"),
        };

        let mut mantissa = BigInt::zero();
        let mut frac_len = 0i32;
        let mut in_fraction = false;
        let mut saw_digit = false;
        loop {
            let b = self.peek(0);
            match b {
                b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                    let digit = if b.is_ascii_digit() {
                        (b - b'0') as u64
                    } else {
                        (b.to_ascii_lowercase() - b'a' + 10) as u64
                    };
                    if digit >= base {
                        return self.error_token(loc, "digit exceeds base of literal");
                    }
                    mantissa = mantissa.mul_small(base).add_small(digit);
                    if in_fraction {
                        frac_len += 1;
                    }
                    saw_digit = true;
                    self.bump();
                }
                b'_' => self.bump(),
                b'.' => {
                    if in_fraction {
                        return self.error_token(loc, "second point in based literal");
                    }
                    in_fraction = true;
                    self.bump();
                }
                _ if b == delimiter => {
                    self.bump();
                    break;
                }
                _ => return self.error_token(loc, "unterminated based literal"),
            }
        }
        if !saw_digit {
            return self.error_token(loc, "empty based literal");
        }

        let mut exponent = 0i32;
        if matches!(self.peek(0), b'e' | b'E') {
            self.bump();
            let neg = match self.peek(0) {
                b'+' => {
                    self.bump();
                    false
                }
                b'-' => {
                    self.bump();
                    true
                }
                _ => false,
            };
            if neg && !in_fraction {
                return self.error_token(loc, "negative exponent on integer literal");
            }
            if !self.peek(0).is_ascii_digit() {
                return self.error_token(loc, "digit expected in exponent");
            }
            let mut exp_digits = String::new();
            self.take_digits(&mut exp_digits, 10);
            let magnitude: i32 = match exp_digits.parse() {
                Ok(m) if m <= 10_000 => m,
                _ => return self.error_token(loc, "exponent out of range"),
            };
            exponent = if neg { -magnitude } else { magnitude };
        }

        if self.peek(0).is_ascii_alphanumeric() {
            return self.error_token(loc, "letter or digit after numeric literal");
        }

        let text = self.span_text(start);
        if in_fraction {
            let mut token = Token::new(TokenKind::RealLit, loc, text);
            token.fval = BigRat::scaled(mantissa, base, exponent - frac_len).to_f64();
            return token;
        }
        let mut value = mantissa;
        for _ in 0..exponent {
            value = value.mul_small(base);
        }
        self.integer_token(loc, text, value)
    }

    fn integer_token(&mut self, loc: SourceLoc, text: Symbol, value: BigInt) -> Token {
        let mut token = Token::new(TokenKind::IntLit, loc, text);
        match value.to_i64() {
            Some(v) => token.ival = v,
            None => {
                token.fval = value.to_f64();
                token.big = Some(value);
            }
        }
        token
    }

    fn take_digits(&mut self, out: &mut String, _base: u32) {
        while matches!(self.peek(0), b'0'..=b'9' | b'_') {
            if self.peek(0) != b'_' {
                out.push(self.peek(0) as char);
            }
            self.bump();
        }
    }

    fn scan_string(&mut self, loc: SourceLoc, start: usize, delimiter: u8) -> Token {
        self.bump();
        let mut value = Vec::new();
        loop {
            match self.peek(0) {
                0 | b'\n' => return self.error_token(loc, "unterminated string literal"),
                b if b == delimiter => {
                    self.bump();
                    if self.peek(0) == delimiter {
                        // Doubled delimiter stands for one occurrence.
                        value.push(delimiter);
                        self.bump();
                    } else {
                        break;
                    }
                }
                b => {
                    value.push(b);
                    self.bump();
                }
            }
        }
        let text = self.span_text(start);
        let mut token = Token::new(TokenKind::StrLit, loc, text);
        token.sval = self.interner.intern(&String::from_utf8_lossy(&value));
        token
    }

    /// `'` begins a character literal only when the previous token was not
    /// an identifier (or blanks separate them), the byte two ahead is
    /// another `'`, and the byte three ahead is not.
    fn scan_tick_or_char(&mut self, loc: SourceLoc, start: usize, gap: bool) -> Token {
        let attribute_position = self.prev_kind == TokenKind::Ident && !gap;
        let looks_like_char = self.peek(2) == b'\'' && self.peek(3) != b'\'';
        if !attribute_position && looks_like_char {
            self.bump();
            let value = self.peek(0);
            self.bump();
            self.bump();
            let text = self.span_text(start);
            let mut token = Token::new(TokenKind::CharLit, loc, text);
            token.ival = value as i64;
            return token;
        }
        self.bump();
        let text = self.span_text(start);
        Token::new(TokenKind::Tick, loc, text)
    }

    fn scan_delimiter(&mut self, loc: SourceLoc, start: usize) -> Token {
        let b = self.peek(0);
        self.bump();
        let kind = match b {
            b'&' => TokenKind::Amp,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'+' => TokenKind::Plus,
            b',' => TokenKind::Comma,
            b'-' => TokenKind::Minus,
            b';' => TokenKind::Semi,
            b'|' | b'!' => TokenKind::Bar,
            b'*' => self.follow(b'*', TokenKind::StarStar, TokenKind::Star),
            b'/' => self.follow(b'=', TokenKind::Ne, TokenKind::Slash),
            b':' => self.follow(b'=', TokenKind::Assign, TokenKind::Colon),
            b'=' => self.follow(b'>', TokenKind::Arrow, TokenKind::Eq),
            b'.' => self.follow(b'.', TokenKind::DotDot, TokenKind::Dot),
            b'<' => match self.peek(0) {
                b'=' => {
                    self.bump();
                    TokenKind::Le
                }
                b'<' => {
                    self.bump();
                    TokenKind::LtLt
                }
                b'>' => {
                    self.bump();
                    TokenKind::Box
                }
                _ => TokenKind::Lt,
            },
            b'>' => match self.peek(0) {
                b'=' => {
                    self.bump();
                    TokenKind::Ge
                }
                b'>' => {
                    self.bump();
                    TokenKind::GtGt
                }
                _ => TokenKind::Gt,
            },
            _ => return self.error_token(loc, "illegal character"),
        };
        let text = self.span_text(start);
        Token::new(kind, loc, text)
    }

    fn follow(&mut self, expected: u8, then: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.peek(0) == expected {
            self.bump();
            then
        } else {
            otherwise
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, Interner) {
        let mut interner = Interner::new();
        let tokens = Lexer::new(source, "test.ada", &mut interner).tokenize();
        (tokens, interner)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn literal_slice_equals_consumed_span() {
        let source = "X_1 := 10_0 + 16#FF#; -- trailing\n\"ab\"\"cd\"";
        let (tokens, interner) = lex(source);
        let mut cursor = 0;
        for token in &tokens {
            if token.kind == TokenKind::Eof {
                continue;
            }
            let text = interner.resolve(token.text);
            let found = source[cursor..].find(text).expect("slice present in order");
            cursor += found + text.len();
        }
    }

    #[test]
    fn keywords_match_case_insensitively() {
        assert_eq!(
            kinds("BEGIN Begin begin"),
            vec![TokenKind::Begin, TokenKind::Begin, TokenKind::Begin, TokenKind::Eof]
        );
        let (tokens, interner) = lex("Procedure");
        assert_eq!(tokens[0].kind, TokenKind::Procedure);
        assert_eq!(interner.resolve(tokens[0].text), "Procedure");
    }

    #[test]
    fn compound_delimiters_are_eager() {
        assert_eq!(
            kinds(":= => .. ** /= <= >= << >> <>"),
            vec![
                TokenKind::Assign,
                TokenKind::Arrow,
                TokenKind::DotDot,
                TokenKind::StarStar,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::LtLt,
                TokenKind::GtGt,
                TokenKind::Box,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn range_does_not_eat_fraction() {
        assert_eq!(
            kinds("1..5"),
            vec![TokenKind::IntLit, TokenKind::DotDot, TokenKind::IntLit, TokenKind::Eof]
        );
        let (tokens, _) = lex("3.14");
        assert_eq!(tokens[0].kind, TokenKind::RealLit);
        assert!((tokens[0].fval - 3.14).abs() < 1e-12);
    }

    #[test]
    fn underscores_ignored_in_numbers() {
        let (tokens, _) = lex("1_000_000");
        assert_eq!(tokens[0].ival, 1_000_000);
    }

    #[test]
    fn based_literals() {
        let (tokens, _) = lex("16#FF# 2#1010# 8#17# 16:2F:");
        assert_eq!(tokens[0].ival, 255);
        assert_eq!(tokens[1].ival, 10);
        assert_eq!(tokens[2].ival, 15);
        assert_eq!(tokens[3].ival, 47);
    }

    #[test]
    fn based_literal_with_exponent_and_fraction() {
        let (tokens, _) = lex("2#1#E8 16#F.8#");
        assert_eq!(tokens[0].ival, 256);
        assert_eq!(tokens[1].kind, TokenKind::RealLit);
        assert!((tokens[1].fval - 15.5).abs() < 1e-12);
    }

    #[test]
    fn oversized_literal_carries_big_value() {
        let (tokens, _) = lex("123456789012345678901234567890");
        assert_eq!(tokens[0].kind, TokenKind::IntLit);
        let big = tokens[0].big.as_ref().expect("big value");
        assert_eq!(big.to_string(), "123456789012345678901234567890");
    }

    #[test]
    fn small_literal_round_trips_through_ival() {
        let (tokens, interner) = lex("9_223_372_036_854_775_807");
        assert_eq!(tokens[0].ival, i64::MAX);
        assert!(tokens[0].big.is_none());
        let plain: String = interner.resolve(tokens[0].text).replace('_', "");
        assert_eq!(plain.parse::<i64>().unwrap(), tokens[0].ival);
    }

    #[test]
    fn tick_after_identifier_is_attribute() {
        assert_eq!(
            kinds("X'First"),
            vec![TokenKind::Ident, TokenKind::Tick, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn standalone_quote_is_character_literal() {
        let (tokens, _) = lex("'A'");
        assert_eq!(tokens[0].kind, TokenKind::CharLit);
        assert_eq!(tokens[0].ival, b'A' as i64);
    }

    #[test]
    fn gap_after_identifier_allows_character_literal() {
        assert_eq!(
            kinds("X 'A'"),
            vec![TokenKind::Ident, TokenKind::CharLit, TokenKind::Eof]
        );
    }

    #[test]
    fn qualified_character_after_paren_is_character() {
        assert_eq!(
            kinds("CHARACTER'('A')"),
            vec![
                TokenKind::Ident,
                TokenKind::Tick,
                TokenKind::LParen,
                TokenKind::CharLit,
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_literals_undouble_delimiter() {
        let (tokens, interner) = lex("\"he said \"\"hi\"\"\"");
        assert_eq!(tokens[0].kind, TokenKind::StrLit);
        assert_eq!(interner.resolve(tokens[0].sval), "he said \"hi\"");
    }

    #[test]
    fn percent_string_delimiter() {
        let (tokens, interner) = lex("%percent form%");
        assert_eq!(tokens[0].kind, TokenKind::StrLit);
        assert_eq!(interner.resolve(tokens[0].sval), "percent form");
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("a -- the rest\nb"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn trailing_letter_is_an_error() {
        let (tokens, interner) = lex("12x");
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert!(interner.resolve(tokens[0].text).contains("letter or digit"));
    }

    #[test]
    fn locations_are_one_based() {
        let (tokens, _) = lex("a\n  b");
        assert_eq!((tokens[0].loc.line, tokens[0].loc.col), (1, 1));
        assert_eq!((tokens[1].loc.line, tokens[1].loc.col), (2, 3));
    }

    #[test]
    fn bang_is_bar_replacement() {
        assert_eq!(kinds("a ! b"), vec![TokenKind::Ident, TokenKind::Bar, TokenKind::Ident, TokenKind::Eof]);
    }
}
