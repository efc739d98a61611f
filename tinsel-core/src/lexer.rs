//! Lexer for tinsel source text.
//!
//! The lexer is a lazy iterator over [`Token`]s. Whitespace and comments
//! are dropped, except that any run of them containing a line break or a
//! `;` collapses into a single [`TokenKind::Break`]. That one rule is what
//! lets statements be separated by newlines and semicolons
//! interchangeably.

use crate::error::CompileError;
use crate::span::Span;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Special
    Eof,
    /// A collapsed run of whitespace/comments holding a newline or `;`.
    Break,

    // Identifiers and literals
    Ident,
    /// `float`, `vec3`, `mat2x4`, ...
    TypeName,
    /// `frag`, `frag0`, `frag12`, ...
    Frag,
    IntLiteral,
    UintLiteral,
    FloatLiteral,
    StringLiteral,
    BoolLiteral, // true / false

    // Punctuation
    LParen,     // (
    RParen,     // )
    LBrace,     // {
    RBrace,     // }
    LBracket,   // [
    RBracket,   // ]
    Comma,      // ,
    Colon,      // :
    Dot,        // .
    Question,   // ?
    Arrow,      // ->
    ColonEqual, // :=

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    AmpAmp,
    PipePipe,
    CaretCaret,
    Shl,
    Shr,
    PlusPlus,
    MinusMinus,

    // Assignment
    Equal,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmpEqual,
    PipeEqual,
    CaretEqual,
    ShlEqual,
    ShrEqual,

    // Keywords
    Fn,
    Pr,
    Def,
    Uniform,
    If,
    Else,
    For,
    Return,
    Refresh,
    Loop,
    Once,
    Mut,
    Const,

    // Built-in inputs
    Pos,
    NPos,
    Res,
    Time,
    Prev,
}

/// A single token: its kind, the exact source slice and where it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
}

/// Operators ordered so that longer spellings are tried first.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("<<=", TokenKind::ShlEqual),
    (">>=", TokenKind::ShrEqual),
    ("->", TokenKind::Arrow),
    (":=", TokenKind::ColonEqual),
    ("++", TokenKind::PlusPlus),
    ("--", TokenKind::MinusMinus),
    ("+=", TokenKind::PlusEqual),
    ("-=", TokenKind::MinusEqual),
    ("*=", TokenKind::StarEqual),
    ("/=", TokenKind::SlashEqual),
    ("%=", TokenKind::PercentEqual),
    ("&=", TokenKind::AmpEqual),
    ("|=", TokenKind::PipeEqual),
    ("^=", TokenKind::CaretEqual),
    ("==", TokenKind::EqualEqual),
    ("!=", TokenKind::BangEqual),
    ("<=", TokenKind::LessEqual),
    (">=", TokenKind::GreaterEqual),
    ("&&", TokenKind::AmpAmp),
    ("||", TokenKind::PipePipe),
    ("^^", TokenKind::CaretCaret),
    ("<<", TokenKind::Shl),
    (">>", TokenKind::Shr),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    (",", TokenKind::Comma),
    (":", TokenKind::Colon),
    (".", TokenKind::Dot),
    ("?", TokenKind::Question),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("&", TokenKind::Amp),
    ("|", TokenKind::Pipe),
    ("^", TokenKind::Caret),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::Bang),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("=", TokenKind::Equal),
];

/// Lex a whole source string, stopping at the first error.
pub fn lex(source: &str) -> Result<Vec<Token<'_>>, CompileError> {
    Lexer::new(source).collect()
}

/// Lazy token stream over a source string.
///
/// Cloning a lexer (or calling [`Lexer::restart`]) gives an independent
/// cursor, so the stream can be replayed from any point.
#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    source: &'src str,
    chars: &'src [u8],
    len: usize,
    index: usize,
    line: u32,
    column: u32,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            chars: source.as_bytes(),
            len: source.len(),
            index: 0,
            line: 1,
            column: 1,
            done: false,
        }
    }

    /// Rewind to the beginning of the source.
    pub fn restart(&mut self) {
        *self = Lexer::new(self.source);
    }

    fn next_token(&mut self) -> Result<Token<'src>, CompileError> {
        if let Some(brk) = self.skip_trivia()? {
            return Ok(brk);
        }

        let start = self.index;
        let span = self.here();
        let Some(ch) = self.peek_char() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: "",
                span,
            });
        };

        match ch {
            b'"' | b'\'' => self.lex_string(start, span),
            b'0'..=b'9' => self.lex_number(start, span),
            b'.' if self.peek_next().is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number(start, span)
            }
            _ if is_ident_start(ch) => Ok(self.lex_ident_or_keyword(start, span)),
            _ => {
                let rest = &self.source[start..];
                for (spelling, kind) in OPERATORS {
                    if rest.starts_with(spelling) {
                        for _ in 0..spelling.len() {
                            self.consume_char();
                        }
                        return Ok(self.token(*kind, start, span));
                    }
                }
                let shown = rest.chars().next().unwrap_or('?');
                Err(CompileError::lex(
                    span,
                    format!("unexpected character '{shown}'"),
                ))
            }
        }
    }

    /// Skip whitespace and comments. Returns a break token when the
    /// skipped run contained a newline or a semicolon.
    fn skip_trivia(&mut self) -> Result<Option<Token<'src>>, CompileError> {
        let mut brk: Option<(usize, Span)> = None;
        loop {
            match self.peek_char() {
                Some(b'\n') | Some(b';') => {
                    if brk.is_none() {
                        brk = Some((self.index, self.here()));
                    }
                    self.consume_char();
                }
                Some(ch) if is_whitespace(ch) => self.consume_char(),
                Some(b'/') if self.peek_next() == Some(b'/') => {
                    while let Some(ch) = self.peek_char() {
                        if ch == b'\n' {
                            break;
                        }
                        self.consume_char();
                    }
                }
                Some(b'/') if self.peek_next() == Some(b'*') => {
                    let span = self.here();
                    self.consume_char();
                    self.consume_char();
                    loop {
                        match self.peek_char() {
                            None => {
                                return Err(CompileError::lex(span, "unterminated block comment"));
                            }
                            Some(b'*') if self.peek_next() == Some(b'/') => {
                                self.consume_char();
                                self.consume_char();
                                break;
                            }
                            Some(b'\n') => {
                                if brk.is_none() {
                                    brk = Some((self.index, self.here()));
                                }
                                self.consume_char();
                            }
                            Some(_) => self.consume_char(),
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(brk.map(|(at, span)| Token {
            kind: TokenKind::Break,
            text: &self.source[at..at + 1],
            span,
        }))
    }

    fn lex_string(&mut self, start: usize, span: Span) -> Result<Token<'src>, CompileError> {
        let quote = self.peek_char();
        self.consume_char();
        loop {
            match self.peek_char() {
                None | Some(b'\n') => {
                    return Err(CompileError::lex(span, "unterminated string literal"));
                }
                Some(ch) if Some(ch) == quote => {
                    self.consume_char();
                    break;
                }
                Some(_) => self.consume_char(),
            }
        }
        // Optional component-count suffix choosing vec3 or vec4.
        if matches!(self.peek_char(), Some(b'3') | Some(b'4')) {
            self.consume_char();
        }
        if self.peek_char().is_some_and(is_ident_continue) {
            return Err(CompileError::lex(
                span,
                "a string literal may only be suffixed with 3 or 4",
            ));
        }
        Ok(self.token(TokenKind::StringLiteral, start, span))
    }

    fn lex_number(&mut self, start: usize, span: Span) -> Result<Token<'src>, CompileError> {
        self.consume_digits();

        let mut is_float = false;
        if self.peek_char() == Some(b'.') {
            is_float = true;
            self.consume_char();
            self.consume_digits();
            if matches!(self.peek_char(), Some(b'e') | Some(b'E')) {
                self.consume_char();
                if matches!(self.peek_char(), Some(b'+') | Some(b'-')) {
                    self.consume_char();
                }
                if !self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                    return Err(CompileError::lex(span, "malformed exponent in float literal"));
                }
                self.consume_digits();
            }
        }

        let mut kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        if !is_float && self.peek_char() == Some(b'u') {
            self.consume_char();
            kind = TokenKind::UintLiteral;
        }

        if self.peek_char().is_some_and(is_ident_continue) {
            return Err(CompileError::lex(span, "malformed numeric literal"));
        }
        Ok(self.token(kind, start, span))
    }

    fn lex_ident_or_keyword(&mut self, start: usize, span: Span) -> Token<'src> {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.index];

        let kind = match text {
            "fn" => TokenKind::Fn,
            "pr" => TokenKind::Pr,
            "def" => TokenKind::Def,
            "uniform" => TokenKind::Uniform,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "refresh" => TokenKind::Refresh,
            "loop" => TokenKind::Loop,
            "once" => TokenKind::Once,
            "mut" => TokenKind::Mut,
            "const" => TokenKind::Const,
            "pos" => TokenKind::Pos,
            "npos" => TokenKind::NPos,
            "res" => TokenKind::Res,
            "time" => TokenKind::Time,
            "prev" => TokenKind::Prev,
            "true" | "false" => TokenKind::BoolLiteral,
            _ if is_type_name(text) => TokenKind::TypeName,
            _ if is_frag_name(text) => TokenKind::Frag,
            _ => TokenKind::Ident,
        };
        self.token(kind, start, span)
    }

    fn consume_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char();
        }
    }

    fn token(&self, kind: TokenKind, start: usize, span: Span) -> Token<'src> {
        Token {
            kind,
            text: &self.source[start..self.index],
            span,
        }
    }

    fn here(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.len {
            let ch = self.chars[self.index];
            self.index += 1;
            if ch == b'\n' {
                self.line += 1;
                self.column = 1;
            } else if ch & 0xC0 != 0x80 {
                // count characters, not UTF-8 continuation bytes
                self.column += 1;
            }
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::Eof => self.done = true,
            Err(_) => self.done = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

pub fn is_type_name(text: &str) -> bool {
    match text {
        "float" | "int" | "uint" | "bool" => true,
        _ => {
            let dims = |rest: &str| matches!(rest, "2" | "3" | "4");
            if let Some(rest) = text.strip_prefix("vec") {
                return dims(rest);
            }
            if let Some(rest) = text
                .strip_prefix("ivec")
                .or_else(|| text.strip_prefix("uvec"))
                .or_else(|| text.strip_prefix("bvec"))
            {
                return dims(rest);
            }
            if let Some(rest) = text.strip_prefix("mat") {
                return match rest.split_once('x') {
                    Some((cols, rows)) => dims(cols) && dims(rows),
                    None => dims(rest),
                };
            }
            false
        }
    }
}

fn is_frag_name(text: &str) -> bool {
    match text.strip_prefix("frag") {
        Some(rest) => rest.bytes().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn newlines_and_semicolons_collapse_into_one_break() {
        use TokenKind::*;
        assert_eq!(
            kinds("a;\n ; \n\nb"),
            vec![Ident, Break, Ident, Eof]
        );
        assert_eq!(kinds("a b"), vec![Ident, Ident, Eof]);
    }

    #[test]
    fn comments_are_dropped_but_line_comments_still_break() {
        use TokenKind::*;
        assert_eq!(kinds("a // note\nb"), vec![Ident, Break, Ident, Eof]);
        assert_eq!(kinds("a /* x */ b"), vec![Ident, Ident, Eof]);
        assert_eq!(kinds("a /* x\n y */ b"), vec![Ident, Break, Ident, Eof]);
        // block comments end at the first terminator
        assert_eq!(kinds("/* a */ b /* c */"), vec![Ident, Eof]);
    }

    #[test]
    fn numeric_literals() {
        use TokenKind::*;
        assert_eq!(
            kinds("1 1. .5 2.5e-3 7u"),
            vec![IntLiteral, FloatLiteral, FloatLiteral, FloatLiteral, UintLiteral, Eof]
        );
        assert!(lex("12abc").is_err());
    }

    #[test]
    fn string_literals_with_suffix() {
        let tokens = lex("\"#ff0000\"3 '#0f0'").expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text, "\"#ff0000\"3");
        assert_eq!(tokens[1].text, "'#0f0'");
        assert!(lex("'abc").is_err());
    }

    #[test]
    fn operators_use_longest_match() {
        use TokenKind::*;
        assert_eq!(
            kinds("a <<= b -> c := d ^^ e"),
            vec![Ident, ShlEqual, Ident, Arrow, Ident, ColonEqual, Ident, CaretCaret, Ident, Eof]
        );
    }

    #[test]
    fn keywords_types_and_frag_references() {
        use TokenKind::*;
        assert_eq!(
            kinds("fn vec3 mat2x4 frag frag12 fragment true"),
            vec![Fn, TypeName, TypeName, Frag, Frag, Ident, BoolLiteral, Eof]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = lex("a\n  bc").expect("lex");
        assert_eq!(tokens[0].span, Span::new(1, 1));
        assert_eq!(tokens[1].span, Span::new(1, 2));
        assert_eq!(tokens[2].span, Span::new(2, 3));
    }

    #[test]
    fn reserved_names_are_plain_identifiers() {
        let tokens = lex("gl_Position tsl_x a__b while").expect("lex");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn reports_unexpected_characters_with_position() {
        match lex("a\n  @") {
            Err(CompileError::Lex { line, column, .. }) => {
                assert_eq!((line, column), (2, 3));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_is_restartable() {
        let mut lexer = Lexer::new("a b");
        let first: Vec<_> = lexer.by_ref().collect();
        assert!(lexer.next().is_none());
        lexer.restart();
        let second: Vec<_> = lexer.collect();
        assert_eq!(first.len(), second.len());
    }
}
