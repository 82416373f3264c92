use serde::Serialize;
use std::iter::Peekable;
use std::str::Chars;

/// Byte range into the text that was tokenized. `end` is exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub span: Span,
    pub kind: TokenKind<'a>,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize)]
pub enum TokenKind<'a> {
    Identifier(&'a str),
    Number(&'a str),

    LineComment,
    BlockComment,

    BraceOpen,
    BraceClose,

    ParenOpen,
    ParenClose,

    BracketOpen,
    BracketClose,

    Semicolon,
    Colon,
    Comma,
    Star,
    Hash,

    // Anything a struct declaration never needs to look at.
    Other(char),
}

impl TokenKind<'_> {
    pub fn is_comment(&self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// Scans C-like source text. Never fails: characters it has no use for come
/// out as `TokenKind::Other`.
pub struct Tokenizer<'a> {
    source: &'a str,
    iter: Peekable<Chars<'a>>,
    offset: usize,
    skip_comments: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str, skip_comments: bool) -> Self {
        Tokenizer {
            source,
            iter: source.chars().peekable(),
            offset: 0,
            skip_comments,
        }
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let c = self.iter.next()?;
        let offset = self.offset;
        self.offset += c.len_utf8();
        Some((offset, c))
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.iter.peek() {
            if !c.is_whitespace() {
                break;
            }

            self.advance();
        }
    }

    // The newline itself is not part of the comment.
    fn read_until_end_of_line(&mut self) -> usize {
        while let Some(c) = self.iter.peek() {
            if *c == '\n' {
                break;
            }

            self.advance();
        }

        self.offset
    }

    // Returns the offset just past the closing `*/`, or the end of the source
    // when the comment is never closed.
    fn read_block_comment(&mut self) -> Option<usize> {
        let mut previous = '\0';
        while let Some((_, c)) = self.advance() {
            if previous == '*' && c == '/' {
                return Some(self.offset);
            }
            previous = c;
        }

        None
    }

    fn read_while<P: Fn(char) -> bool>(&mut self, predicate: P) -> usize {
        while let Some(c) = self.iter.peek() {
            if !predicate(*c) {
                break;
            }

            self.advance();
        }

        self.offset
    }

    fn single(&self, start: usize, kind: TokenKind<'a>) -> Token<'a> {
        Token {
            span: Span {
                start,
                end: self.offset,
            },
            kind,
        }
    }
}

pub fn is_identifier_start_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_identifier_rest_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            self.skip_whitespace();

            let (start, c) = self.advance()?;

            #[rustfmt::skip]
            let tok = match c {
                _ if is_identifier_start_char(c) => {
                    let end = self.read_while(is_identifier_rest_char);
                    let span = Span { start, end };
                    Token { span, kind: TokenKind::Identifier(span.text(self.source)) }
                }

                _ if c.is_ascii_digit() => {
                    // Suffixes such as `10u` stay glued to the number.
                    let end = self.read_while(is_identifier_rest_char);
                    let span = Span { start, end };
                    Token { span, kind: TokenKind::Number(span.text(self.source)) }
                }

                '/' if self.iter.peek() == Some(&'/') => {
                    let end = self.read_until_end_of_line();
                    if self.skip_comments {
                        continue;
                    }
                    Token { span: Span { start, end }, kind: TokenKind::LineComment }
                }

                '/' if self.iter.peek() == Some(&'*') => {
                    self.advance();
                    match self.read_block_comment() {
                        Some(end) => {
                            if self.skip_comments {
                                continue;
                            }
                            Token { span: Span { start, end }, kind: TokenKind::BlockComment }
                        }
                        // An unterminated `/*` is not a comment. Rewind so the
                        // remaining text is still scanned.
                        None => {
                            self.iter = self.source[start + 1..].chars().peekable();
                            self.offset = start + 1;
                            self.single(start, TokenKind::Other('/'))
                        }
                    }
                }

                ';' => self.single(start, TokenKind::Semicolon),
                ':' => self.single(start, TokenKind::Colon),
                ',' => self.single(start, TokenKind::Comma),
                '*' => self.single(start, TokenKind::Star),
                '#' => self.single(start, TokenKind::Hash),

                '(' => self.single(start, TokenKind::ParenOpen),
                ')' => self.single(start, TokenKind::ParenClose),
                '{' => self.single(start, TokenKind::BraceOpen),
                '}' => self.single(start, TokenKind::BraceClose),
                '[' => self.single(start, TokenKind::BracketOpen),
                ']' => self.single(start, TokenKind::BracketClose),

                _ => self.single(start, TokenKind::Other(c)),
            };


            return Some(tok);
        }
    }
}
