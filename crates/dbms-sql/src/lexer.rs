//! Single-pass scanner that finds `:name` placeholders in SQL text.
//!
//! Only the token classes that can hide or contain a placeholder are recognized;
//! everything else falls through as identifiers or single characters. The scan keeps
//! no state beyond the returned position, so it can be resumed from any position a
//! previous call handed out (but not from an arbitrary byte inside a token).

use memchr::memmem;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TokenKind {
	Whitespace,
	/// `/* ... */`
	Comment,
	Number,
	/// `:name`
	BindVar,
	/// `'...'`
	String,
	/// `e'...'` or `E'...'`
	ExtendedString,
	/// `$tag$...$tag$`
	DollarString,
	/// `"..."`
	QuotedIdent,
	/// `::`
	DoubleColon,
	Ident,
	Other,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Token<'a> {
	pub kind: TokenKind,
	/// The complete lexeme, delimiters included.
	pub text: &'a str,
	/// Placeholder name, or the body of a string, identifier or dollar string.
	pub value: &'a str,
	/// Opening delimiter of a dollar string (`$tag$`), empty otherwise.
	pub tag: &'a str,
}

struct Lexeme {
	kind: TokenKind,
	end: usize,
	value: (usize, usize),
	tag: (usize, usize),
}

impl Lexeme {
	const fn plain(kind: TokenKind, start: usize, end: usize) -> Self {
		Self { kind, end, value: (start, end), tag: (start, start) }
	}
}

/// Scans the token starting at byte `pos`, returning it with the position of the next one.
pub fn next_token(source: &str, pos: usize) -> Option<(Token<'_>, usize)> {
	let bytes = source.as_bytes();
	let first = *bytes.get(pos)?;
	let at = |i: usize| bytes.get(i).copied();

	let lexeme = match first {
		b if b.is_ascii_whitespace() => {
			let end = scan_while(bytes, pos + 1, |b| b.is_ascii_whitespace());
			Lexeme::plain(TokenKind::Whitespace, pos, end)
		}
		b'$' if at(pos + 1).is_some_and(|b| b == b'$' || is_ident_start(b)) => {
			dollar_string(bytes, pos)
		}
		b'/' if at(pos + 1) == Some(b'*') => {
			let end = find(bytes, pos + 2, b"*/").map_or(bytes.len(), |i| i + 2);
			Lexeme::plain(TokenKind::Comment, pos, end)
		}
		b'0'..=b'9' => number(bytes, pos),
		b'.' if at(pos + 1).is_some_and(|b| b.is_ascii_digit()) => number(bytes, pos),
		b':' if at(pos + 1).is_some_and(is_ident_start) => {
			let end = scan_while(bytes, pos + 2, is_ident_char);
			Lexeme { kind: TokenKind::BindVar, end, value: (pos + 1, end), tag: (pos, pos) }
		}
		b':' if at(pos + 1) == Some(b':') => Lexeme::plain(TokenKind::DoubleColon, pos, pos + 2),
		b'e' | b'E' if at(pos + 1) == Some(b'\'') => {
			quoted(bytes, pos, 2, b'\'', true, TokenKind::ExtendedString)
		}
		b'\'' => quoted(bytes, pos, 1, b'\'', false, TokenKind::String),
		b'"' => quoted(bytes, pos, 1, b'"', false, TokenKind::QuotedIdent),
		b if is_ident_start(b) => {
			let end = scan_while(bytes, pos + 1, is_ident_char);
			Lexeme::plain(TokenKind::Ident, pos, end)
		}
		_ => Lexeme::plain(TokenKind::Other, pos, pos + 1),
	};

	let token = Token {
		kind: lexeme.kind,
		text: span(source, pos, lexeme.end),
		value: span(source, lexeme.value.0, lexeme.value.1),
		tag: span(source, lexeme.tag.0, lexeme.tag.1),
	};
	Some((token, lexeme.end))
}

/// Iterator over all tokens of a text.
pub fn tokenize(source: &str) -> Tokens<'_> {
	Tokens { source, pos: 0 }
}

pub struct Tokens<'a> {
	source: &'a str,
	pos: usize,
}

impl Tokens<'_> {
	/// Byte offset of the next token.
	#[must_use]
	pub const fn position(&self) -> usize {
		self.pos
	}
}

impl<'a> Iterator for Tokens<'a> {
	type Item = Token<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let (token, next) = next_token(self.source, self.pos)?;
		self.pos = next;
		Some(token)
	}
}

// Bytes >= 0x80 count as identifier characters so multibyte UTF-8 sequences are
// never split.
const fn is_ident_start(b: u8) -> bool {
	b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

const fn is_ident_char(b: u8) -> bool {
	is_ident_start(b) || b.is_ascii_digit()
}

fn span(source: &str, start: usize, end: usize) -> &str {
	source.get(start..end).unwrap_or_default()
}

fn scan_while(bytes: &[u8], mut i: usize, pred: impl Fn(u8) -> bool) -> usize {
	while bytes.get(i).is_some_and(|&b| pred(b)) {
		i += 1;
	}
	i
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
	let haystack = bytes.get(from..)?;
	memmem::find(haystack, needle).map(|i| from + i)
}

fn number(bytes: &[u8], pos: usize) -> Lexeme {
	let mut point = bytes.get(pos) == Some(&b'.');
	let mut i = pos + 1;
	while let Some(b) = bytes.get(i).copied() {
		if b.is_ascii_digit() {
			i += 1;
		} else if b == b'.' && !point {
			point = true;
			i += 1;
		} else {
			break;
		}
	}
	Lexeme::plain(TokenKind::Number, pos, i)
}

fn dollar_string(bytes: &[u8], pos: usize) -> Lexeme {
	let mut i = pos + 1;
	let tag_end = loop {
		match bytes.get(i).copied() {
			Some(b'$') => break Some(i + 1),
			Some(b) if is_ident_char(b) => i += 1,
			_ => break None,
		}
	};

	let Some(tag_end) = tag_end else {
		return Lexeme::plain(TokenKind::Other, pos, pos + 1);
	};

	let tag = bytes.get(pos..tag_end).unwrap_or_default();
	let (body_end, end) = match find(bytes, tag_end, tag) {
		Some(close) => (close, close + tag.len()),
		None => (bytes.len(), bytes.len()),
	};
	Lexeme { kind: TokenKind::DollarString, end, value: (tag_end, body_end), tag: (pos, tag_end) }
}

/// Scans a delimited literal whose body starts `open` bytes after `pos`. A doubled
/// delimiter stands for itself; with `backslash`, `\'` and `\\` do too. Unterminated
/// literals run to the end of input.
fn quoted(bytes: &[u8], pos: usize, open: usize, delim: u8, backslash: bool, kind: TokenKind) -> Lexeme {
	let start = pos + open;
	let mut i = start;
	while let Some(b) = bytes.get(i).copied() {
		if b == delim {
			if bytes.get(i + 1) == Some(&delim) {
				i += 2;
				continue;
			}
			return Lexeme { kind, end: i + 1, value: (start, i), tag: (pos, pos) };
		}
		if backslash && b == b'\\' && matches!(bytes.get(i + 1), Some(b'\'' | b'\\')) {
			i += 2;
		} else {
			i += 1;
		}
	}
	Lexeme { kind, end: bytes.len(), value: (start, bytes.len()), tag: (pos, pos) }
}
