use indexmap::IndexSet;

use crate::lexer::{TokenKind, tokenize};

/// Statement text with `:name` placeholders replaced by `$n` markers.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RewrittenQuery {
	pub sql: String,
	/// Distinct placeholder names in first-seen order; the name at index `i` is `$i+1`.
	pub variables: Vec<String>,
}

impl RewrittenQuery {
	/// 1-based ordinal of a placeholder.
	#[must_use]
	pub fn ordinal(&self, name: &str) -> Option<usize> {
		self.variables.iter().position(|v| v == name).map(|i| i + 1)
	}
}

/// Placeholder names fold to lower case like unquoted identifiers do.
#[must_use]
pub fn normalize_name(name: &str) -> String {
	name.to_ascii_lowercase()
}

pub fn rewrite(source: &str) -> RewrittenQuery {
	let mut sql = String::with_capacity(source.len());
	let mut names: IndexSet<String> = IndexSet::new();

	for token in tokenize(source) {
		match token.kind {
			TokenKind::BindVar => {
				let (index, _) = names.insert_full(normalize_name(token.value));
				sql.push('$');
				sql.push_str(&(index + 1).to_string());
			}
			TokenKind::DollarString
			| TokenKind::String
			| TokenKind::ExtendedString
			| TokenKind::QuotedIdent
			| TokenKind::Whitespace
			| TokenKind::Comment
			| TokenKind::Number
			| TokenKind::DoubleColon
			| TokenKind::Ident
			| TokenKind::Other => sql.push_str(token.text),
		}
	}

	RewrittenQuery { sql, variables: names.into_iter().collect() }
}
