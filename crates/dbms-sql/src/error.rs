use thiserror::Error;

use crate::registry::{CursorId, CursorState};

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`], stable across variants.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
	/// A required argument was absent or malformed.
	InvalidInput,
	/// The operation was invoked out of life-cycle order.
	InvalidState,
	/// Unknown variable, column or type reference.
	NotFound,
	/// The cursor pool is full.
	ResourceExhausted,
	/// A declared variable was never bound before execute.
	MissingValue,
	/// The engine's result shape disagrees with the declared columns.
	SchemaMismatch,
	/// No coercion pathway between two types.
	UnsupportedCast,
	/// Failure reported by the query engine.
	Engine,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
	#[error("{what} cannot be NULL")]
	NullArgument { what: &'static str },

	#[error("a value of cursor id is out of range: {index}")]
	CursorOutOfRange { index: u32 },

	#[error("cursor {cursor} is not opened")]
	CursorNotOpen { cursor: CursorId },

	#[error("cannot {operation} cursor {cursor}: cursor is {state}")]
	InvalidState { cursor: CursorId, operation: &'static str, state: CursorState },

	#[error("cursor {cursor} has no column definitions")]
	NoColumnsDefined { cursor: CursorId },

	#[error("cursor {cursor} has no fetched row")]
	NoRowFetched { cursor: CursorId },

	#[error("column position must be positive, got {position}")]
	InvalidPosition { position: i32 },

	#[error("bind variable \"{name}\" not found")]
	UnknownVariable { name: String },

	#[error("column definition on position {position} not found")]
	UndefinedColumn { position: usize },

	#[error("column position {position} is out of range (1..={max})")]
	ColumnOutOfRange { position: i32, max: usize },

	#[error("cannot use a value of record type {type_name} as {what}")]
	RowType { what: &'static str, type_name: String },

	#[error("requested type {requested} does not match column type {defined}")]
	TypeMismatch { requested: String, defined: String },

	#[error("there is no free cursor (capacity {capacity})")]
	PoolExhausted { capacity: usize },

	#[error("bind variable \"{name}\" has no value")]
	UnboundVariable { name: String },

	#[error("returned row structure does not match declared columns: {declared} declared, {actual} returned")]
	ColumnCountMismatch { declared: usize, actual: usize },

	#[error("cannot cast type {source_type} to {target_type}")]
	NoCoercion { source_type: String, target_type: String },

	#[error("type with id {id} does not exist")]
	UnknownType { id: u32 },

	#[error("invalid input syntax for type {type_name}: \"{input}\"")]
	InvalidText { type_name: String, input: String },

	#[error("{type_name} out of range: {value}")]
	ValueOutOfRange { type_name: String, value: String },

	#[error("value for domain {domain} violates {constraint}")]
	DomainViolation { domain: String, constraint: String },

	#[error("invalid configuration: {detail}")]
	Config { detail: String },

	#[error("engine error: {message}")]
	Engine { message: String },
}

impl Error {
	pub fn engine(message: impl Into<String>) -> Self {
		Self::Engine { message: message.into() }
	}

	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::NullArgument { .. }
			| Self::CursorOutOfRange { .. }
			| Self::InvalidPosition { .. }
			| Self::RowType { .. }
			| Self::TypeMismatch { .. }
			| Self::InvalidText { .. }
			| Self::ValueOutOfRange { .. }
			| Self::DomainViolation { .. }
			| Self::Config { .. } => ErrorKind::InvalidInput,
			Self::CursorNotOpen { .. }
			| Self::InvalidState { .. }
			| Self::NoColumnsDefined { .. }
			| Self::NoRowFetched { .. } => ErrorKind::InvalidState,
			Self::UnknownVariable { .. }
			| Self::UndefinedColumn { .. }
			| Self::ColumnOutOfRange { .. }
			| Self::UnknownType { .. } => ErrorKind::NotFound,
			Self::PoolExhausted { .. } => ErrorKind::ResourceExhausted,
			Self::UnboundVariable { .. } => ErrorKind::MissingValue,
			Self::ColumnCountMismatch { .. } => ErrorKind::SchemaMismatch,
			Self::NoCoercion { .. } => ErrorKind::UnsupportedCast,
			Self::Engine { .. } => ErrorKind::Engine,
		}
	}
}
