//! Dynamic SQL cursors: parse a statement with `:name` placeholders, bind
//! values, declare result columns, execute, then fetch rows and read columns
//! coerced to the declared types.
//!
//! The [`Registry`] owns a fixed pool of cursors. Everything it needs from the
//! host (type catalog, query engine, transaction boundary) comes through a
//! [`Backend`]; [`memory::MemoryBackend`] is a self-contained one.

mod cast;
pub mod catalog;
mod config;
mod cursor;
pub mod engine;
mod error;
mod fetch;
pub mod lexer;
pub mod memory;
mod registry;
pub mod rewrite;
mod scope;
mod types;

pub use cast::{CastEntry, CastStep};
pub use catalog::{BuiltinCatalog, CoercionPath, DomainDef, FuncId, TypeCatalog};
pub use config::{
	DEFAULT_BATCH_SIZE, DEFAULT_CURSOR_NAME_PREFIX, DEFAULT_MAX_CURSORS, RegistryConfig,
};
pub use cursor::{BindState, ColumnDebug, CursorDebug, VariableDebug};
pub use engine::{
	Backend, ColumnDesc, Param, QueryEngine, Row, RowDescriptor, TransactionEndCallback,
	TransactionNotifier,
};
pub use error::{Error, ErrorKind, Result};
pub use registry::{CursorId, CursorState, Registry};
pub use rewrite::{RewrittenQuery, rewrite};
pub use types::{Datum, TypeCategory, TypeId, TypeInfo, TypedValue, VARHDRSZ};
