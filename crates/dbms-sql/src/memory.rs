//! Scripted in-process collaborators.
//!
//! [`MemoryBackend`] answers statements from result sets registered up front,
//! which makes the full cursor life cycle usable without a database server.

use std::collections::{HashMap, VecDeque};
use std::mem;

use tracing::debug;

use crate::catalog::{BuiltinCatalog, TypeCatalog};
use crate::engine::{
	Backend, ColumnDesc, Param, QueryEngine, Row, RowDescriptor, TransactionEndCallback,
	TransactionNotifier,
};
use crate::error::{Error, Result};
use crate::types::Datum;

/// Rows a scripted statement produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
	pub descriptor: RowDescriptor,
	pub rows: Vec<Row>,
}

impl ResultSet {
	#[must_use]
	pub const fn new(columns: Vec<ColumnDesc>) -> Self {
		Self { descriptor: RowDescriptor::new(columns), rows: Vec::new() }
	}

	#[must_use]
	pub fn row(mut self, values: Vec<Option<Datum>>) -> Self {
		self.rows.push(values);
		self
	}

	#[must_use]
	pub fn rows(mut self, rows: impl IntoIterator<Item = Row>) -> Self {
		self.rows.extend(rows);
		self
	}
}

pub type QueryHandler = Box<dyn Fn(&[Param]) -> Result<ResultSet>>;

/// An engine cursor opened through [`MemoryEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedCursor {
	pub name: String,
	pub sql: String,
	pub params: Vec<Param>,
}

#[derive(Default)]
pub struct MemoryEngine {
	handlers: HashMap<String, QueryHandler>,
	open: HashMap<String, VecDeque<Row>>,
	opened: Vec<OpenedCursor>,
	fetch_calls: usize,
}

impl MemoryEngine {
	/// Answers `sql` by calling `handler` with the statement's parameters.
	pub fn on_query(
		&mut self,
		sql: impl Into<String>,
		handler: impl Fn(&[Param]) -> Result<ResultSet> + 'static,
	) {
		self.handlers.insert(sql.into(), Box::new(handler));
	}

	/// Answers `sql` with the same rows every time.
	pub fn on_query_rows(&mut self, sql: impl Into<String>, result: ResultSet) {
		self.on_query(sql, move |_| Ok(result.clone()));
	}

	/// Every open request so far, oldest first.
	#[must_use]
	pub fn opened(&self) -> &[OpenedCursor] {
		&self.opened
	}

	#[must_use]
	pub fn is_open(&self, name: &str) -> bool {
		self.open.contains_key(name)
	}

	#[must_use]
	pub fn open_count(&self) -> usize {
		self.open.len()
	}

	/// Number of fetch round trips served.
	#[must_use]
	pub const fn fetch_calls(&self) -> usize {
		self.fetch_calls
	}

	fn close_all(&mut self) {
		self.open.clear();
	}
}

impl QueryEngine for MemoryEngine {
	fn open_cursor(&mut self, name: &str, sql: &str, params: &[Param]) -> Result<RowDescriptor> {
		if self.open.contains_key(name) {
			return Err(Error::engine(format!("cursor \"{name}\" already exists")));
		}
		let handler = self
			.handlers
			.get(sql)
			.ok_or_else(|| Error::engine(format!("no result registered for \"{sql}\"")))?;
		let result = handler(params)?;

		debug!(cursor = name, sql, rows = result.rows.len(), "memory cursor opened");
		self.open.insert(name.to_string(), result.rows.into());
		self.opened.push(OpenedCursor {
			name: name.to_string(),
			sql: sql.to_string(),
			params: params.to_vec(),
		});
		Ok(result.descriptor)
	}

	fn fetch(&mut self, name: &str, count: usize) -> Result<Vec<Row>> {
		let rows = self
			.open
			.get_mut(name)
			.ok_or_else(|| Error::engine(format!("cursor \"{name}\" does not exist")))?;
		self.fetch_calls += 1;
		let take = count.min(rows.len());
		Ok(rows.drain(..take).collect())
	}

	fn close_cursor(&mut self, name: &str) -> Result<()> {
		self.open
			.remove(name)
			.map(|_| ())
			.ok_or_else(|| Error::engine(format!("cursor \"{name}\" does not exist")))
	}
}

/// Transaction boundary driven by the caller.
#[derive(Default)]
pub struct MemoryTransactions {
	callbacks: Vec<TransactionEndCallback>,
	ended: u64,
}

impl MemoryTransactions {
	/// Callbacks waiting for the current transaction to end.
	#[must_use]
	pub fn pending(&self) -> usize {
		self.callbacks.len()
	}

	#[must_use]
	pub const fn ended(&self) -> u64 {
		self.ended
	}

	fn end(&mut self) {
		for callback in mem::take(&mut self.callbacks) {
			callback();
		}
		self.ended += 1;
	}
}

impl TransactionNotifier for MemoryTransactions {
	fn on_transaction_end(&mut self, callback: TransactionEndCallback) {
		self.callbacks.push(callback);
	}
}

/// Catalog, engine and transaction boundary in one place.
#[derive(Default)]
pub struct MemoryBackend {
	pub catalog: BuiltinCatalog,
	pub engine: MemoryEngine,
	pub transactions: MemoryTransactions,
}

impl MemoryBackend {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Commits the current transaction: end callbacks run, then every engine
	/// cursor is closed.
	pub fn end_transaction(&mut self) {
		debug!(pending = self.transactions.pending(), "ending transaction");
		self.transactions.end();
		self.engine.close_all();
	}
}

impl Backend for MemoryBackend {
	fn catalog(&self) -> &dyn TypeCatalog {
		&self.catalog
	}

	fn engine(&mut self) -> &mut dyn QueryEngine {
		&mut self.engine
	}

	fn transactions(&mut self) -> &mut dyn TransactionNotifier {
		&mut self.transactions
	}
}
