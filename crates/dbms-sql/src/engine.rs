use crate::catalog::TypeCatalog;
use crate::error::Result;
use crate::types::{Datum, TypeId};

/// One positional parameter of a rewritten statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
	pub type_id: TypeId,
	pub value: Option<Datum>,
}

impl Param {
	#[must_use]
	pub const fn is_null(&self) -> bool {
		self.value.is_none()
	}
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnDesc {
	pub name: String,
	pub type_id: TypeId,
	pub typmod: i32,
	/// Dropped columns keep their attribute slot but carry no data.
	pub dropped: bool,
}

impl ColumnDesc {
	pub fn new(name: impl Into<String>, type_id: TypeId) -> Self {
		Self { name: name.into(), type_id, typmod: -1, dropped: false }
	}

	#[must_use]
	pub const fn with_typmod(mut self, typmod: i32) -> Self {
		self.typmod = typmod;
		self
	}

	#[must_use]
	pub const fn dropped(mut self) -> Self {
		self.dropped = true;
		self
	}
}

/// Shape of the rows an engine cursor produces.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RowDescriptor {
	pub columns: Vec<ColumnDesc>,
}

impl RowDescriptor {
	#[must_use]
	pub const fn new(columns: Vec<ColumnDesc>) -> Self {
		Self { columns }
	}

	#[must_use]
	pub fn live_count(&self) -> usize {
		self.columns.iter().filter(|c| !c.dropped).count()
	}

	/// Live columns paired with their attribute index in a [`Row`].
	pub fn live_columns(&self) -> impl Iterator<Item = (usize, &ColumnDesc)> {
		self.columns.iter().enumerate().filter(|(_, c)| !c.dropped)
	}
}

/// Values in [`RowDescriptor`] attribute order, dropped attributes included.
pub type Row = Vec<Option<Datum>>;

/// The SQL engine that plans and runs rewritten statements.
pub trait QueryEngine {
	/// Opens a server-side cursor called `name` over `sql`, whose `$n` markers refer to
	/// `params[n - 1]`.
	fn open_cursor(&mut self, name: &str, sql: &str, params: &[Param]) -> Result<RowDescriptor>;

	/// Returns up to `count` further rows; fewer means the cursor is drained.
	fn fetch(&mut self, name: &str, count: usize) -> Result<Vec<Row>>;

	fn close_cursor(&mut self, name: &str) -> Result<()>;
}

/// Callback run once when the enclosing transaction ends.
pub type TransactionEndCallback = Box<dyn FnOnce()>;

/// Notifies about the end of the ambient transaction.
pub trait TransactionNotifier {
	/// Registers `callback` against the current transaction; it is invoked exactly once
	/// when that transaction ends.
	fn on_transaction_end(&mut self, callback: TransactionEndCallback);
}

/// Access to every collaborator the registry talks to.
pub trait Backend {
	fn catalog(&self) -> &dyn TypeCatalog;
	fn engine(&mut self) -> &mut dyn QueryEngine;
	fn transactions(&mut self) -> &mut dyn TransactionNotifier;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn live_columns_skip_dropped_attributes() {
		let desc = RowDescriptor::new(vec![
			ColumnDesc::new("a", TypeId::INT4),
			ColumnDesc::new("gone", TypeId::TEXT).dropped(),
			ColumnDesc::new("b", TypeId::TEXT),
		]);

		assert_eq!(desc.live_count(), 2);
		let live: Vec<_> = desc.live_columns().map(|(i, c)| (i, c.name.as_str())).collect();
		assert_eq!(live, vec![(0, "a"), (2, "b")]);
	}
}
