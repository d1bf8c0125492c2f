use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;

use crate::engine::Param;
use crate::registry::{CursorId, CursorState};
use crate::rewrite::RewrittenQuery;
use crate::scope::TransactionScope;
use crate::types::{Datum, TypeId, TypeInfo};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Statement {
	pub original: String,
	pub parsed: String,
}

/// Value assigned to a bind variable, stored in the variable's base type.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
	pub type_id: TypeId,
	pub value: Option<Datum>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
	pub name: String,
	/// 1-based `$n` marker in the parsed statement.
	pub ordinal: usize,
	pub binding: Option<Binding>,
}

impl Variable {
	/// Replaces the binding; returns true if one was already present.
	pub fn bind(&mut self, info: &TypeInfo, value: Option<Datum>) -> bool {
		let previous = self.binding.replace(Binding { type_id: info.id, value });
		previous.is_some()
	}
}

/// Bind variables of the parsed statement, in ordinal order.
#[derive(Debug, Default)]
pub struct BindTable {
	variables: IndexMap<String, Variable>,
}

impl BindTable {
	pub fn from_query(query: &RewrittenQuery) -> Self {
		let variables = query
			.variables
			.iter()
			.enumerate()
			.map(|(index, name)| {
				(name.clone(), Variable { name: name.clone(), ordinal: index + 1, binding: None })
			})
			.collect();
		Self { variables }
	}

	pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
		self.variables.get_mut(name)
	}

	pub fn first_unbound(&self) -> Option<&Variable> {
		self.variables.values().find(|v| v.binding.is_none())
	}

	/// Engine parameters in ordinal order. Unbound variables become untyped nulls.
	pub fn params(&self) -> Vec<Param> {
		self.variables
			.values()
			.map(|v| match &v.binding {
				Some(binding) => Param { type_id: binding.type_id, value: binding.value.clone() },
				None => Param { type_id: TypeId::UNKNOWN, value: None },
			})
			.collect()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Variable> {
		self.variables.values()
	}
}

/// Declared result column.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ColumnDef {
	pub position: usize,
	/// Type as declared, possibly a domain.
	pub type_id: TypeId,
	/// Non-domain type underneath `type_id`.
	pub base: TypeId,
	pub typmod: i32,
}

impl ColumnDef {
	#[must_use]
	pub fn is_domain(&self) -> bool {
		self.type_id != self.base
	}
}

#[derive(Debug, Default)]
pub struct ColumnTable {
	columns: BTreeMap<usize, ColumnDef>,
}

impl ColumnTable {
	/// Stores `def` at its position; returns true if it replaced a definition.
	pub fn define(&mut self, def: ColumnDef) -> bool {
		self.columns.insert(def.position, def).is_some()
	}

	pub fn get(&self, position: usize) -> Option<&ColumnDef> {
		self.columns.get(&position)
	}

	pub fn max_position(&self) -> usize {
		self.columns.last_key_value().map_or(0, |(position, _)| *position)
	}

	/// Lowest position in `1..=max_position` without a definition.
	pub fn first_gap(&self) -> Option<usize> {
		(1..=self.max_position()).find(|position| !self.columns.contains_key(position))
	}

	pub fn iter(&self) -> impl Iterator<Item = &ColumnDef> {
		self.columns.values()
	}

	pub fn len(&self) -> usize {
		self.columns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.columns.is_empty()
	}
}

/// State owned by one open cursor slot.
#[derive(Debug)]
pub struct Cursor {
	pub id: CursorId,
	pub statement: Option<Statement>,
	pub binds: BindTable,
	pub columns: ColumnTable,
	pub execution: Option<TransactionScope>,
}

impl Cursor {
	pub fn new(id: CursorId) -> Self {
		Self {
			id,
			statement: None,
			binds: BindTable::default(),
			columns: ColumnTable::default(),
			execution: None,
		}
	}

	pub fn state(&self) -> CursorState {
		if self.statement.is_none() {
			return CursorState::Open;
		}
		match &self.execution {
			Some(scope) if scope.is_executed() => CursorState::Executed,
			_ => CursorState::Parsed,
		}
	}

	/// Drops the statement and everything derived from it. Returns the engine
	/// cursor that is still open, if any.
	pub fn reset(&mut self) -> Option<String> {
		self.statement = None;
		self.binds = BindTable::default();
		self.columns = ColumnTable::default();
		self.release_execution()
	}

	pub fn release_execution(&mut self) -> Option<String> {
		self.execution.take().and_then(|scope| scope.release()).and_then(|exec| exec.portal)
	}

	/// The live execution scope, if the transaction that created it is still running.
	pub fn live_scope(&self) -> Option<&TransactionScope> {
		self.execution.as_ref().filter(|scope| scope.is_alive())
	}
}

/// How a bind variable shows up in [`CursorDebug`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BindState {
	Unassigned,
	Null,
	Value(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VariableDebug {
	pub name: String,
	pub ordinal: usize,
	pub state: BindState,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnDebug {
	pub position: usize,
	pub type_name: String,
}

/// Snapshot of a cursor slot for diagnostics.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CursorDebug {
	pub cursor: CursorId,
	pub state: CursorState,
	pub original_query: Option<String>,
	pub parsed_query: Option<String>,
	pub variables: Vec<VariableDebug>,
	pub columns: Vec<ColumnDebug>,
	pub rows_buffered: u64,
	pub rows_consumed: u64,
}

impl CursorDebug {
	pub const fn unassigned(cursor: CursorId) -> Self {
		Self {
			cursor,
			state: CursorState::Free,
			original_query: None,
			parsed_query: None,
			variables: Vec::new(),
			columns: Vec::new(),
			rows_buffered: 0,
			rows_consumed: 0,
		}
	}
}

impl fmt::Display for CursorDebug {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.state == CursorState::Free {
			return write!(f, "cursor is not assigned");
		}

		writeln!(f, "cursor {} is {}", self.cursor, self.state)?;
		match (&self.original_query, &self.parsed_query) {
			(Some(original), Some(parsed)) => {
				writeln!(f, "orig query: \"{original}\"")?;
				writeln!(f, "parsed query: \"{parsed}\"")?;
			}
			_ => writeln!(f, "no query is associated with cursor")?,
		}

		for variable in &self.variables {
			match &variable.state {
				BindState::Unassigned => {
					writeln!(f, "variable \"{}\" is not assigned", variable.name)?;
				}
				BindState::Null => writeln!(f, "variable \"{}\" is assigned to NULL", variable.name)?,
				BindState::Value(text) => {
					writeln!(f, "variable \"{}\" is assigned to \"{text}\"", variable.name)?;
				}
			}
		}

		for column in &self.columns {
			writeln!(f, "column definition for position {} is {}", column.position, column.type_name)?;
		}

		if self.state == CursorState::Executed {
			write!(f, "rows buffered: {}, rows consumed: {}", self.rows_buffered, self.rows_consumed)?;
		}
		Ok(())
	}
}
