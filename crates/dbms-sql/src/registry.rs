use std::fmt;

use tracing::{debug, info, warn};

use crate::cast::CastEntry;
use crate::catalog::TypeCatalog;
use crate::config::RegistryConfig;
use crate::cursor::{
	BindState, BindTable, ColumnDebug, ColumnDef, Cursor, CursorDebug, Statement, VariableDebug,
};
use crate::engine::{Backend, ColumnDesc};
use crate::error::{Error, Result};
use crate::rewrite::{normalize_name, rewrite};
use crate::scope::{Execution, TransactionScope};
use crate::types::{Datum, TypeCategory, TypeId, TypeInfo, TypedValue, VARHDRSZ};

/// Handle to a cursor slot. Stale once the slot is closed and reused.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CursorId {
	index: u32,
	generation: u32,
}

impl CursorId {
	pub(crate) const fn new(index: u32, generation: u32) -> Self {
		Self { index, generation }
	}

	#[must_use]
	pub const fn index(self) -> u32 {
		self.index
	}

	#[must_use]
	pub const fn generation(self) -> u32 {
		self.generation
	}

	const fn slot(self) -> usize {
		self.index as usize
	}
}

impl fmt::Display for CursorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.index)
	}
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CursorState {
	Free,
	Open,
	Parsed,
	Executed,
}

impl fmt::Display for CursorState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Free => "free",
			Self::Open => "open",
			Self::Parsed => "parsed",
			Self::Executed => "executed",
		})
	}
}

#[derive(Debug, Default)]
struct Slot {
	generation: u32,
	cursor: Option<Cursor>,
}

/// Fixed-capacity pool of dynamic SQL cursors.
///
/// ```
/// use dbms_sql::memory::{MemoryBackend, ResultSet};
/// use dbms_sql::{ColumnDesc, Datum, Registry, TypeId, TypedValue};
///
/// let mut backend = MemoryBackend::new();
/// backend.engine.on_query_rows(
/// 	"select $1 * 2",
/// 	ResultSet::new(vec![ColumnDesc::new("doubled", TypeId::INT4)])
/// 		.row(vec![Some(Datum::Int4(42))]),
/// );
///
/// let mut registry = Registry::default();
/// let cursor = registry.open_cursor()?;
/// registry.parse(cursor, Some("select :n * 2"), &mut backend)?;
/// registry.bind_variable(cursor, Some("n"), TypedValue::int4(21), &backend)?;
/// registry.define_column(cursor, Some(1), TypeId::INT4, Some(-1), &backend)?;
/// registry.execute(cursor, &mut backend)?;
/// assert_eq!(registry.fetch_rows(cursor, &mut backend)?, 1);
/// assert_eq!(
/// 	registry.column_value(cursor, Some(1), TypeId::INT4, &backend)?,
/// 	Some(Datum::Int4(42))
/// );
/// registry.close_cursor(cursor, &mut backend)?;
/// # Ok::<(), dbms_sql::Error>(())
/// ```
#[derive(Debug)]
pub struct Registry {
	config: RegistryConfig,
	slots: Vec<Slot>,
}

impl Default for Registry {
	fn default() -> Self {
		Self::build(RegistryConfig::default())
	}
}

impl Registry {
	pub fn new(config: RegistryConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self::build(config))
	}

	fn build(config: RegistryConfig) -> Self {
		let slots = (0..config.max_cursors).map(|_| Slot::default()).collect();
		Self { config, slots }
	}

	#[must_use]
	pub const fn config(&self) -> &RegistryConfig {
		&self.config
	}

	#[must_use]
	pub fn capacity(&self) -> usize {
		self.slots.len()
	}

	#[must_use]
	pub fn open_count(&self) -> usize {
		self.slots.iter().filter(|slot| slot.cursor.is_some()).count()
	}

	fn slot(&self, id: CursorId) -> Result<&Slot> {
		self.slots.get(id.slot()).ok_or(Error::CursorOutOfRange { index: id.index })
	}

	fn cursor(&self, id: CursorId) -> Result<&Cursor> {
		let slot = self.slot(id)?;
		match &slot.cursor {
			Some(cursor) if slot.generation == id.generation => Ok(cursor),
			_ => Err(Error::CursorNotOpen { cursor: id }),
		}
	}

	fn cursor_mut(&mut self, id: CursorId) -> Result<&mut Cursor> {
		let slot =
			self.slots.get_mut(id.slot()).ok_or(Error::CursorOutOfRange { index: id.index })?;
		match &mut slot.cursor {
			Some(cursor) if slot.generation == id.generation => Ok(cursor),
			_ => Err(Error::CursorNotOpen { cursor: id }),
		}
	}

	fn portal_name(&self, id: CursorId) -> String {
		format!("{}_{}", self.config.cursor_name_prefix, id.index)
	}

	/// True if `id` refers to an open cursor.
	#[must_use]
	pub fn is_open(&self, id: CursorId) -> bool {
		self.cursor(id).is_ok()
	}

	/// Claims the lowest free slot.
	pub fn open_cursor(&mut self) -> Result<CursorId> {
		let capacity = self.slots.len();
		let (index, slot) = self
			.slots
			.iter_mut()
			.enumerate()
			.find(|(_, slot)| slot.cursor.is_none())
			.ok_or(Error::PoolExhausted { capacity })?;
		let index = u32::try_from(index).map_err(|_| Error::PoolExhausted { capacity })?;

		slot.generation = slot.generation.wrapping_add(1);
		let id = CursorId::new(index, slot.generation);
		slot.cursor = Some(Cursor::new(id));
		debug!(cursor = %id, generation = id.generation, "cursor opened");
		Ok(id)
	}

	/// Releases the slot and every resource of the cursor. Closing a free slot
	/// is a no-op.
	pub fn close_cursor<B: Backend + ?Sized>(&mut self, id: CursorId, backend: &mut B) -> Result<()> {
		let slot =
			self.slots.get_mut(id.slot()).ok_or(Error::CursorOutOfRange { index: id.index })?;
		if slot.generation != id.generation {
			return Ok(());
		}
		let Some(mut cursor) = slot.cursor.take() else {
			return Ok(());
		};

		if let Some(portal) = cursor.release_execution() {
			if let Err(err) = backend.engine().close_cursor(&portal) {
				warn!(cursor = %id, portal = %portal, error = %err, "failed to close engine cursor");
			}
		}
		debug!(cursor = %id, "cursor closed");
		Ok(())
	}

	/// Closes every open cursor.
	pub fn close_all<B: Backend + ?Sized>(&mut self, backend: &mut B) -> Result<()> {
		let open: Vec<CursorId> =
			self.slots.iter().filter_map(|slot| slot.cursor.as_ref().map(|c| c.id)).collect();
		for id in open {
			self.close_cursor(id, backend)?;
		}
		Ok(())
	}

	/// Associates a statement with the cursor, discarding any previous one with
	/// its bindings, column definitions and execution.
	pub fn parse<B: Backend + ?Sized>(
		&mut self,
		id: CursorId,
		sql: Option<&str>,
		backend: &mut B,
	) -> Result<()> {
		let cursor = self.cursor_mut(id)?;
		let sql = sql.ok_or(Error::NullArgument { what: "parsed query" })?;

		let stale_portal = cursor.reset();
		let rewritten = rewrite(sql);
		cursor.binds = BindTable::from_query(&rewritten);
		debug!(
			cursor = %id,
			variables = rewritten.variables.len(),
			parsed = %rewritten.sql,
			"statement parsed"
		);
		cursor.statement = Some(Statement { original: sql.to_string(), parsed: rewritten.sql });

		if let Some(portal) = stale_portal {
			if let Err(err) = backend.engine().close_cursor(&portal) {
				warn!(cursor = %id, portal = %portal, error = %err, "failed to close engine cursor");
			}
		}
		Ok(())
	}

	/// Assigns a value to the placeholder `name`, with or without its leading colon.
	pub fn bind_variable<B: Backend + ?Sized>(
		&mut self,
		id: CursorId,
		name: Option<&str>,
		value: TypedValue,
		backend: &B,
	) -> Result<()> {
		let catalog = backend.catalog();
		let cursor = self.cursor_mut(id)?;
		require_parsed(cursor, "bind a variable to")?;

		let name = name.ok_or(Error::NullArgument { what: "name" })?;
		let name = normalize_name(name.strip_prefix(':').unwrap_or(name));
		let variable =
			cursor.binds.get_mut(&name).ok_or_else(|| Error::UnknownVariable { name: name.clone() })?;

		let info = scalar_base_type(catalog, value.type_id, "bind variable")?;
		if variable.bind(&info, value.datum) {
			warn!(cursor = %id, variable = %name, "bind variable is assigned already");
		}
		debug!(cursor = %id, variable = %name, type_name = %info.name, "variable bound");
		Ok(())
	}

	/// Declares result column `position` as `witness`'s type. `size` bounds string
	/// types; -1 leaves them unconstrained.
	pub fn define_column<B: Backend + ?Sized>(
		&mut self,
		id: CursorId,
		position: Option<i32>,
		witness: TypeId,
		size: Option<i32>,
		backend: &B,
	) -> Result<()> {
		let catalog = backend.catalog();
		let cursor = self.cursor_mut(id)?;
		require_parsed(cursor, "define a column of")?;

		let raw_position = position.ok_or(Error::NullArgument { what: "position" })?;
		let position = usize::try_from(raw_position)
			.ok()
			.filter(|p| *p >= 1)
			.ok_or(Error::InvalidPosition { position: raw_position })?;
		let size = size.ok_or(Error::NullArgument { what: "size" })?;

		let info = scalar_base_type(catalog, witness, "column")?;
		let declared = if catalog.base_type(witness)?.0 == info.id { witness } else { info.id };
		let typmod = if info.category == TypeCategory::String && size >= 0 {
			size.saturating_add(VARHDRSZ)
		} else {
			-1
		};

		let def = ColumnDef { position, type_id: declared, base: info.id, typmod };
		let replaced = cursor.columns.define(def);
		if replaced {
			warn!(cursor = %id, position, "column is defined already");
			if let Some(scope) = cursor.live_scope() {
				scope.with(|execution| execution.casts.invalidate(position));
			}
		}
		debug!(
			cursor = %id,
			position,
			type_name = %catalog.format_type(declared, typmod),
			domain = def.is_domain(),
			"column defined"
		);
		Ok(())
	}

	/// Opens the statement in the engine with the current bindings. Always
	/// returns 0.
	pub fn execute<B: Backend + ?Sized>(&mut self, id: CursorId, backend: &mut B) -> Result<i64> {
		let portal = self.portal_name(id);
		let cursor = self.cursor_mut(id)?;
		let sql = match &cursor.statement {
			Some(statement) => statement.parsed.clone(),
			None => return Err(invalid_state(cursor, "execute")),
		};

		if cursor.columns.is_empty() {
			return Err(Error::NoColumnsDefined { cursor: id });
		}
		if let Some(position) = cursor.columns.first_gap() {
			return Err(Error::UndefinedColumn { position });
		}
		if let Some(variable) = cursor.binds.first_unbound() {
			return Err(Error::UnboundVariable { name: variable.name.clone() });
		}
		let params = cursor.binds.params();
		let declared = cursor.columns.len();

		let previous = match cursor.live_scope() {
			Some(scope) => scope.with(Execution::reset).flatten(),
			None => {
				cursor.execution = Some(TransactionScope::begin(backend.transactions(), id));
				None
			}
		};
		if let Some(previous) = previous {
			backend.engine().close_cursor(&previous)?;
		}

		let descriptor = backend.engine().open_cursor(&portal, &sql, &params)?;
		let actual = descriptor.live_count();
		if actual != declared {
			if let Err(err) = backend.engine().close_cursor(&portal) {
				warn!(cursor = %id, portal = %portal, error = %err, "failed to close engine cursor");
			}
			return Err(Error::ColumnCountMismatch { declared, actual });
		}

		let started = cursor
			.execution
			.as_ref()
			.and_then(|scope| scope.with(|execution| execution.start(portal.clone(), &descriptor)));
		if started.is_none() {
			return Err(invalid_state(cursor, "execute"));
		}
		debug!(cursor = %id, portal = %portal, params = params.len(), columns = actual, "cursor executed");
		Ok(0)
	}

	/// Advances to the next row. Returns 1 if a row is available, 0 once the
	/// result is drained, and 0 on every call after that.
	pub fn fetch_rows<B: Backend + ?Sized>(&mut self, id: CursorId, backend: &mut B) -> Result<u32> {
		let batch_size = self.config.batch_size;
		let cursor = self.cursor_mut(id)?;
		let Some(scope) = executed_scope(cursor) else {
			return Err(invalid_state(cursor, "fetch from"));
		};

		let pending = scope
			.with(|execution| {
				if execution.fetch.needs_batch() { execution.portal.clone() } else { None }
			})
			.flatten();
		if let Some(portal) = pending {
			let rows = backend.engine().fetch(&portal, batch_size)?;
			debug!(cursor = %id, rows = rows.len(), "fetched batch");
			if scope.with(|execution| execution.fetch.install(rows, batch_size)).is_none() {
				return Err(invalid_state(cursor, "fetch from"));
			}
		}

		match scope.with(|execution| execution.fetch.advance()) {
			Some(advanced) => Ok(u32::from(advanced)),
			None => Err(invalid_state(cursor, "fetch from")),
		}
	}

	/// Runs the statement and moves to its first row.
	pub fn execute_and_fetch<B: Backend + ?Sized>(
		&mut self,
		id: CursorId,
		backend: &mut B,
	) -> Result<u32> {
		self.execute(id, backend)?;
		self.fetch_rows(id, backend)
	}

	/// Reads column `position` of the current row as `witness`'s type.
	/// [`TypeId::UNKNOWN`] and the column's base type read it as the declared
	/// type, so a column declared as a domain is always checked against it.
	pub fn column_value<B: Backend + ?Sized>(
		&self,
		id: CursorId,
		position: Option<i32>,
		witness: TypeId,
		backend: &B,
	) -> Result<Option<Datum>> {
		let catalog = backend.catalog();
		let cursor = self.cursor(id)?;

		let raw_position = position.ok_or(Error::NullArgument { what: "position" })?;
		let max = cursor.columns.max_position();
		let position = usize::try_from(raw_position)
			.ok()
			.filter(|p| (1..=max).contains(p))
			.ok_or(Error::ColumnOutOfRange { position: raw_position, max })?;

		let Some(scope) = executed_scope(cursor) else {
			return Err(invalid_state(cursor, "read a column of"));
		};
		let column = cursor.columns.get(position).ok_or(Error::UndefinedColumn { position })?;

		let target = if witness == TypeId::UNKNOWN || witness == column.base {
			column.type_id
		} else {
			witness
		};
		let (target_base, _) = catalog.base_type(target)?;
		if target_base != column.base {
			return Err(Error::TypeMismatch {
				requested: catalog.format_type(target, -1),
				defined: catalog.format_type(column.type_id, column.typmod),
			});
		}

		let read = scope.with(|execution| {
			let row = execution.fetch.current_row().ok_or(Error::NoRowFetched { cursor: id })?;
			let live =
				execution.columns.get(position - 1).ok_or(Error::UndefinedColumn { position })?;
			let value = row.get(live.attno).cloned().flatten();
			let entry =
				execution.casts.get_or_resolve(position, target, column.typmod, || {
					CastEntry::resolve(
						catalog,
						live.desc.type_id,
						live.desc.typmod,
						target,
						column.typmod,
					)
				})?;
			entry.apply(catalog, value)
		});
		read.unwrap_or_else(|| Err(invalid_state(cursor, "read a column of")))
	}

	/// Rows handed out by [`Registry::fetch_rows`] since the last execute.
	pub fn last_row_count(&self, id: CursorId) -> Result<u64> {
		let cursor = self.cursor(id)?;
		Ok(cursor
			.live_scope()
			.and_then(|scope| scope.with(|execution| execution.fetch.consumed()))
			.unwrap_or(0))
	}

	/// Live columns of the executed statement as the engine reports them.
	pub fn describe_columns(&self, id: CursorId) -> Result<Vec<ColumnDesc>> {
		let cursor = self.cursor(id)?;
		let Some(scope) = executed_scope(cursor) else {
			return Err(invalid_state(cursor, "describe the columns of"));
		};
		scope
			.with(|execution| execution.columns.iter().map(|live| live.desc.clone()).collect())
			.ok_or_else(|| invalid_state(cursor, "describe the columns of"))
	}

	/// Snapshot of the slot, also written to the log.
	pub fn debug_cursor<B: Backend + ?Sized>(&self, id: CursorId, backend: &B) -> Result<CursorDebug> {
		let slot = self.slot(id)?;
		let cursor = match &slot.cursor {
			Some(cursor) if slot.generation == id.generation => cursor,
			_ => {
				let snapshot = CursorDebug::unassigned(id);
				info!(cursor = %id, "{snapshot}");
				return Ok(snapshot);
			}
		};

		let catalog = backend.catalog();
		let variables = cursor
			.binds
			.iter()
			.map(|variable| -> Result<VariableDebug> {
				let state = match &variable.binding {
					None => BindState::Unassigned,
					Some(binding) => match &binding.value {
						None => BindState::Null,
						Some(datum) => BindState::Value(catalog.output(binding.type_id, datum)?),
					},
				};
				Ok(VariableDebug { name: variable.name.clone(), ordinal: variable.ordinal, state })
			})
			.collect::<Result<Vec<_>>>()?;
		let columns = cursor
			.columns
			.iter()
			.map(|column| ColumnDebug {
				position: column.position,
				type_name: catalog.format_type(column.type_id, column.typmod),
			})
			.collect();
		let (rows_buffered, rows_consumed) = cursor
			.live_scope()
			.and_then(|scope| {
				scope.with(|execution| (execution.fetch.buffered(), execution.fetch.consumed()))
			})
			.unwrap_or((0, 0));

		let snapshot = CursorDebug {
			cursor: id,
			state: cursor.state(),
			original_query: cursor.statement.as_ref().map(|s| s.original.clone()),
			parsed_query: cursor.statement.as_ref().map(|s| s.parsed.clone()),
			variables,
			columns,
			rows_buffered,
			rows_consumed,
		};
		info!(cursor = %id, "{snapshot}");
		Ok(snapshot)
	}
}

fn invalid_state(cursor: &Cursor, operation: &'static str) -> Error {
	Error::InvalidState { cursor: cursor.id, operation, state: cursor.state() }
}

fn require_parsed(cursor: &Cursor, operation: &'static str) -> Result<()> {
	if cursor.statement.is_none() {
		return Err(invalid_state(cursor, operation));
	}
	Ok(())
}

fn executed_scope(cursor: &Cursor) -> Option<&TransactionScope> {
	cursor.execution.as_ref().filter(|scope| scope.is_executed())
}

/// Resolves `type_id` to its non-domain base, rejecting row types. Values of
/// unknown type are treated as text.
fn scalar_base_type(
	catalog: &dyn TypeCatalog,
	type_id: TypeId,
	what: &'static str,
) -> Result<TypeInfo> {
	let info = catalog.type_info(type_id)?;
	if info.is_row_type() {
		return Err(Error::RowType { what, type_name: info.name });
	}
	let (base, _) = catalog.base_type(type_id)?;
	let base = if base == TypeId::UNKNOWN { TypeId::TEXT } else { base };
	if base == info.id { Ok(info) } else { catalog.type_info(base) }
}
