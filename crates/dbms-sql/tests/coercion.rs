use dbms_sql::memory::{MemoryBackend, ResultSet};
use dbms_sql::{
	ColumnDesc, CursorId, Datum, DomainDef, Error, ErrorKind, Registry, Result, TypeId, TypedValue,
};

/// Runs `sql` against a one-row result and fetches that row, with each
/// `(witness, size)` pair defined at consecutive positions.
fn fetched(
	backend: &mut MemoryBackend,
	registry: &mut Registry,
	sql: &str,
	columns: &[(TypeId, i32)],
) -> CursorId {
	let cursor = registry.open_cursor().expect("open cursor");
	registry.parse(cursor, Some(sql), backend).expect("parse");
	for (position, (witness, size)) in (1..).zip(columns) {
		registry
			.define_column(cursor, Some(position), *witness, Some(*size), &*backend)
			.expect("define column");
	}
	assert_eq!(registry.execute_and_fetch(cursor, backend).expect("run"), 1);
	cursor
}

fn read(
	registry: &Registry,
	backend: &MemoryBackend,
	cursor: CursorId,
	position: i32,
	witness: TypeId,
) -> Result<Option<Datum>> {
	registry.column_value(cursor, Some(position), witness, backend)
}

fn mixed_row() -> ResultSet {
	ResultSet::new(vec![
		ColumnDesc::new("small", TypeId::INT2),
		ColumnDesc::new("big", TypeId::INT8),
		ColumnDesc::new("ratio", TypeId::FLOAT8),
		ColumnDesc::new("label", TypeId::TEXT),
		ColumnDesc::new("missing", TypeId::INT4),
	])
	.row(vec![
		Some(Datum::Int2(3)),
		Some(Datum::Int8(40_000)),
		Some(Datum::Float8(2.5)),
		Some(Datum::Text("217".to_string())),
		None,
	])
}

#[test]
fn values_are_coerced_to_declared_types() {
	let mut backend = MemoryBackend::new();
	backend.engine.on_query_rows("select * from mixed", mixed_row());
	let mut registry = Registry::default();
	let cursor = fetched(
		&mut backend,
		&mut registry,
		"select * from mixed",
		&[
			(TypeId::INT8, -1),
			(TypeId::INT4, -1),
			(TypeId::TEXT, -1),
			(TypeId::INT4, -1),
			(TypeId::INT4, -1),
		],
	);

	assert_eq!(read(&registry, &backend, cursor, 1, TypeId::INT8).expect("widen"), Some(Datum::Int8(3)));
	assert_eq!(
		read(&registry, &backend, cursor, 2, TypeId::INT4).expect("narrow"),
		Some(Datum::Int4(40_000))
	);
	assert_eq!(
		read(&registry, &backend, cursor, 3, TypeId::TEXT).expect("print"),
		Some(Datum::Text("2.5".to_string()))
	);
	assert_eq!(
		read(&registry, &backend, cursor, 4, TypeId::INT4).expect("parse text"),
		Some(Datum::Int4(217))
	);
	assert_eq!(read(&registry, &backend, cursor, 5, TypeId::INT4).expect("null"), None);
}

#[test]
fn conversion_failures_surface_on_read() {
	let mut backend = MemoryBackend::new();
	backend.engine.on_query_rows(
		"select * from odd",
		ResultSet::new(vec![
			ColumnDesc::new("huge", TypeId::INT8),
			ColumnDesc::new("word", TypeId::TEXT),
			ColumnDesc::new("blob", TypeId::BYTEA),
		])
		.row(vec![
			Some(Datum::Int8(i64::from(i32::MAX) + 1)),
			Some(Datum::Text("twelve".to_string())),
			Some(Datum::Bytea(vec![1, 2])),
		]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(
		&mut backend,
		&mut registry,
		"select * from odd",
		&[(TypeId::INT4, -1), (TypeId::INT4, -1), (TypeId::INT4, -1)],
	);

	let err = read(&registry, &backend, cursor, 1, TypeId::INT4).expect_err("out of range");
	assert!(matches!(err, Error::ValueOutOfRange { .. }));
	let err = read(&registry, &backend, cursor, 2, TypeId::INT4).expect_err("not a number");
	assert!(matches!(err, Error::InvalidText { .. }));
	let err = read(&registry, &backend, cursor, 3, TypeId::INT4).expect_err("no pathway");
	assert_eq!(err.kind(), ErrorKind::UnsupportedCast);
	assert_eq!(err.to_string(), "cannot cast type bytea to integer");
}

#[test]
fn string_sizes_apply_length_coercion() {
	let mut backend = MemoryBackend::new();
	backend.engine.on_query_rows(
		"select code, code, code from codes",
		ResultSet::new(vec![
			ColumnDesc::new("code", TypeId::TEXT),
			ColumnDesc::new("code", TypeId::TEXT),
			ColumnDesc::new("code", TypeId::TEXT),
		])
		.row(vec![
			Some(Datum::Text("ABCDEF".to_string())),
			Some(Datum::Text("ABCDEF".to_string())),
			Some(Datum::Text("AB".to_string())),
		]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(
		&mut backend,
		&mut registry,
		"select code, code, code from codes",
		&[(TypeId::VARCHAR, 3), (TypeId::VARCHAR, -1), (TypeId::BPCHAR, 4)],
	);

	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::VARCHAR).expect("truncated"),
		Some(Datum::Text("ABC".to_string()))
	);
	assert_eq!(
		read(&registry, &backend, cursor, 2, TypeId::VARCHAR).expect("unbounded"),
		Some(Datum::Text("ABCDEF".to_string()))
	);
	assert_eq!(
		read(&registry, &backend, cursor, 3, TypeId::BPCHAR).expect("padded"),
		Some(Datum::Text("AB  ".to_string()))
	);
}

#[test]
fn requested_type_must_match_definition() {
	let mut backend = MemoryBackend::new();
	backend.engine.on_query_rows("select * from mixed", mixed_row());
	let mut registry = Registry::default();
	let cursor = fetched(
		&mut backend,
		&mut registry,
		"select * from mixed",
		&[
			(TypeId::INT8, -1),
			(TypeId::INT4, -1),
			(TypeId::TEXT, -1),
			(TypeId::INT4, -1),
			(TypeId::INT4, -1),
		],
	);

	let err = read(&registry, &backend, cursor, 1, TypeId::TEXT).expect_err("text is not bigint");
	assert!(matches!(err, Error::TypeMismatch { .. }));
	assert_eq!(err.kind(), ErrorKind::InvalidInput);
	assert_eq!(err.to_string(), "requested type text does not match column type bigint");

	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::UNKNOWN).expect("defined type"),
		Some(Datum::Int8(3))
	);
}

#[test]
fn unknown_witness_defines_a_text_column() {
	let mut backend = MemoryBackend::new();
	backend.engine.on_query_rows(
		"select 42",
		ResultSet::new(vec![ColumnDesc::new("answer", TypeId::INT4)])
			.row(vec![Some(Datum::Int4(42))]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(&mut backend, &mut registry, "select 42", &[(TypeId::UNKNOWN, -1)]);

	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::UNKNOWN).expect("read as text"),
		Some(Datum::Text("42".to_string()))
	);
	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::TEXT).expect("read as text"),
		Some(Datum::Text("42".to_string()))
	);
}

#[test]
fn domain_witness_enforces_constraints() {
	let mut backend = MemoryBackend::new();
	let positive = backend
		.catalog
		.create_domain(
			DomainDef::new("positive_int", TypeId::INT4)
				.not_null()
				.check("positive_int_check", |value| matches!(value, Datum::Int4(v) if *v > 0)),
		)
		.expect("create domain");
	backend.engine.on_query_rows(
		"select * from balances",
		ResultSet::new(vec![
			ColumnDesc::new("credit", TypeId::INT8),
			ColumnDesc::new("debit", TypeId::INT8),
			ColumnDesc::new("unknown", TypeId::INT8),
		])
		.row(vec![Some(Datum::Int8(5)), Some(Datum::Int8(-5)), None]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(
		&mut backend,
		&mut registry,
		"select * from balances",
		&[(positive, -1), (positive, -1), (positive, -1)],
	);

	assert_eq!(
		read(&registry, &backend, cursor, 1, positive).expect("satisfies check"),
		Some(Datum::Int4(5))
	);
	let err = read(&registry, &backend, cursor, 2, positive).expect_err("violates check");
	assert!(matches!(err, Error::DomainViolation { .. }));
	let err = read(&registry, &backend, cursor, 3, positive).expect_err("violates not null");
	assert!(matches!(err, Error::DomainViolation { .. }));

	let err = read(&registry, &backend, cursor, 2, TypeId::INT4)
		.expect_err("base type still reads as the declared domain");
	assert!(matches!(err, Error::DomainViolation { .. }));
}

#[test]
fn declared_domain_is_checked_on_default_read() {
	let mut backend = MemoryBackend::new();
	let positive = backend
		.catalog
		.create_domain(
			DomainDef::new("positive_int", TypeId::INT4)
				.check("positive_int_check", |value| matches!(value, Datum::Int4(v) if *v > 0)),
		)
		.expect("create domain");
	backend.engine.on_query_rows(
		"select debit, credit from balances",
		ResultSet::new(vec![
			ColumnDesc::new("debit", TypeId::INT4),
			ColumnDesc::new("credit", TypeId::INT4),
		])
		.row(vec![Some(Datum::Int4(-5)), Some(Datum::Int4(7))]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(
		&mut backend,
		&mut registry,
		"select debit, credit from balances",
		&[(positive, -1), (positive, -1)],
	);

	let err = read(&registry, &backend, cursor, 1, TypeId::UNKNOWN).expect_err("violates check");
	assert!(matches!(err, Error::DomainViolation { .. }));
	assert_eq!(
		read(&registry, &backend, cursor, 2, TypeId::UNKNOWN).expect("satisfies check"),
		Some(Datum::Int4(7))
	);

	let text = registry.debug_cursor(cursor, &backend).expect("debug").to_string();
	assert!(text.contains("column definition for position 1 is positive_int"));
}

#[test]
fn declared_domain_typmod_applies() {
	let mut backend = MemoryBackend::new();
	let short = backend
		.catalog
		.create_domain(DomainDef::new("short_code", TypeId::VARCHAR).typmod(2 + 4))
		.expect("create domain");
	backend.engine.on_query_rows(
		"select code from codes",
		ResultSet::new(vec![ColumnDesc::new("code", TypeId::TEXT)])
			.row(vec![Some(Datum::Text("XYZ".to_string()))]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(&mut backend, &mut registry, "select code from codes", &[(short, -1)]);

	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::UNKNOWN).expect("declared type"),
		Some(Datum::Text("XY".to_string()))
	);
	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::VARCHAR).expect("base type"),
		Some(Datum::Text("XY".to_string()))
	);
}

#[test]
fn extreme_domain_typmod_leaves_values_alone() {
	let mut backend = MemoryBackend::new();
	let odd = backend
		.catalog
		.create_domain(DomainDef::new("odd", TypeId::VARCHAR).typmod(i32::MIN))
		.expect("create domain");
	backend.engine.on_query_rows(
		"select code from codes",
		ResultSet::new(vec![ColumnDesc::new("code", TypeId::TEXT)])
			.row(vec![Some(Datum::Text("XYZ".to_string()))]),
	);
	let mut registry = Registry::default();
	let cursor = fetched(&mut backend, &mut registry, "select code from codes", &[(odd, -1)]);

	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::UNKNOWN).expect("unconstrained"),
		Some(Datum::Text("XYZ".to_string()))
	);
}

#[test]
fn domain_typmod_applies_when_column_has_none() {
	let mut backend = MemoryBackend::new();
	let short = backend
		.catalog
		.create_domain(DomainDef::new("short_code", TypeId::VARCHAR).typmod(2 + 4))
		.expect("create domain");
	backend.engine.on_query_rows(
		"select code from codes",
		ResultSet::new(vec![ColumnDesc::new("code", TypeId::TEXT)])
			.row(vec![Some(Datum::Text("XYZ".to_string()))]),
	);
	let mut registry = Registry::default();
	let cursor =
		fetched(&mut backend, &mut registry, "select code from codes", &[(TypeId::VARCHAR, -1)]);

	assert_eq!(
		read(&registry, &backend, cursor, 1, short).expect("domain length"),
		Some(Datum::Text("XY".to_string()))
	);
}

#[test]
fn redefining_a_column_rebuilds_its_cast() {
	let mut backend = MemoryBackend::new();
	backend.engine.on_query_rows(
		"select label from labels",
		ResultSet::new(vec![ColumnDesc::new("label", TypeId::TEXT)])
			.row(vec![Some(Datum::Text("hello".to_string()))]),
	);
	let mut registry = Registry::default();
	let cursor =
		fetched(&mut backend, &mut registry, "select label from labels", &[(TypeId::TEXT, -1)]);
	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::TEXT).expect("as text"),
		Some(Datum::Text("hello".to_string()))
	);

	registry
		.define_column(cursor, Some(1), TypeId::VARCHAR, Some(2), &backend)
		.expect("redefine column");
	assert_eq!(
		read(&registry, &backend, cursor, 1, TypeId::VARCHAR).expect("as varchar(2)"),
		Some(Datum::Text("he".to_string()))
	);
}

#[test]
fn bound_values_keep_their_base_type() {
	let mut backend = MemoryBackend::new();
	let tag = backend
		.catalog
		.create_domain(DomainDef::new("tag", TypeId::TEXT))
		.expect("create domain");
	backend.engine.on_query_rows(
		"select $1, $2",
		ResultSet::new(vec![
			ColumnDesc::new("first", TypeId::TEXT),
			ColumnDesc::new("second", TypeId::TEXT),
		])
		.row(vec![Some(Datum::Text("x".to_string())), Some(Datum::Text("y".to_string()))]),
	);
	let mut registry = Registry::default();
	let cursor = registry.open_cursor().expect("open cursor");
	registry.parse(cursor, Some("select :a, :b"), &mut backend).expect("parse");
	let tagged = TypedValue::new(tag, Some(Datum::Text("x".to_string())));
	registry.bind_variable(cursor, Some("a"), tagged, &backend).expect("bind domain value");
	registry
		.bind_variable(cursor, Some("b"), TypedValue::unknown("y"), &backend)
		.expect("bind untyped literal");
	registry.define_column(cursor, Some(1), TypeId::TEXT, Some(-1), &backend).expect("define 1");
	registry.define_column(cursor, Some(2), TypeId::TEXT, Some(-1), &backend).expect("define 2");
	registry.execute(cursor, &mut backend).expect("execute");

	let opened = backend.engine.opened().first().expect("engine cursor opened");
	let types: Vec<_> = opened.params.iter().map(|p| p.type_id).collect();
	assert_eq!(types, vec![TypeId::TEXT, TypeId::TEXT]);
	assert_eq!(opened.params.get(1).and_then(|p| p.value.clone()), Some(Datum::Text("y".to_string())));
}
