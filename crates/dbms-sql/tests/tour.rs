use dbms_sql::memory::{MemoryBackend, ResultSet};
use dbms_sql::{ColumnDesc, Datum, Registry, RegistryConfig, TypeId, TypedValue};

#[test]
fn inventory_report_runs_end_to_end() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();

	let mut backend = MemoryBackend::new();
	backend.engine.on_query("select sku, qty from inventory where qty >= $1 order by sku", |params| {
		let min = match params.first().and_then(|p| p.value.as_ref()) {
			Some(Datum::Int4(min)) => i64::from(*min),
			_ => 0,
		};
		let rows = [("A100", 8_i64), ("B205", 14), ("C330", 3)]
			.into_iter()
			.filter(|(_, qty)| *qty >= min)
			.map(|(sku, qty)| vec![Some(Datum::Text(sku.to_string())), Some(Datum::Int8(qty))]);
		Ok(ResultSet::new(vec![
			ColumnDesc::new("sku", TypeId::TEXT),
			ColumnDesc::new("qty", TypeId::INT8),
		])
		.rows(rows))
	});

	let config = RegistryConfig::from_toml_str("max_cursors = 4\nbatch_size = 1").expect("config");
	let mut registry = Registry::new(config).expect("create registry");
	let cursor = registry.open_cursor().expect("open cursor");
	registry
		.parse(
			cursor,
			Some("select sku, qty from inventory where qty >= :min_qty order by sku"),
			&mut backend,
		)
		.expect("parse");
	registry.bind_variable(cursor, Some("min_qty"), TypedValue::int4(5), &backend).expect("bind");
	registry.define_column(cursor, Some(1), TypeId::VARCHAR, Some(8), &backend).expect("define 1");
	registry.define_column(cursor, Some(2), TypeId::INT4, Some(-1), &backend).expect("define 2");
	registry.execute(cursor, &mut backend).expect("execute");

	let mut report = Vec::new();
	while registry.fetch_rows(cursor, &mut backend).expect("fetch") == 1 {
		let sku = registry.column_value(cursor, Some(1), TypeId::VARCHAR, &backend).expect("sku");
		let qty = registry.column_value(cursor, Some(2), TypeId::INT4, &backend).expect("qty");
		report.push((sku, qty));
	}

	assert_eq!(
		report,
		vec![
			(Some(Datum::Text("A100".to_string())), Some(Datum::Int4(8))),
			(Some(Datum::Text("B205".to_string())), Some(Datum::Int4(14))),
		]
	);
	assert_eq!(backend.engine.fetch_calls(), 3);

	backend.end_transaction();
	registry.close_cursor(cursor, &mut backend).expect("close cursor");
	assert_eq!(registry.open_count(), 0);
}
