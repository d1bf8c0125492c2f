use dbms_sql::memory::{MemoryBackend, ResultSet};
use dbms_sql::{ColumnDesc, Datum, DomainDef, Registry, RegistryConfig, TypeId, TypedValue};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	let mut backend = MemoryBackend::new();
	let sku_type = backend.catalog.create_domain(
		DomainDef::new("sku", TypeId::VARCHAR)
			.typmod(4 + 4)
			.check("sku_prefix", |v| matches!(v, Datum::Text(s) if s.starts_with(['A', 'B']))),
	)?;
	backend.engine.on_query("select sku, qty from inventory where qty >= $1 order by sku", |params| {
		let min = match params.first().and_then(|p| p.value.as_ref()) {
			Some(Datum::Int4(min)) => i64::from(*min),
			_ => 0,
		};
		let rows = [("A100", 8_i64), ("B205", 14), ("B330", 3)]
			.into_iter()
			.filter(|(_, qty)| *qty >= min)
			.map(|(sku, qty)| vec![Some(Datum::Text(sku.to_string())), Some(Datum::Int8(qty))]);
		Ok(ResultSet::new(vec![
			ColumnDesc::new("sku", TypeId::TEXT),
			ColumnDesc::new("qty", TypeId::INT8),
		])
		.rows(rows))
	});

	let config = RegistryConfig::from_toml_str("max_cursors = 8\nbatch_size = 2")?;
	let mut registry = Registry::new(config)?;
	let cursor = registry.open_cursor()?;
	registry.parse(
		cursor,
		Some("select sku, qty from inventory where qty >= :min_qty order by sku"),
		&mut backend,
	)?;
	registry.bind_variable(cursor, Some(":MIN_QTY"), TypedValue::int4(5), &backend)?;
	registry.define_column(cursor, Some(1), sku_type, Some(-1), &backend)?;
	registry.define_column(cursor, Some(2), TypeId::INT4, Some(-1), &backend)?;
	registry.debug_cursor(cursor, &backend)?;

	registry.execute(cursor, &mut backend)?;
	while registry.fetch_rows(cursor, &mut backend)? == 1 {
		let sku = registry.column_value(cursor, Some(1), sku_type, &backend)?;
		let qty = registry.column_value(cursor, Some(2), TypeId::INT4, &backend)?;
		match (sku, qty) {
			(Some(Datum::Text(sku)), Some(Datum::Int4(qty))) => println!("{sku}: {qty}"),
			other => return Err(format!("unexpected row shape: {other:?}").into()),
		}
	}
	println!("{} rows", registry.last_row_count(cursor)?);

	backend.end_transaction();
	registry.close_cursor(cursor, &mut backend)?;
	Ok(())
}
