use std::collections::HashMap;
use std::num::IntErrorKind;

use crate::error::{Error, Result};
use crate::types::{Datum, TypeCategory, TypeId, TypeInfo, VARHDRSZ};

/// Catalog identifier of a conversion function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FuncId(pub u32);

/// How a value of one type becomes a value of another.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CoercionPath {
	/// No pathway exists.
	None,
	/// Binary compatible, the value is reused as is.
	Relabel,
	/// A dedicated conversion function.
	Function(FuncId),
	/// Print with the source output function, read back with the target input function.
	ViaIo,
}

/// Type knowledge of the host.
pub trait TypeCatalog {
	fn type_info(&self, id: TypeId) -> Result<TypeInfo>;

	/// Strips domains, returning the underlying type and the typmod the domain imposes.
	fn base_type(&self, id: TypeId) -> Result<(TypeId, i32)>;

	/// Explicit coercion pathway between two non-domain types.
	fn coercion_path(&self, source: TypeId, target: TypeId) -> CoercionPath;

	/// Function applying a typmod to values of `target`, if the type has one.
	fn length_coercion(&self, target: TypeId) -> Option<FuncId>;

	fn call_cast(&self, func: FuncId, value: Datum) -> Result<Datum>;

	fn call_length_coercion(&self, func: FuncId, value: Datum, typmod: i32) -> Result<Datum>;

	fn output(&self, id: TypeId, value: &Datum) -> Result<String>;

	fn input(&self, id: TypeId, text: &str, typmod: i32) -> Result<Datum>;

	fn check_domain(&self, domain: TypeId, value: Option<&Datum>) -> Result<()>;

	fn format_type(&self, id: TypeId, typmod: i32) -> String {
		let Ok(info) = self.type_info(id) else {
			return "???".to_string();
		};
		if info.category == TypeCategory::String && typmod >= VARHDRSZ {
			format!("{}({})", info.name, typmod - VARHDRSZ)
		} else {
			info.name
		}
	}
}

const TO_INT2: FuncId = FuncId(1);
const TO_INT4: FuncId = FuncId(2);
const TO_INT8: FuncId = FuncId(3);
const TO_FLOAT4: FuncId = FuncId(4);
const TO_FLOAT8: FuncId = FuncId(5);
const TO_BOOL: FuncId = FuncId(6);
const BPCHAR_RTRIM: FuncId = FuncId(7);
const VARCHAR_LENGTH: FuncId = FuncId(8);
const BPCHAR_LENGTH: FuncId = FuncId(9);

const FIRST_USER_TYPE_ID: u32 = 16384;

pub type DomainCheck = Box<dyn Fn(&Datum) -> bool>;

/// Definition of a user domain over an existing type.
pub struct DomainDef {
	name: String,
	base: TypeId,
	typmod: i32,
	not_null: bool,
	check: Option<(String, DomainCheck)>,
}

impl DomainDef {
	pub fn new(name: impl Into<String>, base: TypeId) -> Self {
		Self { name: name.into(), base, typmod: -1, not_null: false, check: None }
	}

	#[must_use]
	pub const fn typmod(mut self, typmod: i32) -> Self {
		self.typmod = typmod;
		self
	}

	#[must_use]
	pub const fn not_null(mut self) -> Self {
		self.not_null = true;
		self
	}

	#[must_use]
	pub fn check(mut self, name: impl Into<String>, check: impl Fn(&Datum) -> bool + 'static) -> Self {
		self.check = Some((name.into(), Box::new(check)));
		self
	}
}

struct Domain {
	name: String,
	base: TypeId,
	typmod: i32,
	not_null: bool,
	check: Option<(String, DomainCheck)>,
}

/// Catalog of the builtin scalar types plus runtime-registered domains and row types.
pub struct BuiltinCatalog {
	types: HashMap<TypeId, TypeInfo>,
	domains: HashMap<TypeId, Domain>,
	next_id: u32,
}

impl Default for BuiltinCatalog {
	fn default() -> Self {
		Self::new()
	}
}

impl BuiltinCatalog {
	#[must_use]
	pub fn new() -> Self {
		let builtins = [
			(TypeId::BOOL, "boolean", TypeCategory::Boolean, true, 1),
			(TypeId::BYTEA, "bytea", TypeCategory::UserDefined, false, -1),
			(TypeId::INT8, "bigint", TypeCategory::Numeric, true, 8),
			(TypeId::INT2, "smallint", TypeCategory::Numeric, true, 2),
			(TypeId::INT4, "integer", TypeCategory::Numeric, true, 4),
			(TypeId::TEXT, "text", TypeCategory::String, false, -1),
			(TypeId::FLOAT4, "real", TypeCategory::Numeric, true, 4),
			(TypeId::FLOAT8, "double precision", TypeCategory::Numeric, true, 8),
			(TypeId::UNKNOWN, "unknown", TypeCategory::Pseudo, false, -2),
			(TypeId::BPCHAR, "character", TypeCategory::String, false, -1),
			(TypeId::VARCHAR, "character varying", TypeCategory::String, false, -1),
			(TypeId::RECORD, "record", TypeCategory::Pseudo, false, -1),
		];

		let types = builtins
			.into_iter()
			.map(|(id, name, category, by_value, len)| {
				(id, TypeInfo { id, name: name.to_string(), category, by_value, len, base: None })
			})
			.collect();

		Self { types, domains: HashMap::new(), next_id: FIRST_USER_TYPE_ID }
	}

	pub fn create_domain(&mut self, def: DomainDef) -> Result<TypeId> {
		let base = self.type_info(def.base)?;
		let id = self.allocate_id();
		self.types.insert(
			id,
			TypeInfo {
				id,
				name: def.name.clone(),
				category: base.category,
				by_value: base.by_value,
				len: base.len,
				base: Some(def.base),
			},
		);
		self.domains.insert(
			id,
			Domain {
				name: def.name,
				base: def.base,
				typmod: def.typmod,
				not_null: def.not_null,
				check: def.check,
			},
		);
		Ok(id)
	}

	pub fn create_composite(&mut self, name: impl Into<String>) -> TypeId {
		let id = self.allocate_id();
		self.types.insert(
			id,
			TypeInfo {
				id,
				name: name.into(),
				category: TypeCategory::Composite,
				by_value: false,
				len: -1,
				base: None,
			},
		);
		id
	}

	const fn allocate_id(&mut self) -> TypeId {
		let id = TypeId(self.next_id);
		self.next_id += 1;
		id
	}

	fn type_name(&self, id: TypeId) -> String {
		self.types.get(&id).map_or_else(|| id.to_string(), |info| info.name.clone())
	}

	fn category(&self, id: TypeId) -> Option<TypeCategory> {
		self.types.get(&id).map(|info| info.category)
	}
}

impl TypeCatalog for BuiltinCatalog {
	fn type_info(&self, id: TypeId) -> Result<TypeInfo> {
		self.types.get(&id).cloned().ok_or(Error::UnknownType { id: id.0 })
	}

	fn base_type(&self, id: TypeId) -> Result<(TypeId, i32)> {
		if !self.types.contains_key(&id) {
			return Err(Error::UnknownType { id: id.0 });
		}

		let mut current = id;
		let mut typmod = -1;
		while let Some(domain) = self.domains.get(&current) {
			typmod = domain.typmod;
			current = domain.base;
		}
		Ok((current, typmod))
	}

	fn coercion_path(&self, source: TypeId, target: TypeId) -> CoercionPath {
		if source == target {
			return CoercionPath::Relabel;
		}

		let (Some(source_category), Some(target_category)) =
			(self.category(source), self.category(target))
		else {
			return CoercionPath::None;
		};

		if (matches!(source_category, TypeCategory::Composite | TypeCategory::Pseudo)
			&& source != TypeId::UNKNOWN)
			|| matches!(target_category, TypeCategory::Composite | TypeCategory::Pseudo)
		{
			return CoercionPath::None;
		}

		match (source, target) {
			(TypeId::TEXT | TypeId::UNKNOWN, TypeId::VARCHAR | TypeId::BPCHAR)
			| (TypeId::VARCHAR, TypeId::TEXT | TypeId::BPCHAR)
			| (TypeId::UNKNOWN, TypeId::TEXT) => CoercionPath::Relabel,
			(TypeId::BPCHAR, TypeId::TEXT | TypeId::VARCHAR) => CoercionPath::Function(BPCHAR_RTRIM),
			(TypeId::BOOL, TypeId::INT4) => CoercionPath::Function(TO_INT4),
			(TypeId::INT4, TypeId::BOOL) => CoercionPath::Function(TO_BOOL),
			_ if source_category == TypeCategory::Numeric
				&& target_category == TypeCategory::Numeric =>
			{
				match target {
					TypeId::INT2 => CoercionPath::Function(TO_INT2),
					TypeId::INT4 => CoercionPath::Function(TO_INT4),
					TypeId::INT8 => CoercionPath::Function(TO_INT8),
					TypeId::FLOAT4 => CoercionPath::Function(TO_FLOAT4),
					TypeId::FLOAT8 => CoercionPath::Function(TO_FLOAT8),
					_ => CoercionPath::None,
				}
			}
			_ if target_category == TypeCategory::String
				|| source_category == TypeCategory::String =>
			{
				CoercionPath::ViaIo
			}
			_ => CoercionPath::None,
		}
	}

	fn length_coercion(&self, target: TypeId) -> Option<FuncId> {
		match target {
			TypeId::VARCHAR => Some(VARCHAR_LENGTH),
			TypeId::BPCHAR => Some(BPCHAR_LENGTH),
			_ => None,
		}
	}

	fn call_cast(&self, func: FuncId, value: Datum) -> Result<Datum> {
		match func {
			TO_INT2 => {
				let v = to_integer(&value, "smallint")?;
				i16::try_from(v).map(Datum::Int2).map_err(|_| out_of_range("smallint", v))
			}
			TO_INT4 => {
				let v = to_integer(&value, "integer")?;
				i32::try_from(v).map(Datum::Int4).map_err(|_| out_of_range("integer", v))
			}
			TO_INT8 => to_integer(&value, "bigint").map(Datum::Int8),
			TO_FLOAT8 => to_float(&value).map(Datum::Float8),
			TO_FLOAT4 => {
				let v = to_float(&value)?;
				if v.is_finite() && v.abs() > f64::from(f32::MAX) {
					return Err(out_of_range("real", v));
				}
				#[expect(clippy::cast_possible_truncation)]
				let narrowed = v as f32;
				Ok(Datum::Float4(narrowed))
			}
			TO_BOOL => match value {
				Datum::Int4(v) => Ok(Datum::Bool(v != 0)),
				other => Err(mismatch(&other, "boolean")),
			},
			BPCHAR_RTRIM => match value {
				Datum::Text(s) => Ok(Datum::Text(s.trim_end_matches(' ').to_string())),
				other => Err(mismatch(&other, "text")),
			},
			other => Err(Error::NoCoercion {
				source_type: "function".to_string(),
				target_type: other.0.to_string(),
			}),
		}
	}

	fn call_length_coercion(&self, func: FuncId, value: Datum, typmod: i32) -> Result<Datum> {
		let Some(len) = typmod_length(typmod) else {
			return Ok(value);
		};
		let Datum::Text(text) = value else {
			return Ok(value);
		};

		match func {
			VARCHAR_LENGTH => Ok(Datum::Text(text.chars().take(len).collect())),
			BPCHAR_LENGTH => Ok(Datum::Text(pad_or_truncate(&text, len))),
			_ => Ok(Datum::Text(text)),
		}
	}

	fn output(&self, _id: TypeId, value: &Datum) -> Result<String> {
		Ok(match value {
			Datum::Bool(v) => (if *v { "t" } else { "f" }).to_string(),
			Datum::Int2(v) => v.to_string(),
			Datum::Int4(v) => v.to_string(),
			Datum::Int8(v) => v.to_string(),
			Datum::Float4(v) => format_float(f64::from(*v)),
			Datum::Float8(v) => format_float(*v),
			Datum::Text(v) => v.clone(),
			Datum::Bytea(bytes) => {
				let mut out = String::with_capacity(2 + bytes.len() * 2);
				out.push_str("\\x");
				for b in bytes {
					out.push_str(&format!("{b:02x}"));
				}
				out
			}
		})
	}

	fn input(&self, id: TypeId, text: &str, typmod: i32) -> Result<Datum> {
		let (base, domain_typmod) = self.base_type(id)?;
		let typmod = if typmod == -1 { domain_typmod } else { typmod };
		let invalid = || Error::InvalidText { type_name: self.type_name(base), input: text.to_string() };

		match base {
			TypeId::BOOL => match text.trim().to_ascii_lowercase().as_str() {
				"t" | "true" | "y" | "yes" | "on" | "1" => Ok(Datum::Bool(true)),
				"f" | "false" | "n" | "no" | "off" | "0" => Ok(Datum::Bool(false)),
				_ => Err(invalid()),
			},
			TypeId::INT2 | TypeId::INT4 | TypeId::INT8 => {
				let type_name = self.type_name(base);
				let v = text.trim().parse::<i64>().map_err(|e| match e.kind() {
					IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
						Error::ValueOutOfRange { type_name: type_name.clone(), value: text.to_string() }
					}
					_ => invalid(),
				})?;
				match base {
					TypeId::INT2 => {
						i16::try_from(v).map(Datum::Int2).map_err(|_| out_of_range(&type_name, v))
					}
					TypeId::INT4 => {
						i32::try_from(v).map(Datum::Int4).map_err(|_| out_of_range(&type_name, v))
					}
					_ => Ok(Datum::Int8(v)),
				}
			}
			TypeId::FLOAT4 => text.trim().parse::<f32>().map(Datum::Float4).map_err(|_| invalid()),
			TypeId::FLOAT8 => text.trim().parse::<f64>().map(Datum::Float8).map_err(|_| invalid()),
			TypeId::TEXT | TypeId::UNKNOWN => Ok(Datum::Text(text.to_string())),
			TypeId::VARCHAR | TypeId::BPCHAR => {
				let Some(len) = typmod_length(typmod) else {
					return Ok(Datum::Text(text.to_string()));
				};
				if text.chars().count() > len && text.chars().skip(len).any(|c| c != ' ') {
					return Err(Error::ValueOutOfRange {
						type_name: self.format_type(base, typmod),
						value: text.to_string(),
					});
				}
				if base == TypeId::BPCHAR {
					Ok(Datum::Text(pad_or_truncate(text, len)))
				} else {
					Ok(Datum::Text(text.chars().take(len).collect()))
				}
			}
			TypeId::BYTEA => text.strip_prefix("\\x").map_or_else(
				|| Ok(Datum::Bytea(text.as_bytes().to_vec())),
				|hex| decode_hex(hex).map(Datum::Bytea).ok_or_else(invalid),
			),
			_ => Err(invalid()),
		}
	}

	fn check_domain(&self, domain: TypeId, value: Option<&Datum>) -> Result<()> {
		let mut current = domain;
		while let Some(def) = self.domains.get(&current) {
			match value {
				None if def.not_null => {
					return Err(Error::DomainViolation {
						domain: def.name.clone(),
						constraint: "NOT NULL constraint".to_string(),
					});
				}
				Some(datum) => {
					if let Some((name, check)) = &def.check {
						if !check(datum) {
							return Err(Error::DomainViolation {
								domain: def.name.clone(),
								constraint: format!("check constraint \"{name}\""),
							});
						}
					}
				}
				None => {}
			}
			current = def.base;
		}
		Ok(())
	}
}

fn to_integer(value: &Datum, type_name: &str) -> Result<i64> {
	match value {
		Datum::Bool(v) => Ok(i64::from(*v)),
		Datum::Int2(v) => Ok(i64::from(*v)),
		Datum::Int4(v) => Ok(i64::from(*v)),
		Datum::Int8(v) => Ok(*v),
		Datum::Float4(v) => float_to_integer(f64::from(*v), type_name),
		Datum::Float8(v) => float_to_integer(*v, type_name),
		other => Err(mismatch(other, type_name)),
	}
}

#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_integer(v: f64, type_name: &str) -> Result<i64> {
	let rounded = v.round_ties_even();
	if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
		return Err(out_of_range(type_name, v));
	}
	Ok(rounded as i64)
}

#[expect(clippy::cast_precision_loss)]
fn to_float(value: &Datum) -> Result<f64> {
	match value {
		Datum::Int2(v) => Ok(f64::from(*v)),
		Datum::Int4(v) => Ok(f64::from(*v)),
		Datum::Int8(v) => Ok(*v as f64),
		Datum::Float4(v) => Ok(f64::from(*v)),
		Datum::Float8(v) => Ok(*v),
		other => Err(mismatch(other, "double precision")),
	}
}

fn format_float(v: f64) -> String {
	if v.is_nan() {
		"NaN".to_string()
	} else if v.is_infinite() {
		(if v > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
	} else {
		v.to_string()
	}
}

/// Character length encoded in a string typmod; `None` when unconstrained.
fn typmod_length(typmod: i32) -> Option<usize> {
	typmod.checked_sub(VARHDRSZ).and_then(|n| usize::try_from(n).ok())
}

fn pad_or_truncate(text: &str, len: usize) -> String {
	let mut out: String = text.chars().take(len).collect();
	let missing = len.saturating_sub(out.chars().count());
	out.extend(std::iter::repeat_n(' ', missing));
	out
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
	if hex.len() % 2 != 0 {
		return None;
	}
	(0..hex.len())
		.step_by(2)
		.map(|i| hex.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
		.collect()
}

fn out_of_range(type_name: &str, value: impl ToString) -> Error {
	Error::ValueOutOfRange { type_name: type_name.to_string(), value: value.to_string() }
}

fn mismatch(value: &Datum, target: &str) -> Error {
	Error::NoCoercion { source_type: format!("{value:?}"), target_type: target.to_string() }
}
