use std::fmt;

/// Length word overhead added to a declared string size to form its typmod.
pub const VARHDRSZ: i32 = 4;

/// Catalog identifier of a type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TypeId(pub u32);

impl TypeId {
	pub const BOOL: Self = Self(16);
	pub const BYTEA: Self = Self(17);
	pub const INT8: Self = Self(20);
	pub const INT2: Self = Self(21);
	pub const INT4: Self = Self(23);
	pub const TEXT: Self = Self(25);
	pub const FLOAT4: Self = Self(700);
	pub const FLOAT8: Self = Self(701);
	pub const UNKNOWN: Self = Self(705);
	pub const BPCHAR: Self = Self(1042);
	pub const VARCHAR: Self = Self(1043);
	pub const RECORD: Self = Self(2249);
}

impl fmt::Display for TypeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TypeCategory {
	Boolean,
	Numeric,
	String,
	Composite,
	Pseudo,
	UserDefined,
}

/// What the catalog knows about a type.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TypeInfo {
	pub id: TypeId,
	pub name: String,
	pub category: TypeCategory,
	pub by_value: bool,
	/// Fixed storage length in bytes, or -1 for variable length.
	pub len: i16,
	/// Underlying type when this is a domain.
	pub base: Option<TypeId>,
}

impl TypeInfo {
	#[must_use]
	pub fn is_row_type(&self) -> bool {
		self.category == TypeCategory::Composite || self.id == TypeId::RECORD
	}

	#[must_use]
	pub const fn is_domain(&self) -> bool {
		self.base.is_some()
	}
}

/// A non-null value. SQL NULL is represented as `Option::<Datum>::None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
	Bool(bool),
	Int2(i16),
	Int4(i32),
	Int8(i64),
	Float4(f32),
	Float8(f64),
	Text(String),
	Bytea(Vec<u8>),
}

/// A value together with the type it was supplied as.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
	pub type_id: TypeId,
	pub datum: Option<Datum>,
}

impl TypedValue {
	#[must_use]
	pub const fn new(type_id: TypeId, datum: Option<Datum>) -> Self {
		Self { type_id, datum }
	}

	#[must_use]
	pub const fn null(type_id: TypeId) -> Self {
		Self { type_id, datum: None }
	}

	#[must_use]
	pub const fn bool(value: bool) -> Self {
		Self::new(TypeId::BOOL, Some(Datum::Bool(value)))
	}

	#[must_use]
	pub const fn int4(value: i32) -> Self {
		Self::new(TypeId::INT4, Some(Datum::Int4(value)))
	}

	#[must_use]
	pub const fn int8(value: i64) -> Self {
		Self::new(TypeId::INT8, Some(Datum::Int8(value)))
	}

	#[must_use]
	pub const fn float8(value: f64) -> Self {
		Self::new(TypeId::FLOAT8, Some(Datum::Float8(value)))
	}

	pub fn text(value: impl Into<String>) -> Self {
		Self::new(TypeId::TEXT, Some(Datum::Text(value.into())))
	}

	pub fn varchar(value: impl Into<String>) -> Self {
		Self::new(TypeId::VARCHAR, Some(Datum::Text(value.into())))
	}

	/// An untyped literal, as written in SQL text.
	pub fn unknown(value: impl Into<String>) -> Self {
		Self::new(TypeId::UNKNOWN, Some(Datum::Text(value.into())))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn row_types_are_detected() {
		let record = TypeInfo {
			id: TypeId::RECORD,
			name: "record".to_string(),
			category: TypeCategory::Pseudo,
			by_value: false,
			len: -1,
			base: None,
		};
		assert!(record.is_row_type());

		let text = TypeInfo { id: TypeId::TEXT, name: "text".to_string(), ..record };
		assert!(!text.is_row_type());
		assert!(!text.is_domain());
	}

	#[test]
	fn constructors_carry_types() {
		assert_eq!(TypedValue::int4(3).type_id, TypeId::INT4);
		assert_eq!(TypedValue::unknown("x").datum, Some(Datum::Text("x".to_string())));
		assert_eq!(TypedValue::null(TypeId::INT8).datum, None);
	}
}
