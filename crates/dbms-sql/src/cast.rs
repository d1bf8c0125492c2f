use std::collections::HashMap;
use std::collections::hash_map::Entry;

use smallvec::SmallVec;
use tracing::debug;

use crate::catalog::{CoercionPath, FuncId, TypeCatalog};
use crate::error::{Error, Result};
use crate::types::{Datum, TypeId};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CastStep {
	/// Direct conversion function.
	Function(FuncId),
	/// Output as text in the source type, input in the target type.
	ViaText,
	/// Length coercion to the requested typmod.
	Typmod(FuncId),
}

/// Resolved conversion from an engine column type to a requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastEntry {
	source: TypeId,
	target: TypeId,
	base: TypeId,
	column_typmod: i32,
	typmod: i32,
	steps: SmallVec<[CastStep; 3]>,
	check_domain: bool,
}

impl CastEntry {
	pub fn resolve(
		catalog: &dyn TypeCatalog,
		source: TypeId,
		source_typmod: i32,
		target: TypeId,
		column_typmod: i32,
	) -> Result<Self> {
		let (base, domain_typmod) = catalog.base_type(target)?;
		let typmod = if column_typmod == -1 { domain_typmod } else { column_typmod };

		let mut steps = SmallVec::new();
		if source != base {
			match catalog.coercion_path(source, base) {
				CoercionPath::None => {
					return Err(Error::NoCoercion {
						source_type: catalog.format_type(source, source_typmod),
						target_type: catalog.format_type(target, typmod),
					});
				}
				CoercionPath::Relabel => {}
				CoercionPath::Function(func) => steps.push(CastStep::Function(func)),
				CoercionPath::ViaIo => steps.push(CastStep::ViaText),
			}
		}

		let typmod_differs = typmod != -1 && (source != base || typmod != source_typmod);
		if typmod_differs {
			if let Some(func) = catalog.length_coercion(base) {
				steps.push(CastStep::Typmod(func));
			}
		}

		let entry = Self {
			source,
			target,
			base,
			column_typmod,
			typmod,
			steps,
			check_domain: base != target,
		};
		debug!(
			source = %source,
			target = %target,
			steps = ?entry.steps,
			check_domain = entry.check_domain,
			"resolved column cast"
		);
		Ok(entry)
	}

	/// True when values pass through untouched (domain checks aside).
	#[must_use]
	pub fn without_cast(&self) -> bool {
		self.steps.is_empty()
	}

	#[must_use]
	pub fn steps(&self) -> &[CastStep] {
		&self.steps
	}

	#[must_use]
	pub const fn checks_domain(&self) -> bool {
		self.check_domain
	}

	fn is_for(&self, target: TypeId, column_typmod: i32) -> bool {
		self.target == target && self.column_typmod == column_typmod
	}

	pub fn apply(&self, catalog: &dyn TypeCatalog, value: Option<Datum>) -> Result<Option<Datum>> {
		let converted = match value {
			None => None,
			Some(mut datum) => {
				for step in &self.steps {
					datum = match *step {
						CastStep::Function(func) => catalog.call_cast(func, datum)?,
						CastStep::ViaText => {
							let text = catalog.output(self.source, &datum)?;
							catalog.input(self.base, &text, -1)?
						}
						CastStep::Typmod(func) => {
							catalog.call_length_coercion(func, datum, self.typmod)?
						}
					};
				}
				Some(datum)
			}
		};

		if self.check_domain {
			catalog.check_domain(self.target, converted.as_ref())?;
		}
		Ok(converted)
	}
}

/// Cast entries of one execution, keyed by 1-based output position.
#[derive(Debug, Default)]
pub struct CastCache {
	entries: HashMap<usize, CastEntry>,
}

impl CastCache {
	/// Returns the entry for `position`, resolving it on first use or when the
	/// requested type changed since it was built.
	pub fn get_or_resolve(
		&mut self,
		position: usize,
		target: TypeId,
		column_typmod: i32,
		resolve: impl FnOnce() -> Result<CastEntry>,
	) -> Result<&CastEntry> {
		match self.entries.entry(position) {
			Entry::Occupied(mut slot) => {
				if !slot.get().is_for(target, column_typmod) {
					slot.insert(resolve()?);
				}
				Ok(slot.into_mut())
			}
			Entry::Vacant(slot) => Ok(slot.insert(resolve()?)),
		}
	}

	pub fn invalidate(&mut self, position: usize) {
		self.entries.remove(&position);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}
}
