use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_CURSORS: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_CURSOR_NAME_PREFIX: &str = "__dbms_sql_cursor";

/// Registry settings.
///
/// ```toml
/// max_cursors = 100
/// batch_size = 10
/// cursor_name_prefix = "__dbms_sql_cursor"
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
	/// Number of cursor slots in the pool.
	pub max_cursors: usize,
	/// Rows requested from the engine per fetch round trip.
	pub batch_size: usize,
	/// Engine cursors are named `<prefix>_<slot index>`.
	pub cursor_name_prefix: String,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			max_cursors: DEFAULT_MAX_CURSORS,
			batch_size: DEFAULT_BATCH_SIZE,
			cursor_name_prefix: DEFAULT_CURSOR_NAME_PREFIX.to_string(),
		}
	}
}

impl RegistryConfig {
	pub fn from_toml_str(content: &str) -> Result<Self> {
		let config: Self =
			toml::from_str(content).map_err(|e| Error::Config { detail: e.to_string() })?;
		config.validate()?;
		Ok(config)
	}

	#[must_use]
	pub const fn with_max_cursors(mut self, max_cursors: usize) -> Self {
		self.max_cursors = max_cursors;
		self
	}

	#[must_use]
	pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size;
		self
	}

	pub fn validate(&self) -> Result<()> {
		if self.max_cursors == 0 {
			return Err(Error::Config { detail: "max_cursors must be at least 1".to_string() });
		}
		if u32::try_from(self.max_cursors).is_err() {
			return Err(Error::Config { detail: "max_cursors does not fit in u32".to_string() });
		}
		if self.batch_size == 0 {
			return Err(Error::Config { detail: "batch_size must be at least 1".to_string() });
		}
		if self.cursor_name_prefix.is_empty() {
			return Err(Error::Config { detail: "cursor_name_prefix cannot be empty".to_string() });
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;

	#[test]
	fn empty_toml_gives_defaults() {
		let config = RegistryConfig::from_toml_str("").expect("parse empty config");
		assert_eq!(config, RegistryConfig::default());
		assert_eq!(config.max_cursors, 100);
		assert_eq!(config.batch_size, 10);
	}

	#[test]
	fn toml_overrides_fields() {
		let config = RegistryConfig::from_toml_str("max_cursors = 4\nbatch_size = 2\n")
			.expect("parse config");
		assert_eq!(config.max_cursors, 4);
		assert_eq!(config.batch_size, 2);
		assert_eq!(config.cursor_name_prefix, DEFAULT_CURSOR_NAME_PREFIX);
	}

	#[test]
	fn rejects_zero_sizes_and_unknown_keys() {
		let err = RegistryConfig::from_toml_str("batch_size = 0").expect_err("zero batch");
		assert_eq!(err.kind(), ErrorKind::InvalidInput);

		let err = RegistryConfig::from_toml_str("max_cursors = 0").expect_err("zero pool");
		assert!(err.to_string().contains("max_cursors"));

		let err = RegistryConfig::from_toml_str("cursors = 3").expect_err("unknown key");
		assert_eq!(err.kind(), ErrorKind::InvalidInput);
	}
}
