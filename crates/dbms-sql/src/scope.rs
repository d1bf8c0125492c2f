use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::cast::CastCache;
use crate::engine::{ColumnDesc, RowDescriptor, TransactionNotifier};
use crate::fetch::FetchBuffer;
use crate::registry::CursorId;

/// A live result column and its attribute index in engine rows.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LiveColumn {
	pub attno: usize,
	pub desc: ColumnDesc,
}

/// Per-execution state. Lives no longer than the transaction that created it.
#[derive(Debug, Default)]
pub struct Execution {
	pub portal: Option<String>,
	pub columns: Vec<LiveColumn>,
	pub fetch: FetchBuffer,
	pub casts: CastCache,
}

impl Execution {
	pub fn start(&mut self, portal: String, descriptor: &RowDescriptor) {
		self.portal = Some(portal);
		self.columns = descriptor
			.live_columns()
			.map(|(attno, desc)| LiveColumn { attno, desc: desc.clone() })
			.collect();
		self.fetch = FetchBuffer::default();
		self.casts.clear();
	}

	/// Forgets the previous run; returns its engine cursor.
	pub fn reset(&mut self) -> Option<String> {
		self.columns.clear();
		self.fetch = FetchBuffer::default();
		self.casts.clear();
		self.portal.take()
	}
}

/// Handle to execution state that the transaction-end callback can drop.
///
/// Borrows are only taken inside [`TransactionScope::with`], whose closures
/// never call back into the engine, so the callback never finds it borrowed.
#[derive(Debug, Clone)]
pub struct TransactionScope {
	state: Rc<RefCell<Option<Execution>>>,
}

impl TransactionScope {
	/// Creates fresh state and arranges for it to be dropped when the current
	/// transaction ends.
	pub fn begin(notifier: &mut dyn TransactionNotifier, cursor: CursorId) -> Self {
		let state = Rc::new(RefCell::new(Some(Execution::default())));
		let weak = Rc::downgrade(&state);
		notifier.on_transaction_end(Box::new(move || {
			let Some(state) = weak.upgrade() else {
				return;
			};
			match state.try_borrow_mut() {
				Ok(mut execution) => {
					if execution.take().is_some() {
						debug!(cursor = %cursor, "transaction ended, execution state released");
					}
				}
				Err(_) => warn!(cursor = %cursor, "execution state busy at transaction end"),
			}
		}));
		Self { state }
	}

	pub fn is_alive(&self) -> bool {
		self.state.borrow().is_some()
	}

	pub fn is_executed(&self) -> bool {
		self.state.borrow().as_ref().is_some_and(|execution| execution.portal.is_some())
	}

	/// Runs `f` on the execution state; `None` once the transaction has ended.
	pub fn with<R>(&self, f: impl FnOnce(&mut Execution) -> R) -> Option<R> {
		self.state.borrow_mut().as_mut().map(f)
	}

	pub fn release(&self) -> Option<Execution> {
		self.state.borrow_mut().take()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::TransactionEndCallback;
	use crate::types::TypeId;

	#[derive(Default)]
	struct Callbacks(Vec<TransactionEndCallback>);

	impl TransactionNotifier for Callbacks {
		fn on_transaction_end(&mut self, callback: TransactionEndCallback) {
			self.0.push(callback);
		}
	}

	impl Callbacks {
		fn end(&mut self) {
			for callback in self.0.drain(..) {
				callback();
			}
		}
	}

	#[test]
	fn transaction_end_drops_state() {
		let mut callbacks = Callbacks::default();
		let scope = TransactionScope::begin(&mut callbacks, CursorId::new(0, 1));
		let descriptor = RowDescriptor::new(vec![ColumnDesc::new("a", TypeId::INT4)]);
		scope.with(|execution| execution.start("c_0".to_string(), &descriptor));
		assert!(scope.is_executed());

		callbacks.end();
		assert!(!scope.is_alive());
		assert!(!scope.is_executed());
		assert_eq!(scope.with(|execution| execution.columns.len()), None);
	}

	#[test]
	fn callback_outliving_scope_is_harmless() {
		let mut callbacks = Callbacks::default();
		let scope = TransactionScope::begin(&mut callbacks, CursorId::new(0, 1));
		drop(scope);
		callbacks.end();
	}

	#[test]
	fn reset_returns_previous_portal() {
		let mut execution = Execution::default();
		execution.start("c_3".to_string(), &RowDescriptor::default());
		assert_eq!(execution.reset(), Some("c_3".to_string()));
		assert_eq!(execution.reset(), None);
	}
}
