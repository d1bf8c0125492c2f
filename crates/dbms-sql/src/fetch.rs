use crate::engine::Row;

/// Rows of the latest engine round trip. Replaced wholesale by the next one.
#[derive(Debug, Default)]
struct RowBatch {
	rows: Vec<Row>,
	read: usize,
}

/// Read position of an executed cursor.
#[derive(Debug, Default)]
pub struct FetchBuffer {
	batch: RowBatch,
	current: Option<usize>,
	exhausted: bool,
	buffered: u64,
	consumed: u64,
}

impl FetchBuffer {
	/// True when the current batch is used up and the engine may still have rows.
	#[must_use]
	pub fn needs_batch(&self) -> bool {
		!self.exhausted && self.batch.read >= self.batch.rows.len()
	}

	/// Installs the rows of a round trip that asked for `requested` rows.
	pub fn install(&mut self, rows: Vec<Row>, requested: usize) {
		if rows.len() < requested {
			self.exhausted = true;
		}
		self.buffered += rows.len() as u64;
		self.current = None;
		self.batch = RowBatch { rows, read: 0 };
	}

	/// Moves to the next buffered row. Returns false once the batch is used up,
	/// leaving no current row.
	pub fn advance(&mut self) -> bool {
		if self.batch.read < self.batch.rows.len() {
			self.current = Some(self.batch.read);
			self.batch.read += 1;
			self.consumed += 1;
			true
		} else {
			self.current = None;
			false
		}
	}

	#[must_use]
	pub fn current_row(&self) -> Option<&Row> {
		self.current.and_then(|index| self.batch.rows.get(index))
	}

	/// Rows received from the engine since execute.
	#[must_use]
	pub const fn buffered(&self) -> u64 {
		self.buffered
	}

	/// Rows handed out by advance since execute.
	#[must_use]
	pub const fn consumed(&self) -> u64 {
		self.consumed
	}
}
