//! Typed batch cursors
//!
//! A cursor walks one series and hands out parallel arrays of nanosecond
//! timestamps and values. An empty batch means the cursor is exhausted.

use std::fmt;

/// One batch of samples, `timestamps[i]` belongs to `values[i]`
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub timestamps: Vec<i64>,
    pub values: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(timestamps: Vec<i64>, values: Vec<T>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self { timestamps, values }
    }

    /// Batch that signals exhaustion
    pub fn empty() -> Self {
        Self {
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Cursor over the samples of a single series
pub trait ArrayCursor<T>: Send {
    /// Next batch; empty once the series is exhausted
    fn next_batch(&mut self) -> Batch<T>;

    /// Release the cursor. Callers close every cursor they receive exactly once.
    fn close(&mut self);
}

/// Value kind of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    Float,
    Integer,
    Unsigned,
    Boolean,
    String,
}

impl CursorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorKind::Float => "float",
            CursorKind::Integer => "integer",
            CursorKind::Unsigned => "uint",
            CursorKind::Boolean => "bool",
            CursorKind::String => "string",
        }
    }
}

impl fmt::Display for CursorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cursor of any value kind
pub enum Cursor {
    Float(Box<dyn ArrayCursor<f64>>),
    Integer(Box<dyn ArrayCursor<i64>>),
    Unsigned(Box<dyn ArrayCursor<u64>>),
    Boolean(Box<dyn ArrayCursor<bool>>),
    String(Box<dyn ArrayCursor<String>>),
}

impl Cursor {
    pub fn kind(&self) -> CursorKind {
        match self {
            Cursor::Float(_) => CursorKind::Float,
            Cursor::Integer(_) => CursorKind::Integer,
            Cursor::Unsigned(_) => CursorKind::Unsigned,
            Cursor::Boolean(_) => CursorKind::Boolean,
            Cursor::String(_) => CursorKind::String,
        }
    }

    pub fn close(&mut self) {
        match self {
            Cursor::Float(c) => c.close(),
            Cursor::Integer(c) => c.close(),
            Cursor::Unsigned(c) => c.close(),
            Cursor::Boolean(c) => c.close(),
            Cursor::String(c) => c.close(),
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.kind()).finish()
    }
}

/// Cursor over samples already held in memory
#[derive(Debug)]
pub struct VecCursor<T> {
    timestamps: Vec<i64>,
    values: Vec<T>,
    pos: usize,
    batch_size: usize,
    closed: bool,
}

impl<T: Clone + Send> VecCursor<T> {
    /// `batch_size` of zero is treated as one
    pub fn new(timestamps: Vec<i64>, values: Vec<T>, batch_size: usize) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self {
            timestamps,
            values,
            pos: 0,
            batch_size: batch_size.max(1),
            closed: false,
        }
    }

    pub fn from_points(points: Vec<(i64, T)>, batch_size: usize) -> Self {
        let (timestamps, values) = points.into_iter().unzip();
        Self::new(timestamps, values, batch_size)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<T: Clone + Send> ArrayCursor<T> for VecCursor<T> {
    fn next_batch(&mut self) -> Batch<T> {
        if self.closed || self.pos >= self.timestamps.len() {
            return Batch::empty();
        }
        let end = (self.pos + self.batch_size).min(self.timestamps.len());
        let batch = Batch::new(
            self.timestamps[self.pos..end].to_vec(),
            self.values[self.pos..end].to_vec(),
        );
        self.pos = end;
        batch
    }

    fn close(&mut self) {
        self.closed = true;
        self.timestamps = Vec::new();
        self.values = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_cursor_batches() {
        let mut cursor = VecCursor::new(vec![1, 2, 3, 4, 5], vec![1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(cursor.next_batch().timestamps, vec![1, 2]);
        assert_eq!(cursor.next_batch().timestamps, vec![3, 4]);
        let last = cursor.next_batch();
        assert_eq!(last.timestamps, vec![5]);
        assert_eq!(last.values, vec![5.0]);
        assert!(cursor.next_batch().is_empty());
        assert!(cursor.next_batch().is_empty());
    }

    #[test]
    fn test_closed_cursor_is_exhausted() {
        let mut cursor = VecCursor::from_points(vec![(1, 10_i64), (2, 20)], 10);
        cursor.close();
        assert!(cursor.is_closed());
        assert!(cursor.next_batch().is_empty());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut cursor = VecCursor::from_points(vec![(1, true), (2, false)], 0);
        assert_eq!(cursor.next_batch().len(), 1);
    }

    #[test]
    fn test_kind_names() {
        let kinds = [
            (Cursor::Float(Box::new(VecCursor::<f64>::new(vec![], vec![], 1))), "float"),
            (Cursor::Integer(Box::new(VecCursor::<i64>::new(vec![], vec![], 1))), "integer"),
            (Cursor::Unsigned(Box::new(VecCursor::<u64>::new(vec![], vec![], 1))), "uint"),
            (Cursor::Boolean(Box::new(VecCursor::<bool>::new(vec![], vec![], 1))), "bool"),
            (Cursor::String(Box::new(VecCursor::<String>::new(vec![], vec![], 1))), "string"),
        ];
        for (cursor, name) in kinds {
            assert_eq!(cursor.kind().to_string(), name);
        }
    }
}
