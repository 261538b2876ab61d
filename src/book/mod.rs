use uuid::Uuid;

use crate::error::BookError;
use crate::models::{Direction, Lot};

/// Ordered sequence of lots for one symbol, oldest first.
///
/// Invariants: direction is uniform (empty, all-LONG, or all-SHORT), size is
/// capped at `max_lots`, and lots stay ordered by `entry_ts`. Mutations run
/// on the symbol's single-writer lane, so no interior locking.
#[derive(Debug, Clone)]
pub struct PositionBook {
    symbol: String,
    max_lots: usize,
    lots: Vec<Lot>,
}

impl PositionBook {
    pub fn new(symbol: impl Into<String>, max_lots: usize) -> Self {
        Self {
            symbol: symbol.into(),
            max_lots,
            lots: Vec::new(),
        }
    }

    /// Rebuild from persisted lots; re-sorts by entry time defensively.
    pub fn from_lots(symbol: impl Into<String>, max_lots: usize, mut lots: Vec<Lot>) -> Self {
        lots.sort_by_key(|l| l.entry_ts);
        Self {
            symbol: symbol.into(),
            max_lots,
            lots,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Direction of the book, `None` when flat.
    pub fn direction(&self) -> Option<Direction> {
        self.lots.first().map(|l| l.direction)
    }

    pub fn oldest(&self) -> Option<&Lot> {
        self.lots.first()
    }

    pub fn newest(&self) -> Option<&Lot> {
        self.lots.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    pub fn lot_ids(&self) -> Vec<Uuid> {
        self.lots.iter().map(|l| l.id).collect()
    }

    /// Append a filled lot. A late fill with an earlier `entry_ts` is
    /// inserted in time order so the ordering invariant holds regardless of
    /// arrival order.
    pub fn append(&mut self, lot: Lot) -> Result<(), BookError> {
        if let Some(book_dir) = self.direction() {
            if book_dir != lot.direction {
                return Err(BookError::DirectionConflict {
                    book: book_dir,
                    incoming: lot.direction,
                });
            }
        }
        if self.lots.len() >= self.max_lots {
            return Err(BookError::MaxLotsExceeded(self.max_lots));
        }
        let at = self
            .lots
            .iter()
            .position(|l| l.entry_ts > lot.entry_ts)
            .unwrap_or(self.lots.len());
        self.lots.insert(at, lot);
        Ok(())
    }

    pub fn close_oldest(&mut self) -> Option<Lot> {
        if self.lots.is_empty() {
            None
        } else {
            Some(self.lots.remove(0))
        }
    }

    pub fn close_newest(&mut self) -> Option<Lot> {
        self.lots.pop()
    }

    pub fn close_all(&mut self) -> Vec<Lot> {
        std::mem::take(&mut self.lots)
    }

    pub fn close_oldest_n(&mut self, n: usize) -> Vec<Lot> {
        let n = n.min(self.lots.len());
        self.lots.drain(..n).collect()
    }

    /// Remove one lot by id. Used by the reconciler for targeted closes;
    /// `None` when the lot is already gone (idempotent replay).
    pub fn close_lot(&mut self, id: Uuid) -> Option<Lot> {
        let at = self.lots.iter().position(|l| l.id == id)?;
        Some(self.lots.remove(at))
    }

    /// Size-weighted mean entry price.
    pub fn avg_entry_price(&self) -> Option<f64> {
        if self.lots.is_empty() {
            return None;
        }
        let total_size: f64 = self.lots.iter().map(|l| l.size).sum();
        if total_size <= 0.0 {
            return None;
        }
        let weighted: f64 = self.lots.iter().map(|l| l.entry_price * l.size).sum();
        Some(weighted / total_size)
    }

    /// Entry price of the most recent remaining lot (scale-out reference).
    pub fn prev_entry_price(&self) -> Option<f64> {
        self.newest().map(|l| l.entry_price)
    }
}
