use rand::Rng;

use crate::api::error::{LstmError, LstmResult};
use crate::api::types::DEFAULT_SYMBOL_CAPACITY;

/// Byte vocabulary in first-seen order.
///
/// The index of a symbol is its position in the table and doubles as the
/// one-hot position and the output class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<u8>,
    capacity: usize,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SYMBOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            symbols: Vec::new(),
            capacity,
        }
    }

    /// Table holding `symbols` in the given order, as read back from a
    /// network file.
    pub fn from_symbols(symbols: &[u8]) -> LstmResult<Self> {
        let mut table = Self::new();
        for &s in symbols {
            if table.index_of(s).is_some() {
                return Err(LstmError::Format(format!("duplicate symbol code {s}")));
            }
            table.insert(s)?;
        }
        Ok(table)
    }

    /// Insert if absent and return the symbol's index.
    pub fn insert(&mut self, symbol: u8) -> LstmResult<usize> {
        if let Some(idx) = self.index_of(symbol) {
            return Ok(idx);
        }
        if self.symbols.len() >= self.capacity {
            return Err(LstmError::SymbolCapacity(self.capacity));
        }
        self.symbols.push(symbol);
        Ok(self.symbols.len() - 1)
    }

    pub fn index_of(&self, symbol: u8) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }

    pub fn symbol_at(&self, index: usize) -> Option<u8> {
        self.symbols.get(index).copied()
    }

    /// Number of distinct symbols.
    pub fn features(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Draw an index from `probs` by walking the cumulative sum against a
    /// uniform value in `[0, 1)`. Falls back to index 0 if rounding leaves the
    /// sum short of the draw.
    pub fn probability_choice<R: Rng + ?Sized>(&self, probs: &[f64], rng: &mut R) -> usize {
        let r: f64 = rng.r#gen();
        let mut sum = 0.0;
        for (i, &p) in probs.iter().take(self.features()).enumerate() {
            sum += p;
            if sum - r > 0.0 {
                return i;
            }
        }
        0
    }

    /// Index of the most probable symbol; ties keep the lowest index.
    pub fn greedy_argmax(&self, probs: &[f64]) -> usize {
        let mut best = 0;
        for (i, &p) in probs.iter().take(self.features()).enumerate() {
            if p > probs[best] {
                best = i;
            }
        }
        best
    }
}
