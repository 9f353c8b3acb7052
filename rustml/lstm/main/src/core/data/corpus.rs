use std::fs;
use std::path::Path;

use crate::api::error::{LstmError, LstmResult};
use crate::core::data::symbols::SymbolTable;

/// A byte stream encoded against a symbol table.
///
/// The training target at position `k` is the symbol at `k + 1`, wrapping
/// around to the first symbol at the end.
#[derive(Debug, Clone)]
pub struct Corpus {
    indices: Vec<usize>,
}

impl Corpus {
    /// Encode `bytes`, growing `symbols` with every unseen byte.
    pub fn encode(bytes: &[u8], symbols: &mut SymbolTable) -> LstmResult<Self> {
        if bytes.is_empty() {
            return Err(LstmError::EmptyCorpus);
        }
        let indices = bytes
            .iter()
            .map(|&b| symbols.insert(b))
            .collect::<LstmResult<Vec<_>>>()?;
        Ok(Self { indices })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, symbols: &mut SymbolTable) -> LstmResult<Self> {
        let bytes = fs::read(path)?;
        Self::encode(&bytes, symbols)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn input(&self, k: usize) -> usize {
        self.indices[k % self.indices.len()]
    }

    pub fn target(&self, k: usize) -> usize {
        self.indices[(k + 1) % self.indices.len()]
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}
