use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::api::error::LstmResult;

/// Append one `iteration,loss` row.
pub fn append_progress<P: AsRef<Path>>(path: P, iteration: u64, loss: f64) -> LstmResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{iteration},{loss:.6}")?;
    Ok(())
}

/// Append a generated sample under an iteration banner.
pub fn append_sample<P: AsRef<Path>>(
    path: P,
    iteration: u64,
    loss: f64,
    sample: &[u8],
) -> LstmResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "====== Iteration: {iteration}, loss: {loss:.5} ======")?;
    file.write_all(sample)?;
    writeln!(file)?;
    Ok(())
}
