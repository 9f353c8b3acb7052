//! Raw network file.
//!
//! Layout: CRLF-terminated ASCII integer lines
//! `version, F, L, (X, N, Y) * L, symbol_code * F`, followed by a
//! native-endian `f64` dump of every layer, output layer first, each in the
//! order `Wy, Wi, Wc, Wo, Wf, by, bi, bc, bf, bo`.

use std::fs;
use std::io::{BufRead, Cursor, Read};
use std::path::Path;

use crate::api::error::{LstmError, LstmResult};
use crate::api::types::{DEFAULT_SYMBOL_CAPACITY, MAX_LAYERS, NET_FILE_VERSION};
use crate::core::data::symbols::SymbolTable;
use crate::core::nn::lstm::LstmLayer;
use crate::core::nn::params::ParamSet;
use crate::core::nn::stack::LayerStack;

const F64_BYTES: usize = std::mem::size_of::<f64>();

/// A network read back from disk together with its vocabulary.
#[derive(Debug, Clone)]
pub struct LoadedNetwork {
    pub stack: LayerStack,
    pub symbols: SymbolTable,
}

/// Serialize `stack` and `symbols` into the raw format.
pub fn encode_network(stack: &LayerStack, symbols: &SymbolTable) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut line = |v: i64| buf.extend_from_slice(format!("{v}\r\n").as_bytes());

    line(NET_FILE_VERSION as i64);
    line(symbols.features() as i64);
    line(stack.len() as i64);
    for layer in stack.layers() {
        line(layer.input_size() as i64);
        line(layer.neurons() as i64);
        line(layer.output_size() as i64);
    }
    for &s in symbols.symbols() {
        line(s as i64);
    }

    for layer in stack.layers() {
        for values in layer.params().buffers() {
            for v in values {
                buf.extend_from_slice(&v.to_ne_bytes());
            }
        }
    }
    buf
}

pub fn store_network<P: AsRef<Path>>(
    path: P,
    stack: &LayerStack,
    symbols: &SymbolTable,
) -> LstmResult<()> {
    fs::write(path, encode_network(stack, symbols))?;
    Ok(())
}

/// Parse a raw network file image.
pub fn decode_network(data: &[u8]) -> LstmResult<LoadedNetwork> {
    let mut cursor = Cursor::new(data);

    let version = read_int(&mut cursor, "file version")?;
    if version != NET_FILE_VERSION as i64 {
        return Err(LstmError::Format(format!("unsupported file version {version}")));
    }
    let features = read_count(&mut cursor, "feature count")?;
    let layers = read_count(&mut cursor, "layer count")?;
    if layers > MAX_LAYERS {
        return Err(LstmError::Format(format!(
            "too many layers: {layers} (maximum {MAX_LAYERS})"
        )));
    }

    let mut shapes = Vec::with_capacity(layers);
    for l in 0..layers {
        let x = read_count(&mut cursor, &format!("inputs of layer {}", l + 1))?;
        let n = read_count(&mut cursor, &format!("neurons of layer {}", l + 1))?;
        let y = read_count(&mut cursor, &format!("outputs of layer {}", l + 1))?;
        shapes.push((x, n, y));
    }

    if features > DEFAULT_SYMBOL_CAPACITY {
        return Err(LstmError::Format(format!(
            "feature count {features} exceeds the symbol capacity {DEFAULT_SYMBOL_CAPACITY}"
        )));
    }

    let mut codes = Vec::with_capacity(features);
    for _ in 0..features {
        let code = read_int(&mut cursor, "symbol code")?;
        // Signed codes come from writers that stored `char` values.
        let byte = match code {
            0..=255 => code as u8,
            -128..=-1 => code as i8 as u8,
            _ => return Err(LstmError::Format(format!("symbol code {code} out of range"))),
        };
        codes.push(byte);
    }
    let symbols = SymbolTable::from_symbols(&codes)?;

    // Size the payload from the header before allocating any layer.
    let mut floats = 0usize;
    for (l, &(x, n, y)) in shapes.iter().enumerate() {
        floats = layer_float_count(x, n, y)
            .and_then(|count| floats.checked_add(count))
            .ok_or_else(|| {
                LstmError::Format(format!("dimensions of layer {} overflow", l + 1))
            })?;
    }
    let remaining = data.len() - cursor.position() as usize;
    if floats.checked_mul(F64_BYTES).is_none_or(|bytes| bytes > remaining) {
        return Err(LstmError::Format(format!(
            "header declares {floats} weights but only {remaining} bytes of weight data follow"
        )));
    }

    let mut stack = Vec::with_capacity(layers);
    for &(x, n, y) in &shapes {
        let mut params = ParamSet::zeros(x, n, y);
        for buffer in params.buffers_mut() {
            read_f64s(&mut cursor, buffer)?;
        }
        stack.push(LstmLayer::from_params(params));
    }
    let stack = LayerStack::from_layers(stack)?;

    if stack.features() != symbols.features() {
        return Err(LstmError::Format(format!(
            "input layer expects {} features but the file lists {} symbols",
            stack.features(),
            symbols.features()
        )));
    }
    if stack.classes() != symbols.features() {
        return Err(LstmError::Format(format!(
            "output layer predicts {} classes but the file lists {} symbols",
            stack.classes(),
            symbols.features()
        )));
    }

    Ok(LoadedNetwork { stack, symbols })
}

pub fn load_network<P: AsRef<Path>>(path: P) -> LstmResult<LoadedNetwork> {
    let data = fs::read(path)?;
    decode_network(&data)
}

/// Scalars in one layer of shape `(x, n, y)`, or `None` on overflow.
fn layer_float_count(x: usize, n: usize, y: usize) -> Option<usize> {
    let s = x.checked_add(n)?;
    let gates = n.checked_mul(s)?.checked_mul(4)?;
    let projection = y.checked_mul(n)?;
    let biases = n.checked_mul(4)?.checked_add(y)?;
    gates.checked_add(projection)?.checked_add(biases)
}

fn read_int(cursor: &mut Cursor<&[u8]>, what: &str) -> LstmResult<i64> {
    let mut line = Vec::new();
    cursor.read_until(b'\n', &mut line)?;
    if line.last() != Some(&b'\n') {
        return Err(LstmError::Format(format!("unexpected end of file reading {what}")));
    }
    let text = std::str::from_utf8(&line)
        .map_err(|_| LstmError::Format(format!("non-ASCII header line for {what}")))?;
    text.trim()
        .parse::<i64>()
        .map_err(|_| LstmError::Format(format!("invalid {what}: {:?}", text.trim())))
}

fn read_count(cursor: &mut Cursor<&[u8]>, what: &str) -> LstmResult<usize> {
    let v = read_int(cursor, what)?;
    if v <= 0 {
        return Err(LstmError::Format(format!("{what} must be positive, got {v}")));
    }
    Ok(v as usize)
}

fn read_f64s(cursor: &mut Cursor<&[u8]>, out: &mut [f64]) -> LstmResult<()> {
    let mut bytes = [0u8; 8];
    for v in out.iter_mut() {
        cursor
            .read_exact(&mut bytes)
            .map_err(|_| LstmError::Format("truncated weight data".into()))?;
        *v = f64::from_ne_bytes(bytes);
    }
    Ok(())
}
