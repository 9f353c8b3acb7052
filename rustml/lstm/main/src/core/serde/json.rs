//! Write-only JSON export of a trained network.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value, json};

use crate::api::error::LstmResult;
use crate::core::data::symbols::SymbolTable;
use crate::core::nn::params::PARAM_NAMES;
use crate::core::nn::stack::LayerStack;

/// Round to the 15 decimals the export carries.
fn fixed(v: f64) -> Value {
    format!("{v:.15}")
        .parse::<f64>()
        .map(Value::from)
        .unwrap_or(Value::Null)
}

fn vector(values: &[f64]) -> Value {
    Value::Array(values.iter().map(|&v| fixed(v)).collect())
}

fn matrix(values: &[f64], cols: usize) -> Value {
    Value::Array(values.chunks(cols).map(vector).collect())
}

/// Build the export document. Keys keep insertion order.
pub fn network_to_json(stack: &LayerStack, symbols: &SymbolTable, feature_key: &str) -> Value {
    let mut root = Map::new();

    let mapping: Map<String, Value> = symbols
        .symbols()
        .iter()
        .enumerate()
        .map(|(i, &s)| (i.to_string(), Value::String(s.to_string())))
        .collect();
    root.insert(feature_key.to_string(), Value::Object(mapping));
    root.insert("LSTM layers".to_string(), json!(stack.len()));

    for (p, layer) in stack.layers().iter().enumerate() {
        let params = layer.params();
        let mut entry = Map::new();
        for (name, values) in PARAM_NAMES.iter().zip(params.buffers()) {
            let value = match *name {
                "Wy" => matrix(values, params.neurons()),
                n if n.starts_with('W') => matrix(values, params.concat_size()),
                _ => vector(values),
            };
            entry.insert(name.to_string(), value);
        }
        root.insert(format!("Layer {}", p + 1), Value::Object(entry));
    }

    Value::Object(root)
}

pub fn store_network_json<P: AsRef<Path>>(
    path: P,
    stack: &LayerStack,
    symbols: &SymbolTable,
    feature_key: &str,
) -> LstmResult<()> {
    let doc = network_to_json(stack, symbols, feature_key);
    fs::write(path, serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_document_layout() {
        let stack = LayerStack::new(2, 3, 2, false, &mut StdRng::seed_from_u64(5)).unwrap();
        let symbols = SymbolTable::from_symbols(b"ab").unwrap();
        let doc = network_to_json(&stack, &symbols, "Feature mapping");

        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Feature mapping", "LSTM layers", "Layer 1", "Layer 2"]);
        assert_eq!(doc["Feature mapping"]["0"], "97");
        assert_eq!(doc["LSTM layers"], 2);

        let layer = &doc["Layer 1"];
        // output layer: Wy is 2 x 3, gates are 3 x 6
        assert_eq!(layer["Wy"].as_array().unwrap().len(), 2);
        assert_eq!(layer["Wy"][0].as_array().unwrap().len(), 3);
        assert_eq!(layer["Wf"].as_array().unwrap().len(), 3);
        assert_eq!(layer["Wf"][0].as_array().unwrap().len(), 6);
        assert_eq!(layer["bo"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_values_rounded_to_fifteen_decimals() {
        assert_eq!(fixed(0.1234567890123456789), json!(0.123456789012346));
    }
}
