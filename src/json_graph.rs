use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tensor::DataType;

/// One dimension in a declared input/output shape: either a fixed value or
/// a symbolic name whose concrete value the document leaves open.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum JsonDim {
    Value(i64),
    Symbol(String),
}

impl JsonDim {
    /// Concrete value of the dimension; unknown dimensions default to 1.
    pub fn concrete_or_default(&self) -> i64 {
        match self {
            JsonDim::Value(v) if *v > 0 => *v,
            _ => 1,
        }
    }
}

/// Attribute payloads come in two arities on the wire: a single integer or
/// a list of integers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Ints(Vec<i64>),
}

impl AttrValue {
    pub fn as_ints(&self) -> Vec<i64> {
        match self {
            AttrValue::Int(v) => vec![*v],
            AttrValue::Ints(v) => v.clone(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Ints(v) => v.first().copied(),
        }
    }
}

/// A stored tensor record: learned weights and biases embedded in the
/// document together with their dims and element type.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TensorDef {
    pub name: String,
    pub dims: Vec<i64>,
    pub data_type: DataType,
}

/// A declared graph input or output.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValueInfoDef {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<JsonDim>,
    // Default data type if not specified
    #[serde(default)]
    pub data_type: DataType,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeDef {
    pub name: String,
    pub op_type: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, AttrValue>,
}

/// The deserialized graph document. Parsing the on-disk JSON into this
/// structure is the whole of the I/O layer; everything downstream works on
/// the structs.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GraphDef {
    #[serde(default)]
    pub name: String,
    pub inputs: Vec<ValueInfoDef>,
    pub outputs: Vec<ValueInfoDef>,
    #[serde(default)]
    pub initializers: Vec<TensorDef>,
    pub nodes: Vec<NodeDef>,
}

impl GraphDef {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dims_parse_as_values_or_symbols() {
        let dims: Vec<JsonDim> = serde_json::from_str(r#"["N", 3, 32, 32]"#).unwrap();
        assert_eq!(dims[0], JsonDim::Symbol("N".to_string()));
        assert_eq!(dims[1], JsonDim::Value(3));
        assert_eq!(dims[0].concrete_or_default(), 1);
        assert_eq!(dims[2].concrete_or_default(), 32);
    }

    #[test]
    fn attributes_parse_as_scalar_or_list() {
        let attrs: HashMap<String, AttrValue> =
            serde_json::from_str(r#"{"group": 1, "pads": [1, 1]}"#).unwrap();
        assert_eq!(attrs["group"].as_int(), Some(1));
        assert_eq!(attrs["group"].as_ints(), vec![1]);
        assert_eq!(attrs["pads"].as_ints(), vec![1, 1]);
    }

    #[test]
    fn minimal_document_parses() {
        let def = GraphDef::from_json(
            r#"{
                "name": "g",
                "inputs": [{"name": "data", "shape": [1, 3, 8, 8]}],
                "outputs": [{"name": "out", "shape": [1, 10]}],
                "nodes": [{"name": "relu0", "op_type": "Relu",
                           "inputs": ["data"], "outputs": ["out"]}]
            }"#,
        )
        .unwrap();
        assert_eq!(def.name, "g");
        assert_eq!(def.inputs[0].data_type, DataType::F32);
        assert!(def.initializers.is_empty());
        assert_eq!(def.nodes[0].op_type, "Relu");
    }
}
