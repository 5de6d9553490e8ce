use std::collections::HashMap;

use log::debug;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::error::AnalysisError;
use crate::json_graph::{GraphDef, JsonDim, ValueInfoDef};
use crate::operator::{OpKind, Operator};
use crate::report::ReportRow;
use crate::tensor::TensorInfo;

/// Table key of the declared graph input, whatever its original name.
pub const INPUT_KEY: &str = "input";
/// Table key of the declared graph output.
pub const OUTPUT_KEY: &str = "output";

/// The graph model: every tensor the analysis knows about (initializers,
/// declared I/O and all materialized operator outputs) plus the operator
/// sequence in document order. Built once, read-only afterwards.
#[derive(Debug)]
pub struct Graph {
    pub name: String,
    tensors: Vec<TensorInfo>,
    tensor_index: HashMap<String, usize>,
    pub operators: Vec<Operator>,
    input_alias: String,
}

impl Graph {
    pub fn from_def(def: &GraphDef) -> Result<Self, AnalysisError> {
        let mut graph = Graph {
            name: def.name.clone(),
            tensors: Vec::new(),
            tensor_index: HashMap::new(),
            operators: Vec::new(),
            input_alias: String::new(),
        };
        graph.parse_initializers(def)?;
        graph.resolve_io(def)?;
        graph.build_operators(def)?;
        graph.propagate_shapes()?;
        Ok(graph)
    }

    /// 1. Stored tensors, in document order.
    fn parse_initializers(&mut self, def: &GraphDef) -> Result<(), AnalysisError> {
        for init in &def.initializers {
            let tensor = TensorInfo::from_document(&init.name, &init.dims, init.data_type)?;
            debug!("initializer: {}", tensor);
            self.insert_tensor(tensor);
        }
        Ok(())
    }

    /// 2. First declared input and output, under the fixed table keys. The
    /// original input name is kept as an alias so operators referencing it
    /// resolve to the same descriptor.
    fn resolve_io(&mut self, def: &GraphDef) -> Result<(), AnalysisError> {
        let input = def
            .inputs
            .first()
            .ok_or(AnalysisError::MissingGraphIo("input"))?;
        let output = def
            .outputs
            .first()
            .ok_or(AnalysisError::MissingGraphIo("output"))?;
        self.input_alias = input.name.clone();
        let t = Self::io_tensor(input, INPUT_KEY)?;
        self.insert_tensor(t);
        let t = Self::io_tensor(output, OUTPUT_KEY)?;
        self.insert_tensor(t);
        Ok(())
    }

    /// Declared I/O shapes may leave dimensions symbolic; those default to 1.
    fn io_tensor(info: &ValueInfoDef, key: &str) -> Result<TensorInfo, AnalysisError> {
        let dims: Vec<i64> = info.shape.iter().map(JsonDim::concrete_or_default).collect();
        TensorInfo::from_document(key, &dims, info.data_type)
    }

    /// 3. Operators in document order, resolving convolution parameters.
    fn build_operators(&mut self, def: &GraphDef) -> Result<(), AnalysisError> {
        for node in &def.nodes {
            let mut op = Operator::from_def(node);
            if op.kind == OpKind::Conv {
                let (weight, bias) = self.classify_conv_params(&op)?;
                op.weight = Some(weight);
                op.bias = Some(bias);
            }
            self.operators.push(op);
        }
        Ok(())
    }

    /// Rank-based weight/bias detection: the wire format does not fix the
    /// order of the two convolution parameter inputs, so the rank-4
    /// candidate is taken as the weight.
    fn classify_conv_params(
        &self,
        op: &Operator,
    ) -> Result<(TensorInfo, TensorInfo), AnalysisError> {
        let missing = || AnalysisError::MissingWeight {
            op: op.name.clone(),
        };
        let a = op
            .inputs
            .get(1)
            .and_then(|n| self.tensor(n))
            .ok_or_else(missing)?;
        let b = op
            .inputs
            .get(2)
            .and_then(|n| self.tensor(n))
            .ok_or_else(missing)?;
        match (a.rank() == 4, b.rank() == 4) {
            (true, false) => Ok((a.clone(), b.clone())),
            (false, true) => Ok((b.clone(), a.clone())),
            _ => Err(AnalysisError::AmbiguousConvInputs {
                op: op.name.clone(),
            }),
        }
    }

    /// 4. Shape propagation over an explicit dependency graph: one node per
    /// operator, an edge from the producer of a tensor to every operator
    /// consuming it by name, traversed in topological order. Each inferred
    /// output shape materializes a new tensor under the operator's first
    /// output name, carrying the element type of the resolved input.
    fn propagate_shapes(&mut self) -> Result<(), AnalysisError> {
        let mut dep: DiGraph<usize, ()> = DiGraph::new();
        let indices: Vec<_> = (0..self.operators.len()).map(|i| dep.add_node(i)).collect();

        let mut producer: HashMap<&str, usize> = HashMap::new();
        for (i, op) in self.operators.iter().enumerate() {
            for out in &op.outputs {
                producer.entry(out.as_str()).or_insert(i);
            }
        }
        for (i, op) in self.operators.iter().enumerate() {
            for input in &op.inputs {
                if let Some(&p) = producer.get(input.as_str()) {
                    if p != i {
                        dep.add_edge(indices[p], indices[i], ());
                    }
                }
            }
        }

        let order = toposort(&dep, None).map_err(|_| AnalysisError::CyclicGraph)?;

        for node in order {
            let i = dep[node];
            let source = self.resolve_activation(&self.operators[i])?.clone();
            let op = &mut self.operators[i];
            let output_dims = op.infer_output_shape(&source.dims)?;
            let output_name = match op.outputs.first() {
                Some(n) => n.clone(),
                None => continue,
            };
            debug!("{}: {:?} -> {:?}", op.name, source.dims, output_dims);
            let tensor = TensorInfo::new(output_name, output_dims, source.dtype)?;
            self.insert_tensor(tensor);
        }
        Ok(())
    }

    /// The operator's effective data input: the first declared input name,
    /// skipping convolution parameter tensors, that maps to a known tensor.
    /// Node references use the graph input's original name, so that name is
    /// matched through the recorded alias.
    fn resolve_activation(&self, op: &Operator) -> Result<&TensorInfo, AnalysisError> {
        let is_param = |name: &str| {
            op.weight.as_ref().is_some_and(|w| w.name == name)
                || op.bias.as_ref().is_some_and(|b| b.name == name)
        };
        op.inputs
            .iter()
            .filter(|n| !is_param(n.as_str()))
            .find_map(|n| self.lookup_activation(n))
            .ok_or_else(|| AnalysisError::UnresolvedInput {
                op: op.name.clone(),
            })
    }

    fn lookup_activation(&self, name: &str) -> Option<&TensorInfo> {
        if name == self.input_alias || name == INPUT_KEY {
            return self.tensor(INPUT_KEY);
        }
        self.tensor(name)
    }

    fn insert_tensor(&mut self, tensor: TensorInfo) {
        match self.tensor_index.get(&tensor.name) {
            Some(&i) => self.tensors[i] = tensor,
            None => {
                self.tensor_index.insert(tensor.name.clone(), self.tensors.len());
                self.tensors.push(tensor);
            }
        }
    }

    pub fn tensor(&self, name: &str) -> Option<&TensorInfo> {
        self.tensor_index.get(name).map(|&i| &self.tensors[i])
    }

    /// All known tensors, in insertion order.
    pub fn tensors(&self) -> impl Iterator<Item = &TensorInfo> {
        self.tensors.iter()
    }

    /// One report row per operator, in document order. Reading the model
    /// does not mutate it; calling this twice yields identical rows.
    pub fn summarize(&self) -> Result<Vec<ReportRow>, AnalysisError> {
        let mut rows = Vec::with_capacity(self.operators.len());
        for op in &self.operators {
            rows.push(ReportRow {
                operator: op.name.clone(),
                flop: op.flop()?,
                bytes_in: self.total_bytes(&op.inputs),
                bytes_out: self.total_bytes(&op.outputs),
            });
        }
        Ok(rows)
    }

    /// Names missing from the table reference tensors outside the modeled
    /// set (e.g. ignored optional inputs); they are skipped, not an error.
    fn total_bytes(&self, names: &[String]) -> u64 {
        names
            .iter()
            .filter_map(|n| self.tensor(n))
            .map(|t| t.size_bytes as u64)
            .sum()
    }
}
