//! Static cost analysis for serialized neural-network computation graphs.
//!
//! Given a JSON graph document (nodes, stored tensors and declared I/O
//! shapes), the crate reconstructs every operator's output shape by
//! propagating the declared input shape through the operator sequence, then
//! estimates per-operator FLOP counts and byte traffic and renders them as
//! a summary table. Shapes and costs only; no values are ever computed.
//!
//! ```no_run
//! use FlopScope::{Graph, GraphDef};
//!
//! # fn main() -> anyhow::Result<()> {
//! let json = std::fs::read_to_string("assets/example_graph.json")?;
//! let graph = Graph::from_def(&GraphDef::from_json(&json)?)?;
//! for row in graph.summarize()? {
//!     println!("{}: {} FLOP", row.operator, row.flop);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod json_graph;
pub mod operator;
pub mod report;
pub mod tensor;

pub use error::AnalysisError;
pub use graph::Graph;
pub use json_graph::GraphDef;
pub use report::ReportRow;
pub use tensor::{DataType, TensorInfo};
