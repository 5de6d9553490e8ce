use thiserror::Error;

/// Errors raised while building the graph model or computing costs.
///
/// All of these abort the analysis at the point of violation; there is no
/// retry and no partial report. Unknown operator kinds and unknown tensor
/// names are not errors (see `OpKind::Other` and `Graph::summarize`).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("tensor '{name}' has invalid shape {dims:?}: dimensions must be non-empty and positive")]
    InvalidShape { name: String, dims: Vec<i64> },

    #[error("convolution '{op}' is missing required attribute '{attribute}'")]
    MissingAttribute { op: String, attribute: &'static str },

    #[error("convolution '{op}' has no resolved weight tensor; resolve weight/bias before shape inference")]
    MissingWeight { op: String },

    #[error("cannot tell weight from bias for convolution '{op}': exactly one of its parameter inputs must have rank 4")]
    AmbiguousConvInputs { op: String },

    #[error("operator '{op}' expects a rank-{expected} input, got rank {actual}")]
    InvalidRank {
        op: String,
        expected: usize,
        actual: usize,
    },

    #[error("cost requested for operator '{op}' before shape inference ran")]
    ShapeNotInferred { op: String },

    #[error("operator '{op}' has no input resolvable to a known tensor")]
    UnresolvedInput { op: String },

    #[error("operator dependencies form a cycle, no topological order exists")]
    CyclicGraph,

    #[error("graph document declares no {0} tensor")]
    MissingGraphIo(&'static str),
}
