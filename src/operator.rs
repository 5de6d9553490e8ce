use std::collections::HashMap;

use crate::error::AnalysisError;
use crate::json_graph::{AttrValue, NodeDef};
use crate::tensor::TensorInfo;

/// Operator kinds with dedicated shape or cost rules. Everything else falls
/// into `Other`: shape-preserving and zero FLOP, so unsupported kinds never
/// halt the analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    Conv,
    Clip,
    Add,
    GlobalAveragePool,
    Gemm,
    Other(String),
}

impl OpKind {
    pub fn from_op_type(op_type: &str) -> Self {
        match op_type {
            "Conv" => OpKind::Conv,
            "Clip" => OpKind::Clip,
            "Add" => OpKind::Add,
            "GlobalAveragePool" => OpKind::GlobalAveragePool,
            "Gemm" => OpKind::Gemm,
            other => OpKind::Other(other.to_string()),
        }
    }
}

/// Convolution attributes, pulled out of the node's attribute bag once at
/// construction time. Shape inference only reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvAttrs {
    pub pads: Option<Vec<i64>>,
    pub strides: Option<Vec<i64>>,
    pub dilations: Option<Vec<i64>>,
    pub kernel_shape: Option<Vec<i64>>,
    pub group: i64,
}

impl ConvAttrs {
    pub fn from_attributes(attrs: &HashMap<String, AttrValue>) -> Self {
        let ints = |name: &str| -> Option<Vec<i64>> {
            attrs.get(name).map(AttrValue::as_ints).filter(|v| !v.is_empty())
        };
        Self {
            pads: ints("pads"),
            strides: ints("strides"),
            dilations: ints("dilations"),
            kernel_shape: ints("kernel_shape"),
            group: attrs.get("group").and_then(AttrValue::as_int).unwrap_or(1),
        }
    }
}

/// One graph node: kind, ordered input/output tensor names, and for
/// convolutions the parsed attributes and resolved weight/bias descriptors.
///
/// `input_shape` and `output_shape` are filled exactly once, when shape
/// inference runs for this operator, and are read-only results afterwards.
#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub kind: OpKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attrs: Option<ConvAttrs>,
    pub weight: Option<TensorInfo>,
    pub bias: Option<TensorInfo>,
    pub input_shape: Option<Vec<usize>>,
    pub output_shape: Option<Vec<usize>>,
}

impl Operator {
    pub fn from_def(def: &NodeDef) -> Self {
        let kind = OpKind::from_op_type(&def.op_type);
        let attrs = (kind == OpKind::Conv).then(|| ConvAttrs::from_attributes(&def.attributes));
        Self {
            name: def.name.clone(),
            kind,
            inputs: def.inputs.clone(),
            outputs: def.outputs.clone(),
            attrs,
            weight: None,
            bias: None,
            input_shape: None,
            output_shape: None,
        }
    }

    /// Derives the output shape from `input_shape` and the operator's
    /// attributes, recording both shapes on the operator. Deterministic and
    /// pure given the attributes; for convolutions the weight must already
    /// be resolved.
    pub fn infer_output_shape(
        &mut self,
        input_shape: &[usize],
    ) -> Result<Vec<usize>, AnalysisError> {
        let output = match self.kind {
            OpKind::Conv => self.infer_conv(input_shape)?,
            // Clip is elementwise; every unhandled kind is assumed
            // shape-preserving as well.
            _ => input_shape.to_vec(),
        };
        self.input_shape = Some(input_shape.to_vec());
        self.output_shape = Some(output.clone());
        Ok(output)
    }

    fn infer_conv(&self, input: &[usize]) -> Result<Vec<usize>, AnalysisError> {
        let weight = self.weight.as_ref().ok_or_else(|| AnalysisError::MissingWeight {
            op: self.name.clone(),
        })?;
        if input.len() != 4 {
            return Err(AnalysisError::InvalidRank {
                op: self.name.clone(),
                expected: 4,
                actual: input.len(),
            });
        }
        let (p0, p1) = self.required_pair(|a| &a.pads, "pads")?;
        let (s0, s1) = self.required_pair(|a| &a.strides, "strides")?;
        let (d0, d1) = self.required_pair(|a| &a.dilations, "dilations")?;
        let (k0, k1) = self.required_pair(|a| &a.kernel_shape, "kernel_shape")?;

        // Output spatial extent of a padded, strided, dilated convolution,
        // per https://pytorch.org/docs/stable/generated/torch.nn.Conv2d.html
        let spatial = |extent: usize, p: i64, d: i64, k: i64, s: i64| -> usize {
            ((extent as i64 + 2 * p - d * (k - 1) - 1) / s.max(1) + 1).max(0) as usize
        };

        Ok(vec![
            input[0],
            weight.dims[0],
            spatial(input[2], p0, d0, k0, s0),
            spatial(input[3], p1, d1, k1, s1),
        ])
    }

    /// First two entries of a required convolution attribute, one per
    /// spatial axis. A scalar attribute applies to both axes.
    fn required_pair(
        &self,
        field: impl Fn(&ConvAttrs) -> &Option<Vec<i64>>,
        name: &'static str,
    ) -> Result<(i64, i64), AnalysisError> {
        let missing = || AnalysisError::MissingAttribute {
            op: self.name.clone(),
            attribute: name,
        };
        let values = self
            .attrs
            .as_ref()
            .and_then(|a| field(a).as_ref())
            .ok_or_else(missing)?;
        let first = *values.first().ok_or_else(missing)?;
        Ok((first, *values.get(1).unwrap_or(&first)))
    }

    /// Estimated arithmetic cost of this operator. Requires shape inference
    /// to have run.
    pub fn flop(&self) -> Result<u64, AnalysisError> {
        let not_inferred = || AnalysisError::ShapeNotInferred {
            op: self.name.clone(),
        };
        let input = self.input_shape.as_ref().ok_or_else(not_inferred)?;
        let output = self.output_shape.as_ref().ok_or_else(not_inferred)?;

        let count = match &self.kind {
            OpKind::Conv => {
                let weight = self.weight.as_ref().ok_or_else(|| AnalysisError::MissingWeight {
                    op: self.name.clone(),
                })?;
                if input.len() != 4 {
                    return Err(AnalysisError::InvalidRank {
                        op: self.name.clone(),
                        expected: 4,
                        actual: input.len(),
                    });
                }
                let (k0, k1) = self.required_pair(|a| &a.kernel_shape, "kernel_shape")?;
                // Multiply-accumulate estimate, eq. 2 of the MobileNet
                // paper (arXiv:1704.04861). Not divided by the group count.
                input[1] as u64
                    * weight.dims[0] as u64
                    * (k0 * k1) as u64
                    * input[2] as u64
                    * input[3] as u64
            }
            OpKind::Clip | OpKind::Add | OpKind::GlobalAveragePool => element_count(input),
            OpKind::Gemm => element_count(input) * element_count(output),
            OpKind::Other(_) => 0,
        };
        Ok(count)
    }
}

fn element_count(dims: &[usize]) -> u64 {
    dims.iter().map(|&d| d as u64).product()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::DataType;

    fn conv_op(pads: &[i64], strides: &[i64], dilations: &[i64], kernel: &[i64]) -> Operator {
        let mut op = Operator::from_def(&NodeDef {
            name: "conv0".to_string(),
            op_type: "Conv".to_string(),
            inputs: vec!["x".into(), "w".into(), "b".into()],
            outputs: vec!["y".into()],
            attributes: HashMap::new(),
        });
        op.attrs = Some(ConvAttrs {
            pads: Some(pads.to_vec()),
            strides: Some(strides.to_vec()),
            dilations: Some(dilations.to_vec()),
            kernel_shape: Some(kernel.to_vec()),
            group: 1,
        });
        op
    }

    fn weight(dims: Vec<usize>) -> TensorInfo {
        TensorInfo::new("w", dims, DataType::F32).unwrap()
    }

    #[test]
    fn identity_convolution_keeps_spatial_dims() {
        let mut op = conv_op(&[0, 0], &[1, 1], &[1, 1], &[1, 1]);
        op.weight = Some(weight(vec![8, 4, 1, 1]));
        let out = op.infer_output_shape(&[1, 4, 7, 9]).unwrap();
        assert_eq!(out, vec![1, 8, 7, 9]);
    }

    #[test]
    fn padded_convolution_shape_and_flop() {
        let mut op = conv_op(&[1, 1], &[1, 1], &[1, 1], &[3, 3]);
        op.weight = Some(weight(vec![16, 3, 3, 3]));
        let out = op.infer_output_shape(&[1, 3, 32, 32]).unwrap();
        assert_eq!(out, vec![1, 16, 32, 32]);
        assert_eq!(op.flop().unwrap(), 3 * 16 * 3 * 3 * 32 * 32);
        assert_eq!(op.flop().unwrap(), 1_474_560);
    }

    #[test]
    fn strided_convolution_halves_spatial_dims() {
        let mut op = conv_op(&[1, 1], &[2, 2], &[1, 1], &[3, 3]);
        op.weight = Some(weight(vec![32, 16, 3, 3]));
        let out = op.infer_output_shape(&[1, 16, 224, 224]).unwrap();
        assert_eq!(out, vec![1, 32, 112, 112]);
    }

    #[test]
    fn scalar_attribute_applies_to_both_axes() {
        let mut op = conv_op(&[1], &[1], &[1], &[3]);
        op.weight = Some(weight(vec![16, 3, 3, 3]));
        let out = op.infer_output_shape(&[1, 3, 32, 32]).unwrap();
        assert_eq!(out, vec![1, 16, 32, 32]);
    }

    #[test]
    fn convolution_without_weight_fails() {
        let mut op = conv_op(&[1, 1], &[1, 1], &[1, 1], &[3, 3]);
        let err = op.infer_output_shape(&[1, 3, 32, 32]).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingWeight { .. }));
    }

    #[test]
    fn convolution_without_attributes_fails() {
        let mut op = conv_op(&[1, 1], &[1, 1], &[1, 1], &[3, 3]);
        op.attrs.as_mut().unwrap().strides = None;
        op.weight = Some(weight(vec![16, 3, 3, 3]));
        let err = op.infer_output_shape(&[1, 3, 32, 32]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::MissingAttribute {
                op: "conv0".to_string(),
                attribute: "strides",
            }
        );
    }

    #[test]
    fn convolution_rejects_non_rank_4_input() {
        let mut op = conv_op(&[1, 1], &[1, 1], &[1, 1], &[3, 3]);
        op.weight = Some(weight(vec![16, 3, 3, 3]));
        let err = op.infer_output_shape(&[3, 32, 32]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRank { actual: 3, .. }));
    }

    #[test]
    fn clip_preserves_shape_and_counts_one_flop_per_element() {
        let mut op = Operator::from_def(&NodeDef {
            name: "clip0".to_string(),
            op_type: "Clip".to_string(),
            inputs: vec!["x".into()],
            outputs: vec!["y".into()],
            attributes: HashMap::new(),
        });
        let out = op.infer_output_shape(&[1, 16, 32, 32]).unwrap();
        assert_eq!(out, vec![1, 16, 32, 32]);
        assert_eq!(op.flop().unwrap(), 16 * 32 * 32);
    }

    #[test]
    fn gemm_flop_is_input_times_output_elements() {
        let mut op = Operator::from_def(&NodeDef {
            name: "fc".to_string(),
            op_type: "Gemm".to_string(),
            inputs: vec!["x".into()],
            outputs: vec!["y".into()],
            attributes: HashMap::new(),
        });
        op.input_shape = Some(vec![1, 512]);
        op.output_shape = Some(vec![1, 1000]);
        assert_eq!(op.flop().unwrap(), 512_000);
    }

    #[test]
    fn unknown_kind_preserves_shape_at_zero_cost() {
        let mut op = Operator::from_def(&NodeDef {
            name: "softmax0".to_string(),
            op_type: "Softmax".to_string(),
            inputs: vec!["x".into()],
            outputs: vec!["y".into()],
            attributes: HashMap::new(),
        });
        assert_eq!(op.kind, OpKind::Other("Softmax".to_string()));
        let out = op.infer_output_shape(&[1, 1000]).unwrap();
        assert_eq!(out, vec![1, 1000]);
        assert_eq!(op.flop().unwrap(), 0);
    }

    #[test]
    fn flop_before_inference_fails() {
        let op = Operator::from_def(&NodeDef {
            name: "clip0".to_string(),
            op_type: "Clip".to_string(),
            inputs: vec![],
            outputs: vec![],
            attributes: HashMap::new(),
        });
        let err = op.flop().unwrap_err();
        assert!(matches!(err, AnalysisError::ShapeNotInferred { .. }));
    }
}
