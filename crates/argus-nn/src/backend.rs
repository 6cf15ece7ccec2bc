//! The narrow interface between the pose-estimation pipeline and a concrete neural-network
//! runtime. The pipeline itself never names a runtime directly — only [`InferenceBackend`] — so
//! it can be tested against a fake and run against whichever real backend a caller enables.

use crate::{Error, Tensor};

/// A named tensor, as produced by or fed into a model.
pub struct NamedTensor<'a> {
    pub name: &'a str,
    pub tensor: Tensor,
}

/// A loaded, runnable model.
///
/// Implementors own whatever native resources the underlying runtime needs (a `tract` plan, a
/// `wonnx` GPU session, ...); those are released by the implementor's own `Drop` impl, the same
/// as any other Rust value — there is no separate explicit "unload" step.
pub trait InferenceBackend {
    /// Returns the expected shape of the named input, or `None` if the model has no such input.
    fn input_shape(&self, name: &str) -> Option<&[usize]>;

    /// Returns the expected shape of the named output, or `None` if the model has no such output.
    fn output_shape(&self, name: &str) -> Option<&[usize]>;

    /// Runs inference, feeding `inputs` and returning exactly the named outputs in `output_names`,
    /// in the same order.
    ///
    /// Requesting a subset of a model's outputs (rather than always computing all of them) lets a
    /// caller skip decoding outputs it doesn't need for a given frame, e.g. a segmentation mask
    /// output when segmentation is disabled.
    fn run(&self, inputs: &[NamedTensor<'_>], output_names: &[&str]) -> Result<Vec<Tensor>, Error>;
}

/// Loads model bytes into a concrete [`InferenceBackend`].
///
/// Kept as its own trait (rather than an associated function on [`InferenceBackend`]) so a
/// pipeline can be generic over "some backend, loaded however the caller likes" without requiring
/// `Self: Sized`.
pub trait ModelLoader {
    type Backend: InferenceBackend;

    fn load(model_bytes: &[u8]) -> Result<Self::Backend, Error>;
}

/// An in-memory fake backend for testing pipeline wiring without a real model file.
///
/// Returns zero-filled tensors of the shape requested at construction time; useful for exercising
/// the pipeline state machine's control flow (ROI tracking, filter resets, ...) independent of any
/// actual model weights.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    inputs: Vec<(String, Vec<usize>)>,
    outputs: Vec<(String, Vec<usize>)>,
}

impl FakeBackend {
    pub fn new(inputs: Vec<(String, Vec<usize>)>, outputs: Vec<(String, Vec<usize>)>) -> Self {
        Self { inputs, outputs }
    }
}

impl InferenceBackend for FakeBackend {
    fn input_shape(&self, name: &str) -> Option<&[usize]> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, s)| s.as_slice())
    }

    fn output_shape(&self, name: &str) -> Option<&[usize]> {
        self.outputs.iter().find(|(n, _)| n == name).map(|(_, s)| s.as_slice())
    }

    fn run(&self, _inputs: &[NamedTensor<'_>], output_names: &[&str]) -> Result<Vec<Tensor>, Error> {
        output_names
            .iter()
            .map(|name| {
                let shape = self.output_shape(name).ok_or_else(|| Error::UnknownTensor(name.to_string()))?;
                Ok(Tensor::from_dyn_shape_fn(shape, |_| 0.0))
            })
            .collect()
    }
}

#[cfg(feature = "tract")]
mod tract_backend {
    use std::sync::Arc;

    use tract_onnx::prelude::{Framework, Graph, InferenceModelExt, SimplePlan, TypedFact, TypedOp};

    use super::*;

    type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

    /// An [`InferenceBackend`] running a model on the CPU via `tract`.
    #[derive(Clone)]
    pub struct TractBackend(Arc<Model>);

    impl TractBackend {
        pub fn load(model_bytes: &[u8]) -> Result<Self, Error> {
            let graph = tract_onnx::onnx()
                .model_for_read(&mut &*model_bytes)
                .map_err(|e| Error::Load(e.to_string()))?;
            let model = graph
                .into_optimized()
                .and_then(|m| m.into_runnable())
                .map_err(|e| Error::Load(e.to_string()))?;
            log::debug!("loaded tract model ({} bytes)", model_bytes.len());
            Ok(Self(Arc::new(model)))
        }

        fn names(&self, outputs: bool) -> Vec<String> {
            let model = self.0.model();
            let outlets = if outputs { model.output_outlets() } else { model.input_outlets() };
            outlets
                .unwrap_or(&[])
                .iter()
                .map(|outlet| model.node(outlet.node).name.clone())
                .collect()
        }
    }

    impl InferenceBackend for TractBackend {
        fn input_shape(&self, name: &str) -> Option<&[usize]> {
            let model = self.0.model();
            let id = self.names(false).iter().position(|n| n == name)?;
            model.input_fact(id).ok()?.shape.as_concrete()
        }

        fn output_shape(&self, name: &str) -> Option<&[usize]> {
            let model = self.0.model();
            let id = self.names(true).iter().position(|n| n == name)?;
            model.output_fact(id).ok()?.shape.as_concrete()
        }

        fn run(&self, inputs: &[NamedTensor<'_>], output_names: &[&str]) -> Result<Vec<Tensor>, Error> {
            let input_names = self.names(false);
            let mut ordered = Vec::with_capacity(input_names.len());
            for name in &input_names {
                let found = inputs
                    .iter()
                    .find(|t| &t.name == name)
                    .ok_or_else(|| Error::UnknownTensor(name.clone()))?;
                ordered.push(found.tensor.to_tract());
            }

            let outputs = self.0.run(ordered.into()).map_err(|e| Error::Inference(e.to_string()))?;
            let output_names_all = self.names(true);

            output_names
                .iter()
                .map(|name| {
                    let id = output_names_all
                        .iter()
                        .position(|n| n == name)
                        .ok_or_else(|| Error::UnknownTensor(name.to_string()))?;
                    Ok(Tensor::from_tract(&outputs[id]))
                })
                .collect()
        }
    }
}

#[cfg(feature = "tract")]
pub use tract_backend::TractBackend;
