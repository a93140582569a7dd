use burn::module::Param;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::tensor::TensorData;

use crate::checkpoint::{ParameterSet, StateDict};
use crate::error::CheckpointError;

/// Re-ID classifier head on top of pooled backbone features.
///
/// ```text
/// Input:     [batch, input_dim]   pooled backbone features
/// Embedding: input_dim -> feature_dim, ReLU
/// FC:        feature_dim -> num_classes (one logit per training identity)
/// ```
#[derive(Module, Debug)]
pub struct ReidClassifier<B: Backend> {
    embedding: Linear<B>,
    fc: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct ReidClassifierConfig {
    pub input_dim: usize,
    pub num_classes: usize,
    #[config(default = 256)]
    pub feature_dim: usize,
}

impl ReidClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ReidClassifier<B> {
        ReidClassifier {
            embedding: LinearConfig::new(self.input_dim, self.feature_dim).init(device),
            fc: LinearConfig::new(self.feature_dim, self.num_classes).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> ReidClassifier<B> {
    /// Identity embedding used for retrieval: [batch, input_dim] -> [batch, feature_dim].
    pub fn embed(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.relu.forward(self.embedding.forward(input))
    }

    /// Classification logits: [batch, input_dim] -> [batch, num_classes].
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.fc.forward(self.embed(input))
    }

    pub fn num_classes(&self) -> usize {
        self.fc.weight.val().dims()[1]
    }
}

fn export_linear<B: Backend>(params: &mut ParameterSet, prefix: &str, linear: &Linear<B>) {
    params.insert(format!("{prefix}.weight"), linear.weight.val().into_data());
    if let Some(bias) = &linear.bias {
        params.insert(format!("{prefix}.bias"), bias.val().into_data());
    }
}

fn take_checked(
    params: &mut ParameterSet,
    key: String,
    expected: Vec<usize>,
) -> Result<TensorData, CheckpointError> {
    let data = params
        .remove(&key)
        .ok_or_else(|| CheckpointError::MissingParameter(key.clone()))?;
    if data.shape != expected {
        return Err(CheckpointError::ShapeMismatch {
            key,
            expected,
            found: data.shape.clone(),
        });
    }
    Ok(data)
}

/// Validated replacement values for one linear layer.
struct LinearValues {
    weight: TensorData,
    bias: Option<TensorData>,
}

fn take_linear<B: Backend>(
    params: &mut ParameterSet,
    prefix: &str,
    linear: &Linear<B>,
) -> Result<LinearValues, CheckpointError> {
    let weight = take_checked(
        params,
        format!("{prefix}.weight"),
        linear.weight.val().dims().to_vec(),
    )?;
    let bias = match &linear.bias {
        Some(bias) => Some(take_checked(
            params,
            format!("{prefix}.bias"),
            bias.val().dims().to_vec(),
        )?),
        None => None,
    };
    Ok(LinearValues { weight, bias })
}

// Loaded values keep the parameter ids of the layer they replace.
fn apply_linear<B: Backend>(linear: &mut Linear<B>, values: LinearValues) {
    let device = linear.weight.val().device();
    linear.weight = Param::initialized(
        linear.weight.id,
        Tensor::from_data(values.weight, &device),
    );
    if let (Some(current), Some(bias)) = (&linear.bias, values.bias) {
        linear.bias = Some(Param::initialized(
            current.id,
            Tensor::from_data(bias, &device),
        ));
    }
}

impl<B: Backend> StateDict for ReidClassifier<B> {
    type Device = B::Device;

    fn state_dict(&self) -> ParameterSet {
        let mut params = ParameterSet::new();
        export_linear(&mut params, "embedding", &self.embedding);
        export_linear(&mut params, "fc", &self.fc);
        params
    }

    fn load_state_dict(&mut self, mut params: ParameterSet) -> Result<(), CheckpointError> {
        // Validate everything before touching the model so a bad state dict
        // leaves it unchanged.
        let embedding = take_linear(&mut params, "embedding", &self.embedding)?;
        let fc = take_linear(&mut params, "fc", &self.fc)?;
        if let Some(key) = params.keys().next() {
            return Err(CheckpointError::UnexpectedParameter(key.clone()));
        }

        apply_linear(&mut self.embedding, embedding);
        apply_linear(&mut self.fc, fc);
        Ok(())
    }

    fn move_to(self, device: &B::Device) -> Self {
        Module::to_device(self, device)
    }
}
