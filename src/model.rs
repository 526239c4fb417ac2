use crate::config::ModelConfig;
use crate::unit::{ExecutionUnit, UnitId};
use anyhow::{bail, ensure};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hint::black_box;

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> anyhow::Result<Self> {
        ensure!(
            data.len() == rows * cols,
            "tensor data has {} elements, shape {rows}x{cols} needs {}",
            data.len(),
            rows * cols
        );
        Ok(Self { rows, cols, data })
    }

    pub fn random(rows: usize, cols: usize, bound: f32, rng: &mut ChaCha8Rng) -> Self {
        let data = (0..rows * cols)
            .map(|_| rng.gen_range(-bound..=bound))
            .collect();
        Self { rows, cols, data }
    }

    fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }
}

pub trait Layer: Send {
    fn kind(&self) -> &'static str;
    fn forward(&self, input: &Tensor) -> anyhow::Result<Tensor>;
}

pub struct Linear {
    weight: Tensor,
    bias: Vec<f32>,
}

impl Linear {
    pub fn new(weight: Tensor, bias: Vec<f32>) -> anyhow::Result<Self> {
        ensure!(bias.len() == weight.cols, "bias length must match output features");
        Ok(Self { weight, bias })
    }

    pub fn random(in_features: usize, out_features: usize, rng: &mut ChaCha8Rng) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weight = Tensor::random(in_features, out_features, bound, rng);
        let bias = (0..out_features).map(|_| rng.gen_range(-bound..=bound)).collect();
        Self { weight, bias }
    }
}

impl Layer for Linear {
    fn kind(&self) -> &'static str {
        "Linear"
    }

    fn forward(&self, input: &Tensor) -> anyhow::Result<Tensor> {
        if input.cols != self.weight.rows {
            bail!(
                "Linear expects {} input features, got {}",
                self.weight.rows,
                input.cols
            );
        }
        let out_cols = self.weight.cols;
        let mut out = Vec::with_capacity(input.rows * out_cols);
        for r in 0..input.rows {
            let x = input.row(r);
            for j in 0..out_cols {
                let mut acc = self.bias[j];
                for (i, xi) in x.iter().enumerate() {
                    acc += xi * self.weight.data[i * out_cols + j];
                }
                out.push(acc);
            }
        }
        Tensor::new(input.rows, out_cols, out)
    }
}

pub struct ReLU;

impl Layer for ReLU {
    fn kind(&self) -> &'static str {
        "ReLU"
    }

    fn forward(&self, input: &Tensor) -> anyhow::Result<Tensor> {
        let data = input.data.iter().map(|v| v.max(0.0)).collect();
        Tensor::new(input.rows, input.cols, data)
    }
}

pub struct Softmax;

impl Layer for Softmax {
    fn kind(&self) -> &'static str {
        "Softmax"
    }

    fn forward(&self, input: &Tensor) -> anyhow::Result<Tensor> {
        let mut data = Vec::with_capacity(input.data.len());
        for r in 0..input.rows {
            let row = input.row(r);
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exps: Vec<f32> = row.iter().map(|v| (v - max).exp()).collect();
            let sum: f32 = exps.iter().sum();
            data.extend(exps.into_iter().map(|e| e / sum));
        }
        Tensor::new(input.rows, input.cols, data)
    }
}

pub struct Sequential {
    name: String,
    layers: Vec<Box<dyn Layer>>,
}

impl Sequential {
    pub fn new(name: impl Into<String>, layers: Vec<Box<dyn Layer>>) -> Self {
        Self {
            name: name.into(),
            layers,
        }
    }

    /// Linear/ReLU stack over the configured widths, ending in Softmax.
    pub fn from_config(config: &ModelConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut widths = vec![config.input_dim];
        widths.extend(&config.hidden_dims);
        widths.push(config.output_dim);
        let mut layers: Vec<Box<dyn Layer>> = Vec::new();
        for (i, pair) in widths.windows(2).enumerate() {
            layers.push(Box::new(Linear::random(pair[0], pair[1], &mut rng)));
            if i + 2 < widths.len() {
                layers.push(Box::new(ReLU));
            }
        }
        layers.push(Box::new(Softmax));
        Self::new(&config.name, layers)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full forward pass; `before` sees each layer's input before the call.
    pub fn forward_with_hook(
        &self,
        input: &Tensor,
        mut before: impl FnMut(usize, &Tensor),
    ) -> anyhow::Result<Tensor> {
        let mut x = input.clone();
        for (index, layer) in self.layers.iter().enumerate() {
            before(index, &x);
            x = layer.forward(&x)?;
        }
        Ok(x)
    }
}

/// A layer paired with the input it saw during the dry run.
pub struct LayerUnit {
    id: UnitId,
    layer: Box<dyn Layer>,
    input: Option<Tensor>,
}

impl LayerUnit {
    pub fn input(&self) -> Option<&Tensor> {
        self.input.as_ref()
    }
}

impl ExecutionUnit for LayerUnit {
    fn id(&self) -> &UnitId {
        &self.id
    }

    fn has_input(&self) -> bool {
        self.input.is_some()
    }

    fn invoke(&mut self) -> anyhow::Result<()> {
        let Some(input) = self.input.as_ref() else {
            bail!("no input captured for {}", self.id);
        };
        black_box(self.layer.forward(black_box(input))?);
        Ok(())
    }
}

/// Runs one forward pass to capture inputs, then splits the model into
/// units named `<Kind>_<index>`.
///
/// If the dry run fails partway, the layers it never reached come back
/// without an input and are reported as skipped by the profiler.
pub fn decompose(model: Sequential, batch: &Tensor) -> Vec<LayerUnit> {
    let mut captured: Vec<Option<Tensor>> = vec![None; model.layers.len()];
    if let Err(err) = model.forward_with_hook(batch, |index, input| {
        captured[index] = Some(input.clone());
    }) {
        tracing::warn!(model = %model.name, error = %err, "dry run stopped early");
    }
    model
        .layers
        .into_iter()
        .zip(captured)
        .enumerate()
        .map(|(index, (layer, input))| LayerUnit {
            id: UnitId::new(format!("{}_{index}", layer.kind()), index),
            layer,
            input,
        })
        .collect()
}

pub fn sample_batch(config: &ModelConfig) -> Tensor {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(1));
    Tensor::random(config.batch, config.input_dim, 1.0, &mut rng)
}
