use candle_core::{Result, Tensor};
use candle_nn::{Activation, Linear, Module, VarBuilder, linear};

/// Linear layers with a ReLU after each one.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Linear>,
    output_dim: usize,
}

impl Mlp {
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = Activation::Relu.forward(&layer.forward(&xs)?)?;
        }
        Ok(xs)
    }
}

pub fn build_mlp(input_dim: usize, layers: &[usize], vb: &VarBuilder, prefix: &str) -> Result<Mlp> {
    let mut last_dim = input_dim;
    let mut built = Vec::with_capacity(layers.len());
    for (layer_idx, layer_size) in layers.iter().enumerate() {
        built.push(linear(last_dim, *layer_size, vb.pp(format!("{prefix}{layer_idx}")))?);
        last_dim = *layer_size;
    }
    Ok(Mlp {
        layers: built,
        output_dim: last_dim,
    })
}
