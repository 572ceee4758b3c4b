use anyhow::Result;
use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{self as nn, BatchNormConfig, VarBuilder};

/// Projection head replacing the backbone classification layer:
/// `Linear(feat -> dim, no bias)` -> BN -> ReLU -> `Linear(dim -> dim, no bias)`
/// -> BN without affine parameters. Biases are omitted because every linear
/// is followed by a batch norm.
pub struct Projector {
    fc1: nn::Linear,
    bn1: nn::BatchNorm,
    fc2: nn::Linear,
    bn2: nn::BatchNorm,
}

impl Projector {
    pub fn new(vb: VarBuilder<'_>, in_dim: usize, dim: usize) -> Result<Self> {
        let fc1 = nn::linear_no_bias(in_dim, dim, vb.pp("fc1"))?;
        let bn1 = nn::batch_norm(dim, BatchNormConfig::default(), vb.pp("bn1"))?;
        let fc2 = nn::linear_no_bias(dim, dim, vb.pp("fc2"))?;
        let bn2 = nn::batch_norm(
            dim,
            BatchNormConfig {
                affine: false,
                ..Default::default()
            },
            vb.pp("bn2"),
        )?;
        Ok(Self { fc1, bn1, fc2, bn2 })
    }

    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let h = self.bn1.forward_t(&self.fc1.forward(x)?, train)?.relu()?;
        Ok(self.bn2.forward_t(&self.fc2.forward(&h)?, train)?)
    }
}
