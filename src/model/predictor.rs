use anyhow::Result;
use candle_core::{Module, ModuleT, Tensor};
use candle_nn::{self as nn, BatchNormConfig, VarBuilder};

/// Prediction head: bottleneck MLP mapping a projection back onto the
/// projection space, `dim -> pred_dim -> dim` with BN + ReLU on the hidden
/// layer. Only the output linear carries a bias.
pub struct Predictor {
    fc1: nn::Linear,
    bn1: nn::BatchNorm,
    fc2: nn::Linear,
}

impl Predictor {
    pub fn new(vb: VarBuilder<'_>, dim: usize, pred_dim: usize) -> Result<Self> {
        let fc1 = nn::linear_no_bias(dim, pred_dim, vb.pp("fc1"))?;
        let bn1 = nn::batch_norm(pred_dim, BatchNormConfig::default(), vb.pp("bn1"))?;
        let fc2 = nn::linear(pred_dim, dim, vb.pp("fc2"))?;
        Ok(Self { fc1, bn1, fc2 })
    }

    pub fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let h = self.bn1.forward_t(&self.fc1.forward(x)?, train)?.relu()?;
        Ok(self.fc2.forward(&h)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn preserves_projection_dim_through_bottleneck() {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let pred = Predictor::new(vb, 32, 8).unwrap();
        let z = Tensor::randn(0.0f32, 1.0f32, (4, 32), &device).unwrap();
        let p = pred.forward(&z, true).unwrap();
        assert_eq!(p.dims2().unwrap(), (4, 32));
    }
}
