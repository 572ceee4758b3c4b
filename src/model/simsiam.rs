use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;

use super::backbone::Backbone;
use super::predictor::Predictor;
use super::projector::Projector;

#[derive(Debug, Clone, Copy)]
pub struct SimSiamConfig {
    /// Projection dimension.
    pub dim: usize,
    /// Hidden dimension of the predictor bottleneck.
    pub pred_dim: usize,
    /// Detach the returned targets from the autograd graph.
    pub stop_grad: bool,
    /// When false the predictor is the identity map.
    pub include_predictor: bool,
}

impl Default for SimSiamConfig {
    fn default() -> Self {
        Self {
            dim: 2048,
            pred_dim: 512,
            stop_grad: true,
            include_predictor: true,
        }
    }
}

/// Siamese representation-learning model: a shared encoder (backbone +
/// projection head) runs both augmented views, a prediction head maps each
/// projection toward the other view's target, and the targets are detached
/// so gradients only flow through the predictor branch.
pub struct SimSiam<B: Backbone> {
    backbone: B,
    projector: Projector,
    predictor: Option<Predictor>,
    stop_grad: bool,
}

impl<B: Backbone> SimSiam<B> {
    /// Builds the heads under `vb`; the backbone is constructed by the caller
    /// (typically under its own `encoder` prefix) so any [`Backbone`] works.
    pub fn new(vb: VarBuilder<'_>, backbone: B, config: SimSiamConfig) -> Result<Self> {
        let projector = Projector::new(vb.pp("projector"), backbone.feature_dim(), config.dim)?;
        let predictor = if config.include_predictor {
            Some(Predictor::new(
                vb.pp("predictor"),
                config.dim,
                config.pred_dim,
            )?)
        } else {
            None
        };
        Ok(Self {
            backbone,
            projector,
            predictor,
            stop_grad: config.stop_grad,
        })
    }

    fn encode(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let feats = self.backbone.forward(x, train)?;
        self.projector.forward(&feats, train)
    }

    fn predict(&self, z: &Tensor, train: bool) -> Result<Tensor> {
        match &self.predictor {
            Some(predictor) => predictor.forward(z, train),
            None => Ok(z.clone()),
        }
    }

    /// Runs both views through the shared encoder and predictor, returning
    /// `(p1, p2, z1, z2)`. The predictor consumes the live projections;
    /// detaching happens only on the returned targets.
    pub fn forward(
        &self,
        x1: &Tensor,
        x2: &Tensor,
        train: bool,
    ) -> Result<(Tensor, Tensor, Tensor, Tensor)> {
        let z1 = self.encode(x1, train)?;
        let z2 = self.encode(x2, train)?;
        let p1 = self.predict(&z1, train)?;
        let p2 = self.predict(&z2, train)?;
        let (z1, z2) = if self.stop_grad {
            (z1.detach(), z2.detach())
        } else {
            (z1, z2)
        };
        Ok((p1, p2, z1, z2))
    }

    /// Single-view latent: predictor applied to the projection.
    pub fn forward_latent(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let z = self.encode(x, train)?;
        self.predict(&z, train)
    }

    /// Pooled backbone features with the projection head bypassed.
    pub fn forward_pooled(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        self.backbone.forward(x, train)
    }

    pub fn backbone(&self) -> &B {
        &self.backbone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::resnet::{ResNet18, ResNet18Config};
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, VarMap};

    fn tiny_model(config: SimSiamConfig) -> (VarMap, SimSiam<ResNet18>) {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let backbone =
            ResNet18::new(vb.pp("encoder"), ResNet18Config { base_width: 8 }).unwrap();
        let model = SimSiam::new(vb, backbone, config).unwrap();
        (varmap, model)
    }

    fn tiny_config() -> SimSiamConfig {
        SimSiamConfig {
            dim: 32,
            pred_dim: 16,
            ..Default::default()
        }
    }

    fn views(device: &Device) -> (Tensor, Tensor) {
        let x1 = Tensor::randn(0.0f32, 1.0f32, (2, 3, 32, 32), device).unwrap();
        let x2 = Tensor::randn(0.0f32, 1.0f32, (2, 3, 32, 32), device).unwrap();
        (x1, x2)
    }

    #[test]
    fn forward_returns_projection_dim_outputs() {
        let (_varmap, model) = tiny_model(tiny_config());
        let (x1, x2) = views(&Device::Cpu);

        let (p1, p2, z1, z2) = model.forward(&x1, &x2, true).unwrap();
        for t in [&p1, &p2, &z1, &z2] {
            assert_eq!(t.dims2().unwrap(), (2, 32));
        }
    }

    #[test]
    fn stop_grad_detaches_targets_but_not_predictions() {
        let (varmap, model) = tiny_model(tiny_config());
        let (x1, x2) = views(&Device::Cpu);
        let (p1, _p2, z1, _z2) = model.forward(&x1, &x2, true).unwrap();

        let data = varmap.data().lock().unwrap();
        let stem = data.get("encoder.conv1.weight").unwrap();

        let grads = z1.sum_all().unwrap().backward().unwrap();
        assert!(grads.get(stem.as_tensor()).is_none());

        let grads = p1.sum_all().unwrap().backward().unwrap();
        assert!(grads.get(stem.as_tensor()).is_some());
    }

    #[test]
    fn targets_keep_gradients_when_stop_grad_disabled() {
        let (varmap, model) = tiny_model(SimSiamConfig {
            stop_grad: false,
            ..tiny_config()
        });
        let (x1, x2) = views(&Device::Cpu);
        let (_p1, _p2, z1, _z2) = model.forward(&x1, &x2, true).unwrap();

        let data = varmap.data().lock().unwrap();
        let stem = data.get("encoder.conv1.weight").unwrap();

        let grads = z1.sum_all().unwrap().backward().unwrap();
        assert!(grads.get(stem.as_tensor()).is_some());
    }

    #[test]
    fn identity_predictor_returns_projections() {
        let (_varmap, model) = tiny_model(SimSiamConfig {
            include_predictor: false,
            ..tiny_config()
        });
        let (x1, x2) = views(&Device::Cpu);

        let (p1, _p2, z1, _z2) = model.forward(&x1, &x2, false).unwrap();
        let p1v = p1.to_vec2::<f32>().unwrap();
        let z1v = z1.to_vec2::<f32>().unwrap();
        assert_eq!(p1v, z1v);
    }

    #[test]
    fn pooled_features_bypass_projector() {
        let (_varmap, model) = tiny_model(tiny_config());
        let x = Tensor::randn(0.0f32, 1.0f32, (2, 3, 32, 32), &Device::Cpu).unwrap();

        let feats = model.forward_pooled(&x, false).unwrap();
        assert_eq!(feats.dims2().unwrap(), (2, model.backbone().feature_dim()));

        let latent = model.forward_latent(&x, false).unwrap();
        assert_eq!(latent.dims2().unwrap(), (2, 32));
    }
}
