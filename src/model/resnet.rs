use anyhow::Result;
use candle_core::{Module, ModuleT, Tensor, D};
use candle_nn::{self as nn, BatchNormConfig, Conv2dConfig, VarBuilder};

use super::backbone::Backbone;

#[derive(Debug, Clone, Copy)]
pub struct ResNet18Config {
    /// Channel width of the first stage; later stages double it (64 for the
    /// standard ResNet-18, giving a 512-dim pooled feature).
    pub base_width: usize,
}

impl Default for ResNet18Config {
    fn default() -> Self {
        Self { base_width: 64 }
    }
}

/// Residual block: two 3x3 convs with batch norm, identity shortcut or a
/// strided 1x1 projection when the shape changes.
struct BasicBlock {
    conv1: nn::Conv2d,
    bn1: nn::BatchNorm,
    conv2: nn::Conv2d,
    bn2: nn::BatchNorm,
    downsample: Option<(nn::Conv2d, nn::BatchNorm)>,
}

impl BasicBlock {
    fn new(vb: VarBuilder<'_>, in_c: usize, out_c: usize, stride: usize) -> Result<Self> {
        let conv1 = nn::conv2d_no_bias(
            in_c,
            out_c,
            3,
            Conv2dConfig {
                padding: 1,
                stride,
                ..Default::default()
            },
            vb.pp("conv1"),
        )?;
        let bn1 = nn::batch_norm(out_c, BatchNormConfig::default(), vb.pp("bn1"))?;
        let conv2 = nn::conv2d_no_bias(
            out_c,
            out_c,
            3,
            Conv2dConfig {
                padding: 1,
                ..Default::default()
            },
            vb.pp("conv2"),
        )?;
        let bn2 = nn::batch_norm(out_c, BatchNormConfig::default(), vb.pp("bn2"))?;

        let downsample = if stride != 1 || in_c != out_c {
            let conv = nn::conv2d_no_bias(
                in_c,
                out_c,
                1,
                Conv2dConfig {
                    stride,
                    ..Default::default()
                },
                vb.pp("downsample_conv"),
            )?;
            let bn = nn::batch_norm(out_c, BatchNormConfig::default(), vb.pp("downsample_bn"))?;
            Some((conv, bn))
        } else {
            None
        };

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
        })
    }

    fn forward(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let shortcut = match &self.downsample {
            Some((conv, bn)) => bn.forward_t(&conv.forward(x)?, train)?,
            None => x.clone(),
        };
        let h = self.bn1.forward_t(&self.conv1.forward(x)?, train)?.relu()?;
        let h = self.bn2.forward_t(&self.conv2.forward(&h)?, train)?;
        Ok((shortcut + h)?.relu()?)
    }
}

/// ResNet-18 backbone: 7x7 stride-2 stem, 3x3 stride-2 max pool, four stages
/// of two residual blocks, global average pooling. No classification layer;
/// the output is the pooled `[B, feature_dim]` feature used by the projector.
pub struct ResNet18 {
    stem_conv: nn::Conv2d,
    stem_bn: nn::BatchNorm,
    blocks: Vec<BasicBlock>,
    feature_dim: usize,
}

impl ResNet18 {
    pub fn new(vb: VarBuilder<'_>, config: ResNet18Config) -> Result<Self> {
        let w = config.base_width;
        let stem_conv = nn::conv2d_no_bias(
            3,
            w,
            7,
            Conv2dConfig {
                padding: 3,
                stride: 2,
                ..Default::default()
            },
            vb.pp("conv1"),
        )?;
        let stem_bn = nn::batch_norm(w, BatchNormConfig::default(), vb.pp("bn1"))?;

        let widths = [w, 2 * w, 4 * w, 8 * w];
        let mut blocks = Vec::with_capacity(8);
        let mut in_c = w;
        for (stage, &out_c) in widths.iter().enumerate() {
            // First stage keeps the post-pool resolution, later stages halve it.
            let stride = if stage == 0 { 1 } else { 2 };
            blocks.push(BasicBlock::new(
                vb.pp(format!("layer{}_0", stage + 1)),
                in_c,
                out_c,
                stride,
            )?);
            blocks.push(BasicBlock::new(
                vb.pp(format!("layer{}_1", stage + 1)),
                out_c,
                out_c,
                1,
            )?);
            in_c = out_c;
        }

        Ok(Self {
            stem_conv,
            stem_bn,
            blocks,
            feature_dim: 8 * w,
        })
    }
}

impl Backbone for ResNet18 {
    fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let h = self
            .stem_bn
            .forward_t(&self.stem_conv.forward(xs)?, train)?
            .relu()?;
        // Candle pooling has no padding parameter; pad explicitly to match
        // the 3x3 stride-2 pad-1 max pool of the reference stem.
        let h = h
            .pad_with_zeros(D::Minus1, 1, 1)?
            .pad_with_zeros(D::Minus2, 1, 1)?;
        let mut h = h.max_pool2d_with_stride(3, 2)?;
        for block in &self.blocks {
            h = block.forward(&h, train)?;
        }
        Ok(h.mean(D::Minus1)?.mean(D::Minus1)?)
    }

    fn feature_dim(&self) -> usize {
        self.feature_dim
    }
}
