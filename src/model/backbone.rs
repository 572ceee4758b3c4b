use anyhow::Result;
use candle_core::Tensor;

/// Encoder backbone seam: anything that maps an image batch `[B, C, H, W]`
/// to pooled feature vectors `[B, feature_dim]` can sit under the siamese
/// wrapper. The projection head is sized from `feature_dim`.
pub trait Backbone {
    fn forward(&self, xs: &Tensor, train: bool) -> Result<Tensor>;
    fn feature_dim(&self) -> usize;
}
