use anyhow::Result;
use candle_core::Tensor;

/// L2-normalize each row of `[B, D]` so downstream dot products are cosines.
/// The norm is clamped away from zero before dividing.
pub fn unit_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.sum(1)?.unsqueeze(1)?.sqrt()?.clamp(1e-8, 1e10)?;
    Ok((x.clone() / norm.broadcast_as(x.shape())?)?)
}

/// Negative cosine similarity `D(p, z) = -mean(p_hat . z_hat)`.
/// Callers detach `z` when a stop-gradient target is wanted; the function
/// itself does not touch the graph.
pub fn negative_cosine_similarity(p: &Tensor, z: &Tensor) -> Result<Tensor> {
    let p = unit_normalize(p)?;
    let z = unit_normalize(z)?;
    let cos = (p * z)?.sum(1)?.mean_all()?;
    Ok(cos.neg()?)
}

/// Symmetric criterion over both views: `D(p1, z2) / 2 + D(p2, z1) / 2`.
pub fn symmetric_loss(p1: &Tensor, p2: &Tensor, z1: &Tensor, z2: &Tensor) -> Result<Tensor> {
    let d1 = negative_cosine_similarity(p1, z2)?;
    let d2 = negative_cosine_similarity(p2, z1)?;
    Ok(((d1 + d2)? / 2.0)?)
}
