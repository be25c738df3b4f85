use anyhow::Result;
use candle_core::{DType, Tensor};

/// Row-wise L2 normalization of a `[B, H]` feature matrix.
pub fn l2_normalize(features: &Tensor) -> Result<Tensor> {
    let (_batch, _hidden) = features.dims2()?;
    let eps_val = match features.dtype() {
        DType::F16 => 1e-6f32,
        _ => 1e-12f32,
    };
    let eps = Tensor::new(&[eps_val], features.device())?.to_dtype(features.dtype())?.unsqueeze(0)?;
    let norm = features.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    Ok(features.broadcast_div(&norm)?)
}

/// Cosine similarity of every image row against every text row: `[I, T]`.
pub fn cosine_scores(image_features: &Tensor, text_features: &Tensor) -> Result<Tensor> {
    let img = l2_normalize(image_features)?;
    let txt = l2_normalize(text_features)?;
    Ok(img.matmul(&txt.t()?)?)
}
