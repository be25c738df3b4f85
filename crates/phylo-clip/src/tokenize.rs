use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

const PAD_TOKEN: &str = "<|endoftext|>";

/// Encode a batch of prompts into a `[B, T]` id tensor, right-padded with the
/// end-of-text id to the longest prompt and capped at `max_len` tokens.
pub fn tokenize_batch(tokenizer: &Tokenizer, prompts: &[String], max_len: usize, device: &Device) -> Result<Tensor> {
    let pad_id = *tokenizer
        .get_vocab(true)
        .get(PAD_TOKEN)
        .ok_or_else(|| anyhow!("tokenizer has no {PAD_TOKEN} token"))?;
    let mut rows = Vec::with_capacity(prompts.len());
    for prompt in prompts {
        let enc = tokenizer.encode(prompt.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        ids.truncate(max_len);
        rows.push(ids);
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for ids in &mut rows {
        ids.resize(width, pad_id);
    }
    Ok(Tensor::new(rows, device)?)
}
