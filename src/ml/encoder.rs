// ============================================================
// Layer 5 — Shared Transformer Encoder
// ============================================================
// One BERT-style encoder shared by every task head:
//   • token, position and token-type embeddings
//   • N post-norm blocks of multi-head self-attention + GELU FFN
//   • padding positions masked out of attention
//
// position_ids is an integral buffer (arange over the maximum
// sequence length). It is saved with every checkpoint but is
// never averaged.
//
// Reference: Devlin et al. (2019) BERT
//            Burn Book §3 (Building Blocks)

use burn::{
    module::{Param, ParamId},
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::domain::RunConfig;

#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:              usize,
    pub max_position_embeddings: usize,
    pub type_vocab_size:         usize,
    pub hidden_size:             usize,
    pub num_heads:               usize,
    pub num_layers:              usize,
    pub intermediate_size:       usize,
    pub dropout:                 f64,
}

impl EncoderConfig {
    pub fn from_run(cfg: &RunConfig) -> Self {
        Self::new(
            cfg.vocab_size, cfg.max_position_embeddings, cfg.type_vocab_size,
            cfg.hidden_size, cfg.num_heads, cfg.num_layers,
            cfg.intermediate_size, cfg.hidden_dropout,
        )
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SharedEncoder<B> {
        let token_embedding      = EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device);
        let position_embedding   = EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device);
        let token_type_embedding = EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device);
        let position_ids = Tensor::<B, 1, Int>::arange(0..self.max_position_embeddings as i64, device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        SharedEncoder {
            token_embedding,
            position_embedding,
            token_type_embedding,
            position_ids: Param::initialized(ParamId::new(), position_ids),
            embed_norm:   LayerNormConfig::new(self.hidden_size).init(device),
            layers,
            dropout:      DropoutConfig::new(self.dropout).init(),
            hidden_size:  self.hidden_size,
            max_positions: self.max_position_embeddings,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.hidden_size, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.hidden_size, self.intermediate_size).init(device);
        let ffn_linear2 = LinearConfig::new(self.intermediate_size, self.hidden_size).init(device);
        let norm1   = LayerNormConfig::new(self.hidden_size).init(device);
        let norm2   = LayerNormConfig::new(self.hidden_size).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone());
        if let Some(mask) = mask_pad {
            input = input.mask_pad(mask);
        }
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct SharedEncoder<B: Backend> {
    pub token_embedding:      Embedding<B>,
    pub position_embedding:   Embedding<B>,
    pub token_type_embedding: Embedding<B>,
    pub position_ids:         Param<Tensor<B, 1, Int>>,
    pub embed_norm:           LayerNorm<B>,
    pub layers:               Vec<EncoderBlock<B>>,
    pub dropout:              Dropout,
    pub hidden_size:          usize,
    pub max_positions:        usize,
}

impl<B: Backend> SharedEncoder<B> {
    /// input_ids: [batch, seq_len] → hidden states [batch, seq_len, hidden_size]
    ///
    /// `seq_len` must not exceed `max_positions`.
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Option<Tensor<B, 2, Int>>,
        token_type_ids: Option<Tensor<B, 2, Int>>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = self.position_ids.val()
            .slice([0..seq_len])
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let token_types = token_type_ids
            .unwrap_or_else(|| Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device));

        let embeddings = self.token_embedding.forward(input_ids)
            + self.position_embedding.forward(positions)
            + self.token_type_embedding.forward(token_types);
        let mut x = self.dropout.forward(self.embed_norm.forward(embeddings));

        let mask_pad = attention_mask.map(|mask| mask.equal_elem(0));
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        x
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    pub(crate) fn tiny_config() -> EncoderConfig {
        EncoderConfig::new(32, 16, 2, 8, 2, 1, 16, 0.0)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let encoder = tiny_config().init::<TestBackend>(&device);
        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[3, 4, 5], [6, 7, 1]], &device);
        let mask = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1, 1], [1, 1, 0]], &device);

        let hidden = encoder.forward(ids, Some(mask), None);
        assert_eq!(hidden.dims(), [2, 3, 8]);
    }

    #[test]
    fn test_position_ids_are_an_integral_arange() {
        let device = Default::default();
        let encoder = tiny_config().init::<TestBackend>(&device);
        let ids: Vec<i64> = encoder.position_ids.val().into_data().iter::<i64>().collect();
        assert_eq!(ids, (0..16).collect::<Vec<i64>>());
    }
}
