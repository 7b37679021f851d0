//! wav2vec2 sequence classifier on candle
//!
//! Covers the `Wav2Vec2ForSequenceClassification` checkpoint layout: conv
//! feature encoder ("layer" or "group" norm), feature projection, weight-norm
//! positional conv embedding, transformer encoder in stable (pre-norm) or
//! post-norm layout, projector, mean pooling over valid frames, classifier.
//!
//! Inference only. Weights are plain tensors; nothing here records gradients.

use crate::inference::model::AcousticNetwork;
use crate::inference::preprocess::FeatureTensor;
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::{Conv1d, Conv1dConfig, Linear, VarBuilder};
use serde::Deserialize;
use std::collections::BTreeMap;

// ── Configuration (config.json) ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Wav2Vec2Config {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub conv_dim: Vec<usize>,
    pub conv_kernel: Vec<usize>,
    pub conv_stride: Vec<usize>,
    pub num_conv_pos_embeddings: usize,
    pub num_conv_pos_embedding_groups: usize,
    #[serde(default = "default_eps")]
    pub layer_norm_eps: f64,
    #[serde(default = "default_feat_norm")]
    pub feat_extract_norm: String,
    #[serde(default)]
    pub conv_bias: bool,
    #[serde(default)]
    pub do_stable_layer_norm: bool,
    #[serde(default)]
    pub use_weighted_layer_sum: bool,
    #[serde(default = "default_classifier_proj_size")]
    pub classifier_proj_size: usize,
    /// Class index (as a decimal string) -> raw label
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
}

fn default_eps() -> f64 {
    1e-5
}

fn default_feat_norm() -> String {
    "group".to_string()
}

fn default_classifier_proj_size() -> usize {
    256
}

impl Wav2Vec2Config {
    /// Check the fields the network shape depends on
    pub fn validate(&self) -> Result<(), String> {
        if self.conv_dim.is_empty() {
            return Err("conv_dim is empty".to_string());
        }
        if self.conv_dim.len() != self.conv_kernel.len()
            || self.conv_dim.len() != self.conv_stride.len()
        {
            return Err(format!(
                "conv_dim/conv_kernel/conv_stride lengths differ ({}/{}/{})",
                self.conv_dim.len(),
                self.conv_kernel.len(),
                self.conv_stride.len()
            ));
        }
        if self.conv_kernel.iter().any(|&k| k == 0) || self.conv_stride.iter().any(|&s| s == 0) {
            return Err("conv_kernel and conv_stride entries must be non-zero".to_string());
        }
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            ));
        }
        if self.num_conv_pos_embedding_groups == 0
            || self.hidden_size % self.num_conv_pos_embedding_groups != 0
        {
            return Err(format!(
                "hidden_size {} is not divisible by num_conv_pos_embedding_groups {}",
                self.hidden_size, self.num_conv_pos_embedding_groups
            ));
        }
        match self.feat_extract_norm.as_str() {
            "layer" | "group" => Ok(()),
            other => Err(format!("unsupported feat_extract_norm '{}'", other)),
        }
    }

    /// Smallest input (in samples) for which the conv encoder yields one frame
    pub fn receptive_field(&self) -> usize {
        let mut field = 1;
        let mut jump = 1;
        for (&kernel, &stride) in self.conv_kernel.iter().zip(&self.conv_stride) {
            field += (kernel - 1) * jump;
            jump *= stride;
        }
        field
    }

    /// Frames the conv encoder produces for `samples` input samples
    pub fn output_frames(&self, samples: usize) -> usize {
        let mut len = samples;
        for (&kernel, &stride) in self.conv_kernel.iter().zip(&self.conv_stride) {
            if len < kernel {
                return 0;
            }
            len = (len - kernel) / stride + 1;
        }
        len
    }
}

// ── Normalization layers (manual, CUDA-safe) ────────────────────────────────

struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    fn load(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            weight: vb.get(size, "weight")?,
            bias: vb.get(size, "bias")?,
            eps,
        })
    }

    /// Normalize over the last dimension
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mean = x.mean_keepdim(D::Minus1)?;
        let centered = x.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

/// GroupNorm with one group per channel, over `(batch, channels, time)`
struct ChannelGroupNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl ChannelGroupNorm {
    fn load(channels: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            weight: vb.get(channels, "weight")?.reshape((1, channels, 1))?,
            bias: vb.get(channels, "bias")?.reshape((1, channels, 1))?,
            eps,
        })
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mean = x.mean_keepdim(2)?;
        let centered = x.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(2)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

// ── Feature encoder ─────────────────────────────────────────────────────────

enum ConvNorm {
    None,
    Layer(LayerNorm),
    Group(ChannelGroupNorm),
}

struct ConvLayer {
    conv: Conv1d,
    norm: ConvNorm,
}

impl ConvLayer {
    fn load(cfg: &Wav2Vec2Config, index: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let in_c = if index == 0 { 1 } else { cfg.conv_dim[index - 1] };
        let out_c = cfg.conv_dim[index];
        let conv_cfg = Conv1dConfig {
            stride: cfg.conv_stride[index],
            ..Default::default()
        };
        let kernel = cfg.conv_kernel[index];

        let conv = if cfg.conv_bias {
            candle_nn::conv1d(in_c, out_c, kernel, conv_cfg, vb.pp("conv"))?
        } else {
            candle_nn::conv1d_no_bias(in_c, out_c, kernel, conv_cfg, vb.pp("conv"))?
        };

        let norm = match cfg.feat_extract_norm.as_str() {
            "layer" => ConvNorm::Layer(LayerNorm::load(
                out_c,
                cfg.layer_norm_eps,
                vb.pp("layer_norm"),
            )?),
            // "group" normalizes the first layer only
            _ if index == 0 => ConvNorm::Group(ChannelGroupNorm::load(
                out_c,
                cfg.layer_norm_eps,
                vb.pp("layer_norm"),
            )?),
            _ => ConvNorm::None,
        };

        Ok(Self { conv, norm })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.conv.forward(xs)?;
        let xs = match &self.norm {
            ConvNorm::None => xs,
            ConvNorm::Layer(ln) => ln
                .forward(&xs.transpose(1, 2)?)?
                .transpose(1, 2)?
                .contiguous()?,
            ConvNorm::Group(gn) => gn.forward(&xs)?,
        };
        xs.gelu_erf()
    }
}

struct FeatureEncoder {
    layers: Vec<ConvLayer>,
}

impl FeatureEncoder {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let layers = (0..cfg.conv_dim.len())
            .map(|i| ConvLayer::load(cfg, i, vb.pp(format!("conv_layers.{i}"))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    /// `(batch, samples)` -> `(batch, channels, frames)`
    fn forward(&self, audio: &Tensor) -> candle_core::Result<Tensor> {
        let mut h = audio.unsqueeze(1)?;
        for layer in &self.layers {
            h = layer.forward(&h)?;
        }
        Ok(h)
    }
}

struct FeatureProjection {
    layer_norm: LayerNorm,
    projection: Linear,
}

impl FeatureProjection {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let dim = *cfg.conv_dim.last().unwrap_or(&cfg.hidden_size);
        Ok(Self {
            layer_norm: LayerNorm::load(dim, cfg.layer_norm_eps, vb.pp("layer_norm"))?,
            projection: candle_nn::linear(dim, cfg.hidden_size, vb.pp("projection"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.projection.forward(&self.layer_norm.forward(xs)?)
    }
}

// ── Positional conv embedding (weight norm) ─────────────────────────────────

/// Resolve a weight-normed conv weight.
///
/// Checkpoints store it as `weight_g`/`weight_v` (older exports),
/// `parametrizations.weight.original0/1` (newer exports) or a plain `weight`.
fn load_weight_norm_conv(
    in_c: usize,
    out_c: usize,
    kernel: usize,
    cfg: Conv1dConfig,
    vb: VarBuilder,
) -> candle_core::Result<Conv1d> {
    let shape = (out_c, in_c / cfg.groups, kernel);

    let parts = if vb.contains_tensor("weight_v") {
        Some(("weight_g", "weight_v"))
    } else if vb.contains_tensor("parametrizations.weight.original1") {
        Some((
            "parametrizations.weight.original0",
            "parametrizations.weight.original1",
        ))
    } else {
        None
    };

    let weight = match parts {
        Some((g_name, v_name)) => {
            let wv = vb.get(shape, v_name)?;
            // wav2vec2 normalizes over dim 2: g is (1, 1, kernel)
            let wg = vb
                .get((1, 1, kernel), g_name)
                .or_else(|_| vb.get((out_c, 1, 1), g_name))?;

            if wg.dims3()? == (1, 1, kernel) {
                let norm = wv.sqr()?.sum_keepdim(0)?.sum_keepdim(1)?.sqrt()?;
                wv.broadcast_div(&norm)?.broadcast_mul(&wg)?
            } else {
                let (o, ig, k) = wv.dims3()?;
                let norm = wv
                    .reshape((o, ig * k))?
                    .sqr()?
                    .sum_keepdim(1)?
                    .sqrt()?
                    .unsqueeze(2)?;
                wv.broadcast_div(&norm)?.broadcast_mul(&wg)?
            }
        }
        None => vb.get(shape, "weight")?,
    };

    let bias = vb.get(out_c, "bias")?;
    Ok(Conv1d::new(weight, Some(bias), cfg))
}

struct PosConvEmbed {
    conv: Conv1d,
}

impl PosConvEmbed {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let conv_cfg = Conv1dConfig {
            padding: cfg.num_conv_pos_embeddings / 2,
            groups: cfg.num_conv_pos_embedding_groups,
            ..Default::default()
        };
        Ok(Self {
            conv: load_weight_norm_conv(
                cfg.hidden_size,
                cfg.hidden_size,
                cfg.num_conv_pos_embeddings,
                conv_cfg,
                vb.pp("conv"),
            )?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let seq_len = xs.dim(1)?;
        let h = self.conv.forward(&xs.transpose(1, 2)?.contiguous()?)?;
        // Even kernels produce one extra frame
        h.narrow(2, 0, seq_len)?
            .gelu_erf()?
            .transpose(1, 2)?
            .contiguous()
    }
}

// ── Transformer encoder ─────────────────────────────────────────────────────

struct SelfAttention {
    q: Linear,
    k: Linear,
    v: Linear,
    out: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let head_dim = cfg.hidden_size / cfg.num_attention_heads;
        let h = cfg.hidden_size;
        Ok(Self {
            q: candle_nn::linear(h, h, vb.pp("q_proj"))?,
            k: candle_nn::linear(h, h, vb.pp("k_proj"))?,
            v: candle_nn::linear(h, h, vb.pp("v_proj"))?,
            out: candle_nn::linear(h, h, vb.pp("out_proj"))?,
            num_heads: cfg.num_attention_heads,
            head_dim,
            scale: (head_dim as f64).powf(-0.5),
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let (b, t, _) = xs.dims3()?;
        let split_heads = |x: Tensor| {
            x.reshape((b, t, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };

        let q = split_heads((self.q.forward(xs)? * self.scale)?)?;
        let k = split_heads(self.k.forward(xs)?)?;
        let v = split_heads(self.v.forward(xs)?)?;

        let scores = q.matmul(&k.transpose(2, 3)?.contiguous()?)?;
        let attn = candle_nn::ops::softmax_last_dim(&scores)?;
        let out = attn
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, t, self.num_heads * self.head_dim))?;
        self.out.forward(&out)
    }
}

struct FeedForward {
    up: Linear,
    down: Linear,
}

impl FeedForward {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            up: candle_nn::linear(
                cfg.hidden_size,
                cfg.intermediate_size,
                vb.pp("intermediate_dense"),
            )?,
            down: candle_nn::linear(
                cfg.intermediate_size,
                cfg.hidden_size,
                vb.pp("output_dense"),
            )?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.down.forward(&self.up.forward(xs)?.gelu_erf()?)
    }
}

struct EncoderLayer {
    attention: SelfAttention,
    layer_norm: LayerNorm,
    feed_forward: FeedForward,
    final_layer_norm: LayerNorm,
    pre_norm: bool,
}

impl EncoderLayer {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            attention: SelfAttention::load(cfg, vb.pp("attention"))?,
            layer_norm: LayerNorm::load(cfg.hidden_size, cfg.layer_norm_eps, vb.pp("layer_norm"))?,
            feed_forward: FeedForward::load(cfg, vb.pp("feed_forward"))?,
            final_layer_norm: LayerNorm::load(
                cfg.hidden_size,
                cfg.layer_norm_eps,
                vb.pp("final_layer_norm"),
            )?,
            pre_norm: cfg.do_stable_layer_norm,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        if self.pre_norm {
            let h = (xs + self.attention.forward(&self.layer_norm.forward(xs)?)?)?;
            &h + self.feed_forward.forward(&self.final_layer_norm.forward(&h)?)?
        } else {
            let h = self
                .layer_norm
                .forward(&(xs + self.attention.forward(xs)?)?)?;
            let h = (&h + self.feed_forward.forward(&h)?)?;
            self.final_layer_norm.forward(&h)
        }
    }
}

struct Encoder {
    pos_conv: PosConvEmbed,
    layer_norm: LayerNorm,
    layers: Vec<EncoderLayer>,
    pre_norm: bool,
}

impl Encoder {
    fn load(cfg: &Wav2Vec2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let layers = (0..cfg.num_hidden_layers)
            .map(|i| EncoderLayer::load(cfg, vb.pp(format!("layers.{i}"))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self {
            pos_conv: PosConvEmbed::load(cfg, vb.pp("pos_conv_embed"))?,
            layer_norm: LayerNorm::load(cfg.hidden_size, cfg.layer_norm_eps, vb.pp("layer_norm"))?,
            layers,
            pre_norm: cfg.do_stable_layer_norm,
        })
    }

    /// Returns the input to every layer followed by the final output
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Vec<Tensor>> {
        let mut h = (xs + self.pos_conv.forward(xs)?)?;
        if !self.pre_norm {
            h = self.layer_norm.forward(&h)?;
        }

        let mut states = Vec::with_capacity(self.layers.len() + 1);
        for layer in &self.layers {
            let next = layer.forward(&h)?;
            states.push(h);
            h = next;
        }

        if self.pre_norm {
            h = self.layer_norm.forward(&h)?;
        }
        states.push(h);
        Ok(states)
    }
}

// ── Sequence classifier ─────────────────────────────────────────────────────

pub struct Wav2Vec2ForSequenceClassification {
    config: Wav2Vec2Config,
    feature_encoder: FeatureEncoder,
    feature_projection: FeatureProjection,
    encoder: Encoder,
    layer_weights: Option<Tensor>,
    projector: Linear,
    classifier: Linear,
    num_labels: usize,
    device: Device,
}

impl Wav2Vec2ForSequenceClassification {
    /// Build the network from `vb` (expects the `wav2vec2.*`, `projector.*`
    /// and `classifier.*` weight names)
    pub fn load(
        cfg: &Wav2Vec2Config,
        num_labels: usize,
        vb: VarBuilder,
    ) -> candle_core::Result<Self> {
        let device = vb.device().clone();
        let w = vb.pp("wav2vec2");

        let layer_weights = if cfg.use_weighted_layer_sum {
            Some(vb.get(cfg.num_hidden_layers + 1, "layer_weights")?)
        } else {
            None
        };

        Ok(Self {
            config: cfg.clone(),
            feature_encoder: FeatureEncoder::load(cfg, w.pp("feature_extractor"))?,
            feature_projection: FeatureProjection::load(cfg, w.pp("feature_projection"))?,
            encoder: Encoder::load(cfg, w.pp("encoder"))?,
            layer_weights,
            projector: candle_nn::linear(
                cfg.hidden_size,
                cfg.classifier_proj_size,
                vb.pp("projector"),
            )?,
            classifier: candle_nn::linear(
                cfg.classifier_proj_size,
                num_labels,
                vb.pp("classifier"),
            )?,
            num_labels,
            device,
        })
    }

    pub fn config(&self) -> &Wav2Vec2Config {
        &self.config
    }

    /// Logits for a `(1, samples)` input where the first `valid_samples`
    /// samples are real audio.
    fn logits(&self, audio: &Tensor, valid_samples: usize) -> candle_core::Result<Vec<f32>> {
        let features = self.feature_encoder.forward(audio)?;
        let features = features.transpose(1, 2)?.contiguous()?;
        let total_frames = features.dim(1)?;

        // Frames past the valid length only see padding and are masked out of
        // attention and pooling; dropping them is equivalent
        let valid_frames = self
            .config
            .output_frames(valid_samples)
            .clamp(1, total_frames.max(1));
        let features = features.narrow(1, 0, valid_frames)?;

        let hidden = self.feature_projection.forward(&features)?;
        let mut states = self.encoder.forward(&hidden)?;

        let hidden = match &self.layer_weights {
            Some(weights) => {
                let stacked = Tensor::stack(&states, 0)?;
                let norm = candle_nn::ops::softmax(weights, 0)?
                    .reshape((states.len(), 1, 1, 1))?;
                stacked.broadcast_mul(&norm)?.sum(0)?
            }
            None => states
                .pop()
                .ok_or_else(|| candle_core::Error::Msg("encoder produced no output".into()))?,
        };

        let projected = self.projector.forward(&hidden)?;
        let pooled = projected.mean(1)?;
        self.classifier
            .forward(&pooled)?
            .squeeze(0)?
            .to_dtype(DType::F32)?
            .to_vec1::<f32>()
    }
}

impl AcousticNetwork for Wav2Vec2ForSequenceClassification {
    fn num_labels(&self) -> usize {
        self.num_labels
    }

    fn min_input_len(&self) -> usize {
        self.config.receptive_field()
    }

    fn forward(&self, features: &FeatureTensor) -> candle_core::Result<Vec<f32>> {
        if features.values().len() < self.min_input_len() {
            return Err(candle_core::Error::Msg(format!(
                "input of {} samples is shorter than the receptive field ({})",
                features.values().len(),
                self.min_input_len()
            )));
        }
        let audio = features.to_tensor(&self.device)?;
        self.logits(&audio, features.valid_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn tiny_config(stable: bool, norm: &str) -> Wav2Vec2Config {
        serde_json::from_value(serde_json::json!({
            "hidden_size": 16,
            "num_hidden_layers": 2,
            "num_attention_heads": 2,
            "intermediate_size": 32,
            "conv_dim": [8, 8],
            "conv_kernel": [10, 3],
            "conv_stride": [5, 2],
            "num_conv_pos_embeddings": 4,
            "num_conv_pos_embedding_groups": 2,
            "feat_extract_norm": norm,
            "conv_bias": true,
            "do_stable_layer_norm": stable,
            "classifier_proj_size": 8,
            "id2label": {"0": "angry", "1": "calm", "2": "happy", "3": "sad"}
        }))
        .unwrap()
    }

    fn build(cfg: &Wav2Vec2Config) -> (VarMap, Wav2Vec2ForSequenceClassification) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = Wav2Vec2ForSequenceClassification::load(cfg, 4, vb).unwrap();
        (varmap, model)
    }

    fn features(samples: usize, valid: usize) -> FeatureTensor {
        let values: Vec<f32> = (0..samples)
            .map(|i| if i < valid { ((i as f32) * 0.13).sin() } else { 0.0 })
            .collect();
        let mask = (0..samples).map(|i| u32::from(i < valid)).collect();
        FeatureTensor::new(values, mask).unwrap()
    }

    #[test]
    fn test_receptive_field_and_frames() {
        let cfg = tiny_config(true, "layer");
        assert_eq!(cfg.receptive_field(), 20);
        assert_eq!(cfg.output_frames(19), 0);
        assert_eq!(cfg.output_frames(20), 1);
        assert_eq!(cfg.output_frames(400), 39);
    }

    #[test]
    fn test_xlsr_receptive_field() {
        let mut cfg = tiny_config(true, "layer");
        cfg.conv_kernel = vec![10, 3, 3, 3, 3, 2, 2];
        cfg.conv_stride = vec![5, 2, 2, 2, 2, 2, 2];
        cfg.conv_dim = vec![8; 7];
        assert_eq!(cfg.receptive_field(), 400);
        // 320 samples per frame
        assert_eq!(cfg.output_frames(16_000), 49);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let mut cfg = tiny_config(true, "layer");
        cfg.conv_stride.pop();
        assert!(cfg.validate().is_err());

        let mut cfg = tiny_config(true, "layer");
        cfg.num_attention_heads = 3;
        assert!(cfg.validate().is_err());

        let cfg = tiny_config(true, "batch");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_forward_stable_layout() {
        let cfg = tiny_config(true, "layer");
        let (_varmap, model) = build(&cfg);
        let logits = model.forward(&features(400, 400)).unwrap();
        assert_eq!(logits.len(), 4);
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forward_post_norm_group_layout() {
        let cfg = tiny_config(false, "group");
        let (_varmap, model) = build(&cfg);
        let logits = model.forward(&features(400, 400)).unwrap();
        assert_eq!(logits.len(), 4);
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_padding_does_not_change_logits() {
        let cfg = tiny_config(true, "layer");
        let (_varmap, model) = build(&cfg);

        let unpadded = model.forward(&features(300, 300)).unwrap();
        let padded = model.forward(&features(480, 300)).unwrap();

        for (a, b) in unpadded.iter().zip(&padded) {
            assert!((a - b).abs() < 1e-4, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_forward_is_deterministic() {
        let cfg = tiny_config(false, "layer");
        let (_varmap, model) = build(&cfg);
        let input = features(500, 500);
        assert_eq!(model.forward(&input).unwrap(), model.forward(&input).unwrap());
    }

    #[test]
    fn test_short_input_rejected() {
        let cfg = tiny_config(true, "layer");
        let (_varmap, model) = build(&cfg);
        assert!(model.forward(&features(10, 10)).is_err());
    }

    #[test]
    fn test_weighted_layer_sum() {
        let mut cfg = tiny_config(true, "layer");
        cfg.use_weighted_layer_sum = true;
        let (_varmap, model) = build(&cfg);
        let logits = model.forward(&features(400, 400)).unwrap();
        assert_eq!(logits.len(), 4);
    }
}
