// External imports
use burn::module::{Module, Param};
use burn::nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_2_gru_cell::GRU;
use crate::constants::{D_MODEL, DEFAULT_DROPOUT, PREDICTION_LENGTH, SEGMENT_LENGTH, SEQUENCE_LENGTH};
use crate::util::error::{ForecastError, Result};

/// # SegRNN Architecture
///
/// Segment-wise recurrent forecaster. Instead of stepping a GRU over every
/// time point, the look-back window of each channel is cut into segments of
/// `seg_len` points, each segment is embedded into a `d_model` vector, and
/// the GRU runs over the much shorter sequence of segment embeddings.
///
/// ## Architecture Overview
///
/// 1. **Normalization**: subtract the last observed value of each channel
/// 2. **Segment Embedding**: `Linear(seg_len -> d_model) + ReLU` per segment
/// 3. **Encoder**: GRU over the `seq_len / seg_len` segment embeddings
/// 4. **Decoder**: one GRU step per output segment, all in parallel, started
///    from the encoder state and driven by positional + channel embeddings
/// 5. **Predictor**: `Dropout + Linear(d_model -> seg_len)` per output segment
/// 6. **Denormalization**: add the last observed value back
///
/// Channels are processed independently and share all weights except their
/// channel embedding.
#[derive(Module, Debug)]
pub struct SegRnn<B: Backend> {
    enc_in: usize,
    seq_len: usize,
    pred_len: usize,
    seg_len: usize,
    d_model: usize,
    value_embedding: Linear<B>,
    rnn: GRU<B>,
    pos_emb: Param<Tensor<B, 2>>,
    channel_emb: Param<Tensor<B, 2>>,
    dropout: Dropout,
    predict: Linear<B>,
}

impl<B: Backend> SegRnn<B> {
    pub fn seg_num_x(&self) -> usize {
        self.seq_len / self.seg_len
    }

    pub fn seg_num_y(&self) -> usize {
        self.pred_len / self.seg_len
    }

    pub fn enc_in(&self) -> usize {
        self.enc_in
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn pred_len(&self) -> usize {
        self.pred_len
    }

    /// Shapes of every learnable tensor, in declaration order
    ///
    /// Record loading does not check shapes, so this is what tells a
    /// checkpoint of another architecture apart from a compatible one.
    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::new();
        let mut linear = |layer: &Linear<B>| {
            shapes.push(layer.weight.val().dims().to_vec());
            if let Some(bias) = &layer.bias {
                shapes.push(bias.val().dims().to_vec());
            }
        };
        linear(&self.value_embedding);
        linear(&self.predict);
        shapes.extend(self.rnn.param_shapes());
        shapes.push(self.pos_emb.val().dims().to_vec());
        shapes.push(self.channel_emb.val().dims().to_vec());
        shapes
    }

    /// Performs the forward pass
    ///
    /// Naming in the shape comments: b batch, c channels, s seq_len,
    /// d d_model, w seg_len, n input segments, m output segments.
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, seq_len, enc_in]
    ///
    /// # Returns
    ///
    /// Forecast tensor of shape [batch_size, pred_len, enc_in]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, channels] = x.dims();
        let seg_num_x = self.seg_num_x();
        let seg_num_y = self.seg_num_y();
        let half = self.d_model / 2;

        // normalization and permute: b,s,c -> b,c,s
        let seq_last = x
            .clone()
            .slice([0..batch_size, seq_len - 1..seq_len, 0..channels])
            .detach();
        let x = (x - seq_last.clone().repeat_dim(1, seq_len)).swap_dims(1, 2);

        // segment and embedding: b,c,s -> bc,n,w -> bc,n,d
        let x = x.reshape([batch_size * channels, seg_num_x, self.seg_len]);
        let x = activation::relu(self.value_embedding.forward(x));

        // encoding: hn is bc,d
        let (_, hn) = self.rnn.forward(x, None);

        // decoder queries
        // m,d/2 -> 1,m,d/2 -> c,m,d/2
        // c,d/2 -> c,1,d/2 -> c,m,d/2
        // c,m,d -> cm,1,d -> bcm,1,d
        let pos = self
            .pos_emb
            .val()
            .unsqueeze_dim::<3>(0)
            .repeat_dim(0, channels);
        let chan = self
            .channel_emb
            .val()
            .unsqueeze_dim::<3>(1)
            .repeat_dim(1, seg_num_y);
        debug_assert_eq!(pos.dims(), [channels, seg_num_y, half]);
        let queries = Tensor::cat(vec![pos, chan], 2)
            .reshape([channels * seg_num_y, 1, self.d_model])
            .repeat_dim(0, batch_size);

        // every encoder state seeds m decoder steps: bc,d -> bc,m*d -> bcm,d
        let h0 = hn
            .repeat_dim(1, seg_num_y)
            .reshape([batch_size * channels * seg_num_y, self.d_model]);

        let (_, hy) = self.rnn.forward(queries, Some(h0));

        // bcm,d -> bcm,w -> b,c,s
        let y = self
            .predict
            .forward(self.dropout.forward(hy))
            .reshape([batch_size, channels, self.pred_len]);

        // permute and denorm
        y.swap_dims(1, 2) + seq_last.repeat_dim(1, self.pred_len)
    }
}

/// Configuration for the SegRnn model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegRnnConfig {
    /// Number of input channels (variables)
    pub enc_in: usize,
    /// Look-back window length
    pub seq_len: usize,
    /// Forecast horizon
    pub pred_len: usize,
    /// Time steps per segment; must divide both `seq_len` and `pred_len`
    pub seg_len: usize,
    /// Embedding and hidden width; must be even
    pub d_model: usize,
    pub dropout: f64,
}

impl Default for SegRnnConfig {
    fn default() -> Self {
        Self {
            enc_in: 0,
            seq_len: SEQUENCE_LENGTH,
            pred_len: PREDICTION_LENGTH,
            seg_len: SEGMENT_LENGTH,
            d_model: D_MODEL,
            dropout: DEFAULT_DROPOUT,
        }
    }
}

impl SegRnnConfig {
    pub fn new(
        enc_in: usize,
        seq_len: usize,
        pred_len: usize,
        seg_len: usize,
        d_model: usize,
        dropout: f64,
    ) -> Self {
        Self {
            enc_in,
            seq_len,
            pred_len,
            seg_len,
            d_model,
            dropout,
        }
    }

    /// Checks that the segment arithmetic and embedding split work out
    pub fn validate(&self) -> Result<()> {
        if self.enc_in == 0 || self.seq_len == 0 || self.pred_len == 0 || self.seg_len == 0 {
            return Err(ForecastError::config(format!(
                "All model dimensions must be positive: {:?}",
                self
            )));
        }
        if self.seq_len % self.seg_len != 0 {
            return Err(ForecastError::config(format!(
                "seq_len {} is not a multiple of seg_len {}",
                self.seq_len, self.seg_len
            )));
        }
        if self.pred_len % self.seg_len != 0 {
            return Err(ForecastError::config(format!(
                "pred_len {} is not a multiple of seg_len {}",
                self.pred_len, self.seg_len
            )));
        }
        if self.d_model == 0 || self.d_model % 2 != 0 {
            return Err(ForecastError::config(format!(
                "d_model must be a positive even number, got {}",
                self.d_model
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ForecastError::config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Initialize a model from this configuration
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<SegRnn<B>> {
        self.validate()?;

        let seg_num_y = self.pred_len / self.seg_len;
        let half = self.d_model / 2;
        let normal = Initializer::Normal {
            mean: 0.0,
            std: 1.0,
        };

        Ok(SegRnn {
            enc_in: self.enc_in,
            seq_len: self.seq_len,
            pred_len: self.pred_len,
            seg_len: self.seg_len,
            d_model: self.d_model,
            value_embedding: LinearConfig::new(self.seg_len, self.d_model).init(device),
            rnn: GRU::new(self.d_model, self.d_model, device),
            pos_emb: normal.init([seg_num_y, half], device),
            channel_emb: normal.init([self.enc_in, half], device),
            dropout: DropoutConfig::new(self.dropout).init(),
            predict: LinearConfig::new(self.d_model, self.seg_len).init(device),
        })
    }

    /// True when both configs describe the same parameter shapes
    pub fn same_architecture(&self, other: &SegRnnConfig) -> bool {
        self.enc_in == other.enc_in
            && self.seq_len == other.seq_len
            && self.pred_len == other.pred_len
            && self.seg_len == other.seg_len
            && self.d_model == other.d_model
    }
}
