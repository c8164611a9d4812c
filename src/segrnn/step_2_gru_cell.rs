// External imports
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

/// # GRU Layer
///
/// Single-layer, batch-first Gated Recurrent Unit shared by the SegRNN encoder
/// and decoder. The decoder starts from the encoder's final state, so unlike a
/// plain sequence encoder this layer accepts an explicit initial hidden state
/// and hands back its final one.
///
/// ## Mathematical Representation
///
/// For input x_t at time t and previous hidden state h_(t-1):
///
/// 1. Update gate: z_t = σ(W_z · x_t + b_iz + U_z · h_(t-1) + b_hz)
/// 2. Reset gate: r_t = σ(W_r · x_t + b_ir + U_r · h_(t-1) + b_hr)
/// 3. Candidate state: n_t = tanh(W_n · x_t + b_in + r_t ∘ (U_n · h_(t-1) + b_hn))
/// 4. New hidden state: h_t = (1 - z_t) ∘ n_t + z_t ∘ h_(t-1)
///
/// The reset gate is applied after the hidden projection, which keeps the
/// layer numerically interchangeable with cuDNN-style GRUs.
#[derive(Module, Debug)]
pub struct GRU<B: Backend> {
    input_size: usize,
    hidden_size: usize,

    // Gates are packed as [update | reset | new] along the output dimension
    input_weights: Linear<B>,
    hidden_weights: Linear<B>,
}

impl<B: Backend> GRU<B> {
    /// Create a new GRU layer
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of expected features in the input
    /// * `hidden_size` - Number of features in the hidden state
    /// * `device` - The device to allocate tensors on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let gate_size = 3 * hidden_size;

        // Uniform(-1/sqrt(hidden), 1/sqrt(hidden)) for every weight and bias
        let bound = 1.0 / (hidden_size as f64).sqrt();
        let initializer = Initializer::Uniform {
            min: -bound,
            max: bound,
        };

        let input_weights = LinearConfig::new(input_size, gate_size)
            .with_initializer(initializer.clone())
            .init(device);
        let hidden_weights = LinearConfig::new(hidden_size, gate_size)
            .with_initializer(initializer)
            .init(device);

        Self {
            input_size,
            hidden_size,
            input_weights,
            hidden_weights,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Shapes of every weight and bias tensor, in declaration order
    pub fn param_shapes(&self) -> Vec<Vec<usize>> {
        let mut shapes = Vec::new();
        for linear in [&self.input_weights, &self.hidden_weights] {
            shapes.push(linear.weight.val().dims().to_vec());
            if let Some(bias) = &linear.bias {
                shapes.push(bias.val().dims().to_vec());
            }
        }
        shapes
    }

    /// Split a packed [batch, 3 * hidden] projection into its three gates
    fn split_gates(&self, projection: Tensor<B, 2>) -> [Tensor<B, 2>; 3] {
        let batch_size = projection.dims()[0];
        let gates = projection.reshape([batch_size, 3, self.hidden_size]);
        let gate = |idx: usize| {
            gates
                .clone()
                .narrow(1, idx, 1)
                .reshape([batch_size, self.hidden_size])
        };
        [gate(0), gate(1), gate(2)]
    }

    /// Advance the hidden state by one time step
    ///
    /// * `x_t` - Input of shape [batch_size, input_size]
    /// * `h` - Hidden state of shape [batch_size, hidden_size]
    pub fn step(&self, x_t: Tensor<B, 2>, h: Tensor<B, 2>) -> Tensor<B, 2> {
        let [z_input, r_input, n_input] = self.split_gates(self.input_weights.forward(x_t));
        let [z_hidden, r_hidden, n_hidden] =
            self.split_gates(self.hidden_weights.forward(h.clone()));

        let z = activation::sigmoid(z_input + z_hidden); // update gate
        let r = activation::sigmoid(r_input + r_hidden); // reset gate
        let n = activation::tanh(n_input + r * n_hidden); // candidate hidden state

        // h = (1-z) * n + z * h
        (Tensor::ones_like(&z) - z.clone()) * n + z * h
    }

    /// Run the GRU over a whole sequence
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, seq_len, input_size]
    /// * `h0` - Optional initial state of shape [batch_size, hidden_size]; zeros when absent
    ///
    /// # Returns
    ///
    /// `(outputs, h_n)` where `outputs` has shape [batch_size, seq_len, hidden_size]
    /// and `h_n` is the final hidden state of shape [batch_size, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>, h0: Option<Tensor<B, 2>>) -> (Tensor<B, 3>, Tensor<B, 2>) {
        let device = x.device();
        let [batch_size, seq_len, _] = x.dims();

        let mut h = h0.unwrap_or_else(|| Tensor::zeros([batch_size, self.hidden_size], &device));
        let mut output_sequence = Tensor::zeros([batch_size, seq_len, self.hidden_size], &device);

        for t in 0..seq_len {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, self.input_size]);

            h = self.step(x_t, h);

            output_sequence = output_sequence.slice_assign(
                [0..batch_size, t..t + 1, 0..self.hidden_size],
                h.clone().reshape([batch_size, 1, self.hidden_size]),
            );
        }

        (output_sequence, h)
    }
}
