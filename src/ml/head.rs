// ============================================================
// Layer 5 — Task Head
// ============================================================
// A per-task token classifier on top of the shared encoder:
//
//   single mode:  logits = Linear(dropout(h_i))
//   dual mode:    logits = Linear(dropout([h_i ; h_head(i)]))
//
// In dual mode every position is paired with the hidden state
// of its syntactic head (a batched gather along the sequence
// axis), doubling the classifier's input width.
//
// The loss is token-level cross-entropy in which positions whose
// gold label equals the ignore index count in neither the sum
// nor the mean's denominator.

use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::domain::Task;

/// Standard deviation of the Gaussian used for new head weights.
pub const HEAD_INIT_STD: f64 = 0.02;

#[derive(Config, Debug)]
pub struct TaskHeadConfig {
    pub task_id:      usize,
    pub hidden_size:  usize,
    pub num_labels:   usize,
    pub dual_mode:    bool,
    pub ignore_index: i64,
    #[config(default = 0.1)]
    pub dropout:      f64,
}

impl TaskHeadConfig {
    pub fn for_task(task: &Task, hidden_size: usize, ignore_index: i64, dropout: f64) -> Self {
        Self::new(task.task_id, hidden_size, task.num_labels(), task.dual_mode, ignore_index)
            .with_dropout(dropout)
    }

    pub fn input_width(&self) -> usize {
        if self.dual_mode { self.hidden_size * 2 } else { self.hidden_size }
    }

    /// Fresh head: N(0, 0.02) weights, zero bias.
    pub fn init<B: Backend>(&self, device: &B::Device) -> TaskHead<B> {
        let mut classifier = LinearConfig::new(self.input_width(), self.num_labels)
            .with_initializer(Initializer::Normal { mean: 0.0, std: HEAD_INIT_STD })
            .init(device);
        classifier.bias = Some(Param::from_tensor(Tensor::zeros([self.num_labels], device)));

        TaskHead {
            classifier,
            dropout:      DropoutConfig::new(self.dropout).init(),
            task_id:      self.task_id,
            num_labels:   self.num_labels,
            dual_mode:    self.dual_mode,
            ignore_index: self.ignore_index,
        }
    }
}

#[derive(Module, Debug)]
pub struct TaskHead<B: Backend> {
    pub classifier:   Linear<B>,
    pub dropout:      Dropout,
    pub task_id:      usize,
    pub num_labels:   usize,
    pub dual_mode:    bool,
    pub ignore_index: i64,
}

pub struct HeadOutput<B: Backend> {
    /// [batch, seq_len, num_labels]
    pub logits: Tensor<B, 3>,
    pub loss:   Option<Tensor<B, 1>>,
}

impl<B: Backend> TaskHead<B> {
    /// hidden: [batch, seq_len, hidden], head_positions / labels: [batch, seq_len]
    pub fn forward(
        &self,
        hidden:         Tensor<B, 3>,
        head_positions: Tensor<B, 2, Int>,
        labels:         Option<Tensor<B, 2, Int>>,
    ) -> HeadOutput<B> {
        let features = if self.dual_mode {
            pair_with_heads(hidden, head_positions)
        } else {
            hidden
        };

        let logits = self.classifier.forward(self.dropout.forward(features));

        let loss = labels.map(|labels| {
            let [batch, seq_len, num_labels] = logits.dims();
            masked_cross_entropy(
                logits.clone().reshape([batch * seq_len, num_labels]),
                labels.reshape([batch * seq_len]),
                self.ignore_index,
            )
        });

        HeadOutput { logits, loss }
    }

    pub fn input_width(&self) -> usize {
        self.classifier.weight.dims()[0]
    }
}

/// Concatenate every position's hidden state with the hidden state at its
/// recorded head position: [b, s, h] → [b, s, 2h].
pub fn pair_with_heads<B: Backend>(hidden: Tensor<B, 3>, head_positions: Tensor<B, 2, Int>) -> Tensor<B, 3> {
    let [batch, seq_len, width] = hidden.dims();
    let index = head_positions
        .clamp(0, seq_len.saturating_sub(1) as i64)
        .unsqueeze_dim::<3>(2)
        .expand([batch, seq_len, width]);
    let head_states = hidden.clone().gather(1, index);
    Tensor::cat(vec![hidden, head_states], 2)
}

/// Mean cross-entropy over the positions whose target is not `ignore_index`.
/// logits: [n, classes], targets: [n]. A fully ignored input gives zero.
pub fn masked_cross_entropy<B: Backend>(
    logits:       Tensor<B, 2>,
    targets:      Tensor<B, 1, Int>,
    ignore_index: i64,
) -> Tensor<B, 1> {
    let [n, _] = logits.dims();
    let ignored = targets.clone().equal_elem(ignore_index);
    let weight  = ignored.clone().bool_not().float();
    let safe_targets = targets.mask_fill(ignored, 0);

    let picked = log_softmax(logits, 1)
        .gather(1, safe_targets.reshape([n, 1]))
        .reshape([n]);
    let count = weight.clone().sum().clamp_min(1.0);
    (picked * weight).sum().neg() / count
}
