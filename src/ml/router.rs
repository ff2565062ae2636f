// ============================================================
// Layer 5 — Batch Router
// ============================================================
// Splits one mixed batch into per-task sub-batches after the
// shared encoder has run over the whole batch:
//
//   task_ids = [3, 0, 3]          distinct, ascending: [0, 3]
//   task 0 → rows [1]
//   task 3 → rows [0, 2]
//
// The same row selection is applied to the hidden states, head
// positions, labels and attention mask so the four stay aligned.

use burn::{
    prelude::*,
    tensor::{Element, Numeric},
};

use crate::data::batcher::MixedBatch;

/// The rows of a batch that belong to one task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSelection {
    pub task_id: usize,
    pub rows:    Vec<usize>,
}

impl TaskSelection {
    /// Keep only the selected rows (dim 0) of `tensor`.
    pub fn filter<B: Backend, const D: usize, K>(&self, tensor: Tensor<B, D, K>) -> Tensor<B, D, K>
    where
        K: Numeric<B>,
        K::Elem: Element,
    {
        let rows: Vec<i32> = self.rows.iter().map(|&r| r as i32).collect();
        let index = Tensor::<B, 1, Int>::from_ints(rows.as_slice(), &tensor.device());
        tensor.select(0, index)
    }
}

/// One task's slice of a mixed batch.
pub struct SubBatch<B: Backend> {
    pub task_id:        usize,
    pub hidden:         Tensor<B, 3>,
    pub head_positions: Tensor<B, 2, Int>,
    pub labels:         Option<Tensor<B, 2, Int>>,
    pub attention_mask: Tensor<B, 2, Int>,
}

/// Group row indices by task id, in ascending task-id order.
pub fn select_tasks(task_ids: &[usize]) -> Vec<TaskSelection> {
    let mut distinct: Vec<usize> = task_ids.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    distinct
        .into_iter()
        .map(|task_id| TaskSelection {
            task_id,
            rows: task_ids
                .iter()
                .enumerate()
                .filter(|(_, &t)| t == task_id)
                .map(|(row, _)| row)
                .collect(),
        })
        .collect()
}

/// Read the per-example task ids of a batch back to the host.
pub fn task_ids_of<B: Backend>(batch: &MixedBatch<B>) -> Vec<usize> {
    batch
        .task_ids
        .to_data()
        .iter::<i64>()
        .map(|id| id as usize)
        .collect()
}

/// Route encoder output for `batch` into per-task sub-batches.
pub fn route<B: Backend>(hidden: Tensor<B, 3>, batch: &MixedBatch<B>) -> Vec<SubBatch<B>> {
    select_tasks(&task_ids_of(batch))
        .into_iter()
        .map(|sel| SubBatch {
            task_id:        sel.task_id,
            hidden:         sel.filter(hidden.clone()),
            head_positions: sel.filter(batch.head_positions.clone()),
            labels:         batch.labels.clone().map(|l| sel.filter(l)),
            attention_mask: sel.filter(batch.attention_mask.clone()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_distinct_ids_are_ascending() {
        let sel = select_tasks(&[3, 0, 3, 1]);
        let ids: Vec<usize> = sel.iter().map(|s| s.task_id).collect();
        assert_eq!(ids, vec![0, 1, 3]);
        assert_eq!(sel[2].rows, vec![0, 2]);
        assert_eq!(sel[0].rows, vec![1]);
    }

    #[test]
    fn test_empty_batch_routes_nothing() {
        assert!(select_tasks(&[]).is_empty());
    }

    #[test]
    fn test_filter_keeps_selected_rows() {
        let device = Default::default();
        let t = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1], [2, 2], [3, 3]], &device);
        let sel = TaskSelection { task_id: 7, rows: vec![0, 2] };
        let kept: Vec<i64> = sel.filter(t).into_data().iter::<i64>().collect();
        assert_eq!(kept, vec![1, 1, 3, 3]);
    }
}
