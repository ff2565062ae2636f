use burn::data::dataset::Dataset;

use crate::domain::{EncodedExample, Task};

/// Encoded examples exposed through Burn's Dataset trait.
/// Examples of different tasks may be mixed freely.
pub struct TaskDataset {
    examples: Vec<EncodedExample>,
}

impl TaskDataset {
    pub fn new(examples: Vec<EncodedExample>) -> Self { Self { examples } }

    /// All tasks' training partitions, in task order.
    pub fn mixed_train(tasks: &[Task]) -> Self {
        Self::new(tasks.iter().flat_map(|t| t.train.iter().cloned()).collect())
    }

    pub fn example_count(&self) -> usize { self.examples.len() }
}

impl Dataset<EncodedExample> for TaskDataset {
    fn get(&self, index: usize) -> Option<EncodedExample> {
        self.examples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}
