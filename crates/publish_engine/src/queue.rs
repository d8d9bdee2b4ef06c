use std::future::Future;

use futures_util::stream::{self, StreamExt};

/// Bounded-concurrency runner for connector calls. Some backends reject
/// parallel requests, so the default runs one task at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskQueue {
    concurrency: usize,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl TaskQueue {
    /// A limit of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Starts tasks in input order with at most `concurrency` in flight and
    /// returns their outputs in input order.
    pub async fn run<I, F, Fut>(&self, inputs: I, task: F) -> Vec<Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        stream::iter(inputs)
            .map(task)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
