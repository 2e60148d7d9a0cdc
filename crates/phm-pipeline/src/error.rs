use phm_broker::TransportError;

/// Errors handing an item to a stage queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
  /// The queue is at capacity and the overflow policy is `reject`.
  #[error("{stage} queue is full")]
  QueueFull { stage: &'static str },

  /// Every worker of the stage has stopped.
  #[error("{stage} queue is closed")]
  Closed { stage: &'static str },
}

/// Errors starting or stopping the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
  #[error("broker error: {0}")]
  Transport(#[from] TransportError),

  #[error(transparent)]
  Stage(#[from] StageError),

  #[error("pipeline task failed: {message}")]
  Task { message: String },
}
