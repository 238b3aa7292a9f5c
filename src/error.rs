use thiserror::Error;

/// Reasons a heap operation can fail.
///
/// Every failure leaves the block list exactly as it was before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  /// Zero size or count, an element-count overflow, or a zero-size resize.
  #[error("invalid allocation request")]
  InvalidRequest,
  /// The break service refused to move the heap top.
  #[error("environment refused to adjust the heap by {requested} bytes")]
  EnvironmentExhausted { requested: usize },
  /// The handle does not denote a block record of this heap.
  #[error("handle was not issued by this heap")]
  UnknownHandle,
  /// The handle denotes a block that is already free.
  #[error("handle was already released")]
  DoubleRelease,
}
