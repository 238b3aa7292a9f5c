/// Alignment of every block record and therefore of every payload handed out.
pub const ALIGNMENT: usize = 16;

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// Evaluates to `None` when rounding would overflow `usize`.
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(13), Some(16));
/// assert_eq!(align!(32), Some(32));
/// assert_eq!(align!(usize::MAX), None);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value as usize)
      .checked_add($crate::align::ALIGNMENT - 1)
      .map(|value| value & !($crate::align::ALIGNMENT - 1))
  };
}
