//! Release validation mode.
//!
//! The mode is picked per heap instance, or read from the `BRKALLOC_VALIDATION`
//! environment variable through [`Validation::from_env`]:
//! - `off` (default): handles passed to `release` are trusted. Releasing a
//!   foreign or already released handle is undefined behavior.
//! - `strict`: `release` first proves the handle is a live block of the heap
//!   and panics on a violation instead of corrupting the list.

use std::env;

/// Environment variable consulted by [`Validation::from_env`].
pub const VALIDATION_ENV: &str = "BRKALLOC_VALIDATION";

/// How much `release` checks the handles it is given.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validation {
  /// Trust the caller.
  #[default]
  Off,
  /// Walk the list before every release; panic on foreign or double release.
  Strict,
}

impl Validation {
  /// Parse from string (case-insensitive). Unknown values fall back to `Off`.
  #[must_use]
  pub fn from_str_loose(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "strict" | "on" | "checked" | "1" => Self::Strict,
      _ => Self::Off,
    }
  }

  /// Reads the mode from [`VALIDATION_ENV`].
  ///
  /// Allocates while reading the environment, so call it before the heap is
  /// serving requests.
  #[must_use]
  pub fn from_env() -> Self {
    env::var(VALIDATION_ENV)
      .map(|raw| Self::from_str_loose(&raw))
      .unwrap_or_default()
  }

  /// Returns true if `release` must validate its handle.
  #[must_use]
  pub const fn checks_release(self) -> bool {
    matches!(self, Self::Strict)
  }
}
