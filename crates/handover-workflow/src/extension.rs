//! Parked-extension generation and the bounded commit loop around it.
//!
//! The generator only consults the exclusion pool it is handed; that pool is
//! a snapshot, not a lock, so a candidate accepted locally can still lose a
//! race at commit time. [`retry_bounded`] absorbs those losses up to a fixed
//! budget and turns the last one into `ExhaustedRetry`.

use std::{collections::HashSet, fmt, future::Future};

use handover_core::{Error, Result, config::ExtensionRange};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use tracing::warn;

// ─── Exclusion pool ──────────────────────────────────────────────────────────

/// Extensions that must not be handed out again in this run.
///
/// Seeded from the recorded parked roster; every candidate generated during
/// the run is added before it is committed, so both rejected and accepted
/// candidates stay excluded for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct ParkedPool {
  taken: HashSet<String>,
}

impl ParkedPool {
  pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
    Self {
      taken: extensions.into_iter().map(|e| e.trim().to_owned()).collect(),
    }
  }

  /// Returns `false` if the extension was already excluded.
  pub fn insert(&mut self, extension: impl Into<String>) -> bool {
    self.taken.insert(extension.into())
  }

  pub fn contains(&self, extension: &str) -> bool { self.taken.contains(extension) }

  pub fn len(&self) -> usize { self.taken.len() }

  pub fn is_empty(&self) -> bool { self.taken.is_empty() }

  fn excluded_within(&self, range: &ExtensionRange) -> u64 {
    self.taken.iter().filter(|e| range.contains(e)).count() as u64
  }
}

// ─── Generator ───────────────────────────────────────────────────────────────

/// Draws extensions uniformly from an inclusive range.
pub struct ExtensionGenerator {
  range: ExtensionRange,
  rng:   StdRng,
}

impl ExtensionGenerator {
  pub fn new(range: ExtensionRange, rng: StdRng) -> Self { Self { range, rng } }

  pub fn from_entropy(range: ExtensionRange) -> Self { Self::new(range, StdRng::from_entropy()) }

  /// Deterministic generator, for tests and reproducible dry runs.
  pub fn seeded(range: ExtensionRange, seed: u64) -> Self {
    Self::new(range, StdRng::seed_from_u64(seed))
  }

  pub fn range(&self) -> ExtensionRange { self.range }

  /// A value from the range that is not in `excluded`, or `None` when the
  /// pool covers the whole range.
  ///
  /// Rejection sampling while most of the range is free; once more than
  /// half of it is excluded, a uniform pick from the free values instead, so
  /// the draw never degenerates into a long loop.
  pub fn generate(&mut self, excluded: &ParkedPool) -> Option<String> {
    let size = self.range.len();
    let blocked = excluded.excluded_within(&self.range);
    if size == 0 || blocked >= size {
      return None;
    }

    let ExtensionRange { lower, upper } = self.range;

    if blocked * 2 > size {
      let free: Vec<u32> = (lower..=upper)
        .filter(|n| !excluded.contains(&n.to_string()))
        .collect();
      return free.choose(&mut self.rng).map(u32::to_string);
    }

    loop {
      let candidate = self.rng.gen_range(lower..=upper).to_string();
      if !excluded.contains(&candidate) {
        return Some(candidate);
      }
    }
  }
}

// ─── Bounded retry ───────────────────────────────────────────────────────────

/// Run `attempt` at most `budget` times.
///
/// `attempt` receives the 1-based attempt number and prepares the attempt
/// synchronously; an `Err` there is fatal and returned as is, and `None`
/// means there is nothing left to try. The future it yields performs the
/// remote part; an `Err` from it is treated as a lost race and retried.
/// Running out of budget or of candidates ends in `ExhaustedRetry`, which
/// keeps the last rejection seen.
pub async fn retry_bounded<T, E, F, Fut>(budget: u32, mut attempt: F) -> Result<T>
where
  F: FnMut(u32) -> Result<Option<Fut>>,
  Fut: Future<Output = Result<T, E>>,
  E: fmt::Display,
{
  let mut last: Option<String> = None;

  for n in 1..=budget {
    let Some(remote) = attempt(n)? else {
      let last = match last {
        Some(rejection) => format!("{rejection}; no candidates left"),
        None => "no candidates left".to_owned(),
      };
      return Err(Error::ExhaustedRetry { attempts: n - 1, last: Some(last) });
    };

    match remote.await {
      Ok(value) => return Ok(value),
      Err(e) => {
        warn!(attempt = n, budget, error = %e, "attempt rejected");
        last = Some(e.to_string());
      }
    }
  }

  Err(Error::ExhaustedRetry { attempts: budget, last })
}
