//! Entropy sources used to draw wheel slices.
//!
//! Production spins draw from [`SecureRandom`], a ChaCha20 stream keyed by the
//! operating system. Simulations and replays use [`SeededRandom`], whose
//! per-domain streams are derived the same way for every run of a seed.
use hmac::{Hmac, Mac};
use rand::rngs::{OsRng, SmallRng};
use rand::{Rng, SeedableRng};
use rand_chacha::{ChaCha8Rng, ChaCha20Rng};
use sha2::Sha256;
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of uniformly distributed integers.
pub trait RandomSource {
    /// Draw an integer in `[min, max)`. Returns `min` when the range is empty.
    fn uniform_int(&mut self, min: u32, max: u32) -> u32;
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        (**self).uniform_int(min, max)
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        (**self).uniform_int(min, max)
    }
}

#[derive(Debug, Clone)]
enum EntropyBackend {
    Secure(ChaCha20Rng),
    Degraded(SmallRng),
}

/// Cryptographically seeded source with an explicit non-cryptographic fallback.
#[derive(Debug, Clone)]
pub struct SecureRandom {
    backend: EntropyBackend,
}

impl SecureRandom {
    /// Seed from the operating system. Falls back to a clock-seeded generator
    /// (and logs a warning) when no secure entropy is available.
    #[must_use]
    pub fn new() -> Self {
        match ChaCha20Rng::from_rng(OsRng) {
            Ok(rng) => Self {
                backend: EntropyBackend::Secure(rng),
            },
            Err(err) => {
                log::warn!(
                    "secure entropy unavailable ({err}); falling back to a clock-seeded generator"
                );
                Self::degraded()
            }
        }
    }

    /// Build the non-cryptographic fallback directly.
    #[must_use]
    pub fn degraded() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        #[allow(clippy::cast_possible_truncation)]
        let seed = (nanos as u64) ^ ((nanos >> 64) as u64) ^ u64::from(std::process::id());
        Self {
            backend: EntropyBackend::Degraded(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Whether draws come from the fallback generator.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self.backend, EntropyBackend::Degraded(_))
    }
}

impl Default for SecureRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SecureRandom {
    fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        match &mut self.backend {
            EntropyBackend::Secure(rng) => rng.gen_range(min..max),
            EntropyBackend::Degraded(rng) => rng.gen_range(min..max),
        }
    }
}

/// Deterministic source for replays and simulations.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
    draws: u64,
}

impl SeededRandom {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Derive an independent stream for `domain` from a user-visible seed.
    #[must_use]
    pub fn for_stream(seed: u64, domain: &[u8]) -> Self {
        Self::new(derive_stream_seed(seed, domain))
    }

    /// Number of draws taken from this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl RandomSource for SeededRandom {
    fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.draws = self.draws.saturating_add(1);
        self.rng.gen_range(min..max)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Replays a fixed queue of raw draws.
///
/// Each queued value is clamped into the requested range, so a script of
/// `[99, 99, 99]` lands on the highest slice of whatever range is asked for.
/// Once the queue runs dry the source keeps returning `min`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    queue: VecDeque<u32>,
}

impl ScriptedRandom {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = u32>) -> Self {
        Self {
            queue: values.into_iter().collect(),
        }
    }

    pub fn push(&mut self, value: u32) {
        self.queue.push_back(value);
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.queue
            .pop_front()
            .map_or(min, |value| value.clamp(min, max - 1))
    }
}
