use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Deterministic random number streams.
///
/// The default stream is seeded with the base seed; every named stream is created on first use
/// and seeded from the base seed and its name, so drawing from one stream never shifts another.
#[derive(Clone, Debug)]
pub struct RandomStreams {
    seed: u64,
    default: ChaCha8Rng,
    named: HashMap<String, ChaCha8Rng>,
}

impl RandomStreams {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            default: ChaCha8Rng::seed_from_u64(seed),
            named: HashMap::new(),
        }
    }

    #[inline]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn default_stream(&mut self) -> &mut ChaCha8Rng {
        &mut self.default
    }

    pub fn named(&mut self, name: &str) -> &mut ChaCha8Rng {
        let seed = self.seed;
        self.named
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(stream_seed(seed, name)))
    }

    /// The named stream, or the default one when no name is given.
    pub fn stream(&mut self, name: Option<&str>) -> &mut ChaCha8Rng {
        match name {
            Some(name) => self.named(name),
            None => self.default_stream(),
        }
    }
}

impl Default for RandomStreams {
    fn default() -> Self {
        Self::new(0)
    }
}

// FNV-1a, so that stream seeds do not depend on the hasher of the standard library.
fn stream_seed(seed: u64, name: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    name.bytes()
        .fold(OFFSET ^ seed, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}
