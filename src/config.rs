/// The settings of a [`crate::PartitionRegistry`].
///
/// ```rust
/// use partition_index::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_seed(42)
///     .with_trace_partitions(true);
/// assert_eq!(42, config.seed());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    seed: u64,
    trace_partitions: bool,
    partition_capacity: usize,
    person_capacity: usize,
}

impl RegistryConfig {
    pub const DEFAULT_SEED: u64 = 0;
    pub const DEFAULT_PARTITIONS: usize = 64;
    pub const DEFAULT_PEOPLE: usize = 1024;

    /// The seed of the random streams used for sampling.
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Wrap every partition so that each of its calls is traced along with its duration.
    pub const fn with_trace_partitions(mut self, trace_partitions: bool) -> Self {
        self.trace_partitions = trace_partitions;
        self
    }

    pub const fn with_partition_capacity(mut self, partition_capacity: usize) -> Self {
        self.partition_capacity = partition_capacity;
        self
    }

    /// The number of people the per-person arrays of every partition are sized for up front.
    pub const fn with_person_capacity(mut self, person_capacity: usize) -> Self {
        self.person_capacity = person_capacity;
        self
    }

    #[inline]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub const fn trace_partitions(&self) -> bool {
        self.trace_partitions
    }

    #[inline]
    pub const fn partition_capacity(&self) -> usize {
        self.partition_capacity
    }

    #[inline]
    pub const fn person_capacity(&self) -> usize {
        self.person_capacity
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            seed: Self::DEFAULT_SEED,
            trace_partitions: false,
            partition_capacity: Self::DEFAULT_PARTITIONS,
            person_capacity: Self::DEFAULT_PEOPLE,
        }
    }
}
