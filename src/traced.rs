use crate::{
    attributes::{AttributeSource, PersonId},
    descriptor::PartitionDescriptor,
    error::PartitionError,
    events::{MembershipChange, PopulationEvent, TransactionId},
    labels::LabelSet,
    partition::Partition,
    sampling::{Sample, SamplerConfig, SamplingScratch},
};
use rand::RngCore;
use std::time::Instant;

/// Wraps a partition and traces every call made to it along with its duration in microseconds.
#[derive(Debug)]
pub(crate) struct TracedPartition {
    name: String,
    inner: Box<dyn Partition>,
}

impl TracedPartition {
    pub(crate) fn new<S: Into<String>>(name: S, inner: Box<dyn Partition>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    #[inline]
    fn timed<T>(&self, operation: &'static str, call: impl FnOnce(&dyn Partition) -> T) -> T {
        let start = Instant::now();
        let result = call(self.inner.as_ref());
        tracing::trace!(
            partition = %self.name,
            operation,
            elapsed_us = start.elapsed().as_micros() as u64
        );
        result
    }
}

impl Partition for TracedPartition {
    #[inline]
    fn descriptor(&self) -> &PartitionDescriptor {
        self.inner.descriptor()
    }

    #[inline]
    fn is_degenerate(&self) -> bool {
        self.inner.is_degenerate()
    }

    fn init(
        &mut self,
        source: &dyn AttributeSource,
        people: &[PersonId],
    ) -> Result<(), PartitionError> {
        let start = Instant::now();
        let result = self.inner.init(source, people);
        tracing::trace!(
            partition = %self.name,
            operation = "init",
            people = people.len(),
            elapsed_us = start.elapsed().as_micros() as u64
        );
        result
    }

    fn handle(
        &mut self,
        source: &dyn AttributeSource,
        transaction: TransactionId,
        event: &PopulationEvent,
    ) -> Result<Option<MembershipChange>, PartitionError> {
        let start = Instant::now();
        let result = self.inner.handle(source, transaction, event);
        tracing::trace!(
            partition = %self.name,
            operation = "handle",
            %transaction,
            %event,
            elapsed_us = start.elapsed().as_micros() as u64
        );
        result
    }

    fn contains(&self, person: PersonId) -> bool {
        self.timed("contains", |inner| inner.contains(person))
    }

    fn contains_in(&self, person: PersonId, labels: &LabelSet) -> bool {
        self.timed("contains_in", |inner| inner.contains_in(person, labels))
    }

    fn count(&self) -> usize {
        self.timed("count", |inner| inner.count())
    }

    fn count_in(&self, labels: &LabelSet) -> usize {
        self.timed("count_in", |inner| inner.count_in(labels))
    }

    fn people(&self) -> Vec<PersonId> {
        self.timed("people", |inner| inner.people())
    }

    fn people_in(&self, labels: &LabelSet) -> Vec<PersonId> {
        self.timed("people_in", |inner| inner.people_in(labels))
    }

    fn sample(
        &self,
        source: &dyn AttributeSource,
        config: &SamplerConfig,
        scratch: &mut SamplingScratch,
        rng: &mut dyn RngCore,
    ) -> Sample {
        self.timed("sample", |inner| inner.sample(source, config, scratch, rng))
    }

    fn validate_label_set(&self, labels: &LabelSet) -> bool {
        self.timed("validate_label_set", |inner| inner.validate_label_set(labels))
    }
}
