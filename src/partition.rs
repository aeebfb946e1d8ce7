use crate::{
    attributes::{AttributeSource, PersonId},
    cell_partition::CellPartition,
    degenerate::DegeneratePartition,
    descriptor::PartitionDescriptor,
    error::PartitionError,
    evaluation::FilterEvaluator,
    events::{MembershipChange, PopulationEvent, TransactionId},
    labels::LabelSet,
    sampling::{Sample, SamplerConfig, SamplingScratch},
};
use rand::RngCore;
use std::fmt::Debug;

/// The incrementally maintained index of one partition descriptor.
///
/// Handlers are called after the change has been applied to the attribute source. Queries taking a
/// [`LabelSet`] expect it to have been checked with [`Partition::validate_label_set()`].
pub(crate) trait Partition: Debug + Send + Sync {
    fn descriptor(&self) -> &PartitionDescriptor;

    fn is_degenerate(&self) -> bool;

    /// Establish the initial membership from the people matching the filter.
    fn init(
        &mut self,
        source: &dyn AttributeSource,
        people: &[PersonId],
    ) -> Result<(), PartitionError>;

    fn handle(
        &mut self,
        source: &dyn AttributeSource,
        transaction: TransactionId,
        event: &PopulationEvent,
    ) -> Result<Option<MembershipChange>, PartitionError>;

    fn contains(&self, person: PersonId) -> bool;

    fn contains_in(&self, person: PersonId, labels: &LabelSet) -> bool;

    fn count(&self) -> usize;

    fn count_in(&self, labels: &LabelSet) -> usize;

    fn people(&self) -> Vec<PersonId>;

    fn people_in(&self, labels: &LabelSet) -> Vec<PersonId>;

    fn sample(
        &self,
        source: &dyn AttributeSource,
        config: &SamplerConfig,
        scratch: &mut SamplingScratch,
        rng: &mut dyn RngCore,
    ) -> Sample;

    #[inline]
    fn validate_label_set(&self, labels: &LabelSet) -> bool {
        self.descriptor().validate(labels)
    }
}

/// Build the partition matching a descriptor: a degenerate one when it declares no dimension.
pub(crate) fn new_partition(
    descriptor: PartitionDescriptor,
    person_capacity: usize,
) -> Box<dyn Partition> {
    if descriptor.is_degenerate() {
        Box::new(DegeneratePartition::new(descriptor, person_capacity))
    } else {
        Box::new(CellPartition::new(descriptor, person_capacity))
    }
}

/// The last transaction each person was handled in.
///
/// The log grows with the largest person id seen and never shrinks.
#[derive(Clone, Debug, Default)]
pub(crate) struct TransactionLog {
    last: Vec<Option<TransactionId>>,
}

impl TransactionLog {
    pub(crate) fn with_capacity(people: usize) -> Self {
        Self {
            last: Vec::with_capacity(people),
        }
    }

    /// Returns `false` if the person was already handled in this transaction.
    pub(crate) fn record(&mut self, person: PersonId, transaction: TransactionId) -> bool {
        let index = person.index();
        if index >= self.last.len() {
            self.last.resize(index + 1, None);
        }
        let last = &mut self.last[index];
        if *last == Some(transaction) {
            return false;
        }
        *last = Some(transaction);
        true
    }
}

/// Whether a person passes the filter after a change; a removed person never does.
pub(crate) fn passes(
    evaluator: &FilterEvaluator,
    source: &dyn AttributeSource,
    event: &PopulationEvent,
) -> Result<bool, PartitionError> {
    match event {
        PopulationEvent::PersonRemoved { .. } => Ok(false),
        _ => Ok(evaluator.evaluate(source, event.person())?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::Filter, descriptor::PartitionSpec, labels::Label};

    const A_PERSON: PersonId = PersonId::new(12);
    const A_TRANSACTION: TransactionId = TransactionId::new(1);
    const ANOTHER_TRANSACTION: TransactionId = TransactionId::new(2);

    fn is_sync_and_send<T: Send + Sync + ?Sized>() {}

    #[test]
    fn support_sync_and_send_traits() {
        is_sync_and_send::<dyn Partition>();
    }

    #[test]
    fn a_transaction_is_only_recorded_once_per_person() {
        let mut log = TransactionLog::with_capacity(4);

        assert!(log.record(A_PERSON, A_TRANSACTION));
        assert!(!log.record(A_PERSON, A_TRANSACTION));
        assert!(log.record(PersonId::new(0), A_TRANSACTION));
        assert!(log.record(A_PERSON, ANOTHER_TRANSACTION));
    }

    #[test]
    fn a_descriptor_without_dimensions_builds_a_degenerate_partition() {
        let descriptor = PartitionSpec::new().filter(Filter::All).build().unwrap();

        assert!(new_partition(descriptor, 0).is_degenerate());
    }

    #[test]
    fn a_descriptor_with_dimensions_builds_a_cell_partition() {
        let descriptor = PartitionSpec::new()
            .region(|region| Some(Label::from(region)))
            .build()
            .unwrap();

        assert!(!new_partition(descriptor, 0).is_degenerate());
    }
}
