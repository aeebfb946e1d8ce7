use crate::{
    attributes::{AttributeSource, PersonId},
    descriptor::PartitionDescriptor,
    error::PartitionError,
    evaluation::FilterEvaluator,
    events::{MembershipChange, PopulationEvent, TransactionId},
    labels::LabelSet,
    partition::{passes, Partition, TransactionLog},
    people_set::PersonSet,
    sampling::{sample_cells, Sample, SamplerConfig, SamplingScratch},
};
use rand::RngCore;

/// A partition without dimensions: the set of people passing its filter.
#[derive(Debug)]
pub(crate) struct DegeneratePartition {
    descriptor: PartitionDescriptor,
    evaluator: FilterEvaluator,
    members: PersonSet,
    transactions: TransactionLog,
}

impl DegeneratePartition {
    pub(crate) fn new(descriptor: PartitionDescriptor, person_capacity: usize) -> Self {
        Self {
            evaluator: FilterEvaluator::new(descriptor.filter()),
            descriptor,
            members: PersonSet::new(),
            transactions: TransactionLog::with_capacity(person_capacity),
        }
    }
}

impl Partition for DegeneratePartition {
    #[inline]
    fn descriptor(&self) -> &PartitionDescriptor {
        &self.descriptor
    }

    #[inline]
    fn is_degenerate(&self) -> bool {
        true
    }

    fn init(
        &mut self,
        _source: &dyn AttributeSource,
        people: &[PersonId],
    ) -> Result<(), PartitionError> {
        for person in people {
            self.members.insert(*person);
        }
        Ok(())
    }

    fn handle(
        &mut self,
        source: &dyn AttributeSource,
        transaction: TransactionId,
        event: &PopulationEvent,
    ) -> Result<Option<MembershipChange>, PartitionError> {
        let person = event.person();
        if !self.transactions.record(person, transaction) {
            return Ok(None);
        }

        let passing = passes(&self.evaluator, source, event)?;
        match (passing, self.members.contains(person)) {
            (true, false) => {
                self.members.insert(person);
                tracing::trace!(%person, "joined");
                Ok(Some(MembershipChange::Joined))
            }
            (false, true) => {
                self.members.remove(person);
                tracing::trace!(%person, "left");
                Ok(Some(MembershipChange::Left))
            }
            _ => Ok(None),
        }
    }

    #[inline]
    fn contains(&self, person: PersonId) -> bool {
        self.members.contains(person)
    }

    fn contains_in(&self, person: PersonId, labels: &LabelSet) -> bool {
        labels.is_empty() && self.contains(person)
    }

    #[inline]
    fn count(&self) -> usize {
        self.members.len()
    }

    fn count_in(&self, labels: &LabelSet) -> usize {
        if labels.is_empty() {
            self.count()
        } else {
            0
        }
    }

    fn people(&self) -> Vec<PersonId> {
        self.members.as_slice().to_vec()
    }

    fn people_in(&self, labels: &LabelSet) -> Vec<PersonId> {
        if labels.is_empty() {
            self.people()
        } else {
            vec![]
        }
    }

    fn sample(
        &self,
        source: &dyn AttributeSource,
        config: &SamplerConfig,
        scratch: &mut SamplingScratch,
        rng: &mut dyn RngCore,
    ) -> Sample {
        if config.labels().is_some_and(|labels| !labels.is_empty()) {
            return Sample::Empty;
        }
        sample_cells(&[&self.members], |_| LabelSet::new(), config, source, scratch, rng)
    }
}
