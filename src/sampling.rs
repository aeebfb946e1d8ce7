use crate::{
    attributes::{AttributeSource, PersonId},
    labels::LabelSet,
    people_set::PersonSet,
};
use rand::{Rng, RngCore};
use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};

/// The weight of every member of a cell, given the labels of the cell.
pub type WeightFunction = Arc<dyn Fn(&dyn AttributeSource, &LabelSet) -> f64 + Send + Sync>;

/// What to sample from a partition; every part is optional.
///
/// ```rust
/// use partition_index::{LabelSet, PersonId, PropertyId, SamplerConfig};
///
/// let config = SamplerConfig::new()
///     .with_labels(LabelSet::new().with_property(PropertyId::new(0), "adult"))
///     .with_excluded(PersonId::new(3))
///     .with_random_stream("contacts")
///     .with_weight(|_, labels| if labels.region().is_some() { 2.0 } else { 1.0 });
/// assert_eq!(Some(PersonId::new(3)), config.excluded());
/// ```
#[derive(Clone, Default)]
pub struct SamplerConfig {
    excluded: Option<PersonId>,
    random_stream: Option<String>,
    labels: Option<LabelSet>,
    weight: Option<WeightFunction>,
}

impl SamplerConfig {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Never select this person.
    pub fn with_excluded(mut self, person: PersonId) -> Self {
        self.excluded = Some(person);
        self
    }

    /// Draw from a named random stream instead of the default one.
    pub fn with_random_stream<S: Into<String>>(mut self, name: S) -> Self {
        self.random_stream = Some(name.into());
        self
    }

    /// Only select among the cells matching these labels.
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_weight<F>(mut self, weight: F) -> Self
    where
        F: Fn(&dyn AttributeSource, &LabelSet) -> f64 + Send + Sync + 'static,
    {
        self.weight = Some(Arc::new(weight));
        self
    }

    #[inline]
    pub const fn excluded(&self) -> Option<PersonId> {
        self.excluded
    }

    #[inline]
    pub fn random_stream(&self) -> Option<&str> {
        self.random_stream.as_deref()
    }

    #[inline]
    pub const fn labels(&self) -> Option<&LabelSet> {
        self.labels.as_ref()
    }

    #[inline]
    pub const fn weight(&self) -> Option<&WeightFunction> {
        self.weight.as_ref()
    }
}

impl Debug for SamplerConfig {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SamplerConfig")
            .field("excluded", &self.excluded)
            .field("random_stream", &self.random_stream)
            .field("labels", &self.labels)
            .field("weighted", &self.weight.is_some())
            .finish()
    }
}

/// The outcome of sampling a partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sample {
    Chosen(PersonId),
    /// Nobody was eligible.
    Empty,
    /// A cell weight was negative or not finite, or the weights did not sum to a finite number.
    Rejected,
}

impl Sample {
    #[inline]
    pub const fn person(self) -> Option<PersonId> {
        match self {
            Self::Chosen(person) => Some(person),
            Self::Empty | Self::Rejected => None,
        }
    }

    #[inline]
    pub const fn is_rejected(self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// The cumulative weights built while sampling, kept around to avoid reallocating them.
#[derive(Clone, Debug, Default)]
pub(crate) struct SamplingScratch {
    cumulative: Vec<f64>,
    cells: Vec<usize>,
}

impl SamplingScratch {
    fn clear(&mut self) {
        self.cumulative.clear();
        self.cells.clear();
    }
}

/// Select a person among `cells`.
///
/// `label_set` describes the cell at a given position and is only called when `config` has a
/// weight.
pub(crate) fn sample_cells<F>(
    cells: &[&PersonSet],
    label_set: F,
    config: &SamplerConfig,
    source: &dyn AttributeSource,
    scratch: &mut SamplingScratch,
    rng: &mut dyn RngCore,
) -> Sample
where
    F: Fn(usize) -> LabelSet,
{
    match config.weight() {
        Some(weight) => sample_weighted(
            cells,
            label_set,
            weight,
            config.excluded(),
            source,
            scratch,
            rng,
        ),
        None => sample_uniformly(cells, config.excluded(), rng),
    }
}

fn sample_uniformly(
    cells: &[&PersonSet],
    excluded: Option<PersonId>,
    rng: &mut dyn RngCore,
) -> Sample {
    let total: usize = cells.iter().map(|cell| eligible(cell, excluded)).sum();
    if total == 0 {
        return Sample::Empty;
    }

    let mut index = rng.gen_range(0..total);
    for cell in cells {
        let size = eligible(cell, excluded);
        if index < size {
            return Sample::Chosen(draw(cell, excluded, rng));
        }
        index -= size;
    }
    unreachable!("the drawn index {index} is past every cell; this is a bug")
}

fn sample_weighted<F>(
    cells: &[&PersonSet],
    label_set: F,
    weight: &WeightFunction,
    excluded: Option<PersonId>,
    source: &dyn AttributeSource,
    scratch: &mut SamplingScratch,
    rng: &mut dyn RngCore,
) -> Sample
where
    F: Fn(usize) -> LabelSet,
{
    scratch.clear();
    let mut total = 0.0;
    for (position, cell) in cells.iter().enumerate() {
        let labels = label_set(position);
        let cell_weight = weight(source, &labels);
        if !cell_weight.is_finite() || cell_weight < 0.0 {
            tracing::warn!(labels = %labels, weight = cell_weight, "rejected sample");
            return Sample::Rejected;
        }

        let size = eligible(cell, excluded);
        if cell_weight == 0.0 || size == 0 {
            continue;
        }
        total += cell_weight * size as f64;
        scratch.cumulative.push(total);
        scratch.cells.push(position);
    }
    if !total.is_finite() {
        tracing::warn!(total, "rejected sample");
        return Sample::Rejected;
    }
    if scratch.cumulative.is_empty() {
        return Sample::Empty;
    }

    let target = rng.gen::<f64>() * total;
    let found = scratch
        .cumulative
        .partition_point(|cumulative| *cumulative < target)
        .min(scratch.cumulative.len() - 1);
    Sample::Chosen(draw(cells[scratch.cells[found]], excluded, rng))
}

#[inline]
fn eligible(cell: &PersonSet, excluded: Option<PersonId>) -> usize {
    match excluded {
        Some(person) if cell.contains(person) => cell.len() - 1,
        _ => cell.len(),
    }
}

/// Uniformly select a member of a cell that has at least one eligible member.
fn draw(cell: &PersonSet, excluded: Option<PersonId>, rng: &mut dyn RngCore) -> PersonId {
    loop {
        let position = rng.gen_range(0..cell.len());
        match cell.get(position) {
            Some(person) if Some(person) != excluded => return person,
            _ => continue,
        }
    }
}
