pub use crate::config::*;

/// A builder for accumulating records before ranking them.
///
/// ```
/// pub use tally_core::builder::Builder;
/// pub use tally_core::{Dimension, VoteFilter, VoteRecord};
///
/// let mut builder = Builder::new(&VoteFilter::EVERYTHING);
/// builder.add(VoteRecord::section(2024, "1", "10", 25).in_neighborhood("Centro"));
/// builder.add(VoteRecord::section(2024, "1", "11", 18).in_neighborhood("Centro"));
/// builder.add(VoteRecord::section(2024, "2", "3", 30).in_neighborhood("Benfica"));
///
/// let zones = builder.rank(Dimension::Zone);
/// assert_eq!(zones[0].key, "1");
/// assert_eq!(zones[0].votes, 43);
/// assert!(builder.try_rank(Dimension::Regional).is_err());
/// ```
pub struct Builder {
    pub(crate) _filter: VoteFilter,
    pub(crate) _records: Vec<VoteRecord>,
}

impl Builder {
    pub fn new(filter: &VoteFilter) -> Builder {
        Builder {
            _filter: filter.clone(),
            _records: Vec::new(),
        }
    }

    /// Adds a record. Records with zero votes are kept: they count as sections
    /// without votes in the indicators.
    pub fn add(&mut self, record: VoteRecord) {
        self._records.push(record);
    }

    pub fn extend<I: IntoIterator<Item = VoteRecord>>(&mut self, records: I) {
        self._records.extend(records);
    }

    /// Ranks the accumulated records with the current filter.
    pub fn rank(&self, dimension: Dimension) -> Vec<RankedEntry> {
        crate::rank_filtered(&self._records, dimension, &self._filter)
    }

    /// Same as [Builder::rank], but fails when the selected records carry no
    /// value for the dimension.
    pub fn try_rank(&self, dimension: Dimension) -> Result<Vec<RankedEntry>, TallyErrors> {
        crate::try_rank(&self._records, dimension, &self._filter)
    }
}
