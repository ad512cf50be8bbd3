/// Trait for datum aggregators.
///
/// This forms the contract between a caller streaming ordered records and the aggregators. An
/// aggregator folds records one at a time and never fails on an individual record: anything it
/// cannot use is skipped. Finalisation is aggregator specific, and consumes the aggregator.
pub trait Aggregator {
    /// Type of record accepted by the aggregator.
    type Record;

    /// Returns the identifier of the source being aggregated.
    fn source_id(&self) -> &str;

    /// Fold a record into the aggregate.
    ///
    /// # Arguments
    ///
    /// * `record`: The record to add. Incomplete records are ignored.
    fn add_record(&mut self, record: &Self::Record);

    /// Fold a sequence of records, in order.
    fn add_records<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a Self::Record>,
        Self::Record: 'a,
    {
        for record in records {
            self.add_record(record);
        }
    }
}
