//! Batch accumulation
//!
//! Groups the record stream into batches bounded by record count and by
//! serialized size. The bound is checked before each append and the open batch
//! is flushed in between, so no emitted batch exceeds either limit unless it is
//! a single record that is oversized on its own. Records are never dropped.

use shared::BetRecord;
use uuid::Uuid;

use crate::codec::Message;

/// Count and size bounds for a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_amount: usize,
    pub max_bytes: usize,
}

/// A closed group of records sent as one `bets` message
#[derive(Debug, Clone)]
pub struct Batch {
    batch_id: Uuid,
    client_id: String,
    records: Vec<BetRecord>,
    serialized_size: usize,
}

impl Batch {
    fn open(first: BetRecord) -> Self {
        let serialized_size = first.serialized_size();
        Self {
            batch_id: Uuid::new_v4(),
            client_id: first.client_id().to_string(),
            records: vec![first],
            serialized_size,
        }
    }

    fn accepts(&self, record: &BetRecord, limits: &BatchLimits) -> bool {
        record.client_id() == self.client_id
            && self.records.len() < limits.max_amount
            && self.serialized_size + record.serialized_size() <= limits.max_bytes
    }

    fn push(&mut self, record: BetRecord) {
        self.serialized_size += record.serialized_size();
        self.records.push(record);
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of the wire lines of every record
    pub fn serialized_size(&self) -> usize {
        self.serialized_size
    }

    pub fn records(&self) -> &[BetRecord] {
        &self.records
    }

    /// Bet numbers in batch order, as echoed back by the aggregator's ACK
    pub fn numbers(&self) -> Vec<&str> {
        self.records.iter().map(BetRecord::number).collect()
    }

    pub fn into_records(self) -> Vec<BetRecord> {
        self.records
    }

    pub fn into_message(self) -> Message {
        Message::Bets {
            client_id: self.client_id,
            records: self.records,
        }
    }
}

/// Lazy adapter turning a record stream into a batch stream.
///
/// A source error is yielded as-is and ends the stream; whatever was
/// accumulated in the open batch at that point is discarded.
pub struct BatchAccumulator<I> {
    source: I,
    limits: BatchLimits,
    open: Option<Batch>,
    finished: bool,
}

impl<I> BatchAccumulator<I> {
    pub fn new(source: I, limits: BatchLimits) -> Self {
        Self {
            source,
            limits,
            open: None,
            finished: false,
        }
    }
}

impl<I, E> Iterator for BatchAccumulator<I>
where
    I: Iterator<Item = Result<BetRecord, E>>,
{
    type Item = Result<Batch, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let record = match self.source.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    self.finished = true;
                    self.open = None;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return self.open.take().map(Ok);
                }
            };

            match self.open.as_mut() {
                Some(open) if open.accepts(&record, &self.limits) => open.push(record),
                Some(_) => {
                    let full = self.open.replace(Batch::open(record));
                    return full.map(Ok);
                }
                None => self.open = Some(Batch::open(record)),
            }
        }
    }
}

/// Batch an in-memory record sequence
pub fn batches<I>(records: I, limits: BatchLimits) -> Vec<Batch>
where
    I: IntoIterator<Item = BetRecord>,
{
    BatchAccumulator::new(
        records.into_iter().map(Ok::<_, std::convert::Infallible>),
        limits,
    )
    .map(|batch| match batch {
        Ok(batch) => batch,
        Err(never) => match never {},
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: usize) -> BetRecord {
        BetRecord::new("1", "Ana", "Diaz", "30904465", "1999-03-17", number.to_string()).unwrap()
    }

    #[test]
    fn test_batch_metadata() {
        let limits = BatchLimits {
            max_amount: 10,
            max_bytes: 10_000,
        };
        let batch = batches(vec![record(1), record(22)], limits).remove(0);

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.client_id(), "1");
        assert_eq!(batch.numbers(), vec!["1", "22"]);
        assert_eq!(
            batch.serialized_size(),
            record(1).serialized_size() + record(22).serialized_size()
        );
    }

    #[test]
    fn test_into_message_keeps_order() {
        let limits = BatchLimits {
            max_amount: 10,
            max_bytes: 10_000,
        };
        let batch = batches(vec![record(3), record(1), record(2)], limits).remove(0);
        let message = batch.into_message();

        let numbers: Vec<_> = message.records().iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec!["3", "1", "2"]);
        assert_eq!(message.client_id(), "1");
    }

    #[test]
    fn test_source_error_ends_stream() {
        let limits = BatchLimits {
            max_amount: 2,
            max_bytes: 10_000,
        };
        let source = vec![Ok(record(1)), Ok(record(2)), Ok(record(3)), Err("bad row")];
        let mut accumulator = BatchAccumulator::new(source.into_iter(), limits);

        assert_eq!(accumulator.next().unwrap().unwrap().len(), 2);
        assert_eq!(accumulator.next().unwrap().unwrap_err(), "bad row");
        assert!(accumulator.next().is_none());
    }

    #[test]
    fn test_client_change_closes_batch() {
        let limits = BatchLimits {
            max_amount: 10,
            max_bytes: 10_000,
        };
        let other = BetRecord::new("2", "Ana", "Diaz", "1", "1999-03-17", "5").unwrap();
        let result = batches(vec![record(1), other, record(2)], limits);

        let clients: Vec<_> = result.iter().map(|b| b.client_id().to_string()).collect();
        assert_eq!(clients, vec!["1", "2", "1"]);
    }
}
