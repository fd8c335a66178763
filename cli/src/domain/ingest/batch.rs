//! Bounded batch of classified records
//!
//! An explicit value object owned by the pipeline. Records accumulate until
//! the capacity ceiling forces a flush, which caps peak memory independent
//! of input file size.

use crate::domain::ingest::ClassifiedRecord;

pub struct Batch {
    capacity: usize,
    records: Vec<ClassifiedRecord>,
}

impl Batch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::new(),
        }
    }

    /// Buffer one record; returns true once the batch has hit capacity
    pub fn push(&mut self, record: ClassifiedRecord) -> bool {
        self.records.push(record);
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Take the buffered records, leaving an empty batch for reuse
    pub fn take(&mut self) -> Vec<ClassifiedRecord> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ip: &str) -> ClassifiedRecord {
        ClassifiedRecord {
            timestamp: 1_563_406_831,
            ip_address: ip.to_string(),
            is_error: false,
            nbytes: 0,
            referer: "-".to_string(),
            user_agent: "test".to_string(),
            service: None,
        }
    }

    #[test]
    fn test_push_signals_capacity() {
        let mut batch = Batch::with_capacity(3);

        assert!(!batch.push(record("10.0.0.1")));
        assert!(!batch.push(record("10.0.0.2")));
        assert!(batch.push(record("10.0.0.3")));
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_take_resets_for_reuse() {
        let mut batch = Batch::with_capacity(2);
        batch.push(record("10.0.0.1"));

        let drained = batch.take();
        assert_eq!(drained.len(), 1);
        assert!(batch.is_empty());

        assert!(!batch.push(record("10.0.0.2")));
        assert_eq!(batch.len(), 1);
    }
}
