//! Recorder writing training metrics as TensorBoard event files.
use log::warn;
use rezero_core::record::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// Records given to [`AggregateRecorder::store`] are aggregated with
/// [`RecordStorage`] and written on [`AggregateRecorder::flush`].
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
    storage: RecordStorage,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "opt_steps".to_string(),
            storage: RecordStorage::new(),
        }
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [`Record`] into a TFRecord.
    ///
    /// The record must have the step as a scalar with key `opt_steps`.
    /// This method handles [`RecordValue::Scalar`] in the [`Record`];
    /// other variants are ignored.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without {} is discarded", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            if let RecordValue::Scalar(v) = v {
                self.writer.add_scalar(k, *v, step);
            }
        }
        self.writer.flush();
    }
}

impl AggregateRecorder for TensorboardRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, step: i64) {
        let mut record = self.storage.aggregate();
        record.insert(self.step_key.clone(), RecordValue::Scalar(step as _));
        self.write(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_flush_writes_event_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new("tensorboard")?;
        let mut recorder = TensorboardRecorder::new(dir.path());
        for v in [1.0, 2.0, 3.0] {
            recorder.store(Record::from_scalar("loss", v));
        }
        recorder.store(Record::from_scalar("total_reward", 20.0));
        recorder.flush(3);

        let n_files = std::fs::read_dir(dir.path())?.count();
        assert!(n_files > 0);

        Ok(())
    }
}
