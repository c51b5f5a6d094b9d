//! Types and traits for recording training metrics.
//!
//! Components of the training loop report what they did as a [`Record`], a
//! map from string keys to [`RecordValue`]s. The [`Trainer`](crate::Trainer)
//! merges the records of an environment step and an optimization step and
//! hands them to an [`AggregateRecorder`], which aggregates stored records
//! and writes them out on flush.
//!
//! ```rust
//! use rezero_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("opt_steps", RecordValue::Scalar(1.0));
//! record.insert("loss", RecordValue::Scalar(0.25));
//! assert_eq!(record.get_scalar("loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::{AggregateRecorder, Recorder};
pub use storage::RecordStorage;
