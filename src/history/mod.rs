pub mod blob;
pub mod sample_store;
pub mod series;

pub use sample_store::{LoadOutcome, SampleStore, HISTORY_KEY};
pub use series::{
    merge, merge_pair, HistoryStore, IngestOutcome, JoinedRow, MergeReport, RetentionPolicy,
};
