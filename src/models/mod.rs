pub mod observation;

pub use observation::{Body, Observation, ObservationPair};
