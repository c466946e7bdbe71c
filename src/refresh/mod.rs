pub mod clock;
pub mod controller;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::RefreshScheduler;
pub use state::{format_countdown, RefreshState, SchedulerStatus};
