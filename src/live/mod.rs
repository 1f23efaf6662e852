pub mod alert;
pub mod poller;
pub mod snapshot;

pub use alert::{AlertPlayer, AlertRaised, AlertSound, AlertTrigger};
pub use poller::{LiveFeed, LiveLoopKey, LivePoller};
pub use snapshot::{
    Detection, DetectionSnapshot, DisplayFilter, LiveView, MmwaveStatus, VisibleDetection,
};
