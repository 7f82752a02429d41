//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the visited set, the pending queue and the dead letter list,
//!   in the form they are checkpointed and restored
//! - `DriverState`: lifecycle of the crawl driver (running, stopping, stopped)

mod crawl_state;
mod driver_state;

pub use crawl_state::CrawlState;
pub use driver_state::DriverState;
