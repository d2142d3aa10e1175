// Platform layer shared by the locomotion core and the runtimes.

#[macro_use]
pub mod macros;

pub mod clock;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
