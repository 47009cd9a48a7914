mod engine;
mod wakeup;

pub use engine::{
    Due, SiteTimer, TimerEngine, TimerState, TICK_INTERVAL_SECS, WATCHDOG_STALE_SECS, WATCHDOG_SWEEP_SECS,
};
pub use wakeup::{WakeupQueue, WakeupTarget};
