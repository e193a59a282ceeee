mod countdown;
pub mod logger;

pub use countdown::Countdown;
