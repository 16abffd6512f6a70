pub mod time;

pub use time::{SyncAge, TimeFormatter};
