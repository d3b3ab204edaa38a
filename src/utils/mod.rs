mod dates;

pub use dates::{date_from_epoch_seconds, from_epoch_millis, month_name, today_local};
