pub mod text;
pub mod time;

pub use text::{escape_xml, join_within};
pub use time::{human_utc, report_timestamp_slug};
