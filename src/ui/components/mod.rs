pub mod table;
pub mod terminal;
pub mod utils;

pub use table::{band_header, band_row, band_widths, build_table};
pub use terminal::TerminalGuard;
