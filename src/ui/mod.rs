pub mod components;
pub mod dashboard;
pub mod styles;

pub use components::TerminalGuard;
pub use dashboard::{draw_dashboard, run_dashboard, DashboardState};
