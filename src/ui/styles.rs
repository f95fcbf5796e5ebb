use std::borrow::Cow;

use ratatui::prelude::Stylize;
use ratatui::style::Color;
use ratatui::text::{Line, Text};

/// Accent color used for headers and status badges.
pub const ACCENT: Color = Color::Indexed(208);

/// Build a styled text block for headers.
pub fn header_text<'a>(text: impl Into<Cow<'a, str>>) -> Text<'a> {
    let owned = text.into().into_owned();
    Text::from(owned.bold().fg(ACCENT))
}

/// Produce a dimmed line for secondary descriptions and hints.
pub fn secondary_line<'a>(text: impl Into<Cow<'a, str>>) -> Line<'a> {
    let owned = text.into().into_owned();
    Line::from(owned.dim())
}

pub fn error_line<'a>(text: impl Into<Cow<'a, str>>) -> Line<'a> {
    let owned = text.into().into_owned();
    Line::from(owned.fg(Color::Red))
}
