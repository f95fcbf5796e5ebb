use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub fn split_vertical(area: Rect, constraints: &[Constraint]) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints.iter().copied().collect::<Vec<_>>())
        .split(area)
        .to_vec()
}

pub fn split_horizontal(area: Rect, constraints: &[Constraint]) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints.iter().copied().collect::<Vec<_>>())
        .split(area)
        .to_vec()
}

/// Two-by-two grid, row-major.
pub fn quadrants(area: Rect) -> [Rect; 4] {
    let halves = [Constraint::Percentage(50), Constraint::Percentage(50)];
    let rows = split_vertical(area, &halves);
    let top = split_horizontal(rows[0], &halves);
    let bottom = split_horizontal(rows[1], &halves);
    [top[0], top[1], bottom[0], bottom[1]]
}
