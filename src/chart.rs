//! Chart Rendering
//!
//! Draws a measurement window as a line chart on a character grid.

use crate::measurement::Measurement;

/// Glyph for a reading
const POINT: char = '*';
/// Glyph for the line between two readings
const LINE: char = '.';
/// Number of horizontal grid steps (labels at 0..=GRID_STEPS)
const GRID_STEPS: usize = 5;

/// Size of the plotting area in characters, excluding axes and labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartSize {
    pub width: usize,
    pub height: usize,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 72,
            height: 16,
        }
    }
}

/// Render `points` (already sorted and windowed) as a text chart
pub fn render_chart(points: &[Measurement], size: ChartSize) -> String {
    let width = size.width.max(2);
    let height = size.height.max(2);

    if points.is_empty() {
        let pad = width.saturating_sub(7) / 2;
        let mut out = String::new();
        for row in 0..height {
            if row == height / 2 {
                out.push_str(&format!("{}No data\n", " ".repeat(pad)));
            } else {
                out.push('\n');
            }
        }
        return out;
    }

    let (min, max) = y_range(points);

    let mut grid = vec![vec![' '; width]; height];
    let to_row = |value: f64| -> usize {
        let ratio = (max - value) / (max - min);
        ((ratio * (height - 1) as f64).round() as usize).min(height - 1)
    };
    let to_col = |idx: usize| -> usize {
        if points.len() == 1 {
            0
        } else {
            ((idx as f64 / (points.len() - 1) as f64) * (width - 1) as f64).round() as usize
        }
    };

    // Connect consecutive readings first so points are drawn on top
    for (idx, pair) in points.windows(2).enumerate() {
        let (x0, y0) = (to_col(idx), to_row(pair[0].value) as f64);
        let (x1, y1) = (to_col(idx + 1), to_row(pair[1].value) as f64);
        if x1 > x0 {
            for x in x0..=x1 {
                let t = (x - x0) as f64 / (x1 - x0) as f64;
                let y = (y0 + t * (y1 - y0)).round() as usize;
                grid[y][x] = LINE;
            }
        }
    }
    for (idx, point) in points.iter().enumerate() {
        grid[to_row(point.value)][to_col(idx)] = POINT;
    }

    // Y-axis labels on GRID_STEPS + 1 evenly spaced rows
    let mut labels = vec![String::new(); height];
    for i in 0..=GRID_STEPS {
        let row = ((i as f64 / GRID_STEPS as f64) * (height - 1) as f64).round() as usize;
        let value = max - (i as f64 / GRID_STEPS as f64) * (max - min);
        labels[row] = format!("{:.1}", value);
    }
    let label_width = labels.iter().map(String::len).max().unwrap_or(0);

    let mut out = String::new();
    for (label, row) in labels.iter().zip(&grid) {
        let line: String = row.iter().collect();
        out.push_str(&format!("{:>w$} |{}\n", label, line.trim_end(), w = label_width));
    }
    out.push_str(&format!("{} +{}\n", " ".repeat(label_width), "-".repeat(width)));
    out.push_str(&format!(
        "{}  {}\n",
        " ".repeat(label_width),
        x_labels(points, width).trim_end()
    ));
    out
}

/// Y range padded by 10% of the data span, or by 1 when the data is flat
fn y_range(points: &[Measurement]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for point in points {
        min = min.min(point.value);
        max = max.max(point.value);
    }

    let span = max - min;
    if !span.is_finite() {
        // Clamp so the span and its padding stay representable
        let limit = f64::MAX / 4.0;
        let (min, max) = (min.max(-limit), max.min(limit));
        let padding = (max - min) * 0.1;
        return (min - padding, max + padding);
    }
    let padding = if span > 0.0 { span * 0.1 } else { 1.0 };
    (min - padding, max + padding)
}

/// Time labels for the first, middle and last reading
fn x_labels(points: &[Measurement], width: usize) -> String {
    let mut line = vec![' '; width];
    let mut place = |text: &str, start: usize| {
        let start = start.min(width.saturating_sub(text.len()));
        if line[start..].iter().take(text.len() + 1).all(|c| *c == ' ') || start == 0 {
            for (i, c) in text.chars().enumerate() {
                if let Some(slot) = line.get_mut(start + i) {
                    *slot = c;
                }
            }
        }
    };

    let first = points[0].label();
    place(&first, 0);

    if points.len() > 2 {
        let mid = points[points.len() / 2].label();
        place(&mid, (width / 2).saturating_sub(mid.len() / 2));
    }
    if points.len() > 1 {
        let last = points[points.len() - 1].label();
        place(&last, width.saturating_sub(last.len()));
    }

    line.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn reading(secs: i64, value: f64) -> Measurement {
        Measurement::new(DateTime::from_timestamp(1_714_557_600 + secs, 0).unwrap(), value)
    }

    #[test]
    fn test_empty_chart() {
        let out = render_chart(&[], ChartSize { width: 40, height: 10 });
        assert!(out.contains("No data"));
        assert_eq!(out.lines().count(), 10);
    }

    #[test]
    fn test_chart_layout() {
        let points = vec![reading(0, 400.0), reading(1, 410.0), reading(2, 420.0)];
        let size = ChartSize { width: 30, height: 11 };
        let out = render_chart(&points, size);
        let lines: Vec<&str> = out.lines().collect();

        // Plot rows + axis + time labels
        assert_eq!(lines.len(), 13);
        assert_eq!(out.matches(POINT).count(), 3);
        assert!(lines[0].starts_with("422.0 |"));
        assert!(lines[10].starts_with("398.0 |"));
        assert!(lines[12].contains(&points[0].label()));
        assert!(lines[12].contains(&points[2].label()));
    }

    #[test]
    fn test_rising_series_goes_up() {
        let points = vec![reading(0, 400.0), reading(1, 500.0)];
        let out = render_chart(&points, ChartSize { width: 20, height: 8 });
        let lines: Vec<&str> = out.lines().collect();

        let rows: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(POINT))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rows.len(), 2);

        // Later, higher reading sits above and to the right
        assert!(lines[rows[0]].trim_end().ends_with(POINT));
        let lower = lines[rows[1]];
        let after_axis = &lower[lower.find('|').unwrap() + 1..];
        assert!(after_axis.starts_with(POINT));
    }

    #[test]
    fn test_flat_series_pads_by_one() {
        let points = vec![reading(0, 600.0), reading(1, 600.0)];
        assert_eq!(y_range(&points), (599.0, 601.0));

        let out = render_chart(&points, ChartSize::default());
        assert!(out.starts_with("601.0 |"));
    }

    #[test]
    fn test_extreme_values_stay_finite() {
        let points = vec![reading(0, -1e308), reading(1, 0.0), reading(2, 1e308)];
        let (min, max) = y_range(&points);
        assert!((max - min).is_finite());
        assert!(min < -1e307 && max > 1e307);

        let out = render_chart(&points, ChartSize { width: 20, height: 8 });
        assert!(!out.contains("NaN"));
        let rows: Vec<usize> = out
            .lines()
            .enumerate()
            .filter(|(_, line)| line.contains(POINT))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_single_point() {
        let out = render_chart(&[reading(0, 450.0)], ChartSize { width: 10, height: 5 });
        assert_eq!(out.matches(POINT).count(), 1);
    }
}
