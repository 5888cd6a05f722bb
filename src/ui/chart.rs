//! Charts for the A/B comparison: conversion bars and posterior densities.

use ratatui::{
    layout::{Alignment, Direction, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph, Wrap},
    Frame,
};

use super::theme::Theme;
use crate::analysis::{ConversionSummary, PosteriorCurve, format_percent};

/// Bars are scaled to basis points so the u64 bar values keep two decimals
const RATE_SCALE: f64 = 10_000.0;

/// Braille markers pack two dots into each terminal column
const DOTS_PER_COLUMN: usize = 2;

/// One sample per Braille dot across the plot width
fn sample_count(width: u16) -> usize {
    (width as usize * DOTS_PER_COLUMN).max(2)
}

fn panel_block<'a>(title: &'a str, theme: &Theme, focused: bool) -> Block<'a> {
    let (border_style, title_style) = theme.frame_styles(focused);
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(border_style)
        .title_style(title_style)
}

fn render_message(frame: &mut Frame, area: Rect, block: Block, message: &str, theme: &Theme) {
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let paragraph = Paragraph::new(message.to_string())
        .style(theme.muted_style().add_modifier(Modifier::DIM))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, inner);
}

/// Horizontal bar chart of the conversion rate per assignment
pub struct ConversionChart<'a> {
    summary: Option<&'a ConversionSummary>,
    unavailable: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> ConversionChart<'a> {
    pub fn new(
        summary: Option<&'a ConversionSummary>,
        unavailable: Option<&'a str>,
        theme: &'a Theme,
    ) -> Self {
        ConversionChart {
            summary,
            unavailable,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let block = panel_block("Conversion Rate by Assignment", self.theme, focused);

        let summary = match self.summary {
            Some(s) if !s.variants.is_empty() => s,
            _ => {
                let message = self.unavailable.unwrap_or("No data available");
                render_message(frame, area, block, message, self.theme);
                return;
            }
        };

        let bars: Vec<Bar> = summary
            .variants
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Bar::default()
                    .value((v.conversion_rate * RATE_SCALE).round() as u64)
                    .label(Line::from(v.assignment.clone()))
                    .text_value(format_percent(v.conversion_rate))
                    .style(Style::default().fg(self.theme.variant_color(i)))
                    .value_style(self.theme.selection_style())
            })
            .collect();

        let chart = BarChart::default()
            .block(block)
            .direction(Direction::Horizontal)
            .bar_width(1)
            .bar_gap(1)
            .max(RATE_SCALE as u64)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }
}

/// Line chart of each variant's posterior density
pub struct PosteriorChart<'a> {
    curves: &'a [PosteriorCurve],
    unavailable: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> PosteriorChart<'a> {
    pub fn new(curves: &'a [PosteriorCurve], unavailable: Option<&'a str>, theme: &'a Theme) -> Self {
        PosteriorChart {
            curves,
            unavailable,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let block = panel_block("Posterior Distribution of Conversion Rates", self.theme, focused);

        if self.curves.is_empty() {
            let message = self.unavailable.unwrap_or("No data available");
            render_message(frame, area, block, message, self.theme);
            return;
        }

        let (x_min, x_max) = support_bounds(self.curves);
        let samples = sample_count(block.inner(area).width);
        let series: Vec<Vec<(f64, f64)>> = self
            .curves
            .iter()
            .map(|c| c.density_between(x_min, x_max, samples))
            .collect();

        let y_max = series
            .iter()
            .flatten()
            .map(|&(_, y)| y)
            .fold(0.0_f64, f64::max);
        let y_max = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };

        let datasets: Vec<Dataset> = self
            .curves
            .iter()
            .zip(&series)
            .enumerate()
            .map(|(i, (curve, points))| {
                Dataset::default()
                    .name(curve.label())
                    .marker(Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(self.theme.variant_color(i)))
                    .data(points)
            })
            .collect();

        let x_labels = vec![
            Span::raw(format_percent(x_min)),
            Span::raw(format_percent((x_min + x_max) / 2.0)),
            Span::raw(format_percent(x_max)),
        ];
        let y_labels = vec![
            Span::raw("0"),
            Span::raw(format_density(y_max / 2.0)),
            Span::raw(format_density(y_max)),
        ];

        let chart = Chart::new(datasets)
            .block(block)
            .x_axis(
                Axis::default()
                    .title(Span::styled("Conversion Rate", Style::default().add_modifier(Modifier::DIM)))
                    .style(self.theme.base_style())
                    .bounds([x_min, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title(Span::styled("Posterior Density", Style::default().add_modifier(Modifier::DIM)))
                    .style(self.theme.base_style())
                    .bounds([0.0, y_max])
                    .labels(y_labels),
            );

        frame.render_widget(chart, area);
    }
}

/// X-range covering every curve's support
pub fn support_bounds(curves: &[PosteriorCurve]) -> (f64, f64) {
    let bounds = curves
        .iter()
        .map(PosteriorCurve::support)
        .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)));
    match bounds {
        Some((lo, hi)) if hi - lo > f64::EPSILON => (lo, hi),
        _ => (0.0, 1.0),
    }
}

/// Format a density for axis labels
fn format_density(value: f64) -> String {
    if value >= 100.0 {
        format!("{value:.0}")
    } else if value >= 1.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_support_bounds_narrow_for_large_samples() {
        let curves = vec![
            PosteriorCurve::new("A".into(), 1_000, 9_000),
            PosteriorCurve::new("B".into(), 1_200, 8_800),
        ];
        let (lo, hi) = support_bounds(&curves);
        assert!(lo > 0.08 && lo < 0.10, "lo = {lo}");
        assert!(hi > 0.12 && hi < 0.14, "hi = {hi}");
    }

    #[test]
    fn test_support_bounds_full_range_for_flat_prior() {
        let curves = vec![PosteriorCurve::new("A".into(), 0, 0)];
        assert_eq!(support_bounds(&curves), (0.0, 1.0));
    }

    #[test]
    fn test_support_bounds_empty() {
        assert_eq!(support_bounds(&[]), (0.0, 1.0));
    }

    #[test]
    fn test_sample_count_follows_width() {
        assert_eq!(sample_count(80), 160);
        assert_eq!(sample_count(200), 400);
        assert_eq!(sample_count(0), 2);
    }

    #[test]
    fn test_format_density() {
        assert_eq!(format_density(132.98), "133");
        assert_eq!(format_density(2.54), "2.5");
        assert_eq!(format_density(0.5), "0.50");
    }
}
