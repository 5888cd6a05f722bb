//! UI widgets for the query dashboard.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
    Frame,
};

use super::theme::Theme;
use crate::analysis::AbTestReport;
use crate::warehouse::QueryResult;

/// Column selection list for one role (event 1, event 2 or assignment)
pub struct ColumnSelector<'a> {
    title: &'a str,
    columns: &'a [String],
    selected: Option<usize>,
    theme: &'a Theme,
}

impl<'a> ColumnSelector<'a> {
    pub fn new(
        title: &'a str,
        columns: &'a [String],
        selected: Option<usize>,
        theme: &'a Theme,
    ) -> Self {
        ColumnSelector {
            title,
            columns,
            selected,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.frame_styles(focused);
        let block = Block::default()
            .title(format!(" {} ", self.title))
            .borders(Borders::ALL)
            .border_type(if focused {
                BorderType::Double
            } else {
                BorderType::Plain
            })
            .border_style(border_style)
            .title_style(title_style);

        // Disabled until a query has returned columns
        if self.columns.is_empty() {
            let hint = Paragraph::new("Run a query first")
                .style(self.theme.muted_style())
                .block(block);
            frame.render_widget(hint, area);
            return;
        }

        let items: Vec<ListItem> = self
            .columns
            .iter()
            .map(|c| ListItem::new(c.as_str()))
            .collect();
        let list = List::new(items)
            .block(block)
            .style(self.theme.base_style())
            .highlight_style(self.theme.selection_style())
            .highlight_symbol("> ");

        let mut state = ListState::default();
        state.select(self.selected);
        frame.render_stateful_widget(list, area, &mut state);
    }
}

/// First rows of the query result
pub struct SampleTable<'a> {
    result: Option<&'a QueryResult>,
    rows: usize,
    theme: &'a Theme,
}

impl<'a> SampleTable<'a> {
    pub fn new(result: Option<&'a QueryResult>, rows: usize, theme: &'a Theme) -> Self {
        SampleTable {
            result,
            rows,
            theme,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.frame_styles(focused);
        let block = Block::default()
            .title(" Sample Data ")
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);

        let result = match self.result {
            Some(r) if !r.columns.is_empty() => r,
            _ => {
                let message = Paragraph::new("No data available")
                    .style(self.theme.muted_style())
                    .alignment(ratatui::layout::Alignment::Center)
                    .block(block);
                frame.render_widget(message, area);
                return;
            }
        };

        let header = Row::new(
            result
                .columns
                .iter()
                .map(|c| Cell::from(c.name.as_str())),
        )
        .style(self.theme.title_style());

        let rows: Vec<Row> = result
            .head(self.rows)
            .iter()
            .map(|row| Row::new(row.iter().map(|v| Cell::from(v.to_string()))))
            .collect();

        let widths = vec![Constraint::Fill(1); result.columns.len()];
        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .style(self.theme.base_style())
            .column_spacing(1);
        frame.render_widget(table, area);
    }
}

/// Lift and chi-squared summary
pub struct StatsPanel<'a> {
    report: Option<&'a AbTestReport>,
    theme: &'a Theme,
}

impl<'a> StatsPanel<'a> {
    pub fn new(report: Option<&'a AbTestReport>, theme: &'a Theme) -> Self {
        StatsPanel { report, theme }
    }

    fn lines(&self, report: &AbTestReport) -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(Span::styled(
            report.lift_message(),
            Style::default().add_modifier(Modifier::BOLD),
        ))];
        lines.push(Line::from(""));

        let significant = report
            .chi_squared
            .as_ref()
            .map(|t| t.is_significant(report.alpha))
            .unwrap_or(false);
        let chi_lines = report.chi_squared_lines();
        let last = chi_lines.len().saturating_sub(1);
        for (i, text) in chi_lines.into_iter().enumerate() {
            let style = if i == last && last > 0 {
                self.theme.verdict_style(significant)
            } else {
                self.theme.base_style()
            };
            lines.push(Line::from(Span::styled(text, style)));
        }
        lines
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.frame_styles(focused);
        let block = Block::default()
            .title(" A/B Test ")
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);

        let lines = match self.report {
            Some(report) => self.lines(report),
            None => vec![Line::from(Span::styled(
                "Select the event and assignment columns after running a query",
                self.theme.muted_style(),
            ))],
        };

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

/// Status bar widget
pub struct StatusBar<'a> {
    project: &'a str,
    result: Option<&'a QueryResult>,
    from_cache: bool,
    running: Option<char>,
    error: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(project: &'a str, theme: &'a Theme) -> Self {
        StatusBar {
            project,
            result: None,
            from_cache: false,
            running: None,
            error: None,
            theme,
        }
    }

    pub fn result(mut self, result: Option<&'a QueryResult>, from_cache: bool) -> Self {
        self.result = result;
        self.from_cache = from_cache;
        self
    }

    /// Show a spinner frame while a query is in flight
    pub fn running(mut self, spinner: Option<char>) -> Self {
        self.running = spinner;
        self
    }

    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    pub fn text(&self) -> String {
        if let Some(e) = self.error {
            return format!("Error: {e}");
        }
        let mut text = format!("bq-abtest: {}", self.project);
        if let Some(spinner) = self.running {
            text.push_str(&format!(" | {spinner} Running query..."));
        } else if let Some(result) = self.result {
            text.push_str(&format!(" | {} rows", result.rows.len()));
            if result.is_truncated() {
                text.push_str(&format!(" of {}", result.total_rows));
            }
            if self.from_cache {
                text.push_str(" (cached)");
            }
            text.push_str(&format!(" at {}", result.fetched_at.format("%H:%M:%S UTC")));
        }
        text.push_str(" | [F5] Run [F1] Help [Ctrl+C] Quit");
        text
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let style = if self.error.is_some() {
            self.theme.error_style()
        } else {
            self.theme.base_style()
        };
        let paragraph = Paragraph::new(self.text())
            .style(style)
            .block(Block::default().borders(Borders::TOP).border_style(self.theme.frame_style()));

        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::{Column, Value};

    fn result(rows: usize, total: u64) -> QueryResult {
        let mut result = QueryResult::new(
            vec![Column::new("n", "INT64")],
            (0..rows).map(|i| vec![Value::Int(i as i64)]).collect(),
        );
        result.total_rows = total;
        result
    }

    #[test]
    fn test_status_idle() {
        let theme = Theme::default();
        let text = StatusBar::new("demo", &theme).text();
        assert!(text.starts_with("bq-abtest: demo |"));
    }

    #[test]
    fn test_status_rows_truncated_and_cached() {
        let theme = Theme::default();
        let r = result(5, 50);
        let text = StatusBar::new("demo", &theme).result(Some(&r), true).text();
        assert!(text.contains("5 rows of 50 (cached) at "));
    }

    #[test]
    fn test_status_shows_fetch_time() {
        let theme = Theme::default();
        let mut r = result(2, 2);
        r.fetched_at = chrono::DateTime::from_timestamp(3_723, 0).unwrap();
        let text = StatusBar::new("demo", &theme).result(Some(&r), false).text();
        assert!(text.contains("2 rows at 01:02:03 UTC |"), "{text}");
    }

    #[test]
    fn test_status_running_beats_result() {
        let theme = Theme::default();
        let r = result(5, 5);
        let text = StatusBar::new("demo", &theme)
            .result(Some(&r), false)
            .running(Some('|'))
            .text();
        assert!(text.contains("Running query..."));
        assert!(!text.contains("5 rows"));
    }

    #[test]
    fn test_status_error_wins() {
        let theme = Theme::default();
        let text = StatusBar::new("demo", &theme)
            .running(Some('|'))
            .error(Some("Access Denied"))
            .text();
        assert_eq!(text, "Error: Access Denied");
    }
}
