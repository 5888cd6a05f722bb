//! Help overlay widget showing keyboard shortcuts.

use ratatui::{
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::theme::Theme;

const DESCRIPTION: &str = "Run a BigQuery query, pick the exposure event, conversion event and assignment columns, then compare variants A and B.";

type Section = (&'static str, &'static [(&'static str, &'static str)]);

const SHORTCUTS: &[Section] = &[
    (
        "Query",
        &[
            ("F5 / Ctrl+R", "Run the query"),
            ("Ctrl+L", "Run the query, bypassing the cache"),
            ("Enter", "New line (in the editor)"),
            ("Ctrl+U", "Clear the editor"),
        ],
    ),
    (
        "Navigation",
        &[
            ("Tab", "Next panel"),
            ("Shift+Tab", "Previous panel"),
            ("j / \u{2193}", "Next column (in a selector)"),
            ("k / \u{2191}", "Previous column (in a selector)"),
            ("Esc", "Switch between editor and selectors / close help"),
        ],
    ),
    (
        "General",
        &[
            ("F1 / ?", "Toggle this help"),
            ("q", "Quit (outside the editor)"),
            ("Ctrl+C", "Quit"),
        ],
    ),
];

/// Help overlay showing all keyboard shortcuts
pub struct HelpOverlay<'a> {
    theme: &'a Theme,
}

impl<'a> HelpOverlay<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        HelpOverlay { theme }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("  {DESCRIPTION}"),
                Style::default().add_modifier(Modifier::ITALIC),
            )),
            Line::from(""),
        ];

        for (section, items) in SHORTCUTS {
            lines.push(Line::from(Span::styled(
                format!("  {section}"),
                Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )));
            for (key, desc) in *items {
                lines.push(Line::from(vec![
                    Span::styled(format!("    {key:<14}"), Style::default().fg(self.theme.accent)),
                    Span::raw(*desc),
                ]));
            }
            lines.push(Line::from(""));
        }
        lines
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(65, 80, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title(" bq-abtest Help ")
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(self.theme.frame_style())
            .title_style(self.theme.title_style());
        let paragraph = Paragraph::new(self.lines())
            .block(block)
            .wrap(Wrap { trim: false })
            .style(self.theme.base_style());

        frame.render_widget(paragraph, popup_area);
    }
}

/// A rect of the given percentage size centered in `area`
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(row);
    popup
}
