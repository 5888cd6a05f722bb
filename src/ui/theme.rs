//! Theme configuration for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// Color theme for the application
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub frame: Color,
    pub focus: Color,
    pub selection_bg: Color,
    pub muted: Color,
    pub error: Color,
    pub significant: Color,
    /// Variant A, variant B, then any extra assignment groups
    pub variant_colors: Vec<Color>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Reset,
            fg: Color::White,
            accent: Color::Cyan,
            frame: Color::Rgb(100, 100, 120),
            focus: Color::Yellow,
            selection_bg: Color::Rgb(60, 60, 80),
            muted: Color::DarkGray,
            error: Color::Red,
            significant: Color::Green,
            variant_colors: vec![
                Color::Blue,
                Color::LightRed,
                Color::Green,
                Color::Magenta,
                Color::Cyan,
            ],
        }
    }
}

impl Theme {
    /// Plain text on the terminal background
    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    /// Selected list item or emphasized value
    pub fn selection_style(&self) -> Style {
        Style::default()
            .fg(self.fg)
            .bg(self.selection_bg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn frame_style(&self) -> Style {
        Style::default().fg(self.frame)
    }

    /// (border, title) styles of a panel; focus turns both yellow
    pub fn frame_styles(&self, focused: bool) -> (Style, Style) {
        if focused {
            let style = Style::default().fg(self.focus).add_modifier(Modifier::BOLD);
            (style, style)
        } else {
            (
                self.frame_style(),
                Style::default().fg(self.frame).add_modifier(Modifier::DIM),
            )
        }
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error).add_modifier(Modifier::BOLD)
    }

    pub fn verdict_style(&self, significant: bool) -> Style {
        if significant {
            Style::default()
                .fg(self.significant)
                .add_modifier(Modifier::BOLD)
        } else {
            self.base_style()
        }
    }

    /// Color of the n-th assignment group, cycling past the end
    pub fn variant_color(&self, index: usize) -> Color {
        self.variant_colors[index % self.variant_colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_a_and_b_differ() {
        let theme = Theme::default();
        assert_ne!(theme.variant_color(0), theme.variant_color(1));
    }

    #[test]
    fn test_variant_color_cycles() {
        let theme = Theme::default();
        let len = theme.variant_colors.len();
        assert_eq!(theme.variant_color(1), theme.variant_color(len + 1));
    }

    #[test]
    fn test_focus_changes_frame() {
        let theme = Theme::default();
        let (focused_border, focused_title) = theme.frame_styles(true);
        let (border, _) = theme.frame_styles(false);
        assert_ne!(focused_border, border);
        assert_eq!(focused_border, focused_title);
    }

    #[test]
    fn test_verdict_highlights_only_significant() {
        let theme = Theme::default();
        assert_eq!(theme.verdict_style(false), theme.base_style());
        assert_eq!(theme.verdict_style(true).fg, Some(Color::Green));
    }
}
