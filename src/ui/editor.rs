//! Multi-line SQL editor state and widget.
//!
//! The cursor is tracked as (line, column) in characters, not bytes, so
//! editing stays correct for non-ASCII identifiers and string literals.

use ratatui::{
    layout::{Position, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::theme::Theme;

/// Editable text buffer with a cursor
#[derive(Debug, Clone)]
pub struct QueryEditor {
    lines: Vec<String>,
    row: usize,
    col: usize,
}

impl Default for QueryEditor {
    fn default() -> Self {
        QueryEditor {
            lines: vec![String::new()],
            row: 0,
            col: 0,
        }
    }
}

/// Byte offset of the `col`-th character in `line`
fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

impl QueryEditor {
    pub fn new(text: &str) -> Self {
        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        if lines.is_empty() {
            lines.push(String::new());
        }
        let row = lines.len() - 1;
        let col = lines[row].chars().count();
        QueryEditor { lines, row, col }
    }

    /// Full buffer contents
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines[row].chars().count()
    }

    pub fn insert_char(&mut self, c: char) {
        let idx = byte_index(&self.lines[self.row], self.col);
        self.lines[self.row].insert(idx, c);
        self.col += 1;
    }

    /// Split the current line at the cursor
    pub fn insert_newline(&mut self) {
        let idx = byte_index(&self.lines[self.row], self.col);
        let rest = self.lines[self.row].split_off(idx);
        self.row += 1;
        self.lines.insert(self.row, rest);
        self.col = 0;
    }

    /// Delete the character before the cursor, joining lines at column 0
    pub fn backspace(&mut self) {
        if self.col > 0 {
            let idx = byte_index(&self.lines[self.row], self.col - 1);
            self.lines[self.row].remove(idx);
            self.col -= 1;
        } else if self.row > 0 {
            let line = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.line_len(self.row);
            self.lines[self.row].push_str(&line);
        }
    }

    /// Delete the character under the cursor, joining the next line at line end
    pub fn delete(&mut self) {
        if self.col < self.line_len(self.row) {
            let idx = byte_index(&self.lines[self.row], self.col);
            self.lines[self.row].remove(idx);
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = self.line_len(self.row);
        }
    }

    pub fn move_right(&mut self) {
        if self.col < self.line_len(self.row) {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(self.line_len(self.row));
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(self.line_len(self.row));
        }
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = self.line_len(self.row);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Editor panel widget
pub struct EditorPanel<'a> {
    editor: &'a QueryEditor,
    theme: &'a Theme,
}

impl<'a> EditorPanel<'a> {
    pub fn new(editor: &'a QueryEditor, theme: &'a Theme) -> Self {
        EditorPanel { editor, theme }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let (border_style, title_style) = self.theme.frame_styles(focused);
        let block = Block::default()
            .title(" Enter your BigQuery SQL query here ")
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);
        let inner = block.inner(area);

        // Keep the cursor line visible
        let height = inner.height.max(1) as usize;
        let (row, col) = self.editor.cursor();
        let scroll = row.saturating_sub(height - 1);

        let lines: Vec<Line> = if self.editor.is_blank() && !focused {
            vec![Line::from(Span::styled(
                "Press Tab to focus the editor, F5 to run",
                self.theme.muted_style(),
            ))]
        } else {
            self.editor
                .lines
                .iter()
                .map(|l| Line::from(l.as_str()))
                .collect()
        };

        let paragraph = Paragraph::new(lines)
            .block(block)
            .style(self.theme.base_style())
            .scroll((scroll as u16, 0));
        frame.render_widget(paragraph, area);

        if focused {
            let x = inner.x + (col as u16).min(inner.width.saturating_sub(1));
            let y = inner.y + (row - scroll) as u16;
            frame.set_cursor_position(Position::new(x, y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(editor: &mut QueryEditor, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                editor.insert_newline();
            } else {
                editor.insert_char(c);
            }
        }
    }

    #[test]
    fn test_new_places_cursor_at_end() {
        let editor = QueryEditor::new("SELECT *\nFROM t");
        assert_eq!(editor.cursor(), (1, 6));
        assert_eq!(editor.text(), "SELECT *\nFROM t");
    }

    #[test]
    fn test_empty_editor() {
        let editor = QueryEditor::new("");
        assert!(editor.is_blank());
        assert_eq!(editor.cursor(), (0, 0));
        assert_eq!(editor.text(), "");
    }

    #[test]
    fn test_typing_and_newlines() {
        let mut editor = QueryEditor::default();
        type_str(&mut editor, "SELECT 1\nFROM x");
        assert_eq!(editor.text(), "SELECT 1\nFROM x");
        assert_eq!(editor.cursor(), (1, 6));
    }

    #[test]
    fn test_insert_in_middle_of_line() {
        let mut editor = QueryEditor::new("SELECT  FROM t");
        editor.move_home();
        for _ in 0..7 {
            editor.move_right();
        }
        editor.insert_char('*');
        assert_eq!(editor.text(), "SELECT * FROM t");
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut editor = QueryEditor::new("SELECT\n1");
        editor.move_home();
        editor.backspace();
        assert_eq!(editor.text(), "SELECT1");
        assert_eq!(editor.cursor(), (0, 6));
    }

    #[test]
    fn test_delete_joins_next_line() {
        let mut editor = QueryEditor::new("a\nb");
        editor.move_up();
        editor.move_end();
        editor.delete();
        assert_eq!(editor.text(), "ab");
    }

    #[test]
    fn test_multibyte_characters() {
        let mut editor = QueryEditor::new("'héllo'");
        editor.move_left();
        editor.backspace();
        assert_eq!(editor.text(), "'héll'");
        editor.move_home();
        editor.move_right();
        editor.move_right();
        editor.delete();
        assert_eq!(editor.text(), "'hll'");
    }

    #[test]
    fn test_vertical_movement_clamps_column() {
        let mut editor = QueryEditor::new("SELECT long_column\nFROM t");
        editor.move_up();
        assert_eq!(editor.cursor(), (0, 6));
        editor.move_end();
        editor.move_down();
        assert_eq!(editor.cursor(), (1, 6));
    }

    #[test]
    fn test_left_right_wrap_lines() {
        let mut editor = QueryEditor::new("ab\ncd");
        editor.move_home();
        editor.move_left();
        assert_eq!(editor.cursor(), (0, 2));
        editor.move_right();
        assert_eq!(editor.cursor(), (1, 0));
    }

    #[test]
    fn test_clear() {
        let mut editor = QueryEditor::new("SELECT 1");
        editor.clear();
        assert!(editor.is_blank());
        assert_eq!(editor.cursor(), (0, 0));
    }
}
