/// Single-line text field with a cursor, used by the input panel and the
/// search box. The cursor is a char index, not a byte offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineEditor {
    content: String,
    cursor: usize,
}

impl LineEditor {
    #[cfg(test)]
    pub fn new(content: &str) -> Self {
        LineEditor {
            content: content.to_string(),
            cursor: content.chars().count(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: &str) {
        if self.content != content {
            self.content = content.to_string();
            self.cursor = self.len();
        }
    }

    fn len(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map_or(self.content.len(), |(i, _)| i)
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    /// Backspace.
    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_index(self.cursor - 1);
        self.content.remove(at);
        self.cursor -= 1;
    }

    /// Delete key.
    pub fn delete_forward(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_index(self.cursor);
            self.content.remove(at);
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor < self.len() {
            self.cursor += 1;
        }
    }

    pub fn move_to_start(&mut self) {
        self.cursor = 0;
    }

    pub fn move_to_end(&mut self) {
        self.cursor = self.len();
    }

    /// Text before the cursor, the char under it, and the text after.
    pub fn split_at_cursor(&self) -> (&str, Option<char>, &str) {
        let at = self.byte_index(self.cursor);
        let (before, rest) = self.content.split_at(at);
        let mut chars = rest.chars();
        let under = chars.next();
        (before, under, chars.as_str())
    }
}
