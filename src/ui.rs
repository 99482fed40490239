use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Frame, Terminal,
};
use std::io;
use uuid::Uuid;

use crate::editor::LineEditor;
use crate::models::{FilterMode, InputField, InputMode, Priority, Task};
use crate::persistence::KeyValueStore;
use crate::store::{Action, TaskStore};
use crate::view::parse_due_date;

pub struct App<S: KeyValueStore> {
    store: TaskStore<S>,
    pub list_state: ListState,
    pub mode: InputMode,
    pub text_input: LineEditor,
    pub due_input: LineEditor,
    pub search_input: LineEditor,
    pub status: Option<String>,
    pub should_quit: bool,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: TaskStore<S>) -> Self {
        let mut app = App {
            store,
            list_state: ListState::default(),
            mode: InputMode::Normal,
            text_input: LineEditor::default(),
            due_input: LineEditor::default(),
            search_input: LineEditor::default(),
            status: None,
            should_quit: false,
        };
        app.clamp_selection();
        app
    }

    #[cfg(test)]
    pub fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    fn dispatch(&mut self, action: Action) -> Result<()> {
        self.store.dispatch(action)?;
        self.clamp_selection();
        Ok(())
    }

    pub fn selected_id(&self) -> Option<Uuid> {
        let i = self.list_state.selected()?;
        self.store.visible().get(i).map(|t| t.id)
    }

    fn select_id(&mut self, id: Uuid) {
        if let Some(i) = self.store.visible().iter().position(|t| t.id == id) {
            self.list_state.select(Some(i));
        }
    }

    // Keeps the selection on a visible row after the list changes shape.
    fn clamp_selection(&mut self) {
        let len = self.store.visible().len();
        if len == 0 {
            self.list_state.select(None);
        } else {
            let i = self.list_state.selected().unwrap_or(0).min(len - 1);
            self.list_state.select(Some(i));
        }
    }

    pub fn next_item(&mut self) {
        let len = self.store.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous_item(&mut self) {
        let len = self.store.visible().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    // Editors mirror the store's form after transitions that rewrite it.
    fn sync_inputs(&mut self) {
        let form = self.store.form().clone();
        self.text_input.set_content(&form.text);
        self.due_input.set_content(&form.due_date);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Editing(field) => self.handle_input_key(field, key),
            InputMode::Search => self.handle_search_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        self.status = None;
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Down | KeyCode::Char('j') => self.next_item(),
            KeyCode::Up | KeyCode::Char('k') => self.previous_item(),
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    self.dispatch(Action::Toggle(id))?;
                    self.select_id(id);
                }
            }
            KeyCode::Char('a') | KeyCode::Char('i') => {
                self.mode = InputMode::Editing(InputField::Text);
            }
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_id() {
                    self.dispatch(Action::BeginEdit(id))?;
                    self.sync_inputs();
                    self.mode = InputMode::Editing(InputField::Text);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_id() {
                    self.dispatch(Action::Delete(id))?;
                    self.sync_inputs();
                }
            }
            KeyCode::Char('C') => {
                self.dispatch(Action::ClearCompleted)?;
                self.sync_inputs();
            }
            KeyCode::Char('/') => {
                self.mode = InputMode::Search;
            }
            KeyCode::Char('f') | KeyCode::Tab => {
                let next = self.store.filter().next();
                self.dispatch(Action::SetFilter(next))?;
            }
            KeyCode::Char(c @ '1'..='3') => {
                let mode = FilterMode::ALL[(c as u8 - b'1') as usize];
                self.dispatch(Action::SetFilter(mode))?;
            }
            KeyCode::Esc => {
                if self.store.is_editing() {
                    self.dispatch(Action::CancelEdit)?;
                    self.sync_inputs();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_input_key(&mut self, field: InputField, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                if self.store.is_editing() {
                    self.dispatch(Action::CancelEdit)?;
                    self.sync_inputs();
                }
                self.mode = InputMode::Normal;
            }
            KeyCode::Enter => self.submit()?,
            KeyCode::Tab => self.mode = InputMode::Editing(field.next()),
            KeyCode::BackTab => self.mode = InputMode::Editing(field.previous()),
            _ => match field {
                InputField::Text => {
                    if edit_line(&mut self.text_input, key) {
                        let text = self.text_input.content().to_string();
                        self.dispatch(Action::SetText(text))?;
                    }
                }
                InputField::DueDate => {
                    if edit_line(&mut self.due_input, key) {
                        let due = self.due_input.content().to_string();
                        self.dispatch(Action::SetDueDate(due))?;
                    }
                }
                InputField::Priority => {
                    let current = self.store.form().priority;
                    let chosen = match key.code {
                        KeyCode::Right | KeyCode::Char(' ') => Some(current.cycle()),
                        KeyCode::Left => Some(current.cycle_back()),
                        KeyCode::Char('h') => Some(Priority::High),
                        KeyCode::Char('m') => Some(Priority::Medium),
                        KeyCode::Char('l') => Some(Priority::Low),
                        _ => None,
                    };
                    if let Some(priority) = chosen {
                        self.dispatch(Action::SetPriority(priority))?;
                    }
                }
            },
        }
        Ok(())
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => self.mode = InputMode::Normal,
            _ => {
                if edit_line(&mut self.search_input, key) {
                    let term = self.search_input.content().to_string();
                    self.dispatch(Action::SetSearch(term))?;
                }
            }
        }
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        let form = self.store.form();
        if form.text.trim().is_empty() {
            return Ok(());
        }
        let due = form.due_date.trim();
        if !due.is_empty() && parse_due_date(due).is_none() {
            self.status = Some(format!("Due date '{}' is not YYYY-MM-DD", due));
            self.mode = InputMode::Editing(InputField::DueDate);
            return Ok(());
        }

        let committed = self.store.edit_target();
        self.dispatch(Action::Submit)?;
        self.sync_inputs();
        self.status = None;

        match committed {
            Some(id) => {
                self.select_id(id);
                self.mode = InputMode::Normal;
            }
            None => {
                if let Some(last) = self.store.tasks().last() {
                    let id = last.id;
                    self.select_id(id);
                }
                self.mode = InputMode::Editing(InputField::Text);
            }
        }
        Ok(())
    }
}

/// Applies a line-editing key; returns true when the content changed.
fn edit_line(editor: &mut LineEditor, key: KeyEvent) -> bool {
    let before = editor.content().len();
    match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            editor.insert_char(c);
            return true;
        }
        KeyCode::Backspace => editor.delete_char(),
        KeyCode::Delete => editor.delete_forward(),
        KeyCode::Left => editor.move_cursor_left(),
        KeyCode::Right => editor.move_cursor_right(),
        KeyCode::Home => editor.move_to_start(),
        KeyCode::End => editor.move_to_end(),
        _ => {}
    }
    editor.content().len() != before
}

pub fn run_tui<S: KeyValueStore>(store: TaskStore<S>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key)?;
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

pub fn ui<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(f.area());

    render_search(f, app, chunks[0]);
    render_input_panel(f, app, chunks[1]);
    render_filter_bar(f, app, chunks[2]);
    render_tasks(f, app, chunks[3]);
    render_footer(f, app, chunks[4]);
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::White)
    }
}

// Draws the cursor as a highlighted cell when the field has focus.
fn field_line(editor: &LineEditor, focused: bool, placeholder: &str) -> Line<'static> {
    if !focused {
        if editor.content().is_empty() {
            return Line::from(Span::styled(
                placeholder.to_string(),
                Style::default().fg(Color::DarkGray),
            ));
        }
        return Line::from(editor.content().to_string());
    }

    let (before, under, after) = editor.split_at_cursor();
    Line::from(vec![
        Span::raw(before.to_string()),
        Span::styled(
            under.map_or(" ".to_string(), |c| c.to_string()),
            Style::default().bg(Color::Cyan).fg(Color::Black),
        ),
        Span::raw(after.to_string()),
    ])
}

fn render_search<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let focused = app.mode == InputMode::Search;
    let search = Paragraph::new(field_line(&app.search_input, focused, "Search... (/)")).block(
        Block::default()
            .borders(Borders::ALL)
            .title("My Todo List")
            .border_style(focus_style(focused)),
    );
    f.render_widget(search, area);
}

fn render_input_panel<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Min(10),
                Constraint::Length(14),
                Constraint::Length(12),
                Constraint::Length(10),
            ]
            .as_ref(),
        )
        .split(area);

    let focused = match app.mode {
        InputMode::Editing(field) => Some(field),
        _ => None,
    };

    let text = Paragraph::new(field_line(
        &app.text_input,
        focused == Some(InputField::Text),
        "Add a new todo... (a)",
    ))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Task")
            .border_style(focus_style(focused == Some(InputField::Text))),
    );
    f.render_widget(text, chunks[0]);

    let due = Paragraph::new(field_line(
        &app.due_input,
        focused == Some(InputField::DueDate),
        "YYYY-MM-DD",
    ))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Due")
            .border_style(focus_style(focused == Some(InputField::DueDate))),
    );
    f.render_widget(due, chunks[1]);

    let priority = app.store.form().priority;
    let selector = Paragraph::new(Line::from(Span::styled(
        format!("< {} >", priority),
        Style::default().fg(priority_color(priority)),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Priority")
            .border_style(focus_style(focused == Some(InputField::Priority))),
    );
    f.render_widget(selector, chunks[2]);

    let label = if app.store.is_editing() { "Update" } else { "Add" };
    let button = Paragraph::new(Span::styled(
        label,
        Style::default().fg(Color::White).bg(Color::Blue).add_modifier(Modifier::BOLD),
    ))
    .alignment(ratatui::layout::Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title("Enter"));
    f.render_widget(button, chunks[3]);
}

fn render_filter_bar<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(24)].as_ref())
        .split(area);

    let titles: Vec<Line> = FilterMode::ALL
        .iter()
        .map(|mode| Line::from(mode.label()))
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("Filter (f / 1-3)"))
        .select(app.store.filter().index())
        .style(Style::default().fg(Color::Cyan))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
    f.render_widget(tabs, chunks[0]);

    let clear = Paragraph::new(Span::styled(
        "C: Clear completed",
        Style::default().fg(Color::Red),
    ))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(clear, chunks[1]);
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn task_item(task: &Task, editing: bool) -> ListItem<'static> {
    let text_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans = vec![
        Span::raw(if task.completed { "[x] " } else { "[ ] " }),
        Span::styled(task.text.clone(), text_style),
    ];
    if let Some(due) = &task.due_date {
        spans.push(Span::styled(format!("  {}", due), Style::default().fg(Color::Gray)));
    }
    if let Some(priority) = task.priority {
        spans.push(Span::styled(
            format!("  {}", priority),
            Style::default().fg(priority_color(priority)),
        ));
    }
    if editing {
        spans.push(Span::styled("  (editing)", Style::default().fg(Color::Cyan)));
    }

    ListItem::new(Line::from(spans))
}

fn render_tasks<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>, area: Rect) {
    let editing = app.store.edit_target();
    let items: Vec<ListItem> = app
        .store
        .visible()
        .into_iter()
        .map(|task| task_item(task, editing == Some(task.id)))
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Tasks"))
        .highlight_style(
            Style::default()
                .bg(Color::LightGreen)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_footer<S: KeyValueStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let help = match app.mode {
        InputMode::Normal => "space: toggle  e: edit  d: delete  a: add  /: search  q: quit",
        InputMode::Editing(_) => "enter: save  tab: next field  esc: cancel",
        InputMode::Search => "enter/esc: done",
    };

    let mut spans = vec![
        Span::styled(
            format!("{} tasks left", app.store.active_count()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(help, Style::default().fg(Color::Gray)),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Red)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use ratatui::backend::TestBackend;

    fn app() -> App<MemoryStore> {
        App::new(TaskStore::open(MemoryStore::new()).unwrap())
    }

    fn press(app: &mut App<MemoryStore>, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap();
    }

    fn type_str(app: &mut App<MemoryStore>, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn add(app: &mut App<MemoryStore>, text: &str) {
        press(app, KeyCode::Char('a'));
        type_str(app, text);
        press(app, KeyCode::Enter);
        press(app, KeyCode::Esc);
    }

    fn screen(app: &mut App<MemoryStore>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|f| ui(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn typing_and_enter_adds_task() {
        let mut app = app();
        add(&mut app, "Buy milk");
        assert_eq!(app.text_input.content(), "");
        assert_eq!(app.mode, InputMode::Normal);

        add(&mut app, "   ");
        assert_eq!(app.store().tasks().len(), 1);
        assert_eq!(app.store().tasks()[0].text, "Buy milk");
    }

    #[test]
    fn tab_moves_to_due_and_priority() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "Pay rent");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "2024-04-01");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('h'));
        press(&mut app, KeyCode::Enter);

        let task = &app.store().tasks()[0];
        assert_eq!(task.due_date.as_deref(), Some("2024-04-01"));
        assert_eq!(task.priority, Some(Priority::High));
    }

    #[test]
    fn invalid_due_date_blocks_submit() {
        let mut app = app();
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "x");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "tomorrow");
        press(&mut app, KeyCode::Enter);
        assert!(app.store().tasks().is_empty());
        assert!(app.status.is_some());
        assert_eq!(app.mode, InputMode::Editing(InputField::DueDate));
    }

    #[test]
    fn selection_targets_visible_row_not_storage_index() {
        let mut app = app();
        add(&mut app, "low one");
        press(&mut app, KeyCode::Char('a'));
        type_str(&mut app, "urgent");
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('h'));
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Esc);

        // "urgent" sorts first, so the top row is the second stored task.
        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char(' '));
        let urgent = app.store().tasks().iter().find(|t| t.text == "urgent").unwrap();
        assert!(urgent.completed);
        assert!(!app.store().tasks()[0].completed);
    }

    #[test]
    fn edit_then_update_replaces_text() {
        let mut app = app();
        add(&mut app, "draft");
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.text_input.content(), "draft");
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_str(&mut app, "ws");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.store().tasks().len(), 1);
        assert_eq!(app.store().tasks()[0].text, "draws");
        assert!(!app.store().is_editing());
        assert_eq!(app.mode, InputMode::Normal);
    }

    #[test]
    fn filter_keys_and_clear_completed() {
        let mut app = app();
        add(&mut app, "a");
        add(&mut app, "b");
        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char(' '));

        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.store().visible().len(), 1);
        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.store().filter(), FilterMode::All);

        press(&mut app, KeyCode::Char('C'));
        assert_eq!(app.store().tasks().len(), 1);
        assert_eq!(app.store().tasks()[0].text, "b");
    }

    #[test]
    fn search_narrows_list() {
        let mut app = app();
        add(&mut app, "Buy milk");
        add(&mut app, "Call mom");
        press(&mut app, KeyCode::Char('/'));
        type_str(&mut app, "MOM");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.store().visible().len(), 1);
        assert_eq!(app.selected_id(), Some(app.store().visible()[0].id));
    }

    #[test]
    fn renders_list_and_counter() {
        let mut app = app();
        add(&mut app, "Buy milk");
        add(&mut app, "Walk dog");
        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char(' '));

        let text = screen(&mut app);
        assert!(text.contains("Buy milk"));
        assert!(text.contains("Walk dog"));
        assert!(text.contains("1 tasks left"));
        assert!(text.contains("Clear completed"));
        assert!(text.contains("Add"));
    }
}
