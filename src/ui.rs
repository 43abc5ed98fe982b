use crate::backend::KeyValueBackend;
use crate::calendar::{self, days_in_month, first_weekday_offset, month_name, weekday_headings};
use crate::config::Config;
use crate::model::{TaskId, TaskRecord};
use crate::session::{Navigation, Projection, Session, SessionError};
use crate::storage::StoreLocation;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::ListState;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};
use tracing::warn;

pub fn run<B: KeyValueBackend>(
    session: Session<B>,
    location: StoreLocation,
    config: Config,
) -> Result<()> {
    let mut app = App::new(session, location, config)?;
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App<B> {
    session: Session<B>,
    location: StoreLocation,
    config: Config,
    view: Projection,
    cursor_day: u32,
    focus: Focus,
    task_idx: usize,
    task_offset: usize,
    last_save: Option<Instant>,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Adding(FieldValue),
    ConfirmDelete { id: TaskId, text: String },
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Focus {
    Grid,
    Tasks,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn delete(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        let next = next_grapheme(self.cursor, &self.value);
        self.value.drain(self.cursor..next);
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl<B: KeyValueBackend> App<B> {
    fn new(
        mut session: Session<B>,
        location: StoreLocation,
        config: Config,
    ) -> Result<Self, SessionError> {
        let view = session.projection()?;
        let (year, month, day) = calendar::today();
        let cursor_day = if (view.year, view.month) == (year, month) {
            day
        } else {
            1
        };
        let status = format!("Loaded tasks from {}", location.path.display());
        Ok(App {
            session,
            location,
            config,
            view,
            cursor_day,
            focus: Focus::Grid,
            task_idx: 0,
            task_offset: 0,
            last_save: None,
            status,
            mode: Mode::Normal,
        })
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Adding(_) => {
                self.handle_add_key(key);
                false
            }
            Mode::ConfirmDelete { .. } => {
                self.handle_confirm_key(key);
                false
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('[') => self.navigate(Navigation::PrevMonth),
            KeyCode::Char(']') => self.navigate(Navigation::NextMonth),
            KeyCode::Char('{') => self.navigate(Navigation::PrevYear),
            KeyCode::Char('}') => self.navigate(Navigation::NextYear),
            KeyCode::Char('t') => self.navigate(Navigation::Today),
            KeyCode::Char('r') => {
                let result = self.session.refresh();
                self.apply(result, "Reloaded markers from disk", false);
            }
            KeyCode::Char('n') | KeyCode::Char('a') => self.start_adding(),
            KeyCode::Esc => {
                let result = self.session.clear_selection();
                if self.apply(result, "Closed day", false) {
                    self.focus = Focus::Grid;
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if self.view.selected.is_some() {
                    self.focus = match self.focus {
                        Focus::Grid => Focus::Tasks,
                        Focus::Tasks => Focus::Grid,
                    };
                }
            }
            _ => match self.focus {
                Focus::Grid => self.handle_grid_key(key),
                Focus::Tasks => self.handle_task_key(key),
            },
        }
        false
    }

    fn handle_grid_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(7),
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.select_cursor_day();
            }
            _ => {}
        }
    }

    fn handle_task_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                if self.task_idx > 0 {
                    self.task_idx -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.task_idx + 1 < self.view.tasks.len() {
                    self.task_idx += 1;
                }
            }
            KeyCode::Left | KeyCode::Char('h') => self.focus = Focus::Grid,
            KeyCode::Char(' ') | KeyCode::Char('x') | KeyCode::Enter => {
                if let Some(task) = self.current_task().cloned() {
                    let result = self.session.toggle_done(task.id);
                    let msg = if task.is_done {
                        format!("Reopened \"{}\"", task.text)
                    } else {
                        format!("Completed \"{}\"", task.text)
                    };
                    if self.apply(result, msg, true) {
                        self.follow_task(task.id);
                    }
                }
            }
            KeyCode::Char('p') => {
                if let Some(task) = self.current_task().cloned() {
                    let result = self.session.toggle_priority(task.id);
                    let msg = if task.is_priority {
                        format!("Cleared priority of \"{}\"", task.text)
                    } else {
                        format!("Prioritized \"{}\"", task.text)
                    };
                    if self.apply(result, msg, true) {
                        self.follow_task(task.id);
                    }
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some((id, text)) = self.current_task().map(|t| (t.id, t.text.clone())) {
                    self.status = format!("Delete \"{}\"? (y to confirm, n/Esc to cancel)", text);
                    self.mode = Mode::ConfirmDelete { id, text };
                } else {
                    self.status = "No task selected to delete".into();
                }
            }
            _ => {}
        }
        self.ensure_task_bounds();
    }

    fn handle_add_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close = match &mut mode {
            Mode::Adding(field) => self.process_add_key(field, key),
            _ => true,
        };
        self.mode = if close { Mode::Normal } else { mode };
    }

    fn process_add_key(&mut self, field: &mut FieldValue, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                true
            }
            KeyCode::Enter => {
                let text = field.value.trim().to_string();
                if text.is_empty() {
                    self.status = "Nothing to add".into();
                    return true;
                }
                let result = self.session.add_task(&text);
                if self.apply(result, format!("Added \"{}\"", text), true) {
                    self.focus = Focus::Tasks;
                    let newest = self
                        .view
                        .tasks
                        .iter()
                        .filter(|task| task.text == text)
                        .map(|task| task.id)
                        .max();
                    if let Some(id) = newest {
                        self.follow_task(id);
                    }
                    true
                } else {
                    false
                }
            }
            KeyCode::Left => {
                field.move_left();
                false
            }
            KeyCode::Right => {
                field.move_right();
                false
            }
            KeyCode::Home => {
                field.cursor = 0;
                false
            }
            KeyCode::End => {
                field.cursor = field.value.len();
                false
            }
            KeyCode::Backspace => {
                field.backspace();
                false
            }
            KeyCode::Delete => {
                field.delete();
                false
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    field.insert_char(c);
                }
                false
            }
            _ => false,
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let (id, text) = match &self.mode {
            Mode::ConfirmDelete { id, text } => (*id, text.clone()),
            _ => return,
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let result = self.session.delete_task(id);
                self.apply(result, format!("Deleted \"{}\"", text), true);
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn navigate(&mut self, nav: Navigation) {
        let result = self.session.navigate(nav);
        let ok = self.apply(result, "", false);
        if !ok {
            return;
        }
        self.status = format!("{} {}", month_name(self.view.month), self.view.year);
        self.cursor_day = match self.view.selected {
            Some(key) => key.day,
            None => self
                .cursor_day
                .min(days_in_month(self.view.year, self.view.month)),
        };
        self.focus = if self.view.selected.is_some() {
            Focus::Tasks
        } else {
            Focus::Grid
        };
    }

    fn start_adding(&mut self) {
        if self.view.selected.is_none() && !self.select_cursor_day() {
            return;
        }
        self.mode = Mode::Adding(FieldValue::new(""));
        self.status = "New task (Enter to add, Esc to cancel)".into();
    }

    fn select_cursor_day(&mut self) -> bool {
        let result = self.session.select_day(self.cursor_day);
        let msg = format!(
            "Viewing {} {}, {}",
            month_name(self.view.month),
            self.cursor_day,
            self.view.year
        );
        if self.apply(result, msg, false) {
            self.focus = Focus::Tasks;
            self.task_idx = 0;
            self.task_offset = 0;
            true
        } else {
            false
        }
    }

    fn move_cursor(&mut self, delta: i64) {
        let days = days_in_month(self.view.year, self.view.month) as i64;
        let target = (self.cursor_day as i64 + delta).clamp(1, days);
        self.cursor_day = target as u32;
    }

    /// Stores a command's projection, or reports its error in the status line.
    fn apply(
        &mut self,
        result: Result<Projection, SessionError>,
        message: impl Into<String>,
        persisted: bool,
    ) -> bool {
        match result {
            Ok(view) => {
                self.view = view;
                self.status = message.into();
                if persisted {
                    self.last_save = Some(Instant::now());
                }
                self.ensure_task_bounds();
                true
            }
            Err(err) => {
                warn!(%err, "command failed");
                self.status = format!("Error: {}", err);
                false
            }
        }
    }

    fn follow_task(&mut self, id: TaskId) {
        if let Some(idx) = self.view.tasks.iter().position(|task| task.id == id) {
            self.task_idx = idx;
        }
        self.ensure_task_bounds();
    }

    fn ensure_task_bounds(&mut self) {
        if self.view.tasks.is_empty() {
            self.task_idx = 0;
            self.task_offset = 0;
        } else if self.task_idx >= self.view.tasks.len() {
            self.task_idx = self.view.tasks.len() - 1;
        }
        if self.view.selected.is_none() && self.focus == Focus::Tasks {
            self.focus = Focus::Grid;
        }
    }

    fn current_task(&self) -> Option<&TaskRecord> {
        self.view.tasks.get(self.task_idx)
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(layout[1]);
        self.draw_calendar(f, body[0]);
        self.draw_tasks(f, body[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Adding(field) => self.draw_add_dialog(f, field),
            Mode::ConfirmDelete { text, .. } => self.draw_confirm(f, text),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let saved = match self.last_save {
            Some(at) => format!("saved {}", format_elapsed(at)),
            None => "no changes yet".to_string(),
        };
        let title = Line::from(vec![
            Span::styled(
                "dayplan ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("{} {}", month_name(self.view.month), self.view.year),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                self.location.scope.label(),
                Style::default().fg(Color::Green),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(saved, Style::default().fg(Color::Gray)),
        ]);

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Grid && matches!(self.mode, Mode::Normal);
        let year = self.view.year;
        let month = self.view.month;
        let days = days_in_month(year, month);
        let start_offset = first_weekday_offset(year, month, self.config.week_start);
        let (today_year, today_month, today_day) = calendar::today();
        let selected_day = self.view.selected.map(|key| key.day);

        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            format!("{} {}", month_name(month), year),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
        let mut header_spans = Vec::new();
        for heading in weekday_headings(self.config.week_start) {
            header_spans.push(Span::styled(
                format!("{:^6}", heading),
                Style::default().fg(Color::Gray),
            ));
            header_spans.push(Span::raw(" "));
        }
        lines.push(Line::from(header_spans));

        let mut day: i64 = 1 - start_offset as i64;
        while day <= days as i64 {
            let mut spans = Vec::new();
            for _ in 0..7 {
                if day < 1 || day > days as i64 {
                    spans.push(Span::raw("      "));
                } else {
                    let d = day as u32;
                    let count = self.view.count(d);
                    let text = if count > 0 && self.config.show_counts {
                        format!("{:>2}({:>2})", d, count.min(99))
                    } else if count > 0 {
                        format!("{:>2}*   ", d)
                    } else {
                        format!("{:>2}    ", d)
                    };
                    let mut style = if count > 0 {
                        Style::default()
                            .fg(Color::LightYellow)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::Gray)
                    };
                    if (year, month, d) == (today_year, today_month, today_day) {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    if Some(d) == selected_day {
                        style = style.bg(Color::Green).fg(Color::Black);
                    }
                    if d == self.cursor_day && focused {
                        style = style
                            .bg(Color::Cyan)
                            .fg(Color::Black)
                            .add_modifier(Modifier::BOLD);
                    }
                    spans.push(Span::styled(text, style));
                }
                spans.push(Span::raw(" "));
                day += 1;
            }
            lines.push(Line::from(spans));
        }

        let block = Block::default()
            .title(Span::styled(
                "Calendar",
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Tasks && matches!(self.mode, Mode::Normal);
        let title = match self.view.selected {
            Some(key) => format!(
                "To-Do List - {} {}, {} ({})",
                month_name(key.month),
                key.day,
                key.year,
                self.view.tasks.len()
            ),
            None => "To-Do List".to_string(),
        };
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                Color::Cyan
            } else {
                Color::DarkGray
            }));

        if self.view.selected.is_none() {
            let hint = Paragraph::new("Select a day with Enter to see its tasks")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            f.render_widget(hint, area);
            return;
        }

        let tasks = &self.view.tasks;
        let mut state = ListState::default();
        let viewport = area.height.saturating_sub(2) as usize;
        let selected = self.task_idx.min(tasks.len().saturating_sub(1));
        self.task_offset = adjust_offset(selected, self.task_offset, viewport, 1, tasks.len());
        *state.offset_mut() = self.task_offset;
        if focused && !tasks.is_empty() {
            state.select(Some(selected));
        }

        let width = area.width.saturating_sub(10) as usize;
        let items = if tasks.is_empty() {
            vec![ListItem::new("No tasks yet")]
        } else {
            tasks.iter().map(|task| task_item(task, width)).collect()
        };
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::LightCyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status_style = if self.status.starts_with("Error") {
            Style::default().fg(Color::LightRed)
        } else {
            Style::default()
        };
        let status = Paragraph::new(self.status.clone())
            .style(status_style)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.detail_line())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title("Selected"),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("[ ]", Style::default().fg(Color::LightCyan)),
            Span::raw(" month  "),
            Span::styled("{ }", Style::default().fg(Color::LightCyan)),
            Span::raw(" year  "),
            Span::styled("t", Style::default().fg(Color::LightCyan)),
            Span::raw(" today  "),
        ];
        match self.focus {
            Focus::Grid => spans.extend([
                Span::styled("←↑↓→ / h j k l", Style::default().fg(Color::LightCyan)),
                Span::raw(" move  "),
                Span::styled("Enter", Style::default().fg(Color::LightYellow)),
                Span::raw(" open day  "),
            ]),
            Focus::Tasks => spans.extend([
                Span::styled("↑↓", Style::default().fg(Color::LightCyan)),
                Span::raw(" browse  "),
                Span::styled("Space", Style::default().fg(Color::LightGreen)),
                Span::raw(" done  "),
                Span::styled("p", Style::default().fg(Color::LightRed)),
                Span::raw(" priority  "),
                Span::styled("d", Style::default().fg(Color::LightRed)),
                Span::raw(" delete  "),
                Span::styled("Esc", Style::default().fg(Color::LightYellow)),
                Span::raw(" close  "),
            ]),
        }
        spans.extend([
            Span::styled("n", Style::default().fg(Color::LightMagenta)),
            Span::raw(" new  "),
            Span::styled("r", Style::default().fg(Color::LightCyan)),
            Span::raw(" reload  "),
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn detail_line(&self) -> Line<'static> {
        if self.focus != Focus::Tasks {
            let count = self.view.count(self.cursor_day);
            return Line::from(format!(
                "{} {} • {} tasks",
                month_name(self.view.month),
                self.cursor_day,
                count
            ));
        }
        match self.current_task() {
            Some(task) => {
                let mut spans = vec![Span::styled(
                    format!("#{}", task.id),
                    Style::default().fg(Color::DarkGray),
                )];
                spans.push(Span::raw(" • "));
                spans.push(if task.is_done {
                    Span::styled("done", Style::default().fg(Color::LightGreen))
                } else {
                    Span::styled("open", Style::default().fg(Color::LightYellow))
                });
                if task.is_priority {
                    spans.push(Span::raw(" • "));
                    spans.push(Span::styled("priority", Style::default().fg(Color::LightRed)));
                }
                Line::from(spans)
            }
            None => Line::from("No task selected"),
        }
    }

    fn draw_add_dialog(&self, f: &mut ratatui::Frame<'_>, field: &FieldValue) {
        let area = centered_rect(60, 25, f.size());
        let day = match self.view.selected {
            Some(key) => format!("{} {}, {}", month_name(key.month), key.day, key.year),
            None => String::new(),
        };
        let body = vec![
            Line::from(Span::styled(
                format!("Add task for {}", day),
                Style::default()
                    .fg(Color::Gray)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                field.with_caret(),
                Style::default().fg(Color::White),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Enter to add • Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(body)
            .block(
                Block::default()
                    .title(Span::styled(
                        "New Task",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, text: &str) {
        let area = centered_rect(50, 30, f.size());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", truncate_text(text, 40)),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn task_item(task: &TaskRecord, width: usize) -> ListItem<'static> {
    let check = if task.is_done { "[x] " } else { "[ ] " };
    let mut text_style = Style::default().fg(if task.is_priority {
        Color::LightRed
    } else {
        Color::White
    });
    if task.is_done {
        text_style = text_style
            .add_modifier(Modifier::CROSSED_OUT)
            .fg(Color::DarkGray);
    }
    let mut spans = vec![Span::styled(check, Style::default().fg(Color::Gray))];
    if task.is_priority {
        spans.push(Span::styled(
            "! ",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::styled(truncate_text(&task.text, width.max(10)), text_style));
    ListItem::new(Line::from(spans))
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::model::DateKey;
    use crate::storage::StoreScope;
    use crate::store::TaskStore;
    use ratatui::backend::TestBackend;
    use std::path::PathBuf;

    fn app(year: i32, month: u32) -> App<MemoryBackend> {
        let session = Session::new(TaskStore::new(MemoryBackend::new()), year, month);
        let location = StoreLocation {
            path: PathBuf::from("/tmp/dayplan-test/tasks.yml"),
            scope: StoreScope::Explicit,
        };
        App::new(session, location, Config::default()).unwrap()
    }

    fn press(app: &mut App<MemoryBackend>, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App<MemoryBackend>, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn add(app: &mut App<MemoryBackend>, text: &str) {
        press(app, KeyCode::Char('n'));
        type_text(app, text);
        press(app, KeyCode::Enter);
    }

    fn screen(app: &mut App<MemoryBackend>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content.iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn cursor_stays_inside_month() {
        let mut app = app(2025, 2);
        app.cursor_day = 1;
        press(&mut app, KeyCode::Left);
        assert_eq!(app.cursor_day, 1);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.cursor_day, 8);
        for _ in 0..10 {
            press(&mut app, KeyCode::Down);
        }
        assert_eq!(app.cursor_day, 28);
    }

    #[test]
    fn adding_selects_cursor_day_and_marks_grid() {
        let mut app = app(2025, 3);
        app.cursor_day = 14;
        add(&mut app, "buy milk");

        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.view.selected, Some(DateKey::new(2025, 3, 14)));
        assert_eq!(app.view.tasks.len(), 1);
        assert_eq!(app.view.tasks[0].text, "buy milk");
        assert!(app.view.is_marked(14));
        assert_eq!(app.focus, Focus::Tasks);
        assert!(app.last_save.is_some());
    }

    #[test]
    fn blank_input_adds_nothing() {
        let mut app = app(2025, 3);
        add(&mut app, "   ");
        assert!(app.view.tasks.is_empty());
        assert_eq!(app.status, "Nothing to add");
        assert_eq!(app.session.store().backend().set_count(), 0);
    }

    #[test]
    fn toggles_follow_the_task_through_resorting() {
        let mut app = app(2025, 3);
        app.cursor_day = 2;
        add(&mut app, "first");
        add(&mut app, "second");
        app.task_idx = 0;
        assert_eq!(app.current_task().unwrap().text, "first");

        press(&mut app, KeyCode::Char(' '));
        // done tasks sink below open ones
        assert_eq!(app.view.tasks[1].text, "first");
        assert!(app.view.tasks[1].is_done);
        assert_eq!(app.current_task().unwrap().text, "first");

        app.task_idx = 0;
        press(&mut app, KeyCode::Char('p'));
        assert!(app.current_task().unwrap().is_priority);
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut app = app(2025, 3);
        add(&mut app, "keep");
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.view.tasks.len(), 1);

        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::ConfirmDelete { .. }));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.view.tasks.is_empty());
        assert!(!app.view.is_marked(app.cursor_day));
    }

    #[test]
    fn month_keys_navigate_and_clamp_cursor() {
        let mut app = app(2025, 1);
        app.cursor_day = 31;
        press(&mut app, KeyCode::Char(']'));
        assert_eq!((app.view.year, app.view.month), (2025, 2));
        assert_eq!(app.cursor_day, 28);
        press(&mut app, KeyCode::Char('{'));
        assert_eq!((app.view.year, app.view.month), (2024, 2));
        press(&mut app, KeyCode::Char('['));
        assert_eq!((app.view.year, app.view.month), (2024, 1));
        assert_eq!(app.focus, Focus::Grid);
    }

    #[test]
    fn escape_closes_the_day() {
        let mut app = app(2025, 1);
        press(&mut app, KeyCode::Enter);
        assert!(app.view.selected.is_some());
        press(&mut app, KeyCode::Esc);
        assert!(app.view.selected.is_none());
        assert_eq!(app.focus, Focus::Grid);
    }

    #[test]
    fn quit_key() {
        let mut app = app(2025, 1);
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn renders_grid_and_panel() {
        let mut app = app(2025, 1);
        app.cursor_day = 5;
        add(&mut app, "water plants");
        let text = screen(&mut app);
        assert!(text.contains("January 2025"));
        assert!(text.contains("To-Do List - January 5, 2025"));
        assert!(text.contains("water plants"));
        assert!(text.contains(" 5( 1)"));
    }

    #[test]
    fn field_editing() {
        let mut field = FieldValue::new("héllo");
        field.move_left();
        field.backspace();
        assert_eq!(field.value, "hélo");
        field.cursor = 0;
        field.delete();
        assert_eq!(field.value, "élo");
        field.insert_char('x');
        assert_eq!(field.with_caret(), "x▌élo");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a long task text", 8), "a lon...");
    }
}
