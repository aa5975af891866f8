use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use petclinic::{Form, RowKey, RowView, Table};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table as TableWidget, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Owners,
    Vets,
    PetTypes,
    Specialties,
}

impl Page {
    const ALL: [Page; 4] = [Page::Owners, Page::Vets, Page::PetTypes, Page::Specialties];

    pub fn next(&self) -> Self {
        match self {
            Page::Owners => Page::Vets,
            Page::Vets => Page::PetTypes,
            Page::PetTypes => Page::Specialties,
            Page::Specialties => Page::Owners,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Owners => Page::Specialties,
            Page::Vets => Page::Owners,
            Page::PetTypes => Page::Vets,
            Page::Specialties => Page::PetTypes,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Owners => "Owners",
            Page::Vets => "Vets",
            Page::PetTypes => "Pet types",
            Page::Specialties => "Specialties",
        }
    }

    /// Master table first, then each level of detail
    pub fn tables(&self) -> &'static [Table] {
        match self {
            Page::Owners => &[Table::Owner, Table::Pet, Table::Visit],
            Page::Vets => &[Table::Vet, Table::VetSpecialty],
            Page::PetTypes => &[Table::PetType],
            Page::Specialties => &[Table::Specialty],
        }
    }
}

/// One table on a page with its loaded rows
pub struct TableView {
    pub table: Table,
    pub rows: Vec<RowView>,
    pub state: TableState,
    pub search: Option<String>,
}

impl TableView {
    fn new(table: Table) -> Self {
        Self {
            table,
            rows: Vec::new(),
            state: TableState::default(),
            search: None,
        }
    }

    pub fn selected(&self) -> Option<&RowView> {
        self.state.selected().and_then(|i| self.rows.get(i))
    }

    fn selected_id(&self) -> Option<i64> {
        match self.selected()?.key {
            RowKey::Id(id) => Some(id),
            RowKey::Pair(_) => None,
        }
    }

    fn next(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn previous(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Keep the selection on `key` if it is still there, else clamp it
    fn reselect(&mut self, key: Option<RowKey>) {
        let by_key = key.and_then(|k| self.rows.iter().position(|r| r.key == k));
        let index = by_key.or_else(|| match self.rows.len() {
            0 => None,
            len => Some(self.state.selected().unwrap_or(0).min(len - 1)),
        });
        self.state.select(index);
    }
}

pub enum Mode {
    Browse,
    Search(String),
    Form(Form),
}

pub struct Status {
    pub text: String,
    pub error: bool,
}

pub struct App {
    conn: Connection,
    pub current_page: Page,
    pub views: Vec<TableView>,
    pub focus: usize,
    pub mode: Mode,
    pub status: Option<Status>,
}

impl App {
    pub fn new(conn: Connection) -> Result<Self> {
        let mut app = Self {
            conn,
            current_page: Page::Owners,
            views: Vec::new(),
            focus: 0,
            mode: Mode::Browse,
            status: None,
        };
        app.open_page(Page::Owners)?;
        Ok(app)
    }

    fn open_page(&mut self, page: Page) -> Result<()> {
        self.current_page = page;
        self.views = page.tables().iter().copied().map(TableView::new).collect();
        self.focus = 0;
        self.reload_from(0)
    }

    pub fn next_page(&mut self) -> Result<()> {
        self.open_page(self.current_page.next())
    }

    pub fn previous_page(&mut self) -> Result<()> {
        self.open_page(self.current_page.previous())
    }

    /// Reload the table at `index` and every detail table below it
    fn reload_from(&mut self, index: usize) -> Result<()> {
        for i in index..self.views.len() {
            let master = match i {
                0 => None,
                _ => match self.views[i - 1].selected_id() {
                    Some(id) => Some(id),
                    None => {
                        // nothing selected above, so nothing to show
                        self.views[i].rows.clear();
                        self.views[i].state.select(None);
                        continue;
                    }
                },
            };

            let view = &mut self.views[i];
            let previous = view.selected().map(|r| r.key);
            view.rows = view.table.rows(&self.conn, master, view.search.as_deref())?;
            view.reselect(previous);
        }
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.reload_from(0)
    }

    fn focused(&self) -> &TableView {
        &self.views[self.focus]
    }

    /// The selected id in the table above the focused one
    fn master_id(&self) -> Option<i64> {
        self.focus
            .checked_sub(1)
            .and_then(|i| self.views[i].selected_id())
    }

    pub fn next(&mut self) -> Result<()> {
        self.views[self.focus].next();
        self.reload_from(self.focus + 1)
    }

    pub fn previous(&mut self) -> Result<()> {
        self.views[self.focus].previous();
        self.reload_from(self.focus + 1)
    }

    pub fn focus_next_table(&mut self) {
        if self.focus + 1 < self.views.len() {
            self.focus += 1;
        }
    }

    pub fn focus_previous_table(&mut self) {
        self.focus = self.focus.saturating_sub(1);
    }

    fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(Status { text: text.into(), error: true });
    }

    fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(Status { text: text.into(), error: false });
    }

    // ------------------------------------------------------------------------
    // Edit actions
    // ------------------------------------------------------------------------

    pub fn new_row(&mut self) -> Result<()> {
        let table = self.focused().table;
        let master = self.master_id();
        if self.focus > 0 && master.is_none() {
            let above = self.views[self.focus - 1].table.caption();
            self.set_error(format!("Select a row in {} first", above));
            return Ok(());
        }

        self.mode = Mode::Form(Form::for_insert(&self.conn, table, master)?);
        Ok(())
    }

    pub fn edit_row(&mut self) -> Result<()> {
        let Some(key) = self.focused().selected().map(|r| r.key) else {
            return Ok(());
        };

        let table = self.focused().table;
        match Form::for_update(&self.conn, table, key) {
            Ok(form) => self.mode = Mode::Form(form),
            Err(err) => self.set_error(err.to_string()),
        }
        Ok(())
    }

    pub fn delete_row(&mut self) -> Result<()> {
        let Some(key) = self.focused().selected().map(|r| r.key) else {
            return Ok(());
        };

        let table = self.focused().table;
        match table.delete(&self.conn, key) {
            Ok(()) => {
                self.set_info(format!("Deleted {} {}", table.caption().to_lowercase(), key));
                self.reload_from(self.focus)?;
            }
            Err(err) => self.set_error(err.to_string()),
        }
        Ok(())
    }

    /// Save the open form; on failure the form stays open with the error shown
    pub fn save_form(&mut self) -> Result<()> {
        let Mode::Form(form) = &mut self.mode else {
            return Ok(());
        };

        match form.save(&self.conn) {
            Ok(key) => {
                let caption = form.table.caption();
                self.mode = Mode::Browse;
                self.set_info(format!("Saved {} {}", caption.to_lowercase(), key));
                self.reload_from(self.focus)?;
                self.views[self.focus].reselect(Some(key));
                self.reload_from(self.focus + 1)?;
            }
            Err(err) => {
                if let Some(validation) = err.as_validation() {
                    form.focus_column(&validation.field);
                }
                self.set_error(err.to_string());
            }
        }
        Ok(())
    }

    pub fn apply_search(&mut self, term: String) -> Result<()> {
        let term = term.trim().to_string();
        self.views[self.focus].search = if term.is_empty() { None } else { Some(term) };
        self.views[self.focus].state.select(Some(0));
        self.reload_from(self.focus)
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    /// Handle one key press; returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match &mut self.mode {
            Mode::Browse => return self.handle_browse_key(key),
            Mode::Search(buffer) => match key.code {
                KeyCode::Enter => {
                    let term = std::mem::take(buffer);
                    self.mode = Mode::Browse;
                    self.apply_search(term)?;
                }
                KeyCode::Esc => self.mode = Mode::Browse,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            },
            Mode::Form(form) => match key.code {
                KeyCode::Esc => {
                    self.mode = Mode::Browse;
                    self.status = None;
                }
                KeyCode::Enter => self.save_form()?,
                KeyCode::Tab | KeyCode::Down => form.next_field(),
                KeyCode::BackTab | KeyCode::Up => form.previous_field(),
                KeyCode::Left => form.cycle(false),
                KeyCode::Right => form.cycle(true),
                KeyCode::Backspace => form.backspace(),
                KeyCode::Char(c) => form.input(c),
                _ => {}
            },
        }
        Ok(false)
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Result<bool> {
        self.status = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.previous_page()?;
                } else {
                    self.next_page()?;
                }
            }
            KeyCode::BackTab => self.previous_page()?,
            KeyCode::Down | KeyCode::Char('j') => self.next()?,
            KeyCode::Up | KeyCode::Char('k') => self.previous()?,
            KeyCode::Right | KeyCode::Char('l') => self.focus_next_table(),
            KeyCode::Left | KeyCode::Char('h') => self.focus_previous_table(),
            KeyCode::Char('n') => self.new_row()?,
            KeyCode::Char('e') | KeyCode::Enter => self.edit_row()?,
            KeyCode::Char('d') => self.delete_row()?,
            KeyCode::Char('/') => {
                let current = self.focused().search.clone().unwrap_or_default();
                self.mode = Mode::Search(current);
            }
            KeyCode::Char('r') => {
                self.refresh()?;
                self.set_info("Refreshed");
            }
            _ => {}
        }
        Ok(false)
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if app.handle_key(key)? {
                return Ok(());
            }
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    // Form panel on the right while editing
    let tables_area = if let Mode::Form(form) = &app.mode {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_form(f, content_chunks[1], form);
        content_chunks[0]
    } else {
        chunks[1]
    };

    let count = app.views.len() as u32;
    let table_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, count.max(1)); app.views.len()])
        .split(tables_area);

    let focus = app.focus;
    for (i, view) in app.views.iter_mut().enumerate() {
        render_table(f, table_chunks[i], view, i == focus);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Petclinic "),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, view: &mut TableView, focused: bool) {
    let headers = view.table.headers();
    let header_cells = headers.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = view.rows.iter().map(|row| {
        Row::new(row.cells.iter().map(|c| Cell::from(truncate(c, 40)))).height(1)
    });

    let widths = vec![Constraint::Ratio(1, headers.len().max(1) as u32); headers.len()];

    let mut title = format!(" {} ({}) ", view.table.caption(), view.rows.len());
    if let Some(search) = &view.search {
        title.push_str(&format!("[/{}] ", search));
    }

    let border = if focused { Color::Yellow } else { Color::White };
    let table = TableWidget::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol(if focused { "→ " } else { "  " });

    f.render_stateful_widget(table, area, &mut view.state);
}

fn render_form(f: &mut Frame, area: Rect, form: &Form) {
    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut content = vec![Line::from("")];
    for (i, field) in form.fields.iter().enumerate() {
        let marker = if i == form.focus { "→ " } else { "  " };
        let value_style = if i == form.focus {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::White)
        };
        let required = if field.nullable { "" } else { " *" };

        content.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(format!("{}{}: ", field.caption, required), label),
            Span::styled(form.display_value(i), value_style),
        ]));
        content.push(Line::from(""));
    }

    content.push(Line::from(Span::styled(
        "  Enter save | Esc cancel | ←/→ choose",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(format!(" {} ", form.title())),
    );

    f.render_widget(panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let key = Style::default().fg(Color::Yellow);

    let status_spans = match (&app.mode, &app.status) {
        (Mode::Search(buffer), _) => vec![
            Span::styled(" Search: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}_", buffer)),
        ],
        (_, Some(status)) => {
            let color = if status.error { Color::Red } else { Color::Green };
            vec![Span::styled(format!(" {}", status.text), Style::default().fg(color))]
        }
        (_, None) => {
            let view = app.focused();
            let selected = view.state.selected().map(|i| i + 1).unwrap_or(0);
            vec![
                Span::styled(
                    format!(" Row: {}/{} ", selected, view.rows.len()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(" | "),
                Span::styled("n", key),
                Span::raw(" New | "),
                Span::styled("e", key),
                Span::raw(" Edit | "),
                Span::styled("d", key),
                Span::raw(" Delete | "),
                Span::styled("/", key),
                Span::raw(" Search | "),
                Span::styled("h/l", key),
                Span::raw(" Table | "),
                Span::styled("Tab", key),
                Span::raw(" Page | "),
                Span::styled("q", Style::default().fg(Color::Red)),
                Span::raw(" Quit"),
            ]
        }
    };

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petclinic::{open_database, DatabaseLocation};

    fn app() -> App {
        App::new(open_database(&DatabaseLocation::Memory).unwrap()).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    /// Select Linda Douglas on the Vets page and focus her specialties
    fn linda_specialties(app: &mut App) {
        press(app, KeyCode::Tab);
        assert_eq!(app.current_page, Page::Vets);
        while app.views[0].selected().map(|r| r.key) != Some(RowKey::Id(3)) {
            press(app, KeyCode::Char('j'));
        }
        press(app, KeyCode::Char('l'));
    }

    #[test]
    fn test_master_selection_loads_details() {
        let mut app = app();
        assert_eq!(app.views.len(), 3);

        // first owner by last name is Jeff Black, owner of Lucky
        let owner = app.views[0].selected().unwrap();
        assert_eq!((owner.cells[1].as_str(), owner.cells[2].as_str()), ("Jeff", "Black"));
        assert_eq!(app.views[1].rows.len(), 1);
        assert_eq!(app.views[1].selected().unwrap().cells[2], "Lucky");
        assert!(app.views[2].rows.is_empty());
    }

    #[test]
    fn test_duplicate_link_keeps_form_open() {
        let mut app = app();
        linda_specialties(&mut app);
        assert_eq!(app.views[1].rows.len(), 2);

        press(&mut app, KeyCode::Char('n'));
        // vet is pre-filled, choose the first specialty option: dentistry
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);

        assert!(matches!(app.mode, Mode::Form(_)));
        let status = app.status.as_ref().unwrap();
        assert!(status.error);
        assert_eq!(status.text, "Vet/specialty combination already exists");
        assert_eq!(app.views[1].rows.len(), 2);
    }

    #[test]
    fn test_new_link_is_saved_and_selected() {
        let mut app = app();
        linda_specialties(&mut app);

        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Down);
        // dentistry, radiology: radiology is free for Linda
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Right);
        press(&mut app, KeyCode::Enter);

        assert!(matches!(app.mode, Mode::Browse));
        assert_eq!(app.views[1].rows.len(), 3);
        assert_eq!(
            app.views[1].selected().unwrap().cells,
            vec!["Douglas, Linda", "radiology"]
        );
    }

    #[test]
    fn test_search_filters_focused_table() {
        let mut app = app();
        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "davis");
        press(&mut app, KeyCode::Enter);

        let names: Vec<&str> = app.views[0].rows.iter().map(|r| r.cells[1].as_str()).collect();
        assert_eq!(names, vec!["Betty", "Harold"]);
    }

    #[test]
    fn test_delete_referenced_row_reports_error() {
        let mut app = app();
        press(&mut app, KeyCode::Char('d'));

        let status = app.status.as_ref().unwrap();
        assert!(status.error);
        assert!(status.text.contains("Pets (1)"));
        assert_eq!(app.views[0].rows.len(), 10);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        assert!(!press(&mut app, KeyCode::Char('j')));
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn test_page_cycle() {
        assert_eq!(Page::Specialties.next(), Page::Owners);
        assert_eq!(Page::Owners.previous(), Page::Specialties);
        assert_eq!(Page::Vets.tables(), &[Table::Vet, Table::VetSpecialty]);
    }
}
