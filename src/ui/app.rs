use std::mem;

use anyhow::{Context, Result};
use crossterm::event::KeyCode;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use crate::session::{ExportError, Relocation, Session};
use crate::store::{LoadIssue, DEFAULT_FILE_NAME};

use super::forms::{PathForm, PendingPath, ReadingField, ReadingForm};
use super::helpers::{centered_rect, key_hints, surface_error};

/// Title plus the data-file path.
const HEADER_HEIGHT: u16 = 3;
/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
const PATH_LABEL: &str = "Path: ";
const PATH_HELP: &str =
    "Enter a full file path or a folder, e.g. /mnt/nas/zaehler.json or ~/Documents/zaehler.json";

/// What the keyboard is currently driving. Dialogs carry their own state so
/// cancelling one simply drops it.
enum Mode {
    Normal,
    AddingReading(ReadingForm),
    ConfirmClearAll,
    EditingPath(PathForm),
    ConfirmCreateMissing(PendingPath),
    CreatingFile(PathForm),
    ConfirmOverwrite(PendingPath),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    session: Session,
    /// Index into the readings as displayed, newest first.
    selected: usize,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let mut app = Self {
            session,
            selected: 0,
            mode: Mode::Normal,
            status: None,
        };
        app.report_load_issue();
        app
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Feed one key press through the active mode. Returns `true` once the user
    /// asked to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => self.handle_normal_key(code, &mut exit)?,
            Mode::AddingReading(form) => self.handle_add_reading(code, form)?,
            Mode::ConfirmClearAll => self.handle_confirm_clear(code)?,
            Mode::EditingPath(form) => self.handle_edit_path(code, form)?,
            Mode::ConfirmCreateMissing(pending) => self.handle_confirm_create(code, pending)?,
            Mode::CreatingFile(form) => self.handle_create_file(code, form)?,
            Mode::ConfirmOverwrite(pending) => self.handle_confirm_overwrite(code, pending)?,
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                *exit = true;
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Char('+') | KeyCode::Char('a') | KeyCode::Char('A') => {
                self.clear_status();
                return Ok(Mode::AddingReading(ReadingForm::today()));
            }
            KeyCode::Char('x') | KeyCode::Char('X') => self.export_csv(),
            KeyCode::Char('D') => {
                if self.session.readings().is_empty() {
                    self.set_status("There are no readings to delete.", StatusKind::Error);
                } else {
                    self.clear_status();
                    return Ok(Mode::ConfirmClearAll);
                }
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.clear_status();
                let current = self.session.location().display().to_string();
                return Ok(Mode::EditingPath(PathForm::with_value(current)));
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                self.clear_status();
                let suggestion = self
                    .session
                    .location()
                    .with_file_name(DEFAULT_FILE_NAME)
                    .display()
                    .to_string();
                return Ok(Mode::CreatingFile(PathForm::with_value(suggestion)));
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_add_reading(&mut self, code: KeyCode, mut form: ReadingForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => return Ok(Mode::Normal),
            KeyCode::Tab | KeyCode::Down => form.focus_next(),
            KeyCode::BackTab | KeyCode::Up => form.focus_previous(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_reading(&form) {
                Ok(()) => form.reset(),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::AddingReading(form))
    }

    fn handle_confirm_clear(&mut self, code: KeyCode) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.session.clear_all().context("Deleting readings failed") {
                    Ok(()) => {
                        self.selected = 0;
                        self.set_status("All readings deleted.", StatusKind::Info);
                    }
                    Err(err) => self.set_status(surface_error(&err), StatusKind::Error),
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmClearAll),
        }
    }

    fn handle_edit_path(&mut self, code: KeyCode, mut form: PathForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Change cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                let hint = match form.parse_input() {
                    Ok(hint) => hint,
                    Err(err) => {
                        form.error = Some(surface_error(&err));
                        return Ok(Mode::EditingPath(form));
                    }
                };
                match self.session.relocate(&hint, false) {
                    Ok(Relocation::Missing(target)) => {
                        return Ok(Mode::ConfirmCreateMissing(PendingPath { hint, target }));
                    }
                    Ok(outcome) => {
                        self.report_relocation(outcome);
                        return Ok(Mode::Normal);
                    }
                    Err(err) => {
                        let message = surface_error(&anyhow::Error::from(err));
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::EditingPath(form))
    }

    fn handle_confirm_create(&mut self, code: KeyCode, pending: PendingPath) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Change cancelled.", StatusKind::Error);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.session.relocate(&pending.hint, true) {
                    Ok(outcome) => self.report_relocation(outcome),
                    Err(err) => {
                        self.set_status(surface_error(&anyhow::Error::from(err)), StatusKind::Error)
                    }
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmCreateMissing(pending)),
        }
    }

    fn handle_create_file(&mut self, code: KeyCode, mut form: PathForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Creation cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => {
                let hint = match form.parse_input() {
                    Ok(hint) => hint,
                    Err(err) => {
                        form.error = Some(surface_error(&err));
                        return Ok(Mode::CreatingFile(form));
                    }
                };
                match self.session.create_new_file(&hint, false) {
                    Ok(Relocation::Exists(target)) => {
                        return Ok(Mode::ConfirmOverwrite(PendingPath { hint, target }));
                    }
                    Ok(outcome) => {
                        self.report_relocation(outcome);
                        return Ok(Mode::Normal);
                    }
                    Err(err) => {
                        let message = surface_error(&anyhow::Error::from(err));
                        form.error = Some(message.clone());
                        self.set_status(message, StatusKind::Error);
                    }
                }
            }
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::CreatingFile(form))
    }

    fn handle_confirm_overwrite(&mut self, code: KeyCode, pending: PendingPath) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Creation cancelled.", StatusKind::Error);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.session.create_new_file(&pending.hint, true) {
                    Ok(outcome) => self.report_relocation(outcome),
                    Err(err) => {
                        self.set_status(surface_error(&anyhow::Error::from(err)), StatusKind::Error)
                    }
                }
                Ok(Mode::Normal)
            }
            _ => Ok(Mode::ConfirmOverwrite(pending)),
        }
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);
        self.draw_readings(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);

        let area = frame.area();
        match &self.mode {
            Mode::AddingReading(form) => self.draw_reading_form(frame, area, form),
            Mode::ConfirmClearAll => self.draw_confirm(
                frame,
                area,
                "Delete all data?",
                vec![
                    Line::from(format!(
                        "Delete all {} readings?",
                        self.session.readings().len()
                    )),
                    Line::from("This cannot be undone."),
                ],
            ),
            Mode::EditingPath(form) => self.draw_path_form(frame, area, "Settings", form),
            Mode::ConfirmCreateMissing(pending) => self.draw_confirm(
                frame,
                area,
                "File does not exist",
                vec![
                    Line::from(format!("{} does not exist.", pending.target.display())),
                    Line::from("Create it?"),
                ],
            ),
            Mode::CreatingFile(form) => self.draw_path_form(frame, area, "New data file", form),
            Mode::ConfirmOverwrite(pending) => self.draw_confirm(
                frame,
                area,
                "File already exists",
                vec![
                    Line::from(format!("{} already exists.", pending.target.display())),
                    Line::from("Overwrite it with an empty list?"),
                ],
            ),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::BOTTOM);
        let lines = vec![
            Line::from(Span::styled(
                "Meter Readings",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!("Path: {}", self.session.location().display()),
                Style::default().fg(Color::Gray),
            )),
        ];
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_readings(&self, frame: &mut Frame, area: Rect) {
        let readings = self.session.readings();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Saved readings ({})", readings.len()));

        if readings.is_empty() {
            let message = Paragraph::new("No readings yet. Press '+' to add one.")
                .block(block)
                .alignment(Alignment::Center);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = readings
            .iter()
            .rev()
            .map(|reading| ListItem::new(reading.to_string()))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        let mut state = ListState::default().with_selected(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let paragraph = Paragraph::new(vec![status_line, self.footer_instructions()])
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn footer_instructions(&self) -> Line<'static> {
        match &self.mode {
            Mode::Normal => key_hints(&[
                ("+", "New reading"),
                ("x", "Export CSV"),
                ("D", "Delete all"),
                ("s", "Settings"),
                ("n", "New file"),
                ("q", "Quit"),
            ]),
            Mode::AddingReading(_) => key_hints(&[
                ("Tab", "Next field"),
                ("Enter", "Save"),
                ("Esc", "Close"),
            ]),
            Mode::EditingPath(_) | Mode::CreatingFile(_) => {
                key_hints(&[("Enter", "Apply"), ("Esc", "Cancel")])
            }
            Mode::ConfirmClearAll | Mode::ConfirmCreateMissing(_) | Mode::ConfirmOverwrite(_) => {
                key_hints(&[("y", "Confirm"), ("n", "Cancel")])
            }
        }
    }

    fn draw_reading_form(&self, frame: &mut Frame, area: Rect, form: &ReadingForm) {
        let popup_area = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title("New reading").borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines: Vec<Line> = ReadingField::ALL
            .iter()
            .map(|field| form.build_line(*field))
            .collect();
        lines.push(Line::from(""));

        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Tab to switch • Esc to close",
                Style::default().fg(Color::Gray),
            )));
        }

        frame.render_widget(Paragraph::new(lines), inner);

        let (column, row) = form.cursor_offset();
        let cursor_x = inner.x.saturating_add(column);
        let cursor_y = inner.y.saturating_add(row);
        frame.set_cursor_position((
            cursor_x.min(inner.right().saturating_sub(1)),
            cursor_y.min(inner.bottom().saturating_sub(1)),
        ));
    }

    fn draw_path_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &PathForm) {
        let popup_area = centered_rect(80, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            Line::from(vec![
                Span::raw(PATH_LABEL),
                Span::styled(form.value.clone(), Style::default().fg(Color::Yellow)),
            ]),
            Line::from(""),
            Line::from(Span::styled(PATH_HELP, Style::default().fg(Color::Gray))),
        ];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);

        let cursor_x = inner.x.saturating_add(form.cursor_column(PATH_LABEL.len()));
        frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line>) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    fn save_reading(&mut self, form: &ReadingForm) -> Result<()> {
        let reading = form.parse_inputs()?;
        let date = reading.date.clone();
        self.session
            .append(reading)
            .context("Saving the reading failed")?;
        self.selected = 0;
        self.set_status(format!("Saved reading for {date}."), StatusKind::Info);
        Ok(())
    }

    fn export_csv(&mut self) {
        match self.session.export(None) {
            Ok(path) => {
                self.set_status(format!("Exported to {}", path.display()), StatusKind::Info)
            }
            Err(ExportError::NothingToExport) => {
                self.set_status("No data to export.", StatusKind::Error)
            }
            Err(err) => {
                self.set_status(surface_error(&anyhow::Error::from(err)), StatusKind::Error)
            }
        }
    }

    fn report_relocation(&mut self, outcome: Relocation) {
        self.selected = 0;
        match outcome {
            Relocation::Switched(path) => {
                self.set_status(format!("Using data file {}", path.display()), StatusKind::Info);
                self.report_load_issue();
            }
            Relocation::Missing(path) | Relocation::Exists(path) => {
                self.set_status(format!("Unchanged: {}", path.display()), StatusKind::Error)
            }
        }
    }

    /// Tell the user why a freshly opened file came up empty, unless it is
    /// simply new.
    fn report_load_issue(&mut self) {
        let message = match self.session.load_issue() {
            Some(LoadIssue::Corrupted { .. }) => Some(match self.session.corrupt_backup() {
                Some(backup) => format!(
                    "Data file was damaged; starting empty. A copy was kept at {}",
                    backup.display()
                ),
                None => "Data file was damaged; starting empty.".to_string(),
            }),
            Some(LoadIssue::Unreadable { .. }) => {
                Some("Data file could not be read; starting empty.".to_string())
            }
            Some(LoadIssue::Missing(_)) | None => None,
        };
        if let Some(message) = message {
            self.set_status(message, StatusKind::Error);
        }
    }

    fn move_selection(&mut self, offset: isize) {
        let count = self.session.readings().len();
        if count == 0 {
            self.selected = 0;
            return;
        }
        let next = self.selected as isize + offset;
        self.selected = next.clamp(0, count as isize - 1) as usize;
    }
}
