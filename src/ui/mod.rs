pub mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode};
use crate::records::AccountService;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use renderfns::{draw_footer, draw_header, severity_color};

const NORMAL_HINTS: &[(&str, &str)] = &[
  ("h/l", "type"),
  ("j/k", "row"),
  ("e", "edit name"),
  ("s", "save"),
  ("Esc", "discard"),
  ("r", "reload"),
  ("q", "quit"),
];

const EDITING_HINTS: &[(&str, &str)] = &[("Enter", "stage edit"), ("Esc", "cancel")];

/// Main draw function
pub fn draw<S: AccountService>(frame: &mut Frame, app: &App<S>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Length(3), // Type selector
      Constraint::Min(1),    // Grid
      Constraint::Length(1), // Status line
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  draw_header(
    frame,
    chunks[0],
    app.title(),
    app.selected_key().to_string().as_str(),
    app.cache().len(),
    app.is_busy(),
  );

  views::draw_type_tabs(
    frame,
    chunks[1],
    app.type_options(),
    app.selected_type_index(),
    app.types_error(),
  );

  views::draw_grid(
    frame,
    chunks[2],
    app.selected_key(),
    &app.view_state(),
    app.selected_row(),
    app.drafts(),
  );

  draw_status_line(frame, chunks[3], app);

  let hints = match app.mode() {
    Mode::Normal => NORMAL_HINTS,
    Mode::Editing { .. } => EDITING_HINTS,
  };
  draw_footer(frame, chunks[4], hints);

  if let Mode::Editing { input, .. } = app.mode() {
    views::draw_edit_overlay(frame, chunks[2], input);
  }
}

fn draw_status_line<S: AccountService>(frame: &mut Frame, area: Rect, app: &App<S>) {
  let line = if let Some(toast) = app.toast() {
    Line::from(vec![
      Span::styled(
        format!(" {}: ", toast.title),
        Style::default().fg(severity_color(toast.severity)).bold(),
      ),
      Span::raw(toast.message.clone()),
    ])
  } else if app.is_saving() {
    Line::from(Span::styled(" Saving...", Style::default().fg(Color::Yellow)))
  } else if !app.drafts().is_empty() {
    Line::from(Span::styled(
      format!(" {} unsaved change(s)", app.drafts().len()),
      Style::default().fg(Color::Yellow),
    ))
  } else {
    Line::default()
  };

  frame.render_widget(Paragraph::new(line), area);
}
