use crate::filter::FilterKey;
use crate::query::QueryState;
use crate::records::types::{Account, Column, COLUMNS};
use crate::save::DraftEdits;
use crate::ui::renderfns::truncate;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

const CELL_WIDTH: usize = 40;

/// Draw the editable account grid for the selected filter
pub fn draw_grid(
  frame: &mut Frame,
  area: Rect,
  filter: &FilterKey,
  state: &QueryState<Vec<Account>>,
  selected: usize,
  drafts: &DraftEdits,
) {
  let rows = state.data().map(|v| v.as_slice()).unwrap_or(&[]);

  let title = if let Some(e) = state.error() {
    format!(" Accounts [{}] (error: {}) ", filter, e)
  } else if state.is_loading() {
    format!(" Accounts [{}] (loading...) ", filter)
  } else {
    format!(" Accounts [{}] ({}) ", filter, rows.len())
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if rows.is_empty() {
    let content = if state.is_error() {
      "Failed to load accounts. Press 'r' to retry."
    } else if state.is_success() {
      "No accounts found."
    } else {
      ""
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let header = Row::new(
    COLUMNS
      .iter()
      .map(|c| Cell::from(c.label).style(Style::default().fg(Color::Cyan).bold())),
  );

  let table_rows: Vec<Row> = rows
    .iter()
    .map(|account| {
      Row::new(COLUMNS.iter().map(|column| {
        let (text, edited) = cell_text(account, column, drafts);
        let style = if edited {
          Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC)
        } else {
          Style::default()
        };
        Cell::from(truncate(&text, CELL_WIDTH)).style(style)
      }))
    })
    .collect();

  let widths = [Constraint::Percentage(60), Constraint::Percentage(40)];
  let table = Table::new(table_rows, widths)
    .header(header)
    .block(block)
    .row_highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut table_state = TableState::default().with_selected(Some(selected.min(rows.len() - 1)));
  frame.render_stateful_widget(table, area, &mut table_state);
}

/// Text shown in a cell, and whether it carries an unsaved edit
fn cell_text(account: &Account, column: &Column, drafts: &DraftEdits) -> (String, bool) {
  if let Some(draft) = drafts.get(&account.id, column.field) {
    return (format!("{} *", draft), true);
  }
  (
    account.field(column.field).unwrap_or_default().to_string(),
    false,
  )
}
