use crate::records::types::TypeOption;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};

/// Draw the account type selector.
///
/// A failed category listing replaces the selector with the error.
pub fn draw_type_tabs(
  frame: &mut Frame,
  area: Rect,
  options: &[TypeOption],
  selected: usize,
  error: Option<&str>,
) {
  let block = Block::default()
    .title(" Type ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if let Some(error) = error {
    let paragraph = Paragraph::new(format!("Could not load account types: {}", error))
      .block(block)
      .style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, area);
    return;
  }

  if options.is_empty() {
    let paragraph = Paragraph::new("Loading account types...")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let titles: Vec<Line> = options.iter().map(|o| Line::from(o.label.as_str())).collect();
  let tabs = Tabs::new(titles)
    .block(block)
    .select(selected.min(options.len() - 1))
    .style(Style::default().fg(Color::Gray))
    .highlight_style(
      Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )
    .divider(Span::styled("│", Style::default().fg(Color::DarkGray)));

  frame.render_widget(tabs, area);
}
