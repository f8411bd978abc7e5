use crate::ui::components::TextInput;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Draw the Name editor centered over `area`
pub fn draw_edit_overlay(frame: &mut Frame, area: Rect, input: &TextInput) {
  let width = (area.width * 60 / 100).clamp(30, 70).min(area.width);
  let height = 3.min(area.height);

  let x = area.x + area.width.saturating_sub(width) / 2;
  let y = area.y + area.height.saturating_sub(height) / 2;
  let overlay_area = Rect::new(x, y, width, height);

  frame.render_widget(Clear, overlay_area);

  let block = Block::default()
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow))
    .title(" Edit Name (Enter: stage, Esc: cancel) ");

  let inner = block.inner(overlay_area);
  let (before, after) = input.split_at_cursor();
  let cursor_x = inner.x + before.chars().count() as u16;

  let paragraph = if input.is_empty() {
    Paragraph::new("Name is required")
      .style(Style::default().fg(Color::DarkGray))
      .block(block)
  } else {
    Paragraph::new(format!("{}{}", before, after)).block(block)
  };
  frame.render_widget(paragraph, overlay_area);

  if inner.width > 0 && inner.height > 0 {
    frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
  }
}
