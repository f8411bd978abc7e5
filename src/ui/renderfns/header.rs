use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with title, selected filter, cached view count and
/// activity
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  filter: &str,
  cached_views: usize,
  busy: bool,
) {
  let mut spans = vec![
    Span::styled(
      format!(" {} ", display_location(title)),
      Style::default().fg(Color::Cyan).bold(),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", filter), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} cached ", cached_views),
      Style::default().fg(Color::DarkGray),
    ),
  ];

  if busy {
    spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      " working… ",
      Style::default().fg(Color::Yellow).bold(),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Strip the scheme and path from a backend URL; other locations pass through
fn display_location(location: &str) -> &str {
  match location
    .strip_prefix("https://")
    .or_else(|| location.strip_prefix("http://"))
  {
    Some(rest) => rest.split('/').next().unwrap_or(rest),
    None => location,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display_location() {
    assert_eq!(
      display_location("https://crm.example.com/api/v1/"),
      "crm.example.com"
    );
    assert_eq!(display_location("http://localhost:8080"), "localhost:8080");
    assert_eq!(
      display_location("sqlite:/home/me/.local/share/acctview/accounts.db"),
      "sqlite:/home/me/.local/share/acctview/accounts.db"
    );
  }
}
