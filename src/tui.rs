use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::db::{estimate_size_bytes, Database};
use crate::governor::{Governor, Usage, UsageLog, DAILY_LIMIT, MINUTE_LIMIT};
use crate::models::{Card, CardDraft, ThemeColor};
use crate::views::{
    distinct_types, filter_by, format_salary, usage_percentage, Period, STORAGE_SOFT_LIMIT_BYTES,
};

const USAGE_REFRESH: Duration = Duration::from_secs(10);

struct AppState {
    cards: Vec<Card>,
    visible: Vec<Card>,
    selected: usize,
    scroll_offset: u16,
    search: String,
    searching: bool,
    types: Vec<String>,
    type_idx: usize,
    period: Period,
    usage: Usage,
    last_refresh: Instant,
    status: Option<String>,
}

impl AppState {
    fn new(cards: Vec<Card>) -> Self {
        let mut state = Self {
            cards: Vec::new(),
            visible: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            search: String::new(),
            searching: false,
            types: Vec::new(),
            type_idx: 0,
            period: Period::Year,
            usage: Usage::default(),
            last_refresh: Instant::now(),
            status: None,
        };
        state.set_cards(cards);
        state
    }

    /// Re-read the usage counters once `USAGE_REFRESH` has passed since the
    /// last read. Returns how long until the next refresh is due.
    fn refresh_usage_if_due<L: UsageLog, C: Clock>(
        &mut self,
        governor: &Governor<L, C>,
        now: Instant,
    ) -> Duration {
        if now.saturating_duration_since(self.last_refresh) >= USAGE_REFRESH {
            self.usage = governor.current_usage().unwrap_or(self.usage);
            self.last_refresh = now;
        }
        USAGE_REFRESH.saturating_sub(now.saturating_duration_since(self.last_refresh))
    }

    fn type_filter(&self) -> &str {
        self.types.get(self.type_idx).map(String::as_str).unwrap_or(crate::views::ALL_TYPES)
    }

    /// Replace the snapshot, keeping the current selection when it survives.
    fn set_cards(&mut self, cards: Vec<Card>) {
        let keep = self.current_card().map(|c| c.id.clone());
        let filter = self.type_filter().to_string();
        self.cards = cards;
        self.types = distinct_types(&self.cards);
        self.type_idx = self.types.iter().position(|t| *t == filter).unwrap_or(0);
        self.apply_filter();
        if let Some(id) = keep {
            if let Some(idx) = self.visible.iter().position(|c| c.id == id) {
                self.selected = idx;
            }
        }
    }

    fn apply_filter(&mut self) {
        self.visible = filter_by(&self.cards, &self.search, self.type_filter());
        if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub(1);
        }
        self.scroll_offset = 0;
    }

    fn cycle_type(&mut self) {
        if !self.types.is_empty() {
            self.type_idx = (self.type_idx + 1) % self.types.len();
            self.selected = 0;
            self.apply_filter();
        }
    }

    fn current_card(&self) -> Option<&Card> {
        self.visible.get(self.selected)
    }

    fn next(&mut self) {
        if !self.visible.is_empty() && self.selected < self.visible.len() - 1 {
            self.selected += 1;
            self.scroll_offset = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.scroll_offset = 0;
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }

    /// Save an edited copy of the selected card and re-read the store.
    fn edit_current(&mut self, db: &Database, edit: impl FnOnce(&mut Card)) {
        let Some(mut card) = self.current_card().cloned() else { return };
        edit(&mut card);
        match db.put_card(CardDraft::Saved(card)).and_then(|_| db.list_cards()) {
            Ok(cards) => self.set_cards(cards),
            Err(e) => self.status = Some(e.to_string()),
        }
    }

    fn delete_current(&mut self, db: &Database) {
        let Some(card) = self.current_card().cloned() else { return };
        match db.delete_card(&card.id).and_then(|_| db.list_cards()) {
            Ok(cards) => {
                self.status = Some(format!("Deleted {}", card.data.company_name));
                self.set_cards(cards);
            }
            Err(e) => self.status = Some(e.to_string()),
        }
    }
}

pub fn run_browse(db: &Database) -> Result<()> {
    let cards = db.list_cards()?;
    if cards.is_empty() {
        println!("No cards saved yet.");
        return Ok(());
    }

    let governor = Governor::new(db, SystemClock);
    let mut state = AppState::new(cards);
    state.usage = governor.current_usage().unwrap_or_default();
    state.last_refresh = Instant::now();

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, db, &governor);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    db: &Database,
    governor: &Governor<&Database, SystemClock>,
) -> Result<()> {
    let mut list_state = ListState::default();

    loop {
        // Key input must not hold back the refresh
        let timeout = state.refresh_usage_if_due(governor, Instant::now());

        list_state.select(if state.visible.is_empty() { None } else { Some(state.selected) });
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(timeout)? {
            continue;
        }

        let Event::Key(key) = event::read()? else { continue };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.searching {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => state.searching = false,
                KeyCode::Backspace => {
                    state.search.pop();
                    state.selected = 0;
                    state.apply_filter();
                }
                KeyCode::Char(c) => {
                    state.search.push(c);
                    state.selected = 0;
                    state.apply_filter();
                }
                _ => {}
            }
            continue;
        }

        state.status = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => state.next(),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
            KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
            KeyCode::Char('/') => state.searching = true,
            KeyCode::Char('t') => state.cycle_type(),
            KeyCode::Char('p') => state.period = state.period.toggle(),
            KeyCode::Char('c') => state.edit_current(db, |c| c.theme_color = c.theme_color.next()),
            KeyCode::Char('C') => state.edit_current(db, |c| c.theme_color = c.theme_color.prev()),
            KeyCode::Char('i') => state.edit_current(db, |c| c.icon = c.icon.next()),
            KeyCode::Char('w') => state.edit_current(db, |c| {
                c.data.workplace_rating = (c.data.workplace_rating + 1).min(5)
            }),
            KeyCode::Char('W') => state.edit_current(db, |c| {
                c.data.workplace_rating = c.data.workplace_rating.saturating_sub(1).max(1)
            }),
            KeyCode::Char('s') => state.edit_current(db, |c| {
                c.data.size_rating = (c.data.size_rating + 1).min(5)
            }),
            KeyCode::Char('S') => state.edit_current(db, |c| {
                c.data.size_rating = c.data.size_rating.saturating_sub(1).max(1)
            }),
            KeyCode::Char('d') => state.delete_current(db),
            _ => {}
        }
    }
    Ok(())
}

fn theme_rgb(color: ThemeColor) -> Color {
    let (r, g, b) = match color {
        ThemeColor::Zinc => (0x52, 0x52, 0x5b),
        ThemeColor::Slate => (0x47, 0x55, 0x69),
        ThemeColor::Red => (0xb9, 0x1c, 0x1c),
        ThemeColor::Orange => (0xc2, 0x41, 0x0c),
        ThemeColor::Amber => (0xb4, 0x53, 0x09),
        ThemeColor::Yellow => (0xa1, 0x62, 0x07),
        ThemeColor::Lime => (0x4d, 0x7c, 0x0f),
        ThemeColor::Green => (0x15, 0x80, 0x3d),
        ThemeColor::Emerald => (0x04, 0x78, 0x57),
        ThemeColor::Teal => (0x0f, 0x76, 0x6e),
        ThemeColor::Cyan => (0x0e, 0x74, 0x90),
        ThemeColor::Sky => (0x03, 0x69, 0xa1),
        ThemeColor::Blue => (0x1d, 0x4e, 0xd8),
        ThemeColor::Indigo => (0x43, 0x38, 0xca),
        ThemeColor::Violet => (0x6d, 0x28, 0xd9),
        ThemeColor::Purple => (0x7e, 0x22, 0xce),
        ThemeColor::Fuchsia => (0xa2, 0x1c, 0xaf),
        ThemeColor::Pink => (0xbe, 0x18, 0x5d),
        ThemeColor::Rose => (0xbe, 0x12, 0x3c),
        ThemeColor::Black => (0x18, 0x18, 0x1b),
    };
    Color::Rgb(r, g, b)
}

pub fn rating_bar(value: u8, on: char, off: char) -> String {
    (1..=5).map(|i| if i <= value { on } else { off }).collect()
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);

    // Left panel: card list
    let items: Vec<ListItem> = state
        .visible
        .iter()
        .map(|card| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{} ", card.icon.glyph()),
                    Style::default().fg(theme_rgb(card.theme_color)),
                ),
                Span::raw(format!("{} | {}", card.data.company_name, card.data.role)),
            ]))
        })
        .collect();

    let mut title = format!(" Deck ({}/{}) [{}] ", state.visible.len(), state.cards.len(), state.type_filter());
    if !state.search.is_empty() || state.searching {
        title.push_str(&format!("/{} ", state.search));
    }

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[0], list_state);

    // Right panel: card detail
    let detail = build_detail(state);
    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Card "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);

    // Usage line
    let storage = estimate_size_bytes(&state.cards);
    let usage_style = if state.usage.daily_exhausted() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::Cyan)
    };
    let usage_line = Line::from(vec![
        Span::styled(
            format!(" API {}/{}  {}/{} per min", state.usage.daily, DAILY_LIMIT, state.usage.minute, MINUTE_LIMIT),
            usage_style,
        ),
        Span::raw(format!(
            "   Storage {:.1} KB ({:.1}%)",
            storage as f64 / 1024.0,
            usage_percentage(storage, STORAGE_SOFT_LIMIT_BYTES).min(100.0)
        )),
        Span::styled(
            state.status.as_deref().map(|s| format!("   {}", s)).unwrap_or_default(),
            Style::default().fg(Color::Yellow),
        ),
    ]);
    frame.render_widget(Paragraph::new(usage_line), rows[1]);

    let help = if state.searching {
        " type to search  enter/esc:done"
    } else {
        " j/k:move J/K:scroll /:search t:type p:period c/C:color i:icon w/W s/S:ratings d:delete q:quit"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
        rows[2],
    );
}

fn build_detail<'a>(state: &'a AppState) -> Text<'a> {
    let Some(card) = state.current_card() else {
        return Text::raw("No cards match");
    };
    let d = &card.data;

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        format!("{} {}", card.icon.glyph(), d.company_name),
        Style::default().fg(theme_rgb(card.theme_color)).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(d.role.clone()));
    lines.push(Line::from(""));

    lines.push(Line::from(format!("Location: {}", d.country)));
    lines.push(Line::from(format!("Type:     {} / {}", d.company_type, d.kind)));
    lines.push(Line::from(format!("Domain:   {}", d.industry_domain)));
    if !d.website.is_empty() {
        lines.push(Line::from(format!("Website:  {}", d.website)));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(Span::styled(
        format!("Salary (per {})", state.period),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!(
        "  Entry: {}",
        format_salary(d.entry_level_salary, &d.currency, state.period)
    )));
    lines.push(Line::from(format!(
        "  Mid:   {}",
        format_salary(d.mid_level_salary, &d.currency, state.period)
    )));
    lines.push(Line::from(""));

    lines.push(Line::from(vec![
        Span::raw("Workplace "),
        Span::styled(rating_bar(d.workplace_rating, '★', '☆'), Style::default().fg(Color::Yellow)),
        Span::raw("   Size "),
        Span::styled(rating_bar(d.size_rating, '■', '□'), Style::default().fg(Color::Cyan)),
    ]));
    lines.push(Line::from(""));

    if !d.salary_explanation.is_empty() {
        lines.push(Line::from(Span::styled(
            "Notes",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for line in textwrap::fill(&d.salary_explanation, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled(
        format!("Saved {}  ·  {}  ·  {}", format_timestamp(card.timestamp), card.theme_color, card.id),
        Style::default().fg(Color::DarkGray),
    )));

    Text::from(lines)
}

pub fn format_timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fake::FakeClock;
    use crate::models::CompanyData;

    fn seeded() -> (Database, Vec<Card>) {
        let db = Database::open_in_memory().unwrap();
        for (name, kind) in [("Acme", "Startup"), ("Globex", "Enterprise"), ("Initech", "Startup")] {
            let mut data = CompanyData::manual(name);
            data.company_type = kind.to_string();
            db.put_card(CardDraft::new(data)).unwrap();
        }
        let cards = db.list_cards().unwrap();
        (db, cards)
    }

    #[test]
    fn test_type_cycle_filters_visible() {
        let (_db, cards) = seeded();
        let mut state = AppState::new(cards);
        assert_eq!(state.types, vec!["All", "Startup", "Enterprise"]);
        assert_eq!(state.visible.len(), 3);

        state.cycle_type();
        assert_eq!(state.type_filter(), "Startup");
        assert_eq!(state.visible.len(), 2);

        state.cycle_type();
        state.cycle_type();
        assert_eq!(state.type_filter(), "All");
    }

    #[test]
    fn test_usage_refreshes_on_schedule() {
        let (db, cards) = seeded();
        let governor = Governor::new(&db, FakeClock::at(1_700_000_000_000));
        let mut state = AppState::new(cards);
        let start = state.last_refresh;

        governor.check_and_record().unwrap();

        // Not due yet: counters stay as they were
        let wait = state.refresh_usage_if_due(&governor, start + Duration::from_secs(3));
        assert_eq!(state.usage, Usage::default());
        assert_eq!(wait, Duration::from_secs(7));

        // Due, however many keys were handled in between
        let wait = state.refresh_usage_if_due(&governor, start + USAGE_REFRESH);
        assert_eq!(state.usage, Usage { daily: 1, minute: 1 });
        assert_eq!(wait, USAGE_REFRESH);
        assert_eq!(state.last_refresh, start + USAGE_REFRESH);
    }

    #[test]
    fn test_edit_keeps_selection_and_persists() {
        let (db, cards) = seeded();
        let mut state = AppState::new(cards);
        state.next();
        let id = state.current_card().unwrap().id.clone();

        state.edit_current(&db, |c| c.theme_color = c.theme_color.next());
        assert_eq!(state.current_card().unwrap().id, id);
        assert_eq!(state.current_card().unwrap().theme_color, ThemeColor::Slate);
        assert_eq!(db.get_card(&id).unwrap().unwrap().theme_color, ThemeColor::Slate);
        assert_eq!(db.list_cards().unwrap().len(), 3);
    }

    #[test]
    fn test_delete_clamps_selection() {
        let (db, cards) = seeded();
        let mut state = AppState::new(cards);
        state.next();
        state.next();
        state.delete_current(&db);
        assert_eq!(state.visible.len(), 2);
        assert_eq!(state.selected, 1);
    }

    #[test]
    fn test_rating_bar() {
        assert_eq!(rating_bar(3, '★', '☆'), "★★★☆☆");
        assert_eq!(rating_bar(5, '■', '□'), "■■■■■");
    }
}
