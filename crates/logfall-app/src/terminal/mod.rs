use std::{
    collections::VecDeque,
    io::{self, Stdout},
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use rand::{SeedableRng, rngs::SmallRng};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Sparkline},
};
use serde::Serialize;
use supports_color::{Stream, on_cached};
use tracing::info;

use logfall_core::{ControlCommand, ShapeKind, format_size};
use logfall_sim::{EntityViz, WorldSnapshot};

use crate::{
    SharedWorld,
    command::{CommandDrain, CommandSubmit, EventReceiver, drain_pending_events},
    ingest::synthetic_event,
    renderer::{Renderer, RendererContext},
};

const TARGET_FPS: f32 = 60.0;
const UI_TICK_MILLIS: u64 = 50;
const RATE_HISTORY_CAPACITY: usize = 120;
const MAX_PATH_CHARS: usize = 35;
const DEFAULT_HEADLESS_FRAMES: usize = 120;
const MAX_HEADLESS_FRAMES: usize = 3600;

pub struct TerminalRenderer {
    frame_interval: Duration,
    draw_interval: Duration,
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_secs_f32(1.0 / TARGET_FPS),
            draw_interval: Duration::from_millis(UI_TICK_MILLIS),
        }
    }
}

impl Renderer for TerminalRenderer {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn run(&self, ctx: RendererContext) -> Result<()> {
        if std::env::var_os("LOGFALL_TERMINAL_HEADLESS").is_some() {
            let summary = self.run_headless(ctx)?;
            info!(
                frames = summary.frames,
                events_ingested = summary.events_ingested,
                final_entity_count = summary.final_entity_count,
                max_size_seen = summary.max_size_seen,
                requests_per_minute = summary.requests_per_minute,
                sim_time = summary.sim_time,
                "Terminal headless run completed"
            );
            return Ok(());
        }

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to build terminal backend")?;
        terminal.hide_cursor().ok();

        let result = run_event_loop(self, &mut terminal, ctx);

        terminal.show_cursor().ok();
        if let Err(err) = disable_raw_mode() {
            tracing::error!(?err, "failed to disable raw mode");
        }
        if let Err(err) = execute!(terminal.backend_mut(), LeaveAlternateScreen) {
            tracing::error!(?err, "failed to leave alternate screen");
        }

        result
    }
}

fn run_event_loop(
    renderer: &TerminalRenderer,
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ctx: RendererContext,
) -> Result<()> {
    let mut app = TerminalApp::new(renderer, ctx);

    loop {
        let now = Instant::now();
        app.advance(now);

        if now.duration_since(app.last_draw) >= app.draw_interval {
            terminal.draw(|frame| app.draw(frame))?;
            app.last_draw = now;
        }

        let timeout = app.frame_interval.saturating_sub(now.elapsed());
        if event::poll(timeout).unwrap_or(false) {
            if let Event::Key(key) = event::read()? {
                if app.handle_key(key) {
                    break;
                }
            }
        }
    }

    Ok(())
}

impl TerminalRenderer {
    fn run_headless(&self, ctx: RendererContext) -> Result<HeadlessSummary> {
        let backend = ratatui::backend::TestBackend::new(100, 36);
        let mut terminal = Terminal::new(backend).context("failed to build test backend")?;
        let mut app = TerminalApp::new(self, ctx);
        let mut rng = SmallRng::seed_from_u64(0x10FA_11);
        let frames = self.headless_frame_budget();
        let elapsed = self.frame_interval.as_secs_f32();

        for _ in 0..frames {
            let now = Instant::now();
            if let Ok(mut world) = app.world.lock() {
                world.ingest(&synthetic_event(&mut rng, now));
            }
            app.advance_by(elapsed, now);
            terminal.draw(|frame| app.draw(frame))?;
        }

        let summary = HeadlessSummary {
            frames,
            events_ingested: app.snapshot.events_ingested,
            final_entity_count: app.snapshot.entity_count,
            max_size_seen: app.snapshot.stats.max_size_seen,
            requests_per_minute: app.snapshot.stats.requests_per_minute,
            sim_time: app.snapshot.sim_time,
        };

        if let Some(path) = report_file_path_from_env() {
            summary
                .write_json(&path)
                .with_context(|| format!("failed to write headless report to {}", path.display()))?;
        }

        Ok(summary)
    }

    fn headless_frame_budget(&self) -> usize {
        std::env::var("LOGFALL_TERMINAL_HEADLESS_FRAMES")
            .ok()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|value| *value > 0)
            .map(|value| value.min(MAX_HEADLESS_FRAMES))
            .unwrap_or(DEFAULT_HEADLESS_FRAMES)
    }
}

fn report_file_path_from_env() -> Option<PathBuf> {
    std::env::var_os("LOGFALL_TERMINAL_HEADLESS_REPORT").map(PathBuf::from)
}

#[derive(Debug, Serialize)]
struct HeadlessSummary {
    frames: usize,
    events_ingested: u64,
    final_entity_count: usize,
    max_size_seen: u64,
    requests_per_minute: usize,
    sim_time: f64,
}

impl HeadlessSummary {
    fn write_json(&self, path: &std::path::Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

struct TerminalApp {
    world: SharedWorld,
    events: EventReceiver,
    command_drain: CommandDrain,
    command_submit: CommandSubmit,
    frame_interval: Duration,
    draw_interval: Duration,
    paused: bool,
    help_visible: bool,
    last_step: Instant,
    last_draw: Instant,
    palette: Palette,
    snapshot: WorldSnapshot,
    rate_history: VecDeque<u64>,
}

impl TerminalApp {
    fn new(renderer: &TerminalRenderer, ctx: RendererContext) -> Self {
        let palette = Palette::detect();
        let snapshot = {
            let mut world = ctx
                .world
                .lock()
                .expect("world mutex poisoned during startup");
            world.snapshot(Instant::now())
        };
        Self {
            world: Arc::clone(&ctx.world),
            events: ctx.events,
            command_drain: ctx.command_drain,
            command_submit: ctx.command_submit,
            frame_interval: renderer.frame_interval,
            draw_interval: renderer.draw_interval,
            paused: false,
            help_visible: false,
            last_step: Instant::now(),
            last_draw: Instant::now(),
            palette,
            snapshot,
            rate_history: VecDeque::with_capacity(RATE_HISTORY_CAPACITY),
        }
    }

    fn advance(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_step).as_secs_f32();
        self.last_step = now;
        self.advance_by(elapsed, now);
    }

    /// One frame's worth of work, in the order the queueing discipline
    /// requires: pending commands and every queued event land in the world
    /// before physics runs, so a burst of log lines is never split across
    /// a partially rendered frame.
    fn advance_by(&mut self, elapsed: f32, now: Instant) {
        if let Ok(mut world) = self.world.lock() {
            (self.command_drain.as_ref())(&mut world);
            drain_pending_events(&self.events, &mut world);
            if !self.paused {
                world.step(elapsed);
            }
            self.snapshot = world.snapshot(now);
        }
        if self.rate_history.len() >= RATE_HISTORY_CAPACITY {
            self.rate_history.pop_front();
        }
        self.rate_history
            .push_back(self.snapshot.stats.requests_per_second as u64);
    }

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(frame.area());

        self.draw_header(frame, outer[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(outer[1]);

        self.draw_funnel(frame, body[0]);

        let sidebar = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(8)])
            .split(body[1]);

        self.draw_feed(frame, sidebar[0]);
        self.draw_stats(frame, sidebar[1]);

        if self.help_visible {
            self.draw_help(frame);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let snapshot = &self.snapshot;
        let status = format!(
            "Entities {:>3}  Events {:>6}  Req/s {:>3}  Req/min {:>5}  Sim {:>7.1}s",
            snapshot.entity_count,
            snapshot.events_ingested,
            snapshot.stats.requests_per_second,
            snapshot.stats.requests_per_minute,
            snapshot.sim_time,
        );
        let state_flag = if self.paused {
            Span::styled(" PAUSED ", self.palette.paused_style())
        } else {
            Span::styled(" RUNNING ", self.palette.running_style())
        };

        let mut line = Line::from(vec![Span::styled(status, self.palette.header_style())]);
        line.spans.push(Span::raw("  "));
        line.spans.push(state_flag);
        line.spans.push(Span::raw("  "));
        line.spans.push(Span::styled(
            "q quit  r reset peak  ? help",
            self.palette.accent_style(),
        ));

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .title(self.palette.title("logfall"))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_funnel(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(self.palette.title("Funnel"))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.width < 2 || inner.height < 2 {
            return;
        }

        let width = inner.width as usize;
        let height = inner.height as usize;
        let mut grid = vec![CellGlyph::default(); width * height];

        let funnel = &self.snapshot.funnel;
        let sim_width = self.world_width();
        let sim_height = funnel.bottom_y;

        rasterize_wall(
            &mut grid,
            width,
            height,
            funnel.left.start,
            funnel.left.end,
            '\\',
            self.palette.wall_style(),
            sim_width,
            sim_height,
        );
        rasterize_wall(
            &mut grid,
            width,
            height,
            funnel.right.start,
            funnel.right.end,
            '/',
            self.palette.wall_style(),
            sim_width,
            sim_height,
        );

        for viz in &self.snapshot.entities {
            let x = (viz.x / sim_width * width as f32)
                .floor()
                .clamp(0.0, (width - 1) as f32) as usize;
            let y = (viz.y / sim_height * height as f32)
                .floor()
                .clamp(0.0, (height - 1) as f32) as usize;
            grid[y * width + x] = CellGlyph {
                ch: entity_glyph(viz),
                style: self.palette.entity_style(viz.color_index),
            };
        }

        let mut lines = Vec::with_capacity(height);
        for y in 0..height {
            let mut spans = Vec::with_capacity(width);
            for x in 0..width {
                let cell = &grid[y * width + x];
                spans.push(Span::styled(cell.ch.to_string(), cell.style));
            }
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(Text::from(lines)), inner);
    }

    fn draw_feed(&self, frame: &mut Frame<'_>, area: Rect) {
        let inner_width = area.width.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .snapshot
            .feed
            .iter()
            .filter(|line| line.fade > 0.0)
            .map(|line| {
                let size_text = format_size(line.size);
                let path_budget = inner_width
                    .saturating_sub(size_text.len() + 1)
                    .min(MAX_PATH_CHARS);
                let path = truncate_path(&line.path, path_budget);
                let pad = inner_width.saturating_sub(path.len() + size_text.len());
                let spans = vec![
                    Span::styled(path, self.palette.faded(Style::default(), line.fade)),
                    Span::raw(" ".repeat(pad)),
                    Span::styled(size_text, self.palette.faded(self.palette.size_style(), line.fade)),
                ];
                ListItem::new(Line::from(spans))
            })
            .collect();

        let block = Block::default()
            .title(self.palette.title("Requests"))
            .borders(Borders::ALL);
        frame.render_widget(List::new(items).block(block), area);
    }

    fn draw_stats(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default()
            .title(self.palette.title("Stats"))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if inner.height == 0 {
            return;
        }

        let stats = &self.snapshot.stats;
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(inner);

        let lines = vec![
            Line::from(vec![
                Span::styled("Max Size     ", self.palette.header_style()),
                Span::styled(format_size(stats.max_size_seen), self.palette.size_style()),
            ]),
            Line::from(vec![
                Span::styled("Requests/min ", self.palette.header_style()),
                Span::raw(format!("{}", stats.requests_per_minute)),
            ]),
            Line::from(vec![
                Span::styled("Requests/sec ", self.palette.header_style()),
                Span::raw(format!("{}", stats.requests_per_second)),
            ]),
        ];
        frame.render_widget(Paragraph::new(Text::from(lines)), layout[0]);

        let rate_data: Vec<u64> = self.rate_history.iter().copied().collect();
        if !rate_data.is_empty() && layout[1].height > 0 {
            let spark = Sparkline::default()
                .style(self.palette.spark_style())
                .data(&rate_data);
            frame.render_widget(spark, layout[1]);
        }
    }

    fn draw_help(&self, frame: &mut Frame<'_>) {
        let size = frame.area();
        let help_width = (size.width as f32 * 0.5).round() as u16;
        let help_height = 8;
        let help_x = size.x + (size.width.saturating_sub(help_width)) / 2;
        let help_y = size.y + (size.height.saturating_sub(help_height)) / 2;
        let area = Rect::new(help_x, help_y, help_width, help_height);

        let help_lines = vec![
            Line::from(vec![Span::styled(
                "Controls",
                self.palette.header_style().add_modifier(Modifier::BOLD),
            )]),
            Line::raw(" q      Quit"),
            Line::raw(" r      Reset peak size"),
            Line::raw(" space  Toggle pause"),
            Line::raw(" ?      Toggle this help"),
        ];

        let paragraph = Paragraph::new(help_lines).block(
            Block::default()
                .title(self.palette.title("Help"))
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Black).fg(Color::White)),
        );
        frame.render_widget(paragraph, area);
    }

    /// Returns true when the application should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _)
            | (KeyCode::Char('q'), _)
            | (KeyCode::Char('Q'), _)
            | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                return true;
            }
            (KeyCode::Char('r'), _) => {
                (self.command_submit.as_ref())(ControlCommand::ResetPeakSize);
            }
            (KeyCode::Char(' '), _) => {
                self.paused = !self.paused;
            }
            (KeyCode::Char('?') | KeyCode::Char('h'), _) => {
                self.help_visible = !self.help_visible;
            }
            _ => {}
        }
        false
    }

    fn world_width(&self) -> f32 {
        // The right wall starts at the sim area's right edge.
        self.snapshot.funnel.right.start[0]
    }
}

#[derive(Clone, Copy)]
struct CellGlyph {
    ch: char,
    style: Style,
}

impl Default for CellGlyph {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn rasterize_wall(
    grid: &mut [CellGlyph],
    width: usize,
    height: usize,
    start: [f32; 2],
    end: [f32; 2],
    glyph: char,
    style: Style,
    sim_width: f32,
    sim_height: f32,
) {
    let samples = (width.max(height) * 2).max(2);
    for step in 0..=samples {
        let t = step as f32 / samples as f32;
        let world_x = start[0] + (end[0] - start[0]) * t;
        let world_y = start[1] + (end[1] - start[1]) * t;
        let x = (world_x / sim_width * width as f32)
            .floor()
            .clamp(0.0, (width - 1) as f32) as usize;
        let y = (world_y / sim_height * height as f32)
            .floor()
            .clamp(0.0, (height - 1) as f32) as usize;
        grid[y * width + x] = CellGlyph { ch: glyph, style };
    }
}

fn entity_glyph(viz: &EntityViz) -> char {
    match viz.kind {
        ShapeKind::Circle => {
            if viz.radius >= 45.0 {
                '@'
            } else if viz.radius >= 25.0 {
                'O'
            } else {
                'o'
            }
        }
        ShapeKind::PostArrow => '^',
        ShapeKind::DeleteCross => 'x',
        ShapeKind::Square => '#',
    }
}

fn truncate_path(path: &str, budget: usize) -> String {
    if path.len() <= budget {
        return path.to_string();
    }
    if budget <= 3 {
        return path.chars().take(budget).collect();
    }
    let head: String = path.chars().take(budget - 3).collect();
    format!("{head}...")
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    colored: bool,
}

const ENTITY_COLORS: [Color; 6] = [
    Color::Red,
    Color::Green,
    Color::Blue,
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
];

impl Palette {
    fn detect() -> Self {
        Self {
            colored: on_cached(Stream::Stdout).is_some(),
        }
    }

    fn header_style(&self) -> Style {
        if self.colored {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        }
    }

    fn accent_style(&self) -> Style {
        if self.colored {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        }
    }

    fn wall_style(&self) -> Style {
        Style::default().fg(Color::White)
    }

    fn entity_style(&self, color_index: u8) -> Style {
        if self.colored {
            Style::default().fg(ENTITY_COLORS[color_index as usize % ENTITY_COLORS.len()])
        } else {
            Style::default()
        }
    }

    fn size_style(&self) -> Style {
        if self.colored {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        }
    }

    fn spark_style(&self) -> Style {
        if self.colored {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        }
    }

    fn paused_style(&self) -> Style {
        if self.colored {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default().add_modifier(Modifier::REVERSED)
        }
    }

    fn running_style(&self) -> Style {
        if self.colored {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        }
    }

    /// Age-based fade mapped onto terminal-friendly dimming tiers.
    fn faded(&self, base: Style, fade: f32) -> Style {
        if fade > 0.66 {
            base
        } else if fade > 0.33 {
            base.add_modifier(Modifier::DIM)
        } else {
            base.fg(Color::DarkGray).add_modifier(Modifier::DIM)
        }
    }

    fn title(&self, text: &'static str) -> Span<'static> {
        Span::styled(text, self.header_style().add_modifier(Modifier::BOLD))
    }
}
