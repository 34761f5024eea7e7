use std::{sync::Arc, time::Duration};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind,
        MouseButton, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use firma_kiosk::Kiosk;
use firma_persist::ExportMode;
use firma_types::geometry::{CssSize, Point, PointerInput};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tracing::warn;

const INK: char = '█';

pub async fn run(kiosk: Arc<Kiosk>, css: CssSize, device_pixel_ratio: f32) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = run_loop(&mut terminal, &kiosk, css, device_pixel_ratio).await;

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    res
}

async fn run_loop<B: Backend>(
    terminal: &mut Terminal<B>,
    kiosk: &Kiosk,
    css: CssSize,
    device_pixel_ratio: f32,
) -> Result<()> {
    let mut surface = Rect::default();

    loop {
        terminal.draw(|f| surface = draw(f, kiosk))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        match event::read()? {
            CEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char('s') => {
                    kiosk.request_save().await?;
                }
                KeyCode::Char('c') => kiosk.request_clear()?,
                KeyCode::Char('e') => export(kiosk, ExportMode::Individual).await,
                KeyCode::Char('z') => export(kiosk, ExportMode::Archive).await,
                _ => {}
            },
            CEvent::Mouse(mouse) => {
                let client = to_css(surface, css, mouse.column, mouse.row);
                match (mouse.kind, client) {
                    (MouseEventKind::Down(MouseButton::Left), Some(client)) => {
                        kiosk.on_pointer_down(&PointerInput::Mouse { client })?
                    }
                    (MouseEventKind::Drag(MouseButton::Left), Some(client)) => {
                        kiosk.on_pointer_move(&PointerInput::Mouse { client })?
                    }
                    (MouseEventKind::Up(MouseButton::Left), _) => kiosk.on_pointer_up()?,
                    _ => {}
                }
            }
            CEvent::Resize(..) => kiosk.resize(css, device_pixel_ratio)?,
            _ => {}
        }
    }

    Ok(())
}

async fn export(kiosk: &Kiosk, mode: ExportMode) {
    if let Err(err) = kiosk.request_export_all(mode).await {
        warn!("Export from pad failed: {err}");
    }
}

/// Draws the pad and returns the cell area that maps onto the canvas.
fn draw(f: &mut Frame, kiosk: &Kiosk) -> Rect {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.size());

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Firma",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(kiosk.status().badge(), Style::default().fg(Color::Magenta)),
        Span::raw("  "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" guardar  "),
        Span::styled("c", Style::default().fg(Color::Yellow)),
        Span::raw(" limpiar  "),
        Span::styled("e/z", Style::default().fg(Color::Yellow)),
        Span::raw(" exportar  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" salir"),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    let block = Block::default().borders(Borders::ALL).title("Firme aquí");
    let surface = block.inner(chunks[1]);
    let prompt_visible = kiosk.session().map(|s| s.prompt_visible).unwrap_or(false);
    let canvas = if prompt_visible {
        let padding = usize::from(surface.height / 2);
        let mut lines = vec![Line::raw(""); padding];
        lines.push(Line::styled(
            "Firme con el dedo o el ratón",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(lines).alignment(Alignment::Center)
    } else {
        let grid = kiosk
            .preview(surface.width, surface.height)
            .unwrap_or_default();
        Paragraph::new(ink_lines(&grid))
    };
    f.render_widget(canvas.block(block), chunks[1]);

    let toast = kiosk.status().toast().unwrap_or_default();
    let footer = Paragraph::new(toast).block(Block::default().borders(Borders::ALL).title("Estado"));
    f.render_widget(footer, chunks[2]);

    surface
}

fn ink_lines(grid: &[Vec<bool>]) -> Vec<Line<'static>> {
    grid.iter()
        .map(|row| {
            row.iter()
                .map(|&ink| if ink { INK } else { ' ' })
                .collect::<String>()
                .into()
        })
        .collect()
}

/// Maps a terminal cell to the css point at its centre.
fn to_css(surface: Rect, css: CssSize, column: u16, row: u16) -> Option<Point> {
    if surface.width == 0 || surface.height == 0 {
        return None;
    }
    if column < surface.x || row < surface.y {
        return None;
    }
    let (col, line) = (column - surface.x, row - surface.y);
    if col >= surface.width || line >= surface.height {
        return None;
    }
    Some(Point::new(
        (f32::from(col) + 0.5) * css.width / f32::from(surface.width),
        (f32::from(line) + 0.5) * css.height / f32::from(surface.height),
    ))
}
