use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::config::themes::{Palette, ThemeRegistry};
use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::engine::{FrameClock, FrameStatus, ItemId, RenderCoordinator, SelectionOrigin, SystemClock};
use crate::ui::{self, canvas, TerminalSink};

pub mod actions;
pub mod state;

use self::actions::{action_for_key, Action};
pub use state::{AppState, DragState, OverlayState};

const ANIMATION_TICK: Duration = Duration::from_millis(16);
const IDLE_TICK: Duration = Duration::from_millis(250);

/// Selection reported by the engine's select handler.
#[derive(Debug, Clone)]
struct SelectionEvent {
    id: ItemId,
    origin: SelectionOrigin,
}

pub struct App {
    pub config: Arc<AppConfig>,
    engine: RenderCoordinator<TerminalSink>,
    state: AppState,
    selections: Receiver<SelectionEvent>,
    clock: SystemClock,
    palette: Palette,
    canvas_area: Rect,
    should_quit: bool,
}

impl App {
    pub fn new(config: Arc<AppConfig>, dataset: Dataset) -> Result<Self> {
        let mut engine_config = config.engine.clone();
        if let Ok((columns, _)) = crossterm::terminal::size() {
            let canvas = ui::regions(Rect::new(0, 0, columns, 24)).canvas;
            if canvas.width > 0 {
                engine_config.container_width = f64::from(canvas.width);
            }
        }

        let Dataset {
            title,
            records,
            skipped,
            ..
        } = dataset;
        let mut engine = RenderCoordinator::new(
            records,
            engine_config,
            OffsetDateTime::now_utc(),
            TerminalSink::default(),
        );

        let (sender, selections) = unbounded();
        engine.on_select(move |item, origin| {
            let event = SelectionEvent {
                id: item.id.clone(),
                origin,
            };
            if sender.send(event).is_err() {
                tracing::warn!("selection receiver dropped");
            }
        });

        let mut state = AppState::new(title);
        let dropped = skipped + engine.rejected().len();
        if engine.items().is_empty() {
            state.set_status_message(Some("Timeline has no items to show"));
        } else if dropped > 0 {
            state.set_status_message(Some(format!("Skipped {dropped} invalid item(s)")));
        }

        let palette = ThemeRegistry::default().palette(config.theme);
        Ok(Self {
            config,
            engine,
            state,
            selections,
            clock: SystemClock::new(),
            palette,
            canvas_area: Rect::default(),
            should_quit: false,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    pub fn engine(&self) -> &RenderCoordinator<TerminalSink> {
        &self.engine
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            let size = terminal.size().context("querying terminal size")?;
            self.sync_viewport(size);
            terminal
                .draw(|frame| ui::draw_app(frame, &self.state, &self.engine, self.palette))
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = if self.engine.is_animating() {
                ANIMATION_TICK
            } else {
                IDLE_TICK
            };
            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    // the next draw picks up the new size
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            self.on_tick();
        }
        Ok(())
    }

    fn sync_viewport(&mut self, size: Rect) {
        self.canvas_area = ui::regions(size).canvas;
        self.engine
            .set_viewport_width(f64::from(self.canvas_area.width));
    }

    fn on_tick(&mut self) {
        if self.engine.is_animating() {
            if let FrameStatus::Idle = self.engine.on_frame(self.clock.now()) {
                tracing::debug!(zoom = self.engine.zoom(), "zoom animation settled");
            }
        }
        self.drain_selections();
    }

    fn drain_selections(&mut self) {
        while let Ok(event) = self.selections.try_recv() {
            self.state.open_detail(event.id, event.origin);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if let Some(action) = action_for_key(key) {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        let viewport = self.engine.view().viewport_width;
        match action {
            Action::Quit => self.should_quit = true,
            Action::ScrollLeft => {
                self.engine.scroll_by(-(viewport / 10.0).max(1.0));
            }
            Action::ScrollRight => {
                self.engine.scroll_by((viewport / 10.0).max(1.0));
            }
            Action::PageLeft => {
                self.engine.scroll_by(-viewport);
            }
            Action::PageRight => {
                self.engine.scroll_by(viewport);
            }
            Action::ZoomIn => {
                if !self.engine.zoom_in() {
                    self.state.set_status_message(Some("Already at maximum zoom"));
                }
            }
            Action::ZoomOut => {
                if !self.engine.zoom_out() {
                    self.state.set_status_message(Some("Already at minimum zoom"));
                }
            }
            Action::FitAll => {
                self.engine.fit_all();
            }
            Action::JumpStart => {
                self.engine.set_scroll(0.0);
            }
            Action::JumpEnd => {
                let end = self.engine.max_scroll();
                self.engine.set_scroll(end);
            }
            Action::SelectNext => {
                self.engine.select_next();
            }
            Action::SelectPrevious => {
                self.engine.select_previous();
            }
            Action::OpenDetail => {
                if !self.engine.activate_selected(SelectionOrigin::Keyboard) {
                    self.state
                        .set_status_message(Some("Nothing selected; press Tab to pick an item"));
                }
            }
            Action::OpenTagFilter => {
                if self.engine.catalog().is_empty() {
                    self.state.set_status_message(Some("Timeline has no tags"));
                } else {
                    self.state.open_tag_filter();
                }
            }
            Action::ClearSelection => {
                self.engine.clear_selection();
                self.state.clear_status_message();
            }
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::TagFilter(overlay)) => {
                let cursor = overlay.cursor;
                let len = self.engine.catalog().len();
                match key.code {
                    KeyCode::Esc | KeyCode::Char('f') | KeyCode::Char('q') => {
                        self.state.close_overlay()
                    }
                    KeyCode::Char('j') | KeyCode::Down => self.state.move_tag_cursor(1, len),
                    KeyCode::Char('k') | KeyCode::Up => self.state.move_tag_cursor(-1, len),
                    KeyCode::Char(' ') | KeyCode::Enter => {
                        if let Some(tag) = self.engine.catalog().get_index(cursor) {
                            let name = tag.name.clone();
                            let on = !self.engine.view().filter.is_active(&name);
                            self.engine.toggle_tag(&name, on);
                        }
                    }
                    KeyCode::Char('a') => {
                        self.engine.set_all_tags(true);
                    }
                    KeyCode::Char('n') => {
                        self.engine.set_all_tags(false);
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::Detail(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                        self.state.close_overlay()
                    }
                    // keep browsing with the popup following the selection
                    KeyCode::Tab => {
                        self.state.close_overlay();
                        self.engine.select_next();
                        self.engine.activate_selected(SelectionOrigin::Keyboard);
                    }
                    KeyCode::BackTab => {
                        self.state.close_overlay();
                        self.engine.select_previous();
                        self.engine.activate_selected(SelectionOrigin::Keyboard);
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let area = self.canvas_area;
        let inside = mouse.column >= area.x
            && mouse.column < area.right()
            && mouse.row >= area.y
            && mouse.row < area.bottom();

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if inside => {
                if self.state.overlay().is_some() {
                    self.state.close_overlay();
                    return;
                }
                self.state.drag = Some(DragState {
                    last_column: mouse.column,
                    moved: false,
                });
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some(drag) = self.state.drag.as_mut() {
                    let delta = i32::from(drag.last_column) - i32::from(mouse.column);
                    if delta != 0 {
                        drag.last_column = mouse.column;
                        drag.moved = true;
                        self.engine.scroll_by(f64::from(delta));
                    }
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(drag) = self.state.drag.take() else {
                    return;
                };
                if !drag.moved && inside {
                    self.click(mouse.column, mouse.row);
                }
            }
            MouseEventKind::ScrollUp if inside => self.zoom_at(mouse.column, true),
            MouseEventKind::ScrollDown if inside => self.zoom_at(mouse.column, false),
            _ => {}
        }
    }

    fn content_x(&self, column: u16) -> f64 {
        self.engine.view().scroll_left + f64::from(column.saturating_sub(self.canvas_area.x))
    }

    fn click(&mut self, column: u16, row: u16) {
        let metrics = &self.engine.config().layout;
        let Some((lane, level)) =
            canvas::slot_at_row(self.canvas_area, row, metrics.base_offset, metrics.level_height)
        else {
            return;
        };
        // right edge of the cell, since markers are drawn at the rounded column
        let x = self.content_x(column) + 0.5;
        let hit = self
            .engine
            .item_at(x, lane, level)
            .map(|descriptor| descriptor.id.clone());
        match hit {
            Some(id) => {
                let origin = SelectionOrigin::Pointer {
                    x: f64::from(column),
                    y: f64::from(row),
                };
                self.engine.select(&id, origin);
            }
            None => self.engine.clear_selection(),
        }
    }

    fn zoom_at(&mut self, column: u16, zoom_in: bool) {
        let factor = self.engine.config().zoom_factor;
        let target = if zoom_in {
            self.engine.zoom() * factor
        } else {
            self.engine.zoom() / factor
        };
        let center = self.engine.mapper().to_date(self.content_x(column));
        self.engine.animate_zoom_around(target, center);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TimelineItem;
    use assert_matches::assert_matches;
    use crossterm::event::{KeyModifiers, MouseEvent};

    fn dataset() -> Dataset {
        let records: Vec<TimelineItem> = serde_json::from_value(serde_json::json!([
            {"id": "war", "title": "Long war", "type": "period", "start": "1900", "end": "1950", "tags": ["x"]},
            {"id": "treaty", "title": "Treaty", "type": "event", "start": "1920", "tags": ["y"]},
            {"title": "broken", "start": "not a date"}
        ]))
        .expect("records");
        Dataset {
            name: "demo".into(),
            title: "Demo".into(),
            records,
            skipped: 1,
        }
    }

    fn app() -> App {
        let mut app = App::new(Arc::new(AppConfig::default()), dataset()).expect("app");
        app.sync_viewport(Rect::new(0, 0, 100, 20));
        let fit = app.engine.mapper().fit_zoom(app.engine.view().viewport_width);
        app.engine.set_zoom(fit);
        app
    }

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    #[test]
    fn reports_dropped_records() {
        let app = app();
        assert_eq!(app.engine().items().len(), 2);
        assert_eq!(app.state().status_message.as_deref(), Some("Skipped 2 invalid item(s)"));
    }

    #[test]
    fn enter_opens_centered_detail_for_selection() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        assert!(app.engine().selected().is_some());
        press(&mut app, KeyCode::Enter);
        app.drain_selections();
        assert_matches!(
            app.state().overlay(),
            Some(OverlayState::Detail(state::DetailOverlay { anchor: None, .. }))
        );
        press(&mut app, KeyCode::Esc);
        assert!(app.state().overlay().is_none());
    }

    #[test]
    fn tag_filter_toggles_through_engine() {
        let mut app = app();
        press(&mut app, KeyCode::Char('f'));
        assert_matches!(app.state().overlay(), Some(OverlayState::TagFilter(_)));
        press(&mut app, KeyCode::Char(' '));
        assert!(!app.engine().view().filter.is_active("x"));
        assert_eq!(app.engine().layout().items.len(), 1);
        press(&mut app, KeyCode::Char('a'));
        assert_eq!(app.engine().layout().items.len(), 2);
        press(&mut app, KeyCode::Esc);
        assert!(app.state().overlay().is_none());
    }

    #[test]
    fn clicking_an_event_opens_anchored_detail() {
        let mut app = app();
        let descriptor = app
            .engine()
            .layout()
            .descriptor(&ItemId::new("treaty"))
            .cloned()
            .expect("treaty laid out");
        let area = app.canvas_area;
        let column = area.x + (descriptor.start_px - app.engine().view().scroll_left).round() as u16;
        let row = canvas::axis_row(area) + descriptor.offset.round() as u16;

        for kind in [MouseEventKind::Down(MouseButton::Left), MouseEventKind::Up(MouseButton::Left)] {
            app.handle_mouse(MouseEvent {
                kind,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            });
        }
        app.drain_selections();

        assert_eq!(app.engine().selected().map(|item| item.id.as_str()), Some("treaty"));
        assert_matches!(
            app.state().overlay(),
            Some(OverlayState::Detail(state::DetailOverlay { anchor: Some(_), .. }))
        );
    }

    #[test]
    fn dragging_scrolls_instead_of_selecting() {
        let mut app = app();
        app.engine.set_zoom(10.0);
        let before = app.engine().view().scroll_left;
        let row = canvas::axis_row(app.canvas_area) + 1;
        for (kind, column) in [
            (MouseEventKind::Down(MouseButton::Left), 50),
            (MouseEventKind::Drag(MouseButton::Left), 40),
            (MouseEventKind::Up(MouseButton::Left), 40),
        ] {
            app.handle_mouse(MouseEvent {
                kind,
                column,
                row,
                modifiers: KeyModifiers::NONE,
            });
        }
        assert_eq!(app.engine().view().scroll_left, before + 10.0);
        assert!(app.engine().selected().is_none());
    }
}
