// SPDX-License-Identifier: GPL-3.0-only

//! Terminal interface
//!
//! A thin renderer over [`SessionSnapshot`]: all decisions live in the
//! session, this module only draws and forwards key presses. The preview is
//! drawn with Unicode half-block characters for double vertical resolution.

use crate::backends::camera::V4l2Camera;
use crate::backends::gallery::FileDialogGallery;
use crate::backends::permissions::DeviceNodePermission;
use crate::config::Config;
use crate::constants::display::ConfidenceTone;
use crate::constants::timing;
use crate::errors::PipelineError;
use crate::pipelines::inference::{CaptureSource, ImageAcquirer, InferenceClient};
use crate::session::{
    CameraPermission, CycleOutcome, LoopConfig, LoopController, Preview, Session, SessionSnapshot,
    SessionState,
};

use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use image::RgbImage;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, warn};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Longest edge of the decoded preview thumbnail
const PREVIEW_MAX_EDGE: u32 = 160;

/// Run the terminal interface
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let classifier = InferenceClient::from_config(&config)?;
    let acquirer = ImageAcquirer::from_config(&config)
        .with_camera(Box::new(V4l2Camera::new(config.camera_device.clone())))
        .with_gallery(Box::new(FileDialogGallery::new()));
    let session = Session::new(acquirer, Arc::new(classifier), &config);

    // Permission is asked in the background; the screen stays blank meanwhile
    let mut permission = DeviceNodePermission::new(&config.camera_device);
    let init_session = session.clone();
    runtime.spawn(async move {
        init_session.initialize(&mut permission).await;
    });

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = TerminalApp::new(session.clone(), runtime.handle().clone(), config);
    let result = app.run(&mut terminal);
    drop(app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.block_on(session.shutdown());
    result
}

struct TerminalApp {
    session: Session,
    runtime: Handle,
    controller: LoopController,
    config: Config,
    outcome_tx: mpsc::UnboundedSender<(CaptureSource, CycleOutcome)>,
    outcomes: mpsc::UnboundedReceiver<(CaptureSource, CycleOutcome)>,
    preview: PreviewWidget,
    message: Option<String>,
    tick: usize,
}

impl TerminalApp {
    fn new(session: Session, runtime: Handle, config: Config) -> Self {
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();
        Self {
            controller: LoopController::new(session.clone()),
            session,
            runtime,
            config,
            outcome_tx,
            outcomes,
            preview: PreviewWidget::default(),
            message: None,
            tick: 0,
        }
    }

    fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // The loop controller spawns onto the current runtime
        let runtime = self.runtime.clone();
        let _guard = runtime.enter();

        loop {
            while let Ok((source, outcome)) = self.outcomes.try_recv() {
                if let Some(message) = outcome_message(source, &outcome) {
                    self.message = Some(message);
                }
            }

            let snapshot = self.session.snapshot();
            self.preview.update(snapshot.preview.as_ref());
            terminal.draw(|f| self.draw(f, &snapshot))?;
            self.tick = self.tick.wrapping_add(1);

            if event::poll(Duration::from_millis(timing::TERMINAL_POLL_MS))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                // Ctrl+C or 'q' to quit
                if key.code == KeyCode::Char('q')
                    || (key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL))
                {
                    break;
                }
                self.handle_key(key.code, &snapshot);
            }
        }

        self.controller.stop();
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode, snapshot: &SessionSnapshot) {
        if snapshot.camera_permission != CameraPermission::Granted {
            return;
        }
        self.message = None;

        match (code, &snapshot.state) {
            (KeyCode::Enter | KeyCode::Char(' '), SessionState::Welcome) => {
                self.session.start();
            }
            (_, SessionState::Welcome) => {}
            (KeyCode::Char('c'), _) => self.spawn_capture(CaptureSource::Camera),
            (KeyCode::Char('g'), _) => self.spawn_capture(CaptureSource::Gallery),
            (KeyCode::Char('r'), _) => {
                if !self.session.reset() {
                    self.message = Some("Busy, reset ignored".to_string());
                }
            }
            (KeyCode::Char('l'), _) => {
                if self.controller.is_running() {
                    self.controller.stop();
                    self.message = Some("Continuous capture off".to_string());
                } else {
                    self.controller.start(LoopConfig::from_config(&self.config));
                    self.message = Some("Continuous capture on".to_string());
                }
            }
            _ => {}
        }
    }

    fn spawn_capture(&self, source: CaptureSource) {
        let session = self.session.clone();
        let outcome_tx = self.outcome_tx.clone();
        self.runtime.spawn(async move {
            let outcome = session.capture(source).await;
            let _ = outcome_tx.send((source, outcome));
        });
    }

    fn draw(&self, f: &mut Frame, snapshot: &SessionSnapshot) {
        draw_screen(
            f,
            snapshot,
            &self.preview,
            self.controller.is_running(),
            self.config.confidence_threshold_percent,
            self.tick,
            self.message.as_deref(),
        );
    }
}

/// Draw one frame for `snapshot`
///
/// Nothing is drawn until the camera permission is answered, and a denied
/// camera leaves only the refusal on screen.
fn draw_screen(
    f: &mut Frame,
    snapshot: &SessionSnapshot,
    preview: &PreviewWidget,
    looping: bool,
    threshold_percent: f64,
    tick: usize,
    message: Option<&str>,
) {
    let area = f.area();

    match snapshot.camera_permission {
        CameraPermission::Pending => return,
        CameraPermission::Denied => {
            render_centered(f, area, vec![Line::from("No access to camera")]);
            return;
        }
        CameraPermission::Granted => {}
    }

    if matches!(snapshot.state, SessionState::Welcome) {
        render_centered(f, area, welcome_lines());
        return;
    }

    let [preview_area, result_area, status_area] = Layout::vertical([
        Constraint::Min(4),
        Constraint::Length(4),
        Constraint::Length(1),
    ])
    .areas(area);

    let preview_block = Block::bordered().title(preview_title(snapshot.preview.as_ref()));
    let inner = preview_block.inner(preview_area);
    f.render_widget(preview_block, preview_area);
    f.render_widget(preview, inner);

    let lines = result_lines(snapshot, looping, threshold_percent, tick);
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(Block::bordered().title("Result")),
        result_area,
    );

    let hints = status_hints(looping);
    let status = StatusBar {
        message: message.unwrap_or(&hints),
    };
    f.render_widget(status, status_area);
}

fn render_centered(f: &mut Frame, area: Rect, lines: Vec<Line<'static>>) {
    let height = (lines.len() as u16).min(area.height);
    let y = area.y + area.height.saturating_sub(height) / 2;
    let centered = Rect {
        x: area.x,
        y,
        width: area.width,
        height,
    };
    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), centered);
}

fn welcome_lines() -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled(
            "Sign Camera",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Show a hand sign to the camera or pick a picture of one."),
        Line::from(""),
        Line::from("Press Enter to start"),
    ]
}

fn preview_title(preview: Option<&Preview>) -> String {
    match preview {
        Some(preview) => format!(
            "{} · {}",
            preview.source.display_name(),
            preview.captured_at.format("%H:%M:%S")
        ),
        None => "Preview".to_string(),
    }
}

fn status_hints(looping: bool) -> String {
    format!(
        "'c' capture | 'g' gallery | 'r' reset | 'l' loop: {} | 'q' quit",
        if looping { "on" } else { "off" }
    )
}

fn tone_color(tone: ConfidenceTone) -> Color {
    match tone {
        ConfidenceTone::Positive => Color::Green,
        ConfidenceTone::Negative => Color::Red,
    }
}

/// Lines of the result panel
///
/// While looping, failed cycles are skipped silently and the last good
/// result stays on screen.
fn result_lines(
    snapshot: &SessionSnapshot,
    looping: bool,
    threshold_percent: f64,
    tick: usize,
) -> Vec<Line<'static>> {
    let shown = match &snapshot.state {
        SessionState::Result(result) => Some(result),
        _ if looping => snapshot.last_result.as_ref(),
        _ => None,
    };

    let mut lines = Vec::new();
    if let Some(result) = shown {
        lines.push(Line::from(Span::styled(
            result.label().to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            result.accuracy_text(),
            Style::default().fg(tone_color(result.tone(threshold_percent))),
        )));
    } else if let Some(kind) = snapshot.state.error_kind().filter(|_| !looping) {
        lines.push(Line::from(Span::styled(
            format!("Failed: {}", kind),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from("Press 'r' to reset or try again"));
    } else if !snapshot.loading {
        lines.push(Line::from("Press 'c' to capture or 'g' to pick a picture"));
    }

    if snapshot.loading {
        lines.push(Line::from(format!(
            "Classifying {}",
            SPINNER[tick % SPINNER.len()]
        )));
    }
    lines
}

/// Status line text for a finished cycle, if it deserves one
fn outcome_message(source: CaptureSource, outcome: &CycleOutcome) -> Option<String> {
    match outcome {
        CycleOutcome::Completed(_) | CycleOutcome::Discarded => None,
        CycleOutcome::Skipped => Some("Busy, capture ignored".to_string()),
        CycleOutcome::Failed(PipelineError::UserCancelled) => None,
        CycleOutcome::Failed(PipelineError::PermissionDenied) => {
            Some(format!("No access to {}", source.display_name().to_lowercase()))
        }
        CycleOutcome::Failed(e) => {
            info!(source = ?source, error = %e, "Capture failed");
            Some(e.to_string())
        }
    }
}

/// Decoded thumbnail of the session preview
#[derive(Default)]
struct PreviewWidget {
    key: Option<(String, DateTime<Local>)>,
    thumbnail: Option<RgbImage>,
}

impl PreviewWidget {
    /// Decode only when the preview actually changed
    fn update(&mut self, preview: Option<&Preview>) {
        let Some(preview) = preview else {
            self.key = None;
            self.thumbnail = None;
            return;
        };

        let key = (preview.image.origin.clone(), preview.captured_at);
        if self.key.as_ref() == Some(&key) {
            return;
        }

        self.thumbnail = match image::load_from_memory(&preview.image.data) {
            Ok(decoded) => Some(decoded.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE).to_rgb8()),
            Err(e) => {
                warn!(origin = %preview.image.origin, error = %e, "Preview not decodable");
                None
            }
        };
        self.key = Some(key);
    }
}

impl Widget for &PreviewWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(image) = &self.thumbnail else {
            let msg = "No picture yet";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Each terminal cell shows 2 vertical pixels
        let aspect = image.width() as f64 / image.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > aspect {
            let h = term_height;
            ((h * aspect) as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            (w as u16, (w / aspect / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;
        let x_scale = image.width() as f64 / display_width as f64;
        let y_scale = image.height() as f64 / (display_height * 2) as f64;

        let sample = |x: f64, y: f64| -> Color {
            let px = image.get_pixel(
                (x as u32).min(image.width() - 1),
                (y as u32).min(image.height() - 1),
            );
            Color::Rgb(px[0], px[1], px[2])
        };

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = tx as f64 * x_scale;
                let top = sample(src_x, ty as f64 * 2.0 * y_scale);
                let bottom = sample(src_x, (ty as f64 * 2.0 + 1.0) * y_scale);

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }
    }
}

struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::RawImage;
    use crate::errors::ErrorKind;
    use crate::pipelines::inference::InferenceResult;
    use ratatui::backend::TestBackend;

    fn snapshot(state: SessionState, last_result: Option<InferenceResult>) -> SessionSnapshot {
        SessionSnapshot {
            loading: state.is_in_flight(),
            state,
            preview: None,
            last_result,
            camera_permission: CameraPermission::Granted,
            revision: 0,
        }
    }

    fn screen_text(snapshot: &SessionSnapshot) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        let preview = PreviewWidget::default();
        terminal
            .draw(|f| draw_screen(f, snapshot, &preview, false, 70.0, 0, None))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn result(label: &str, confidence: f64) -> InferenceResult {
        InferenceResult::new(label, confidence).unwrap()
    }

    #[test]
    fn test_pending_permission_draws_nothing() {
        let mut pending = snapshot(SessionState::Welcome, None);
        pending.camera_permission = CameraPermission::Pending;

        let text = screen_text(&pending);
        assert!(text.chars().all(|c| c == ' '), "unexpected output: {text:?}");
    }

    #[test]
    fn test_denied_permission_draws_only_refusal() {
        let mut denied = snapshot(SessionState::Welcome, None);
        denied.camera_permission = CameraPermission::Denied;

        let text = screen_text(&denied);
        assert!(text.contains("No access to camera"));
        assert_eq!(text.replace("No access to camera", "").trim(), "");
    }

    #[test]
    fn test_granted_permission_draws_welcome() {
        let text = screen_text(&snapshot(SessionState::Welcome, None));
        assert!(text.contains("Sign Camera"));
        assert!(text.contains("Press Enter to start"));
        assert!(!text.contains("No access to camera"));
        assert!(!text.contains("Result"));
    }

    #[test]
    fn test_result_colours() {
        let lines = result_lines(&snapshot(SessionState::Result(result("A", 0.92)), None), false, 70.0, 0);
        assert_eq!(lines[0].spans[0].content, "A");
        assert_eq!(lines[1].spans[0].content, "Accuracy: 92.0%");
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Green));

        let lines = result_lines(&snapshot(SessionState::Result(result("B", 0.45)), None), false, 70.0, 0);
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Red));

        // Exactly 70% is not confident
        let lines = result_lines(&snapshot(SessionState::Result(result("C", 0.70)), None), false, 70.0, 0);
        assert_eq!(lines[1].spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_error_hidden_while_looping() {
        let failed = snapshot(SessionState::Error(ErrorKind::NetworkError), Some(result("A", 0.8)));

        let single = result_lines(&failed, false, 70.0, 0);
        assert!(single[0].spans[0].content.contains("Network error"));

        let looping = result_lines(&failed, true, 70.0, 0);
        assert_eq!(looping[0].spans[0].content, "A");
    }

    #[test]
    fn test_busy_indicator() {
        let busy = snapshot(SessionState::Capturing, None);
        let lines = result_lines(&busy, false, 70.0, 1);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans[0].content, "Classifying /");
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            outcome_message(CaptureSource::Gallery, &CycleOutcome::Failed(PipelineError::UserCancelled)),
            None
        );
        assert_eq!(
            outcome_message(CaptureSource::Gallery, &CycleOutcome::Failed(PipelineError::PermissionDenied)),
            Some("No access to gallery".to_string())
        );
        assert_eq!(
            outcome_message(CaptureSource::Camera, &CycleOutcome::Skipped),
            Some("Busy, capture ignored".to_string())
        );
        assert!(
            outcome_message(CaptureSource::Camera, &CycleOutcome::Failed(PipelineError::ServerError(500)))
                .unwrap()
                .contains("500")
        );
    }

    #[test]
    fn test_preview_widget_renders_half_blocks() {
        let jpeg = crate::media::encode_jpeg(&RgbImage::from_pixel(20, 10, image::Rgb([200, 10, 10])), 0.9)
            .unwrap();
        let preview = Preview {
            source: CaptureSource::Camera,
            image: RawImage::new(jpeg, "mem"),
            captured_at: Local::now(),
        };

        let mut widget = PreviewWidget::default();
        widget.update(Some(&preview));
        assert!(widget.thumbnail.is_some());

        let area = Rect::new(0, 0, 10, 5);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);
        assert_eq!(buf.cell((5, 2)).unwrap().symbol(), "▀");

        widget.update(None);
        assert!(widget.thumbnail.is_none());
    }

    #[test]
    fn test_status_bar_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        StatusBar { message: "abcdefgh" }.render(area, &mut buf);
        assert_eq!(buf.cell((4, 0)).unwrap().symbol(), "e");
    }
}
