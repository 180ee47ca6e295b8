use std::{
    collections::VecDeque,
    sync::mpsc::{Receiver, TryRecvError},
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Terminal,
};
use roadscan_orchestrator::SamplerState;
use roadscan_types::{
    events::{EventPayload, LifecyclePhase, PredictionEvent, SystemEvent},
    road::RoadType,
    telemetry::PerformanceSample,
};
use tokio::sync::watch;

const MAX_LOG_ENTRIES: usize = 120;

pub enum UiMessage {
    Event(SystemEvent),
    Shutdown,
}

/// What the screen shows, folded from the event stream.
#[derive(Debug, Clone)]
struct ViewState {
    label: RoadType,
    running: bool,
    status: String,
    performance: Option<PerformanceSample>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            label: RoadType::Unknown,
            running: false,
            status: "Idle".into(),
            performance: None,
        }
    }
}

impl ViewState {
    fn apply(&mut self, event: &SystemEvent) {
        match &event.payload {
            EventPayload::Lifecycle(lifecycle) => match lifecycle.phase {
                LifecyclePhase::InferenceStarted => {
                    self.running = true;
                    self.status = "Processing...".into();
                }
                LifecyclePhase::InferenceStopped => {
                    self.running = false;
                    self.status = "Stopped".into();
                }
                phase => self.status = format!("{:?}", phase),
            },
            EventPayload::Prediction(PredictionEvent::Classified {
                prediction,
                performance,
                ..
            }) => {
                self.label = prediction.label;
                self.performance = Some(performance.clone());
            }
            EventPayload::Prediction(PredictionEvent::Failed { reason, .. }) => {
                self.label = RoadType::Unknown;
                self.status = format!("Error: {reason}");
            }
            EventPayload::Prediction(PredictionEvent::Reset) => {
                self.label = RoadType::Unknown;
                self.performance = None;
            }
            EventPayload::Ops(ops) => self.status = ops.message.clone(),
        }
    }
}

pub fn run(
    receiver: Receiver<UiMessage>,
    control: watch::Sender<SamplerState>,
    summary: String,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = run_loop(&mut terminal, receiver, &control, summary.as_str());

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    res
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    receiver: Receiver<UiMessage>,
    control: &watch::Sender<SamplerState>,
    summary: &str,
) -> Result<()> {
    let mut logs: VecDeque<String> = VecDeque::with_capacity(MAX_LOG_ENTRIES);
    let mut view = ViewState::default();
    let mut should_close = false;

    loop {
        loop {
            match receiver.try_recv() {
                Ok(UiMessage::Event(event)) => {
                    view.apply(&event);
                    if logs.len() == MAX_LOG_ENTRIES {
                        logs.pop_front();
                    }
                    logs.push_back(format_event(&event));
                }
                Ok(UiMessage::Shutdown) | Err(TryRecvError::Disconnected) => {
                    should_close = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints(
                    [
                        Constraint::Length(3),
                        Constraint::Length(7),
                        Constraint::Min(0),
                    ]
                    .as_ref(),
                )
                .split(f.size());

            let button = if view.running { "stop" } else { "start" };
            let header = Paragraph::new(Line::from(vec![
                Span::styled(
                    "Roadscan",
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::raw(view.status.clone()),
                Span::raw("  "),
                Span::styled("pipeline:", Style::default().fg(Color::Magenta)),
                Span::raw(" "),
                Span::raw(summary),
                Span::raw("  "),
                Span::styled("space", Style::default().fg(Color::Yellow)),
                Span::raw(format!(" {button}  ")),
                Span::styled("q", Style::default().fg(Color::Yellow)),
                Span::raw(" quit"),
            ]))
            .block(Block::default().borders(Borders::ALL).title("Status"));
            f.render_widget(header, chunks[0]);

            let mut lines = vec![Line::from(vec![
                Span::raw("Road type: "),
                Span::styled(
                    view.label.display_name(),
                    Style::default()
                        .fg(label_color(view.label))
                        .add_modifier(Modifier::BOLD),
                ),
            ])];
            match &view.performance {
                Some(sample) => {
                    lines.extend(sample.to_string().lines().map(|l| Line::from(l.to_string())))
                }
                None => lines.push(Line::from("No measurements yet")),
            }
            let prediction = Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Prediction"));
            f.render_widget(prediction, chunks[1]);

            let items: Vec<ListItem> = logs
                .iter()
                .rev()
                .map(|entry| ListItem::new(entry.clone()))
                .collect();
            let list = List::new(items)
                .block(Block::default().borders(Borders::ALL).title("Recent events"));
            f.render_widget(list, chunks[2]);
        })?;

        if should_close {
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char(' ') => control.send_modify(|state| *state = state.toggled()),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn label_color(label: RoadType) -> Color {
    match label {
        RoadType::Asphalt => Color::Gray,
        RoadType::Concrete => Color::White,
        RoadType::Gravel => Color::Yellow,
        RoadType::Dirt => Color::LightRed,
        RoadType::Unknown => Color::DarkGray,
    }
}

fn format_event(event: &SystemEvent) -> String {
    let timestamp = event.timestamp.format("%H:%M:%S");
    match &event.payload {
        EventPayload::Lifecycle(lifecycle) => format!(
            "[{}] Lifecycle::{:?} {}",
            timestamp,
            lifecycle.phase,
            lifecycle.details.clone().unwrap_or_default()
        ),
        EventPayload::Prediction(PredictionEvent::Classified {
            prediction,
            position_ms,
            ..
        }) => format!(
            "[{}] {} at {}ms ({:.1} ms)",
            timestamp, prediction.label, position_ms, prediction.inference_ms
        ),
        EventPayload::Prediction(PredictionEvent::Failed {
            position_ms,
            reason,
        }) => format!("[{}] Failed at {}ms: {}", timestamp, position_ms, reason),
        EventPayload::Prediction(PredictionEvent::Reset) => {
            format!("[{}] Label reset", timestamp)
        }
        EventPayload::Ops(ops) => format!(
            "[{}] Ops {} [{}]",
            timestamp,
            ops.message,
            ops.tags.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadscan_types::{road::Prediction, tensor::ScoreVector};

    fn classified(label: RoadType) -> SystemEvent {
        let mut scores = [0.0; RoadType::COUNT];
        scores[label.index()] = 1.0;
        SystemEvent::prediction(PredictionEvent::Classified {
            prediction: Prediction {
                label,
                scores: ScoreVector::new(scores),
                inference_ms: 3.0,
            },
            position_ms: 1_000,
            performance: PerformanceSample::inference_only(3.0),
        })
    }

    #[test]
    fn view_follows_lifecycle_and_predictions() {
        let mut view = ViewState::default();
        view.apply(&SystemEvent::lifecycle(LifecyclePhase::InferenceStarted, None));
        assert!(view.running);
        assert_eq!(view.status, "Processing...");

        view.apply(&classified(RoadType::Gravel));
        assert_eq!(view.label, RoadType::Gravel);
        assert!(view.performance.is_some());

        view.apply(&SystemEvent::prediction(PredictionEvent::Failed {
            position_ms: 1_500,
            reason: "decode".into(),
        }));
        assert_eq!(view.label, RoadType::Unknown);

        view.apply(&classified(RoadType::Dirt));
        view.apply(&SystemEvent::lifecycle(LifecyclePhase::InferenceStopped, None));
        view.apply(&SystemEvent::prediction(PredictionEvent::Reset));
        assert!(!view.running);
        assert_eq!(view.label, RoadType::Unknown);
        assert!(view.performance.is_none());
    }

    #[test]
    fn formats_classified_events() {
        let line = format_event(&classified(RoadType::Asphalt));
        assert!(line.ends_with("Asphalt at 1000ms (3.0 ms)"), "{line}");
    }
}
