use std::time::{Duration, Instant};

/// Playback position of a video that is played, paused and optionally looped.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    duration_ms: Option<u64>,
    looping: bool,
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl PlaybackClock {
    pub fn new(duration_ms: Option<u64>, looping: bool) -> Self {
        Self {
            duration_ms: duration_ms.filter(|d| *d > 0),
            looping,
            accumulated: Duration::ZERO,
            started_at: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn play(&mut self) {
        self.play_at(Instant::now());
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn position_ms(&self) -> u64 {
        self.position_at(Instant::now())
    }

    pub fn play_at(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause_at(&mut self, now: Instant) {
        if let Some(started) = self.started_at.take() {
            self.accumulated += now.saturating_duration_since(started);
        }
    }

    pub fn position_at(&self, now: Instant) -> u64 {
        let running = self
            .started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let elapsed = (self.accumulated + running).as_millis() as u64;
        match self.duration_ms {
            Some(duration) if self.looping => elapsed % duration,
            Some(duration) => elapsed.min(duration),
            None => elapsed,
        }
    }
}
