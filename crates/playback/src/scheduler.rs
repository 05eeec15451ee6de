use model::StopIndexSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trip_core::{Clock, PlaybackEvent, PlaybackState};

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 5.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// time between advances at 1x
    pub base_interval_ms: u64,
    /// pause on arriving at a stop at 1x
    pub dwell_pause_ms: u64,
    pub speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { base_interval_ms: 30, dwell_pause_ms: 1000, speed: 1.0 }
    }
}

/// Position-advance state machine over a normalized route.
///
/// Time only enters through the injected [`Clock`]: callers invoke
/// [`poll`](Self::poll) whenever [`next_deadline`](Self::next_deadline) is
/// due, and every due deadline is processed at its own timestamp, so a late
/// poll replays the same sequence an on-time one would have.
pub struct PlaybackScheduler<C: Clock> {
    clock: C,
    cfg: PlaybackConfig,
    len: usize,
    stops: StopIndexSet,
    position: usize,
    state: PlaybackState,
    speed: f64,
    deadline: Option<Duration>,
    events: Vec<PlaybackEvent>,
}

impl<C: Clock> PlaybackScheduler<C> {
    pub fn new(clock: C, cfg: PlaybackConfig, len: usize, stops: StopIndexSet) -> Self {
        let speed = clamp_speed(cfg.speed).unwrap_or(1.0);
        Self {
            clock,
            cfg,
            len,
            stops,
            position: 0,
            state: PlaybackState::Stopped,
            speed,
            deadline: None,
            events: Vec::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::PausedAtStop => {
                self.set_state(PlaybackState::Playing);
                self.deadline = Some(self.clock.now() + self.interval());
            }
            PlaybackState::Stopped => {
                if self.len == 0 || self.position >= self.len - 1 {
                    log::debug!("play ignored at position {} of {}", self.position, self.len);
                    return;
                }
                self.set_state(PlaybackState::Playing);
                self.deadline = Some(self.clock.now() + self.interval());
            }
        }
    }

    /// Manual pause; also cancels a pending resume after a stop.
    pub fn pause(&mut self) {
        self.deadline = None;
        self.set_state(PlaybackState::Stopped);
    }

    pub fn seek(&mut self, percentage: f64) {
        if self.len == 0 {
            return;
        }
        let pct = if percentage.is_nan() { 0.0 } else { percentage.clamp(0.0, 100.0) };
        let target = (pct / 100.0 * (self.len - 1) as f64).round() as usize;
        self.move_to(target);
    }

    pub fn next(&mut self) {
        if self.len == 0 {
            return;
        }
        let target = self.stops.next_after(self.position).unwrap_or(self.len - 1);
        self.move_to(target);
    }

    pub fn previous(&mut self) {
        let target = self.stops.previous_before(self.position).unwrap_or(0);
        self.move_to(target);
    }

    pub fn reset(&mut self) {
        self.move_to(0);
    }

    /// Clamps to [0.5, 5]; a pending tick or resume is rescaled in place.
    pub fn set_speed(&mut self, factor: f64) {
        let Some(speed) = clamp_speed(factor) else {
            return;
        };
        if let Some(deadline) = self.deadline {
            let now = self.clock.now();
            let remaining = deadline.saturating_sub(now);
            let nanos = (remaining.as_nanos() as f64 * self.speed / speed).round() as u64;
            self.deadline = Some(now + Duration::from_nanos(nanos));
        }
        self.speed = speed;
    }

    /// Processes every deadline that is due at the current clock reading.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        // at most one firing per point plus one resume per stop
        let mut budget = 2 * self.len + 2;
        while let Some(at) = self.deadline {
            if at > now || budget == 0 {
                break;
            }
            budget -= 1;
            self.fire(at);
        }
    }

    fn fire(&mut self, at: Duration) {
        match self.state {
            PlaybackState::Playing => self.tick(at),
            PlaybackState::PausedAtStop => {
                self.set_state(PlaybackState::Playing);
                self.deadline = Some(at + self.interval());
            }
            PlaybackState::Stopped => self.deadline = None,
        }
    }

    fn tick(&mut self, at: Duration) {
        if self.position + 1 >= self.len {
            self.finish();
            return;
        }
        self.position += 1;
        self.events.push(PlaybackEvent::Moved { position: self.position });

        if self.position == self.len - 1 {
            self.finish();
        } else if self.stops.contains(self.position) {
            self.set_state(PlaybackState::PausedAtStop);
            self.deadline = Some(at + self.dwell());
        } else {
            self.deadline = Some(at + self.interval());
        }
    }

    fn finish(&mut self) {
        self.deadline = None;
        self.set_state(PlaybackState::Stopped);
        self.events.push(PlaybackEvent::ReachedEnd { position: self.position });
    }

    fn move_to(&mut self, target: usize) {
        let target = target.min(self.len.saturating_sub(1));
        if target != self.position {
            self.position = target;
            self.events.push(PlaybackEvent::Moved { position: target });
        }
    }

    fn set_state(&mut self, to: PlaybackState) {
        if self.state != to {
            self.events.push(PlaybackEvent::StateChanged { from: self.state, to });
            self.state = to;
        }
    }

    fn interval(&self) -> Duration {
        scaled(self.cfg.base_interval_ms, self.speed)
    }

    fn dwell(&self) -> Duration {
        scaled(self.cfg.dwell_pause_ms, self.speed)
    }
}

fn scaled(ms: u64, speed: f64) -> Duration {
    Duration::from_nanos((ms as f64 * 1e6 / speed).round() as u64)
}

fn clamp_speed(factor: f64) -> Option<f64> {
    if factor.is_nan() {
        None
    } else {
        Some(factor.clamp(MIN_SPEED, MAX_SPEED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trip_core::ManualClock;

    const TICK: Duration = Duration::from_millis(30);
    const DWELL: Duration = Duration::from_millis(1000);

    fn scheduler(len: usize, stops: &[usize]) -> (PlaybackScheduler<ManualClock>, ManualClock) {
        let mut set = StopIndexSet::new();
        for (i, p) in stops.iter().enumerate() {
            set.push(*p, i);
        }
        let clock = ManualClock::new();
        (PlaybackScheduler::new(clock.clone(), PlaybackConfig::default(), len, set), clock)
    }

    fn step(s: &mut PlaybackScheduler<ManualClock>, clock: &ManualClock, by: Duration) {
        clock.advance(by);
        s.poll();
    }

    #[test]
    fn test_play_advances_one_point_per_interval() {
        let (mut s, clock) = scheduler(10, &[]);
        s.play();
        assert_eq!(s.state(), PlaybackState::Playing);
        step(&mut s, &clock, TICK);
        assert_eq!(s.position(), 1);
        step(&mut s, &clock, TICK * 3);
        assert_eq!(s.position(), 4);
    }

    #[test]
    fn test_pause_stops_advancing() {
        let (mut s, clock) = scheduler(10, &[]);
        s.play();
        step(&mut s, &clock, TICK);
        s.pause();
        step(&mut s, &clock, TICK * 5);
        assert_eq!(s.position(), 1);
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_reaching_the_end_stops() {
        let (mut s, clock) = scheduler(4, &[]);
        s.play();
        step(&mut s, &clock, TICK * 10);
        assert_eq!(s.position(), 3);
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert!(s.take_events().contains(&PlaybackEvent::ReachedEnd { position: 3 }));

        s.play();
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_stop_pauses_then_resumes() {
        let (mut s, clock) = scheduler(10, &[2]);
        s.play();
        step(&mut s, &clock, TICK * 2);
        assert_eq!(s.position(), 2);
        assert_eq!(s.state(), PlaybackState::PausedAtStop);

        step(&mut s, &clock, DWELL - Duration::from_millis(1));
        assert_eq!(s.state(), PlaybackState::PausedAtStop);
        assert_eq!(s.position(), 2);

        step(&mut s, &clock, Duration::from_millis(1));
        assert_eq!(s.state(), PlaybackState::Playing);
        step(&mut s, &clock, TICK);
        assert_eq!(s.position(), 3);
    }

    #[test]
    fn test_manual_pause_during_dwell_wins() {
        let (mut s, clock) = scheduler(10, &[2]);
        s.play();
        step(&mut s, &clock, TICK * 2);
        assert_eq!(s.state(), PlaybackState::PausedAtStop);
        s.pause();
        step(&mut s, &clock, DWELL * 3);
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert_eq!(s.position(), 2);

        s.play();
        step(&mut s, &clock, TICK);
        assert_eq!(s.position(), 3);
    }

    #[test]
    fn test_seek_bounds() {
        let (mut s, _clock) = scheduler(11, &[]);
        s.seek(0.0);
        assert_eq!(s.position(), 0);
        s.seek(100.0);
        assert_eq!(s.position(), 10);
        s.seek(45.0);
        assert_eq!(s.position(), 5);
        s.seek(250.0);
        assert_eq!(s.position(), 10);
        s.seek(-3.0);
        assert_eq!(s.position(), 0);
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_seek_keeps_play_state() {
        let (mut s, clock) = scheduler(11, &[]);
        s.play();
        s.seek(50.0);
        assert_eq!(s.state(), PlaybackState::Playing);
        step(&mut s, &clock, TICK);
        assert_eq!(s.position(), 6);
    }

    #[test]
    fn test_next_and_previous_jump_between_stops() {
        let (mut s, _clock) = scheduler(20, &[4, 9]);
        s.next();
        assert_eq!(s.position(), 4);
        s.next();
        assert_eq!(s.position(), 9);
        s.next();
        assert_eq!(s.position(), 19);
        s.next();
        assert_eq!(s.position(), 19);
        s.previous();
        assert_eq!(s.position(), 9);
        s.seek(10.0);
        assert_eq!(s.position(), 2);
        s.previous();
        assert_eq!(s.position(), 0);
        s.previous();
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn test_reset_keeps_state() {
        let (mut s, clock) = scheduler(10, &[]);
        s.play();
        step(&mut s, &clock, TICK * 3);
        s.reset();
        assert_eq!(s.position(), 0);
        assert_eq!(s.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_speed_rescales_pending_deadline() {
        let (mut s, clock) = scheduler(10, &[]);
        s.play();
        s.set_speed(3.0);
        assert_eq!(s.next_deadline(), Some(Duration::from_millis(10)));
        step(&mut s, &clock, Duration::from_millis(10));
        assert_eq!(s.position(), 1);
        assert_eq!(s.next_deadline(), Some(Duration::from_millis(20)));

        s.set_speed(50.0);
        assert_eq!(s.speed(), MAX_SPEED);
        s.set_speed(0.1);
        assert_eq!(s.speed(), MIN_SPEED);
        s.set_speed(f64::NAN);
        assert_eq!(s.speed(), MIN_SPEED);
    }

    #[test]
    fn test_speed_shortens_dwell() {
        let (mut s, clock) = scheduler(10, &[1]);
        s.set_speed(2.0);
        s.play();
        step(&mut s, &clock, TICK / 2);
        assert_eq!(s.state(), PlaybackState::PausedAtStop);
        step(&mut s, &clock, DWELL / 2);
        assert_eq!(s.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_empty_route_never_moves() {
        let (mut s, clock) = scheduler(0, &[]);
        s.play();
        s.seek(50.0);
        s.next();
        s.previous();
        s.reset();
        step(&mut s, &clock, DWELL);
        assert_eq!(s.position(), 0);
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_position_stays_in_bounds_under_mixed_operations() {
        let (mut s, clock) = scheduler(7, &[1, 3, 5]);
        for round in 0..60 {
            match round % 7 {
                0 => s.play(),
                1 => s.next(),
                2 => s.seek((round * 13 % 120) as f64),
                3 => s.previous(),
                4 => s.set_speed(round as f64 / 10.0),
                5 => s.pause(),
                _ => s.reset(),
            }
            step(&mut s, &clock, Duration::from_millis(round * 17));
            assert!(s.position() < 7);
        }
    }
}
