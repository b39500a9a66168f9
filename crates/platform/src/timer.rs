use std::time::{Duration, Instant};

/// Frame clock: time since start, delta since the previous tick, and a
/// once-per-second frame rate sample.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last: Instant,
    frame: u64,
    window_start: Instant,
    window_frames: u32,
}

/// One tick of [`FrameTimer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    pub time: f32,
    pub delta: f32,
    pub frame: u64,
    /// Frames per second, reported once the sampling window closes.
    pub fps: Option<f32>,
}

const FPS_WINDOW: Duration = Duration::from_secs(1);

impl FrameTimer {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frame: 0,
            window_start: start,
            window_frames: 0,
        }
    }

    pub fn tick(&mut self) -> Tick {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> Tick {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        self.frame += 1;
        self.window_frames += 1;

        let window = now.saturating_duration_since(self.window_start);
        let fps = (window >= FPS_WINDOW).then(|| {
            let fps = self.window_frames as f32 / window.as_secs_f32();
            self.window_start = now;
            self.window_frames = 0;
            fps
        });

        Tick {
            time: now.saturating_duration_since(self.start).as_secs_f32(),
            delta,
            frame: self.frame,
            fps,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_and_time_accumulate() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::starting_at(t0);
        let a = timer.tick_at(t0 + Duration::from_millis(16));
        let b = timer.tick_at(t0 + Duration::from_millis(48));
        assert!((a.delta - 0.016).abs() < 1e-6);
        assert!((b.delta - 0.032).abs() < 1e-6);
        assert!((b.time - 0.048).abs() < 1e-6);
        assert_eq!(b.frame, 2);
    }

    #[test]
    fn fps_reported_once_per_window() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::starting_at(t0);
        let mut reports = Vec::new();
        for i in 1..=90 {
            let tick = timer.tick_at(t0 + Duration::from_millis(i * 25));
            reports.extend(tick.fps);
        }
        // 90 frames over 2.25s: two full windows of 40 frames each
        assert_eq!(reports.len(), 2);
        assert!((reports[0] - 40.0).abs() < 1e-3);
    }
}
