use std::thread;
use std::time::{Duration, Instant};

/// Wall-clock frame budget. Each call to [`FramePacer::wait`] sleeps whatever is left of the
/// current frame; a frame that already overran does not sleep at all.
pub struct FramePacer {
    frame: Duration,
    frame_start: Instant,
}

impl FramePacer {
    pub fn new(frames_per_sec: u32) -> Self {
        Self {
            frame: Duration::from_secs(1) / frames_per_sec.max(1),
            frame_start: Instant::now(),
        }
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    pub fn remaining(&self) -> Duration {
        self.frame.saturating_sub(self.frame_start.elapsed())
    }

    pub fn wait(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
        self.frame_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_out_the_frame() {
        let mut pacer = FramePacer::new(50);
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn overrun_frames_do_not_sleep() {
        let mut pacer = FramePacer::new(1000);
        thread::sleep(Duration::from_millis(5));
        assert!(pacer.remaining().is_zero());

        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn zero_rate_is_clamped() {
        assert_eq!(FramePacer::new(0).frame_duration(), Duration::from_secs(1));
    }
}
