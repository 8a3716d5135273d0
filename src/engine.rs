use crate::config::{MIN_SLOWDOWN, PlayerConfig};
use crate::events::{InputEvent, InputQueue};
use crate::midi::{Event, EventKind, MidiFile};
use crate::timing::FramePacer;
use crate::ui::{Frame, Renderer};
use std::collections::BTreeSet;
use tracing::{info, trace};

const SCORE_GAIN: f64 = 300.0;
const SCORE_LOSS: f64 = 50.0;

#[derive(Debug, Clone)]
struct PlaybackState {
    current_tick: u64,
    next_event_index: usize,
    /// Ticks still to go before the event at `next_event_index` fires.
    pending_delta: u64,
    note_on_time: [Option<u64>; 256],
    score: i64,
    active_input_notes: BTreeSet<u8>,
}

/// Plays one track of a [`MidiFile`] against live input and keeps score.
pub struct Waterfall<'a> {
    file: &'a MidiFile,
    track: &'a [Event],
    track_index: Option<usize>,
    config: PlayerConfig,
    state: PlaybackState,
}

impl<'a> Waterfall<'a> {
    /// Starts a session on the track with the most events (the first one if several tie).
    pub fn new(file: &'a MidiFile, config: &PlayerConfig) -> Self {
        let (track_index, track) = match file.longest_track() {
            Some((index, track)) => (Some(index), track.events.as_slice()),
            None => (None, &[][..]),
        };
        info!(track = ?track_index, events = track.len(), "starting playback session");
        Self {
            file,
            track,
            track_index,
            config: config.clone(),
            state: PlaybackState {
                current_tick: 0,
                next_event_index: 0,
                pending_delta: track.first().map_or(0, |event| event.delta as u64),
                note_on_time: [None; 256],
                score: 0,
                active_input_notes: BTreeSet::new(),
            },
        }
    }

    pub fn track_index(&self) -> Option<usize> {
        self.track_index
    }

    pub fn current_tick(&self) -> u64 {
        self.state.current_tick
    }

    pub fn next_event_index(&self) -> usize {
        self.state.next_event_index
    }

    pub fn note_on_time(&self, note: u8) -> Option<u64> {
        self.state.note_on_time[note as usize]
    }

    pub fn score(&self) -> i64 {
        self.state.score
    }

    pub fn active_notes(&self) -> &BTreeSet<u8> {
        &self.state.active_input_notes
    }

    pub fn end_of_song(&self) -> bool {
        self.state.next_event_index >= self.track.len()
    }

    /// Moves playback forward by `ticks`, firing every event that comes due on the way.
    /// An event that is not yet due keeps the remainder of its delta for the next call.
    pub fn advance(&mut self, mut ticks: u64) {
        let track = self.track;
        let state = &mut self.state;
        while let Some(event) = track.get(state.next_event_index) {
            if state.pending_delta > ticks {
                state.pending_delta -= ticks;
                state.current_tick += ticks;
                return;
            }
            state.current_tick += state.pending_delta;
            ticks -= state.pending_delta;
            state.next_event_index += 1;
            state.pending_delta = track
                .get(state.next_event_index)
                .map_or(0, |next| next.delta as u64);

            match event.kind {
                EventKind::NoteOn { note, .. } => {
                    state.note_on_time[note as usize] = Some(state.current_tick)
                }
                EventKind::NoteOff { note, .. } => state.note_on_time[note as usize] = None,
                EventKind::Meta { .. } | EventKind::Ignored { .. } => {}
            }
        }
    }

    /// Rewards notes that are both expected and held, penalizes expected-but-missing and
    /// held-but-unexpected notes. Slower playback visits each note for more frames, so the
    /// amounts shrink with the square of the slowdown.
    pub fn update_score(&mut self, slowdown: f64) {
        let slowdown = slowdown.max(MIN_SLOWDOWN);
        let factor = slowdown * slowdown;
        let gain = ((SCORE_GAIN / factor).round() as i64).max(1);
        let loss = ((SCORE_LOSS / factor).round() as i64).max(1);

        let state = &mut self.state;
        for (note, on_time) in state.note_on_time.iter().enumerate() {
            let expected = on_time.is_some();
            let held = state.active_input_notes.contains(&(note as u8));
            match (expected, held) {
                (true, true) => state.score = state.score.saturating_add(gain),
                (true, false) | (false, true) => state.score = state.score.saturating_sub(loss),
                (false, false) => {}
            }
        }
    }

    pub fn apply_input(&mut self, event: InputEvent) {
        if event.is_press() {
            self.state.active_input_notes.insert(event.note);
        } else {
            self.state.active_input_notes.remove(&event.note);
        }
    }

    /// Holding exactly the lowest and highest keys asks to leave the song.
    pub fn menu_requested(&self) -> bool {
        let active = &self.state.active_input_notes;
        active.len() == 2
            && active.contains(&self.config.lowest_note)
            && active.contains(&self.config.highest_note)
    }

    pub fn tick_delta(&self, slowdown: f64) -> u64 {
        let ticks_per_second = self.file.tempo.lookup(self.state.current_tick);
        let ticks = ticks_per_second / self.config.frames_per_sec.max(1) as f64 / slowdown;
        (ticks.round() as u64).max(1)
    }

    pub fn frame(&self) -> Frame<'_> {
        Frame {
            current_tick: self.state.current_tick,
            ticks_shown: self.config.ticks_shown,
            note_on_time: &self.state.note_on_time,
            active_notes: &self.state.active_input_notes,
            score: self.state.score,
            upcoming: &self.track[self.state.next_event_index.min(self.track.len())..],
            pending_delta: self.state.pending_delta,
        }
    }

    /// Runs the frame loop until the song ends or the player holds the escape gesture.
    /// Returns the score, which carries over if the session is resumed.
    pub fn play<R: Renderer + ?Sized>(
        &mut self,
        slowdown: f64,
        input: &mut InputQueue,
        renderer: &mut R,
    ) -> i64 {
        let slowdown = slowdown.max(MIN_SLOWDOWN);
        let mut pacer = FramePacer::new(self.config.frames_per_sec);
        self.state.active_input_notes.clear();

        while !self.end_of_song() {
            for event in input.drain() {
                self.apply_input(event);
            }
            if self.menu_requested() {
                info!(score = self.state.score, tick = self.state.current_tick, "leaving song");
                return self.state.score;
            }

            self.update_score(slowdown);
            renderer.render(&self.frame());
            pacer.wait();

            let ticks = self.tick_delta(slowdown);
            trace!(tick = self.state.current_tick, ticks, score = self.state.score, "frame");
            self.advance(ticks);
        }

        info!(score = self.state.score, "song finished");
        self.state.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::input_queue;
    use crate::midi::{Division, Format, Header, Track};

    fn note_on(delta: u32, note: u8) -> Event {
        Event::new(
            delta,
            EventKind::NoteOn {
                channel: 0,
                note,
                velocity: 100,
            },
        )
    }

    fn note_off(delta: u32, note: u8) -> Event {
        Event::new(
            delta,
            EventKind::NoteOff {
                channel: 0,
                note,
                velocity: 0,
            },
        )
    }

    fn file(tracks: Vec<Vec<Event>>) -> MidiFile {
        let header = Header {
            format: Format::Parallel,
            track_count: tracks.len() as u16,
            division: Division::Metrical(480),
        };
        MidiFile::new(header, tracks.into_iter().map(Track::new).collect())
    }

    fn fast_config() -> PlayerConfig {
        PlayerConfig {
            frames_per_sec: 1000,
            ..PlayerConfig::default()
        }
    }

    #[test]
    fn advance_fires_events_exactly_when_due() {
        let file = file(vec![vec![note_on(100, 60), note_off(50, 60)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());

        waterfall.advance(60);
        assert_eq!(waterfall.current_tick(), 60);
        assert_eq!(waterfall.note_on_time(60), None);

        waterfall.advance(40);
        assert_eq!(waterfall.current_tick(), 100);
        assert_eq!(waterfall.note_on_time(60), Some(100));

        waterfall.advance(50);
        assert_eq!(waterfall.current_tick(), 150);
        assert_eq!(waterfall.note_on_time(60), None);
        assert!(waterfall.end_of_song());
    }

    #[test]
    fn advance_can_span_many_events() {
        let file = file(vec![vec![
            note_on(10, 60),
            note_on(0, 64),
            note_off(10, 60),
            note_on(5, 67),
            note_off(100, 64),
        ]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());

        waterfall.advance(30);
        assert_eq!(waterfall.current_tick(), 30);
        assert_eq!(waterfall.next_event_index(), 4);
        assert_eq!(waterfall.note_on_time(60), None);
        assert_eq!(waterfall.note_on_time(64), Some(10));
        assert_eq!(waterfall.note_on_time(67), Some(25));
    }

    #[test]
    fn zero_tick_advance_only_fires_due_events() {
        let file = file(vec![vec![note_on(0, 60), note_on(0, 62), note_on(10, 64)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());

        waterfall.advance(0);
        assert_eq!(waterfall.current_tick(), 0);
        assert_eq!(waterfall.next_event_index(), 2);
        assert_eq!(waterfall.note_on_time(62), Some(0));
        assert_eq!(waterfall.note_on_time(64), None);
    }

    #[test]
    fn advance_ignores_meta_events() {
        let meta = Event::new(
            20,
            EventKind::Meta {
                kind: 0x51,
                data: vec![0x07, 0xA1, 0x20],
            },
        );
        let file = file(vec![vec![note_on(10, 60), meta, note_off(10, 60)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());

        waterfall.advance(30);
        assert_eq!(waterfall.next_event_index(), 2);
        assert_eq!(waterfall.note_on_time(60), Some(10));
    }

    #[test]
    fn end_of_song_only_after_last_event() {
        let file = file(vec![vec![note_on(5, 60), note_off(5, 60), note_on(5, 62)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());

        for index in 0..3 {
            assert_eq!(waterfall.next_event_index(), index);
            assert!(!waterfall.end_of_song());
            waterfall.advance(5);
        }
        assert_eq!(waterfall.next_event_index(), 3);
        assert!(waterfall.end_of_song());

        // Advancing past the end is a no-op.
        waterfall.advance(1000);
        assert_eq!(waterfall.current_tick(), 15);
    }

    #[test]
    fn empty_file_is_immediately_over() {
        let file = file(vec![]);
        let waterfall = Waterfall::new(&file, &PlayerConfig::default());

        assert_eq!(waterfall.track_index(), None);
        assert!(waterfall.end_of_song());
    }

    #[test]
    fn plays_the_longest_track() {
        let file = file(vec![
            vec![note_on(0, 1)],
            vec![note_on(0, 2), note_off(1, 2)],
            vec![note_on(0, 3), note_off(1, 3)],
        ]);
        let waterfall = Waterfall::new(&file, &PlayerConfig::default());

        assert_eq!(waterfall.track_index(), Some(1));
    }

    #[test]
    fn holding_expected_note_scores_better_than_holding_nothing() {
        let file = file(vec![vec![note_on(0, 60), note_off(1000, 60)]]);

        for slowdown in [0.5, 1.0, 3.0, 50.0] {
            let mut holding = Waterfall::new(&file, &PlayerConfig::default());
            holding.advance(0);
            holding.apply_input(InputEvent::press(60, 90));

            let mut idle = Waterfall::new(&file, &PlayerConfig::default());
            idle.advance(0);

            for _ in 0..10 {
                holding.update_score(slowdown);
                idle.update_score(slowdown);
            }
            assert!(holding.score() > idle.score(), "slowdown {slowdown}");
        }
    }

    #[test]
    fn score_amounts_scale_with_slowdown() {
        let file = file(vec![vec![note_on(0, 60), note_off(1000, 60)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());
        waterfall.advance(0);

        waterfall.update_score(1.0);
        assert_eq!(waterfall.score(), -50);

        waterfall.apply_input(InputEvent::press(60, 90));
        waterfall.update_score(1.0);
        assert_eq!(waterfall.score(), -50 + 300);

        waterfall.update_score(2.0);
        assert_eq!(waterfall.score(), -50 + 300 + 75);

        // Wrong key at half speed: 50 / 4 = 12.5 rounds to 13.
        waterfall.apply_input(InputEvent::release(60));
        waterfall.apply_input(InputEvent::press(61, 90));
        waterfall.update_score(2.0);
        assert_eq!(waterfall.score(), -50 + 300 + 75 - 13 - 13);

        // Amounts never drop below one point.
        waterfall.apply_input(InputEvent::release(61));
        waterfall.update_score(100.0);
        assert_eq!(waterfall.score(), -50 + 300 + 75 - 13 - 13 - 1);
    }

    #[test]
    fn tiny_slowdown_is_clamped_when_scoring() {
        let file = file(vec![vec![note_on(0, 60), note_off(1000, 60)]]);
        let mut holding = Waterfall::new(&file, &PlayerConfig::default());
        holding.advance(0);
        holding.apply_input(InputEvent::press(60, 90));
        let mut idle = Waterfall::new(&file, &PlayerConfig::default());
        idle.advance(0);

        for _ in 0..3 {
            holding.update_score(1e-9);
            idle.update_score(1e-9);
        }

        // Scored as if at the minimum slowdown: 300 / 0.01 and 50 / 0.01 per call.
        assert_eq!(holding.score(), 3 * 30_000);
        assert_eq!(idle.score(), -3 * 5_000);
        assert!(holding.score() > idle.score());
    }

    #[test]
    fn score_saturates_instead_of_overflowing() {
        let file = file(vec![vec![note_on(0, 60), note_off(1000, 60)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());
        waterfall.advance(0);
        waterfall.apply_input(InputEvent::press(60, 90));
        waterfall.state.score = i64::MAX - 1;

        waterfall.update_score(1.0);
        assert_eq!(waterfall.score(), i64::MAX);

        waterfall.apply_input(InputEvent::release(60));
        waterfall.state.score = i64::MIN + 1;
        waterfall.update_score(1.0);
        assert_eq!(waterfall.score(), i64::MIN);
    }

    #[test]
    fn escape_gesture_needs_exactly_both_extremes() {
        let file = file(vec![vec![note_on(0, 60)]]);
        let mut waterfall = Waterfall::new(&file, &PlayerConfig::default());

        waterfall.apply_input(InputEvent::press(36, 90));
        assert!(!waterfall.menu_requested());
        waterfall.apply_input(InputEvent::press(96, 90));
        assert!(waterfall.menu_requested());
        waterfall.apply_input(InputEvent::press(60, 90));
        assert!(!waterfall.menu_requested());
        waterfall.apply_input(InputEvent::release(60));
        assert!(waterfall.menu_requested());
    }

    #[test]
    fn tick_delta_follows_tempo_and_slowdown() {
        let file = file(vec![vec![note_on(0, 60)]]);
        let waterfall = Waterfall::new(&file, &PlayerConfig::default());

        // 480 ticks per quarter at 2 quarters per second, 15 frames per second.
        assert_eq!(waterfall.tick_delta(1.0), 64);
        assert_eq!(waterfall.tick_delta(2.0), 32);
        assert_eq!(waterfall.tick_delta(1000.0), 1);
    }

    #[test]
    fn escape_gesture_stops_play_without_rendering() {
        let file = file(vec![vec![note_on(0, 60), note_off(1000, 60)]]);
        let mut waterfall = Waterfall::new(&file, &fast_config());
        waterfall.advance(0);
        waterfall.update_score(1.0);

        let (mut producer, mut input) = input_queue(8);
        producer.push(InputEvent::press(36, 90));
        producer.push(InputEvent::press(96, 90));

        let mut frames = 0;
        let score = waterfall.play(1.0, &mut input, &mut |_: &Frame<'_>| frames += 1);

        assert_eq!(frames, 0);
        // Score from before the call carries over.
        assert_eq!(score, -50);
        assert!(!waterfall.end_of_song());
    }

    #[test]
    fn play_runs_to_end_of_song() {
        let file = file(vec![vec![note_on(20, 60), note_off(100, 60)]]);
        let (_producer, mut input) = input_queue(8);

        let mut waterfall = Waterfall::new(&file, &fast_config());
        let mut ticks = Vec::new();
        let score = waterfall.play(0.1, &mut input, &mut |frame: &Frame<'_>| {
            ticks.push(frame.current_tick)
        });

        assert!(waterfall.end_of_song());
        assert!(score < 0);
        assert_eq!(ticks.first(), Some(&0));
        assert!(ticks.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn playing_along_beats_sitting_idle() {
        let file = file(vec![vec![note_on(20, 60), note_off(100, 60)]]);

        let (_idle_producer, mut idle_input) = input_queue(8);
        let idle_score = Waterfall::new(&file, &fast_config()).play(
            0.1,
            &mut idle_input,
            &mut |_: &Frame<'_>| {},
        );

        let (mut producer, mut input) = input_queue(8);
        producer.push(InputEvent::press(60, 90));
        let held_score =
            Waterfall::new(&file, &fast_config()).play(0.1, &mut input, &mut |_: &Frame<'_>| {});

        assert!(held_score > idle_score);
        assert!(held_score > 0);
    }
}
