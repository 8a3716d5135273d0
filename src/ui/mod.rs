mod terminal;

pub use terminal::TerminalRenderer;

use crate::midi::{Event, EventKind};
use std::collections::BTreeSet;
use tracing::debug;

/// Read-only view of a playback session, handed to the renderer once per frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub current_tick: u64,
    /// Length of the visible window, in ticks ahead of `current_tick`.
    pub ticks_shown: u64,
    pub note_on_time: &'a [Option<u64>; 256],
    pub active_notes: &'a BTreeSet<u8>,
    pub score: i64,
    pub upcoming: &'a [Event],
    /// Ticks until the first of `upcoming` fires.
    pub pending_delta: u64,
}

/// A note sounding somewhere inside the window. Offsets are ticks after the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteBar {
    pub note: u8,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyShade {
    /// Expected and held.
    Hit,
    White,
    Black,
}

pub fn is_black_key(note: u8) -> bool {
    matches!(note % 12, 1 | 3 | 6 | 8 | 10)
}

impl Frame<'_> {
    pub fn is_expected(&self, note: u8) -> bool {
        self.note_on_time[note as usize].is_some()
    }

    pub fn is_held(&self, note: u8) -> bool {
        self.active_notes.contains(&note)
    }

    pub fn shade(&self, note: u8) -> KeyShade {
        if self.is_held(note) && self.is_expected(note) {
            KeyShade::Hit
        } else if is_black_key(note) {
            KeyShade::Black
        } else {
            KeyShade::White
        }
    }

    pub fn wrong_keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.active_notes
            .iter()
            .copied()
            .filter(|&note| !self.is_expected(note))
    }

    /// Every note visible between the current tick and the end of the window.
    pub fn bars(&self) -> Vec<NoteBar> {
        let window_end = self.current_tick + self.ticks_shown;
        let offset = |on: Option<u64>| on.map_or(0, |tick| tick.saturating_sub(self.current_tick));

        let mut sounding = *self.note_on_time;
        let mut bars = Vec::new();
        let mut tick = self.current_tick;
        for (index, event) in self.upcoming.iter().enumerate() {
            tick += if index == 0 {
                self.pending_delta
            } else {
                event.delta as u64
            };
            if tick > window_end {
                break;
            }
            match event.kind {
                EventKind::NoteOff { note, .. } => {
                    bars.push(NoteBar {
                        note,
                        start: offset(sounding[note as usize]),
                        end: tick - self.current_tick,
                    });
                    sounding[note as usize] = None;
                }
                EventKind::NoteOn { note, .. } => {
                    if sounding[note as usize].is_some() {
                        debug!(note, tick, "note already sounding, ignoring note on");
                    } else {
                        sounding[note as usize] = Some(tick);
                    }
                }
                EventKind::Meta { .. } | EventKind::Ignored { .. } => {}
            }
        }

        for (note, on) in sounding.iter().enumerate() {
            if on.is_some() {
                bars.push(NoteBar {
                    note: note as u8,
                    start: offset(*on),
                    end: self.ticks_shown,
                });
            }
        }
        bars
    }
}

/// Draws playback frames. Rendering problems are the renderer's to handle; playback goes on.
pub trait Renderer {
    fn render(&mut self, frame: &Frame<'_>);
}

impl<F> Renderer for F
where
    F: FnMut(&Frame<'_>),
{
    fn render(&mut self, frame: &Frame<'_>) {
        self(frame)
    }
}
