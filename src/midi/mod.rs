mod event;
mod file;
mod primitive;

pub use event::{Event, EventKind, META_TEMPO, decode, decode_collapsing_ignored};
pub use file::{Division, Format, Header, LEAD_IN_TICKS, MidiFile, Track};
pub use primitive::{decode_varlen, read_u8, read_u16, read_u24, read_u32, read_varlen};

const NOTE_NAMES: [&str; 12] = [
    "C-", "C#", "D-", "D#", "E-", "F-", "F#", "G-", "G#", "A-", "A#", "B-",
];

/// Note name with octave, where note 60 is `C-4`.
pub fn note_name(note: u8) -> String {
    format!(
        "{}{}",
        NOTE_NAMES[note as usize % 12],
        note as i32 / 12 - 1
    )
}
