use super::note_name;
use super::primitive::{read_u8, read_varlen, take};
use crate::error::MidiError;
use std::fmt;

/// Meta event type carrying microseconds per quarter note.
pub const META_TEMPO: u8 = 0x51;

/// One decoded track event. `delta` is the tick distance from the previous event of the same
/// track and `status` the raw status byte in effect, kept so the next event can inherit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub delta: u32,
    pub status: u8,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    Meta { kind: u8, data: Vec<u8> },
    /// Sysex and every channel message other than note on/off.
    Ignored { status: u8 },
}

impl Event {
    pub fn new(delta: u32, kind: EventKind) -> Self {
        let status = match &kind {
            EventKind::NoteOn { channel, .. } => 0x90 | (channel & 0x0F),
            EventKind::NoteOff { channel, .. } => 0x80 | (channel & 0x0F),
            EventKind::Meta { .. } => 0xFF,
            EventKind::Ignored { status } => *status,
        };
        Self {
            delta,
            status,
            kind,
        }
    }

    pub fn is_ignorable(&self) -> bool {
        matches!(self.kind, EventKind::Meta { .. } | EventKind::Ignored { .. })
    }

    /// Microseconds per quarter note if this is a well-formed tempo meta event.
    pub fn tempo(&self) -> Option<u32> {
        match &self.kind {
            EventKind::Meta { kind, data } if *kind == META_TEMPO && data.len() == 3 => Some(
                data.iter()
                    .fold(0u32, |acc, byte| (acc << 8) | *byte as u32),
            ),
            _ => None,
        }
    }

    pub(crate) fn read(raw: &mut &[u8], previous: Option<&Event>) -> Result<Event, MidiError> {
        let delta = read_varlen(raw)?;

        let first = *raw.first().ok_or(MidiError::TruncatedInput {
            needed: 1,
            available: 0,
        })?;
        let status = if first & 0x80 != 0 {
            *raw = &raw[1..];
            first
        } else {
            // Running status: `first` is already a data byte, leave it in place.
            previous
                .map(|event| event.status)
                .ok_or(MidiError::MissingStatus { byte: first })?
        };

        let kind = match status {
            0xFF => {
                let kind = read_u8(raw)?;
                let len = read_varlen(raw)? as usize;
                let data = take(raw, len)?.to_vec();
                EventKind::Meta { kind, data }
            }
            0xF0 => {
                let end = raw
                    .iter()
                    .position(|&byte| byte == 0xF7)
                    .ok_or(MidiError::TruncatedInput {
                        needed: raw.len() + 1,
                        available: raw.len(),
                    })?;
                take(raw, end + 1)?;
                EventKind::Ignored { status }
            }
            _ => match status & 0xF0 {
                0xC0 | 0xD0 => {
                    take(raw, 1)?;
                    EventKind::Ignored { status }
                }
                0x80 | 0x90 => {
                    let channel = status & 0x0F;
                    let note = read_u8(raw)?;
                    let velocity = read_u8(raw)?;
                    if status & 0xF0 == 0x90 && velocity > 0 {
                        EventKind::NoteOn {
                            channel,
                            note,
                            velocity,
                        }
                    } else {
                        EventKind::NoteOff {
                            channel,
                            note,
                            velocity,
                        }
                    }
                }
                // Approximation: every other message is assumed to carry two data bytes.
                _ => {
                    take(raw, 2)?;
                    EventKind::Ignored { status }
                }
            },
        };

        Ok(Event {
            delta,
            status,
            kind,
        })
    }
}

pub fn decode(bytes: &[u8], previous: Option<&Event>) -> Result<(Event, usize), MidiError> {
    let mut raw = bytes;
    let event = Event::read(&mut raw, previous)?;
    Ok((event, bytes.len() - raw.len()))
}

/// Like [`decode`], but keeps reading past meta and ignored events, folding their deltas into
/// the next note event. If the input runs out first, the last ignorable event is returned
/// carrying the accumulated delta.
pub fn decode_collapsing_ignored(
    bytes: &[u8],
    previous: Option<&Event>,
) -> Result<(Event, usize), MidiError> {
    let mut raw = bytes;
    let mut event = Event::read(&mut raw, previous)?;
    let mut delta = event.delta;
    while event.is_ignorable() && !raw.is_empty() {
        let next = Event::read(&mut raw, Some(&event))?;
        delta = delta.saturating_add(next.delta);
        event = next;
    }
    event.delta = delta;
    Ok((event, bytes.len() - raw.len()))
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::NoteOn {
                channel,
                note,
                velocity,
            } => write!(
                f,
                "delta {:>5}  ch {:>2}  NoteOn   {}  vel {:>3}",
                self.delta,
                channel,
                note_name(*note),
                velocity
            ),
            EventKind::NoteOff {
                channel,
                note,
                velocity,
            } => write!(
                f,
                "delta {:>5}  ch {:>2}  NoteOff  {}  vel {:>3}",
                self.delta,
                channel,
                note_name(*note),
                velocity
            ),
            EventKind::Meta { kind, data } => write!(
                f,
                "delta {:>5}  meta {:#04x} ({} bytes)",
                self.delta,
                kind,
                data.len()
            ),
            EventKind::Ignored { status } => {
                write!(f, "delta {:>5}  status {:#04x} (ignored)", self.delta, status)
            }
        }
    }
}
