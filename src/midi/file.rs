use super::event::{Event, decode, decode_collapsing_ignored};
use super::primitive::{read_u16, read_u32, take};
use crate::error::{Error, MidiError};
use crate::timing::TempoMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extra ticks added to the first event of every track so notes can scroll in before they sound.
pub const LEAD_IN_TICKS: u32 = 300;

/// Notes per second assumed for metrical files until a tempo event says otherwise (120 bpm).
const DEFAULT_NOTES_PER_SEC: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    SingleTrack,
    Parallel,
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    /// Ticks per quarter note.
    Metrical(u16),
    Timecode { fps: u8, ticks_per_frame: u8 },
}

impl Division {
    fn from_raw(raw: u16) -> Division {
        if raw & 0x8000 != 0 {
            // High byte is the negated frame rate in two's complement.
            let fps = -((raw >> 8) as u8 as i8 as i16);
            Division::Timecode {
                fps: fps as u8,
                ticks_per_frame: (raw & 0x00FF) as u8,
            }
        } else {
            Division::Metrical(raw)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub format: Format,
    pub track_count: u16,
    pub division: Division,
}

impl Header {
    fn read(mut raw: &[u8]) -> Result<Header, MidiError> {
        let format = match read_u16(&mut raw)? {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            other => {
                return Err(MidiError::InvalidChunk(format!(
                    "unsupported file format {other}"
                )));
            }
        };
        let track_count = read_u16(&mut raw)?;
        let division = Division::from_raw(read_u16(&mut raw)?);
        Ok(Header {
            format,
            track_count,
            division,
        })
    }

    /// Ticks in one "note unit": a quarter note for metrical files, a frame for timecode ones.
    pub fn ticks_per_note(&self) -> u32 {
        match self.division {
            Division::Metrical(ticks) => ticks as u32,
            Division::Timecode {
                ticks_per_frame, ..
            } => ticks_per_frame as u32,
        }
    }

    pub fn default_notes_per_sec(&self) -> u32 {
        match self.division {
            Division::Metrical(_) => DEFAULT_NOTES_PER_SEC,
            Division::Timecode { fps, .. } => fps as u32,
        }
    }

    pub fn default_ticks_per_second(&self) -> f64 {
        (self.ticks_per_note() * self.default_notes_per_sec()) as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub events: Vec<Event>,
}

impl Track {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    fn read(data: &[u8], collapse_ignored: bool) -> Result<Track, MidiError> {
        let mut raw = data;
        let mut events: Vec<Event> = Vec::new();
        while !raw.is_empty() {
            let (mut event, used) = if collapse_ignored {
                decode_collapsing_ignored(raw, events.last())?
            } else {
                decode(raw, events.last())?
            };
            raw = &raw[used..];
            if events.is_empty() {
                event.delta = event.delta.saturating_add(LEAD_IN_TICKS);
            }
            events.push(event);
        }
        debug!(events = events.len(), collapse_ignored, "read track");
        Ok(Track { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

struct Chunk<'a> {
    id: &'a [u8],
    data: &'a [u8],
}

impl<'a> Chunk<'a> {
    fn read(raw: &mut &'a [u8]) -> Result<Chunk<'a>, MidiError> {
        let id = take(raw, 4)?;
        let len = read_u32(raw)? as usize;
        if len > raw.len() {
            return Err(MidiError::InvalidChunk(format!(
                "chunk `{}` declares {len} bytes but only {} remain",
                String::from_utf8_lossy(id),
                raw.len()
            )));
        }
        let data = take(raw, len)?;
        debug!(id = %String::from_utf8_lossy(id), len, "read chunk");
        Ok(Chunk { id, data })
    }

    fn expect_id(&self, expected: &[u8; 4]) -> Result<(), MidiError> {
        if self.id != expected {
            return Err(MidiError::InvalidChunk(format!(
                "expected `{}`, found `{}`",
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(self.id)
            )));
        }
        Ok(())
    }
}

/// A decoded Standard MIDI File. Immutable once built.
#[derive(Debug, Clone)]
pub struct MidiFile {
    pub header: Header,
    pub tracks: Vec<Track>,
    pub tempo: TempoMap,
}

impl MidiFile {
    pub fn load(path: impl AsRef<Path>) -> crate::Result<MidiFile> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(MidiFile::parse(&bytes)?)
    }

    pub fn parse(bytes: &[u8]) -> Result<MidiFile, MidiError> {
        let mut raw = bytes;

        let chunk = Chunk::read(&mut raw)?;
        chunk.expect_id(b"MThd")?;
        let header = Header::read(chunk.data)?;
        info!(
            format = ?header.format,
            tracks = header.track_count,
            division = ?header.division,
            "parsing midi file"
        );

        let mut tracks = Vec::with_capacity(header.track_count as usize);
        for index in 0..header.track_count {
            let chunk = Chunk::read(&mut raw)?;
            chunk.expect_id(b"MTrk")?;
            // The tempo track of a parallel file keeps its meta events visible.
            let collapse_ignored = !(header.format == Format::Parallel && index == 0);
            tracks.push(Track::read(chunk.data, collapse_ignored)?);
        }

        Ok(MidiFile::new(header, tracks))
    }

    pub fn new(header: Header, tracks: Vec<Track>) -> MidiFile {
        let tempo = build_tempo_map(&header, &tracks);
        MidiFile {
            header,
            tracks,
            tempo,
        }
    }

    pub fn longest_track(&self) -> Option<(usize, &Track)> {
        let mut longest: Option<(usize, &Track)> = None;
        for (index, track) in self.tracks.iter().enumerate() {
            if longest.is_none_or(|(_, best)| track.len() > best.len()) {
                longest = Some((index, track));
            }
        }
        longest
    }
}

fn build_tempo_map(header: &Header, tracks: &[Track]) -> TempoMap {
    let mut tempo = TempoMap::new(header.default_ticks_per_second());
    if header.format != Format::Parallel {
        return tempo;
    }
    let Some(tempo_track) = tracks.first() else {
        return tempo;
    };
    if let Division::Timecode { .. } = header.division {
        if tempo_track.events.iter().any(|event| event.tempo().is_some()) {
            warn!("ignoring tempo events in a timecode file");
        }
        return tempo;
    }

    let mut tick: u64 = 0;
    for event in &tempo_track.events {
        tick += event.delta as u64;
        if let Some(micros) = event.tempo() {
            if micros == 0 {
                warn!(tick, "ignoring zero tempo");
                continue;
            }
            let notes_per_sec = 1_000_000.0 / micros as f64;
            let ticks_per_second = header.ticks_per_note() as f64 * notes_per_sec;
            debug!(tick, micros, ticks_per_second, "tempo change");
            tempo.push(tick, ticks_per_second);
        }
    }
    tempo
}
