//! Input producers. Each one owns the producing half of the input queue and feeds it from its
//! own thread; the caller keeps the returned handle alive for as long as input is wanted.

use crate::error::{Error, Result};
use crate::events::{InputEvent, InputProducer};
use crate::midi::note_name;
use midir::{MidiInput, MidiInputConnection};
use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const MOCK_VELOCITY: u8 = 50;
const MOCK_HOLD: Duration = Duration::from_secs(1);

/// Connects to a MIDI input port and forwards note presses and releases into `producer`.
///
/// The first port whose name contains `port_hint` is used, otherwise the first port found.
pub fn connect_midi(
    port_hint: Option<&str>,
    mut producer: InputProducer,
) -> Result<MidiInputConnection<()>> {
    let midi_in = MidiInput::new("waterfall").map_err(|e| Error::Input(e.to_string()))?;

    let ports = midi_in.ports();
    let port = ports
        .iter()
        .find(|port| {
            port_hint.is_some_and(|hint| {
                midi_in
                    .port_name(port)
                    .unwrap_or_default()
                    .contains(hint)
            })
        })
        .or_else(|| ports.first())
        .ok_or_else(|| Error::Input("no MIDI input found".into()))?;

    info!(port = %midi_in.port_name(port).unwrap_or_default(), "connecting to MIDI input");

    midi_in
        .connect(
            port,
            "waterfall-input",
            move |_timestamp, message, _| match InputEvent::from_midi(message) {
                Some(event) => {
                    debug!(note = %note_name(event.note), velocity = event.velocity, "key");
                    producer.push(event);
                }
                None => trace!(?message, "ignoring device message"),
            },
            (),
        )
        .map_err(|e| Error::Input(e.to_string()))
}

/// Reads whitespace-separated note numbers from stdin, one chord per line. Each chord is
/// pressed, held for a second, then released.
pub fn spawn_mock_keyboard(mut producer: InputProducer) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("mock keyboard: type note numbers, e.g. `60` or `36 96` to leave the song");
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let notes = match parse_chord(&line) {
                Ok(notes) if !notes.is_empty() => notes,
                Ok(_) => continue,
                Err(bad) => {
                    warn!(input = %bad, "not a note number");
                    continue;
                }
            };
            for &note in &notes {
                producer.push(InputEvent::press(note, MOCK_VELOCITY));
            }
            thread::sleep(MOCK_HOLD);
            for &note in &notes {
                producer.push(InputEvent::release(note));
            }
        }
        debug!("mock keyboard input closed");
    })
}

fn parse_chord(line: &str) -> std::result::Result<Vec<u8>, String> {
    line.split_whitespace()
        .map(|token| token.parse::<u8>().map_err(|_| token.to_string()))
        .collect()
}
