//! Plays a Standard MIDI File as a falling-notes practice game: the file is decoded into a
//! timeline and tempo map, then a frame loop advances through one track, compares the notes
//! that should be sounding with the keys the player holds, and keeps score.

pub mod config;
pub mod devices;
pub mod engine;
pub mod error;
pub mod events;
pub mod midi;
pub mod timing;
pub mod ui;

pub use config::PlayerConfig;
pub use engine::Waterfall;
pub use error::{Error, MidiError, Result};
pub use events::{InputEvent, InputProducer, InputQueue, input_queue};
pub use midi::MidiFile;
pub use ui::{Frame, Renderer, TerminalRenderer};
