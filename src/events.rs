use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Observer, Producer, Split},
};
use tracing::warn;

/// A key press (`velocity > 0`) or release (`velocity == 0`) from the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputEvent {
    pub note: u8,
    pub velocity: u8,
}

impl InputEvent {
    pub fn press(note: u8, velocity: u8) -> Self {
        Self {
            note,
            velocity: velocity.max(1),
        }
    }

    pub fn release(note: u8) -> Self {
        Self { note, velocity: 0 }
    }

    pub fn is_press(&self) -> bool {
        self.velocity > 0
    }

    /// Decodes a live channel message. Only note on/off produce input; note off always
    /// reads as a release whatever velocity it carries.
    pub fn from_midi(message: &[u8]) -> Option<InputEvent> {
        let [status, note, velocity, ..] = *message else {
            return None;
        };
        match status & 0xF0 {
            0x90 => Some(InputEvent { note, velocity }),
            0x80 => Some(InputEvent::release(note)),
            _ => None,
        }
    }
}

pub fn input_queue(capacity: usize) -> (InputProducer, InputQueue) {
    let (producer, consumer) = HeapRb::<InputEvent>::new(capacity.max(1)).split();
    (
        InputProducer { inner: producer },
        InputQueue { inner: consumer },
    )
}

pub struct InputProducer {
    inner: HeapProd<InputEvent>,
}

impl InputProducer {
    /// Never blocks. Returns `false` if the queue was full and the event was dropped.
    pub fn push(&mut self, event: InputEvent) -> bool {
        match self.inner.try_push(event) {
            Ok(()) => true,
            Err(event) => {
                warn!(
                    note = event.note,
                    velocity = event.velocity,
                    "input queue full, dropping event"
                );
                false
            }
        }
    }
}

pub struct InputQueue {
    inner: HeapCons<InputEvent>,
}

impl InputQueue {
    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        std::iter::from_fn(move || self.inner.try_pop())
    }

    /// Discards pending input, returning how many events were dropped.
    pub fn clear(&mut self) -> usize {
        self.drain().count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
