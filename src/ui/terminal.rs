use super::{Frame, KeyShade, Renderer, is_black_key};
use crate::config::PlayerConfig;
use crate::midi::note_name;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};
use tracing::warn;

/// Draws the waterfall in the terminal: one column per key, time flowing down toward the
/// keyboard row at the bottom.
pub struct TerminalRenderer {
    out: Stdout,
    lowest_note: u8,
    highest_note: u8,
    stop_hint: String,
}

impl TerminalRenderer {
    pub fn new(config: &PlayerConfig) -> io::Result<Self> {
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide)?;
        Ok(Self {
            out,
            lowest_note: config.lowest_note,
            highest_note: config.highest_note,
            stop_hint: stop_hint(config),
        })
    }

    fn draw(&mut self, frame: &Frame<'_>) -> io::Result<()> {
        let (columns, rows) = terminal::size()?;
        // Title on the first row, keyboard on the last.
        let height = rows.saturating_sub(2).max(1);
        let keyboard_row = height + 1;

        queue!(
            self.out,
            terminal::Clear(ClearType::All),
            cursor::MoveTo(0, 0),
            ResetColor,
            Print(format!(
                "Score: {}   tick {}   {}",
                frame.score, frame.current_tick, self.stop_hint
            ))
        )?;

        for bar in frame.bars() {
            let Some(column) = self.column(bar.note, columns) else {
                continue;
            };
            let color = match frame.shade(bar.note) {
                KeyShade::Hit => Color::Green,
                KeyShade::White => Color::Blue,
                KeyShade::Black => Color::Cyan,
            };
            let top = row(bar.end, frame.ticks_shown, height);
            let bottom = row(bar.start, frame.ticks_shown, height);
            queue!(self.out, SetForegroundColor(color))?;
            for y in top..=bottom {
                queue!(self.out, cursor::MoveTo(column, y), Print('█'))?;
            }
        }

        for note in self.lowest_note..=self.highest_note {
            let Some(column) = self.column(note, columns) else {
                continue;
            };
            let (color, glyph) = if frame.shade(note) == KeyShade::Hit {
                (Color::Green, '^')
            } else if is_black_key(note) {
                (Color::DarkGrey, '▀')
            } else {
                (Color::White, '▀')
            };
            queue!(
                self.out,
                cursor::MoveTo(column, keyboard_row),
                SetForegroundColor(color),
                Print(glyph)
            )?;
        }

        for note in frame.wrong_keys() {
            if let Some(column) = self.column(note, columns) {
                queue!(
                    self.out,
                    cursor::MoveTo(column, keyboard_row),
                    SetForegroundColor(Color::Red),
                    Print('x')
                )?;
            }
        }

        queue!(self.out, ResetColor)?;
        self.out.flush()
    }

    fn column(&self, note: u8, columns: u16) -> Option<u16> {
        if note < self.lowest_note || note > self.highest_note {
            return None;
        }
        let column = (note - self.lowest_note) as u16;
        (column < columns).then_some(column)
    }
}

fn stop_hint(config: &PlayerConfig) -> String {
    format!(
        "hold {} + {} to stop",
        note_name(config.lowest_note),
        note_name(config.highest_note)
    )
}

/// Screen row for a tick offset: offset 0 sits just above the keyboard, the window end at the top.
fn row(offset: u64, ticks_shown: u64, height: u16) -> u16 {
    let span = height.saturating_sub(1) as u64;
    let offset = offset.min(ticks_shown);
    let rows_up = if ticks_shown == 0 {
        0
    } else {
        offset * span / ticks_shown
    };
    1 + (span - rows_up) as u16
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, frame: &Frame<'_>) {
        if let Err(err) = self.draw(frame) {
            warn!(%err, "failed to draw frame");
        }
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        let _ = execute!(self.out, ResetColor, cursor::Show, LeaveAlternateScreen);
    }
}
