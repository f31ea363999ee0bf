//! Console feedback for verbose mode.

use std::io::{self, Stdout, Write};

/// The two glyphs alternated on successive beats.
pub const GLYPHS: [char; 2] = ['▚', '▞'];

/// Prints one line per beat, alternating between two glyphs.
///
/// The glyph flips on every beat, including beats whose line failed to
/// write, so the alternation always tracks the beat count.
///
/// # Example
///
/// ```
/// use beat_osc::BeatPrinter;
///
/// let mut printer = BeatPrinter::new(Vec::new());
/// printer.on_beat(120.0).unwrap();
/// printer.on_beat(121.5).unwrap();
///
/// let out = String::from_utf8(printer.into_inner()).unwrap();
/// assert_eq!(out, "▚\t120.0 BPM\n▞\t121.5 BPM\n");
/// ```
pub struct BeatPrinter<W: Write = Stdout> {
    out: W,
    phase: bool,
}

impl BeatPrinter<Stdout> {
    /// Prints to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> BeatPrinter<W> {
    /// Prints to `out`.
    pub fn new(out: W) -> Self {
        Self { out, phase: false }
    }

    /// Current alternation phase; flips on every beat.
    pub fn phase(&self) -> bool {
        self.phase
    }

    /// Glyph the next beat will be printed with.
    pub fn glyph(&self) -> char {
        GLYPHS[usize::from(self.phase)]
    }

    /// Writes the line for one beat.
    pub fn on_beat(&mut self, tempo_bpm: f32) -> io::Result<()> {
        let glyph = self.glyph();
        self.phase = !self.phase;
        writeln!(self.out, "{glyph}\t{tempo_bpm:.1} BPM")?;
        self.out.flush()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
