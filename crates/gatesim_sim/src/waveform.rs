//! Waveform recording for committed signal changes.
//!
//! The [`WaveformRecorder`] trait abstracts waveform output. [`VcdRecorder`]
//! writes IEEE 1364 Value Change Dump text with one scalar variable per
//! signal, viewable in GTKWave or Surfer.

use std::io::Write;

use crate::error::SimError;
use crate::signal::SignalId;

/// Sink for committed value changes.
pub trait WaveformRecorder {
    /// Declares a signal. Must be called before its first change is recorded.
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError>;

    /// Opens a new scope.
    fn begin_scope(&mut self, name: &str) -> Result<(), SimError>;

    /// Closes the current scope.
    fn end_scope(&mut self) -> Result<(), SimError>;

    /// Records a committed value at `time_fs`.
    fn record_change(&mut self, time_fs: u64, id: SignalId, value: bool) -> Result<(), SimError>;

    /// Flushes the output.
    fn finalize(&mut self) -> Result<(), SimError>;
}

/// VCD writer.
///
/// Identifier codes are drawn from printable ASCII starting at `!`.
pub struct VcdRecorder<W: Write> {
    writer: W,
    id_map: Vec<(SignalId, String)>,
    header_written: bool,
    current_time: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a recorder writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            id_map: Vec::new(),
            header_written: false,
            current_time: None,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), SimError> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  gatesim")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  1fs")?;
        writeln!(self.writer, "$end")?;
        self.header_written = true;
        Ok(())
    }

    /// Identifier code for the `index`-th registered signal; codes of two or
    /// more characters start at index 94.
    fn make_id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }
}

impl<W: Write> WaveformRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, id: SignalId, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        let id_code = Self::make_id_code(self.id_map.len());
        writeln!(self.writer, "$var wire 1 {id_code} {name} $end")?;
        self.id_map.push((id, id_code));
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), SimError> {
        self.write_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), SimError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(&mut self, time_fs: u64, id: SignalId, value: bool) -> Result<(), SimError> {
        self.write_header()?;
        if self.current_time != Some(time_fs) {
            if self.current_time.is_none() {
                writeln!(self.writer, "$enddefinitions $end")?;
            }
            writeln!(self.writer, "#{time_fs}")?;
            self.current_time = Some(time_fs);
        }

        let (_, id_code) = self
            .id_map
            .iter()
            .find(|(sid, _)| *sid == id)
            .ok_or(SimError::UnknownSignal(id.as_raw()))?;
        writeln!(self.writer, "{}{id_code}", u8::from(value))?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SimError> {
        if self.current_time.is_none() {
            self.write_header()?;
            writeln!(self.writer, "$enddefinitions $end")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
