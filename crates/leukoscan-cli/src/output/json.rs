//! JSON output adapter.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes one JSON document per line.
pub struct JsonOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    /// Creates a new JSON output writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a new JSON output writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Serializes `value` and writes it followed by a newline.
    #[allow(clippy::significant_drop_tightening)]
    pub fn write<T: Serialize + ?Sized>(&self, value: &T, pretty: bool) -> Result<()> {
        let json = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writeln!(writer, "{json}")?;
        Ok(())
    }

    /// Flushes the underlying writer.
    #[allow(clippy::significant_drop_tightening)]
    pub fn flush(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock poisoned: {e}"))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::{Arc, PoisonError};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_compact_is_one_line() {
        let sink = Shared::default();
        let output = JsonOutput::new(Box::new(sink.clone()));
        output
            .write(&serde_json::json!({"warnings": [], "leukocoria": null}), false)
            .unwrap();
        output.flush().unwrap();

        let text = sink.text();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_pretty_is_indented() {
        let sink = Shared::default();
        let output = JsonOutput::new(Box::new(sink.clone()));
        output
            .write(&serde_json::json!({"warnings": ["No face detected."]}), true)
            .unwrap();

        let text = sink.text();
        assert!(text.lines().count() > 1);
        assert!(text.contains("  \"warnings\""));
    }
}
