use chrono::Local;
use std::io::{self, Write};
use std::sync::Mutex;

use super::OutputSink;
use crate::error::{Result, TrackerError};

/// Prints `[YYYY-MM-DD HH:MM:SS] message` lines, to stdout by default.
pub struct ConsoleOutput {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for ConsoleOutput {
    fn name(&self) -> &'static str {
        "console"
    }

    fn deliver(&self, message: &str) -> Result<()> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        writeln!(writer, "[{}] {}", timestamp, message)
            .and_then(|_| writer.flush())
            .map_err(|err| TrackerError::Delivery {
                sink: "console",
                details: format!("Failed to print to console: {}", err),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prints_timestamped_line() {
        let buffer = SharedBuffer::default();
        let output = ConsoleOutput::with_writer(Box::new(buffer.clone()));

        output.deliver("alice was online for: 1 hour.").unwrap();

        let printed = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(printed.starts_with('['));
        assert!(printed.ends_with("] alice was online for: 1 hour.\n"));
        // "[YYYY-MM-DD HH:MM:SS]"
        assert_eq!(printed.find(']'), Some(20));
    }

    #[test]
    fn write_failure_is_reported() {
        let output = ConsoleOutput::with_writer(Box::new(BrokenPipe));
        assert!(output.deliver("lost").is_err());
    }
}
