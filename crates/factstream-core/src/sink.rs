//! Fact sinks: where formatted blocks go.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Destination for formatted fact blocks. A block is written atomically
/// from the caller's point of view; interleaving happens only between
/// blocks.
pub trait FactSink: Send {
    fn write_block(&mut self, block: &str) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Writes blocks to standard output.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl FactSink for StdoutSink {
    fn write_block(&mut self, block: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(block.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Appends blocks to a file.
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl FactSink for FileSink {
    fn write_block(&mut self, block: &str) -> io::Result<()> {
        self.writer.write_all(block.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Collects blocks in memory. Cloning shares the underlying buffer, so a
/// test can keep a handle while the sampler owns the sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    blocks: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> Vec<String> {
        self.blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactSink for MemorySink {
    fn write_block(&mut self, block: &str) -> io::Result<()> {
        self.blocks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(block.to_string());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_block("block one\n").unwrap();
        writer.write_block("block two\n").unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.blocks()[1], "block two\n");
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.out");
        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.write_block("first\n").unwrap();
            sink.flush().unwrap();
        }
        {
            let mut sink = FileSink::open(&path).unwrap();
            sink.write_block("second\n").unwrap();
            sink.flush().unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }
}
