//! Destinations for training examples.
//!
//! Both formats are streams of independent records so files from several
//! runs can be concatenated.

use crate::error::{Result, SelfPlayError};
use crate::example::TrainingExample;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Something that accepts finished training examples.
pub trait ExampleSink {
    fn write_examples(&mut self, examples: &[TrainingExample]) -> Result<()>;

    /// Flush anything buffered.
    fn finish(&mut self) -> Result<()>;
}

fn open(path: &Path, append: bool) -> Result<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)?;
    Ok(BufWriter::new(file))
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Open `path`, appending to or replacing an existing file.
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self> {
        Ok(Self::new(open(path.as_ref(), append)?))
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ExampleSink for JsonLinesSink<W> {
    fn write_examples(&mut self, examples: &[TrainingExample]) -> Result<()> {
        for example in examples {
            serde_json::to_writer(&mut self.writer, example)
                .map_err(|e| SelfPlayError::Encode(e.to_string()))?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Concatenated MessagePack maps with named fields.
pub struct MessagePackSink<W: Write> {
    writer: W,
}

impl MessagePackSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self> {
        Ok(Self::new(open(path.as_ref(), append)?))
    }
}

impl<W: Write> MessagePackSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ExampleSink for MessagePackSink<W> {
    fn write_examples(&mut self, examples: &[TrainingExample]) -> Result<()> {
        for example in examples {
            // Named fields serialize structs as maps, not arrays.
            rmp_serde::encode::write_named(&mut self.writer, example)
                .map_err(|e| SelfPlayError::Encode(e.to_string()))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Cursor};

    fn sample() -> Vec<TrainingExample> {
        vec![
            TrainingExample {
                board: vec![vec![0, 0, 0]; 3],
                policy: vec![1.0 / 9.0; 9],
                value: 0.5,
                current_player: 1,
            },
            TrainingExample {
                board: vec![vec![1, 0, 0], vec![0, 0, 0], vec![0, 0, 0]],
                policy: vec![0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                value: -0.5,
                current_player: -1,
            },
        ]
    }

    #[test]
    fn test_json_lines_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.write_examples(&sample()).unwrap();
        sink.finish().unwrap();
        let bytes = sink.into_inner();

        let lines: Vec<String> = Cursor::new(bytes).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        let parsed: Vec<TrainingExample> = lines
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_message_pack_stream_decodes() {
        let mut sink = MessagePackSink::new(Vec::new());
        sink.write_examples(&sample()).unwrap();
        let bytes = sink.into_inner();

        let mut cursor = Cursor::new(bytes);
        let first: TrainingExample = rmp_serde::from_read(&mut cursor).unwrap();
        let second: TrainingExample = rmp_serde::from_read(&mut cursor).unwrap();
        assert_eq!(vec![first, second], sample());
    }

    #[test]
    fn test_file_sink_appends() {
        let path = std::env::temp_dir().join(format!("arbor-sink-{}.jsonl", std::process::id()));
        {
            let mut sink = JsonLinesSink::create(&path, false).unwrap();
            sink.write_examples(&sample()).unwrap();
            sink.finish().unwrap();
        }
        {
            let mut sink = JsonLinesSink::create(&path, true).unwrap();
            sink.write_examples(&sample()[..1]).unwrap();
            sink.finish().unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }
}
