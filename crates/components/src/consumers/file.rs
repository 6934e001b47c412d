//! Append-only sample log on disk.
//!
//! One text line per sample, tab-separated: window start time plus every
//! channel value. A JSON header line records the stream shape and the
//! wall-clock start, so files remain self-describing.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, info};

use contracts::{Consumer, OptionValue, Options, PipelineError, Stream};

/// Consumer that appends every delivered sample to a text file
pub struct FileConsumer {
    name: String,
    options: Options,
    writer: Option<BufWriter<File>>,
    rows: u64,
}

impl FileConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let options = Options::new(name.clone())
            .define(
                "path",
                OptionValue::Text(String::new()),
                "output file path (required)",
            )
            .define(
                "truncate",
                OptionValue::Bool(false),
                "overwrite instead of appending to an existing file",
            );
        Self {
            name,
            options,
            writer: None,
            rows: 0,
        }
    }

    /// Option bag, writable until the component enters its running state
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn open(&self, path: &PathBuf, input: &Stream) -> Result<BufWriter<File>, PipelineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let truncate = self.options.get_bool("truncate")?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(truncate)
            .append(!truncate)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        let header = serde_json::json!({
            "consumer": self.name,
            "sample_rate_hz": input.sample_rate(),
            "dim": input.dim(),
            "kind": input.kind().name(),
            "labels": input.labels(),
            "started": Utc::now().to_rfc3339(),
        });
        writeln!(writer, "# {header}")?;
        Ok(writer)
    }
}

impl Consumer for FileConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn enter(&mut self, inputs: &[Stream]) -> Result<(), PipelineError> {
        if inputs.len() != 1 {
            return Err(PipelineError::validation(
                &self.name,
                "exactly one input stream required",
            ));
        }
        let path = self.options.get_text("path")?;
        if path.is_empty() {
            return Err(PipelineError::validation(&self.name, "'path' option not set"));
        }
        let path = PathBuf::from(path);
        self.writer = Some(self.open(&path, &inputs[0])?);
        self.options.freeze();
        info!(consumer = %self.name, path = %path.display(), "file consumer writing");
        Ok(())
    }

    fn consume(&mut self, inputs: &[Stream]) -> Result<(), PipelineError> {
        let input = &inputs[0];
        let writer = self.writer.as_mut().ok_or_else(|| {
            PipelineError::lifecycle(format!("file consumer '{}' was never entered", self.name))
        })?;
        let rate = input.sample_rate();
        for sample in 0..input.num() {
            let mut line = format!("{:.6}", input.time() + sample as f64 / rate);
            for channel in 0..input.dim() {
                let value = input
                    .data()
                    .element_to_string(sample * input.dim() + channel)
                    .unwrap_or_default();
                line.push('\t');
                line.push_str(&value);
            }
            writeln!(writer, "{line}")?;
            self.rows += 1;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<(), PipelineError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        debug!(consumer = %self.name, rows = self.rows, "file consumer done");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{SampleData, SampleType};

    fn window(values: &[f32], dim: usize, rate: f64, time: f64) -> Stream {
        let mut stream =
            Stream::from_parts(values.len() / dim, dim, rate, SampleData::F32(values.to_vec()))
                .expect("test window");
        stream.set_time(time);
        stream
    }

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");

        let mut consumer = FileConsumer::new("file");
        consumer
            .options_mut()
            .set("path", OptionValue::Text(path.display().to_string()))
            .unwrap();

        let w1 = window(&[1.0, 2.0], 1, 10.0, 0.0);
        let w2 = window(&[3.0, 4.0], 1, 10.0, 0.2);
        consumer.enter(std::slice::from_ref(&w1)).unwrap();
        consumer.consume(std::slice::from_ref(&w1)).unwrap();
        consumer.consume(std::slice::from_ref(&w2)).unwrap();
        consumer.leave().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("# {"));
        assert!(lines[0].contains("\"dim\":1"));
        assert_eq!(lines[1], "0.000000\t1");
        assert_eq!(lines[2], "0.100000\t2");
        assert_eq!(lines[3], "0.200000\t3");
    }

    #[test]
    fn test_missing_path_rejected() {
        let mut consumer = FileConsumer::new("file");
        let input = window(&[1.0], 1, 10.0, 0.0);
        assert!(consumer.enter(std::slice::from_ref(&input)).is_err());
    }

    #[test]
    fn test_append_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        fs::write(&path, "existing\n").unwrap();

        let mut consumer = FileConsumer::new("file");
        consumer
            .options_mut()
            .set("path", OptionValue::Text(path.display().to_string()))
            .unwrap();
        let input = window(&[1.0], 1, 10.0, 0.0);
        consumer.enter(std::slice::from_ref(&input)).unwrap();
        consumer.leave().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("existing\n"));
    }
}
