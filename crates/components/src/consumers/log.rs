//! Window summaries via tracing.

use tracing::{debug, info, instrument};

use contracts::{Consumer, OptionValue, Options, PipelineError, Stream};

/// Consumer that logs a summary line per cycle
pub struct LogConsumer {
    name: String,
    options: Options,
    every: u64,
    cycles: u64,
}

impl LogConsumer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let options = Options::new(name.clone()).define(
            "every",
            OptionValue::Int(1),
            "log every n-th cycle",
        );
        Self {
            name,
            options,
            every: 1,
            cycles: 0,
        }
    }

    /// Option bag, writable until the component enters its running state
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }
}

impl Consumer for LogConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    fn enter(&mut self, _inputs: &[Stream]) -> Result<(), PipelineError> {
        let every = self.options.get_int("every")?;
        if every < 1 {
            return Err(PipelineError::validation(&self.name, "'every' must be >= 1"));
        }
        self.every = every as u64;
        self.options.freeze();
        Ok(())
    }

    #[instrument(name = "log_consumer_consume", skip_all, fields(consumer = %self.name))]
    fn consume(&mut self, inputs: &[Stream]) -> Result<(), PipelineError> {
        self.cycles += 1;
        if self.cycles % self.every != 0 {
            return Ok(());
        }
        for input in inputs {
            info!(
                consumer = %self.name,
                cycle = self.cycles,
                time = format!("{:.3}", input.time()),
                num = input.num(),
                dim = input.dim(),
                kind = %input.kind(),
                "window received"
            );
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<(), PipelineError> {
        debug!(consumer = %self.name, cycles = self.cycles, "log consumer done");
        Ok(())
    }
}
