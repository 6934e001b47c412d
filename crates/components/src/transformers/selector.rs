//! Channel selection.
//!
//! Picks a configured subset of channels out of every sample, preserving
//! sample count, rate, element kind and the selected channels' labels.

use contracts::{OptionValue, Options, PipelineError, SampleType, Stream, Transformer};

/// Per-sample channel selector
pub struct Selector {
    name: String,
    options: Options,
    indices: Vec<usize>,
}

impl Selector {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let options = Options::new(name.clone()).define(
            "channels",
            OptionValue::IntList(vec![0]),
            "input channel indices to keep, in output order",
        );
        Self {
            name,
            options,
            indices: Vec::new(),
        }
    }

    /// Option bag, writable until the component enters its running state
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn resolve_indices(&mut self) -> Result<(), PipelineError> {
        self.indices = self
            .options
            .get_int_list("channels")?
            .iter()
            .map(|&i| {
                usize::try_from(i).map_err(|_| {
                    PipelineError::validation(&self.name, format!("negative channel index {i}"))
                })
            })
            .collect::<Result<_, _>>()?;
        if self.indices.is_empty() {
            return Err(PipelineError::validation(&self.name, "no channels selected"));
        }
        Ok(())
    }
}

impl Transformer for Selector {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_dim(&mut self, _inputs: &[Stream]) -> Result<usize, PipelineError> {
        self.resolve_indices()?;
        Ok(self.indices.len())
    }

    fn output_kind(&mut self, inputs: &[Stream]) -> Result<SampleType, PipelineError> {
        inputs.first().map(Stream::kind).ok_or_else(|| {
            PipelineError::validation(&self.name, "exactly one input stream required")
        })
    }

    fn output_num(&mut self, input_num: usize) -> usize {
        input_num
    }

    fn define_output_labels(&mut self, inputs: &[Stream], output: &mut Stream) {
        let Some(input) = inputs.first() else {
            return;
        };
        let labels: Vec<String> = self
            .indices
            .iter()
            .filter_map(|&i| input.labels().get(i).cloned())
            .collect();
        output.set_labels(labels);
    }

    fn enter(&mut self, inputs: &[Stream], _output: &mut Stream) -> Result<(), PipelineError> {
        if inputs.len() != 1 {
            return Err(PipelineError::validation(
                &self.name,
                "exactly one input stream required",
            ));
        }
        let dim = inputs[0].dim();
        if let Some(out_of_range) = self.indices.iter().find(|&&i| i >= dim) {
            return Err(PipelineError::validation(
                &self.name,
                format!("channel {out_of_range} out of range for {dim} channels"),
            ));
        }
        self.options.freeze();
        Ok(())
    }

    fn transform(&mut self, inputs: &[Stream], output: &mut Stream) -> Result<(), PipelineError> {
        let input = &inputs[0];
        let in_dim = input.dim();
        let out_dim = self.indices.len();
        for sample in 0..input.num() {
            for (j, &channel) in self.indices.iter().enumerate() {
                output.data_mut().copy_from(
                    sample * out_dim + j,
                    input.data(),
                    sample * in_dim + channel,
                    1,
                )?;
            }
        }
        Ok(())
    }
}
