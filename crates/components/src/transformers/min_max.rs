//! Per-channel minimum/maximum over each window.
//!
//! Emits one output sample per window. For every input channel the output
//! carries the window minimum and/or maximum, ordered `[min, max]` per
//! channel, channels concatenated across input streams.

use tracing::warn;

use contracts::{OptionValue, Options, PipelineError, SampleType, Stream, Transformer};

/// Min/max window statistic
pub struct MinMax {
    name: String,
    options: Options,
    /// Selected statistics per channel (1 = min or max, 2 = both)
    multiplier: usize,
    /// Output channels contributed by each input stream
    stream_dims: Vec<usize>,
}

impl MinMax {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let options = Options::new(name.clone())
            .define("min", OptionValue::Bool(true), "emit per-channel minimum")
            .define("max", OptionValue::Bool(true), "emit per-channel maximum")
            .define(
                "output_labels",
                OptionValue::TextList(Vec::new()),
                "override generated output channel labels",
            );
        Self {
            name,
            options,
            multiplier: 0,
            stream_dims: Vec::new(),
        }
    }

    /// Option bag, writable until the component enters its running state
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }
}

impl Transformer for MinMax {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_dim(&mut self, inputs: &[Stream]) -> Result<usize, PipelineError> {
        self.multiplier = usize::from(self.options.get_bool("min")?)
            + usize::from(self.options.get_bool("max")?);
        if self.multiplier == 0 {
            return Err(PipelineError::validation(
                &self.name,
                "neither min nor max selected",
            ));
        }
        self.stream_dims = inputs.iter().map(|s| s.dim() * self.multiplier).collect();
        Ok(self.stream_dims.iter().sum())
    }

    fn output_kind(&mut self, _inputs: &[Stream]) -> Result<SampleType, PipelineError> {
        Ok(SampleType::F32)
    }

    fn output_num(&mut self, _input_num: usize) -> usize {
        1
    }

    fn define_output_labels(&mut self, _inputs: &[Stream], output: &mut Stream) {
        let overall = output.dim();
        match self.options.get_text_list("output_labels") {
            Ok(overridden) if !overridden.is_empty() => {
                if overridden.len() == overall {
                    output.set_labels(overridden.to_vec());
                    return;
                }
                warn!(
                    component = %self.name,
                    expected = overall,
                    got = overridden.len(),
                    "output_labels option has wrong length, generating labels"
                );
            }
            _ => {}
        }
        let emit_min = self.options.get_bool("min").unwrap_or(true);
        let emit_max = self.options.get_bool("max").unwrap_or(true);
        let mut labels = Vec::with_capacity(overall);
        for (stream, stream_dim) in self.stream_dims.iter().enumerate() {
            for channel in 0..stream_dim / self.multiplier.max(1) {
                if emit_min {
                    labels.push(format!("min{stream}.{channel}"));
                }
                if emit_max {
                    labels.push(format!("max{stream}.{channel}"));
                }
            }
        }
        output.set_labels(labels);
    }

    fn enter(&mut self, inputs: &[Stream], _output: &mut Stream) -> Result<(), PipelineError> {
        if inputs.is_empty() || inputs[0].dim() < 1 {
            return Err(PipelineError::validation(&self.name, "invalid input stream"));
        }
        let num = inputs[0].num();
        for (index, input) in inputs.iter().enumerate() {
            if input.num() != num {
                return Err(PipelineError::validation(
                    &self.name,
                    format!(
                        "input {index} delivers {} samples per window, expected {num}",
                        input.num()
                    ),
                ));
            }
            if !input.kind().is_numeric() {
                return Err(PipelineError::validation(
                    &self.name,
                    format!("input {index} has non-numeric kind {}", input.kind()),
                ));
            }
        }
        self.options.freeze();
        Ok(())
    }

    fn transform(&mut self, inputs: &[Stream], output: &mut Stream) -> Result<(), PipelineError> {
        let emit_min = self.options.get_bool("min")?;
        let emit_max = self.options.get_bool("max")?;
        let channels: usize = inputs.iter().map(Stream::dim).sum();

        let mut mins = vec![f64::MAX; channels];
        let mut maxs = vec![f64::MIN; channels];
        let mut offset = 0usize;
        for input in inputs {
            for i in 0..input.num() {
                for k in 0..input.dim() {
                    let value = input.data().element_as_f64(i * input.dim() + k)?;
                    let t = offset + k;
                    if value < mins[t] {
                        mins[t] = value;
                    }
                    if value > maxs[t] {
                        maxs[t] = value;
                    }
                }
            }
            offset += input.dim();
        }

        let out = output.as_f32_mut()?;
        let mut j = 0usize;
        for t in 0..channels {
            if emit_min {
                out[j] = mins[t] as f32;
                j += 1;
            }
            if emit_max {
                out[j] = maxs[t] as f32;
                j += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SampleData;

    fn window(values: &[f32], dim: usize, rate: f64) -> Stream {
        Stream::from_parts(values.len() / dim, dim, rate, SampleData::F32(values.to_vec()))
            .expect("test window")
    }

    fn negotiate(minmax: &mut MinMax, inputs: &[Stream]) -> Stream {
        let dim = minmax.output_dim(inputs).unwrap();
        let kind = minmax.output_kind(inputs).unwrap();
        let num = minmax.output_num(inputs[0].num());
        let mut output = Stream::new(num, dim, 10.0, kind).unwrap();
        minmax.define_output_labels(inputs, &mut output);
        minmax.enter(inputs, &mut output).unwrap();
        output
    }

    #[test]
    fn test_min_only_single_channel() {
        let mut minmax = MinMax::new("mm");
        minmax
            .options_mut()
            .set("max", OptionValue::Bool(false))
            .unwrap();

        let input = window(&[5.0, 1.0, 3.0], 1, 30.0);
        let mut output = negotiate(&mut minmax, std::slice::from_ref(&input));
        assert_eq!(output.dim(), 1);

        minmax
            .transform(std::slice::from_ref(&input), &mut output)
            .unwrap();
        assert_eq!(output.as_f32().unwrap(), &[1.0]);
    }

    #[test]
    fn test_min_and_max_interleaved() {
        let mut minmax = MinMax::new("mm");
        let input = window(&[5.0, 1.0, 3.0], 1, 30.0);
        let mut output = negotiate(&mut minmax, std::slice::from_ref(&input));
        assert_eq!(output.dim(), 2);

        minmax
            .transform(std::slice::from_ref(&input), &mut output)
            .unwrap();
        assert_eq!(output.as_f32().unwrap(), &[1.0, 5.0]);
    }

    #[test]
    fn test_multi_channel_ordering() {
        let mut minmax = MinMax::new("mm");
        // two samples of [a, b]: (1, 10), (3, -2)
        let input = window(&[1.0, 10.0, 3.0, -2.0], 2, 20.0);
        let mut output = negotiate(&mut minmax, std::slice::from_ref(&input));
        assert_eq!(output.dim(), 4);

        minmax
            .transform(std::slice::from_ref(&input), &mut output)
            .unwrap();
        // [min ch0, max ch0, min ch1, max ch1]
        assert_eq!(output.as_f32().unwrap(), &[1.0, 3.0, -2.0, 10.0]);
    }

    #[test]
    fn test_generated_labels() {
        let mut minmax = MinMax::new("mm");
        let input = window(&[1.0, 2.0], 2, 10.0);
        let output = negotiate(&mut minmax, std::slice::from_ref(&input));
        assert_eq!(output.labels(), &["min0.0", "max0.0", "min0.1", "max0.1"]);
    }

    #[test]
    fn test_label_override_wrong_length_falls_back() {
        let mut minmax = MinMax::new("mm");
        minmax
            .options_mut()
            .set(
                "output_labels",
                OptionValue::TextList(vec!["just_one".into()]),
            )
            .unwrap();
        let input = window(&[1.0], 1, 10.0);
        let output = negotiate(&mut minmax, std::slice::from_ref(&input));
        assert_eq!(output.labels(), &["min0.0", "max0.0"]);
    }

    #[test]
    fn test_no_statistic_selected_rejected() {
        let mut minmax = MinMax::new("mm");
        minmax
            .options_mut()
            .set("min", OptionValue::Bool(false))
            .unwrap();
        minmax
            .options_mut()
            .set("max", OptionValue::Bool(false))
            .unwrap();
        let input = window(&[1.0], 1, 10.0);
        assert!(minmax.output_dim(std::slice::from_ref(&input)).is_err());
    }

    #[test]
    fn test_mismatched_sample_counts_rejected() {
        let mut minmax = MinMax::new("mm");
        let a = window(&[1.0, 2.0], 1, 10.0);
        let b = window(&[1.0], 1, 5.0);
        let inputs = vec![a, b];
        minmax.output_dim(&inputs).unwrap();
        let mut output = Stream::new(1, 4, 5.0, SampleType::F32).unwrap();
        assert!(minmax.enter(&inputs, &mut output).is_err());
    }
}
