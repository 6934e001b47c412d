//! Blueprint assembly - builds a runnable Pipeline from a parsed blueprint
//!
//! Sources get one provider each; transformer outputs are registered under
//! the transformer's id so later components can chain on them by name.

use std::collections::HashMap;

use tracing::debug;

use components::{build_consumer, build_source, build_transformer};
use contracts::{PipelineBlueprint, PipelineError};
use pipeline::{Pipeline, PipelineConfig, ProviderKey};

/// Build an unstarted pipeline from a validated blueprint
pub fn assemble(blueprint: &PipelineBlueprint) -> Result<Pipeline, PipelineError> {
    let config = PipelineConfig::from_settings(&blueprint.settings);
    let mut pipeline = Pipeline::new(config);

    let mut providers: HashMap<String, ProviderKey> = HashMap::new();

    for spec in &blueprint.sources {
        let source = build_source(spec)?;
        let key = pipeline.add_source(source)?;
        let provider = pipeline.add_provider(key, Vec::new())?;
        providers.insert(spec.id.clone(), provider);
        debug!(source = %spec.id, "source assembled");
    }

    for spec in &blueprint.transformers {
        let component = build_transformer(spec)?;
        let inputs = resolve_inputs(&providers, &spec.id, &spec.inputs)?;
        let output =
            pipeline.add_transformer(component, &inputs, spec.frame, spec.overlap)?;
        providers.insert(spec.id.clone(), output);
        debug!(transformer = %spec.id, inputs = spec.inputs.len(), "transformer assembled");
    }

    for spec in &blueprint.consumers {
        let component = build_consumer(spec)?;
        let inputs = resolve_inputs(&providers, &spec.id, &spec.inputs)?;
        pipeline.add_consumer(component, &inputs, spec.frame, spec.overlap)?;
        debug!(consumer = %spec.id, inputs = spec.inputs.len(), "consumer assembled");
    }

    Ok(pipeline)
}

fn resolve_inputs(
    providers: &HashMap<String, ProviderKey>,
    component: &str,
    inputs: &[String],
) -> Result<Vec<ProviderKey>, PipelineError> {
    inputs
        .iter()
        .map(|id| {
            providers.get(id).copied().ok_or_else(|| {
                PipelineError::validation(component, format!("unknown input '{id}'"))
            })
        })
        .collect()
}
