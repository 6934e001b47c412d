//! Blueprint validation
//!
//! Rules:
//! - settings within range (validator derive on `PipelineSettings`)
//! - component ids globally unique
//! - sample rates > 0
//! - every referenced input id exists upstream of its reference
//! - frame/overlap specs well-formed (frame > 0 resolves, overlap < frame)

use std::collections::HashSet;

use validator::Validate;

use contracts::{PipelineBlueprint, PipelineError, WindowSpec};

/// Validate a parsed blueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    validate_settings(blueprint)?;
    validate_unique_ids(blueprint)?;
    validate_sources(blueprint)?;
    validate_graph(blueprint)?;
    Ok(())
}

fn validate_settings(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    blueprint.settings.validate().map_err(|e| {
        PipelineError::config_validation("settings", e.to_string().replace('\n', "; "))
    })
}

fn validate_unique_ids(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    let all_ids = blueprint
        .sources
        .iter()
        .map(|s| &s.id)
        .chain(blueprint.transformers.iter().map(|t| &t.id))
        .chain(blueprint.consumers.iter().map(|c| &c.id));
    for id in all_ids {
        if !seen.insert(id) {
            return Err(PipelineError::config_validation(
                format!("id={id}"),
                "duplicate component id",
            ));
        }
    }
    Ok(())
}

fn validate_sources(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    if blueprint.sources.is_empty() {
        return Err(PipelineError::config_validation(
            "sources",
            "at least one source required",
        ));
    }
    for source in &blueprint.sources {
        if !(source.sample_rate_hz.is_finite() && source.sample_rate_hz > 0.0) {
            return Err(PipelineError::config_validation(
                format!("sources[{}].sample_rate_hz", source.id),
                format!("must be > 0, got {}", source.sample_rate_hz),
            ));
        }
        if source.dim == 0 {
            return Err(PipelineError::config_validation(
                format!("sources[{}].dim", source.id),
                "must be at least 1",
            ));
        }
        if source.chunk_samples == Some(0) {
            return Err(PipelineError::config_validation(
                format!("sources[{}].chunk_samples", source.id),
                "must be at least 1",
            ));
        }
    }
    Ok(())
}

/// Inputs may reference source ids and transformer ids declared *earlier*,
/// which keeps blueprints acyclic by construction.
fn validate_graph(blueprint: &PipelineBlueprint) -> Result<(), PipelineError> {
    let mut upstream: HashSet<&str> = blueprint.sources.iter().map(|s| s.id.as_str()).collect();

    for transformer in &blueprint.transformers {
        validate_inputs(
            &format!("transformers[{}]", transformer.id),
            &transformer.inputs,
            &upstream,
        )?;
        validate_window(
            &format!("transformers[{}]", transformer.id),
            transformer.frame,
            transformer.overlap,
        )?;
        upstream.insert(transformer.id.as_str());
    }

    for consumer in &blueprint.consumers {
        validate_inputs(
            &format!("consumers[{}]", consumer.id),
            &consumer.inputs,
            &upstream,
        )?;
        validate_window(
            &format!("consumers[{}]", consumer.id),
            consumer.frame,
            consumer.overlap,
        )?;
    }
    Ok(())
}

fn validate_inputs(
    field: &str,
    inputs: &[String],
    upstream: &HashSet<&str>,
) -> Result<(), PipelineError> {
    if inputs.is_empty() {
        return Err(PipelineError::config_validation(
            format!("{field}.inputs"),
            "at least one input required",
        ));
    }
    for input in inputs {
        if !upstream.contains(input.as_str()) {
            return Err(PipelineError::config_validation(
                format!("{field}.inputs"),
                format!("unknown or downstream input '{input}'"),
            ));
        }
    }
    Ok(())
}

fn validate_window(
    field: &str,
    frame: WindowSpec,
    overlap: WindowSpec,
) -> Result<(), PipelineError> {
    match frame {
        WindowSpec::Samples(0) => {
            return Err(PipelineError::config_validation(
                format!("{field}.frame"),
                "must be at least 1 sample",
            ))
        }
        WindowSpec::Seconds(s) if !(s.is_finite() && s > 0.0) => {
            return Err(PipelineError::config_validation(
                format!("{field}.frame"),
                format!("must be > 0 seconds, got {s}"),
            ))
        }
        _ => {}
    }
    if let WindowSpec::Seconds(s) = overlap {
        if !(s.is_finite() && s >= 0.0) {
            return Err(PipelineError::config_validation(
                format!("{field}.overlap"),
                format!("must be >= 0 seconds, got {s}"),
            ));
        }
    }
    // Same-unit specs can be compared here; mixed units resolve per
    // provider rate at registration time.
    if let (WindowSpec::Samples(f), WindowSpec::Samples(o)) = (frame, overlap) {
        if o >= f {
            return Err(PipelineError::config_validation(
                format!("{field}.overlap"),
                format!("overlap {o} must be smaller than frame {f}"),
            ));
        }
    }
    if let (WindowSpec::Seconds(f), WindowSpec::Seconds(o)) = (frame, overlap) {
        if o >= f {
            return Err(PipelineError::config_validation(
                format!("{field}.overlap"),
                format!("overlap {o}s must be smaller than frame {f}s"),
            ));
        }
    }
    Ok(())
}
