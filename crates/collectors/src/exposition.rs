//! Prometheus text exposition and JSON rendering of collected samples.
//!
//! Text rendering builds a throwaway registry with one `GaugeVec` per
//! descriptor, so the output holds exactly the samples handed in.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use crate::protocol::{Desc, Sample};

#[derive(Debug, thiserror::Error)]
pub enum ExpositionError {
    #[error("registering {name}: {source}")]
    Register { name: &'static str, source: prometheus::Error },
    #[error("sample for undescribed family {0}")]
    Undescribed(&'static str),
    #[error("labels for {name}: {source}")]
    Labels { name: &'static str, source: prometheus::Error },
    #[error("encoding exposition: {0}")]
    Encode(String),
}

/// Render in the text format. Families come out sorted by name, series by
/// label values; families without samples are omitted.
pub fn render_text(descs: &[Desc], samples: &[Sample]) -> Result<String, ExpositionError> {
    let registry = Registry::new();
    let mut families: Vec<(&'static str, GaugeVec)> = Vec::with_capacity(descs.len());
    for d in descs {
        let gauge = GaugeVec::new(Opts::new(d.name, d.help), d.labels)
            .map_err(|source| ExpositionError::Register { name: d.name, source })?;
        registry
            .register(Box::new(gauge.clone()))
            .map_err(|source| ExpositionError::Register { name: d.name, source })?;
        families.push((d.name, gauge));
    }

    for s in samples {
        let gauge = families
            .iter()
            .find(|(name, _)| *name == s.name)
            .map(|(_, g)| g)
            .ok_or(ExpositionError::Undescribed(s.name))?;
        let values: Vec<&str> = s.labels.iter().map(|(_, v)| v.as_str()).collect();
        gauge
            .get_metric_with_label_values(&values)
            .map_err(|source| ExpositionError::Labels { name: s.name, source })?
            .set(s.value);
    }

    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buf)
        .map_err(|e| ExpositionError::Encode(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| ExpositionError::Encode(e.to_string()))
}

pub fn render_json(samples: &[Sample]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = samples
        .iter()
        .map(|s| {
            let labels: serde_json::Map<String, serde_json::Value> = s
                .labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), serde_json::Value::String(v.clone())))
                .collect();
            serde_json::json!({ "name": s.name, "labels": labels, "value": s.value })
        })
        .collect();
    serde_json::Value::Array(rows)
}
