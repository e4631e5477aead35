use crate::task::Task;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    request_counter: Counter<u64>,
    inference_duration: Histogram<u64>,
    rendered_objects: Counter<u64>,
    pub registry: Registry,
}

#[derive(thiserror::Error, Debug)]
#[error("Failed to build metrics exporter: {0}")]
pub struct MetricsError(String);

impl Metrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| MetricsError(e.to_string()))?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("vision_web");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        // DETR at 800px on CPU takes seconds, not milliseconds
        let boundaries = generate_boundaries((50, 250, 1000, 5000, 30000));

        let inference_duration = meter
            .u64_histogram("inference_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of model inference in milliseconds")
            .build();

        let rendered_objects = meter
            .u64_counter("rendered_objects_total")
            .with_description("Detections or instances drawn onto processed images")
            .build();

        Ok(Metrics {
            request_counter,
            inference_duration,
            rendered_objects,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = vec![KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_inference_duration(&self, duration_ms: u64, task: Task) {
        let attributes = vec![KeyValue::new("task", task.as_str())];
        self.inference_duration.record(duration_ms, &attributes);
    }

    pub fn record_rendered_objects(&self, count: usize, task: Task) {
        let attributes = vec![KeyValue::new("task", task.as_str())];
        self.rendered_objects.add(count as u64, &attributes);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 50;
    let middle_step: usize = 250;
    let end_step: usize = 1000;
    let tail_step: usize = 5000;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (50, 150, 650, 2650, 12650);
        let get = generate_boundaries(parts);
        let expected = vec![
            50.0, 100.0, 150.0, 400.0, 650.0, 1650.0, 2650.0, 7650.0, 12650.0,
        ];

        assert_eq!(get, expected);
    }
}
