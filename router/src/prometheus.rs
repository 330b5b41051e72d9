use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

/// Histogram buckets for the router metrics. The recorder is served by the `/metrics` route.
pub fn prometheus_builder(max_batch_size: usize) -> Result<PrometheusBuilder, BuildError> {
    // Duration buckets
    let duration_matcher = Matcher::Suffix(String::from("duration"));
    let n_duration_buckets = 35;
    let mut duration_buckets = Vec::with_capacity(n_duration_buckets);
    // Minimum duration in seconds
    let mut value = 0.00001;
    for _ in 0..n_duration_buckets {
        // geometric sequence
        value *= 1.5;
        duration_buckets.push(value);
    }

    // Batch size buckets
    let batch_size_matcher = Matcher::Full(String::from("tr_batch_size"));
    let batch_size_buckets: Vec<f64> = (0..13)
        .map(|x| 2.0_f64.powi(x))
        .filter(|x| (*x as usize) <= max_batch_size.next_power_of_two())
        .collect();

    // Request inputs buckets
    let inputs_matcher = Matcher::Full(String::from("tr_request_inputs"));
    let inputs_buckets: Vec<f64> = (0..17).map(|x| 2.0_f64.powi(x)).collect();

    PrometheusBuilder::new()
        .set_buckets_for_metric(duration_matcher, &duration_buckets)?
        .set_buckets_for_metric(batch_size_matcher, &batch_size_buckets)?
        .set_buckets_for_metric(inputs_matcher, &inputs_buckets)
}
