use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounterVec,
    pub order_transitions_total: IntCounterVec,
    pub claims_total: IntCounterVec,
    pub geocode_lookups_total: IntCounterVec,
    pub fare_estimates_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn counter(name: &str, help: &str, label: &str) -> IntCounterVec {
    IntCounterVec::new(Opts::new(name, help), &[label]).expect("valid counter metric")
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total = counter("orders_created_total", "Orders created by kind", "kind");
        let order_transitions_total = counter(
            "order_transitions_total",
            "Order status transitions by target status",
            "to",
        );
        let claims_total = counter("claims_total", "Driver claim attempts by outcome", "outcome");
        let geocode_lookups_total = counter(
            "geocode_lookups_total",
            "Map link resolutions by outcome",
            "outcome",
        );
        let fare_estimates_total = counter(
            "fare_estimates_total",
            "Fare estimates by distance source",
            "source",
        );

        for collector in [
            &orders_created_total,
            &order_transitions_total,
            &claims_total,
            &geocode_lookups_total,
            &fare_estimates_total,
        ] {
            registry
                .register(Box::new(collector.clone()))
                .expect("register counter metric");
        }

        Self {
            registry,
            orders_created_total,
            order_transitions_total,
            claims_total,
            geocode_lookups_total,
            fare_estimates_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
