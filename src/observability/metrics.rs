use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounterVec,
    pub assignments_total: IntCounterVec,
    pub offers_submitted_total: IntCounter,
    pub events_published_total: IntCounterVec,
    pub events_in_queue: IntGauge,
    pub orders_open: IntGauge,
    pub drivers_online: IntGauge,
    pub time_to_assignment_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let orders_created_total = IntCounterVec::new(
            Opts::new("orders_created_total", "Orders created by pricing option"),
            &["pricing"],
        )
        .expect("valid orders_created_total metric");

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Assignment attempts by mode and outcome"),
            &["mode", "outcome"],
        )
        .expect("valid assignments_total metric");

        let offers_submitted_total =
            IntCounter::new("offers_submitted_total", "Total offers submitted by drivers")
                .expect("valid offers_submitted_total metric");

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Notifier events relayed by kind"),
            &["event"],
        )
        .expect("valid events_published_total metric");

        let events_in_queue =
            IntGauge::new("events_in_queue", "Engine events awaiting the notifier relay")
                .expect("valid events_in_queue metric");

        let orders_open = IntGauge::new("orders_open", "Orders not yet in a terminal state")
            .expect("valid orders_open metric");

        let drivers_online = IntGauge::new("drivers_online", "Drivers currently online")
            .expect("valid drivers_online metric");

        let time_to_assignment_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "time_to_assignment_seconds",
                "Time from order creation to driver assignment in seconds",
            ),
            &["mode"],
        )
        .expect("valid time_to_assignment_seconds metric");

        registry
            .register(Box::new(orders_created_total.clone()))
            .expect("register orders_created_total");
        registry
            .register(Box::new(assignments_total.clone()))
            .expect("register assignments_total");
        registry
            .register(Box::new(offers_submitted_total.clone()))
            .expect("register offers_submitted_total");
        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");
        registry
            .register(Box::new(events_in_queue.clone()))
            .expect("register events_in_queue");
        registry
            .register(Box::new(orders_open.clone()))
            .expect("register orders_open");
        registry
            .register(Box::new(drivers_online.clone()))
            .expect("register drivers_online");
        registry
            .register(Box::new(time_to_assignment_seconds.clone()))
            .expect("register time_to_assignment_seconds");

        Self {
            registry,
            orders_created_total,
            assignments_total,
            offers_submitted_total,
            events_published_total,
            events_in_queue,
            orders_open,
            drivers_online,
            time_to_assignment_seconds,
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
