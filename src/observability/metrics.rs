use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub dispatch_cycles_total: IntCounterVec,
    pub dispatch_offers_total: IntCounter,
    pub accept_rejections_total: IntCounter,
    pub active_rooms: IntGauge,
    pub connected_sessions: IntGauge,
    pub chat_messages_total: IntCounter,
    pub location_samples_total: IntCounter,
    pub route_polls_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let dispatch_cycles_total = IntCounterVec::new(
            Opts::new(
                "dispatch_cycles_total",
                "Resolved dispatch cycles by outcome",
            ),
            &["outcome"],
        )
        .expect("valid dispatch_cycles_total metric");

        let dispatch_offers_total = IntCounter::new(
            "dispatch_offers_total",
            "Offers pushed to candidate delivery agents",
        )
        .expect("valid dispatch_offers_total metric");

        let accept_rejections_total = IntCounter::new(
            "accept_rejections_total",
            "Accepts refused because the offer was gone",
        )
        .expect("valid accept_rejections_total metric");

        let active_rooms = IntGauge::new("active_rooms", "Live order rooms currently held")
            .expect("valid active_rooms metric");

        let connected_sessions =
            IntGauge::new("connected_sessions", "Open websocket sessions")
                .expect("valid connected_sessions metric");

        let chat_messages_total =
            IntCounter::new("chat_messages_total", "Chat messages relayed")
                .expect("valid chat_messages_total metric");

        let location_samples_total =
            IntCounter::new("location_samples_total", "Location samples relayed")
                .expect("valid location_samples_total metric");

        let route_polls_total = IntCounterVec::new(
            Opts::new("route_polls_total", "Routing service polls by outcome"),
            &["outcome"],
        )
        .expect("valid route_polls_total metric");

        registry
            .register(Box::new(dispatch_cycles_total.clone()))
            .expect("register dispatch_cycles_total");
        registry
            .register(Box::new(dispatch_offers_total.clone()))
            .expect("register dispatch_offers_total");
        registry
            .register(Box::new(accept_rejections_total.clone()))
            .expect("register accept_rejections_total");
        registry
            .register(Box::new(active_rooms.clone()))
            .expect("register active_rooms");
        registry
            .register(Box::new(connected_sessions.clone()))
            .expect("register connected_sessions");
        registry
            .register(Box::new(chat_messages_total.clone()))
            .expect("register chat_messages_total");
        registry
            .register(Box::new(location_samples_total.clone()))
            .expect("register location_samples_total");
        registry
            .register(Box::new(route_polls_total.clone()))
            .expect("register route_polls_total");

        Self {
            registry,
            dispatch_cycles_total,
            dispatch_offers_total,
            accept_rejections_total,
            active_rooms,
            connected_sessions,
            chat_messages_total,
            location_samples_total,
            route_polls_total,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
