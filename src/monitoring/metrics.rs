use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec, Registry};

/// Process-wide Prometheus registry, exposed over HTTP by the Push Hub's
/// `/metrics` route. Counts the things an operator actually watches: trade
/// throughput by type, PnL updates, RPC call volume, and live push
/// connections.
pub struct Metrics {
    registry: Registry,
    pub trades_total: CounterVec,
    pub pnl_updates_total: CounterVec,
    pub rpc_calls_total: CounterVec,
    pub push_connections: GaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let trades_total = register_counter_vec!("trades_total", "Classified trades persisted", &["type"])?;
        registry.register(Box::new(trades_total.clone()))?;

        let pnl_updates_total = register_counter_vec!(
            "pnl_updates_total",
            "Daily PnL rows written",
            &["wallet"]
        )?;
        registry.register(Box::new(pnl_updates_total.clone()))?;

        let rpc_calls_total = register_counter_vec!(
            "rpc_calls_total",
            "Chain RPC calls by method and outcome",
            &["method", "outcome"]
        )?;
        registry.register(Box::new(rpc_calls_total.clone()))?;

        let push_connections = register_gauge_vec!(
            "push_connections",
            "Currently connected push subscribers",
            &["endpoint"]
        )?;
        registry.register(Box::new(push_connections.clone()))?;

        Ok(Self {
            registry,
            trades_total,
            pnl_updates_total,
            rpc_calls_total,
            push_connections,
        })
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        encoder.encode_to_string(&self.registry.gather())
    }
}
