use parking_lot::Mutex;
use prometheus::{Gauge, Registry};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hsmp_raw::current_arch::mailbox::MessageId;

use crate::error::{HsmpError, Result};
use crate::metrics::SocketMetric;
use crate::session::Hsmp;

pub struct HsmpMetricExporter {
    hsmp: Arc<Hsmp>,
    registry: Arc<Registry>,
    sockets: usize,
    socket_gauges: HashMap<SocketMetric, HashMap<usize, Gauge>>,
    /// Messages this firmware cannot answer; never retried
    skipped: Mutex<HashSet<MessageId>>,
}

impl HsmpMetricExporter {
    /// Runs discovery, so a system without HSMP fails here rather than in
    /// the collection loop
    pub fn new(hsmp: Arc<Hsmp>) -> Result<Self> {
        let sockets = hsmp.enter(None)?.topology.socket_count();

        let mut exporter = Self {
            hsmp,
            registry: Arc::new(Registry::new()),
            sockets,
            socket_gauges: HashMap::new(),
            skipped: Mutex::new(HashSet::new()),
        };

        exporter.register_metrics()?;

        Ok(exporter)
    }

    fn register_metrics(&mut self) -> Result<()> {
        for metric in SocketMetric::all() {
            let opts = prometheus::Opts::new(metric.name(), metric.help());

            let mut socket_map = HashMap::new();
            for socket in 0..self.sockets {
                let gauge =
                    Gauge::with_opts(opts.clone().const_label("socket", socket.to_string()))?;
                self.registry.register(Box::new(gauge.clone()))?;
                socket_map.insert(socket, gauge);
            }
            self.socket_gauges.insert(metric, socket_map);
        }

        Ok(())
    }

    fn read(&self, socket: usize, msg: MessageId) -> Result<Vec<(SocketMetric, f64)>> {
        let hsmp = &self.hsmp;
        let values = match msg {
            MessageId::GetSocketPower => {
                vec![(SocketMetric::SocketPower, hsmp.socket_power(socket)? as f64)]
            }
            MessageId::GetSocketPowerLimit => {
                vec![(SocketMetric::PowerLimit, hsmp.socket_power_limit(socket)? as f64)]
            }
            MessageId::GetSocketPowerLimitMax => vec![(
                SocketMetric::MaxPowerLimit,
                hsmp.socket_max_power_limit(socket)? as f64,
            )],
            MessageId::GetFclkMclk => {
                let clocks = hsmp.fabric_clocks(socket)?;
                vec![
                    (SocketMetric::FabricClock, clocks.fclk_mhz as f64),
                    (SocketMetric::MemoryClock, clocks.mclk_mhz as f64),
                ]
            }
            MessageId::GetCclkThrottleLimit => vec![(
                SocketMetric::CoreClockMax,
                hsmp.core_clock_max_frequency(socket)? as f64,
            )],
            MessageId::GetC0Percent => {
                vec![(SocketMetric::C0Residency, hsmp.c0_residency(socket)? as f64)]
            }
            MessageId::GetProcHot => {
                let asserted = if hsmp.proc_hot(socket)? { 1.0 } else { 0.0 };
                vec![(SocketMetric::ProcHot, asserted)]
            }
            MessageId::GetDdrBandwidth => {
                let bw = hsmp.ddr_bandwidths(socket)?;
                vec![
                    (SocketMetric::DdrMaxBandwidth, bw.max_gbps as f64),
                    (SocketMetric::DdrUtilizedBandwidth, bw.utilized_gbps as f64),
                    (SocketMetric::DdrUtilizedPercent, bw.utilized_pct as f64),
                ]
            }
            other => {
                tracing::warn!("No gauge is fed by {}", other.name());
                Vec::new()
            }
        };
        Ok(values)
    }

    /// Refresh every gauge once; blocks on mailbox transactions
    pub fn collect(&self) {
        if self.hsmp.is_disabled() {
            return;
        }

        for msg in SocketMetric::messages() {
            if self.skipped.lock().contains(&msg) {
                continue;
            }

            for socket in 0..self.sockets {
                match self.read(socket, msg) {
                    Ok(values) => {
                        for (metric, value) in values {
                            if let Some(gauge) = self
                                .socket_gauges
                                .get(&metric)
                                .and_then(|m| m.get(&socket))
                            {
                                gauge.set(value);
                            }
                        }
                    }
                    Err(
                        e @ (HsmpError::VersionMismatch { .. }
                        | HsmpError::FirmwareRejected { .. }),
                    ) => {
                        tracing::debug!("Skipping {} from now on: {}", msg.name(), e);
                        self.skipped.lock().insert(msg);
                        break;
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to read {} for socket {}: {}",
                            msg.name(),
                            socket,
                            e
                        );
                    }
                }
            }
        }
    }

    async fn collect_loop(exporter: Arc<Self>, cancel_token: CancellationToken) {
        tracing::warn!("Starting HSMP export loop over {} sockets", exporter.sockets);

        let mut interval = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("HSMP export loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let exp = Arc::clone(&exporter);
                    if let Err(e) = tokio::task::spawn_blocking(move || exp.collect()).await {
                        tracing::error!("Collection task failed: {}", e);
                    }
                }
            }
        }
    }

    pub fn start(self: &Arc<Self>, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Self::collect_loop(Arc::clone(self), cancel_token))
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_hsmp;

    fn gauge_value(registry: &Registry, name: &str, socket: usize) -> Option<f64> {
        registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .find(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|l| l.get_name() == "socket" && l.get_value() == socket.to_string())
            })
            .map(|metric| metric.get_gauge().get_value())
    }

    #[test]
    fn test_collect_sets_socket_gauges() {
        let (hsmp, platform) = fake_hsmp("prom-collect", 2, 3);
        platform.socket(1).firmware().socket_power = 110_000;
        platform.socket(1).firmware().proc_hot = 1;

        let exporter = HsmpMetricExporter::new(Arc::new(hsmp)).unwrap();
        exporter.collect();
        let registry = exporter.registry();

        assert_eq!(gauge_value(&registry, "hsmp_socket_power_mw", 0), Some(95_000.0));
        assert_eq!(gauge_value(&registry, "hsmp_socket_power_mw", 1), Some(110_000.0));
        assert_eq!(gauge_value(&registry, "hsmp_proc_hot", 0), Some(0.0));
        assert_eq!(gauge_value(&registry, "hsmp_proc_hot", 1), Some(1.0));
        assert_eq!(gauge_value(&registry, "hsmp_fclk_mhz", 1), Some(1467.0));
        assert_eq!(gauge_value(&registry, "hsmp_mclk_mhz", 1), Some(1600.0));
        assert_eq!(gauge_value(&registry, "hsmp_ddr_max_bandwidth_gbps", 0), Some(204.0));
        assert_eq!(gauge_value(&registry, "hsmp_ddr_utilized_bandwidth_gbps", 0), Some(51.0));
        assert_eq!(gauge_value(&registry, "hsmp_ddr_utilized_percent", 0), Some(25.0));
    }

    #[test]
    fn test_every_metric_has_a_reader() {
        let (hsmp, _platform) = fake_hsmp("prom-readers", 1, 3);
        let exporter = HsmpMetricExporter::new(Arc::new(hsmp)).unwrap();

        let mut fed = Vec::new();
        for msg in SocketMetric::messages() {
            let values = exporter.read(0, msg).unwrap();
            assert!(!values.is_empty(), "{} feeds no gauge", msg.name());
            for (metric, _) in values {
                assert_eq!(metric.message(), msg);
                fed.push(metric);
            }
        }
        assert_eq!(fed, SocketMetric::all());

        assert!(exporter.read(0, MessageId::Test).unwrap().is_empty());
    }

    #[test]
    fn test_unavailable_messages_are_skipped() {
        let (hsmp, platform) = fake_hsmp("prom-skip", 1, 2);
        platform.socket(0).firmware().rejected.push(MessageId::GetC0Percent.id());

        let exporter = HsmpMetricExporter::new(Arc::new(hsmp)).unwrap();
        let probed = platform.transactions();
        exporter.collect();
        let first = platform.transactions() - probed;
        exporter.collect();
        let second = platform.transactions() - probed - first;
        // C0 residency is not retried on the second pass
        assert_eq!(second, first - 1);

        let fw = platform.socket(0).firmware();
        let c0_sends = fw
            .sent()
            .iter()
            .filter(|&&id| id == MessageId::GetC0Percent.id())
            .count();
        assert_eq!(c0_sends, 1);
        assert!(!fw.sent().contains(&MessageId::GetDdrBandwidth.id()));
    }
}
