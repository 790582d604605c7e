use hsmp_raw::current_arch::mailbox::MessageId;

metric_enum! {
    /// Per-socket gauges published by the exporter
    pub enum SocketMetric {
        SocketPower => "hsmp_socket_power_mw",
        PowerLimit => "hsmp_socket_power_limit_mw",
        MaxPowerLimit => "hsmp_socket_power_limit_max_mw",
        FabricClock => "hsmp_fclk_mhz",
        MemoryClock => "hsmp_mclk_mhz",
        CoreClockMax => "hsmp_cclk_limit_mhz",
        C0Residency => "hsmp_c0_residency_percent",
        ProcHot => "hsmp_proc_hot",
        DdrMaxBandwidth => "hsmp_ddr_max_bandwidth_gbps",
        DdrUtilizedBandwidth => "hsmp_ddr_utilized_bandwidth_gbps",
        DdrUtilizedPercent => "hsmp_ddr_utilized_percent",
    }
}

impl SocketMetric {
    pub fn help(&self) -> &'static str {
        match self {
            SocketMetric::SocketPower => "Average socket power in mW",
            SocketMetric::PowerLimit => "Socket power limit in mW",
            SocketMetric::MaxPowerLimit => "Highest settable socket power limit in mW",
            SocketMetric::FabricClock => "Data fabric clock in MHz",
            SocketMetric::MemoryClock => "Memory clock in MHz",
            SocketMetric::CoreClockMax => "Core clock ceiling under current limits in MHz",
            SocketMetric::C0Residency => "Share of time cores spent in C0",
            SocketMetric::ProcHot => "1 while PROC_HOT is asserted",
            SocketMetric::DdrMaxBandwidth => "Theoretical maximum DDR bandwidth in GB/s",
            SocketMetric::DdrUtilizedBandwidth => "Utilised DDR bandwidth in GB/s",
            SocketMetric::DdrUtilizedPercent => "Utilised share of DDR bandwidth",
        }
    }

    /// Mailbox message the value is read with; several metrics share one
    pub fn message(&self) -> MessageId {
        match self {
            SocketMetric::SocketPower => MessageId::GetSocketPower,
            SocketMetric::PowerLimit => MessageId::GetSocketPowerLimit,
            SocketMetric::MaxPowerLimit => MessageId::GetSocketPowerLimitMax,
            SocketMetric::FabricClock | SocketMetric::MemoryClock => MessageId::GetFclkMclk,
            SocketMetric::CoreClockMax => MessageId::GetCclkThrottleLimit,
            SocketMetric::C0Residency => MessageId::GetC0Percent,
            SocketMetric::ProcHot => MessageId::GetProcHot,
            SocketMetric::DdrMaxBandwidth
            | SocketMetric::DdrUtilizedBandwidth
            | SocketMetric::DdrUtilizedPercent => MessageId::GetDdrBandwidth,
        }
    }

    /// Distinct messages needed to refresh every metric, in metric order
    pub fn messages() -> Vec<MessageId> {
        let mut messages: Vec<MessageId> = Vec::new();
        for metric in SocketMetric::all() {
            if !messages.contains(&metric.message()) {
                messages.push(metric.message());
            }
        }
        messages
    }
}
