//! Transport selection for configured banks.
//!
//! Without the `hardware` feature every bank is simulated. With it, only
//! banks whose port is `sim` (or `sim:<anything>`) are.

use ptcal_config::{BankCfg, Config};
use ptcal_hardware::{SimPressure, SimulatedLink};
use ptcal_traits::SerialLink;

pub fn is_sim_port(port: &str) -> bool {
    port == "sim" || port.starts_with("sim:")
}

fn simulated(bank: &BankCfg, pressure: &SimPressure) -> Box<dyn SerialLink + Send> {
    Box::new(
        SimulatedLink::new(bank.sensor_count, &bank.stop_bytes())
            .with_pressure(pressure.clone())
            .from_env(),
    )
}

/// Open the link for `bank`. Simulated banks read `pressure`.
pub fn open_link(
    cfg: &Config,
    bank: &BankCfg,
    pressure: &SimPressure,
) -> eyre::Result<Box<dyn SerialLink + Send>> {
    #[cfg(feature = "hardware")]
    {
        use eyre::WrapErr;
        if !is_sim_port(&bank.port) {
            let baud = bank.effective_baud(&cfg.serial);
            let timeout = std::time::Duration::from_millis(cfg.serial.timeout_ms);
            let link = ptcal_hardware::SerialPortLink::open(&bank.port, baud, timeout)
                .wrap_err_with(|| format!("open serial port {} for bank '{}'", bank.port, bank.name))?;
            tracing::info!(bank = %bank.id(), port = %bank.port, baud, "serial port opened");
            return Ok(Box::new(link));
        }
    }
    #[cfg(not(feature = "hardware"))]
    {
        let _ = cfg;
        if !is_sim_port(&bank.port) {
            tracing::debug!(bank = %bank.id(), port = %bank.port, "hardware support not compiled in; simulating");
        }
    }
    Ok(simulated(bank, pressure))
}

/// Serial ports on this host.
pub fn list_ports() -> eyre::Result<Vec<String>> {
    #[cfg(feature = "hardware")]
    {
        use eyre::WrapErr;
        ptcal_hardware::available_ports().wrap_err("enumerate serial ports")
    }
    #[cfg(not(feature = "hardware"))]
    {
        Ok(Vec::new())
    }
}
