/// Pick the serial port to open when the configured port is `AUTO`
///
/// The first available port matching one of the known names wins, otherwise the first
/// available port is used.
pub fn select_port(available: &[String], known: &[String]) -> Option<String> {
    known
        .iter()
        .find_map(|name| available.iter().find(|port| port.eq_ignore_ascii_case(name)))
        .or_else(|| available.first())
        .cloned()
}

/// List the serial ports currently present on the system
pub fn enumerate_ports() -> Vec<String> {
    match tokio_serial::available_ports() {
        Ok(ports) => ports.into_iter().map(|port| port.port_name).collect(),
        Err(error) => {
            warn!(error = %error, "failed to enumerate serial ports");
            Vec::new()
        }
    }
}
