// Parser for the Linux /proc/net/dev interface statistics table.

/// Receive/transmit byte counters for one row of `/proc/net/dev`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDevCounters {
    /// Interface name (eth0, wlan0, lo, ...)
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Why a single row could not be turned into counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub interface: String,
    pub reason: &'static str,
}

/// Parses `/proc/net/dev` content.
///
/// Format:
/// Inter-|   Receive                                                |  Transmit
///  face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
///    lo: 1234567     1234    0    0    0     0          0         0  1234567     1234    0    0    0     0       0          0
///
/// Rows that are not interface rows (headers, blank lines) are skipped. Rows
/// for an interface whose byte columns are missing or non-numeric are returned
/// as errors so the caller can tell "interface absent" from "row garbled".
pub fn parse_net_dev(content: &str) -> Vec<Result<NetDevCounters, MalformedRow>> {
    content
        .lines()
        .filter(|line| !line.contains('|') && !line.trim().is_empty())
        .filter_map(|line| {
            let (name, values) = line.split_once(':')?;
            Some(parse_row(name.trim(), values))
        })
        .collect()
}

/// Looks up one interface. `None` when the interface has no row.
pub fn find_interface(
    content: &str,
    interface: &str,
) -> Option<Result<NetDevCounters, MalformedRow>> {
    parse_net_dev(content).into_iter().find(|row| match row {
        Ok(c) => c.interface == interface,
        Err(m) => m.interface == interface,
    })
}

fn parse_row(name: &str, values: &str) -> Result<NetDevCounters, MalformedRow> {
    let values: Vec<&str> = values.split_whitespace().collect();
    let malformed = |reason| MalformedRow {
        interface: name.to_string(),
        reason,
    };
    if values.len() < 16 {
        return Err(malformed("expected 16 counter columns"));
    }
    // Column 0 is receive bytes, column 8 is transmit bytes.
    let rx_bytes = values[0]
        .parse()
        .map_err(|_| malformed("receive bytes is not an integer"))?;
    let tx_bytes = values[8]
        .parse()
        .map_err(|_| malformed("transmit bytes is not an integer"))?;
    Ok(NetDevCounters {
        interface: name.to_string(),
        rx_bytes,
        tx_bytes,
    })
}
