// Shared test helpers: fake /proc/net/dev tables

#![allow(dead_code)]

use std::path::{Path, PathBuf};

const HEADER: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
";

/// Renders a /proc/net/dev table with the given (interface, rx_bytes, tx_bytes) rows.
pub fn net_dev_content(rows: &[(&str, u64, u64)]) -> String {
    let mut out = String::from(HEADER);
    for (name, rx, tx) in rows {
        out.push_str(&format!(
            "{:>6}: {} 10 0 0 0 0 0 0 {} 10 0 0 0 0 0 0\n",
            name, rx, tx
        ));
    }
    out
}

/// Writes the table to `dir/net_dev` (replacing it atomically) and returns the path.
pub fn write_net_dev(dir: &Path, rows: &[(&str, u64, u64)]) -> PathBuf {
    let path = dir.join("net_dev");
    let tmp = dir.join("net_dev.new");
    std::fs::write(&tmp, net_dev_content(rows)).unwrap();
    std::fs::rename(&tmp, &path).unwrap();
    path
}
