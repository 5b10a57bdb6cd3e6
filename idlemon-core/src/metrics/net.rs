//! Суммарный сетевой обмен из `/proc/net/dev`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Суммарные байты приёма и передачи по всем интерфейсам, кроме loopback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetTotals {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl NetTotals {
    pub fn transferred(&self) -> u64 {
        self.rx_bytes + self.tx_bytes
    }
}

/// Прочитать суммарный сетевой обмен из файла формата `/proc/net/dev`.
pub fn read_net_totals(path: &Path) -> Result<NetTotals> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_net_totals(&contents))
}

fn parse_net_totals(contents: &str) -> NetTotals {
    let mut totals = NetTotals::default();

    // Первые две строки — заголовки таблицы.
    for line in contents.lines().skip(2) {
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        // Обмен через loopback не нагружает ни сеть, ни диск.
        if name == "lo" {
            continue;
        }

        let fields: Vec<u64> = counters
            .split_whitespace()
            .map(|field| field.parse::<u64>().unwrap_or(0))
            .collect();
        if fields.len() < 16 {
            continue;
        }

        totals.rx_bytes += fields[0];
        totals.tx_bytes += fields[8];
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 9999999    1000    0    0    0     0          0         0  9999999    1000    0    0    0     0       0          0
  eth0: 1000000    5000    0    0    0     0          0         0   500000    4000    0    0    0     0       0          0
 wlan0:  200000    1500    0    0    0     0          0         0   100000    1200    0    0    0     0       0          0
";

    #[test]
    fn test_sums_interfaces_except_loopback() {
        let totals = parse_net_totals(NET_DEV);
        assert_eq!(totals.rx_bytes, 1_200_000);
        assert_eq!(totals.tx_bytes, 600_000);
        assert_eq!(totals.transferred(), 1_800_000);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let totals = parse_net_totals("header\nheader\nnot-a-counter-line\n");
        assert_eq!(totals, NetTotals::default());
    }
}
