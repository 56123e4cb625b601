// /proc/net/dev parser: per-interface byte/packet/drop counters

/// Receive/transmit counters for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevCounters {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_drop: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_drop: u64,
}

/// Parse the named interface's line out of /proc/net/dev content.
///
/// Column layout after the interface name (two header lines first):
/// rx: bytes packets errs drop fifo frame compressed multicast,
/// tx: bytes packets errs drop fifo colls carrier compressed.
pub fn parse_interface(content: &str, iface: &str) -> Option<DevCounters> {
    for line in content.lines().skip(2) {
        let line = line.trim();
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        if name.trim() != iface {
            continue;
        }
        let nums: Vec<u64> = rest
            .split_whitespace()
            .map(|f| f.parse::<u64>())
            .collect::<Result<_, _>>()
            .ok()?;
        if nums.len() < 12 {
            return None;
        }
        return Some(DevCounters {
            rx_bytes: nums[0],
            rx_packets: nums[1],
            rx_drop: nums[3],
            tx_bytes: nums[8],
            tx_packets: nums[9],
            tx_drop: nums[11],
        });
    }
    None
}
