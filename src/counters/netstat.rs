// /proc/net/netstat parser: TcpExt connection-open counters

/// TCP connection-establishment counters from the TcpExt section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpOpens {
    pub active_opens: u64,
    pub passive_opens: u64,
}

/// Parse the TcpExt header/value line pair out of /proc/net/netstat content.
/// The file alternates `TcpExt: <names...>` and `TcpExt: <values...>` lines;
/// columns are matched by header name, not position.
pub fn parse_tcp_opens(content: &str) -> Option<TcpOpens> {
    let lines: Vec<&str> = content.lines().collect();
    for pair in lines.windows(2) {
        if !(pair[0].starts_with("TcpExt:") && pair[1].starts_with("TcpExt:")) {
            continue;
        }
        let headers: Vec<&str> = pair[0].split_whitespace().skip(1).collect();
        let values: Vec<&str> = pair[1].split_whitespace().skip(1).collect();
        let lookup = |name: &str| -> Option<u64> {
            let idx = headers.iter().position(|h| *h == name)?;
            values.get(idx)?.parse().ok()
        };
        return Some(TcpOpens {
            active_opens: lookup("ActiveOpens")?,
            passive_opens: lookup("PassiveOpens")?,
        });
    }
    None
}
