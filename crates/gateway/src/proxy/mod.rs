//! Egress Proxy: a CONNECT-only forward proxy that authenticates agents by
//! source IP and enforces a per-agent destination allowlist.
//!
//! Listens on its own TCP port, separate from the HTTP API. Only the
//! `CONNECT` method is accepted here; plain HTTP egress for agents is
//! served by `POST /egress` on the main API port instead.

use std::sync::Arc;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::registry::AgentRegistry;

pub struct EgressProxy {
    registry: Arc<AgentRegistry>,
}

impl EgressProxy {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    pub async fn run(self: Arc<Self>, bind: &str, cancel: CancellationToken) -> anyhow::Result<()> {
        let listener = TcpListener::bind(bind).await?;
        tracing::info!(%bind, "egress proxy listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("egress proxy shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let this = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = this.handle_connection(stream, peer.ip().to_string()).await {
                                    tracing::debug!(error = %e, "egress connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "egress proxy accept failed, continuing");
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer_ip: String) -> anyhow::Result<()> {
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await? == 0 {
            return Ok(());
        }
        let parts: Vec<&str> = request_line.trim_end().splitn(3, ' ').collect();
        if parts.len() < 3 {
            return respond(&mut reader, "400 Bad Request").await;
        }
        let (method, target) = (parts[0], parts[1]);

        let mut agent = self.registry.name_for_ip(&peer_ip);
        loop {
            let mut header_line = String::new();
            if reader.read_line(&mut header_line).await? == 0 {
                break;
            }
            let trimmed = header_line.trim_end();
            if trimmed.is_empty() {
                break;
            }
            if let Some((name, value)) = trimmed.split_once(':') {
                if agent.is_none() && name.trim().eq_ignore_ascii_case("x-agent-name") {
                    agent = Some(value.trim().to_string());
                }
            }
        }

        let Some(agent) = agent else {
            tracing::warn!(%peer_ip, "egress connection with no resolvable agent");
            return respond(&mut reader, "403 Forbidden").await;
        };

        if method != "CONNECT" {
            return respond(&mut reader, "405 Method Not Allowed").await;
        }

        let (host, port) = parse_connect_target(target);
        let url = format!("https://{host}");

        let allowlist = self
            .registry
            .get(&agent)
            .map(|a| a.egress_allowlist)
            .unwrap_or_default();

        if !is_allowed_url(&allowlist, &url) {
            tracing::warn!(%agent, %url, "egress denied");
            return respond(&mut reader, "403 Forbidden").await;
        }

        let upstream = match TcpStream::connect((host.as_str(), port)).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(%agent, %host, port, error = %e, "egress upstream dial failed");
                return respond(&mut reader, "502 Bad Gateway").await;
            }
        };

        let mut client = reader.into_inner();
        client.write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n").await?;

        tracing::info!(%agent, target, "egress tunnel established");
        let mut upstream = upstream;
        tokio::io::copy_bidirectional(&mut client, &mut upstream).await.ok();
        Ok(())
    }
}

async fn respond(reader: &mut BufReader<TcpStream>, status_line: &str) -> anyhow::Result<()> {
    let stream = reader.get_mut();
    stream.write_all(format!("HTTP/1.1 {status_line}\r\n\r\n").as_bytes()).await?;
    Ok(())
}

fn parse_connect_target(target: &str) -> (String, u16) {
    match target.rsplit_once(':') {
        Some((host, port_str)) => match port_str.parse::<u16>() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (target.to_string(), 443),
        },
        None => (target.to_string(), 443),
    }
}

/// Each pattern is converted to a regex by escaping literal characters,
/// replacing `*` with `.*`, and anchoring at the start. An empty allowlist
/// denies everything. Exposed for the `POST /egress` HTTP helper, which
/// enforces the same allowlist as the CONNECT proxy.
pub fn is_allowed_url(allowlist: &[String], url: &str) -> bool {
    if allowlist.is_empty() {
        return false;
    }
    allowlist.iter().any(|pattern| glob_to_regex(pattern).is_match(url))
}

fn glob_to_regex(pattern: &str) -> Regex {
    let mut escaped = String::from("^");
    for part in pattern.split('*') {
        escaped.push_str(&regex::escape(part));
        escaped.push_str(".*");
    }
    // One trailing ".*" too many from the loop; strip it unless the
    // pattern actually ended with `*`.
    if !pattern.ends_with('*') {
        escaped.truncate(escaped.len() - 2);
    }
    Regex::new(&escaped).unwrap_or_else(|_| Regex::new("^$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_connect_target_defaults_to_443() {
        assert_eq!(parse_connect_target("api.example.com"), ("api.example.com".to_string(), 443));
        assert_eq!(parse_connect_target("api.example.com:8443"), ("api.example.com".to_string(), 8443));
    }

    #[test]
    fn empty_allowlist_denies_everything() {
        assert!(!is_allowed_url(&[], "https://api.example.com"));
    }

    #[test]
    fn glob_star_matches_prefix() {
        let allowlist = vec!["https://api.example.com/*".to_string()];
        assert!(is_allowed_url(&allowlist, "https://api.example.com/v1/thing"));
        assert!(!is_allowed_url(&allowlist, "https://other.example.com"));
    }

    #[test]
    fn literal_pattern_matches_exactly() {
        let allowlist = vec!["https://api.example.com".to_string()];
        assert!(is_allowed_url(&allowlist, "https://api.example.com"));
    }
}
