//! Proxy domain entity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProxyTransport {
    Direct,
    Socks5,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub id: i64,
    pub transport: ProxyTransport,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub rotation_group: String,
    /// When true, the Scheduler serialises access to this proxy across
    /// every account bound to it.
    pub exclusive: bool,
}
