// [libs/core/persistence/src/repositories/proxies.rs]
//! Proxy repository: a small, mostly-static table the Scheduler
//! consults when binding an account to its assigned proxy.

use crate::errors::PersistenceError;
use crate::store::Store;
use libsql::{params, Row};
use spectra_domain_models::{Proxy, ProxyTransport};
use tracing::instrument;

#[derive(Clone)]
pub struct ProxyRepository {
    store: Store,
}

impl ProxyRepository {
    pub fn new(store: Store) -> Self {
        ProxyRepository { store }
    }

    #[instrument(skip(self, proxy))]
    pub async fn upsert(&self, proxy: &Proxy) -> Result<i64, PersistenceError> {
        let connection = self.store.connection()?;
        if proxy.id == 0 {
            connection
                .execute(
                    r#"INSERT INTO proxies (transport, host, port, username, password, rotation_group, exclusive)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        transport_str(proxy.transport),
                        proxy.host.clone(),
                        proxy.port,
                        proxy.username.clone(),
                        proxy.password.clone(),
                        proxy.rotation_group.clone(),
                        proxy.exclusive
                    ],
                )
                .await?;
            let mut rows = connection.query("SELECT last_insert_rowid()", ()).await?;
            let row = rows.next().await?.ok_or(PersistenceError::NotFound)?;
            Ok(row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?)
        } else {
            connection
                .execute(
                    r#"UPDATE proxies SET transport = ?1, host = ?2, port = ?3, username = ?4,
                       password = ?5, rotation_group = ?6, exclusive = ?7 WHERE id = ?8"#,
                    params![
                        transport_str(proxy.transport),
                        proxy.host.clone(),
                        proxy.port,
                        proxy.username.clone(),
                        proxy.password.clone(),
                        proxy.rotation_group.clone(),
                        proxy.exclusive,
                        proxy.id
                    ],
                )
                .await?;
            Ok(proxy.id)
        }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Proxy>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query(
                "SELECT id, transport, host, port, username, password, rotation_group, exclusive FROM proxies WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Proxy>, PersistenceError> {
        let connection = self.store.connection()?;
        let mut rows = connection
            .query("SELECT id, transport, host, port, username, password, rotation_group, exclusive FROM proxies ORDER BY id", ())
            .await?;
        let mut proxies = Vec::new();
        while let Some(row) = rows.next().await? {
            proxies.push(map_row(row)?);
        }
        Ok(proxies)
    }
}

fn transport_str(transport: ProxyTransport) -> &'static str {
    match transport {
        ProxyTransport::Direct => "direct",
        ProxyTransport::Socks5 => "socks5",
        ProxyTransport::Http => "http",
    }
}

fn parse_transport(raw: &str) -> ProxyTransport {
    match raw {
        "socks5" => ProxyTransport::Socks5,
        "http" => ProxyTransport::Http,
        _ => ProxyTransport::Direct,
    }
}

fn map_row(row: Row) -> Result<Proxy, PersistenceError> {
    let transport_raw: String = row.get(1).map_err(|e| PersistenceError::Mapping(e.to_string()))?;
    Ok(Proxy {
        id: row.get(0).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        transport: parse_transport(&transport_raw),
        host: row.get(2).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        port: row.get::<i64>(3).map_err(|e| PersistenceError::Mapping(e.to_string()))? as u16,
        username: row.get(4).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        password: row.get(5).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        rotation_group: row.get(6).map_err(|e| PersistenceError::Mapping(e.to_string()))?,
        exclusive: row.get::<i64>(7).map_err(|e| PersistenceError::Mapping(e.to_string()))? != 0,
    })
}
