//! MySQL backend reached through an SSH tunnel
//!
//! This is the facility setup: the history database listens on the DAQ host
//! only, so each session starts an `ssh -L` forward and connects the MySQL
//! driver to the local end.

use super::{
    quote_ident, ConnectionError, ConnectionProvider, ConnectionResult, Connector,
    CredentialStore, RowSet, Session, SshTunnel, Value,
};
use crate::config::{DatabaseConfig, SshConfig};
use ::mysql::prelude::Queryable;
use ::mysql::{Conn, OptsBuilder};

/// Opens tunneled MySQL sessions
pub struct TunneledMySqlProvider {
    ssh: SshConfig,
    database: DatabaseConfig,
    credentials: Box<dyn CredentialStore>,
}

impl TunneledMySqlProvider {
    pub fn new(
        ssh: SshConfig,
        database: DatabaseConfig,
        credentials: Box<dyn CredentialStore>,
    ) -> Self {
        Self {
            ssh,
            database,
            credentials,
        }
    }
}

impl ConnectionProvider for TunneledMySqlProvider {
    fn open(&self) -> ConnectionResult<Session> {
        let password = self
            .credentials
            .get_secret(&self.database.name, &self.database.user)
            .ok_or_else(|| ConnectionError::Auth {
                scope: self.database.name.clone(),
                principal: self.database.user.clone(),
            })?;

        if !self.ssh.enabled {
            let connector = MySqlConnector::connect(
                &self.database.host,
                self.database.port,
                &self.database,
                &password,
            )?;
            return Ok(Session::new(Box::new(connector)));
        }

        let tunnel = SshTunnel::open(&self.ssh, &self.database.host, self.database.port)?;
        let connector =
            MySqlConnector::connect("127.0.0.1", tunnel.local_port(), &self.database, &password)?;
        Ok(Session::tunneled(Box::new(connector), tunnel))
    }

    fn describe(&self) -> String {
        if self.ssh.enabled {
            format!("{} (via {}@{})", self.database.host, self.ssh.user, self.ssh.host)
        } else {
            self.database.host.clone()
        }
    }
}

/// Live MySQL connection
pub struct MySqlConnector {
    conn: Option<Conn>,
    database: String,
}

impl MySqlConnector {
    pub fn connect(
        host: &str,
        port: u16,
        database: &DatabaseConfig,
        password: &str,
    ) -> ConnectionResult<Self> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(host))
            .tcp_port(port)
            .user(Some(database.user.as_str()))
            .pass(Some(password))
            .db_name(Some(database.name.as_str()));

        let conn = Conn::new(opts)?;
        tracing::debug!("Connected to MySQL {}:{} as {}", host, port, database.user);

        Ok(Self {
            conn: Some(conn),
            database: database.name.clone(),
        })
    }

    fn conn(&mut self) -> ConnectionResult<&mut Conn> {
        self.conn
            .as_mut()
            .ok_or_else(|| ConnectionError::MySql("connection already closed".to_string()))
    }
}

impl Connector for MySqlConnector {
    fn list_tables(&mut self) -> ConnectionResult<Vec<String>> {
        let statement = format!("SHOW TABLES FROM {}", quote_ident(&self.database));
        Ok(self.query(&statement)?.first_column())
    }

    fn list_columns(&mut self, table: &str) -> ConnectionResult<Vec<String>> {
        let statement = format!("SHOW COLUMNS FROM {}", self.qualify(table));
        let columns = self.query(&statement).map_err(|e| match e {
            ConnectionError::UnknownTable(_) => ConnectionError::UnknownTable(table.to_string()),
            other => other,
        })?;
        Ok(columns.first_column())
    }

    fn query(&mut self, statement: &str) -> ConnectionResult<RowSet> {
        tracing::trace!(statement, "mysql query");
        let mut result = self.conn()?.query_iter(statement)?;

        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        let mut rows = Vec::new();
        for row in result.by_ref() {
            let row = row?;
            rows.push(::mysql::Row::unwrap(row).into_iter().map(value_from_mysql).collect());
        }

        Ok(RowSet { columns, rows })
    }

    fn qualify(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.database), quote_ident(table))
    }

    fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::trace!("MySQL connection closed");
        }
    }
}

fn value_from_mysql(value: ::mysql::Value) -> Value {
    use ::mysql::Value as My;
    match value {
        My::NULL => Value::Null,
        My::Int(i) => Value::Int(i),
        My::UInt(u) => i64::try_from(u)
            .map(Value::Int)
            .unwrap_or(Value::Float(u as f64)),
        My::Float(f) => Value::Float(f64::from(f)),
        My::Double(f) => Value::Float(f),
        My::Bytes(bytes) => Value::from_text(&String::from_utf8_lossy(&bytes)),
        other => Value::Text(other.as_sql(true)),
    }
}
