//! Adapter over the session-scoped single-service protocol.
//!
//! One subprocess backs every open session of a V2 plugin. Before any
//! dispatch the adapter checks, under the process mutex, whether that
//! subprocess has exited; if so it launches a replacement and re-handshakes
//! exactly once. The mutex makes the exited-check/respawn sequence atomic,
//! so two concurrent callers cannot race into a duplicate respawn. A
//! respawn bumps the process generation: sessions minted against an earlier
//! generation fail deterministically instead of being silently resumed on a
//! plugin that has never heard of them.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use sqlward_types::{
    AuditResults, DriverConfig, DriverMetas, EstimatedAffectRows, ExecResult, ExplainResult,
    I18nStr, Node, OptionalModule, QueryResult, TableMetaItem,
};
use sqlward_wire::{Empty, ServiceClient, WireError, handshake, v2};

use super::ADAPTER_TARGET;
use crate::error::DriverError;
use crate::facade::Driver;
use crate::process::{Launcher, PluginProcess};

struct ProcessSlot {
    process: PluginProcess,
    generation: u64,
}

/// The mutex-guarded subprocess handle shared by all open sessions.
struct SharedProcess {
    plugin: String,
    launcher: Arc<dyn Launcher>,
    slot: Mutex<ProcessSlot>,
}

impl SharedProcess {
    /// Returns a service client on a live process, respawning once if the
    /// current process has exited.
    fn ensure_process(&self) -> Result<(ServiceClient, u64), DriverError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        if slot.process.has_exited() {
            info!(
                target: ADAPTER_TARGET,
                plugin = %self.plugin,
                "plugin process exited, restarting it"
            );
            let mut replacement =
                self.launcher
                    .launch()
                    .map_err(|err| DriverError::Reconnect {
                        plugin: self.plugin.clone(),
                        message: err.to_string(),
                    })?;
            if replacement.version() != handshake::PROTOCOL_V2 {
                let version = replacement.version();
                replacement.kill();
                return Err(DriverError::Reconnect {
                    plugin: self.plugin.clone(),
                    message: format!("replacement negotiated protocol version {version}"),
                });
            }
            slot.process.kill();
            slot.process = replacement;
            slot.generation += 1;
            info!(
                target: ADAPTER_TARGET,
                plugin = %self.plugin,
                generation = slot.generation,
                "plugin restart succeeded"
            );
        }

        Ok((
            slot.process.conn().client(v2::SERVICE_DRIVER),
            slot.generation,
        ))
    }

    fn kill(&self) {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        slot.process.kill();
    }
}

/// Adapter for one registered V2 plugin.
pub struct AdapterV2 {
    shared: Arc<SharedProcess>,
    metas: DriverMetas,
}

impl AdapterV2 {
    /// Captures the plugin's declared capabilities and keeps the
    /// negotiated process as the shared handle for all future sessions.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the process negotiated the wrong
    /// version or the metadata call fails.
    pub fn register(
        launcher: Arc<dyn Launcher>,
        mut process: PluginProcess,
    ) -> Result<Self, DriverError> {
        if process.version() != handshake::PROTOCOL_V2 {
            let version = process.version();
            process.kill();
            return Err(DriverError::UnsupportedProtocol {
                plugin: launcher.describe(),
                version,
            });
        }

        let driver = process.conn().client(v2::SERVICE_DRIVER);
        let reply: v2::MetasReply = match driver.call(v2::METHOD_METAS, &Empty {}) {
            Ok(reply) => reply,
            Err(err) => {
                process.kill();
                return Err(err.into());
            }
        };
        let metas = reply.into_metas();
        debug!(
            target: ADAPTER_TARGET,
            plugin = %metas.plugin_name(),
            rules = metas.rules().len(),
            modules = metas.enabled_optional_modules().len(),
            "plugin capabilities declared"
        );

        let shared = Arc::new(SharedProcess {
            plugin: metas.plugin_name().to_owned(),
            launcher,
            slot: Mutex::new(ProcessSlot {
                process,
                generation: 0,
            }),
        });
        Ok(Self { shared, metas })
    }

    /// Returns the capability descriptor captured at registration.
    #[must_use]
    pub const fn metas(&self) -> &DriverMetas {
        &self.metas
    }

    /// Binds a fresh session on the shared process.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the process cannot be revived or the
    /// init call fails.
    pub fn open(&self, config: &DriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        let (client, generation) = self.shared.ensure_process()?;
        let init = v2::InitRequest {
            dsn: config.dsn.clone(),
            rules: config.rules.iter().map(v2::RuleSpec::from_rule).collect(),
        };
        let reply: v2::InitReply = client.call(v2::METHOD_INIT, &init)?;
        debug!(
            target: ADAPTER_TARGET,
            plugin = %self.metas.plugin_name(),
            session = %reply.session.id,
            "session opened"
        );
        Ok(Box::new(DriverV2 {
            shared: Arc::clone(&self.shared),
            metas: self.metas.clone(),
            session: reply.session,
            generation,
        }))
    }

    /// Kills the shared process. Idempotent.
    pub fn stop(&self) {
        self.shared.kill();
    }
}

impl std::fmt::Debug for AdapterV2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterV2")
            .field("plugin", &self.metas.plugin_name())
            .finish_non_exhaustive()
    }
}

/// One session-scoped facade over the shared V2 process.
struct DriverV2 {
    shared: Arc<SharedProcess>,
    metas: DriverMetas,
    session: v2::Session,
    generation: u64,
}

impl DriverV2 {
    /// Resolves a live client, failing deterministically when this
    /// session's process generation has been replaced.
    fn client(&self) -> Result<ServiceClient, DriverError> {
        let (client, generation) = self.shared.ensure_process()?;
        if generation != self.generation {
            return Err(DriverError::SessionReset {
                plugin: self.metas.plugin_name().to_owned(),
            });
        }
        Ok(client)
    }

    fn require_module(&self, module: OptionalModule) -> Result<(), DriverError> {
        if self.metas.is_optional_module_enabled(module) {
            Ok(())
        } else {
            Err(DriverError::ModuleNotImplemented {
                plugin: self.metas.plugin_name().to_owned(),
                module,
            })
        }
    }

    fn session_request(&self) -> v2::SessionRequest {
        v2::SessionRequest {
            session: self.session.clone(),
        }
    }

    fn sql_request(&self, sql: &str) -> v2::SqlRequest {
        v2::SqlRequest {
            session: self.session.clone(),
            sql: sql.to_owned(),
        }
    }

    fn batch_request(&self, sqls: &[String]) -> v2::SqlBatchRequest {
        v2::SqlBatchRequest {
            session: self.session.clone(),
            sqls: sqls.to_vec(),
        }
    }

    fn call<P, T>(&self, method: &str, params: &P) -> Result<T, DriverError>
    where
        P: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let client = self.client()?;
        client.call(method, params).map_err(DriverError::from)
    }

    fn get_table_meta(&self, table: &sqlward_types::Table) -> Result<sqlward_types::TableMeta, DriverError> {
        let reply: v2::GetTableMetaReply = self.call(
            v2::METHOD_GET_TABLE_META,
            &v2::GetTableMetaRequest {
                session: self.session.clone(),
                table: table.clone(),
            },
        )?;
        Ok(reply.meta)
    }

    fn extract_table_from_sql(
        &self,
        sql: &str,
    ) -> Result<Vec<sqlward_types::Table>, DriverError> {
        let reply: v2::ExtractTableReply =
            self.call(v2::METHOD_EXTRACT_TABLE_FROM_SQL, &self.sql_request(sql))?;
        Ok(reply.tables)
    }
}

impl Driver for DriverV2 {
    fn close(&mut self) {
        // Best effort: after a crash or respawn there is nothing left to
        // close on the plugin side, and that must not surface as a failure.
        let client = match self.client() {
            Ok(client) => client,
            Err(err) => {
                debug!(
                    target: ADAPTER_TARGET,
                    plugin = %self.metas.plugin_name(),
                    session = %self.session.id,
                    error = %err,
                    "close skipped, process no longer serves this session"
                );
                return;
            }
        };
        match client.call::<_, Empty>(v2::METHOD_CLOSE, &self.session_request()) {
            Ok(Empty {}) => {}
            Err(WireError::Remote { ref message, .. }) => {
                debug!(
                    target: ADAPTER_TARGET,
                    plugin = %self.metas.plugin_name(),
                    session = %self.session.id,
                    message = %message,
                    "plugin rejected close"
                );
            }
            Err(err) => {
                warn!(
                    target: ADAPTER_TARGET,
                    plugin = %self.metas.plugin_name(),
                    session = %self.session.id,
                    error = %err,
                    "close call failed"
                );
            }
        }
    }

    fn parse(&self, sql: &str) -> Result<Vec<Node>, DriverError> {
        let reply: v2::ParseReply = self.call(v2::METHOD_PARSE, &self.sql_request(sql))?;
        Ok(reply.nodes)
    }

    fn audit(&self, sqls: &[String]) -> Result<Vec<AuditResults>, DriverError> {
        // One batch call: the plugin sees the whole batch, in order, so its
        // rule handlers can look ahead at later statements.
        let reply: v2::AuditReply = self.call(v2::METHOD_AUDIT, &self.batch_request(sqls))?;
        Ok(reply
            .results
            .into_iter()
            .map(v2::AuditResultsSpec::into_results)
            .collect())
    }

    fn gen_rollback_sql(&self, sql: &str) -> Result<(String, I18nStr), DriverError> {
        self.require_module(OptionalModule::GenRollbackSql)?;
        let reply: v2::RollbackReply =
            self.call(v2::METHOD_GEN_ROLLBACK_SQL, &self.sql_request(sql))?;
        Ok((reply.sql, reply.reason))
    }

    fn ping(&self) -> Result<(), DriverError> {
        let _: Empty = self.call(v2::METHOD_PING, &self.session_request())?;
        Ok(())
    }

    fn exec(&self, sql: &str) -> Result<ExecResult, DriverError> {
        let reply: v2::ExecReply = self.call(v2::METHOD_EXEC, &self.sql_request(sql))?;
        Ok(reply.result)
    }

    fn exec_batch(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError> {
        self.require_module(OptionalModule::ExecBatch)?;
        let reply: v2::ExecBatchReply =
            self.call(v2::METHOD_EXEC_BATCH, &self.batch_request(sqls))?;
        Ok(reply.results)
    }

    fn tx(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError> {
        let reply: v2::ExecBatchReply = self.call(v2::METHOD_TX, &self.batch_request(sqls))?;
        Ok(reply.results)
    }

    fn query(&self, sql: &str, timeout_seconds: u32) -> Result<QueryResult, DriverError> {
        self.require_module(OptionalModule::Query)?;
        let reply: v2::QueryReply = self.call(
            v2::METHOD_QUERY,
            &v2::QueryRequest {
                session: self.session.clone(),
                sql: sql.to_owned(),
                timeout_seconds,
            },
        )?;
        Ok(reply.result)
    }

    fn explain(&self, sql: &str) -> Result<ExplainResult, DriverError> {
        self.require_module(OptionalModule::Explain)?;
        let reply: v2::ExplainReply = self.call(v2::METHOD_EXPLAIN, &self.sql_request(sql))?;
        Ok(reply.result)
    }

    fn schemas(&self) -> Result<Vec<String>, DriverError> {
        let reply: v2::GetDatabasesReply =
            self.call(v2::METHOD_GET_DATABASES, &self.session_request())?;
        Ok(reply.databases)
    }

    fn get_table_meta_by_sql(&self, sql: &str) -> Result<Vec<TableMetaItem>, DriverError> {
        // Composed under V2: extract the referenced tables, then describe
        // each one.
        self.require_module(OptionalModule::ExtractTableFromSql)?;
        self.require_module(OptionalModule::GetTableMeta)?;
        let tables = self.extract_table_from_sql(sql)?;
        let mut items = Vec::with_capacity(tables.len());
        for table in tables {
            let meta = self.get_table_meta(&table)?;
            items.push(TableMetaItem { table, meta });
        }
        Ok(items)
    }

    fn estimate_sql_affect_rows(&self, sql: &str) -> Result<EstimatedAffectRows, DriverError> {
        self.require_module(OptionalModule::EstimateSqlAffectRows)?;
        let reply: v2::EstimateReply =
            self.call(v2::METHOD_ESTIMATE_SQL_AFFECT_ROWS, &self.sql_request(sql))?;
        Ok(reply.result)
    }

    fn kill_process(&self) -> Result<(), DriverError> {
        self.require_module(OptionalModule::KillProcess)?;
        let reply: v2::KillProcessReply =
            self.call(v2::METHOD_KILL_PROCESS, &self.session_request())?;
        if reply.err_message.is_empty() {
            Ok(())
        } else {
            Err(DriverError::Wire(WireError::Remote {
                code: sqlward_wire::CODE_INTERNAL,
                message: reply.err_message,
            }))
        }
    }
}
