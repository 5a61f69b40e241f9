//! Adapter over the legacy three-service protocol.
//!
//! Registration is a two-phase dance the protocol requires. The probe
//! phase runs on the process launched for negotiation: dispense the audit
//! service, fetch metadata, then try to initialise the optional query and
//! analysis services — a failed attempt means "module absent", recorded as
//! a capability flag, never an error. The probe connection is then torn
//! down. The operate phase happens per open: V1 sessions are not
//! multiplexed, so every open launches its own fresh subprocess whose
//! lifetime is the driver's.

use std::sync::Arc;

use tracing::{debug, warn};

use sqlward_types::{
    AuditResults, DriverConfig, DriverMetas, EstimatedAffectRows, ExecResult, ExplainResult,
    I18nStr, Node, OptionalModule, QueryResult, TableMetaItem,
};
use sqlward_wire::{Empty, ServiceClient, handshake, v1};

use super::ADAPTER_TARGET;
use crate::error::DriverError;
use crate::facade::Driver;
use crate::process::{Launcher, PluginProcess};

/// Adapter for one registered V1 plugin.
pub struct AdapterV1 {
    launcher: Arc<dyn Launcher>,
    metas: DriverMetas,
    has_query: bool,
    has_analysis: bool,
}

impl AdapterV1 {
    /// Runs the probe phase on a freshly negotiated process.
    ///
    /// The process is consumed: metadata and capability flags are read off
    /// it and it is killed, whether probing succeeds or not. Subsequent
    /// opens launch their own processes through `launcher`.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the process negotiated the wrong
    /// version or the mandatory audit service cannot be probed.
    pub fn register(
        launcher: Arc<dyn Launcher>,
        mut process: PluginProcess,
    ) -> Result<Self, DriverError> {
        let outcome = Self::probe(&launcher, &process);
        process.kill();
        let (metas, has_query, has_analysis) = outcome?;
        Ok(Self {
            launcher,
            metas,
            has_query,
            has_analysis,
        })
    }

    fn probe(
        launcher: &Arc<dyn Launcher>,
        process: &PluginProcess,
    ) -> Result<(DriverMetas, bool, bool), DriverError> {
        if process.version() != handshake::PROTOCOL_V1 {
            return Err(DriverError::UnsupportedProtocol {
                plugin: launcher.describe(),
                version: process.version(),
            });
        }

        let audit = process.conn().client(v1::SERVICE_AUDIT);
        let reply: v1::MetasReply = audit.call(v1::METHOD_METAS, &Empty {})?;
        let _: Empty = audit.call(v1::METHOD_INIT, &v1::InitRequest::default())?;
        debug!(
            target: ADAPTER_TARGET,
            plugin = %reply.name,
            rules = reply.rules.len(),
            "audit service probed"
        );

        let has_query = try_init_service(process, &reply.name, v1::SERVICE_QUERY);
        let has_analysis = try_init_service(process, &reply.name, v1::SERVICE_ANALYSIS);

        // Inform the plugin before the probe process is killed.
        if let Err(err) = audit.call::<_, Empty>(v1::METHOD_CLOSE, &Empty {}) {
            debug!(
                target: ADAPTER_TARGET,
                plugin = %reply.name,
                error = %err,
                "probe close failed, killing the process regardless"
            );
        }

        // The protocol cannot probe rollback support: plugins answer the
        // call and return empty output when they generate nothing.
        let mut modules = vec![OptionalModule::GenRollbackSql];
        if has_query {
            modules.push(OptionalModule::Query);
        }
        if has_analysis {
            modules.extend([
                OptionalModule::Explain,
                OptionalModule::GetTableMeta,
                OptionalModule::ExtractTableFromSql,
            ]);
        }

        let metas = DriverMetas::new(reply.name, 0)
            .with_rules(reply.rules.into_iter().map(v1::RuleSpec::into_rule).collect())
            .with_additional_params(reply.additional_params)
            .with_enabled_modules(modules);
        Ok((metas, has_query, has_analysis))
    }

    /// Returns the capability descriptor captured by the probe.
    #[must_use]
    pub const fn metas(&self) -> &DriverMetas {
        &self.metas
    }

    /// Launches a fresh subprocess and initialises its present services.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when launching or any init call fails.
    pub fn open(&self, config: &DriverConfig) -> Result<Box<dyn Driver>, DriverError> {
        let plugin = self.metas.plugin_name().to_owned();
        let mut process = self.launcher.launch()?;
        if process.version() != handshake::PROTOCOL_V1 {
            let version = process.version();
            process.kill();
            return Err(DriverError::UnsupportedProtocol { plugin, version });
        }

        let rules: Vec<v1::RuleSpec> = config.rules.iter().map(v1::RuleSpec::from_rule).collect();
        let audit_init = v1::InitRequest {
            dsn: config.dsn.clone(),
            rules,
        };
        let aux_init = v1::InitRequest {
            dsn: config.dsn.clone(),
            rules: Vec::new(),
        };

        let audit = process.conn().client(v1::SERVICE_AUDIT);
        if let Err(err) = audit.call::<_, Empty>(v1::METHOD_INIT, &audit_init) {
            process.kill();
            return Err(err.into());
        }

        let query = self
            .has_query
            .then(|| process.conn().client(v1::SERVICE_QUERY));
        let analysis = self
            .has_analysis
            .then(|| process.conn().client(v1::SERVICE_ANALYSIS));
        for client in query.iter().chain(analysis.iter()) {
            if let Err(err) = client.call::<_, Empty>(v1::METHOD_INIT, &aux_init) {
                process.kill();
                return Err(err.into());
            }
        }

        debug!(target: ADAPTER_TARGET, plugin = %plugin, "legacy driver opened");
        Ok(Box::new(DriverV1 {
            plugin,
            process,
            audit,
            query,
            analysis,
        }))
    }
}

impl std::fmt::Debug for AdapterV1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterV1")
            .field("plugin", &self.metas.plugin_name())
            .field("has_query", &self.has_query)
            .field("has_analysis", &self.has_analysis)
            .finish_non_exhaustive()
    }
}

/// Try-open of one optional V1 service: absence is a result, not an error.
fn try_init_service(process: &PluginProcess, plugin: &str, service: &str) -> bool {
    let client = process.conn().client(service);
    match client.call::<_, Empty>(v1::METHOD_INIT, &v1::InitRequest::default()) {
        Ok(Empty {}) => {
            debug!(target: ADAPTER_TARGET, plugin, service, "optional service present");
            true
        }
        Err(err) => {
            debug!(
                target: ADAPTER_TARGET,
                plugin,
                service,
                error = %err,
                "optional service absent"
            );
            false
        }
    }
}

/// Facade over one exclusively-owned V1 subprocess.
struct DriverV1 {
    plugin: String,
    process: PluginProcess,
    audit: ServiceClient,
    query: Option<ServiceClient>,
    analysis: Option<ServiceClient>,
}

impl DriverV1 {
    fn query_client(&self) -> Result<&ServiceClient, DriverError> {
        self.query
            .as_ref()
            .ok_or_else(|| DriverError::ModuleNotImplemented {
                plugin: self.plugin.clone(),
                module: OptionalModule::Query,
            })
    }

    fn analysis_client(&self, module: OptionalModule) -> Result<&ServiceClient, DriverError> {
        self.analysis
            .as_ref()
            .ok_or_else(|| DriverError::ModuleNotImplemented {
                plugin: self.plugin.clone(),
                module,
            })
    }

    fn not_implemented<T>(&self, module: OptionalModule) -> Result<T, DriverError> {
        Err(DriverError::ModuleNotImplemented {
            plugin: self.plugin.clone(),
            module,
        })
    }
}

impl Driver for DriverV1 {
    fn close(&mut self) {
        if let Err(err) = self.audit.call::<_, Empty>(v1::METHOD_CLOSE, &Empty {}) {
            debug!(
                target: ADAPTER_TARGET,
                plugin = %self.plugin,
                error = %err,
                "close call failed"
            );
        }
        self.process.kill();
    }

    fn parse(&self, sql: &str) -> Result<Vec<Node>, DriverError> {
        let reply: v1::ParseReply = self.audit.call(
            v1::METHOD_PARSE,
            &v1::SqlRequest {
                sql: sql.to_owned(),
            },
        )?;
        Ok(reply.nodes)
    }

    fn audit(&self, sqls: &[String]) -> Result<Vec<AuditResults>, DriverError> {
        // The legacy audit call takes one statement; batch order is
        // preserved by iterating in submission order.
        let mut all = Vec::with_capacity(sqls.len());
        for sql in sqls {
            let reply: v1::AuditReply = self
                .audit
                .call(v1::METHOD_AUDIT, &v1::SqlRequest { sql: sql.clone() })?;
            all.push(v1::audit_results_from_specs(reply.results));
        }
        Ok(all)
    }

    fn gen_rollback_sql(&self, sql: &str) -> Result<(String, I18nStr), DriverError> {
        let reply: v1::RollbackReply = self.audit.call(
            v1::METHOD_GEN_ROLLBACK_SQL,
            &v1::SqlRequest {
                sql: sql.to_owned(),
            },
        )?;
        Ok((reply.sql, I18nStr::from_default(reply.reason)))
    }

    fn ping(&self) -> Result<(), DriverError> {
        let _: Empty = self.audit.call(v1::METHOD_PING, &Empty {})?;
        Ok(())
    }

    fn exec(&self, sql: &str) -> Result<ExecResult, DriverError> {
        let reply: v1::ExecReply = self.audit.call(
            v1::METHOD_EXEC,
            &v1::SqlRequest {
                sql: sql.to_owned(),
            },
        )?;
        Ok(reply.result)
    }

    fn exec_batch(&self, _sqls: &[String]) -> Result<Vec<ExecResult>, DriverError> {
        self.not_implemented(OptionalModule::ExecBatch)
    }

    fn tx(&self, sqls: &[String]) -> Result<Vec<ExecResult>, DriverError> {
        let reply: v1::TxReply = self.audit.call(
            v1::METHOD_TX,
            &v1::SqlBatchRequest {
                sqls: sqls.to_vec(),
            },
        )?;
        Ok(reply.results)
    }

    fn query(&self, sql: &str, timeout_seconds: u32) -> Result<QueryResult, DriverError> {
        let reply: v1::QueryReply = self.query_client()?.call(
            v1::METHOD_QUERY,
            &v1::QueryRequest {
                sql: sql.to_owned(),
                timeout_seconds,
            },
        )?;
        Ok(reply.result)
    }

    fn explain(&self, sql: &str) -> Result<ExplainResult, DriverError> {
        let reply: v1::ExplainReply = self.analysis_client(OptionalModule::Explain)?.call(
            v1::METHOD_EXPLAIN,
            &v1::SqlRequest {
                sql: sql.to_owned(),
            },
        )?;
        Ok(reply.result)
    }

    fn schemas(&self) -> Result<Vec<String>, DriverError> {
        let reply: v1::SchemasReply = self.audit.call(v1::METHOD_SCHEMAS, &Empty {})?;
        Ok(reply.schemas)
    }

    fn get_table_meta_by_sql(&self, sql: &str) -> Result<Vec<TableMetaItem>, DriverError> {
        // One direct RPC under V1; the plugin does the extraction itself.
        let reply: v1::TableMetaBySqlReply =
            self.analysis_client(OptionalModule::GetTableMeta)?.call(
                v1::METHOD_GET_TABLE_META_BY_SQL,
                &v1::SqlRequest {
                    sql: sql.to_owned(),
                },
            )?;
        Ok(reply.table_metas)
    }

    fn estimate_sql_affect_rows(&self, _sql: &str) -> Result<EstimatedAffectRows, DriverError> {
        self.not_implemented(OptionalModule::EstimateSqlAffectRows)
    }

    fn kill_process(&self) -> Result<(), DriverError> {
        self.not_implemented(OptionalModule::KillProcess)
    }
}

impl Drop for DriverV1 {
    fn drop(&mut self) {
        if self.process.has_exited() {
            return;
        }
        warn!(
            target: ADAPTER_TARGET,
            plugin = %self.plugin,
            "legacy driver dropped without close, killing its process"
        );
        self.process.kill();
    }
}
