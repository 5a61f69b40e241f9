//! In-memory test doubles for the wire protocol.
//!
//! Real plugins are subprocesses; tests substitute an in-memory duplex
//! byte pipe and a scripted plugin server running on a thread. The fake
//! speaks both protocol versions, honours the handshake, keeps V2
//! sessions, and implements just enough audit semantics (a select-star
//! rule and a column-count rule) to drive end-to-end scenarios.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;

use serde::Serialize;
use serde_json::Value;

use sqlward_types::{
    EstimatedAffectRows, ExecResult, ExplainResult, I18nStr, Node, OptionalModule, QueryResult,
    Rule, RuleInfo, RuleLevel, Table, TableMeta, TableMetaItem, TabularData, TabularDataHead,
    SQL_KIND_DDL, SQL_KIND_DML, SQL_KIND_DQL,
};

use crate::envelope::{CODE_INTERNAL, CODE_UNKNOWN_SERVICE, CODE_UNKNOWN_SESSION, Empty, Request, Response};
use crate::framing::{FrameReader, FrameWriter};
use crate::handshake;
use crate::{v1, v2};

/// Read half of an in-memory pipe. EOF when the writer is dropped.
pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    buffer: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buffer.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buffer = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let available = self.buffer.len() - self.pos;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Write half of an in-memory pipe. Broken pipe when the reader is gone.
pub struct PipeWriter {
    tx: Sender<Vec<u8>>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Creates a unidirectional in-memory byte pipe.
#[must_use]
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = channel();
    (
        PipeWriter { tx },
        PipeReader {
            rx,
            buffer: Vec::new(),
            pos: 0,
        },
    )
}

/// One end of a bidirectional in-memory connection.
pub struct DuplexEnd {
    reader: PipeReader,
    writer: PipeWriter,
}

impl DuplexEnd {
    /// Splits the end into its read and write halves.
    #[must_use]
    pub fn split(self) -> (PipeReader, PipeWriter) {
        (self.reader, self.writer)
    }
}

/// Creates a connected pair of duplex ends.
#[must_use]
pub fn duplex() -> (DuplexEnd, DuplexEnd) {
    let (a_writer, b_reader) = pipe();
    let (b_writer, a_reader) = pipe();
    (
        DuplexEnd {
            reader: a_reader,
            writer: a_writer,
        },
        DuplexEnd {
            reader: b_reader,
            writer: b_writer,
        },
    )
}

/// Behaviour description for one fake plugin instance.
#[derive(Debug, Clone)]
pub struct FakePluginSpec {
    /// Plugin name reported by the metadata call.
    pub name: String,
    /// Protocol versions the fake offers during the handshake.
    pub versions: Vec<u32>,
    /// Rules the fake declares and evaluates.
    pub rules: Vec<Rule>,
    /// Whether the V1 query service is dispensable.
    pub has_query_service: bool,
    /// Whether the V1 analysis service is dispensable.
    pub has_analysis_service: bool,
    /// Modules declared in the V2 metadata reply.
    pub enabled_modules: Vec<OptionalModule>,
    /// Conventional database port reported by V2 metadata.
    pub default_port: u16,
    /// Database names returned by schema listing.
    pub databases: Vec<String>,
    /// Stops serving (simulating a crash) after this many service calls.
    pub exit_after_calls: Option<u64>,
    /// Methods that never receive a reply, for deadline tests.
    pub stall_methods: Vec<String>,
}

impl FakePluginSpec {
    /// A well-behaved V2 plugin with every optional module enabled.
    #[must_use]
    pub fn v2(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: vec![handshake::PROTOCOL_V2],
            rules: demo_rules(),
            has_query_service: true,
            has_analysis_service: true,
            enabled_modules: vec![
                OptionalModule::GenRollbackSql,
                OptionalModule::Query,
                OptionalModule::Explain,
                OptionalModule::GetTableMeta,
                OptionalModule::ExtractTableFromSql,
                OptionalModule::EstimateSqlAffectRows,
                OptionalModule::KillProcess,
                OptionalModule::ExecBatch,
            ],
            default_port: 3306,
            databases: vec!["app_db".to_owned()],
            exit_after_calls: None,
            stall_methods: Vec::new(),
        }
    }

    /// A legacy V1 plugin with all three services present.
    #[must_use]
    pub fn v1(name: impl Into<String>) -> Self {
        Self {
            versions: vec![handshake::PROTOCOL_V1],
            ..Self::v2(name)
        }
    }
}

/// The demo ruleset used by end-to-end scenarios.
#[must_use]
pub fn demo_rules() -> Vec<Rule> {
    use sqlward_types::{Param, ParamKind, Params};

    let threshold: Params = [Param::new("max_column_count", "50", ParamKind::Int)]
        .into_iter()
        .collect();
    vec![
        Rule::new("rule_select_star", RuleLevel::Error).with_info(
            sqlward_types::DEFAULT_LANG,
            RuleInfo::new("select star is forbidden", "dml"),
        ),
        Rule::new("rule_too_many_columns", RuleLevel::Warn)
            .with_params(threshold)
            .with_info(
                sqlward_types::DEFAULT_LANG,
                RuleInfo::new("table has too many columns", "ddl"),
            ),
    ]
}

/// Observable state of a running fake plugin.
#[derive(Debug, Clone)]
pub struct FakePluginHandle {
    /// Set once the serving thread stops, whatever the reason.
    pub exited: Arc<AtomicBool>,
    /// Number of service calls answered (handshake excluded).
    pub calls: Arc<AtomicU64>,
}

/// Spawns a fake plugin thread and returns the host-side connection end.
#[must_use]
pub fn spawn_fake_plugin(spec: FakePluginSpec) -> (DuplexEnd, FakePluginHandle) {
    let (host_end, plugin_end) = duplex();
    let handle = FakePluginHandle {
        exited: Arc::new(AtomicBool::new(false)),
        calls: Arc::new(AtomicU64::new(0)),
    };
    let thread_handle = handle.clone();
    drop(
        thread::Builder::new()
            .name("fake-plugin".to_owned())
            .spawn(move || serve(&spec, plugin_end, &thread_handle)),
    );
    (host_end, handle)
}

fn serve(spec: &FakePluginSpec, end: DuplexEnd, handle: &FakePluginHandle) {
    let (raw_reader, raw_writer) = end.split();
    let mut reader = FrameReader::new(raw_reader);
    let mut writer = FrameWriter::new(raw_writer);

    if handshake::accept(&mut reader, &mut writer, &spec.versions).is_err() {
        handle.exited.store(true, Ordering::SeqCst);
        return;
    }

    let mut state = PluginState {
        next_session: 0,
        sessions: HashMap::new(),
        v1_rules: Vec::new(),
    };

    loop {
        let Ok(frame) = reader.receive() else { break };
        let Ok(request) = serde_json::from_slice::<Request>(&frame) else {
            break;
        };
        if spec.stall_methods.iter().any(|m| m == &request.method) {
            continue;
        }

        let served = handle.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let response = dispatch(spec, &mut state, &request);
        let Ok(bytes) = serde_json::to_vec(&response) else {
            break;
        };
        if writer.send(&bytes).is_err() {
            break;
        }
        if spec.exit_after_calls.is_some_and(|limit| served >= limit) {
            break;
        }
    }

    handle.exited.store(true, Ordering::SeqCst);
}

/// Sessions map to the rules their `Init` carried, as a real plugin would
/// keep per-session audit configuration.
struct PluginState {
    next_session: u64,
    sessions: HashMap<String, Vec<Rule>>,
    v1_rules: Vec<Rule>,
}

fn ok<T: Serialize>(id: u64, reply: &T) -> Response {
    match serde_json::to_value(reply) {
        Ok(value) => Response::success(id, value),
        Err(err) => Response::failure(id, CODE_INTERNAL, err.to_string()),
    }
}

fn dispatch(spec: &FakePluginSpec, state: &mut PluginState, request: &Request) -> Response {
    match request.service.as_str() {
        v2::SERVICE_DRIVER => dispatch_v2(spec, state, request),
        v1::SERVICE_AUDIT => dispatch_v1_audit(spec, state, request),
        v1::SERVICE_QUERY if spec.has_query_service => dispatch_v1_query(request),
        v1::SERVICE_ANALYSIS if spec.has_analysis_service => dispatch_v1_analysis(request),
        v1::SERVICE_QUERY | v1::SERVICE_ANALYSIS => Response::failure(
            request.id,
            CODE_UNKNOWN_SERVICE,
            format!("service '{}' not provided", request.service),
        ),
        other => Response::failure(
            request.id,
            CODE_UNKNOWN_SERVICE,
            format!("service '{other}' not provided"),
        ),
    }
}

fn param<T: serde::de::DeserializeOwned + Default>(request: &Request) -> T {
    serde_json::from_value(request.params.clone()).unwrap_or_default()
}

fn dispatch_v2(spec: &FakePluginSpec, state: &mut PluginState, request: &Request) -> Response {
    let id = request.id;
    match request.method.as_str() {
        v2::METHOD_METAS => ok(
            id,
            &v2::MetasReply {
                plugin_name: spec.name.clone(),
                database_default_port: spec.default_port,
                rules: spec.rules.iter().map(v2::RuleSpec::from_rule).collect(),
                additional_params: sqlward_types::Params::new(),
                enabled_optional_modules: spec.enabled_modules.clone(),
            },
        ),
        v2::METHOD_INIT => {
            let req: v2::InitRequest = param(request);
            state.next_session += 1;
            let session = format!("session-{}", state.next_session);
            let rules = req.rules.into_iter().map(v2::RuleSpec::into_rule).collect();
            state.sessions.insert(session.clone(), rules);
            ok(
                id,
                &v2::InitReply {
                    session: v2::Session::new(session),
                },
            )
        }
        v2::METHOD_CLOSE => {
            let req: v2::SessionRequest = param(request);
            state.sessions.remove(&req.session.id);
            ok(id, &Empty {})
        }
        method => {
            let session_id = request
                .params
                .get("session")
                .and_then(|s| s.get("id"))
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned();
            let Some(rules) = state.sessions.get(&session_id).cloned() else {
                return Response::failure(
                    id,
                    CODE_UNKNOWN_SESSION,
                    format!("unknown session '{session_id}'"),
                );
            };
            dispatch_v2_session(spec, &rules, request, method)
        }
    }
}

fn dispatch_v2_session(
    spec: &FakePluginSpec,
    rules: &[Rule],
    request: &Request,
    method: &str,
) -> Response {
    let id = request.id;
    match method {
        v2::METHOD_PING => ok(id, &Empty {}),
        v2::METHOD_PARSE => {
            let req: v2::SqlRequest = param(request);
            ok(
                id,
                &v2::ParseReply {
                    nodes: parse_statements(&req.sql),
                },
            )
        }
        v2::METHOD_AUDIT => {
            let req: v2::SqlBatchRequest = param(request);
            let results = req
                .sqls
                .iter()
                .map(|sql| v2::AuditResultsSpec {
                    results: evaluate_rules(rules, sql),
                })
                .collect();
            ok(id, &v2::AuditReply { results })
        }
        v2::METHOD_GEN_ROLLBACK_SQL => ok(
            id,
            &v2::RollbackReply {
                sql: String::new(),
                reason: I18nStr::from_default("rollback not generated"),
            },
        ),
        v2::METHOD_EXEC => ok(
            id,
            &v2::ExecReply {
                result: ExecResult::new(1, 0),
            },
        ),
        v2::METHOD_EXEC_BATCH | v2::METHOD_TX => {
            let req: v2::SqlBatchRequest = param(request);
            ok(
                id,
                &v2::ExecBatchReply {
                    results: req.sqls.iter().map(|_| ExecResult::new(1, 0)).collect(),
                },
            )
        }
        v2::METHOD_GET_DATABASES => ok(
            id,
            &v2::GetDatabasesReply {
                databases: spec.databases.clone(),
            },
        ),
        v2::METHOD_GET_TABLE_META => {
            let req: v2::GetTableMetaRequest = param(request);
            ok(
                id,
                &v2::GetTableMetaReply {
                    meta: table_meta_for(&req.table.name),
                },
            )
        }
        v2::METHOD_EXTRACT_TABLE_FROM_SQL => {
            let req: v2::SqlRequest = param(request);
            ok(
                id,
                &v2::ExtractTableReply {
                    tables: extract_tables(&req.sql),
                },
            )
        }
        v2::METHOD_QUERY => ok(
            id,
            &v2::QueryReply {
                result: canned_query_result(),
            },
        ),
        v2::METHOD_EXPLAIN => ok(
            id,
            &v2::ExplainReply {
                result: canned_explain_result(),
            },
        ),
        v2::METHOD_ESTIMATE_SQL_AFFECT_ROWS => ok(
            id,
            &v2::EstimateReply {
                result: EstimatedAffectRows {
                    count: 42,
                    err_message: String::new(),
                },
            },
        ),
        v2::METHOD_KILL_PROCESS => ok(
            id,
            &v2::KillProcessReply {
                err_message: String::new(),
            },
        ),
        other => Response::failure(id, CODE_INTERNAL, format!("unknown method '{other}'")),
    }
}

fn dispatch_v1_audit(spec: &FakePluginSpec, state: &mut PluginState, request: &Request) -> Response {
    let id = request.id;
    match request.method.as_str() {
        v1::METHOD_METAS => ok(
            id,
            &v1::MetasReply {
                name: spec.name.clone(),
                rules: spec.rules.iter().map(v1::RuleSpec::from_rule).collect(),
                additional_params: sqlward_types::Params::new(),
            },
        ),
        v1::METHOD_INIT => {
            let req: v1::InitRequest = param(request);
            state.v1_rules = req.rules.into_iter().map(v1::RuleSpec::into_rule).collect();
            ok(id, &Empty {})
        }
        v1::METHOD_CLOSE | v1::METHOD_PING => ok(id, &Empty {}),
        v1::METHOD_PARSE => {
            let req: v1::SqlRequest = param(request);
            ok(
                id,
                &v1::ParseReply {
                    nodes: parse_statements(&req.sql),
                },
            )
        }
        v1::METHOD_AUDIT => {
            let req: v1::SqlRequest = param(request);
            let results = evaluate_rules(&state.v1_rules, &req.sql)
                .into_iter()
                .map(|spec_v2| v1::AuditResultSpec {
                    level: spec_v2.level,
                    message: spec_v2.message.default_text().to_owned(),
                })
                .collect();
            ok(id, &v1::AuditReply { results })
        }
        v1::METHOD_GEN_ROLLBACK_SQL => ok(
            id,
            &v1::RollbackReply {
                sql: String::new(),
                reason: "rollback not generated".to_owned(),
            },
        ),
        v1::METHOD_EXEC => ok(
            id,
            &v1::ExecReply {
                result: ExecResult::new(1, 0),
            },
        ),
        v1::METHOD_TX => {
            let req: v1::SqlBatchRequest = param(request);
            ok(
                id,
                &v1::TxReply {
                    results: req.sqls.iter().map(|_| ExecResult::new(1, 0)).collect(),
                },
            )
        }
        v1::METHOD_SCHEMAS => ok(
            id,
            &v1::SchemasReply {
                schemas: spec.databases.clone(),
            },
        ),
        other => Response::failure(id, CODE_INTERNAL, format!("unknown method '{other}'")),
    }
}

fn dispatch_v1_query(request: &Request) -> Response {
    let id = request.id;
    match request.method.as_str() {
        v1::METHOD_INIT => ok(id, &Empty {}),
        v1::METHOD_QUERY => ok(
            id,
            &v1::QueryReply {
                result: canned_query_result(),
            },
        ),
        other => Response::failure(id, CODE_INTERNAL, format!("unknown method '{other}'")),
    }
}

fn dispatch_v1_analysis(request: &Request) -> Response {
    let id = request.id;
    match request.method.as_str() {
        v1::METHOD_INIT => ok(id, &Empty {}),
        v1::METHOD_EXPLAIN => ok(
            id,
            &v1::ExplainReply {
                result: canned_explain_result(),
            },
        ),
        v1::METHOD_GET_TABLE_META_BY_SQL => {
            let req: v1::SqlRequest = param(request);
            let table_metas = extract_tables(&req.sql)
                .into_iter()
                .map(|table| TableMetaItem {
                    meta: table_meta_for(&table.name),
                    table,
                })
                .collect();
            ok(id, &v1::TableMetaBySqlReply { table_metas })
        }
        other => Response::failure(id, CODE_INTERNAL, format!("unknown method '{other}'")),
    }
}

/// Splits text on `;` and classifies each statement naively.
fn parse_statements(sql: &str) -> Vec<Node> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|statement| {
            let lowered = statement.to_lowercase();
            let kind = if lowered.starts_with("select") {
                SQL_KIND_DQL
            } else if lowered.starts_with("create")
                || lowered.starts_with("alter")
                || lowered.starts_with("drop")
            {
                SQL_KIND_DDL
            } else {
                SQL_KIND_DML
            };
            let fingerprint: String = lowered
                .chars()
                .map(|c| if c.is_ascii_digit() { '?' } else { c })
                .collect();
            Node::new(statement, kind, fingerprint)
        })
        .collect()
}

/// Evaluates the demo rules against one statement.
fn evaluate_rules(rules: &[Rule], sql: &str) -> Vec<v2::AuditResultSpec> {
    let lowered = sql.to_lowercase();
    let mut findings = Vec::new();
    for rule in rules {
        let fired = match rule.name() {
            "rule_select_star" => lowered.contains("select *"),
            "rule_too_many_columns" => {
                let threshold = rule.params().int_of("max_column_count").unwrap_or(50);
                lowered.starts_with("create table") && column_count(&lowered) > threshold
            }
            _ => false,
        };
        if fired {
            let message = rule
                .default_info()
                .map(RuleInfo::desc)
                .unwrap_or("rule fired")
                .to_owned();
            findings.push(v2::AuditResultSpec {
                level: rule.level(),
                rule_name: rule.name().to_owned(),
                message: I18nStr::from_default(message),
            });
        }
    }
    findings
}

fn column_count(lowered_sql: &str) -> i64 {
    let Some(open) = lowered_sql.find('(') else {
        return 0;
    };
    let Some(close) = lowered_sql.rfind(')') else {
        return 0;
    };
    if close <= open {
        return 0;
    }
    let body = lowered_sql.get(open + 1..close).unwrap_or("");
    if body.trim().is_empty() {
        return 0;
    }
    i64::try_from(body.split(',').count()).unwrap_or(i64::MAX)
}

fn extract_tables(sql: &str) -> Vec<Table> {
    let lowered = sql.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    let mut tables = Vec::new();
    for pair in tokens.windows(2) {
        if let [keyword, name] = pair
            && (*keyword == "from" || *keyword == "join" || *keyword == "table")
        {
            let clean = name.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '_');
            if !clean.is_empty() {
                tables.push(Table::new(clean, ""));
            }
        }
    }
    tables
}

fn table_meta_for(table: &str) -> TableMeta {
    TableMeta {
        columns: TabularData {
            columns: vec![TabularDataHead::new("Field"), TabularDataHead::new("Type")],
            rows: vec![vec!["id".to_owned(), "int".to_owned()]],
        },
        indexes: TabularData {
            columns: vec![TabularDataHead::new("Key_name")],
            rows: vec![vec!["PRIMARY".to_owned()]],
        },
        create_table_sql: format!("CREATE TABLE {table} (id int)"),
        message: String::new(),
    }
}

fn canned_query_result() -> QueryResult {
    QueryResult {
        columns: vec![TabularDataHead::new("1")],
        rows: vec![vec!["1".to_owned()]],
    }
}

fn canned_explain_result() -> ExplainResult {
    ExplainResult {
        classic: TabularData {
            columns: vec![TabularDataHead::new("select_type")],
            rows: vec![vec!["SIMPLE".to_owned()]],
        },
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn pipe_delivers_bytes_in_order() {
        let (mut writer, mut reader) = pipe();
        writer.write_all(b"hello ").expect("write");
        writer.write_all(b"world").expect("write");
        drop(writer);

        let mut all = Vec::new();
        reader.read_to_end(&mut all).expect("read");
        assert_eq!(all, b"hello world");
    }

    #[rstest]
    fn dropped_reader_breaks_writes() {
        let (mut writer, reader) = pipe();
        drop(reader);
        let err = writer.write_all(b"x").expect_err("must fail");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[rstest]
    fn statement_parsing_classifies_kinds() {
        let nodes = parse_statements("select * from t; create table t (a int); update t set a=1");
        let kinds: Vec<&str> = nodes.iter().map(|n| n.kind.as_str()).collect();
        assert_eq!(kinds, vec![SQL_KIND_DQL, SQL_KIND_DDL, SQL_KIND_DML]);
    }

    #[rstest]
    fn fingerprints_normalise_literals() {
        let nodes = parse_statements("SELECT a FROM t WHERE id = 42");
        let node = nodes.first().expect("one node");
        assert_eq!(node.fingerprint, "select a from t where id = ??");
    }

    #[rstest]
    #[case("create table t (c1 int, c2 int)", 2)]
    #[case("create table t (c1 int)", 1)]
    #[case("create table t ()", 0)]
    fn column_counting(#[case] sql: &str, #[case] expected: i64) {
        assert_eq!(column_count(sql), expected);
    }

    #[rstest]
    fn demo_rules_fire_on_select_star() {
        let findings = evaluate_rules(&demo_rules(), "select * from t");
        assert_eq!(findings.len(), 1);
        let finding = findings.first().expect("one finding");
        assert_eq!(finding.rule_name, "rule_select_star");
        assert_eq!(finding.level, RuleLevel::Error);
    }

    #[rstest]
    fn demo_rules_stay_quiet_below_threshold() {
        let findings = evaluate_rules(&demo_rules(), "create table t (c1 int, c2 int)");
        assert!(findings.is_empty());
    }

    #[rstest]
    fn tables_extract_from_common_clauses() {
        let tables = extract_tables("select a from orders join users on 1=1");
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "users"]);
    }
}
