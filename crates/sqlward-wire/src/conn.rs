//! Concurrency-safe call dispatch over one plugin connection.
//!
//! A [`Connection`] owns the writer half of a negotiated connection and a
//! background thread draining the reader half. Requests are numbered;
//! responses are routed back to the waiting caller by id, so any number of
//! threads may call over the same connection concurrently. Every call is a
//! bounded wait: if no response arrives within the deadline the call fails
//! with [`WireError::Timeout`] instead of blocking the caller for as long
//! as a wedged plugin feels like.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::envelope::{Request, Response};
use crate::error::WireError;
use crate::framing::{FrameReader, FrameWriter};
use crate::handshake;

/// Log target for connection operations.
const CONN_TARGET: &str = "sqlward_wire::conn";

/// Deadline applied to every call unless the host configures another.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Object-safe frame sink so the connection can own any writer type.
trait FrameSink: Send {
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), WireError>;
}

impl<W: Write + Send> FrameSink for FrameWriter<W> {
    fn send_frame(&mut self, payload: &[u8]) -> Result<(), WireError> {
        self.send(payload)
    }
}

struct Shared {
    writer: Mutex<Box<dyn FrameSink>>,
    pending: Mutex<HashMap<u64, mpsc::Sender<Response>>>,
    next_id: AtomicU64,
    call_timeout: Duration,
    alive: AtomicBool,
}

impl Shared {
    fn remove_pending(&self, id: u64) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        pending.remove(&id);
    }
}

/// A negotiated connection to one plugin process.
///
/// Cloning is cheap and shares the underlying connection; all clones
/// dispatch over the same subprocess pipe.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Performs the handshake on fresh stream halves and starts dispatch.
    ///
    /// Returns the connection and the negotiated protocol version.
    ///
    /// # Errors
    ///
    /// Returns a handshake, framing, or codec error when negotiation fails;
    /// no reader thread is started in that case.
    pub fn establish<R, W>(
        reader: R,
        writer: W,
        call_timeout: Duration,
    ) -> Result<(Self, u32), WireError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let mut frame_reader = FrameReader::new(reader);
        let mut frame_writer = FrameWriter::new(writer);
        let version = handshake::negotiate(&mut frame_reader, &mut frame_writer)?;

        let shared = Arc::new(Shared {
            writer: Mutex::new(Box::new(frame_writer)),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            call_timeout,
            alive: AtomicBool::new(true),
        });

        let reader_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("sqlward-wire-reader".to_owned())
            .spawn(move || run_reader(frame_reader, &reader_shared))
            .map_err(WireError::Io)?;

        Ok((Self { shared }, version))
    }

    /// Returns `true` while the reader half is still draining responses.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Returns a client bound to one named service of this connection.
    #[must_use]
    pub fn client(&self, service: impl Into<String>) -> ServiceClient {
        ServiceClient {
            conn: self.clone(),
            service: service.into(),
        }
    }

    /// Calls a method on a service and waits for the response value.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Remote`] when the plugin answers with a
    /// failure, [`WireError::Timeout`] when the deadline elapses, and
    /// [`WireError::ConnectionClosed`] when the plugin closed its end.
    pub fn call(&self, service: &str, method: &str, params: Value) -> Result<Value, WireError> {
        if !self.is_alive() {
            return Err(WireError::ConnectionClosed);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id, service, method, params);
        let payload = serde_json::to_vec(&request)?;

        let (tx, rx) = mpsc::channel();
        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            pending.insert(id, tx);
        }

        debug!(target: CONN_TARGET, service, method, id, "sending request");
        let sent = {
            let mut writer = self
                .shared
                .writer
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            writer.send_frame(&payload)
        };
        if let Err(err) = sent {
            self.shared.remove_pending(id);
            return Err(err);
        }

        match rx.recv_timeout(self.shared.call_timeout) {
            Ok(response) => {
                if let Some(failure) = response.error {
                    return Err(WireError::Remote {
                        code: failure.code,
                        message: failure.message,
                    });
                }
                Ok(response.result.unwrap_or(Value::Null))
            }
            Err(RecvTimeoutError::Timeout) => {
                self.shared.remove_pending(id);
                warn!(
                    target: CONN_TARGET,
                    service,
                    method,
                    id,
                    timeout_secs = self.shared.call_timeout.as_secs(),
                    "call deadline elapsed"
                );
                Err(WireError::Timeout {
                    timeout_secs: self.shared.call_timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(WireError::ConnectionClosed),
        }
    }

    /// Calls a method with typed parameters and result.
    ///
    /// # Errors
    ///
    /// As [`Connection::call`], plus [`WireError::Codec`] when the result
    /// does not match the expected shape.
    pub fn call_typed<P, T>(&self, service: &str, method: &str, params: &P) -> Result<T, WireError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let value = self.call(service, method, serde_json::to_value(params)?)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

fn run_reader<R: Read>(mut reader: FrameReader<R>, shared: &Shared) {
    loop {
        let frame = match reader.receive() {
            Ok(frame) => frame,
            Err(err) => {
                debug!(target: CONN_TARGET, error = %err, "connection reader stopped");
                break;
            }
        };

        match serde_json::from_slice::<Response>(&frame) {
            Ok(response) => route_response(shared, response),
            Err(err) => {
                warn!(target: CONN_TARGET, error = %err, "discarding undecodable frame");
            }
        }
    }

    shared.alive.store(false, Ordering::Release);
    let mut pending = shared
        .pending
        .lock()
        .unwrap_or_else(|poison| poison.into_inner());
    // Dropping the senders wakes every waiting caller with a closed error.
    pending.clear();
}

fn route_response(shared: &Shared, response: Response) {
    let waiter = {
        let mut pending = shared
            .pending
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        pending.remove(&response.id)
    };
    match waiter {
        Some(tx) => {
            // The caller may have timed out and gone away; that is fine.
            drop(tx.send(response));
        }
        None => {
            warn!(
                target: CONN_TARGET,
                id = response.id,
                "dropping response with no waiting caller"
            );
        }
    }
}

/// A handle to one named service multiplexed over a [`Connection`].
///
/// Obtaining a client is purely local; whether the plugin actually provides
/// the service only shows up when a call is made.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    conn: Connection,
    service: String,
}

impl ServiceClient {
    /// Returns the service this client addresses.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Calls a method on this service.
    ///
    /// # Errors
    ///
    /// As [`Connection::call_typed`].
    pub fn call<P, T>(&self, method: &str, params: &P) -> Result<T, WireError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        self.conn.call_typed(&self.service, method, params)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::envelope::CODE_INTERNAL;
    use crate::handshake::PROTOCOL_V2;
    use crate::testkit::duplex;

    /// Runs a scripted responder on the far end of a duplex pair.
    fn serve<F>(script: F) -> Connection
    where
        F: FnOnce(&mut FrameReader<crate::testkit::PipeReader>, &mut FrameWriter<crate::testkit::PipeWriter>)
            + Send
            + 'static,
    {
        let (host_end, plugin_end) = duplex();
        let handle = thread::spawn(move || {
            let (plugin_reader, plugin_writer) = plugin_end.split();
            let mut reader = FrameReader::new(plugin_reader);
            let mut writer = FrameWriter::new(plugin_writer);
            handshake::accept(&mut reader, &mut writer, &[PROTOCOL_V2]).expect("accept");
            script(&mut reader, &mut writer);
        });

        let (host_reader, host_writer) = host_end.split();
        let (conn, version) =
            Connection::establish(host_reader, host_writer, Duration::from_millis(500))
                .expect("establish");
        assert_eq!(version, PROTOCOL_V2);
        drop(handle);
        conn
    }

    fn read_request(reader: &mut FrameReader<crate::testkit::PipeReader>) -> Request {
        let frame = reader.receive().expect("request frame");
        serde_json::from_slice(&frame).expect("request")
    }

    fn write_response(
        writer: &mut FrameWriter<crate::testkit::PipeWriter>,
        response: &Response,
    ) {
        let bytes = serde_json::to_vec(response).expect("encode");
        writer.send(&bytes).expect("send");
    }

    #[rstest]
    fn call_round_trips_result() {
        let conn = serve(|reader, writer| {
            let request = read_request(reader);
            assert_eq!(request.service, "driver");
            assert_eq!(request.method, "Ping");
            write_response(writer, &Response::success(request.id, json!({"ok": true})));
        });

        let result = conn.call("driver", "Ping", Value::Null).expect("call");
        assert_eq!(result, json!({"ok": true}));
    }

    #[rstest]
    fn responses_route_by_id_not_arrival_order() {
        let conn = serve(|reader, writer| {
            let request = read_request(reader);
            // A response for a request nobody issued must be skipped.
            write_response(writer, &Response::success(9999, json!("stray")));
            write_response(writer, &Response::success(request.id, json!("expected")));
        });

        let result = conn.call("driver", "Ping", Value::Null).expect("call");
        assert_eq!(result, json!("expected"));
    }

    #[rstest]
    fn remote_failure_is_typed() {
        let conn = serve(|reader, writer| {
            let request = read_request(reader);
            write_response(
                writer,
                &Response::failure(request.id, CODE_INTERNAL, "exec refused"),
            );
        });

        let err = conn
            .call("driver", "Exec", json!({"sql": "drop table t"}))
            .expect_err("must fail");
        assert!(
            matches!(err, WireError::Remote { code, ref message } if code == CODE_INTERNAL && message == "exec refused")
        );
    }

    #[rstest]
    fn silent_plugin_times_out() {
        let conn = serve(|reader, _writer| {
            // Read the request, never answer, keep the pipe open long
            // enough for the caller's deadline to elapse.
            let _request = read_request(reader);
            thread::sleep(Duration::from_millis(800));
        });

        let err = conn.call("driver", "Ping", Value::Null).expect_err("must time out");
        assert!(matches!(err, WireError::Timeout { .. }));
    }

    #[rstest]
    fn closed_plugin_fails_calls() {
        let conn = serve(|_reader, _writer| {
            // Return immediately, dropping the plugin's pipe ends.
        });

        // Give the reader thread a moment to observe EOF.
        thread::sleep(Duration::from_millis(50));
        let err = conn.call("driver", "Ping", Value::Null).expect_err("must fail");
        assert!(matches!(
            err,
            WireError::ConnectionClosed | WireError::Io(_)
        ));
    }

    #[rstest]
    fn service_client_addresses_its_service() {
        let conn = serve(|reader, writer| {
            let request = read_request(reader);
            assert_eq!(request.service, "audit-driver");
            write_response(writer, &Response::success(request.id, json!({})));
        });

        let client = conn.client("audit-driver");
        let _: crate::envelope::Empty = client.call("Init", &crate::envelope::Empty {}).expect("call");
    }
}
