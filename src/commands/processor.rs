//! Command Processor
//!
//! One handler per Hot Rod operation. Each handler runs its store call,
//! builds the response through the header's encoder and hands it to the
//! request's [`ResponseWriter`]. Any failure, thrown synchronously or
//! delivered by an async completion, goes through [`write_exception`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandProcessor                        │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ dispatch()  │───>│  handler    │───>│  encoder    │──> writer
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘     │
//! │                            │ failure                        │
//! │                            ▼                                │
//! │                     classify() ──> error response ──> writer │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `get` is the only handler that answers asynchronously: it spawns the
//! lookup and writes from whichever task the lookup completes on.

use crate::commands::classifier::classify;
use crate::commands::writer::ResponseWriter;
use crate::error::HotRodError;
use crate::protocol::{OperationStatus, ProtocolFlag, Request, RequestHeader};
use crate::storage::{Caches, MultimapStore};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// Executes decoded requests against the stores.
#[derive(Clone)]
pub struct CommandProcessor {
    caches: Arc<dyn Caches>,
    multimaps: Arc<MultimapStore>,
}

impl std::fmt::Debug for CommandProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProcessor")
            .field("multimaps", &self.multimaps.len())
            .finish()
    }
}

impl CommandProcessor {
    pub fn new(caches: Arc<dyn Caches>, multimaps: Arc<MultimapStore>) -> Self {
        Self { caches, multimaps }
    }

    /// Routes a request to its handler.
    ///
    /// Requests addressed to a cache the backend does not define are
    /// answered with an error before any handler runs.
    pub fn dispatch(&self, request: Request, writer: ResponseWriter) {
        let header = request.header();
        if !self.caches.is_defined(&header.cache_name) {
            let err = HotRodError::CacheNotFound {
                cache_name: header.cache_name.clone(),
                header: Box::new(header.clone()),
            };
            write_exception(Some(header), &err, writer);
            return;
        }

        match request {
            Request::Put { header, key, value } => self.put(header, key, value, writer),
            Request::Get { header, key } => self.get(header, key, writer),
            Request::Remove { header, key } => self.remove(header, key, writer),
            Request::PutAll { header, entries } => self.put_all(header, entries, writer),
            Request::Ping { header } => self.ping(header, writer),
            Request::Stats { header } => self.stats(header, writer),
            Request::Query { header, query } => self.query(header, query, writer),
            Request::Exec {
                header,
                task,
                params,
            } => self.exec(header, task, params, writer),
            Request::IterationStart { header, .. } => self.iteration_start(header, writer),
            Request::IterationNext {
                header,
                iteration_id,
            } => self.iteration_next(header, iteration_id, writer),
            Request::IterationEnd {
                header,
                iteration_id,
            } => self.iteration_end(header, iteration_id, writer),
            Request::GetMultimap { header, key } => self.get_multimap(header, key, writer),
            Request::PutMultimap { header, key, value } => {
                self.put_multimap(header, key, value, writer)
            }
        }
    }

    // ========================================================================
    // Key/value commands
    // ========================================================================

    pub fn put(&self, header: RequestHeader, key: Bytes, value: Bytes, writer: ResponseWriter) {
        if header.has_flag(ProtocolFlag::ForceReturnPreviousValue) {
            write_exception(Some(&header), &previous_value_unsupported(), writer);
            return;
        }

        match self
            .caches
            .put(&header.cache_name, to_string(&key), to_string(&value))
        {
            Ok(()) => write_success(&header, writer),
            Err(e) => write_exception(Some(&header), &e, writer),
        }
    }

    /// The lookup runs on its own task so a backend that panics still gets
    /// an error response written for the request.
    pub fn get(&self, header: RequestHeader, key: Bytes, writer: ResponseWriter) {
        let caches = Arc::clone(&self.caches);
        let cache_name = header.cache_name.clone();
        let lookup = tokio::spawn(async move { caches.get(&cache_name, to_string(&key)).await });

        tokio::spawn(async move {
            let failure = match lookup.await {
                Ok(Ok(value)) => return handle_get_response(&header, value, writer),
                Ok(Err(e)) => e,
                Err(join_err) => HotRodError::server_with_cause("get lookup failed", join_err),
            };
            write_exception(Some(&header), &HotRodError::completion(failure), writer);
        });
    }

    pub fn remove(&self, header: RequestHeader, key: Bytes, writer: ResponseWriter) {
        if header.has_flag(ProtocolFlag::ForceReturnPreviousValue) {
            write_exception(Some(&header), &previous_value_unsupported(), writer);
            return;
        }

        match self.caches.remove(&header.cache_name, &to_string(&key)) {
            Ok(true) => write_success(&header, writer),
            Ok(false) => write_not_exist(&header, writer),
            Err(e) => write_exception(Some(&header), &e, writer),
        }
    }

    /// Applies the entries in order, stopping at the first failure. Entries
    /// written before the failure stay written.
    pub fn put_all(&self, header: RequestHeader, entries: Vec<(Bytes, Bytes)>, writer: ResponseWriter) {
        let result = entries.iter().try_for_each(|(key, value)| {
            self.caches
                .put(&header.cache_name, to_string(key), to_string(value))
        });

        match result {
            Ok(()) => write_success(&header, writer),
            Err(e) => write_exception(Some(&header), &e, writer),
        }
    }

    // ========================================================================
    // Server commands
    // ========================================================================

    pub fn ping(&self, header: RequestHeader, writer: ResponseWriter) {
        writer.write(
            header
                .encoder()
                .ping_response(&header, OperationStatus::Success),
        );
    }

    pub fn stats(&self, header: RequestHeader, writer: ResponseWriter) {
        write_exception(Some(&header), &unsupported("Stats not supported yet!"), writer);
    }

    pub fn query(&self, header: RequestHeader, _query: Bytes, writer: ResponseWriter) {
        write_exception(Some(&header), &unsupported("Query not supported yet!"), writer);
    }

    /// Accepts any task without running it, so administration clients that
    /// create caches through tasks keep working.
    pub fn exec(
        &self,
        header: RequestHeader,
        _task: String,
        _params: HashMap<String, Bytes>,
        writer: ResponseWriter,
    ) {
        writer.write(
            header
                .encoder()
                .value_response(&header, OperationStatus::Success, &[]),
        );
    }

    pub fn iteration_start(&self, header: RequestHeader, writer: ResponseWriter) {
        write_exception(Some(&header), &iteration_unsupported(), writer);
    }

    pub fn iteration_next(&self, header: RequestHeader, _iteration_id: String, writer: ResponseWriter) {
        write_exception(Some(&header), &iteration_unsupported(), writer);
    }

    pub fn iteration_end(&self, header: RequestHeader, _iteration_id: String, writer: ResponseWriter) {
        write_exception(Some(&header), &iteration_unsupported(), writer);
    }

    // ========================================================================
    // Multimap commands
    // ========================================================================

    pub fn get_multimap(&self, header: RequestHeader, key: Bytes, writer: ResponseWriter) {
        let map = self.multimaps.get_or_create(&header.cache_name);
        match map.get(&to_string(&key)) {
            Some(values) => writer.write(header.encoder().collection_response(
                &header,
                OperationStatus::Success,
                &values,
            )),
            None => write_not_exist(&header, writer),
        }
    }

    pub fn put_multimap(&self, header: RequestHeader, key: Bytes, value: Bytes, writer: ResponseWriter) {
        let map = self.multimaps.get_or_create(&header.cache_name);
        map.put(to_string(&key), value);
        write_success(&header, writer);
    }
}

// ============================================================================
// Response helpers
// ============================================================================

fn handle_get_response(header: &RequestHeader, value: Option<String>, writer: ResponseWriter) {
    match value {
        Some(value) => writer.write(header.encoder().value_response(
            header,
            OperationStatus::Success,
            value.as_bytes(),
        )),
        None => write_not_exist(header, writer),
    }
}

fn write_success(header: &RequestHeader, writer: ResponseWriter) {
    writer.write(
        header
            .encoder()
            .empty_response(header, OperationStatus::Success),
    );
}

fn write_not_exist(header: &RequestHeader, writer: ResponseWriter) {
    writer.write(header.encoder().not_exist_response(header));
}

/// Classifies `failure` and writes the resulting error response.
pub fn write_exception(header: Option<&RequestHeader>, failure: &HotRodError, writer: ResponseWriter) {
    let classification = classify(failure, header);
    let error_header = &classification.header;
    writer.write(error_header.encoder().error_response(
        error_header,
        &classification.message,
        classification.status,
    ));
}

fn unsupported(message: &str) -> HotRodError {
    HotRodError::Unsupported(message.to_string())
}

fn previous_value_unsupported() -> HotRodError {
    unsupported("previous value is not supported!")
}

fn iteration_unsupported() -> HotRodError {
    unsupported("Iteration not supported yet!")
}

/// Keys, values and cache names are stored as UTF-8 text.
fn to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::{decode_response, DecodedResponse};
    use crate::protocol::HotRodOperation;
    use crate::storage::{CacheFuture, StorageEngine};
    use std::time::Duration;

    fn create_processor() -> (CommandProcessor, Arc<StorageEngine>, Arc<MultimapStore>) {
        let storage = Arc::new(StorageEngine::new());
        let multimaps = Arc::new(MultimapStore::new());
        let processor = CommandProcessor::new(storage.clone(), multimaps.clone());
        (processor, storage, multimaps)
    }

    fn header(op: HotRodOperation, cache: &str) -> RequestHeader {
        RequestHeader::new(op, 30, 11, cache)
    }

    async fn respond(f: impl FnOnce(ResponseWriter)) -> DecodedResponse {
        let (writer, slot) = ResponseWriter::channel();
        f(writer);
        decode_response(&slot.await.unwrap())
    }

    /// Backend that rejects writes to one key and can fail or delay reads.
    struct FlakyCaches {
        inner: StorageEngine,
        reject_key: &'static str,
        failing_gets: bool,
    }

    impl Caches for FlakyCaches {
        fn put(&self, cache_name: &str, key: String, value: String) -> Result<(), HotRodError> {
            if key == self.reject_key {
                return Err(HotRodError::server_with_cause("write rejected", "disk full"));
            }
            self.inner.put(cache_name, key, value)
        }

        fn get(&self, cache_name: &str, key: String) -> CacheFuture<Option<String>> {
            if self.failing_gets {
                return Box::pin(async { Err(HotRodError::Timeout("lookup".into())) });
            }
            let lookup = self.inner.get(cache_name, key);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                lookup.await
            })
        }

        fn remove(&self, cache_name: &str, key: &str) -> Result<bool, HotRodError> {
            self.inner.remove(cache_name, key)
        }
    }

    /// Backend whose reads panic.
    struct PanickingCaches;

    impl Caches for PanickingCaches {
        fn put(&self, _cache_name: &str, _key: String, _value: String) -> Result<(), HotRodError> {
            Ok(())
        }

        fn get(&self, _cache_name: &str, _key: String) -> CacheFuture<Option<String>> {
            Box::pin(async { panic!("backend blew up") })
        }

        fn remove(&self, _cache_name: &str, _key: &str) -> Result<bool, HotRodError> {
            Ok(false)
        }
    }

    fn flaky_processor(failing_gets: bool) -> (CommandProcessor, Arc<FlakyCaches>) {
        let caches = Arc::new(FlakyCaches {
            inner: StorageEngine::new(),
            reject_key: "bad",
            failing_gets,
        });
        let processor = CommandProcessor::new(caches.clone(), Arc::new(MultimapStore::new()));
        (processor, caches)
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (processor, _, _) = create_processor();

        let response = respond(|w| {
            processor.get(header(HotRodOperation::Get, "cacheA"), Bytes::from("missing"), w)
        })
        .await;
        assert_eq!(response.status, OperationStatus::KeyDoesNotExist);
        assert_eq!(response.opcode, 0x04);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (processor, _, _) = create_processor();

        let response = respond(|w| {
            processor.put(
                header(HotRodOperation::Put, "cacheA"),
                Bytes::from("k"),
                Bytes::from("v"),
                w,
            )
        })
        .await;
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(response.message_id, 11);

        let response = respond(|w| {
            processor.get(header(HotRodOperation::Get, "cacheA"), Bytes::from("k"), w)
        })
        .await;
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(response.value(), Some(Bytes::from("v")));
    }

    #[tokio::test]
    async fn test_put_remove_get() {
        let (processor, _, _) = create_processor();

        respond(|w| {
            processor.put(
                header(HotRodOperation::Put, "c"),
                Bytes::from("k"),
                Bytes::from("v"),
                w,
            )
        })
        .await;

        let response =
            respond(|w| processor.remove(header(HotRodOperation::Remove, "c"), Bytes::from("k"), w))
                .await;
        assert_eq!(response.status, OperationStatus::Success);

        let response =
            respond(|w| processor.remove(header(HotRodOperation::Remove, "c"), Bytes::from("k"), w))
                .await;
        assert_eq!(response.status, OperationStatus::KeyDoesNotExist);

        let response =
            respond(|w| processor.get(header(HotRodOperation::Get, "c"), Bytes::from("k"), w)).await;
        assert_eq!(response.status, OperationStatus::KeyDoesNotExist);
    }

    #[tokio::test]
    async fn test_previous_value_flag_is_rejected() {
        let (processor, storage, _) = create_processor();
        let flagged = |op| header(op, "c").with_flags(ProtocolFlag::ForceReturnPreviousValue.mask());

        let response = respond(|w| {
            processor.put(flagged(HotRodOperation::Put), Bytes::from("k"), Bytes::from("v"), w)
        })
        .await;
        assert_eq!(response.opcode, 0x50);
        assert_eq!(response.status, OperationStatus::ServerError);
        assert_eq!(
            response.error_message().as_deref(),
            Some("unsupported operation: previous value is not supported!")
        );
        assert!(storage.is_empty());

        storage.put("c", "k".into(), "v".into()).unwrap();
        let response =
            respond(|w| processor.remove(flagged(HotRodOperation::Remove), Bytes::from("k"), w)).await;
        assert_eq!(response.status, OperationStatus::ServerError);
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_put_all() {
        let (processor, storage, _) = create_processor();
        let entries = vec![
            (Bytes::from("a"), Bytes::from("1")),
            (Bytes::from("b"), Bytes::from("2")),
        ];

        let response =
            respond(|w| processor.put_all(header(HotRodOperation::PutAll, "c"), entries, w)).await;
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_put_all_stops_at_first_failure() {
        let (processor, caches) = flaky_processor(false);
        let entries = vec![
            (Bytes::from("a"), Bytes::from("1")),
            (Bytes::from("b"), Bytes::from("2")),
            (Bytes::from("bad"), Bytes::from("3")),
            (Bytes::from("d"), Bytes::from("4")),
        ];

        let response =
            respond(|w| processor.put_all(header(HotRodOperation::PutAll, "c"), entries, w)).await;
        assert_eq!(response.status, OperationStatus::ServerError);
        assert_eq!(response.message_id, 11);
        assert_eq!(response.error_message().as_deref(), Some("write rejected\ndisk full"));

        // entries before the failure stay applied, the rest never ran
        assert_eq!(caches.inner.len(), 2);
        assert!(!caches.inner.remove("c", "d").unwrap());
    }

    #[tokio::test]
    async fn test_store_failure_on_put() {
        let (processor, _) = flaky_processor(false);
        let response = respond(|w| {
            processor.put(header(HotRodOperation::Put, "c"), Bytes::from("bad"), Bytes::from("v"), w)
        })
        .await;
        assert_eq!(response.status, OperationStatus::ServerError);
    }

    #[tokio::test]
    async fn test_get_completes_later() {
        let (processor, caches) = flaky_processor(false);
        caches.inner.put("c", "k".into(), "v".into()).unwrap();

        let response =
            respond(|w| processor.get(header(HotRodOperation::Get, "c"), Bytes::from("k"), w)).await;
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(response.value(), Some(Bytes::from("v")));
    }

    #[tokio::test]
    async fn test_async_get_failure_is_classified() {
        let (processor, _) = flaky_processor(true);

        let response =
            respond(|w| processor.get(header(HotRodOperation::Get, "c"), Bytes::from("k"), w)).await;
        assert_eq!(response.opcode, 0x50);
        assert_eq!(response.status, OperationStatus::OperationTimedOut);
        assert_eq!(response.message_id, 11);
    }

    #[tokio::test]
    async fn test_panicking_get_still_answers() {
        let processor = CommandProcessor::new(Arc::new(PanickingCaches), Arc::new(MultimapStore::new()));

        let (writer, slot) = ResponseWriter::channel();
        processor.get(header(HotRodOperation::Get, "c"), Bytes::from("k"), writer);
        let buf = tokio::time::timeout(Duration::from_secs(1), slot)
            .await
            .unwrap()
            .unwrap();

        let response = decode_response(&buf);
        assert_eq!(response.opcode, 0x50);
        assert_eq!(response.status, OperationStatus::ServerError);
        assert_eq!(response.message_id, 11);
        assert!(response
            .error_message()
            .unwrap()
            .starts_with("get lookup failed\n"));
    }

    #[tokio::test]
    async fn test_ping_and_exec() {
        let (processor, _, _) = create_processor();

        let response = respond(|w| processor.ping(header(HotRodOperation::Ping, ""), w)).await;
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(response.opcode, 0x18);

        let response = respond(|w| {
            processor.exec(
                header(HotRodOperation::Exec, ""),
                "@@cache@getorcreate".into(),
                HashMap::new(),
                w,
            )
        })
        .await;
        assert_eq!(response.status, OperationStatus::Success);
        assert_eq!(response.value(), Some(Bytes::new()));
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let (processor, _, _) = create_processor();

        let cases: Vec<(Box<dyn FnOnce(ResponseWriter) + '_>, &str)> = vec![
            (
                Box::new(|w| processor.stats(header(HotRodOperation::Stats, ""), w)),
                "Stats not supported yet!",
            ),
            (
                Box::new(|w| processor.query(header(HotRodOperation::Query, ""), Bytes::new(), w)),
                "Query not supported yet!",
            ),
            (
                Box::new(|w| processor.iteration_start(header(HotRodOperation::IterationStart, ""), w)),
                "Iteration not supported yet!",
            ),
            (
                Box::new(|w| {
                    processor.iteration_next(header(HotRodOperation::IterationNext, ""), "id".into(), w)
                }),
                "Iteration not supported yet!",
            ),
            (
                Box::new(|w| {
                    processor.iteration_end(header(HotRodOperation::IterationEnd, ""), "id".into(), w)
                }),
                "Iteration not supported yet!",
            ),
        ];

        for (call, expected) in cases {
            let response = respond(call).await;
            assert_eq!(response.opcode, 0x50);
            assert_eq!(response.status, OperationStatus::ServerError);
            assert!(response.error_message().unwrap().ends_with(expected));
        }
    }

    #[tokio::test]
    async fn test_multimap_put_and_get() {
        let (processor, _, multimaps) = create_processor();

        let response = respond(|w| {
            processor.get_multimap(header(HotRodOperation::GetMultimap, "m"), Bytes::from("k"), w)
        })
        .await;
        assert_eq!(response.status, OperationStatus::KeyDoesNotExist);

        for v in ["1", "2", "3"] {
            let response = respond(|w| {
                processor.put_multimap(
                    header(HotRodOperation::PutMultimap, "m"),
                    Bytes::from("k"),
                    Bytes::from(v),
                    w,
                )
            })
            .await;
            assert_eq!(response.status, OperationStatus::Success);
        }

        let response = respond(|w| {
            processor.get_multimap(header(HotRodOperation::GetMultimap, "m"), Bytes::from("k"), w)
        })
        .await;
        assert_eq!(response.opcode, 0x68);
        assert_eq!(
            response.collection(),
            Some(vec![Bytes::from("1"), Bytes::from("2"), Bytes::from("3")])
        );
        assert_eq!(multimaps.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_operation() {
        let (processor, storage, _) = create_processor();

        let request = Request::Put {
            header: header(HotRodOperation::Put, "c"),
            key: Bytes::from("k"),
            value: Bytes::from("v"),
        };
        let response = respond(|w| processor.dispatch(request, w)).await;
        assert_eq!(response.opcode, 0x02);
        assert_eq!(storage.len(), 1);

        let request = Request::Stats {
            header: header(HotRodOperation::Stats, "c"),
        };
        let response = respond(|w| processor.dispatch(request, w)).await;
        assert_eq!(response.opcode, 0x50);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_undefined_cache() {
        let storage = Arc::new(StorageEngine::with_caches(["books"]));
        let processor = CommandProcessor::new(storage.clone(), Arc::new(MultimapStore::new()));

        let request = Request::Put {
            header: header(HotRodOperation::Put, "movies"),
            key: Bytes::from("k"),
            value: Bytes::from("v"),
        };
        let response = respond(|w| processor.dispatch(request, w)).await;
        assert_eq!(response.status, OperationStatus::ParseError);
        assert_eq!(
            response.error_message().as_deref(),
            Some("cache with name 'movies' not found")
        );
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_write_exception_without_header() {
        let response = respond(|w| {
            write_exception(None, &HotRodError::InvalidMagicId("got 0x42".into()), w)
        })
        .await;
        assert_eq!(response.status, OperationStatus::InvalidMagicOrMsgId);
        assert_eq!(response.message_id, 0);
    }
}
