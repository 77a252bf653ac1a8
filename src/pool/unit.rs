//! Execution unit runtime
//!
//! Each unit is a dedicated thread owning exactly one engine instance. It
//! processes one request at a time and reports back through the scheduler's
//! inbox, tagging every response with its slot index.

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use super::engine::{CompressionEngine, EngineFactory};
use super::protocol::{Request, Response};
use super::scheduler::Event;

/// Engine lifecycle inside one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Uninitialized,
    Initializing,
    Ready,
}

/// The per-unit state machine. Holds the only copy of the "engine is loaded" flag.
pub struct UnitRuntime {
    state: UnitState,
    engine: Box<dyn CompressionEngine>,
}

impl UnitRuntime {
    pub fn new(engine: Box<dyn CompressionEngine>) -> Self {
        Self {
            state: UnitState::Uninitialized,
            engine,
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Handle one request, passing every response it produces to `emit`
    pub fn handle(&mut self, request: Request, emit: &mut dyn FnMut(Response)) {
        match request {
            Request::Init { id } => self.init(id, emit),
            Request::Compress { id, data, filename } => self.compress(id, data, &filename, emit),
        }
    }

    fn init(&mut self, id: String, emit: &mut dyn FnMut(Response)) {
        match self.state {
            UnitState::Ready | UnitState::Initializing => {
                tracing::trace!("Engine already loaded, acknowledging {}", id);
                emit(Response::InitSuccess { id });
            }
            UnitState::Uninitialized => {
                self.state = UnitState::Initializing;
                match self.engine.initialize() {
                    Ok(()) => {
                        self.state = UnitState::Ready;
                        emit(Response::InitSuccess { id });
                    }
                    Err(e) => {
                        self.state = UnitState::Uninitialized;
                        emit(Response::InitError {
                            id,
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        }
    }

    fn compress(&mut self, id: String, data: Vec<u8>, filename: &str, emit: &mut dyn FnMut(Response)) {
        if self.state != UnitState::Ready {
            emit(Response::Error {
                id,
                error: "engine not initialized".to_string(),
            });
            return;
        }

        emit(Response::Progress { id: id.clone() });
        tracing::trace!("Compressing {} ({} bytes) as {}", filename, data.len(), id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.engine.transform(&data)));
        let response = match outcome {
            Ok(Ok(output)) => Response::Success {
                id,
                original_size: data.len(),
                compressed_size: output.len(),
                data: output,
            },
            Ok(Err(e)) => Response::Error {
                id,
                error: format!("{:#}", e),
            },
            Err(payload) => Response::Error {
                id,
                error: format!("engine panicked: {}", panic_message(payload.as_ref())),
            },
        };
        emit(response);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Reports the unit's thread ending, including unwinding out of a panic
struct ExitNotice {
    slot: usize,
    events: Sender<Event>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.events.send(Event::UnitExited {
            slot: self.slot,
            panicked: thread::panicking(),
        });
    }
}

/// Start the unit thread for `slot`. The thread runs until `requests` is closed.
pub(crate) fn spawn(
    slot: usize,
    factory: EngineFactory,
    requests: Receiver<Request>,
    events: Sender<Event>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("presspool-unit-{}", slot))
        .spawn(move || {
            let _notice = ExitNotice {
                slot,
                events: events.clone(),
            };
            let mut runtime = UnitRuntime::new(factory(slot));

            while let Ok(request) = requests.recv() {
                tracing::trace!("Unit {} received {} ({})", slot, request.kind(), request.id());
                runtime.handle(request, &mut |response| {
                    if events.send(Event::Unit { slot, response }).is_err() {
                        tracing::trace!("Scheduler gone, dropping response from unit {}", slot);
                    }
                });
            }
            tracing::debug!("Unit {} stopped", slot);
        })
        .with_context(|| format!("Failed to spawn execution unit {}", slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        inits: Arc<AtomicUsize>,
        fail_init: bool,
    }

    impl CompressionEngine for CountingEngine {
        fn initialize(&mut self) -> Result<()> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                anyhow::bail!("wasm module missing");
            }
            Ok(())
        }

        fn transform(&self, input: &[u8]) -> Result<Vec<u8>> {
            match input {
                b"malformed" => anyhow::bail!("Can not shrink"),
                b"panic" => panic!("corrupt xref table"),
                _ => Ok(input[..input.len() / 2].to_vec()),
            }
        }
    }

    fn runtime(fail_init: bool) -> (UnitRuntime, Arc<AtomicUsize>) {
        let inits = Arc::new(AtomicUsize::new(0));
        let engine = CountingEngine {
            inits: inits.clone(),
            fail_init,
        };
        (UnitRuntime::new(Box::new(engine)), inits)
    }

    fn run(runtime: &mut UnitRuntime, request: Request) -> Vec<Response> {
        let mut responses = Vec::new();
        runtime.handle(request, &mut |r| responses.push(r));
        responses
    }

    fn compress(id: &str, data: &[u8]) -> Request {
        Request::Compress {
            id: id.to_string(),
            data: data.to_vec(),
            filename: "doc.pdf".to_string(),
        }
    }

    #[test]
    fn test_second_init_does_not_reinitialize() {
        let (mut rt, inits) = runtime(false);

        let first = run(&mut rt, Request::Init { id: "init-a".into() });
        let second = run(&mut rt, Request::Init { id: "init-b".into() });

        assert_eq!(first, vec![Response::InitSuccess { id: "init-a".into() }]);
        assert_eq!(second, vec![Response::InitSuccess { id: "init-b".into() }]);
        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert_eq!(rt.state(), UnitState::Ready);
    }

    #[test]
    fn test_failed_init_reports_and_stays_uninitialized() {
        let (mut rt, _) = runtime(true);

        let responses = run(&mut rt, Request::Init { id: "init-0".into() });
        assert_eq!(
            responses,
            vec![Response::InitError {
                id: "init-0".into(),
                error: "wasm module missing".into()
            }]
        );
        assert_eq!(rt.state(), UnitState::Uninitialized);
    }

    #[test]
    fn test_compress_before_init_is_an_error() {
        let (mut rt, _) = runtime(false);

        let responses = run(&mut rt, compress("t1", b"abcd"));
        assert_eq!(
            responses,
            vec![Response::Error {
                id: "t1".into(),
                error: "engine not initialized".into()
            }]
        );
    }

    #[test]
    fn test_compress_reports_progress_then_sizes() {
        let (mut rt, _) = runtime(false);
        run(&mut rt, Request::Init { id: "init-0".into() });

        let responses = run(&mut rt, compress("t1", b"abcdefgh"));
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0], Response::Progress { id: "t1".into() });
        match &responses[1] {
            Response::Success {
                id,
                data,
                original_size,
                compressed_size,
            } => {
                assert_eq!(id, "t1");
                assert_eq!(*original_size, 8);
                assert_eq!(*compressed_size, data.len());
                assert_eq!(data, b"abcd");
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[test]
    fn test_engine_failure_and_panic_become_task_errors() {
        let (mut rt, _) = runtime(false);
        run(&mut rt, Request::Init { id: "init-0".into() });

        let failed = run(&mut rt, compress("bad", b"malformed"));
        assert_eq!(
            failed.last(),
            Some(&Response::Error {
                id: "bad".into(),
                error: "Can not shrink".into()
            })
        );

        let panicked = run(&mut rt, compress("boom", b"panic"));
        match panicked.last() {
            Some(Response::Error { id, error }) => {
                assert_eq!(id, "boom");
                assert!(error.contains("corrupt xref table"));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        // The unit keeps serving after a failure
        let ok = run(&mut rt, compress("good", b"abcd"));
        assert!(matches!(ok.last(), Some(Response::Success { .. })));
    }
}
