//! Scriptable probe and sender doubles
//!
//! Both are cheap to clone; clones share their script and recordings so a
//! test can keep one copy while the session owns another.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tuner_net::{ConnectivityProbe, DatagramSender, ProbeConfig};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Probe that answers from a script
///
/// Each call pops the next scripted answer. Once the script is empty the
/// fallback answer is returned. Hosts given their own answer with
/// [`ScriptedProbe::answer_host`] bypass the script.
#[derive(Debug, Clone)]
pub struct ScriptedProbe {
    script: Arc<Mutex<VecDeque<bool>>>,
    hosts: Arc<Mutex<HashMap<String, (bool, Duration)>>>,
    fallback: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl ScriptedProbe {
    /// Probe that always answers `reachable`
    pub fn always(reachable: bool) -> Self {
        Self::with_script([], reachable)
    }

    /// Probe that plays `script` and then answers `fallback`
    pub fn with_script(script: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            hosts: Arc::new(Mutex::new(HashMap::new())),
            fallback: Arc::new(AtomicBool::new(fallback)),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Make every probe take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Change the answer given once the script is exhausted
    pub fn set_fallback(&self, reachable: bool) {
        self.fallback.store(reachable, Ordering::SeqCst);
    }

    /// Always answer `reachable` for `host`, after `delay`
    pub fn answer_host(&self, host: impl Into<String>, reachable: bool, delay: Duration) {
        lock(&self.hosts).insert(host.into(), (reachable, delay));
    }

    /// Number of completed probe calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConnectivityProbe for ScriptedProbe {
    async fn probe(&self, host: &str, _config: &ProbeConfig) -> bool {
        let fixed = lock(&self.hosts).get(host).copied();
        if let Some((answer, delay)) = fixed {
            tokio::time::sleep(delay).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            return answer;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.load(Ordering::SeqCst));
        self.calls.fetch_add(1, Ordering::SeqCst);
        answer
    }
}

/// One call seen by a [`RecordingSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub host: String,
    pub port: u16,
    pub payload: Vec<u8>,
}

/// Sender that records payloads instead of transmitting them
#[derive(Debug, Clone)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<SentDatagram>>>,
    succeed: Arc<AtomicBool>,
}

impl RecordingSender {
    /// Sender whose sends report success
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            succeed: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Choose the result reported for subsequent sends
    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    /// Every send call so far, in order
    pub fn sent(&self) -> Vec<SentDatagram> {
        lock(&self.sent).clone()
    }

    /// Number of send calls so far
    pub fn count(&self) -> usize {
        lock(&self.sent).len()
    }
}

impl Default for RecordingSender {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramSender for RecordingSender {
    async fn send(&self, host: &str, port: u16, payload: &[u8], _timeout: Duration) -> bool {
        lock(&self.sent).push(SentDatagram {
            host: host.to_string(),
            port,
            payload: payload.to_vec(),
        });
        self.succeed.load(Ordering::SeqCst)
    }
}
