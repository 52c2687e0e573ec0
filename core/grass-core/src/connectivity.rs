//! Bounded wait for network reachability.
//!
//! Used once at startup so the offline-time report is not sent into a network
//! that is still coming up. A network that never appears degrades to "proceed
//! offline": the gate reports `false` and never errors.

use reqwest::blocking::Client;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{Result, TrackerError};

pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "https://1.1.1.1",     // Cloudflare DNS
    "https://8.8.8.8",     // Google DNS
    "https://example.com", // Example URL
];

const PROBE_TIMEOUT_SECS: u64 = 5;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Single reachability check against one endpoint.
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self, endpoint: &str) -> Result<()>;
}

/// Treats any HTTP response, whatever its status, as proof of connectivity.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()
            .map_err(|err| TrackerError::Http {
                context: "Failed to build connectivity client".to_string(),
                source: err,
            })?;
        Ok(Self { client })
    }
}

impl ReachabilityProbe for HttpProbe {
    fn probe(&self, endpoint: &str) -> Result<()> {
        self.client
            .get(endpoint)
            .send()
            .map(|_| ())
            .map_err(|err| TrackerError::Http {
                context: format!("Failed to reach {}", endpoint),
                source: err,
            })
    }
}

pub struct ConnectivityGate {
    endpoints: Vec<String>,
    probe: Box<dyn ReachabilityProbe>,
}

impl ConnectivityGate {
    /// HTTP gate over `endpoints`, or [`DEFAULT_ENDPOINTS`] when empty.
    pub fn new(endpoints: &[String]) -> Result<Self> {
        Ok(Self::with_probe(endpoints, Box::new(HttpProbe::new()?)))
    }

    pub fn with_probe(endpoints: &[String], probe: Box<dyn ReachabilityProbe>) -> Self {
        let endpoints = if endpoints.is_empty() {
            DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
        } else {
            endpoints.to_vec()
        };
        Self { endpoints, probe }
    }

    pub fn wait_for_network(&self, timeout: Duration, check_interval: Duration) -> bool {
        self.wait_for_network_until(timeout, check_interval, || false)
    }

    /// Like [`ConnectivityGate::wait_for_network`], but gives up early (returning
    /// `false`) as soon as `should_stop` reports true.
    pub fn wait_for_network_until(
        &self,
        timeout: Duration,
        check_interval: Duration,
        should_stop: impl Fn() -> bool,
    ) -> bool {
        let started = Instant::now();
        info!("Waiting for network connection...");

        while started.elapsed() < timeout {
            for endpoint in &self.endpoints {
                if should_stop() {
                    info!("Network wait interrupted");
                    return false;
                }
                match self.probe.probe(endpoint) {
                    Ok(()) => {
                        info!(endpoint = %endpoint, "Network connection established");
                        return true;
                    }
                    Err(err) => debug!(endpoint = %endpoint, error = %err, "Endpoint unreachable"),
                }
            }

            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            warn!(
                retry_in_secs = check_interval.as_secs_f64(),
                "No network connectivity yet"
            );
            if !sleep_unless_stopped(check_interval.min(remaining), &should_stop) {
                info!("Network wait interrupted");
                return false;
            }
        }

        error!(timeout_secs = timeout.as_secs(), "Network connection timeout exceeded");
        false
    }
}

/// Sleeps for `duration` in short slices. Returns false if stopped early.
fn sleep_unless_stopped(duration: Duration, should_stop: &impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if should_stop() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Probe that succeeds only on the listed (1-based) call numbers.
    struct ScriptedProbe {
        calls: Arc<AtomicUsize>,
        succeed_on: Vec<usize>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedProbe {
        fn new(succeed_on: Vec<usize>) -> (Self, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    calls: Arc::clone(&calls),
                    succeed_on,
                    seen: Arc::clone(&seen),
                },
                calls,
                seen,
            )
        }
    }

    impl ReachabilityProbe for ScriptedProbe {
        fn probe(&self, endpoint: &str) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(endpoint.to_string());
            if self.succeed_on.contains(&call) {
                Ok(())
            } else {
                Err(TrackerError::InvalidConfig("unreachable".to_string()))
            }
        }
    }

    #[test]
    fn succeeds_on_first_reachable_endpoint() {
        let (probe, calls, seen) = ScriptedProbe::new(vec![3]);
        let gate = ConnectivityGate::with_probe(&[], Box::new(probe));

        assert!(gate.wait_for_network(Duration::from_secs(10), Duration::from_millis(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*seen.lock().unwrap(), DEFAULT_ENDPOINTS.to_vec());
    }

    #[test]
    fn retries_after_interval_until_reachable() {
        let endpoints = vec!["http://a".to_string()];
        let (probe, calls, _) = ScriptedProbe::new(vec![4]);
        let gate = ConnectivityGate::with_probe(&endpoints, Box::new(probe));

        assert!(gate.wait_for_network(Duration::from_secs(10), Duration::from_millis(5)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn gives_up_after_timeout() {
        let endpoints = vec!["http://a".to_string()];
        let (probe, calls, _) = ScriptedProbe::new(vec![]);
        let gate = ConnectivityGate::with_probe(&endpoints, Box::new(probe));

        let started = Instant::now();
        assert!(!gate.wait_for_network(Duration::from_millis(60), Duration::from_millis(20)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn zero_timeout_never_probes() {
        let (probe, calls, _) = ScriptedProbe::new(vec![1]);
        let gate = ConnectivityGate::with_probe(&[], Box::new(probe));

        assert!(!gate.wait_for_network(Duration::ZERO, Duration::from_millis(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_request_interrupts_the_wait() {
        let (probe, calls, _) = ScriptedProbe::new(vec![]);
        let gate = ConnectivityGate::with_probe(&[], Box::new(probe));

        let started = Instant::now();
        let stopped = gate.wait_for_network_until(
            Duration::from_secs(30),
            Duration::from_secs(10),
            || true,
        );

        assert!(!stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn http_probe_accepts_any_response() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
        });

        let probe = HttpProbe::new().unwrap();
        assert!(probe.probe(&endpoint).is_ok());
        server.join().unwrap();
    }
}
