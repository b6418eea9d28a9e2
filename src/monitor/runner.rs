use crate::alerts::{AlertSink, WebhookSink, publish_snapshot};
use crate::detection::compare_and_report;
use crate::monitor::error::MonitorResult;
use crate::monitor::fetcher::{AccountSource, BalanceFetcher, RpcAccountSource};
use crate::registry::AccountRegistry;
use crate::store;
use crate::types::{MonitorConfig, Snapshot};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

pub const STARTUP_MESSAGE: &str = "Starting account monitoring with the following known balances:";
pub const FETCH_FAILED_MESSAGE: &str = "Unable to retrieve latest balances from RPC node";

/// State carried from one poll cycle to the next
#[derive(Debug, Clone)]
pub struct MonitorState {
    /// Balances from the last successful fetch
    pub previous: Snapshot,
    /// When the last liveness announcement was made
    pub last_liveness: Instant,
}

/// Polls balances on a fixed interval and alerts on decreases
pub struct BalanceMonitor<A, S> {
    config: MonitorConfig,
    registry: AccountRegistry,
    fetcher: BalanceFetcher<A>,
    sink: Option<S>,
}

impl BalanceMonitor<RpcAccountSource, WebhookSink> {
    /// Load the registry and wire up the RPC source and webhook from config
    pub fn from_config(config: MonitorConfig) -> MonitorResult<Self> {
        let registry = AccountRegistry::load(&config.input_file)?;
        if registry.is_empty() {
            warn!("No accounts listed in {:?}, nothing to monitor", config.input_file);
        }
        let source = RpcAccountSource::new(config.rpc_url.clone());
        info!("Using RPC endpoint {}", source.url());

        let sink = match config.webhook_url.as_deref() {
            Some(url) => Some(WebhookSink::new(url)?),
            None => {
                warn!("No webhook configured, alerts will only be logged");
                None
            }
        };

        Ok(Self::new(config, registry, BalanceFetcher::new(source), sink))
    }
}

impl<A: AccountSource, S: AlertSink> BalanceMonitor<A, S> {
    pub fn new(
        config: MonitorConfig,
        registry: AccountRegistry,
        fetcher: BalanceFetcher<A>,
        sink: Option<S>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            sink,
        }
    }

    /// Load the baseline snapshot and announce it. Failing to deliver the
    /// announcement is an error so a broken webhook is caught at startup.
    pub async fn start(&self) -> MonitorResult<MonitorState> {
        let previous = if store::snapshot_exists(&self.config.output_file) {
            store::read_snapshot(&self.config.output_file)?
        } else {
            info!(
                "No prior balances at {:?}, starting empty",
                self.config.output_file
            );
            Snapshot::new()
        };

        if let Some(sink) = &self.sink {
            sink.send(STARTUP_MESSAGE).await?;
            publish_snapshot(sink, &previous).await?;
        }

        Ok(MonitorState {
            previous,
            last_liveness: Instant::now(),
        })
    }

    /// Run forever: startup, then one cycle per balance check interval
    pub async fn run(&self) -> MonitorResult<()> {
        let mut state = self.start().await?;
        let interval = Duration::from_secs(self.config.balance_check_interval_secs);

        info!(
            "Monitoring {} accounts every {:?}",
            self.registry.len(),
            interval
        );

        loop {
            state = self.run_cycle(state).await;
            sleep(interval).await;
        }
    }

    /// One poll: liveness check, fetch, compare, persist
    pub async fn run_cycle(&self, mut state: MonitorState) -> MonitorState {
        if self.liveness_due(&state, Instant::now()) {
            let message = self.liveness_message();
            info!("{}", message);
            self.alert(&message).await;
            state.last_liveness = Instant::now();
        }

        let Some(latest) = self.fetch_balances().await else {
            warn!("{}", FETCH_FAILED_MESSAGE);
            self.alert(FETCH_FAILED_MESSAGE).await;
            return state;
        };

        compare_and_report(
            &state.previous,
            &latest,
            &self.registry.metadata,
            self.sink.as_ref(),
        )
        .await;

        if let Err(e) = store::write_snapshot(&latest, &self.config.output_file) {
            error!(
                "Failed to write balances to {:?}: {}",
                self.config.output_file, e
            );
            self.alert(&e.to_string()).await;
        }

        state.previous = latest;
        state
    }

    fn liveness_due(&self, state: &MonitorState, now: Instant) -> bool {
        now.duration_since(state.last_liveness)
            >= Duration::from_secs(self.config.liveness_check_interval_secs)
    }

    fn liveness_message(&self) -> String {
        let since_update = match store::last_modified_age(&self.config.output_file) {
            Some(age) => age.as_secs().to_string(),
            None => "unknown".to_string(),
        };

        format!(
            "Liveness Check interval: {} seconds\n\
             Balance check interval: {} seconds\n\
             Time since last balance update: {} seconds",
            self.config.liveness_check_interval_secs,
            self.config.balance_check_interval_secs,
            since_update
        )
    }

    /// Fetch a snapshot, reporting the underlying error on failure
    async fn fetch_balances(&self) -> Option<Snapshot> {
        match self.fetcher.fetch(&self.registry.addresses).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!("Failed to fetch balances: {}", e);
                self.alert(&e.to_string()).await;
                None
            }
        }
    }

    /// Best-effort delivery; failures are logged
    async fn alert(&self, message: &str) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.send(message).await {
                error!("Failed to deliver alert: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::testing::RecordingSink;
    use crate::monitor::error::MonitorError;
    use crate::types::{AccountInfo, AccountMetadata, Address};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued responses, one per RPC call
    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<MonitorResult<Vec<Option<u64>>>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<MonitorResult<Vec<Option<u64>>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    impl AccountSource for ScriptedSource {
        async fn get_lamports(&self, _addresses: &[Address]) -> MonitorResult<Vec<Option<u64>>> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(MonitorError::InvalidResponse("no response".to_string())))
        }
    }

    fn registry(addresses: &[&str]) -> AccountRegistry {
        let mut metadata = AccountMetadata::new();
        for address in addresses {
            metadata.insert(address.to_string(), AccountInfo::default());
        }
        AccountRegistry {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            metadata,
        }
    }

    fn config(dir: &tempfile::TempDir, liveness_secs: u64) -> MonitorConfig {
        MonitorConfig {
            output_file: dir.path().join("latest_balances.csv"),
            liveness_check_interval_secs: liveness_secs,
            ..MonitorConfig::default()
        }
    }

    fn monitor(
        config: MonitorConfig,
        addresses: &[&str],
        responses: Vec<MonitorResult<Vec<Option<u64>>>>,
    ) -> BalanceMonitor<ScriptedSource, RecordingSink> {
        BalanceMonitor::new(
            config,
            registry(addresses),
            BalanceFetcher::new(ScriptedSource::new(responses)),
            Some(RecordingSink::default()),
        )
    }

    fn sent(monitor: &BalanceMonitor<ScriptedSource, RecordingSink>) -> Vec<String> {
        monitor.sink.as_ref().unwrap().messages()
    }

    fn snapshot(entries: &[(&str, f64)]) -> Snapshot {
        entries.iter().map(|(a, b)| (a.to_string(), *b)).collect()
    }

    #[tokio::test]
    async fn test_startup_announces_stored_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 3600);
        store::write_snapshot(&snapshot(&[("A", 10.0)]), &config.output_file).unwrap();

        let monitor = monitor(config, &["A"], vec![]);
        let state = monitor.start().await.unwrap();

        assert_eq!(state.previous, snapshot(&[("A", 10.0)]));
        assert_eq!(
            sent(&monitor),
            vec![STARTUP_MESSAGE.to_string(), "\n`A: 10.00`\n".to_string()]
        );
    }

    #[tokio::test]
    async fn test_startup_without_prior_file() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(config(&dir, 3600), &["A"], vec![]);

        let state = monitor.start().await.unwrap();

        assert!(state.previous.is_empty());
        assert_eq!(sent(&monitor)[1], "\n");
    }

    #[tokio::test]
    async fn test_startup_fails_when_webhook_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = BalanceMonitor::new(
            config(&dir, 3600),
            registry(&["A"]),
            BalanceFetcher::new(ScriptedSource::default()),
            Some(RecordingSink::failing()),
        );

        assert!(monitor.start().await.is_err());
    }

    #[tokio::test]
    async fn test_successful_cycle_persists_and_alerts_decrease() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 3600);
        let output = config.output_file.clone();

        let monitor = monitor(
            config,
            &["A", "B", "C"],
            vec![Ok(vec![
                Some(8_000_000_000),
                Some(5_000_000_000),
                Some(1_000_000_000),
            ])],
        );
        let state = MonitorState {
            previous: snapshot(&[("A", 10.0), ("B", 5.0)]),
            last_liveness: Instant::now(),
        };

        let state = monitor.run_cycle(state).await;

        let expected = snapshot(&[("A", 8.0), ("B", 5.0), ("C", 1.0)]);
        assert_eq!(state.previous, expected);
        assert_eq!(store::read_snapshot(&output).unwrap(), expected);
        assert_eq!(
            sent(&monitor),
            vec![
                "Balance of A has decreased from 10 to 8 SOL".to_string(),
                "```address: A```".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 3600);
        let output = config.output_file.clone();
        let previous = snapshot(&[("A", 10.0)]);
        store::write_snapshot(&previous, &output).unwrap();
        let before = std::fs::read_to_string(&output).unwrap();

        let monitor = monitor(
            config,
            &["A"],
            vec![Err(MonitorError::InvalidResponse("operation timed out".to_string()))],
        );
        let state = MonitorState {
            previous: previous.clone(),
            last_liveness: Instant::now(),
        };

        let state = monitor.run_cycle(state).await;

        assert_eq!(state.previous, previous);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), before);

        let messages = sent(&monitor);
        let failures = messages
            .iter()
            .filter(|m| m.as_str() == FETCH_FAILED_MESSAGE)
            .count();
        assert_eq!(failures, 1);
        assert_eq!(messages.last().unwrap(), FETCH_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_liveness_and_changes_in_same_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(
            config(&dir, 0),
            &["A"],
            vec![Ok(vec![Some(1_000_000_000)])],
        );
        let started = Instant::now();
        let state = MonitorState {
            previous: snapshot(&[("A", 3.0)]),
            last_liveness: started,
        };

        let state = monitor.run_cycle(state).await;

        let messages = sent(&monitor);
        let liveness: Vec<&String> = messages
            .iter()
            .filter(|m| m.starts_with("Liveness Check interval"))
            .collect();
        assert_eq!(liveness.len(), 1);
        assert!(liveness[0].ends_with("Time since last balance update: unknown seconds"));
        assert!(messages.contains(&"Balance of A has decreased from 3 to 1 SOL".to_string()));
        assert!(state.last_liveness >= started);
    }

    #[tokio::test]
    async fn test_liveness_reported_even_when_fetch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(config(&dir, 0), &["A"], vec![]);
        let state = MonitorState {
            previous: Snapshot::new(),
            last_liveness: Instant::now(),
        };

        monitor.run_cycle(state).await;

        let messages = sent(&monitor);
        assert!(messages[0].starts_with("Liveness Check interval: 0 seconds"));
        assert_eq!(messages.last().unwrap(), FETCH_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_liveness_not_due() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = monitor(config(&dir, 3600), &["A"], vec![Ok(vec![Some(0)])]);
        let last_liveness = Instant::now();
        let state = MonitorState {
            previous: Snapshot::new(),
            last_liveness,
        };

        let state = monitor.run_cycle(state).await;

        assert_eq!(state.last_liveness, last_liveness);
        assert!(sent(&monitor).is_empty());
    }

    #[tokio::test]
    async fn test_no_webhook_configured() {
        let dir = tempfile::tempdir().unwrap();
        let monitor: BalanceMonitor<ScriptedSource, RecordingSink> = BalanceMonitor::new(
            config(&dir, 0),
            registry(&["A"]),
            BalanceFetcher::new(ScriptedSource::default()),
            None,
        );

        let state = monitor.start().await.unwrap();
        let state = monitor.run_cycle(state).await;

        assert!(state.previous.is_empty());
    }
}
