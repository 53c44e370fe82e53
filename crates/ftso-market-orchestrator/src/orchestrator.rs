//! Owns the lifecycle of every exchange adapter and maps configured feeds
//! to (exchange, symbol) subscriptions (spec §4.7).

use crate::adapter::ExchangeAdapter;
use crate::error::OrchestratorError;
use crate::mapping::{ExchangeMapping, FeedConfigEntry};
use ftso_market_core::FeedId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

const CONNECT_BATCH_SIZE: usize = 5;
const INTER_BATCH_PAUSE: Duration = Duration::from_millis(50);
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(10);

/// Per-exchange mutable state, serialized behind the orchestrator's mutex
/// per spec §5 ("the orchestrator's `exchangeStates` map... mutations...
/// must be serialized per-exchange").
struct ExchangeState {
    connected: bool,
    subscribed_symbols: HashSet<String>,
    last_connection_attempt: Option<Instant>,
}

impl ExchangeState {
    fn new() -> Self {
        Self {
            connected: false,
            subscribed_symbols: HashSet::new(),
            last_connection_attempt: None,
        }
    }
}

/// Owns every registered [`ExchangeAdapter`] and drives the four-phase
/// initialization, on-demand per-feed subscription, and reconnection with
/// cooldown described in spec §4.7.
pub struct WebSocketOrchestrator {
    adapters: HashMap<String, Arc<dyn ExchangeAdapter>>,
    /// The shared multi-exchange CCXT adapter, used for any exchange name
    /// with no custom adapter registered (spec §4.7 phase 2: "custom
    /// adapter if registered; otherwise the multi-exchange CCXT adapter").
    default_adapter: Option<Arc<dyn ExchangeAdapter>>,
    states: Mutex<HashMap<String, ExchangeState>>,
    mapping: Mutex<ExchangeMapping>,
    connect_semaphore: Arc<Semaphore>,
}

impl WebSocketOrchestrator {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            default_adapter: None,
            states: Mutex::new(HashMap::new()),
            mapping: Mutex::new(ExchangeMapping::build(&[])),
            connect_semaphore: Arc::new(Semaphore::new(CONNECT_BATCH_SIZE)),
        }
    }

    /// Registers a custom adapter under its exchange name, taking priority
    /// over the default adapter for that name.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ExchangeAdapter>) {
        let name = adapter.exchange_name().to_string();
        self.adapters.insert(name, adapter);
    }

    /// Configures the shared multi-exchange CCXT adapter. Any exchange name
    /// with no custom adapter registered resolves to this one instead.
    pub fn set_default_adapter(&mut self, adapter: Arc<dyn ExchangeAdapter>) {
        self.default_adapter = Some(adapter);
    }

    /// Resolves the adapter that should serve `exchange`: the custom
    /// adapter registered under that exact name if there is one, otherwise
    /// the default CCXT adapter (spec §4.7 phase 2).
    fn resolve_adapter(&self, exchange: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters
            .get(exchange)
            .cloned()
            .or_else(|| self.default_adapter.clone())
    }

    /// Phase 1-4 initialization: build the feed mapping, resolve required
    /// symbols per exchange, connect adapters with bounded concurrency, then
    /// subscribe each connected adapter to its required symbols.
    pub async fn initialize(&self, feed_config: Vec<FeedConfigEntry>) {
        let mapping = ExchangeMapping::build(&feed_config);
        let exchanges = mapping.exchanges();
        *self.mapping.lock().await = mapping;

        {
            let mut states = self.states.lock().await;
            for exchange in &exchanges {
                states.entry(exchange.clone()).or_insert_with(ExchangeState::new);
            }
        }

        for batch in exchanges.chunks(CONNECT_BATCH_SIZE) {
            let mut handles = Vec::with_capacity(batch.len());
            for exchange in batch {
                let Some(adapter) = self.resolve_adapter(exchange) else {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(exchange, "no adapter registered, skipping connect");
                    continue;
                };
                let semaphore = Arc::clone(&self.connect_semaphore);
                let exchange = exchange.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = semaphore.acquire().await.expect("semaphore not closed");
                    let result = adapter.connect().await;
                    (exchange, result)
                }));
            }

            for handle in handles {
                if let Ok((exchange, result)) = handle.await {
                    let mut states = self.states.lock().await;
                    let state = states.entry(exchange.clone()).or_insert_with(ExchangeState::new);
                    state.last_connection_attempt = Some(Instant::now());
                    match result {
                        Ok(()) => {
                            // The adapter reports its own state; we read it
                            // back rather than assume success from a clean
                            // `connect()` return.
                            if let Some(adapter) = self.resolve_adapter(&exchange) {
                                state.connected = adapter.is_connected();
                            }
                        }
                        Err(_err) => {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(exchange, error = %_err, "adapter connect failed");
                            state.connected = false;
                        }
                    }
                }
            }

            tokio::time::sleep(INTER_BATCH_PAUSE).await;
        }

        self.subscribe_all_connected().await;
    }

    /// Subscribes every connected exchange to its required symbols. Several
    /// exchange names can resolve to the same underlying adapter (the
    /// shared CCXT fallback serves many exchanges at once), so candidates
    /// are grouped by adapter identity first and each adapter gets exactly
    /// one combined `subscribe` call covering every symbol any of its
    /// exchanges still needs, rather than one call per exchange name.
    async fn subscribe_all_connected(&self) {
        let mapping = self.mapping.lock().await;
        let mut states = self.states.lock().await;

        let mut groups: HashMap<usize, (Arc<dyn ExchangeAdapter>, Vec<(String, Vec<String>)>)> = HashMap::new();

        for (exchange, state) in states.iter() {
            if !state.connected {
                continue;
            }
            let Some(adapter) = self.resolve_adapter(exchange) else {
                continue;
            };
            let required = mapping.required_symbols_for(exchange);
            let to_subscribe: Vec<String> = required
                .into_iter()
                .filter(|s| !state.subscribed_symbols.contains(s))
                .collect();
            if to_subscribe.is_empty() {
                continue;
            }
            let identity = Arc::as_ptr(&adapter) as *const () as usize;
            groups
                .entry(identity)
                .or_insert_with(|| (adapter, Vec::new()))
                .1
                .push((exchange.clone(), to_subscribe));
        }

        for (_, (adapter, per_exchange)) in groups {
            let combined: Vec<String> = per_exchange
                .iter()
                .flat_map(|(_, symbols)| symbols.iter().cloned())
                .collect();
            if adapter.subscribe(&combined).await.is_ok() {
                for (exchange, symbols) in per_exchange {
                    if let Some(state) = states.get_mut(&exchange) {
                        state.subscribed_symbols.extend(symbols);
                    }
                }
            }
        }
    }

    /// Subscribes a single feed on demand: for each of its `{exchange,
    /// symbol}` pairs, adds the symbol to a per-adapter batch if the
    /// adapter is connected and not already subscribed, then issues one
    /// `subscribe` call per adapter.
    pub async fn subscribe_to_feed(&self, feed: &FeedId) -> Result<(), OrchestratorError> {
        let sources = self.mapping.lock().await.sources_for_feed(feed);
        let mut states = self.states.lock().await;

        let mut batches: HashMap<String, Vec<String>> = HashMap::new();
        for source in sources {
            let Some(state) = states.get(&source.exchange) else {
                continue;
            };
            if !state.connected || state.subscribed_symbols.contains(&source.symbol) {
                continue;
            }
            batches.entry(source.exchange).or_default().push(source.symbol);
        }

        for (exchange, symbols) in batches {
            let adapter = self
                .resolve_adapter(&exchange)
                .ok_or_else(|| OrchestratorError::UnknownExchange(exchange.clone()))?;
            adapter.subscribe(&symbols).await?;
            if let Some(state) = states.get_mut(&exchange) {
                state.subscribed_symbols.extend(symbols);
            }
        }

        Ok(())
    }

    /// Reconnects one exchange, no-op if already connected, debounced by a
    /// 10s cooldown against `lastConnectionAttempt`.
    pub async fn reconnect_exchange(&self, exchange: &str) -> Result<(), OrchestratorError> {
        let adapter = self
            .resolve_adapter(exchange)
            .ok_or_else(|| OrchestratorError::UnknownExchange(exchange.to_string()))?;

        if adapter.is_connected() {
            #[cfg(feature = "tracing")]
            tracing::debug!(exchange, "reconnect requested but already connected");
            return Ok(());
        }

        {
            let states = self.states.lock().await;
            if let Some(state) = states.get(exchange) {
                if let Some(last) = state.last_connection_attempt {
                    if last.elapsed() < RECONNECT_COOLDOWN {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(exchange, "reconnect cooldown active, skipping");
                        return Ok(());
                    }
                }
            }
        }

        {
            let mut states = self.states.lock().await;
            let state = states.entry(exchange.to_string()).or_insert_with(ExchangeState::new);
            state.last_connection_attempt = Some(Instant::now());
        }

        adapter.connect().await?;
        let connected = adapter.is_connected();

        let required = self.mapping.lock().await.required_symbols_for(exchange);
        {
            let mut states = self.states.lock().await;
            let state = states.entry(exchange.to_string()).or_insert_with(ExchangeState::new);
            state.connected = connected;
            if connected {
                state.subscribed_symbols.clear();
            }
        }

        if connected && !required.is_empty() {
            adapter.subscribe(&required).await?;
            let mut states = self.states.lock().await;
            if let Some(state) = states.get_mut(exchange) {
                state.subscribed_symbols.extend(required);
            }
        }

        Ok(())
    }

    /// Returns the adapter that serves `exchange` (custom or default), if
    /// any, so a pull-mode caller (the aggregation facade's cache-miss
    /// path) can issue a REST fetch directly without reaching into
    /// orchestrator internals.
    pub fn adapter(&self, exchange: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.resolve_adapter(exchange)
    }

    /// The `{exchange, symbol}` pairs configured for one feed, as built by
    /// phase 1 of [`Self::initialize`].
    pub async fn sources_for_feed(&self, feed: &FeedId) -> Vec<crate::mapping::FeedSourceSpec> {
        self.mapping.lock().await.sources_for_feed(feed)
    }

    pub async fn is_exchange_connected(&self, exchange: &str) -> bool {
        self.states
            .lock()
            .await
            .get(exchange)
            .map(|s| s.connected)
            .unwrap_or(false)
    }

    pub async fn subscribed_symbols(&self, exchange: &str) -> HashSet<String> {
        self.states
            .lock()
            .await
            .get(exchange)
            .map(|s| s.subscribed_symbols.clone())
            .unwrap_or_default()
    }

    /// Disconnects every adapter the orchestrator reports connected and
    /// clears its maps.
    pub async fn cleanup(&self) {
        let exchanges: Vec<String> = {
            let states = self.states.lock().await;
            states
                .iter()
                .filter(|(_, s)| s.connected)
                .map(|(k, _)| k.clone())
                .collect()
        };

        let mut disconnected: HashSet<usize> = HashSet::new();
        for exchange in exchanges {
            if let Some(adapter) = self.resolve_adapter(&exchange) {
                let identity = Arc::as_ptr(&adapter) as *const () as usize;
                if disconnected.insert(identity) {
                    let _ = adapter.disconnect().await;
                }
            }
        }

        self.states.lock().await.clear();
        *self.mapping.lock().await = ExchangeMapping::build(&[]);
    }
}

impl Default for WebSocketOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterCapabilities, ConnectionChangeCallback, PriceUpdateCallback};
    use crate::error::AdapterError;
    use crate::mapping::FeedSourceSpec;
    use async_trait::async_trait;
    use ftso_market_core::FeedCategory;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    struct MockAdapter {
        name: String,
        connected: AtomicBool,
        subscribed: StdMutex<HashSet<String>>,
        /// Every argument list a `subscribe` call was made with, so tests
        /// can assert on how many distinct calls happened, not just the
        /// union of symbols they covered.
        subscribe_calls: StdMutex<Vec<Vec<String>>>,
    }

    impl MockAdapter {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                connected: AtomicBool::new(false),
                subscribed: StdMutex::new(HashSet::new()),
                subscribe_calls: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ExchangeAdapter for MockAdapter {
        fn exchange_name(&self) -> &str {
            &self.name
        }

        fn category(&self) -> FeedCategory {
            FeedCategory::Crypto
        }

        fn capabilities(&self) -> AdapterCapabilities {
            AdapterCapabilities {
                websocket: true,
                ..Default::default()
            }
        }

        async fn connect(&self) -> Result<(), AdapterError> {
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), AdapterError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn subscribe(&self, symbols: &[String]) -> Result<(), AdapterError> {
            self.subscribed.lock().unwrap().extend(symbols.iter().cloned());
            self.subscribe_calls.lock().unwrap().push(symbols.to_vec());
            Ok(())
        }

        async fn unsubscribe(&self, symbols: &[String]) -> Result<(), AdapterError> {
            let mut subscribed = self.subscribed.lock().unwrap();
            for s in symbols {
                subscribed.remove(s);
            }
            Ok(())
        }

        fn on_price_update(&self, _callback: PriceUpdateCallback) {}
        fn on_connection_change(&self, _callback: ConnectionChangeCallback) {}

        fn get_symbol_mapping(&self, feed_symbol: &str) -> String {
            feed_symbol.replace('/', "-")
        }
    }

    fn feeds() -> Vec<FeedConfigEntry> {
        vec![
            FeedConfigEntry {
                feed: FeedId::new(FeedCategory::Crypto, "BTC/USD"),
                sources: vec![FeedSourceSpec {
                    exchange: "binance".into(),
                    symbol: "BTC/USDT".into(),
                }],
            },
            FeedConfigEntry {
                feed: FeedId::new(FeedCategory::Crypto, "ETH/USD"),
                sources: vec![FeedSourceSpec {
                    exchange: "binance".into(),
                    symbol: "ETH/USDT".into(),
                }],
            },
        ]
    }

    #[tokio::test]
    async fn initialize_connects_and_subscribes_exactly_once() {
        let mut orchestrator = WebSocketOrchestrator::new();
        let binance = MockAdapter::new("binance");
        orchestrator.register_adapter(binance.clone());

        orchestrator.initialize(feeds()).await;

        assert!(orchestrator.is_exchange_connected("binance").await);
        let subscribed = orchestrator.subscribed_symbols("binance").await;
        assert_eq!(subscribed.len(), 2);
        assert!(subscribed.contains("BTC/USDT"));
        assert!(subscribed.contains("ETH/USDT"));
    }

    #[tokio::test]
    async fn subscribe_to_feed_is_idempotent() {
        let mut orchestrator = WebSocketOrchestrator::new();
        let binance = MockAdapter::new("binance");
        orchestrator.register_adapter(binance.clone());
        orchestrator.initialize(feeds()).await;

        let btc = FeedId::new(FeedCategory::Crypto, "BTC/USD");
        orchestrator.subscribe_to_feed(&btc).await.unwrap();
        orchestrator.subscribe_to_feed(&btc).await.unwrap();

        assert_eq!(binance.subscribed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reconnect_is_noop_when_already_connected() {
        let mut orchestrator = WebSocketOrchestrator::new();
        let binance = MockAdapter::new("binance");
        orchestrator.register_adapter(binance.clone());
        orchestrator.initialize(feeds()).await;

        orchestrator.reconnect_exchange("binance").await.unwrap();
        assert!(binance.is_connected());
    }

    #[tokio::test]
    async fn unregistered_exchange_connect_failure_does_not_abort_others() {
        let mut orchestrator = WebSocketOrchestrator::new();
        let binance = MockAdapter::new("binance");
        orchestrator.register_adapter(binance.clone());
        // "kraken" has no registered adapter; initialize must still connect binance.
        let mut with_kraken = feeds();
        with_kraken.push(FeedConfigEntry {
            feed: FeedId::new(FeedCategory::Crypto, "SOL/USD"),
            sources: vec![FeedSourceSpec {
                exchange: "kraken".into(),
                symbol: "SOL/USDT".into(),
            }],
        });

        orchestrator.initialize(with_kraken).await;
        assert!(orchestrator.is_exchange_connected("binance").await);
        assert!(!orchestrator.is_exchange_connected("kraken").await);
    }

    #[tokio::test]
    async fn cleanup_disconnects_and_clears_state() {
        let mut orchestrator = WebSocketOrchestrator::new();
        let binance = MockAdapter::new("binance");
        orchestrator.register_adapter(binance.clone());
        orchestrator.initialize(feeds()).await;

        orchestrator.cleanup().await;
        assert!(!binance.is_connected());
        assert!(!orchestrator.is_exchange_connected("binance").await);
    }

    #[tokio::test]
    async fn exchanges_with_no_custom_adapter_fall_back_to_the_default_and_share_one_subscribe_call() {
        let mut orchestrator = WebSocketOrchestrator::new();
        // "ccxt" is registered only as the default; neither "kraken" nor
        // "coinbase" has a custom adapter, so both must resolve to it.
        let ccxt = MockAdapter::new("ccxt");
        orchestrator.set_default_adapter(ccxt.clone());

        let entries = vec![
            FeedConfigEntry {
                feed: FeedId::new(FeedCategory::Crypto, "BTC/USD"),
                sources: vec![FeedSourceSpec {
                    exchange: "kraken".into(),
                    symbol: "BTC/USD".into(),
                }],
            },
            FeedConfigEntry {
                feed: FeedId::new(FeedCategory::Crypto, "ETH/USD"),
                sources: vec![FeedSourceSpec {
                    exchange: "coinbase".into(),
                    symbol: "ETH-USD".into(),
                }],
            },
        ];

        orchestrator.initialize(entries).await;

        assert!(orchestrator.is_exchange_connected("kraken").await);
        assert!(orchestrator.is_exchange_connected("coinbase").await);

        let calls = ccxt.subscribe_calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "expected one combined subscribe call, got {calls:?}");
        let combined = &calls[0];
        assert!(combined.contains(&"BTC/USD".to_string()));
        assert!(combined.contains(&"ETH-USD".to_string()));

        assert!(orchestrator.subscribed_symbols("kraken").await.contains("BTC/USD"));
        assert!(orchestrator.subscribed_symbols("coinbase").await.contains("ETH-USD"));
    }

    #[tokio::test]
    async fn custom_adapter_takes_priority_over_the_default_for_its_own_name() {
        let mut orchestrator = WebSocketOrchestrator::new();
        let binance = MockAdapter::new("binance");
        let ccxt = MockAdapter::new("ccxt-default");
        orchestrator.register_adapter(binance.clone());
        orchestrator.set_default_adapter(ccxt.clone());

        orchestrator.initialize(feeds()).await;

        assert_eq!(binance.subscribe_calls.lock().unwrap().len(), 1);
        assert!(ccxt.subscribe_calls.lock().unwrap().is_empty());
    }
}
