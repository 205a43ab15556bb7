//! Per-game fused state cache owner (C4 Aggregator, spec §4.3).
//!
//! The Aggregator is the sole writer of every [`GameState`] it owns: it
//! fans exchange orderbook events and sports-data polls into the fused
//! view and broadcasts what changed. Each loaded game gets its own worker
//! task so a slow or stuck sports-data poll for one game never delays
//! another game's orderbook updates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::exchange::{ExchangeEvent, ExchangeStream};
use crate::gamestate::GameState;
use crate::model::{Game, GameId, Phase};
use crate::sportsfeed::SportsFeedClient;

#[derive(Debug, Clone)]
pub enum AggregatorEvent {
    OrderbookUpdate { game_id: GameId, ticker: String },
    NbaUpdate { game_id: GameId },
    OddsUpdate { game_id: GameId },
    StateChange { game_id: GameId, phase: Phase },
}

struct LoadedGame {
    state_handle: JoinHandle<()>,
    orderbook_handles: Vec<JoinHandle<()>>,
}

pub struct Aggregator {
    states: Arc<RwLock<HashMap<GameId, GameState>>>,
    exchange: Arc<ExchangeStream>,
    sportsfeed: Arc<SportsFeedClient>,
    events: broadcast::Sender<AggregatorEvent>,
    nba_poll_interval: Duration,
    odds_poll_interval: Duration,
    loaded: Arc<tokio::sync::Mutex<HashMap<GameId, LoadedGame>>>,
}

impl Aggregator {
    pub fn new(
        exchange: Arc<ExchangeStream>,
        sportsfeed: Arc<SportsFeedClient>,
        nba_poll_interval: Duration,
        odds_poll_interval: Duration,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            states: Arc::new(RwLock::new(HashMap::new())),
            exchange,
            sportsfeed,
            events,
            nba_poll_interval,
            odds_poll_interval,
            loaded: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
        })
    }

    pub fn events(&self) -> broadcast::Receiver<AggregatorEvent> {
        self.events.subscribe()
    }

    pub fn get_state(&self, game_id: GameId) -> Option<GameState> {
        self.states.read().get(&game_id).cloned()
    }

    pub fn list_states(&self) -> Vec<GameState> {
        self.states.read().values().cloned().collect()
    }

    /// Begin tracking a game: inserts a fresh [`GameState`], subscribes
    /// the exchange stream to its market tickers, and spawns the poll
    /// worker and per-market orderbook forwarders.
    pub async fn load(self: &Arc<Self>, game: Game, market_tickers: Vec<String>) {
        let game_id = game.id;
        {
            let mut states = self.states.write();
            states.insert(game_id, GameState::new(&game));
        }

        self.exchange.subscribe(market_tickers.clone()).await;

        let mut orderbook_handles = Vec::with_capacity(market_tickers.len());
        for ticker in &market_tickers {
            if let Some(rx) = self.exchange.events(ticker) {
                let this = self.clone();
                let ticker = ticker.clone();
                orderbook_handles.push(tokio::spawn(async move {
                    this.forward_orderbook_events(game_id, ticker, rx).await;
                }));
            }
        }

        let this = self.clone();
        let nba_game_id = game.nba_game_id.clone();
        let state_handle = tokio::spawn(async move {
            this.poll_game(game_id, nba_game_id).await;
        });

        self.loaded.lock().await.insert(game_id, LoadedGame { state_handle, orderbook_handles });
        info!(?game_id, "aggregator loaded game");
    }

    /// Stop tracking a game: aborts its worker tasks, unsubscribes the
    /// exchange stream, and drops its cached state.
    pub async fn unload(&self, game_id: GameId, market_tickers: Vec<String>) {
        if let Some(loaded) = self.loaded.lock().await.remove(&game_id) {
            loaded.state_handle.abort();
            for h in loaded.orderbook_handles {
                h.abort();
            }
        }
        self.exchange.unsubscribe(market_tickers).await;
        self.states.write().remove(&game_id);
        info!(?game_id, "aggregator unloaded game");
    }

    pub fn set_phase(&self, game_id: GameId, phase: Phase) {
        let mut states = self.states.write();
        if let Some(state) = states.get_mut(&game_id) {
            state.set_phase(phase);
            let _ = self.events.send(AggregatorEvent::StateChange { game_id, phase });
        }
    }

    async fn forward_orderbook_events(
        self: Arc<Self>,
        game_id: GameId,
        ticker: String,
        mut rx: broadcast::Receiver<ExchangeEvent>,
    ) {
        loop {
            match rx.recv().await {
                Ok(ExchangeEvent::OrderbookUpdate { ticker: t, state }) => {
                    let affected = {
                        let mut states = self.states.write();
                        states.get_mut(&game_id).map(|gs| gs.apply_orderbook(&t, state))
                    };
                    if affected.is_some() {
                        let _ = self.events.send(AggregatorEvent::OrderbookUpdate {
                            game_id,
                            ticker: t,
                        });
                    }
                }
                Ok(ExchangeEvent::Disconnected) | Ok(ExchangeEvent::Reconnected) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(?game_id, ticker, skipped, "orderbook event channel lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Drift-compensated polling for NBA box scores and consensus odds:
    /// `interval` ticks on a fixed wall-clock cadence rather than
    /// cadence-plus-work-time, so a slow HTTP response doesn't push
    /// subsequent polls later and later (spec §4.2 "fixed cadence").
    ///
    /// Both pollers run only while the game's phase is `Scheduled` or
    /// `Live`; once a poll observes `Finished` it performs one last
    /// refresh of its own feed and exits (spec §4.4 "pollers self-exit
    /// after a final refresh").
    async fn poll_game(self: Arc<Self>, game_id: GameId, nba_game_id: Option<String>) {
        let Some(nba_game_id) = nba_game_id else {
            return;
        };
        let mut nba_ticker = tokio::time::interval(self.nba_poll_interval);
        let mut odds_ticker = tokio::time::interval(self.odds_poll_interval);
        nba_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        odds_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut nba_done = false;
        let mut odds_done = false;

        loop {
            if nba_done && odds_done {
                return;
            }
            tokio::select! {
                _ = nba_ticker.tick(), if !nba_done => {
                    match self.sportsfeed.live_box_score(&nba_game_id).await {
                        Ok(live) => {
                            let mut states = self.states.write();
                            if let Some(gs) = states.get_mut(&game_id) {
                                gs.apply_nba(live);
                                nba_done = gs.phase == Phase::Finished;
                                drop(states);
                                let _ = self.events.send(AggregatorEvent::NbaUpdate { game_id });
                            } else {
                                nba_done = true;
                            }
                        }
                        Err(e) => warn!(?game_id, error = %e, "nba poll failed"),
                    }
                }
                _ = odds_ticker.tick(), if !odds_done => {
                    match self.sportsfeed.odds(&nba_game_id).await {
                        Ok(quotes) => {
                            let mut states = self.states.write();
                            if let Some(gs) = states.get_mut(&game_id) {
                                for q in quotes {
                                    gs.apply_odds(q);
                                }
                                odds_done = gs.phase == Phase::Finished;
                                drop(states);
                                let _ = self.events.send(AggregatorEvent::OddsUpdate { game_id });
                            } else {
                                odds_done = true;
                            }
                        }
                        Err(e) => warn!(?game_id, error = %e, "odds poll failed"),
                    }
                }
            }
        }
    }
}
