//! Volume-weighted ticker aggregation.
//!
//! One aggregate per symbol. Every incoming ticker is blended into its
//! symbol's entry weighted by 24h volume; on each interval tick all
//! current aggregates are forwarded to the output sink. The interval can
//! be replaced at runtime through the command channel.
//!
//! The running volume is halved after each combine, so older samples
//! decay geometrically. Downstream consumers depend on these exact
//! numbers; do not switch to a cumulative weighted mean.

use crate::error::{AggregatorError, AggregatorResult};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tickerflow_core::{AggregatedTicker, Interval, SimpleTicker};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle for runtime aggregator commands.
#[derive(Clone)]
pub struct AggregatorHandle {
    interval_tx: mpsc::Sender<Interval>,
}

impl AggregatorHandle {
    /// Replace the emit interval. Takes effect at the loop's next turn;
    /// the old timer is dropped.
    pub async fn set_interval(&self, interval: Interval) -> AggregatorResult<()> {
        self.interval_tx
            .send(interval)
            .await
            .map_err(|_| AggregatorError::CommandChannelClosed)
    }
}

/// Volume-weighted aggregator.
pub struct Aggregator {
    tickers: HashMap<String, AggregatedTicker>,
    inbox: mpsc::Receiver<SimpleTicker>,
    sink_tx: mpsc::Sender<AggregatedTicker>,
    interval_rx: mpsc::Receiver<Interval>,
    interval: Interval,
    shutdown: CancellationToken,
}

impl Aggregator {
    /// Create an aggregator reading tickers from `inbox` and emitting
    /// aggregates on `sink_tx` every [`Interval::default`].
    pub fn new(
        inbox: mpsc::Receiver<SimpleTicker>,
        sink_tx: mpsc::Sender<AggregatedTicker>,
        shutdown: CancellationToken,
    ) -> (Self, AggregatorHandle) {
        let (interval_tx, interval_rx) = mpsc::channel(8);

        let aggregator = Self {
            tickers: HashMap::new(),
            inbox,
            sink_tx,
            interval_rx,
            interval: Interval::default(),
            shutdown,
        };

        (aggregator, AggregatorHandle { interval_tx })
    }

    /// Run until the inbox closes or shutdown is requested.
    pub async fn run(mut self) {
        let mut timer = new_timer(self.interval);
        let mut commands_open = true;
        info!(interval = %self.interval, "Aggregator started");

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Aggregator stopped");
                    break;
                }

                ticker = self.inbox.recv() => match ticker {
                    Some(t) => {
                        debug!(symbol = %t.symbol, exchange = %t.exchange, "Ticker received");
                        self.blend(t);
                    }
                    None => {
                        info!("Ticker inbox closed, aggregator stopping");
                        break;
                    }
                },

                _ = timer.tick() => {
                    if self.flush().await.is_err() {
                        warn!("Output sink closed, aggregator stopping");
                        break;
                    }
                }

                cmd = self.interval_rx.recv(), if commands_open => {
                    match cmd {
                        Some(interval) => {
                            info!(%interval, "Emit interval replaced");
                            self.interval = interval;
                            timer = new_timer(interval);
                        }
                        None => commands_open = false,
                    }
                }
            }
        }
    }

    /// Blend one ticker into its symbol's aggregate.
    ///
    /// The first sample for a symbol is copied verbatim. Later samples
    /// are volume-weighted with `v` the running volume and `u` the
    /// sample's; a zero combined volume leaves the entry untouched.
    fn blend(&mut self, t: SimpleTicker) {
        match self.tickers.entry(t.symbol.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(AggregatedTicker::from_first(&t));
            }
            Entry::Occupied(mut slot) => {
                let a = slot.get_mut();
                let v = a.volume;
                let u = t.volume;

                if v + u == 0.0 {
                    return;
                }

                a.price = (a.price * v + t.price * u) / (v + u);
                a.bid = (a.bid * v + t.bid * u) / (v + u);
                a.ask = (a.ask * v + t.ask * u) / (v + u);
                a.volume = (v + u) / 2.0;
            }
        }
    }

    /// Forward every current aggregate to the sink.
    async fn flush(&self) -> Result<(), ()> {
        for aggregate in self.tickers.values() {
            debug!(symbol = %aggregate.symbol, "Aggregate emitted");
            self.sink_tx
                .send(aggregate.clone())
                .await
                .map_err(|_| ())?;
        }

        Ok(())
    }

    #[cfg(test)]
    fn aggregate(&self, symbol: &str) -> Option<&AggregatedTicker> {
        self.tickers.get(symbol)
    }
}

fn new_timer(interval: Interval) -> tokio::time::Interval {
    let period = interval.duration();
    tokio::time::interval_at(Instant::now() + period, period)
}
