mod config;
mod upstream;

use std::{path::PathBuf, sync::Arc};

use alloy_primitives::U256;
use arb_cache::{CacheConfig, HierarchicalCache, RedisStore};
use arb_chain::{ConnectionSupervisor, EventFilters, SupervisorEvent};
use arb_coordinator::{breaker::CircuitBreaker, duplicate::DuplicateWindow, lease::LeaseElector, CoordinatorRouter, RedisLeaderLease};
use arb_correlation::CorrelationTracker;
use arb_detector::Detector;
use arb_pairs::{decoder::RawReserveLog, EventDecoder, PairRepository};
use arb_streams::{OpportunityPublisher, RedisStreamClient, StreamClient, StreamConsumer};
use arb_types::{config::WarmingStrategyKind, now_millis, Pair, PoolId, StreamPosition};
use arb_warmer::{strategy::WarmingStrategy, AdaptiveStrategy, PredictiveWarmer, TimeBasedStrategy, ThresholdStrategy, TopNStrategy, WarmerConfig};
use clap::Parser;
use config::{AppConfig, ChainEntry};
use tracing::{info, warn};

/// Conservative defaults for [`ConnectionSupervisor`] knobs not carried on
/// [`arb_types::config::ChainConfig`] (it describes trading parameters, not
/// transport tuning).
const BLOCK_GAP_TOLERANCE: u64 = 1;
const MAX_MESSAGE_BYTES: usize = 1 << 20;

#[derive(Parser)]
#[clap(about = "Multi-chain DEX arbitrage detection and routing node")]
struct Cli {
    /// Path to the JSON wiring configuration.
    #[clap(short, long, default_value = "config.json")]
    config: PathBuf,
    /// Identity used for this process's leader-lease bids; defaults to a
    /// per-process value so two instances never collide by accident.
    #[clap(long)]
    node_id: Option<String>,
    /// Directory for daily-rolling log files; stdout only when unset.
    #[clap(long)]
    log_dir: Option<PathBuf>
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let cli = Cli::parse();
    let _log_guard = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "arbiter-node.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(writer).finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Some(guard)
        }
        None => {
            let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).finish();
            tracing::subscriber::set_global_default(subscriber)?;
            None
        }
    };
    let config = AppConfig::load(&cli.config)?;
    let node_id = cli.node_id.unwrap_or_else(|| format!("arbiter-{}", std::process::id()));

    let stream_client: Arc<dyn StreamClient> = Arc::new(RedisStreamClient::connect(&config.redis_url).await?);
    let l2_store: Arc<dyn arb_cache::DistributedStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
    let cache_config = CacheConfig {
        l1_capacity: config.cache.l1_capacity,
        l3_enabled: config.cache.l3_enabled,
        l2_deadline_millis: config.cache.l2_deadline_millis
    };
    let cache = Arc::new(HierarchicalCache::new(cache_config, Some(l2_store), None));

    for entry in &config.chains {
        spawn_chain_pipeline(entry, cache.clone(), stream_client.clone(), &config).await?;
    }

    stream_client
        .create_group(&config.opportunities_stream, &config.coordinator_group, StreamPosition::New)
        .await?;

    let known_chains = config.chains.iter().map(|c| c.chain.chain_id).collect();
    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let lease = Arc::new(RedisLeaderLease::new(redis_client.get_connection_manager().await?, config.leader_lock_key.clone()));
    let elector = Arc::new(LeaseElector::new(lease, node_id.clone(), config.leader_lease));
    elector.start();

    let router = Arc::new(CoordinatorRouter::new(
        config.execution_stream.clone(),
        known_chains,
        elector,
        DuplicateWindow::new(config.stream.duplicate_window_millis),
        CircuitBreaker::new(config.breaker)
    ));
    router
        .bootstrap(stream_client.as_ref(), &config.opportunities_stream, &config.coordinator_group)
        .await?;

    let consumer = Arc::new(StreamConsumer::new(
        config.opportunities_stream.clone(),
        config.coordinator_group.clone(),
        node_id,
        config.stream.batch_size,
        config.stream.block_millis,
        config.stream.claim_age_millis,
        stream_client,
        router
    ));
    let handle = consumer.start();

    info!("arbiter-node wiring complete, coordinator running");
    handle.await?;
    Ok(())
}

fn build_strategy(warming: &arb_types::config::WarmingConfig) -> Arc<dyn WarmingStrategy> {
    match warming.strategy {
        WarmingStrategyKind::TopN => {
            Arc::new(TopNStrategy { top_n: warming.top_n, min_score: warming.min_correlation_score })
        }
        WarmingStrategyKind::Threshold => {
            Arc::new(ThresholdStrategy { min_score: warming.min_correlation_score, max_pairs: warming.max_pairs_per_warm })
        }
        WarmingStrategyKind::TimeBased => Arc::new(TimeBasedStrategy {
            corr_weight: warming.correlation_weight,
            recency_weight: warming.recency_weight,
            recency_window_millis: warming.recency_window_millis,
            top_n: warming.top_n
        }),
        WarmingStrategyKind::Adaptive => Arc::new(AdaptiveStrategy::new(
            warming.adaptive_min_pairs,
            warming.adaptive_max_pairs,
            warming.adaptive_target_hit_rate,
            warming.adaptive_adjustment_factor
        ))
    }
}

async fn spawn_chain_pipeline(
    entry: &ChainEntry,
    cache: Arc<HierarchicalCache>,
    stream_client: Arc<dyn StreamClient>,
    config: &AppConfig
) -> eyre::Result<()> {
    let chain_name: &'static str = Box::leak(entry.name.clone().into_boxed_str());
    let chain_id = entry.chain.chain_id;

    let repo = Arc::new(PairRepository::new());
    for pool in &entry.pools {
        repo.upsert_pair(Pair::new(
            chain_id,
            pool.address,
            pool.dex_id,
            pool.token0,
            pool.token1,
            pool.fee_bps,
            U256::ZERO,
            U256::ZERO,
            0,
            now_millis()
        ));
    }

    let decoder = EventDecoder::new(chain_name);
    let (detector, mut offpath_rx) =
        Detector::new(chain_name, chain_id, repo.clone(), entry.two_pair.clone().into(), entry.hot_pair_threshold_updates_per_sec);
    let detector = Arc::new(detector);

    let correlation = Arc::new(CorrelationTracker::new(config.correlation.into()));
    let strategy = build_strategy(&config.warming);
    let warmer_config = WarmerConfig {
        enabled: config.warming.enabled,
        max_pairs_per_warm: config.warming.max_pairs_per_warm,
        min_correlation_score: config.warming.min_correlation_score,
        timeout_millis: config.warming.timeout_millis
    };
    let warmer = Arc::new(PredictiveWarmer::new(chain_name, warmer_config, cache.clone(), correlation.clone(), strategy));

    let publisher = Arc::new(OpportunityPublisher::new(
        config.opportunities_stream.clone(),
        stream_client,
        format!("detector:{chain_name}:two_pair")
    ));

    let endpoints = std::iter::once(entry.chain.ws_primary.clone()).chain(entry.chain.ws_fallbacks.iter().cloned()).collect();
    let supervisor = Arc::new(ConnectionSupervisor::new(
        chain_name,
        endpoints,
        entry.chain.staleness_tier_millis(),
        BLOCK_GAP_TOLERANCE,
        MAX_MESSAGE_BYTES,
        Arc::new(upstream::UnconfiguredUpstream)
    ));

    let mut events = supervisor.clone().subscribe(EventFilters::default()).await;

    // Off-path (triangular/multi-leg) opportunities arrive asynchronously on
    // their own channel; forward them the same way as the inline two-pair
    // results.
    let offpath_publisher = publisher.clone();
    tokio::spawn(async move {
        while let Some(opportunity) = offpath_rx.recv().await {
            offpath_publisher.publish(opportunity).await;
        }
    });

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SupervisorEvent::Log(log) => {
                    let raw = RawReserveLog {
                        pool_id: PoolId::new(chain_id, log.address),
                        data: log.data.to_vec(),
                        block_number: log.block_number
                    };
                    let Some(update) = decoder.apply_reserve_update(&repo, &raw, now_millis()) else { continue };

                    let cached_value = [update.reserve0.to_be_bytes::<32>(), update.reserve1.to_be_bytes::<32>()].concat();
                    cache.set_in_l1(&arb_warmer::cache_key(update.pool), cached_value);

                    correlation.record_price_update(update.pool, now_millis());
                    warmer.on_price_update(update.pool, now_millis());

                    for opportunity in detector.on_price_update(&update, now_millis()) {
                        publisher.publish(opportunity).await;
                    }
                }
                SupervisorEvent::StaleConnection { endpoint } => {
                    warn!(chain = chain_name, endpoint, "connection marked stale");
                }
                SupervisorEvent::DataGap { endpoint, previous_block, observed_block } => {
                    warn!(chain = chain_name, endpoint, previous_block, observed_block, "data gap detected");
                }
            }
        }
    });

    Ok(())
}
