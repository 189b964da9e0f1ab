#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive map session.
//!
//! A [`MapSession`] owns the current [`FilterSet`]. Every change that
//! alters the set broadcasts a [`FilterEvent`] and submits one aggregation
//! request tagged with a new generation number. Requests wait out a
//! debounce period, then query the store under a timeout, re-issuing on
//! failure up to a configured limit.
//!
//! Only the latest generation may publish. A request that resolves after
//! a newer one was submitted is dropped without touching the render
//! state; there is no cancellation. Render state is published as
//! immutable snapshots on a [`watch`] channel.

pub mod config;

pub use config::SessionConfig;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use survey_map_filters::{FilterError, FilterEvent, FilterKey, FilterSet};
use survey_map_geography::{GeometryError, GeometryIndex};
use survey_map_render::{RenderBatch, RenderFeed};
use survey_map_stats::{AggregationError, StatBatch};
use survey_map_store::SurveyStore;
use survey_map_survey_models::{Filter, QuestionCatalog};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 64;

/// Errors that can occur in a map session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The config document is not valid TOML.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A config value is out of range.
    #[error("Invalid config: {message}")]
    InvalidConfig {
        /// Which value is wrong.
        message: String,
    },

    /// Reading a file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A filter change was rejected.
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Geometry could not be loaded.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// A background task panicked or was cancelled.
    #[error("Task error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// What the map currently shows.
#[derive(Debug, Clone, Default)]
pub enum RenderState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// The latest request has not resolved.
    Pending {
        /// Generation being waited on.
        generation: u64,
    },
    /// The latest request resolved.
    Ready(Arc<RenderBatch>),
    /// The latest request failed after all re-issues.
    Failed {
        /// Generation that failed.
        generation: u64,
        /// Display text of the final error.
        error: String,
    },
}

impl RenderState {
    /// Generation this state belongs to, `None` when idle.
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Pending { generation } | Self::Failed { generation, .. } => Some(*generation),
            Self::Ready(batch) => Some(batch.generation),
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// How one request ended.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// Published to the render state.
    Resolved(Arc<RenderBatch>),
    /// Published as a failure.
    Failed(String),
    /// A newer request was submitted first; nothing was published.
    Superseded,
}

/// Handle to a submitted request.
#[derive(Debug)]
pub struct QueryTicket {
    generation: u64,
    handle: JoinHandle<QueryOutcome>,
}

impl QueryTicket {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the request to finish.
    pub async fn outcome(self) -> QueryOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Aggregation task for generation {} failed: {e}", self.generation);
                QueryOutcome::Failed(e.to_string())
            }
        }
    }
}

struct Shared {
    store: Arc<dyn SurveyStore>,
    config: SessionConfig,
    latest: AtomicU64,
    geometry: RwLock<Arc<GeometryIndex>>,
    last_stats: Mutex<Option<(u64, Arc<StatBatch>)>>,
    state: watch::Sender<RenderState>,
}

impl Shared {
    fn is_latest(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == generation
    }

    /// Replaces the render state if `generation` is still the latest.
    fn publish(&self, generation: u64, state: RenderState) -> bool {
        self.state.send_if_modified(|current| {
            if self.is_latest(generation) {
                *current = state;
                true
            } else {
                false
            }
        })
    }

    async fn install_geometry(&self, geometry: Arc<GeometryIndex>) {
        let mut slot = self.geometry.write().await;
        *slot = Arc::clone(&geometry);

        let last = self.last_stats.lock().await.clone();
        let Some((generation, stats)) = last else {
            return;
        };
        let rendered = RenderFeed::new(geometry).render(generation, &stats);
        if self.publish(generation, RenderState::Ready(Arc::new(rendered))) {
            log::debug!("Re-joined generation {generation} with new geometry");
        }
    }
}

/// Filter state plus the request pipeline behind it.
pub struct MapSession {
    filters: FilterSet,
    events: broadcast::Sender<FilterEvent>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("filters", &self.filters)
            .field("config", &self.shared.config)
            .field("latest", &self.shared.latest.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MapSession {
    #[must_use]
    pub fn new(store: Arc<dyn SurveyStore>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(RenderState::Idle);
        Self {
            filters: FilterSet::new(),
            events,
            shared: Arc::new(Shared {
                store,
                config,
                latest: AtomicU64::new(0),
                geometry: RwLock::new(Arc::new(GeometryIndex::default())),
                last_stats: Mutex::new(None),
                state,
            }),
        }
    }

    #[must_use]
    pub const fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Receives one event per filter change.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<FilterEvent> {
        self.events.subscribe()
    }

    /// Receives every published render state.
    #[must_use]
    pub fn subscribe_render(&self) -> watch::Receiver<RenderState> {
        self.shared.state.subscribe()
    }

    /// Snapshot of the current render state.
    #[must_use]
    pub fn render_state(&self) -> RenderState {
        self.shared.state.borrow().clone()
    }

    /// Sets the filter for `question_id`, replacing any existing one.
    ///
    /// Returns `None` if the set did not change.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Filter`] for a blank question or response.
    pub fn add_filter(
        &mut self,
        question_id: &str,
        response: &str,
        category: Option<String>,
    ) -> Result<Option<QueryTicket>, SessionError> {
        let next = self.filters.add_filter(question_id, response, category)?;
        Ok(self.replace_filters(next, question_id))
    }

    /// Sets a filter after checking the question against `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Filter`] for unknown questions or blank input.
    pub fn add_validated(
        &mut self,
        catalog: &QuestionCatalog,
        question_id: &str,
        response: &str,
    ) -> Result<Option<QueryTicket>, SessionError> {
        let next = self.filters.add_validated(catalog, question_id, response)?;
        Ok(self.replace_filters(next, question_id.trim()))
    }

    /// Removes one filter. Returns `None` if there was nothing to remove.
    pub fn remove_filter(&mut self, key: FilterKey<'_>) -> Option<QueryTicket> {
        let (next, removed) = self.filters.remove_filter(key);
        let removed = removed?;
        self.filters = next;
        self.emit(FilterEvent::Removed {
            question_id: removed.question_id,
        });
        Some(self.submit())
    }

    /// Removes every filter. Returns `None` if the set was already empty.
    pub fn clear(&mut self) -> Option<QueryTicket> {
        if self.filters.is_empty() {
            return None;
        }
        self.filters = self.filters.clear();
        self.emit(FilterEvent::Cleared);
        Some(self.submit())
    }

    /// Re-queries the current filters, e.g. for the initial general view
    /// or after a failure.
    pub fn refresh(&self) -> QueryTicket {
        self.submit()
    }

    /// Replaces the geometry and re-joins the current statistics.
    pub async fn set_geometry(&self, geometry: GeometryIndex) {
        log::info!("Installing {} neighborhood geometries", geometry.len());
        self.shared.install_geometry(Arc::new(geometry)).await;
    }

    /// Loads geometry on the blocking pool without holding up filter
    /// changes. Resolves to the number of outlines installed.
    pub fn load_geometry<F>(&self, load: F) -> JoinHandle<Result<usize, SessionError>>
    where
        F: FnOnce() -> Result<GeometryIndex, GeometryError> + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let index = tokio::task::spawn_blocking(load).await??;
            let count = index.len();
            shared.install_geometry(Arc::new(index)).await;
            log::info!("Geometry loaded: {count} neighborhoods");
            Ok::<_, SessionError>(count)
        })
    }

    fn replace_filters(&mut self, next: FilterSet, question_id: &str) -> Option<QueryTicket> {
        if next == self.filters {
            log::debug!("Filter on '{question_id}' unchanged; not re-querying");
            return None;
        }
        let event = if self.filters.get(question_id).is_some() {
            FilterEvent::Replaced {
                question_id: question_id.to_string(),
            }
        } else {
            FilterEvent::Added {
                question_id: question_id.to_string(),
            }
        };
        self.filters = next;
        self.emit(event);
        Some(self.submit())
    }

    fn emit(&self, event: FilterEvent) {
        log::debug!("Filter event: {event:?}");
        if self.events.send(event).is_err() {
            log::trace!("No filter event subscribers");
        }
    }

    fn submit(&self) -> QueryTicket {
        let generation = self.shared.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared
            .state
            .send_replace(RenderState::Pending { generation });

        log::debug!(
            "Submitting generation {generation} with {} filters",
            self.filters.len()
        );

        let shared = Arc::clone(&self.shared);
        let filters = self.filters.as_slice().to_vec();
        let handle = tokio::spawn(run(shared, generation, filters));

        QueryTicket { generation, handle }
    }
}

async fn run(shared: Arc<Shared>, generation: u64, filters: Vec<Filter>) -> QueryOutcome {
    let config = shared.config;

    if !config.debounce.is_zero() {
        tokio::time::sleep(config.debounce).await;
    }
    if !shared.is_latest(generation) {
        log::debug!("Generation {generation} superseded during debounce");
        return QueryOutcome::Superseded;
    }

    let mut attempt = 0;
    let result = loop {
        let error = match tokio::time::timeout(
            config.timeout,
            survey_map_stats::aggregate(shared.store.as_ref(), &filters),
        )
        .await
        {
            Ok(Ok(batch)) => break Ok(batch),
            Ok(Err(e)) => e,
            Err(_) => AggregationError::Timeout(config.timeout),
        };

        if !shared.is_latest(generation) {
            log::debug!("Generation {generation} superseded while failing: {error}");
            return QueryOutcome::Superseded;
        }
        if attempt >= config.max_reissues {
            break Err(error);
        }
        attempt += 1;
        log::warn!(
            "Aggregation for generation {generation} failed ({error}); re-issuing ({attempt}/{})",
            config.max_reissues
        );
    };

    match result {
        Ok(batch) => resolve(&shared, generation, batch).await,
        Err(e) => {
            log::error!("Aggregation for generation {generation} failed: {e}");
            let error = e.to_string();
            if shared.publish(
                generation,
                RenderState::Failed {
                    generation,
                    error: error.clone(),
                },
            ) {
                QueryOutcome::Failed(error)
            } else {
                QueryOutcome::Superseded
            }
        }
    }
}

async fn resolve(shared: &Shared, generation: u64, batch: StatBatch) -> QueryOutcome {
    if !shared.is_latest(generation) {
        log::debug!("Dropping stale result for generation {generation}");
        return QueryOutcome::Superseded;
    }

    let batch = Arc::new(batch);

    // Held until publish so a concurrent geometry install re-joins this batch.
    let geometry = shared.geometry.read().await;
    let rendered = Arc::new(RenderFeed::new(Arc::clone(&geometry)).render(generation, &batch));
    *shared.last_stats.lock().await = Some((generation, batch));

    if shared.publish(generation, RenderState::Ready(Arc::clone(&rendered))) {
        log::info!("Published {}", rendered.summary());
        QueryOutcome::Resolved(rendered)
    } else {
        log::debug!("Dropping stale result for generation {generation}");
        QueryOutcome::Superseded
    }
}
