//! Supervised resource.
//!
//! # Responsibilities
//! - Run `initialize` at most once at a time and share its result
//! - Expose the instance only while the resource is ready
//! - Run health checks (on demand and periodically) and mark failures
//! - Retry initialization through a heal strategy after a failure
//! - Tear the instance down exactly once on close
//!
//! # Design Decisions
//! - Status changes go through the pure `transition` function; this module
//!   only applies the requested effects (spawn or abort the heal loop)
//! - The lock is a std `Mutex` and is never held across an await point
//! - Background loops hold a `Weak` reference so dropping the last handle
//!   stops them

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::ResourceSettings;
use crate::health::check::{CheckOutcome, ProbeError};
use crate::health::probe::{ProbeTarget, Prober};
use crate::observability::metrics;
use crate::resilience::timeouts::{with_deadline, TimedOut};
use crate::resource::error::{ResourceError, ResourceResult};
use crate::resource::heal::HealStrategy;
use crate::resource::state::{
    transition, Effect, Event, HealStatus, Lifecycle, ResourceStatus, Transition,
};

type InitFn<T> = Arc<dyn Fn() -> BoxFuture<'static, ResourceResult<T>> + Send + Sync>;
type HealthcheckFn<T> = Arc<dyn Fn(Arc<T>) -> BoxFuture<'static, Result<bool, String>> + Send + Sync>;
type TeardownFn<T> = Arc<dyn Fn(Arc<T>) -> BoxFuture<'static, ()> + Send + Sync>;
type InitFuture<T> = Shared<BoxFuture<'static, ResourceResult<Arc<T>>>>;

/// Point-in-time view of a resource, as served by the health endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    pub name: String,
    pub status: ResourceStatus,
    pub heal_status: HealStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

struct State<T> {
    lifecycle: Lifecycle,
    instance: Option<Arc<T>>,
    /// Instance that failed its health check, kept until replaced or closed.
    stale: Option<Arc<T>>,
    last_error: Option<ResourceError>,
    in_flight: Option<InitFuture<T>>,
    heal_task: Option<JoinHandle<()>>,
    monitor_task: Option<JoinHandle<()>>,
}

impl<T> State<T> {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::default(),
            instance: None,
            stale: None,
            last_error: None,
            in_flight: None,
            heal_task: None,
            monitor_task: None,
        }
    }
}

struct ResourceInner<T> {
    name: String,
    initialize: InitFn<T>,
    healthcheck: Option<HealthcheckFn<T>>,
    check_timeout: Option<Duration>,
    init_timeout: Option<Duration>,
    heal: Option<HealStrategy>,
    teardown: Option<TeardownFn<T>>,
    state: Mutex<State<T>>,
}

enum InitStep<T> {
    Ready(Arc<T>),
    Wait(InitFuture<T>),
}

impl<T: Send + Sync + 'static> ResourceInner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live instance, join the in-flight attempt, or start a new one.
    fn begin_init(self: &Arc<Self>) -> ResourceResult<InitStep<T>> {
        let mut state = self.lock();
        match state.lifecycle.status {
            ResourceStatus::Closed => return Err(ResourceError::Closed(self.name.clone())),
            ResourceStatus::Ready => {
                if let Some(instance) = &state.instance {
                    return Ok(InitStep::Ready(Arc::clone(instance)));
                }
            }
            ResourceStatus::Initializing => {
                if let Some(in_flight) = &state.in_flight {
                    return Ok(InitStep::Wait(in_flight.clone()));
                }
            }
            ResourceStatus::Uninitialized | ResourceStatus::Failed => {}
        }

        self.apply(&mut state, Event::InitStarted);

        // The task finishes even if every caller stops waiting. It blocks on
        // the lock until `in_flight` is stored below.
        let task = tokio::spawn(Arc::clone(self).run_initialize());
        let name = self.name.clone();
        let in_flight = async move {
            task.await.unwrap_or_else(|_| {
                Err(ResourceError::Initialization {
                    name,
                    message: "initialization task was cancelled".to_string(),
                })
            })
        }
        .boxed()
        .shared();

        state.in_flight = Some(in_flight.clone());
        Ok(InitStep::Wait(in_flight))
    }

    async fn run_initialize(self: Arc<Self>) -> ResourceResult<Arc<T>> {
        tracing::debug!(resource = %self.name, "Initializing resource");

        let attempt = AssertUnwindSafe((self.initialize)()).catch_unwind();
        let outcome = match with_deadline(self.init_timeout, attempt).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ResourceError::Initialization {
                name: self.name.clone(),
                message: "initialize panicked".to_string(),
            }),
            Err(TimedOut(timeout)) => Err(ResourceError::InitTimeout {
                name: self.name.clone(),
                timeout,
            }),
        };

        let (result, leftover) = {
            let mut state = self.lock();
            state.in_flight = None;
            let closed = state.lifecycle.status == ResourceStatus::Closed;

            match outcome {
                Ok(value) if closed => {
                    tracing::info!(resource = %self.name, "Resource closed during initialization, tearing down new instance");
                    (Err(ResourceError::Closed(self.name.clone())), Some(Arc::new(value)))
                }
                Ok(value) => {
                    let instance = Arc::new(value);
                    state.instance = Some(Arc::clone(&instance));
                    state.last_error = None;
                    let replaced = state.stale.take();
                    self.apply(&mut state, Event::InitSucceeded);
                    (Ok(instance), replaced)
                }
                Err(e) => {
                    if !closed {
                        tracing::warn!(resource = %self.name, error = %e, "Resource initialization failed");
                        state.last_error = Some(e.clone());
                        self.apply(&mut state, Event::InitFailed);
                    }
                    (Err(e), None)
                }
            }
        };

        if let Some(instance) = leftover {
            self.teardown_instance(instance).await;
        }
        result
    }

    fn apply(self: &Arc<Self>, state: &mut State<T>, event: Event) {
        let before = state.lifecycle;
        let Transition { state: after, effect } = transition(before, event, self.heal.is_some());
        state.lifecycle = after;

        if before.status != after.status {
            tracing::info!(
                resource = %self.name,
                from = %before.status,
                to = %after.status,
                ?event,
                "Resource status changed"
            );
            metrics::record_resource_status(&self.name, after.status);
        }

        match effect {
            Some(Effect::ScheduleHeal) => self.schedule_heal(state),
            Some(Effect::CancelHeal) => {
                if let Some(task) = state.heal_task.take() {
                    task.abort();
                }
            }
            None => {}
        }
    }

    fn schedule_heal(self: &Arc<Self>, state: &mut State<T>) {
        let Some(strategy) = self.heal else {
            return;
        };
        if let Some(previous) = state.heal_task.take() {
            previous.abort();
        }

        tracing::info!(
            resource = %self.name,
            strategy = strategy.name(),
            first_delay = ?strategy.delay(0),
            "Heal scheduled"
        );
        state.heal_task = Some(tokio::spawn(heal_loop(Arc::downgrade(self), strategy)));
    }

    async fn teardown_instance(&self, instance: Arc<T>) {
        if let Some(teardown) = &self.teardown {
            teardown(instance).await;
            tracing::debug!(resource = %self.name, "Instance torn down");
        }
    }
}

async fn heal_loop<T: Send + Sync + 'static>(resource: Weak<ResourceInner<T>>, strategy: HealStrategy) {
    let mut attempt: u32 = 0;
    loop {
        tokio::time::sleep(strategy.delay(attempt)).await;
        attempt = attempt.saturating_add(1);

        let Some(inner) = resource.upgrade() else {
            return;
        };
        {
            let state = inner.lock();
            let pending = state.lifecycle.heal == HealStatus::Scheduled
                && matches!(
                    state.lifecycle.status,
                    ResourceStatus::Failed | ResourceStatus::Initializing
                );
            if !pending {
                return;
            }
        }

        tracing::info!(resource = %inner.name, attempt, "Attempting to heal resource");
        metrics::record_heal_attempt(&inner.name);

        // Success cancels this task through the transition effect.
        if let Err(e) = (Resource { inner }).init().await {
            tracing::debug!(error = %e, attempt, "Heal attempt failed");
        }
    }
}

async fn monitor_loop<T: Send + Sync + 'static>(resource: Weak<ResourceInner<T>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = resource.upgrade() else {
            return;
        };
        let resource = Resource { inner };
        match resource.status() {
            ResourceStatus::Closed => return,
            ResourceStatus::Ready => {
                resource.check().await;
            }
            _ => {}
        }
    }
}

/// A lazily initialized, health-checked, self-healing value.
///
/// Cloning is cheap; clones share the same state.
pub struct Resource<T> {
    inner: Arc<ResourceInner<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.inner.lock().lifecycle;
        f.debug_struct("Resource")
            .field("name", &self.inner.name)
            .field("status", &lifecycle.status)
            .field("heal", &lifecycle.heal)
            .finish()
    }
}

impl<T: Send + Sync + 'static> Resource<T> {
    pub fn builder<F, Fut, E>(name: impl Into<String>, initialize: F) -> ResourceBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display,
    {
        ResourceBuilder::new(name, initialize)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> ResourceStatus {
        self.inner.lock().lifecycle.status
    }

    pub fn heal_status(&self) -> HealStatus {
        self.inner.lock().lifecycle.heal
    }

    /// Error from the most recent failed initialization or health check.
    pub fn last_error(&self) -> Option<ResourceError> {
        self.inner.lock().last_error.clone()
    }

    pub fn snapshot(&self) -> ResourceSnapshot {
        let state = self.inner.lock();
        ResourceSnapshot {
            name: self.inner.name.clone(),
            status: state.lifecycle.status,
            heal_status: state.lifecycle.heal,
            last_error: state.last_error.as_ref().map(ToString::to_string),
        }
    }

    /// Initialize the resource, or join the attempt already in flight.
    ///
    /// Concurrent callers all receive the same instance (or the same error).
    /// Returns the current instance without re-running `initialize` when the
    /// resource is already ready.
    pub async fn init(&self) -> ResourceResult<Arc<T>> {
        match self.inner.begin_init()? {
            InitStep::Ready(instance) => Ok(instance),
            InitStep::Wait(in_flight) => in_flight.await,
        }
    }

    /// The live instance; fails unless the resource is ready.
    pub fn get(&self) -> ResourceResult<Arc<T>> {
        let state = self.inner.lock();
        match (&state.lifecycle.status, &state.instance) {
            (ResourceStatus::Ready, Some(instance)) => Ok(Arc::clone(instance)),
            (status, _) => Err(ResourceError::NotReady {
                name: self.inner.name.clone(),
                status: *status,
            }),
        }
    }

    /// Run the health check against the live instance.
    ///
    /// Returns false without touching the state when the resource is not
    /// ready. A failed check marks the resource failed and may schedule a heal.
    pub async fn check(&self) -> bool {
        let (healthcheck, instance) = {
            let state = self.inner.lock();
            if state.lifecycle.status != ResourceStatus::Ready {
                tracing::debug!(
                    resource = %self.inner.name,
                    status = %state.lifecycle.status,
                    "Skipping health check"
                );
                return false;
            }
            let Some(instance) = state.instance.clone() else {
                return false;
            };
            match &self.inner.healthcheck {
                Some(healthcheck) => (Arc::clone(healthcheck), instance),
                None => return true,
            }
        };

        let result = match with_deadline(self.inner.check_timeout, healthcheck(Arc::clone(&instance))).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err("check reported unhealthy".to_string()),
            Ok(Err(message)) => Err(message),
            Err(e) => Err(e.to_string()),
        };

        let mut state = self.inner.lock();
        // The instance may have been replaced or closed while the check ran.
        let current = state.lifecycle.status == ResourceStatus::Ready
            && state
                .instance
                .as_ref()
                .is_some_and(|live| Arc::ptr_eq(live, &instance));

        match result {
            Ok(()) => {
                if current {
                    self.inner.apply(&mut state, Event::CheckPassed);
                }
                true
            }
            Err(message) => {
                if current {
                    tracing::warn!(resource = %self.inner.name, error = %message, "Health check failed");
                    state.stale = state.instance.take();
                    state.last_error = Some(ResourceError::HealthCheck {
                        name: self.inner.name.clone(),
                        message,
                    });
                    self.inner.apply(&mut state, Event::CheckFailed);
                }
                false
            }
        }
    }

    /// Close the resource. Idempotent; teardown runs at most once.
    pub async fn close(&self) {
        let (instance, monitor) = {
            let mut state = self.inner.lock();
            if state.lifecycle.status == ResourceStatus::Closed {
                return;
            }
            self.inner.apply(&mut state, Event::CloseRequested);
            let instance = match state.instance.take() {
                Some(instance) => Some(instance),
                None => state.stale.take(),
            };
            (instance, state.monitor_task.take())
        };

        if let Some(monitor) = monitor {
            monitor.abort();
        }
        if let Some(instance) = instance {
            self.inner.teardown_instance(instance).await;
        }
        tracing::info!(resource = %self.inner.name, "Resource closed");
    }

    /// Health of the resource as a probe outcome.
    ///
    /// A ready resource runs its check; a failed or closed one reports the
    /// stored error as a dependency failure.
    pub async fn health_outcome(&self) -> Result<CheckOutcome, ProbeError> {
        match self.status() {
            ResourceStatus::Ready => {
                if self.check().await {
                    Ok(CheckOutcome::Healthy)
                } else {
                    Err(self.failure().into())
                }
            }
            ResourceStatus::Failed => Err(self.failure().into()),
            ResourceStatus::Closed => Err(ResourceError::Closed(self.inner.name.clone()).into()),
            ResourceStatus::Uninitialized => {
                Ok(CheckOutcome::Unknown(format!("{} is not initialized", self.inner.name)))
            }
            ResourceStatus::Initializing => {
                Ok(CheckOutcome::Unknown(format!("{} is initializing", self.inner.name)))
            }
        }
    }

    fn failure(&self) -> ResourceError {
        self.last_error().unwrap_or_else(|| ResourceError::HealthCheck {
            name: self.inner.name.clone(),
            message: "check reported unhealthy".to_string(),
        })
    }

    /// Bind this resource to `prober` as an aggregate subsystem.
    pub fn probe_target(&self, prober: Arc<Prober>) -> ProbeTarget {
        let resource = self.clone();
        ProbeTarget::new(self.inner.name.clone(), prober, move || {
            let resource = resource.clone();
            async move { resource.health_outcome().await }
        })
    }
}

/// Type-erased view used to list and close heterogeneous resources.
pub trait ManagedResource: Send + Sync {
    fn name(&self) -> &str;

    fn snapshot(&self) -> ResourceSnapshot;

    /// Initialize without handing out the instance.
    fn init(&self) -> BoxFuture<'_, ResourceResult<()>>;

    fn close(&self) -> BoxFuture<'_, ()>;
}

impl<T: Send + Sync + 'static> ManagedResource for Resource<T> {
    fn name(&self) -> &str {
        Resource::name(self)
    }

    fn snapshot(&self) -> ResourceSnapshot {
        Resource::snapshot(self)
    }

    fn init(&self) -> BoxFuture<'_, ResourceResult<()>> {
        Box::pin(async move { Resource::init(self).await.map(|_| ()) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(Resource::close(self))
    }
}

/// Builder for [`Resource`].
pub struct ResourceBuilder<T> {
    name: String,
    initialize: InitFn<T>,
    healthcheck: Option<HealthcheckFn<T>>,
    healthcheck_interval: Option<Duration>,
    check_timeout: Option<Duration>,
    init_timeout: Option<Duration>,
    auto_init: bool,
    heal: Option<HealStrategy>,
    teardown: Option<TeardownFn<T>>,
}

impl<T: Send + Sync + 'static> ResourceBuilder<T> {
    pub fn new<F, Fut, E>(name: impl Into<String>, initialize: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display,
    {
        let name = name.into();
        let owner = name.clone();
        let initialize: InitFn<T> = Arc::new(move || {
            let name = owner.clone();
            initialize()
                .map(move |result| {
                    result.map_err(|e| ResourceError::Initialization {
                        name,
                        message: e.to_string(),
                    })
                })
                .boxed()
        });

        Self {
            name,
            initialize,
            healthcheck: None,
            healthcheck_interval: None,
            check_timeout: None,
            init_timeout: None,
            auto_init: false,
            heal: None,
            teardown: None,
        }
    }

    /// Health check returning whether the instance is usable.
    pub fn healthcheck<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.healthcheck = Some(Arc::new(move |instance| check(instance).map(Ok::<bool, String>).boxed()));
        self
    }

    /// Fallible health check; an error counts as a failed check.
    pub fn try_healthcheck<F, Fut, E>(mut self, check: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: fmt::Display,
    {
        self.healthcheck = Some(Arc::new(move |instance| {
            check(instance)
                .map(|result| result.map_err(|e| e.to_string()))
                .boxed()
        }));
        self
    }

    /// Run the health check periodically while ready.
    pub fn healthcheck_interval(mut self, every: Duration) -> Self {
        self.healthcheck_interval = Some(every);
        self
    }

    pub fn check_timeout(mut self, limit: Duration) -> Self {
        self.check_timeout = Some(limit);
        self
    }

    pub fn init_timeout(mut self, limit: Duration) -> Self {
        self.init_timeout = Some(limit);
        self
    }

    /// Start initializing as soon as the resource is built.
    pub fn auto_init(mut self, enabled: bool) -> Self {
        self.auto_init = enabled;
        self
    }

    pub fn heal(mut self, strategy: HealStrategy) -> Self {
        self.heal = Some(strategy);
        self
    }

    pub fn teardown<F, Fut>(mut self, teardown: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.teardown = Some(Arc::new(move |instance| teardown(instance).boxed()));
        self
    }

    /// Apply lifecycle settings from configuration.
    pub fn settings(mut self, settings: &ResourceSettings) -> Self {
        self.auto_init = settings.auto_init;
        if let Some(ms) = settings.healthcheck_interval_ms {
            self.healthcheck_interval = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = settings.init_timeout_ms {
            self.init_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(heal) = &settings.heal {
            self.heal = Some(HealStrategy::from(heal));
        }
        self
    }

    /// Build the resource, starting the monitor and auto-init if requested.
    ///
    /// Both background tasks need a Tokio runtime.
    pub fn build(self) -> ResourceResult<Resource<T>> {
        if self.healthcheck_interval == Some(Duration::ZERO) {
            return Err(ResourceError::InvalidConfig(format!(
                "{}: healthcheck interval must be greater than zero",
                self.name
            )));
        }
        if (self.auto_init || self.healthcheck_interval.is_some()) && Handle::try_current().is_err() {
            return Err(ResourceError::NoRuntime(self.name));
        }

        let resource = Resource {
            inner: Arc::new(ResourceInner {
                name: self.name,
                initialize: self.initialize,
                healthcheck: self.healthcheck,
                check_timeout: self.check_timeout,
                init_timeout: self.init_timeout,
                heal: self.heal,
                teardown: self.teardown,
                state: Mutex::new(State::new()),
            }),
        };

        if let Some(every) = self.healthcheck_interval {
            let task = tokio::spawn(monitor_loop(Arc::downgrade(&resource.inner), every));
            resource.inner.lock().monitor_task = Some(task);
        }
        if self.auto_init {
            resource.inner.begin_init()?;
        }

        tracing::debug!(
            resource = %resource.inner.name,
            auto_init = self.auto_init,
            heal = ?resource.inner.heal.map(|s| s.name()),
            "Resource created"
        );
        Ok(resource)
    }
}
