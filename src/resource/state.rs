//! Resource lifecycle state machine.
//!
//! # States
//! - Uninitialized: constructed, `initialize` not yet called
//! - Initializing: one `initialize` attempt in flight
//! - Ready: instance available through `get()`
//! - Failed: last initialization or health check failed
//! - Closed: torn down (terminal)
//!
//! # State Transitions
//! ```text
//! Uninitialized/Failed → Initializing: init requested (manual, auto, or heal)
//! Initializing → Ready: initialize succeeded
//! Initializing → Failed: initialize failed
//! Ready → Failed: health check failed
//! any → Closed: close requested
//! Closed → Closed: every event is ignored
//! ```
//!
//! `transition` is pure; the resource applies the returned effect.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    Closed,
}

impl ResourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Uninitialized => "uninitialized",
            ResourceStatus::Initializing => "initializing",
            ResourceStatus::Ready => "ready",
            ResourceStatus::Failed => "failed",
            ResourceStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a heal retry is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealStatus {
    #[default]
    NotScheduled,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lifecycle {
    pub status: ResourceStatus,
    pub heal: HealStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    InitStarted,
    InitSucceeded,
    InitFailed,
    CheckPassed,
    CheckFailed,
    CloseRequested,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ScheduleHeal,
    CancelHeal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: Lifecycle,
    pub effect: Option<Effect>,
}

impl Transition {
    fn to(state: Lifecycle) -> Self {
        Self { state, effect: None }
    }
}

/// Compute the next lifecycle state for `event`.
pub fn transition(current: Lifecycle, event: Event, heal_enabled: bool) -> Transition {
    use ResourceStatus::*;

    if current.status == Closed {
        return Transition::to(current);
    }

    match event {
        Event::InitStarted => Transition::to(Lifecycle {
            status: Initializing,
            ..current
        }),
        Event::InitSucceeded => Transition {
            state: Lifecycle {
                status: Ready,
                heal: HealStatus::NotScheduled,
            },
            effect: (current.heal == HealStatus::Scheduled).then_some(Effect::CancelHeal),
        },
        Event::InitFailed => fail(current, heal_enabled),
        Event::CheckPassed => Transition::to(current),
        Event::CheckFailed => match current.status {
            Ready | Failed => fail(current, heal_enabled),
            Uninitialized | Initializing | Closed => Transition::to(current),
        },
        Event::CloseRequested => Transition {
            state: Lifecycle {
                status: Closed,
                heal: HealStatus::NotScheduled,
            },
            effect: (current.heal == HealStatus::Scheduled).then_some(Effect::CancelHeal),
        },
    }
}

fn fail(current: Lifecycle, heal_enabled: bool) -> Transition {
    if heal_enabled && current.heal == HealStatus::NotScheduled {
        Transition {
            state: Lifecycle {
                status: ResourceStatus::Failed,
                heal: HealStatus::Scheduled,
            },
            effect: Some(Effect::ScheduleHeal),
        }
    } else {
        Transition::to(Lifecycle {
            status: ResourceStatus::Failed,
            ..current
        })
    }
}
