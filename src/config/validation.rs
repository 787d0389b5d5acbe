//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Unique, non-empty names across pools and upstreams
//! - Validate value ranges (timeouts > 0, connection limits > 0)
//! - Validate addresses and URLs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>

use axum::http::Uri;
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ResourceSettings, ServiceConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener address '{0}'")]
    ListenerAddress(String),

    #[error("subsystem name must not be empty")]
    EmptyName,

    #[error("duplicate subsystem name '{0}'")]
    DuplicateName(String),

    #[error("pool '{name}': invalid address '{address}'")]
    PoolAddress { name: String, address: String },

    #[error("pool '{0}': max_connections must be greater than zero")]
    ZeroConnections(String),

    #[error("pool '{0}': connect_timeout_ms must be greater than zero")]
    ZeroConnectTimeout(String),

    #[error("'{0}': healthcheck_interval_ms must be greater than zero")]
    ZeroHealthcheckInterval(String),

    #[error("'{0}': init_timeout_ms must be greater than zero")]
    ZeroInitTimeout(String),

    #[error("'{0}': heal initial_delay must be greater than zero")]
    ZeroHealDelay(String),

    #[error("'{0}': heal max_delay must not be below initial_delay")]
    HealMaxBelowInitial(String),

    #[error("upstream '{name}': invalid URL '{url}'")]
    UpstreamUrl { name: String, url: String },

    #[error("upstream '{0}': timeout_secs must be greater than zero")]
    ZeroUpstreamTimeout(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::ListenerAddress(config.listener.bind_address.clone()));
    }

    let mut check_name = |name: &str, errors: &mut Vec<ValidationError>| {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        } else if !names.insert(name.to_string()) {
            errors.push(ValidationError::DuplicateName(name.to_string()));
        }
    };

    for pool in &config.pools {
        check_name(&pool.name, &mut errors);

        if pool.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::PoolAddress {
                name: pool.name.clone(),
                address: pool.address.clone(),
            });
        }
        if pool.max_connections == 0 {
            errors.push(ValidationError::ZeroConnections(pool.name.clone()));
        }
        if pool.connect_timeout_ms == 0 {
            errors.push(ValidationError::ZeroConnectTimeout(pool.name.clone()));
        }
        validate_resource(&pool.name, &pool.resource, &mut errors);
    }

    for upstream in &config.upstreams {
        check_name(&upstream.name, &mut errors);

        let url = format!("{}{}", upstream.base_url.trim_end_matches('/'), upstream.path);
        let valid = url
            .parse::<Uri>()
            .map(|uri| uri.scheme().is_some() && uri.authority().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::UpstreamUrl {
                name: upstream.name.clone(),
                url,
            });
        }
        if upstream.timeout_secs == 0 {
            errors.push(ValidationError::ZeroUpstreamTimeout(upstream.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_resource(name: &str, settings: &ResourceSettings, errors: &mut Vec<ValidationError>) {
    if settings.healthcheck_interval_ms == Some(0) {
        errors.push(ValidationError::ZeroHealthcheckInterval(name.to_string()));
    }
    if settings.init_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroInitTimeout(name.to_string()));
    }
    if let Some(heal) = &settings.heal {
        if heal.initial_delay == 0 {
            errors.push(ValidationError::ZeroHealDelay(name.to_string()));
        }
        if matches!(heal.max_delay, Some(max) if max < heal.initial_delay) {
            errors.push(ValidationError::HealMaxBelowInitial(name.to_string()));
        }
    }
}
