//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (bridges reference existing brokers/acceptors)
//! - Validate addresses, protocol magic and header names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::{BridgeConfig, BrokerConfig};
use crate::handshake::digest::MAGIC_LEN;
use crate::handshake::profile::UpgradeProfile;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{profile} protocol token is empty")]
    EmptyProtocol { profile: &'static str },

    #[error("{profile} magic must be 36 ASCII bytes")]
    InvalidMagic { profile: &'static str },

    #[error("{profile} header name '{value}' is invalid")]
    InvalidHeaderName { profile: &'static str, value: String },

    #[error("primary and legacy protocols share the token '{0}'")]
    SharedProtocolToken(String),

    #[error("broker name '{0}' is defined more than once")]
    DuplicateBroker(String),

    #[error("broker '{broker}' defines acceptor '{acceptor}' more than once")]
    DuplicateAcceptor { broker: String, acceptor: String },

    #[error("bridge references unknown broker '{0}'")]
    UnknownBroker(String),

    #[error("bridge references unknown acceptor '{acceptor}' on broker '{broker}'")]
    UnknownAcceptor { broker: String, acceptor: String },

    #[error("bridge for broker '{broker}' acceptor '{acceptor}' is defined more than once")]
    DuplicateBridge { broker: String, acceptor: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "metrics", &config.observability.metrics_address);
    }
    if config.admin.enabled {
        check_address(&mut errors, "admin", &config.admin.bind_address);
    }

    check_profile(&mut errors, "primary", &config.protocols.primary);
    check_profile(&mut errors, "legacy", &config.protocols.legacy);
    if config.bridges.iter().any(|b| b.legacy)
        && config.protocols.primary.protocol.eq_ignore_ascii_case(&config.protocols.legacy.protocol)
    {
        errors.push(ValidationError::SharedProtocolToken(config.protocols.primary.protocol.clone()));
    }

    let mut broker_names = HashSet::new();
    for broker in &config.brokers {
        check_broker(&mut errors, &mut broker_names, broker);
    }

    let mut bridges = HashSet::new();
    for bridge in &config.bridges {
        if !bridges.insert((bridge.broker.as_str(), bridge.acceptor.as_str())) {
            errors.push(ValidationError::DuplicateBridge {
                broker: bridge.broker.clone(),
                acceptor: bridge.acceptor.clone(),
            });
        }
        match config.brokers.iter().find(|b| b.name == bridge.broker) {
            None => errors.push(ValidationError::UnknownBroker(bridge.broker.clone())),
            Some(broker) if !broker.acceptors.iter().any(|a| a.name == bridge.acceptor) => {
                errors.push(ValidationError::UnknownAcceptor {
                    broker: bridge.broker.clone(),
                    acceptor: bridge.acceptor.clone(),
                });
            }
            Some(_) => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_profile(errors: &mut Vec<ValidationError>, name: &'static str, profile: &UpgradeProfile) {
    if profile.protocol.trim().is_empty() {
        errors.push(ValidationError::EmptyProtocol { profile: name });
    }
    if profile.magic.len() != MAGIC_LEN || !profile.magic.is_ascii() {
        errors.push(ValidationError::InvalidMagic { profile: name });
    }
    for header in [
        &profile.key_header,
        &profile.accept_header,
        &profile.endpoint_header,
        &profile.broker_header,
    ] {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName {
                profile: name,
                value: header.clone(),
            });
        }
    }
}

fn check_broker<'a>(errors: &mut Vec<ValidationError>, names: &mut HashSet<&'a str>, broker: &'a BrokerConfig) {
    if !names.insert(broker.name.as_str()) {
        errors.push(ValidationError::DuplicateBroker(broker.name.clone()));
    }
    let mut acceptors = HashSet::new();
    for acceptor in &broker.acceptors {
        if !acceptors.insert(acceptor.name.as_str()) {
            errors.push(ValidationError::DuplicateAcceptor {
                broker: broker.name.clone(),
                acceptor: acceptor.name.clone(),
            });
        }
        check_address(errors, "acceptor forward", &acceptor.forward_address);
    }
    for backup in &broker.backups {
        check_broker(errors, names, backup);
    }
}
