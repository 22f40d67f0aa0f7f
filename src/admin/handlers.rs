use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::directory::BrokerStatus;
use crate::registry::ListenerUpgrade;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub listener: String,
    pub registrations: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        listener: state.listener.to_string(),
        registrations: state.dispatch.len(),
    })
}

pub async fn get_upgrades(State(state): State<AdminState>) -> Json<Vec<ListenerUpgrade>> {
    Json(state.metadata.all())
}

pub async fn get_brokers(State(state): State<AdminState>) -> Json<Vec<BrokerStatus>> {
    Json(state.directory.status())
}
