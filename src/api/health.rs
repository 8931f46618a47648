//! Liveness endpoints. Neither touches the database.

use crate::config::SERVICE_BANNER;

pub async fn root() -> &'static str {
    SERVICE_BANNER
}

pub async fn health() -> &'static str {
    "OK"
}
