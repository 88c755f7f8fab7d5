use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::models::events::ServerEvent;
use crate::models::room::GeoPoint;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_min: f64,
    pub polyline: Vec<GeoPoint>,
}

/// Seam for the external routing service. The service has no push
/// interface, so it is the one collaborator that gets polled.
pub trait RouteEstimator: Send + Sync {
    fn estimate(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> BoxFuture<'static, Result<RouteEstimate, AppError>>;
}

/// OSRM-compatible `route/v1/driving` client.
pub struct OsrmRouteEstimator {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouteEstimator {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    // GeoJSON order: [lng, lat]
    coordinates: Vec<[f64; 2]>,
}

impl RouteEstimator for OsrmRouteEstimator {
    fn estimate(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> BoxFuture<'static, Result<RouteEstimate, AppError>> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        );
        let client = self.client.clone();

        Box::pin(async move {
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|err| AppError::Upstream(err.to_string()))?
                .error_for_status()
                .map_err(|err| AppError::Upstream(err.to_string()))?;

            let body: OsrmResponse = response
                .json()
                .await
                .map_err(|err| AppError::Upstream(err.to_string()))?;

            let route = body
                .routes
                .into_iter()
                .next()
                .ok_or_else(|| AppError::Upstream("no route returned".to_string()))?;

            Ok(RouteEstimate {
                distance_km: route.distance / 1000.0,
                duration_min: route.duration / 60.0,
                polyline: route
                    .geometry
                    .coordinates
                    .into_iter()
                    .map(|c| GeoPoint { lat: c[1], lng: c[0] })
                    .collect(),
            })
        })
    }
}

/// Opportunistic polling: whenever a room knows both positions, ask the
/// estimator and push a `route_update` to the room. A failed poll withholds
/// the update until the next tick; distance/duration are an enhancement
/// layer, not a guarantee.
pub async fn run_route_poller(
    state: Arc<AppState>,
    estimator: Arc<dyn RouteEstimator>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        for (order_id, agent, customer, bearing) in state.registry.rooms_with_both_positions() {
            match estimator.estimate(agent, customer).await {
                Ok(estimate) => {
                    state
                        .metrics
                        .route_polls_total
                        .with_label_values(&["success"])
                        .inc();
                    state.registry.broadcast(
                        &order_id,
                        &ServerEvent::RouteUpdate {
                            order_id: order_id.clone(),
                            distance_km: estimate.distance_km,
                            duration_min: estimate.duration_min,
                            polyline: estimate.polyline,
                            bearing,
                        },
                        None,
                    );
                }
                Err(err) => {
                    state
                        .metrics
                        .route_polls_total
                        .with_label_values(&["error"])
                        .inc();
                    debug!(order_id, error = %err, "route estimate withheld");
                }
            }
        }
    }
}
