//! HTTP query server
//!
//! Two endpoints over the shared, immutable graph: `/route` answers a
//! single weighted query with a GeoJSON LineString and the three cost
//! scalars, `/alternatives` runs the Pareto-set enumerator and reports the
//! selected routes with their weight vectors, pairwise shared fraction and
//! Fréchet distance. Per-query search state is created per request; the
//! graph itself is shared read-only.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use velo_routing::routes::{calculate_sharing, frechet_distance, unpack_edge};
use velo_routing::{
    ChDijkstra, Config, EdgeStore, EnumerateOptimals, Graph, NodePos, Route,
};

pub struct AppState {
    graph: Graph,
    store: EdgeStore,
}

#[derive(Debug, Deserialize)]
pub struct RouteParams {
    s: u32,
    t: u32,
    length: Option<f64>,
    height: Option<f64>,
    unsuitability: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativesParams {
    s: u32,
    t: u32,
    max_routes: Option<usize>,
    max_overlap: Option<f64>,
}

type HandlerError = (StatusCode, Json<Value>);

fn bad_request(message: &str) -> HandlerError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn resolve_pair(state: &AppState, s: u32, t: u32) -> Result<(NodePos, NodePos), HandlerError> {
    let from = state.graph.node_pos(s).ok_or_else(|| bad_request("unknown source node id"))?;
    let to = state.graph.node_pos(t).ok_or_else(|| bad_request("unknown target node id"))?;
    Ok((from, to))
}

/// GeoJSON Feature with the route's LineString, as the web clients expect.
fn route_to_json(route: &Route, graph: &Graph, store: &EdgeStore) -> Value {
    let mut coordinates = Vec::new();
    let mut primitive = Vec::new();
    for &id in &route.edges {
        primitive.extend(unpack_edge(store, id));
    }
    for &id in &primitive {
        let edge = store.get(id);
        if let Some(node) = graph.node_by_id(edge.source) {
            coordinates.push(json!([node.lng, node.lat]));
        }
    }
    if let Some(&last) = primitive.last() {
        if let Some(node) = graph.node_by_id(store.get(last).dest) {
            coordinates.push(json!([node.lng, node.lat]));
        }
    }

    json!({
        "length": route.costs.length(),
        "height": route.costs.height(),
        "unsuitability": route.costs.unsuitability(),
        "route": {
            "type": "Feature",
            "geometry": {
                "type": "LineString",
                "coordinates": coordinates,
            },
            "properties": {},
        },
    })
}

/// Weight vector rendered the way the original clients read it:
/// percentages separated by slashes.
fn config_to_string(config: &Config) -> String {
    let percents: Vec<String> = config
        .0
        .iter()
        .map(|alpha| format!("{}", (alpha * 100.0).round()))
        .collect();
    percents.join("/")
}

async fn route_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RouteParams>,
) -> Result<Json<Value>, HandlerError> {
    let (from, to) = resolve_pair(&state, params.s, params.t)?;

    let weights = [
        params.length.unwrap_or(0.0),
        params.height.unwrap_or(0.0),
        params.unsuitability.unwrap_or(0.0),
    ];
    if weights.iter().any(|&w| w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return Err(bad_request("weights must be non-negative and not all zero"));
    }
    let config = Config::normalized(weights);

    let mut dijkstra = ChDijkstra::new(&state.graph, &state.store);
    match dijkstra.find_best_route(from, to, &config) {
        Some(route) => Ok(Json(route_to_json(&route, &state.graph, &state.store))),
        None => Ok(Json(json!({ "route": Value::Null }))),
    }
}

async fn alternatives_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlternativesParams>,
) -> Result<Json<Value>, HandlerError> {
    let (from, to) = resolve_pair(&state, params.s, params.t)?;
    let max_routes = params.max_routes.unwrap_or(5);
    let max_overlap = params.max_overlap.unwrap_or(0.5);
    if max_routes == 0 || !(0.0..=1.0).contains(&max_overlap) {
        return Err(bad_request("maxRoutes must be positive, maxOverlap within [0, 1]"));
    }

    let mut enumerator =
        EnumerateOptimals::new(&state.graph, &state.store, max_routes, max_overlap);
    let (routes, configs) = enumerator.find(from, to);
    info!(found = routes.len(), s = params.s, t = params.t, "alternatives query");

    let rendered: Vec<Value> = routes
        .iter()
        .zip(configs.iter())
        .map(|(route, config)| {
            json!({
                "config": config_to_string(config),
                "route": route_to_json(route, &state.graph, &state.store),
            })
        })
        .collect();

    let (shared, frechet) = if routes.len() >= 2 {
        (
            calculate_sharing(&routes[0], &routes[1], &state.store),
            frechet_distance(&routes[0], &routes[1], &state.store, &state.graph),
        )
    } else {
        (0.0, 0.0)
    };

    Ok(Json(json!({
        "routes": rendered,
        "shared": shared,
        "frechet": frechet,
    })))
}

async fn health_handler() -> &'static str {
    "ok"
}

pub async fn run_server(graph: Graph, store: EdgeStore, port: u16) -> anyhow::Result<()> {
    let state = Arc::new(AppState { graph, store });

    let app = Router::new()
        .route("/route", get(route_handler))
        .route("/alternatives", get(alternatives_handler))
        .route("/health", get(health_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    info!(%addr, "query server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
