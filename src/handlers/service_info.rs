use crate::types::{ServiceInfo, ServiceType};
use axum::{Json, extract::State};
use super::AppState;

pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let mut datasets: Vec<String> = state.indexes.keys().cloned().collect();
    datasets.sort();

    Json(ServiceInfo {
        id: "org.example.covidx".to_string(),
        name: "covidx".to_string(),
        r#type: ServiceType {
            group: "org.example".to_string(),
            artifact: "coverage".to_string(),
            version: "1.0.0".to_string(),
        },
        description: Some("Chunked read-depth coverage index".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
        datasets,
    })
}
