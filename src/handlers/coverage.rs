use axum::{
    Json,
    extract::{Path, Query, State},
};
use crate::{
    Error, Result,
    types::{
        ChromosomesResponse, CoverageQuery, CoverageResponse, CoverageResponseBody, Region,
    },
};
use super::AppState;

pub async fn get_coverage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CoverageQuery>,
) -> Result<Json<CoverageResponse>> {
    let index = state.index(&id)?;

    let reference_name = query
        .reference_name
        .ok_or_else(|| Error::InvalidInput("referenceName is required".to_string()))?;

    let region = Region::new(reference_name, query.start, query.end);
    let window_size = query.window.unwrap_or(1);
    let aggregate = query.aggregate.unwrap_or_default();

    let windows = index.query(&region, window_size, aggregate).await?;

    Ok(Json(CoverageResponse {
        coverage: CoverageResponseBody {
            id,
            reference_name: region.reference_name,
            windows,
        },
    }))
}

pub async fn get_chromosomes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChromosomesResponse>> {
    let index = state.index(&id)?;

    Ok(Json(ChromosomesResponse {
        chunk_size: index.chunk_size().get(),
        chromosomes: index.chromosomes().await?,
        id,
    }))
}
