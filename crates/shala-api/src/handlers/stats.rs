//! Handlers for dashboard statistics and filter metadata.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/api/dashboard/stats` | `?state&district&block&ay`, all optional |
//! | `GET` | `/api/academic-years` | distinct years, sorted |
//! | `GET` | `/api/filter-options` | cascading select values |

use axum::{
  Json,
  extract::{Query, State},
};
use serde_json::{Value, json};
use shala_core::{
  query::{DashboardStats, StatsFilter},
  store::{IdentityStore, SchoolStore},
};

use crate::{AppState, auth::CurrentUser, error::Error};

/// `GET /api/dashboard/stats[?state=..][&district=..][&block=..][&ay=..]`
pub async fn dashboard<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Query(filter): Query<StatsFilter>,
) -> Result<Json<DashboardStats>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let stats = state
    .store
    .dashboard_stats(&filter)
    .await
    .map_err(Error::store)?;
  Ok(Json(stats))
}

/// `GET /api/academic-years`
pub async fn academic_years<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let years = state
    .store
    .academic_years()
    .await
    .map_err(Error::store)?;
  Ok(Json(json!({ "success": true, "academicYears": years })))
}

/// `GET /api/filter-options`
pub async fn filter_options<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let options = state
    .store
    .filter_options()
    .await
    .map_err(Error::store)?;
  Ok(Json(json!({
    "success": true,
    "states": options.states,
    "districtsByState": options.districts_by_state,
    "blocksByStateDistrict": options.blocks_by_state_district,
    "academicYears": options.academic_years,
  })))
}
