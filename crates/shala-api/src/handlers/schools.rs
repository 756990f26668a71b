//! Handlers for the school-record endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/save-schools` | Body: non-empty JSON array of records |
//! | `GET`  | `/api/filters` | state → sorted districts |
//! | `POST` | `/api/schools/search` | Body: [`SchoolQuery`] |
//! | `POST` | `/api/check-existing` | Body: `{"codes": [..], "ay"?: ".."}` |

use axum::{Json, extract::State};
use serde_json::{Value, json};
use shala_core::{
  query::SchoolQuery,
  record::SchoolRecord,
  store::{IdentityStore, SchoolStore},
};

use crate::{AppState, auth::CurrentUser, error::Error};

/// `POST /api/save-schools`
pub async fn save<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Json(body): Json<Value>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let Value::Array(items) = body else {
    return Err(Error::BadRequest(
      "request body must be an array of records".to_owned(),
    ));
  };
  if items.is_empty() {
    return Err(Error::BadRequest(
      "request body must not be empty".to_owned(),
    ));
  }

  let records: Vec<SchoolRecord> = items
    .into_iter()
    .map(|item| match item {
      Value::Object(map) => Ok(SchoolRecord(map)),
      _ => Err(Error::BadRequest(
        "each record must be a JSON object".to_owned(),
      )),
    })
    .collect::<Result<_, _>>()?;

  let count = state
    .store
    .save_schools(records)
    .await
    .map_err(Error::store)?;

  Ok(Json(json!({
    "success": true,
    "message": format!("saved {count} new schools"),
    "count": count,
  })))
}

/// `GET /api/filters`
pub async fn filters<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let map = state
    .store
    .state_districts()
    .await
    .map_err(Error::store)?;
  Ok(Json(json!(map)))
}

/// `POST /api/schools/search`
pub async fn search<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Json(query): Json<SchoolQuery>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let page = state
    .store
    .search_schools(&query)
    .await
    .map_err(Error::store)?;

  Ok(Json(json!({
    "data": page.rows,
    "total": page.total,
    "page": query.page(),
    "limit": query.limit(),
  })))
}

/// `POST /api/check-existing`
pub async fn check_existing<S>(
  State(state): State<AppState<S>>,
  _user: CurrentUser,
  Json(body): Json<Value>,
) -> Result<Json<Value>, Error>
where
  S: SchoolStore + IdentityStore + Clone + Send + Sync + 'static,
{
  let codes = body
    .get("codes")
    .and_then(Value::as_array)
    .ok_or_else(|| {
      Error::BadRequest("\"codes\" must be an array of strings".to_owned())
    })?;
  let codes: Vec<String> = codes
    .iter()
    .map(|v| {
      v.as_str().map(str::to_owned).ok_or_else(|| {
        Error::BadRequest("\"codes\" must contain only strings".to_owned())
      })
    })
    .collect::<Result<_, _>>()?;
  let academic_year = body.get("ay").and_then(Value::as_str);

  let existing = state
    .store
    .existing_codes(&codes, academic_year)
    .await
    .map_err(Error::store)?;

  Ok(Json(json!({ "existing": existing })))
}
