use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use coldcall_api::{
    db, service, AffectedResponse, BulkAssignRequest, CityCount, CreatePracticeRequest, LastCall,
    LocationsQuery, OkResponse, Pagination, PracticeListQuery, PracticeListResponse,
    PracticeSummary, RegionCount, RegionsResponse, UpdatePracticeRequest,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{
    last_call_from_row, practice_from_row, sq_execute, sq_query_map, sq_query_row, Db,
};

// ---------------------------------------------------------------------------
// List practices
// ---------------------------------------------------------------------------

/// GET /api/practices — paginated, filtered list with last-call enrichment.
pub async fn list_practices(
    State(db): State<Db>,
    _user: AuthUser,
    Query(q): Query<PracticeListQuery>,
) -> Result<Json<PracticeListResponse>, ApiErr> {
    let built = db::practices::list(&q);
    let conn = db.conn();

    let total: i64 = sq_query_row(&conn, built.count_query, |row| row.get(0))
        .map_err(ApiErr::from_db("count practices"))?;

    let mut practices: Vec<PracticeSummary> =
        sq_query_map(&conn, built.select_query, practice_from_row)
            .map_err(ApiErr::from_db("list practices"))?;

    // Latest call per practice on this page.
    let ids: Vec<String> = practices.iter().map(|p| p.id.clone()).collect();
    if !ids.is_empty() {
        let last_calls: BTreeMap<String, LastCall> =
            sq_query_map(&conn, db::practices::last_calls(&ids), last_call_from_row)
                .map_err(ApiErr::from_db("last calls"))?
                .into_iter()
                .collect();
        for practice in &mut practices {
            practice.last_call = last_calls.get(&practice.id).cloned();
        }
    }

    let total_pages = (total + built.limit as i64 - 1) / built.limit as i64;
    Ok(Json(PracticeListResponse {
        practices,
        pagination: Pagination {
            page: built.page,
            limit: built.limit,
            total,
            total_pages,
        },
    }))
}

// ---------------------------------------------------------------------------
// Create practice
// ---------------------------------------------------------------------------

/// POST /api/practices — add a practice (admin only).
pub async fn create_practice(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<CreatePracticeRequest>,
) -> Result<(StatusCode, Json<PracticeSummary>), ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let name = service::validate_practice_name(&req.name).map_err(ApiErr::from)?;
    let region = service::validate_region(&req.region).map_err(ApiErr::from)?;
    let phone = req.phone.trim();
    if phone.is_empty() {
        return Err(ApiErr::bad_request("phone is required"));
    }
    let phones_json = service::encode_phones(&[phone.to_string()]);

    let id = Uuid::new_v4().to_string();
    let conn = db.conn();
    sq_execute(
        &conn,
        db::practices::insert(
            &id,
            &name,
            &region,
            req.manager.as_deref(),
            &phones_json,
            req.city.as_deref(),
            req.preferred_caller_id.as_deref(),
        ),
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ApiErr::bad_request("unknown preferred caller")
        }
        e => {
            tracing::error!("create practice: {e}");
            ApiErr::internal("failed to create practice")
        }
    })?;

    let practice = sq_query_row(&conn, db::practices::get_by_id(&id), practice_from_row)
        .map_err(ApiErr::from_db("read back practice"))?;

    Ok((StatusCode::CREATED, Json(practice)))
}

// ---------------------------------------------------------------------------
// Update practice
// ---------------------------------------------------------------------------

/// PATCH /api/practices/:id — partial update (admin only).
pub async fn update_practice(
    State(db): State<Db>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePracticeRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    if req.is_empty() {
        return Err(ApiErr::bad_request("no valid fields to update"));
    }

    let name = match req.name.as_deref() {
        Some(raw) => Some(service::validate_practice_name(raw).map_err(ApiErr::from)?),
        None => None,
    };
    let region = match req.region.as_deref() {
        Some(raw) => Some(service::validate_region(raw).map_err(ApiErr::from)?),
        None => None,
    };
    let phones_json = req.phones.as_deref().map(service::encode_phones);

    let fields = db::practices::UpdateFields {
        name: name.as_deref(),
        region: region.as_deref(),
        cities_served: req.cities_served.as_deref(),
        manager: req.manager.as_deref(),
        phones_json: phones_json.as_deref(),
        preferred_caller_id: req
            .preferred_caller_id
            .as_ref()
            .map(|inner| inner.as_deref().filter(|s| !s.is_empty())),
    };

    let Some(built) = db::practices::update(&id, &fields) else {
        return Err(ApiErr::bad_request("no valid fields to update"));
    };

    let conn = db.conn();
    let affected = sq_execute(&conn, built).map_err(ApiErr::from_db("update practice"))?;
    if affected == 0 {
        return Err(ApiErr::not_found("practice not found"));
    }

    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Bulk assign
// ---------------------------------------------------------------------------

/// POST /api/practices/bulk-assign — set (or clear) the preferred caller for
/// exactly the given practice ids (admin only).
pub async fn bulk_assign(
    State(db): State<Db>,
    user: AuthUser,
    Json(req): Json<BulkAssignRequest>,
) -> Result<Json<AffectedResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    if req.practice_ids.is_empty() {
        return Err(ApiErr::bad_request("no practices selected"));
    }

    // Empty or the literal "null" unassigns.
    let caller_id = req
        .caller_id
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "null");

    let conn = db.conn();
    let affected = sq_execute(&conn, db::practices::bulk_assign(&req.practice_ids, caller_id))
        .map_err(ApiErr::from_db("bulk assign"))?;

    Ok(Json(AffectedResponse {
        ok: true,
        affected: affected as u64,
    }))
}

// ---------------------------------------------------------------------------
// Regions & locations
// ---------------------------------------------------------------------------

/// GET /api/practices/regions — distinct region list.
pub async fn regions(
    State(db): State<Db>,
    _user: AuthUser,
) -> Result<Json<RegionsResponse>, ApiErr> {
    let conn = db.conn();
    let regions = sq_query_map(&conn, db::practices::regions(), |row| row.get(0))
        .map_err(ApiErr::from_db("regions"))?;
    Ok(Json(RegionsResponse { regions }))
}

/// Split a `;`-separated `cities_served` value into distinct city names.
fn split_cities(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(';').map(str::trim).filter(|c| !c.is_empty())
}

/// Roll practices up into per-city counts, marking how many are still
/// available (not yet closed out as interested/rejected).
fn city_stats(
    practices: &[(String, Option<String>)],
    unavailable: &HashSet<String>,
) -> Vec<CityCount> {
    let mut stats: BTreeMap<String, (i64, i64)> = BTreeMap::new();

    for (id, cities_served) in practices {
        let Some(raw) = cities_served else { continue };
        let available = !unavailable.contains(id);
        let cities: HashSet<&str> = split_cities(raw).collect();
        for city in cities {
            let entry = stats.entry(city.to_string()).or_default();
            entry.0 += 1;
            if available {
                entry.1 += 1;
            }
        }
    }

    stats
        .into_iter()
        .map(|(name, (count, available))| CityCount {
            name,
            count,
            available,
        })
        .collect()
}

/// GET /api/practices/locations — region counts, or per-city counts with
/// availability when `region` is given.
pub async fn locations(
    State(db): State<Db>,
    _user: AuthUser,
    Query(q): Query<LocationsQuery>,
) -> Result<Response, ApiErr> {
    let conn = db.conn();

    let Some(region) = q.region else {
        let regions: Vec<RegionCount> = sq_query_map(&conn, db::practices::region_counts(), |row| {
            Ok(RegionCount {
                region: row.get(0)?,
                practice_count: row.get(1)?,
                city_count: row.get(2)?,
            })
        })
        .map_err(ApiErr::from_db("region counts"))?;
        return Ok(Json(serde_json::json!({ "regions": regions })).into_response());
    };

    let practices: Vec<(String, Option<String>)> =
        sq_query_map(&conn, db::practices::cities_in_region(&region), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .map_err(ApiErr::from_db("cities in region"))?;

    let unavailable: HashSet<String> =
        sq_query_map(&conn, db::calls::unavailable_practices(), |row| row.get(0))
            .map_err(ApiErr::from_db("unavailable practices"))?
            .into_iter()
            .collect();

    let cities = city_stats(&practices, &unavailable);
    Ok(Json(serde_json::json!({ "cities": cities })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, cities: Option<&str>) -> (String, Option<String>) {
        (id.to_string(), cities.map(String::from))
    }

    #[test]
    fn city_stats_counts_distinct_cities_per_practice() {
        let practices = vec![
            row("p1", Some("Sofia; Pernik")),
            row("p2", Some("Sofia;Sofia ; ")),
            row("p3", None),
        ];
        let unavailable = HashSet::from(["p2".to_string()]);

        let stats = city_stats(&practices, &unavailable);
        assert_eq!(
            stats,
            vec![
                CityCount {
                    name: "Pernik".into(),
                    count: 1,
                    available: 1
                },
                CityCount {
                    name: "Sofia".into(),
                    count: 2,
                    available: 1
                },
            ]
        );
    }

    #[test]
    fn city_stats_empty_input() {
        assert!(city_stats(&[], &HashSet::new()).is_empty());
    }
}
