use axum::{
    extract::{Query, State},
    Json,
};
use std::collections::BTreeMap;

use coldcall_api::{
    db, service, CampaignStatus, CampaignSummary, CampaignsResponse, DeleteCampaignQuery,
    DeletedResponse,
};

use crate::error::ApiErr;
use crate::routes::auth::AuthUser;
use crate::storage::{sq_execute, sq_query_map, Db};

/// A day's assignment totals, as read from the grouped query.
pub struct DateRow {
    pub date: String,
    pub total: i64,
    pub completed: i64,
    pub regions: Vec<String>,
}

/// Gap (in days) beyond which consecutive assignment dates belong to
/// different campaigns.
const CAMPAIGN_GAP_DAYS: i64 = 2;

fn days_between(earlier: &str, later: &str) -> i64 {
    let parse = |s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d");
    match (parse(earlier), parse(later)) {
        (Ok(a), Ok(b)) => (b - a).num_days(),
        _ => i64::MAX,
    }
}

/// Group per-day rows (oldest first) into campaigns: a gap of more than
/// [`CAMPAIGN_GAP_DAYS`] starts a new one.
pub fn group_campaigns(rows: Vec<DateRow>) -> Vec<CampaignSummary> {
    let mut campaigns: Vec<CampaignSummary> = Vec::new();

    for row in rows {
        let extend = campaigns
            .last()
            .map(|c| days_between(&c.end_date, &row.date) <= CAMPAIGN_GAP_DAYS)
            .unwrap_or(false);

        if extend {
            let current = campaigns.last_mut().expect("campaign exists");
            current.end_date = row.date.clone();
            current.total_assignments += row.total;
            current.completed_assignments += row.completed;
            current.dates.push(row.date);
            for region in row.regions {
                if !current.regions.contains(&region) {
                    current.regions.push(region);
                }
            }
        } else {
            campaigns.push(CampaignSummary {
                id: format!("campaign-{}", campaigns.len()),
                name: String::new(),
                start_date: row.date.clone(),
                end_date: row.date.clone(),
                regions: row.regions,
                status: CampaignStatus::Active,
                total_assignments: row.total,
                completed_assignments: row.completed,
                outcomes: BTreeMap::new(),
                dates: vec![row.date],
            });
        }
    }

    // Finalize names and statuses; newest campaign first.
    for campaign in &mut campaigns {
        campaign.name = if campaign.start_date == campaign.end_date {
            format!("Campaign {}", campaign.start_date)
        } else {
            format!("Campaign {} - {}", campaign.start_date, campaign.end_date)
        };
        campaign.status = if campaign.total_assignments > 0
            && campaign.completed_assignments == campaign.total_assignments
        {
            CampaignStatus::Completed
        } else {
            CampaignStatus::Active
        };
    }
    campaigns.reverse();
    campaigns
}

/// GET /api/campaigns — campaigns derived from assignment date ranges,
/// enriched with outcome counts (admin only).
pub async fn list_campaigns(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<CampaignsResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    let conn = db.conn();
    let rows: Vec<DateRow> = sq_query_map(&conn, db::assignments::campaign_dates(), |row| {
        let regions: Option<String> = row.get(3)?;
        Ok(DateRow {
            date: row.get(0)?,
            total: row.get(1)?,
            completed: row.get(2)?,
            regions: regions
                .unwrap_or_default()
                .split(',')
                .filter(|r| !r.is_empty())
                .map(String::from)
                .collect(),
        })
    })
    .map_err(ApiErr::from_db("campaign dates"))?;

    let mut campaigns = group_campaigns(rows);

    for campaign in &mut campaigns {
        let counts = sq_query_map(
            &conn,
            db::calls::outcome_counts_between(&campaign.start_date, &campaign.end_date),
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )
        .map_err(ApiErr::from_db("campaign outcomes"))?;
        campaign.outcomes = counts.into_iter().collect();
    }

    Ok(Json(CampaignsResponse { campaigns }))
}

/// DELETE /api/campaigns — delete the assignments of a date range
/// (admin only).
pub async fn delete_campaign(
    State(db): State<Db>,
    user: AuthUser,
    Query(q): Query<DeleteCampaignQuery>,
) -> Result<Json<DeletedResponse>, ApiErr> {
    if !user.is_admin() {
        return Err(ApiErr::forbidden("admin only"));
    }

    service::validate_date(&q.start_date).map_err(ApiErr::from)?;
    service::validate_date(&q.end_date).map_err(ApiErr::from)?;

    let conn = db.conn();
    let deleted = sq_execute(
        &conn,
        db::assignments::delete_filtered(
            None,
            Some((q.start_date.as_str(), q.end_date.as_str())),
            None,
        ),
    )
    .map_err(ApiErr::from_db("delete campaign"))?;

    Ok(Json(DeletedResponse {
        ok: true,
        deleted: deleted as u64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, total: i64, completed: i64, regions: &[&str]) -> DateRow {
        DateRow {
            date: date.to_string(),
            total,
            completed,
            regions: regions.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn consecutive_dates_form_one_campaign() {
        let campaigns = group_campaigns(vec![
            row("2025-04-01", 10, 10, &["Sofia"]),
            row("2025-04-02", 10, 10, &["Sofia", "Plovdiv"]),
            row("2025-04-03", 5, 5, &["Plovdiv"]),
        ]);
        assert_eq!(campaigns.len(), 1);
        let c = &campaigns[0];
        assert_eq!(c.start_date, "2025-04-01");
        assert_eq!(c.end_date, "2025-04-03");
        assert_eq!(c.total_assignments, 25);
        assert_eq!(c.status, CampaignStatus::Completed);
        assert_eq!(c.regions, vec!["Sofia".to_string(), "Plovdiv".to_string()]);
        assert_eq!(c.name, "Campaign 2025-04-01 - 2025-04-03");
    }

    #[test]
    fn gap_over_two_days_starts_a_new_campaign() {
        let campaigns = group_campaigns(vec![
            row("2025-04-01", 10, 4, &["Sofia"]),
            row("2025-04-03", 10, 4, &["Sofia"]),
            row("2025-04-06", 10, 4, &["Sofia"]),
        ]);
        // 2 days later extends; 3 days later splits. Newest first.
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0].start_date, "2025-04-06");
        assert_eq!(campaigns[1].end_date, "2025-04-03");
        assert_eq!(campaigns[1].status, CampaignStatus::Active);
        assert_eq!(campaigns[1].name, "Campaign 2025-04-01 - 2025-04-03");
    }

    #[test]
    fn single_day_campaign_name_has_no_range() {
        let campaigns = group_campaigns(vec![row("2025-04-01", 3, 0, &[])]);
        assert_eq!(campaigns[0].name, "Campaign 2025-04-01");
        assert_eq!(campaigns[0].dates, vec!["2025-04-01".to_string()]);
    }

    #[test]
    fn empty_input_yields_no_campaigns() {
        assert!(group_campaigns(Vec::new()).is_empty());
    }
}
