/// Dashboard statistics
///
/// Everything is recomputed from `issues` on each request. Date buckets are
/// relative to a caller-supplied `today` (UTC by default):
///
/// | bucket    | due date               | issue state |
/// |-----------|------------------------|-------------|
/// | due today | `= today`              | any         |
/// | due soon  | `today+1 ..= today+7`  | open        |
/// | overdue   | `< today`              | open        |

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::issue::{IssuePriority, IssueStatus};

/// Days after today covered by "due soon"
pub const DUE_SOON_DAYS: i64 = 7;

/// Longest due list returned per bucket
pub const DUE_LIST_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    Team(Uuid),
    Project(Uuid),
}

impl StatsScope {
    fn filter(&self) -> (&'static str, Uuid) {
        match self {
            StatsScope::Team(id) => ("p.team_id = $1", *id),
            StatsScope::Project(id) => ("i.project_id = $1", *id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBucket {
    DueToday,
    DueSoon,
    Overdue,
}

impl DueBucket {
    /// Which bucket an issue falls in, if any
    pub fn classify(due: NaiveDate, today: NaiveDate, status: IssueStatus) -> Option<Self> {
        if due == today {
            return Some(DueBucket::DueToday);
        }
        if !status.is_open() {
            return None;
        }
        if due < today {
            Some(DueBucket::Overdue)
        } else if due <= today + Duration::days(DUE_SOON_DAYS) {
            Some(DueBucket::DueSoon)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: IssueStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriorityCount {
    pub priority: IssuePriority,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DueIssue {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_key: String,
    pub number: i32,
    pub title: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub assignee_id: Option<Uuid>,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Default, sqlx::FromRow)]
struct Totals {
    total: i64,
    open: i64,
    assigned_to_me: i64,
}

/// Due-date figures gathered by [`DueBucket::classify`]
#[derive(Debug, Clone, Default)]
pub struct DueSummary {
    pub due_today: i64,
    pub due_soon: i64,
    pub overdue: i64,
    pub due_today_issues: Vec<DueIssue>,
    pub due_soon_issues: Vec<DueIssue>,
}

impl DueSummary {
    /// Buckets issues, keeping their order in the lists (each capped at
    /// [`DUE_LIST_LIMIT`])
    pub fn collect(issues: Vec<DueIssue>, today: NaiveDate) -> Self {
        let mut summary = DueSummary::default();
        let cap = DUE_LIST_LIMIT as usize;

        for issue in issues {
            match DueBucket::classify(issue.due_date, today, issue.status) {
                Some(DueBucket::DueToday) => {
                    summary.due_today += 1;
                    if summary.due_today_issues.len() < cap {
                        summary.due_today_issues.push(issue);
                    }
                }
                Some(DueBucket::DueSoon) => {
                    summary.due_soon += 1;
                    if summary.due_soon_issues.len() < cap {
                        summary.due_soon_issues.push(issue);
                    }
                }
                Some(DueBucket::Overdue) => summary.overdue += 1,
                None => {}
            }
        }

        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub today: NaiveDate,
    pub total: i64,
    pub open: i64,
    pub assigned_to_me: i64,
    pub due_today: i64,
    pub due_soon: i64,
    pub overdue: i64,
    pub by_status: Vec<StatusCount>,
    pub by_priority: Vec<PriorityCount>,
    pub due_today_issues: Vec<DueIssue>,
    pub due_soon_issues: Vec<DueIssue>,
}

/// Expands sparse GROUP BY rows to one entry per status, in board order
pub fn fill_status_counts(rows: &[StatusCount]) -> Vec<StatusCount> {
    IssueStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: rows
                .iter()
                .find(|r| r.status == *status)
                .map_or(0, |r| r.count),
        })
        .collect()
}

pub fn fill_priority_counts(rows: &[PriorityCount]) -> Vec<PriorityCount> {
    IssuePriority::ALL
        .iter()
        .map(|priority| PriorityCount {
            priority: *priority,
            count: rows
                .iter()
                .find(|r| r.priority == *priority)
                .map_or(0, |r| r.count),
        })
        .collect()
}

const LIVE_ISSUES: &str = "FROM issues i \
     JOIN projects p ON p.id = i.project_id \
     WHERE i.deleted_at IS NULL AND p.deleted_at IS NULL";

/// Builds the dashboard for a team or a single project
pub async fn dashboard(
    pool: &PgPool,
    scope: StatsScope,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<Dashboard, sqlx::Error> {
    let (filter, scope_id) = scope.filter();
    let soon_end = today + Duration::days(DUE_SOON_DAYS);

    let totals = sqlx::query_as::<_, Totals>(&format!(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE i.status NOT IN ('done', 'cancelled')) AS open,
               COUNT(*) FILTER (WHERE i.status NOT IN ('done', 'cancelled') AND i.assignee_id = $2) AS assigned_to_me
        {LIVE_ISSUES} AND {filter}
        "#
    ))
    .bind(scope_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let by_status = sqlx::query_as::<_, StatusCount>(&format!(
        "SELECT i.status, COUNT(*) AS count {LIVE_ISSUES} AND {filter} GROUP BY i.status"
    ))
    .bind(scope_id)
    .fetch_all(pool)
    .await?;

    let by_priority = sqlx::query_as::<_, PriorityCount>(&format!(
        "SELECT i.priority, COUNT(*) AS count {LIVE_ISSUES} AND {filter} GROUP BY i.priority"
    ))
    .bind(scope_id)
    .fetch_all(pool)
    .await?;

    // Everything due up to the end of the due-soon window; bucketing happens
    // in DueSummary::collect
    let due_candidates = sqlx::query_as::<_, DueIssue>(&format!(
        r#"
        SELECT i.id, i.project_id, p.key AS project_key, i.number, i.title, i.status,
               i.priority, i.assignee_id, i.due_date
        {LIVE_ISSUES} AND {filter} AND i.due_date IS NOT NULL AND i.due_date <= $2
        ORDER BY i.due_date ASC, i.priority DESC, i.number ASC
        "#
    ))
    .bind(scope_id)
    .bind(soon_end)
    .fetch_all(pool)
    .await?;

    let due = DueSummary::collect(due_candidates, today);

    tracing::debug!(scope = ?scope, total = totals.total, "Dashboard computed");

    Ok(Dashboard {
        today,
        total: totals.total,
        open: totals.open,
        assigned_to_me: totals.assigned_to_me,
        due_today: due.due_today,
        due_soon: due.due_soon,
        overdue: due.overdue,
        by_status: fill_status_counts(&by_status),
        by_priority: fill_priority_counts(&by_priority),
        due_today_issues: due.due_today_issues,
        due_soon_issues: due.due_soon_issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_due_today_includes_closed() {
        assert_eq!(
            DueBucket::classify(day(10), day(10), IssueStatus::Done),
            Some(DueBucket::DueToday)
        );
        assert_eq!(
            DueBucket::classify(day(10), day(10), IssueStatus::Todo),
            Some(DueBucket::DueToday)
        );
    }

    #[test]
    fn test_due_soon_boundaries() {
        let today = day(10);
        assert_eq!(
            DueBucket::classify(day(11), today, IssueStatus::Todo),
            Some(DueBucket::DueSoon)
        );
        assert_eq!(
            DueBucket::classify(day(17), today, IssueStatus::InProgress),
            Some(DueBucket::DueSoon)
        );
        assert_eq!(DueBucket::classify(day(18), today, IssueStatus::Todo), None);
        assert_eq!(DueBucket::classify(day(12), today, IssueStatus::Cancelled), None);
    }

    #[test]
    fn test_overdue_boundaries() {
        let today = day(10);
        assert_eq!(
            DueBucket::classify(day(9), today, IssueStatus::Backlog),
            Some(DueBucket::Overdue)
        );
        assert_eq!(DueBucket::classify(day(1), today, IssueStatus::Done), None);
    }

    fn due_issue(due: NaiveDate, status: IssueStatus) -> DueIssue {
        DueIssue {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            project_key: "DASH".to_string(),
            number: 1,
            title: "Due".to_string(),
            status,
            priority: IssuePriority::None,
            assignee_id: None,
            due_date: due,
        }
    }

    #[test]
    fn test_due_summary_counts_and_lists() {
        let today = day(10);
        let issues = vec![
            due_issue(day(8), IssueStatus::Todo),
            due_issue(day(9), IssueStatus::Done),
            due_issue(day(10), IssueStatus::Done),
            due_issue(day(12), IssueStatus::InProgress),
            due_issue(day(13), IssueStatus::Cancelled),
            due_issue(day(17), IssueStatus::Todo),
        ];

        let summary = DueSummary::collect(issues, today);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.due_today, 1);
        assert_eq!(summary.due_soon, 2);
        assert_eq!(summary.due_today_issues.len(), 1);
        assert_eq!(summary.due_soon_issues[0].due_date, day(12));
        assert_eq!(summary.due_soon_issues[1].due_date, day(17));
    }

    #[test]
    fn test_due_lists_are_capped_but_counts_are_not() {
        let today = day(10);
        let issues = (0..25).map(|_| due_issue(today, IssueStatus::Todo)).collect();

        let summary = DueSummary::collect(issues, today);
        assert_eq!(summary.due_today, 25);
        assert_eq!(summary.due_today_issues.len(), DUE_LIST_LIMIT as usize);
    }

    #[test]
    fn test_fill_counts_covers_every_value() {
        let rows = vec![
            StatusCount {
                status: IssueStatus::Done,
                count: 4,
            },
            StatusCount {
                status: IssueStatus::Todo,
                count: 2,
            },
        ];

        let filled = fill_status_counts(&rows);
        assert_eq!(filled.len(), 6);
        assert_eq!(filled[0].status, IssueStatus::Backlog);
        assert_eq!(filled[0].count, 0);
        assert_eq!(filled[1].count, 2);
        assert_eq!(filled[4].count, 4);

        let priorities = fill_priority_counts(&[]);
        assert_eq!(priorities.len(), 5);
        assert!(priorities.iter().all(|p| p.count == 0));
    }
}
