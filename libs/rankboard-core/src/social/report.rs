//! Report guard: one report per (reporter, target type, target id).

use chrono::{DateTime, Utc};

use super::rate_limit::ActionKind;
use super::SocialGuard;
use crate::error::{CoreError, Result};
use crate::store::{Collection, DocumentStore, DocumentStoreExt, Query};
use crate::types::{new_id, Report, ReportReason, ReportStatus, ReportTarget};

fn report_query(reporter_id: &str, target_type: ReportTarget, target_id: &str) -> Query {
    Query::new()
        .eq("reporterId", reporter_id)
        .eq("targetType", target_type.as_str())
        .eq("targetId", target_id)
}

impl<S: DocumentStore + ?Sized> SocialGuard<S> {
    /// File a report. The reason does not participate in duplicate detection.
    pub async fn create_report(
        &self,
        reporter_id: &str,
        target_type: ReportTarget,
        target_id: &str,
        reason: ReportReason,
        details: &str,
    ) -> Result<Report> {
        self.create_report_at(reporter_id, target_type, target_id, reason, details, Utc::now())
            .await
    }

    pub async fn create_report_at(
        &self,
        reporter_id: &str,
        target_type: ReportTarget,
        target_id: &str,
        reason: ReportReason,
        details: &str,
        now: DateTime<Utc>,
    ) -> Result<Report> {
        if reporter_id.trim().is_empty() {
            return Err(CoreError::NotSignedIn);
        }
        if target_id.trim().is_empty() {
            return Err(CoreError::Validation("missing report target".to_string()));
        }
        if target_type == ReportTarget::User && target_id == reporter_id {
            return Err(CoreError::Validation("cannot report yourself".to_string()));
        }
        if self.has_user_reported(reporter_id, target_type, target_id).await? {
            return Err(CoreError::AlreadyExists("already reported".to_string()));
        }
        if reason == ReportReason::Other && details.trim().is_empty() {
            return Err(CoreError::Validation(
                "details are required when the reason is 'other'".to_string(),
            ));
        }

        self.enforce(reporter_id, ActionKind::Reports, now).await?;

        let report = Report {
            id: new_id(),
            reporter_id: reporter_id.to_string(),
            target_type,
            target_id: target_id.to_string(),
            reason,
            details: details.trim().to_string(),
            status: ReportStatus::Pending,
            created_at: now,
        };
        self.store
            .put_doc(Collection::Reports, &report.id, &report)
            .await?;

        tracing::info!(
            report = %report.id,
            target_type = target_type.as_str(),
            target = target_id,
            "report filed"
        );
        Ok(report)
    }

    pub async fn has_user_reported(
        &self,
        reporter_id: &str,
        target_type: ReportTarget,
        target_id: &str,
    ) -> Result<bool> {
        let query = report_query(reporter_id, target_type, target_id);
        Ok(self.store.count(Collection::Reports, &query).await? > 0)
    }
}
