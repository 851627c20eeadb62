//! 到期推广的清理：置顶广告与今日特惠

use chrono::{NaiveDateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use crate::error::AppResult;
use crate::promotions::{deal_of_day, featured};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    pub featured_expired: Vec<i64>,
    pub deals_expired: Vec<i64>,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.featured_expired.len() + self.deals_expired.len()
    }
}

/// 将已过期的 active 申请置为 expired，并清除优惠上的推广标记
///
/// dry_run 只统计不修改。
pub async fn sweep(db: &DatabaseConnection, now: NaiveDateTime, dry_run: bool) -> AppResult<SweepReport> {
    let featured = featured::find_expired(db, now).await?;
    let deals = deal_of_day::find_expired(db, now).await?;

    let report = SweepReport {
        dry_run,
        featured_expired: featured.iter().map(|r| r.id).collect(),
        deals_expired: deals.iter().map(|r| r.id).collect(),
    };
    if dry_run {
        return Ok(report);
    }

    for request in featured {
        featured::expire(db, request).await?;
    }
    for request in deals {
        deal_of_day::expire(db, request).await?;
    }

    if report.total() > 0 {
        info!(
            "⏰ 已过期推广: 置顶 {} 个, 今日特惠 {} 个",
            report.featured_expired.len(),
            report.deals_expired.len()
        );
    }
    Ok(report)
}

/// 后台定时清理任务
pub fn spawn_sweeper(db: DatabaseConnection, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = sweep(&db, Utc::now().naive_utc(), false).await {
                error!("推广到期清理失败: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Offer, PromotionStatus};
    use crate::promotions::featured::CreateFeaturedRequest;
    use crate::promotions::ReceiptInput;
    use crate::test_support::*;
    use chrono::Duration as ChronoDuration;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_dry_run_then_sweep() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, None, 100.0, 50.0).await;
        let plan = create_featured_plan(&db, 1, 500.0).await;

        let input = CreateFeaturedRequest {
            offer_id: offer.id,
            plan_id: plan.id,
        };
        let request = featured::create(&db, fixture.merchant.id, input).await.unwrap();
        let receipt = ReceiptInput {
            receipt: "receipts/x.jpg".into(),
            ..Default::default()
        };
        featured::upload_receipt(&db, fixture.merchant.id, request.id, receipt).await.unwrap();
        let start = Utc::now().naive_utc() - ChronoDuration::days(3);
        featured::activate(&db, request.id, None, start).await.unwrap();

        let now = Utc::now().naive_utc();
        let preview = sweep(&db, now, true).await.unwrap();
        assert!(preview.dry_run);
        assert_eq!(preview.featured_expired, vec![request.id]);

        // dry run 不修改数据
        let still_active = featured::find_owned(&db, fixture.merchant.id, request.id).await.unwrap();
        assert_eq!(still_active.status, PromotionStatus::Active);

        let report = sweep(&db, now, false).await.unwrap();
        assert_eq!(report.total(), 1);

        let expired = featured::find_owned(&db, fixture.merchant.id, request.id).await.unwrap();
        assert_eq!(expired.status, PromotionStatus::Expired);
        let offer = Offer::find_by_id(offer.id).one(&db).await.unwrap().unwrap();
        assert!(!offer.is_featured);

        assert_eq!(sweep(&db, now, false).await.unwrap().total(), 0);
    }
}
