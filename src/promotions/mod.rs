//! 付费推广：置顶广告与今日特惠
//!
//! 两种申请共用同一套状态流转：
//! draft --上传凭证--> pending --管理员激活--> active --到期--> expired
//!                           \--管理员拒绝--> rejected --重新上传--> pending

pub mod deal_of_day;
pub mod featured;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::entity::{offer, PromotionStatus};
use crate::error::{AppError, AppResult};
use crate::offers::find_offer;

/// 上传付款凭证时提交的信息，receipt 是已保存的文件路径
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptInput {
    pub receipt: String,
    pub payment_method: Option<String>,
    pub transaction_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromotionStats {
    pub total_requests: u64,
    pub active_count: u64,
    pub pending_count: u64,
    pub expired_count: u64,
    pub rejected_count: u64,
    pub total_views: i64,
    pub total_clicks: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_favorites: Option<i64>,
}

impl PromotionStats {
    fn count(&mut self, status: PromotionStatus, views: i64, clicks: i64) {
        self.total_requests += 1;
        match status {
            PromotionStatus::Active => self.active_count += 1,
            PromotionStatus::Pending => self.pending_count += 1,
            PromotionStatus::Expired => self.expired_count += 1,
            PromotionStatus::Rejected => self.rejected_count += 1,
            PromotionStatus::Draft => {}
        }
        self.total_views += views;
        self.total_clicks += clicks;
    }
}

/// 申请的优惠必须属于该商家
async fn owned_offer(db: &DatabaseConnection, merchant_id: i64, offer_id: i64) -> AppResult<offer::Model> {
    let offer = find_offer(db, offer_id).await?;
    if offer.merchant_id != merchant_id {
        return Err(AppError::forbidden("لا يمكنك إنشاء طلب لعرض لا يخصك"));
    }
    Ok(offer)
}

pub(crate) fn ensure_accepts_receipt(status: PromotionStatus) -> AppResult<()> {
    if !status.accepts_receipt() {
        return Err(AppError::bad_request("لا يمكن رفع إيصال لهذا الطلب"));
    }
    Ok(())
}

fn ensure_receipt(input: &ReceiptInput) -> AppResult<()> {
    if input.receipt.trim().is_empty() {
        return Err(AppError::bad_request("الرجاء رفع ملف الإيصال"));
    }
    Ok(())
}

/// 管理员激活或拒绝前，申请必须在审核中
fn ensure_pending(status: PromotionStatus) -> AppResult<()> {
    if status != PromotionStatus::Pending {
        return Err(AppError::bad_request(format!(
            "لا يمكن تنفيذ هذا الإجراء على طلب حالته: {}",
            status.label()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let mut stats = PromotionStats::default();
        stats.count(PromotionStatus::Active, 10, 2);
        stats.count(PromotionStatus::Draft, 0, 0);
        stats.count(PromotionStatus::Expired, 5, 1);

        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_views, 15);
        assert_eq!(stats.total_clicks, 3);
    }

    #[test]
    fn test_transition_guards() {
        assert!(ensure_pending(PromotionStatus::Pending).is_ok());
        assert!(matches!(ensure_pending(PromotionStatus::Draft), Err(AppError::BadRequest(_))));
        assert!(ensure_accepts_receipt(PromotionStatus::Rejected).is_ok());
        assert!(ensure_accepts_receipt(PromotionStatus::Active).is_err());
        assert!(ensure_receipt(&ReceiptInput::default()).is_err());
    }
}
