use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::{ensure_accepts_receipt, ensure_pending, ensure_receipt, owned_offer, PromotionStats, ReceiptInput};
use crate::entity::{
    featured_plan, featured_request, offer, payment_account, FeaturedPlan, FeaturedRequest, Offer, PaymentAccount,
    PromotionStatus,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: featured_plan::Model,
    pub discounted_price: f64,
    pub features_list: Vec<String>,
}

pub async fn list_plans(db: &DatabaseConnection) -> AppResult<Vec<PlanView>> {
    let plans = FeaturedPlan::find()
        .filter(featured_plan::Column::IsActive.eq(true))
        .order_by_asc(featured_plan::Column::DisplayOrder)
        .order_by_asc(featured_plan::Column::Id)
        .all(db)
        .await?;

    Ok(plans
        .into_iter()
        .map(|plan| PlanView {
            discounted_price: plan.discounted_price(),
            features_list: plan.feature_list(),
            plan,
        })
        .collect())
}

pub async fn list_payment_accounts(db: &DatabaseConnection) -> AppResult<Vec<payment_account::Model>> {
    Ok(PaymentAccount::find()
        .filter(payment_account::Column::IsActive.eq(true))
        .order_by_asc(payment_account::Column::DisplayOrder)
        .order_by_asc(payment_account::Column::Id)
        .all(db)
        .await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct FeaturedRequestView {
    #[serde(flatten)]
    pub request: featured_request::Model,
    pub status_label: &'static str,
    pub offer_title: Option<String>,
    pub plan_name: Option<String>,
    pub duration_days: Option<i32>,
}

pub async fn build_views(
    db: &DatabaseConnection,
    requests: Vec<featured_request::Model>,
) -> AppResult<Vec<FeaturedRequestView>> {
    let offer_ids: Vec<i64> = requests.iter().map(|r| r.offer_id).collect();
    let plan_ids: Vec<i64> = requests.iter().map(|r| r.plan_id).collect();

    let offers: HashMap<i64, offer::Model> = Offer::find()
        .filter(offer::Column::Id.is_in(offer_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|o| (o.id, o))
        .collect();
    let plans: HashMap<i64, featured_plan::Model> = FeaturedPlan::find()
        .filter(featured_plan::Column::Id.is_in(plan_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(requests
        .into_iter()
        .map(|request| {
            let plan = plans.get(&request.plan_id);
            FeaturedRequestView {
                status_label: request.status.label(),
                offer_title: offers.get(&request.offer_id).map(|o| o.title.clone()),
                plan_name: plan.map(|p| p.name.clone()),
                duration_days: plan.map(|p| p.duration_days),
                request,
            }
        })
        .collect())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeaturedRequest {
    pub offer_id: i64,
    pub plan_id: i64,
}

/// 新建置顶申请，金额取套餐折后价
pub async fn create(
    db: &DatabaseConnection,
    merchant_id: i64,
    input: CreateFeaturedRequest,
) -> AppResult<featured_request::Model> {
    owned_offer(db, merchant_id, input.offer_id).await?;

    let plan = FeaturedPlan::find_by_id(input.plan_id)
        .filter(featured_plan::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| AppError::bad_request("الباقة غير متاحة"))?;

    let now = Utc::now().naive_utc();
    Ok(featured_request::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant_id),
        offer_id: Set(input.offer_id),
        plan_id: Set(plan.id),
        status: Set(PromotionStatus::Draft),
        amount: Set(plan.discounted_price()),
        receipt: Set(None),
        payment_method: Set(None),
        transaction_number: Set(None),
        start_date: Set(None),
        end_date: Set(None),
        views_count: Set(0),
        clicks_count: Set(0),
        favorites_count: Set(0),
        admin_notes: Set(None),
        rejection_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?)
}

pub async fn list_for_merchant(db: &DatabaseConnection, merchant_id: i64) -> AppResult<Vec<featured_request::Model>> {
    Ok(FeaturedRequest::find()
        .filter(featured_request::Column::MerchantId.eq(merchant_id))
        .order_by_desc(featured_request::Column::CreatedAt)
        .order_by_desc(featured_request::Column::Id)
        .all(db)
        .await?)
}

pub async fn find_owned(
    db: &DatabaseConnection,
    merchant_id: i64,
    request_id: i64,
) -> AppResult<featured_request::Model> {
    FeaturedRequest::find_by_id(request_id)
        .filter(featured_request::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

/// 上传凭证后进入审核
pub async fn upload_receipt(
    db: &DatabaseConnection,
    merchant_id: i64,
    request_id: i64,
    input: ReceiptInput,
) -> AppResult<featured_request::Model> {
    let request = find_owned(db, merchant_id, request_id).await?;
    ensure_accepts_receipt(request.status)?;
    ensure_receipt(&input)?;

    let mut active: featured_request::ActiveModel = request.into();
    active.receipt = Set(Some(input.receipt));
    if input.payment_method.is_some() {
        active.payment_method = Set(input.payment_method);
    }
    if input.transaction_number.is_some() {
        active.transaction_number = Set(input.transaction_number);
    }
    active.status = Set(PromotionStatus::Pending);
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

pub async fn my_active(db: &DatabaseConnection, merchant_id: i64) -> AppResult<Vec<featured_request::Model>> {
    Ok(FeaturedRequest::find()
        .filter(featured_request::Column::MerchantId.eq(merchant_id))
        .filter(featured_request::Column::Status.eq(PromotionStatus::Active))
        .order_by_desc(featured_request::Column::StartDate)
        .all(db)
        .await?)
}

pub async fn stats(db: &DatabaseConnection, merchant_id: i64) -> AppResult<PromotionStats> {
    let mut stats = PromotionStats {
        total_favorites: Some(0),
        ..Default::default()
    };
    for request in list_for_merchant(db, merchant_id).await? {
        stats.count(request.status, request.views_count, request.clicks_count);
        stats.total_favorites = stats.total_favorites.map(|f| f + request.favorites_count);
    }
    Ok(stats)
}

pub async fn list_by_status(
    db: &DatabaseConnection,
    status: Option<PromotionStatus>,
) -> AppResult<Vec<featured_request::Model>> {
    let mut query = FeaturedRequest::find();
    if let Some(status) = status {
        query = query.filter(featured_request::Column::Status.eq(status));
    }
    Ok(query.order_by_desc(featured_request::Column::CreatedAt).all(db).await?)
}

async fn find_request(db: &DatabaseConnection, request_id: i64) -> AppResult<featured_request::Model> {
    FeaturedRequest::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

async fn set_offer_featured(db: &DatabaseConnection, offer_id: i64, until: Option<NaiveDateTime>) -> AppResult<()> {
    if let Some(offer) = Offer::find_by_id(offer_id).one(db).await? {
        let mut active: offer::ActiveModel = offer.into();
        active.is_featured = Set(until.is_some());
        active.featured_until = Set(until);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(db).await?;
    }
    Ok(())
}

/// 激活：从现在起按套餐天数置顶
pub async fn activate(
    db: &DatabaseConnection,
    request_id: i64,
    admin_notes: Option<String>,
    now: NaiveDateTime,
) -> AppResult<featured_request::Model> {
    let request = find_request(db, request_id).await?;
    ensure_pending(request.status)?;

    let plan = FeaturedPlan::find_by_id(request.plan_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الباقة غير موجودة"))?;
    let end = now + Duration::days(plan.duration_days as i64);
    let offer_id = request.offer_id;

    let mut active: featured_request::ActiveModel = request.into();
    active.status = Set(PromotionStatus::Active);
    active.start_date = Set(Some(now));
    active.end_date = Set(Some(end));
    active.reviewed_at = Set(Some(now));
    if admin_notes.is_some() {
        active.admin_notes = Set(admin_notes);
    }
    active.updated_at = Set(now);
    let request = active.update(db).await?;

    set_offer_featured(db, offer_id, Some(end)).await?;
    info!("✅ 置顶广告已激活: request {} offer {} 至 {}", request.id, offer_id, end);
    Ok(request)
}

pub async fn reject(db: &DatabaseConnection, request_id: i64, reason: String) -> AppResult<featured_request::Model> {
    let request = find_request(db, request_id).await?;
    ensure_pending(request.status)?;

    let now = Utc::now().naive_utc();
    let mut active: featured_request::ActiveModel = request.into();
    active.status = Set(PromotionStatus::Rejected);
    active.rejection_reason = Set(Some(reason));
    active.reviewed_at = Set(Some(now));
    active.updated_at = Set(now);
    Ok(active.update(db).await?)
}

/// 已到期但仍为 active 的申请
pub async fn find_expired(db: &DatabaseConnection, now: NaiveDateTime) -> AppResult<Vec<featured_request::Model>> {
    Ok(FeaturedRequest::find()
        .filter(featured_request::Column::Status.eq(PromotionStatus::Active))
        .filter(featured_request::Column::EndDate.lt(now))
        .all(db)
        .await?)
}

pub async fn expire(db: &DatabaseConnection, request: featured_request::Model) -> AppResult<()> {
    let offer_id = request.offer_id;
    let mut active: featured_request::ActiveModel = request.into();
    active.status = Set(PromotionStatus::Expired);
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(db).await?;

    set_offer_featured(db, offer_id, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserType;
    use crate::test_support::*;

    fn receipt() -> ReceiptInput {
        ReceiptInput {
            receipt: "receipts/r.jpg".into(),
            payment_method: Some("الكريمي".into()),
            transaction_number: Some("TX-1".into()),
        }
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 50.0).await;
        let plan = create_featured_plan(&db, 7, 5000.0).await;

        let input = CreateFeaturedRequest {
            offer_id: offer.id,
            plan_id: plan.id,
        };
        let request = create(&db, fixture.merchant.id, input).await.unwrap();
        assert_eq!(request.status, PromotionStatus::Draft);
        assert_eq!(request.amount, 5000.0);

        // draft 不能直接激活
        let now = Utc::now().naive_utc();
        assert!(matches!(
            activate(&db, request.id, None, now).await,
            Err(AppError::BadRequest(_))
        ));

        let request = upload_receipt(&db, fixture.merchant.id, request.id, receipt()).await.unwrap();
        assert_eq!(request.status, PromotionStatus::Pending);
        assert_eq!(request.transaction_number.as_deref(), Some("TX-1"));

        // 审核中不能再上传
        assert!(matches!(
            upload_receipt(&db, fixture.merchant.id, request.id, receipt()).await,
            Err(AppError::BadRequest(_))
        ));

        let request = activate(&db, request.id, Some("ok".into()), now).await.unwrap();
        assert_eq!(request.status, PromotionStatus::Active);
        assert_eq!(request.end_date, Some(now + Duration::days(7)));

        let offer = Offer::find_by_id(offer.id).one(&db).await.unwrap().unwrap();
        assert!(offer.is_featured);
        assert_eq!(offer.featured_until, Some(now + Duration::days(7)));

        assert_eq!(my_active(&db, fixture.merchant.id).await.unwrap().len(), 1);
        let stats = stats(&db, fixture.merchant.id).await.unwrap();
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.total_favorites, Some(0));

        assert!(find_expired(&db, now).await.unwrap().is_empty());
        let expired = find_expired(&db, now + Duration::days(8)).await.unwrap();
        assert_eq!(expired.len(), 1);
        expire(&db, expired.into_iter().next().unwrap()).await.unwrap();

        let offer = Offer::find_by_id(offer.id).one(&db).await.unwrap().unwrap();
        assert!(!offer.is_featured);
        assert_eq!(offer.featured_until, None);
    }

    #[tokio::test]
    async fn test_reject_then_resubmit() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, None, 100.0, 50.0).await;
        let plan = create_featured_plan(&db, 3, 1500.0).await;

        let input = CreateFeaturedRequest {
            offer_id: offer.id,
            plan_id: plan.id,
        };
        let request = create(&db, fixture.merchant.id, input).await.unwrap();
        upload_receipt(&db, fixture.merchant.id, request.id, receipt()).await.unwrap();

        let rejected = reject(&db, request.id, "الإيصال غير واضح".into()).await.unwrap();
        assert_eq!(rejected.status, PromotionStatus::Rejected);
        assert!(matches!(
            reject(&db, request.id, "x".into()).await,
            Err(AppError::BadRequest(_))
        ));

        let resubmitted = upload_receipt(&db, fixture.merchant.id, request.id, receipt()).await.unwrap();
        assert_eq!(resubmitted.status, PromotionStatus::Pending);
    }

    #[tokio::test]
    async fn test_offer_of_other_merchant_is_forbidden() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, None, 100.0, 50.0).await;
        let plan = create_featured_plan(&db, 3, 1500.0).await;

        let other_user = create_user(&db, "o@tawfir.app", UserType::Merchant).await;
        let other = create_merchant(&db, other_user.id, None, crate::entity::ApprovalStatus::Approved).await;

        let input = CreateFeaturedRequest {
            offer_id: offer.id,
            plan_id: plan.id,
        };
        assert!(matches!(
            create(&db, other.id, input).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
