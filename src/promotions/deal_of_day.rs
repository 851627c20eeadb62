//! 今日特惠：商家付费申请与前台展示的挑选逻辑

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::{ensure_accepts_receipt, ensure_pending, ensure_receipt, owned_offer, PromotionStats, ReceiptInput};
use crate::config_manager::{DealMode, DealOfDaySettings};
use crate::entity::{deal_of_day_request, offer, DealOfDayRequest, Offer, OfferStatus, PromotionStatus};
use crate::error::{AppError, AppResult};

/// 自动模式最多展示的优惠数
pub const AUTO_DEALS_LIMIT: usize = 5;

/// 待展示的一条今日特惠，付费申请带 request_id 用于统计点击
#[derive(Debug, Clone)]
pub struct DealPick {
    pub request_id: Option<i64>,
    pub offer: offer::Model,
}

#[derive(Debug, Clone)]
pub struct DealSelection {
    pub mode: DealMode,
    pub deals: Vec<DealPick>,
    pub message: Option<&'static str>,
}

/// 挑选今日特惠：有正在生效的付费申请时只展示付费的，否则在自动模式下按折扣挑选
pub async fn select_deals(
    db: &DatabaseConnection,
    settings: &DealOfDaySettings,
    city_id: Option<i64>,
    now: NaiveDateTime,
) -> AppResult<DealSelection> {
    if !settings.is_active {
        return Ok(DealSelection {
            mode: settings.mode,
            deals: Vec::new(),
            message: Some("صفقة اليوم غير مفعلة حالياً"),
        });
    }

    let running = DealOfDayRequest::find()
        .filter(deal_of_day_request::Column::Status.eq(PromotionStatus::Active))
        .filter(deal_of_day_request::Column::StartDate.lte(now))
        .filter(deal_of_day_request::Column::EndDate.gte(now))
        .order_by_desc(deal_of_day_request::Column::CreatedAt)
        .order_by_desc(deal_of_day_request::Column::Id)
        .find_also_related(Offer)
        .all(db)
        .await?;

    let paid: Vec<DealPick> = running
        .into_iter()
        .filter_map(|(request, offer)| offer.map(|offer| (request, offer)))
        .filter(|(_, offer)| city_id.map_or(true, |city_id| offer.city_id == Some(city_id)))
        .map(|(request, offer)| DealPick {
            request_id: Some(request.id),
            offer,
        })
        .collect();

    if !paid.is_empty() || settings.mode == DealMode::Paid {
        return Ok(DealSelection {
            mode: settings.mode,
            deals: paid,
            message: None,
        });
    }

    let mut query = Offer::find().filter(offer::Column::Status.eq(OfferStatus::Accepted)).filter(
        Condition::any()
            .add(offer::Column::EndAt.is_null())
            .add(offer::Column::EndAt.gte(now)),
    );
    if let Some(city_id) = city_id {
        query = query.filter(offer::Column::CityId.eq(city_id));
    }

    let mut candidates: Vec<offer::Model> = query
        .all(db)
        .await?
        .into_iter()
        .filter(|o| o.saving_percentage() >= settings.min_discount)
        .collect();
    candidates.sort_by(|a, b| {
        b.saving_percentage()
            .cmp(&a.saving_percentage())
            .then(b.id.cmp(&a.id))
    });
    candidates.truncate(AUTO_DEALS_LIMIT);

    Ok(DealSelection {
        mode: settings.mode,
        deals: candidates
            .into_iter()
            .map(|offer| DealPick { request_id: None, offer })
            .collect(),
        message: None,
    })
}

/// 点击计数，只统计生效中的申请
pub async fn record_click(db: &DatabaseConnection, request_id: i64) -> AppResult<()> {
    let request = DealOfDayRequest::find_by_id(request_id)
        .filter(deal_of_day_request::Column::Status.eq(PromotionStatus::Active))
        .one(db)
        .await?;

    if let Some(request) = request {
        let clicks = request.clicks_count + 1;
        let mut active: deal_of_day_request::ActiveModel = request.into();
        active.clicks_count = Set(clicks);
        active.update(db).await?;
    }
    Ok(())
}

/// 展示次数计数
pub async fn record_impressions(db: &DatabaseConnection, request_ids: &[i64]) -> AppResult<()> {
    for request in DealOfDayRequest::find()
        .filter(deal_of_day_request::Column::Id.is_in(request_ids.to_vec()))
        .all(db)
        .await?
    {
        let views = request.views_count + 1;
        let mut active: deal_of_day_request::ActiveModel = request.into();
        active.views_count = Set(views);
        active.update(db).await?;
    }
    Ok(())
}

/// 总价 = 每日价格 × 天数
pub fn total_price(price_per_day: f64, duration_days: i32) -> f64 {
    price_per_day * duration_days as f64
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDealRequest {
    pub offer_id: i64,
    pub duration_days: i32,
}

pub async fn create(
    db: &DatabaseConnection,
    merchant_id: i64,
    settings: &DealOfDaySettings,
    input: CreateDealRequest,
) -> AppResult<deal_of_day_request::Model> {
    if !(1..=settings.max_days_per_merchant).contains(&input.duration_days) {
        return Err(AppError::bad_request(format!(
            "عدد الأيام يجب أن يكون بين 1 و {}",
            settings.max_days_per_merchant
        )));
    }

    owned_offer(db, merchant_id, input.offer_id).await?;

    let open = DealOfDayRequest::find()
        .filter(deal_of_day_request::Column::OfferId.eq(input.offer_id))
        .all(db)
        .await?
        .into_iter()
        .any(|r| r.status.is_open());
    if open {
        return Err(AppError::bad_request("يوجد طلب قائم لهذا العرض بالفعل"));
    }

    let now = Utc::now().naive_utc();
    Ok(deal_of_day_request::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant_id),
        offer_id: Set(input.offer_id),
        duration_days: Set(input.duration_days),
        price_per_day: Set(settings.price_per_day),
        total_price: Set(total_price(settings.price_per_day, input.duration_days)),
        status: Set(PromotionStatus::Draft),
        receipt: Set(None),
        payment_method: Set(None),
        transaction_number: Set(None),
        start_date: Set(None),
        end_date: Set(None),
        views_count: Set(0),
        clicks_count: Set(0),
        admin_notes: Set(None),
        rejection_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct DealRequestView {
    #[serde(flatten)]
    pub request: deal_of_day_request::Model,
    pub status_label: &'static str,
    pub offer_title: Option<String>,
}

pub async fn build_views(
    db: &DatabaseConnection,
    requests: Vec<deal_of_day_request::Model>,
) -> AppResult<Vec<DealRequestView>> {
    let offer_ids: Vec<i64> = requests.iter().map(|r| r.offer_id).collect();
    let titles: HashMap<i64, String> = Offer::find()
        .filter(offer::Column::Id.is_in(offer_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|o| (o.id, o.title))
        .collect();

    Ok(requests
        .into_iter()
        .map(|request| DealRequestView {
            status_label: request.status.label(),
            offer_title: titles.get(&request.offer_id).cloned(),
            request,
        })
        .collect())
}

pub async fn list_for_merchant(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> AppResult<Vec<deal_of_day_request::Model>> {
    Ok(DealOfDayRequest::find()
        .filter(deal_of_day_request::Column::MerchantId.eq(merchant_id))
        .order_by_desc(deal_of_day_request::Column::CreatedAt)
        .order_by_desc(deal_of_day_request::Column::Id)
        .all(db)
        .await?)
}

pub async fn find_owned(
    db: &DatabaseConnection,
    merchant_id: i64,
    request_id: i64,
) -> AppResult<deal_of_day_request::Model> {
    DealOfDayRequest::find_by_id(request_id)
        .filter(deal_of_day_request::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

pub async fn upload_receipt(
    db: &DatabaseConnection,
    merchant_id: i64,
    request_id: i64,
    input: ReceiptInput,
) -> AppResult<deal_of_day_request::Model> {
    let request = find_owned(db, merchant_id, request_id).await?;
    ensure_accepts_receipt(request.status)?;
    ensure_receipt(&input)?;

    let mut active: deal_of_day_request::ActiveModel = request.into();
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

pub async fn stats(db: &DatabaseConnection, merchant_id: i64) -> AppResult<PromotionStats> {
    let mut stats = PromotionStats::default();
    for request in list_for_merchant(db, merchant_id).await? {
        stats.count(request.status, request.views_count, request.clicks_count);
    }
    Ok(stats)
}

pub async fn list_by_status(
    db: &DatabaseConnection,
    status: Option<PromotionStatus>,
) -> AppResult<Vec<deal_of_day_request::Model>> {
    let mut query = DealOfDayRequest::find();
    if let Some(status) = status {
        query = query.filter(deal_of_day_request::Column::Status.eq(status));
    }
    Ok(query
        .order_by_desc(deal_of_day_request::Column::CreatedAt)
        .all(db)
        .await?)
}

async fn find_request(db: &DatabaseConnection, request_id: i64) -> AppResult<deal_of_day_request::Model> {
    DealOfDayRequest::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))
}

async fn set_offer_deal(db: &DatabaseConnection, offer_id: i64, until: Option<NaiveDateTime>) -> AppResult<()> {
    if let Some(offer) = Offer::find_by_id(offer_id).one(db).await? {
        let mut active: offer::ActiveModel = offer.into();
        active.is_deal_of_day = Set(until.is_some());
        active.deal_of_day_until = Set(until);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(db).await?;
    }
    Ok(())
}

pub async fn activate(
    db: &DatabaseConnection,
    request_id: i64,
    admin_notes: Option<String>,
    now: NaiveDateTime,
) -> AppResult<deal_of_day_request::Model> {
    let request = find_request(db, request_id).await?;
    ensure_pending(request.status)?;

    let end = now + Duration::days(request.duration_days as i64);
    let offer_id = request.offer_id;

    let mut active: deal_of_day_request::ActiveModel = request.into();
    active.status = Set(PromotionStatus::Active);
    active.start_date = Set(Some(now));
    active.end_date = Set(Some(end));
    active.reviewed_at = Set(Some(now));
    if admin_notes.is_some() {
        active.admin_notes = Set(admin_notes);
    }
    active.updated_at = Set(now);
    let request = active.update(db).await?;

    set_offer_deal(db, offer_id, Some(end)).await?;
    info!("✅ 今日特惠已激活: request {} offer {} 至 {}", request.id, offer_id, end);
    Ok(request)
}

pub async fn reject(
    db: &DatabaseConnection,
    request_id: i64,
    reason: String,
) -> AppResult<deal_of_day_request::Model> {
    let request = find_request(db, request_id).await?;
    ensure_pending(request.status)?;

    let now = Utc::now().naive_utc();
    let offer_id = request.offer_id;
    let mut active: deal_of_day_request::ActiveModel = request.into();
    active.status = Set(PromotionStatus::Rejected);
    active.rejection_reason = Set(Some(reason));
    active.reviewed_at = Set(Some(now));
    active.updated_at = Set(now);
    let request = active.update(db).await?;

    set_offer_deal(db, offer_id, None).await?;
    Ok(request)
}

pub async fn find_expired(
    db: &DatabaseConnection,
    now: NaiveDateTime,
) -> AppResult<Vec<deal_of_day_request::Model>> {
    Ok(DealOfDayRequest::find()
        .filter(deal_of_day_request::Column::Status.eq(PromotionStatus::Active))
        .filter(deal_of_day_request::Column::EndDate.lt(now))
        .all(db)
        .await?)
}

pub async fn expire(db: &DatabaseConnection, request: deal_of_day_request::Model) -> AppResult<()> {
    let offer_id = request.offer_id;
    let mut active: deal_of_day_request::ActiveModel = request.into();
    active.status = Set(PromotionStatus::Expired);
    active.updated_at = Set(Utc::now().naive_utc());
    active.update(db).await?;

    set_offer_deal(db, offer_id, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn settings(mode: DealMode) -> DealOfDaySettings {
        DealOfDaySettings {
            is_active: true,
            mode,
            min_discount: 25,
            price_per_day: 1000.0,
            max_days_per_merchant: 7,
        }
    }

    fn receipt() -> ReceiptInput {
        ReceiptInput {
            receipt: "receipts/d.pdf".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_total_price() {
        assert_eq!(total_price(1000.0, 3), 3000.0);
        assert_eq!(total_price(750.5, 2), 1501.0);
    }

    #[tokio::test]
    async fn test_auto_selection_by_saving() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let merchant_id = fixture.merchant.id;
        let city = Some(fixture.city.id);

        // 10%、25%、50%、50%、60%、80%、90% 折扣
        let mut ids = Vec::new();
        for after in [90.0, 75.0, 50.0, 50.0, 40.0, 20.0, 10.0] {
            ids.push(create_offer(&db, merchant_id, city, 100.0, after).await.id);
        }

        let now = Utc::now().naive_utc();
        let selection = select_deals(&db, &settings(DealMode::Auto), None, now).await.unwrap();
        let picked: Vec<i64> = selection.deals.iter().map(|d| d.offer.id).collect();

        // 同折扣时 id 大的在前；10% 的低于门槛
        assert_eq!(picked, vec![ids[6], ids[5], ids[4], ids[3], ids[2]]);
        assert!(selection.deals.iter().all(|d| d.request_id.is_none()));

        let paid_only = select_deals(&db, &settings(DealMode::Paid), None, now).await.unwrap();
        assert!(paid_only.deals.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_settings_return_message() {
        let db = setup_db().await;
        let mut inactive = settings(DealMode::Auto);
        inactive.is_active = false;

        let selection = select_deals(&db, &inactive, None, Utc::now().naive_utc()).await.unwrap();
        assert!(selection.deals.is_empty());
        assert!(selection.message.is_some());
    }

    #[tokio::test]
    async fn test_paid_requests_come_first() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let merchant_id = fixture.merchant.id;
        let modest = create_offer(&db, merchant_id, Some(fixture.city.id), 100.0, 95.0).await;
        create_offer(&db, merchant_id, Some(fixture.city.id), 100.0, 10.0).await;

        let input = CreateDealRequest {
            offer_id: modest.id,
            duration_days: 3,
        };
        let request = create(&db, merchant_id, &settings(DealMode::Auto), input).await.unwrap();
        assert_eq!(request.total_price, 3000.0);

        let again = CreateDealRequest {
            offer_id: modest.id,
            duration_days: 1,
        };
        assert!(matches!(
            create(&db, merchant_id, &settings(DealMode::Auto), again).await,
            Err(AppError::BadRequest(_))
        ));

        upload_receipt(&db, merchant_id, request.id, receipt()).await.unwrap();
        let now = Utc::now().naive_utc();
        activate(&db, request.id, None, now).await.unwrap();

        let offer = Offer::find_by_id(modest.id).one(&db).await.unwrap().unwrap();
        assert!(offer.is_deal_of_day);

        let selection = select_deals(&db, &settings(DealMode::Auto), None, now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(selection.deals.len(), 1);
        assert_eq!(selection.deals[0].offer.id, modest.id);
        assert_eq!(selection.deals[0].request_id, Some(request.id));

        // 其他城市看不到该付费申请，退回自动模式
        let other_city = create_city(&db, fixture.city.governorate_id, "ذمار", None).await;
        let elsewhere = select_deals(&db, &settings(DealMode::Auto), Some(other_city.id), now)
            .await
            .unwrap();
        assert!(elsewhere.deals.is_empty());

        record_click(&db, request.id).await.unwrap();
        record_click(&db, request.id).await.unwrap();
        let stats = stats(&db, merchant_id).await.unwrap();
        assert_eq!(stats.total_clicks, 2);
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.total_favorites, None);

        let expired = find_expired(&db, now + Duration::days(4)).await.unwrap();
        assert_eq!(expired.len(), 1);
        expire(&db, expired.into_iter().next().unwrap()).await.unwrap();
        let offer = Offer::find_by_id(modest.id).one(&db).await.unwrap().unwrap();
        assert!(!offer.is_deal_of_day);
        assert_eq!(offer.deal_of_day_until, None);
    }

    #[tokio::test]
    async fn test_duration_limits_and_rejection() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, None, 100.0, 50.0).await;

        for days in [0, 8] {
            let input = CreateDealRequest {
                offer_id: offer.id,
                duration_days: days,
            };
            assert!(matches!(
                create(&db, fixture.merchant.id, &settings(DealMode::Paid), input).await,
                Err(AppError::BadRequest(_))
            ));
        }

        let input = CreateDealRequest {
            offer_id: offer.id,
            duration_days: 2,
        };
        let request = create(&db, fixture.merchant.id, &settings(DealMode::Paid), input).await.unwrap();
        upload_receipt(&db, fixture.merchant.id, request.id, receipt()).await.unwrap();
        let rejected = reject(&db, request.id, "مبلغ ناقص".into()).await.unwrap();
        assert_eq!(rejected.status, PromotionStatus::Rejected);

        // 被拒后可以为同一优惠再次申请
        let input = CreateDealRequest {
            offer_id: offer.id,
            duration_days: 1,
        };
        assert!(create(&db, fixture.merchant.id, &settings(DealMode::Paid), input).await.is_ok());
    }
}
