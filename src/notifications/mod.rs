//! 推送额度、额度购买、优惠推送与管理员群发

pub mod push;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::entity::{
    fcm_token, merchant, notification, notification_credit, notification_plan, notification_purchase,
    push_notification_log, user, FcmToken, Notification, NotificationCredit, NotificationPlan, NotificationPurchase,
    NotificationScope, NotificationType, PurchaseStatus, PushNotificationLog, User,
};
use crate::error::{AppError, AppResult};
use crate::offers::find_owned;
use crate::promotions::ReceiptInput;
use push::{PushMessage, PushReport, PushSender};

pub const HISTORY_LIMIT: u64 = 50;
const TITLE_PREFIX_CHARS: usize = 30;

// ---------- 额度 ----------

/// 取商家的推送额度，没有则创建
pub async fn credit_for(db: &DatabaseConnection, merchant_id: i64) -> AppResult<notification_credit::Model> {
    if let Some(credit) = NotificationCredit::find()
        .filter(notification_credit::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
    {
        return Ok(credit);
    }

    Ok(notification_credit::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant_id),
        city_notifications: Set(0),
        all_notifications: Set(0),
        total_sent: Set(0),
        updated_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?)
}

pub async fn add_credit(
    db: &DatabaseConnection,
    merchant_id: i64,
    scope: NotificationScope,
    count: i32,
) -> AppResult<notification_credit::Model> {
    let credit = credit_for(db, merchant_id).await?;
    let (city, all) = (credit.city_notifications, credit.all_notifications);

    let mut active: notification_credit::ActiveModel = credit.into();
    match scope {
        NotificationScope::City => active.city_notifications = Set(city + count),
        NotificationScope::All => active.all_notifications = Set(all + count),
    }
    active.updated_at = Set(Utc::now().naive_utc());
    Ok(active.update(db).await?)
}

/// 扣减一次额度，余额为 0 时返回 false。条件更新保证并发时不会扣成负数
pub async fn deduct(db: &DatabaseConnection, merchant_id: i64, scope: NotificationScope) -> AppResult<bool> {
    credit_for(db, merchant_id).await?;

    let column = match scope {
        NotificationScope::City => notification_credit::Column::CityNotifications,
        NotificationScope::All => notification_credit::Column::AllNotifications,
    };
    let result = NotificationCredit::update_many()
        .col_expr(column, Expr::col(column).sub(1))
        .col_expr(
            notification_credit::Column::TotalSent,
            Expr::col(notification_credit::Column::TotalSent).add(1),
        )
        .col_expr(notification_credit::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
        .filter(notification_credit::Column::MerchantId.eq(merchant_id))
        .filter(column.gt(0))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

// ---------- 套餐与购买 ----------

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPlanView {
    #[serde(flatten)]
    pub plan: notification_plan::Model,
    pub scope_label: &'static str,
    pub discounted_price: f64,
    pub price_per_notification: f64,
}

pub async fn list_plans(db: &DatabaseConnection) -> AppResult<Vec<NotificationPlanView>> {
    let plans = NotificationPlan::find()
        .filter(notification_plan::Column::IsActive.eq(true))
        .order_by_asc(notification_plan::Column::DisplayOrder)
        .order_by_asc(notification_plan::Column::Id)
        .all(db)
        .await?;

    Ok(plans
        .into_iter()
        .map(|plan| NotificationPlanView {
            scope_label: plan.scope.label(),
            discounted_price: plan.discounted_price(),
            price_per_notification: plan.price_per_notification(),
            plan,
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseView {
    #[serde(flatten)]
    pub purchase: notification_purchase::Model,
    pub status_label: &'static str,
    pub plan_name: Option<String>,
    pub scope: Option<NotificationScope>,
    pub notifications_count: Option<i32>,
}

pub async fn build_purchase_views(
    db: &DatabaseConnection,
    purchases: Vec<notification_purchase::Model>,
) -> AppResult<Vec<PurchaseView>> {
    let plan_ids: Vec<i64> = purchases.iter().map(|p| p.plan_id).collect();
    let plans: HashMap<i64, notification_plan::Model> = NotificationPlan::find()
        .filter(notification_plan::Column::Id.is_in(plan_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(purchases
        .into_iter()
        .map(|purchase| {
            let plan = plans.get(&purchase.plan_id);
            PurchaseView {
                status_label: purchase.status.label(),
                plan_name: plan.map(|p| p.name.clone()),
                scope: plan.map(|p| p.scope),
                notifications_count: plan.map(|p| p.notifications_count),
                purchase,
            }
        })
        .collect())
}

pub async fn create_purchase(
    db: &DatabaseConnection,
    merchant_id: i64,
    plan_id: i64,
) -> AppResult<notification_purchase::Model> {
    let plan = NotificationPlan::find_by_id(plan_id)
        .filter(notification_plan::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| AppError::bad_request("الباقة غير متاحة"))?;

    Ok(notification_purchase::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant_id),
        plan_id: Set(plan.id),
        status: Set(PurchaseStatus::Draft),
        amount: Set(plan.discounted_price()),
        receipt: Set(None),
        payment_method: Set(None),
        transaction_number: Set(None),
        admin_notes: Set(None),
        rejection_reason: Set(None),
        reviewed_at: Set(None),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?)
}

pub async fn list_purchases(
    db: &DatabaseConnection,
    merchant_id: i64,
) -> AppResult<Vec<notification_purchase::Model>> {
    Ok(NotificationPurchase::find()
        .filter(notification_purchase::Column::MerchantId.eq(merchant_id))
        .order_by_desc(notification_purchase::Column::CreatedAt)
        .order_by_desc(notification_purchase::Column::Id)
        .all(db)
        .await?)
}

pub async fn list_purchases_by_status(
    db: &DatabaseConnection,
    status: Option<PurchaseStatus>,
) -> AppResult<Vec<notification_purchase::Model>> {
    let mut query = NotificationPurchase::find();
    if let Some(status) = status {
        query = query.filter(notification_purchase::Column::Status.eq(status));
    }
    Ok(query
        .order_by_desc(notification_purchase::Column::CreatedAt)
        .all(db)
        .await?)
}

pub async fn upload_purchase_receipt(
    db: &DatabaseConnection,
    merchant_id: i64,
    purchase_id: i64,
    input: ReceiptInput,
) -> AppResult<notification_purchase::Model> {
    let purchase = NotificationPurchase::find_by_id(purchase_id)
        .filter(notification_purchase::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))?;

    if !matches!(purchase.status, PurchaseStatus::Draft | PurchaseStatus::Rejected) {
        return Err(AppError::bad_request("لا يمكن رفع إيصال لهذا الطلب"));
    }
    if input.receipt.trim().is_empty() {
        return Err(AppError::bad_request("الرجاء رفع ملف الإيصال"));
    }

    let mut active: notification_purchase::ActiveModel = purchase.into();
    active.receipt = Set(Some(input.receipt));
    if input.payment_method.is_some() {
        active.payment_method = Set(input.payment_method);
    }
    if input.transaction_number.is_some() {
        active.transaction_number = Set(input.transaction_number);
    }
    active.status = Set(PurchaseStatus::Pending);
    Ok(active.update(db).await?)
}

async fn find_pending_purchase(db: &DatabaseConnection, purchase_id: i64) -> AppResult<notification_purchase::Model> {
    let purchase = NotificationPurchase::find_by_id(purchase_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الطلب غير موجود"))?;

    if purchase.status != PurchaseStatus::Pending {
        return Err(AppError::bad_request(format!(
            "لا يمكن تنفيذ هذا الإجراء على طلب حالته: {}",
            purchase.status.label()
        )));
    }
    Ok(purchase)
}

/// 审核通过，按套餐增加对应范围的额度
pub async fn approve_purchase(
    db: &DatabaseConnection,
    purchase_id: i64,
    admin_notes: Option<String>,
) -> AppResult<notification_credit::Model> {
    let purchase = find_pending_purchase(db, purchase_id).await?;
    let plan = NotificationPlan::find_by_id(purchase.plan_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("الباقة غير موجودة"))?;
    let merchant_id = purchase.merchant_id;

    let mut active: notification_purchase::ActiveModel = purchase.into();
    active.status = Set(PurchaseStatus::Approved);
    active.reviewed_at = Set(Some(Utc::now().naive_utc()));
    if admin_notes.is_some() {
        active.admin_notes = Set(admin_notes);
    }
    active.update(db).await?;

    let credit = add_credit(db, merchant_id, plan.scope, plan.notifications_count).await?;
    info!(
        "✅ 推送额度购买已通过: merchant {} +{} ({})",
        merchant_id,
        plan.notifications_count,
        plan.scope.label()
    );
    Ok(credit)
}

pub async fn reject_purchase(
    db: &DatabaseConnection,
    purchase_id: i64,
    reason: String,
) -> AppResult<notification_purchase::Model> {
    let purchase = find_pending_purchase(db, purchase_id).await?;
    let mut active: notification_purchase::ActiveModel = purchase.into();
    active.status = Set(PurchaseStatus::Rejected);
    active.rejection_reason = Set(Some(reason));
    active.reviewed_at = Set(Some(Utc::now().naive_utc()));
    Ok(active.update(db).await?)
}

// ---------- 设备 token ----------

pub async fn register_token(
    db: &DatabaseConnection,
    user_id: i64,
    token: String,
    device_type: Option<String>,
) -> AppResult<fcm_token::Model> {
    if token.trim().is_empty() {
        return Err(AppError::bad_request("FCM Token مطلوب"));
    }

    let now = Utc::now().naive_utc();
    let existing = FcmToken::find()
        .filter(fcm_token::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    match existing {
        Some(existing) => {
            let mut active: fcm_token::ActiveModel = existing.into();
            active.token = Set(token);
            active.device_type = Set(device_type);
            active.is_active = Set(true);
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        None => Ok(fcm_token::ActiveModel {
            id: NotSet,
            user_id: Set(user_id),
            token: Set(token),
            device_type: Set(device_type),
            is_active: Set(true),
            updated_at: Set(now),
        }
        .insert(db)
        .await?),
    }
}

pub async fn deactivate_token(db: &DatabaseConnection, user_id: i64) -> AppResult<()> {
    if let Some(existing) = FcmToken::find()
        .filter(fcm_token::Column::UserId.eq(user_id))
        .one(db)
        .await?
    {
        let mut active: fcm_token::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().naive_utc());
        active.update(db).await?;
    }
    Ok(())
}

/// 有效设备 token；指定城市时只取当前浏览该城市的用户
async fn active_tokens(
    db: &DatabaseConnection,
    city_id: Option<i64>,
    user_ids: Option<&[i64]>,
) -> AppResult<Vec<String>> {
    let mut query = FcmToken::find().filter(fcm_token::Column::IsActive.eq(true));

    if let Some(city_id) = city_id {
        let ids: Vec<i64> = User::find()
            .filter(user::Column::SelectedCityId.eq(city_id))
            .select_only()
            .column(user::Column::Id)
            .into_tuple()
            .all(db)
            .await?;
        query = query.filter(fcm_token::Column::UserId.is_in(ids));
    }
    if let Some(user_ids) = user_ids {
        query = query.filter(fcm_token::Column::UserId.is_in(user_ids.to_vec()));
    }

    Ok(query.all(db).await?.into_iter().map(|t| t.token).collect())
}

// ---------- 商家推送 ----------

#[derive(Debug, Clone, Deserialize)]
pub struct SendOfferNotification {
    pub offer_id: i64,
    pub scope: NotificationScope,
    pub custom_title: Option<String>,
    pub custom_body: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemainingCredit {
    pub city_notifications: i32,
    pub all_notifications: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub sent_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub remaining_credit: RemainingCredit,
}

fn offer_title_line(title: &str) -> String {
    let prefix: String = title.chars().take(TITLE_PREFIX_CHARS).collect();
    format!("🔥 عرض جديد: {}", prefix)
}

fn insufficient_credit(scope: NotificationScope) -> AppError {
    let scope_name = match scope {
        NotificationScope::City => "إشعارات المدينة",
        NotificationScope::All => "الإشعارات العامة",
    };
    AppError::bad_request(format!("ليس لديك رصيد كافٍ من {}", scope_name))
}

/// 商家为自己的优惠发推送，每次消耗一次对应范围的额度
pub async fn send_offer_notification(
    db: &DatabaseConnection,
    sender: &dyn PushSender,
    merchant: &merchant::Model,
    input: SendOfferNotification,
) -> AppResult<SendOutcome> {
    let offer = find_owned(db, merchant.id, input.offer_id).await?;

    let credit = credit_for(db, merchant.id).await?;
    if credit.available(input.scope) <= 0 {
        return Err(insufficient_credit(input.scope));
    }

    let title = input
        .custom_title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| offer_title_line(&offer.title));
    let body = input
        .custom_body
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| format!("خصم {}% - {}", offer.saving_percentage(), offer.title));

    let city_id = match input.scope {
        NotificationScope::City => Some(
            merchant
                .city_id
                .ok_or_else(|| AppError::bad_request("لم يتم تحديد مدينة المتجر"))?,
        ),
        NotificationScope::All => None,
    };
    let tokens = active_tokens(db, city_id, None).await?;
    if tokens.is_empty() {
        return Err(AppError::bad_request("لا يوجد مستخدمين لإرسال الإشعار لهم"));
    }

    let message = PushMessage {
        title: title.clone(),
        body: body.clone(),
        data: HashMap::from([
            ("offer_id".to_string(), offer.id.to_string()),
            ("type".to_string(), "new_offer".to_string()),
        ]),
    };
    // 先扣额度再发送，并发请求只有扣减成功的一方会真正发出
    if !deduct(db, merchant.id, input.scope).await? {
        return Err(insufficient_credit(input.scope));
    }
    let report = sender.send(&tokens, &message).await;

    push_notification_log::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant.id),
        offer_id: Set(Some(offer.id)),
        scope: Set(input.scope),
        title: Set(title),
        body: Set(body),
        recipients_count: Set(tokens.len() as i32),
        success_count: Set(report.success as i32),
        failure_count: Set(report.failure as i32),
        sent_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;

    let credit = credit_for(db, merchant.id).await?;
    Ok(SendOutcome {
        sent_count: tokens.len(),
        success_count: report.success,
        failed_count: report.failure,
        remaining_credit: RemainingCredit {
            city_notifications: credit.city_notifications,
            all_notifications: credit.all_notifications,
        },
    })
}

pub async fn history(db: &DatabaseConnection, merchant_id: i64) -> AppResult<Vec<push_notification_log::Model>> {
    Ok(PushNotificationLog::find()
        .filter(push_notification_log::Column::MerchantId.eq(merchant_id))
        .order_by_desc(push_notification_log::Column::SentAt)
        .order_by_desc(push_notification_log::Column::Id)
        .limit(HISTORY_LIMIT)
        .all(db)
        .await?)
}

// ---------- 管理员群发 ----------

#[derive(Debug, Clone, Deserialize)]
pub struct Broadcast {
    pub title: String,
    pub body: String,
    /// 为空时发给所有人
    pub user_ids: Option<Vec<i64>>,
    pub offer_id: Option<i64>,
}

pub async fn broadcast(
    db: &DatabaseConnection,
    sender: &dyn PushSender,
    admin_id: i64,
    input: Broadcast,
) -> AppResult<(notification::Model, PushReport)> {
    if input.title.trim().is_empty() || input.body.trim().is_empty() {
        return Err(AppError::bad_request("العنوان والمحتوى مطلوبان"));
    }

    let user_ids = input.user_ids.filter(|ids| !ids.is_empty());
    let tokens = active_tokens(db, None, user_ids.as_deref()).await?;

    let notification_type = match input.offer_id {
        Some(_) => NotificationType::NewOffer,
        None => NotificationType::General,
    };
    let mut data = HashMap::from([("type".to_string(), notification_type.to_value())]);
    if let Some(offer_id) = input.offer_id {
        data.insert("offer_id".to_string(), offer_id.to_string());
    }

    let message = PushMessage {
        title: input.title.clone(),
        body: input.body.clone(),
        data,
    };
    let report = if tokens.is_empty() {
        PushReport::default()
    } else {
        sender.send(&tokens, &message).await
    };

    let target = match &user_ids {
        Some(ids) => format!("users:{}", ids.len()),
        None => "all".to_string(),
    };
    let record = notification::ActiveModel {
        id: NotSet,
        title: Set(input.title),
        body: Set(input.body),
        notification_type: Set(notification_type),
        target: Set(target),
        recipients_count: Set(tokens.len() as i32),
        success_count: Set(report.success as i32),
        sent_by: Set(Some(admin_id)),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;

    Ok((record, report))
}

pub async fn broadcast_history(db: &DatabaseConnection) -> AppResult<Vec<notification::Model>> {
    Ok(Notification::find()
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .limit(HISTORY_LIMIT)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserType;
    use crate::test_support::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 记录每次发送的 token，全部视为成功
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(Vec<String>, String)>>,
    }

    #[async_trait]
    impl PushSender for RecordingSender {
        async fn send(&self, tokens: &[String], message: &PushMessage) -> PushReport {
            self.sent
                .lock()
                .unwrap()
                .push((tokens.to_vec(), message.title.clone()));
            PushReport {
                success: tokens.len(),
                failure: 0,
            }
        }
    }

    /// 只记录消息的 data 字段
    #[derive(Default)]
    struct PayloadSender {
        payloads: Mutex<Vec<HashMap<String, String>>>,
    }

    #[async_trait]
    impl PushSender for PayloadSender {
        async fn send(&self, tokens: &[String], message: &PushMessage) -> PushReport {
            self.payloads.lock().unwrap().push(message.data.clone());
            PushReport {
                success: tokens.len(),
                failure: 0,
            }
        }
    }

    async fn create_plan(db: &DatabaseConnection, scope: NotificationScope, count: i32) -> notification_plan::Model {
        notification_plan::ActiveModel {
            id: NotSet,
            name: Set(format!("{} إشعارات", count)),
            scope: Set(scope),
            notifications_count: Set(count),
            price: Set(2000.0),
            discount_percentage: Set(10.0),
            features: Set(String::new()),
            is_popular: Set(false),
            is_active: Set(true),
            display_order: Set(0),
            created_at: Set(Utc::now().naive_utc()),
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn customer_in_city(db: &DatabaseConnection, email: &str, city_id: Option<i64>, token: &str) {
        let customer = create_user(db, email, UserType::Customer).await;
        let mut active: user::ActiveModel = customer.clone().into();
        active.selected_city_id = Set(city_id);
        active.update(db).await.unwrap();
        register_token(db, customer.id, token.to_string(), Some("android".into()))
            .await
            .unwrap();
    }

    #[test]
    fn test_title_line_truncates_by_chars() {
        let title = "خصم كبير على جميع الوجبات العائلية طوال الأسبوع";
        let line = offer_title_line(title);
        let expected: String = title.chars().take(30).collect();
        assert_eq!(line, format!("🔥 عرض جديد: {}", expected));
        assert_eq!(offer_title_line("بيتزا"), "🔥 عرض جديد: بيتزا");
    }

    #[tokio::test]
    async fn test_deduct_at_zero() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;

        assert!(!deduct(&db, fixture.merchant.id, NotificationScope::City).await.unwrap());

        add_credit(&db, fixture.merchant.id, NotificationScope::City, 1).await.unwrap();
        assert!(deduct(&db, fixture.merchant.id, NotificationScope::City).await.unwrap());
        assert!(!deduct(&db, fixture.merchant.id, NotificationScope::City).await.unwrap());

        let credit = credit_for(&db, fixture.merchant.id).await.unwrap();
        assert_eq!(credit.city_notifications, 0);
        assert_eq!(credit.total_sent, 1);
    }

    #[tokio::test]
    async fn test_purchase_approval_adds_credit() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let plan = create_plan(&db, NotificationScope::All, 20).await;

        let purchase = create_purchase(&db, fixture.merchant.id, plan.id).await.unwrap();
        assert_eq!(purchase.amount, 1800.0);
        assert!(matches!(
            approve_purchase(&db, purchase.id, None).await,
            Err(AppError::BadRequest(_))
        ));

        let input = ReceiptInput {
            receipt: "receipts/p.png".into(),
            ..Default::default()
        };
        upload_purchase_receipt(&db, fixture.merchant.id, purchase.id, input).await.unwrap();

        let credit = approve_purchase(&db, purchase.id, None).await.unwrap();
        assert_eq!(credit.all_notifications, 20);
        assert_eq!(credit.city_notifications, 0);

        // 已通过的不能再审
        assert!(approve_purchase(&db, purchase.id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_offer_notification_flow() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 1000.0, 750.0).await;
        let sender = RecordingSender::default();

        let input = || SendOfferNotification {
            offer_id: offer.id,
            scope: NotificationScope::City,
            custom_title: None,
            custom_body: None,
        };

        // 没有额度
        let err = send_offer_notification(&db, &sender, &fixture.merchant, input())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        add_credit(&db, fixture.merchant.id, NotificationScope::City, 2).await.unwrap();

        // 有额度但城市里没有设备
        let err = send_offer_notification(&db, &sender, &fixture.merchant, input())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        customer_in_city(&db, "a@tawfir.app", Some(fixture.city.id), "token-a").await;
        customer_in_city(&db, "b@tawfir.app", None, "token-b").await;

        let outcome = send_offer_notification(&db, &sender, &fixture.merchant, input())
            .await
            .unwrap();
        assert_eq!(outcome.sent_count, 1);
        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.remaining_credit.city_notifications, 1);

        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec!["token-a".to_string()]);
        assert_eq!(sent[0].1, format!("🔥 عرض جديد: {}", offer.title));

        let logs = history(&db, fixture.merchant.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].body, format!("خصم 25% - {}", offer.title));
    }

    #[tokio::test]
    async fn test_concurrent_sends_share_single_credit() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 1000.0, 750.0).await;
        customer_in_city(&db, "a@tawfir.app", Some(fixture.city.id), "token-a").await;
        add_credit(&db, fixture.merchant.id, NotificationScope::City, 1).await.unwrap();

        let sender = RecordingSender::default();
        let input = || SendOfferNotification {
            offer_id: offer.id,
            scope: NotificationScope::City,
            custom_title: None,
            custom_body: None,
        };
        let (first, second) = tokio::join!(
            send_offer_notification(&db, &sender, &fixture.merchant, input()),
            send_offer_notification(&db, &sender, &fixture.merchant, input()),
        );

        assert_eq!([first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(history(&db, fixture.merchant.id).await.unwrap().len(), 1);

        let credit = credit_for(&db, fixture.merchant.id).await.unwrap();
        assert_eq!(credit.city_notifications, 0);
        assert_eq!(credit.total_sent, 1);
    }

    #[tokio::test]
    async fn test_broadcast_payload_type_follows_kind() {
        let db = setup_db().await;
        let admin = create_user(&db, "admin@tawfir.app", UserType::Admin).await;
        let customer = create_user(&db, "c@tawfir.app", UserType::Customer).await;
        register_token(&db, customer.id, "tok".into(), None).await.unwrap();

        let sender = PayloadSender::default();
        let input = Broadcast {
            title: "عرض".into(),
            body: "خصم جديد".into(),
            user_ids: None,
            offer_id: Some(7),
        };
        broadcast(&db, &sender, admin.id, input).await.unwrap();
        let input = Broadcast {
            title: "تنبيه".into(),
            body: "صيانة".into(),
            user_ids: None,
            offer_id: None,
        };
        broadcast(&db, &sender, admin.id, input).await.unwrap();

        let payloads = sender.payloads.lock().unwrap().clone();
        assert_eq!(payloads[0].get("type").map(String::as_str), Some("new_offer"));
        assert_eq!(payloads[0].get("offer_id").map(String::as_str), Some("7"));
        assert_eq!(payloads[1].get("type").map(String::as_str), Some("general"));
        assert!(!payloads[1].contains_key("offer_id"));
    }

    #[tokio::test]
    async fn test_token_upsert_and_broadcast() {
        let db = setup_db().await;
        let admin = create_user(&db, "admin@tawfir.app", UserType::Admin).await;
        let customer = create_user(&db, "c@tawfir.app", UserType::Customer).await;

        let first = register_token(&db, customer.id, "old".into(), None).await.unwrap();
        let second = register_token(&db, customer.id, "new".into(), None).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.token, "new");

        let sender = RecordingSender::default();
        let input = Broadcast {
            title: "تحديث".into(),
            body: "عروض جديدة".into(),
            user_ids: None,
            offer_id: None,
        };
        let (record, report) = broadcast(&db, &sender, admin.id, input).await.unwrap();
        assert_eq!(record.recipients_count, 1);
        assert_eq!(report.success, 1);
        assert_eq!(record.target, "all");

        deactivate_token(&db, customer.id).await.unwrap();
        let input = Broadcast {
            title: "تحديث".into(),
            body: "عروض جديدة".into(),
            user_ids: Some(vec![customer.id]),
            offer_id: Some(1),
        };
        let (record, _) = broadcast(&db, &sender, admin.id, input).await.unwrap();
        assert_eq!(record.recipients_count, 0);
        assert_eq!(record.notification_type, NotificationType::NewOffer);
        assert_eq!(broadcast_history(&db).await.unwrap().len(), 2);
    }
}
