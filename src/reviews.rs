//! 商家评价：每个用户对每个商家只保留一条

use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, NotSet, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;

use crate::entity::{merchant, review, user, Merchant, Review, User};
use crate::error::{AppError, AppResult};

pub const LATEST_REVIEWS_LIMIT: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub id: i64,
    pub merchant_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ReviewView {
    fn new(review: review::Model, user: Option<user::Model>) -> Self {
        Self {
            id: review.id,
            merchant_id: review.merchant_id,
            user_id: review.user_id,
            user_name: user.map(|u| u.display_name()).unwrap_or_default(),
            rating: review.rating,
            comment: review.comment,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

fn validate_rating(rating: i32) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::bad_request("يجب أن يكون التقييم بين 1 و 5"));
    }
    Ok(())
}

async fn find_merchant(db: &DatabaseConnection, merchant_id: i64) -> AppResult<merchant::Model> {
    Merchant::find_by_id(merchant_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("التاجر غير موجود"))
}

async fn find_own(db: &DatabaseConnection, user_id: i64, merchant_id: i64) -> AppResult<Option<review::Model>> {
    Ok(Review::find()
        .filter(review::Column::UserId.eq(user_id))
        .filter(review::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?)
}

/// 新建评价；已有评价时改为更新
pub async fn upsert(
    db: &DatabaseConnection,
    user_id: i64,
    merchant_id: i64,
    rating: i32,
    comment: Option<String>,
) -> AppResult<(review::Model, UpsertOutcome)> {
    validate_rating(rating)?;
    find_merchant(db, merchant_id).await?;

    let now = Utc::now().naive_utc();
    let (review, outcome) = match find_own(db, user_id, merchant_id).await? {
        Some(existing) => {
            let mut active: review::ActiveModel = existing.into();
            active.rating = Set(rating);
            active.comment = Set(comment);
            active.updated_at = Set(now);
            (active.update(db).await?, UpsertOutcome::Updated)
        }
        None => {
            let review = review::ActiveModel {
                id: NotSet,
                user_id: Set(user_id),
                merchant_id: Set(merchant_id),
                rating: Set(rating),
                comment: Set(comment),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await?;
            (review, UpsertOutcome::Created)
        }
    };

    refresh_merchant_rating(db, merchant_id).await?;
    Ok((review, outcome))
}

pub async fn update(
    db: &DatabaseConnection,
    user_id: i64,
    merchant_id: i64,
    rating: i32,
    comment: Option<String>,
) -> AppResult<review::Model> {
    validate_rating(rating)?;
    let existing = find_own(db, user_id, merchant_id)
        .await?
        .ok_or_else(|| AppError::not_found("لم تقم بتقييم هذا التاجر"))?;

    let mut active: review::ActiveModel = existing.into();
    active.rating = Set(rating);
    active.comment = Set(comment);
    active.updated_at = Set(Utc::now().naive_utc());
    let review = active.update(db).await?;

    refresh_merchant_rating(db, merchant_id).await?;
    Ok(review)
}

pub async fn delete(db: &DatabaseConnection, user_id: i64, merchant_id: i64) -> AppResult<()> {
    let existing = find_own(db, user_id, merchant_id)
        .await?
        .ok_or_else(|| AppError::not_found("لم تقم بتقييم هذا التاجر"))?;
    existing.delete(db).await?;

    refresh_merchant_rating(db, merchant_id).await
}

pub async fn list_for_merchant(db: &DatabaseConnection, merchant_id: i64) -> AppResult<Vec<ReviewView>> {
    find_merchant(db, merchant_id).await?;

    let rows = Review::find()
        .filter(review::Column::MerchantId.eq(merchant_id))
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .find_also_related(User)
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|(r, u)| ReviewView::new(r, u)).collect())
}

/// 全站最新评价
pub async fn latest(db: &DatabaseConnection, limit: u64) -> AppResult<Vec<ReviewView>> {
    let rows = Review::find()
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .limit(limit)
        .find_also_related(User)
        .all(db)
        .await?;

    Ok(rows.into_iter().map(|(r, u)| ReviewView::new(r, u)).collect())
}

/// 重新计算商家平均分（保留一位小数）与评价数
pub async fn refresh_merchant_rating(db: &DatabaseConnection, merchant_id: i64) -> AppResult<()> {
    let ratings: Vec<i32> = Review::find()
        .filter(review::Column::MerchantId.eq(merchant_id))
        .all(db)
        .await?
        .into_iter()
        .map(|r| r.rating)
        .collect();

    let average = if ratings.is_empty() {
        0.0
    } else {
        let sum: i32 = ratings.iter().sum();
        (sum as f64 / ratings.len() as f64 * 10.0).round() / 10.0
    };

    let merchant = find_merchant(db, merchant_id).await?;
    let mut active: merchant::ActiveModel = merchant.into();
    active.average_rating = Set(average);
    active.reviews_count = Set(ratings.len() as i32);
    active.update(db).await?;
    Ok(())
}
