use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, NotSet, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

use crate::entity::{favorite, offer, Favorite, Offer};
use crate::error::{AppError, AppResult};
use crate::offers::find_offer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            ToggleOutcome::Added => "تمت الإضافة إلى المفضلة",
            ToggleOutcome::Removed => "تمت الإزالة من المفضلة",
        }
    }
}

async fn find_favorite(db: &DatabaseConnection, user_id: i64, offer_id: i64) -> AppResult<Option<favorite::Model>> {
    Ok(Favorite::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .filter(favorite::Column::OfferId.eq(offer_id))
        .one(db)
        .await?)
}

/// 已收藏则取消，未收藏则添加
pub async fn toggle(db: &DatabaseConnection, user_id: i64, offer_id: i64) -> AppResult<ToggleOutcome> {
    find_offer(db, offer_id).await?;

    if let Some(existing) = find_favorite(db, user_id, offer_id).await? {
        existing.delete(db).await?;
        return Ok(ToggleOutcome::Removed);
    }

    favorite::ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        offer_id: Set(offer_id),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?;
    Ok(ToggleOutcome::Added)
}

pub async fn remove(db: &DatabaseConnection, user_id: i64, offer_id: i64) -> AppResult<()> {
    let existing = find_favorite(db, user_id, offer_id)
        .await?
        .ok_or_else(|| AppError::not_found("العرض غير موجود في المفضلة"))?;
    existing.delete(db).await?;
    Ok(())
}

/// 用户收藏的优惠，最近收藏的在前
pub async fn list_offers(db: &DatabaseConnection, user_id: i64) -> AppResult<Vec<offer::Model>> {
    let rows = Favorite::find()
        .filter(favorite::Column::UserId.eq(user_id))
        .order_by_desc(favorite::Column::CreatedAt)
        .order_by_desc(favorite::Column::Id)
        .find_also_related(Offer)
        .all(db)
        .await?;

    Ok(rows.into_iter().filter_map(|(_, offer)| offer).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserType;
    use crate::test_support::*;

    #[tokio::test]
    async fn test_favoriting_twice_toggles_off() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 60.0).await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;

        assert_eq!(toggle(&db, user.id, offer.id).await.unwrap(), ToggleOutcome::Added);
        assert_eq!(list_offers(&db, user.id).await.unwrap().len(), 1);

        assert_eq!(toggle(&db, user.id, offer.id).await.unwrap(), ToggleOutcome::Removed);
        assert!(list_offers(&db, user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_favorite_is_not_found() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, None, 100.0, 60.0).await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;

        let err = remove(&db, user.id, offer.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        toggle(&db, user.id, offer.id).await.unwrap();
        remove(&db, user.id, offer.id).await.unwrap();
        assert!(list_offers(&db, user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_unknown_offer() {
        let db = setup_db().await;
        let user = create_user(&db, "c@tawfir.app", UserType::Customer).await;
        assert!(matches!(toggle(&db, user.id, 404).await, Err(AppError::NotFound(_))));
    }
}
