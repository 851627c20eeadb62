//! 优惠的查询、展示与商家端增删改

use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::entity::{
    category, city, favorite, merchant, offer, offer_image, parse_code, Category, City, Currency,
    Favorite, Merchant, Offer, OfferImage, OfferStatus,
};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBrief {
    pub id: i64,
    pub name: String,
    pub icon: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityBrief {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantBrief {
    pub id: i64,
    pub business_name: String,
    pub logo: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub delivery_phone: Option<String>,
    pub average_rating: f64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// 返回给客户端的优惠
#[derive(Debug, Clone, Serialize)]
pub struct OfferView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price_before: f64,
    pub price_after: f64,
    pub currency: Currency,
    pub currency_symbol: &'static str,
    pub saving_percentage: i64,
    pub status: OfferStatus,
    pub status_label: &'static str,
    pub end_at: Option<NaiveDateTime>,
    pub is_expired: bool,
    pub is_featured: bool,
    pub featured_until: Option<NaiveDateTime>,
    pub is_deal_of_day: bool,
    pub views_count: i64,
    pub delivery_enabled: bool,
    pub images: Vec<String>,
    pub category: Option<CategoryBrief>,
    pub city: Option<CityBrief>,
    pub merchant: Option<MerchantBrief>,
    pub is_favorited: bool,
    pub created_at: NaiveDateTime,
}

/// 批量组装优惠详情，按传入顺序返回
pub async fn build_views(
    db: &DatabaseConnection,
    offers: Vec<offer::Model>,
    viewer_id: Option<i64>,
) -> AppResult<Vec<OfferView>> {
    if offers.is_empty() {
        return Ok(Vec::new());
    }

    let now = Utc::now().naive_utc();
    let offer_ids: Vec<i64> = offers.iter().map(|o| o.id).collect();
    let merchant_ids: HashSet<i64> = offers.iter().map(|o| o.merchant_id).collect();
    let category_ids: HashSet<i64> = offers.iter().filter_map(|o| o.category_id).collect();
    let city_ids: HashSet<i64> = offers.iter().filter_map(|o| o.city_id).collect();

    let merchants: HashMap<i64, merchant::Model> = Merchant::find()
        .filter(merchant::Column::Id.is_in(merchant_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let categories: HashMap<i64, category::Model> = Category::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let cities: HashMap<i64, city::Model> = City::find()
        .filter(city::Column::Id.is_in(city_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut images: HashMap<i64, Vec<String>> = HashMap::new();
    for image in OfferImage::find()
        .filter(offer_image::Column::OfferId.is_in(offer_ids.clone()))
        .order_by_asc(offer_image::Column::DisplayOrder)
        .order_by_asc(offer_image::Column::Id)
        .all(db)
        .await?
    {
        images.entry(image.offer_id).or_default().push(image.image);
    }

    let favorited: HashSet<i64> = match viewer_id {
        Some(user_id) => Favorite::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::OfferId.is_in(offer_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|f| f.offer_id)
            .collect(),
        None => HashSet::new(),
    };

    Ok(offers
        .into_iter()
        .map(|o| OfferView {
            id: o.id,
            saving_percentage: o.saving_percentage(),
            is_expired: o.is_expired(now),
            currency_symbol: o.currency.symbol(),
            status_label: o.status.label(),
            images: images.remove(&o.id).unwrap_or_default(),
            category: o.category_id.and_then(|id| categories.get(&id)).map(|c| CategoryBrief {
                id: c.id,
                name: c.name.clone(),
                icon: c.icon.clone(),
                color: c.color.clone(),
            }),
            city: o.city_id.and_then(|id| cities.get(&id)).map(|c| CityBrief {
                id: c.id,
                name: c.name.clone(),
            }),
            merchant: merchants.get(&o.merchant_id).map(|m| MerchantBrief {
                id: m.id,
                business_name: m.business_name.clone(),
                logo: m.logo.clone(),
                phone: m.phone.clone(),
                whatsapp: m.whatsapp.clone(),
                delivery_phone: m.delivery_phone.clone(),
                average_rating: m.average_rating,
                latitude: m.latitude,
                longitude: m.longitude,
            }),
            is_favorited: favorited.contains(&o.id),
            title: o.title,
            description: o.description,
            price_before: o.price_before,
            price_after: o.price_after,
            currency: o.currency,
            status: o.status,
            end_at: o.end_at,
            is_featured: o.is_featured,
            featured_until: o.featured_until,
            is_deal_of_day: o.is_deal_of_day,
            views_count: o.views_count,
            delivery_enabled: o.delivery_enabled,
            created_at: o.created_at,
        })
        .collect())
}

pub async fn build_view(db: &DatabaseConnection, offer: offer::Model, viewer_id: Option<i64>) -> AppResult<OfferView> {
    build_views(db, vec![offer], viewer_id)
        .await?
        .pop()
        .ok_or_else(|| AppError::not_found("العرض غير موجود"))
}

#[derive(Debug, Default, Deserialize)]
pub struct OfferFilter {
    pub city_id: Option<i64>,
    pub category_id: Option<i64>,
    pub merchant_id: Option<i64>,
    pub search: Option<String>,
}

/// 对外展示的优惠：仅审核通过的
pub async fn list_public(db: &DatabaseConnection, filter: &OfferFilter) -> AppResult<Vec<offer::Model>> {
    let mut query = Offer::find().filter(offer::Column::Status.eq(OfferStatus::Accepted));

    if let Some(city_id) = filter.city_id {
        query = query.filter(offer::Column::CityId.eq(city_id));
    }
    if let Some(category_id) = filter.category_id {
        query = query.filter(offer::Column::CategoryId.eq(category_id));
    }
    if let Some(merchant_id) = filter.merchant_id {
        query = query.filter(offer::Column::MerchantId.eq(merchant_id));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(
            Condition::any()
                .add(offer::Column::Title.contains(search))
                .add(offer::Column::Description.contains(search)),
        );
    }

    Ok(query.order_by_desc(offer::Column::CreatedAt).all(db).await?)
}

/// 置顶中的优惠
pub async fn list_featured(db: &DatabaseConnection, city_id: Option<i64>) -> AppResult<Vec<offer::Model>> {
    let now = Utc::now().naive_utc();
    let mut query = Offer::find()
        .filter(offer::Column::Status.eq(OfferStatus::Accepted))
        .filter(offer::Column::IsFeatured.eq(true))
        .filter(
            Condition::any()
                .add(offer::Column::FeaturedUntil.is_null())
                .add(offer::Column::FeaturedUntil.gt(now)),
        );
    if let Some(city_id) = city_id {
        query = query.filter(offer::Column::CityId.eq(city_id));
    }

    Ok(query.order_by_desc(offer::Column::CreatedAt).all(db).await?)
}

pub async fn find_offer(db: &DatabaseConnection, offer_id: i64) -> AppResult<offer::Model> {
    Offer::find_by_id(offer_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("العرض غير موجود"))
}

/// 浏览数加一，返回最新浏览数
pub async fn record_view(db: &DatabaseConnection, offer_id: i64) -> AppResult<offer::Model> {
    let offer = find_offer(db, offer_id).await?;
    let views = offer.views_count + 1;
    let mut active: offer::ActiveModel = offer.into();
    active.views_count = Set(views);
    Ok(active.update(db).await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfferInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<i64>,
    pub city_id: Option<i64>,
    pub price_before: f64,
    pub price_after: f64,
    pub currency: Option<String>,
    pub end_at: Option<NaiveDateTime>,
    pub status: Option<String>,
    #[serde(default)]
    pub delivery_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub city_id: Option<i64>,
    pub price_before: Option<f64>,
    pub price_after: Option<f64>,
    pub currency: Option<String>,
    pub end_at: Option<NaiveDateTime>,
    pub status: Option<String>,
    pub delivery_enabled: Option<bool>,
}

fn parse_status(status: &str) -> AppResult<OfferStatus> {
    parse_code(status).ok_or_else(|| AppError::bad_request(format!("حالة غير صالحة: {}", status)))
}

fn parse_currency(currency: &str) -> AppResult<Currency> {
    parse_code(currency).ok_or_else(|| AppError::bad_request(format!("عملة غير صالحة: {}", currency)))
}

fn validate_prices(price_before: f64, price_after: f64) -> AppResult<()> {
    if price_before <= 0.0 || price_after < 0.0 {
        return Err(AppError::bad_request("يجب أن تكون الأسعار أرقاماً موجبة"));
    }
    if price_after > price_before {
        return Err(AppError::bad_request("السعر بعد الخصم يجب ألا يتجاوز السعر قبل الخصم"));
    }
    Ok(())
}

/// 商家端的优惠列表（包含草稿与过期）
pub async fn list_for_merchant(db: &DatabaseConnection, merchant_id: i64) -> AppResult<Vec<offer::Model>> {
    Ok(Offer::find()
        .filter(offer::Column::MerchantId.eq(merchant_id))
        .order_by_desc(offer::Column::CreatedAt)
        .all(db)
        .await?)
}

/// 取商家自己的优惠，不属于该商家时视为不存在
pub async fn find_owned(db: &DatabaseConnection, merchant_id: i64, offer_id: i64) -> AppResult<offer::Model> {
    Offer::find_by_id(offer_id)
        .filter(offer::Column::MerchantId.eq(merchant_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("العرض غير موجود"))
}

pub async fn create_for_merchant(
    db: &DatabaseConnection,
    merchant: &merchant::Model,
    input: OfferInput,
) -> AppResult<offer::Model> {
    if input.title.trim().is_empty() {
        return Err(AppError::bad_request("عنوان العرض مطلوب"));
    }
    validate_prices(input.price_before, input.price_after)?;

    let status = match input.status.as_deref() {
        Some(status) => parse_status(status)?,
        None => OfferStatus::Accepted,
    };
    let currency = match input.currency.as_deref() {
        Some(currency) => parse_currency(currency)?,
        None => Currency::Yer,
    };

    let now = Utc::now().naive_utc();
    let offer = offer::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant.id),
        title: Set(input.title.trim().to_string()),
        description: Set(input.description),
        category_id: Set(input.category_id),
        city_id: Set(input.city_id.or(merchant.city_id)),
        price_before: Set(input.price_before),
        price_after: Set(input.price_after),
        currency: Set(currency),
        end_at: Set(input.end_at),
        status: Set(status),
        is_featured: Set(false),
        featured_until: Set(None),
        is_deal_of_day: Set(false),
        deal_of_day_until: Set(None),
        views_count: Set(0),
        delivery_enabled: Set(input.delivery_enabled),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await?;

    refresh_offers_count(db, merchant.id).await?;
    Ok(offer)
}

pub async fn update_for_merchant(
    db: &DatabaseConnection,
    merchant_id: i64,
    offer_id: i64,
    patch: OfferPatch,
) -> AppResult<offer::Model> {
    let offer = find_owned(db, merchant_id, offer_id).await?;

    validate_prices(
        patch.price_before.unwrap_or(offer.price_before),
        patch.price_after.unwrap_or(offer.price_after),
    )?;
    let status = patch.status.as_deref().map(parse_status).transpose()?;
    let currency = patch.currency.as_deref().map(parse_currency).transpose()?;

    let mut active: offer::ActiveModel = offer.into();
    if let Some(title) = patch.title {
        if title.trim().is_empty() {
            return Err(AppError::bad_request("عنوان العرض مطلوب"));
        }
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = patch.description {
        active.description = Set(description);
    }
    if let Some(category_id) = patch.category_id {
        active.category_id = Set(Some(category_id));
    }
    if let Some(city_id) = patch.city_id {
        active.city_id = Set(Some(city_id));
    }
    if let Some(price_before) = patch.price_before {
        active.price_before = Set(price_before);
    }
    if let Some(price_after) = patch.price_after {
        active.price_after = Set(price_after);
    }
    if let Some(currency) = currency {
        active.currency = Set(currency);
    }
    if let Some(end_at) = patch.end_at {
        active.end_at = Set(Some(end_at));
    }
    if let Some(status) = status {
        active.status = Set(status);
    }
    if let Some(delivery_enabled) = patch.delivery_enabled {
        active.delivery_enabled = Set(delivery_enabled);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let offer = active.update(db).await?;
    refresh_offers_count(db, merchant_id).await?;
    Ok(offer)
}

pub async fn delete_for_merchant(db: &DatabaseConnection, merchant_id: i64, offer_id: i64) -> AppResult<()> {
    let offer = find_owned(db, merchant_id, offer_id).await?;
    offer.delete(db).await?;
    refresh_offers_count(db, merchant_id).await?;
    Ok(())
}

pub async fn add_image(db: &DatabaseConnection, offer_id: i64, image: String) -> AppResult<offer_image::Model> {
    let next_order = OfferImage::find()
        .filter(offer_image::Column::OfferId.eq(offer_id))
        .count(db)
        .await? as i32;

    Ok(offer_image::ActiveModel {
        id: NotSet,
        offer_id: Set(offer_id),
        image: Set(image),
        display_order: Set(next_order),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await?)
}

/// 重新统计商家的有效优惠数
pub async fn refresh_offers_count(db: &DatabaseConnection, merchant_id: i64) -> AppResult<()> {
    let count = Offer::find()
        .filter(offer::Column::MerchantId.eq(merchant_id))
        .filter(offer::Column::Status.eq(OfferStatus::Accepted))
        .count(db)
        .await?;

    if let Some(merchant) = Merchant::find_by_id(merchant_id).one(db).await? {
        let mut active: merchant::ActiveModel = merchant.into();
        active.offers_count = Set(count as i32);
        active.update(db).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserType;
    use crate::test_support::*;

    fn input(title: &str, before: f64, after: f64) -> OfferInput {
        OfferInput {
            title: title.to_string(),
            description: String::new(),
            category_id: None,
            city_id: None,
            price_before: before,
            price_after: after,
            currency: None,
            end_at: None,
            status: None,
            delivery_enabled: false,
        }
    }

    #[tokio::test]
    async fn test_create_update_delete_keeps_count() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;

        let offer = create_for_merchant(&db, &fixture.merchant, input("بيتزا", 4000.0, 3000.0))
            .await
            .unwrap();
        assert_eq!(offer.city_id, Some(fixture.city.id));
        assert_eq!(offer.status, OfferStatus::Accepted);
        assert_eq!(offer.saving_percentage(), 25);

        let merchant = Merchant::find_by_id(fixture.merchant.id).one(&db).await.unwrap().unwrap();
        assert_eq!(merchant.offers_count, 1);

        let patch = OfferPatch {
            status: Some("draft".into()),
            ..Default::default()
        };
        let updated = update_for_merchant(&db, fixture.merchant.id, offer.id, patch).await.unwrap();
        assert_eq!(updated.status, OfferStatus::Draft);
        let merchant = Merchant::find_by_id(fixture.merchant.id).one(&db).await.unwrap().unwrap();
        assert_eq!(merchant.offers_count, 0);

        delete_for_merchant(&db, fixture.merchant.id, offer.id).await.unwrap();
        assert!(Offer::find_by_id(offer.id).one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_status_and_prices_rejected() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;

        let err = create_for_merchant(&db, &fixture.merchant, input("x", 100.0, 150.0)).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let offer = create_for_merchant(&db, &fixture.merchant, input("x", 100.0, 50.0)).await.unwrap();
        let patch = OfferPatch {
            status: Some("published".into()),
            ..Default::default()
        };
        let err = update_for_merchant(&db, fixture.merchant.id, offer.id, patch).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_other_merchant_offer_is_not_found() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let offer = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 80.0).await;

        let other_user = create_user(&db, "o@tawfir.app", UserType::Merchant).await;
        let other = create_merchant(&db, other_user.id, None, crate::entity::ApprovalStatus::Approved).await;

        let err = delete_for_merchant(&db, other.id, offer.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_public_list_and_views() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let visible = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 80.0).await;

        let draft = create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 70.0).await;
        let mut active: offer::ActiveModel = draft.into();
        active.status = Set(OfferStatus::Draft);
        active.update(&db).await.unwrap();

        let listed = list_public(&db, &OfferFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, visible.id);

        record_view(&db, visible.id).await.unwrap();
        let viewed = record_view(&db, visible.id).await.unwrap();
        assert_eq!(viewed.views_count, 2);

        add_image(&db, visible.id, "offers/a.jpg".into()).await.unwrap();
        add_image(&db, visible.id, "offers/b.jpg".into()).await.unwrap();
        let view = build_view(&db, viewed, None).await.unwrap();
        assert_eq!(view.images, vec!["offers/a.jpg", "offers/b.jpg"]);
        assert_eq!(view.saving_percentage, 20);
        assert_eq!(view.currency_symbol, "ر.ي");
        assert!(!view.is_favorited);
        assert_eq!(view.merchant.unwrap().id, fixture.merchant.id);
    }
}
