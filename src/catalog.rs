//! 基础数据：省份、城市、分类、行业、汇率、收款账户与各类套餐
//!
//! 公开接口只返回启用的数据，后台接口负责增删改。

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet, PaginatorTrait, PrimaryKeyTrait,
    QueryFilter, QueryOrder, Set, TryIntoModel,
};
use serde::{Deserialize, Serialize};

use crate::entity::{
    business_type, category, city, exchange_rate, featured_plan, governorate, notification_plan, offer,
    payment_account, BusinessType, Category, City, Currency, ExchangeRate, FeaturedPlan, Governorate,
    NotificationPlan, NotificationScope, Offer, OfferStatus, PaymentAccount, Region,
};
use crate::error::{AppError, AppResult};

// ---------- 公开查询 ----------

#[derive(Debug, Clone, Serialize)]
pub struct GovernorateSummary {
    #[serde(flatten)]
    pub governorate: governorate::Model,
    pub region_label: &'static str,
    pub cities_count: u64,
    pub offers_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GovernorateDetail {
    #[serde(flatten)]
    pub governorate: governorate::Model,
    pub region_label: &'static str,
    pub cities: Vec<city::Model>,
}

async fn active_cities(db: &DatabaseConnection, governorate_id: Option<i64>) -> AppResult<Vec<city::Model>> {
    let mut query = City::find().filter(city::Column::IsActive.eq(true));
    if let Some(id) = governorate_id {
        query = query.filter(city::Column::GovernorateId.eq(id));
    }
    Ok(query.order_by_asc(city::Column::Name).all(db).await?)
}

pub async fn list_governorates(db: &DatabaseConnection) -> AppResult<Vec<GovernorateSummary>> {
    let governorates = Governorate::find()
        .filter(governorate::Column::IsActive.eq(true))
        .order_by_asc(governorate::Column::DisplayOrder)
        .order_by_asc(governorate::Column::Name)
        .all(db)
        .await?;

    let mut summaries = Vec::with_capacity(governorates.len());
    for governorate in governorates {
        let city_ids: Vec<i64> = active_cities(db, Some(governorate.id))
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        let offers_count = if city_ids.is_empty() {
            0
        } else {
            Offer::find()
                .filter(offer::Column::Status.eq(OfferStatus::Accepted))
                .filter(offer::Column::CityId.is_in(city_ids.clone()))
                .count(db)
                .await?
        };

        summaries.push(GovernorateSummary {
            region_label: governorate.region.label(),
            cities_count: city_ids.len() as u64,
            offers_count,
            governorate,
        });
    }
    Ok(summaries)
}

pub async fn governorate_detail(db: &DatabaseConnection, governorate_id: i64) -> AppResult<GovernorateDetail> {
    let governorate = Governorate::find_by_id(governorate_id)
        .one(db)
        .await?
        .filter(|g| g.is_active)
        .ok_or_else(|| AppError::not_found("المحافظة غير موجودة"))?;

    Ok(GovernorateDetail {
        region_label: governorate.region.label(),
        cities: active_cities(db, Some(governorate.id)).await?,
        governorate,
    })
}

pub async fn list_cities(db: &DatabaseConnection, governorate_id: Option<i64>) -> AppResult<Vec<city::Model>> {
    active_cities(db, governorate_id).await
}

pub async fn list_categories(db: &DatabaseConnection) -> AppResult<Vec<category::Model>> {
    Ok(Category::find()
        .filter(category::Column::IsActive.eq(true))
        .order_by_asc(category::Column::DisplayOrder)
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?)
}

pub async fn list_business_types(db: &DatabaseConnection) -> AppResult<Vec<business_type::Model>> {
    Ok(BusinessType::find()
        .filter(business_type::Column::IsActive.eq(true))
        .order_by_asc(business_type::Column::DisplayOrder)
        .order_by_asc(business_type::Column::Name)
        .all(db)
        .await?)
}

pub async fn list_exchange_rates(db: &DatabaseConnection) -> AppResult<Vec<exchange_rate::Model>> {
    Ok(ExchangeRate::find()
        .order_by_asc(exchange_rate::Column::Region)
        .order_by_asc(exchange_rate::Column::Currency)
        .all(db)
        .await?)
}

// ---------- 后台维护 ----------

/// 按主键删除，不存在时返回 404
pub async fn delete_row<E>(db: &DatabaseConnection, id: i64, not_found: &str) -> AppResult<()>
where
    E: EntityTrait,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i64>,
{
    let result = E::delete_by_id(id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found(not_found));
    }
    Ok(())
}

fn required(value: &str, message: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(message));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernorateInput {
    pub name: String,
    #[serde(default)]
    pub name_en: String,
    pub region: Region,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub population: Option<i64>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// id 为 None 时新建，否则整体更新
pub async fn save_governorate(
    db: &DatabaseConnection,
    id: Option<i64>,
    input: GovernorateInput,
) -> AppResult<governorate::Model> {
    let mut active: governorate::ActiveModel = match id {
        Some(id) => Governorate::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("المحافظة غير موجودة"))?
            .into(),
        None => governorate::ActiveModel {
            id: NotSet,
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        },
    };

    active.name = Set(required(&input.name, "اسم المحافظة مطلوب")?);
    active.name_en = Set(input.name_en.trim().to_string());
    active.region = Set(input.region);
    active.icon = Set(input.icon);
    active.color = Set(input.color.unwrap_or_else(|| "#2E7D32".to_string()));
    active.description = Set(input.description);
    active.population = Set(input.population);
    active.display_order = Set(input.display_order);
    active.is_active = Set(input.is_active);
    Ok(active.save(db).await?.try_into_model()?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityInput {
    pub governorate_id: i64,
    pub name: String,
    pub name_en: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub async fn save_city(db: &DatabaseConnection, id: Option<i64>, input: CityInput) -> AppResult<city::Model> {
    if Governorate::find_by_id(input.governorate_id).one(db).await?.is_none() {
        return Err(AppError::bad_request("المحافظة غير موجودة"));
    }
    if input.latitude.is_some() != input.longitude.is_some() {
        return Err(AppError::bad_request("يجب إدخال خط العرض وخط الطول معاً"));
    }

    let mut active: city::ActiveModel = match id {
        Some(id) => City::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("المدينة غير موجودة"))?
            .into(),
        None => city::ActiveModel {
            id: NotSet,
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        },
    };

    active.governorate_id = Set(input.governorate_id);
    active.name = Set(required(&input.name, "اسم المدينة مطلوب")?);
    active.name_en = Set(input.name_en);
    active.latitude = Set(input.latitude);
    active.longitude = Set(input.longitude);
    active.is_active = Set(input.is_active);
    Ok(active.save(db).await?.try_into_model()?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub name_en: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub async fn save_category(db: &DatabaseConnection, id: Option<i64>, input: CategoryInput) -> AppResult<category::Model> {
    let mut active: category::ActiveModel = match id {
        Some(id) => Category::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("التصنيف غير موجود"))?
            .into(),
        None => category::ActiveModel {
            id: NotSet,
            ..Default::default()
        },
    };

    active.name = Set(required(&input.name, "اسم التصنيف مطلوب")?);
    active.name_en = Set(input.name_en);
    active.icon = Set(input.icon);
    active.color = Set(input.color.unwrap_or_else(|| "#047857".to_string()));
    active.display_order = Set(input.display_order);
    active.is_active = Set(input.is_active);
    Ok(active.save(db).await?.try_into_model()?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusinessTypeInput {
    pub name: String,
    pub name_en: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub async fn save_business_type(
    db: &DatabaseConnection,
    id: Option<i64>,
    input: BusinessTypeInput,
) -> AppResult<business_type::Model> {
    let mut active: business_type::ActiveModel = match id {
        Some(id) => BusinessType::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("نوع النشاط غير موجود"))?
            .into(),
        None => business_type::ActiveModel {
            id: NotSet,
            ..Default::default()
        },
    };

    active.name = Set(required(&input.name, "اسم نوع النشاط مطلوب")?);
    active.name_en = Set(input.name_en);
    active.icon = Set(input.icon);
    active.display_order = Set(input.display_order);
    active.is_active = Set(input.is_active);
    Ok(active.save(db).await?.try_into_model()?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeRateInput {
    pub currency: Currency,
    pub region: Region,
    pub rate: f64,
}

/// 汇率按 (币种, 地区) 唯一，已存在则更新
pub async fn upsert_exchange_rate(db: &DatabaseConnection, input: ExchangeRateInput) -> AppResult<exchange_rate::Model> {
    if input.currency == Currency::Yer {
        return Err(AppError::bad_request("العملة يجب أن تكون SAR أو USD"));
    }
    if input.rate <= 0.0 {
        return Err(AppError::bad_request("سعر الصرف يجب أن يكون أكبر من صفر"));
    }

    let now = Utc::now().naive_utc();
    let existing = ExchangeRate::find()
        .filter(exchange_rate::Column::Currency.eq(input.currency))
        .filter(exchange_rate::Column::Region.eq(input.region))
        .one(db)
        .await?;

    let model = match existing {
        Some(rate) => {
            let mut active: exchange_rate::ActiveModel = rate.into();
            active.rate = Set(input.rate);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            exchange_rate::ActiveModel {
                id: NotSet,
                currency: Set(input.currency),
                region: Set(input.region),
                rate: Set(input.rate),
                updated_at: Set(now),
            }
            .insert(db)
            .await?
        }
    };
    Ok(model)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentAccountInput {
    pub bank: String,
    pub account_name: String,
    pub account_number: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

pub async fn save_payment_account(
    db: &DatabaseConnection,
    id: Option<i64>,
    input: PaymentAccountInput,
) -> AppResult<payment_account::Model> {
    let mut active: payment_account::ActiveModel = match id {
        Some(id) => PaymentAccount::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("الحساب غير موجود"))?
            .into(),
        None => payment_account::ActiveModel {
            id: NotSet,
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        },
    };

    active.bank = Set(required(&input.bank, "اسم البنك مطلوب")?);
    active.account_name = Set(required(&input.account_name, "اسم الحساب مطلوب")?);
    active.account_number = Set(required(&input.account_number, "رقم الحساب مطلوب")?);
    active.notes = Set(input.notes);
    active.display_order = Set(input.display_order);
    active.is_active = Set(input.is_active);
    Ok(active.save(db).await?.try_into_model()?)
}

fn check_plan_numbers(price: f64, discount_percentage: f64) -> AppResult<()> {
    if price < 0.0 {
        return Err(AppError::bad_request("السعر غير صالح"));
    }
    if !(0.0..=100.0).contains(&discount_percentage) {
        return Err(AppError::bad_request("نسبة الخصم يجب أن تكون بين 0 و 100"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturedPlanInput {
    pub name: String,
    pub duration_days: i32,
    pub price: f64,
    #[serde(default)]
    pub estimated_views: i32,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
}

pub async fn save_featured_plan(
    db: &DatabaseConnection,
    id: Option<i64>,
    input: FeaturedPlanInput,
) -> AppResult<featured_plan::Model> {
    check_plan_numbers(input.price, input.discount_percentage)?;
    if input.duration_days < 1 {
        return Err(AppError::bad_request("مدة الباقة غير صالحة"));
    }

    let mut active: featured_plan::ActiveModel = match id {
        Some(id) => FeaturedPlan::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("الباقة غير موجودة"))?
            .into(),
        None => featured_plan::ActiveModel {
            id: NotSet,
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        },
    };

    active.name = Set(required(&input.name, "اسم الباقة مطلوب")?);
    active.duration_days = Set(input.duration_days);
    active.price = Set(input.price);
    active.estimated_views = Set(input.estimated_views);
    active.features = Set(input.features);
    active.discount_percentage = Set(input.discount_percentage);
    active.is_popular = Set(input.is_popular);
    active.is_active = Set(input.is_active);
    active.display_order = Set(input.display_order);
    Ok(active.save(db).await?.try_into_model()?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationPlanInput {
    pub name: String,
    pub scope: NotificationScope,
    pub notifications_count: i32,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub is_popular: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
}

pub async fn save_notification_plan(
    db: &DatabaseConnection,
    id: Option<i64>,
    input: NotificationPlanInput,
) -> AppResult<notification_plan::Model> {
    check_plan_numbers(input.price, input.discount_percentage)?;
    if input.notifications_count < 1 {
        return Err(AppError::bad_request("عدد الإشعارات غير صالح"));
    }

    let mut active: notification_plan::ActiveModel = match id {
        Some(id) => NotificationPlan::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("الباقة غير موجودة"))?
            .into(),
        None => notification_plan::ActiveModel {
            id: NotSet,
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        },
    };

    active.name = Set(required(&input.name, "اسم الباقة مطلوب")?);
    active.scope = Set(input.scope);
    active.notifications_count = Set(input.notifications_count);
    active.price = Set(input.price);
    active.discount_percentage = Set(input.discount_percentage);
    active.features = Set(input.features);
    active.is_popular = Set(input.is_popular);
    active.is_active = Set(input.is_active);
    active.display_order = Set(input.display_order);
    Ok(active.save(db).await?.try_into_model()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[tokio::test]
    async fn test_governorate_counts() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 60.0).await;
        create_offer(&db, fixture.merchant.id, None, 100.0, 60.0).await;
        create_governorate(&db, "مأرب").await;

        let summaries = list_governorates(&db).await.unwrap();
        assert_eq!(summaries.len(), 2);
        let sanaa = summaries
            .iter()
            .find(|s| s.governorate.id == fixture.city.governorate_id)
            .unwrap();
        assert_eq!(sanaa.cities_count, 1);
        assert_eq!(sanaa.offers_count, 1);

        let detail = governorate_detail(&db, fixture.city.governorate_id).await.unwrap();
        assert_eq!(detail.cities.len(), 1);
        assert!(matches!(governorate_detail(&db, 999).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_save_city_validation() {
        let db = setup_db().await;
        let governorate = create_governorate(&db, "تعز").await;

        let input = CityInput {
            governorate_id: governorate.id,
            name: "تعز".into(),
            name_en: None,
            latitude: Some(13.57),
            longitude: None,
            is_active: true,
        };
        assert!(matches!(save_city(&db, None, input.clone()).await, Err(AppError::BadRequest(_))));

        let city = save_city(
            &db,
            None,
            CityInput {
                longitude: Some(44.02),
                ..input.clone()
            },
        )
        .await
        .unwrap();
        assert_eq!(list_cities(&db, Some(governorate.id)).await.unwrap().len(), 1);

        let hidden = CityInput {
            longitude: Some(44.02),
            is_active: false,
            ..input
        };
        save_city(&db, Some(city.id), hidden).await.unwrap();
        assert!(list_cities(&db, Some(governorate.id)).await.unwrap().is_empty());

        delete_row::<City>(&db, city.id, "المدينة غير موجودة").await.unwrap();
        assert!(matches!(
            delete_row::<City>(&db, city.id, "المدينة غير موجودة").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_rate_upsert() {
        let db = setup_db().await;
        let input = ExchangeRateInput {
            currency: Currency::Sar,
            region: Region::North,
            rate: 140.0,
        };
        let first = upsert_exchange_rate(&db, input.clone()).await.unwrap();
        let second = upsert_exchange_rate(&db, ExchangeRateInput { rate: 141.5, ..input }).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(list_exchange_rates(&db).await.unwrap().len(), 1);
        assert_eq!(second.rate, 141.5);

        let yer = ExchangeRateInput {
            currency: Currency::Yer,
            region: Region::South,
            rate: 1.0,
        };
        assert!(matches!(upsert_exchange_rate(&db, yer).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_plan_validation() {
        let db = setup_db().await;
        let input = NotificationPlanInput {
            name: "باقة المدينة".into(),
            scope: NotificationScope::City,
            notifications_count: 10,
            price: 5000.0,
            discount_percentage: 120.0,
            features: String::new(),
            is_popular: false,
            is_active: true,
            display_order: 0,
        };
        assert!(matches!(
            save_notification_plan(&db, None, input.clone()).await,
            Err(AppError::BadRequest(_))
        ));

        let plan = save_notification_plan(
            &db,
            None,
            NotificationPlanInput {
                discount_percentage: 10.0,
                ..input
            },
        )
        .await
        .unwrap();
        assert_eq!(plan.discounted_price(), 4500.0);
    }
}
