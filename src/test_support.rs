//! 测试用的内存数据库与数据构造函数

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, NotSet, Set};
use sea_orm_migration::MigratorTrait;

use crate::entity::{
    city, featured_plan, governorate, merchant, offer, user, ApprovalStatus, Currency, OfferStatus,
    Region, UserType,
};
use crate::migration::Migrator;

pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn create_user(db: &DatabaseConnection, email: &str, user_type: UserType) -> user::Model {
    let now = Utc::now().naive_utc();
    user::ActiveModel {
        id: NotSet,
        email: Set(email.to_string()),
        full_name: Set(String::new()),
        phone: Set(None),
        password_hash: Set(None),
        google_id: Set(None),
        user_type: Set(user_type),
        city_id: Set(None),
        selected_city_id: Set(None),
        is_verified: Set(true),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_governorate(db: &DatabaseConnection, name: &str) -> governorate::Model {
    governorate::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        name_en: Set(name.to_string()),
        region: Set(Region::North),
        icon: Set(None),
        color: Set("#2E7D32".to_string()),
        description: Set(None),
        population: Set(None),
        display_order: Set(0),
        is_active: Set(true),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_city(
    db: &DatabaseConnection,
    governorate_id: i64,
    name: &str,
    coordinates: Option<(f64, f64)>,
) -> city::Model {
    city::ActiveModel {
        id: NotSet,
        governorate_id: Set(governorate_id),
        name: Set(name.to_string()),
        name_en: Set(None),
        latitude: Set(coordinates.map(|c| c.0)),
        longitude: Set(coordinates.map(|c| c.1)),
        is_active: Set(true),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_merchant(
    db: &DatabaseConnection,
    user_id: i64,
    city_id: Option<i64>,
    status: ApprovalStatus,
) -> merchant::Model {
    let now = Utc::now().naive_utc();
    merchant::ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        business_name: Set(format!("متجر {}", user_id)),
        business_type_id: Set(None),
        description: Set(None),
        status: Set(status),
        governorate_id: Set(None),
        city_id: Set(city_id),
        latitude: Set(None),
        longitude: Set(None),
        phone: Set(None),
        whatsapp: Set(None),
        address: Set(None),
        opening_hours: Set(None),
        logo: Set(None),
        delivery_phone: Set(None),
        average_rating: Set(0.0),
        reviews_count: Set(0),
        offers_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

/// 已审核状态的优惠
pub async fn create_offer(
    db: &DatabaseConnection,
    merchant_id: i64,
    city_id: Option<i64>,
    price_before: f64,
    price_after: f64,
) -> offer::Model {
    let now = Utc::now().naive_utc();
    offer::ActiveModel {
        id: NotSet,
        merchant_id: Set(merchant_id),
        title: Set(format!("عرض {}", price_after)),
        description: Set(String::new()),
        category_id: Set(None),
        city_id: Set(city_id),
        price_before: Set(price_before),
        price_after: Set(price_after),
        currency: Set(Currency::Yer),
        end_at: Set(None),
        status: Set(OfferStatus::Accepted),
        is_featured: Set(false),
        featured_until: Set(None),
        is_deal_of_day: Set(false),
        deal_of_day_until: Set(None),
        views_count: Set(0),
        delivery_enabled: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn create_featured_plan(db: &DatabaseConnection, duration_days: i32, price: f64) -> featured_plan::Model {
    featured_plan::ActiveModel {
        id: NotSet,
        name: Set(format!("باقة {} أيام", duration_days)),
        duration_days: Set(duration_days),
        price: Set(price),
        estimated_views: Set(1000),
        features: Set(String::new()),
        discount_percentage: Set(0.0),
        is_popular: Set(false),
        is_active: Set(true),
        display_order: Set(0),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap()
}

/// 一个已审核商家及其所在城市
pub struct MerchantFixture {
    pub owner: user::Model,
    pub city: city::Model,
    pub merchant: merchant::Model,
}

pub async fn approved_merchant(db: &DatabaseConnection, email: &str) -> MerchantFixture {
    let governorate = create_governorate(db, "صنعاء").await;
    let city = create_city(db, governorate.id, "صنعاء", Some((15.3694, 44.1910))).await;
    let owner = create_user(db, email, UserType::Merchant).await;
    let merchant = create_merchant(db, owner.id, Some(city.id), ApprovalStatus::Approved).await;
    MerchantFixture { owner, city, merchant }
}
