//! 附近优惠：按 haversine 距离排序

use chrono::Utc;
use rand::Rng;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use std::collections::HashMap;

use crate::entity::{city, merchant, offer, City, Merchant, Offer, OfferStatus};
use crate::error::AppResult;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// 没有商家坐标时在城市中心附近随机偏移的最大距离
const MAX_JITTER_KM: f64 = 5.0;

pub const NEARBY_LIMIT: usize = 7;

/// 两点间球面距离（公里）
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// 城市坐标的随机偏移来源，测试里替换成固定值
pub trait Jitter: Send + Sync {
    /// 返回 0..=MAX_JITTER_KM 之间的偏移（公里）
    fn offset_km(&mut self) -> f64;
}

pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn offset_km(&mut self) -> f64 {
        rand::rng().random_range(0.0..=MAX_JITTER_KM)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyOffer {
    pub offer: offer::Model,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyResult {
    pub use_gps: bool,
    pub offers: Vec<NearbyOffer>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 查询附近优惠
///
/// 有坐标时对所有有效优惠计算距离取最近的若干条；商家没有坐标时用城市中心加随机偏移。
/// 没有坐标时退化为城市内最新的优惠。
pub async fn nearby_offers(
    db: &DatabaseConnection,
    position: Option<(f64, f64)>,
    city_id: Option<i64>,
    jitter: &mut dyn Jitter,
) -> AppResult<NearbyResult> {
    let now = Utc::now().naive_utc();
    let active = Condition::all()
        .add(offer::Column::Status.eq(OfferStatus::Accepted))
        .add(
            Condition::any()
                .add(offer::Column::EndAt.is_null())
                .add(offer::Column::EndAt.gt(now)),
        );

    let Some((lat, lng)) = position else {
        let mut query = Offer::find().filter(active);
        if let Some(city_id) = city_id {
            query = query.filter(offer::Column::CityId.eq(city_id));
        }
        let offers = query
            .order_by_desc(offer::Column::CreatedAt)
            .limit(NEARBY_LIMIT as u64)
            .all(db)
            .await?;

        return Ok(NearbyResult {
            use_gps: false,
            offers: offers
                .into_iter()
                .map(|offer| NearbyOffer { offer, distance_km: None })
                .collect(),
        });
    };

    let offers = Offer::find().filter(active).all(db).await?;

    let merchant_ids: Vec<i64> = offers.iter().map(|o| o.merchant_id).collect();
    let merchants: HashMap<i64, merchant::Model> = Merchant::find()
        .filter(merchant::Column::Id.is_in(merchant_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let city_ids: Vec<i64> = offers.iter().filter_map(|o| o.city_id).collect();
    let cities: HashMap<i64, city::Model> = City::find()
        .filter(city::Column::Id.is_in(city_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut ranked: Vec<(f64, offer::Model)> = offers
        .into_iter()
        .filter_map(|offer| {
            let merchant_position = merchants.get(&offer.merchant_id).and_then(|m| m.coordinates());
            let distance = match merchant_position {
                Some((m_lat, m_lng)) => haversine_km(lat, lng, m_lat, m_lng),
                None => {
                    let (c_lat, c_lng) = offer
                        .city_id
                        .and_then(|id| cities.get(&id))
                        .and_then(|c| c.coordinates())?;
                    haversine_km(lat, lng, c_lat, c_lng) + jitter.offset_km()
                }
            };
            Some((distance, offer))
        })
        .collect();

    // 按原始距离排序，展示时才保留一位小数
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.truncate(NEARBY_LIMIT);

    Ok(NearbyResult {
        use_gps: true,
        offers: ranked
            .into_iter()
            .map(|(distance, offer)| NearbyOffer {
                offer,
                distance_km: Some(round1(distance)),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{merchant, ApprovalStatus, UserType};
    use crate::test_support::*;
    use sea_orm::{ActiveModelTrait, Set};

    struct FixedJitter(f64);

    impl Jitter for FixedJitter {
        fn offset_km(&mut self) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_haversine_known_distances() {
        assert_eq!(haversine_km(15.0, 44.0, 15.0, 44.0), 0.0);

        // 经度差 1 度在赤道上约 111.19 公里
        let one_degree = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((one_degree - 111.19).abs() < 0.01, "{}", one_degree);

        // 萨那到亚丁约 300 公里
        let sanaa_aden = haversine_km(15.3694, 44.1910, 12.7855, 45.0187);
        assert!((sanaa_aden - 300.0).abs() < 15.0, "{}", sanaa_aden);

        assert_eq!(
            haversine_km(15.3694, 44.1910, 12.7855, 45.0187),
            haversine_km(12.7855, 45.0187, 15.3694, 44.1910)
        );
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(3.14159), 3.1);
        assert_eq!(round1(2.96), 3.0);
    }

    #[tokio::test]
    async fn test_nearby_ranks_by_distance() {
        let db = setup_db().await;
        let gov = create_governorate(&db, "عدن").await;
        let far_city = create_city(&db, gov.id, "عدن", Some((12.7855, 45.0187))).await;
        let near_city = create_city(&db, gov.id, "صنعاء", Some((15.3694, 44.1910))).await;

        // 商家自带坐标，离查询点很近
        let u1 = create_user(&db, "m1@tawfir.app", UserType::Merchant).await;
        let m1 = create_merchant(&db, u1.id, Some(near_city.id), ApprovalStatus::Approved).await;
        let mut active: merchant::ActiveModel = m1.clone().into();
        active.latitude = Set(Some(15.37));
        active.longitude = Set(Some(44.20));
        active.update(&db).await.unwrap();
        let near_offer = create_offer(&db, m1.id, Some(near_city.id), 100.0, 50.0).await;

        // 商家没有坐标，用城市中心
        let u2 = create_user(&db, "m2@tawfir.app", UserType::Merchant).await;
        let m2 = create_merchant(&db, u2.id, Some(far_city.id), ApprovalStatus::Approved).await;
        let far_offer = create_offer(&db, m2.id, Some(far_city.id), 100.0, 80.0).await;

        // 既没有商家坐标也没有城市，被跳过
        let u3 = create_user(&db, "m3@tawfir.app", UserType::Merchant).await;
        let m3 = create_merchant(&db, u3.id, None, ApprovalStatus::Approved).await;
        create_offer(&db, m3.id, None, 100.0, 90.0).await;

        let mut jitter = FixedJitter(2.0);
        let result = nearby_offers(&db, Some((15.3694, 44.1910)), None, &mut jitter)
            .await
            .unwrap();

        assert!(result.use_gps);
        assert_eq!(result.offers.len(), 2);
        assert_eq!(result.offers[0].offer.id, near_offer.id);
        assert_eq!(result.offers[1].offer.id, far_offer.id);

        let expected = round1(haversine_km(15.3694, 44.1910, 12.7855, 45.0187) + 2.0);
        assert_eq!(result.offers[1].distance_km, Some(expected));
    }

    #[tokio::test]
    async fn test_nearby_orders_by_unrounded_distance() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "base@tawfir.app").await;

        // 约 1.04 公里与 1.01 公里，显示时都是 1.0
        let mut offer_ids = Vec::new();
        for (email, lat) in [("a@tawfir.app", 15.00935), ("b@tawfir.app", 15.00908)] {
            let owner = create_user(&db, email, UserType::Merchant).await;
            let m = create_merchant(&db, owner.id, Some(fixture.city.id), ApprovalStatus::Approved).await;
            let mut active: merchant::ActiveModel = m.clone().into();
            active.latitude = Set(Some(lat));
            active.longitude = Set(Some(44.0));
            active.update(&db).await.unwrap();
            offer_ids.push(create_offer(&db, m.id, Some(fixture.city.id), 100.0, 50.0).await.id);
        }

        let mut jitter = FixedJitter(0.0);
        let result = nearby_offers(&db, Some((15.0, 44.0)), None, &mut jitter)
            .await
            .unwrap();

        let ranked: Vec<i64> = result
            .offers
            .iter()
            .filter(|o| offer_ids.contains(&o.offer.id))
            .map(|o| o.offer.id)
            .collect();
        assert_eq!(ranked, vec![offer_ids[1], offer_ids[0]]);
        assert!(result
            .offers
            .iter()
            .filter(|o| offer_ids.contains(&o.offer.id))
            .all(|o| o.distance_km == Some(1.0)));
    }

    #[tokio::test]
    async fn test_nearby_without_position_falls_back_to_city() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        for i in 0..9 {
            create_offer(&db, fixture.merchant.id, Some(fixture.city.id), 100.0, 90.0 - i as f64).await;
        }
        let other_city = create_city(&db, fixture.city.governorate_id, "ذمار", None).await;
        create_offer(&db, fixture.merchant.id, Some(other_city.id), 100.0, 10.0).await;

        let mut jitter = FixedJitter(0.0);
        let result = nearby_offers(&db, None, Some(fixture.city.id), &mut jitter)
            .await
            .unwrap();

        assert!(!result.use_gps);
        assert_eq!(result.offers.len(), NEARBY_LIMIT);
        assert!(result.offers.iter().all(|o| o.offer.city_id == Some(fixture.city.id)));
        assert!(result.offers.iter().all(|o| o.distance_km.is_none()));
    }
}
