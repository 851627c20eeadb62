//! 商家后台统计

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::entity::{favorite, merchant, offer, review, Favorite, Offer, OfferStatus, Review};
use crate::error::AppResult;
use crate::reviews::{self, ReviewView};

pub const DEFAULT_ANALYTICS_DAYS: i64 = 30;
const MAX_ANALYTICS_DAYS: i64 = 365;
const TOP_OFFERS_LIMIT: usize = 5;

/// 增长率（%），保留两位小数；上期为 0 时本期有数据记为 100
pub fn growth_percentage(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    let growth = (current - previous) as f64 / previous as f64 * 100.0;
    (growth * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStatistics {
    pub total_offers: u64,
    pub active_offers: u64,
    pub total_views: i64,
    pub total_favorites: u64,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub recent_views: i64,
    pub expiring_soon: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewsPoint {
    pub date: NaiveDate,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub merchant: merchant::Model,
    pub statistics: DashboardStatistics,
    pub chart_data: Vec<ViewsPoint>,
    pub recent_reviews: Vec<ReviewView>,
}

/// 某一天创建的优惠的浏览数之和
fn views_on(offers: &[offer::Model], date: NaiveDate) -> i64 {
    offers
        .iter()
        .filter(|o| o.created_at.date() == date)
        .map(|o| o.views_count)
        .sum()
}

fn views_between(offers: &[offer::Model], start: NaiveDateTime, end: Option<NaiveDateTime>) -> i64 {
    offers
        .iter()
        .filter(|o| o.created_at >= start && end.map_or(true, |end| o.created_at < end))
        .map(|o| o.views_count)
        .sum()
}

async fn merchant_offers(db: &DatabaseConnection, merchant_id: i64) -> AppResult<Vec<offer::Model>> {
    Ok(Offer::find()
        .filter(offer::Column::MerchantId.eq(merchant_id))
        .all(db)
        .await?)
}

async fn merchant_favorites(db: &DatabaseConnection, offer_ids: Vec<i64>) -> AppResult<Vec<favorite::Model>> {
    Ok(Favorite::find()
        .filter(favorite::Column::OfferId.is_in(offer_ids))
        .all(db)
        .await?)
}

pub async fn dashboard(db: &DatabaseConnection, merchant: merchant::Model, now: NaiveDateTime) -> AppResult<Dashboard> {
    let offers = merchant_offers(db, merchant.id).await?;
    let favorites = merchant_favorites(db, offers.iter().map(|o| o.id).collect()).await?;

    let soon = now + Duration::days(3);
    let statistics = DashboardStatistics {
        total_offers: offers.len() as u64,
        active_offers: offers.iter().filter(|o| o.status == OfferStatus::Accepted).count() as u64,
        total_views: offers.iter().map(|o| o.views_count).sum(),
        total_favorites: favorites.len() as u64,
        average_rating: merchant.average_rating,
        total_reviews: merchant.reviews_count,
        recent_views: views_between(&offers, now - Duration::days(30), None),
        expiring_soon: offers
            .iter()
            .filter(|o| o.status == OfferStatus::Accepted)
            .filter(|o| o.end_at.is_some_and(|end| end > now && end <= soon))
            .count() as u64,
    };

    let today = now.date();
    let chart_data = (0..7)
        .rev()
        .map(|i| {
            let date = today - Duration::days(i);
            ViewsPoint {
                date,
                views: views_on(&offers, date),
            }
        })
        .collect();

    let recent_reviews = reviews::list_for_merchant(db, merchant.id).await?;

    Ok(Dashboard {
        merchant,
        statistics,
        chart_data,
        recent_reviews,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TopOffer {
    pub id: i64,
    pub title: String,
    pub views_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingBucket {
    pub rating: i32,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub views: i64,
    pub new_offers: u64,
    pub favorites: u64,
    pub reviews: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthComparison {
    pub current_month_views: i64,
    pub last_month_views: i64,
    pub growth_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodData {
    pub period_views: i64,
    pub period_offers: u64,
    pub period_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub top_offers: Vec<TopOffer>,
    pub rating_distribution: Vec<RatingBucket>,
    pub growth_data: Vec<DailyPoint>,
    pub comparison: MonthComparison,
    pub period_data: PeriodData,
    pub total_offers: u64,
    pub active_offers: u64,
    pub total_views: i64,
}

fn month_start(date: NaiveDate) -> NaiveDateTime {
    date.with_day(1).unwrap_or(date).and_time(chrono::NaiveTime::MIN)
}

fn previous_month_start(current_start: NaiveDateTime) -> NaiveDateTime {
    let last_day_of_previous = current_start.date() - Duration::days(1);
    month_start(last_day_of_previous)
}

pub async fn analytics(
    db: &DatabaseConnection,
    merchant: &merchant::Model,
    days: i64,
    now: NaiveDateTime,
) -> AppResult<Analytics> {
    let days = days.clamp(1, MAX_ANALYTICS_DAYS);
    let offers = merchant_offers(db, merchant.id).await?;
    let favorites = merchant_favorites(db, offers.iter().map(|o| o.id).collect()).await?;
    let reviews = Review::find()
        .filter(review::Column::MerchantId.eq(merchant.id))
        .all(db)
        .await?;

    let mut top: Vec<&offer::Model> = offers.iter().collect();
    top.sort_by(|a, b| b.views_count.cmp(&a.views_count).then(b.id.cmp(&a.id)));
    let top_offers = top
        .into_iter()
        .take(TOP_OFFERS_LIMIT)
        .map(|o| TopOffer {
            id: o.id,
            title: o.title.clone(),
            views_count: o.views_count,
        })
        .collect();

    let rating_distribution = (1..=5)
        .map(|rating| RatingBucket {
            rating,
            count: reviews.iter().filter(|r| r.rating == rating).count() as u64,
        })
        .collect();

    // 按天汇总，起点为 days-1 天前
    let first_day = now.date() - Duration::days(days - 1);
    let mut series: BTreeMap<NaiveDate, DailyPoint> = (0..days)
        .map(|i| {
            let date = first_day + Duration::days(i);
            (
                date,
                DailyPoint {
                    date,
                    views: 0,
                    new_offers: 0,
                    favorites: 0,
                    reviews: 0,
                },
            )
        })
        .collect();
    for o in &offers {
        if let Some(point) = series.get_mut(&o.created_at.date()) {
            point.views += o.views_count;
            point.new_offers += 1;
        }
    }
    for f in &favorites {
        if let Some(point) = series.get_mut(&f.created_at.date()) {
            point.favorites += 1;
        }
    }
    for r in &reviews {
        if let Some(point) = series.get_mut(&r.created_at.date()) {
            point.reviews += 1;
        }
    }
    let growth_data: Vec<DailyPoint> = series.into_values().collect();

    let current_start = month_start(now.date());
    let previous_start = previous_month_start(current_start);
    let current_month_views = views_between(&offers, current_start, None);
    let last_month_views = views_between(&offers, previous_start, Some(current_start));

    Ok(Analytics {
        top_offers,
        rating_distribution,
        period_data: PeriodData {
            period_views: growth_data.iter().map(|p| p.views).sum(),
            period_offers: growth_data.iter().map(|p| p.new_offers).sum(),
            period_days: days,
        },
        growth_data,
        comparison: MonthComparison {
            current_month_views,
            last_month_views,
            growth_percentage: growth_percentage(current_month_views, last_month_views),
        },
        total_offers: offers.len() as u64,
        active_offers: offers.iter().filter(|o| o.status == OfferStatus::Accepted).count() as u64,
        total_views: offers.iter().map(|o| o.views_count).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserType;
    use crate::test_support::*;
    use sea_orm::{ActiveModelTrait, Set};

    #[test]
    fn test_growth_percentage() {
        assert_eq!(growth_percentage(0, 0), 0.0);
        assert_eq!(growth_percentage(5, 0), 100.0);
        assert_eq!(growth_percentage(150, 100), 50.0);
        assert_eq!(growth_percentage(50, 100), -50.0);
        assert_eq!(growth_percentage(1, 3), -66.67);
        assert_eq!(growth_percentage(0, 7), -100.0);
    }

    #[test]
    fn test_month_boundaries() {
        let now = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let current = month_start(now.date());
        assert_eq!(current.date(), NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(
            previous_month_start(current).date(),
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
        );

        let january = month_start(NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
        assert_eq!(
            previous_month_start(january).date(),
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
        );
    }

    async fn offer_created_at(
        db: &DatabaseConnection,
        merchant_id: i64,
        created_at: NaiveDateTime,
        views: i64,
    ) -> offer::Model {
        let offer = create_offer(db, merchant_id, None, 100.0, 50.0).await;
        let mut active: offer::ActiveModel = offer.into();
        active.created_at = Set(created_at);
        active.views_count = Set(views);
        active.update(db).await.unwrap()
    }

    #[tokio::test]
    async fn test_analytics_comparison_and_series() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let now = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();

        let this_month = offer_created_at(&db, fixture.merchant.id, now - Duration::days(2), 30).await;
        offer_created_at(&db, fixture.merchant.id, now - Duration::days(20), 20).await;
        offer_created_at(&db, fixture.merchant.id, now - Duration::days(90), 500).await;

        let customer = create_user(&db, "c@tawfir.app", UserType::Customer).await;
        crate::reviews::upsert(&db, customer.id, fixture.merchant.id, 4, None).await.unwrap();

        let result = analytics(&db, &fixture.merchant, 7, now).await.unwrap();

        assert_eq!(result.comparison.current_month_views, 30);
        assert_eq!(result.comparison.last_month_views, 20);
        assert_eq!(result.comparison.growth_percentage, 50.0);

        assert_eq!(result.growth_data.len(), 7);
        let point = result
            .growth_data
            .iter()
            .find(|p| p.date == this_month.created_at.date())
            .unwrap();
        assert_eq!(point.views, 30);
        assert_eq!(point.new_offers, 1);
        assert_eq!(result.period_data.period_views, 30);

        assert_eq!(result.top_offers[0].views_count, 500);
        assert_eq!(result.rating_distribution.len(), 5);
        assert_eq!(result.rating_distribution[3], RatingBucket { rating: 4, count: 1 });
        assert_eq!(result.total_views, 550);
    }

    #[tokio::test]
    async fn test_dashboard_statistics() {
        let db = setup_db().await;
        let fixture = approved_merchant(&db, "m@tawfir.app").await;
        let now = chrono::Utc::now().naive_utc();

        let expiring = offer_created_at(&db, fixture.merchant.id, now, 12).await;
        let mut active: offer::ActiveModel = expiring.clone().into();
        active.end_at = Set(Some(now + Duration::days(2)));
        active.update(&db).await.unwrap();
        offer_created_at(&db, fixture.merchant.id, now - Duration::days(60), 8).await;

        let customer = create_user(&db, "c@tawfir.app", UserType::Customer).await;
        crate::favorites::toggle(&db, customer.id, expiring.id).await.unwrap();

        let result = dashboard(&db, fixture.merchant.clone(), now).await.unwrap();
        assert_eq!(result.statistics.total_offers, 2);
        assert_eq!(result.statistics.total_views, 20);
        assert_eq!(result.statistics.recent_views, 12);
        assert_eq!(result.statistics.total_favorites, 1);
        assert_eq!(result.statistics.expiring_soon, 1);
        assert_eq!(result.chart_data.len(), 7);
        assert_eq!(result.chart_data[6].date, now.date());
        assert_eq!(result.chart_data[6].views, 12);
    }
}
