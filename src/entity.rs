pub mod status;

pub mod user;
pub mod governorate;
pub mod city;
pub mod business_type;
pub mod category;
pub mod exchange_rate;
pub mod merchant;
pub mod merchant_request;
pub mod offer;
pub mod offer_image;
pub mod favorite;
pub mod review;
pub mod payment_account;
pub mod featured_plan;
pub mod featured_request;
pub mod deal_of_day_request;
pub mod notification_plan;
pub mod notification_credit;
pub mod notification_purchase;
pub mod push_notification_log;
pub mod fcm_token;
pub mod notification;
pub mod system_config;

pub use status::*;

pub use user::Entity as User;
pub use governorate::Entity as Governorate;
pub use city::Entity as City;
pub use business_type::Entity as BusinessType;
pub use category::Entity as Category;
pub use exchange_rate::Entity as ExchangeRate;
pub use merchant::Entity as Merchant;
pub use merchant_request::Entity as MerchantRequest;
pub use offer::Entity as Offer;
pub use offer_image::Entity as OfferImage;
pub use favorite::Entity as Favorite;
pub use review::Entity as Review;
pub use payment_account::Entity as PaymentAccount;
pub use featured_plan::Entity as FeaturedPlan;
pub use featured_request::Entity as FeaturedRequest;
pub use deal_of_day_request::Entity as DealOfDayRequest;
pub use notification_plan::Entity as NotificationPlan;
pub use notification_credit::Entity as NotificationCredit;
pub use notification_purchase::Entity as NotificationPurchase;
pub use push_notification_log::Entity as PushNotificationLog;
pub use fcm_token::Entity as FcmToken;
pub use notification::Entity as Notification;
pub use system_config::Entity as SystemConfig;
