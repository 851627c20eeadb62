//! 各实体共用的枚举字段
//!
//! 数据库中保存英文代码，`label()` 返回给前端展示的阿拉伯语名称。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 按字符串代码解析枚举，未知代码返回 None
pub fn parse_code<E>(code: &str) -> Option<E>
where
    E: ActiveEnum<Value = String>,
{
    E::try_from_value(&code.to_string()).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[sea_orm(string_value = "customer")]
    Customer,
    #[sea_orm(string_value = "merchant")]
    Merchant,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl UserType {
    pub fn label(&self) -> &'static str {
        match self {
            UserType::Customer => "عميل",
            UserType::Merchant => "تاجر",
            UserType::Admin => "مدير",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Region {
    #[sea_orm(string_value = "north")]
    North,
    #[sea_orm(string_value = "south")]
    South,
}

impl Region {
    pub fn label(&self) -> &'static str {
        match self {
            Region::North => "الشمال",
            Region::South => "الجنوب",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[sea_orm(string_value = "YER")]
    Yer,
    #[sea_orm(string_value = "SAR")]
    Sar,
    #[sea_orm(string_value = "USD")]
    Usd,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Yer => "ر.ي",
            Currency::Sar => "ر.س",
            Currency::Usd => "$",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Currency::Yer => "ريال يمني",
            Currency::Sar => "ريال سعودي",
            Currency::Usd => "دولار أمريكي",
        }
    }
}

/// 商家及商家申请的审核状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ApprovalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "قيد المراجعة",
            ApprovalStatus::Approved => "مقبول",
            ApprovalStatus::Rejected => "مرفوض",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl OfferStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OfferStatus::Accepted => "مقبول",
            OfferStatus::Draft => "مسودة",
            OfferStatus::Expired => "منتهي",
        }
    }
}

/// 置顶广告与今日特惠申请的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PromotionStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl PromotionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PromotionStatus::Draft => "مسودة",
            PromotionStatus::Pending => "قيد المراجعة",
            PromotionStatus::Active => "نشط",
            PromotionStatus::Rejected => "مرفوض",
            PromotionStatus::Expired => "منتهي",
        }
    }

    /// 可以上传付款凭证的状态
    pub fn accepts_receipt(&self) -> bool {
        matches!(self, PromotionStatus::Draft | PromotionStatus::Rejected)
    }

    /// 同一个优惠同时只能有一个未结束的申请
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            PromotionStatus::Draft | PromotionStatus::Pending | PromotionStatus::Active
        )
    }
}

/// 推送额度购买申请的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl PurchaseStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PurchaseStatus::Draft => "مسودة",
            PurchaseStatus::Pending => "قيد المراجعة",
            PurchaseStatus::Approved => "مقبول",
            PurchaseStatus::Rejected => "مرفوض",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    #[sea_orm(string_value = "city")]
    City,
    #[sea_orm(string_value = "all")]
    All,
}

impl NotificationScope {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationScope::City => "المدينة",
            NotificationScope::All => "جميع المستخدمين",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[sea_orm(string_value = "new_offer")]
    NewOffer,
    #[sea_orm(string_value = "featured_offer")]
    FeaturedOffer,
    #[sea_orm(string_value = "general")]
    General,
    #[sea_orm(string_value = "merchant_approved")]
    MerchantApproved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code::<OfferStatus>("draft"), Some(OfferStatus::Draft));
        assert_eq!(parse_code::<PromotionStatus>("active"), Some(PromotionStatus::Active));
        assert_eq!(parse_code::<Currency>("SAR"), Some(Currency::Sar));
        assert_eq!(parse_code::<OfferStatus>("مقبول"), None);
        assert_eq!(parse_code::<OfferStatus>("published"), None);
    }

    #[test]
    fn test_promotion_status_rules() {
        assert!(PromotionStatus::Draft.accepts_receipt());
        assert!(PromotionStatus::Rejected.accepts_receipt());
        assert!(!PromotionStatus::Pending.accepts_receipt());
        assert!(!PromotionStatus::Active.accepts_receipt());

        assert!(PromotionStatus::Pending.is_open());
        assert!(!PromotionStatus::Expired.is_open());
        assert!(!PromotionStatus::Rejected.is_open());
    }

    #[test]
    fn test_serde_codes() {
        assert_eq!(serde_json::to_string(&UserType::Merchant).unwrap(), "\"merchant\"");
        assert_eq!(serde_json::to_string(&Currency::Yer).unwrap(), "\"YER\"");
        assert_eq!(
            serde_json::to_string(&NotificationType::MerchantApproved).unwrap(),
            "\"merchant_approved\""
        );
    }
}
