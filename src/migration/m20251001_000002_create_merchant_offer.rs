use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use super::m20251001_000001_init::{BusinessType, Category, City, Governorate, User};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 merchant 表
        manager
            .create_table(
                Table::create()
                    .table(Merchant::Table)
                    .if_not_exists()
                    .col(big_integer(Merchant::Id).auto_increment().primary_key())
                    .col(big_integer(Merchant::UserId).unique_key())
                    .col(string(Merchant::BusinessName))
                    .col(big_integer_null(Merchant::BusinessTypeId))
                    .col(text_null(Merchant::Description))
                    .col(string(Merchant::Status).default("pending"))
                    .col(big_integer_null(Merchant::GovernorateId))
                    .col(big_integer_null(Merchant::CityId))
                    .col(double_null(Merchant::Latitude))
                    .col(double_null(Merchant::Longitude))
                    .col(string_null(Merchant::Phone))
                    .col(string_null(Merchant::Whatsapp))
                    .col(string_null(Merchant::Address))
                    .col(string_null(Merchant::OpeningHours))
                    .col(string_null(Merchant::Logo))
                    .col(string_null(Merchant::DeliveryPhone))
                    .col(double(Merchant::AverageRating).default(0.0))
                    .col(integer(Merchant::ReviewsCount).default(0))
                    .col(integer(Merchant::OffersCount).default(0))
                    .col(timestamp(Merchant::CreatedAt))
                    .col(timestamp(Merchant::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_merchant_user")
                            .from(Merchant::Table, Merchant::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_merchant_business_type")
                            .from(Merchant::Table, Merchant::BusinessTypeId)
                            .to(BusinessType::Table, BusinessType::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_merchant_governorate")
                            .from(Merchant::Table, Merchant::GovernorateId)
                            .to(Governorate::Table, Governorate::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_merchant_city")
                            .from(Merchant::Table, Merchant::CityId)
                            .to(City::Table, City::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 merchant_request 表
        manager
            .create_table(
                Table::create()
                    .table(MerchantRequest::Table)
                    .if_not_exists()
                    .col(big_integer(MerchantRequest::Id).auto_increment().primary_key())
                    .col(big_integer(MerchantRequest::UserId))
                    .col(string(MerchantRequest::BusinessName))
                    .col(big_integer_null(MerchantRequest::BusinessTypeId))
                    .col(big_integer(MerchantRequest::GovernorateId))
                    .col(big_integer(MerchantRequest::CityId))
                    .col(string(MerchantRequest::Phone))
                    .col(string_null(MerchantRequest::Address))
                    .col(text_null(MerchantRequest::Description))
                    .col(string(MerchantRequest::Status).default("pending"))
                    .col(text_null(MerchantRequest::RejectionReason))
                    .col(timestamp_null(MerchantRequest::ReviewedAt))
                    .col(timestamp(MerchantRequest::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_merchant_request_user")
                            .from(MerchantRequest::Table, MerchantRequest::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_merchant_request_city")
                            .from(MerchantRequest::Table, MerchantRequest::CityId)
                            .to(City::Table, City::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 offer 表
        manager
            .create_table(
                Table::create()
                    .table(Offer::Table)
                    .if_not_exists()
                    .col(big_integer(Offer::Id).auto_increment().primary_key())
                    .col(big_integer(Offer::MerchantId))
                    .col(string(Offer::Title))
                    .col(text(Offer::Description).default(""))
                    .col(big_integer_null(Offer::CategoryId))
                    .col(big_integer_null(Offer::CityId))
                    .col(double(Offer::PriceBefore))
                    .col(double(Offer::PriceAfter))
                    .col(string(Offer::Currency).default("YER"))
                    .col(timestamp_null(Offer::EndAt))
                    .col(string(Offer::Status).default("draft"))
                    .col(boolean(Offer::IsFeatured).default(false))
                    .col(timestamp_null(Offer::FeaturedUntil))
                    .col(boolean(Offer::IsDealOfDay).default(false))
                    .col(timestamp_null(Offer::DealOfDayUntil))
                    .col(big_integer(Offer::ViewsCount).default(0))
                    .col(boolean(Offer::DeliveryEnabled).default(false))
                    .col(timestamp(Offer::CreatedAt))
                    .col(timestamp(Offer::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_offer_merchant")
                            .from(Offer::Table, Offer::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_offer_category")
                            .from(Offer::Table, Offer::CategoryId)
                            .to(Category::Table, Category::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_offer_city")
                            .from(Offer::Table, Offer::CityId)
                            .to(City::Table, City::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_offer_merchant_id")
                    .table(Offer::Table)
                    .col(Offer::MerchantId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_offer_status_city")
                    .table(Offer::Table)
                    .col(Offer::Status)
                    .col(Offer::CityId)
                    .to_owned(),
            )
            .await?;

        // 创建 offer_image 表
        manager
            .create_table(
                Table::create()
                    .table(OfferImage::Table)
                    .if_not_exists()
                    .col(big_integer(OfferImage::Id).auto_increment().primary_key())
                    .col(big_integer(OfferImage::OfferId))
                    .col(string(OfferImage::Image))
                    .col(integer(OfferImage::DisplayOrder).default(0))
                    .col(timestamp(OfferImage::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_offer_image_offer")
                            .from(OfferImage::Table, OfferImage::OfferId)
                            .to(Offer::Table, Offer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 favorite 表
        manager
            .create_table(
                Table::create()
                    .table(Favorite::Table)
                    .if_not_exists()
                    .col(big_integer(Favorite::Id).auto_increment().primary_key())
                    .col(big_integer(Favorite::UserId))
                    .col(big_integer(Favorite::OfferId))
                    .col(timestamp(Favorite::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorite_user")
                            .from(Favorite::Table, Favorite::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_favorite_offer")
                            .from(Favorite::Table, Favorite::OfferId)
                            .to(Offer::Table, Offer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一用户对同一优惠只能收藏一次
        manager
            .create_index(
                Index::create()
                    .name("idx_favorite_user_offer")
                    .table(Favorite::Table)
                    .col(Favorite::UserId)
                    .col(Favorite::OfferId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 创建 review 表
        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(big_integer(Review::Id).auto_increment().primary_key())
                    .col(big_integer(Review::UserId))
                    .col(big_integer(Review::MerchantId))
                    .col(integer(Review::Rating))
                    .col(text_null(Review::Comment))
                    .col(timestamp(Review::CreatedAt))
                    .col(timestamp(Review::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_user")
                            .from(Review::Table, Review::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_merchant")
                            .from(Review::Table, Review::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 每个用户对每个商家只有一条评价
        manager
            .create_index(
                Index::create()
                    .name("idx_review_user_merchant")
                    .table(Review::Table)
                    .col(Review::UserId)
                    .col(Review::MerchantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Review::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Favorite::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OfferImage::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Offer::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MerchantRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Merchant::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Merchant {
    Table,
    Id,
    UserId,
    BusinessName,
    BusinessTypeId,
    Description,
    Status,
    GovernorateId,
    CityId,
    Latitude,
    Longitude,
    Phone,
    Whatsapp,
    Address,
    OpeningHours,
    Logo,
    DeliveryPhone,
    AverageRating,
    ReviewsCount,
    OffersCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MerchantRequest {
    Table,
    Id,
    UserId,
    BusinessName,
    BusinessTypeId,
    GovernorateId,
    CityId,
    Phone,
    Address,
    Description,
    Status,
    RejectionReason,
    ReviewedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum Offer {
    Table,
    Id,
    MerchantId,
    Title,
    Description,
    CategoryId,
    CityId,
    PriceBefore,
    PriceAfter,
    Currency,
    EndAt,
    Status,
    IsFeatured,
    FeaturedUntil,
    IsDealOfDay,
    DealOfDayUntil,
    ViewsCount,
    DeliveryEnabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OfferImage {
    Table,
    Id,
    OfferId,
    Image,
    DisplayOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Favorite {
    Table,
    Id,
    UserId,
    OfferId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    UserId,
    MerchantId,
    Rating,
    Comment,
    CreatedAt,
    UpdatedAt,
}
