use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use super::m20251001_000002_create_merchant_offer::{Merchant, Offer};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 payment_account 表
        manager
            .create_table(
                Table::create()
                    .table(PaymentAccount::Table)
                    .if_not_exists()
                    .col(big_integer(PaymentAccount::Id).auto_increment().primary_key())
                    .col(string(PaymentAccount::Bank))
                    .col(string(PaymentAccount::AccountName))
                    .col(string(PaymentAccount::AccountNumber))
                    .col(boolean(PaymentAccount::IsActive).default(true))
                    .col(integer(PaymentAccount::DisplayOrder).default(0))
                    .col(text_null(PaymentAccount::Notes))
                    .col(timestamp(PaymentAccount::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // 创建 featured_plan 表
        manager
            .create_table(
                Table::create()
                    .table(FeaturedPlan::Table)
                    .if_not_exists()
                    .col(big_integer(FeaturedPlan::Id).auto_increment().primary_key())
                    .col(string(FeaturedPlan::Name))
                    .col(integer(FeaturedPlan::DurationDays))
                    .col(double(FeaturedPlan::Price))
                    .col(integer(FeaturedPlan::EstimatedViews).default(0))
                    .col(text(FeaturedPlan::Features).default(""))
                    .col(double(FeaturedPlan::DiscountPercentage).default(0.0))
                    .col(boolean(FeaturedPlan::IsPopular).default(false))
                    .col(boolean(FeaturedPlan::IsActive).default(true))
                    .col(integer(FeaturedPlan::DisplayOrder).default(0))
                    .col(timestamp(FeaturedPlan::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // 创建 featured_request 表
        manager
            .create_table(
                Table::create()
                    .table(FeaturedRequest::Table)
                    .if_not_exists()
                    .col(big_integer(FeaturedRequest::Id).auto_increment().primary_key())
                    .col(big_integer(FeaturedRequest::MerchantId))
                    .col(big_integer(FeaturedRequest::OfferId))
                    .col(big_integer(FeaturedRequest::PlanId))
                    .col(string(FeaturedRequest::Status).default("draft"))
                    .col(double(FeaturedRequest::Amount))
                    .col(string_null(FeaturedRequest::Receipt))
                    .col(string_null(FeaturedRequest::PaymentMethod))
                    .col(string_null(FeaturedRequest::TransactionNumber))
                    .col(timestamp_null(FeaturedRequest::StartDate))
                    .col(timestamp_null(FeaturedRequest::EndDate))
                    .col(big_integer(FeaturedRequest::ViewsCount).default(0))
                    .col(big_integer(FeaturedRequest::ClicksCount).default(0))
                    .col(big_integer(FeaturedRequest::FavoritesCount).default(0))
                    .col(text_null(FeaturedRequest::AdminNotes))
                    .col(text_null(FeaturedRequest::RejectionReason))
                    .col(timestamp_null(FeaturedRequest::ReviewedAt))
                    .col(timestamp(FeaturedRequest::CreatedAt))
                    .col(timestamp(FeaturedRequest::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_featured_request_merchant")
                            .from(FeaturedRequest::Table, FeaturedRequest::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_featured_request_offer")
                            .from(FeaturedRequest::Table, FeaturedRequest::OfferId)
                            .to(Offer::Table, Offer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_featured_request_plan")
                            .from(FeaturedRequest::Table, FeaturedRequest::PlanId)
                            .to(FeaturedPlan::Table, FeaturedPlan::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_featured_request_status_end")
                    .table(FeaturedRequest::Table)
                    .col(FeaturedRequest::Status)
                    .col(FeaturedRequest::EndDate)
                    .to_owned(),
            )
            .await?;

        // 创建 deal_of_day_request 表
        manager
            .create_table(
                Table::create()
                    .table(DealOfDayRequest::Table)
                    .if_not_exists()
                    .col(big_integer(DealOfDayRequest::Id).auto_increment().primary_key())
                    .col(big_integer(DealOfDayRequest::MerchantId))
                    .col(big_integer(DealOfDayRequest::OfferId))
                    .col(integer(DealOfDayRequest::DurationDays).default(1))
                    .col(double(DealOfDayRequest::PricePerDay))
                    .col(double(DealOfDayRequest::TotalPrice))
                    .col(string(DealOfDayRequest::Status).default("draft"))
                    .col(string_null(DealOfDayRequest::Receipt))
                    .col(string_null(DealOfDayRequest::PaymentMethod))
                    .col(string_null(DealOfDayRequest::TransactionNumber))
                    .col(timestamp_null(DealOfDayRequest::StartDate))
                    .col(timestamp_null(DealOfDayRequest::EndDate))
                    .col(big_integer(DealOfDayRequest::ViewsCount).default(0))
                    .col(big_integer(DealOfDayRequest::ClicksCount).default(0))
                    .col(text_null(DealOfDayRequest::AdminNotes))
                    .col(text_null(DealOfDayRequest::RejectionReason))
                    .col(timestamp_null(DealOfDayRequest::ReviewedAt))
                    .col(timestamp(DealOfDayRequest::CreatedAt))
                    .col(timestamp(DealOfDayRequest::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_request_merchant")
                            .from(DealOfDayRequest::Table, DealOfDayRequest::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_request_offer")
                            .from(DealOfDayRequest::Table, DealOfDayRequest::OfferId)
                            .to(Offer::Table, Offer::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deal_request_status_end")
                    .table(DealOfDayRequest::Table)
                    .col(DealOfDayRequest::Status)
                    .col(DealOfDayRequest::EndDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DealOfDayRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FeaturedRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FeaturedPlan::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PaymentAccount::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum PaymentAccount {
    Table,
    Id,
    Bank,
    AccountName,
    AccountNumber,
    IsActive,
    DisplayOrder,
    Notes,
    CreatedAt,
}

#[derive(DeriveIden)]
enum FeaturedPlan {
    Table,
    Id,
    Name,
    DurationDays,
    Price,
    EstimatedViews,
    Features,
    DiscountPercentage,
    IsPopular,
    IsActive,
    DisplayOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum FeaturedRequest {
    Table,
    Id,
    MerchantId,
    OfferId,
    PlanId,
    Status,
    Amount,
    Receipt,
    PaymentMethod,
    TransactionNumber,
    StartDate,
    EndDate,
    ViewsCount,
    ClicksCount,
    FavoritesCount,
    AdminNotes,
    RejectionReason,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum DealOfDayRequest {
    Table,
    Id,
    MerchantId,
    OfferId,
    DurationDays,
    PricePerDay,
    TotalPrice,
    Status,
    Receipt,
    PaymentMethod,
    TransactionNumber,
    StartDate,
    EndDate,
    ViewsCount,
    ClicksCount,
    AdminNotes,
    RejectionReason,
    ReviewedAt,
    CreatedAt,
    UpdatedAt,
}
