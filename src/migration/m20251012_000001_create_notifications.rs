use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use super::m20251001_000001_init::User;
use super::m20251001_000002_create_merchant_offer::Merchant;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 notification_plan 表
        manager
            .create_table(
                Table::create()
                    .table(NotificationPlan::Table)
                    .if_not_exists()
                    .col(big_integer(NotificationPlan::Id).auto_increment().primary_key())
                    .col(string(NotificationPlan::Name))
                    .col(string(NotificationPlan::Scope).default("city"))
                    .col(integer(NotificationPlan::NotificationsCount))
                    .col(double(NotificationPlan::Price))
                    .col(double(NotificationPlan::DiscountPercentage).default(0.0))
                    .col(text(NotificationPlan::Features).default(""))
                    .col(boolean(NotificationPlan::IsPopular).default(false))
                    .col(boolean(NotificationPlan::IsActive).default(true))
                    .col(integer(NotificationPlan::DisplayOrder).default(0))
                    .col(timestamp(NotificationPlan::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // 创建 notification_credit 表
        manager
            .create_table(
                Table::create()
                    .table(NotificationCredit::Table)
                    .if_not_exists()
                    .col(big_integer(NotificationCredit::Id).auto_increment().primary_key())
                    .col(big_integer(NotificationCredit::MerchantId).unique_key())
                    .col(integer(NotificationCredit::CityNotifications).default(0))
                    .col(integer(NotificationCredit::AllNotifications).default(0))
                    .col(integer(NotificationCredit::TotalSent).default(0))
                    .col(timestamp(NotificationCredit::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_credit_merchant")
                            .from(NotificationCredit::Table, NotificationCredit::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 notification_purchase 表
        manager
            .create_table(
                Table::create()
                    .table(NotificationPurchase::Table)
                    .if_not_exists()
                    .col(big_integer(NotificationPurchase::Id).auto_increment().primary_key())
                    .col(big_integer(NotificationPurchase::MerchantId))
                    .col(big_integer(NotificationPurchase::PlanId))
                    .col(string(NotificationPurchase::Status).default("draft"))
                    .col(double(NotificationPurchase::Amount))
                    .col(string_null(NotificationPurchase::Receipt))
                    .col(string_null(NotificationPurchase::PaymentMethod))
                    .col(string_null(NotificationPurchase::TransactionNumber))
                    .col(text_null(NotificationPurchase::AdminNotes))
                    .col(text_null(NotificationPurchase::RejectionReason))
                    .col(timestamp_null(NotificationPurchase::ReviewedAt))
                    .col(timestamp(NotificationPurchase::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_purchase_merchant")
                            .from(NotificationPurchase::Table, NotificationPurchase::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notification_purchase_plan")
                            .from(NotificationPurchase::Table, NotificationPurchase::PlanId)
                            .to(NotificationPlan::Table, NotificationPlan::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 push_notification_log 表
        manager
            .create_table(
                Table::create()
                    .table(PushNotificationLog::Table)
                    .if_not_exists()
                    .col(big_integer(PushNotificationLog::Id).auto_increment().primary_key())
                    .col(big_integer(PushNotificationLog::MerchantId))
                    .col(big_integer_null(PushNotificationLog::OfferId))
                    .col(string(PushNotificationLog::Scope))
                    .col(string(PushNotificationLog::Title))
                    .col(text(PushNotificationLog::Body))
                    .col(integer(PushNotificationLog::RecipientsCount).default(0))
                    .col(integer(PushNotificationLog::SuccessCount).default(0))
                    .col(integer(PushNotificationLog::FailureCount).default(0))
                    .col(timestamp(PushNotificationLog::SentAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_push_log_merchant")
                            .from(PushNotificationLog::Table, PushNotificationLog::MerchantId)
                            .to(Merchant::Table, Merchant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 fcm_token 表
        manager
            .create_table(
                Table::create()
                    .table(FcmToken::Table)
                    .if_not_exists()
                    .col(big_integer(FcmToken::Id).auto_increment().primary_key())
                    .col(big_integer(FcmToken::UserId).unique_key())
                    .col(text(FcmToken::Token))
                    .col(string_null(FcmToken::DeviceType))
                    .col(boolean(FcmToken::IsActive).default(true))
                    .col(timestamp(FcmToken::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_fcm_token_user")
                            .from(FcmToken::Table, FcmToken::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 notification 表（管理员群发记录）
        manager
            .create_table(
                Table::create()
                    .table(Notification::Table)
                    .if_not_exists()
                    .col(big_integer(Notification::Id).auto_increment().primary_key())
                    .col(string(Notification::Title))
                    .col(text(Notification::Body))
                    .col(string(Notification::NotificationType).default("general"))
                    .col(string(Notification::Target).default("all"))
                    .col(integer(Notification::RecipientsCount).default(0))
                    .col(integer(Notification::SuccessCount).default(0))
                    .col(big_integer_null(Notification::SentBy))
                    .col(timestamp(Notification::CreatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notification::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(FcmToken::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PushNotificationLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NotificationPurchase::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NotificationCredit::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NotificationPlan::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum NotificationPlan {
    Table,
    Id,
    Name,
    Scope,
    NotificationsCount,
    Price,
    DiscountPercentage,
    Features,
    IsPopular,
    IsActive,
    DisplayOrder,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NotificationCredit {
    Table,
    Id,
    MerchantId,
    CityNotifications,
    AllNotifications,
    TotalSent,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum NotificationPurchase {
    Table,
    Id,
    MerchantId,
    PlanId,
    Status,
    Amount,
    Receipt,
    PaymentMethod,
    TransactionNumber,
    AdminNotes,
    RejectionReason,
    ReviewedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PushNotificationLog {
    Table,
    Id,
    MerchantId,
    OfferId,
    Scope,
    Title,
    Body,
    RecipientsCount,
    SuccessCount,
    FailureCount,
    SentAt,
}

#[derive(DeriveIden)]
enum FcmToken {
    Table,
    Id,
    UserId,
    Token,
    DeviceType,
    IsActive,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Notification {
    Table,
    Id,
    Title,
    Body,
    NotificationType,
    Target,
    RecipientsCount,
    SuccessCount,
    SentBy,
    CreatedAt,
}
