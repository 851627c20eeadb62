use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 governorate 表
        manager
            .create_table(
                Table::create()
                    .table(Governorate::Table)
                    .if_not_exists()
                    .col(big_integer(Governorate::Id).auto_increment().primary_key())
                    .col(string(Governorate::Name))
                    .col(string(Governorate::NameEn))
                    .col(string(Governorate::Region))
                    .col(string_null(Governorate::Icon))
                    .col(string(Governorate::Color).default("#2E7D32"))
                    .col(text_null(Governorate::Description))
                    .col(big_integer_null(Governorate::Population))
                    .col(integer(Governorate::DisplayOrder).default(0))
                    .col(boolean(Governorate::IsActive).default(true))
                    .col(timestamp(Governorate::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // 创建 city 表
        manager
            .create_table(
                Table::create()
                    .table(City::Table)
                    .if_not_exists()
                    .col(big_integer(City::Id).auto_increment().primary_key())
                    .col(big_integer(City::GovernorateId))
                    .col(string(City::Name))
                    .col(string_null(City::NameEn))
                    .col(double_null(City::Latitude))
                    .col(double_null(City::Longitude))
                    .col(boolean(City::IsActive).default(true))
                    .col(timestamp(City::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_city_governorate")
                            .from(City::Table, City::GovernorateId)
                            .to(Governorate::Table, Governorate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_city_governorate_id")
                    .table(City::Table)
                    .col(City::GovernorateId)
                    .to_owned(),
            )
            .await?;

        // 创建 user 表
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(big_integer(User::Id).auto_increment().primary_key())
                    .col(string(User::Email).unique_key())
                    .col(string(User::FullName).default(""))
                    .col(string_null(User::Phone))
                    .col(string_null(User::PasswordHash))
                    .col(string_null(User::GoogleId).unique_key())
                    .col(string(User::UserType).default("customer"))
                    .col(big_integer_null(User::CityId))
                    .col(big_integer_null(User::SelectedCityId))
                    .col(boolean(User::IsVerified).default(false))
                    .col(boolean(User::IsActive).default(true))
                    .col(timestamp(User::CreatedAt))
                    .col(timestamp(User::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_city")
                            .from(User::Table, User::CityId)
                            .to(City::Table, City::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_selected_city")
                            .from(User::Table, User::SelectedCityId)
                            .to(City::Table, City::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // 创建 business_type 表
        manager
            .create_table(
                Table::create()
                    .table(BusinessType::Table)
                    .if_not_exists()
                    .col(big_integer(BusinessType::Id).auto_increment().primary_key())
                    .col(string(BusinessType::Name))
                    .col(string_null(BusinessType::NameEn))
                    .col(string_null(BusinessType::Icon))
                    .col(integer(BusinessType::DisplayOrder).default(0))
                    .col(boolean(BusinessType::IsActive).default(true))
                    .to_owned(),
            )
            .await?;

        // 创建 category 表
        manager
            .create_table(
                Table::create()
                    .table(Category::Table)
                    .if_not_exists()
                    .col(big_integer(Category::Id).auto_increment().primary_key())
                    .col(string(Category::Name))
                    .col(string_null(Category::NameEn))
                    .col(string_null(Category::Icon))
                    .col(string(Category::Color).default("#4CAF50"))
                    .col(integer(Category::DisplayOrder).default(0))
                    .col(boolean(Category::IsActive).default(true))
                    .to_owned(),
            )
            .await?;

        // 创建 exchange_rate 表
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRate::Table)
                    .if_not_exists()
                    .col(big_integer(ExchangeRate::Id).auto_increment().primary_key())
                    .col(string(ExchangeRate::Currency))
                    .col(string(ExchangeRate::Region))
                    .col(double(ExchangeRate::Rate))
                    .col(timestamp(ExchangeRate::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // 同一地区同一币种只有一个汇率
        manager
            .create_index(
                Index::create()
                    .name("idx_exchange_rate_currency_region")
                    .table(ExchangeRate::Table)
                    .col(ExchangeRate::Currency)
                    .col(ExchangeRate::Region)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRate::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Category::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BusinessType::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(City::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Governorate::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum Governorate {
    Table,
    Id,
    Name,
    NameEn,
    Region,
    Icon,
    Color,
    Description,
    Population,
    DisplayOrder,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum City {
    Table,
    Id,
    GovernorateId,
    Name,
    NameEn,
    Latitude,
    Longitude,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
pub enum User {
    Table,
    Id,
    Email,
    FullName,
    Phone,
    PasswordHash,
    GoogleId,
    UserType,
    CityId,
    SelectedCityId,
    IsVerified,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum BusinessType {
    Table,
    Id,
    Name,
    NameEn,
    Icon,
    DisplayOrder,
    IsActive,
}

#[derive(DeriveIden)]
pub enum Category {
    Table,
    Id,
    Name,
    NameEn,
    Icon,
    Color,
    DisplayOrder,
    IsActive,
}

#[derive(DeriveIden)]
enum ExchangeRate {
    Table,
    Id,
    Currency,
    Region,
    Rate,
    UpdatedAt,
}
