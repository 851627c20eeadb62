use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SystemConfig::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SystemConfig::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(SystemConfig::Key)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SystemConfig::Value).text().not_null())
                    .col(ColumnDef::new(SystemConfig::Description).string().not_null())
                    .col(ColumnDef::new(SystemConfig::ValueType).string().not_null())
                    .col(
                        ColumnDef::new(SystemConfig::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SystemConfig::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // 插入默认配置
        let mut insert = Query::insert();
        insert.into_table(SystemConfig::Table).columns([
            SystemConfig::Key,
            SystemConfig::Value,
            SystemConfig::Description,
            SystemConfig::ValueType,
        ]);

        let defaults: [(&str, &str, &str, &str); 23] = [
            ("deal_of_day_active", "true", "تفعيل عرض اليوم", "boolean"),
            ("deal_of_day_mode", "\"auto\"", "وضع عرض اليوم: auto تلقائي، paid مدفوع", "string"),
            ("deal_of_day_min_discount", "25", "الحد الأدنى لنسبة الخصم في الوضع التلقائي (%)", "number"),
            ("deal_of_day_price_per_day", "1000", "سعر اليوم الواحد في الوضع المدفوع", "number"),
            ("deal_of_day_max_days", "7", "أقصى عدد أيام لكل طلب", "number"),
            // 在线人数组件
            ("online_users_enabled", "true", "تفعيل ميزة المتواجدون الآن", "boolean"),
            ("online_users_display_mode", "\"full\"", "وضع العرض: full / compact / minimal", "string"),
            ("online_users_position", "\"bottom\"", "موضع العداد", "string"),
            ("online_users_color_scheme", "\"dynamic\"", "نظام الألوان", "string"),
            ("online_users_custom_color", "\"\"", "لون مخصص (#RRGGBB)", "string"),
            ("online_users_opacity", "1.0", "الشفافية (0.5 - 1.0)", "number"),
            ("online_users_show_activity_status", "true", "عرض حالة النشاط", "boolean"),
            ("online_users_show_mini_chart", "true", "عرض الرسم البياني", "boolean"),
            ("online_users_show_pulse_animation", "true", "عرض النبضات", "boolean"),
            ("online_users_auto_hide_on_scroll", "false", "الإخفاء عند التمرير", "boolean"),
            ("online_users_homepage_only", "false", "الصفحة الرئيسية فقط", "boolean"),
            ("online_users_update_interval", "10", "معدل التحديث بالثواني (5 - 60)", "number"),
            ("online_users_min", "25", "الحد الأدنى للمتواجدين", "number"),
            ("online_users_max", "450", "الحد الأقصى للمتواجدين", "number"),
            ("online_users_peak_start", "18", "بداية ساعات الذروة (0 - 23)", "number"),
            ("online_users_peak_end", "23", "نهاية ساعات الذروة (0 - 23)", "number"),
            ("online_users_sound_effects", "false", "المؤثرات الصوتية", "boolean"),
            ("online_users_vibration", "false", "الاهتزاز", "boolean"),
        ];

        for (key, value, description, value_type) in defaults {
            insert.values_panic([
                key.into(),
                value.into(),
                description.into(),
                value_type.into(),
            ]);
        }

        manager.exec_stmt(insert.to_owned()).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SystemConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SystemConfig {
    Table,
    Id,
    Key,
    Value,
    Description,
    ValueType,
    CreatedAt,
    UpdatedAt,
}
