use sea_orm_migration::prelude::*;

use crate::m20260810_100000_groups::Groups;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Events {
    Table,
    Id,
    GroupId,
    Name,
    /// JSON copy of the group member list at event creation.
    Participants,
    Total,
    Memo,
    Rounding,
    TipRate,
    Currency,
    /// JSON array of optional fixed amounts, one slot per participant.
    FixedAmounts,
    /// JSON object mapping participant index to share weight.
    Weights,
    /// JSON object mapping participant id to amount paid.
    Payments,
    /// JSON cache of the last calculation `{per, details, settlements, total}`.
    Result,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Events::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Events::GroupId).string().not_null())
                    .col(ColumnDef::new(Events::Name).string().not_null())
                    .col(ColumnDef::new(Events::Participants).text().not_null())
                    .col(ColumnDef::new(Events::Total).big_integer().not_null())
                    .col(ColumnDef::new(Events::Memo).string().not_null())
                    .col(ColumnDef::new(Events::Rounding).string().not_null())
                    .col(ColumnDef::new(Events::TipRate).double().not_null())
                    .col(ColumnDef::new(Events::Currency).string().not_null())
                    .col(ColumnDef::new(Events::FixedAmounts).text().not_null())
                    .col(ColumnDef::new(Events::Weights).text().not_null())
                    .col(ColumnDef::new(Events::Payments).text().not_null())
                    .col(ColumnDef::new(Events::Result).text())
                    .col(ColumnDef::new(Events::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-events-group_id")
                            .from(Events::Table, Events::GroupId)
                            .to(Groups::Table, Groups::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-events-group_id-created_at")
                    .table(Events::Table)
                    .col(Events::GroupId)
                    .col(Events::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}
