pub use sea_orm_migration::prelude::*;

mod m20260810_090000_users;
mod m20260810_100000_groups;
mod m20260810_110000_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260810_090000_users::Migration),
            Box::new(m20260810_100000_groups::Migration),
            Box::new(m20260810_110000_events::Migration),
        ]
    }
}
