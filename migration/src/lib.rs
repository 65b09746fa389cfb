//! Database migrations for the transcript intake service.

pub use sea_orm_migration::prelude::*;

mod m2026_09_01_100000_create_church_directory;
mod m2026_09_01_100100_create_scheduled_calls;
mod m2026_09_01_100200_create_integration_settings;
mod m2026_09_01_100300_create_webhook_events;
mod m2026_09_01_100400_create_transcripts;
mod m2026_09_01_100500_create_unmatched_meetings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_09_01_100000_create_church_directory::Migration),
            Box::new(m2026_09_01_100100_create_scheduled_calls::Migration),
            Box::new(m2026_09_01_100200_create_integration_settings::Migration),
            Box::new(m2026_09_01_100300_create_webhook_events::Migration),
            Box::new(m2026_09_01_100400_create_transcripts::Migration),
            Box::new(m2026_09_01_100500_create_unmatched_meetings::Migration),
        ]
    }
}
