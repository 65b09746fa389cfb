//! Church directory repository
//!
//! Read side for matching plus the idempotent upserts used by local seeding.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::PersistenceResult;
use crate::matching::{ChurchDirectory, DirectoryChurch, DirectoryContact};
use crate::models::church::{self, Entity as Church};
use crate::models::church_contact::{self, Entity as ChurchContact};

/// Contact roles whose addresses identify a church in participant matching.
pub const MATCHING_ROLES: [&str; 2] = ["leader", "coach"];

/// Repository for the church name and contact directory
pub struct DirectoryRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> DirectoryRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Everything the church-resolving tiers need for one tenant.
    pub async fn load(&self, tenant_id: Uuid) -> PersistenceResult<ChurchDirectory> {
        let churches = Church::find()
            .filter(church::Column::TenantId.eq(tenant_id))
            .order_by_asc(church::Column::Id)
            .all(self.db)
            .await?;
        let contacts = ChurchContact::find()
            .filter(church_contact::Column::TenantId.eq(tenant_id))
            .filter(church_contact::Column::Role.is_in(MATCHING_ROLES))
            .order_by_asc(church_contact::Column::Email)
            .all(self.db)
            .await?;

        Ok(ChurchDirectory {
            churches: churches
                .into_iter()
                .map(|c| DirectoryChurch {
                    id: c.id,
                    name: c.name,
                })
                .collect(),
            contacts: contacts
                .into_iter()
                .map(|c| DirectoryContact {
                    church_id: c.church_id,
                    email: c.email,
                })
                .collect(),
        })
    }

    pub async fn find_church(
        &self,
        tenant_id: Uuid,
        church_id: &str,
    ) -> PersistenceResult<Option<church::Model>> {
        Ok(Church::find_by_id(church_id.to_string())
            .filter(church::Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await?)
    }

    /// Insert a church or rename an existing one.
    pub async fn upsert_church(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        name: &str,
    ) -> PersistenceResult<church::Model> {
        if let Some(existing) = self.find_church(tenant_id, church_id).await? {
            if existing.name == name {
                return Ok(existing);
            }
            let mut active = existing.into_active_model();
            active.name = Set(name.to_string());
            return Ok(active.update(self.db).await?);
        }

        let row = church::ActiveModel {
            id: Set(church_id.to_string()),
            tenant_id: Set(tenant_id),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        };
        Ok(row.insert(self.db).await?)
    }

    /// Add a leader/coach email to a church; an existing pair only has its role updated.
    pub async fn upsert_contact(
        &self,
        tenant_id: Uuid,
        church_id: &str,
        email: &str,
        role: &str,
    ) -> PersistenceResult<church_contact::Model> {
        let email = email.trim().to_lowercase();
        let existing = ChurchContact::find()
            .filter(church_contact::Column::TenantId.eq(tenant_id))
            .filter(church_contact::Column::ChurchId.eq(church_id))
            .filter(church_contact::Column::Email.eq(email.as_str()))
            .one(self.db)
            .await?;

        if let Some(existing) = existing {
            if existing.role == role {
                return Ok(existing);
            }
            let mut active = existing.into_active_model();
            active.role = Set(role.to_string());
            return Ok(active.update(self.db).await?);
        }

        let row = church_contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            tenant_id: Set(tenant_id),
            church_id: Set(church_id.to_string()),
            email: Set(email),
            role: Set(role.to_string()),
            created_at: Set(Utc::now().into()),
        };
        Ok(row.insert(self.db).await?)
    }
}
