use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;

use crate::db::retry::{RetryPolicy, with_retry};
use crate::db::timestamp;
use crate::domain::{AccountId, SchoolId};
use crate::entities::{prelude::*, schools};

/// The slice of a school this core needs: its name and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct School {
    pub id: SchoolId,
    pub name: String,
    pub leader_id: AccountId,
}

impl From<schools::Model> for School {
    fn from(m: schools::Model) -> Self {
        Self {
            id: SchoolId::new(m.id),
            name: m.name,
            leader_id: AccountId::new(m.leader_id),
        }
    }
}

pub struct SchoolRepository {
    conn: DatabaseConnection,
    retry: RetryPolicy,
}

impl SchoolRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    pub async fn get(&self, id: SchoolId) -> Result<Option<School>> {
        let school = with_retry(self.retry, "get_school", || async move {
            Schools::find_by_id(id.value()).one(&self.conn).await
        })
        .await
        .context("Failed to query school")?;

        Ok(school.map(School::from))
    }

    pub async fn create(&self, name: &str, leader_id: AccountId) -> Result<School> {
        let model = schools::ActiveModel {
            name: Set(name.to_string()),
            leader_id: Set(leader_id.value()),
            created_at: Set(timestamp(chrono::Utc::now())),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert school")?;

        Ok(School::from(model))
    }

    pub async fn list_for_leader(&self, leader_id: AccountId) -> Result<Vec<School>> {
        let rows = with_retry(self.retry, "list_schools_for_leader", || async move {
            Schools::find()
                .filter(schools::Column::LeaderId.eq(leader_id.value()))
                .order_by_asc(schools::Column::Id)
                .all(&self.conn)
                .await
        })
        .await
        .context("Failed to list schools for leader")?;

        Ok(rows.into_iter().map(School::from).collect())
    }
}
