use chrono::Utc;
use sea_orm::{entity::prelude::*, ConnectionTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::{errors, service_history};

/// One photo attached to a service history record.
///
/// `public_id` doubles as the storage tag: present means the remote store
/// owns the object and `image_url` was issued by it; absent means the file
/// lives under the local upload root.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_history_image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub service_history_id: i32,
    pub image_url: String,
    #[sea_orm(nullable)]
    pub public_id: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_remote(&self) -> bool {
        self.public_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { ServiceHistory }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::ServiceHistory => Entity::belongs_to(service_history::Entity)
                .from(Column::ServiceHistoryId)
                .to(service_history::Column::Id)
                .into(),
        }
    }
}

impl Related<service_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_image_url(u: &str) -> Result<(), errors::ModelError> {
    if u.trim().is_empty() {
        return Err(errors::ModelError::Validation("image_url required".into()));
    }
    if u.len() > 512 {
        return Err(errors::ModelError::Validation("image_url too long (<=512)".into()));
    }
    Ok(())
}

fn validate_public_id(p: Option<&str>) -> Result<(), errors::ModelError> {
    match p {
        Some(p) if p.trim().is_empty() => Err(errors::ModelError::Validation("public_id must not be blank".into())),
        Some(p) if p.len() > 255 => Err(errors::ModelError::Validation("public_id too long (<=255)".into())),
        _ => Ok(()),
    }
}

pub async fn create<C: ConnectionTrait>(
    db: &C,
    service_history_id: i32,
    image_url: &str,
    public_id: Option<&str>,
) -> Result<Model, errors::ModelError> {
    validate_image_url(image_url)?;
    validate_public_id(public_id)?;

    let am = ActiveModel {
        service_history_id: Set(service_history_id),
        image_url: Set(image_url.to_string()),
        public_id: Set(public_id.map(str::to_string)),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    };
    Ok(am.insert(db).await?)
}

pub async fn find<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<Model>, errors::ModelError> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

/// Images of one record in creation order.
pub async fn list_by_history<C: ConnectionTrait>(db: &C, service_history_id: i32) -> Result<Vec<Model>, errors::ModelError> {
    Ok(Entity::find()
        .filter(Column::ServiceHistoryId.eq(service_history_id))
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

pub async fn count_by_history<C: ConnectionTrait>(db: &C, service_history_id: i32) -> Result<u64, errors::ModelError> {
    Ok(Entity::find()
        .filter(Column::ServiceHistoryId.eq(service_history_id))
        .count(db)
        .await?)
}

/// Every image still held by the local backend, oldest first.
pub async fn list_local<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>, errors::ModelError> {
    Ok(Entity::find()
        .filter(Column::PublicId.is_null())
        .order_by_asc(Column::Id)
        .all(db)
        .await?)
}

/// Point an existing row at a different stored object.
pub async fn set_location<C: ConnectionTrait>(
    db: &C,
    id: i32,
    image_url: &str,
    public_id: Option<&str>,
) -> Result<Model, errors::ModelError> {
    validate_image_url(image_url)?;
    validate_public_id(public_id)?;

    let mut found: ActiveModel = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| errors::ModelError::NotFound(format!("image {id}")))?
        .into();
    found.image_url = Set(image_url.to_string());
    found.public_id = Set(public_id.map(str::to_string));
    Ok(found.update(db).await?)
}

pub async fn delete<C: ConnectionTrait>(db: &C, id: i32) -> Result<bool, errors::ModelError> {
    let res = Entity::delete_by_id(id).exec(db).await?;
    Ok(res.rows_affected > 0)
}
