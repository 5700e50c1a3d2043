use chrono::{NaiveDate, Utc};
use sea_orm::{entity::prelude::*, ConnectionTrait, Set};
use serde::{Deserialize, Serialize};

use crate::{errors, service_history_image};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    pub service_id: i32,
    pub employee_id: i32,
    pub service_date: Date,
    #[sea_orm(column_type = "Double")]
    pub price: f64,
    pub payment_method: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Images }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Images => Entity::has_many(service_history_image::Entity).into(),
        }
    }
}

impl Related<service_history_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Fields captured by the "add service history" form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewServiceHistory {
    pub customer_id: i32,
    pub service_id: i32,
    pub employee_id: i32,
    pub service_date: NaiveDate,
    pub price: f64,
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update from the edit form; `None` keeps the stored value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceHistoryChanges {
    pub customer_id: Option<i32>,
    pub service_id: Option<i32>,
    pub employee_id: Option<i32>,
    pub service_date: Option<NaiveDate>,
    pub price: Option<f64>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

pub fn validate_price(price: f64) -> Result<(), errors::ModelError> {
    if !price.is_finite() || price < 0.0 {
        return Err(errors::ModelError::Validation("price must be a non-negative amount".into()));
    }
    Ok(())
}

pub fn validate_payment_method(m: &str) -> Result<String, errors::ModelError> {
    let trimmed = m.trim();
    if trimmed.is_empty() {
        return Err(errors::ModelError::Validation("payment_method required".into()));
    }
    if trimmed.chars().count() > 64 {
        return Err(errors::ModelError::Validation("payment_method too long (<=64)".into()));
    }
    Ok(trimmed.to_string())
}

fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}

pub async fn create<C: ConnectionTrait>(db: &C, input: &NewServiceHistory) -> Result<Model, errors::ModelError> {
    validate_price(input.price)?;
    let payment_method = validate_payment_method(&input.payment_method)?;

    let now = Utc::now().into();
    let am = ActiveModel {
        customer_id: Set(input.customer_id),
        service_id: Set(input.service_id),
        employee_id: Set(input.employee_id),
        service_date: Set(input.service_date),
        price: Set(input.price),
        payment_method: Set(payment_method),
        notes: Set(normalize_notes(input.notes.as_deref())),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(am.insert(db).await?)
}

pub async fn find<C: ConnectionTrait>(db: &C, id: i32) -> Result<Option<Model>, errors::ModelError> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

pub async fn update<C: ConnectionTrait>(db: &C, id: i32, changes: &ServiceHistoryChanges) -> Result<Model, errors::ModelError> {
    let mut found: ActiveModel = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| errors::ModelError::NotFound(format!("service history {id}")))?
        .into();

    if let Some(v) = changes.customer_id { found.customer_id = Set(v); }
    if let Some(v) = changes.service_id { found.service_id = Set(v); }
    if let Some(v) = changes.employee_id { found.employee_id = Set(v); }
    if let Some(v) = changes.service_date { found.service_date = Set(v); }
    if let Some(v) = changes.price {
        validate_price(v)?;
        found.price = Set(v);
    }
    if let Some(v) = changes.payment_method.as_deref() {
        found.payment_method = Set(validate_payment_method(v)?);
    }
    if let Some(v) = changes.notes.as_deref() {
        found.notes = Set(normalize_notes(Some(v)));
    }
    found.updated_at = Set(Utc::now().into());
    Ok(found.update(db).await?)
}

/// Delete the record row only. Callers are expected to have removed its images first.
pub async fn delete<C: ConnectionTrait>(db: &C, id: i32) -> Result<bool, errors::ModelError> {
    let res = Entity::delete_by_id(id).exec(db).await?;
    Ok(res.rows_affected > 0)
}
