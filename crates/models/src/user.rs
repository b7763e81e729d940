use sea_orm::{entity::prelude::*, Condition, ConnectionTrait, Set};
use uuid::Uuid;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::ModelError;
use crate::refresh_token;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    RefreshTokens,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self { Relation::RefreshTokens => Entity::has_many(refresh_token::Entity).into() }
    }
}

impl Related<refresh_token::Entity> for Entity {
    fn to() -> RelationDef { Relation::RefreshTokens.def() }
}

impl ActiveModelBehavior for ActiveModel {}

/// Insert payload; the hash is computed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: String,
    pub full_name: Option<&'a str>,
}

pub fn validate_username(username: &str) -> Result<(), ModelError> {
    if username.trim().is_empty() { return Err(ModelError::Validation("username required".into())); }
    if username.len() > 80 { return Err(ModelError::Validation("username too long (<=80)".into())); }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ModelError> {
    if !email.contains('@') { return Err(ModelError::Validation("invalid email".into())); }
    if email.len() > 255 { return Err(ModelError::Validation("email too long (<=255)".into())); }
    Ok(())
}

pub async fn create<C: ConnectionTrait>(db: &C, new: NewUser<'_>) -> Result<Model, ModelError> {
    validate_username(new.username)?;
    validate_email(new.email)?;
    if new.password_hash.trim().is_empty() { return Err(ModelError::Validation("password hash required".into())); }
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(new.username.to_string()),
        email: Set(new.email.to_string()),
        password_hash: Set(new.password_hash),
        full_name: Set(new.full_name.map(str::to_string)),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    };
    Ok(am.insert(db).await?)
}

pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

pub async fn find_by_username<C: ConnectionTrait>(db: &C, username: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Username.eq(username)).one(db).await?)
}

pub async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<Model>, ModelError> {
    Ok(Entity::find().filter(Column::Email.eq(email)).one(db).await?)
}

/// Single query matching `identifier` against username OR email.
///
/// If one user's username and another user's email both equal the
/// identifier, the username match wins.
pub async fn find_by_identifier<C: ConnectionTrait>(db: &C, identifier: &str) -> Result<Option<Model>, ModelError> {
    let matches = Entity::find()
        .filter(
            Condition::any()
                .add(Column::Username.eq(identifier))
                .add(Column::Email.eq(identifier)),
        )
        .all(db)
        .await?;
    let mut by_email = None;
    for m in matches {
        if m.username == identifier {
            return Ok(Some(m));
        }
        by_email.get_or_insert(m);
    }
    Ok(by_email)
}

/// Flip the active flag. Returns `None` when the user does not exist.
pub async fn set_active<C: ConnectionTrait>(db: &C, id: Uuid, active: bool) -> Result<Option<Model>, ModelError> {
    let Some(found) = Entity::find_by_id(id).one(db).await? else { return Ok(None) };
    let mut am: ActiveModel = found.into();
    am.is_active = Set(active);
    Ok(Some(am.update(db).await?))
}
