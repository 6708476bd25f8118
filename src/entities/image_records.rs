use crate::models::{ImageRecord, ImageStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,
    #[sea_orm(unique)]
    pub key: String,
    pub status: String,
    pub expiry: DateTimeUtc,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ImageRecord {
    type Error = String;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(ImageRecord {
            status: model.status.parse::<ImageStatus>()?,
            id: model.id,
            owner_id: model.owner_id,
            key: model.key,
            expiry: model.expiry,
            created_at: model.created_at,
        })
    }
}

impl From<&ImageRecord> for ActiveModel {
    fn from(record: &ImageRecord) -> Self {
        use sea_orm::ActiveValue::Set;
        ActiveModel {
            id: Set(record.id.clone()),
            owner_id: Set(record.owner_id.clone()),
            key: Set(record.key.clone()),
            status: Set(record.status.as_str().to_string()),
            expiry: Set(record.expiry),
            created_at: Set(record.created_at),
        }
    }
}
