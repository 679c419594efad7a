use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, to_bson, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReplaceOptions, ReturnDocument};
use mongodb::{Collection, Database};

use crate::error::StoreResult;
use crate::models::{Cart, Plant, PlantFilter, User};
use crate::otp::{OtpCode, MAX_ATTEMPTS};
use crate::store::{CartStore, PlantStore, ProfileUpdate, UserStore};

pub const USERS: &str = "users";
pub const PLANTS: &str = "plants";
pub const CARTS: &str = "carts";

pub struct MongoUsers {
    collection: Collection<User>,
}

impl MongoUsers {
    pub fn new(db: &Database) -> Self {
        MongoUsers {
            collection: db.collection(USERS),
        }
    }

    /// Applies `update` to the first user matching `filter`, stamping
    /// `updatedAt`. Returns whether a user matched.
    async fn update(&self, filter: Document, mut update: Document) -> StoreResult<bool> {
        stamp(&mut update)?;
        let result = self.collection.update_one(filter, update, None).await?;
        Ok(result.matched_count == 1)
    }
}

fn stamp(update: &mut Document) -> StoreResult<()> {
    let now = to_bson(&Utc::now())?;
    match update.get_document_mut("$set") {
        Ok(set) => {
            set.insert("updatedAt", now);
        }
        Err(_) => {
            update.insert("$set", doc! { "updatedAt": now });
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MongoUsers {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        self.collection.insert_one(user, None).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.collection.find_one(doc! { "email": email }, None).await?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { "username": username }, None)
            .await?)
    }

    async fn find_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut clauses: Vec<Document> = Vec::new();
        if let Some(email) = email {
            clauses.push(doc! { "email": email });
        }
        if let Some(username) = username {
            clauses.push(doc! { "username": username });
        }
        if clauses.is_empty() {
            return Ok(None);
        }
        Ok(self
            .collection
            .find_one(doc! { "$or": clauses }, None)
            .await?)
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool> {
        let update = match token {
            Some(token) => doc! { "$set": { "refreshToken": token } },
            None => doc! { "$unset": { "refreshToken": "" } },
        };
        self.update(doc! { "_id": id }, update).await
    }

    async fn rotate_refresh_token(
        &self,
        id: &str,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        self.update(
            doc! { "_id": id, "refreshToken": expected },
            doc! { "$set": { "refreshToken": next } },
        )
        .await
    }

    async fn set_otp(&self, id: &str, otp: &OtpCode) -> StoreResult<bool> {
        let otp = to_bson(otp)?;
        self.update(doc! { "_id": id }, doc! { "$set": { "otp": otp } })
            .await
    }

    async fn record_otp_failure(&self, id: &str, code: &str) -> StoreResult<Option<i32>> {
        let mut update = doc! { "$inc": { "otp.attempts": 1 } };
        stamp(&mut update)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let user = self
            .collection
            .find_one_and_update(doc! { "_id": id, "otp.code": code }, update, options)
            .await?;
        Ok(user.and_then(|u| u.otp).map(|otp| otp.attempts))
    }

    async fn consume_otp(&self, id: &str, code: &str) -> StoreResult<bool> {
        self.update(
            doc! {
                "_id": id,
                "otp.code": code,
                "otp.attempts": { "$lt": MAX_ATTEMPTS },
            },
            doc! { "$unset": { "otp": "" } },
        )
        .await
    }

    async fn discard_otp(&self, id: &str, code: &str) -> StoreResult<()> {
        self.update(
            doc! { "_id": id, "otp.code": code },
            doc! { "$unset": { "otp": "" } },
        )
        .await?;
        Ok(())
    }

    async fn set_password(&self, id: &str, hash: &str) -> StoreResult<bool> {
        self.update(doc! { "_id": id }, doc! { "$set": { "password": hash } })
            .await
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<User>> {
        let mut set = Document::new();
        if let Some(email) = &update.email {
            set.insert("email", email.as_str());
        }
        if let Some(full_name) = &update.full_name {
            set.insert("fullName", full_name.as_str());
        }
        let mut update = doc! { "$set": set };
        stamp(&mut update)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?)
    }
}

pub struct MongoPlants {
    collection: Collection<Plant>,
}

impl MongoPlants {
    pub fn new(db: &Database) -> Self {
        MongoPlants {
            collection: db.collection(PLANTS),
        }
    }
}

fn plant_filter(filter: &PlantFilter) -> Document {
    let mut query = Document::new();
    if let Some(category) = &filter.category {
        query.insert(
            "categories",
            doc! { "$regex": regex::escape(category), "$options": "i" },
        );
    }
    if let Some(in_stock) = filter.in_stock {
        query.insert("inStock", in_stock);
    }
    query
}

#[async_trait]
impl PlantStore for MongoPlants {
    async fn insert(&self, plant: &Plant) -> StoreResult<()> {
        self.collection.insert_one(plant, None).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Plant>> {
        Ok(self.collection.find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<Plant>> {
        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": ids.to_vec() } }, None)
            .await?;
        let plants: Vec<Plant> = cursor.try_collect().await?;
        Ok(plants)
    }

    async fn list(&self, filter: &PlantFilter) -> StoreResult<Vec<Plant>> {
        let mut cursor = self.collection.find(plant_filter(filter), None).await?;
        let mut plants = Vec::new();
        while let Some(result) = cursor.next().await {
            plants.push(result?);
        }
        Ok(plants)
    }

    async fn save(&self, plant: &Plant) -> StoreResult<()> {
        self.collection
            .replace_one(doc! { "_id": plant.id.as_str() }, plant, None)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count == 1)
    }
}

pub struct MongoCarts {
    collection: Collection<Cart>,
}

impl MongoCarts {
    pub fn new(db: &Database) -> Self {
        MongoCarts {
            collection: db.collection(CARTS),
        }
    }
}

#[async_trait]
impl CartStore for MongoCarts {
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Option<Cart>> {
        Ok(self
            .collection
            .find_one(doc! { "user": user_id }, None)
            .await?)
    }

    async fn save(&self, cart: &Cart) -> StoreResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(doc! { "_id": cart.id.as_str() }, cart, options)
            .await?;
        Ok(())
    }
}
