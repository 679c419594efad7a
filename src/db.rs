use log::info;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

use crate::models::{Cart, Plant, User};
use crate::store::mongo::{CARTS, PLANTS, USERS};

pub async fn connect(database_url: &str, database_name: &str) -> mongodb::error::Result<Database> {
    let client_options = ClientOptions::parse(database_url).await?;
    let client = Client::with_options(client_options)?;

    let db = client.database(database_name);
    db.run_command(doc! { "ping": 1 }, None).await?;
    info!("MongoDB connected, database {database_name}");

    ensure_indexes(&db).await?;
    Ok(db)
}

fn index(keys: Document, unique: bool) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(unique).build())
        .build()
}

/// Unique indexes back the duplicate checks the handlers rely on.
async fn ensure_indexes(db: &Database) -> mongodb::error::Result<()> {
    let users = db.collection::<User>(USERS);
    users.create_index(index(doc! { "email": 1 }, true), None).await?;
    users.create_index(index(doc! { "username": 1 }, true), None).await?;

    db.collection::<Plant>(PLANTS)
        .create_index(index(doc! { "name": 1 }, false), None)
        .await?;

    db.collection::<Cart>(CARTS)
        .create_index(index(doc! { "user": 1 }, true), None)
        .await?;
    Ok(())
}
