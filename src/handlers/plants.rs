use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::middleware::AdminUser;
use crate::models::{OneOrMany, Plant, PlantFilter, PlantInput, PlantQuery};
use crate::response::{self, ApiResponse};
use crate::state::AppState;

fn plant_not_found() -> ApiError {
    ApiError::not_found("Plant not found")
}

pub async fn create_plant(
    state: web::Data<AppState>,
    admin: AdminUser,
    input: web::Json<PlantInput>,
) -> Result<HttpResponse, ApiError> {
    let input = input.into_inner();

    let name = input
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let (name, price) = match (name, input.price) {
        (Some(name), Some(price)) => (name, price),
        _ => return Err(ApiError::bad_request("Name and Price are required")),
    };
    input.validate()?;

    let categories = input
        .categories
        .map(OneOrMany::into_distinct)
        .unwrap_or_default();
    if categories.is_empty() {
        return Err(ApiError::bad_request("At least one category is required"));
    }

    let now = Utc::now();
    let plant = Plant {
        id: Uuid::new_v4().to_string(),
        name,
        price,
        categories,
        in_stock: input.in_stock.unwrap_or(true),
        description: non_blank(input.description),
        image_url: non_blank(input.image_url),
        created_at: now,
        updated_at: now,
    };
    state.plants.insert(&plant).await?;
    info!("Plant {} ({}) created by {}", plant.id, plant.name, admin.id());

    Ok(ApiResponse::created(plant, "Plant created successfully").into_response())
}

pub async fn list_plants(
    state: web::Data<AppState>,
    query: web::Query<PlantQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = PlantFilter::from(query.into_inner());
    let plants = state.plants.list(&filter).await?;
    Ok(ApiResponse::ok(plants, "Plants fetched successfully").into_response())
}

pub async fn get_plant(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let plant = state
        .plants
        .find_by_id(&id.into_inner())
        .await?
        .ok_or_else(plant_not_found)?;
    Ok(ApiResponse::ok(plant, "Plant fetched successfully").into_response())
}

/// Partial update: absent fields are left as they are, blank optional text
/// fields are cleared.
pub async fn update_plant(
    state: web::Data<AppState>,
    admin: AdminUser,
    id: web::Path<String>,
    input: web::Json<PlantInput>,
) -> Result<HttpResponse, ApiError> {
    let input = input.into_inner();
    input.validate()?;

    let mut plant = state
        .plants
        .find_by_id(&id.into_inner())
        .await?
        .ok_or_else(plant_not_found)?;

    if let Some(name) = input.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Plant name is required"));
        }
        plant.name = name.to_string();
    }
    if let Some(price) = input.price {
        plant.price = price;
    }
    if let Some(categories) = input.categories {
        let categories = categories.into_distinct();
        if categories.is_empty() {
            return Err(ApiError::bad_request("At least one category is required"));
        }
        plant.categories = categories;
    }
    if let Some(in_stock) = input.in_stock {
        plant.in_stock = in_stock;
    }
    if input.description.is_some() {
        plant.description = non_blank(input.description);
    }
    if input.image_url.is_some() {
        plant.image_url = non_blank(input.image_url);
    }
    plant.updated_at = Utc::now();

    state.plants.save(&plant).await?;
    info!("Plant {} updated by {}", plant.id, admin.id());

    Ok(ApiResponse::ok(plant, "Plant updated successfully").into_response())
}

pub async fn delete_plant(
    state: web::Data<AppState>,
    admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = id.into_inner();
    if !state.plants.delete(&id).await? {
        return Err(plant_not_found());
    }
    info!("Plant {} deleted by {}", id, admin.id());
    Ok(ApiResponse::ok(response::empty(), "Plant deleted successfully").into_response())
}
