use actix_web::{web, HttpResponse};
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::non_blank;
use crate::middleware::AuthUser;
use crate::models::{AddToCartInput, Cart, CartLine, CartView};
use crate::response::ApiResponse;
use crate::state::AppState;

fn cart_not_found() -> ApiError {
    ApiError::not_found("Cart not found")
}

pub async fn add_to_cart(
    state: web::Data<AppState>,
    auth: AuthUser,
    input: web::Json<AddToCartInput>,
) -> Result<HttpResponse, ApiError> {
    let input = input.into_inner();
    let plant_id = non_blank(input.plant_id.clone())
        .ok_or_else(|| ApiError::bad_request("Plant ID is required"))?;
    input.validate()?;
    let quantity = input.quantity.unwrap_or(1);

    if state.plants.find_by_id(&plant_id).await?.is_none() {
        return Err(ApiError::not_found("Plant not found"));
    }

    let mut cart = state
        .carts
        .find_by_user(auth.id())
        .await?
        .unwrap_or_else(|| Cart::new(auth.id()));
    cart.add(&plant_id, quantity)
        .ok_or_else(|| ApiError::bad_request("Quantity is too large"))?;
    state.carts.save(&cart).await?;

    Ok(ApiResponse::ok(cart, "Item added to cart").into_response())
}

pub async fn get_cart(
    state: web::Data<AppState>,
    auth: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let cart = state
        .carts
        .find_by_user(auth.id())
        .await?
        .ok_or_else(cart_not_found)?;

    let ids: Vec<String> = cart.items.iter().map(|item| item.plant.clone()).collect();
    let plants = state.plants.find_many(&ids).await?;
    let items = cart
        .items
        .into_iter()
        .map(|item| CartLine {
            plant: plants.iter().find(|p| p.id == item.plant).cloned(),
            quantity: item.quantity,
        })
        .collect();

    let view = CartView {
        id: cart.id,
        user: cart.user,
        items,
        created_at: cart.created_at,
        updated_at: cart.updated_at,
    };
    Ok(ApiResponse::ok(view, "Cart fetched successfully").into_response())
}

pub async fn remove_from_cart(
    state: web::Data<AppState>,
    auth: AuthUser,
    plant_id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let mut cart = state
        .carts
        .find_by_user(auth.id())
        .await?
        .ok_or_else(cart_not_found)?;
    cart.remove(&plant_id.into_inner());
    state.carts.save(&cart).await?;
    Ok(ApiResponse::ok(cart, "Item removed from cart").into_response())
}

pub async fn clear_cart(
    state: web::Data<AppState>,
    auth: AuthUser,
) -> Result<HttpResponse, ApiError> {
    let mut cart = state
        .carts
        .find_by_user(auth.id())
        .await?
        .unwrap_or_else(|| Cart::new(auth.id()));
    cart.clear();
    state.carts.save(&cart).await?;
    Ok(ApiResponse::ok(cart, "Cart cleared successfully").into_response())
}
