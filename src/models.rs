use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::otp::OtpCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn for_email(email: &str, admin_emails: &[String]) -> Role {
        if admin_emails.iter().any(|a| a == email) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpCode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: String, email: String, full_name: String, role: Role) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            full_name,
            role,
            password: None,
            refresh_token: None,
            otp: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// What clients get to see of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Indoor,
    Outdoor,
    Succulent,
    #[serde(rename = "Air Purifying")]
    AirPurifying,
    #[serde(rename = "Home Decor")]
    HomeDecor,
    Flowering,
    Medicinal,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Indoor => "Indoor",
            Category::Outdoor => "Outdoor",
            Category::Succulent => "Succulent",
            Category::AirPurifying => "Air Purifying",
            Category::HomeDecor => "Home Decor",
            Category::Flowering => "Flowering",
            Category::Medicinal => "Medicinal",
        }
    }
}

/// Accepts either a bare value or a list of values.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    /// Flattens into a list, dropping repeats while keeping first-seen order.
    pub fn into_distinct(self) -> Vec<T> {
        let items = match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        };
        let mut out: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plant {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub price: f64,
    pub categories: Vec<Category>,
    pub in_stock: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Catalog listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantQuery {
    pub category: Option<String>,
    pub in_stock: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlantFilter {
    /// Case-insensitive substring matched against category labels.
    pub category: Option<String>,
    pub in_stock: Option<bool>,
}

impl From<PlantQuery> for PlantFilter {
    fn from(query: PlantQuery) -> Self {
        PlantFilter {
            category: query.category.filter(|c| !c.is_empty()),
            in_stock: query.in_stock.map(|s| s == "true"),
        }
    }
}

impl PlantFilter {
    pub fn matches(&self, plant: &Plant) -> bool {
        if let Some(stock) = self.in_stock {
            if plant.in_stock != stock {
                return false;
            }
        }
        match &self.category {
            Some(needle) => {
                let needle = needle.to_lowercase();
                plant
                    .categories
                    .iter()
                    .any(|c| c.label().to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub plant: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user: &str) -> Self {
        let now = Utc::now();
        Cart {
            id: Uuid::new_v4().to_string(),
            user: user.to_string(),
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Adds `quantity` of a plant, merging with an existing line, and returns
    /// the line's new quantity. `None` leaves the cart untouched when the
    /// merged quantity does not fit.
    pub fn add(&mut self, plant_id: &str, quantity: i64) -> Option<i64> {
        let total = match self.items.iter_mut().find(|item| item.plant == plant_id) {
            Some(item) => {
                item.quantity = item.quantity.checked_add(quantity)?;
                item.quantity
            }
            None => {
                self.items.push(CartItem {
                    plant: plant_id.to_string(),
                    quantity,
                });
                quantity
            }
        };
        self.updated_at = Utc::now();
        Some(total)
    }

    pub fn remove(&mut self, plant_id: &str) {
        self.items.retain(|item| item.plant != plant_id);
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.updated_at = Utc::now();
    }
}

/// Cart with each plant reference resolved; `plant` is `None` when the
/// plant has since been deleted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    pub items: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub plant: Option<Plant>,
    pub quantity: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterInput {
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SendOtpInput {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub full_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyOtpInput {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefreshInput {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountInput {
    pub full_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlantInput {
    pub name: Option<String>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    pub categories: Option<OneOrMany<Category>>,
    pub in_stock: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartInput {
    pub plant_id: Option<String>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plant(categories: Vec<Category>, in_stock: bool) -> Plant {
        let now = Utc::now();
        Plant {
            id: "p".into(),
            name: "Fern".into(),
            price: 10.0,
            categories,
            in_stock,
            description: None,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn categories_use_display_labels() {
        let value = serde_json::to_value([Category::AirPurifying, Category::Indoor]).unwrap();
        assert_eq!(value, json!(["Air Purifying", "Indoor"]));
        assert!(serde_json::from_value::<Category>(json!("Cactus")).is_err());
    }

    #[test]
    fn categories_accept_single_value() {
        let input: PlantInput =
            serde_json::from_value(json!({"name": "Aloe", "price": 5, "categories": "Succulent"}))
                .unwrap();
        assert_eq!(input.categories.unwrap().into_distinct(), vec![Category::Succulent]);

        let input: PlantInput = serde_json::from_value(
            json!({"categories": ["Indoor", "Medicinal", "Indoor"]}),
        )
        .unwrap();
        assert_eq!(
            input.categories.unwrap().into_distinct(),
            vec![Category::Indoor, Category::Medicinal]
        );
    }

    #[test]
    fn filter_matches_category_substring_ignoring_case() {
        let p = plant(vec![Category::AirPurifying, Category::Indoor], true);
        let filter = |category: &str| PlantFilter {
            category: Some(category.into()),
            in_stock: None,
        };
        assert!(filter("purif").matches(&p));
        assert!(filter("INDOOR").matches(&p));
        assert!(!filter("outdoor").matches(&p));
    }

    #[test]
    fn in_stock_query_is_true_only_for_literal_true() {
        let parse = |s: &str| {
            PlantFilter::from(PlantQuery {
                category: None,
                in_stock: Some(s.into()),
            })
        };
        assert_eq!(parse("true").in_stock, Some(true));
        assert_eq!(parse("yes").in_stock, Some(false));
        assert_eq!(PlantFilter::from(PlantQuery::default()).in_stock, None);

        let p = plant(vec![Category::Indoor], false);
        assert!(parse("false").matches(&p));
        assert!(!parse("true").matches(&p));
    }

    #[test]
    fn cart_rejects_quantity_overflow() {
        let mut cart = Cart::new("u1");
        assert_eq!(cart.add("a", i64::MAX), Some(i64::MAX));
        assert_eq!(cart.add("a", 1), None);
        assert_eq!(cart.items, vec![CartItem { plant: "a".into(), quantity: i64::MAX }]);
    }

    #[test]
    fn cart_merges_lines_per_plant() {
        let mut cart = Cart::new("u1");
        cart.add("a", 1);
        cart.add("b", 2);
        assert_eq!(cart.add("a", 3), Some(4));
        assert_eq!(
            cart.items,
            vec![
                CartItem { plant: "a".into(), quantity: 4 },
                CartItem { plant: "b".into(), quantity: 2 },
            ]
        );
        cart.remove("a");
        cart.remove("missing");
        assert_eq!(cart.items.len(), 1);
        cart.clear();
        assert!(cart.items.is_empty());
    }

    #[test]
    fn profile_hides_secrets() {
        let mut user = User::new("fern".into(), "fern@example.com".into(), "Fern".into(), Role::User);
        user.password = Some("hash".into());
        user.refresh_token = Some("token".into());
        let value = serde_json::to_value(user.profile()).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("refreshToken").is_none());
        assert_eq!(value["_id"], json!(user.id));
        assert_eq!(value["fullName"], json!("Fern"));
        assert_eq!(value["role"], json!("user"));
    }

    #[test]
    fn admin_role_from_allow_list() {
        let admins = vec!["root@example.com".to_string()];
        assert_eq!(Role::for_email("root@example.com", &admins), Role::Admin);
        assert_eq!(Role::for_email("fern@example.com", &admins), Role::User);
    }
}
