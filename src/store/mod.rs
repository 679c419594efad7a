//! Persistence traits. Handlers only see these; `mongo` backs them with
//! collections and `memory` with in-process maps.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::models::{Cart, Plant, PlantFilter, User};
use crate::otp::OtpCode;

pub mod memory;
pub mod mongo;

pub use memory::{MemoryCarts, MemoryPlants, MemoryUsers};
pub use mongo::{MongoCarts, MongoPlants, MongoUsers};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` when the email or username is taken.
    async fn insert(&self, user: &User) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// First user matching either identifier.
    async fn find_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>>;

    /// Stores or clears the refresh token. Returns whether the user exists.
    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool>;

    /// Swaps `expected` for `next` only while `expected` is still the stored
    /// token. Returns whether the swap happened.
    async fn rotate_refresh_token(&self, id: &str, expected: &str, next: &str)
        -> StoreResult<bool>;

    /// Replaces any pending OTP with `otp`.
    async fn set_otp(&self, id: &str, otp: &OtpCode) -> StoreResult<bool>;

    /// Counts a wrong guess against the pending OTP with this `code` and
    /// returns the new attempt count, or `None` when that OTP is gone.
    async fn record_otp_failure(&self, id: &str, code: &str) -> StoreResult<Option<i32>>;

    /// Removes the pending OTP with this `code` if it still has attempts
    /// left. Returns whether it was removed, so a code is used once.
    async fn consume_otp(&self, id: &str, code: &str) -> StoreResult<bool>;

    /// Removes the pending OTP with this `code` unconditionally.
    async fn discard_otp(&self, id: &str, code: &str) -> StoreResult<()>;

    async fn set_password(&self, id: &str, hash: &str) -> StoreResult<bool>;

    /// Applies the supplied profile fields and returns the updated user.
    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn update_profile(&self, id: &str, update: &ProfileUpdate)
        -> StoreResult<Option<User>>;
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[async_trait]
pub trait PlantStore: Send + Sync {
    async fn insert(&self, plant: &Plant) -> StoreResult<()>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Plant>>;

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<Plant>>;

    async fn list(&self, filter: &PlantFilter) -> StoreResult<Vec<Plant>>;

    async fn save(&self, plant: &Plant) -> StoreResult<()>;

    /// Returns whether a plant was removed.
    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Option<Cart>>;

    /// Inserts or replaces the cart.
    async fn save(&self, cart: &Cart) -> StoreResult<()>;
}
