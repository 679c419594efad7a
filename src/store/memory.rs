use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{StoreError, StoreResult};
use crate::models::{Cart, Plant, PlantFilter, User};
use crate::otp::{OtpCode, MAX_ATTEMPTS};
use crate::store::{CartStore, PlantStore, ProfileUpdate, UserStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Users kept in insertion order, with the same uniqueness rules as the
/// Mongo indexes.
#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<Vec<User>>,
}

impl MemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on the user with `id` under the lock, bumping `updated_at`
    /// when `f` reports a change.
    fn modify<R>(&self, id: &str, f: impl FnOnce(&mut User) -> (bool, R)) -> Option<R> {
        let mut users = lock(&self.users);
        let user = users.iter_mut().find(|u| u.id == id)?;
        let (changed, result) = f(user);
        if changed {
            user.touch();
        }
        Some(result)
    }
}

fn pending_otp<'a>(user: &'a mut User, code: &str) -> Option<&'a mut OtpCode> {
    user.otp.as_mut().filter(|otp| otp.code == code)
}

fn conflict(existing: &[User], candidate: &User) -> Option<StoreError> {
    existing
        .iter()
        .filter(|u| u.id != candidate.id)
        .find_map(|u| {
            if u.email == candidate.email {
                Some(StoreError::Duplicate(format!("email {}", candidate.email)))
            } else if u.username == candidate.username {
                Some(StoreError::Duplicate(format!("username {}", candidate.username)))
            } else {
                None
            }
        })
}

#[async_trait]
impl UserStore for MemoryUsers {
    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.id == user.id) {
            return Err(StoreError::Duplicate(format!("_id {}", user.id)));
        }
        if let Some(err) = conflict(&users, user) {
            return Err(err);
        }
        users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(lock(&self.users).iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(lock(&self.users).iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(lock(&self.users)
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_login(
        &self,
        email: Option<&str>,
        username: Option<&str>,
    ) -> StoreResult<Option<User>> {
        Ok(lock(&self.users)
            .iter()
            .find(|u| email == Some(u.email.as_str()) || username == Some(u.username.as_str()))
            .cloned())
    }

    async fn set_refresh_token(&self, id: &str, token: Option<&str>) -> StoreResult<bool> {
        let found = self.modify(id, |user| {
            user.refresh_token = token.map(str::to_string);
            (true, ())
        });
        Ok(found.is_some())
    }

    async fn rotate_refresh_token(
        &self,
        id: &str,
        expected: &str,
        next: &str,
    ) -> StoreResult<bool> {
        let swapped = self.modify(id, |user| {
            let current = user.refresh_token.as_deref() == Some(expected);
            if current {
                user.refresh_token = Some(next.to_string());
            }
            (current, current)
        });
        Ok(swapped.unwrap_or(false))
    }

    async fn set_otp(&self, id: &str, otp: &OtpCode) -> StoreResult<bool> {
        let found = self.modify(id, |user| {
            user.otp = Some(otp.clone());
            (true, ())
        });
        Ok(found.is_some())
    }

    async fn record_otp_failure(&self, id: &str, code: &str) -> StoreResult<Option<i32>> {
        let attempts = self.modify(id, |user| match pending_otp(user, code) {
            Some(otp) => {
                otp.attempts += 1;
                (true, Some(otp.attempts))
            }
            None => (false, None),
        });
        Ok(attempts.flatten())
    }

    async fn consume_otp(&self, id: &str, code: &str) -> StoreResult<bool> {
        let consumed = self.modify(id, |user| {
            let usable = pending_otp(user, code).map_or(false, |otp| otp.attempts < MAX_ATTEMPTS);
            if usable {
                user.otp = None;
            }
            (usable, usable)
        });
        Ok(consumed.unwrap_or(false))
    }

    async fn discard_otp(&self, id: &str, code: &str) -> StoreResult<()> {
        self.modify(id, |user| {
            let pending = pending_otp(user, code).is_some();
            if pending {
                user.otp = None;
            }
            (pending, ())
        });
        Ok(())
    }

    async fn set_password(&self, id: &str, hash: &str) -> StoreResult<bool> {
        let found = self.modify(id, |user| {
            user.password = Some(hash.to_string());
            (true, ())
        });
        Ok(found.is_some())
    }

    async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
    ) -> StoreResult<Option<User>> {
        let mut users = lock(&self.users);
        if let Some(email) = &update.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Duplicate(format!("email {email}")));
            }
        }
        let user = match users.iter_mut().find(|u| u.id == id) {
            Some(user) => user,
            None => return Ok(None),
        };
        if let Some(email) = &update.email {
            user.email = email.clone();
        }
        if let Some(full_name) = &update.full_name {
            user.full_name = full_name.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[derive(Default)]
pub struct MemoryPlants {
    plants: Mutex<Vec<Plant>>,
}

impl MemoryPlants {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlantStore for MemoryPlants {
    async fn insert(&self, plant: &Plant) -> StoreResult<()> {
        let mut plants = lock(&self.plants);
        if plants.iter().any(|p| p.id == plant.id) {
            return Err(StoreError::Duplicate(format!("_id {}", plant.id)));
        }
        plants.push(plant.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Plant>> {
        Ok(lock(&self.plants).iter().find(|p| p.id == id).cloned())
    }

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<Plant>> {
        Ok(lock(&self.plants)
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &PlantFilter) -> StoreResult<Vec<Plant>> {
        Ok(lock(&self.plants)
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn save(&self, plant: &Plant) -> StoreResult<()> {
        if let Some(slot) = lock(&self.plants).iter_mut().find(|p| p.id == plant.id) {
            *slot = plant.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut plants = lock(&self.plants);
        let before = plants.len();
        plants.retain(|p| p.id != id);
        Ok(plants.len() != before)
    }
}

#[derive(Default)]
pub struct MemoryCarts {
    carts: Mutex<Vec<Cart>>,
}

impl MemoryCarts {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for MemoryCarts {
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Option<Cart>> {
        Ok(lock(&self.carts).iter().find(|c| c.user == user_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> StoreResult<()> {
        let mut carts = lock(&self.carts);
        if carts.iter().any(|c| c.user == cart.user && c.id != cart.id) {
            return Err(StoreError::Duplicate(format!("user {}", cart.user)));
        }
        match carts.iter_mut().find(|c| c.id == cart.id) {
            Some(slot) => *slot = cart.clone(),
            None => carts.push(cart.clone()),
        }
        Ok(())
    }
}
