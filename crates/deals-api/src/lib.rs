pub mod auth;
pub mod comments;
pub mod coupons;
pub mod error;
pub mod extract;
pub mod likes;
pub mod middleware;
pub mod moderation;
pub mod promotions;
pub mod routes;
pub mod users;

use deals_types::models::Category;
use serde::Deserialize;

pub use auth::{ApiConfig, AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// `?skip=&limit=` pagination.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Paging {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl Paging {
    pub fn offset(self) -> u32 {
        self.skip.unwrap_or(0)
    }

    pub fn limit(self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Query string of the public promotion and coupon listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub q: Option<String>,
    pub category: Option<Category>,
    pub store: Option<String>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl ListingQuery {
    pub fn paging(&self) -> Paging {
        Paging {
            skip: self.skip,
            limit: self.limit,
        }
    }
}
