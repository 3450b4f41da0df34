//! Board endpoints

use api_client::{ApiClient, ApiError};
use serde::{Deserialize, Serialize};

pub const POPULAR_POSTS_PATH: &str = "/api/posts/popular";

/// One board post as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub likes: u64,
}

/// Currently popular posts, most liked first as ordered by the server.
pub async fn popular_posts(client: &ApiClient) -> Result<Vec<Post>, ApiError> {
    client.get_json(POPULAR_POSTS_PATH).await
}
