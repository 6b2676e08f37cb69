use std::sync::Arc;

use crate::application::feed::FeedService;
use crate::application::repos::HealthRepo;

#[derive(Clone)]
pub struct ApiState {
    pub feed: Arc<FeedService>,
    pub db: Arc<dyn HealthRepo>,
}
