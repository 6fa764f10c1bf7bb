use std::sync::Arc;

use recommendation_pipeline::Recommender;

#[derive(Clone)]
pub struct ApiState {
    pub recommender: Arc<Recommender>,
}

impl ApiState {
    pub const fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }
}
