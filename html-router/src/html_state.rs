use std::sync::Arc;

use common::create_template_engine;
use common::utils::template_engine::{ProvidesTemplateEngine, TemplateEngine};
use recommendation_pipeline::Recommender;
use tracing::debug;

#[derive(Clone)]
pub struct HtmlState {
    pub templates: Arc<TemplateEngine>,
    pub recommender: Arc<Recommender>,
}

impl HtmlState {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        let templates = Arc::new(create_template_engine!("templates"));
        debug!("Template engine configured for html_router.");
        Self::with_template_engine(recommender, templates)
    }

    pub fn with_template_engine(
        recommender: Arc<Recommender>,
        templates: Arc<TemplateEngine>,
    ) -> Self {
        Self {
            templates,
            recommender,
        }
    }
}

impl ProvidesTemplateEngine for HtmlState {
    fn template_engine(&self) -> &Arc<TemplateEngine> {
        &self.templates
    }
}
