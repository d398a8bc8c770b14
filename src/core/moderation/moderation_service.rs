// Content moderation service - the accept/reject decision for posts and
// comments.
//
// 1. Profane text is rejected locally when profanity is forbidden; the
//    classifier is not called in that case.
// 2. Everything else is acceptable unless the classifier marks it harmful.
//
// Called synchronously on every create/update so content is never stored
// with an unevaluated visibility flag.

use super::moderation_models::{ModerationConfig, ModerationVerdict};
use super::profanity_filter::ProfanityFilter;
use super::toxicity_classifier::ToxicityClassifier;
use crate::core::ai::AiProvider;

pub struct ContentModerator<P: AiProvider> {
    profanity_forbidden: bool,
    profanity: ProfanityFilter,
    classifier: ToxicityClassifier<P>,
}

impl<P: AiProvider> ContentModerator<P> {
    pub fn new(
        profanity_forbidden: bool,
        profanity: ProfanityFilter,
        classifier: ToxicityClassifier<P>,
    ) -> Self {
        Self {
            profanity_forbidden,
            profanity,
            classifier,
        }
    }

    /// Build the filter and classifier from a `ModerationConfig`.
    pub fn from_config(provider: P, model: String, config: &ModerationConfig) -> Self {
        let profanity = ProfanityFilter::with_extra_words(&config.extra_profane_words);
        let classifier = ToxicityClassifier::new(
            provider,
            model,
            config.harm_category_labels.clone(),
            config.request_timeout,
        );
        Self::new(config.profanity_forbidden, profanity, classifier)
    }

    /// Moderate `text` and say why it was rejected, if it was.
    pub async fn evaluate(&self, text: &str) -> ModerationVerdict {
        if self.profanity_forbidden && self.profanity.contains_profanity(text) {
            return ModerationVerdict::Profane;
        }

        if self.classifier.classify(text).await {
            ModerationVerdict::Harmful
        } else {
            ModerationVerdict::Accepted
        }
    }

    #[allow(dead_code)]
    pub async fn is_acceptable(&self, text: &str) -> bool {
        self.evaluate(text).await.is_accepted()
    }
}
