//! Provider Registry (`spec.md` §4.2). Keyed by provider tag, not
//! inheritance — same shape as `sa_providers::registry::ProviderRegistry`,
//! narrowed to the spec's four tags.

use std::collections::HashMap;
use std::sync::Arc;

use crate::collaborators::Provider;
use crate::model::ProviderTag;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderTag, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: ProviderTag, provider: Arc<dyn Provider>) -> &mut Self {
        self.providers.insert(tag, provider);
        self
    }

    pub fn resolve(&self, tag: ProviderTag) -> Option<Arc<dyn Provider>> {
        self.providers.get(&tag).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::model::{GenerateMessageResponse, Message, TokenUsage};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Stub;

    #[async_trait]
    impl Provider for Stub {
        async fn generate_message(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _model_name: &str,
            _tools_enabled: bool,
            _cancel: CancellationToken,
        ) -> Result<GenerateMessageResponse> {
            Ok(GenerateMessageResponse {
                content_blocks: vec![],
                token_usage: TokenUsage::default(),
            })
        }
    }

    #[test]
    fn resolves_registered_tag() {
        let mut reg = ProviderRegistry::new();
        reg.register(ProviderTag::Anthropic, Arc::new(Stub));
        assert!(reg.resolve(ProviderTag::Anthropic).is_some());
        assert!(reg.resolve(ProviderTag::Google).is_none());
    }
}
