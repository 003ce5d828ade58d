use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CODESCOPE_PARSER_WALK_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.parser.walk_timeout_ms = ms;
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_PARSER_WALK_TIMEOUT_MS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODESCOPE_PARSER_MAX_DEPTH") {
            if let Ok(n) = v.parse::<usize>() {
                self.parser.max_depth = n;
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_PARSER_MAX_DEPTH value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODESCOPE_EMBEDDING_PROVIDER") {
            if let Ok(provider) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = provider;
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODESCOPE_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("CODESCOPE_EMBEDDING_DIMENSION") {
            if let Ok(n) = v.parse::<usize>() {
                self.embedding.dimension = n;
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_EMBEDDING_DIMENSION value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODESCOPE_RETRIEVAL_THRESHOLD") {
            if let Ok(t) = v.parse::<f32>()
                && t.is_finite()
            {
                self.retrieval.relevance_threshold = t.clamp(0.0, 1.0);
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_RETRIEVAL_THRESHOLD value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODESCOPE_RETRIEVAL_TOP_K") {
            if let Ok(n) = v.parse::<usize>() {
                self.retrieval.context_top_k = n;
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_RETRIEVAL_TOP_K value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODESCOPE_INDEX_PATH") {
            self.index.path = v;
        }
        if let Ok(v) = std::env::var("CODESCOPE_INDEX_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                self.index.concurrency = n;
            } else {
                tracing::warn!("ignoring invalid CODESCOPE_INDEX_CONCURRENCY value: {v}");
            }
        }
    }
}
