//! Route paths and bucket key derivation.

use std::fmt::{self, Display};

/// Stands in for a minor parameter in a bucket key.
pub const PLACEHOLDER: &str = "{}";

/// A request path together with the bucket key it is rate limited under.
///
/// Major parameters (the leading channel, guild, webhook or user ID) are part
/// of the key, so each channel gets its own quota. Minor parameters are
/// replaced by [`PLACEHOLDER`], so e.g. every message in one channel shares a
/// bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    /// Bucket key handed to the limiter
    pub bucket: String,
    /// Path sent to the server
    pub path: String,
}

impl Route {
    /// Start building a route.
    pub fn builder() -> RouteBuilder {
        RouteBuilder::default()
    }

    /// A route whose bucket key is its own path.
    pub fn single(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            bucket: path.clone(),
            path,
        }
    }

    /// Append query parameters to the path. The bucket key is unchanged.
    ///
    /// Values are expected to be URL-safe already.
    pub fn with_query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Display,
        V: Display,
    {
        let query: Vec<String> = params
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        if !query.is_empty() {
            self.path.push('?');
            self.path.push_str(&query.join("&"));
        }
        self
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.path, self.bucket)
    }
}

/// Builds a [`Route`] segment by segment.
#[derive(Debug, Clone, Default)]
pub struct RouteBuilder {
    bucket: String,
    path: String,
}

impl RouteBuilder {
    /// A fixed path segment, e.g. `messages`.
    pub fn segment(mut self, segment: &str) -> Self {
        self.push(segment, segment);
        self
    }

    /// A parameter that stays in the bucket key.
    pub fn major(mut self, id: impl Display) -> Self {
        let id = id.to_string();
        self.push(&id, &id);
        self
    }

    /// A parameter replaced by the placeholder in the bucket key.
    pub fn minor(mut self, id: impl Display) -> Self {
        self.push(PLACEHOLDER, &id.to_string());
        self
    }

    pub fn build(self) -> Route {
        Route {
            bucket: self.bucket,
            path: self.path,
        }
    }

    fn push(&mut self, bucket: &str, path: &str) {
        self.bucket.push('/');
        self.bucket.push_str(bucket);
        self.path.push('/');
        self.path.push_str(path);
    }
}
