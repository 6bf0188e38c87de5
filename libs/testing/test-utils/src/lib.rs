//! Shared fixtures for integration tests.
//!
//! Containerized stores ([`TestDatabase`], [`TestRedis`]) plus a
//! deterministic id builder, so every suite gets isolated infrastructure
//! and reproducible data.
//!
//! # Features
//!
//! - `postgres` (default): PostgreSQL container with migrations applied
//! - `redis`: Redis container for stream tests
//! - `all`: both
//!
//! Suites that exercise the stream transport opt in via dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::TestRedis;
//!
//! #[tokio::test]
//! async fn my_stream_test() {
//!     let redis = TestRedis::new().await;
//!     let manager = redis.manager().await;
//!     // Hand the manager to a StreamProducer or StreamWorker under test.
//! }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Deterministic id factory seeded from the test name.
///
/// The same test name always yields the same appointment and professional
/// ids, so failures reproduce exactly; different tests get disjoint ids,
/// so suites sharing a store cannot collide.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed the builder from the test's name.
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let ids = TestDataBuilder::from_test_name("test_appointment_history");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// An appointment (aggregate) id, unique to this seed and suffix.
    pub fn appointment_id(&self, suffix: &str) -> String {
        self.name("apt", suffix)
    }

    /// A professional id, unique to this seed and suffix.
    pub fn professional_id(&self, suffix: &str) -> String {
        self.name("prof", suffix)
    }

    /// A seeded name of the form `prefix-seed-suffix`.
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let ids = TestDataBuilder::new(12345);
    /// assert_eq!(ids.name("apt", "main"), "apt-12345-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("{}-{}-{}", prefix, self.seed, suffix)
    }
}
