//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_fleet_catalog;
mod in_memory_key_value_store;
mod jwt_token_verifier;
mod redis_key_value_store;
mod redis_store_factory;

pub use in_memory_fleet_catalog::{FleetSeed, InMemoryFleetCatalog};
pub use in_memory_key_value_store::{InMemoryKeyValueStore, InMemoryStoreFactory};
pub use jwt_token_verifier::{BearerClaims, JwtTokenVerifier};
pub use redis_key_value_store::RedisKeyValueStore;
pub use redis_store_factory::{RedisStoreFactory, RedisStoreSettings};
