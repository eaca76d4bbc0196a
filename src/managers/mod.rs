// pinmark state managers
// Managers own persisted state: the key-value store, the site-scoped recent
// tag memory and the tag store built on both.

pub mod kv_store;
pub mod recent_tag_memory;
pub mod tag_store;
