//! Modelgraph Object Model
//!
//! The in-memory object graph representing monitored infrastructure: entities
//! (devices, interfaces, routes, processes) connected by named relationship
//! edges. The reconciliation engine (`modelgraph-reconcile`) converges this
//! graph toward fact bundles delivered by external collectors.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      OBJECT GRAPH                        │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │   root ──("os")──► os ──("routes")──► 10.0.0.0_24        │
//! │    │                     │                               │
//! │    │                     └──────────► 192.168.1.0_24     │
//! │    │                                                     │
//! │    └───("interfaces")──► eth0, eth1, ...                 │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities are shared as [`EntityHandle`]s (`Arc<RwLock<Entity>>`); the graph
//! itself is just the reachable set from a root handle. Durability is the
//! concern of an external store, not of this crate.

pub mod entity;
pub mod factory;
pub mod locator;
pub mod relationship;

pub use entity::{AttrValue, Entity, EntityHandle};
pub use factory::{EntityFactory, FactoryError, RegistryFactory};
pub use locator::resolve_path;
pub use relationship::{RelationKind, Relationship, RemoveOutcome};
