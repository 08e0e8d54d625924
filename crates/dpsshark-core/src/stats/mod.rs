//! Per-player combat statistics and the engine that owns them.

pub mod counter;
pub mod enemy;
pub mod engine;
pub mod identity;
pub mod player;
pub mod subprofession;

pub use counter::{CountBreakdown, RealtimeStats, SlidingWindowCounter, ValueBreakdown};
pub use enemy::EnemyCache;
pub use engine::{AggregationEngine, DamageEvent, HealingEvent};
pub use identity::{CachedIdentity, IdentityCache, IdentityCacheError, IdentityWriter};
pub use player::{PlayerRecord, SkillKey, UNKNOWN_PROFESSION};
