// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Referral Compensation Engine

pub mod clock;
pub mod commission;
pub mod config;
pub mod engine;
pub mod idempotency;
pub mod ledger;
pub mod network;
pub mod points;
pub mod qualification;
pub mod rates;
pub mod sinks;
pub mod store;
pub mod types;
pub mod volume;

pub use clock::{Clock, FixedClock, Period, SystemClock};
pub use config::EngineConfig;
pub use engine::{BatchReport, CompEngine, EngineError, PurchaseOutcome};
pub use types::{BadgeCode, EventId, EventRef, Kwacha, MemberId, MemberStatus, ProLevel, TierId};
