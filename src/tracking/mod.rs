//! Outbound click tracking pipeline
//!
//! ```text
//! click ──→ classifier ──→ composer ──→ dispatcher ──┬──→ beacon queue ──→ first-party collector
//!              │              ↑   ↑                  │        (keep-alive fallback)
//!           ignored    attribution  identity         └──→ analytics tags
//! ```
//!
//! Navigation to the destination is decided independently of delivery.

pub mod attribution;
pub mod classifier;
pub mod dispatch;
pub mod event;
pub mod identity;
pub mod listener;
pub mod navigation;
pub mod tag;
pub mod transport;

pub use attribution::Attribution;
pub use classifier::{ClassifiedLink, LinkClassifier};
pub use dispatch::{DispatchReport, Dispatcher, PrimaryCollector, PrimaryDelivery};
pub use event::{compose, TrackedEvent};
pub use identity::{generate_event_id, EventId, IdGenerator, RandomIdGenerator};
pub use listener::{build_listener, ClickListener, ClickOutcome};
pub use navigation::{NavigationOutcome, NavigationPolicy, NavigationRequest, Navigator};
pub use tag::{AnalyticsTag, DataLayer, GtagHook, TagParams};
pub use transport::{BeaconQueue, BeaconTransport, HttpKeepalive, KeepaliveTransport};
