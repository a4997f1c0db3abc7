pub mod alert;
pub mod channels;
pub mod dispatcher;
pub mod engine;
pub mod rule;

pub use alert::Alert;
pub use channels::{
    AlertLog, AlertNotice, AlertResolver, AnalyticsSink, NotificationSink, ResolveHandle,
};
pub use dispatcher::AlertDispatcher;
pub use engine::{AlertFilter, AlertRuleEngine, AlertStats, NewAlert};
pub use rule::{default_rules, AlertRule, Comparator};
