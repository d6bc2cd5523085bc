mod clock;
mod disagreement;
mod notifier;
mod persistence;

pub use clock::{Clock, ManualClock, SystemClock};
pub use disagreement::{DisagreementSource, NoDisagreement};
pub use notifier::Notifier;
pub use persistence::{
    PersistedRecord, PersistedState, Persistence, RecordKind, RecordSink, RetentionPolicy,
};
