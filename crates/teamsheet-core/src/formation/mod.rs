// Formation/team-selection engine.

pub mod captaincy;
pub mod catalog;
pub mod period;
pub mod picker;
pub mod pool;
pub mod reconcile;
pub mod selection;

pub use captaincy::CaptaincyTracker;
pub use catalog::{Format, Line, PositionSlot};
pub use period::{Period, PeriodManager};
pub use picker::{PickAction, Picker};
pub use pool::PlayerPool;
pub use reconcile::{ExportEntry, PeriodRecord, PersistedSelection, SelectionRecord};
pub use selection::{Assignment, SelectionStore, Selections, SlotId};
