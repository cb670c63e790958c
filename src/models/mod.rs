mod quota;
mod spend_limit;
mod transaction;

pub use quota::{CounterKind, LimitCheckRequest, LimitStatus, LimitTransactionRecord, OrderLimit, TypeLimit};
pub use spend_limit::{BreachLimit, SpendLimit, WindowUsage};
pub use transaction::{TransactionRecord, TransactionStatus};
