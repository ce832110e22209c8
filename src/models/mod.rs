mod payment_intent;
mod refund;
mod wallet;

pub use payment_intent::*;
pub use refund::*;
pub use wallet::*;
